use serde::{Deserialize, Serialize};

use crate::cache::strategy::StatusItem;
use crate::cache::Entity;

/// Seller approval status.
///
/// `Approving` and `Rejecting` are client-local intermediate states set by
/// the optimistic approval flow while its request is in flight; the server
/// only ever stores and returns pending, approved, or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SellerStatus {
    Pending,
    Approving,
    Approved,
    Rejecting,
    Rejected,
}

impl SellerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SellerStatus::Approved | SellerStatus::Rejected)
    }

    pub fn is_intermediate(self) -> bool {
        matches!(self, SellerStatus::Approving | SellerStatus::Rejecting)
    }
}

impl std::fmt::Display for SellerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SellerStatus::Pending => write!(f, "pending"),
            SellerStatus::Approving => write!(f, "approving"),
            SellerStatus::Approved => write!(f, "approved"),
            SellerStatus::Rejecting => write!(f, "rejecting"),
            SellerStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seller {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "storeName", default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub status: SellerStatus,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Entity for Seller {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn store_name() -> &'static str {
        "sellers"
    }
}

impl StatusItem for Seller {
    type Status = SellerStatus;

    fn item_id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> SellerStatus {
        self.status
    }

    fn set_status(&mut self, status: SellerStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(SellerStatus::Approved.is_terminal());
        assert!(SellerStatus::Rejected.is_terminal());
        assert!(!SellerStatus::Pending.is_terminal());
        assert!(SellerStatus::Approving.is_intermediate());
        assert!(SellerStatus::Rejecting.is_intermediate());
        assert!(!SellerStatus::Approved.is_intermediate());
    }

    #[test]
    fn test_parse_seller() {
        let json = r#"{"_id":"s1","name":"Ravi","email":"ravi@pharma.in","storeName":"Ravi Pharma","region":"south","status":"pending"}"#;
        let seller: Seller = serde_json::from_str(json).unwrap();
        assert_eq!(seller.id, "s1");
        assert_eq!(seller.status, SellerStatus::Pending);
        assert_eq!(seller.store_name.as_deref(), Some("Ravi Pharma"));
    }
}
