use serde::{Deserialize, Serialize};

use crate::cache::Entity;

/// The role attached to an account, which decides which dashboard the
/// front end routes to and which operations the backend authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Customer,
    Seller,
    RegionalAdmin,
    SuperAdmin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "Customer"),
            Role::Seller => write!(f, "Seller"),
            Role::RegionalAdmin => write!(f, "Regional Admin"),
            Role::SuperAdmin => write!(f, "Super Admin"),
        }
    }
}

/// A shipping address, shared by user profiles and orders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Address {
    /// Format the address as a single line for display.
    pub fn formatted(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(ref line1) = self.line1 {
            if !line1.is_empty() {
                parts.push(line1.clone());
            }
        }
        if let Some(ref city) = self.city {
            if !city.is_empty() {
                let city_state = match &self.state {
                    Some(state) if !state.is_empty() => format!("{}, {}", city, state),
                    _ => city.clone(),
                };
                parts.push(city_state);
            }
        }
        if let Some(ref pincode) = self.pincode {
            if !pincode.is_empty() {
                parts.push(pincode.clone());
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(rename = "shippingAddress", default)]
    pub shipping_address: Option<Address>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Entity for User {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn store_name() -> &'static str {
        "users"
    }
}

/// Changed fields for a profile update. Field names match the wire (and
/// cached) representation of `User`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "shippingAddress", skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(
            serde_json::to_value(Role::RegionalAdmin).unwrap(),
            serde_json::json!("regional-admin")
        );
        let role: Role = serde_json::from_str("\"super-admin\"").unwrap();
        assert_eq!(role, Role::SuperAdmin);
    }

    #[test]
    fn test_address_formatted() {
        let address = Address {
            line1: Some("12 MG Road".to_string()),
            city: Some("Pune".to_string()),
            state: Some("MH".to_string()),
            pincode: Some("411001".to_string()),
            ..Default::default()
        };
        assert_eq!(
            address.formatted().unwrap(),
            "12 MG Road, Pune, MH, 411001"
        );
        assert!(Address::default().formatted().is_none());
    }
}
