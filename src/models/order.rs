use serde::{Deserialize, Serialize};

use crate::cache::Entity;
use crate::models::user::Address;

/// Order lifecycle status.
///
/// The server only ever moves an order forward along
/// pending -> accepted -> shipped -> delivered, with cancellation possible
/// until shipping and rejection only from pending. `can_transition_to`
/// encodes the same rules client-side so an illegal request is refused
/// before it reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Shipped,
    Delivered,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Accepted, Shipped)
                | (Accepted, Cancelled)
                | (Shipped, Delivered)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Accepted => write!(f, "accepted"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Delivered => write!(f, "delivered"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// How the customer pays. UPI and cash-on-delivery are flags passed through
/// to the backend; no payment processing happens client-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cod,
    Upi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(rename = "productId")]
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "sellerId", default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(rename = "shippingAddress", default)]
    pub shipping_address: Option<Address>,
    #[serde(rename = "paymentMethod", default)]
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    #[serde(rename = "statusDescription", default)]
    pub status_description: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub total: f64,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Entity for Order {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn store_name() -> &'static str {
        "orders"
    }
}

/// Payload for placing an order. The server assigns the id, the initial
/// pending status, and the seller/region routing.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub items: Vec<OrderItem>,
    #[serde(rename = "shippingAddress")]
    pub shipping_address: Address,
    #[serde(rename = "paymentMethod")]
    pub payment_method: PaymentMethod,
    pub total: f64,
}
