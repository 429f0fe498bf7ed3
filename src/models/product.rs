use serde::{Deserialize, Serialize};

use crate::cache::Entity;

/// A catalog entry. The backend stores products under MongoDB-style `_id`
/// keys, so both `id` and `_id` are accepted on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    #[serde(rename = "sellerId", default)]
    pub seller_id: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

impl Entity for Product {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn store_name() -> &'static str {
        "products"
    }
}

/// Payload for creating a product. The server assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    pub price: f64,
    pub stock: i64,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "sellerId", skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,
}

/// Changed fields for a product update. Field names match the wire (and
/// cached) representation of `Product` so the same payload drives both the
/// PUT request and the cache merge.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_with_mongo_id() {
        let json = r#"{"_id":"p1","name":"Aspirin","category":"pain-relief","price":10.0}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, "p1");
        assert_eq!(product.name, "Aspirin");
        assert_eq!(product.price, 10.0);
        assert_eq!(product.stock, 0);
        assert!(!product.in_stock());
    }

    #[test]
    fn test_product_patch_skips_unset_fields() {
        let patch = ProductPatch {
            price: Some(12.5),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({"price": 12.5}));
    }
}
