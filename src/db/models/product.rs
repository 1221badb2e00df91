//! Product catalog models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: f64,
    pub stock: i64,
    pub image_url: Option<String>,
    pub tags: Option<String>,
    pub created_by_admin_id: Option<i64>,
    pub created_at: String,
}

/// Tags arrive either as a list or as an already comma-joined string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Tags {
    List(Vec<String>),
    Joined(String),
}

impl Tags {
    pub fn join(self) -> String {
        match self {
            Tags::List(items) => items.join(","),
            Tags::Joined(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: f64,
    pub stock: Option<i64>,
    pub image_url: Option<String>,
    pub tags: Option<Tags>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
    pub image_url: Option<String>,
    pub tags: Option<Tags>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_join_list() {
        let tags: Tags = serde_json::from_str(r#"["vegan","spicy"]"#).unwrap();
        assert_eq!(tags.join(), "vegan,spicy");
    }

    #[test]
    fn test_tags_join_string() {
        let tags: Tags = serde_json::from_str(r#""vegan,spicy""#).unwrap();
        assert_eq!(tags.join(), "vegan,spicy");
    }
}
