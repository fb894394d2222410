//! ShotGrid REST API response types
//!
//! Data structures for deserializing ShotGrid REST API (v1) search responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of an entity search request
#[derive(Debug, Serialize)]
pub struct SearchRequestBody {
    /// Filter triples in wire form: `[["field", "op", value], ...]`
    pub filters: Vec<Value>,

    /// Field names to return per record
    pub fields: Vec<String>,

    /// Comma-separated sort expression, `-` prefix for descending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

/// Top-level search response envelope
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    /// Matched entities
    pub data: Vec<ApiEntity>,
}

/// One entity in a search response
#[derive(Debug, Deserialize)]
pub struct ApiEntity {
    /// Entity id
    pub id: i64,

    /// Entity type name
    #[serde(rename = "type")]
    pub kind: String,

    /// Scalar fields
    #[serde(default)]
    pub attributes: Map<String, Value>,

    /// Entity-link fields
    #[serde(default)]
    pub relationships: Map<String, Value>,
}

/// A linked entity inside a relationship payload
#[derive(Debug, Clone, Deserialize)]
pub struct RelatedEntity {
    /// Entity id
    pub id: i64,

    /// Entity type name
    #[serde(rename = "type")]
    pub kind: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

impl ApiEntity {
    /// Extract the linked entity for a relationship field, if present.
    ///
    /// The wire shape is `{"field": {"data": {"type": ..., "id": ...,
    /// "name": ...}}}`; a null `data` means the link is unset.
    pub fn relationship(&self, field: &str) -> Option<RelatedEntity> {
        self.relationships
            .get(field)
            .and_then(|rel| rel.get("data"))
            .and_then(|data| serde_json::from_value(data.clone()).ok())
    }
}
