//! Production-Tracking Site Abstraction
//!
//! Defines the query contract against the production-tracking database and
//! the typed record model that flows through the rest of the engine.
//!
//! Remote records arrive as arbitrary string-keyed fields. Instead of passing
//! dynamic maps around, the well-known fields the engine inspects (id, name,
//! version, publish type, task, thumbnail URL) are lifted into [`Record`]
//! proper; everything else rides along untouched in the `extra` side-map.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// A reference to another entity on the site (e.g. a publish's task or type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity type name, e.g. `"Task"` or `"PublishedFileType"`.
    pub kind: String,
    /// Entity id on the remote site.
    pub id: i64,
    /// Display name, when the site returned one.
    pub name: Option<String>,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
            name: None,
        }
    }

    pub fn named(kind: impl Into<String>, id: i64, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id,
            name: Some(name.into()),
        }
    }
}

/// One record returned by a site query.
///
/// Immutable snapshot of the remote row at query time. The engine only ever
/// reads the typed fields; `extra` is opaque passthrough for hook consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Remote record id.
    pub id: i64,
    /// Entity type this record belongs to, e.g. `"PublishedFile"`.
    pub entity_type: String,
    /// Publish name (code field).
    pub name: Option<String>,
    /// Version number; queries return these in ascending order.
    pub version: Option<i64>,
    /// Publish type reference, if the record carries one.
    pub publish_type: Option<EntityRef>,
    /// Task reference, if the record carries one.
    pub task: Option<EntityRef>,
    /// Remote-hosted thumbnail URL. Volatile: the site re-signs these URLs
    /// on every query, so they are excluded from change detection.
    pub image: Option<String>,
    /// Fields the engine does not interpret, keyed by remote field name.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn new(entity_type: impl Into<String>, id: i64) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            name: None,
            version: None,
            publish_type: None,
            task: None,
            image: None,
            extra: HashMap::new(),
        }
    }

    /// Display string for an arbitrary field, used when grouping records
    /// into tree levels. Well-known fields read from the typed struct;
    /// anything else falls back to the `extra` side-map.
    pub fn field_display(&self, field: &str) -> String {
        match field {
            "id" => self.id.to_string(),
            "name" | "code" => self.name.clone().unwrap_or_else(|| "Unnamed".to_string()),
            "version" | "version_number" => self
                .version
                .map(|v| format!("v{:03}", v))
                .unwrap_or_else(|| "v000".to_string()),
            "type" | "published_file_type" => display_entity_ref(&self.publish_type, "No Type"),
            "task" => display_entity_ref(&self.task, "No Task"),
            _ => self
                .extra
                .get(field)
                .map(display_value)
                .unwrap_or_else(|| "None".to_string()),
        }
    }
}

fn display_entity_ref(entity: &Option<EntityRef>, fallback: &str) -> String {
    match entity {
        Some(e) => e
            .name
            .clone()
            .unwrap_or_else(|| format!("{} {}", e.kind, e.id)),
        None => fallback.to_string(),
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "None".to_string(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or("None")
            .to_string(),
        other => other.to_string(),
    }
}

/// Comparison operator in a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Is,
    IsNot,
    Contains,
    In,
    GreaterThan,
    LessThan,
}

impl FilterOp {
    /// Wire representation used by the site API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::IsNot => "is_not",
            Self::Contains => "contains",
            Self::In => "in",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
        }
    }
}

/// One (field, operator, value) filter triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }
}

/// Sort direction for a query order clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One order clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Query access to the production-tracking site.
///
/// Implementations perform exactly one blocking remote search per call and
/// must be safe to share across tasks behind an `Arc`.
#[async_trait]
pub trait TrackingSite: Send + Sync {
    /// Hostname identifying the site instance. Part of the on-disk cache
    /// identity, so two sites never share cached trees.
    fn host(&self) -> &str;

    /// Run a search against the site.
    ///
    /// `filters: None` means "fetch nothing" and must resolve to an empty
    /// result set without touching the network.
    async fn find(
        &self,
        entity_type: &str,
        filters: Option<&[Filter]>,
        fields: &[String],
        order: &[SortSpec],
    ) -> Result<Vec<Record>>;
}
