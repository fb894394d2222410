//! Remote-operation requests and their ids.
//!
//! A request is immutable once enqueued; completion events are correlated
//! back to the enqueuer purely by [`RequestId`]. The queue never tracks who
//! asked; requesters remember their own pending ids and ignore the rest.

use bridge_traits::site::{Filter, SortSpec};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Unique identifier for a queued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Create a new random request ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a request ID from a string
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| SyncError::InvalidRequestId(e.to_string()))
    }

    /// Get the string representation
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters of a find request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindSpec {
    /// Entity type to search, e.g. `"PublishedFile"`
    pub entity_type: String,
    /// Filter triples; `None` is the "no query" sentinel and resolves to an
    /// empty result set without a network call
    pub filters: Option<Vec<Filter>>,
    /// Fields to return per record
    pub fields: Vec<String>,
    /// Order clauses
    pub order: Vec<SortSpec>,
}

/// Parameters of a thumbnail request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    /// Remote image URL
    pub url: String,
    /// Entity type owning the thumbnail
    pub entity_type: String,
    /// Entity id owning the thumbnail
    pub entity_id: i64,
}

/// What kind of remote operation a request performs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestKind {
    /// Search the tracking site
    Find(FindSpec),
    /// Resolve a thumbnail to a local cache path
    Thumbnail(ThumbnailSpec),
}

/// One queued remote operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unique identifier used to correlate completion events
    pub id: RequestId,
    /// Unix timestamp when the request was created
    pub created_at: i64,
    /// Operation payload
    pub kind: RequestKind,
}

impl Request {
    /// Create a find request
    pub fn find(spec: FindSpec) -> Self {
        Self {
            id: RequestId::new(),
            created_at: chrono::Utc::now().timestamp(),
            kind: RequestKind::Find(spec),
        }
    }

    /// Create a thumbnail request
    pub fn thumbnail(spec: ThumbnailSpec) -> Self {
        Self {
            id: RequestId::new(),
            created_at: chrono::Utc::now().timestamp(),
            kind: RequestKind::Thumbnail(spec),
        }
    }

    /// Whether this is a find request
    pub fn is_find(&self) -> bool {
        matches!(self.kind, RequestKind::Find(_))
    }
}
