//! # Sync Engine
//!
//! The asynchronous remote-data synchronization and deduplication engine
//! behind every tree/list view in the publish browser.
//!
//! ## Overview
//!
//! - **Work Queue** (`work_queue`): background worker executing remote
//!   queries and thumbnail fetches one at a time, finds ahead of thumbnails
//! - **Remote Gateway** (`gateway`): one blocking remote operation per
//!   request against the injected site and HTTP bridges
//! - **Thumbnail Cache** (`thumbnail_cache`): content-addressed disk store
//!   with atomic writes, consulted before any download
//! - **Tree Cache** (`tree_cache`): versioned binary snapshots that let a
//!   model populate instantly on cold start
//! - **Sync Model** (`model`): tree materialization and the incremental
//!   reconciliation state machine
//! - **Latest-Publish Reducer** (`reducer`): collapses raw publish result
//!   sets to the highest version per (name, type, task) group
//! - **Browser Engine** (`engine`): explicit per-view wiring of all of the
//!   above, no ambient globals
//!
//! ## Data flow
//!
//! UI requests a refresh → model enqueues a find → the worker executes it
//! through the gateway → the completion event is applied on the model's
//! owning task → the reducer (for publish listings) and reconciliation run
//! → changed nodes are announced on the event bus → newly visible nodes
//! with an image reference request thumbnails, which patch icons in place
//! as they resolve.

pub mod engine;
pub mod error;
pub mod gateway;
pub mod model;
pub mod node;
pub mod reducer;
pub mod request;
pub mod thumbnail_cache;
pub mod tree_cache;
pub mod work_queue;

pub use engine::BrowserEngine;
pub use error::{Result, SyncError};
pub use gateway::{Outcome, RemoteGateway};
pub use model::{ModelState, QueryParams, SyncModel};
pub use node::{Node, NodeKey};
pub use reducer::{reduce_latest_publishes, LatestPublishes, ReducedPublish};
pub use request::{FindSpec, Request, RequestId, RequestKind, ThumbnailSpec};
pub use thumbnail_cache::ThumbnailCache;
pub use work_queue::{QueueStats, WorkQueue};
