//! # Event Bus System
//!
//! Event-driven plumbing for the publish browser, built on
//! `tokio::sync::broadcast`. The work queue's background worker publishes
//! completion events here; model owners consume them on their own task and
//! apply the results, so tree state is never mutated across tasks.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, PanelEvent, QueueEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus.emit(PanelEvent::Queue(QueueEvent::Drained)).ok();
//!
//! if let Ok(event) = stream.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```
//!
//! ## Error Handling
//!
//! `RecvError::Lagged(n)` means a subscriber missed `n` events and should
//! treat its view of the world as stale (typically by issuing a fresh
//! refresh); `RecvError::Closed` signals shutdown.

use bridge_traits::site::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall behind by more than this receive
/// `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum for everything the panel core publishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum PanelEvent {
    /// Work-queue lifecycle and request completion events
    Queue(QueueEvent),
    /// Tree-model change notifications for the UI layer
    Model(ModelEvent),
}

impl PanelEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            PanelEvent::Queue(e) => e.description(),
            PanelEvent::Model(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            PanelEvent::Queue(QueueEvent::FindFailed { .. }) => EventSeverity::Error,
            PanelEvent::Queue(QueueEvent::ThumbnailFailed { .. }) => EventSeverity::Warning,
            PanelEvent::Model(ModelEvent::RefreshFailed { .. }) => EventSeverity::Error,
            PanelEvent::Model(ModelEvent::TreeRebuilt { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events published by a work queue's background worker.
///
/// Completion events carry the originating request id; requesters correlate
/// by id and silently drop events for requests they no longer recognize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// The worker picked up a request after being idle.
    Processing,
    /// The queue ran dry; the worker is parked.
    Drained,
    /// A find request finished with a result set.
    FindCompleted {
        /// Id of the find request.
        request_id: String,
        /// Raw records returned by the site, in query order.
        records: Vec<Record>,
    },
    /// A find request failed.
    FindFailed {
        /// Id of the find request.
        request_id: String,
        /// Human-readable error message.
        message: String,
    },
    /// A thumbnail request resolved to a local cache path.
    ThumbnailReady {
        /// Id of the thumbnail request.
        request_id: String,
        /// Path of the cached image on disk.
        path: PathBuf,
    },
    /// A thumbnail request failed; the node keeps its placeholder icon.
    ThumbnailFailed {
        /// Id of the thumbnail request.
        request_id: String,
        /// Human-readable error message.
        message: String,
    },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Processing => "Worker processing requests",
            QueueEvent::Drained => "Work queue drained",
            QueueEvent::FindCompleted { .. } => "Find request completed",
            QueueEvent::FindFailed { .. } => "Find request failed",
            QueueEvent::ThumbnailReady { .. } => "Thumbnail cached",
            QueueEvent::ThumbnailFailed { .. } => "Thumbnail fetch failed",
        }
    }

    /// The request id this event answers, if it answers one.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            QueueEvent::FindCompleted { request_id, .. }
            | QueueEvent::FindFailed { request_id, .. }
            | QueueEvent::ThumbnailReady { request_id, .. }
            | QueueEvent::ThumbnailFailed { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

// ============================================================================
// Model Events
// ============================================================================

/// Tree-model change notifications consumed by the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum ModelEvent {
    /// A refresh was issued; the model is loading.
    Refreshing {
        /// Entity type being refreshed.
        entity_type: String,
    },
    /// The whole tree was discarded and rebuilt.
    TreeRebuilt {
        /// Entity type of the model.
        entity_type: String,
        /// Number of leaf nodes after the rebuild.
        leaf_count: usize,
    },
    /// New nodes were spliced in; pre-existing nodes are untouched.
    NodesInserted {
        /// Entity type of the model.
        entity_type: String,
        /// Number of leaf nodes inserted.
        inserted: usize,
    },
    /// A node's icon was patched with a freshly cached thumbnail.
    IconUpdated {
        /// Remote record id of the patched leaf.
        record_id: i64,
    },
    /// A refresh failed.
    RefreshFailed {
        /// Entity type of the model.
        entity_type: String,
        /// Human-readable error message.
        message: String,
        /// Whether the model still holds previously synced data. When true
        /// the UI should surface the error non-destructively.
        had_data: bool,
    },
}

impl ModelEvent {
    fn description(&self) -> &str {
        match self {
            ModelEvent::Refreshing { .. } => "Model refreshing",
            ModelEvent::TreeRebuilt { .. } => "Tree rebuilt",
            ModelEvent::NodesInserted { .. } => "Nodes inserted",
            ModelEvent::IconUpdated { .. } => "Node icon updated",
            ModelEvent::RefreshFailed { .. } => "Refresh failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to panel events.
///
/// Uses `tokio::sync::broadcast` internally: multiple producers (clone the
/// bus), multiple independent consumers (each `subscribe()` gets its own
/// receiver), non-blocking sends, lagging detection for slow subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PanelEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are no active subscribers (benign at shutdown).
    pub fn emit(&self, event: PanelEvent) -> Result<usize, SendError<PanelEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive all future events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<PanelEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
