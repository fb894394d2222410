//! # Host Bridge Traits
//!
//! Abstraction traits that connect the publish-browser engine to the outside
//! world.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync engine and everything it
//! must not know about concretely: the production-tracking site, the HTTP
//! transport, and the embedding application's action dispatch. Each trait is
//! a capability injected into the engine by the host.
//!
//! ## Traits
//!
//! - [`TrackingSite`](site::TrackingSite) - Remote search against the
//!   production-tracking database
//! - [`HttpClient`](http::HttpClient) - Async HTTP transport and thumbnail
//!   downloads
//! - [`ActionHooks`](hooks::ActionHooks) - Outward action discovery and
//!   execution for records the user interacts with
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds; the engine shares
//! implementations across async tasks behind `Arc`.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert transport-specific errors into it and keep messages
//! actionable (include URLs, status codes, field names).

pub mod error;
pub mod hooks;
pub mod http;
pub mod site;

pub use error::BridgeError;

// Re-export commonly used types
pub use hooks::{ActionContext, ActionDescriptor, ActionHooks};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use site::{EntityRef, Filter, FilterOp, Record, SortDirection, SortSpec, TrackingSite};
