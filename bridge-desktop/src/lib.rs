//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides the production HTTP transport for the publish browser:
//! - `HttpClient` using `reqwest` (pooling, TLS, retry with backoff)
//!
//! The tracking-site connector itself lives in `provider-shotgrid`; it is
//! transport-agnostic and takes any `HttpClient`.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use bridge_traits::HttpClient;
//! use std::sync::Arc;
//!
//! let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
//! ```

mod http;

pub use http::ReqwestHttpClient;
