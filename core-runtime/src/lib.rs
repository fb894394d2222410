//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the publish-browser core:
//! - Logging and tracing setup
//! - Engine configuration
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the ambient utilities the engine crates depend on. It
//! establishes the logging conventions and the event broadcasting mechanism
//! used to deliver background-worker results back to model owners.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::PanelConfig;
pub use error::{Error, Result};
pub use events::{EventBus, ModelEvent, PanelEvent, QueueEvent};
