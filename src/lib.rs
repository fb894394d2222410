//! Workspace placeholder crate.
//!
//! This crate exists so host applications can depend on `pbc-workspace` and
//! pull in the publish-browser engine (`core-sync`) together with its
//! runtime (`core-runtime`) without wiring each workspace crate
//! individually.

pub use core_runtime;
pub use core_sync;
