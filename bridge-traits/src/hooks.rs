//! Hook / Action Dispatch Abstraction
//!
//! The panel hands records to the embedding application through this trait;
//! what an action actually does (open a file in a DCC, copy a path, ...) is
//! entirely the host's business. The engine never interprets action
//! semantics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::site::Record;

/// Where in the panel the actions are being requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionContext {
    /// The main publish listing.
    Main,
    /// The details side pane.
    Details,
    /// The version-history list.
    History,
}

/// One action the host offers for a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Stable action identifier passed back to [`ActionHooks::execute`].
    pub name: String,
    /// Short label shown in the UI.
    pub caption: String,
    /// Optional longer tooltip text.
    pub description: Option<String>,
    /// Opaque host-defined parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Host-implemented action dispatch.
#[async_trait]
pub trait ActionHooks: Send + Sync {
    /// List the actions available for a record in a given context.
    async fn actions_for(
        &self,
        record: &Record,
        context: ActionContext,
    ) -> Result<Vec<ActionDescriptor>>;

    /// Execute a named action against a record.
    async fn execute(&self, action: &str, record: &Record) -> Result<()>;
}
