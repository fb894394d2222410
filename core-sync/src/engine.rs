//! # Browser Engine
//!
//! Explicit engine instance owned by the component that created the view.
//! Wires the event bus, work queue, gateway, and thumbnail cache together
//! from a [`PanelConfig`] and the injected bridges, and hands out models
//! bound to that plumbing. No ambient globals: two panels in one process
//! get two fully independent engines.

use std::sync::Arc;

use bridge_traits::error::BridgeError;
use bridge_traits::hooks::{ActionContext, ActionDescriptor, ActionHooks};
use bridge_traits::http::HttpClient;
use bridge_traits::site::{Record, TrackingSite};
use core_runtime::config::PanelConfig;
use core_runtime::events::{EventBus, PanelEvent, Receiver};
use tracing::info;

use crate::error::Result;
use crate::gateway::RemoteGateway;
use crate::model::SyncModel;
use crate::thumbnail_cache::ThumbnailCache;
use crate::work_queue::WorkQueue;

/// One publish-browser engine: a work queue, its worker, and the caches.
pub struct BrowserEngine {
    config: PanelConfig,
    event_bus: EventBus,
    queue: Arc<WorkQueue>,
    site_host: String,
    hooks: Option<Arc<dyn ActionHooks>>,
}

impl BrowserEngine {
    /// Build and start an engine.
    ///
    /// Creates the cache root directory and spawns the worker task; call
    /// from within a tokio runtime.
    pub fn new(
        config: PanelConfig,
        site: Arc<dyn TrackingSite>,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.cache_root)?;

        let event_bus = EventBus::new(config.event_buffer);
        let thumbnails = Arc::new(ThumbnailCache::new(
            &config.cache_root,
            config.thumbnail_index_entries,
        ));
        let gateway = Arc::new(RemoteGateway::new(site, http, thumbnails));
        let site_host = gateway.site_host().to_string();

        let queue = Arc::new(WorkQueue::new(event_bus.clone()));
        queue.start(gateway);

        info!(site = %site_host, cache_root = %config.cache_root.display(), "Browser engine started");

        Ok(Self {
            config,
            event_bus,
            queue,
            site_host,
            hooks: None,
        })
    }

    /// Attach the host's action dispatch. Without hooks every record simply
    /// offers no actions.
    pub fn with_action_hooks(mut self, hooks: Arc<dyn ActionHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Actions the host offers for a record in a given context. The engine
    /// hands the record over verbatim and never interprets the result.
    pub async fn actions_for(
        &self,
        record: &Record,
        context: ActionContext,
    ) -> Result<Vec<ActionDescriptor>> {
        match &self.hooks {
            Some(hooks) => Ok(hooks.actions_for(record, context).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Execute a named host action against a record.
    pub async fn execute_action(&self, action: &str, record: &Record) -> Result<()> {
        let hooks = self.hooks.as_ref().ok_or_else(|| {
            BridgeError::NotAvailable("no action hooks configured".to_string())
        })?;
        Ok(hooks.execute(action, record).await?)
    }

    /// The engine's event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to all panel events.
    pub fn subscribe(&self) -> Receiver<PanelEvent> {
        self.event_bus.subscribe()
    }

    /// The shared work queue.
    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// A model that takes result sets as-is (entity trees, task lists).
    pub fn create_model(&self) -> SyncModel {
        SyncModel::new(
            Arc::clone(&self.queue),
            self.event_bus.clone(),
            self.site_host.clone(),
            self.config.cache_root.clone(),
        )
    }

    /// A model that runs the latest-publish reduction (publish listings).
    pub fn create_publish_model(&self) -> SyncModel {
        self.create_model().with_latest_reduction()
    }

    /// Stop the worker after its current request, if any.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpRequest, HttpResponse};
    use bridge_traits::site::{Filter, SortSpec};
    use uuid::Uuid;

    struct NullSite;

    #[async_trait]
    impl TrackingSite for NullSite {
        fn host(&self) -> &str {
            "https://studio.example"
        }

        async fn find(
            &self,
            _entity_type: &str,
            _filters: Option<&[Filter]>,
            _fields: &[String],
            _order: &[SortSpec],
        ) -> BridgeResult<Vec<Record>> {
            Ok(Vec::new())
        }
    }

    struct NullHttp;

    #[async_trait]
    impl HttpClient for NullHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(BridgeError::NotAvailable("no transport in tests".to_string()))
        }
    }

    struct EchoHooks;

    #[async_trait]
    impl ActionHooks for EchoHooks {
        async fn actions_for(
            &self,
            record: &Record,
            _context: ActionContext,
        ) -> BridgeResult<Vec<ActionDescriptor>> {
            Ok(vec![ActionDescriptor {
                name: format!("open_{}", record.id),
                caption: "Open".to_string(),
                description: None,
                params: serde_json::Value::Null,
            }])
        }

        async fn execute(&self, _action: &str, _record: &Record) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn test_engine() -> (BrowserEngine, std::path::PathBuf) {
        let cache_root =
            std::env::temp_dir().join(format!("engine-unit-{}", Uuid::new_v4().simple()));
        let config = PanelConfig::builder().cache_root(&cache_root).build().unwrap();
        let engine = BrowserEngine::new(config, Arc::new(NullSite), Arc::new(NullHttp)).unwrap();
        (engine, cache_root)
    }

    #[tokio::test]
    async fn test_engine_without_hooks_offers_no_actions() {
        let (engine, cache_root) = test_engine();
        let record = Record::new("PublishedFile", 1);

        let actions = engine
            .actions_for(&record, ActionContext::Main)
            .await
            .unwrap();
        assert!(actions.is_empty());
        assert!(engine.execute_action("open", &record).await.is_err());

        engine.shutdown();
        std::fs::remove_dir_all(&cache_root).ok();
    }

    #[tokio::test]
    async fn test_engine_dispatches_to_hooks() {
        let (engine, cache_root) = test_engine();
        let engine = engine.with_action_hooks(Arc::new(EchoHooks));
        let record = Record::new("PublishedFile", 7);

        let actions = engine
            .actions_for(&record, ActionContext::Details)
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name, "open_7");
        engine.execute_action("open_7", &record).await.unwrap();

        engine.shutdown();
        std::fs::remove_dir_all(&cache_root).ok();
    }

    #[tokio::test]
    async fn test_models_share_the_engine_plumbing() {
        let (engine, cache_root) = test_engine();

        let model = engine.create_model();
        let publish_model = engine.create_publish_model();
        assert_eq!(model.state(), crate::model::ModelState::Empty);
        assert_eq!(publish_model.state(), crate::model::ModelState::Empty);

        engine.shutdown();
        std::fs::remove_dir_all(&cache_root).ok();
    }
}
