//! # Sync Model
//!
//! The tree/list data structure behind every view: receives raw result
//! sets, reconciles them against what is already materialized, persists the
//! tree to the disk cache, and patches thumbnails in lazily.
//!
//! ## State machine
//!
//! ```text
//! Empty → Loading → Populated
//!           ↑ ________/
//!           (any refresh)
//! ```
//!
//! ## Reconciliation
//!
//! On every find completion the new result set is diffed against the tree:
//!
//! 1. any previously-present leaf now absent → full rebuild;
//! 2. else new leaves only → incremental insert along the hierarchy path,
//!    leaving existing siblings untouched (UI selection and expansion
//!    state survive);
//! 3. else any non-volatile field difference → full rebuild;
//! 4. else the tree is left alone.
//!
//! The incremental path is only taken when the key sets prove a pure
//! insertion; a mixed refresh (one added + one changed) deliberately falls
//! back to the rebuild.
//!
//! ## Threading
//!
//! The model is mutated only by its owning task: completion events arrive
//! through the event bus and are fed to [`SyncModel::apply`] there. Nothing
//! else ever touches the tree, so it needs no lock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::site::{Filter, Record, SortSpec};
use core_runtime::events::{EventBus, ModelEvent, PanelEvent, QueueEvent};
use tracing::{debug, info, warn};

use crate::node::{node_at_path_mut, Node, NodeKey};
use crate::reducer::{reduce_latest_publishes, ReducedPublish};
use crate::request::{FindSpec, RequestId, ThumbnailSpec};
use crate::tree_cache;
use crate::work_queue::WorkQueue;

/// Record fields excluded from change detection. The site re-signs
/// thumbnail URLs on every query, so they differ even when nothing changed.
const VOLATILE_FIELDS: [&str; 1] = ["image"];

/// Lifecycle state of one logical tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Nothing loaded yet
    Empty,
    /// A refresh is in flight
    Loading,
    /// At least one result set is materialized
    Populated,
}

/// Query parameters for one logical tree.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    /// Entity type to search
    pub entity_type: String,
    /// Filter triples; `None` is the "no query" sentinel
    pub filters: Option<Vec<Filter>>,
    /// Ordered grouping fields, outermost first
    pub hierarchy: Vec<String>,
    /// Fields to fetch per record
    pub fields: Vec<String>,
    /// Order clauses
    pub order: Vec<SortSpec>,
}

/// Tree model fed by the background work queue.
pub struct SyncModel {
    queue: Arc<WorkQueue>,
    event_bus: EventBus,
    /// Site host, part of the cache-file identity
    site_host: String,
    /// Directory for tree cache files
    cache_root: PathBuf,
    /// Run the latest-publish reduction before reconciling
    reduce_latest: bool,

    params: Option<QueryParams>,
    state: ModelState,
    root: Node,
    /// Leaf display ambiguity flags from the last reduction, by record id
    task_unique: HashMap<i64, bool>,
    /// Per-type counts from the last reduction, for filter checkboxes
    type_counts: HashMap<Option<i64>, u64>,
    /// Find request currently awaited, if any
    pending_find: Option<RequestId>,
    /// In-flight thumbnail requests: request id -> record id
    pending_thumbs: HashMap<String, i64>,
    /// Error placeholder when a refresh failed with nothing materialized
    last_error: Option<String>,
}

impl SyncModel {
    pub fn new(
        queue: Arc<WorkQueue>,
        event_bus: EventBus,
        site_host: impl Into<String>,
        cache_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            queue,
            event_bus,
            site_host: site_host.into(),
            cache_root: cache_root.into(),
            reduce_latest: false,
            params: None,
            state: ModelState::Empty,
            root: Node::root(),
            task_unique: HashMap::new(),
            type_counts: HashMap::new(),
            pending_find: None,
            pending_thumbs: HashMap::new(),
            last_error: None,
        }
    }

    /// Enable the latest-publish reduction for this model (publish listings
    /// only; entity/task trees take result sets as-is).
    pub fn with_latest_reduction(mut self) -> Self {
        self.reduce_latest = true;
        self
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Per-type counts from the last reduction.
    pub fn type_counts(&self) -> &HashMap<Option<i64>, u64> {
        &self.type_counts
    }

    /// Error placeholder for an empty tree, if the last refresh failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record query parameters, pre-populate from the disk cache when one
    /// exists, then issue a refresh.
    pub fn load(&mut self, params: QueryParams) {
        let cache_path = self.cache_file_path(&params);
        self.params = Some(params);

        // Cache load is best-effort: corruption or absence both mean a cold
        // start, never a failure.
        match tree_cache::load(&cache_path) {
            Ok(root) => {
                info!(
                    path = %cache_path.display(),
                    leaves = root.leaf_count(),
                    "Pre-populated model from tree cache"
                );
                self.root = root;
                self.state = ModelState::Populated;
                self.request_missing_thumbnails();
            }
            Err(e) => {
                debug!(path = %cache_path.display(), error = %e, "No usable tree cache");
            }
        }

        self.refresh();
    }

    /// Re-query the site. With the "no query" sentinel the empty result is
    /// synthesized immediately and no request is enqueued.
    pub fn refresh(&mut self) {
        let Some(params) = self.params.clone() else {
            debug!("Refresh before load, ignoring");
            return;
        };

        self.state = ModelState::Loading;
        self.emit(ModelEvent::Refreshing {
            entity_type: params.entity_type.clone(),
        });

        if params.filters.is_none() {
            debug!("No query set, synthesizing empty result");
            self.pending_find = None;
            self.apply_result(Vec::new());
            return;
        }

        let id = self.queue.enqueue_find(FindSpec {
            entity_type: params.entity_type,
            filters: params.filters,
            fields: params.fields,
            order: params.order,
        });
        self.pending_find = Some(id);
    }

    /// Feed one queue event to the model, on the owning task.
    ///
    /// Events that answer requests this model did not issue (or no longer
    /// remembers, e.g. after a newer refresh) are ignored.
    pub fn apply(&mut self, event: &QueueEvent) {
        match event {
            QueueEvent::FindCompleted {
                request_id,
                records,
            } => {
                if !self.is_pending_find(request_id) {
                    debug!(request_id = %request_id, "Ignoring stale find completion");
                    return;
                }
                self.pending_find = None;
                self.apply_result(records.clone());
            }
            QueueEvent::FindFailed {
                request_id,
                message,
            } => {
                if !self.is_pending_find(request_id) {
                    debug!(request_id = %request_id, "Ignoring stale find failure");
                    return;
                }
                self.pending_find = None;
                self.apply_failure(message);
            }
            QueueEvent::ThumbnailReady { request_id, path } => {
                self.apply_thumbnail(request_id, path.clone());
            }
            QueueEvent::ThumbnailFailed {
                request_id,
                message,
            } => {
                if self.pending_thumbs.remove(request_id).is_some() {
                    debug!(request_id = %request_id, error = %message, "Thumbnail fetch failed");
                }
            }
            QueueEvent::Processing | QueueEvent::Drained => {}
        }
    }

    fn is_pending_find(&self, request_id: &str) -> bool {
        self.pending_find
            .map(|id| id.as_str() == request_id)
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Find completion
    // ------------------------------------------------------------------

    fn apply_result(&mut self, records: Vec<Record>) {
        let records = if self.reduce_latest {
            let reduction = reduce_latest_publishes(&records);
            self.task_unique = reduction
                .records
                .iter()
                .map(|r| (r.record.id, r.task_unique))
                .collect();
            self.type_counts = reduction.type_counts;
            reduction
                .records
                .into_iter()
                .map(|ReducedPublish { record, .. }| record)
                .collect()
        } else {
            records
        };

        self.reconcile(records);
        self.state = ModelState::Populated;
        self.last_error = None;
        self.persist();
    }

    fn apply_failure(&mut self, message: &str) {
        let Some(params) = &self.params else { return };
        let had_data = !self.root.children.is_empty();
        if had_data {
            // Existing tree stays intact; the error is shown transiently.
            self.state = ModelState::Populated;
            warn!(error = %message, "Refresh failed, keeping materialized tree");
        } else {
            self.state = ModelState::Empty;
            self.last_error = Some(message.to_string());
        }
        self.emit(ModelEvent::RefreshFailed {
            entity_type: params.entity_type.clone(),
            message: message.to_string(),
            had_data,
        });
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    fn reconcile(&mut self, records: Vec<Record>) {
        let entity_type = self
            .params
            .as_ref()
            .map(|p| p.entity_type.clone())
            .unwrap_or_default();

        let new_ids: HashSet<i64> = records.iter().map(|r| r.id).collect();
        let current_ids: HashSet<i64> = self.root.leaf_ids().into_iter().collect();

        let any_removed = current_ids.iter().any(|id| !new_ids.contains(id));
        if any_removed {
            // Deletions occurred: a full rebuild is the simplest behavior
            // that is always correct.
            debug!("Records removed since last sync, rebuilding tree");
            self.rebuild(records);
            self.emit(ModelEvent::TreeRebuilt {
                entity_type,
                leaf_count: self.root.leaf_count(),
            });
            return;
        }

        let added: Vec<Record> = records
            .iter()
            .filter(|r| !current_ids.contains(&r.id))
            .cloned()
            .collect();
        if !added.is_empty() {
            let inserted = added.len();
            debug!(inserted = inserted, "Pure insertion, splicing new nodes");
            self.insert_incremental(added);
            self.emit(ModelEvent::NodesInserted {
                entity_type,
                inserted,
            });
            return;
        }

        let any_changed = records.iter().any(|record| {
            match self.root.find_leaf(record.id).and_then(|n| n.record.as_ref()) {
                Some(current) => !records_equal_ignoring_volatile(current, record),
                None => true,
            }
        });
        if any_changed {
            debug!("Record fields changed since last sync, rebuilding tree");
            self.rebuild(records);
            self.emit(ModelEvent::TreeRebuilt {
                entity_type,
                leaf_count: self.root.leaf_count(),
            });
            return;
        }

        debug!("Result set unchanged, leaving tree untouched");
    }

    /// Discard everything and re-group the result set level by level.
    ///
    /// Grouping runs over an explicit work list rather than recursing per
    /// hierarchy field, so arbitrarily deep hierarchies cannot overflow the
    /// stack.
    fn rebuild(&mut self, records: Vec<Record>) {
        let hierarchy = self
            .params
            .as_ref()
            .map(|p| p.hierarchy.clone())
            .unwrap_or_default();

        self.root = Node::root();
        self.pending_thumbs.clear();

        struct Frame {
            records: Vec<Record>,
            path: Vec<usize>,
            level: usize,
        }

        let mut work = vec![Frame {
            records,
            path: Vec::new(),
            level: 0,
        }];

        let mut thumbnails: Vec<Record> = Vec::new();

        while let Some(frame) = work.pop() {
            if frame.level == hierarchy.len() {
                // Leaf level: attach records sorted by display text
                let mut leaves: Vec<(String, Record)> = frame
                    .records
                    .into_iter()
                    .map(|record| (self.leaf_text(&record), record))
                    .collect();
                leaves.sort_by(|a, b| a.0.cmp(&b.0));

                let parent = node_at_path_mut(&mut self.root, &frame.path);
                for (text, record) in leaves {
                    if record.image.is_some() {
                        thumbnails.push(record.clone());
                    }
                    parent.children.push(Node::leaf(text, record));
                }
                continue;
            }

            // Exact-match grouping by the level's field; BTreeMap keys give
            // the sorted-by-display-string child order for free.
            let field = &hierarchy[frame.level];
            let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
            for record in frame.records {
                groups
                    .entry(record.field_display(field))
                    .or_default()
                    .push(record);
            }

            let parent_path = frame.path;
            let parent = node_at_path_mut(&mut self.root, &parent_path);
            for (value, subset) in groups {
                parent.children.push(Node::group(value));
                let mut child_path = parent_path.clone();
                child_path.push(parent.children.len() - 1);
                work.push(Frame {
                    records: subset,
                    path: child_path,
                    level: frame.level + 1,
                });
            }
        }

        for record in thumbnails {
            self.request_thumbnail(&record);
        }
    }

    /// Splice new records into the existing tree, creating only the missing
    /// intermediate and leaf nodes. Existing nodes are never recreated.
    fn insert_incremental(&mut self, added: Vec<Record>) {
        let hierarchy = self
            .params
            .as_ref()
            .map(|p| p.hierarchy.clone())
            .unwrap_or_default();

        for record in added {
            let mut path: Vec<usize> = Vec::new();
            for field in &hierarchy {
                let value = record.field_display(field);
                let parent = node_at_path_mut(&mut self.root, &path);
                let index = match parent
                    .children
                    .iter()
                    .position(|c| matches!(&c.key, NodeKey::Group(v) if *v == value))
                {
                    Some(index) => index,
                    None => {
                        // New sibling at its sorted position; neighbors keep
                        // their identity, only their indices shift.
                        let index = parent
                            .children
                            .partition_point(|c| c.text.as_str() < value.as_str());
                        parent.children.insert(index, Node::group(value));
                        index
                    }
                };
                path.push(index);
            }

            let text = self.leaf_text(&record);
            let parent = node_at_path_mut(&mut self.root, &path);
            let index = parent
                .children
                .partition_point(|c| c.text.as_str() < text.as_str());
            if record.image.is_some() {
                self.request_thumbnail(&record);
            }
            let parent = node_at_path_mut(&mut self.root, &path);
            parent.children.insert(index, Node::leaf(text, record));
        }
    }

    /// Leaf display text: the publish name, qualified by its task whenever
    /// another task published under the same name and type.
    fn leaf_text(&self, record: &Record) -> String {
        let name = record.field_display("name");
        let unique = self.task_unique.get(&record.id).copied().unwrap_or(true);
        if unique {
            name
        } else {
            format!("{} ({})", name, record.field_display("task"))
        }
    }

    // ------------------------------------------------------------------
    // Thumbnails
    // ------------------------------------------------------------------

    fn request_thumbnail(&mut self, record: &Record) {
        let Some(url) = &record.image else { return };
        let id = self.queue.enqueue_thumbnail(ThumbnailSpec {
            url: url.clone(),
            entity_type: record.entity_type.clone(),
            entity_id: record.id,
        });
        self.pending_thumbs.insert(id.as_str(), record.id);
    }

    /// After a cache load icons start out empty; ask for every referenced
    /// thumbnail again (the disk cache absorbs the repeats).
    fn request_missing_thumbnails(&mut self) {
        let mut wanted: Vec<Record> = Vec::new();
        let mut stack: Vec<&Node> = self.root.children.iter().collect();
        while let Some(node) = stack.pop() {
            if let Some(record) = &node.record {
                if record.image.is_some() && node.icon.is_none() {
                    wanted.push(record.clone());
                }
            }
            stack.extend(node.children.iter());
        }
        for record in wanted {
            self.request_thumbnail(&record);
        }
    }

    fn apply_thumbnail(&mut self, request_id: &str, path: PathBuf) {
        let Some(record_id) = self.pending_thumbs.remove(request_id) else {
            debug!(request_id = %request_id, "Ignoring thumbnail for unknown request");
            return;
        };
        match self.root.find_leaf_mut(record_id) {
            Some(node) => {
                node.icon = Some(path);
                self.emit(ModelEvent::IconUpdated { record_id });
            }
            None => {
                // Node removed between request and completion; drop silently
                debug!(record_id = record_id, "Thumbnail arrived for a removed node");
            }
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn cache_file_path(&self, params: &QueryParams) -> PathBuf {
        tree_cache::cache_file_path(
            &self.cache_root,
            &self.site_host,
            &params.entity_type,
            params.filters.as_deref(),
            &params.hierarchy,
        )
    }

    /// Best-effort serialization after a successful sync. Write failures
    /// are logged and swallowed; caching never blocks the model.
    fn persist(&self) {
        let Some(params) = &self.params else { return };
        if params.filters.is_none() {
            // A synthesized empty tree has no useful cold-start value.
            return;
        }
        let path = self.cache_file_path(params);
        if let Err(e) = tree_cache::save(&self.root, &path) {
            warn!(path = %path.display(), error = %e, "Failed to write tree cache");
        }
    }

    fn emit(&self, event: ModelEvent) {
        self.event_bus.emit(PanelEvent::Model(event)).ok();
    }
}

/// Field-by-field comparison excluding volatile fields.
fn records_equal_ignoring_volatile(a: &Record, b: &Record) -> bool {
    if a.id != b.id
        || a.entity_type != b.entity_type
        || a.name != b.name
        || a.version != b.version
        || a.publish_type != b.publish_type
        || a.task != b.task
    {
        return false;
    }
    let keys: HashSet<&String> = a.extra.keys().chain(b.extra.keys()).collect();
    keys.into_iter()
        .filter(|k| !VOLATILE_FIELDS.contains(&k.as_str()))
        .all(|k| a.extra.get(k) == b.extra.get(k))
}
