//! # Latest-Publish Reduction
//!
//! Collapses a raw publish result set into one entry per
//! (name, type, task) group, flagging name collisions across tasks and
//! accumulating per-type counts for filter checkboxes.
//!
//! Pure and stateless: the same input always yields the same output, and
//! reducing an already-reduced set is a no-op.

use bridge_traits::site::Record;
use std::collections::HashMap;

/// Group key: (name, type id, task id). Records with no type or no task
/// group under `None` for that component.
type GroupKey = (String, Option<i64>, Option<i64>);

/// One surviving publish with its ambiguity flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedPublish {
    /// Highest-version record of its (name, type, task) group
    pub record: Record,
    /// True when no other task produced a same-name, same-type publish, so
    /// the UI may omit the task qualifier; false means the task must be
    /// shown to disambiguate.
    pub task_unique: bool,
}

/// Result of a latest-publish reduction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LatestPublishes {
    /// Surviving records in first-seen group order
    pub records: Vec<ReducedPublish>,
    /// Count of surviving records per type id (`None` = untyped, rendered
    /// as "No Type"), for type-filter aggregate labels
    pub type_counts: HashMap<Option<i64>, u64>,
}

/// Reduce a flat publish result set to the latest version per group.
///
/// Two passes, O(n). The site returns records in ascending version order,
/// so retaining the last-seen record per group key yields the highest
/// version without an explicit max.
pub fn reduce_latest_publishes(records: &[Record]) -> LatestPublishes {
    // Pass 1: last-seen per (name, type, task), preserving first-seen order
    let mut order: Vec<GroupKey> = Vec::new();
    let mut survivors: HashMap<GroupKey, Record> = HashMap::new();
    for record in records {
        let key = group_key(record);
        if !survivors.contains_key(&key) {
            order.push(key.clone());
        }
        survivors.insert(key, record.clone());
    }

    // Pass 2: (name, type) occurrence counts among survivors, ignoring task
    let mut name_type_counts: HashMap<(&str, Option<i64>), u64> = HashMap::new();
    for (name, type_id, _) in &order {
        *name_type_counts.entry((name.as_str(), *type_id)).or_insert(0) += 1;
    }

    let mut type_counts: HashMap<Option<i64>, u64> = HashMap::new();
    let mut reduced = Vec::with_capacity(order.len());
    for key in &order {
        let (name, type_id, _) = key;
        let task_unique = name_type_counts[&(name.as_str(), *type_id)] == 1;
        *type_counts.entry(*type_id).or_insert(0) += 1;
        let record = survivors
            .remove(key)
            .expect("every ordered key has a survivor");
        reduced.push(ReducedPublish {
            record,
            task_unique,
        });
    }

    LatestPublishes {
        records: reduced,
        type_counts,
    }
}

fn group_key(record: &Record) -> GroupKey {
    (
        record.name.clone().unwrap_or_default(),
        record.publish_type.as_ref().map(|t| t.id),
        record.task.as_ref().map(|t| t.id),
    )
}
