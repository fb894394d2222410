//! # Tree Cache
//!
//! Binary on-disk serialization of a materialized tree, used to populate a
//! model instantly on cold start before the first live refresh lands.
//!
//! ## Format
//!
//! ```text
//! [magic: 4 bytes "PBTC"][version: u32 LE]
//! then per node, depth-first pre-order:
//! [payload_len: u32 LE][payload: JSON][depth: u32 LE]
//! ```
//!
//! The payload holds only the node text and record snapshot; icons are not
//! persisted (thumbnails are re-requested after a load), and parent/child
//! edges are reconstructed purely from the depth sequence. The file is only
//! trusted when magic and version match exactly and depths never jump by
//! more than one level; anything else is [`SyncError::CacheCorruption`] and
//! the caller falls back to a cold load.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use bridge_traits::site::{Filter, Record};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::node::{node_at_path_mut, Node};

/// File magic for tree cache files
pub const CACHE_MAGIC: [u8; 4] = *b"PBTC";

/// Current format version; bump on any incompatible payload change
pub const CACHE_VERSION: u32 = 1;

/// Persisted per-node payload
#[derive(Debug, Serialize, Deserialize)]
struct CachedNode {
    text: String,
    record: Option<Record>,
}

impl CachedNode {
    fn from_node(node: &Node) -> Self {
        Self {
            text: node.text.clone(),
            record: node.record.clone(),
        }
    }

    fn into_node(self) -> Node {
        match self.record {
            Some(record) => Node::leaf(self.text, record),
            None => Node::group(self.text),
        }
    }
}

/// Deterministic cache file path for one query identity.
///
/// Hashes {site host, entity type, filters, hierarchy} so distinct queries
/// never collide on a cache file.
pub fn cache_file_path(
    cache_root: &Path,
    site_host: &str,
    entity_type: &str,
    filters: Option<&[Filter]>,
    hierarchy: &[String],
) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(site_host.as_bytes());
    hasher.update([0]);
    hasher.update(entity_type.as_bytes());
    hasher.update([0]);
    // Filters serialize deterministically: a Vec keeps its order
    let filter_json =
        serde_json::to_string(&filters).unwrap_or_else(|_| "unserializable".to_string());
    hasher.update(filter_json.as_bytes());
    hasher.update([0]);
    for field in hierarchy {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    cache_root.join(format!("tree_{}.bin", &hex[..32]))
}

/// Serialize `root`'s descendants to `path`.
///
/// Written to a temp sibling first so a crash mid-write never leaves a
/// half-formed cache file for the next load to trip over.
pub fn save(root: &Node, path: &Path) -> Result<()> {
    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(&CACHE_MAGIC);
    buf.extend_from_slice(&CACHE_VERSION.to_le_bytes());

    // Depth-first pre-order with an explicit stack
    let mut stack: Vec<(&Node, u32)> = root.children.iter().rev().map(|c| (c, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        let payload = serde_json::to_vec(&CachedNode::from_node(node))
            .map_err(|e| SyncError::CacheWrite(format!("node payload: {}", e)))?;
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&payload);
        buf.extend_from_slice(&depth.to_le_bytes());
        for child in node.children.iter().rev() {
            stack.push((child, depth + 1));
        }
    }

    let parent = path
        .parent()
        .ok_or_else(|| SyncError::CacheWrite("cache path has no parent".to_string()))?;
    std::fs::create_dir_all(parent)?;
    let tmp = path.with_extension("bin.tmp");
    std::fs::write(&tmp, &buf)?;
    std::fs::rename(&tmp, path)?;

    debug!(path = %path.display(), bytes = buf.len(), "Saved tree cache");
    Ok(())
}

/// Load a tree from `path`, reconstructing edges from the depth sequence.
pub fn load(path: &Path) -> Result<Node> {
    let data = std::fs::read(path)?;

    if data.len() < 8 {
        return Err(SyncError::CacheCorruption("file shorter than header".to_string()));
    }
    if data[0..4] != CACHE_MAGIC {
        return Err(SyncError::CacheCorruption("bad magic number".to_string()));
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != CACHE_VERSION {
        return Err(SyncError::CacheCorruption(format!(
            "unsupported version {} (expected {})",
            version, CACHE_VERSION
        )));
    }

    let mut root = Node::root();
    // Index path from root to the most recently inserted node
    let mut path_stack: Vec<usize> = Vec::new();
    let mut prev_depth: Option<u32> = None;
    let mut cursor = 8usize;

    while cursor < data.len() {
        let (payload, depth, next) = read_frame(&data, cursor)?;
        cursor = next;

        let cached: CachedNode = serde_json::from_slice(payload)
            .map_err(|e| SyncError::CacheCorruption(format!("node payload: {}", e)))?;

        match prev_depth {
            None => {
                if depth != 0 {
                    return Err(SyncError::CacheCorruption(format!(
                        "first node at depth {}",
                        depth
                    )));
                }
            }
            Some(prev) => {
                // Descend at most one level at a time; siblings and walks
                // back up are any depth <= prev.
                if depth > prev + 1 {
                    return Err(SyncError::CacheCorruption(format!(
                        "depth jump from {} to {}",
                        prev, depth
                    )));
                }
            }
        }

        path_stack.truncate(depth as usize);
        let parent = node_at_path_mut(&mut root, &path_stack);
        parent.children.push(cached.into_node());
        path_stack.push(parent.children.len() - 1);
        prev_depth = Some(depth);
    }

    debug!(path = %path.display(), leaves = root.leaf_count(), "Loaded tree cache");
    Ok(root)
}

/// Read one `[len][payload][depth]` frame starting at `cursor`.
fn read_frame(data: &[u8], cursor: usize) -> Result<(&[u8], u32, usize)> {
    let truncated = || SyncError::CacheCorruption("truncated node frame".to_string());

    let len_end = cursor.checked_add(4).ok_or_else(truncated)?;
    if len_end > data.len() {
        return Err(truncated());
    }
    let len = u32::from_le_bytes([
        data[cursor],
        data[cursor + 1],
        data[cursor + 2],
        data[cursor + 3],
    ]) as usize;

    let payload_end = len_end.checked_add(len).ok_or_else(truncated)?;
    let depth_end = payload_end.checked_add(4).ok_or_else(truncated)?;
    if depth_end > data.len() {
        return Err(truncated());
    }

    let payload = &data[len_end..payload_end];
    let depth = u32::from_le_bytes([
        data[payload_end],
        data[payload_end + 1],
        data[payload_end + 2],
        data[payload_end + 3],
    ]);
    Ok((payload, depth, depth_end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::site::Record;
    use uuid::Uuid;

    fn test_path() -> PathBuf {
        std::env::temp_dir().join(format!("tree-cache-test-{}.bin", Uuid::new_v4().simple()))
    }

    fn sample_record(id: i64, name: &str) -> Record {
        let mut record = Record::new("PublishedFile", id);
        record.name = Some(name.to_string());
        record
    }

    fn sample_tree() -> Node {
        let mut root = Node::root();
        let mut anim = Node::group("Animation");
        anim.children.push(Node::leaf("walk", sample_record(1, "walk")));
        anim.children.push(Node::leaf("run", sample_record(2, "run")));
        let mut rig = Node::group("Rig");
        let mut hero = Node::group("hero");
        hero.children.push(Node::leaf("hero_rig", sample_record(3, "hero_rig")));
        rig.children.push(hero);
        root.children.push(anim);
        root.children.push(rig);
        root
    }

    /// Compare trees by text/record/structure, ignoring icons.
    fn assert_same_shape(a: &Node, b: &Node) {
        assert_eq!(a.text, b.text);
        assert_eq!(a.record, b.record);
        assert_eq!(a.key, b.key);
        assert_eq!(a.children.len(), b.children.len());
        for (ca, cb) in a.children.iter().zip(b.children.iter()) {
            assert_same_shape(ca, cb);
        }
    }

    #[test]
    fn test_round_trip() {
        let path = test_path();
        let tree = sample_tree();

        save(&tree, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_same_shape(&tree, &loaded);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bad_magic_rejected() {
        let path = test_path();
        save(&sample_tree(), &path).unwrap();

        let mut data = std::fs::read(&path).unwrap();
        data[0] = b'X';
        std::fs::write(&path, &data).unwrap();

        assert!(matches!(load(&path), Err(SyncError::CacheCorruption(_))));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_wrong_version_rejected() {
        let path = test_path();
        save(&sample_tree(), &path).unwrap();

        let mut data = std::fs::read(&path).unwrap();
        data[4..8].copy_from_slice(&(CACHE_VERSION + 1).to_le_bytes());
        std::fs::write(&path, &data).unwrap();

        assert!(matches!(load(&path), Err(SyncError::CacheCorruption(_))));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_depth_jump_rejected() {
        let path = test_path();

        // Hand-craft a file whose second node jumps two levels deep
        let mut buf = Vec::new();
        buf.extend_from_slice(&CACHE_MAGIC);
        buf.extend_from_slice(&CACHE_VERSION.to_le_bytes());
        for (text, depth) in [("a", 0u32), ("b", 2u32)] {
            let payload =
                serde_json::to_vec(&CachedNode { text: text.to_string(), record: None }).unwrap();
            buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            buf.extend_from_slice(&payload);
            buf.extend_from_slice(&depth.to_le_bytes());
        }
        std::fs::write(&path, &buf).unwrap();

        assert!(matches!(load(&path), Err(SyncError::CacheCorruption(_))));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let path = test_path();
        save(&sample_tree(), &path).unwrap();

        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 2]).unwrap();

        assert!(matches!(load(&path), Err(SyncError::CacheCorruption(_))));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_empty_tree_round_trips() {
        let path = test_path();
        save(&Node::root(), &path).unwrap();
        let loaded = load(&path).unwrap();
        assert!(loaded.children.is_empty());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_cache_file_identity() {
        let root = Path::new("/cache");
        let hierarchy = vec!["type".to_string()];
        let filters = vec![bridge_traits::site::Filter::new(
            "project",
            bridge_traits::site::FilterOp::Is,
            serde_json::json!(64),
        )];

        let a = cache_file_path(root, "https://a.example", "PublishedFile", Some(&filters), &hierarchy);
        let same = cache_file_path(root, "https://a.example", "PublishedFile", Some(&filters), &hierarchy);
        let other_host = cache_file_path(root, "https://b.example", "PublishedFile", Some(&filters), &hierarchy);
        let no_filters = cache_file_path(root, "https://a.example", "PublishedFile", None, &hierarchy);

        assert_eq!(a, same);
        assert_ne!(a, other_host);
        assert_ne!(a, no_filters);
    }
}
