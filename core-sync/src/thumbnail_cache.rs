//! # Thumbnail Cache
//!
//! Content-addressed on-disk store for entity thumbnails, keyed by
//! (entity type, entity id).
//!
//! ## Overview
//!
//! The cache is consulted before any network fetch. Layout on disk:
//!
//! ```text
//! {cache_root}/thumbnails/{entity_type}/{digit-split id}/{id}.jpg
//! ```
//!
//! where large ids are zero-padded to a multiple of three digits and split
//! into three-digit directory segments, keeping directory fan-out bounded.
//!
//! Writes are atomic: bytes are validated as a decodable image, written to a
//! temp sibling, then renamed into place. A failed download or decode leaves
//! no cache entry behind. A small LRU index keeps recently resolved paths in
//! memory to skip filesystem stats on hot entries.

use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// On-disk thumbnail store with an in-memory path index.
pub struct ThumbnailCache {
    /// `{cache_root}/thumbnails`
    root: PathBuf,
    /// Recently resolved (entity_type, entity_id) -> path
    index: Mutex<LruCache<(String, i64), PathBuf>>,
}

impl ThumbnailCache {
    /// Create a cache rooted under `cache_root`.
    ///
    /// Directories are created lazily on first store.
    pub fn new(cache_root: &Path, index_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(index_entries.max(1)).expect("capacity is at least one");
        Self {
            root: cache_root.join("thumbnails"),
            index: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Final on-disk path for an entity's thumbnail.
    pub fn entry_path(&self, entity_type: &str, entity_id: i64) -> PathBuf {
        self.root
            .join(entity_type)
            .join(digit_split(entity_id))
            .join(format!("{}.jpg", entity_id))
    }

    /// Look up a cached thumbnail, returning its path on a hit.
    pub async fn lookup(&self, entity_type: &str, entity_id: i64) -> Option<PathBuf> {
        let key = (entity_type.to_string(), entity_id);
        {
            let mut index = self.index.lock().await;
            if let Some(path) = index.get(&key) {
                return Some(path.clone());
            }
        }

        let path = self.entry_path(entity_type, entity_id);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                let mut index = self.index.lock().await;
                index.put(key, path.clone());
                Some(path)
            }
            _ => None,
        }
    }

    /// Store downloaded thumbnail bytes and return the cache path.
    ///
    /// The bytes must be a decodable image; partial or corrupt downloads are
    /// rejected before anything touches the final location.
    pub async fn store(&self, entity_type: &str, entity_id: i64, data: Bytes) -> Result<PathBuf> {
        if detect_image_format(&data).is_none() {
            return Err(SyncError::InvalidThumbnail(format!(
                "unrecognized image header for {} {}",
                entity_type, entity_id
            )));
        }
        image::load_from_memory(&data).map_err(|e| {
            SyncError::InvalidThumbnail(format!(
                "undecodable image for {} {}: {}",
                entity_type, entity_id, e
            ))
        })?;

        let path = self.entry_path(entity_type, entity_id);
        let parent = path
            .parent()
            .ok_or_else(|| SyncError::CacheWrite("thumbnail path has no parent".to_string()))?;
        tokio::fs::create_dir_all(parent).await?;

        // Temp sibling on the same filesystem so the rename is atomic.
        let tmp = parent.join(format!("{}.{}.tmp", entity_id, Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, &data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) =
                tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).await
            {
                warn!(path = %path.display(), error = %e, "Failed to set thumbnail permissions");
            }
        }

        debug!(
            entity_type = entity_type,
            entity_id = entity_id,
            path = %path.display(),
            bytes = data.len(),
            "Cached thumbnail"
        );

        let mut index = self.index.lock().await;
        index.put((entity_type.to_string(), entity_id), path.clone());
        Ok(path)
    }
}

/// Zero-pad an id to a multiple of three digits and split it into
/// three-digit directory segments: `1234` -> `001/234`.
fn digit_split(entity_id: i64) -> PathBuf {
    let digits = entity_id.unsigned_abs().to_string();
    let width = digits.len().div_ceil(3) * 3;
    let padded = format!("{:0>width$}", digits, width = width);

    let mut path = PathBuf::new();
    for chunk in padded.as_bytes().chunks(3) {
        // chunks of ASCII digits are always valid UTF-8
        path.push(std::str::from_utf8(chunk).expect("ascii digits"));
    }
    path
}

/// Detects the image format from the leading magic bytes.
fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.len() < 12 {
        return None;
    }

    match &data[0..4] {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, _] => Some("jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47] => Some("png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38] => Some("gif"),
        // WEBP: RIFF....WEBP
        [0x52, 0x49, 0x46, 0x46] if &data[8..12] == b"WEBP" => Some("webp"),
        // BMP: 42 4D
        [0x42, 0x4D, _, _] => Some("bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    fn test_root() -> PathBuf {
        std::env::temp_dir().join(format!("thumb-cache-test-{}", Uuid::new_v4().simple()))
    }

    fn test_jpeg() -> Bytes {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            8,
            image::Rgb([200, 40, 40]),
        ));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
            .unwrap();
        Bytes::from(buffer)
    }

    #[test]
    fn test_digit_split() {
        assert_eq!(digit_split(7), PathBuf::from("007"));
        assert_eq!(digit_split(123), PathBuf::from("123"));
        assert_eq!(digit_split(1234), PathBuf::from("001/234"));
        assert_eq!(digit_split(1234567), PathBuf::from("001/234/567"));
    }

    #[test]
    fn test_entry_path_layout() {
        let cache = ThumbnailCache::new(Path::new("/cache"), 8);
        assert_eq!(
            cache.entry_path("PublishedFile", 1234),
            PathBuf::from("/cache/thumbnails/PublishedFile/001/234/1234.jpg")
        );
    }

    #[test]
    fn test_detect_image_format() {
        assert_eq!(detect_image_format(&test_jpeg()), Some("jpeg"));
        assert_eq!(detect_image_format(b"definitely not an image"), None);
        assert_eq!(detect_image_format(b"short"), None);
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let root = test_root();
        let cache = ThumbnailCache::new(&root, 8);

        assert!(cache.lookup("PublishedFile", 42).await.is_none());

        let path = cache
            .store("PublishedFile", 42, test_jpeg())
            .await
            .unwrap();
        assert!(path.ends_with("thumbnails/PublishedFile/042/42.jpg"));
        assert!(path.is_file());

        assert_eq!(cache.lookup("PublishedFile", 42).await, Some(path));

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_rejects_corrupt_bytes() {
        let root = test_root();
        let cache = ThumbnailCache::new(&root, 8);

        let result = cache
            .store("PublishedFile", 7, Bytes::from_static(b"<html>not found</html>"))
            .await;
        assert!(matches!(result, Err(SyncError::InvalidThumbnail(_))));

        // Rejection must not leave a cache entry behind
        assert!(cache.lookup("PublishedFile", 7).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_survives_index_eviction() {
        let root = test_root();
        let cache = ThumbnailCache::new(&root, 1);

        cache.store("PublishedFile", 1, test_jpeg()).await.unwrap();
        cache.store("PublishedFile", 2, test_jpeg()).await.unwrap();

        // Entry 1 was evicted from the LRU index but still resolves via disk
        assert!(cache.lookup("PublishedFile", 1).await.is_some());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
