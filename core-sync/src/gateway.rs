//! # Remote Gateway
//!
//! Executes exactly one remote operation per request: a find against the
//! tracking site, or a thumbnail resolution (cache-first, then download).
//! Stateless and synchronous from the worker loop's point of view; only the
//! single worker task ever calls [`RemoteGateway::execute`].

use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::http::HttpClient;
use bridge_traits::site::{Record, TrackingSite};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::request::{Request, RequestKind};
use crate::thumbnail_cache::ThumbnailCache;

/// Typed result of one executed request.
#[derive(Debug)]
pub enum Outcome {
    /// Records returned by a find
    Find(Vec<Record>),
    /// Local cache path of a resolved thumbnail
    Thumbnail(PathBuf),
}

/// Executes requests against the remote service.
pub struct RemoteGateway {
    site: Arc<dyn TrackingSite>,
    http: Arc<dyn HttpClient>,
    thumbnails: Arc<ThumbnailCache>,
}

impl RemoteGateway {
    pub fn new(
        site: Arc<dyn TrackingSite>,
        http: Arc<dyn HttpClient>,
        thumbnails: Arc<ThumbnailCache>,
    ) -> Self {
        Self {
            site,
            http,
            thumbnails,
        }
    }

    /// Hostname of the site this gateway talks to.
    pub fn site_host(&self) -> &str {
        self.site.host()
    }

    /// Perform one blocking remote operation.
    ///
    /// Any error is returned to the worker loop, which converts it into a
    /// failure event; nothing here retries.
    #[instrument(skip(self, request), fields(request_id = %request.id))]
    pub async fn execute(&self, request: &Request) -> Result<Outcome> {
        match &request.kind {
            RequestKind::Find(spec) => {
                // "No query" sentinel resolves locally, whatever the site
                // implementation would do with it.
                if spec.filters.is_none() {
                    debug!("Null filter set, synthesizing empty result");
                    return Ok(Outcome::Find(Vec::new()));
                }
                let records = self
                    .site
                    .find(
                        &spec.entity_type,
                        spec.filters.as_deref(),
                        &spec.fields,
                        &spec.order,
                    )
                    .await?;
                debug!(count = records.len(), "Find request returned");
                Ok(Outcome::Find(records))
            }
            RequestKind::Thumbnail(spec) => {
                if let Some(path) = self.thumbnails.lookup(&spec.entity_type, spec.entity_id).await
                {
                    debug!(path = %path.display(), "Thumbnail cache hit");
                    return Ok(Outcome::Thumbnail(path));
                }

                let data = self.http.download(&spec.url).await?;
                let path = self
                    .thumbnails
                    .store(&spec.entity_type, spec.entity_id, data)
                    .await?;
                Ok(Outcome::Thumbnail(path))
            }
        }
    }
}
