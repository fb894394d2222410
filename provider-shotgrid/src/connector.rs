//! ShotGrid REST API connector implementation
//!
//! Implements the `TrackingSite` trait against the ShotGrid REST API v1.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::site::{
    EntityRef, Filter, Record, SortDirection, SortSpec, TrackingSite,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::ShotgridError;
use crate::types::{ApiEntity, RelatedEntity, SearchRequestBody, SearchResponse};

/// Attribute fields lifted into the typed `Record` rather than the side-map.
const NAME_FIELDS: [&str; 2] = ["code", "name"];
const VERSION_FIELD: &str = "version_number";
const IMAGE_FIELD: &str = "image";

/// Relationship fields lifted into the typed `Record`.
const TYPE_FIELD: &str = "published_file_type";
const TASK_FIELD: &str = "task";

/// ShotGrid REST API connector
///
/// One connector per site instance; it holds the session token handed over
/// by the embedding application (authentication itself is out of scope).
///
/// # Example
///
/// ```ignore
/// use provider_shotgrid::ShotgridConnector;
/// use bridge_traits::site::TrackingSite;
///
/// let site = ShotgridConnector::new(http_client, "https://studio.shotgrid.example", token);
/// let records = site.find("PublishedFile", Some(&filters), &fields, &order).await?;
/// ```
pub struct ShotgridConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Site base URL, e.g. `https://studio.shotgrid.example`
    base_url: String,

    /// Session token with read access
    access_token: String,
}

impl ShotgridConnector {
    /// Create a new connector
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http_client,
            base_url,
            access_token: access_token.into(),
        }
    }

    /// Wire form of a filter list: `[["field", "op", value], ...]`
    fn encode_filters(filters: &[Filter]) -> Vec<Value> {
        filters
            .iter()
            .map(|f| {
                Value::Array(vec![
                    Value::String(f.field.clone()),
                    Value::String(f.op.as_str().to_string()),
                    f.value.clone(),
                ])
            })
            .collect()
    }

    /// Comma-separated sort expression, `-` prefix for descending
    fn encode_sort(order: &[SortSpec]) -> Option<String> {
        if order.is_empty() {
            return None;
        }
        Some(
            order
                .iter()
                .map(|s| match s.direction {
                    SortDirection::Ascending => s.field.clone(),
                    SortDirection::Descending => format!("-{}", s.field),
                })
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    fn related_to_ref(related: RelatedEntity) -> EntityRef {
        EntityRef {
            kind: related.kind,
            id: related.id,
            name: related.name,
        }
    }

    /// Convert an API entity into the engine's typed record.
    ///
    /// Well-known fields are lifted out; every other attribute and
    /// relationship lands untouched in the `extra` side-map.
    fn convert_entity(entity: ApiEntity) -> Record {
        let mut record = Record::new(entity.kind.clone(), entity.id);

        record.publish_type = entity.relationship(TYPE_FIELD).map(Self::related_to_ref);
        record.task = entity.relationship(TASK_FIELD).map(Self::related_to_ref);

        for (field, value) in &entity.attributes {
            if NAME_FIELDS.contains(&field.as_str()) {
                if record.name.is_none() {
                    record.name = value.as_str().map(str::to_string);
                }
            } else if field == VERSION_FIELD {
                record.version = value.as_i64();
            } else if field == IMAGE_FIELD {
                record.image = value.as_str().map(str::to_string);
            } else {
                record.extra.insert(field.clone(), value.clone());
            }
        }

        for (field, value) in &entity.relationships {
            if field == TYPE_FIELD || field == TASK_FIELD {
                continue;
            }
            let data = value.get("data").cloned().unwrap_or(Value::Null);
            record.extra.insert(field.clone(), data);
        }

        record
    }
}

#[async_trait]
impl TrackingSite for ShotgridConnector {
    fn host(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self, filters, fields, order), fields(entity_type = %entity_type))]
    async fn find(
        &self,
        entity_type: &str,
        filters: Option<&[Filter]>,
        fields: &[String],
        order: &[SortSpec],
    ) -> Result<Vec<Record>> {
        // Null filters mean "fetch nothing": resolve locally, no round-trip.
        let Some(filters) = filters else {
            debug!("Null filter set, returning empty result without a query");
            return Ok(Vec::new());
        };

        let body = SearchRequestBody {
            filters: Self::encode_filters(filters),
            fields: fields.to_vec(),
            sort: Self::encode_sort(order),
        };

        let url = format!("{}/api/v1/entity/{}/_search", self.base_url, entity_type);
        let request = HttpRequest::new(HttpMethod::Post, url)
            .bearer_token(&self.access_token)
            .header("Accept", "application/json")
            .json(&body)?;

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(ShotgridError::ApiError {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            }
            .into());
        }

        let search: SearchResponse = serde_json::from_slice(&response.body).map_err(|e| {
            ShotgridError::ParseError(format!("Failed to parse search response: {}", e))
        })?;

        let records: Vec<Record> = search
            .data
            .into_iter()
            .map(Self::convert_entity)
            .collect();

        info!(count = records.len(), "Search completed");
        Ok(records)
    }
}
