//! Client for the Amun inspection API

use crate::sync::{Category, Document, DocumentId, DocumentSource, SourceError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Job states after which an inspection no longer changes
const TERMINAL_STATES: [&str; 3] = ["terminated", "succeeded", "failed"];

#[derive(Debug, Deserialize)]
struct InspectionListing {
    #[serde(default)]
    inspections: Vec<String>,
}

/// Thin JSON client over the inspection endpoints
#[derive(Debug, Clone)]
pub struct AmunClient {
    http: Client,
    base_url: Url,
}

impl AmunClient {
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        let parsed = Url::parse(base_url).map_err(|err| SourceError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl {
                url: base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("graph-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "v1", "inspect"]).extend(segments);
        }
        url
    }

    async fn get_json(&self, url: Url, id: Option<&DocumentId>) -> Result<Value, SourceError> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(SourceError::NotFound {
                    category: Category::Inspection,
                    id: id.clone(),
                });
            }
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Ids of every inspection the API knows about
    pub async fn list_inspections(&self) -> Result<Vec<DocumentId>, SourceError> {
        let body = self.get_json(self.endpoint(&[]), None).await?;
        let listing: InspectionListing = serde_json::from_value(body)?;
        Ok(listing.inspections.into_iter().map(DocumentId::from).collect())
    }

    pub async fn status(&self, id: &DocumentId) -> Result<Value, SourceError> {
        let body = self
            .get_json(self.endpoint(&[id.as_str(), "job", "status"]), Some(id))
            .await?;
        Ok(unwrap_field(body, "status"))
    }

    pub async fn specification(&self, id: &DocumentId) -> Result<Value, SourceError> {
        let body = self
            .get_json(self.endpoint(&[id.as_str(), "specification"]), Some(id))
            .await?;
        Ok(unwrap_field(body, "specification"))
    }

    pub async fn job_log(&self, id: &DocumentId) -> Result<Value, SourceError> {
        let body = self
            .get_json(self.endpoint(&[id.as_str(), "job", "log"]), Some(id))
            .await?;
        Ok(unwrap_field(body, "log"))
    }
}

/// Responses wrap their payload in a single named field
fn unwrap_field(mut body: Value, field: &str) -> Value {
    match body.get_mut(field) {
        Some(inner) => inner.take(),
        None => body,
    }
}

/// Whether a job status describes a finished inspection
pub fn is_finished(status: &Value) -> bool {
    if status.get("finished_at").is_some_and(|v| !v.is_null()) {
        return true;
    }
    status
        .get("state")
        .and_then(Value::as_str)
        .is_some_and(|state| TERMINAL_STATES.contains(&state))
}

/// Exposes finished inspections as documents of the inspection category
#[derive(Debug, Clone)]
pub struct AmunInspectionSource {
    client: AmunClient,
}

impl AmunInspectionSource {
    pub fn new(client: AmunClient) -> Self {
        Self { client }
    }

    fn ensure_inspection(category: Category, id: &DocumentId) -> Result<(), SourceError> {
        if category == Category::Inspection {
            Ok(())
        } else {
            Err(SourceError::NotFound {
                category,
                id: id.clone(),
            })
        }
    }
}

#[async_trait]
impl DocumentSource for AmunInspectionSource {
    async fn list_ids(&self, category: Category) -> Result<Vec<DocumentId>, SourceError> {
        if category != Category::Inspection {
            return Ok(Vec::new());
        }

        let mut finished = Vec::new();
        for id in self.client.list_inspections().await? {
            match self.client.status(&id).await {
                Ok(status) if is_finished(&status) => finished.push(id),
                Ok(_) => debug!(inspection_id = %id, "inspection still running"),
                // Removed between listing and status lookup
                Err(SourceError::NotFound { .. }) => {
                    debug!(inspection_id = %id, "inspection disappeared")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(finished)
    }

    async fn fetch(&self, category: Category, id: &DocumentId) -> Result<Document, SourceError> {
        Self::ensure_inspection(category, id)?;

        let status = self.client.status(id).await?;
        if !is_finished(&status) {
            let state = status
                .get("state")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(SourceError::NotReady {
                category,
                id: id.clone(),
                reason: format!("job state is {state}"),
            });
        }

        let specification = self.client.specification(id).await?;
        let job_log = self.client.job_log(id).await?;
        Ok(Document::new(
            category,
            id.clone(),
            json!({
                "inspection_id": id.as_str(),
                "status": status,
                "specification": specification,
                "job_log": job_log,
            }),
        ))
    }
}
