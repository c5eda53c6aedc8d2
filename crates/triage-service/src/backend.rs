//! Complaint backend client
//!
//! The backend owns complaint records. The listener reads the complaint text
//! and writes back a status change and the classification metadata.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use triage_core::{Error, Result};

/// Classification payload attached to a complaint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationUpdate {
    /// JSON document serialized to a string, stored verbatim by the backend
    pub ai_metadata: String,
    pub urgency_score: u8,
}

/// Access to complaint records
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Fetch the complaint text; `None` when the complaint is missing or has no text
    async fn fetch_text(&self, id: &str) -> Result<Option<String>>;

    /// Move the complaint to a new workflow status
    async fn update_status(&self, id: &str, status: &str) -> Result<()>;

    /// Attach classification metadata and the urgency score
    async fn attach_classification(&self, id: &str, update: &ClassificationUpdate) -> Result<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComplaintRecord {
    #[serde(default)]
    complaint_text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdate<'a> {
    new_status: &'a str,
}

/// REST client for the complaint backend
///
/// Complaint URLs are formed by appending the ID to the base URL, so the base
/// normally ends with a slash (`https://backend/api/complaints/`).
#[derive(Debug, Clone)]
pub struct HttpComplaintStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpComplaintStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(Error::config("backend URL must not be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::backend(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    fn complaint_url(&self, id: &str) -> String {
        format!("{}{}", self.base_url, id)
    }

    async fn patch<T: Serialize + Sync>(&self, url: String, body: &T) -> Result<()> {
        let response = self
            .client
            .patch(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::backend(format!("PATCH {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::backend(format!("PATCH {} returned {}: {}", url, status, text)));
        }

        Ok(())
    }
}

#[async_trait]
impl ComplaintStore for HttpComplaintStore {
    async fn fetch_text(&self, id: &str) -> Result<Option<String>> {
        let url = self.complaint_url(id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::backend(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(complaint_id = %id, %status, "Complaint fetch did not succeed");
            return Ok(None);
        }

        let record: ComplaintRecord = response
            .json()
            .await
            .map_err(|e| Error::backend(format!("Invalid complaint record from {}: {}", url, e)))?;

        let text = record.complaint_text.filter(|t| !t.trim().is_empty());
        debug!(complaint_id = %id, has_text = text.is_some(), "Fetched complaint");
        Ok(text)
    }

    async fn update_status(&self, id: &str, status: &str) -> Result<()> {
        let url = format!("{}/status", self.complaint_url(id));
        self.patch(url, &StatusUpdate { new_status: status }).await
    }

    async fn attach_classification(&self, id: &str, update: &ClassificationUpdate) -> Result<()> {
        self.patch(self.complaint_url(id), update).await
    }
}
