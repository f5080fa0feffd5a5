//! Client for the class service's status endpoint.
//!
//! The coordinator only needs to know *when* to flip a class's status:
//! `live` after the host's primary media join succeeds, `completed` when
//! the host explicitly ends the class. The endpoint itself is opaque.

use serde::Serialize;

use crate::error::LiveError;

/// Class status transitions driven by the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    Live,
    Completed,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: ClassStatus,
}

/// Class service client.
#[derive(Clone)]
pub struct ClassStatusClient {
    base_url: String,
    http: reqwest::Client,
}

impl ClassStatusClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// `POST /classes/{class_id}/status`.
    pub async fn update(&self, class_id: &str, status: ClassStatus) -> Result<(), LiveError> {
        let url = format!("{}/classes/{}/status", self.base_url, class_id);
        tracing::debug!(%url, ?status, "updating class status");

        let resp = self
            .http
            .post(&url)
            .json(&StatusBody { status })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(?e, %class_id, "class status update failed");
                LiveError::ClassService("failed to reach class service".to_string())
            })?;

        if !resp.status().is_success() {
            return Err(LiveError::ClassService(format!(
                "class service returned {}",
                resp.status()
            )));
        }

        Ok(())
    }

    pub async fn set_live(&self, class_id: &str) -> Result<(), LiveError> {
        self.update(class_id, ClassStatus::Live).await
    }

    pub async fn set_completed(&self, class_id: &str) -> Result<(), LiveError> {
        self.update(class_id, ClassStatus::Completed).await
    }
}
