//! Client for the token service that issues per-channel credentials.

use serde::Deserialize;

use crate::error::LiveError;

/// Opaque single-purpose credentials for one `(channel, participant)` pair.
///
/// Fetched at session entry for the primary channel and again, lazily, for
/// the auxiliary channel. Tokens are assumed valid for the session's
/// duration; there is no renewal.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub media_token: String,
    pub signaling_token: String,
}

/// Token service client.
#[derive(Clone)]
pub struct TokenClient {
    base_url: String,
    http: reqwest::Client,
}

impl TokenClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// `GET /tokens/{channel_id}/{participant_id}`.
    pub async fn fetch(
        &self,
        channel_id: &str,
        participant_id: &str,
    ) -> Result<Credentials, LiveError> {
        let url = format!("{}/tokens/{}/{}", self.base_url, channel_id, participant_id);
        tracing::debug!(%url, "fetching channel credentials");

        let resp = self.http.get(&url).send().await.map_err(|e| {
            tracing::error!(?e, %channel_id, "token fetch failed");
            LiveError::TokenService("failed to reach token service".to_string())
        })?;

        if !resp.status().is_success() {
            return Err(LiveError::TokenService(format!(
                "token service returned {}",
                resp.status()
            )));
        }

        resp.json().await.map_err(|e| {
            tracing::error!(?e, %channel_id, "token response parse failed");
            LiveError::TokenService("invalid token service response".to_string())
        })
    }
}
