//! Trigger API client.
//!
//! Creates triggers with `POST <base>/trigger/create`, authorized by the
//! application token. The API reports failures either with a non-2xx status
//! or with an `{"error": {...}}` body, both of which become
//! [`ImportError::TriggerCreation`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AccessToken;
use crate::error::{describe_api_error, ImportError, Result};
use crate::models::{CreatedTrigger, TriggerRequest};
use crate::traits::TriggerApi;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    #[serde(default)]
    trigger_id: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    error: Option<Value>,
}

/// [`TriggerApi`] over HTTP.
pub struct HttpTriggerApi {
    client: reqwest::Client,
    create_url: String,
    token: AccessToken,
}

impl HttpTriggerApi {
    pub fn new(client: reqwest::Client, base_url: &str, token: AccessToken) -> Self {
        Self {
            client,
            create_url: format!("{}/trigger/create", base_url.trim_end_matches('/')),
            token,
        }
    }
}

#[async_trait]
impl TriggerApi for HttpTriggerApi {
    async fn create(&self, request: &TriggerRequest) -> Result<CreatedTrigger> {
        let resp = self
            .client
            .post(&self.create_url)
            .bearer_auth(self.token.as_str())
            .json(request)
            .send()
            .await
            .map_err(|e| ImportError::TriggerCreation(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ImportError::TriggerCreation(e.to_string()))?;

        let body: Option<CreateResponse> = serde_json::from_str(&text).ok();
        if let Some(error) = body.as_ref().and_then(|b| b.error.as_ref()) {
            return Err(ImportError::TriggerCreation(describe_api_error(error, None)));
        }
        if !status.is_success() {
            return Err(ImportError::TriggerCreation(format!(
                "HTTP {}: {}",
                status,
                text.chars().take(500).collect::<String>()
            )));
        }

        match body {
            Some(CreateResponse {
                trigger_id: Some(trigger_id),
                tags,
                ..
            }) => Ok(CreatedTrigger { trigger_id, tags }),
            _ => Err(ImportError::TriggerCreation(format!(
                "unexpected response: {}",
                text.chars().take(500).collect::<String>()
            ))),
        }
    }
}
