//! OAuth2 client-credentials token exchange.
//!
//! One application token is acquired before the run starts. It authorizes
//! every trigger API call and, in authenticated mode, every feature service
//! call too.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::error::{describe_api_error, ImportError, Result};

/// A short-lived bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    error_description: Option<Value>,
}

/// Exchange client credentials for an access token.
///
/// # Errors
///
/// Returns [`ImportError::Authentication`] when the request fails, the
/// endpoint reports an error, or the response carries no token.
pub async fn fetch_token(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<AccessToken> {
    let resp = client
        .post(token_url)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
            ("f", "json"),
        ])
        .send()
        .await
        .map_err(|e| {
            ImportError::Authentication(format!("token request to {} failed: {}", token_url, e))
        })?;

    let status = resp.status();
    let body: TokenResponse = resp.json().await.map_err(|e| {
        ImportError::Authentication(format!(
            "unreadable token response (HTTP {}): {}",
            status, e
        ))
    })?;

    if let Some(error) = &body.error {
        return Err(ImportError::Authentication(describe_api_error(
            error,
            body.error_description.as_ref(),
        )));
    }
    if !status.is_success() {
        return Err(ImportError::Authentication(format!(
            "token endpoint returned HTTP {}",
            status
        )));
    }

    match body.access_token.filter(|t| !t.is_empty()) {
        Some(token) => {
            tracing::debug!(expires_in = ?body.expires_in, "acquired access token");
            Ok(AccessToken(token))
        }
        None => Err(ImportError::Authentication(
            "token response did not include an access_token".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_the_token() {
        let token = AccessToken::new("s3cr3t");
        assert_eq!(format!("{:?}", token), "AccessToken(<redacted>)");
        assert_eq!(token.as_str(), "s3cr3t");
    }

    #[test]
    fn token_response_parses_both_shapes() {
        let ok: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":7200}"#).unwrap();
        assert_eq!(ok.access_token.as_deref(), Some("abc"));
        assert!(ok.error.is_none());

        let err: TokenResponse = serde_json::from_str(
            r#"{"error":{"code":400,"error":"invalid_client","message":"Invalid client_id"}}"#,
        )
        .unwrap();
        assert!(err.access_token.is_none());
        assert_eq!(
            describe_api_error(err.error.as_ref().unwrap(), None),
            "Invalid client_id (code 400)"
        );
    }
}
