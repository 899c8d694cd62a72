//! Error taxonomy for an import run.
//!
//! Every variant except [`ImportError::TriggerCreation`] is fatal: it aborts
//! the run before the summary is printed and the binary exits with status 1.
//! Trigger creation failures are recorded per item and the run continues.

use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Invalid command-line options, detected before any network call.
    #[error("{0}")]
    Configuration(String),

    /// The client-credentials token exchange failed.
    #[error("could not authenticate: {0}")]
    Authentication(String),

    /// The feature service metadata call failed or returned an API error.
    #[error("could not get metadata for {url}: {message}")]
    MetadataFetch { url: String, message: String },

    /// The feature service holds geometries that cannot become triggers.
    #[error("cannot import feature services that contain {0} geometries")]
    UnsupportedGeometry(String),

    /// A page query failed. Pagination has no partial-failure tolerance.
    #[error("could not fetch features after cursor {cursor}: {message}")]
    PageFetch { cursor: i64, message: String },

    /// A single trigger could not be created.
    #[error("{0}")]
    TriggerCreation(String),

    /// A submission worker or the aggregator stopped before the run drained.
    #[error("submission pipeline stopped unexpectedly: {0}")]
    Pipeline(String),
}

/// Human-readable text for the `error` member of a service response.
///
/// Handles both `{"code": 498, "message": "..."}` objects and OAuth-style
/// plain strings (with an optional sibling `error_description`).
pub(crate) fn describe_api_error(error: &Value, description: Option<&Value>) -> String {
    match error {
        Value::String(code) => match description.and_then(Value::as_str) {
            Some(text) => format!("{}: {}", code, text),
            None => code.clone(),
        },
        Value::Object(map) => {
            let message = map
                .get("message")
                .or_else(|| map.get("error_description"))
                .and_then(Value::as_str);
            let code = map.get("code").filter(|c| !c.is_null());
            match (code, message) {
                (Some(code), Some(message)) => format!("{} (code {})", message, code),
                (None, Some(message)) => message.to_string(),
                _ => error.to_string(),
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_name_the_failing_resource() {
        let err = ImportError::MetadataFetch {
            url: "https://example.com/FeatureServer/0".into(),
            message: "HTTP 500".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not get metadata for https://example.com/FeatureServer/0: HTTP 500"
        );
    }

    #[test]
    fn describes_service_and_oauth_errors() {
        assert_eq!(
            describe_api_error(&json!({"code": 498, "message": "Invalid token."}), None),
            "Invalid token. (code 498)"
        );
        assert_eq!(
            describe_api_error(
                &json!("invalid_client"),
                Some(&json!("Invalid client_id"))
            ),
            "invalid_client: Invalid client_id"
        );
        assert_eq!(describe_api_error(&json!({"details": []}), None), "{\"details\":[]}");
    }
}
