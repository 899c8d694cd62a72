//! Feature service client.
//!
//! Reads service metadata and pages of features over the feature service's
//! JSON REST interface.
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | metadata | `GET <url>?f=json` | `{geometryType, objectIdField, fields}` |
//! | page | `GET <url>/query?where=<id> > <cursor>&outSR=4326&outFields=*&f=json` | `{features, exceededTransferLimit}` |
//!
//! In authenticated mode every call also carries `token=<access token>`.
//! Both calls may answer HTTP 200 with an `{"error": {...}}` body, which is
//! treated as a failure.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AccessToken;
use crate::error::{describe_api_error, ImportError, Result};
use crate::models::{SourceFeature, WGS84_WKID};
use crate::traits::FeatureSource;

const POLYLINE: &str = "esriGeometryPolyline";
const OID_FIELD_TYPE: &str = "esriFieldTypeOID";

/// What the pipeline needs to know about a service before paging it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMetadata {
    pub geometry_type: Option<String>,
    pub object_id_field: String,
}

impl ServiceMetadata {
    /// Reject services whose geometries can never become triggers.
    pub fn ensure_supported(&self) -> Result<()> {
        match self.geometry_type.as_deref() {
            Some(POLYLINE) => Err(ImportError::UnsupportedGeometry("polyline".to_string())),
            _ => Ok(()),
        }
    }
}

/// One filtered page query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub id_field: String,
    pub cursor: i64,
}

impl PageQuery {
    pub fn where_clause(&self) -> String {
        format!("{} > {}", self.id_field, self.cursor)
    }
}

/// A page of features plus the "more pages remain" flag.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePage {
    #[serde(default)]
    pub features: Vec<SourceFeature>,
    #[serde(default)]
    pub exceeded_transfer_limit: bool,
}

impl FeaturePage {
    /// Largest identifier on the page; the cursor for the next query.
    pub fn max_identifier(&self, id_field: &str) -> Option<i64> {
        self.features
            .iter()
            .filter_map(|f| f.numeric_identifier(id_field))
            .max()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataResponse {
    #[serde(default)]
    geometry_type: Option<String>,
    #[serde(default)]
    object_id_field: Option<String>,
    #[serde(default)]
    fields: Vec<FieldInfo>,
    #[serde(default)]
    error: Option<Value>,
}

impl MetadataResponse {
    /// The declared `objectIdField`, or else the first field typed as an
    /// object id.
    fn id_field(&self) -> Option<String> {
        self.object_id_field
            .clone()
            .filter(|f| !f.is_empty())
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|f| f.field_type.as_deref() == Some(OID_FIELD_TYPE))
                    .map(|f| f.name.clone())
            })
    }
}

#[derive(Debug, Deserialize)]
struct FieldInfo {
    name: String,
    #[serde(default, rename = "type")]
    field_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(flatten)]
    page: FeaturePage,
    #[serde(default)]
    error: Option<Value>,
}

/// [`FeatureSource`] backed by a feature service layer URL.
pub struct HttpFeatureSource {
    client: reqwest::Client,
    url: String,
    token: Option<AccessToken>,
}

impl HttpFeatureSource {
    /// `token` is attached to every call when present.
    pub fn new(client: reqwest::Client, url: &str, token: Option<AccessToken>) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn with_token(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(token) = &self.token {
            params.push(("token", token.as_str().to_string()));
        }
        params
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: Vec<(&'static str, String)>,
    ) -> std::result::Result<T, String> {
        let resp = self
            .client
            .get(url)
            .query(&self.with_token(params))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            ));
        }
        resp.json::<T>().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl FeatureSource for HttpFeatureSource {
    fn url(&self) -> &str {
        &self.url
    }

    async fn metadata(&self) -> Result<ServiceMetadata> {
        let fail = |message: String| ImportError::MetadataFetch {
            url: self.url.clone(),
            message,
        };

        let body: MetadataResponse = self
            .get_json(&self.url, vec![("f", "json".to_string())])
            .await
            .map_err(fail)?;

        if let Some(error) = &body.error {
            return Err(fail(describe_api_error(error, None)));
        }

        let object_id_field = body
            .id_field()
            .ok_or_else(|| fail("service does not declare an object id field".to_string()))?;

        Ok(ServiceMetadata {
            geometry_type: body.geometry_type,
            object_id_field,
        })
    }

    async fn query_page(&self, query: &PageQuery) -> Result<FeaturePage> {
        let fail = |message: String| ImportError::PageFetch {
            cursor: query.cursor,
            message,
        };

        let url = format!("{}/query", self.url);
        let params = vec![
            ("where", query.where_clause()),
            ("outSR", WGS84_WKID.to_string()),
            ("outFields", "*".to_string()),
            ("f", "json".to_string()),
        ];

        let body: PageResponse = self.get_json(&url, params).await.map_err(fail)?;
        if let Some(error) = &body.error {
            return Err(fail(describe_api_error(error, None)));
        }
        Ok(body.page)
    }
}
