//! Seams between the pipeline and the two remote services.
//!
//! The pipeline only talks to a [`FeatureSource`] and a [`TriggerApi`].
//! The HTTP implementations live in [`crate::feature_service`] and
//! [`crate::trigger_api`]; tests plug in in-memory ones.
//!
//! ```text
//! ┌───────────────┐    pages    ┌──────────┐  requests  ┌────────────┐
//! │ FeatureSource │───────────▶│ pipeline │──────────▶│ TriggerApi │
//! └───────────────┘            └──────────┘           └────────────┘
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::feature_service::{FeaturePage, PageQuery, ServiceMetadata};
use crate::models::{CreatedTrigger, TriggerRequest};

/// A paginated store of features.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Where the features come from, for diagnostics.
    fn url(&self) -> &str;

    /// Describe the service: geometry type and identifier field.
    ///
    /// Errors are [`crate::error::ImportError::MetadataFetch`].
    async fn metadata(&self) -> Result<ServiceMetadata>;

    /// Fetch the features whose identifier is greater than the query cursor.
    ///
    /// Errors are [`crate::error::ImportError::PageFetch`].
    async fn query_page(&self, query: &PageQuery) -> Result<FeaturePage>;
}

/// The remote API that stores triggers.
#[async_trait]
pub trait TriggerApi: Send + Sync {
    /// Create one trigger.
    ///
    /// Errors are [`crate::error::ImportError::TriggerCreation`].
    async fn create(&self, request: &TriggerRequest) -> Result<CreatedTrigger>;
}
