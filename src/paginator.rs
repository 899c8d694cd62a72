//! Cursor-based pagination over a [`FeatureSource`].
//!
//! Pages are requested with `"<idField> > <cursor>"`, starting from cursor 0.
//! While the service reports that more pages remain, the next cursor is the
//! largest identifier on the current page. The next query is spawned before
//! the current page's features are handed downstream, so fetching overlaps
//! with request building. Queries themselves are strictly sequential.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::error::{ImportError, Result};
use crate::feature_service::{FeaturePage, PageQuery};
use crate::models::SourceFeature;
use crate::report::{ImportEvent, ImportReporter};
use crate::traits::FeatureSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationStats {
    pub pages: u64,
    pub features: u64,
}

pub struct Paginator {
    source: Arc<dyn FeatureSource>,
    id_field: String,
    reporter: Arc<dyn ImportReporter>,
}

impl Paginator {
    pub fn new(
        source: Arc<dyn FeatureSource>,
        id_field: impl Into<String>,
        reporter: Arc<dyn ImportReporter>,
    ) -> Self {
        Self {
            source,
            id_field: id_field.into(),
            reporter,
        }
    }

    /// Fetch every page and pass each feature to `emit`, in page order.
    ///
    /// Stops at the first page error or the first error returned by `emit`.
    pub async fn run<F>(&self, mut emit: F) -> Result<PaginationStats>
    where
        F: FnMut(SourceFeature) -> Result<()>,
    {
        let mut stats = PaginationStats::default();
        let mut cursor = 0i64;
        let mut pending = Some(self.spawn_query(cursor));

        while let Some(handle) = pending.take() {
            let page = handle.await.map_err(|e| ImportError::PageFetch {
                cursor,
                message: format!("query task failed: {}", e),
            })??;
            stats.pages += 1;
            tracing::debug!(
                page = stats.pages,
                cursor,
                features = page.features.len(),
                more = page.exceeded_transfer_limit,
                "fetched page"
            );
            self.reporter.report(&ImportEvent::Page {
                number: stats.pages,
                features: page.features.len(),
                cursor,
            });

            if page.exceeded_transfer_limit {
                let next = page
                    .max_identifier(&self.id_field)
                    .filter(|&next| next > cursor)
                    .ok_or_else(|| ImportError::PageFetch {
                        cursor,
                        message: format!(
                            "more pages were reported but no {} above the cursor was returned",
                            self.id_field
                        ),
                    })?;
                cursor = next;
                pending = Some(self.spawn_query(cursor));
            }

            for feature in page.features {
                stats.features += 1;
                if let Err(e) = emit(feature) {
                    if let Some(handle) = pending.take() {
                        handle.abort();
                    }
                    return Err(e);
                }
            }
        }

        Ok(stats)
    }

    fn spawn_query(&self, cursor: i64) -> JoinHandle<Result<FeaturePage>> {
        let source = self.source.clone();
        let query = PageQuery {
            id_field: self.id_field.clone(),
            cursor,
        };
        tracing::trace!(where_clause = %query.where_clause(), "querying features");
        tokio::spawn(async move { source.query_page(&query).await })
    }
}
