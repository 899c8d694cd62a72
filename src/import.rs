//! Import pipeline orchestration.
//!
//! Coordinates one run: metadata check → pagination → geometry dispatch →
//! request building → bounded submission → summary.
//!
//! ```text
//! Paginator ──feature──▶ GeometryDispatcher ──descriptor──▶ ParameterBuilder
//!                                                               │ request
//!                                                               ▼
//!              ResultAggregator ◀──outcome── SubmissionQueue (N workers)
//! ```
//!
//! Any fatal error returns immediately without waiting for submissions that
//! are still in flight. The summary is produced only after pagination has
//! finished and the queue has drained.

use std::sync::Arc;

use crate::aggregator::{ResultAggregator, RunSummary};
use crate::auth;
use crate::config::{Config, ImportOptions};
use crate::error::{ImportError, Result};
use crate::feature_service::HttpFeatureSource;
use crate::geometry::{classify, FeatureGeometry, GeometryDispatcher};
use crate::models::{QueuedRequest, SubmissionOutcome};
use crate::params::ParameterBuilder;
use crate::paginator::Paginator;
use crate::queue::SubmissionQueue;
use crate::report::{ImportEvent, ImportReporter};
use crate::traits::{FeatureSource, TriggerApi};
use crate::trigger_api::HttpTriggerApi;

/// Run an import against the real services described by `config`.
///
/// Options are validated before any network call. A single application
/// token is acquired and used for the trigger API, and for the feature
/// service too when `options.authenticate` is set.
pub async fn run_http_import(
    options: &ImportOptions,
    config: &Config,
    reporter: Arc<dyn ImportReporter>,
) -> Result<RunSummary> {
    options.validate()?;

    let client = config
        .http
        .client()
        .map_err(|e| ImportError::Configuration(format!("{:#}", e)))?;

    let token = auth::fetch_token(
        &client,
        &config.endpoints.token_url,
        &options.client_id,
        &options.client_secret,
    )
    .await?;

    let source = HttpFeatureSource::new(
        client.clone(),
        options.service_base(),
        options.authenticate.then(|| token.clone()),
    );
    let api = HttpTriggerApi::new(client, &config.endpoints.trigger_api_url, token);

    run_import(options, Arc::new(source), Arc::new(api), reporter).await
}

/// Run an import between any feature source and trigger API.
pub async fn run_import(
    options: &ImportOptions,
    source: Arc<dyn FeatureSource>,
    api: Arc<dyn TriggerApi>,
    reporter: Arc<dyn ImportReporter>,
) -> Result<RunSummary> {
    options.validate()?;
    let builder = ParameterBuilder::new(options)?;

    let metadata = source.metadata().await?;
    metadata.ensure_supported()?;
    tracing::info!(
        url = source.url(),
        geometry_type = ?metadata.geometry_type,
        id_field = %metadata.object_id_field,
        "read service metadata"
    );
    reporter.report(&ImportEvent::Metadata {
        url: source.url().to_string(),
        geometry_type: metadata.geometry_type.clone(),
    });

    let mut dispatcher = GeometryDispatcher::new(options.buffer);
    let aggregator = ResultAggregator::spawn(reporter.clone());
    let skipped = aggregator.sender();
    let mut queue = SubmissionQueue::start(options.concurrency, api, aggregator.sender());

    let id_field = metadata.object_id_field;
    let paginator = Paginator::new(source, id_field.clone(), reporter);

    let stats = paginator
        .run(|feature| {
            let feature_id = feature.identifier(&id_field);
            let label = feature_id.clone().unwrap_or_else(|| "<none>".to_string());
            let geometry = classify(feature.geometry.as_ref());

            if let FeatureGeometry::Unsupported(reason) = geometry {
                dispatcher.dispatch(geometry);
                let outcome = SubmissionOutcome {
                    feature_id: label,
                    result: Err(ImportError::TriggerCreation(format!(
                        "feature has no usable geometry ({})",
                        reason
                    ))),
                };
                return skipped
                    .send(outcome)
                    .map_err(|_| ImportError::Pipeline("aggregator has stopped".to_string()));
            }

            for descriptor in dispatcher.dispatch(geometry) {
                let request = builder.build(descriptor, &feature.attributes, feature_id.as_deref());
                queue.enqueue(QueuedRequest {
                    feature_id: label.clone(),
                    request,
                })?;
            }
            Ok(())
        })
        .await?;

    drop(skipped);
    let enqueued = queue.drain().await?;
    let summary = aggregator.finish().await?;

    let expected = dispatcher.tally().expected_outcomes();
    if summary.total_processed != expected {
        tracing::warn!(
            expected,
            recorded = summary.total_processed,
            "recorded outcomes do not match dispatched items"
        );
    }
    tracing::info!(
        pages = stats.pages,
        features = stats.features,
        enqueued,
        "import finished"
    );

    Ok(summary)
}
