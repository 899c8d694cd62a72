//! Bounded-concurrency trigger submission.
//!
//! A fixed pool of workers pulls [`QueuedRequest`]s from one shared channel.
//! Each worker performs a single creation call at a time, so at most
//! `concurrency` calls are ever in flight. Every outcome, success or failure,
//! is sent to the aggregator; failures are never retried.
//!
//! ```text
//!            enqueue()                 ┌─ worker 0 ─┐
//! producer ───────────▶ [ channel ] ──┼─ worker 1 ─┼──▶ aggregator
//!                                      └─ worker N ─┘
//! ```

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::aggregator::OutcomeSender;
use crate::error::{ImportError, Result};
use crate::models::{QueuedRequest, SubmissionOutcome};
use crate::traits::TriggerApi;

type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<QueuedRequest>>>;

pub struct SubmissionQueue {
    tx: mpsc::UnboundedSender<QueuedRequest>,
    workers: Vec<JoinHandle<()>>,
    enqueued: u64,
}

impl SubmissionQueue {
    /// Spawn `concurrency` workers submitting to `api`.
    pub fn start(concurrency: usize, api: Arc<dyn TriggerApi>, outcomes: OutcomeSender) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let rx: SharedReceiver = Arc::new(Mutex::new(rx));

        let workers = (0..concurrency.max(1))
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    rx.clone(),
                    api.clone(),
                    outcomes.clone(),
                ))
            })
            .collect();

        Self {
            tx,
            workers,
            enqueued: 0,
        }
    }

    /// Admit a request for eventual submission. Never waits.
    pub fn enqueue(&mut self, request: QueuedRequest) -> Result<()> {
        self.tx
            .send(request)
            .map_err(|_| ImportError::Pipeline("all submission workers have stopped".to_string()))?;
        self.enqueued += 1;
        Ok(())
    }

    /// Close the queue and wait until nothing is queued or in flight.
    ///
    /// Returns the total number of requests that were enqueued.
    pub async fn drain(self) -> Result<u64> {
        let Self {
            tx,
            workers,
            enqueued,
        } = self;
        drop(tx);

        for handle in workers {
            handle
                .await
                .map_err(|e| ImportError::Pipeline(format!("submission worker failed: {}", e)))?;
        }
        tracing::debug!(enqueued, "submission queue drained");
        Ok(enqueued)
    }
}

async fn worker(
    id: usize,
    rx: SharedReceiver,
    api: Arc<dyn TriggerApi>,
    outcomes: OutcomeSender,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(queued) = next else {
            break;
        };

        let result = api.create(&queued.request).await;
        let outcome = SubmissionOutcome {
            feature_id: queued.feature_id,
            result,
        };
        if outcomes.send(outcome).is_err() {
            tracing::warn!(worker = id, "aggregator stopped; dropping outcome");
            break;
        }
    }
    tracing::trace!(worker = id, "submission worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ResultAggregator;
    use crate::models::{
        CreatedTrigger, Direction, Geo, TriggerAction, TriggerCondition, TriggerRequest,
    };
    use crate::report::NoReporter;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Trigger API that tracks concurrency and fails ids in `fail`.
    #[derive(Default)]
    struct CountingApi {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: StdMutex<HashMap<String, usize>>,
        fail: Vec<String>,
    }

    #[async_trait]
    impl TriggerApi for CountingApi {
        async fn create(&self, request: &TriggerRequest) -> crate::error::Result<CreatedTrigger> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let id = request.trigger_id.clone().unwrap_or_default();
            *self.calls.lock().unwrap().entry(id.clone()).or_default() += 1;
            if self.fail.contains(&id) {
                return Err(ImportError::TriggerCreation(format!("{} rejected", id)));
            }
            Ok(CreatedTrigger {
                trigger_id: id,
                tags: request.set_tags.clone(),
            })
        }
    }

    fn queued(id: usize) -> QueuedRequest {
        QueuedRequest {
            feature_id: id.to_string(),
            request: TriggerRequest {
                condition: TriggerCondition {
                    direction: Direction::Enter,
                    geo: Geo::Circle {
                        latitude: 0.0,
                        longitude: 0.0,
                        distance: 250.0,
                    },
                },
                action: TriggerAction {
                    callback_url: Some("https://example.com".into()),
                    ..Default::default()
                },
                set_tags: vec!["t".into()],
                properties: Map::new(),
                trigger_id: Some(id.to_string()),
            },
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_concurrency_and_submits_each_once() {
        let api = Arc::new(CountingApi::default());
        let aggregator = ResultAggregator::spawn(Arc::new(NoReporter));
        let mut queue = SubmissionQueue::start(3, api.clone(), aggregator.sender());

        for i in 0..40 {
            queue.enqueue(queued(i)).unwrap();
        }
        assert_eq!(queue.drain().await.unwrap(), 40);
        let summary = aggregator.finish().await.unwrap();

        assert!(api.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert!(api.max_in_flight.load(Ordering::SeqCst) >= 1);
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.len(), 40);
        assert!(calls.values().all(|&n| n == 1));
        assert_eq!(summary.success_count, 40);
    }

    #[tokio::test]
    async fn failures_are_counted_and_do_not_stop_others() {
        let api = Arc::new(CountingApi {
            fail: vec!["2".into(), "5".into()],
            ..Default::default()
        });
        let aggregator = ResultAggregator::spawn(Arc::new(NoReporter));
        let mut queue = SubmissionQueue::start(2, api.clone(), aggregator.sender());

        for i in 0..8 {
            queue.enqueue(queued(i)).unwrap();
        }
        queue.drain().await.unwrap();
        let summary = aggregator.finish().await.unwrap();

        assert_eq!(summary.total_processed, 8);
        assert_eq!(summary.error_count, 2);
        assert_eq!(summary.success_count, 6);
        assert_eq!(api.calls.lock().unwrap().len(), 8, "no retries");
    }

    #[tokio::test]
    async fn draining_an_empty_queue_makes_no_calls() {
        let api = Arc::new(CountingApi::default());
        let aggregator = ResultAggregator::spawn(Arc::new(NoReporter));
        let queue = SubmissionQueue::start(25, api.clone(), aggregator.sender());

        assert_eq!(queue.drain().await.unwrap(), 0);
        let summary = aggregator.finish().await.unwrap();
        assert_eq!(summary.to_string(), "0 features, 0 successes, 0 errors");
        assert!(api.calls.lock().unwrap().is_empty());
    }
}
