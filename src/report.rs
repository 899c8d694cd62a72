//! Import progress reporting.
//!
//! Reports what the import is doing so an operator can follow a long run:
//! metadata lookup, each fetched page, and every created or failed trigger.
//! Events go to **stderr** so stdout stays reserved for the final summary
//! line.

use clap::ValueEnum;
use std::io::Write;

use crate::aggregator::RunSummary;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ImportEvent {
    /// Service metadata was read.
    Metadata {
        url: String,
        geometry_type: Option<String>,
    },
    /// A page of features arrived.
    Page {
        number: u64,
        features: usize,
        cursor: i64,
    },
    /// A trigger was created.
    Created {
        feature_id: String,
        trigger_id: String,
        tags: Vec<String>,
    },
    /// A trigger could not be created.
    Failed { feature_id: String, error: String },
    /// Every outcome has been recorded.
    Finished { summary: RunSummary },
}

/// Receives progress events. Implementations write to stderr (human or JSON).
pub trait ImportReporter: Send + Sync {
    fn report(&self, event: &ImportEvent);
}

/// Human-friendly progress on stderr.
pub struct StderrReporter;

impl ImportReporter for StderrReporter {
    fn report(&self, event: &ImportEvent) {
        let line = match event {
            ImportEvent::Metadata { url, .. } => format!("Success! Got metadata for {}\n", url),
            ImportEvent::Page {
                number, features, ..
            } => format!(
                "Requested page {}  {} features\n",
                number,
                format_number(*features as u64)
            ),
            ImportEvent::Created {
                feature_id,
                trigger_id,
                tags,
            } => format!(
                "Success! Trigger tagged {:?} with id {} created from feature with id {}\n",
                tags, trigger_id, feature_id
            ),
            ImportEvent::Failed { feature_id, error } => format!(
                "Error! Could not create trigger from feature with id {}: {}\n",
                feature_id, error
            ),
            // The summary line itself is printed on stdout by the caller.
            ImportEvent::Finished { .. } => return,
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonReporter;

impl ImportReporter for JsonReporter {
    fn report(&self, event: &ImportEvent) {
        let obj = match event {
            ImportEvent::Metadata { url, geometry_type } => serde_json::json!({
                "event": "metadata",
                "url": url,
                "geometry_type": geometry_type,
            }),
            ImportEvent::Page {
                number,
                features,
                cursor,
            } => serde_json::json!({
                "event": "page",
                "n": number,
                "features": features,
                "cursor": cursor,
            }),
            ImportEvent::Created {
                feature_id,
                trigger_id,
                tags,
            } => serde_json::json!({
                "event": "created",
                "feature_id": feature_id,
                "trigger_id": trigger_id,
                "tags": tags,
            }),
            ImportEvent::Failed { feature_id, error } => serde_json::json!({
                "event": "failed",
                "feature_id": feature_id,
                "error": error,
            }),
            ImportEvent::Finished { summary } => serde_json::json!({
                "event": "summary",
                "total": summary.total_processed,
                "successes": summary.success_count,
                "errors": summary.error_count,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoReporter;

impl ImportReporter for NoReporter {
    fn report(&self, _event: &ImportEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ReportMode {
    Off,
    Human,
    Json,
}

impl ReportMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ReportMode::Human
        } else {
            ReportMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ImportReporter> {
        match self {
            ReportMode::Off => Box::new(NoReporter),
            ReportMode::Human => Box::new(StderrReporter),
            ReportMode::Json => Box::new(JsonReporter),
        }
    }
}
