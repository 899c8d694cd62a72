//! # fs2trigger
//!
//! Creates one geotrigger per feature of an ArcGIS feature service layer.
//!
//! ## Usage
//!
//! ```bash
//! fs2trigger -i <client id> -s <client secret> -u <layer url> -t <tag> [action...]
//! ```
//!
//! At least one action is required: `--callback-url`,
//! `--notification-template` or `--tracking-profile`.
//!
//! ## Examples
//!
//! ```bash
//! # 100 m fences around every stop, posting to a webhook
//! fs2trigger -i $ID -s $SECRET -u $LAYER -t stops -b 100 \
//!     --callback-url https://example.com/hooks/arrive
//!
//! # Reuse OBJECTIDs as trigger ids and notify on exit
//! fs2trigger -i $ID -s $SECRET -u $LAYER -t parks -t "park:{{OBJECTID}}" \
//!     -d exit --use-feature-ids --notification-template "Leaving {{NAME}}"
//!
//! # Private layer, endpoints from a config file, JSON progress
//! fs2trigger --config ./fs2trigger.toml --authenticate --progress json ...
//! ```
//!
//! The summary line (`N features, S successes, E errors`) is the only output
//! on stdout. Progress and diagnostics go to stderr; set `RUST_LOG` for
//! internal tracing.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use featureservice_triggers::config::{self, Config, ImportOptions, DEFAULT_CONCURRENCY};
use featureservice_triggers::import::run_http_import;
use featureservice_triggers::models::{Direction, TrackingProfile};
use featureservice_triggers::report::{ImportReporter, ReportMode};

/// Bulk-create geotriggers from the features of an ArcGIS feature service.
#[derive(Parser, Debug)]
#[command(
    name = "fs2trigger",
    version,
    about = "Bulk-create geotriggers from the features of an ArcGIS feature service",
    long_about = "Reads every feature of a feature service layer and creates one trigger per \
    feature: points become circular fences, polygons become polygon fences, multipolygons \
    become one trigger per part. Attributes can be interpolated into tags and notification \
    text with {{FIELD}}."
)]
struct Cli {
    /// Application client id.
    #[arg(short = 'i', long)]
    client_id: String,

    /// Application client secret.
    #[arg(short = 's', long)]
    client_secret: String,

    /// Tag to apply to every trigger; may contain `{{FIELD}}`. Repeatable.
    #[arg(short = 't', long = "tag", required = true)]
    tags: Vec<String>,

    /// Feature service layer URL.
    #[arg(short = 'u', long)]
    service_url: String,

    /// Radius in meters of the fence around point features.
    #[arg(short = 'b', long, default_value_t = config::DEFAULT_BUFFER)]
    buffer: f64,

    /// Fire when a device enters or exits the fence.
    #[arg(short = 'd', long, value_enum, default_value_t = Direction::Enter)]
    direction: Direction,

    /// Send the application token to the feature service too.
    #[arg(long)]
    authenticate: bool,

    /// Maximum number of trigger creation calls in flight.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// URL to call when the trigger fires.
    #[arg(long)]
    callback_url: Option<String>,

    /// Notification text; may contain `{{FIELD}}`.
    #[arg(long)]
    notification_template: Option<String>,

    /// Tracking profile to switch devices to when the trigger fires.
    #[arg(long, value_enum)]
    tracking_profile: Option<TrackingProfile>,

    /// Use each feature's object id as the trigger id.
    #[arg(long)]
    use_feature_ids: bool,

    /// TOML file with endpoint and HTTP settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Progress output on stderr. Defaults to human on a TTY, off otherwise.
    #[arg(long, value_enum)]
    progress: Option<ReportMode>,
}

impl Cli {
    fn options(&self) -> ImportOptions {
        ImportOptions {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            service_url: self.service_url.clone(),
            tags: self.tags.clone(),
            buffer: self.buffer,
            direction: self.direction,
            authenticate: self.authenticate,
            concurrency: self.concurrency,
            callback_url: self.callback_url.clone(),
            notification_template: self.notification_template.clone(),
            tracking_profile: self.tracking_profile,
            use_feature_ids: self.use_feature_ids,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::from(1);
        }
        Err(e) => e.exit(),
    };

    let options = cli.options();
    if let Err(e) = options.validate() {
        eprintln!("Error! {}", e);
        eprintln!("Run with --help for usage.");
        return ExitCode::from(1);
    }

    let cfg = match &cli.config {
        Some(path) => match config::load_config(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error! {:#}", e);
                return ExitCode::from(1);
            }
        },
        None => Config::default(),
    };

    let reporter: Arc<dyn ImportReporter> = cli
        .progress
        .unwrap_or_else(ReportMode::default_for_tty)
        .reporter()
        .into();

    match run_http_import(&options, &cfg, reporter).await {
        Ok(summary) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(error = ?e, "import aborted");
            eprintln!("Error! {}", e);
            ExitCode::from(1)
        }
    }
}
