//! # featureservice-triggers
//!
//! Bulk-creates geotriggers from the features of an ArcGIS feature service
//! layer.
//!
//! Every feature becomes one trigger: points become circular fences of a
//! configurable radius, polygons become polygon fences, and multipolygons
//! become one trigger per part. Attributes are copied into the trigger's
//! properties and may be interpolated into tags and notification text.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ FeatureService │──▶│  Paginator   │──▶│ Geometry +     │
//! │ metadata/query │   │ cursor pages │   │ ParameterBuild │
//! └────────────────┘   └──────────────┘   └───────┬────────┘
//!                                                 │ requests
//!                                                 ▼
//!                      ┌──────────────┐   ┌────────────────┐
//!                      │  Aggregator  │◀──│ SubmissionQueue│──▶ trigger API
//!                      │  RunSummary  │   │  N workers     │
//!                      └──────────────┘   └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! fs2trigger -i $CLIENT_ID -s $CLIENT_SECRET \
//!     -u https://services.arcgis.com/.../FeatureServer/0 \
//!     -t parks -t "park:{{OBJECTID}}" \
//!     --notification-template "Welcome to {{NAME}}"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and run options |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Feature and trigger payload types |
//! | [`auth`] | Application token acquisition |
//! | [`feature_service`] | Feature service metadata and page queries |
//! | [`trigger_api`] | Trigger creation client |
//! | [`geometry`] | Geometry classification and dispatch |
//! | [`template`] | `{{field}}` attribute templates |
//! | [`params`] | Trigger request construction |
//! | [`paginator`] | Cursor-based pagination |
//! | [`queue`] | Bounded-concurrency submission |
//! | [`aggregator`] | Outcome accounting |
//! | [`report`] | Progress reporting |
//! | [`import`] | Pipeline orchestration |
//! | [`traits`] | Feature source and trigger API seams |

pub mod aggregator;
pub mod auth;
pub mod config;
pub mod error;
pub mod feature_service;
pub mod geometry;
pub mod import;
pub mod models;
pub mod paginator;
pub mod params;
pub mod queue;
pub mod report;
pub mod template;
pub mod traits;
pub mod trigger_api;
