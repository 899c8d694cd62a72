//! Core data models used throughout the import pipeline.
//!
//! These types represent the features read from the feature service and the
//! trigger payloads and outcomes that flow through submission.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Spatial reference every query requests and every polygon is tagged with.
pub const WGS84_WKID: u32 = 4326;

/// One coordinate tuple as the feature service sends it (`[x, y]`, possibly
/// with trailing z/m values).
pub type Position = Vec<f64>;

/// A closed ring of positions.
pub type Ring = Vec<Position>;

/// Raw record from the feature service before classification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceFeature {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<RawGeometry>,
}

/// Geometry blob exactly as the service returns it. Which fields are present
/// decides the kind; see [`crate::geometry::classify`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGeometry {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub rings: Option<Vec<Ring>>,
    #[serde(default)]
    pub paths: Option<Vec<Vec<Position>>>,
    #[serde(default)]
    pub points: Option<Vec<Position>>,
}

impl SourceFeature {
    /// The feature's identifier rendered as text, the way it is used for
    /// trigger ids and log lines.
    pub fn identifier(&self, id_field: &str) -> Option<String> {
        match self.attributes.get(id_field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(match n.as_f64() {
                Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                    (f as i64).to_string()
                }
                _ => n.to_string(),
            }),
            other => Some(other.to_string()),
        }
    }

    /// The identifier as a pagination cursor value.
    ///
    /// Accepts integers, integral floats, and numeric strings.
    pub fn numeric_identifier(&self, id_field: &str) -> Option<i64> {
        match self.attributes.get(id_field)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Flat geometric input for exactly one trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryDescriptor {
    Point {
        longitude: f64,
        latitude: f64,
        distance: f64,
    },
    Polygon {
        rings: Vec<Ring>,
        /// Part index when the polygon came from a multipolygon.
        part: Option<usize>,
    },
}

/// Which crossing fires the trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Enter,
    Exit,
}

/// Device location-sampling mode applied when a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrackingProfile {
    Off,
    Rough,
    Adaptive,
    Fine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

/// Polygon boundary in the feature service's own JSON representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EsriPolygon {
    pub rings: Vec<Ring>,
    pub spatial_reference: SpatialReference,
}

/// Geographic half of a trigger condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Geo {
    Circle {
        latitude: f64,
        longitude: f64,
        distance: f64,
    },
    Polygon {
        esrijson: EsriPolygon,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerCondition {
    pub direction: Direction,
    pub geo: Geo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub text: String,
}

/// What happens when the trigger fires. Only configured fields are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_profile: Option<TrackingProfile>,
}

/// Body of one `trigger/create` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub condition: TriggerCondition,
    pub action: TriggerAction,
    pub set_tags: Vec<String>,
    pub properties: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,
}

/// A request together with the feature it was built from, for reporting.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub feature_id: String,
    pub request: TriggerRequest,
}

/// What the trigger API returns for a created trigger.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTrigger {
    pub trigger_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Result of one remote creation call.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub feature_id: String,
    pub result: crate::error::Result<CreatedTrigger>,
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
