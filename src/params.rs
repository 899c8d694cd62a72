//! Trigger payload construction.
//!
//! [`ParameterBuilder`] holds everything about a trigger that is fixed for
//! the run (direction, action switches, parsed templates) and combines it
//! with one [`GeometryDescriptor`] and the owning feature's attributes to
//! produce a [`TriggerRequest`].

use serde_json::{Map, Value};

use crate::config::ImportOptions;
use crate::error::Result;
use crate::models::{
    Direction, EsriPolygon, Geo, GeometryDescriptor, Notification, SpatialReference,
    TrackingProfile, TriggerAction, TriggerCondition, TriggerRequest, WGS84_WKID,
};
use crate::template::Template;

#[derive(Debug, Clone)]
pub struct ParameterBuilder {
    direction: Direction,
    tags: Vec<Template>,
    callback_url: Option<String>,
    notification: Option<Template>,
    tracking_profile: Option<TrackingProfile>,
    use_feature_ids: bool,
}

impl ParameterBuilder {
    /// # Errors
    ///
    /// [`crate::error::ImportError::Configuration`] when a tag or the
    /// notification template does not parse.
    pub fn new(options: &ImportOptions) -> Result<Self> {
        Ok(Self {
            direction: options.direction,
            tags: options
                .tags
                .iter()
                .map(|t| Template::parse(t))
                .collect::<Result<_>>()?,
            callback_url: options
                .callback_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
            notification: options
                .notification_template
                .as_deref()
                .map(Template::parse)
                .transpose()?,
            tracking_profile: options.tracking_profile,
            use_feature_ids: options.use_feature_ids,
        })
    }

    /// Build the request for one descriptor of a feature.
    ///
    /// `feature_id` is the feature's identifier, if it has one; it only
    /// reaches the payload when feature ids are reused as trigger ids.
    pub fn build(
        &self,
        descriptor: GeometryDescriptor,
        attributes: &Map<String, Value>,
        feature_id: Option<&str>,
    ) -> TriggerRequest {
        let (geo, part) = match descriptor {
            GeometryDescriptor::Point {
                longitude,
                latitude,
                distance,
            } => (
                Geo::Circle {
                    latitude,
                    longitude,
                    distance,
                },
                None,
            ),
            GeometryDescriptor::Polygon { rings, part } => (
                Geo::Polygon {
                    esrijson: EsriPolygon {
                        rings,
                        spatial_reference: SpatialReference { wkid: WGS84_WKID },
                    },
                },
                part,
            ),
        };

        let trigger_id = match (self.use_feature_ids, feature_id) {
            (true, Some(id)) => Some(match part {
                Some(index) => format!("{}-{}", id, index),
                None => id.to_string(),
            }),
            _ => None,
        };

        TriggerRequest {
            condition: TriggerCondition {
                direction: self.direction,
                geo,
            },
            action: self.action(attributes),
            set_tags: self.render_tags(attributes),
            properties: attributes.clone(),
            trigger_id,
        }
    }

    fn action(&self, attributes: &Map<String, Value>) -> TriggerAction {
        TriggerAction {
            callback_url: self.callback_url.clone(),
            notification: self.notification.as_ref().map(|t| Notification {
                text: t.render(attributes),
            }),
            tracking_profile: self.tracking_profile,
        }
    }

    /// Render every tag template, dropping empty results and duplicates.
    fn render_tags(&self, attributes: &Map<String, Value>) -> Vec<String> {
        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for template in &self.tags {
            let tag = template.render(attributes);
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> ImportOptions {
        let mut opts = ImportOptions::new(
            "id",
            "secret",
            "https://example.com/FeatureServer/0",
            vec!["parks".into(), "park-{{OBJECTID}}".into()],
        );
        opts.buffer = 100.0;
        opts.callback_url = Some("https://example.com/hook".into());
        opts
    }

    fn attrs() -> Map<String, Value> {
        json!({"OBJECTID": 42, "NAME": "Laurelhurst"})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn square() -> Vec<Vec<Vec<f64>>> {
        vec![vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 0.0],
        ]]
    }

    #[test]
    fn point_geo_carries_configured_distance() {
        let builder = ParameterBuilder::new(&options()).unwrap();
        let request = builder.build(
            GeometryDescriptor::Point {
                longitude: -122.6,
                latitude: 45.5,
                distance: 100.0,
            },
            &json!({"distance": 5}).as_object().cloned().unwrap(),
            Some("1"),
        );
        assert_eq!(
            request.condition.geo,
            Geo::Circle {
                latitude: 45.5,
                longitude: -122.6,
                distance: 100.0
            }
        );
        assert_eq!(request.condition.direction, Direction::Enter);
    }

    #[test]
    fn tags_are_rendered_and_properties_copied() {
        let builder = ParameterBuilder::new(&options()).unwrap();
        let request = builder.build(
            GeometryDescriptor::Polygon {
                rings: square(),
                part: None,
            },
            &attrs(),
            Some("42"),
        );
        assert_eq!(request.set_tags, vec!["parks", "park-42"]);
        assert_eq!(request.properties, attrs());
    }

    #[test]
    fn duplicate_and_empty_tags_are_dropped() {
        let mut opts = options();
        opts.tags = vec!["a".into(), "{{MISSING}}".into(), "a".into()];
        let builder = ParameterBuilder::new(&opts).unwrap();
        let request = builder.build(
            GeometryDescriptor::Polygon {
                rings: square(),
                part: None,
            },
            &attrs(),
            None,
        );
        assert_eq!(request.set_tags, vec!["a"]);
    }

    #[test]
    fn action_contains_only_configured_fields() {
        let mut opts = options();
        opts.callback_url = None;
        opts.notification_template = Some("Welcome to {{NAME}}".into());
        opts.tracking_profile = Some(TrackingProfile::Fine);
        let builder = ParameterBuilder::new(&opts).unwrap();
        let request = builder.build(
            GeometryDescriptor::Polygon {
                rings: square(),
                part: None,
            },
            &attrs(),
            None,
        );
        assert_eq!(
            request.action,
            TriggerAction {
                callback_url: None,
                notification: Some(Notification {
                    text: "Welcome to Laurelhurst".into()
                }),
                tracking_profile: Some(TrackingProfile::Fine),
            }
        );
    }

    #[test]
    fn notification_sections_follow_attributes() {
        let mut opts = options();
        opts.notification_template =
            Some("{{NAME}} is {{#OPEN}}open{{/OPEN}}{{^OPEN}}closed{{/OPEN}}".into());
        let builder = ParameterBuilder::new(&opts).unwrap();
        let text = |open: bool| {
            let attributes = json!({"NAME": "Pool", "OPEN": open})
                .as_object()
                .cloned()
                .unwrap();
            builder
                .build(
                    GeometryDescriptor::Polygon {
                        rings: square(),
                        part: None,
                    },
                    &attributes,
                    None,
                )
                .action
                .notification
                .map(|n| n.text)
        };
        assert_eq!(text(true).as_deref(), Some("Pool is open"));
        assert_eq!(text(false).as_deref(), Some("Pool is closed"));
    }

    #[test]
    fn unparseable_templates_are_rejected() {
        let mut opts = options();
        opts.tags.push("{{#ZONE}}".into());
        assert!(ParameterBuilder::new(&opts).is_err());
    }

    #[test]
    fn trigger_ids_only_with_feature_id_reuse() {
        let builder = ParameterBuilder::new(&options()).unwrap();
        let request = builder.build(
            GeometryDescriptor::Polygon {
                rings: square(),
                part: Some(1),
            },
            &attrs(),
            Some("42"),
        );
        assert_eq!(request.trigger_id, None);

        let mut opts = options();
        opts.use_feature_ids = true;
        let builder = ParameterBuilder::new(&opts).unwrap();
        let whole = builder.build(
            GeometryDescriptor::Polygon {
                rings: square(),
                part: None,
            },
            &attrs(),
            Some("42"),
        );
        assert_eq!(whole.trigger_id.as_deref(), Some("42"));

        let ids: Vec<_> = (0..2)
            .map(|i| {
                builder
                    .build(
                        GeometryDescriptor::Polygon {
                            rings: square(),
                            part: Some(i),
                        },
                        &attrs(),
                        Some("42"),
                    )
                    .trigger_id
            })
            .collect();
        assert_eq!(ids, vec![Some("42-0".to_string()), Some("42-1".to_string())]);
    }

    #[test]
    fn missing_feature_id_leaves_trigger_id_unset() {
        let mut opts = options();
        opts.use_feature_ids = true;
        let builder = ParameterBuilder::new(&opts).unwrap();
        let request = builder.build(
            GeometryDescriptor::Point {
                longitude: 0.0,
                latitude: 0.0,
                distance: 100.0,
            },
            &Map::new(),
            None,
        );
        assert_eq!(request.trigger_id, None);
    }
}
