//! Geometry classification and dispatch.
//!
//! Raw geometry blobs are classified exactly once, at ingestion, into the
//! closed set [`FeatureGeometry`]. [`GeometryDispatcher`] then turns each
//! classified geometry into the flat [`GeometryDescriptor`]s that become
//! triggers:
//!
//! | Geometry | Descriptors |
//! |----------|-------------|
//! | Point | one circle of radius `buffer` |
//! | Polygon | one polygon |
//! | MultiPolygon with N parts | N polygons, indexed `0..N` |
//! | Unsupported | none |
//!
//! # Ring grouping
//!
//! The feature service encodes every polygon as a flat list of rings.
//! Clockwise rings are outer boundaries and counter-clockwise rings are holes
//! belonging to the smallest outer ring that contains them. A hole that no outer ring
//! contains is promoted to an outer ring of its own. One resulting group is a
//! Polygon, several groups are a MultiPolygon.

use geo::{Area, Contains, LineString, Polygon, Winding};

use crate::models::{GeometryDescriptor, RawGeometry, Ring};

/// Explicit classification of a feature's geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Point { x: f64, y: f64 },
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
    Unsupported(&'static str),
}

/// Classify a raw geometry blob by which of its fields are populated.
pub fn classify(raw: Option<&RawGeometry>) -> FeatureGeometry {
    let Some(raw) = raw else {
        return FeatureGeometry::Unsupported("missing geometry");
    };

    if let Some(rings) = &raw.rings {
        let mut groups = group_rings(rings);
        return match groups.len() {
            0 => FeatureGeometry::Unsupported("polygon without valid rings"),
            1 => FeatureGeometry::Polygon(groups.remove(0)),
            _ => FeatureGeometry::MultiPolygon(groups),
        };
    }

    match (raw.x, raw.y) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
            return FeatureGeometry::Point { x, y };
        }
        _ => {}
    }

    if raw.paths.is_some() {
        FeatureGeometry::Unsupported("polyline")
    } else if raw.points.is_some() {
        FeatureGeometry::Unsupported("multipoint")
    } else {
        FeatureGeometry::Unsupported("empty geometry")
    }
}

/// Split a flat ring list into polygons, each an outer ring followed by its
/// holes.
///
/// A hole belongs to the smallest outer ring that contains all of it;
/// touching the outer boundary still counts as contained.
fn group_rings(rings: &[Ring]) -> Vec<Vec<Ring>> {
    let mut outers: Vec<(Polygon<f64>, Vec<Ring>)> = Vec::new();
    let mut holes: Vec<(Polygon<f64>, &Ring)> = Vec::new();

    for ring in rings.iter().filter(|r| is_valid_ring(r)) {
        let shape = Polygon::new(line_string(ring), vec![]);
        if shape.exterior().is_ccw() {
            holes.push((shape, ring));
        } else {
            outers.push((shape, vec![ring.clone()]));
        }
    }

    let mut orphans = Vec::new();
    for (shape, ring) in holes {
        let owner = outers
            .iter()
            .enumerate()
            .filter(|(_, (outer, _))| outer.contains(&shape))
            .min_by(|(_, (a, _)), (_, (b, _))| a.unsigned_area().total_cmp(&b.unsigned_area()))
            .map(|(index, _)| index);
        match owner {
            Some(index) => outers[index].1.push(ring.clone()),
            None => {
                let mut outer = ring.clone();
                outer.reverse();
                orphans.push(vec![outer]);
            }
        }
    }

    outers
        .into_iter()
        .map(|(_, group)| group)
        .chain(orphans)
        .collect()
}

/// A closed ring needs at least four positions with an x and y each.
fn is_valid_ring(ring: &Ring) -> bool {
    ring.len() >= 4 && ring.iter().all(|p| p.len() >= 2)
}

fn line_string(ring: &Ring) -> LineString<f64> {
    ring.iter().map(|p| (p[0], p[1])).collect::<Vec<_>>().into()
}

/// Running count of what the dispatcher has seen.
///
/// A multipolygon feature is not counted as a feature; each of its parts is
/// counted instead, so `expected_outcomes` matches the number of outcomes
/// the run must record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureTally {
    pub features: u64,
    pub parts: u64,
}

impl FeatureTally {
    pub fn expected_outcomes(&self) -> u64 {
        self.features + self.parts
    }
}

/// Turns classified geometries into trigger descriptors.
#[derive(Debug)]
pub struct GeometryDispatcher {
    buffer: f64,
    tally: FeatureTally,
}

impl GeometryDispatcher {
    pub fn new(buffer: f64) -> Self {
        Self {
            buffer,
            tally: FeatureTally::default(),
        }
    }

    pub fn tally(&self) -> FeatureTally {
        self.tally
    }

    pub fn dispatch(&mut self, geometry: FeatureGeometry) -> Descriptors {
        self.tally.features += 1;
        let inner = match geometry {
            FeatureGeometry::Point { x, y } => Inner::Single(Some(GeometryDescriptor::Point {
                longitude: x,
                latitude: y,
                distance: self.buffer,
            })),
            FeatureGeometry::Polygon(rings) => {
                Inner::Single(Some(GeometryDescriptor::Polygon { rings, part: None }))
            }
            FeatureGeometry::MultiPolygon(parts) => {
                self.tally.features -= 1;
                self.tally.parts += parts.len() as u64;
                Inner::Parts(parts.into_iter().enumerate())
            }
            FeatureGeometry::Unsupported(_) => Inner::Single(None),
        };
        Descriptors { inner }
    }
}

/// Lazy sequence of descriptors for one feature.
#[derive(Debug)]
pub struct Descriptors {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Single(Option<GeometryDescriptor>),
    Parts(std::iter::Enumerate<std::vec::IntoIter<Vec<Ring>>>),
}

impl Iterator for Descriptors {
    type Item = GeometryDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Single(slot) => slot.take(),
            Inner::Parts(parts) => parts.next().map(|(index, rings)| GeometryDescriptor::Polygon {
                rings,
                part: Some(index),
            }),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Inner::Single(slot) => {
                let n = usize::from(slot.is_some());
                (n, Some(n))
            }
            Inner::Parts(parts) => parts.size_hint(),
        }
    }
}

impl ExactSizeIterator for Descriptors {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawGeometry {
        serde_json::from_value(value).unwrap()
    }

    /// Clockwise square with its lower-left corner at (x, y).
    fn outer(x: f64, y: f64, size: f64) -> Ring {
        vec![
            vec![x, y],
            vec![x, y + size],
            vec![x + size, y + size],
            vec![x + size, y],
            vec![x, y],
        ]
    }

    /// Counter-clockwise square, a hole in the feature service's convention.
    fn hole(x: f64, y: f64, size: f64) -> Ring {
        let mut ring = outer(x, y, size);
        ring.reverse();
        ring
    }

    #[test]
    fn classifies_points() {
        let g = classify(Some(&raw(json!({"x": -122.6, "y": 45.5}))));
        assert_eq!(g, FeatureGeometry::Point { x: -122.6, y: 45.5 });
    }

    #[test]
    fn zero_coordinates_are_still_points() {
        let g = classify(Some(&raw(json!({"x": 0.0, "y": 0.0}))));
        assert_eq!(g, FeatureGeometry::Point { x: 0.0, y: 0.0 });
    }

    #[test]
    fn polygon_with_hole_stays_single() {
        let rings = vec![outer(0.0, 0.0, 10.0), hole(2.0, 2.0, 2.0)];
        let g = classify(Some(&raw(json!({ "rings": rings }))));
        match g {
            FeatureGeometry::Polygon(r) => assert_eq!(r.len(), 2),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn two_outer_rings_make_a_multipolygon() {
        let rings = vec![
            outer(0.0, 0.0, 1.0),
            outer(5.0, 5.0, 1.0),
            hole(5.25, 5.25, 0.5),
        ];
        let g = classify(Some(&raw(json!({ "rings": rings }))));
        match g {
            FeatureGeometry::MultiPolygon(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0].len(), 1);
                assert_eq!(parts[1].len(), 2, "hole assigned to its container");
            }
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn orphan_hole_becomes_outer_ring() {
        let rings = vec![outer(0.0, 0.0, 1.0), hole(10.0, 10.0, 1.0)];
        let g = classify(Some(&raw(json!({ "rings": rings }))));
        match g {
            FeatureGeometry::MultiPolygon(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(line_string(&parts[1][0]).is_cw());
            }
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn hole_touching_outer_boundary_stays_a_hole() {
        // Counter-clockwise triangle whose first vertex sits on the right edge.
        let notch = vec![
            vec![10.0, 5.0],
            vec![8.0, 6.0],
            vec![8.0, 4.0],
            vec![10.0, 5.0],
        ];
        let rings = vec![outer(0.0, 0.0, 10.0), notch.clone()];
        match classify(Some(&raw(json!({ "rings": rings })))) {
            FeatureGeometry::Polygon(r) => {
                assert_eq!(r.len(), 2);
                assert_eq!(r[1], notch);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn nested_island_keeps_its_own_hole() {
        // Outer A, hole in A, island B inside that hole, hole inside B.
        let rings = vec![
            outer(0.0, 0.0, 20.0),
            hole(2.0, 2.0, 16.0),
            outer(5.0, 5.0, 10.0),
            hole(8.0, 8.0, 4.0),
        ];
        match classify(Some(&raw(json!({ "rings": rings })))) {
            FeatureGeometry::MultiPolygon(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0], vec![outer(0.0, 0.0, 20.0), hole(2.0, 2.0, 16.0)]);
                assert_eq!(parts[1], vec![outer(5.0, 5.0, 10.0), hole(8.0, 8.0, 4.0)]);
            }
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn unsupported_shapes_are_named() {
        assert_eq!(classify(None), FeatureGeometry::Unsupported("missing geometry"));
        assert_eq!(
            classify(Some(&raw(json!({"paths": [[[0.0, 0.0], [1.0, 1.0]]]})))),
            FeatureGeometry::Unsupported("polyline")
        );
        assert_eq!(
            classify(Some(&raw(json!({"points": [[0.0, 0.0]]})))),
            FeatureGeometry::Unsupported("multipoint")
        );
        assert_eq!(
            classify(Some(&raw(json!({"rings": [[[0.0, 0.0], [1.0, 1.0]]]})))),
            FeatureGeometry::Unsupported("polygon without valid rings")
        );
        assert_eq!(
            classify(Some(&raw(json!({"x": null, "y": null})))),
            FeatureGeometry::Unsupported("empty geometry")
        );
    }

    #[test]
    fn point_descriptor_carries_buffer() {
        let mut dispatcher = GeometryDispatcher::new(100.0);
        let out: Vec<_> = dispatcher
            .dispatch(FeatureGeometry::Point { x: 1.0, y: 2.0 })
            .collect();
        assert_eq!(
            out,
            vec![GeometryDescriptor::Point {
                longitude: 1.0,
                latitude: 2.0,
                distance: 100.0
            }]
        );
    }

    #[test]
    fn multipolygon_yields_indexed_parts_and_adjusts_tally() {
        let mut dispatcher = GeometryDispatcher::new(250.0);
        dispatcher.dispatch(FeatureGeometry::Point { x: 0.0, y: 0.0 }).count();

        let parts = vec![
            vec![outer(0.0, 0.0, 1.0)],
            vec![outer(3.0, 3.0, 1.0)],
            vec![outer(6.0, 6.0, 1.0)],
        ];
        let descriptors = dispatcher.dispatch(FeatureGeometry::MultiPolygon(parts));
        assert_eq!(descriptors.len(), 3);
        let indexes: Vec<_> = descriptors
            .map(|d| match d {
                GeometryDescriptor::Polygon { part, .. } => part,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(indexes, vec![Some(0), Some(1), Some(2)]);

        let tally = dispatcher.tally();
        assert_eq!(tally, FeatureTally { features: 1, parts: 3 });
        assert_eq!(tally.expected_outcomes(), 4);
    }

    #[test]
    fn unsupported_yields_nothing_but_is_counted() {
        let mut dispatcher = GeometryDispatcher::new(250.0);
        let out: Vec<_> = dispatcher
            .dispatch(FeatureGeometry::Unsupported("polyline"))
            .collect();
        assert!(out.is_empty());
        assert_eq!(dispatcher.tally().expected_outcomes(), 1);
    }
}
