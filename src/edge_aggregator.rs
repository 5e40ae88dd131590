// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Turns one mode's trip geometries into an undirected, frequency weighted
//! edge list.
//!
//! Endpoints are formatted to a fixed number of decimals (5 by default,
//! roughly 1.1 m) and joined as `"lon,lat->lon,lat"`. The first orientation
//! seen for a physical pair becomes its key for the rest of the run; later
//! traversals in the opposite direction fold into it. Key orientation
//! therefore depends on input order, and features are always walked in
//! collection order to keep runs reproducible.
//!
//! Formatting uses `{:.N}`, which rounds the exact binary value and breaks
//! exact ties half-to-even: `-70.015625` keys as `-70.01562`. Bucketing is
//! deterministic either way.

use crate::facets::FacetSelection;
use crate::route_features::{Coordinate, RouteFeature};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_COORDINATE_PRECISION: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationOptions {
    /// Decimal digits kept when keying an endpoint.
    pub precision: u8,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            precision: DEFAULT_COORDINATE_PRECISION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalEdgeKey(String);

impl CanonicalEdgeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalEdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedEdge {
    pub key: CanonicalEdgeKey,
    /// Endpoints as written in the key, i.e. already rounded.
    pub source: Coordinate,
    pub target: Coordinate,
    pub count: u32,
}

/// Edge counts for one mode and one run, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct AggregationResult {
    edges: Vec<AggregatedEdge>,
    index: AHashMap<CanonicalEdgeKey, usize>,
}

impl PartialEq for AggregationResult {
    fn eq(&self, other: &Self) -> bool {
        self.edges == other.edges
    }
}

impl AggregationResult {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AggregatedEdge> {
        self.edges.iter()
    }

    pub fn get(&self, key: &str) -> Option<u32> {
        self.index.get(key).map(|&idx| self.edges[idx].count)
    }

    /// Count for the undirected segment between two already formatted
    /// endpoints, whichever way round it was keyed.
    pub fn count_between(&self, a: &str, b: &str) -> Option<u32> {
        self.get(&format!("{}->{}", a, b))
            .or_else(|| self.get(&format!("{}->{}", b, a)))
    }

    pub fn total_count(&self) -> u64 {
        self.edges.iter().map(|e| e.count as u64).sum()
    }

    fn record(&mut self, a: &str, b: &str, source: Coordinate, target: Coordinate) {
        let reverse = format!("{}->{}", b, a);
        if let Some(&idx) = self.index.get(reverse.as_str()) {
            self.edges[idx].count += 1;
            return;
        }

        let forward = format!("{}->{}", a, b);
        match self.index.get(forward.as_str()) {
            Some(&idx) => self.edges[idx].count += 1,
            None => {
                let key = CanonicalEdgeKey(forward);
                self.index.insert(key.clone(), self.edges.len());
                self.edges.push(AggregatedEdge {
                    key,
                    source,
                    target,
                    count: 1,
                });
            }
        }
    }
}

impl std::borrow::Borrow<str> for CanonicalEdgeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Formats a coordinate the way edge keys spell it, e.g. `-70.10000,-33.10000`.
pub fn format_coordinate(coordinate: Coordinate, precision: u8) -> String {
    let precision = precision as usize;
    format!(
        "{:.*},{:.*}",
        precision, coordinate.lon, precision, coordinate.lat
    )
}

fn rounded(value: f64, precision: u8) -> f64 {
    format!("{:.*}", precision as usize, value)
        .parse()
        .unwrap_or(value)
}

fn rounded_coordinate(coordinate: Coordinate, precision: u8) -> Coordinate {
    Coordinate::new(
        rounded(coordinate.lon, precision),
        rounded(coordinate.lat, precision),
    )
}

/// Counts every consecutive point pair of every feature admitted by
/// `selection`. Malformed points, unsupported geometry and filtered features
/// contribute nothing; this never fails.
pub fn aggregate_mode(
    features: &[RouteFeature],
    selection: &FacetSelection,
    options: &AggregationOptions,
) -> AggregationResult {
    let mut result = AggregationResult::default();

    for feature in features {
        if !selection.admits(feature.period, feature.purpose, feature.income) {
            continue;
        }

        for sequence in feature.geometry.sequences() {
            for pair in sequence.windows(2) {
                let (Some(p1), Some(p2)) = (
                    Coordinate::from_position(pair[0].as_ref()),
                    Coordinate::from_position(pair[1].as_ref()),
                ) else {
                    continue;
                };

                let a = format_coordinate(p1, options.precision);
                let b = format_coordinate(p2, options.precision);
                result.record(
                    &a,
                    &b,
                    rounded_coordinate(p1, options.precision),
                    rounded_coordinate(p2, options.precision),
                );
            }
        }
    }

    result
}
