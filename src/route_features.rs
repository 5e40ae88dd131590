// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use crate::facets::{IncomeId, ModeId, PeriodId, PurposeId};
use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

/// Raw GeoJSON position. Kept unvalidated so a short or null point only
/// drops the segments touching it.
pub type Position = Vec<f64>;

/// A (longitude, latitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// `None` for a missing point or one with fewer than two dimensions.
    pub fn from_position(position: Option<&Position>) -> Option<Self> {
        match position {
            Some(p) if p.len() >= 2 => Some(Self::new(p[0], p[1])),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteGeometry {
    Line(Vec<Option<Position>>),
    MultiLine(Vec<Vec<Option<Position>>>),
    /// Points, polygons, collections and null geometry.
    Other,
}

impl RouteGeometry {
    /// Ordered coordinate sequences. Sub-paths of a multi-line stay separate
    /// so no edge is ever formed across them.
    pub fn sequences(&self) -> Vec<&[Option<Position>]> {
        match self {
            RouteGeometry::Line(line) => vec![line.as_slice()],
            RouteGeometry::MultiLine(lines) => lines.iter().map(|l| l.as_slice()).collect(),
            RouteGeometry::Other => Vec::new(),
        }
    }

    fn from_geojson_value(value: &geojson::Value) -> Self {
        match value {
            geojson::Value::LineString(line) => {
                RouteGeometry::Line(line.iter().cloned().map(Some).collect())
            }
            geojson::Value::MultiLineString(lines) => RouteGeometry::MultiLine(
                lines
                    .iter()
                    .map(|line| line.iter().cloned().map(Some).collect())
                    .collect(),
            ),
            _ => RouteGeometry::Other,
        }
    }

    /// Lenient reading of a GeoJSON geometry object that the strict parser
    /// rejected, e.g. because of null points.
    fn from_json(value: &JsonValue) -> Self {
        let kind = value.get("type").and_then(JsonValue::as_str);
        let coordinates = value.get("coordinates").and_then(JsonValue::as_array);

        match (kind, coordinates) {
            (Some("LineString"), Some(points)) => RouteGeometry::Line(json_line(points)),
            (Some("MultiLineString"), Some(lines)) => RouteGeometry::MultiLine(
                lines
                    .iter()
                    .map(|line| line.as_array().map(|p| json_line(p)).unwrap_or_default())
                    .collect(),
            ),
            _ => RouteGeometry::Other,
        }
    }
}

fn json_line(points: &[JsonValue]) -> Vec<Option<Position>> {
    points
        .iter()
        .map(|point| {
            point.as_array().and_then(|dims| {
                dims.iter()
                    .map(JsonValue::as_f64)
                    .collect::<Option<Position>>()
            })
        })
        .collect()
}

/// Property names that carry the four category ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyNames {
    pub mode: String,
    pub period: String,
    pub purpose: String,
    pub income: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            mode: "mode".to_string(),
            period: "period".to_string(),
            purpose: "purpose".to_string(),
            income: "income".to_string(),
        }
    }
}

/// One surveyed trip.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFeature {
    pub geometry: RouteGeometry,
    pub mode: Option<ModeId>,
    pub period: Option<PeriodId>,
    pub purpose: Option<PurposeId>,
    pub income: Option<IncomeId>,
}

// Integral JSON numbers only; 3.0 counts as 3.
fn category_id(value: Option<&JsonValue>) -> Option<u8> {
    let value = value?;
    if let Some(n) = value.as_u64() {
        return u8::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && (0.0..=u8::MAX as f64).contains(&f) {
        Some(f as u8)
    } else {
        None
    }
}

impl RouteFeature {
    pub fn from_geojson(feature: &geojson::Feature, names: &PropertyNames) -> Self {
        let geometry = feature
            .geometry
            .as_ref()
            .map(|g| RouteGeometry::from_geojson_value(&g.value))
            .unwrap_or(RouteGeometry::Other);

        Self {
            geometry,
            mode: category_id(feature.property(&names.mode)).map(ModeId),
            period: category_id(feature.property(&names.period)).map(PeriodId),
            purpose: category_id(feature.property(&names.purpose)).map(PurposeId),
            income: category_id(feature.property(&names.income)).map(IncomeId),
        }
    }

    fn from_json(feature: &JsonValue, names: &PropertyNames) -> Self {
        let geometry = feature
            .get("geometry")
            .map(RouteGeometry::from_json)
            .unwrap_or(RouteGeometry::Other);
        let property = |name: &str| feature.get("properties").and_then(|p| p.get(name));

        Self {
            geometry,
            mode: category_id(property(&names.mode)).map(ModeId),
            period: category_id(property(&names.period)).map(PeriodId),
            purpose: category_id(property(&names.purpose)).map(PurposeId),
            income: category_id(property(&names.income)).map(IncomeId),
        }
    }
}

/// Parses a feature collection. Well-formed input goes through `geojson`;
/// anything it rejects is walked leniently so malformed points drop only
/// their own segments.
pub fn parse_route_collection(text: &str, names: &PropertyNames) -> Vec<RouteFeature> {
    match text.parse::<GeoJson>() {
        Ok(GeoJson::FeatureCollection(collection)) => collection
            .features
            .iter()
            .map(|f| RouteFeature::from_geojson(f, names))
            .collect(),
        Ok(GeoJson::Feature(feature)) => vec![RouteFeature::from_geojson(&feature, names)],
        Ok(GeoJson::Geometry(_)) => {
            warn!("Route data is a bare geometry without properties, ignoring");
            Vec::new()
        }
        Err(e) => {
            debug!("Strict GeoJSON parse failed ({}), reading leniently", e);
            parse_route_collection_lenient(text, names)
        }
    }
}

fn parse_route_collection_lenient(text: &str, names: &PropertyNames) -> Vec<RouteFeature> {
    let document: JsonValue = match serde_json::from_str(text) {
        Ok(document) => document,
        Err(e) => {
            warn!("Route data is not valid JSON: {}", e);
            return Vec::new();
        }
    };

    match document.get("features").and_then(JsonValue::as_array) {
        Some(features) => features
            .iter()
            .map(|f| RouteFeature::from_json(f, names))
            .collect(),
        None => {
            warn!("Route data has no features array");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE_COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[-70.1, -33.1], [-70.2, -33.2]]},
                "properties": {"mode": 5, "period": 1, "purpose": 2, "income": 3}
            },
            {
                "type": "Feature",
                "geometry": {"type": "MultiLineString", "coordinates": [[[0, 0], [1, 1]], [[5, 5], [6, 6]]]},
                "properties": {"mode": 5, "period": 2.0, "purpose": 4, "income": "3"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [0, 0]},
                "properties": {"mode": 5, "period": 1, "purpose": 1, "income": 1}
            }
        ]
    }"#;

    #[test]
    fn test_parse_strict_collection() {
        let features = parse_route_collection(LINE_COLLECTION, &PropertyNames::default());
        assert_eq!(features.len(), 3);

        assert_eq!(features[0].mode, Some(ModeId(5)));
        assert_eq!(features[0].period, Some(PeriodId(1)));
        assert_eq!(features[0].geometry.sequences().len(), 1);

        // 2.0 is integral, "3" is a string and never matches
        assert_eq!(features[1].period, Some(PeriodId(2)));
        assert_eq!(features[1].income, None);
        assert_eq!(features[1].geometry.sequences().len(), 2);

        assert_eq!(features[2].geometry, RouteGeometry::Other);
        assert!(features[2].geometry.sequences().is_empty());
    }

    #[test]
    fn test_parse_lenient_keeps_null_points() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "LineString", "coordinates": [[1, 1], null, [2], [3, 3], [4, 4]]},
                    "properties": {"mode": 1, "period": 1, "purpose": 1, "income": 1}
                },
                {
                    "type": "Feature",
                    "geometry": null,
                    "properties": {"mode": 1, "period": 1, "purpose": 1, "income": 1}
                }
            ]
        }"#;

        let features = parse_route_collection(text, &PropertyNames::default());
        assert_eq!(features.len(), 2);

        let sequences = features[0].geometry.sequences();
        assert_eq!(sequences[0].len(), 5);
        assert_eq!(sequences[0][1], None);
        assert_eq!(Coordinate::from_position(sequences[0][2].as_ref()), None);
        assert_eq!(
            Coordinate::from_position(sequences[0][3].as_ref()),
            Some(Coordinate::new(3.0, 3.0))
        );

        assert_eq!(features[1].geometry, RouteGeometry::Other);
    }

    #[test]
    fn test_custom_property_names() {
        let text = r#"{"type": "FeatureCollection", "features": [{
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
            "properties": {"modo": 3, "periodo": 4, "proposito": 11, "ingreso": 7}
        }]}"#;
        let names = PropertyNames {
            mode: "modo".to_string(),
            period: "periodo".to_string(),
            purpose: "proposito".to_string(),
            income: "ingreso".to_string(),
        };

        let features = parse_route_collection(text, &names);
        assert_eq!(features[0].mode, Some(ModeId(3)));
        assert_eq!(features[0].purpose, Some(PurposeId(11)));
        assert_eq!(features[0].income, Some(IncomeId(7)));
    }

    #[test]
    fn test_garbage_yields_nothing() {
        assert!(parse_route_collection("not json", &PropertyNames::default()).is_empty());
        assert!(parse_route_collection("{\"a\": 1}", &PropertyNames::default()).is_empty());
    }
}
