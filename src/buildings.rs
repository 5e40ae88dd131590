// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Extrusion attributes for the building footprint layer drawn under the
//! routes. Heights come from OSM style tags with an ordered fallback:
//! `height`, then `building:levels` times three, then a flat default.

use geojson::{Feature, FeatureCollection, JsonObject};
use rgb::RGBA8;
use serde_json::Value as JsonValue;

pub const DEFAULT_BUILDING_HEIGHT: f64 = 10.0;
pub const METRES_PER_LEVEL: f64 = 3.0;

/// Longest leading float, e.g. `"12.5 m"` reads as 12.5.
fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;

    (1..=end)
        .rev()
        .filter_map(|len| s[..len].parse::<f64>().ok())
        .find(|v| v.is_finite())
}

/// Leading integer, e.g. `"4.5"` reads as 4.
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign_len..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    s[..sign_len + digits].parse().ok()
}

fn as_float(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => leading_float(s),
        _ => None,
    }
}

fn as_int(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        JsonValue::String(s) => leading_int(s),
        _ => None,
    }
}

pub fn building_height(properties: Option<&JsonObject>) -> f64 {
    let height = properties
        .and_then(|p| p.get("height"))
        .and_then(as_float);
    if let Some(height) = height {
        return height;
    }

    properties
        .and_then(|p| p.get("building:levels"))
        .and_then(as_int)
        .map(|levels| levels as f64 * METRES_PER_LEVEL)
        .unwrap_or(DEFAULT_BUILDING_HEIGHT)
}

/// Light fills so shading carries the volume; dark brown for low buildings.
pub fn building_fill(height: f64) -> RGBA8 {
    if height < 9.0 {
        RGBA8::new(150, 138, 126, 255)
    } else if height < 15.0 {
        RGBA8::new(220, 210, 200, 255)
    } else if height < 80.0 {
        RGBA8::new(211, 230, 212, 255)
    } else {
        RGBA8::new(220, 231, 231, 255)
    }
}

/// Adds `elevation` and `fill_colour` properties so the render surface can
/// extrude footprints without re-deriving them.
pub fn annotate_feature(feature: &mut Feature) {
    let height = building_height(feature.properties.as_ref());
    let fill = building_fill(height);
    feature.set_property("elevation", height);
    feature.set_property("fill_colour", vec![fill.r, fill.g, fill.b, fill.a]);
}

pub fn annotate_collection(mut collection: FeatureCollection) -> FeatureCollection {
    for feature in collection.features.iter_mut() {
        annotate_feature(feature);
    }
    collection
}
