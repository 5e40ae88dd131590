// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use crate::edge_aggregator::AggregationResult;
use crate::facets::ModeId;
use rgb::{RGB8, RGBA8};
use serde::Serialize;

/// Metres of elevation per counted trip.
pub const ELEVATION_PER_TRIP: f64 = 5.0;
/// Count at which an edge reaches full base-color intensity.
pub const FULL_INTENSITY_COUNT: f64 = 10.0;
pub const MIN_INTENSITY: f64 = 0.4;
pub const DEFAULT_LAYER_ALPHA: u8 = 200;

pub const FALLBACK_MODE_COLOUR: RGB8 = RGB8::new(160, 160, 160);

const MODE_PALETTE: [RGB8; 18] = [
    RGB8::new(230, 25, 75),
    RGB8::new(60, 180, 75),
    RGB8::new(255, 140, 0),
    RGB8::new(0, 130, 200),
    RGB8::new(245, 130, 48),
    RGB8::new(145, 30, 180),
    RGB8::new(70, 240, 240),
    RGB8::new(240, 50, 230),
    RGB8::new(210, 245, 60),
    RGB8::new(250, 190, 212),
    RGB8::new(0, 128, 128),
    RGB8::new(220, 190, 255),
    RGB8::new(170, 110, 40),
    RGB8::new(255, 250, 200),
    RGB8::new(128, 0, 0),
    RGB8::new(170, 255, 195),
    RGB8::new(128, 128, 0),
    RGB8::new(255, 215, 180),
];

/// Base colour for a mode; ids outside 1..=18 get a neutral grey.
pub fn mode_base_colour(mode: ModeId) -> RGB8 {
    match mode.0 {
        1..=18 => MODE_PALETTE[(mode.0 - 1) as usize],
        _ => FALLBACK_MODE_COLOUR,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayerStyle {
    pub base_colour: RGB8,
    pub alpha: u8,
}

impl LayerStyle {
    pub fn new(base_colour: RGB8, alpha: u8) -> Self {
        Self { base_colour, alpha }
    }

    /// Sparse edges sit near 40% of the base intensity, ten or more trips
    /// reach 100%, linear in between.
    pub fn colour_for(&self, count: u32) -> RGBA8 {
        let intensity =
            MIN_INTENSITY + (1.0 - MIN_INTENSITY) * (count as f64 / FULL_INTENSITY_COUNT).min(1.0);
        let channel = |c: u8| (c as f64 * intensity).round().clamp(0.0, 255.0) as u8;

        RGBA8::new(
            channel(self.base_colour.r),
            channel(self.base_colour.g),
            channel(self.base_colour.b),
            self.alpha,
        )
    }

    pub fn width_for(&self, count: u32) -> f64 {
        (count as f64).sqrt() + 0.5
    }
}

pub fn elevation_for(count: u32) -> f64 {
    count as f64 * ELEVATION_PER_TRIP
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualEdge {
    /// [lon, lat, elevation]
    pub source: [f64; 3],
    pub target: [f64; 3],
    pub count: u32,
    /// Style evaluated for this count, [r, g, b, a].
    pub colour: [u8; 4],
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub id: String,
    pub mode: ModeId,
    pub style: LayerStyle,
    pub edges: Vec<VisualEdge>,
}

impl Layer {
    pub fn layer_id(mode: ModeId) -> String {
        format!("routes-mode-{}", mode)
    }
}

/// Pure mapping from counts to renderable edges, in aggregation order.
pub fn map_edges(result: &AggregationResult, style: &LayerStyle) -> Vec<VisualEdge> {
    result
        .iter()
        .map(|edge| {
            let z = elevation_for(edge.count);
            let colour = style.colour_for(edge.count);
            VisualEdge {
                source: [edge.source.lon, edge.source.lat, z],
                target: [edge.target.lon, edge.target.lat, z],
                count: edge.count,
                colour: [colour.r, colour.g, colour.b, colour.a],
                width: style.width_for(edge.count),
            }
        })
        .collect()
}

pub fn build_layer(mode: ModeId, result: &AggregationResult, alpha: u8) -> Layer {
    let style = LayerStyle::new(mode_base_colour(mode), alpha);
    Layer {
        id: Layer::layer_id(mode),
        mode,
        edges: map_edges(result, &style),
        style,
    }
}
