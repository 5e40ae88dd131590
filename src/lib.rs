// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::arc_with_non_send_sync,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::bytes_nth,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

//! Travel survey routes as density weighted 3D edges.
//!
//! Trips are loaded per transport mode, filtered by time-of-day period, trip
//! purpose and income bracket, folded into undirected street segments and
//! mapped to elevation, colour and width for a 3D map.

pub mod buildings;
pub mod config;
pub mod edge_aggregator;
pub mod error;
pub mod facets;
pub mod loader;
pub mod orchestrator;
pub mod route_features;
pub mod trip_store;
pub mod visual_mapping;


pub use config::EngineConfig;
pub use edge_aggregator::{aggregate_mode, AggregationOptions, AggregationResult, CanonicalEdgeKey};
pub use facets::{Facet, FacetSelection, IncomeId, ModeId, ModeSelection, PeriodId, PurposeId};
pub use orchestrator::{spawn_engine, EngineEvent, EngineHandle, LayerSet, RouteLayerOrchestrator};
pub use route_features::{Coordinate, RouteFeature, RouteGeometry};
pub use visual_mapping::{build_layer, Layer, LayerStyle, VisualEdge};
