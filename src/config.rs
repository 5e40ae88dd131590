// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use crate::edge_aggregator::{AggregationOptions, DEFAULT_COORDINATE_PRECISION};
use crate::error::ConfigError;
use crate::facets::{ModeId, ModeSelection};
use crate::route_features::PropertyNames;
use crate::visual_mapping::DEFAULT_LAYER_ALPHA;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where per-mode route collections are fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Http { base_url: String },
    Directory { path: PathBuf },
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Directory {
            path: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    pub ambient_intensity: f64,
    pub directional_intensity: f64,
    pub directional_direction: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub lighting: Lighting,
}

impl Default for ViewState {
    // Santiago, tilted so the elevated edges read as volume
    fn default() -> Self {
        Self {
            longitude: -70.64827,
            latitude: -33.45694,
            zoom: 12.5,
            pitch: 45.0,
            bearing: -20.0,
            lighting: Lighting {
                ambient_intensity: 0.7,
                directional_intensity: 1.2,
                directional_direction: [-5.0, 5.0, -10.0],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub source: DataSource,
    /// Per-mode path relative to the source, `{mode}` is replaced by the id.
    pub path_template: String,
    pub properties: PropertyNames,
    /// Building footprints, relative to the source. `None` disables the layer.
    pub buildings_path: Option<String>,
    pub coordinate_precision: u8,
    pub layer_alpha: u8,
    pub initial_modes: Vec<ModeId>,
    pub view: ViewState,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source: DataSource::default(),
            path_template: "routes/mode_{mode}.geojson".to_string(),
            properties: PropertyNames::default(),
            buildings_path: Some("export.geojson".to_string()),
            coordinate_precision: DEFAULT_COORDINATE_PRECISION,
            layer_alpha: DEFAULT_LAYER_ALPHA,
            initial_modes: ModeId::domain().into_iter().collect(),
            view: ViewState::default(),
        }
    }
}

impl EngineConfig {
    /// Reads a RON config file. A missing path means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig = ron::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn mode_path(&self, mode: ModeId) -> String {
        self.path_template.replace("{mode}", &mode.to_string())
    }

    pub fn aggregation_options(&self) -> AggregationOptions {
        AggregationOptions {
            precision: self.coordinate_precision,
        }
    }

    pub fn initial_mode_selection(&self) -> ModeSelection {
        ModeSelection::new(self.initial_modes.iter().copied())
    }
}
