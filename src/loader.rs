// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Independent per-mode loads. Each load runs as its own task and reports
//! back through the engine's event channel; completion order is arbitrary.
//! A failed load is logged and that mode simply never gets a layer.

use crate::buildings::annotate_collection;
use crate::config::{DataSource, EngineConfig};
use crate::error::LoadError;
use crate::facets::ModeId;
use crate::orchestrator::EngineEvent;
use crate::route_features::{parse_route_collection, PropertyNames, RouteFeature};
use geojson::FeatureCollection;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

async fn fetch_text(
    client: &reqwest::Client,
    source: &DataSource,
    relative_path: &str,
) -> Result<String, LoadError> {
    match source {
        DataSource::Http { base_url } => {
            let url = format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                relative_path.trim_start_matches('/')
            );
            let resp = client
                .get(&url)
                .send()
                .await
                .map_err(|source| LoadError::Http {
                    url: url.clone(),
                    source,
                })?;

            if !resp.status().is_success() {
                return Err(LoadError::Status {
                    url,
                    status: resp.status(),
                });
            }

            resp.text()
                .await
                .map_err(|source| LoadError::Http { url, source })
        }
        DataSource::Directory { path } => {
            let file_path = path.join(relative_path.trim_start_matches('/'));
            tokio::fs::read_to_string(&file_path)
                .await
                .map_err(|source| LoadError::Io {
                    path: file_path,
                    source,
                })
        }
    }
}

/// Fetches and parses one mode's collection.
pub async fn load_mode(
    client: &reqwest::Client,
    source: &DataSource,
    mode: ModeId,
    relative_path: &str,
    names: &PropertyNames,
) -> Result<Vec<RouteFeature>, LoadError> {
    let text = fetch_text(client, source, relative_path).await?;
    let features = parse_route_collection(&text, names);

    let foreign = features
        .iter()
        .filter(|f| f.mode.is_some_and(|m| m != mode))
        .count();
    if foreign > 0 {
        debug!(
            "Mode {} collection carries {} features tagged with another mode",
            mode, foreign
        );
    }

    info!("Loaded {} features for mode {}", features.len(), mode);
    Ok(features)
}

/// Fetches the building footprints and annotates them for extrusion.
pub async fn load_buildings(
    client: &reqwest::Client,
    source: &DataSource,
    relative_path: &str,
) -> Result<FeatureCollection, LoadError> {
    let text = fetch_text(client, source, relative_path).await?;
    let collection: FeatureCollection =
        text.parse().map_err(|source| LoadError::GeoJson {
            origin: relative_path.to_string(),
            source: Box::new(source),
        })?;

    info!("Loaded {} building footprints", collection.features.len());
    Ok(annotate_collection(collection))
}

/// Starts one load task per mode. Successful loads are sent to the engine as
/// [`EngineEvent::ModeLoaded`]; failures are logged and dropped, no retry.
pub fn spawn_mode_loads(
    config: &EngineConfig,
    modes: impl IntoIterator<Item = ModeId>,
    events: UnboundedSender<EngineEvent>,
) -> JoinSet<()> {
    let client = reqwest::Client::new();
    let mut set = JoinSet::new();

    for mode in modes {
        let client = client.clone();
        let source = config.source.clone();
        let names = config.properties.clone();
        let relative_path = config.mode_path(mode);
        let events = events.clone();

        set.spawn(async move {
            match load_mode(&client, &source, mode, &relative_path, &names).await {
                Ok(features) => {
                    if events
                        .send(EngineEvent::ModeLoaded { mode, features })
                        .is_err()
                    {
                        debug!("Engine gone before mode {} finished loading", mode);
                    }
                }
                Err(e) => warn!("Mode {} unavailable: {}", mode, e),
            }
        });
    }

    set
}
