// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Keeps the published layer list in step with the selection and the store.
//!
//! [`RouteLayerOrchestrator`] is synchronous: every accepted event reruns
//! aggregation and visual mapping for all selected, loaded modes and swaps in
//! a brand new [`LayerSet`]. [`spawn_engine`] wraps it in a task that fans in
//! UI events and load completions and publishes each new set through a
//! `watch` channel. Callers that need the set their own event produced use
//! [`EngineHandle::request`], which replies over a oneshot.

use crate::config::EngineConfig;
use crate::edge_aggregator::{aggregate_mode, AggregationOptions};
use crate::error::EngineStopped;
use crate::facets::{Facet, FacetSelection, ModeId, ModeSelection};
use crate::route_features::RouteFeature;
use crate::trip_store::TripSegmentStore;
use crate::visual_mapping::{build_layer, Layer};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug)]
pub enum EngineEvent {
    ModeLoaded {
        mode: ModeId,
        features: Vec<RouteFeature>,
    },
    ToggleMode(ModeId),
    ToggleAllModes,
    SetModes(ModeSelection),
    ToggleFacet(Facet, u8),
    ToggleAllFacet(Facet),
    SetFacets(FacetSelection),
}

/// One full recomputation's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerSet {
    /// Number of recomputations so far; 0 before the first.
    pub generation: u64,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionSnapshot {
    pub modes: ModeSelection,
    pub facets: FacetSelection,
    pub loaded_modes: Vec<ModeId>,
}

pub struct RouteLayerOrchestrator {
    store: TripSegmentStore,
    modes: ModeSelection,
    facets: FacetSelection,
    options: AggregationOptions,
    alpha: u8,
    published: Arc<LayerSet>,
}

impl RouteLayerOrchestrator {
    pub fn new(
        modes: ModeSelection,
        facets: FacetSelection,
        options: AggregationOptions,
        alpha: u8,
    ) -> Self {
        Self {
            store: TripSegmentStore::new(),
            modes,
            facets,
            options,
            alpha,
            published: Arc::new(LayerSet::default()),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.initial_mode_selection(),
            FacetSelection::all(),
            config.aggregation_options(),
            config.layer_alpha,
        )
    }

    pub fn layers(&self) -> Arc<LayerSet> {
        Arc::clone(&self.published)
    }

    pub fn selection(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            modes: self.modes.clone(),
            facets: self.facets.clone(),
            loaded_modes: self.store.loaded_modes(),
        }
    }

    /// Applies one event and returns the layer set that is current afterwards.
    /// Data arriving for an unselected mode, or a repeated load, leaves the
    /// output as it was.
    pub fn apply(&mut self, event: EngineEvent) -> Arc<LayerSet> {
        let triggers = match event {
            EngineEvent::ModeLoaded { mode, features } => {
                self.store.insert(mode, features) && self.modes.contains(mode)
            }
            EngineEvent::ToggleMode(mode) => {
                self.modes = self.modes.toggled(mode);
                true
            }
            EngineEvent::ToggleAllModes => {
                self.modes = self.modes.toggled_all();
                true
            }
            EngineEvent::SetModes(modes) => {
                self.modes = modes;
                true
            }
            EngineEvent::ToggleFacet(facet, id) => {
                self.facets = self.facets.toggled(facet, id);
                true
            }
            EngineEvent::ToggleAllFacet(facet) => {
                self.facets = self.facets.toggled_all(facet);
                true
            }
            EngineEvent::SetFacets(facets) => {
                self.facets = facets;
                true
            }
        };

        if triggers {
            self.recompute();
        }
        self.layers()
    }

    /// Full rerun over a frozen snapshot of the store and selection. Modes
    /// without data are skipped until their load lands.
    pub fn recompute(&mut self) -> Arc<LayerSet> {
        let store = self.store.clone();
        let facets = self.facets.clone();

        let layers: Vec<Layer> = self
            .modes
            .iter()
            .filter_map(|mode| {
                let features = store.get(mode)?;
                let result = aggregate_mode(&features, &facets, &self.options);
                Some(build_layer(mode, &result, self.alpha))
            })
            .collect();

        let edge_count: usize = layers.iter().map(|l| l.edges.len()).sum();
        let generation = self.published.generation + 1;
        debug!(
            "Recomputation {} produced {} layers with {} edges",
            generation,
            layers.len(),
            edge_count
        );

        self.published = Arc::new(LayerSet { generation, layers });
        self.layers()
    }
}

type Request = (EngineEvent, Option<oneshot::Sender<Arc<LayerSet>>>);

/// Cloneable front end to a running engine task. Events sent through the
/// handle are applied in the order they were sent.
#[derive(Clone)]
pub struct EngineHandle {
    events: mpsc::UnboundedSender<EngineEvent>,
    requests: mpsc::UnboundedSender<Request>,
    layers: watch::Receiver<Arc<LayerSet>>,
    selection: watch::Receiver<SelectionSnapshot>,
}

impl EngineHandle {
    pub fn send(&self, event: EngineEvent) -> Result<(), EngineStopped> {
        self.requests
            .send((event, None))
            .map_err(|_| EngineStopped)
    }

    /// Queues `event` now. The receiver yields the layer set current right
    /// after it, even if later events have already been published.
    pub fn request(
        &self,
        event: EngineEvent,
    ) -> Result<oneshot::Receiver<Arc<LayerSet>>, EngineStopped> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send((event, Some(reply_tx)))
            .map_err(|_| EngineStopped)?;
        Ok(reply_rx)
    }

    /// Sender for load tasks, which do not wait for a reply.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<EngineEvent> {
        self.events.clone()
    }

    pub fn layers(&self) -> Arc<LayerSet> {
        Arc::clone(&self.layers.borrow())
    }

    pub fn selection(&self) -> SelectionSnapshot {
        self.selection.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<LayerSet>> {
        self.layers.clone()
    }
}

/// Runs the orchestrator on its own task. Events are handled strictly one at
/// a time, so publishes are last-write-wins in arrival order.
pub fn spawn_engine(mut orchestrator: RouteLayerOrchestrator) -> (EngineHandle, JoinHandle<()>) {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<EngineEvent>();
    let (requests_tx, mut requests_rx) = mpsc::unbounded_channel::<Request>();
    let (layers_tx, layers_rx) = watch::channel(orchestrator.recompute());
    let (selection_tx, selection_rx) = watch::channel(orchestrator.selection());

    let task = tokio::spawn(async move {
        loop {
            let (event, reply) = tokio::select! {
                Some(event) = events_rx.recv() => (event, None),
                Some((event, reply)) = requests_rx.recv() => (event, reply),
                else => break,
            };

            let layers = orchestrator.apply(event);
            let changed = !Arc::ptr_eq(&layers, &layers_tx.borrow());
            if changed {
                layers_tx.send_replace(Arc::clone(&layers));
            }
            selection_tx.send_replace(orchestrator.selection());

            if let Some(reply) = reply {
                // requester may have gone away
                let _ = reply.send(layers);
            }
        }
        info!("Route layer engine stopped");
    });

    let handle = EngineHandle {
        events: events_tx,
        requests: requests_tx,
        layers: layers_rx,
        selection: selection_rx,
    };
    (handle, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facets::{IncomeId, PeriodId, PurposeId};
    use crate::route_features::RouteGeometry;
    use crate::visual_mapping::DEFAULT_LAYER_ALPHA;

    fn trip(period: u8) -> RouteFeature {
        RouteFeature {
            geometry: RouteGeometry::Line(vec![Some(vec![0.0, 0.0]), Some(vec![1.0, 1.0])]),
            mode: None,
            period: Some(PeriodId(period)),
            purpose: Some(PurposeId(1)),
            income: Some(IncomeId(1)),
        }
    }

    fn orchestrator(modes: &[u8]) -> RouteLayerOrchestrator {
        RouteLayerOrchestrator::new(
            ModeSelection::new(modes.iter().map(|m| ModeId(*m))),
            FacetSelection::all(),
            AggregationOptions::default(),
            DEFAULT_LAYER_ALPHA,
        )
    }

    fn layer_modes(set: &LayerSet) -> Vec<ModeId> {
        set.layers.iter().map(|l| l.mode).collect()
    }

    #[test]
    fn test_unloaded_modes_are_skipped_until_data_arrives() {
        let mut engine = orchestrator(&[3, 1]);
        assert!(engine.recompute().layers.is_empty());

        let set = engine.apply(EngineEvent::ModeLoaded {
            mode: ModeId(1),
            features: vec![trip(1)],
        });
        assert_eq!(layer_modes(&set), vec![ModeId(1)]);

        let set = engine.apply(EngineEvent::ModeLoaded {
            mode: ModeId(3),
            features: vec![trip(1)],
        });
        // selection order, not load order
        assert_eq!(layer_modes(&set), vec![ModeId(3), ModeId(1)]);
    }

    #[test]
    fn test_unselected_load_does_not_recompute() {
        let mut engine = orchestrator(&[1]);
        let before = engine.recompute();

        let after = engine.apply(EngineEvent::ModeLoaded {
            mode: ModeId(2),
            features: vec![trip(1)],
        });
        assert!(Arc::ptr_eq(&before, &after));

        let set = engine.apply(EngineEvent::ToggleMode(ModeId(2)));
        assert_eq!(layer_modes(&set), vec![ModeId(2)]);
    }

    #[test]
    fn test_each_change_replaces_output() {
        let mut engine = orchestrator(&[1]);
        engine.apply(EngineEvent::ModeLoaded {
            mode: ModeId(1),
            features: vec![trip(1), trip(2)],
        });
        let all = engine.layers();
        assert_eq!(all.layers[0].edges[0].count, 2);

        let narrowed = engine.apply(EngineEvent::ToggleFacet(Facet::Period, 2));
        assert_eq!(narrowed.layers[0].edges[0].count, 1);
        assert_eq!(narrowed.generation, all.generation + 1);
        // previous output untouched
        assert_eq!(all.layers[0].edges[0].count, 2);

        // five of six periods selected, so bulk toggle fills the set first
        let full = engine.apply(EngineEvent::ToggleAllFacet(Facet::Period));
        assert_eq!(full.layers[0].edges[0].count, 2);
        let none = engine.apply(EngineEvent::ToggleAllFacet(Facet::Period));
        assert!(none.layers[0].edges.is_empty());
    }

    #[tokio::test]
    async fn test_engine_publishes_updates() {
        let (handle, task) = spawn_engine(orchestrator(&[5]));
        let mut layers = handle.subscribe();
        assert_eq!(handle.layers().generation, 1);

        handle
            .send(EngineEvent::ModeLoaded {
                mode: ModeId(5),
                features: vec![trip(1)],
            })
            .unwrap();
        layers.changed().await.unwrap();
        let set = layers.borrow_and_update().clone();
        assert_eq!(layer_modes(&set), vec![ModeId(5)]);

        handle.send(EngineEvent::ToggleAllModes).unwrap();
        layers.changed().await.unwrap();
        let set = layers.borrow_and_update().clone();
        // every mode selected, only mode 5 has data
        assert_eq!(set.layers.len(), 1);

        drop(layers);
        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_answers_with_its_own_set() {
        let (handle, task) = spawn_engine(orchestrator(&[2]));

        let loaded = handle
            .request(EngineEvent::ModeLoaded {
                mode: ModeId(2),
                features: vec![trip(1), trip(3)],
            })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(loaded.generation, 2);
        assert_eq!(loaded.layers[0].edges[0].count, 2);

        let reply = handle
            .request(EngineEvent::ToggleFacet(Facet::Period, 1))
            .unwrap();
        handle
            .send(EngineEvent::ToggleFacet(Facet::Period, 3))
            .unwrap();

        let mut layers = handle.subscribe();
        let latest = layers
            .wait_for(|set| set.generation == 4)
            .await
            .unwrap()
            .clone();
        assert!(latest.layers[0].edges.is_empty());

        // published state has moved on, the reply has not
        let own = reply.await.unwrap();
        assert_eq!(own.generation, 3);
        assert_eq!(own.layers[0].edges[0].count, 1);

        drop(layers);
        drop(handle);
        task.await.unwrap();
    }
}
