// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use crate::facets::ModeId;
use crate::route_features::RouteFeature;
use ahash::AHashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::warn;

/// Per-mode route collections. Each mode is written at most once and is
/// never mutated after that; readers share the same `Arc`.
#[derive(Debug, Clone, Default)]
pub struct TripSegmentStore {
    collections: AHashMap<ModeId, Arc<[RouteFeature]>>,
}

impl TripSegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false, leaving the store untouched, if the mode was already
    /// populated.
    pub fn insert(&mut self, mode: ModeId, features: Vec<RouteFeature>) -> bool {
        match self.collections.entry(mode) {
            Entry::Occupied(_) => {
                warn!("Mode {} already loaded, ignoring second load", mode);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(features.into());
                true
            }
        }
    }

    pub fn get(&self, mode: ModeId) -> Option<Arc<[RouteFeature]>> {
        self.collections.get(&mode).cloned()
    }

    pub fn contains(&self, mode: ModeId) -> bool {
        self.collections.contains_key(&mode)
    }

    pub fn loaded_modes(&self) -> Vec<ModeId> {
        let mut modes: Vec<ModeId> = self.collections.keys().copied().collect();
        modes.sort();
        modes
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_features::RouteGeometry;

    fn feature() -> RouteFeature {
        RouteFeature {
            geometry: RouteGeometry::Other,
            mode: Some(ModeId(1)),
            period: None,
            purpose: None,
            income: None,
        }
    }

    #[test]
    fn test_first_load_wins() {
        let mut store = TripSegmentStore::new();
        assert!(store.insert(ModeId(3), vec![feature()]));
        assert!(!store.insert(ModeId(3), vec![feature(), feature()]));

        assert_eq!(store.get(ModeId(3)).map(|f| f.len()), Some(1));
        assert!(store.get(ModeId(4)).is_none());
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let mut store = TripSegmentStore::new();
        store.insert(ModeId(1), vec![feature()]);
        let snapshot = store.clone();

        store.insert(ModeId(2), vec![feature()]);
        assert_eq!(snapshot.loaded_modes(), vec![ModeId(1)]);
        assert_eq!(store.loaded_modes(), vec![ModeId(1), ModeId(2)]);
    }
}
