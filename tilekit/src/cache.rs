//! Bounded in-memory tile cache with FIFO eviction.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;

use bytes::Bytes;

use crate::mercator::TileId;

/// Tile payloads keyed by [`TileId`], evicted strictly in insertion order once the limit is
/// reached. A hit does not refresh an entry's position; tiles are idempotent and re-fetchable,
/// so plain FIFO is enough.
#[derive(Debug)]
pub struct FifoCache {
    values: HashMap<TileId, Bytes>,
    queue: VecDeque<TileId>,
    limit: NonZeroUsize,
}

impl FifoCache {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            values: HashMap::new(),
            queue: VecDeque::new(),
            limit,
        }
    }

    /// Cached payload for the tile, if any. Never changes the eviction order.
    pub fn get(&self, tile_id: &TileId) -> Option<&Bytes> {
        self.values.get(tile_id)
    }

    pub fn contains(&self, tile_id: &TileId) -> bool {
        self.values.contains_key(tile_id)
    }

    /// Insert a payload, evicting the oldest insertions if the cache would grow past its limit.
    /// Re-inserting a present key replaces the payload but keeps the original queue position.
    pub fn put(&mut self, tile_id: TileId, payload: Bytes) {
        if self.values.insert(tile_id, payload).is_some() {
            return;
        }

        self.queue.push_back(tile_id);

        while self.values.len() > self.limit.get() {
            if let Some(oldest) = self.queue.pop_front() {
                self.values.remove(&oldest);
                log::trace!("Evicted tile {oldest} from the cache.");
            } else {
                log::error!("Tile cache queue lost track of {} entries.", self.values.len());
                break;
            }
        }

        debug_assert!(self.values.len() <= self.limit.get());
        debug_assert_eq!(self.values.len(), self.queue.len());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Drop everything. Meant for full teardown; during normal panning and zooming the cache is
    /// what saves tiles from being re-fetched every render.
    pub fn clear(&mut self) {
        self.values.clear();
        self.queue.clear();
    }
}
