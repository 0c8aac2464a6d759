//! The tile engine: decides which tiles must be on screen, keeps them resident, and fetches
//! what is missing.

use std::collections::{HashMap, HashSet, hash_map::Entry};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::channel::mpsc::{Receiver, Sender, channel};

use crate::cache::FifoCache;
use crate::io::fetch::{Completion, Fetch, fetch_continuously};
use crate::io::runtime::Runtime;
use crate::mercator::{ProjectionError, TileId};
use crate::position::Pixels;
use crate::slots::{SlotId, SlotPool, SlotState};
use crate::viewport::Viewport;
use crate::visibility;

/// Knobs of the engine. Each one trades memory or bandwidth for smoothness in its own way.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct EngineOptions {
    /// Extra ring of tiles kept resident beyond the viewport's range, so small pans do not
    /// flash blank edges.
    pub buffer_margin: u32,

    /// How many zoom levels above and below the current one to prefetch into the cache.
    /// Zero disables prefetching.
    pub zoom_buffer: u8,

    /// Maximum number of cached tile payloads.
    pub cache_size: NonZeroUsize,

    /// Highest zoom level tiles are requested for.
    pub max_zoom: u8,
}

impl Default for EngineOptions {
    fn default() -> Self {
        // Just an arbitrary value which seemed right.
        #[allow(clippy::unwrap_used)]
        let cache_size = NonZeroUsize::new(256).unwrap();

        Self {
            buffer_margin: 1,
            zoom_buffer: 1,
            cache_size,
            max_zoom: 19,
        }
    }
}

#[derive(Clone, Default)]
pub struct Stats {
    /// Number of tiles that are currently being fetched.
    pub in_progress: usize,
}

/// One tile the engine currently keeps on screen, for the renderer to draw.
pub struct ActiveTile<'a> {
    pub tile_id: TileId,

    /// Screen offset of the tile's top-left corner relative to the viewport center, in pixels.
    pub offset: Pixels,

    /// Raw image bytes, or `None` while the tile is being fetched or its fetch failed. The
    /// renderer shows its placeholder then.
    pub payload: Option<&'a Bytes>,
}

/// Keeps the visible set of tiles resident across render passes. It must persist between
/// passes; creating one spawns the IO thread that fetches tiles in the background.
pub struct TileEngine {
    options: EngineOptions,
    cache: FifoCache,
    pool: SlotPool,

    /// Tiles currently holding a slot. At most one slot per tile.
    active: HashMap<TileId, SlotId>,

    /// The visible set of the previous render pass.
    visible: HashSet<TileId>,

    /// Tiles with a fetch on the wire, visible or not. Guards against requesting the same tile
    /// twice per miss.
    in_flight: HashSet<TileId>,

    /// Tiles to be fetched by the IO thread.
    request_tx: Sender<TileId>,

    /// Fetches that finished and await application.
    completion_rx: Receiver<Completion>,

    stats: Arc<Mutex<Stats>>,

    #[allow(dead_code)] // Significant Drop
    runtime: Runtime,
}

impl TileEngine {
    pub fn new(fetch: impl Fetch + Send + Sync + 'static, options: EngineOptions) -> Self {
        let stats = Arc::new(Mutex::new(Stats::default()));

        // This ensures that newer requests are prioritized.
        let channel_size = fetch.max_concurrency();

        let (request_tx, request_rx) = channel(channel_size);
        let (completion_tx, completion_rx) = channel(channel_size);

        // This will run concurrently in a loop, handling fetches and talking to us via the
        // channels.
        let runtime = Runtime::new(fetch_continuously(
            fetch,
            stats.clone(),
            request_rx,
            completion_tx,
        ));

        Self {
            cache: FifoCache::new(options.cache_size),
            pool: SlotPool::new(),
            active: HashMap::new(),
            visible: HashSet::new(),
            in_flight: HashSet::new(),
            request_tx,
            completion_rx,
            stats,
            runtime,
            options,
        }
    }

    /// One render pass: apply finished fetches, diff the visible set against the previous one,
    /// reposition what stayed, release what left, acquire and resolve what entered, and
    /// prefetch around the edges.
    pub fn render(&mut self, viewport: &Viewport) -> Result<(), ProjectionError> {
        self.apply_completed();

        let new_visible = visibility::visible_tiles(viewport, self.options.buffer_margin)?;
        let center = viewport.center_pixel()?;

        // Tiles which left visibility give their slots back to the pool. An in-flight fetch
        // for such a tile is not cancelled; its completion will miss the active map and only
        // feed the cache.
        let leaving: Vec<TileId> = self.visible.difference(&new_visible).copied().collect();
        for tile_id in leaving {
            if let Some(slot_id) = self.active.remove(&tile_id) {
                self.pool.release(slot_id);
                log::trace!("Released tile: {tile_id}.");
            }
        }

        let tile_size = f64::from(viewport.tile_size);
        for &tile_id in &new_visible {
            let offset = tile_id.project(tile_size) - center;

            match self.active.entry(tile_id) {
                Entry::Occupied(entry) => {
                    // The tile stayed visible; only its screen position may have moved.
                    self.pool.get_mut(*entry.get()).offset = offset;
                }
                Entry::Vacant(entry) => {
                    let state = if let Some(payload) = self.cache.get(&tile_id) {
                        SlotState::Resident(payload.clone())
                    } else {
                        SlotState::Pending { dispatched: false }
                    };
                    entry.insert(self.pool.acquire(offset, state));
                }
            }
        }

        self.dispatch_pending();
        self.prefetch(viewport)?;

        self.visible = new_visible;
        Ok(())
    }

    /// Tiles currently on screen, with payloads where available.
    pub fn active_tiles(&self) -> impl Iterator<Item = ActiveTile<'_>> {
        self.active.iter().map(|(&tile_id, &slot_id)| {
            let slot = self.pool.get(slot_id);
            ActiveTile {
                tile_id,
                offset: slot.offset,
                payload: match &slot.state {
                    SlotState::Resident(payload) => Some(payload),
                    SlotState::Pending { .. } | SlotState::Empty => None,
                },
            }
        })
    }

    pub fn stats(&self) -> Stats {
        if let Ok(stats) = self.stats.lock() {
            stats.clone()
        } else {
            // I really do not want this to return a Result.
            Stats::default()
        }
    }

    /// Return every slot to the pool, e.g. when the map goes off screen for a while. The cache
    /// is kept, so coming back is cheap.
    pub fn release_all(&mut self) {
        for (_, slot_id) in self.active.drain() {
            self.pool.release(slot_id);
        }
        self.visible.clear();
    }

    /// Full teardown: releases every slot and empties the cache.
    pub fn clear(&mut self) {
        self.release_all();
        self.cache.clear();
    }

    /// Drain every finished fetch. Successes always feed the cache; a slot is touched only if
    /// the tile still maps to one, so a completion arriving after its tile left visibility is
    /// harmless no matter who occupies the reused slot by now.
    fn apply_completed(&mut self) {
        loop {
            match self.completion_rx.try_next() {
                Ok(Some((tile_id, result))) => {
                    self.in_flight.remove(&tile_id);

                    match result {
                        Ok(payload) => {
                            self.cache.put(tile_id, payload.clone());
                            if let Some(&slot_id) = self.active.get(&tile_id) {
                                self.pool.get_mut(slot_id).state = SlotState::Resident(payload);
                            }
                        }
                        Err(error) => {
                            log::debug!("Tile {tile_id} stays empty: {error}.");
                            if let Some(&slot_id) = self.active.get(&tile_id) {
                                let slot = self.pool.get_mut(slot_id);
                                if matches!(&slot.state, SlotState::Pending { .. }) {
                                    slot.state = SlotState::Empty;
                                }
                            }
                        }
                    }
                }
                Err(_) => {
                    // Just ignore. It means that nothing finished fetching.
                    break;
                }
                Ok(None) => {
                    log::error!("IO thread is dead.");
                    break;
                }
            }
        }
    }

    /// Try to put every waiting miss on the wire. A full request queue is not an error; the
    /// leftovers simply wait for the next render pass, like the cooperative wait they replace.
    fn dispatch_pending(&mut self) {
        for (&tile_id, &slot_id) in &self.active {
            if !matches!(
                &self.pool.get(slot_id).state,
                SlotState::Pending { dispatched: false }
            ) {
                continue;
            }

            if self.in_flight.contains(&tile_id) {
                // Already on the wire, e.g. as a prefetch.
                self.pool.get_mut(slot_id).state = SlotState::Pending { dispatched: true };
                continue;
            }

            match self.request_tx.try_send(tile_id) {
                Ok(()) => {
                    log::trace!("Requested tile: {tile_id}.");
                    self.in_flight.insert(tile_id);
                    self.pool.get_mut(slot_id).state = SlotState::Pending { dispatched: true };
                }
                Err(error) if error.is_full() => {
                    log::trace!("Request queue is full.");
                    break;
                }
                Err(_) => {
                    log::error!("IO thread is dead.");
                    break;
                }
            }
        }
    }

    /// Request tiles of the adjacent zoom levels, cache-population only. No slots are involved;
    /// whatever arrives waits in the cache for the zoom change that needs it.
    fn prefetch(&mut self, viewport: &Viewport) -> Result<(), ProjectionError> {
        if self.options.zoom_buffer == 0 {
            return Ok(());
        }

        let candidates = visibility::prefetch_tiles(
            viewport,
            self.options.buffer_margin,
            self.options.zoom_buffer,
            self.options.max_zoom,
        )?;

        for tile_id in candidates {
            if self.cache.contains(&tile_id)
                || self.in_flight.contains(&tile_id)
                || self.active.contains_key(&tile_id)
            {
                continue;
            }

            match self.request_tx.try_send(tile_id) {
                Ok(()) => {
                    log::trace!("Prefetching tile: {tile_id}.");
                    self.in_flight.insert(tile_id);
                }
                Err(error) if error.is_full() => break,
                Err(_) => {
                    log::error!("IO thread is dead.");
                    break;
                }
            }
        }

        Ok(())
    }
}
