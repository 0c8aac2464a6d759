//! Reusable pool of tile slots.
//!
//! A slot is the engine's handle for one on-screen tile. Slots are never freed while the engine
//! lives; releasing one pushes its index on a free list so the next acquisition reuses it,
//! keeping pan and zoom free of allocation churn.

use bytes::Bytes;

use crate::position::Pixels;

pub(crate) type SlotId = usize;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SlotState {
    /// Waiting for a payload. `dispatched` is false while the fetch could not be queued yet.
    Pending { dispatched: bool },

    /// Payload applied.
    Resident(Bytes),

    /// The fetch failed; the renderer shows its placeholder.
    Empty,
}

#[derive(Debug)]
pub(crate) struct TileSlot {
    /// Screen offset of the tile's top-left corner relative to the viewport center.
    pub(crate) offset: Pixels,
    pub(crate) state: SlotState,
}

#[derive(Debug, Default)]
pub(crate) struct SlotPool {
    slots: Vec<TileSlot>,
    free: Vec<SlotId>,
}

impl SlotPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn acquire(&mut self, offset: Pixels, state: SlotState) -> SlotId {
        if let Some(id) = self.free.pop() {
            let slot = &mut self.slots[id];
            slot.offset = offset;
            slot.state = state;
            id
        } else {
            self.slots.push(TileSlot { offset, state });
            self.slots.len() - 1
        }
    }

    pub(crate) fn release(&mut self, id: SlotId) {
        // Dropping the payload here, not on reuse, so released slots do not pin cache-sized
        // buffers alive.
        self.slots[id].state = SlotState::Empty;
        self.free.push(id);
    }

    pub(crate) fn get(&self, id: SlotId) -> &TileSlot {
        &self.slots[id]
    }

    pub(crate) fn get_mut(&mut self, id: SlotId) -> &mut TileSlot {
        &mut self.slots[id]
    }

    /// Total slots ever created, reused or not.
    pub(crate) fn allocated(&self) -> usize {
        self.slots.len()
    }
}
