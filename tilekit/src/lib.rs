#![doc = include_str!("../README.md")]
#![deny(clippy::unwrap_used, rustdoc::broken_intra_doc_links)]

mod cache;
mod engine;
mod io;
mod mercator;
mod position;
mod slots;
pub mod sources;
#[cfg(test)]
mod testutil;
mod viewport;
mod visibility;
mod zoom;

pub use cache::FifoCache;
pub use engine::{ActiveTile, EngineOptions, Stats, TileEngine};
pub use io::fetch::{Fetch, FetchError};
pub use io::http::{HeaderValue, HttpFetch, HttpOptions, MaxParallelDownloads};
pub use mercator::{ProjectionError, TileId, project, tile_id, total_tiles, unproject};
pub use position::{Pixels, Position, lat_lon, lon_lat};
pub use viewport::Viewport;
pub use visibility::{prefetch_tiles, visible_tiles};
pub use zoom::{InvalidZoom, Zoom};
