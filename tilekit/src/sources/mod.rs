//! Some common HTTP tile sources. Make sure you follow terms of usage of the particular source.

mod openstreetmap;
mod template;

use crate::mercator::TileId;
pub use openstreetmap::OpenStreetMap;
pub use template::TemplateSource;

/// Who to credit for the tiles. Engine-independent; whatever displays the map should show this
/// somewhere.
#[derive(Debug, Clone)]
pub struct Attribution {
    pub text: &'static str,
    pub url: &'static str,
}

/// Remote tile server definition, source for the [`crate::HttpFetch`].
pub trait TileSource {
    fn tile_url(&self, tile_id: TileId) -> String;
    fn attribution(&self) -> Attribution;

    /// Size of each tile, should be a multiple of 256.
    fn tile_size(&self) -> u32 {
        256
    }

    fn max_zoom(&self) -> u8 {
        19
    }
}
