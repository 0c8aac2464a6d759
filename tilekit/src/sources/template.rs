use super::{Attribution, TileSource};
use crate::TileId;

/// Tile server addressed by the common `{base_url}/{zoom}/{x}/{y}.png` path convention. The base
/// URL is treated as an opaque string; whoever configures it is responsible for it pointing at a
/// real tile pyramid.
pub struct TemplateSource {
    base_url: String,
    attribution: Attribution,
}

impl TemplateSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            attribution: Attribution { text: "", url: "" },
        }
    }

    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }
}

impl TileSource for TemplateSource {
    fn tile_url(&self, tile_id: TileId) -> String {
        format!(
            "{}/{}/{}/{}.png",
            self.base_url, tile_id.zoom, tile_id.x, tile_id.y
        )
    }

    fn attribution(&self) -> Attribution {
        self.attribution.clone()
    }
}
