use crate::mercator::{self, ProjectionError, TileId};
use crate::position::{Pixels, Position};
use crate::zoom::Zoom;

/// Everything the engine needs to know about what should currently be on screen. A `Viewport` is
/// an immutable value built by the input layer and passed to every render call; the engine never
/// holds on to one between calls, so there is no stale shared center to get out of sync.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Viewport {
    /// Geographical center of the view.
    pub center: Position,

    /// Current zoom, possibly fractional during an animated transition.
    pub zoom: Zoom,

    /// How many tiles out from the center tile should be considered visible.
    pub range: u32,

    /// Size of the source's tiles in pixels.
    pub tile_size: u32,
}

impl Viewport {
    pub fn new(center: Position, zoom: Zoom, range: u32, tile_size: u32) -> Self {
        Self {
            center,
            zoom,
            range,
            tile_size,
        }
    }

    /// Center position projected on the world bitmap at the rounded zoom level.
    pub fn center_pixel(&self) -> Result<Pixels, ProjectionError> {
        mercator::project(self.center, f64::from(self.zoom.round()), self.tile_size)
    }

    /// Tile under the center of the view.
    pub fn center_tile(&self) -> Result<TileId, ProjectionError> {
        mercator::tile_id(self.center, self.zoom.round(), self.tile_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::lat_lon;

    fn viewport_at_null_island() -> Viewport {
        Viewport::new(lat_lon(0., 0.), Zoom::try_from(2.).unwrap(), 1, 256)
    }

    #[test]
    fn center_pixel_and_tile() {
        let viewport = viewport_at_null_island();

        let pixel = viewport.center_pixel().unwrap();
        approx::assert_relative_eq!(pixel.x(), 512.);
        approx::assert_relative_eq!(pixel.y(), 512.);

        assert_eq!(
            TileId { x: 2, y: 2, zoom: 2 },
            viewport.center_tile().unwrap()
        );
    }

    #[test]
    fn fractional_zoom_uses_the_rounded_level() {
        let mut viewport = viewport_at_null_island();
        viewport.zoom = Zoom::try_from(2.4).unwrap();

        assert_eq!(2, viewport.center_tile().unwrap().zoom);
    }

    #[test]
    fn polar_center_is_rejected() {
        let mut viewport = viewport_at_null_island();
        viewport.center = lat_lon(89., 0.);

        assert!(viewport.center_tile().is_err());
    }
}
