//! Project the lat/lon coordinates into a 2D x/y using the Web Mercator.
//! <https://en.wikipedia.org/wiki/Web_Mercator_projection>
//! <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>

use crate::position::{Pixels, Position, lon_lat};
use std::f64::consts::PI;

// zoom level   tile coverage  number of tiles  tile size(*) in degrees
// 0            1 tile         1 tile           360° x 170.1022°
// 1            2 × 2 tiles    4 tiles          180° x 85.0511°
// 2            4 × 4 tiles    16 tiles         90° x [variable]

/// Latitude of the Web Mercator singularity cutoff. Positions closer to the poles cannot be
/// projected.
const LATITUDE_LIMIT: f64 = 85.05112878;

/// Number of tiles per axis at the given zoom level.
pub fn total_tiles(zoom: u8) -> u32 {
    2u32.pow(u32::from(zoom))
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    /// The latitude is at or beyond the Mercator singularity, or an input was not finite.
    #[error("position ({lat}, {lon}) cannot be projected")]
    OutOfRange { lat: f64, lon: f64 },
}

/// Project the position into the Mercator projection, scaled to the world bitmap of
/// `tile_size * 2^zoom` pixels per axis.
pub fn project(position: Position, zoom: f64, tile_size: u32) -> Result<Pixels, ProjectionError> {
    let lat = position.y();
    let lon = position.x();

    if !lat.is_finite() || !lon.is_finite() || lat.abs() >= LATITUDE_LIMIT {
        return Err(ProjectionError::OutOfRange { lat, lon });
    }

    // Project into Mercator (cylindrical map projection) and normalize to 0-1 range.
    let x = (lon + 180.) / 360.;
    let sin_lat = lat.to_radians().sin();
    let y = 0.5 - ((1. + sin_lat) / (1. - sin_lat)).ln() / (4. * PI);

    let map_size = f64::from(tile_size) * 2f64.powf(zoom);
    Ok(Pixels::new(x * map_size, y * map_size))
}

/// Transforms a location on the world bitmap back into a geographical position.
pub fn unproject(pixels: Pixels, zoom: f64, tile_size: u32) -> Position {
    let map_size = f64::from(tile_size) * 2f64.powf(zoom);

    let x = pixels.x() / map_size;
    let y = pixels.y() / map_size;

    let lon = x * 360. - 180.;
    let lat = (PI * (1. - 2. * y)).sinh().atan().to_degrees();

    lon_lat(lon, lat)
}

/// Calculate the tile coordinates for the given position.
pub fn tile_id(
    position: Position,
    zoom: u8,
    tile_size: u32,
) -> Result<TileId, ProjectionError> {
    let pixels = project(position, f64::from(zoom), tile_size)?;
    let tile_size = f64::from(tile_size);

    Ok(TileId {
        x: (pixels.x() / tile_size).floor() as u32,
        y: (pixels.y() / tile_size).floor() as u32,
        zoom,
    })
}

/// Identifies a tile in the tile grid. The canonical text form is `zoom/x/y`, matching the usual
/// slippy map path convention.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct TileId {
    /// X number of the tile.
    pub x: u32,

    /// Y number of the tile.
    pub y: u32,

    /// Zoom level, where 0 means no zoom.
    /// See: <https://wiki.openstreetmap.org/wiki/Zoom_levels>
    pub zoom: u8,
}

impl TileId {
    /// Tile position (in pixels) on the world bitmap.
    pub fn project(&self, tile_size: f64) -> Pixels {
        Pixels::new(f64::from(self.x) * tile_size, f64::from(self.y) * tile_size)
    }

    /// Whether the tile exists on the grid of its zoom level.
    pub fn valid(&self) -> bool {
        self.x < total_tiles(self.zoom) && self.y < total_tiles(self.zoom)
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}
