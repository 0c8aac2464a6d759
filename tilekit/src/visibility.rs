//! Which tiles must be resident for a given viewport.

use std::collections::HashSet;

use crate::mercator::{self, ProjectionError, TileId};
use crate::viewport::Viewport;

/// Tiles the viewport needs resident right now: the `range + buffer_margin` ring around the
/// center tile, clipped to the grid. The buffer margin keeps tiles just outside the strict view
/// loaded, so small pans do not flash blank edges.
pub fn visible_tiles(
    viewport: &Viewport,
    buffer_margin: u32,
) -> Result<HashSet<TileId>, ProjectionError> {
    let reach = i64::from(viewport.range + buffer_margin);
    ring(viewport, viewport.zoom.round(), reach)
}

/// Tiles worth having in the cache for an imminent zoom change: the same ring repeated at
/// `zoom ± 1..=zoom_buffer`, clipped to `0..=max_zoom`. These are cache candidates only; the
/// caller must not allocate slots for them.
pub fn prefetch_tiles(
    viewport: &Viewport,
    buffer_margin: u32,
    zoom_buffer: u8,
    max_zoom: u8,
) -> Result<Vec<TileId>, ProjectionError> {
    let base = viewport.zoom.round();
    let reach = i64::from(viewport.range + buffer_margin);
    let mut tiles = Vec::new();

    for distance in 1..=zoom_buffer {
        if let Some(zoom) = base.checked_sub(distance) {
            tiles.extend(ring(viewport, zoom, reach)?);
        }
        if let Some(zoom) = base.checked_add(distance) {
            if zoom <= max_zoom {
                tiles.extend(ring(viewport, zoom, reach)?);
            }
        }
    }

    Ok(tiles)
}

fn ring(
    viewport: &Viewport,
    zoom: u8,
    reach: i64,
) -> Result<HashSet<TileId>, ProjectionError> {
    let center = mercator::tile_id(viewport.center, zoom, viewport.tile_size)?;
    let mut tiles = HashSet::new();

    for dx in -reach..=reach {
        for dy in -reach..=reach {
            let x = i64::from(center.x) + dx;
            let y = i64::from(center.y) + dy;

            if x < 0 || y < 0 {
                continue;
            }

            let tile_id = TileId {
                x: x as u32,
                y: y as u32,
                zoom,
            };

            if tile_id.valid() {
                tiles.insert(tile_id);
            }
        }
    }

    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mercator::unproject;
    use crate::position::Pixels;
    use crate::zoom::Zoom;

    /// Viewport whose center falls in the middle of the given tile.
    fn viewport_centered_on(x: u32, y: u32, zoom: u8, range: u32) -> Viewport {
        let center_pixel = Pixels::new(
            (f64::from(x) + 0.5) * 256.,
            (f64::from(y) + 0.5) * 256.,
        );
        Viewport::new(
            unproject(center_pixel, f64::from(zoom), 256),
            Zoom::try_from(f64::from(zoom)).unwrap(),
            range,
            256,
        )
    }

    #[test]
    fn ring_spans_range_plus_margin() {
        let viewport = viewport_centered_on(10, 10, 5, 2);
        let visible = visible_tiles(&viewport, 1).unwrap();

        // range 2 + margin 1 means 3 tiles out in each direction.
        assert_eq!(49, visible.len());
        assert!(visible.iter().all(|t| t.zoom == 5));
        assert!(visible.iter().all(|t| (7..=13).contains(&t.x)));
        assert!(visible.iter().all(|t| (7..=13).contains(&t.y)));
    }

    #[test]
    fn ring_is_clipped_at_the_grid_edge() {
        // Center tile (0, 0) at zoom 2: the negative half of the ring does not exist.
        let viewport = viewport_centered_on(0, 0, 2, 1);
        let visible = visible_tiles(&viewport, 0).unwrap();

        assert_eq!(4, visible.len());
        assert!(visible.iter().all(|t| t.x <= 1 && t.y <= 1));
    }

    #[test]
    fn unchanged_viewport_computes_the_same_set() {
        let viewport = viewport_centered_on(10, 10, 5, 2);

        assert_eq!(
            visible_tiles(&viewport, 1).unwrap(),
            visible_tiles(&viewport, 1).unwrap()
        );
    }

    #[test]
    fn nine_tiles_around_null_island() {
        let viewport = Viewport::new(
            crate::position::lat_lon(0., 0.),
            Zoom::try_from(2.).unwrap(),
            1,
            256,
        );
        let visible = visible_tiles(&viewport, 0).unwrap();

        let expected: HashSet<TileId> = [
            (1, 1),
            (1, 2),
            (1, 3),
            (2, 1),
            (2, 2),
            (2, 3),
            (3, 1),
            (3, 2),
            (3, 3),
        ]
        .into_iter()
        .map(|(x, y)| TileId { x, y, zoom: 2 })
        .collect();

        assert_eq!(expected, visible);
    }

    #[test]
    fn prefetch_covers_adjacent_zoom_levels_only() {
        let viewport = viewport_centered_on(2, 2, 2, 0);
        let prefetch = prefetch_tiles(&viewport, 0, 1, 19).unwrap();

        assert!(!prefetch.is_empty());
        assert!(prefetch.iter().all(|t| t.zoom == 1 || t.zoom == 3));
    }

    #[test]
    fn prefetch_respects_the_zoom_bounds() {
        // At zoom 0 there is nothing below, and max_zoom 0 forbids anything above.
        let viewport = viewport_centered_on(0, 0, 0, 0);
        assert!(prefetch_tiles(&viewport, 0, 2, 0).unwrap().is_empty());
    }
}
