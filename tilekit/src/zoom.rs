#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("invalid zoom level")]
pub struct InvalidZoom;

/// Map zoom level. Fractional values are fine during interpolated transitions; tile indexing
/// always rounds to the nearest integer level.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Zoom(f64);

impl TryFrom<f64> for Zoom {
    type Error = InvalidZoom;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        // Mapnik supports zooms up to 19.
        // https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames#Zoom_levels
        if !(0. ..=19.).contains(&value) {
            Err(InvalidZoom)
        } else {
            Ok(Self(value))
        }
    }
}

// The reverse shouldn't be implemented, since we already have TryFrom<f64>.
#[allow(clippy::from_over_into)]
impl Into<f64> for Zoom {
    fn into(self) -> f64 {
        self.0
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self(16.)
    }
}

impl Zoom {
    /// Integer zoom level used for tile indexing.
    pub fn round(&self) -> u8 {
        self.0.round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructing_zoom() {
        assert_eq!(16, Zoom::default().round());
        assert_eq!(19, Zoom::try_from(19.).unwrap().round());
        assert_eq!(InvalidZoom, Zoom::try_from(20.).unwrap_err());
        assert_eq!(InvalidZoom, Zoom::try_from(-1.).unwrap_err());
        assert_eq!(InvalidZoom, Zoom::try_from(f64::NAN).unwrap_err());
    }

    #[test]
    fn fractional_zoom_rounds_to_nearest_level() {
        assert_eq!(5, Zoom::try_from(5.4).unwrap().round());
        assert_eq!(6, Zoom::try_from(5.5).unwrap().round());
    }
}
