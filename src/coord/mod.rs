//! Tile coordinate type definitions.

use std::fmt;

/// Identifies one renderable tile at one resolution.
///
/// A coordinate names a grid position (`row`, `col`) at a `zoom` level,
/// together with the `sub_sample` factor it should be decoded at. Two
/// coordinates that differ only in `sub_sample` are distinct tiles: the
/// pipeline deduplicates in-flight work on the full four-field key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level, 0 = whole world in one tile.
    pub zoom: u8,
    /// Y coordinate (north-south), 0 at north.
    pub row: u32,
    /// X coordinate (east-west), 0 at west.
    pub col: u32,
    /// Downsampling factor. `0` decodes at native resolution into a pooled
    /// buffer; a power of two (2, 4, 8, ...) decodes at `1/sub_sample` of
    /// the native width and height with no buffer reuse.
    pub sub_sample: u32,
}

impl TileCoord {
    /// Creates a coordinate decoded at native resolution.
    pub fn new(zoom: u8, row: u32, col: u32) -> Self {
        Self {
            zoom,
            row,
            col,
            sub_sample: 0,
        }
    }

    /// Creates a coordinate decoded at reduced resolution.
    pub fn sub_sampled(zoom: u8, row: u32, col: u32, sub_sample: u32) -> Self {
        Self {
            zoom,
            row,
            col,
            sub_sample,
        }
    }

    /// Returns true if this tile decodes at native resolution.
    #[inline]
    pub fn is_native(&self) -> bool {
        self.sub_sample == 0
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sub_sample == 0 {
            write!(f, "z{}/{}:{}", self.zoom, self.row, self.col)
        } else {
            write!(
                f,
                "z{}/{}:{}/{}",
                self.zoom, self.row, self.col, self.sub_sample
            )
        }
    }
}
