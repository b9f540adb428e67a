//! Filesystem tile source for on-disk tile pyramids.

use super::{FetchError, TileSource};
use bytes::Bytes;
use std::path::PathBuf;
use tracing::trace;

/// Reads tiles from a directory laid out as `{zoom}/{row}/{col}.{ext}`.
///
/// This matches the layout produced by common offline map downloaders,
/// where each zoom level is a directory of row directories holding one
/// encoded image per column.
#[derive(Debug, Clone)]
pub struct FsTileSource {
    root: PathBuf,
    extension: String,
}

impl FsTileSource {
    /// Creates a source rooted at `root`, expecting `.jpg` tiles.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "jpg".to_string(),
        }
    }

    /// Overrides the tile file extension (without the leading dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn path_for(&self, row: u32, col: u32, zoom: u8) -> PathBuf {
        self.root
            .join(zoom.to_string())
            .join(row.to_string())
            .join(format!("{}.{}", col, self.extension))
    }
}

impl TileSource for FsTileSource {
    async fn fetch_tile(&self, row: u32, col: u32, zoom: u8) -> Result<Bytes, FetchError> {
        let path = self.path_for(row, col, zoom);
        trace!(path = %path.display(), "reading tile");

        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    fn name(&self) -> &str {
        "fs"
    }
}
