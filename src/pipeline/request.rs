//! Shared data types flowing between the collector and its workers.

use crate::coord::TileCoord;
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One tile coordinate currently inside the pipeline.
///
/// Created by the collector when a coordinate first appears in a snapshot,
/// shared with the worker that processes it. The `cancelled` flag is the
/// only cross-thread signal: the collector is its sole writer, the worker
/// reads it once before fetching. Relaxed ordering suffices: the contract
/// is eventual visibility, and a cancellation that lands after the check
/// only means one tile's work is not saved, never an incorrect state.
#[derive(Debug)]
pub struct PendingRequest {
    coord: TileCoord,
    cancelled: AtomicBool,
}

impl PendingRequest {
    pub(crate) fn new(coord: TileCoord) -> Self {
        Self {
            coord,
            cancelled: AtomicBool::new(false),
        }
    }

    /// The coordinate this request is for.
    #[inline]
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// True once the coordinate has dropped out of the visible set.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Marks the request cancelled. Collector-only.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// A worker's outcome for one [`PendingRequest`].
///
/// Exactly one report is produced per dispatched request. `tile` is `None`
/// when the request was cancelled before its fetch began, when the fetch or
/// decode failed recoverably, or when the memory guard skipped the decode.
#[derive(Debug)]
pub struct CompletionReport {
    pub(crate) request: Arc<PendingRequest>,
    pub(crate) tile: Option<DecodedTile>,
}

impl CompletionReport {
    pub(crate) fn new(request: Arc<PendingRequest>, tile: Option<DecodedTile>) -> Self {
        Self { request, tile }
    }
}

/// A successfully decoded tile, ready for compositing.
///
/// Tiles are delivered in completion order, which is unrelated to dispatch
/// order; consumers must be order-agnostic. When a
/// [`BufferPool`](crate::pool::BufferPool) is in use and `sub_sample == 0`,
/// the image's backing storage came from the pool; give it back with
/// [`DynamicImage::into_bytes`] once composited to keep recycling
/// effective.
#[derive(Debug)]
pub struct DecodedTile {
    /// Zoom level of the tile.
    pub zoom: u8,
    /// Row of the tile.
    pub row: u32,
    /// Column of the tile.
    pub col: u32,
    /// Sub-sampling factor the tile was decoded at (0 = native).
    pub sub_sample: u32,
    /// The decoded pixels.
    pub image: DynamicImage,
}

impl DecodedTile {
    pub(crate) fn new(coord: TileCoord, image: DynamicImage) -> Self {
        Self {
            zoom: coord.zoom,
            row: coord.row,
            col: coord.col,
            sub_sample: coord.sub_sample,
            image,
        }
    }

    /// The coordinate this tile renders at.
    pub fn coord(&self) -> TileCoord {
        TileCoord {
            zoom: self.zoom,
            row: self.row,
            col: self.col,
            sub_sample: self.sub_sample,
        }
    }
}
