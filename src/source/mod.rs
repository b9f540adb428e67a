//! Tile source trait and implementations.
//!
//! A [`TileSource`] hands the pipeline the encoded bytes of one tile, keyed
//! by grid position and zoom level. Sources are shared across the worker
//! pool and must tolerate concurrent fetches; the pipeline never issues two
//! concurrent fetches for the same coordinate, but distinct coordinates are
//! fetched in parallel.
//!
//! Two implementations ship with the crate:
//! - [`HttpTileSource`] pulls tiles from a URL-templated tile server.
//! - [`FsTileSource`] reads tiles from an on-disk tile pyramid.

mod fs;
mod http;

pub use fs::FsTileSource;
pub use http::HttpTileSource;

use bytes::Bytes;
use std::future::Future;
use thiserror::Error;

/// Errors that can occur while fetching tile bytes.
///
/// The pipeline treats every variant the same way: the failure is logged,
/// the request resolves to an absent outcome, and no retry is attempted
/// inside the core. A still-visible tile becomes fetchable again once its
/// registry entry cycles out.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP status {status} for tile ({row}, {col}) at zoom {zoom}")]
    HttpStatus {
        status: u16,
        row: u32,
        col: u32,
        zoom: u8,
    },

    /// The request never produced a usable response.
    #[error("transport error: {0}")]
    Transport(String),

    /// Reading the tile from local storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies encoded tile bytes on demand.
///
/// `fetch_tile` may be slow (network or disk); a stalled fetch stalls only
/// the worker that issued it. The returned buffer is released by the worker
/// on every outcome path once decoding is done with it.
pub trait TileSource: Send + Sync + 'static {
    /// Fetches the encoded bytes for one tile.
    fn fetch_tile(
        &self,
        row: u32,
        col: u32,
        zoom: u8,
    ) -> impl Future<Output = Result<Bytes, FetchError>> + Send;

    /// Returns the source's name for logging.
    fn name(&self) -> &str {
        "tile-source"
    }
}
