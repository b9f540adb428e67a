//! # tileflow
//!
//! An asynchronous tile collection pipeline for pannable, zoomable maps.
//!
//! A map view is tiled: as the user pans and zooms, the set of tiles that
//! should be on screen changes continuously. `tileflow` sits between the
//! viewport logic and the renderer. The viewport publishes snapshots of
//! the wanted tile set, and the pipeline fetches, decodes, and delivers
//! the corresponding images while guaranteeing that:
//!
//! - each coordinate is fetched at most once while it stays wanted,
//! - work for tiles that scrolled out of view is cancelled before its
//!   fetch begins,
//! - decoding happens on lowest-priority threads that never compete with
//!   rendering,
//! - a failed or unreadable tile is simply absent; it never stalls or
//!   kills the pipeline.
//!
//! Start with [`TileCollector`] and the [`pipeline`] module docs. Tile
//! bytes come from a [`TileSource`]: use [`HttpTileSource`] or
//! [`FsTileSource`], or implement the trait for a custom backend.

pub mod config;
pub mod coord;
mod decode;
pub mod logging;
pub mod pipeline;
pub mod pool;
pub mod source;

pub use config::{DecodeLimits, PipelineConfig};
pub use coord::TileCoord;
pub use pipeline::{CollectorHandle, DecodedTile, PipelineError, TileCollector};
pub use pool::BufferPool;
pub use source::{FetchError, FsTileSource, HttpTileSource, TileSource};

/// Crate version, from the package manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
