//! The tile collection pipeline.
//!
//! Turns a stream of visible-tile snapshots into a stream of decoded
//! tiles, fetching each coordinate at most once, decoding off the
//! interactive thread, and cancelling work for tiles that scrolled out of
//! view.
//!
//! # Architecture
//!
//! ```text
//! Viewport ──snapshots──► Collector ──dispatch──► Worker pool (N workers)
//!  (watch,                   │                        │
//!   latest wins)             │                TileSource / BufferPool
//!                            │                        │
//!                            ◄──completion reports────┘
//!                            │
//!                            └──decoded tiles──► Tile consumer (unbounded)
//! ```
//!
//! The collector owns the in-flight registry and is its only mutator.
//! Workers run on a dedicated runtime of `max(1, parallelism - 1)`
//! lowest-priority threads, each processing one request at a time.
//!
//! # Example
//!
//! ```no_run
//! use tileflow::{pipeline, HttpTileSource, PipelineConfig, TileCollector, TileCoord};
//!
//! # async fn example() -> Result<(), tileflow::PipelineError> {
//! let source = HttpTileSource::new(
//!     reqwest::Client::new(),
//!     "https://tiles.example.org/{zoom}/{col}/{row}.png",
//! );
//!
//! let (snapshot_tx, snapshot_rx) = pipeline::visible_tiles();
//! let (tile_tx, mut tile_rx) = pipeline::decoded_tiles();
//!
//! let handle = TileCollector::new(source, PipelineConfig::default())
//!     .spawn(snapshot_rx, tile_tx)?;
//!
//! // Viewport logic overwrites the wanted set as the user pans.
//! snapshot_tx.send(vec![TileCoord::new(16, 100, 200)]).ok();
//!
//! while let Some(tile) = tile_rx.recv().await {
//!     // composite the tile
//! }
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod collector;
mod request;
mod runtime;
mod worker;

pub use request::DecodedTile;

use crate::config::PipelineConfig;
use crate::coord::TileCoord;
use crate::pool::BufferPool;
use crate::source::TileSource;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors that can occur while starting the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The decode worker runtime could not be built.
    #[error("failed to build decode runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Creates the visible-set snapshot feed.
///
/// A single-slot, latest-value-wins channel: the viewport overwrites the
/// wanted set rather than enqueueing it, so the collector only ever sees
/// the newest snapshot. Starts empty.
pub fn visible_tiles() -> (
    watch::Sender<Vec<TileCoord>>,
    watch::Receiver<Vec<TileCoord>>,
) {
    watch::channel(Vec::new())
}

/// Creates the decoded-tile delivery feed.
///
/// Unbounded by design: delivery must never block the collector, so a slow
/// consumer cannot stall dedup or cancellation processing.
pub fn decoded_tiles() -> (
    mpsc::UnboundedSender<DecodedTile>,
    mpsc::UnboundedReceiver<DecodedTile>,
) {
    mpsc::unbounded_channel()
}

/// Builds and launches the tile collection pipeline.
///
/// See the [module docs](self) for the overall data flow.
pub struct TileCollector<S> {
    source: Arc<S>,
    pool: Option<Arc<BufferPool>>,
    config: PipelineConfig,
}

impl<S: TileSource> TileCollector<S> {
    /// Creates a collector over a tile source.
    pub fn new(source: S, config: PipelineConfig) -> Self {
        Self {
            source: Arc::new(source),
            pool: None,
            config,
        }
    }

    /// Attaches a buffer pool for full-resolution decode targets.
    ///
    /// Without one, full-resolution decodes allocate fresh storage.
    pub fn with_buffer_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Starts the worker pool and the collector loop.
    ///
    /// Workers run on a dedicated lowest-priority runtime owned by the
    /// returned handle; the collector itself runs on the ambient tokio
    /// runtime. The pipeline stops when `snapshots`' sender is dropped or
    /// [`CollectorHandle::shutdown`] is called.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(
        self,
        snapshots: watch::Receiver<Vec<TileCoord>>,
        output: mpsc::UnboundedSender<DecodedTile>,
    ) -> Result<CollectorHandle, PipelineError> {
        let workers = self.config.worker_count();
        let decode_runtime = runtime::decode_runtime(workers)?;

        // Capacity-one intake: the collector's dispatch suspends until a
        // worker frees the slot, throttling snapshots to decode throughput.
        let (intake_tx, intake_rx) = mpsc::channel(1);
        let intake = Arc::new(Mutex::new(intake_rx));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        for worker_id in 0..workers {
            decode_runtime.spawn(worker::run_worker(
                worker_id,
                Arc::clone(&self.source),
                self.pool.clone(),
                self.config.decode_limits(),
                Arc::clone(&intake),
                completion_tx.clone(),
            ));
        }
        debug!(workers, source = self.source.name(), "tile pipeline started");

        let shutdown = CancellationToken::new();
        let collector = tokio::spawn(collector::run_collector(
            snapshots,
            intake_tx,
            completion_rx,
            output,
            self.config.grace_delay(),
            shutdown.clone(),
        ));

        Ok(CollectorHandle {
            shutdown,
            collector,
            decode_runtime: Some(decode_runtime),
        })
    }
}

/// Handle to a running pipeline.
///
/// Dropping the handle tears the pipeline down without waiting; prefer
/// [`shutdown`](Self::shutdown) for an orderly stop.
pub struct CollectorHandle {
    shutdown: CancellationToken,
    collector: JoinHandle<()>,
    decode_runtime: Option<tokio::runtime::Runtime>,
}

impl CollectorHandle {
    /// Requests shutdown and waits for the collector loop to stop.
    ///
    /// Workers finish the request they are on; fetches already in flight
    /// are not interrupted.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        let _ = (&mut self.collector).await;
        if let Some(runtime) = self.decode_runtime.take() {
            runtime.shutdown_background();
        }
        debug!("tile pipeline stopped");
    }

    /// True once the collector loop has exited.
    pub fn is_finished(&self) -> bool {
        self.collector.is_finished()
    }
}

impl Drop for CollectorHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.collector.abort();
        if let Some(runtime) = self.decode_runtime.take() {
            runtime.shutdown_background();
        }
    }
}
