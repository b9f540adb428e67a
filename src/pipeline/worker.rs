//! Decode worker loop.
//!
//! Each worker repeatedly takes the next pending request from the shared
//! intake and processes it to completion before taking another, so there
//! is strictly one in-flight fetch/decode per worker. Workers produce exactly one
//! [`CompletionReport`] per request and never touch the collector's
//! registry.

use super::request::{CompletionReport, DecodedTile, PendingRequest};
use crate::config::DecodeLimits;
use crate::decode;
use crate::pool::BufferPool;
use crate::source::TileSource;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// The intake queue feeding the worker pool.
///
/// A capacity-one channel behind a mutex: the collector's send suspends
/// until the single slot frees, i.e. until a worker has taken the previous
/// request. That hand-off is what throttles snapshot processing to actual
/// decode throughput.
pub(crate) type SharedIntake = Arc<Mutex<mpsc::Receiver<Arc<PendingRequest>>>>;

/// Runs one decode worker until the intake closes.
pub(crate) async fn run_worker<S: TileSource>(
    worker_id: usize,
    source: Arc<S>,
    pool: Option<Arc<BufferPool>>,
    limits: DecodeLimits,
    intake: SharedIntake,
    completions: mpsc::UnboundedSender<CompletionReport>,
) {
    loop {
        let request = {
            let mut intake = intake.lock().await;
            intake.recv().await
        };
        let Some(request) = request else {
            trace!(worker_id, "intake closed, worker exiting");
            break;
        };

        let tile = process(&request, &source, pool.as_deref(), &limits).await;
        let report = CompletionReport::new(request, tile);

        if completions.send(report).is_err() {
            // Collector gone; nothing left to report to.
            break;
        }
    }
}

/// Processes one request: cancellation check, fetch, decode.
///
/// Returns `None` for every non-success outcome; the caller turns it into
/// the request's completion report. Fetch and decode failures are logged
/// and swallowed here: a single bad tile must never take the worker down.
async fn process<S: TileSource>(
    request: &PendingRequest,
    source: &Arc<S>,
    pool: Option<&BufferPool>,
    limits: &DecodeLimits,
) -> Option<DecodedTile> {
    // Cancellation is cooperative and only checked before the fetch: work
    // that already produced a tile is delivered rather than discarded.
    if request.is_cancelled() {
        trace!(coord = %request.coord(), "skipping cancelled request");
        return None;
    }

    let coord = request.coord();
    let bytes = match source.fetch_tile(coord.row, coord.col, coord.zoom).await {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(coord = %coord, source = source.name(), error = %err, "tile fetch failed");
            return None;
        }
    };

    let decoded = if coord.is_native() {
        let target = pool.map(BufferPool::checkout).unwrap_or_default();
        decode::decode_native(&bytes, target, limits)
    } else {
        decode::decode_sub_sampled(&bytes, coord.sub_sample, limits)
    };

    match decoded {
        Ok(image) => Some(DecodedTile::new(coord, image)),
        Err(err) if err.is_memory_pressure() => {
            warn!(coord = %coord, error = %err, "tile decode skipped under memory pressure");
            None
        }
        Err(err) => {
            debug!(coord = %coord, error = %err, "tile decode failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::source::FetchError;
    use bytes::Bytes;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let img = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        Bytes::from(out)
    }

    /// Source returning a fixed PNG, optionally failing specific rows.
    struct MockSource {
        payload: Bytes,
        fail_rows: Vec<u32>,
        fetches: AtomicUsize,
    }

    impl MockSource {
        fn new(payload: Bytes) -> Self {
            Self {
                payload,
                fail_rows: Vec::new(),
                fetches: AtomicUsize::new(0),
            }
        }

        fn failing_rows(mut self, rows: Vec<u32>) -> Self {
            self.fail_rows = rows;
            self
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl TileSource for MockSource {
        async fn fetch_tile(&self, row: u32, _col: u32, _zoom: u8) -> Result<Bytes, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_rows.contains(&row) {
                return Err(FetchError::Transport("mock failure".to_string()));
            }
            Ok(self.payload.clone())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    struct WorkerHarness {
        intake_tx: mpsc::Sender<Arc<PendingRequest>>,
        completion_rx: mpsc::UnboundedReceiver<CompletionReport>,
    }

    fn spawn_worker(source: Arc<MockSource>, pool: Option<Arc<BufferPool>>) -> WorkerHarness {
        let (intake_tx, intake_rx) = mpsc::channel(1);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(
            0,
            source,
            pool,
            DecodeLimits::default(),
            Arc::new(Mutex::new(intake_rx)),
            completion_tx,
        ));
        WorkerHarness {
            intake_tx,
            completion_rx,
        }
    }

    #[tokio::test]
    async fn test_successful_request_yields_a_tile() {
        let source = Arc::new(MockSource::new(png_bytes(8, 8)));
        let mut harness = spawn_worker(Arc::clone(&source), None);

        let request = Arc::new(PendingRequest::new(TileCoord::new(16, 1, 2)));
        harness.intake_tx.send(Arc::clone(&request)).await.unwrap();

        let report = harness.completion_rx.recv().await.unwrap();
        let tile = report.tile.expect("expected a decoded tile");
        assert_eq!(tile.coord(), request.coord());
        assert_eq!(tile.image.width(), 8);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_request_skips_the_fetch() {
        let source = Arc::new(MockSource::new(png_bytes(8, 8)));
        let mut harness = spawn_worker(Arc::clone(&source), None);

        let request = Arc::new(PendingRequest::new(TileCoord::new(16, 1, 2)));
        request.cancel();
        harness.intake_tx.send(Arc::clone(&request)).await.unwrap();

        let report = harness.completion_rx.recv().await.unwrap();
        assert!(report.tile.is_none());
        assert!(report.request.is_cancelled());
        assert_eq!(source.fetch_count(), 0, "cancelled requests must not fetch");
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_absent_and_worker_survives() {
        let source = Arc::new(MockSource::new(png_bytes(8, 8)).failing_rows(vec![13]));
        let mut harness = spawn_worker(Arc::clone(&source), None);

        let failing = Arc::new(PendingRequest::new(TileCoord::new(16, 13, 0)));
        harness.intake_tx.send(failing).await.unwrap();
        let report = harness.completion_rx.recv().await.unwrap();
        assert!(report.tile.is_none());

        // The same worker keeps serving afterwards.
        let ok = Arc::new(PendingRequest::new(TileCoord::new(16, 1, 0)));
        harness.intake_tx.send(ok).await.unwrap();
        let report = harness.completion_rx.recv().await.unwrap();
        assert!(report.tile.is_some());
    }

    #[tokio::test]
    async fn test_undecodable_bytes_report_absent() {
        let source = Arc::new(MockSource::new(Bytes::from_static(b"garbage")));
        let mut harness = spawn_worker(source, None);

        let request = Arc::new(PendingRequest::new(TileCoord::new(16, 1, 2)));
        harness.intake_tx.send(request).await.unwrap();

        let report = harness.completion_rx.recv().await.unwrap();
        assert!(report.tile.is_none());
    }

    #[tokio::test]
    async fn test_native_decode_draws_from_the_pool() {
        let pool = Arc::new(BufferPool::new(4, 8 * 8 * 4));
        pool.give_back(Vec::with_capacity(8 * 8 * 4));
        assert_eq!(pool.pooled(), 1);

        let source = Arc::new(MockSource::new(png_bytes(8, 8)));
        let mut harness = spawn_worker(source, Some(Arc::clone(&pool)));

        let request = Arc::new(PendingRequest::new(TileCoord::new(16, 1, 2)));
        harness.intake_tx.send(request).await.unwrap();
        let report = harness.completion_rx.recv().await.unwrap();

        assert!(report.tile.is_some());
        assert_eq!(pool.pooled(), 0, "native decode must check a buffer out");
    }

    #[tokio::test]
    async fn test_sub_sampled_decode_ignores_the_pool() {
        let pool = Arc::new(BufferPool::new(4, 8 * 8 * 4));
        pool.give_back(Vec::with_capacity(8 * 8 * 4));

        let source = Arc::new(MockSource::new(png_bytes(8, 8)));
        let mut harness = spawn_worker(source, Some(Arc::clone(&pool)));

        let request = Arc::new(PendingRequest::new(TileCoord::sub_sampled(16, 1, 2, 2)));
        harness.intake_tx.send(request).await.unwrap();
        let report = harness.completion_rx.recv().await.unwrap();

        let tile = report.tile.expect("expected a decoded tile");
        assert_eq!(tile.image.width(), 4);
        assert_eq!(pool.pooled(), 1, "sub-sampled decode must not touch the pool");
    }

    #[tokio::test]
    async fn test_worker_exits_when_intake_closes() {
        let source = Arc::new(MockSource::new(png_bytes(8, 8)));
        let (intake_tx, intake_rx) = mpsc::channel::<Arc<PendingRequest>>(1);
        let (completion_tx, _completion_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run_worker(
            0,
            source,
            None,
            DecodeLimits::default(),
            Arc::new(Mutex::new(intake_rx)),
            completion_tx,
        ));

        drop(intake_tx);
        handle.await.unwrap();
    }
}
