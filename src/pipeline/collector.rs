//! Collector control loop.
//!
//! The collector is the single-threaded coordinator of the pipeline. It
//! owns the authoritative registry of in-flight requests and is its only
//! mutator, so the registry needs no lock. Each loop iteration handles
//! exactly one event, selected without priority:
//!
//! - a new visible-set snapshot (latest-value-wins; superseded snapshots
//!   are never seen),
//! - a completion report from the worker pool, or
//! - the expiry of a scheduled registry removal.
//!
//! Dispatching a new request suspends the loop until a worker accepts it.
//! That suspension is the pipeline's backpressure point: snapshot
//! processing can never outrun decode capacity, and while the collector
//! waits, newer snapshots simply overwrite older ones upstream.

use super::request::{CompletionReport, DecodedTile, PendingRequest};
use crate::coord::TileCoord;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Runs the collector until the snapshot feed closes, the worker pool
/// disappears, or shutdown is requested.
pub(crate) async fn run_collector(
    mut snapshots: watch::Receiver<Vec<TileCoord>>,
    intake: mpsc::Sender<Arc<PendingRequest>>,
    mut completions: mpsc::UnboundedReceiver<CompletionReport>,
    output: mpsc::UnboundedSender<DecodedTile>,
    grace_delay: Duration,
    shutdown: CancellationToken,
) {
    // TileCoord -> in-flight request. Entries are inserted on first sight
    // in a snapshot and removed only by the grace timer below.
    let mut registry: HashMap<TileCoord, Arc<PendingRequest>> = HashMap::new();

    // Scheduled removals, in completion order. Deadlines are monotonic, so
    // the front entry is always the next one due.
    let mut removals: VecDeque<(Instant, TileCoord)> = VecDeque::new();

    loop {
        let next_removal = removals.front().map(|(due, _)| *due);

        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("collector shutdown requested");
                break;
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("snapshot feed closed, collector stopping");
                    break;
                }
                let wanted = snapshots.borrow_and_update().clone();
                if !apply_snapshot(&wanted, &mut registry, &intake, &shutdown).await {
                    break;
                }
            }

            report = completions.recv() => {
                let Some(report) = report else {
                    warn!("worker pool disappeared, collector stopping");
                    break;
                };
                handle_completion(report, &output, &mut removals, grace_delay);
            }

            _ = wait_for(next_removal), if next_removal.is_some() => {
                expire_due(&mut registry, &mut removals);
            }
        }
    }
}

/// Reconciles the registry against a new visible-set snapshot.
///
/// Every coordinate not already in flight is registered and dispatched;
/// every in-flight request whose coordinate left the visible set is
/// flagged cancelled. Cancellation never removes the entry and never
/// interrupts a worker mid-fetch; it only suppresses work that has not
/// started. A flagged request whose coordinate reappears stays flagged;
/// the coordinate becomes requestable again once its entry expires.
///
/// Returns false when the collector should stop.
async fn apply_snapshot(
    wanted: &[TileCoord],
    registry: &mut HashMap<TileCoord, Arc<PendingRequest>>,
    intake: &mpsc::Sender<Arc<PendingRequest>>,
    shutdown: &CancellationToken,
) -> bool {
    for coord in wanted {
        if registry.contains_key(coord) {
            continue;
        }

        let request = Arc::new(PendingRequest::new(*coord));
        registry.insert(*coord, Arc::clone(&request));
        trace!(coord = %coord, in_flight = registry.len(), "dispatching tile request");

        tokio::select! {
            _ = shutdown.cancelled() => return false,
            sent = intake.send(request) => {
                if sent.is_err() {
                    warn!("worker intake closed, collector stopping");
                    return false;
                }
            }
        }
    }

    let wanted_set: HashSet<&TileCoord> = wanted.iter().collect();
    let mut cancelled = 0usize;
    for (coord, request) in registry.iter() {
        if !wanted_set.contains(coord) && !request.is_cancelled() {
            request.cancel();
            cancelled += 1;
        }
    }
    if cancelled > 0 {
        debug!(cancelled, visible = wanted.len(), "flagged requests outside the visible set");
    }

    true
}

/// Forwards a completed tile and schedules the registry removal.
///
/// Removal is deferred by the grace delay rather than immediate: freeing
/// the coordinate at once would let the very next snapshot re-dispatch a
/// tile whose result is still settling into the renderer.
fn handle_completion(
    report: CompletionReport,
    output: &mpsc::UnboundedSender<DecodedTile>,
    removals: &mut VecDeque<(Instant, TileCoord)>,
    grace_delay: Duration,
) {
    let coord = report.request.coord();

    if let Some(tile) = report.tile {
        trace!(coord = %coord, "delivering decoded tile");
        if output.send(tile).is_err() {
            trace!(coord = %coord, "tile consumer dropped, discarding tile");
        }
    } else {
        trace!(coord = %coord, cancelled = report.request.is_cancelled(), "request resolved without a tile");
    }

    removals.push_back((Instant::now() + grace_delay, coord));
}

/// Drops every registry entry whose grace delay has elapsed.
fn expire_due(
    registry: &mut HashMap<TileCoord, Arc<PendingRequest>>,
    removals: &mut VecDeque<(Instant, TileCoord)>,
) {
    let now = Instant::now();
    while let Some(&(due, coord)) = removals.front() {
        if due > now {
            break;
        }
        removals.pop_front();
        registry.remove(&coord);
        trace!(coord = %coord, in_flight = registry.len(), "request expired from registry");
    }
}

async fn wait_for(due: Option<Instant>) {
    match due {
        Some(due) => sleep_until(due).await,
        None => std::future::pending().await,
    }
}
