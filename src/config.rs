//! Pipeline configuration.

use std::thread;
use std::time::Duration;

/// Default grace delay between a completion report and registry removal.
const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(30);

/// Default cap on a single decoded image's width or height, in pixels.
const DEFAULT_MAX_DIMENSION: u32 = 8_192;

/// Default cap on the memory a single decode may allocate.
const DEFAULT_MAX_ALLOC_BYTES: u64 = 256 * 1024 * 1024;

/// Fallback worker count when hardware parallelism cannot be queried.
const FALLBACK_WORKERS: usize = 1;

/// Configuration for the tile collection pipeline.
///
/// Groups the knobs of the collector and its worker pool, providing
/// sensible defaults while allowing customization.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tileflow::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.grace_delay(), Duration::from_millis(30));
///
/// let config = PipelineConfig::new()
///     .with_workers(2)
///     .with_grace_delay(Duration::from_millis(50));
/// assert_eq!(config.worker_count(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Explicit worker count, or `None` for `max(1, parallelism - 1)`.
    workers: Option<usize>,
    /// How long a completed request stays in the in-flight registry.
    grace_delay: Duration,
    /// Decode memory guards.
    decode_limits: DecodeLimits,
}

impl PipelineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit worker count.
    ///
    /// By default the pool uses one worker per hardware thread, minus one
    /// reserved for the interactive path, with a minimum of one. Values
    /// below one are clamped to one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    /// Sets the grace delay applied before a completed request is removed
    /// from the in-flight registry.
    ///
    /// The delay absorbs the churn of a single render frame: a tile that
    /// briefly leaves and re-enters the visible set is not refetched while
    /// its previous result is still settling into the renderer.
    /// Default: 30 ms.
    pub fn with_grace_delay(mut self, grace_delay: Duration) -> Self {
        self.grace_delay = grace_delay;
        self
    }

    /// Sets the decode memory guards.
    pub fn with_decode_limits(mut self, decode_limits: DecodeLimits) -> Self {
        self.decode_limits = decode_limits;
        self
    }

    /// Returns the number of decode workers the pool will run.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            let parallelism = thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(FALLBACK_WORKERS + 1);
            parallelism.saturating_sub(1).max(1)
        })
    }

    /// Returns the grace delay.
    pub fn grace_delay(&self) -> Duration {
        self.grace_delay
    }

    /// Returns the decode memory guards.
    pub fn decode_limits(&self) -> DecodeLimits {
        self.decode_limits
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: None,
            grace_delay: DEFAULT_GRACE_DELAY,
            decode_limits: DecodeLimits::default(),
        }
    }
}

/// Memory guards applied to every decode.
///
/// A tile whose decode would exceed these bounds resolves to an absent
/// outcome instead of taking the worker down; the guards are the pipeline's
/// defense against memory exhaustion on oversized or hostile inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum decoded width in pixels.
    pub max_width: u32,
    /// Maximum decoded height in pixels.
    pub max_height: u32,
    /// Maximum bytes a single decode may allocate.
    pub max_alloc_bytes: u64,
}

impl DecodeLimits {
    /// Converts to the `image` crate's limit set.
    pub(crate) fn to_image_limits(self) -> image::Limits {
        let mut limits = image::Limits::no_limits();
        limits.max_image_width = Some(self.max_width);
        limits.max_image_height = Some(self.max_height);
        limits.max_alloc = Some(self.max_alloc_bytes);
        limits
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
            max_alloc_bytes: DEFAULT_MAX_ALLOC_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grace_delay() {
        let config = PipelineConfig::default();
        assert_eq!(config.grace_delay(), Duration::from_millis(30));
    }

    #[test]
    fn test_default_worker_count_is_at_least_one() {
        let config = PipelineConfig::default();
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_explicit_worker_count() {
        let config = PipelineConfig::new().with_workers(3);
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn test_worker_count_clamped_to_one() {
        let config = PipelineConfig::new().with_workers(0);
        assert_eq!(config.worker_count(), 1);
    }

    #[test]
    fn test_builder_chain() {
        let config = PipelineConfig::new()
            .with_workers(2)
            .with_grace_delay(Duration::from_millis(100))
            .with_decode_limits(DecodeLimits {
                max_width: 1024,
                max_height: 1024,
                max_alloc_bytes: 1 << 20,
            });

        assert_eq!(config.worker_count(), 2);
        assert_eq!(config.grace_delay(), Duration::from_millis(100));
        assert_eq!(config.decode_limits().max_width, 1024);
    }
}
