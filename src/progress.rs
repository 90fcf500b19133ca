//! Progress reporting and cancellation for decompression.
//!
//! A decompression call reports a completion percentage in `0.0..=100.0`
//! through [`UpdateProgress`]. Any `FnMut(f64)` closure is a progress sink:
//!
//! ```rust,ignore
//! tool.decompress(&volumes, out, &args, &mut |percent: f64| {
//!     println!("{percent:.0}%");
//! })?;
//! ```
//!
//! Cancellation is polled through [`UpdateProgress::should_cancel`]. Wrap a
//! sink in [`Cancellable`] to thread a [`CancellationToken`] that another
//! thread can trigger:
//!
//! ```rust
//! use arcfs::progress::{Cancellable, CancellationToken, UpdateProgress};
//!
//! let token = CancellationToken::new();
//! let mut sink = Cancellable::new(|_percent: f64| {}, token.clone());
//! assert!(!sink.should_cancel());
//! token.cancel();
//! assert!(sink.should_cancel());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Progress sink for decompression.
pub trait UpdateProgress {
    /// Reports completion in percent (`0.0..=100.0`).
    fn update(&mut self, percent: f64);

    /// Checks if cancellation has been requested.
    ///
    /// Polled before each entry and between copy chunks.
    fn should_cancel(&self) -> bool {
        false
    }
}

impl<F: FnMut(f64)> UpdateProgress for F {
    fn update(&mut self, percent: f64) {
        self(percent)
    }
}

/// A progress sink that discards updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl UpdateProgress for NoProgress {
    fn update(&mut self, _percent: f64) {}
}

/// A shareable cancellation flag.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Pairs a progress sink with a [`CancellationToken`].
#[derive(Debug)]
pub struct Cancellable<P> {
    inner: P,
    token: CancellationToken,
}

impl<P: UpdateProgress> Cancellable<P> {
    /// Wraps `inner`, cancelling once `token` is triggered.
    pub fn new(inner: P, token: CancellationToken) -> Self {
        Self { inner, token }
    }

    /// Returns the inner sink.
    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: UpdateProgress> UpdateProgress for Cancellable<P> {
    fn update(&mut self, percent: f64) {
        self.inner.update(percent);
    }

    fn should_cancel(&self) -> bool {
        self.token.is_cancelled() || self.inner.should_cancel()
    }
}

/// A progress sink that rate-limits updates.
///
/// Useful for reducing callback overhead when a remote client is notified
/// on every update. Completion (100%) is always forwarded.
pub struct ThrottledProgress<P> {
    inner: P,
    min_interval: Duration,
    last_callback: Option<Instant>,
}

impl<P: UpdateProgress> ThrottledProgress<P> {
    /// Creates a throttled sink forwarding at most once per `min_interval`.
    pub fn new(inner: P, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_callback: None,
        }
    }

    /// Creates with default 100ms interval.
    pub fn default_interval(inner: P) -> Self {
        Self::new(inner, Duration::from_millis(100))
    }

    /// Returns the inner sink.
    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: UpdateProgress> UpdateProgress for ThrottledProgress<P> {
    fn update(&mut self, percent: f64) {
        let now = Instant::now();
        let due = self
            .last_callback
            .is_none_or(|last| now.duration_since(last) >= self.min_interval);
        // Always call on completion
        if percent >= 100.0 || due {
            self.last_callback = Some(now);
            self.inner.update(percent);
        }
    }

    fn should_cancel(&self) -> bool {
        self.inner.should_cancel()
    }
}

/// Percentage of `done` over `total`, clamped to 100.
///
/// An empty total counts as complete.
pub(crate) fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        (done as f64 / total as f64 * 100.0).min(100.0)
    }
}
