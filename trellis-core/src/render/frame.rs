//! Frame scheduling.
//!
//! A reconciliation pass never runs inline with the mutation that caused it.
//! It is deferred to the next frame tick, the host's equivalent of an
//! animation frame. [`FrameScheduler`] is the only host-environment
//! dependency of the renderer.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Runs callbacks on the next frame tick.
pub trait FrameScheduler: Send + Sync {
    fn request_frame(&self, callback: FrameCallback);
}

/// Frames that tick only when the host says so.
///
/// Useful for headless hosts and tests: mutations queue a frame, and
/// [`run_pending`](ManualFrames::run_pending) plays it.
#[derive(Default)]
pub struct ManualFrames {
    queue: Mutex<VecDeque<FrameCallback>>,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run the frames queued so far.
    ///
    /// Frames requested while these run wait for the next call. Returns the
    /// number of frames run.
    pub fn run_pending(&self) -> usize {
        let frames: Vec<FrameCallback> = self.queue.lock().drain(..).collect();
        let count = frames.len();
        for frame in frames {
            frame();
        }
        count
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&self, callback: FrameCallback) {
        self.queue.lock().push_back(callback);
    }
}

/// Frames driven by a tokio timer.
///
/// Each request spawns a task that sleeps one frame interval and then runs
/// the callback.
pub struct TokioFrames {
    handle: Handle,
    interval: Duration,
}

impl TokioFrames {
    /// Capture the current tokio runtime.
    pub fn new(interval: Duration) -> Result<Self> {
        let handle = Handle::try_current().map_err(|err| {
            error!(%err, "frame scheduler created outside a tokio runtime");
            Error::NoAsyncRuntime
        })?;
        Ok(Self::with_handle(handle, interval))
    }

    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        Self::new(config.frame_interval())
    }

    pub fn with_handle(handle: Handle, interval: Duration) -> Self {
        Self { handle, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FrameScheduler for TokioFrames {
    fn request_frame(&self, callback: FrameCallback) {
        let interval = self.interval;
        debug!(?interval, "frame requested");
        self.handle.spawn(async move {
            tokio::time::sleep(interval).await;
            callback();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn manual_frames_run_on_demand() {
        let frames = ManualFrames::new();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let ran = ran.clone();
            frames.request_frame(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(frames.pending(), 3);
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        assert_eq!(frames.run_pending(), 3);
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn tokio_frames_need_a_runtime() {
        let result = TokioFrames::new(Duration::from_millis(16));
        assert!(matches!(result, Err(Error::NoAsyncRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_frames_fire_after_one_interval() {
        let frames = TokioFrames::from_config(&RuntimeConfig::default()).unwrap();
        assert_eq!(frames.interval(), Duration::from_millis(16));

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        frames.request_frame(Box::new(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
