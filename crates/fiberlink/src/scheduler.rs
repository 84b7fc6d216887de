//! Scheduling facilities behind the `wait_secs` and `wait_frames` commands.
//!
//! Both are optional. Without them the wait commands report `NotSupported`
//! instead of suspending the script.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::watch;

/// Future that completes when the scheduled point is reached.
pub type Notification = BoxFuture<'static, ()>;

/// Wall-clock timers.
pub trait TimerScheduler: Send + Sync + 'static {
    fn schedule_after(&self, duration: Duration) -> Notification;
}

/// Host frame ticks.
pub trait FrameScheduler: Send + Sync + 'static {
    fn schedule_after_frames(&self, frames: u32) -> Notification;
}

/// [`TimerScheduler`] backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimers;

impl TimerScheduler for TokioTimers {
    fn schedule_after(&self, duration: Duration) -> Notification {
        // Created lazily: the caller may be a native upcall outside any runtime.
        Box::pin(async move { tokio::time::sleep(duration).await })
    }
}

/// Frame counter advanced by the host loop.
///
/// Call [`FrameClock::tick`] once per host frame; waits scheduled through
/// [`FrameScheduler`] complete once enough ticks have passed.
#[derive(Debug)]
pub struct FrameClock {
    frames: watch::Sender<u64>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        let (frames, _) = watch::channel(0);
        Self { frames }
    }

    /// Advance one frame and return the new frame number.
    pub fn tick(&self) -> u64 {
        self.advance(1)
    }

    pub fn advance(&self, frames: u64) -> u64 {
        let mut current = 0;
        self.frames.send_modify(|frame| {
            *frame += frames;
            current = *frame;
        });
        current
    }

    pub fn current(&self) -> u64 {
        *self.frames.borrow()
    }
}

impl FrameScheduler for FrameClock {
    fn schedule_after_frames(&self, frames: u32) -> Notification {
        let target = self.current() + u64::from(frames);
        let mut rx = self.frames.subscribe();
        Box::pin(async move {
            if rx.wait_for(|frame| *frame >= target).await.is_err() {
                // Clock dropped before reaching the target; never fire.
                std::future::pending::<()>().await;
            }
        })
    }
}
