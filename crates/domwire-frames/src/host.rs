//! Frame and timer host.
//!
//! [`FrameHost`] plays the role of the browser event loop for the throttler:
//! it owns a virtual clock, a queue of animation-frame callbacks and a set of
//! one-shot timers. Time only moves when [`FrameHost::advance`] is called,
//! either directly (tests, embedding loops) or from the tokio task spawned by
//! [`FrameHost::drive`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default spacing between animation frames (~60 Hz)
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Callback run on an animation frame, receiving the frame timestamp
pub type FrameCallback = Box<dyn FnOnce(Duration) + Send>;

/// Callback run when a timer expires
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// Handle for a pending timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Handle for a requested animation frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(u64);

struct HostState {
    now: Duration,
    frame_interval: Duration,
    next_frame_at: Duration,
    next_id: u64,
    frames: Vec<(FrameRequestId, FrameCallback)>,
    timers: BTreeMap<(Duration, TimerId), TimerCallback>,
    deadlines: HashMap<TimerId, Duration>,
    frames_run: u64,
}

enum Step {
    Timer(TimerCallback),
    Frame(Duration, Vec<FrameCallback>),
    Done,
}

impl HostState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Pick the next thing due at or before `target`. Timers win ties.
    fn next_step(&mut self, target: Duration) -> Step {
        let frame_due = self.next_frame_at <= target;
        let timer_first = match self.timers.keys().next() {
            Some(&(deadline, _)) => deadline <= target && (!frame_due || deadline <= self.next_frame_at),
            None => false,
        };

        if timer_first {
            if let Some(((deadline, id), callback)) = self.timers.pop_first() {
                self.deadlines.remove(&id);
                self.now = self.now.max(deadline);
                return Step::Timer(callback);
            }
        }

        if frame_due {
            self.now = self.next_frame_at;
            self.next_frame_at = self.next_frame_at.saturating_add(self.frame_interval);
            self.frames_run += 1;
            let callbacks = std::mem::take(&mut self.frames)
                .into_iter()
                .map(|(_, cb)| cb)
                .collect();
            return Step::Frame(self.now, callbacks);
        }

        self.now = self.now.max(target);
        Step::Done
    }
}

/// Shared handle to a frame/timer host.
///
/// Cloning is cheap; clones drive the same clock. Callbacks run without the
/// host lock held and may schedule further frames or timers.
#[derive(Clone)]
pub struct FrameHost {
    state: Arc<Mutex<HostState>>,
}

impl FrameHost {
    /// Create a host with the default frame interval
    pub fn new() -> Self {
        Self::with_frame_interval(DEFAULT_FRAME_INTERVAL)
    }

    /// Create a host with a custom frame interval.
    ///
    /// A zero interval is clamped to one millisecond.
    pub fn with_frame_interval(frame_interval: Duration) -> Self {
        let frame_interval = frame_interval.max(Duration::from_millis(1));
        Self {
            state: Arc::new(Mutex::new(HostState {
                now: Duration::ZERO,
                frame_interval,
                next_frame_at: frame_interval,
                next_id: 0,
                frames: Vec::new(),
                timers: BTreeMap::new(),
                deadlines: HashMap::new(),
                frames_run: 0,
            })),
        }
    }

    /// Current virtual time since the host was created
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Spacing between frames
    pub fn frame_interval(&self) -> Duration {
        self.state.lock().frame_interval
    }

    /// Number of frame boundaries crossed so far
    pub fn frames_run(&self) -> u64 {
        self.state.lock().frames_run
    }

    /// Queue `callback` for the next animation frame.
    ///
    /// Callbacks requested while a frame is running go to the following frame.
    pub fn request_animation_frame(&self, callback: FrameCallback) -> FrameRequestId {
        let mut state = self.state.lock();
        let id = FrameRequestId(state.next_id());
        state.frames.push((id, callback));
        id
    }

    /// Drop a queued frame callback, returning whether it was still queued
    pub fn cancel_animation_frame(&self, id: FrameRequestId) -> bool {
        let mut state = self.state.lock();
        let before = state.frames.len();
        state.frames.retain(|(queued, _)| *queued != id);
        state.frames.len() != before
    }

    /// Run `callback` once `delay` has elapsed
    pub fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let mut state = self.state.lock();
        let id = TimerId(state.next_id());
        let deadline = state.now.saturating_add(delay);
        state.timers.insert((deadline, id), callback);
        state.deadlines.insert(id, deadline);
        id
    }

    /// Cancel a timer, returning whether it was still pending
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut state = self.state.lock();
        match state.deadlines.remove(&id) {
            Some(deadline) => state.timers.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    /// Number of queued frame callbacks
    pub fn pending_frames(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Number of pending timers
    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Move the clock forward by `by`, running every timer and frame that
    /// falls due in chronological order.
    ///
    /// Returns the number of callbacks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now.saturating_add(by);
        let mut ran = 0;
        loop {
            let step = self.state.lock().next_step(target);
            match step {
                Step::Timer(callback) => {
                    callback();
                    ran += 1;
                }
                Step::Frame(timestamp, callbacks) => {
                    trace!(?timestamp, callbacks = callbacks.len(), "Animation frame");
                    for callback in callbacks {
                        callback(timestamp);
                        ran += 1;
                    }
                }
                Step::Done => break,
            }
        }
        ran
    }

    /// Advance to the next frame boundary and run it.
    pub fn run_frame(&self) -> usize {
        let delta = {
            let state = self.state.lock();
            state.next_frame_at.saturating_sub(state.now)
        };
        self.advance(delta)
    }

    /// Spawn a tokio task that advances the host in real time every `tick`.
    ///
    /// Must be called from within a tokio runtime. Abort the returned handle
    /// to stop driving.
    pub fn drive(&self, tick: Duration) -> JoinHandle<()> {
        let host = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            let mut last = tokio::time::Instant::now();
            loop {
                interval.tick().await;
                let now = tokio::time::Instant::now();
                host.advance(now.duration_since(last));
                last = now;
            }
        })
    }
}

impl Default for FrameHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FrameHost")
            .field("now", &state.now)
            .field("frame_interval", &state.frame_interval)
            .field("pending_frames", &state.frames.len())
            .field("pending_timers", &state.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> Arc<Mutex<Vec<(String, Duration)>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_frames_fire_on_interval_boundaries() {
        let host = FrameHost::with_frame_interval(Duration::from_millis(10));
        let seen = log();
        let s = seen.clone();
        host.request_animation_frame(Box::new(move |ts| s.lock().push(("frame".into(), ts))));

        assert_eq!(host.advance(Duration::from_millis(9)), 0);
        assert_eq!(host.advance(Duration::from_millis(1)), 1);
        assert_eq!(*seen.lock(), vec![("frame".to_string(), Duration::from_millis(10))]);
        assert_eq!(host.now(), Duration::from_millis(10));
    }

    #[test]
    fn test_timer_runs_before_frame_at_same_instant() {
        let host = FrameHost::with_frame_interval(Duration::from_millis(10));
        let seen = log();

        let s = seen.clone();
        host.request_animation_frame(Box::new(move |ts| s.lock().push(("frame".into(), ts))));
        let s = seen.clone();
        let h = host.clone();
        host.set_timeout(
            Duration::from_millis(10),
            Box::new(move || s.lock().push(("timer".into(), h.now()))),
        );

        host.advance(Duration::from_millis(25));
        let labels: Vec<String> = seen.lock().iter().map(|(l, _)| l.clone()).collect();
        assert_eq!(labels, vec!["timer", "frame"]);
        assert_eq!(host.now(), Duration::from_millis(25));
    }

    #[test]
    fn test_frame_requested_during_frame_runs_next_frame() {
        let host = FrameHost::with_frame_interval(Duration::from_millis(16));
        let seen = log();

        let s = seen.clone();
        let h = host.clone();
        host.request_animation_frame(Box::new(move |ts| {
            s.lock().push(("outer".into(), ts));
            let s = s.clone();
            h.request_animation_frame(Box::new(move |ts| s.lock().push(("inner".into(), ts))));
        }));

        assert_eq!(host.run_frame(), 1);
        assert_eq!(host.pending_frames(), 1);
        assert_eq!(host.run_frame(), 1);
        assert_eq!(
            *seen.lock(),
            vec![
                ("outer".to_string(), Duration::from_millis(16)),
                ("inner".to_string(), Duration::from_millis(32)),
            ]
        );
    }

    #[test]
    fn test_clear_timeout_and_cancel_frame() {
        let host = FrameHost::new();
        let seen = log();

        let s = seen.clone();
        let timer = host.set_timeout(
            Duration::from_millis(5),
            Box::new(move || s.lock().push(("timer".into(), Duration::ZERO))),
        );
        let s = seen.clone();
        let frame = host.request_animation_frame(Box::new(move |ts| s.lock().push(("frame".into(), ts))));

        assert!(host.clear_timeout(timer));
        assert!(!host.clear_timeout(timer));
        assert!(host.cancel_animation_frame(frame));
        assert!(!host.cancel_animation_frame(frame));

        host.advance(Duration::from_millis(100));
        assert!(seen.lock().is_empty());
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let host = FrameHost::with_frame_interval(Duration::ZERO);
        assert_eq!(host.frame_interval(), Duration::from_millis(1));
        host.advance(Duration::from_millis(3));
        assert_eq!(host.frames_run(), 3);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let host = FrameHost::new();
        let seen = log();
        let s = seen.clone();
        host.advance(Duration::from_millis(5));
        host.set_timeout(
            Duration::MAX,
            Box::new(move || s.lock().push(("timer".into(), Duration::ZERO))),
        );

        host.advance(Duration::from_secs(1));
        assert!(seen.lock().is_empty());
        assert_eq!(host.pending_timers(), 1);
    }

    #[tokio::test]
    async fn test_drive_advances_in_real_time() {
        let host = FrameHost::with_frame_interval(Duration::from_millis(2));
        let seen = log();
        let s = seen.clone();
        host.request_animation_frame(Box::new(move |ts| s.lock().push(("frame".into(), ts))));

        let handle = host.drive(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(seen.lock().len(), 1);
        assert!(host.now() > Duration::ZERO);
    }
}
