//! # DOMWire Frames
//!
//! Animation-frame scheduling for DOMWire.
//!
//! - [`host`]: a frame/timer host with a virtual clock, optionally driven by
//!   a tokio task
//! - [`throttle`]: the namespaced throttler that coalesces scroll, resize and
//!   pointer events to one callback per frame

pub mod host;
pub mod throttle;

pub use host::{
    FrameCallback, FrameHost, FrameRequestId, TimerCallback, TimerId, DEFAULT_FRAME_INTERVAL,
};
pub use throttle::{
    FrameThrottler, Registration, Result, ThrottleError, ThrottleGuard, ThrottleKey,
    ThrottledCallback,
};
