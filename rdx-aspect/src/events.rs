//! Defines the events broadcast by a `TimerHost`.
//!
//! Subscribers receive these through
//! [`TimerHost::subscribe_timer_events`](crate::host::TimerHost::subscribe_timer_events).
//! Nothing in the host depends on anyone listening.

use crate::common::{TimerId, TimerKind};
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle events of timers scheduled on a host.
#[derive(Debug, Clone)]
pub enum TimerEvent {
    /// A real timer was armed.
    Scheduled {
        id: TimerId,
        kind: TimerKind,
        delay: Duration,
    },
    /// A timer elapsed and its callback is about to run.
    Fired { id: TimerId, timestamp: Instant },
    /// A one-shot timer ran its callback and was released.
    Completed { id: TimerId },
    /// A timer was cancelled before it completed.
    Cleared { id: TimerId },
    /// The callback returned an error. Intervals keep running regardless.
    CallbackFailed { id: TimerId, message: String },
}
