//! Contains common, primitive types shared across the crate.
//!
//! Identifiers handed out by the [`TimerHost`](crate::host::TimerHost) are
//! slotmap keys, so a handle is never reused once its timer is gone.

use slotmap::new_key_type;

new_key_type! {
    /// Uniquely and safely identifies a timer scheduled on a `TimerHost`.
    ///
    /// Returned (wrapped in `Value::Timer`) by `setTimeout` and `setInterval`.
    /// A stale id can be passed to `clearTimeout` safely; it is simply ignored.
    pub struct TimerId;
}

/// Member name of the one-shot scheduling primitive.
pub const SET_TIMEOUT: &str = "setTimeout";
/// Member name of the repeating scheduling primitive.
pub const SET_INTERVAL: &str = "setInterval";
/// Member name that cancels a one-shot timer.
pub const CLEAR_TIMEOUT: &str = "clearTimeout";
/// Member name that cancels a repeating timer.
pub const CLEAR_INTERVAL: &str = "clearInterval";

/// Distinguishes one-shot timers from repeating ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Fires once after its delay (`setTimeout`).
    Timeout,
    /// Fires every period until cleared (`setInterval`).
    Interval,
}
