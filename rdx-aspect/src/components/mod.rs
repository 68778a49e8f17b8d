//! Contains the building blocks behind a `TimerHost`.
//!
//! The scheduler here owns the slotmap of live timers and the tokio tasks that
//! drive them. `TimerHost` exposes it through callable members so that the
//! members can be intercepted like any other.

pub mod timer;
