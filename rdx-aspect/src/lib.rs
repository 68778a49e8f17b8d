//! # Aspect
//!
//! Reversible method interception for Rust, with interceptable timer
//! primitives built on top.
//!
//! ## Core Concepts
//!
//! - **Object / Function**: a small dynamic host model. Objects are shared bags
//!   of named members; functions are shared callables invoked with an
//!   explicit receiver.
//! - **Interception**: [`intercept`](aspect::intercept) replaces a named member
//!   with a wrapper that calls your replacement, handing it a `proceed`
//!   function and the original argument list. The returned [`Undo`](aspect::Undo)
//!   puts the original back, or restores it on drop when turned into a guard.
//! - **TimerHost**: an explicit provider of `setTimeout` / `setInterval`
//!   running on tokio. Its members are intercepted the same way, and the
//!   `intercept_*_callback` helpers route every scheduled callback through an
//!   interceptor of your choosing.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use aspect::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let host = TimerHost::new(AspectConfig::default().timers);
//!
//!     // Log every one-shot timer, then arm it for real.
//!     let undo = host.intercept_scheduled_callback(Function::new(|_, args| {
//!         println!("timer requested with extras {:?}", args.get(1));
//!         args[2].call(&Value::Undefined, &[])
//!     }))?;
//!
//!     host.set_timeout(
//!         Function::new(|_, args| {
//!             println!("fired with {:?}", args);
//!             Ok(Value::Undefined)
//!         }),
//!         Duration::from_millis(10),
//!         vec!["payload".into()],
//!     )?;
//!
//!     tokio::time::sleep(Duration::from_millis(20)).await;
//!     undo.restore();
//!     Ok(())
//! }
//! ```

pub const LIBRARY_NAME: &str = "Aspect";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod aspect;
pub mod common;
pub(crate) mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod scheduling;
pub mod value;

pub use error::{Error, Result};

/// A prelude module for easy importing of the most common types.
pub mod prelude {
    pub use crate::aspect::{intercept, InterceptGuard, Undo};
    pub use crate::common::{TimerId, TimerKind};
    pub use crate::config::{AspectConfig, MissedTick, TimerConfig};
    pub use crate::error::{Error, Result};
    pub use crate::events::TimerEvent;
    pub use crate::host::TimerHost;
    pub use crate::scheduling::{intercept_repeating_callback, intercept_scheduled_callback};
    pub use crate::value::{Function, Object, Value};
}
