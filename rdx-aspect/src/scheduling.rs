//! Interception of the scheduling primitives.
//!
//! The host-scoped entry points live on [`TimerHost`]. The free functions in
//! this module target a process-wide host returned by [`global`], kept for
//! code that has no host to pass around.

use crate::aspect::{intercept, Undo};
use crate::error::{Error, Result};
use crate::host::TimerHost;
use crate::value::{Function, Value};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use tracing::debug;

static GLOBAL_HOST: OnceLock<TimerHost> = OnceLock::new();

/// The process-wide timer host, created with the default config on first use.
pub fn global() -> &'static TimerHost {
    GLOBAL_HOST.get_or_init(TimerHost::default)
}

/// Intercepts `setTimeout` on the [`global`] host.
pub fn intercept_scheduled_callback(interceptor: impl Into<Value>) -> Result<Undo> {
    global().intercept_scheduled_callback(interceptor)
}

/// Intercepts `setInterval` on the [`global`] host.
pub fn intercept_repeating_callback(interceptor: impl Into<Value>) -> Result<Undo> {
    global().intercept_repeating_callback(interceptor)
}

pub(crate) fn intercept_primitive(
    host: &TimerHost,
    member: &'static str,
    interceptor: Value,
) -> Result<Undo> {
    let interceptor = match interceptor {
        Value::Function(f) => f,
        other => {
            return Err(Error::InvalidArgument(format!(
                "{} interceptor must be a function, got {}",
                member,
                other.type_name()
            )))
        }
    };
    let scheduler = host.scheduler().clone();

    let replacement = Function::advice(move |receiver, proceed, args| {
        let callback = args.first().cloned().unwrap_or_default();
        let extra = args.get(2..).map(<[Value]>::to_vec).unwrap_or_default();
        debug!(member, extra = extra.len(), "scheduling call intercepted");

        let armed: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let tracked = {
            let proceed = proceed.clone();
            let armed = Arc::clone(&armed);
            Function::named("proceed", move |this, overrides| {
                let handle = proceed.call(this, overrides)?;
                if handle.as_timer().is_some() {
                    *armed.lock() = Some(handle.clone());
                }
                Ok(handle)
            })
        };

        let returned = interceptor.call(
            receiver,
            &[callback, Value::List(extra), Value::Function(tracked)],
        )?;
        if returned.as_timer().is_some() {
            return Ok(returned);
        }
        let armed = armed.lock().take();
        Ok(armed.unwrap_or_else(|| Value::Timer(scheduler.reserve())))
    });

    intercept(host.primitives(), member, replacement)
}
