//! The timer host: an explicit provider of the scheduling primitives.
//!
//! Instead of patching a process-wide `setTimeout`, code that schedules
//! callbacks holds a [`TimerHost`] and calls through its members. The members
//! live on an ordinary [`Object`], so intercepting the host's primitives is the
//! same operation as intercepting any other method.

use crate::aspect::Undo;
use crate::common::{
    TimerKind, CLEAR_INTERVAL, CLEAR_TIMEOUT, SET_INTERVAL, SET_TIMEOUT,
};
use crate::components::timer::Scheduler;
use crate::config::TimerConfig;
use crate::error::Result;
use crate::events::TimerEvent;
use crate::scheduling;
use crate::value::{Function, Object, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// The provider of `setTimeout`, `setInterval`, `clearTimeout` and
/// `clearInterval`.
///
/// Clones share the same primitives and the same set of live timers. Timers
/// run as tasks on whichever tokio runtime is current when they are scheduled.
#[derive(Clone)]
pub struct TimerHost {
    scheduler: Scheduler,
    primitives: Object,
}

impl TimerHost {
    /// Creates a host whose primitives are the real scheduler.
    pub fn new(config: TimerConfig) -> Self {
        let scheduler = Scheduler::new(Arc::new(config));
        let primitives = Object::new()
            .with(SET_TIMEOUT, primitive(&scheduler, SET_TIMEOUT, |s, args| {
                s.schedule(TimerKind::Timeout, args)
            }))
            .with(SET_INTERVAL, primitive(&scheduler, SET_INTERVAL, |s, args| {
                s.schedule(TimerKind::Interval, args)
            }))
            .with(CLEAR_TIMEOUT, primitive(&scheduler, CLEAR_TIMEOUT, Scheduler::clear))
            .with(CLEAR_INTERVAL, primitive(&scheduler, CLEAR_INTERVAL, Scheduler::clear));
        Self {
            scheduler,
            primitives,
        }
    }

    /// The object that carries the primitives. Intercept members here.
    pub fn primitives(&self) -> &Object {
        &self.primitives
    }

    /// Calls the current `setTimeout` member, intercepted or not.
    pub fn set_timeout(
        &self,
        callback: Function,
        delay: Duration,
        extra: Vec<Value>,
    ) -> Result<Value> {
        self.primitives
            .call_method(SET_TIMEOUT, &scheduling_args(callback, delay, extra))
    }

    /// Calls the current `setInterval` member, intercepted or not.
    pub fn set_interval(
        &self,
        callback: Function,
        period: Duration,
        extra: Vec<Value>,
    ) -> Result<Value> {
        self.primitives
            .call_method(SET_INTERVAL, &scheduling_args(callback, period, extra))
    }

    /// Calls the current `clearTimeout` member.
    pub fn clear_timeout(&self, handle: &Value) -> Result<Value> {
        self.primitives
            .call_method(CLEAR_TIMEOUT, std::slice::from_ref(handle))
    }

    /// Calls the current `clearInterval` member.
    pub fn clear_interval(&self, handle: &Value) -> Result<Value> {
        self.primitives
            .call_method(CLEAR_INTERVAL, std::slice::from_ref(handle))
    }

    /// Routes every future `setTimeout` call through `interceptor`.
    ///
    /// The interceptor is called with `[callback, List(extra), proceed]`,
    /// where `extra` holds the arguments after the delay and `proceed` arms
    /// the real timer. The caller of `setTimeout` always receives a timer
    /// handle: the real one when the interceptor forwarded, otherwise an inert
    /// one that `clearTimeout` accepts and ignores.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`](crate::Error::InvalidArgument) when
    /// `interceptor` is not a function.
    pub fn intercept_scheduled_callback(&self, interceptor: impl Into<Value>) -> Result<Undo> {
        scheduling::intercept_primitive(self, SET_TIMEOUT, interceptor.into())
    }

    /// Same as [`intercept_scheduled_callback`](Self::intercept_scheduled_callback),
    /// for `setInterval`.
    pub fn intercept_repeating_callback(&self, interceptor: impl Into<Value>) -> Result<Undo> {
        scheduling::intercept_primitive(self, SET_INTERVAL, interceptor.into())
    }

    /// Number of timers that are armed and not yet completed or cleared.
    pub fn active_timers(&self) -> usize {
        self.scheduler.active()
    }

    /// Cancels every live timer. Returns how many were cancelled.
    pub fn clear_all(&self) -> usize {
        self.scheduler.clear_all()
    }

    /// Subscribes to the `TimerEvent` stream.
    pub fn subscribe_timer_events(&self) -> broadcast::Receiver<TimerEvent> {
        self.scheduler.subscribe()
    }

    pub fn config(&self) -> &TimerConfig {
        self.scheduler.config()
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

impl Default for TimerHost {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

fn primitive(
    scheduler: &Scheduler,
    name: &str,
    op: impl Fn(&Scheduler, &[Value]) -> Result<Value> + Send + Sync + 'static,
) -> Function {
    let scheduler = scheduler.clone();
    Function::named(name, move |_, args| op(&scheduler, args))
}

fn scheduling_args(callback: Function, delay: Duration, extra: Vec<Value>) -> Vec<Value> {
    let mut args = Vec::with_capacity(extra.len() + 2);
    args.push(Value::Function(callback));
    args.push(Value::Number(delay.as_secs_f64() * 1000.0));
    args.extend(extra);
    args
}
