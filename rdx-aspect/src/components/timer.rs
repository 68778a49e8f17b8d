//! The scheduler that backs the timer primitives.

use crate::common::{TimerId, TimerKind};
use crate::config::TimerConfig;
use crate::error::{Error, Result};
use crate::events::TimerEvent;
use crate::value::{Function, Value};
use parking_lot::RwLock;
use slotmap::SlotMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, trace};

/// A live timer. Dropping the entry does not cancel the task, `abort` does.
pub(crate) struct TimerEntry {
    pub kind: TimerKind,
    abort: Option<AbortHandle>,
}

/// Arms, fires and cancels timers on the current tokio runtime.
#[derive(Clone)]
pub(crate) struct Scheduler {
    config: Arc<TimerConfig>,
    timers: Arc<RwLock<SlotMap<TimerId, TimerEntry>>>,
    timer_event_sender: broadcast::Sender<TimerEvent>,
}

impl Scheduler {
    pub(crate) fn new(config: Arc<TimerConfig>) -> Self {
        let (timer_event_sender, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            timers: Arc::new(RwLock::new(SlotMap::with_key())),
            timer_event_sender,
        }
    }

    /// Handles `setTimeout` / `setInterval` arguments:
    /// `(callback, delay_ms, ...extra)`.
    ///
    /// A missing, negative or non-numeric delay counts as zero. `extra` is
    /// handed to the callback every time it fires.
    pub(crate) fn schedule(&self, kind: TimerKind, args: &[Value]) -> Result<Value> {
        let callback = match args.first() {
            Some(Value::Function(f)) => f.clone(),
            Some(other) => {
                return Err(Error::NotCallable(format!(
                    "timer callback ({})",
                    other.type_name()
                )))
            }
            None => return Err(Error::NotCallable("timer callback (undefined)".to_string())),
        };
        let delay = self.delay_from(args.get(1));
        let extra = args.get(2..).map(<[Value]>::to_vec).unwrap_or_default();
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let id = self.timers.write().insert_with_key(|id| {
            let task = runtime.spawn(self.clone().drive(id, kind, delay, callback, extra));
            TimerEntry {
                kind,
                abort: Some(task.abort_handle()),
            }
        });
        debug!(?id, ?kind, ?delay, "timer scheduled");
        self.timer_event_sender
            .send(TimerEvent::Scheduled { id, kind, delay })
            .ok();
        Ok(Value::Timer(id))
    }

    /// Handles `clearTimeout` / `clearInterval`. Unknown, stale or non-timer
    /// arguments are ignored. Returns whether a live timer was cancelled.
    pub(crate) fn clear(&self, args: &[Value]) -> Result<Value> {
        let Some(id) = args.first().and_then(Value::as_timer) else {
            return Ok(Value::Bool(false));
        };
        let removed = self.timers.write().remove(id);
        match removed {
            Some(entry) => {
                if let Some(abort) = &entry.abort {
                    abort.abort();
                }
                debug!(?id, kind = ?entry.kind, "timer cleared");
                self.timer_event_sender
                    .send(TimerEvent::Cleared { id })
                    .ok();
                Ok(Value::Bool(true))
            }
            None => Ok(Value::Bool(false)),
        }
    }

    /// Hands out an id that never fires. Clearing it is a no-op.
    pub(crate) fn reserve(&self) -> TimerId {
        let mut timers = self.timers.write();
        let id = timers.insert(TimerEntry {
            kind: TimerKind::Timeout,
            abort: None,
        });
        timers.remove(id);
        id
    }

    pub(crate) fn active(&self) -> usize {
        self.timers.read().len()
    }

    /// Cancels every live timer and returns how many there were.
    pub(crate) fn clear_all(&self) -> usize {
        let drained: Vec<(TimerId, TimerEntry)> = self.timers.write().drain().collect();
        for (id, entry) in &drained {
            if let Some(abort) = &entry.abort {
                abort.abort();
            }
            self.timer_event_sender
                .send(TimerEvent::Cleared { id: *id })
                .ok();
        }
        drained.len()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.timer_event_sender.subscribe()
    }

    pub(crate) fn config(&self) -> &TimerConfig {
        &self.config
    }

    fn delay_from(&self, value: Option<&Value>) -> Duration {
        let requested = value
            .and_then(Value::as_number)
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .unwrap_or(0.0) as u64;
        Duration::from_millis(requested.max(self.config.min_delay_ms))
    }

    async fn drive(
        self,
        id: TimerId,
        kind: TimerKind,
        delay: Duration,
        callback: Function,
        extra: Vec<Value>,
    ) {
        match kind {
            TimerKind::Timeout => {
                tokio::time::sleep(delay).await;
                self.fire(id, &callback, &extra);
                if self.timers.write().remove(id).is_some() {
                    self.timer_event_sender
                        .send(TimerEvent::Completed { id })
                        .ok();
                }
            }
            TimerKind::Interval => {
                let period = delay.max(Duration::from_millis(1));
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(self.config.missed_tick.into());
                loop {
                    ticker.tick().await;
                    self.fire(id, &callback, &extra);
                }
            }
        }
    }

    fn fire(&self, id: TimerId, callback: &Function, extra: &[Value]) {
        trace!(?id, "timer fired");
        self.timer_event_sender
            .send(TimerEvent::Fired {
                id,
                timestamp: Instant::now(),
            })
            .ok();
        if let Err(e) = callback.call(&Value::Undefined, extra) {
            error!(?id, error = %e, "timer callback failed");
            self.timer_event_sender
                .send(TimerEvent::CallbackFailed {
                    id,
                    message: e.to_string(),
                })
                .ok();
        }
    }
}
