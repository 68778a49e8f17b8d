use aspect::common::{SET_INTERVAL, SET_TIMEOUT};
use aspect::prelude::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Calls = Arc<Mutex<Vec<Vec<Value>>>>;

/// A callback that records the arguments of every invocation.
fn recording_callback(calls: &Calls) -> Function {
    let calls = calls.clone();
    Function::named("callback", move |_, args| {
        calls.lock().push(args.to_vec());
        Ok(Value::Undefined)
    })
}

fn forwarding_interceptor(seen: &Calls) -> Function {
    let seen = seen.clone();
    Function::new(move |_, args| {
        seen.lock().push(args[..2].to_vec());
        args[2].call(&Value::Undefined, &[])
    })
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<TimerEvent>) -> Vec<TimerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn timeout_fires_once_with_extra_arguments() {
    let host = TimerHost::default();
    let calls: Calls = Arc::default();

    let handle = host
        .set_timeout(
            recording_callback(&calls),
            Duration::from_millis(10),
            vec!["a".into(), 2.into()],
        )
        .unwrap();
    assert!(handle.as_timer().is_some());
    assert_eq!(host.active_timers(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*calls.lock(), vec![vec![Value::from("a"), Value::from(2)]]);
    assert_eq!(host.active_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn cleared_timeout_never_fires() {
    let host = TimerHost::default();
    let mut events = host.subscribe_timer_events();
    let calls: Calls = Arc::default();

    let handle = host
        .set_timeout(recording_callback(&calls), Duration::from_millis(50), vec![])
        .unwrap();
    assert_eq!(host.clear_timeout(&handle).unwrap(), Value::Bool(true));
    assert_eq!(host.clear_timeout(&handle).unwrap(), Value::Bool(false));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(calls.lock().is_empty());
    let events = drain(&mut events);
    assert!(matches!(events[0], TimerEvent::Scheduled { kind: TimerKind::Timeout, .. }));
    assert!(matches!(events[1], TimerEvent::Cleared { .. }));
    assert_eq!(events.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn interval_repeats_until_cleared() {
    let host = TimerHost::default();
    let calls: Calls = Arc::default();

    let handle = host
        .set_interval(recording_callback(&calls), Duration::from_millis(10), vec![])
        .unwrap();
    tokio::time::sleep(Duration::from_millis(35)).await;
    assert_eq!(calls.lock().len(), 3);

    assert_eq!(host.clear_interval(&handle).unwrap(), Value::Bool(true));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.lock().len(), 3);
    assert_eq!(host.active_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn failing_callback_does_not_stop_an_interval() {
    let host = TimerHost::default();
    let mut events = host.subscribe_timer_events();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    let handle = host
        .set_interval(
            Function::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::thrown("boom"))
            }),
            Duration::from_millis(10),
            vec![],
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    host.clear_interval(&handle).unwrap();

    let failures = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, TimerEvent::CallbackFailed { .. }))
        .count();
    assert_eq!(failures, 2);
}

#[tokio::test(start_paused = true)]
async fn minimum_delay_is_enforced() {
    let host = TimerHost::new(TimerConfig {
        min_delay_ms: 30,
        ..TimerConfig::default()
    });
    let calls: Calls = Arc::default();

    host.set_timeout(recording_callback(&calls), Duration::ZERO, vec![])
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(calls.lock().is_empty());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn clear_all_cancels_everything() {
    let host = TimerHost::default();
    let calls: Calls = Arc::default();
    for _ in 0..3 {
        host.set_timeout(recording_callback(&calls), Duration::from_millis(10), vec![])
            .unwrap();
    }
    assert_eq!(host.clear_all(), 3);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(calls.lock().is_empty());
}

#[tokio::test]
async fn non_callable_callback_is_rejected() {
    let host = TimerHost::default();
    let err = host
        .primitives()
        .call_method(SET_TIMEOUT, &["not a function".into(), 10.into()])
        .unwrap_err();
    assert!(matches!(err, Error::NotCallable(_)));
    assert_eq!(host.active_timers(), 0);
}

#[test]
fn scheduling_outside_a_runtime_fails() {
    let host = TimerHost::default();
    let calls: Calls = Arc::default();
    let err = host
        .set_timeout(recording_callback(&calls), Duration::from_millis(10), vec![])
        .unwrap_err();
    assert!(matches!(err, Error::NoRuntime));
}

#[tokio::test(start_paused = true)]
async fn interceptor_sees_callback_and_extras_before_anything_fires() {
    let host = TimerHost::default();
    let seen: Calls = Arc::default();
    let calls: Calls = Arc::default();
    let callback = recording_callback(&calls);

    let recorder = seen.clone();
    let _undo = host
        .intercept_scheduled_callback(Function::new(move |_, args| {
            recorder.lock().push(args.to_vec());
            Ok(Value::Undefined)
        }))
        .unwrap();

    let handle = host
        .primitives()
        .call_method(
            SET_TIMEOUT,
            &[
                callback.clone().into(),
                10.into(),
                "extra1".into(),
                "extra2".into(),
            ],
        )
        .unwrap();

    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][0], Value::from(callback));
        assert_eq!(
            seen[0][1],
            Value::List(vec!["extra1".into(), "extra2".into()])
        );
        assert!(seen[0][2].is_callable());
    }

    // Not forwarded: the caller still gets a handle, but nothing is armed.
    assert!(handle.as_timer().is_some());
    assert_eq!(host.active_timers(), 0);
    assert_eq!(host.clear_timeout(&handle).unwrap(), Value::Bool(false));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(calls.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn forwarding_interceptor_arms_the_real_timer() {
    let host = TimerHost::default();
    let seen: Calls = Arc::default();
    let calls: Calls = Arc::default();
    let _undo = host
        .intercept_scheduled_callback(forwarding_interceptor(&seen))
        .unwrap();

    let handle = host
        .set_timeout(
            recording_callback(&calls),
            Duration::from_millis(10),
            vec!["x".into()],
        )
        .unwrap();
    assert_eq!(host.active_timers(), 1);
    assert_eq!(seen.lock().len(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*calls.lock(), vec![vec![Value::from("x")]]);
    assert_eq!(host.clear_timeout(&handle).unwrap(), Value::Bool(false));
}

#[tokio::test(start_paused = true)]
async fn forwarded_handle_cancels_the_real_timer() {
    let host = TimerHost::default();
    let seen: Calls = Arc::default();
    let calls: Calls = Arc::default();
    let _undo = host
        .intercept_scheduled_callback(forwarding_interceptor(&seen))
        .unwrap();

    let handle = host
        .set_timeout(recording_callback(&calls), Duration::from_millis(10), vec![])
        .unwrap();
    assert_eq!(host.clear_timeout(&handle).unwrap(), Value::Bool(true));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(calls.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn interceptor_may_run_the_callback_synchronously() {
    let host = TimerHost::default();
    let calls: Calls = Arc::default();
    let _undo = host
        .intercept_scheduled_callback(Function::new(|_, args| {
            let extra = args[1].as_list().unwrap_or(&[]).to_vec();
            args[0].call(&Value::Undefined, &extra)?;
            Ok(Value::Undefined)
        }))
        .unwrap();

    host.set_timeout(
        recording_callback(&calls),
        Duration::from_millis(1000),
        vec![7.into()],
    )
    .unwrap();
    assert_eq!(*calls.lock(), vec![vec![Value::from(7)]]);
    assert_eq!(host.active_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn repeating_interceptor_wraps_set_interval_only() {
    let host = TimerHost::default();
    let seen: Calls = Arc::default();
    let calls: Calls = Arc::default();
    let _undo = host
        .intercept_repeating_callback(forwarding_interceptor(&seen))
        .unwrap();

    let handle = host
        .set_interval(
            recording_callback(&calls),
            Duration::from_millis(10),
            vec!["tick".into()],
        )
        .unwrap();
    host.set_timeout(recording_callback(&calls), Duration::from_millis(5), vec![])
        .unwrap();
    assert_eq!(seen.lock().len(), 1);

    tokio::time::sleep(Duration::from_millis(25)).await;
    // One timeout plus two interval ticks.
    assert_eq!(calls.lock().len(), 3);
    assert_eq!(host.clear_interval(&handle).unwrap(), Value::Bool(true));
}

#[tokio::test]
async fn undo_restores_the_real_primitive() {
    let host = TimerHost::default();
    let pristine = host.primitives().get(SET_TIMEOUT);
    let undo = host
        .intercept_scheduled_callback(Function::new(|_, _| Ok(Value::Undefined)))
        .unwrap();
    assert_ne!(host.primitives().get(SET_TIMEOUT), pristine);

    undo.restore();
    undo.restore();
    assert_eq!(host.primitives().get(SET_TIMEOUT), pristine);
}

#[tokio::test]
async fn non_callable_interceptor_is_rejected() {
    let host = TimerHost::default();
    let pristine = host.primitives().get(SET_TIMEOUT);
    for interceptor in [Value::from("nope"), Value::from(1), Value::Undefined] {
        let err = host.intercept_scheduled_callback(interceptor).unwrap_err();
        assert!(err.is_invalid_argument());
    }
    assert!(host
        .intercept_repeating_callback(Value::Null)
        .unwrap_err()
        .is_invalid_argument());
    assert_eq!(host.primitives().get(SET_TIMEOUT), pristine);
}

#[tokio::test(start_paused = true)]
async fn unusable_delays_fire_immediately() {
    let host = TimerHost::default();
    let calls: Calls = Arc::default();
    let callback = Value::from(recording_callback(&calls));

    for args in [
        vec![callback.clone(), "soon".into()],
        vec![callback.clone(), (-5).into()],
        vec![callback.clone(), f64::NAN.into()],
        vec![callback.clone()],
    ] {
        host.primitives().call_method(SET_TIMEOUT, &args).unwrap();
    }
    assert_eq!(host.active_timers(), 4);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(calls.lock().len(), 4);
    assert_eq!(host.active_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_period_interval_ticks_every_millisecond() {
    let host = TimerHost::default();
    let calls: Calls = Arc::default();

    let handle = host
        .primitives()
        .call_method(
            SET_INTERVAL,
            &[recording_callback(&calls).into(), 0.into()],
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let ticks = calls.lock().len();
    assert!((9..=11).contains(&ticks), "got {} ticks", ticks);

    host.clear_interval(&handle).unwrap();
}

#[tokio::test(start_paused = true)]
async fn handle_returned_by_the_interceptor_is_passed_through() {
    let host = TimerHost::default();
    let elsewhere = TimerHost::default();
    let calls: Calls = Arc::default();

    let armed: Arc<Mutex<Option<Value>>> = Arc::default();
    let _undo = {
        let elsewhere = elsewhere.clone();
        let armed = armed.clone();
        host.intercept_scheduled_callback(Function::new(move |_, args| {
            let callback = args[0].as_function().cloned().unwrap_or_else(|| {
                Function::new(|_, _| Ok(Value::Undefined))
            });
            let handle = elsewhere.set_timeout(callback, Duration::from_millis(10), vec![])?;
            *armed.lock() = Some(handle.clone());
            Ok(handle)
        }))
        .unwrap()
    };

    let handle = host
        .set_timeout(recording_callback(&calls), Duration::from_millis(10), vec![])
        .unwrap();
    assert_eq!(Some(handle.clone()), armed.lock().clone());
    assert_eq!(host.active_timers(), 0);
    assert_eq!(elsewhere.active_timers(), 1);

    assert_eq!(elsewhere.clear_timeout(&handle).unwrap(), Value::Bool(true));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(calls.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn timeout_lifecycle_is_broadcast() {
    let host = TimerHost::default();
    let mut events = host.subscribe_timer_events();
    let calls: Calls = Arc::default();

    let handle = host
        .set_timeout(recording_callback(&calls), Duration::from_millis(10), vec![])
        .unwrap();
    let id = handle.as_timer().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let events = drain(&mut events);
    assert_eq!(events.len(), 3);
    assert!(matches!(
        events[0],
        TimerEvent::Scheduled { id: got, kind: TimerKind::Timeout, delay }
            if got == id && delay == Duration::from_millis(10)
    ));
    assert!(matches!(events[1], TimerEvent::Fired { id: got, .. } if got == id));
    assert!(matches!(events[2], TimerEvent::Completed { id: got } if got == id));
}
