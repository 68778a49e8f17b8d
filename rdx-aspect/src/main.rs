use anyhow::Result;
use aspect::prelude::*;
use aspect::{LIBRARY_NAME, VERSION};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging. RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    println!(
        "{} v{}",
        LIBRARY_NAME.cyan().bold(),
        VERSION.dimmed()
    );

    // 2. Load the configuration. The first CLI argument, if any, is a TOML file.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AspectConfig::load(config_path.as_deref())?;
    info!("Timer config: {:?}", config.timers);

    // 3. Create the host and listen to its event stream.
    let host = TimerHost::new(config.timers);
    spawn_event_listener(&host);

    // 4. Intercept method calls on a plain object.
    demo_method_interception()?;

    // 5. Intercept the scheduling primitives.
    demo_timer_interception(&host).await?;

    Ok(())
}

/// Prints every `TimerEvent` the host broadcasts.
fn spawn_event_listener(host: &TimerHost) {
    let mut timer_rx = host.subscribe_timer_events();
    tokio::spawn(async move {
        while let Ok(event) = timer_rx.recv().await {
            info!("[TIMER] => {:?}", event);
        }
    });
}

fn demo_method_interception() -> Result<()> {
    let greeter = Object::new().with("greet", Function::new(|_, _| Ok("hi".into())));

    let undo = intercept(
        &greeter,
        "greet",
        Function::advice(|_, proceed, _| {
            let inner = proceed.call(&Value::Undefined, &[])?;
            Ok(format!("intercepted:{}", inner.as_text().unwrap_or_default()).into())
        }),
    )?;
    info!("[ASPECT] greet() => {:?}", greeter.call_method("greet", &[])?);

    undo.restore();
    info!("[ASPECT] greet() after undo => {:?}", greeter.call_method("greet", &[])?);
    Ok(())
}

async fn demo_timer_interception(host: &TimerHost) -> Result<()> {
    let intercepted = Arc::new(AtomicU32::new(0));

    // --- Every second timer is forwarded to the real scheduler ---
    let counter = intercepted.clone();
    let undo = host.intercept_scheduled_callback(Function::named(
        "every-other",
        move |_, args| {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            if n % 2 == 0 {
                info!("[INTERCEPTOR] #{} forwarded, extras {:?}", n, args.get(1));
                args[2].call(&Value::Undefined, &[])
            } else {
                info!("[INTERCEPTOR] #{} swallowed", n);
                Ok(Value::Undefined)
            }
        },
    ))?;

    for label in ["first", "second", "third", "fourth"] {
        let handle = host.set_timeout(
            Function::new(|_, args| {
                println!("{} {:?}", "<-- timer fired with".green(), args);
                Ok(Value::Undefined)
            }),
            Duration::from_millis(50),
            vec![label.into()],
        )?;
        info!("Scheduled {} => {:?}", label.yellow(), handle);
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    undo.restore();
    info!(
        "Interceptor saw {} calls, {} timers still armed.",
        intercepted.load(Ordering::Relaxed),
        host.active_timers()
    );
    Ok(())
}
