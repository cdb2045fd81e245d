use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use domwire::{init_logging, Config, EventTarget, NativeEvent, Registration, Runtime};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("DOMWire {} (built {})", domwire::VERSION, domwire::BUILD_DATE);

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_from_file(Path::new(&path))
            .with_context(|| format!("loading configuration from {}", path))?,
        None => Config::default(),
    };
    let runtime = Runtime::new(&config);
    runtime.bus.set_logging(true);

    let document = &runtime.document;
    let body = document.append_element(document.root(), "body", &[])?;
    let button = document.append_element(
        body,
        "button",
        &[("on:click.prevent", r#"modal[newsletter]::open({"source": "demo"})"#)],
    )?;

    runtime.bus.on("modal[newsletter]::open", |event, data, target| {
        tracing::info!(event = %event.name, ?data, ?target, "Modal opened");
    });
    let bound = runtime.scan()?;
    tracing::info!(bound, "Scanned document");

    let click = document.fire(button.into(), "click")?;
    tracing::info!(prevented = click.default_prevented(), "Button clicked");

    let frames = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = frames.clone();
    runtime.throttler.set([Registration::new(
        EventTarget::Window,
        "scroll",
        "demo",
        move |event| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tracing::info!(data = ?event.data(), "Throttled scroll");
        },
    )])?;

    for y in 0..50 {
        document.dispatch(
            EventTarget::Window,
            NativeEvent::new("scroll").with_data(json!({ "y": y * 10 })),
        )?;
    }
    let driver = runtime.host.drive(Duration::from_millis(4));
    tokio::time::sleep(Duration::from_millis(100)).await;
    driver.abort();
    tracing::info!(
        callbacks = frames.load(std::sync::atomic::Ordering::SeqCst),
        frames = runtime.host.frames_run(),
        "Scroll burst settled"
    );

    Ok(())
}
