// [crates/consultease-telemetry/src/lib.rs]
/*!
 * Observability bootstrap for the coordination core. Development runs get
 * a compact, colorized formatter; release builds emit flattened JSON
 * records so the central log pipeline can ingest them without a parser.
 * A global panic hook makes sure a panic on a background task (the
 * health monitor, the expiry sweeper, a desk-unit handler) is captured as
 * a structured record before the process potentially goes down with it.
 */

use std::panic;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber for a named service.
///
/// # Panics
/// Panics if a global subscriber has already been installed in this
/// process; call this exactly once, from the binary's `main`.
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cfg!(debug_assertions) { "debug" } else { "info" };
        format!("{service_name}={level},tower_http=warn,rumqttc=info,libsql=warn").into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    let service = service_name.to_string();
    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");

        tracing::error!(target: "panic", service = %service, location = %location, "panic: {payload}");
    }));

    tracing::info!("telemetry initialized for '{service_name}'");
}
