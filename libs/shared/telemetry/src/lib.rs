//! Tracing subscriber setup shared by the enforcement service and the
//! admin CLI: env-filtered logging plus a panic hook that logs before the
//! process unwinds instead of only printing to stderr.

use std::panic;
use tracing::{error, info, instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber for `service_name`.
///
/// Respects `RUST_LOG` when set; otherwise defaults to debug-level logs for
/// this service and warn-level for `tower_http`/`hyper`, with `libsql` kept
/// at error to avoid drowning out domain logs with connection chatter.
///
/// In debug builds this emits compact, human-readable lines. In release
/// builds it emits flattened JSON, suitable for ingestion by a log
/// aggregator.
///
/// # Panics
/// Panics if a global subscriber has already been installed.
#[instrument(skip_all)]
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{service_name}={level},tower_http=warn,hyper=warn,libsql=error",
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
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

    install_panic_hook(service_name);

    info!(service = service_name, "tracing initialized");
}

/// Logs a structured event for any thread panic before the default panic
/// output runs, so panics in background tasks (the reconciliation worker,
/// scheduled jobs) are visible in the same log stream as everything else.
fn install_panic_hook(service_name: &str) {
    let service_name = service_name.to_string();

    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");

        error!(
            target: "panic",
            service = %service_name,
            location = %location,
            "thread panicked: {payload}"
        );
    }));
}
