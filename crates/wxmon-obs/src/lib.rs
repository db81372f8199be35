use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when RUST_LOG is unset
pub const DEFAULT_FILTER: &str = "info,wxmon=debug";

/// Initialize logging.
/// - JSON logs by default; WXMON_LOG_FORMAT=pretty for human-readable output
/// - RUST_LOG respected; default to "info,wxmon=debug"
pub fn init(service_name: &str) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    let pretty = std::env::var("WXMON_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("pretty"));

    let registry = tracing_subscriber::registry().with(EnvFilter::new(env_filter));
    let result = if pretty {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
        return;
    }

    tracing::info!(service = %service_name, "Observability initialized");
}
