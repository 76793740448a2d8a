use crate::config::DEFAULT_LOG_FILTER;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a stderr `fmt` subscriber filtered by `filter`.
///
/// An unparsable filter falls back to `warn`. Returns `false` when a global subscriber is
/// already set, which happens when the host installed its own or on a repeated call.
pub fn init_tracing(filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .try_init()
        .is_ok()
}
