//! Process-wide `tracing` subscriber setup: an
//! `EnvFilter` derived from `logLevel`, a `fmt` layer for stderr, and the
//! admin surface's `LogTail` layer so `/logs` can replay recent history.
//! `RUST_LOG` still overrides the config-derived default, matching
//! `EnvFilter::from_default_env`'s usual precedence.

use mcpcp_admin::LogTail;
use mcpcp_config::LogLevel;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_TAIL_CAPACITY: usize = 500;

pub fn init(level: &LogLevel) -> LogTail {
    let log_tail = LogTail::new(LOG_TAIL_CAPACITY);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(log_tail.clone())
        .init();

    log_tail
}
