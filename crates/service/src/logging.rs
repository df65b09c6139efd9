use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Install the global subscriber: a compact fmt layer over a non-blocking
///  stdout writer, filtered by `RUST_LOG` with `level` as the default
///  directive.
///
/// The returned guard flushes buffered output on drop and must be kept alive
///  for the life of the process.
pub fn init(level: tracing::Level) -> Result<WorkerGuard, LoggingError> {
    let (stdout_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialised)?;

    Ok(guard)
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialised,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        // the first call may lose to another test's subscriber; the second never wins
        let _first = init(tracing::Level::DEBUG);
        assert!(matches!(
            init(tracing::Level::INFO),
            Err(LoggingError::AlreadyInitialised)
        ));
    }
}
