use intake_core::config::LoggingConfig;
use intake_core::LogFormat;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber on stderr so stdout stays free for the
/// conversation and the result document. `RUST_LOG` wins over the configured
/// level. A second call is a no-op.
pub fn init(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
