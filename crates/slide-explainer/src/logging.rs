//! Tracing subscriber setup.
//!
//! Library code logs through both `tracing` (pipeline spans) and the `log`
//! facade (database layer); `log` records are forwarded into tracing so a
//! single subscriber sees everything.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to bridge log records: {0}")]
    LogBridge(#[from] tracing_log::log_tracer::SetLoggerError),

    #[error("Failed to install subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Default directive when `RUST_LOG` is unset.
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "slide_explainer=debug,info"
    } else {
        "info"
    }
}

fn create_env_filter(verbose: bool) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))
        .map_err(|e| LoggingError::Filter(e.to_string()))
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `verbose`; `json` switches to one JSON object per line.
pub fn init(verbose: bool, json: bool) -> Result<(), LoggingError> {
    let env_filter = create_env_filter(verbose)?;

    // Logs go to stderr so command output on stdout stays machine-readable.
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer);

    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
