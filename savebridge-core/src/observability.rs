/*!
Logging setup for SaveBridge.

Log output goes to stderr so decoded save documents printed on stdout stay
machine-readable.
*/

use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{Result, SaveError};

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Filter used when `RUST_LOG` is unset or invalid
pub fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global tracing subscriber
///
/// # Arguments
/// * `verbose` - Log at debug level unless `RUST_LOG` says otherwise
/// * `format` - Plain text or JSON events
///
/// # Returns
/// Result indicating success or failure of initialization
pub fn init_observability(verbose: bool, format: LogFormat) -> Result<()> {
    let filter = default_filter(verbose);

    let installed = match format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .with_current_span(false)
                .with_writer(std::io::stderr);
            set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
        }
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr);
            set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
        }
    };

    installed.map_err(|e| {
        SaveError::config(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::debug!(?format, "SaveBridge logging initialized");
    Ok(())
}

/// Initialize logging with default settings
pub fn init_default_observability() -> Result<()> {
    init_observability(false, LogFormat::Text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        // Only one global subscriber can exist per process.
        let _ = init_default_observability();
        let second = init_observability(true, LogFormat::Json);
        assert!(second
            .unwrap_err()
            .to_string()
            .contains("Failed to set global tracing subscriber"));
    }

    #[test]
    fn test_default_format_is_text() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }
}
