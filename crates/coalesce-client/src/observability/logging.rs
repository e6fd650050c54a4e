//! Log subscriber setup driven by [`LoggingSettings`].
//!
//! The level from the settings applies to every target, except that
//! engine diagnostics (degraded matches) are always kept at `warn`, even
//! when the configured level is `error`. `RUST_LOG`, when set, replaces
//! these defaults entirely.

use tracing::level_filters::LevelFilter;
use tracing::Subscriber;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::Layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{ConfigLoadError, LoggingSettings};

/// Target of the diagnostics emitted by the engine's default sink.
pub const DIAGNOSTICS_TARGET: &str = "coalesce_domain::diagnostics";

/// Installs the global subscriber for `settings`, writing to stdout.
///
/// Only the first successful call has an effect.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), ConfigLoadError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(settings)?,
    };
    let subscriber = Registry::default()
        .with(format_layer(settings, std::io::stdout))
        .with(filter);

    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}

/// Builds a subscriber for `settings` that writes to `writer`.
///
/// Ignores `RUST_LOG`. Useful for capturing output.
pub fn subscriber_with_writer<W>(
    settings: &LoggingSettings,
    writer: W,
) -> Result<impl Subscriber + Send + Sync, ConfigLoadError>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    Ok(Registry::default()
        .with(format_layer(settings, writer))
        .with(default_filter(settings)?))
}

fn default_filter(settings: &LoggingSettings) -> Result<EnvFilter, ConfigLoadError> {
    let level: LevelFilter = settings
        .level
        .parse()
        .map_err(|_| ConfigLoadError::Invalid {
            message: format!("logging.level is not a valid level: {}", settings.level),
        })?;
    let diagnostics = level.max(LevelFilter::WARN);

    Ok(EnvFilter::new(format!("{level},{DIAGNOSTICS_TARGET}={diagnostics}")))
}

fn format_layer<W>(settings: &LoggingSettings, writer: W) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    if settings.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(writer)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_writer(writer).boxed()
    }
}
