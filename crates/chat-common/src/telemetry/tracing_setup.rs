//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set; otherwise the level comes from the deployment
//! environment. Production logs are JSON with thread ids, development logs
//! are human-readable with span open/close events.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::Registry,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::{AppSettings, Environment, LogFormat};

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Used only when `RUST_LOG` is unset
    pub level: Level,
    pub format: LogFormat,
    pub span_events: bool,
    pub file_line: bool,
    pub thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_env(Environment::default(), LogFormat::default())
    }
}

impl TracingConfig {
    #[must_use]
    pub fn for_app(app: &AppSettings) -> Self {
        Self::for_env(app.env, app.log_format)
    }

    fn for_env(env: Environment, format: LogFormat) -> Self {
        let production = env.is_production();
        Self {
            level: if production { Level::INFO } else { Level::DEBUG },
            format,
            span_events: !production,
            file_line: !production,
            thread_ids: production,
        }
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer()
            .with_file(self.file_line)
            .with_line_number(self.file_line)
            .with_thread_ids(self.thread_ids)
            .with_span_events(if self.span_events {
                FmtSpan::NEW | FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            });

        match self.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Pretty => layer.boxed(),
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }

    /// Install as the global subscriber
    pub fn install(&self) -> Result<(), TracingError> {
        tracing_subscriber::registry()
            .with(self.layer())
            .with(self.filter())
            .try_init()
            .map_err(|_| TracingError::AlreadyInitialized)
    }
}

/// Install the default subscriber, keeping any subscriber already installed
pub fn init_tracing() {
    let _ = TracingConfig::default().install();
}

/// Install `config`, keeping any subscriber already installed
pub fn init_tracing_with_config(config: &TracingConfig) {
    if config.install().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
