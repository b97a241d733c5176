//! # chat-common
//!
//! Shared utilities for the gateway: configuration, process-level error
//! handling, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppConfig, AppSettings, BucketConfig, ConfigError, Environment, GatewayConfig, LogFormat,
    LogicConfig, RegistryConfig, ServerOptions, SnowflakeConfig, TcpConfig,
};
pub use error::{AppError, AppResult};
pub use telemetry::{init_tracing, init_tracing_with_config, TracingConfig, TracingError};
