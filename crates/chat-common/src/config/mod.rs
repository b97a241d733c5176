//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, BucketConfig, ConfigError, Environment, GatewayConfig, LogFormat,
    LogicConfig, RegistryConfig, ServerOptions, SnowflakeConfig, TcpConfig,
};
