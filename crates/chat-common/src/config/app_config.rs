//! Application configuration structs
//!
//! Loads gateway configuration from environment variables (and `.env` when present).

use chat_core::MAX_WORKER_ID;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub bucket: BucketConfig,
    pub server: ServerOptions,
    pub logic: LogicConfig,
    /// `None` when no registry backend is configured
    pub registry: Option<RegistryConfig>,
    pub snowflake: SnowflakeConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
    pub log_format: LogFormat,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            _ => Err(()),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub ws_port: u16,
    pub ws_path: String,
    pub rpc_port: u16,
    /// Instance identifier announced on join and in registry entries
    pub server_id: String,
    /// `None` disables the raw-TCP transport
    pub tcp: Option<TcpConfig>,
}

impl GatewayConfig {
    #[must_use]
    pub fn ws_address(&self) -> String {
        format!("{}:{}", self.host, self.ws_port)
    }

    #[must_use]
    pub fn rpc_address(&self) -> String {
        format!("{}:{}", self.host, self.rpc_port)
    }

    #[must_use]
    pub fn tcp_addresses(&self) -> Vec<String> {
        self.tcp
            .as_ref()
            .map(|tcp| {
                tcp.ports
                    .iter()
                    .map(|port| format!("{}:{port}", self.host))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Raw-TCP listener configuration
#[derive(Debug, Clone)]
pub struct TcpConfig {
    pub ports: Vec<u16>,
    /// Accept tasks per listening socket
    pub acceptors: usize,
    pub keepalive: bool,
    pub recv_buffer: usize,
    pub send_buffer: usize,
}

/// Bucket sharding configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketConfig {
    pub count: usize,
    /// Initial capacity of the per-bucket user map
    pub channel_size: usize,
    /// Initial capacity of the per-bucket room map
    pub room_size: usize,
    /// Broadcast workers per bucket
    pub routine_amount: usize,
    /// Queue depth of each broadcast worker
    pub routine_size: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            count: default_parallelism(),
            channel_size: 1024,
            room_size: 1024,
            routine_amount: 32,
            routine_size: 20,
        }
    }
}

/// Per-connection transport options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub max_message_size: usize,
    pub write_buffer_size: usize,
    /// Channel mailbox bound
    pub broadcast_size: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54),
            max_message_size: 512,
            write_buffer_size: 1024,
            broadcast_size: 512,
        }
    }
}

/// Business tier client configuration
#[derive(Debug, Clone)]
pub struct LogicConfig {
    pub url: String,
    pub timeout: Duration,
}

/// Service registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub redis_url: String,
    pub max_connections: usize,
    pub base_path: String,
    pub ttl: Duration,
}

impl RegistryConfig {
    /// Interval at which live entries are refreshed
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        (self.ttl / 3).max(Duration::from_secs(1))
    }
}

/// Snowflake ID generator configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowflakeConfig {
    pub worker_id: u16,
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

fn default_server_id() -> String {
    format!("gateway-{}", uuid::Uuid::new_v4())
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// # Errors
    /// Returns an error if required variables are missing or malformed
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        let server_defaults = ServerOptions::default();
        let bucket_defaults = BucketConfig::default();

        let tcp_ports = vars.list::<u16>("GATEWAY_TCP_PORTS")?;
        let tcp = if tcp_ports.is_empty() {
            None
        } else {
            Some(TcpConfig {
                ports: tcp_ports,
                acceptors: vars.or("GATEWAY_TCP_ACCEPTORS", default_parallelism())?,
                keepalive: vars.or("GATEWAY_TCP_KEEPALIVE", false)?,
                recv_buffer: vars.or("GATEWAY_TCP_RECV_BUF", 4096)?,
                send_buffer: vars.or("GATEWAY_TCP_SEND_BUF", 4096)?,
            })
        };

        let registry = match lookup("REDIS_URL").filter(|s| !s.is_empty()) {
            Some(redis_url) => Some(RegistryConfig {
                redis_url,
                max_connections: vars.or("REDIS_MAX_CONNECTIONS", 10)?,
                base_path: vars
                    .string("REGISTRY_BASE_PATH")
                    .unwrap_or_else(|| "chat/connect".to_string()),
                ttl: Duration::from_secs(vars.or("REGISTRY_TTL_SECS", 90)?),
            }),
            None => None,
        };

        let config = Self {
            app: AppSettings {
                name: vars
                    .string("APP_NAME")
                    .unwrap_or_else(|| "chat-gateway".to_string()),
                env: vars.or("APP_ENV", Environment::default())?,
                log_format: vars.or("LOG_FORMAT", LogFormat::default())?,
            },
            gateway: GatewayConfig {
                host: vars
                    .string("GATEWAY_HOST")
                    .unwrap_or_else(|| "127.0.0.1".to_string()),
                ws_port: vars.required("GATEWAY_WS_PORT")?,
                ws_path: vars
                    .string("GATEWAY_WS_PATH")
                    .unwrap_or_else(|| "/ws".to_string()),
                rpc_port: vars.required("GATEWAY_RPC_PORT")?,
                server_id: vars
                    .string("GATEWAY_SERVER_ID")
                    .unwrap_or_else(default_server_id),
                tcp,
            },
            bucket: BucketConfig {
                count: vars.or("BUCKET_COUNT", bucket_defaults.count)?,
                channel_size: vars.or("BUCKET_CHANNEL_SIZE", bucket_defaults.channel_size)?,
                room_size: vars.or("BUCKET_ROOM_SIZE", bucket_defaults.room_size)?,
                routine_amount: vars.or("BUCKET_ROUTINE_AMOUNT", bucket_defaults.routine_amount)?,
                routine_size: vars.or("BUCKET_ROUTINE_SIZE", bucket_defaults.routine_size)?,
            },
            server: ServerOptions {
                write_wait: vars.secs("WRITE_WAIT_SECS", server_defaults.write_wait)?,
                pong_wait: vars.secs("PONG_WAIT_SECS", server_defaults.pong_wait)?,
                ping_period: vars.secs("PING_PERIOD_SECS", server_defaults.ping_period)?,
                max_message_size: vars.or("MAX_MESSAGE_SIZE", server_defaults.max_message_size)?,
                write_buffer_size: vars
                    .or("WRITE_BUFFER_SIZE", server_defaults.write_buffer_size)?,
                broadcast_size: vars.or("BROADCAST_SIZE", server_defaults.broadcast_size)?,
            },
            logic: LogicConfig {
                url: vars
                    .string("LOGIC_URL")
                    .ok_or(ConfigError::MissingVar("LOGIC_URL"))?,
                timeout: Duration::from_millis(vars.or("LOGIC_TIMEOUT_MS", 5000)?),
            },
            registry,
            snowflake: SnowflakeConfig {
                worker_id: vars.or("WORKER_ID", 0)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.count == 0 {
            return Err(ConfigError::InvalidValue("BUCKET_COUNT", "must be > 0".into()));
        }
        if self.bucket.routine_amount == 0 {
            return Err(ConfigError::InvalidValue(
                "BUCKET_ROUTINE_AMOUNT",
                "must be > 0".into(),
            ));
        }
        if self.server.broadcast_size == 0 {
            return Err(ConfigError::InvalidValue("BROADCAST_SIZE", "must be > 0".into()));
        }
        if self.server.ping_period >= self.server.pong_wait {
            return Err(ConfigError::InvalidValue(
                "PING_PERIOD_SECS",
                "must be shorter than PONG_WAIT_SECS".into(),
            ));
        }
        if self.snowflake.worker_id > MAX_WORKER_ID {
            return Err(ConfigError::InvalidValue(
                "WORKER_ID",
                format!("must be at most {MAX_WORKER_ID}"),
            ));
        }
        Ok(())
    }
}

/// Typed access to a key lookup
struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }

    fn required<T: FromStr>(&self, key: &'static str) -> Result<T, ConfigError> {
        let raw = self.string(key).ok_or(ConfigError::MissingVar(key))?;
        raw.parse().map_err(|_| ConfigError::InvalidValue(key, raw))
    }

    fn or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.string(key) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(key, raw)),
            None => Ok(default),
        }
    }

    fn secs(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        self.or(key, default.as_secs()).map(Duration::from_secs)
    }

    fn list<T: FromStr>(&self, key: &'static str) -> Result<Vec<T>, ConfigError> {
        let Some(raw) = self.string(key) else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse()
                    .map_err(|_| ConfigError::InvalidValue(key, s.to_string()))
            })
            .collect()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
