use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use sse::EngineConfig;
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Maximum number of simultaneously open event streams
    #[arg(long, env, default_value_t = 1000)]
    pub max_connections: usize,

    /// Milliseconds between heartbeat ticks
    #[arg(long, env, default_value_t = 30_000)]
    pub heartbeat_interval_ms: u64,

    /// Milliseconds without a successful heartbeat before a stream is evicted
    #[arg(long, env, default_value_t = 300_000)]
    pub connection_timeout_ms: u64,

    /// Lower bound for a client-requested heartbeat interval, in milliseconds
    #[arg(long, env, default_value_t = 5_000)]
    pub min_heartbeat_interval_ms: u64,

    /// Upper bound for a client-requested heartbeat interval, in milliseconds
    #[arg(long, env, default_value_t = 300_000)]
    pub max_heartbeat_interval_ms: u64,

    /// Milliseconds a single frame write may take before the stream is dropped
    #[arg(long, env, default_value_t = 5_000)]
    pub write_timeout_ms: u64,

    /// Frames buffered per stream before writes start waiting on the client
    #[arg(long, env, default_value_t = 64)]
    pub connection_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Engine tuning derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_connections: self.max_connections,
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            min_heartbeat_interval: Duration::from_millis(self.min_heartbeat_interval_ms),
            max_heartbeat_interval: Duration::from_millis(self.max_heartbeat_interval_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            connection_buffer_size: self.connection_buffer_size,
        }
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    /// The `interface:port` pair to bind the HTTP listener to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.interface(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let config = Config::parse_from(["tenant_push_rs"]);
        assert_eq!(config.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_listen_address_joins_interface_and_port() {
        let config =
            Config::parse_from(["tenant_push_rs", "--interface", "0.0.0.0", "--port", "8080"]);
        assert_eq!(config.listen_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_flags_override_engine_settings() {
        let config = Config::parse_from([
            "tenant_push_rs",
            "--max-connections",
            "5",
            "--heartbeat-interval-ms",
            "1000",
            "--connection-timeout-ms",
            "2500",
            "--log-level-filter",
            "DEBUG",
        ]);

        let engine = config.engine_config();
        assert_eq!(engine.max_connections, 5);
        assert_eq!(engine.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(engine.connection_timeout, Duration::from_millis(2500));
        assert_eq!(config.log_level_filter, LevelFilter::Debug);
    }

    #[test]
    fn test_allowed_origins_split_on_commas() {
        let config = Config::parse_from([
            "tenant_push_rs",
            "--allowed-origins",
            "https://app.example.com,https://admin.example.com",
        ]);
        assert_eq!(
            config.allowed_origins,
            vec!["https://app.example.com", "https://admin.example.com"]
        );
    }
}
