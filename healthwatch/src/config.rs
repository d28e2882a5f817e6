//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: HEALTHWATCH_, nested keys split on `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/healthwatch/config.toml
//! 4. System directory: /etc/healthwatch/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

const ENV_PREFIX: &str = "HEALTHWATCH_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// gRPC server configuration
    #[serde(default)]
    pub grpc: GrpcConfig,

    /// Health check and watch policy
    #[serde(default)]
    pub health: HealthConfig,

    /// Async runtime sizing
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Version reported by `Ping`
    #[serde(default = "default_version")]
    pub version: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: default_version(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            environment: default_environment(),
        }
    }
}

/// gRPC server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrpcConfig {
    /// Maximum message size in MB
    #[serde(default = "default_grpc_max_message_mb")]
    pub max_message_size_mb: usize,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_tcp_keepalive")]
    pub tcp_keepalive_secs: u64,

    /// Upper bound for draining active calls on shutdown, in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Enable gRPC reflection service
    #[serde(default = "default_true")]
    pub reflection_enabled: bool,

    /// Enable the standard grpc.health.v1 service
    #[serde(default = "default_true")]
    pub standard_health_enabled: bool,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            max_message_size_mb: default_grpc_max_message_mb(),
            tcp_keepalive_secs: default_tcp_keepalive(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            reflection_enabled: true,
            standard_health_enabled: true,
        }
    }
}

impl GrpcConfig {
    /// Get max message size in bytes
    pub fn max_message_size_bytes(&self) -> usize {
        self.max_message_size_mb * 1024 * 1024
    }

    /// Get TCP keepalive as Duration
    pub fn tcp_keepalive(&self) -> Duration {
        Duration::from_secs(self.tcp_keepalive_secs)
    }

    /// Get shutdown drain timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Health check and watch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Components checked when a request names none
    #[serde(default = "default_components")]
    pub default_components: Vec<String>,

    /// Bound for a single probe call when the request carries no timeout hint
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Interval used when a watch request asks for zero or less
    #[serde(default = "default_watch_interval")]
    pub watch_default_interval_secs: u64,

    /// Timeout hint passed to every watch tick
    #[serde(default = "default_watch_check_timeout")]
    pub watch_check_timeout_secs: u64,

    /// Outbound queue depth per watch subscription
    #[serde(default = "default_watch_buffer")]
    pub watch_buffer: usize,

    /// Checks a single subscription may have in flight at once
    #[serde(default = "default_watch_max_in_flight")]
    pub watch_max_in_flight: usize,

    /// How long shutdown waits for in-flight watch checks, in seconds
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            default_components: default_components(),
            probe_timeout_ms: default_probe_timeout_ms(),
            watch_default_interval_secs: default_watch_interval(),
            watch_check_timeout_secs: default_watch_check_timeout(),
            watch_buffer: default_watch_buffer(),
            watch_max_in_flight: default_watch_max_in_flight(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl HealthConfig {
    /// Get probe timeout as Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Get the default watch interval as Duration
    pub fn watch_default_interval(&self) -> Duration {
        Duration::from_secs(self.watch_default_interval_secs)
    }

    /// Get the watch tick timeout hint as Duration
    pub fn watch_check_timeout(&self) -> Duration {
        Duration::from_secs(self.watch_check_timeout_secs)
    }

    /// Get the shutdown grace period as Duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Async runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Worker threads for the multi-threaded runtime (None = one per CPU)
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

// Default value functions
fn default_service_name() -> String {
    "healthwatch".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_true() -> bool {
    true
}

fn default_grpc_max_message_mb() -> usize {
    4 // 4 MB
}

fn default_tcp_keepalive() -> u64 {
    60
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_components() -> Vec<String> {
    vec![
        "database".to_string(),
        "cache".to_string(),
        "external-api".to_string(),
    ]
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

fn default_watch_interval() -> u64 {
    30
}

fn default_watch_check_timeout() -> u64 {
    10
}

fn default_watch_buffer() -> usize {
    16
}

fn default_watch_max_in_flight() -> usize {
    1
}

fn default_shutdown_grace() -> u64 {
    60
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (first found wins on conflicts):
    /// 1. Current working directory: ./config.toml
    /// 2. XDG config directory: ~/.config/healthwatch/config.toml
    /// 3. System directory: /etc/healthwatch/config.toml
    ///
    /// Environment variables (HEALTHWATCH_ prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        let config_paths = Self::find_config_paths();

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so that higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses the search path and loads directly from the given path.
    /// Environment variables still take precedence.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Find all possible config file paths
    ///
    /// Returns paths in priority order (highest first).
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix("healthwatch");
        if let Some(path) = xdg_dirs.get_config_file("config.toml") {
            paths.push(path);
        }

        paths.push(PathBuf::from("/etc/healthwatch/config.toml"));

        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.port, 9090);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.grpc.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.health.default_components,
            vec!["database", "cache", "external-api"]
        );
        assert_eq!(config.health.watch_default_interval(), Duration::from_secs(30));
        assert_eq!(config.health.watch_max_in_flight, 1);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            r#"
[service]
port = 9191

[health]
default_components = ["database"]
watch_default_interval_secs = 5
"#
        )
        .expect("write config");

        let config = Config::load_from(file.path()).expect("config loads");
        assert_eq!(config.service.port, 9191);
        assert_eq!(config.service.name, "healthwatch");
        assert_eq!(config.health.default_components, vec!["database"]);
        assert_eq!(config.health.watch_default_interval_secs, 5);
        assert_eq!(config.health.watch_check_timeout_secs, 10);
    }

    #[test]
    fn test_max_message_size_bytes() {
        let grpc = GrpcConfig::default();
        assert_eq!(grpc.max_message_size_bytes(), 4 * 1024 * 1024);
    }
}
