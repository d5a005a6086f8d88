use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{HedgeError, Result};
use crate::session::totp::PasscodeGenerator;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub control_plane: ControlPlaneConfig,
    pub venue: VenueConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlPlaneConfig {
    /// Base URL of the strategy control-plane API
    pub base_url: String,
    /// Bearer token for the control-plane
    #[serde(default)]
    pub api_token: String,
    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    /// SmartAPI base URL
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Account identifier (client code)
    #[serde(default)]
    pub client_id: String,
    /// Access credential (MPIN)
    #[serde(default)]
    pub mpin: String,
    /// Base32 shared secret for the login passcode
    #[serde(default)]
    pub totp_secret: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_local_ip")]
    pub client_local_ip: String,
    #[serde(default = "default_local_ip")]
    pub client_public_ip: String,
    #[serde(default = "default_mac_address")]
    pub mac_address: String,
    /// Re-authenticate once a held session is older than this (unset = never)
    #[serde(default)]
    pub max_session_age_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Hard wall-clock limit per strategy job
    #[serde(default = "default_job_timeout")]
    pub timeout_secs: u64,
    /// Program the strategy file is handed to (e.g. "python3"); unset runs the file itself
    #[serde(default)]
    pub interpreter: Option<String>,
    /// How long to wait for output pipes after the job has exited
    #[serde(default = "default_output_drain")]
    pub output_drain_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_job_timeout(),
            interpreter: None,
            output_drain_secs: default_output_drain(),
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Minutes between cycles in continuous mode
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Pause between consecutive strategy jobs
    #[serde(default = "default_strategy_pause")]
    pub strategy_pause_secs: u64,
    /// Backoff in continuous mode after a crashed cycle
    #[serde(default = "default_crash_backoff")]
    pub crash_backoff_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            strategy_pause_secs: default_strategy_pause(),
            crash_backoff_secs: default_crash_backoff(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts for a catalog fetch hitting transport or 5xx failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for the rolling log file; empty disables file logging
    #[serde(default = "default_log_dir")]
    pub directory: String,
    #[serde(default = "default_log_file")]
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: default_log_dir(),
            file_name: default_log_file(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("hedgerun/{}", env!("CARGO_PKG_VERSION"))
}

fn default_local_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_mac_address() -> String {
    "fe80::216:3eff:fe1e:5561".to_string()
}

fn default_job_timeout() -> u64 {
    300
}

fn default_output_drain() -> u64 {
    5
}

fn default_interval_minutes() -> u64 {
    15
}

fn default_strategy_pause() -> u64 {
    2
}

fn default_crash_backoff() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_file() -> String {
    "hedgerun.log".to_string()
}

/// Environment names used by earlier deployments, honored as defaults
const LEGACY_ENV: &[(&str, &str)] = &[
    ("LARAVEL_API_URL", "control_plane.base_url"),
    ("API_TOKEN", "control_plane.api_token"),
    ("ANGEL_API_KEY", "venue.api_key"),
    ("ANGEL_CLIENT_ID", "venue.client_id"),
    ("ANGEL_MPIN", "venue.mpin"),
    ("ANGEL_TOTP_SECRET", "venue.totp_secret"),
];

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();

        let builder = Self::with_defaults(Config::builder())?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("HEDGERUN_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (HEDGERUN_VENUE__API_KEY, etc.).
            // Values stay strings so credentials keep leading zeros.
            .add_source(
                Environment::with_prefix("HEDGERUN")
                    .prefix_separator("_")
                    .separator("__"),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    fn with_defaults(
        builder: ConfigBuilder<DefaultState>,
    ) -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
        let mut builder = builder
            .set_default("control_plane.base_url", "http://localhost:8000/api")?
            .set_default("control_plane.timeout_secs", default_http_timeout())?
            .set_default("venue.base_url", "https://apiconnect.angelone.in")?
            .set_default("venue.timeout_secs", default_http_timeout())?
            .set_default("executor.timeout_secs", default_job_timeout())?
            .set_default("scheduler.interval_minutes", default_interval_minutes())?
            .set_default("scheduler.strategy_pause_secs", default_strategy_pause())?
            .set_default("scheduler.crash_backoff_secs", default_crash_backoff())?
            .set_default("retry.max_retries", default_max_retries())?
            .set_default("retry.retry_delay_secs", default_retry_delay())?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;

        for (var, key) in LEGACY_ENV {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_default(*key, value)?;
            }
        }

        Ok(builder)
    }

    /// Validate configuration values. Any failure here is fatal at startup.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("API_TOKEN", &self.control_plane.api_token),
            ("ANGEL_API_KEY", &self.venue.api_key),
            ("ANGEL_CLIENT_ID", &self.venue.client_id),
            ("ANGEL_MPIN", &self.venue.mpin),
            ("ANGEL_TOTP_SECRET", &self.venue.totp_secret),
        ];

        let missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(HedgeError::MissingConfig(missing));
        }

        let mut errors = Vec::new();

        if let Err(e) = PasscodeGenerator::from_base32(&self.venue.totp_secret) {
            errors.push(format!("venue.totp_secret: {e}"));
        }

        if self.control_plane.base_url.trim().is_empty() {
            errors.push("control_plane.base_url must not be empty".to_string());
        }

        if self.executor.timeout_secs == 0 {
            errors.push("executor.timeout_secs must be positive".to_string());
        }

        if self.scheduler.interval_minutes == 0 {
            errors.push("scheduler.interval_minutes must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(HedgeError::InvalidConfig(errors.join("; ")))
        }
    }

    /// Configuration with the given credentials and defaults everywhere else
    pub fn with_credentials(
        control_plane_url: &str,
        api_token: &str,
        venue_url: &str,
        totp_secret: &str,
    ) -> Self {
        Self {
            control_plane: ControlPlaneConfig {
                base_url: control_plane_url.to_string(),
                api_token: api_token.to_string(),
                timeout_secs: default_http_timeout(),
                user_agent: default_user_agent(),
            },
            venue: VenueConfig {
                base_url: venue_url.to_string(),
                api_key: "api-key".to_string(),
                client_id: "A123456".to_string(),
                mpin: "1234".to_string(),
                totp_secret: totp_secret.to_string(),
                timeout_secs: default_http_timeout(),
                client_local_ip: default_local_ip(),
                client_public_ip: default_local_ip(),
                mac_address: default_mac_address(),
                max_session_age_secs: None,
            },
            executor: ExecutorConfig::default(),
            scheduler: SchedulerConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
