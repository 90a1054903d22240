use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub booking_rules: BookingRules,
    pub recommend: RecommendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// "memory" or "postgres"
    pub backend: String,
    pub url: Option<String>,
}

/// Knobs for the hold/confirm path and its background maintenance.
#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    pub hold_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub availability_max_age_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub transient_retry_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub transient_retry_base_ms: u64,
    #[serde(default = "default_op_timeout")]
    pub op_timeout_seconds: u64,
}

fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    50
}
fn default_op_timeout() -> u64 {
    10
}

impl BookingRules {
    pub fn hold_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_ttl_seconds as i64)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn availability_max_age(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.availability_max_age_seconds)
    }

    pub fn op_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.op_timeout_seconds)
    }
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_ttl_seconds: 300,
            sweep_interval_seconds: 60,
            availability_max_age_seconds: 5,
            transient_retry_attempts: default_retry_attempts(),
            transient_retry_base_ms: default_retry_base_ms(),
            op_timeout_seconds: default_op_timeout(),
        }
    }
}

/// Demand signals and shortlist sizing for the recommendation scorer.
#[derive(Debug, Deserialize, Clone)]
pub struct RecommendConfig {
    /// "HH:MM" start times that historically convert well.
    pub popular_start_times: Vec<String>,
    /// ISO weekday numbers, Monday = 1.
    pub high_demand_weekdays: Vec<u32>,
    pub last_minute_hours: i64,
    pub max_results: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            popular_start_times: vec!["09:00".to_string(), "14:00".to_string()],
            high_demand_weekdays: vec![1, 2, 5],
            last_minute_hours: 48,
            max_results: 3,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Environment-specific overlay, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `CRENEAU__SERVER__PORT=9090`
            .add_source(config::Environment::with_prefix("CRENEAU").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
