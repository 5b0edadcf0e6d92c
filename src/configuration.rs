use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub mempool: MempoolSettings,
    pub upstream: UpstreamSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    /// Network label carried into log lines; one mirror instance serves one
    /// network.
    pub network: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MempoolSettings {
    /// Nominal delay between reconciliation passes. A single pass may run
    /// up to ten times this long before its ingest loop is cut short.
    pub refresh_rate_ms: u64,
    pub rate_window_seconds: u64,
    pub latest_capacity: usize,
    pub flush_protection: FlushProtectionSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlushProtectionSettings {
    /// Pools smaller than this never arm the latch.
    pub min_before_size: usize,
    /// Arm when `upstream / before` drops to this fraction or below.
    pub ratio_threshold: f64,
    pub cooldown_ms: u64,
}

impl Default for MempoolSettings {
    fn default() -> Self {
        Self {
            refresh_rate_ms: 2000,
            rate_window_seconds: 150,
            latest_capacity: 6,
            flush_protection: FlushProtectionSettings::default(),
        }
    }
}

impl Default for FlushProtectionSettings {
    fn default() -> Self {
        Self {
            min_before_size: 20_000,
            ratio_threshold: 0.80,
            cooldown_ms: 120_000,
        }
    }
}

impl MempoolSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.refresh_rate_ms == 0 {
            return Err(SettingsError::Zero("mempool.refresh_rate_ms"));
        }
        if self.rate_window_seconds == 0 {
            return Err(SettingsError::Zero("mempool.rate_window_seconds"));
        }
        if self.latest_capacity == 0 {
            return Err(SettingsError::Zero("mempool.latest_capacity"));
        }
        if self.flush_protection.cooldown_ms == 0 {
            return Err(SettingsError::Zero("mempool.flush_protection.cooldown_ms"));
        }
        let ratio = self.flush_protection.ratio_threshold;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(SettingsError::RatioOutOfRange(ratio));
        }
        Ok(())
    }

    pub fn refresh_rate(&self) -> Duration {
        Duration::from_millis(self.refresh_rate_ms)
    }

    /// Worst-case duration of a single pass's ingest loop.
    pub fn pass_budget(&self) -> Duration {
        Duration::from_millis(self.refresh_rate_ms.saturating_mul(10))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("mempool.flush_protection.ratio_threshold must be within (0, 1], got {0}")]
    RatioOutOfRange(f64),
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
