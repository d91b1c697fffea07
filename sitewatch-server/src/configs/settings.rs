use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::models::Location;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            level: String::from("info"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Pause between reconnect attempts after a failed poll.
    pub reconnect_delay_ms: u64,
    /// Capacity of the client's outgoing request queue.
    pub capacity: usize,
}

impl Default for Gateway {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 1883,
            client_id: String::from("iot_dashboard"),
            keep_alive_secs: 60,
            reconnect_delay_ms: 2000,
            capacity: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Telemetry {
    /// Location that untagged bus traffic and commands without a location
    /// are attributed to.
    pub primary_location: Location,
    pub liveness_timeout_secs: u64,
    pub watchdog_period_secs: u64,
    pub history_capacity: usize,
}

impl Telemetry {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    pub fn watchdog_period(&self) -> Duration {
        Duration::from_secs(self.watchdog_period_secs)
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            primary_location: Location::Office,
            liveness_timeout_secs: 30,
            watchdog_period_secs: 5,
            history_capacity: 20,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub logger: Logger,
    pub gateway: Gateway,
    pub telemetry: Telemetry,
}

impl Settings {
    /// Layers built-in defaults, `configs/default`, `configs/{RUN_MODE}` and
    /// `SITEWATCH__*` environment variables, later sources winning.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name("configs/default").required(false))
            .add_source(File::with_name(&format!("configs/{run_mode}")).required(false))
            .add_source(
                Environment::with_prefix("SITEWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let telemetry = &self.telemetry;

        if telemetry.history_capacity == 0 {
            return Err(ConfigError::Message(
                "telemetry.history_capacity must be at least 1".into(),
            ));
        }

        if telemetry.watchdog_period_secs == 0 {
            return Err(ConfigError::Message(
                "telemetry.watchdog_period_secs must be at least 1".into(),
            ));
        }

        if telemetry.liveness_timeout_secs <= telemetry.watchdog_period_secs {
            return Err(ConfigError::Message(
                "telemetry.liveness_timeout_secs must be longer than the watchdog period".into(),
            ));
        }

        if self.gateway.keep_alive_secs == 0 {
            return Err(ConfigError::Message(
                "gateway.keep_alive_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
