use std::error::Error;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub publish_interval_secs: u64,
    /// Number of publish ticks that make up one simulated day.
    pub cycle_ticks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub gateway: Gateway,
    pub device: Device,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let settings = Self::parse(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../",
            "configs/mock.toml"
        )))?;

        Ok(settings)
    }

    pub fn parse(source: &str) -> Result<Self, Box<dyn Error>> {
        let settings: Settings = toml::from_str(source)?;

        if settings.device.publish_interval_secs == 0 {
            return Err("device.publish_interval_secs must be positive".into());
        }
        if settings.device.cycle_ticks == 0 {
            return Err("device.cycle_ticks must be positive".into());
        }

        Ok(settings)
    }
}
