use std::collections::BTreeMap;

use rand::Rng;

use crate::simulate::{jitter, simulated_humidity, simulated_temperature};

pub const CONNECTION_TOPIC: &str = "device/connection";
pub const HEARTBEAT_TOPIC: &str = "test/topic";
pub const CONTROL_FILTER: &str = "control/#";

pub const ONLINE: &str = "ONLINE";
pub const OFFLINE: &str = "OFFLINE";

const PINS: [&str; 4] = ["output_d5", "output_d6", "output_d7", "led_d7"];
const INPUTS: [&str; 4] = ["d0", "d1", "d2", "d3"];

/// The board as the mock sees it: what its output pins are set to.
#[derive(Debug, Clone)]
pub struct MockDevice {
    pins: BTreeMap<&'static str, String>,
}

impl Default for MockDevice {
    fn default() -> Self {
        let pins = PINS
            .into_iter()
            .map(|pin| {
                let initial = if pin == "led_d7" { "0" } else { "OFF" };
                (pin, initial.to_string())
            })
            .collect();

        Self { pins }
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&self, name: &str) -> Option<&str> {
        self.pins.get(name).map(String::as_str)
    }

    /// Applies a `control/{pin}` message. Returns the pin that changed, or
    /// `None` when the topic addresses nothing on this board.
    pub fn apply(&mut self, topic: &str, payload: &str) -> Option<&'static str> {
        let name = topic.strip_prefix("control/")?;
        let (pin, value) = self.pins.iter_mut().find(|(pin, _)| **pin == name)?;

        *value = payload.to_string();

        Some(*pin)
    }

    /// One round of readings as `(topic, payload)` pairs.
    pub fn sample<R: Rng>(&self, rng: &mut R, day_fraction: f64) -> Vec<(String, String)> {
        let temperature = jitter(rng, simulated_temperature(day_fraction), 0.3);
        let humidity = jitter(rng, simulated_humidity(day_fraction), 1.0).clamp(0.0, 100.0);

        let mut readings = vec![
            ("sensor/temperature".to_string(), format!("{temperature:.1}")),
            ("sensor/humidity".to_string(), format!("{humidity:.1}")),
        ];

        for input in INPUTS {
            let level = u8::from(rng.random_bool(0.2));
            readings.push((format!("sensor/{input}"), level.to_string()));
        }

        readings.push((HEARTBEAT_TOPIC.to_string(), "ping".to_string()));

        readings
    }
}
