mod settings;

pub use settings::{Gateway, Logger, Server, Settings, Telemetry};
