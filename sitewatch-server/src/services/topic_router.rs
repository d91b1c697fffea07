pub const CONNECTION_TOPIC: &str = "device/connection";
pub const HEARTBEAT_TOPIC: &str = "test/topic";

const CONTROL_SEGMENT: &str = "control";
const SENSOR_SEGMENT: &str = "sensor";

/// Where an incoming topic belongs. Field names are carried raw; resolving them
/// against the known field set is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    ConnectionStatus,
    Heartbeat,
    Control(String),
    Sensor(String),
    Unrecognized,
}

/// Classifies a topic. Never fails: anything that does not fit a rule is
/// [`Route::Unrecognized`].
pub fn classify(topic: &str) -> Route {
    if topic == CONNECTION_TOPIC {
        return Route::ConnectionStatus;
    }

    if topic == HEARTBEAT_TOPIC {
        return Route::Heartbeat;
    }

    let segments: Vec<&str> = topic.split('/').collect();

    let Some(last) = segments.last().filter(|last| !last.is_empty()) else {
        return Route::Unrecognized;
    };

    // A bare `control` or `sensor` topic names no field.
    if segments.len() < 2 {
        return Route::Unrecognized;
    }

    let parents = &segments[..segments.len() - 1];

    if parents.contains(&CONTROL_SEGMENT) {
        Route::Control(last.to_string())
    } else if parents.contains(&SENSOR_SEGMENT) {
        Route::Sensor(last.to_string())
    } else {
        Route::Unrecognized
    }
}

/// Topic for commands sent down to a device field.
pub fn control_topic(field: &str) -> String {
    format!("{CONTROL_SEGMENT}/{field}")
}
