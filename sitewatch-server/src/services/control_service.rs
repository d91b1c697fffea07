use std::sync::Arc;

use rumqttc::QoS;

use crate::errors::{ApiError, CommandError};
use crate::models::{Field, Location, LocationView, Snapshot};
use crate::services::bus_service::Publisher;
use crate::services::state_store::StateStore;
use crate::services::topic_router;

/// State-facing side of the HTTP API: reads snapshots and sends commands down
/// to devices.
pub struct ControlService {
    store: Arc<StateStore>,
    publisher: Arc<dyn Publisher>,
    primary: Location,
}

impl ControlService {
    pub fn new(store: Arc<StateStore>, publisher: Arc<dyn Publisher>, primary: Location) -> Self {
        Self {
            store,
            publisher,
            primary,
        }
    }

    pub fn primary(&self) -> Location {
        self.primary
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot_all()
    }

    pub fn location_snapshot(&self, location: &str) -> Result<(LocationView, bool), ApiError> {
        let location = location.parse::<Location>()?;

        Ok((self.store.snapshot(location), self.store.bus_connected()))
    }

    /// Publishes `control/{device}` and echoes the value into local state right
    /// away. The echo leaves device liveness alone, and a later message from the
    /// device overwrites it. Fails fast when the bus cannot take the command.
    pub async fn issue_command(
        &self,
        location: Option<&str>,
        device: &str,
        value: &str,
    ) -> Result<(), ApiError> {
        let location = match location {
            Some(name) => name.parse::<Location>()?,
            None => self.primary,
        };

        let field = device
            .parse::<Field>()
            .map_err(|_| CommandError::InvalidCommand(device.to_string()))?;

        field.parse(value).map_err(CommandError::from)?;

        self.publisher
            .publish(
                &topic_router::control_topic(field.name()),
                value,
                QoS::AtLeastOnce,
                false,
            )
            .await?;

        self.store
            .apply_echo(location, field, value)
            .map_err(CommandError::from)?;

        tracing::info!(location = %location, field = %field, value, "command issued");

        Ok(())
    }
}
