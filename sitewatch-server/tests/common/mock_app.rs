use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use rumqttc::QoS;

use sitewatch_server::app::create_app;
use sitewatch_server::errors::BusError;
use sitewatch_server::models::Location;
use sitewatch_server::services::{
    BusEventHandler, ControlService, ManualClock, Publisher, StateStore, Watchdog,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

/// Stands in for the MQTT client and keeps everything it is asked to send.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Published>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        topic: &str,
        payload: &str,
        qos: QoS,
        retain: bool,
    ) -> Result<(), BusError> {
        self.published.lock().unwrap().push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
            retain,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        Ok(())
    }
}

pub struct MockApp {
    pub clock: Arc<ManualClock>,
    pub store: Arc<StateStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub bus: BusEventHandler,
    pub watchdog: Watchdog,
    pub router: Router,
}

impl MockApp {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(time::macros::datetime!(2024-05-01 12:00 UTC)));
        let store = Arc::new(StateStore::new(20, clock.clone()));
        let publisher = Arc::new(RecordingPublisher::default());

        let bus = BusEventHandler::new(store.clone(), Location::Office);
        let watchdog = Watchdog::new(
            store.clone(),
            std::time::Duration::from_secs(30),
            std::time::Duration::from_secs(5),
        );

        let control_service = Arc::new(ControlService::new(
            store.clone(),
            publisher.clone(),
            Location::Office,
        ));

        Self {
            clock,
            store,
            publisher,
            bus,
            watchdog,
            router: create_app(control_service),
        }
    }

    pub fn with_bus_connected(self) -> Self {
        self.bus.on_connect(true);
        self
    }
}
