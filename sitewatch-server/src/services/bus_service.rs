use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, LastWill, MqttOptions,
    Outgoing, Packet, QoS, SubscribeFilter,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::configs::Gateway;
use crate::errors::{BusError, ValidationError};
use crate::models::{Field, Location};
use crate::services::state_store::StateStore;
use crate::services::topic_router::{self, CONNECTION_TOPIC, HEARTBEAT_TOPIC, Route};

pub const ONLINE: &str = "ONLINE";
pub const OFFLINE: &str = "OFFLINE";

/// Fire-and-forget access to the bus. Implementations queue the request and
/// return; they never wait for the broker, nor for room in a full queue.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        payload: &str,
        qos: QoS,
        retain: bool,
    ) -> Result<(), BusError>;

    async fn disconnect(&self) -> Result<(), BusError>;
}

// The request queue is only drained while the event loop reaches the broker,
// so a full queue is reported instead of awaited.
#[async_trait]
impl Publisher for AsyncClient {
    async fn publish(
        &self,
        topic: &str,
        payload: &str,
        qos: QoS,
        retain: bool,
    ) -> Result<(), BusError> {
        self.try_publish(topic, qos, retain, payload.as_bytes().to_vec())?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        self.try_disconnect()?;
        Ok(())
    }
}

/// Announces this service as offline and then disconnects. The announcement is
/// queued first so the broker sees it before the disconnect.
pub async fn announce_offline(publisher: &dyn Publisher) -> Result<(), BusError> {
    publisher
        .publish(CONNECTION_TOPIC, OFFLINE, QoS::AtLeastOnce, true)
        .await?;
    publisher.disconnect().await
}

/// Queues the subscriptions without waiting. Called from the task that polls
/// the event loop, which is the only thing that can make room in the queue.
pub fn subscribe(client: &AsyncClient) -> Result<(), BusError> {
    client.try_subscribe_many(BusEventHandler::subscriptions())?;
    Ok(())
}

/// What the polling task does after one event loop result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Subscribe,
    /// Wait out the reconnect delay before polling again.
    Backoff,
    Stop,
}

/// What became of one incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Applied,
    Rejected(ValidationError),
    /// Understood but carries no state change.
    Ignored,
    /// Not something this service tracks.
    Dropped,
}

/// Bus callbacks mapped onto the state store. Holds no I/O of its own, so every
/// callback is bounded in-memory work.
pub struct BusEventHandler {
    store: Arc<StateStore>,
    location: Location,
}

impl BusEventHandler {
    pub const SUBSCRIPTIONS: [&'static str; 4] =
        [CONNECTION_TOPIC, "control/#", "sensor/#", HEARTBEAT_TOPIC];

    pub fn new(store: Arc<StateStore>, location: Location) -> Self {
        Self { store, location }
    }

    pub fn subscriptions() -> Vec<SubscribeFilter> {
        Self::SUBSCRIPTIONS
            .iter()
            .map(|topic| SubscribeFilter::new(topic.to_string(), QoS::AtLeastOnce))
            .collect()
    }

    /// Returns whether the caller should (re)issue the subscriptions.
    pub fn on_connect(&self, success: bool) -> bool {
        self.store.set_bus_connected(success);

        if success {
            tracing::info!("connected to MQTT broker");
        } else {
            tracing::error!("failed to connect to MQTT broker");
        }

        success
    }

    /// Bus-level loss only. Device liveness is left to the watchdog and to
    /// explicit connection messages.
    pub fn on_disconnect(&self) {
        if self.store.set_bus_connected(false) {
            tracing::warn!("disconnected from MQTT broker");
        }
    }

    pub fn on_message(&self, topic: &str, payload: &[u8]) -> MessageOutcome {
        let payload = String::from_utf8_lossy(payload);
        let location = self.location;

        tracing::info!("message received on {}: {}", topic, payload);

        match topic_router::classify(topic) {
            Route::ConnectionStatus => match payload.as_ref() {
                ONLINE => {
                    self.store.mark_device_event(location);
                    MessageOutcome::Applied
                }
                OFFLINE => {
                    self.store.set_connectivity(location, false);
                    tracing::info!(location = %location, "device reported offline");
                    MessageOutcome::Applied
                }
                other => {
                    tracing::debug!("ignoring connection payload {:?}", other);
                    MessageOutcome::Ignored
                }
            },
            Route::Control(name) => match name.parse::<Field>() {
                Ok(field) => self.apply(location, field, &payload),
                Err(_) => {
                    tracing::warn!("dropping control message for unknown field {}", name);
                    MessageOutcome::Dropped
                }
            },
            Route::Sensor(name) => match Field::from_sensor_name(&name) {
                Some(field) if field.is_sensor_input() => self.apply(location, field, &payload),
                _ => {
                    tracing::debug!("dropping sensor message for unknown field {}", name);
                    MessageOutcome::Dropped
                }
            },
            Route::Heartbeat => {
                tracing::debug!("heartbeat: {}", payload);
                MessageOutcome::Ignored
            }
            Route::Unrecognized => {
                tracing::debug!("dropping message on unrecognized topic {}", topic);
                MessageOutcome::Dropped
            }
        }
    }

    pub fn on_event(&self, event: Result<Event, ConnectionError>) -> LoopAction {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if self.on_connect(ack.code == ConnectReturnCode::Success) {
                    LoopAction::Subscribe
                } else {
                    LoopAction::Continue
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                self.on_message(&publish.topic, &publish.payload);
                LoopAction::Continue
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                self.on_disconnect();
                LoopAction::Continue
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                self.on_disconnect();
                tracing::info!("MQTT client disconnected");
                LoopAction::Stop
            }
            Ok(_) => LoopAction::Continue,
            Err(ConnectionError::ConnectionRefused(code)) => {
                tracing::error!("broker refused connection: {:?}", code);
                self.on_connect(false);
                LoopAction::Backoff
            }
            Err(e) => {
                tracing::error!("MQTT error: {}", e);
                self.on_disconnect();
                LoopAction::Backoff
            }
        }
    }

    fn apply(&self, location: Location, field: Field, payload: &str) -> MessageOutcome {
        match self.store.update_field(location, field, payload) {
            Ok(()) => MessageOutcome::Applied,
            Err(e) => {
                tracing::warn!(location = %location, "{}", e);
                MessageOutcome::Rejected(e)
            }
        }
    }
}

/// Owns the MQTT client and drives its event loop.
pub struct BusService {
    client: AsyncClient,
    handler: Arc<BusEventHandler>,
    reconnect_delay: Duration,
}

impl BusService {
    /// Builds the client with the retained OFFLINE last will registered. The
    /// returned event loop must be handed to [`BusService::spawn`].
    pub fn new(gateway: &Gateway, handler: Arc<BusEventHandler>) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(&gateway.client_id, &gateway.host, gateway.port);
        options.set_keep_alive(Duration::from_secs(gateway.keep_alive_secs));
        options.set_last_will(LastWill::new(
            CONNECTION_TOPIC,
            OFFLINE.as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
        ));

        let (client, event_loop) = AsyncClient::new(options, gateway.capacity);

        let service = Self {
            client,
            handler,
            reconnect_delay: Duration::from_millis(gateway.reconnect_delay_ms),
        };

        (service, event_loop)
    }

    pub fn publisher(&self) -> Arc<dyn Publisher> {
        Arc::new(self.client.clone())
    }

    /// Polls the event loop until the client disconnects or `shutdown` flips.
    /// Reconnection is left to the event loop itself, which dials again on the
    /// next poll after an error.
    pub fn spawn(
        &self,
        mut event_loop: EventLoop,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let client = self.client.clone();
        let handler = Arc::clone(&self.handler);
        let reconnect_delay = self.reconnect_delay;

        tokio::spawn(async move {
            let mut subscribe_pending = false;

            loop {
                tokio::select! {
                    event = event_loop.poll() => match handler.on_event(event) {
                        LoopAction::Subscribe => subscribe_pending = true,
                        LoopAction::Backoff => tokio::time::sleep(reconnect_delay).await,
                        LoopAction::Stop => break,
                        LoopAction::Continue => {}
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }

                // A full queue drains as the loop keeps polling; retry then.
                if subscribe_pending {
                    match subscribe(&client) {
                        Ok(()) => {
                            subscribe_pending = false;
                            tracing::info!("subscribed to {:?}", BusEventHandler::SUBSCRIPTIONS);
                        }
                        Err(e) => tracing::debug!("subscribe deferred: {}", e),
                    }
                }
            }
        })
    }

    pub async fn shutdown(&self) -> Result<(), BusError> {
        announce_offline(&self.client).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rumqttc::{ConnAck, Publish};

    use crate::configs::Telemetry;
    use crate::models::FieldValue;
    use crate::services::clock::ManualClock;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Publish(String, String, QoS, bool),
        Disconnect,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
    }

    #[async_trait]
    impl Publisher for Recorder {
        async fn publish(
            &self,
            topic: &str,
            payload: &str,
            qos: QoS,
            retain: bool,
        ) -> Result<(), BusError> {
            self.calls.lock().unwrap().push(Call::Publish(
                topic.to_string(),
                payload.to_string(),
                qos,
                retain,
            ));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), BusError> {
            self.calls.lock().unwrap().push(Call::Disconnect);
            Ok(())
        }
    }

    /// A client whose broker is never reached, so nothing drains its queue.
    fn offline_client(capacity: usize) -> (AsyncClient, EventLoop) {
        let options = MqttOptions::new("sitewatch-test", "127.0.0.1", 1);
        AsyncClient::new(options, capacity)
    }

    fn setup() -> (Arc<StateStore>, BusEventHandler) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(StateStore::new(Telemetry::default().history_capacity, clock));
        let handler = BusEventHandler::new(store.clone(), Location::Office);
        (store, handler)
    }

    #[test]
    fn test_connect_success_requests_subscriptions() {
        let (store, handler) = setup();

        assert!(handler.on_connect(true));
        assert!(store.bus_connected());

        // Repeated connects are harmless.
        assert!(handler.on_connect(true));
        assert!(store.bus_connected());
    }

    #[test]
    fn test_connect_failure_skips_subscriptions() {
        let (store, handler) = setup();

        assert!(!handler.on_connect(false));
        assert!(!store.bus_connected());
    }

    #[test]
    fn test_bus_disconnect_keeps_device_state() {
        let (store, handler) = setup();
        handler.on_connect(true);
        handler.on_message("device/connection", b"ONLINE");

        handler.on_disconnect();

        assert!(!store.bus_connected());
        assert!(store.snapshot(Location::Office).connected);
    }

    #[test]
    fn test_connection_status_messages() {
        let (store, handler) = setup();

        assert_eq!(handler.on_message("device/connection", b"ONLINE"), MessageOutcome::Applied);
        assert!(store.snapshot(Location::Office).connected);

        assert_eq!(handler.on_message("device/connection", b"OFFLINE"), MessageOutcome::Applied);
        assert!(!store.snapshot(Location::Office).connected);

        assert_eq!(handler.on_message("device/connection", b"MAYBE"), MessageOutcome::Ignored);
        assert!(!store.snapshot(Location::Office).connected);
    }

    #[test]
    fn test_control_message_updates_field() {
        let (store, handler) = setup();

        assert_eq!(handler.on_message("control/output_d5", b"ON"), MessageOutcome::Applied);

        let view = store.snapshot(Location::Office);
        assert_eq!(view.field(Field::OutputD5), Some(&FieldValue::Text("ON".into())));
        assert!(view.connected);
    }

    #[test]
    fn test_invalid_brightness_is_rejected() {
        let (store, handler) = setup();
        handler.on_message("control/led_d7", b"60");

        let outcome = handler.on_message("control/led_d7", b"abc");

        assert!(matches!(outcome, MessageOutcome::Rejected(_)));
        assert_eq!(
            store.snapshot(Location::Office).field(Field::LedD7),
            Some(&FieldValue::Level(60))
        );
    }

    #[test]
    fn test_unknown_control_field_is_dropped() {
        let (store, handler) = setup();
        let before = store.snapshot(Location::Office).fields;

        assert_eq!(handler.on_message("control/output_d9", b"ON"), MessageOutcome::Dropped);
        assert_eq!(store.snapshot(Location::Office).fields, before);
    }

    #[test]
    fn test_sensor_messages() {
        let (store, handler) = setup();

        assert_eq!(handler.on_message("sensor/d0", b"1"), MessageOutcome::Applied);
        assert_eq!(handler.on_message("sensor/temperature", b"22.5"), MessageOutcome::Applied);
        assert_eq!(handler.on_message("sensor/output_d5", b"ON"), MessageOutcome::Dropped);
        assert_eq!(handler.on_message("sensor/pressure", b"1013"), MessageOutcome::Dropped);

        let view = store.snapshot(Location::Office);
        assert_eq!(view.field(Field::D0), Some(&FieldValue::Text("1".into())));
        assert_eq!(view.field(Field::Temperature), Some(&FieldValue::Number(22.5)));
        assert_eq!(view.field(Field::OutputD5), Some(&FieldValue::Text("OFF".into())));
        assert_eq!(view.history.len(), 1);
    }

    #[test]
    fn test_all_messages_go_to_configured_location() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(StateStore::new(Telemetry::default().history_capacity, clock));
        let handler = BusEventHandler::new(store.clone(), Location::Home);

        handler.on_message("sensor/d2", b"1");

        assert_eq!(
            store.snapshot(Location::Home).field(Field::D2),
            Some(&FieldValue::Text("1".into()))
        );
        assert!(!store.snapshot(Location::Office).connected);
    }

    #[test]
    fn test_heartbeat_and_unrecognized() {
        let (store, handler) = setup();

        assert_eq!(handler.on_message("test/topic", b"ping"), MessageOutcome::Ignored);
        assert_eq!(handler.on_message("weather/today", b"sunny"), MessageOutcome::Dropped);
        assert!(!store.snapshot(Location::Office).connected);
    }

    #[test]
    fn test_non_utf8_payload_does_not_panic() {
        let (store, handler) = setup();

        let outcome = handler.on_message("control/led_d7", &[0xff, 0xfe]);

        assert!(matches!(outcome, MessageOutcome::Rejected(_)));
        assert_eq!(
            store.snapshot(Location::Office).field(Field::LedD7),
            Some(&FieldValue::Level(0))
        );
    }

    #[test]
    fn test_subscription_filters() {
        let filters = BusEventHandler::subscriptions();
        let paths: Vec<&str> = filters.iter().map(|f| f.path.as_str()).collect();

        assert_eq!(paths, vec!["device/connection", "control/#", "sensor/#", "test/topic"]);
        assert!(filters.iter().all(|f| f.qos == QoS::AtLeastOnce));
    }

    #[test]
    fn test_event_dispatch() {
        let (store, handler) = setup();

        let accepted =
            Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)));
        assert_eq!(handler.on_event(Ok(accepted)), LoopAction::Subscribe);
        assert!(store.bus_connected());

        let publish = Publish::new("sensor/d3", QoS::AtLeastOnce, "1");
        assert_eq!(
            handler.on_event(Ok(Event::Incoming(Packet::Publish(publish)))),
            LoopAction::Continue
        );
        assert_eq!(
            store.snapshot(Location::Office).field(Field::D3),
            Some(&FieldValue::Text("1".into()))
        );

        assert_eq!(
            handler.on_event(Ok(Event::Incoming(Packet::Disconnect))),
            LoopAction::Continue
        );
        assert!(!store.bus_connected());

        let refused =
            Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::NotAuthorized, false)));
        assert_eq!(handler.on_event(Ok(refused)), LoopAction::Continue);

        assert_eq!(
            handler.on_event(Err(ConnectionError::ConnectionRefused(
                ConnectReturnCode::BadUserNamePassword
            ))),
            LoopAction::Backoff
        );
        assert_eq!(handler.on_event(Err(ConnectionError::RequestsDone)), LoopAction::Backoff);
        assert!(!store.bus_connected());

        assert_eq!(
            handler.on_event(Ok(Event::Outgoing(Outgoing::Disconnect))),
            LoopAction::Stop
        );
    }

    #[tokio::test]
    async fn test_announce_offline_then_disconnect() {
        let recorder = Recorder::default();

        announce_offline(&recorder).await.unwrap();

        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec![
                Call::Publish("device/connection".into(), "OFFLINE".into(), QoS::AtLeastOnce, true),
                Call::Disconnect,
            ]
        );
    }

    #[tokio::test]
    async fn test_full_queue_fails_instead_of_waiting() {
        let (client, _event_loop) = offline_client(2);

        let results = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            let mut results = Vec::new();
            for _ in 0..5 {
                let result =
                    Publisher::publish(&client, "control/output_d5", "ON", QoS::AtLeastOnce, false)
                        .await;
                results.push(result);
            }
            results
        })
        .await
        .expect("publishing must not wait on a full queue");

        assert!(results[..2].iter().all(Result::is_ok));
        assert!(results[2..].iter().all(|r| matches!(r, Err(BusError::Client(_)))));

        let shutdown =
            tokio::time::timeout(std::time::Duration::from_secs(1), announce_offline(&client))
                .await
                .expect("shutdown must not wait on a full queue");
        assert!(shutdown.is_err());
    }

    #[test]
    fn test_subscribe_on_full_queue_returns_error() {
        let (client, _event_loop) = offline_client(1);
        assert!(subscribe(&client).is_ok());

        assert!(matches!(subscribe(&client), Err(BusError::Client(_))));
    }
}
