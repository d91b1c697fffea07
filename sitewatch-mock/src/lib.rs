use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, Event, LastWill, MqttOptions, Outgoing, Packet, QoS};
use tokio::{signal, time};

use crate::device::{CONNECTION_TOPIC, CONTROL_FILTER, MockDevice, OFFLINE, ONLINE};
use crate::settings::Settings;
use crate::simulate::day_fraction;

pub mod device;
pub mod settings;
pub mod simulate;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(settings: &Arc<Settings>) -> Result<(), Box<dyn Error>> {
    let gateway = &settings.gateway;

    let mut options = MqttOptions::new(&gateway.client_id, &gateway.host, gateway.port);
    options.set_keep_alive(Duration::from_secs(gateway.keep_alive_secs));
    options.set_last_will(LastWill::new(CONNECTION_TOPIC, OFFLINE, QoS::AtLeastOnce, true));

    let (client, mut event_loop) = AsyncClient::new(options, 16);

    let mut device = MockDevice::new();
    let mut interval = time::interval(Duration::from_secs(settings.device.publish_interval_secs));
    let mut tick: u32 = 0;
    let mut announce_pending = false;

    tracing::info!("mock device connecting to {}:{}", gateway.host, gateway.port);

    loop {
        tokio::select! {
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("connected");
                    announce_pending = true;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload);

                    match device.apply(&publish.topic, &payload) {
                        Some(pin) => tracing::info!("{} set to {}", pin, payload),
                        None => tracing::debug!("ignoring {} = {}", publish.topic, payload),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("MQTT error: {}", e);
                    time::sleep(RECONNECT_DELAY).await;
                }
            },
            _ = interval.tick() => {
                let readings = device.sample(&mut rand::rng(), day_fraction(tick, settings.device.cycle_ticks));

                for (topic, payload) in readings {
                    tracing::debug!("send {} = {}", topic, payload);

                    if let Err(e) = client.try_publish(topic, QoS::AtLeastOnce, false, payload) {
                        tracing::warn!("dropping sample: {}", e);
                    }
                }

                tick = tick.wrapping_add(1);
            }
            _ = signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }

        // Only this loop drains the request queue, so never wait on it here.
        if announce_pending {
            match announce(&client) {
                Ok(()) => {
                    announce_pending = false;
                    tracing::info!("announced {}", ONLINE);
                }
                Err(e) => tracing::debug!("announce deferred: {}", e),
            }
        }
    }

    client.try_publish(CONNECTION_TOPIC, QoS::AtLeastOnce, true, OFFLINE)?;
    client.try_disconnect()?;

    // Drive the loop until the disconnect has been written out.
    let drain = async {
        loop {
            match event_loop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };

    if time::timeout(DISCONNECT_TIMEOUT, drain).await.is_err() {
        tracing::warn!("broker did not take the disconnect in time");
    }

    Ok(())
}

fn announce(client: &AsyncClient) -> Result<(), ClientError> {
    client.try_publish(CONNECTION_TOPIC, QoS::AtLeastOnce, true, ONLINE)?;
    client.try_subscribe(CONTROL_FILTER, QoS::AtLeastOnce)
}
