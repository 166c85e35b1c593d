use crate::config::MqttConfig;
use crate::get_unix_ts;
use crate::metering_han::Telegram;
use crate::sink::TelemetrySink;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio_util::sync::CancellationToken;

const QUEUE_SIZE: usize = 100;
const RECONNECT_PAUSE: Duration = Duration::from_secs(5);

#[derive(Serialize, Debug)]
pub struct MeteringData {
    pub id: String,
    pub meter_name: String,
    pub protocol: String,
    pub transmission_time: u64,
    pub metered_values: serde_json::Map<String, serde_json::Value>,
}

impl MeteringData {
    pub fn from_telegram(telegram: &Telegram) -> Self {
        let mut metered_values = serde_json::Map::new();
        for m in telegram.measurements.iter() {
            metered_values.insert(m.obis_code.clone(), m.value.into());
            metered_values.insert(format!("{}_unit", m.obis_code), m.unit.clone().into());
        }

        let transmission_time = get_unix_ts();
        return MeteringData {
            id: format!("han-{}-{}", telegram.identity, transmission_time),
            meter_name: telegram.identity.clone(),
            protocol: "han".to_string(),
            transmission_time,
            metered_values,
        };
    }
}

/// Topic for one meter, characters MQTT reserves are replaced
pub fn device_topic(base_topic: &str, identity: &str) -> String {
    let name: String = identity
        .chars()
        .map(|c| match c {
            '/' | '+' | '#' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    format!("{base_topic}/devs/han/{name}")
}

/// Queues telegrams for the MQTT thread, never waits for the broker
pub struct MqttSink {
    sender: Sender<Telegram>,
}

impl TelemetrySink for MqttSink {
    fn accept(&self, telegram: Telegram) {
        match self.sender.try_send(telegram) {
            Ok(_) => {}
            Err(TrySendError::Full(t)) => {
                warn!("MQTT queue is full, dropping telegram from {}", t.identity);
            }
            Err(TrySendError::Closed(t)) => {
                debug!("MQTT publisher stopped, dropping telegram from {}", t.identity);
            }
        }
    }
}

pub struct MqttManager {
    client: AsyncClient,
    eventloop: Option<EventLoop>,
    rx: Receiver<Telegram>,
    base_topic: String,
}

impl MqttManager {
    pub fn new(config: &MqttConfig) -> (Self, MqttSink) {
        let (tx, rx) = mpsc::channel(QUEUE_SIZE);

        let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if !config.user.is_empty() {
            mqttoptions.set_credentials(config.user.clone(), config.pass.clone());
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, 10);
        let manager = MqttManager {
            client,
            eventloop: Some(eventloop),
            rx,
            base_topic: config.base_topic.clone(),
        };
        return (manager, MqttSink { sender: tx });
    }

    pub async fn start_thread(mut self, shutdown: CancellationToken) {
        info!("MQTT connection starting up");
        if let Some(eventloop) = self.eventloop.take() {
            tokio::spawn(run_eventloop(eventloop, shutdown.clone()));
        }

        loop {
            let telegram = tokio::select! {
                _ = shutdown.cancelled() => break,
                telegram = self.rx.recv() => match telegram {
                    Some(t) => t,
                    None => break,
                },
            };
            self.publish(&telegram);
        }

        let _ = self.client.try_disconnect();
        info!("MQTT publisher stopped");
    }

    fn publish(&self, telegram: &Telegram) {
        let data = MeteringData::from_telegram(telegram);
        let payload = match serde_json::to_string(&data) {
            Ok(p) => p,
            Err(e) => {
                error!("Unable to serialize telegram from {}: {}", telegram.identity, e);
                return;
            }
        };

        let topic = device_topic(&self.base_topic, &telegram.identity);
        /* try_publish so a dead broker can not stall the queue */
        match self.client.try_publish(topic.clone(), QoS::AtLeastOnce, false, payload) {
            Ok(_) => debug!("Published telegram to {topic}"),
            Err(e) => warn!("Error publishing to {topic}: {e}"),
        }
    }
}

async fn run_eventloop(mut eventloop: EventLoop, shutdown: CancellationToken) {
    info!("MQTT Eventloop started");
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT connected");
            }
            Ok(_) => {}
            Err(e) => {
                error!("Error in MQTT {:?}, reconnecting in {:?}", e, RECONNECT_PAUSE);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_PAUSE) => {}
                }
            }
        }
    }
    info!("MQTT Eventloop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering_han::MeasurementPoint;

    fn telegram() -> Telegram {
        Telegram {
            identity: "ELL5\\253833635_A".to_string(),
            measurements: vec![
                MeasurementPoint { obis_code: "1-0:1.8.0".to_string(), value: 6678.394, unit: "kWh".to_string() },
                MeasurementPoint { obis_code: "1-0:32.7.0".to_string(), value: 240.3, unit: "V".to_string() },
            ],
        }
    }

    fn config() -> MqttConfig {
        MqttConfig {
            host: "localhost".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
            client_name: "han2prom-test".to_string(),
            base_topic: "han2prom".to_string(),
        }
    }

    #[test]
    fn test_metering_data() {
        let data = MeteringData::from_telegram(&telegram());
        assert_eq!(data.meter_name, "ELL5\\253833635_A");
        assert_eq!(data.protocol, "han");
        assert_eq!(data.metered_values["1-0:1.8.0"], serde_json::json!(6678.394));
        assert_eq!(data.metered_values["1-0:32.7.0_unit"], serde_json::json!("V"));
        assert_eq!(data.metered_values.len(), 4);
    }

    #[test]
    fn test_device_topic() {
        assert_eq!(device_topic("han2prom", "LGF5E360"), "han2prom/devs/han/LGF5E360");
        assert_eq!(device_topic("x", "a/b+c#d e"), "x/devs/han/a_b_c_d_e");
    }

    #[tokio::test]
    async fn test_sink_queues_without_blocking() {
        let (mut manager, sink) = MqttManager::new(&config());
        for _ in 0..QUEUE_SIZE + 5 {
            sink.accept(telegram());
        }

        let mut queued = 0;
        while manager.rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, QUEUE_SIZE);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let (manager, sink) = MqttManager::new(&config());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(manager.start_thread(shutdown.clone()));

        shutdown.cancel();
        assert!(tokio::time::timeout(Duration::from_secs(2), handle).await.is_ok());
        /* queue is closed now */
        sink.accept(telegram());
    }
}
