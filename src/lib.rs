//! Reads electricity meter telegrams from HAN port serial bridges and
//! exposes the latest values to Prometheus and MQTT.

pub mod api;
pub mod config;
pub mod metering_han;
pub mod mqtt;
pub mod obis_utils;
pub mod sink;

// Re-export common types for easier access
pub use api::{ApiManager, ApiState};
pub use config::{Config, ConfigError};
pub use metering_han::{HanManager, MeasurementPoint, StatusBoard, Telegram};
pub use mqtt::{MeteringData, MqttManager};
pub use sink::{BroadcastSink, SinkFanout, TelegramStore, TelemetrySink};

pub fn get_unix_ts() -> u64 {
    return std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
}
