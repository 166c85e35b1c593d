use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use std::time::Duration;

/// One value line of a telegram, e.g. `1-0:1.8.0(00006678.394*kWh)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MeasurementPoint {
    pub obis_code: String,
    pub value: f64,
    pub unit: String,
}

/// A complete and checksum verified telegram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Telegram {
    /// Content of the `/` line without the marker
    pub identity: String,
    /// Measurements in the order they appeared on the wire
    pub measurements: Vec<MeasurementPoint>,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("CRC mismatch, calculated {computed_crc} but telegram carries {transmitted_crc:?}")]
pub struct ChecksumError {
    pub raw_message_text: String,
    pub computed_crc: String,
    pub transmitted_crc: String,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Closed,
    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),
    #[error("connect timed out after {0:?}")]
    DialTimeout(Duration),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of reading one frame from a bridge connection
#[derive(Debug)]
pub enum DecodeResult {
    Telegram(Telegram),
    /// The frame was complete but damaged, the stream is still usable
    ChecksumError(ChecksumError),
    /// The stream is broken and has to be reopened
    TransportError(TransportError),
}
