//! HAN port telegrams read from serial to TCP bridges (Tasmota, ser2net, ...)

use crate::sink::TelemetrySink;
use futures_util::future::join_all;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod backoff;
pub mod crc;
pub mod decoder;
pub mod state;
pub mod status;
pub mod structs;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_telegrams;

pub use decoder::Decoder;
pub use status::{EndpointHealth, StatusBoard};
pub use structs::{ChecksumError, DecodeResult, MeasurementPoint, Telegram, TransportError};
pub use supervisor::{BridgeSupervisor, ConnectionSettings};

/// Starts one supervisor per bridge and collects them again on shutdown
pub struct HanManager {
    settings: ConnectionSettings,
    sink: Arc<dyn TelemetrySink>,
    status: Arc<StatusBoard>,
    shutdown: CancellationToken,
    threads: Vec<JoinHandle<()>>,
}

impl HanManager {
    pub fn new(
        settings: ConnectionSettings,
        sink: Arc<dyn TelemetrySink>,
        status: Arc<StatusBoard>,
        shutdown: CancellationToken,
    ) -> Self {
        return HanManager {
            settings,
            sink,
            status,
            shutdown,
            threads: Vec::new(),
        };
    }

    pub fn start_clients(&mut self, endpoints: &[String]) {
        for address in endpoints {
            info!("Starting serial bridge client: {address}");
            let supervisor = BridgeSupervisor::new(
                address.clone(),
                self.settings.clone(),
                self.sink.clone(),
                self.status.clone(),
                self.shutdown.clone(),
            );
            self.threads.push(tokio::spawn(supervisor.run()));
        }
    }

    pub fn client_count(&self) -> usize {
        self.threads.len()
    }

    /// Waits for all supervisors after the shutdown token fired.
    /// Returns false if the grace period ran out first.
    pub async fn stop_clients(self, grace: Duration) -> bool {
        info!("Stopping serial bridge clients...");
        match tokio::time::timeout(grace, join_all(self.threads)).await {
            Ok(_) => {
                info!("Serial bridge clients stopped");
                true
            }
            Err(_) => {
                warn!("Serial bridge clients did not stop within {grace:?}");
                false
            }
        }
    }
}
