use super::backoff::{with_jitter, Backoff, RECONNECT_BACKOFF_BASE, RECONNECT_BACKOFF_MAX};
use super::decoder::Decoder;
use super::state::{ConnectionStateMachine, SupervisorEvent, SupervisorState};
use super::status::StatusBoard;
use super::structs::{DecodeResult, TransportError};
use crate::sink::TelemetrySink;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);
pub const READ_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub dial_timeout: Duration,
    /// Rearmed before every telegram, a silent bridge is treated as dead
    pub read_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            dial_timeout: DIAL_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            backoff_base: RECONNECT_BACKOFF_BASE,
            backoff_max: RECONNECT_BACKOFF_MAX,
        }
    }
}

/// Keeps one serial bridge connected for the lifetime of the process.
///
/// Every wait (connect, read, backoff) also listens on the shutdown token, so a
/// cancelled supervisor returns right away instead of finishing the wait.
pub struct BridgeSupervisor {
    address: String,
    settings: ConnectionSettings,
    machine: ConnectionStateMachine,
    decoder: Option<Decoder<TcpStream>>,
    sink: Arc<dyn TelemetrySink>,
    status: Arc<StatusBoard>,
    shutdown: CancellationToken,
}

impl BridgeSupervisor {
    pub fn new(
        address: String,
        settings: ConnectionSettings,
        sink: Arc<dyn TelemetrySink>,
        status: Arc<StatusBoard>,
        shutdown: CancellationToken,
    ) -> Self {
        let backoff = Backoff::new(settings.backoff_base, settings.backoff_max);
        status.register(&address);
        return BridgeSupervisor {
            address,
            settings,
            machine: ConnectionStateMachine::new(backoff),
            decoder: None,
            sink,
            status,
            shutdown,
        };
    }

    pub async fn run(mut self) {
        info!("[{}] Starting serial bridge client", self.address);

        loop {
            let event = match self.machine.state() {
                SupervisorState::Connecting => self.connect().await,
                SupervisorState::Connected => self.read_next().await,
                SupervisorState::Backoff(interval) => self.wait(interval).await,
                SupervisorState::Cancelled => break,
            };

            let previous = self.machine.state();
            let next = self.machine.handle(event);
            if previous == SupervisorState::Connected && next != SupervisorState::Connected {
                self.close().await;
            }
            if previous != next {
                debug!("[{}] {} -> {}", self.address, previous.name(), next.name());
                self.status.set_state(&self.address, next);
            }
        }

        self.close().await;
        info!("[{}] Stopped serial bridge client", self.address);
    }

    async fn connect(&mut self) -> SupervisorEvent {
        if self.shutdown.is_cancelled() {
            return SupervisorEvent::Cancel;
        }

        info!("[{}] Connecting..", self.address);
        self.status.connection_attempt(&self.address);

        let dial_timeout = self.settings.dial_timeout;
        let result = tokio::select! {
            _ = self.shutdown.cancelled() => return SupervisorEvent::Cancel,
            result = timeout(dial_timeout, TcpStream::connect(self.address.as_str())) => result,
        };

        let error = match result {
            Ok(Ok(stream)) => {
                info!("[{}] Connected", self.address);
                self.decoder = Some(Decoder::new(stream));
                return SupervisorEvent::Connected;
            }
            Ok(Err(e)) => TransportError::Io(e),
            Err(_) => TransportError::DialTimeout(dial_timeout),
        };

        warn!("[{}] Could not connect, error: {}", self.address, error);
        SupervisorEvent::DialFailed
    }

    async fn read_next(&mut self) -> SupervisorEvent {
        let Some(decoder) = self.decoder.as_mut() else {
            return SupervisorEvent::TransportFailed;
        };

        let read_timeout = self.settings.read_timeout;
        let result = tokio::select! {
            _ = self.shutdown.cancelled() => return SupervisorEvent::Cancel,
            result = timeout(read_timeout, decoder.read_telegram()) => result,
        };
        let result = result.unwrap_or(DecodeResult::TransportError(TransportError::IdleTimeout(read_timeout)));

        match result {
            DecodeResult::Telegram(telegram) => {
                debug!("[{}] Telegram from {} with {} values", self.address, telegram.identity, telegram.measurements.len());
                self.status.telegram_received(&self.address);
                self.sink.accept(telegram);
                SupervisorEvent::TelegramReceived
            }
            DecodeResult::ChecksumError(e) => {
                warn!("[{}] CRC ERROR\nCalculated CRC: {}\nTransmitted CRC: {}\nMessage:\n{}",
                      self.address, e.computed_crc, e.transmitted_crc, e.raw_message_text);
                self.status.checksum_error(&self.address);
                SupervisorEvent::ChecksumFailed
            }
            DecodeResult::TransportError(e) => {
                if self.shutdown.is_cancelled() {
                    return SupervisorEvent::Cancel;
                }
                warn!("[{}] Error while reading, error: {}", self.address, e);
                SupervisorEvent::TransportFailed
            }
        }
    }

    async fn wait(&self, interval: Duration) -> SupervisorEvent {
        let delay = with_jitter(interval);
        info!("[{}] Reconnecting in {:?}", self.address, delay);

        tokio::select! {
            _ = self.shutdown.cancelled() => SupervisorEvent::Cancel,
            _ = sleep(delay) => SupervisorEvent::BackoffElapsed,
        }
    }

    /// Safe to call any number of times
    async fn close(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            debug!("[{}] Closing connection", self.address);
            let mut stream = decoder.into_inner();
            if let Err(e) = stream.shutdown().await {
                debug!("[{}] Shutdown of connection failed: {}", self.address, e);
            }
        }
    }
}
