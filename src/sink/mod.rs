use crate::metering_han::Telegram;
use log::debug;
use std::sync::Arc;
use tokio::sync::broadcast;

pub mod store;

pub use store::{StoredTelegram, TelegramStore};

/// Receiver of decoded telegrams.
///
/// Called from every bridge supervisor concurrently. Implementations deal with
/// their own failures, nothing may flow back into the supervisor.
pub trait TelemetrySink: Send + Sync {
    fn accept(&self, telegram: Telegram);
}

/// Hands every telegram to a list of sinks
pub struct SinkFanout {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl SinkFanout {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        return SinkFanout { sinks };
    }
}

impl TelemetrySink for SinkFanout {
    fn accept(&self, telegram: Telegram) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.accept(telegram.clone());
            }
            last.accept(telegram);
        }
    }
}

/// Live feed of telegrams for websocket clients
#[derive(Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<Telegram>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        return BroadcastSink { sender };
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Telegram> {
        self.sender.subscribe()
    }
}

impl TelemetrySink for BroadcastSink {
    fn accept(&self, telegram: Telegram) {
        /* nobody listening is fine */
        if self.sender.send(telegram).is_err() {
            debug!("No live feed subscribers");
        }
    }
}
