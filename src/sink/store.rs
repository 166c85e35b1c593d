use super::TelemetrySink;
use crate::metering_han::Telegram;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct StoredTelegram {
    pub received: Instant,
    pub received_at: DateTime<Utc>,
    pub telegram: Telegram,
}

/// Latest telegram per meter identity.
///
/// Old entries are never removed, they are only hidden once they are older
/// than the freshness window.
pub struct TelegramStore {
    freshness: Duration,
    telegrams: RwLock<HashMap<String, StoredTelegram>>,
}

impl TelegramStore {
    pub fn new(freshness: Duration) -> Self {
        return TelegramStore {
            freshness,
            telegrams: RwLock::new(HashMap::new()),
        };
    }

    /// Telegrams received within the freshness window, sorted by identity
    pub fn fresh(&self) -> Vec<StoredTelegram> {
        let telegrams = self.telegrams.read().unwrap_or_else(PoisonError::into_inner);
        let mut fresh: Vec<StoredTelegram> = telegrams
            .values()
            .filter(|t| t.received.elapsed() <= self.freshness)
            .cloned()
            .collect();
        fresh.sort_by(|a, b| a.telegram.identity.cmp(&b.telegram.identity));
        fresh
    }

    /// Number of meters ever seen, stale ones included
    pub fn len(&self) -> usize {
        self.telegrams.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TelegramStore {
    fn default() -> Self {
        Self::new(DEFAULT_FRESHNESS)
    }
}

impl TelemetrySink for TelegramStore {
    fn accept(&self, telegram: Telegram) {
        debug!("Storing telegram from {} with {} values", telegram.identity, telegram.measurements.len());
        let stored = StoredTelegram {
            received: Instant::now(),
            received_at: Utc::now(),
            telegram,
        };
        let mut telegrams = self.telegrams.write().unwrap_or_else(PoisonError::into_inner);
        telegrams.insert(stored.telegram.identity.clone(), stored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering_han::MeasurementPoint;
    use std::sync::Arc;

    fn telegram(identity: &str, value: f64) -> Telegram {
        Telegram {
            identity: identity.to_string(),
            measurements: vec![MeasurementPoint {
                obis_code: "1-0:1.7.0".to_string(),
                value,
                unit: "kW".to_string(),
            }],
        }
    }

    #[test]
    fn test_keeps_latest_per_identity() {
        let store = TelegramStore::default();
        store.accept(telegram("meter-b", 1.0));
        store.accept(telegram("meter-a", 2.0));
        store.accept(telegram("meter-b", 3.0));

        let fresh = store.fresh();
        assert_eq!(store.len(), 2);
        assert_eq!(fresh[0].telegram.identity, "meter-a");
        assert_eq!(fresh[1].telegram.measurements[0].value, 3.0);
    }

    #[test]
    fn test_stale_entries_are_hidden() {
        let store = TelegramStore::new(Duration::from_millis(20));
        store.accept(telegram("meter", 1.0));
        assert_eq!(store.fresh().len(), 1);

        std::thread::sleep(Duration::from_millis(50));
        assert!(store.fresh().is_empty());
        assert_eq!(store.len(), 1);

        store.accept(telegram("meter", 2.0));
        assert_eq!(store.fresh().len(), 1);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(TelegramStore::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for n in 0..100 {
                        store.accept(telegram(&format!("meter-{i}"), n as f64));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let fresh = store.fresh();
        assert_eq!(fresh.len(), 8);
        assert!(fresh.iter().all(|t| t.telegram.measurements[0].value == 99.0));
    }
}
