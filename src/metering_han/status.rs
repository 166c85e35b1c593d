use super::state::SupervisorState;
use crate::get_unix_ts;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EndpointHealth {
    pub address: String,
    pub state: String,
    pub connection_attempts: u64,
    pub telegrams: u64,
    pub checksum_errors: u64,
    pub last_connected: Option<u64>,
    pub last_telegram: Option<u64>,
}

impl EndpointHealth {
    fn new(address: &str) -> Self {
        EndpointHealth {
            address: address.to_string(),
            state: SupervisorState::Connecting.name().to_string(),
            connection_attempts: 0,
            telegrams: 0,
            checksum_errors: 0,
            last_connected: None,
            last_telegram: None,
        }
    }
}

/// Shared view on all bridge connections, written by the supervisors and read by the API
pub struct StatusBoard {
    endpoints: RwLock<HashMap<String, EndpointHealth>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        StatusBoard { endpoints: RwLock::new(HashMap::new()) }
    }

    fn update<F: FnOnce(&mut EndpointHealth)>(&self, address: &str, f: F) {
        let mut endpoints = self.endpoints.write().unwrap_or_else(PoisonError::into_inner);
        let entry = endpoints
            .entry(address.to_string())
            .or_insert_with(|| EndpointHealth::new(address));
        f(entry);
    }

    pub fn register(&self, address: &str) {
        self.update(address, |_| {});
    }

    pub fn set_state(&self, address: &str, state: SupervisorState) {
        self.update(address, |e| {
            e.state = state.name().to_string();
            if state == SupervisorState::Connected {
                e.last_connected = Some(get_unix_ts());
            }
        });
    }

    pub fn connection_attempt(&self, address: &str) {
        self.update(address, |e| e.connection_attempts += 1);
    }

    pub fn telegram_received(&self, address: &str) {
        self.update(address, |e| {
            e.telegrams += 1;
            e.last_telegram = Some(get_unix_ts());
        });
    }

    pub fn checksum_error(&self, address: &str) {
        self.update(address, |e| e.checksum_errors += 1);
    }

    pub fn get(&self, address: &str) -> Option<EndpointHealth> {
        let endpoints = self.endpoints.read().unwrap_or_else(PoisonError::into_inner);
        endpoints.get(address).cloned()
    }

    /// All endpoints sorted by address
    pub fn snapshot(&self) -> Vec<EndpointHealth> {
        let endpoints = self.endpoints.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<EndpointHealth> = endpoints.values().cloned().collect();
        list.sort_by(|a, b| a.address.cmp(&b.address));
        list
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
