use super::backoff::Backoff;
use log::warn;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SupervisorState {
    Connecting,
    Connected,
    /// Waiting the scheduled interval (jitter not yet applied)
    Backoff(Duration),
    Cancelled,
}

impl SupervisorState {
    pub fn name(&self) -> &'static str {
        match self {
            SupervisorState::Connecting => "connecting",
            SupervisorState::Connected => "connected",
            SupervisorState::Backoff(_) => "backoff",
            SupervisorState::Cancelled => "cancelled",
        }
    }
}

/// Everything that can happen to a bridge connection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SupervisorEvent {
    Connected,
    DialFailed,
    TelegramReceived,
    ChecksumFailed,
    TransportFailed,
    BackoffElapsed,
    Cancel,
}

/// Reconnect logic of one endpoint, free of any I/O
pub struct ConnectionStateMachine {
    state: SupervisorState,
    backoff: Backoff,
}

impl ConnectionStateMachine {
    pub fn new(backoff: Backoff) -> Self {
        return ConnectionStateMachine {
            state: SupervisorState::Connecting,
            backoff,
        };
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn handle(&mut self, event: SupervisorEvent) -> SupervisorState {
        use SupervisorEvent as E;
        use SupervisorState as S;

        let next = match (self.state, event) {
            (S::Cancelled, _) => S::Cancelled,
            (_, E::Cancel) => S::Cancelled,

            (S::Connecting, E::Connected) => {
                /* only a working connection resets the interval, a good read does not */
                self.backoff.reset();
                S::Connected
            }
            (S::Connecting, E::DialFailed) => S::Backoff(self.backoff.next_interval()),

            (S::Connected, E::TelegramReceived) | (S::Connected, E::ChecksumFailed) => S::Connected,
            (S::Connected, E::TransportFailed) => S::Backoff(self.backoff.next_interval()),

            (S::Backoff(_), E::BackoffElapsed) => S::Connecting,

            (state, event) => {
                warn!("Ignoring {event:?} while {}", state.name());
                state
            }
        };

        self.state = next;
        next
    }
}
