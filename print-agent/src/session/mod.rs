//! Backend socket session
//!
//! One logical connection to the backend for the life of the process:
//! connect, authenticate, deliver inbound jobs, carry outbound status,
//! reconnect forever with progressive backoff. The worker owns the
//! socket; everything else talks to it through a [`SessionHandle`].

mod socket;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use shared::PrintJob;

pub use socket::{spawn_session, SessionHandle};

/// Connection lifecycle. Strictly monotonic within one attempt; any
/// state can fall back to Disconnected on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ws_url: String,
    pub tenant_id: String,
    pub client_id: String,
    pub token: String,
    pub api_key: String,
    pub heartbeat_interval: Duration,
    pub request_timeout: Duration,
    pub auth_timeout: Duration,
    /// Backoff ladder; the last entry repeats.
    pub reconnect_delays: Vec<Duration>,
    pub max_reconnect_delay: Duration,
}

impl SessionConfig {
    pub fn new(
        ws_url: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        token: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            token: token.into(),
            api_key: api_key.into(),
            heartbeat_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(10),
            reconnect_delays: [5, 5, 10, 10, 30, 30, 60]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
            max_reconnect_delay: Duration::from_secs(300),
        }
    }

    /// Delay before reconnect attempt `attempt` (0-based), capped.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let idx = (attempt as usize).min(self.reconnect_delays.len().saturating_sub(1));
        self.reconnect_delays
            .get(idx)
            .copied()
            .unwrap_or(self.max_reconnect_delay)
            .min(self.max_reconnect_delay)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not connected")]
    NotConnected,

    #[error("request timed out: {0}")]
    Timeout(&'static str),

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Typed notifications from the session worker, consumed by the
/// orchestrator.
#[derive(Debug)]
pub enum SessionSignal {
    /// First successful connect of this process.
    Connected,
    /// A later successful connect; registrations were replayed.
    Reconnected { attempt: u32 },
    Disconnected { reason: String },
    Reconnecting { attempt: u32, delay: Duration },
    ReconnectFailed { attempt: u32, error: String },
    AuthFailed { message: String },
    NewJob(PrintJob),
}
