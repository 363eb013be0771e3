//! Agent configuration
//!
//! Configuration is layered: the persisted key/value store provides
//! what the operator set up through the backend pairing flow, and
//! process environment variables override everything.
//!
//! | Environment variable | Overrides |
//! |----------------------|-----------|
//! | WEBSOCKET_URL        | backend socket URL |
//! | BACKEND_URL          | backend HTTP URL |
//! | TENANT_ID            | tenant id |
//! | CLIENT_ID            | client id |
//! | API_KEY              | API key |
//! | TOKEN                | JWT token |
//! | HEARTBEAT_INTERVAL   | heartbeat seconds |
//! | AUTO_REGISTER        | register printers on connect |
//! | RMP_DATA_DIR         | data directory |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config_store::ConfigStore;

/// Named environment profile pinning the backend URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn websocket_url(self) -> &'static str {
        match self {
            Self::Development => "wss://staging.repairmind.io/print",
            Self::Production => "wss://api.repairmind.io/print",
        }
    }

    pub fn backend_url(self) -> &'static str {
        match self {
            Self::Development => "https://staging.repairmind.io",
            Self::Production => "https://api.repairmind.io",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub environment: Environment,
    pub websocket_url: String,
    pub backend_url: String,
    pub tenant_id: String,
    pub client_id: String,
    pub api_key: String,
    pub token: String,
    pub heartbeat_interval_secs: u64,
    pub auto_register: bool,
    pub data_dir: PathBuf,
}

impl AgentConfig {
    /// Build the effective configuration from the persisted store and
    /// the process environment (env wins).
    pub fn load(store: &ConfigStore) -> Self {
        let environment = Environment::parse(
            &pick("ENVIRONMENT", store, "environment").unwrap_or_default(),
        );

        Self {
            environment,
            websocket_url: pick("WEBSOCKET_URL", store, "websocket_url")
                .unwrap_or_else(|| environment.websocket_url().to_string()),
            backend_url: pick("BACKEND_URL", store, "backend_url")
                .unwrap_or_else(|| environment.backend_url().to_string()),
            tenant_id: pick("TENANT_ID", store, "tenant_id").unwrap_or_default(),
            client_id: pick("CLIENT_ID", store, "client_id").unwrap_or_default(),
            api_key: pick("API_KEY", store, "api_key").unwrap_or_default(),
            token: pick("TOKEN", store, "token").unwrap_or_default(),
            heartbeat_interval_secs: pick("HEARTBEAT_INTERVAL", store, "heartbeat_interval")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            auto_register: pick("AUTO_REGISTER", store, "auto_register")
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            data_dir: store.dir().to_path_buf(),
        }
    }

    pub fn queue_file(&self) -> PathBuf {
        self.data_dir.join("job-queue.json")
    }

    pub fn has_credentials(&self) -> bool {
        !self.tenant_id.is_empty() && !self.client_id.is_empty()
    }
}

fn pick(env_key: &str, store: &ConfigStore, store_key: &str) -> Option<String> {
    if let Ok(value) = std::env::var(env_key) {
        if !value.is_empty() {
            return Some(value);
        }
    }
    store.get_string(store_key)
}
