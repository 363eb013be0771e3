//! Shared agent state
//!
//! One cheap-to-clone struct holding the shared handles every
//! subsystem and the shell need.

use std::sync::Arc;

use tokio::sync::RwLock;

use shared::PrinterDescriptor;

use crate::queue::JobQueue;
use crate::session::SessionHandle;

use super::config::AgentConfig;
use super::event::EventBus;
use super::metrics::AgentMetrics;

#[derive(Clone)]
pub struct AgentState {
    pub config: AgentConfig,
    pub queue: JobQueue,
    pub session: SessionHandle,
    /// Current printer snapshot; refresh replaces it atomically.
    pub printers: Arc<RwLock<Vec<PrinterDescriptor>>>,
    pub events: EventBus,
    pub metrics: AgentMetrics,
}

impl AgentState {
    /// Look up a descriptor by its OS-level name.
    pub async fn find_printer(&self, system_name: &str) -> Option<PrinterDescriptor> {
        self.printers
            .read()
            .await
            .iter()
            .find(|p| p.system_name == system_name)
            .cloned()
    }

    /// Re-enumerate and atomically replace the snapshot.
    /// Enumeration failure keeps the previous snapshot.
    pub async fn refresh_printers(&self) -> usize {
        match crate::printers::enumerate().await {
            Ok(list) => {
                let count = list.len();
                *self.printers.write().await = list;
                self.events
                    .emit(super::event::AgentEvent::PrintersRefreshed { count });
                count
            }
            Err(e) => {
                tracing::warn!("Printer refresh failed: {e}");
                self.printers.read().await.len()
            }
        }
    }
}
