//! # shared
//!
//! Domain models and wire protocol types for the RepairMind print agent.
//!
//! This crate is pure data: printer descriptors, print jobs and the
//! JSON message protocol spoken with the backend. It performs no I/O,
//! so every other crate in the workspace can depend on it without
//! pulling in the runtime.

pub mod models;
pub mod protocol;
pub mod util;

pub use models::job::{
    DocumentType, JobContent, JobOptions, JobPriority, LineItem, PartyBlock, PrintJob,
};
pub use models::printer::{
    PrinterCapabilities, PrinterDescriptor, PrinterMetadata, PrinterType, Transport,
};
pub use protocol::{ClientMessage, ServerMessage};
