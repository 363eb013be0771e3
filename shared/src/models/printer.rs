//! Local printer descriptors
//!
//! A descriptor is an immutable snapshot of one OS-level printer. The
//! enumerator produces a fresh list on every refresh; descriptors are
//! never mutated in place.

use serde::{Deserialize, Serialize};

/// Printer family, derived from keyword classification over
/// name + display name + driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterType {
    Thermal,
    Label,
    Laser,
    Inkjet,
    #[serde(rename = "dotmatrix")]
    DotMatrix,
    Generic,
}

impl PrinterType {
    /// Thermal, label and dot-matrix devices are monochrome single-pass.
    pub fn is_impact_class(self) -> bool {
        matches!(self, Self::Thermal | Self::Label | Self::DotMatrix)
    }
}

/// How the printer is attached to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Usb,
    Network,
    Bluetooth,
    Serial,
    Parallel,
    Unknown,
}

/// Capabilities derived purely from type + keywords. No device query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterCapabilities {
    pub color: bool,
    pub duplex: bool,
    pub paper_sizes: Vec<String>,
    pub max_width_mm: u32,
    pub has_cutter: bool,
    pub has_cash_drawer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterMetadata {
    pub is_default: bool,
    pub status: String,
    pub port_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Stable snapshot of a local printer.
///
/// `system_name` is the identity key (the OS-level queue name); the
/// backend registers printers under it and jobs target it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterDescriptor {
    pub system_name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub printer_type: PrinterType,
    pub transport: Transport,
    pub capabilities: PrinterCapabilities,
    pub metadata: PrinterMetadata,
}
