//! Print job model
//!
//! Jobs arrive from the backend as JSON (`new_print_job` /
//! `pending_jobs`). `content` is shape-dependent: a receipt carries
//! store/items fields, a document carries a PDF source or structured
//! blocks, a label carries ZPL or layout fields, raw carries bytes.
//! All fields are optional on the wire; the renderer validates the
//! combination it actually needs.

use serde::{Deserialize, Serialize};

/// Semantic document type. Routing in the renderer follows this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Receipt,
    Ticket,
    Invoice,
    Quote,
    DeliveryNote,
    Report,
    Label,
    Barcode,
    Qrcode,
    Raw,
    PdfRaw,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Ticket => "ticket",
            Self::Invoice => "invoice",
            Self::Quote => "quote",
            Self::DeliveryNote => "delivery_note",
            Self::Report => "report",
            Self::Label => "label",
            Self::Barcode => "barcode",
            Self::Qrcode => "qrcode",
            Self::Raw => "raw",
            Self::PdfRaw => "pdf_raw",
        }
    }
}

/// Server-assigned priority. Urgent jobs overtake normal ones on the
/// same printer; ordering across printers is unaffected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Urgent,
    #[default]
    Normal,
    Low,
}

impl JobPriority {
    /// Sort key: lower runs first.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Urgent => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// One billed line on a receipt / document items table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default = "one")]
    pub quantity: f64,
    pub description: String,
    #[serde(default)]
    pub price: f64,
}

fn one() -> f64 {
    1.0
}

/// Company or client block on generated documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartyBlock {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Per-job options the server may attach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobOptions {
    pub paper_size: Option<String>,
    pub margins: Option<serde_json::Value>,
    pub label_width_mm: Option<f64>,
    pub label_height_mm: Option<f64>,
    /// Spooler document-type hint for raw streams (e.g. "RAW").
    pub doctype: Option<String>,
    pub priority: Option<JobPriority>,
}

/// Shape-dependent job payload. See module docs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobContent {
    // Receipt / ticket
    pub store_name: Option<String>,
    pub store_address: Option<String>,
    pub receipt_number: Option<String>,
    pub ticket_number: Option<String>,
    pub timestamp: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub items: Option<Vec<LineItem>>,
    pub total: Option<f64>,
    pub footer: Option<String>,

    // Generated documents
    pub document_number: Option<String>,
    pub company: Option<PartyBlock>,
    pub client: Option<PartyBlock>,

    // Pre-rendered PDF sources
    pub pdf_url: Option<String>,
    pub pdf_base64: Option<String>,

    // Labels
    pub zpl: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub barcode: Option<String>,

    // Raw device streams (plain string or base64)
    pub raw_data: Option<String>,
    pub data: Option<String>,
}

/// A print job as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    /// Opaque server-assigned id (`test-<epoch>` for local tests).
    pub id: String,
    pub printer_system_name: String,
    pub document_type: DocumentType,
    #[serde(default)]
    pub priority: JobPriority,
    #[serde(default)]
    pub options: JobOptions,
    #[serde(default)]
    pub content: JobContent,
}

impl PrintJob {
    /// Effective priority: `options.priority` wins over the top-level field.
    pub fn effective_priority(&self) -> JobPriority {
        self.options.priority.unwrap_or(self.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_job_from_wire() {
        let json = r#"{
            "id": "J1",
            "printerSystemName": "TM-T88V",
            "documentType": "receipt",
            "content": {
                "storeName": "S",
                "items": [{"quantity": 1, "description": "X", "price": 9.99}],
                "total": 9.99
            }
        }"#;

        let job: PrintJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.id, "J1");
        assert_eq!(job.document_type, DocumentType::Receipt);
        assert_eq!(job.priority, JobPriority::Normal);
        let items = job.content.items.as_ref().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "X");
    }

    #[test]
    fn test_document_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&DocumentType::DeliveryNote).unwrap(),
            r#""delivery_note""#
        );
        assert_eq!(
            serde_json::to_string(&DocumentType::PdfRaw).unwrap(),
            r#""pdf_raw""#
        );
    }

    #[test]
    fn test_options_priority_wins() {
        let mut job: PrintJob = serde_json::from_str(
            r#"{"id":"a","printerSystemName":"p","documentType":"raw"}"#,
        )
        .unwrap();
        assert_eq!(job.effective_priority(), JobPriority::Normal);
        job.options.priority = Some(JobPriority::Urgent);
        assert_eq!(job.effective_priority(), JobPriority::Urgent);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(JobPriority::Urgent.ordinal() < JobPriority::Normal.ordinal());
        assert!(JobPriority::Normal.ordinal() < JobPriority::Low.ordinal());
    }
}
