//! Backend wire protocol (namespace `/print`)
//!
//! One JSON object per event, adjacently tagged:
//! `{"event": "...", "data": {...}}`.
//!
//! Request-style client messages carry a `requestId`; the matching ack
//! echoes it so concurrent in-flight requests never collide on a
//! shared channel. `job_status` is the exception: several jobs report
//! progress concurrently, so it is fire-and-forget with no ack.

use serde::{Deserialize, Serialize};

use crate::models::job::PrintJob;
use crate::models::printer::PrinterDescriptor;

/// Messages the agent sends to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Authenticate {
        tenant_id: String,
        client_id: String,
        token: String,
        api_key: String,
    },

    #[serde(rename_all = "camelCase")]
    RegisterPrinter {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        printer: PrinterDescriptor,
    },

    #[serde(rename_all = "camelCase")]
    PrinterStatus {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        printer_id: String,
        status: String,
        #[serde(default)]
        metadata: serde_json::Value,
    },

    #[serde(rename_all = "camelCase")]
    Heartbeat { printer_id: String },

    #[serde(rename_all = "camelCase")]
    GetPendingJobs {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        printer_system_name: Option<String>,
    },

    /// Fire-and-forget job progress report. No ack is awaited.
    #[serde(rename_all = "camelCase")]
    JobStatus {
        job_id: String,
        status: String,
        #[serde(default)]
        metadata: serde_json::Value,
    },
}

/// Messages the backend sends to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Authenticated {
        success: bool,
    },

    AuthError {
        message: String,
    },

    NewPrintJob(PrintJob),

    #[serde(rename_all = "camelCase")]
    PendingJobs {
        #[serde(default)]
        request_id: Option<String>,
        jobs: Vec<PrintJob>,
    },

    #[serde(rename_all = "camelCase")]
    PrinterRegistered {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        printer_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    StatusUpdated {
        #[serde(default)]
        request_id: Option<String>,
    },

    HeartbeatAck {},

    #[serde(rename_all = "camelCase")]
    JobStatusUpdated {
        #[serde(default)]
        job_id: Option<String>,
    },

    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Correlation id echoed from the originating request, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::PendingJobs { request_id, .. }
            | Self::PrinterRegistered { request_id, .. }
            | Self::StatusUpdated { request_id } => request_id.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::DocumentType;

    #[test]
    fn test_authenticate_roundtrip() {
        let msg = ClientMessage::Authenticate {
            tenant_id: "t1".into(),
            client_id: "c1".into(),
            token: "jwt".into(),
            api_key: "key".into(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""event":"authenticate"#));
        assert!(json.contains(r#""tenantId":"t1"#));

        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_new_print_job_payload_is_the_job() {
        let json = r#"{
            "event": "new_print_job",
            "data": {
                "id": "J1",
                "printerSystemName": "TM-T88V",
                "documentType": "receipt",
                "content": {"storeName": "S", "total": 9.99}
            }
        }"#;

        match serde_json::from_str::<ServerMessage>(json).unwrap() {
            ServerMessage::NewPrintJob(job) => {
                assert_eq!(job.id, "J1");
                assert_eq!(job.document_type, DocumentType::Receipt);
            }
            other => panic!("expected NewPrintJob, got {other:?}"),
        }
    }

    #[test]
    fn test_request_id_echo() {
        let json = r#"{"event":"pending_jobs","data":{"requestId":"r-7","jobs":[]}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.request_id(), Some("r-7"));

        let json = r#"{"event":"auth_error","data":{"message":"bad token"}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.request_id(), None);
    }

    #[test]
    fn test_job_status_shape() {
        let msg = ClientMessage::JobStatus {
            job_id: "J1".into(),
            status: "completed".into(),
            metadata: serde_json::json!({"durationMs": 1200}),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""event":"job_status"#));
        assert!(json.contains(r#""jobId":"J1"#));
    }
}
