//! Document rendering
//!
//! Converts a semantic job plus a printer descriptor into something
//! the spooler can take: an in-process ESC/POS command stream for
//! thermal printers, or a file path (PDF, HTML label, raw spool file)
//! for everything else. No retries happen here; a failed render is a
//! failed attempt and the queue decides what happens next.

mod document;
mod download;
mod label;
mod receipt;
mod scratch;

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

use shared::{DocumentType, PrintJob, PrinterDescriptor};

pub use scratch::ScratchDir;

/// What the renderer hands to the spooler driver.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedOutput {
    /// Device-ready command stream (ESC/POS, ZPL, raw bytes).
    Stream(Vec<u8>),
    /// Path to a rendered file in the scratch directory.
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("missing content field: {0}")]
    MissingContent(&'static str),

    #[error("download failed: {0}")]
    Download(String),

    #[error("base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stateless apart from the HTTP client and scratch dir; one instance
/// serves all jobs.
pub struct DocumentRenderer {
    http: reqwest::Client,
    scratch: ScratchDir,
}

impl DocumentRenderer {
    pub fn new(scratch: ScratchDir) -> Result<Self, RenderError> {
        let http = reqwest::Client::builder()
            .timeout(download::DOWNLOAD_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(
                download::MAX_REDIRECTS,
            ))
            .build()
            .map_err(|e| RenderError::Download(e.to_string()))?;
        Ok(Self { http, scratch })
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Render a job for a specific printer. First matching route wins.
    pub async fn render(
        &self,
        job: &PrintJob,
        printer: &PrinterDescriptor,
    ) -> Result<RenderedOutput, RenderError> {
        match job.document_type {
            DocumentType::Receipt | DocumentType::Ticket => Ok(RenderedOutput::Stream(
                receipt::render_receipt(job, printer),
            )),

            DocumentType::Invoice
            | DocumentType::Quote
            | DocumentType::DeliveryNote
            | DocumentType::Report => self.render_document(job).await,

            DocumentType::PdfRaw => self.prerendered_pdf(job).await,

            DocumentType::Label | DocumentType::Barcode | DocumentType::Qrcode => {
                self.render_label(job).await
            }

            DocumentType::Raw => raw_stream(job),
        }
    }

    /// Invoice-class documents: pass through a provided PDF, otherwise
    /// generate one from the structured fields.
    async fn render_document(&self, job: &PrintJob) -> Result<RenderedOutput, RenderError> {
        if job.content.pdf_url.is_some() || job.content.pdf_base64.is_some() {
            return self.prerendered_pdf(job).await;
        }

        let bytes = document::generate_document_pdf(job)?;
        let path = self.scratch.file_for(&job.id, "pdf");
        tokio::fs::write(&path, &bytes).await?;
        self.scratch.schedule_cleanup(path.clone());
        Ok(RenderedOutput::File(path))
    }

    /// Materialize `pdfUrl` / `pdfBase64` into a scratch file.
    async fn prerendered_pdf(&self, job: &PrintJob) -> Result<RenderedOutput, RenderError> {
        let path = self.scratch.file_for(&job.id, "pdf");

        if let Some(url) = &job.content.pdf_url {
            download::download_pdf(&self.http, url, &path).await?;
        } else if let Some(b64) = &job.content.pdf_base64 {
            let bytes = BASE64.decode(strip_data_url(b64))?;
            tokio::fs::write(&path, &bytes).await?;
        } else {
            return Err(RenderError::MissingContent("pdfUrl or pdfBase64"));
        }

        self.scratch.schedule_cleanup(path.clone());
        Ok(RenderedOutput::File(path))
    }

    /// Labels: ZPL → stream, rawData → stream, PDF → file, otherwise
    /// an HTML label at exact physical dimensions.
    async fn render_label(&self, job: &PrintJob) -> Result<RenderedOutput, RenderError> {
        if let Some(zpl) = &job.content.zpl {
            return Ok(RenderedOutput::Stream(zpl.clone().into_bytes()));
        }
        if let Some(raw) = &job.content.raw_data {
            return Ok(RenderedOutput::Stream(decode_payload(raw)));
        }
        if job.content.pdf_url.is_some() || job.content.pdf_base64.is_some() {
            return self.prerendered_pdf(job).await;
        }

        let html = label::build_label_html(job);
        let path = self.scratch.file_for(&job.id, "html");
        tokio::fs::write(&path, html.as_bytes()).await?;
        self.scratch.schedule_cleanup(path.clone());
        Ok(RenderedOutput::File(path))
    }
}

/// Raw device stream from `rawData` or `data`.
fn raw_stream(job: &PrintJob) -> Result<RenderedOutput, RenderError> {
    let payload = job
        .content
        .raw_data
        .as_ref()
        .or(job.content.data.as_ref())
        .ok_or(RenderError::MissingContent("rawData or data"))?;
    Ok(RenderedOutput::Stream(decode_payload(payload)))
}

/// Raw payloads arrive either as plain text or base64. Strict decode
/// first; anything that is not valid base64 is taken literally.
fn decode_payload(payload: &str) -> Vec<u8> {
    let trimmed = payload.trim();
    if !trimmed.is_empty() && trimmed.len() % 4 == 0 {
        if let Ok(bytes) = BASE64.decode(trimmed) {
            return bytes;
        }
    }
    payload.as_bytes().to_vec()
}

/// Accept `data:application/pdf;base64,...` as well as bare base64.
fn strip_data_url(b64: &str) -> &str {
    match b64.split_once("base64,") {
        Some((_, rest)) => rest,
        None => b64,
    }
}
