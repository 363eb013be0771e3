//! CUPS submission and polling (Linux / macOS)
//!
//! Submission shells out to `lp`; the spooler job id is recovered from
//! the `request id is <printer>-<n>` line. Raw streams are written to
//! a spool file and submitted with `-o raw` so the driver does not
//! reinterpret them.

use async_trait::async_trait;
use tokio::process::Command;

use shared::PrinterDescriptor;

use crate::render::{RenderedOutput, ScratchDir};

use super::driver::{SpoolError, SpoolerDriver, SpoolerHandle, SubmitOptions};
use super::monitor::{OsJobStatus, SpoolerPoll};

pub struct LpDriver {
    scratch: ScratchDir,
}

impl LpDriver {
    pub fn new(scratch: ScratchDir) -> Self {
        Self { scratch }
    }

    async fn run_lp(&self, args: &[String]) -> Result<SpoolerHandle, SpoolError> {
        let output = Command::new("lp")
            .args(args)
            .output()
            .await
            .map_err(|e| SpoolError::Platform(format!("lp: {e}")))?;

        if !output.status.success() {
            return Err(SpoolError::Rejected(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let os_job_id = parse_request_id(&stdout);
        if os_job_id.is_none() {
            tracing::warn!("lp accepted the job but no request id was found: {stdout}");
        }
        Ok(SpoolerHandle { os_job_id })
    }
}

#[async_trait]
impl SpoolerDriver for LpDriver {
    async fn submit(
        &self,
        output: &RenderedOutput,
        printer: &PrinterDescriptor,
        options: &SubmitOptions,
    ) -> Result<SpoolerHandle, SpoolError> {
        let mut args: Vec<String> = vec!["-d".into(), printer.system_name.clone()];

        let path = match output {
            RenderedOutput::Stream(bytes) => {
                // Device streams bypass the driver's filters.
                args.push("-o".into());
                args.push("raw".into());
                let spool_path = self.scratch.file_for(&options.job_id, "bin");
                tokio::fs::write(&spool_path, bytes).await?;
                self.scratch.schedule_cleanup(spool_path.clone());
                spool_path
            }
            RenderedOutput::File(path) => {
                if options.landscape {
                    args.push("-o".into());
                    args.push("landscape".into());
                }
                if let (Some(w), Some(h)) = (options.page_width_mm, options.page_height_mm) {
                    args.push("-o".into());
                    args.push(format!("media=Custom.{w:.0}x{h:.0}mm"));
                }
                path.clone()
            }
        };

        args.push(path.to_string_lossy().into_owned());
        tracing::info!(
            printer = %printer.system_name,
            job_id = %options.job_id,
            "Submitting via lp"
        );
        self.run_lp(&args).await
    }
}

/// Parse `request id is TM-T88V-123 (1 file(s))` → 123.
fn parse_request_id(stdout: &str) -> Option<u32> {
    let rest = stdout.split("request id is ").nth(1)?;
    let request = rest.split_whitespace().next()?;
    let (_, id) = request.rsplit_once('-')?;
    id.parse().ok()
}

/// CUPS-level job status.
///
/// `lpstat` only distinguishes "still in the queue" from "completed";
/// transient device conditions surface through the printer state, not
/// the job listing, so an in-queue job is reported as printing.
pub struct CupsPoll;

#[async_trait]
impl SpoolerPoll for CupsPoll {
    async fn job_status(
        &self,
        printer: &str,
        os_job_id: u32,
    ) -> Result<OsJobStatus, SpoolError> {
        let active = lpstat_jobs(&["-W", "not-completed", "-o", printer]).await?;
        if job_listed(&active, printer, os_job_id) {
            return Ok(OsJobStatus::Printing);
        }

        let completed = lpstat_jobs(&["-W", "completed", "-o", printer]).await?;
        if job_listed(&completed, printer, os_job_id) {
            return Ok(OsJobStatus::Printed);
        }

        Ok(OsJobStatus::Missing)
    }
}

async fn lpstat_jobs(args: &[&str]) -> Result<String, SpoolError> {
    let output = Command::new("lpstat")
        .args(args)
        .output()
        .await
        .map_err(|e| SpoolError::Platform(format!("lpstat: {e}")))?;

    if !output.status.success() {
        return Err(SpoolError::Platform(format!(
            "lpstat failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `lpstat -o` lines begin with `<printer>-<id>`.
fn job_listed(output: &str, printer: &str, os_job_id: u32) -> bool {
    let needle = format!("{printer}-{os_job_id}");
    output.lines().any(|line| {
        line.split_whitespace()
            .next()
            .map(|first| first == needle)
            .unwrap_or(false)
    })
}
