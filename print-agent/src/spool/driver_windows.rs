//! Windows spooler submission and polling
//!
//! Raw streams go direct-to-driver with datatype RAW
//! (StartDocPrinterW / WritePrinter); the spooler job id returned by
//! StartDocPrinterW is recorded so the monitor can poll it. Rendered
//! files (PDF, HTML labels) are handed to the shell `PrintTo` verb for
//! the named device under a 30-second safety timeout; that path yields
//! no job id and the monitor falls back to its assumed-success delay.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use shared::PrinterDescriptor;

use crate::render::RenderedOutput;

use super::driver::{SpoolError, SpoolerDriver, SpoolerHandle, SubmitOptions};
use super::monitor::{OsJobStatus, SpoolerPoll};

const PRINT_TO_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WindowsDriver;

impl WindowsDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpoolerDriver for WindowsDriver {
    async fn submit(
        &self,
        output: &RenderedOutput,
        printer: &PrinterDescriptor,
        options: &SubmitOptions,
    ) -> Result<SpoolerHandle, SpoolError> {
        match output {
            RenderedOutput::Stream(bytes) => {
                let printer_name = printer.system_name.clone();
                let doc_name = format!("RepairMind {}", options.job_id);
                let data = bytes.clone();
                let os_job_id = tokio::task::spawn_blocking(move || {
                    write_raw(&printer_name, &doc_name, &data)
                })
                .await
                .map_err(|e| SpoolError::Platform(format!("join error: {e}")))??;
                Ok(SpoolerHandle {
                    os_job_id: Some(os_job_id),
                })
            }
            RenderedOutput::File(path) => {
                // Shell PrintTo: the registered PDF/HTML handler prints
                // silently to the named device. No job id is exposed.
                let status = tokio::time::timeout(
                    PRINT_TO_TIMEOUT,
                    Command::new("powershell")
                        .args([
                            "-NoProfile",
                            "-Command",
                            &format!(
                                "Start-Process -FilePath '{}' -Verb PrintTo -ArgumentList '{}' -Wait",
                                path.display(),
                                printer.system_name.replace('\'', "''"),
                            ),
                        ])
                        .status(),
                )
                .await
                .map_err(|_| {
                    SpoolError::Timeout(format!(
                        "PrintTo did not finish within {}s",
                        PRINT_TO_TIMEOUT.as_secs()
                    ))
                })?
                .map_err(|e| SpoolError::Platform(format!("powershell: {e}")))?;

                if !status.success() {
                    return Err(SpoolError::Rejected(format!(
                        "PrintTo exited with {status}"
                    )));
                }
                Ok(SpoolerHandle { os_job_id: None })
            }
        }
    }
}

/// Direct-to-driver RAW submission via the Win32 print spooler.
///
/// Returns the spooler job id from StartDocPrinterW.
fn write_raw(printer_name: &str, doc_name: &str, data: &[u8]) -> Result<u32, SpoolError> {
    use std::ffi::c_void;
    use windows::core::{PCWSTR, PWSTR};
    use windows::Win32::Graphics::Printing::{
        ClosePrinter, EndDocPrinter, EndPagePrinter, OpenPrinterW, StartDocPrinterW,
        StartPagePrinter, WritePrinter, DOC_INFO_1W, PRINTER_HANDLE,
    };

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    unsafe {
        let mut handle: PRINTER_HANDLE = PRINTER_HANDLE::default();
        let name_w = to_wide(printer_name);

        OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
            .map_err(|_| SpoolError::Platform("OpenPrinterW failed".into()))?;

        let doc_name_w = to_wide(doc_name);
        let datatype_w = to_wide("RAW");
        let doc_info = DOC_INFO_1W {
            pDocName: PWSTR(doc_name_w.as_ptr() as *mut _),
            pOutputFile: PWSTR::null(),
            pDatatype: PWSTR(datatype_w.as_ptr() as *mut _),
        };

        let job_id = StartDocPrinterW(handle, 1, &doc_info as *const DOC_INFO_1W);
        if job_id == 0 {
            let _ = ClosePrinter(handle);
            return Err(SpoolError::Rejected("StartDocPrinter failed".into()));
        }

        if !StartPagePrinter(handle).as_bool() {
            let _ = EndDocPrinter(handle);
            let _ = ClosePrinter(handle);
            return Err(SpoolError::Rejected("StartPagePrinter failed".into()));
        }

        let mut written: u32 = 0;
        let ok = WritePrinter(
            handle,
            data.as_ptr() as *const c_void,
            data.len() as u32,
            &mut written,
        );

        let _ = EndPagePrinter(handle);
        let _ = EndDocPrinter(handle);
        let _ = ClosePrinter(handle);

        if !ok.as_bool() {
            return Err(SpoolError::Rejected("WritePrinter failed".into()));
        }
        if written != data.len() as u32 {
            return Err(SpoolError::Rejected("incomplete write".into()));
        }

        Ok(job_id)
    }
}

/// Win32 job polling via GetJobW.
pub struct WindowsPoll;

#[async_trait]
impl SpoolerPoll for WindowsPoll {
    async fn job_status(
        &self,
        printer: &str,
        os_job_id: u32,
    ) -> Result<OsJobStatus, SpoolError> {
        let printer = printer.to_string();
        tokio::task::spawn_blocking(move || query_job_status(&printer, os_job_id))
            .await
            .map_err(|e| SpoolError::Platform(format!("join error: {e}")))?
    }
}

fn query_job_status(printer_name: &str, os_job_id: u32) -> Result<OsJobStatus, SpoolError> {
    use windows::core::PCWSTR;
    use windows::Win32::Graphics::Printing::{
        ClosePrinter, GetJobW, OpenPrinterW, JOB_INFO_1W, JOB_STATUS_BLOCKED_DEVQ,
        JOB_STATUS_DELETED, JOB_STATUS_DELETING, JOB_STATUS_ERROR, JOB_STATUS_OFFLINE,
        JOB_STATUS_PAPEROUT, JOB_STATUS_PRINTED, JOB_STATUS_PRINTING, PRINTER_HANDLE,
    };

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    unsafe {
        let mut handle: PRINTER_HANDLE = PRINTER_HANDLE::default();
        let name_w = to_wide(printer_name);

        OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
            .map_err(|_| SpoolError::Platform("OpenPrinterW failed".into()))?;

        let mut needed: u32 = 0;
        let _ = GetJobW(handle, os_job_id, 1, None, &mut needed);
        if needed == 0 {
            let _ = ClosePrinter(handle);
            // The spooler no longer knows the job.
            return Ok(OsJobStatus::Missing);
        }

        let mut buf: Vec<u8> = vec![0; needed as usize];
        let result = GetJobW(handle, os_job_id, 1, Some(buf.as_mut_slice()), &mut needed);
        let _ = ClosePrinter(handle);

        if result.is_err() {
            return Ok(OsJobStatus::Missing);
        }

        let info = *(buf.as_ptr() as *const JOB_INFO_1W);
        let status = info.Status;

        let mapped = if (status & JOB_STATUS_PRINTED) != 0 {
            OsJobStatus::Printed
        } else if (status & (JOB_STATUS_DELETED | JOB_STATUS_DELETING)) != 0 {
            OsJobStatus::Cancelled
        } else if (status & JOB_STATUS_PAPEROUT) != 0 {
            OsJobStatus::PaperOut
        } else if (status & JOB_STATUS_OFFLINE) != 0 {
            OsJobStatus::Offline
        } else if (status & JOB_STATUS_ERROR) != 0 {
            OsJobStatus::Error
        } else if (status & JOB_STATUS_BLOCKED_DEVQ) != 0 {
            OsJobStatus::Blocked
        } else if (status & JOB_STATUS_PRINTING) != 0 {
            OsJobStatus::Printing
        } else {
            OsJobStatus::Pending
        };

        Ok(mapped)
    }
}
