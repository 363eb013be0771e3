//! Platform printer enumeration
//!
//! Unix (Linux/macOS) goes through CUPS (`lpstat`); Windows through
//! `EnumPrintersW`. Both feed raw records to the pure classifier.

use thiserror::Error;

use shared::PrinterDescriptor;

use super::classify::{classify, RawPrinter};

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("printer service unavailable: {0}")]
    Platform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Snapshot the local printers the OS knows about.
pub async fn enumerate() -> Result<Vec<PrinterDescriptor>, EnumerationError> {
    let raw = platform::list_raw().await?;
    Ok(raw.iter().map(classify).collect())
}

#[cfg(unix)]
mod platform {
    use super::{EnumerationError, RawPrinter};
    use tokio::process::Command;

    pub async fn list_raw() -> Result<Vec<RawPrinter>, EnumerationError> {
        let printers = run_lpstat(&["-p"]).await?;
        // Device URIs and the default destination are best-effort; a
        // CUPS with zero queues errors on these.
        let devices = run_lpstat(&["-v"]).await.unwrap_or_default();
        let default = run_lpstat(&["-d"]).await.unwrap_or_default();

        Ok(merge(
            parse_printers(&printers),
            &parse_devices(&devices),
            parse_default(&default).as_deref(),
        ))
    }

    async fn run_lpstat(args: &[&str]) -> Result<String, EnumerationError> {
        let output = Command::new("lpstat")
            .args(args)
            .output()
            .await
            .map_err(|e| EnumerationError::Platform(format!("lpstat: {e}")))?;

        if !output.status.success() {
            return Err(EnumerationError::Platform(format!(
                "lpstat {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Parse `lpstat -p` lines:
    /// `printer NAME is idle.  enabled since ...`
    /// `printer NAME now printing NAME-123. ...`
    /// `printer NAME disabled since ...`
    pub(super) fn parse_printers(output: &str) -> Vec<(String, String)> {
        let mut printers = Vec::new();
        for line in output.lines() {
            let Some(rest) = line.strip_prefix("printer ") else {
                continue;
            };
            let mut words = rest.split_whitespace();
            let Some(name) = words.next() else {
                continue;
            };
            let status = match (words.next(), words.next()) {
                (Some("is"), Some(word)) => word.trim_end_matches('.').to_string(),
                (Some("now"), Some("printing")) => "printing".to_string(),
                (Some("disabled"), _) => "disabled".to_string(),
                _ => "unknown".to_string(),
            };
            printers.push((name.to_string(), status));
        }
        printers
    }

    /// Parse `lpstat -v` lines: `device for NAME: scheme://...`
    pub(super) fn parse_devices(output: &str) -> Vec<(String, String)> {
        let mut devices = Vec::new();
        for line in output.lines() {
            let Some(rest) = line.strip_prefix("device for ") else {
                continue;
            };
            if let Some((name, uri)) = rest.split_once(':') {
                devices.push((name.trim().to_string(), uri.trim().to_string()));
            }
        }
        devices
    }

    /// Parse `lpstat -d`: `system default destination: NAME`
    pub(super) fn parse_default(output: &str) -> Option<String> {
        output
            .lines()
            .find_map(|l| l.strip_prefix("system default destination:"))
            .map(|name| name.trim().to_string())
    }

    pub(super) fn merge(
        printers: Vec<(String, String)>,
        devices: &[(String, String)],
        default: Option<&str>,
    ) -> Vec<RawPrinter> {
        printers
            .into_iter()
            .map(|(name, status)| {
                let device_uri = devices
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, uri)| uri.clone());
                RawPrinter {
                    is_default: default == Some(name.as_str()),
                    device_uri,
                    status,
                    name,
                    ..Default::default()
                }
            })
            .collect()
    }

}

#[cfg(windows)]
mod platform {
    use super::{EnumerationError, RawPrinter};
    use windows::core::PWSTR;
    use windows::Win32::Graphics::Printing::{
        EnumPrintersW, GetDefaultPrinterW, PRINTER_ENUM_CONNECTIONS, PRINTER_ENUM_LOCAL,
        PRINTER_INFO_2W, PRINTER_STATUS_OFFLINE, PRINTER_STATUS_PAPER_OUT,
        PRINTER_STATUS_PRINTING,
    };

    pub async fn list_raw() -> Result<Vec<RawPrinter>, EnumerationError> {
        // The Win32 calls are synchronous; keep them off the runtime.
        tokio::task::spawn_blocking(list_raw_blocking)
            .await
            .map_err(|e| EnumerationError::Platform(format!("join error: {e}")))?
    }

    fn list_raw_blocking() -> Result<Vec<RawPrinter>, EnumerationError> {
        let default = default_printer();

        unsafe {
            let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
            let mut needed: u32 = 0;
            let mut returned: u32 = 0;

            let _ = EnumPrintersW(flags, None, 2, None, &mut needed, &mut returned);
            if needed == 0 {
                return Ok(Vec::new());
            }

            let mut buf: Vec<u8> = vec![0; needed as usize];
            EnumPrintersW(
                flags,
                None,
                2,
                Some(buf.as_mut_slice()),
                &mut needed,
                &mut returned,
            )
            .map_err(|_| EnumerationError::Platform("EnumPrintersW failed".into()))?;

            let ptr = buf.as_ptr() as *const PRINTER_INFO_2W;
            let slice = std::slice::from_raw_parts(ptr, returned as usize);

            let mut result = Vec::new();
            for info in slice {
                if info.pPrinterName.is_null() {
                    continue;
                }
                let name = PWSTR(info.pPrinterName.0).to_string().unwrap_or_default();
                let port = pwstr_opt(info.pPortName);

                // Skip virtual printers by port name (OneNote, XPS, ...)
                if port
                    .as_deref()
                    .map(is_virtual_port)
                    .unwrap_or(false)
                {
                    continue;
                }

                let status = if (info.Status & PRINTER_STATUS_OFFLINE) != 0 {
                    "offline"
                } else if (info.Status & PRINTER_STATUS_PAPER_OUT) != 0 {
                    "paper-out"
                } else if (info.Status & PRINTER_STATUS_PRINTING) != 0 {
                    "printing"
                } else {
                    "idle"
                };

                result.push(RawPrinter {
                    is_default: default.as_deref() == Some(name.as_str()),
                    display_name: pwstr_opt(info.pShareName),
                    driver: pwstr_opt(info.pDriverName),
                    location: pwstr_opt(info.pLocation),
                    comment: pwstr_opt(info.pComment),
                    device_uri: None,
                    status: status.to_string(),
                    port,
                    name,
                });
            }

            Ok(result)
        }
    }

    unsafe fn pwstr_opt(p: PWSTR) -> Option<String> {
        if p.is_null() {
            None
        } else {
            p.to_string().ok().filter(|s| !s.is_empty())
        }
    }

    fn default_printer() -> Option<String> {
        unsafe {
            let mut needed: u32 = 0;
            let _ = GetDefaultPrinterW(None, &mut needed);
            if needed == 0 {
                return None;
            }
            let mut buf: Vec<u16> = vec![0; needed as usize];
            if !GetDefaultPrinterW(Some(PWSTR(buf.as_mut_ptr())), &mut needed).as_bool() {
                return None;
            }
            PWSTR(buf.as_mut_ptr()).to_string().ok()
        }
    }

    fn is_virtual_port(port: &str) -> bool {
        let p = port.to_lowercase();
        p == "file:"
            || p == "portprompt:"
            || p == "xpsport:"
            || p.starts_with("onenote")
            || p == "nul:"
            || p.starts_with("wfsport:")
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    use super::{EnumerationError, RawPrinter};

    pub async fn list_raw() -> Result<Vec<RawPrinter>, EnumerationError> {
        Err(EnumerationError::Platform(
            "printer enumeration is not supported on this platform".into(),
        ))
    }
}
