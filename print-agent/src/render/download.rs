//! Bounded PDF download
//!
//! The client enforces a 30-second overall timeout and a hard cap of
//! 5 redirects per attempt. Failures map to short reason strings; the
//! queue's retry policy owns any re-attempt.

use std::path::Path;
use std::time::Duration;

use super::RenderError;

pub(super) const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub(super) const MAX_REDIRECTS: usize = 5;

/// Fetch a PDF into `dest`.
pub(super) async fn download_pdf(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<(), RenderError> {
    let response = client.get(url).send().await.map_err(map_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(RenderError::Download(format!("HTTP {status}")));
    }

    let bytes = response.bytes().await.map_err(map_reqwest)?;
    tokio::fs::write(dest, &bytes).await?;
    Ok(())
}

fn map_reqwest(e: reqwest::Error) -> RenderError {
    if e.is_redirect() {
        RenderError::Download("too many redirects".into())
    } else if e.is_timeout() {
        RenderError::Download("download timed out".into())
    } else {
        RenderError::Download(e.to_string())
    }
}
