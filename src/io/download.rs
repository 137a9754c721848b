use crate::types::{PipelineError, PipelineResult};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Granule object downloader
pub struct Downloader {
    client: reqwest::blocking::Client,
    bearer_token: Option<String>,
    max_retries: u32,
}

impl Downloader {
    /// Build a blocking client with a generous timeout; granule files are
    /// tens to hundreds of megabytes.
    pub fn new(bearer_token: Option<String>) -> PipelineResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(600))
            .user_agent("swotpipe/0.2.0 (SWOT WSE Ingestion Pipeline)")
            .build()
            .map_err(|e| {
                PipelineError::Processing(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            bearer_token,
            max_retries: 3,
        })
    }

    /// Fetch `url` into `output_path`, retrying a bounded number of times.
    ///
    /// An already-present local file is reused without a request. Errors
    /// after the final attempt propagate to the caller; partial files from
    /// failed attempts are removed.
    pub fn fetch<P: AsRef<Path>>(&self, url: &str, output_path: P) -> PipelineResult<()> {
        let output_path = output_path.as_ref();

        if output_path.exists() {
            log::info!(
                "Raw file {} already exists, skipping download",
                output_path.display()
            );
            return Ok(());
        }

        let mut last_error = None;
        for attempt in 1..=self.max_retries {
            log::debug!("Download attempt {} of {}", attempt, self.max_retries);

            match self.try_fetch_once(url, output_path) {
                Ok(()) => {
                    log::info!("Downloaded {} to {}", url, output_path.display());
                    return Ok(());
                }
                Err(e) => {
                    if output_path.exists() {
                        if let Err(rm_err) = std::fs::remove_file(output_path) {
                            log::warn!(
                                "Could not remove partial file {}: {}",
                                output_path.display(),
                                rm_err
                            );
                        }
                    }
                    if attempt < self.max_retries {
                        log::warn!("Download attempt {} failed ({}), retrying...", attempt, e);
                        std::thread::sleep(Duration::from_secs(2));
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PipelineError::Processing("Download failed after all retries".to_string())
        }))
    }

    /// Single download attempt
    fn try_fetch_once(&self, url: &str, output_path: &Path) -> PipelineResult<()> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(PipelineError::Processing(format!(
                "HTTP {} {}: {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or(""),
                url
            )));
        }

        let content = response.bytes()?;
        let mut file = std::fs::File::create(output_path)?;
        file.write_all(&content)?;
        file.flush()?;
        Ok(())
    }
}
