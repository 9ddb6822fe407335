use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::Client;
use reqwest::header::CONTENT_DISPOSITION;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::errors::{LauncherError, Result};
use crate::util::percent_complete;

pub mod meta;

pub use meta::RemoteMeta;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

/// Snapshot of a running transfer, emitted once per received chunk while
/// the total size is known.
#[derive(Clone, Copy, Debug)]
pub struct TransferProgress {
    pub percent: u8,
    pub downloaded: u64,
    pub total: u64,
}

/// Terminal result of a completed transfer.
#[derive(Clone, Debug)]
pub struct FetchOutcome {
    pub bytes_written: u64,
    pub version: String,
}

pub type ProgressFn<'a> = &'a mut (dyn FnMut(TransferProgress) + Send);

/// Remote side of the update pipeline: metadata probes and file transfers.
#[async_trait]
pub trait GameSource: Send + Sync {
    /// Learn the remote file name and version token without transferring
    /// the resource.
    async fn probe(&self, url: &str) -> Result<RemoteMeta>;

    /// Stream the resource at `url` into `dest`, reporting progress as the
    /// body arrives. On failure the partial file is left in place.
    async fn fetch(&self, url: &str, dest: &Path, progress: ProgressFn<'_>)
    -> Result<FetchOutcome>;
}

#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    progress_delay: Duration,
}

impl HttpSource {
    pub fn new(progress_delay: Duration) -> Self {
        let client = Client::builder()
            .timeout(TRANSFER_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                warn!("networking: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self {
            client,
            progress_delay,
        }
    }
}

#[async_trait]
impl GameSource for HttpSource {
    async fn probe(&self, url: &str) -> Result<RemoteMeta> {
        let resp = self
            .client
            .head(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| LauncherError::network(url, e))?;
        if !resp.status().is_success() {
            return Err(LauncherError::status(url, resp.status()));
        }

        let disposition = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok());
        let meta = meta::resolve(url, disposition);
        debug!(
            "probe: {} reports file {:?} version {}",
            url, meta.file_name, meta.version
        );
        Ok(meta)
    }

    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<FetchOutcome> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LauncherError::network(url, e))?;
        if !resp.status().is_success() {
            return Err(LauncherError::status(url, resp.status()));
        }

        // Capture the version from this response before the body is consumed;
        // the probe that scheduled the download may be stale by now.
        let disposition = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let meta = meta::resolve(url, disposition.as_deref());
        let total = resp.content_length().filter(|len| *len > 0);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut file = File::create(dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;

        let mut stream = resp.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LauncherError::network(url, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;
            downloaded += chunk.len() as u64;

            if let Some(total) = total {
                progress(TransferProgress {
                    percent: percent_complete(downloaded, total),
                    downloaded,
                    total,
                });
                if !self.progress_delay.is_zero() {
                    tokio::time::sleep(self.progress_delay).await;
                }
            }
        }

        file.flush().await.map_err(|e| LauncherError::io(dest, e))?;

        if let Some(total) = total
            && downloaded < total
        {
            return Err(LauncherError::Incomplete {
                received: downloaded,
                expected: total,
            });
        }

        debug!("fetch: wrote {downloaded} bytes to {}", dest.display());
        Ok(FetchOutcome {
            bytes_written: downloaded,
            version: meta.version,
        })
    }
}
