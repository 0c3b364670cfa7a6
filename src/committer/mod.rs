//! Batch commit: staging, upload and response validation
//!
//! A commit runs in three steps:
//! 1. The batch is encoded into a temporary `batch*.xml` file on a blocking worker
//! 2. The finished file is handed to the [`FeedTransport`]
//! 3. The response is checked; only HTTP 200 counts as accepted
//!
//! The temporary file is a [`NamedTempFile`], removed when it goes out of
//! scope. Every path out of [`FeedCommitter::commit`] (success, error, panic
//! in the encoder, or the commit future being dropped) therefore deletes it.

use crate::config::CommitterConfig;
use crate::error::{Error, Result, TransmissionError};
use crate::feed::FeedEncoder;
use crate::transport::{FeedTransport, FeedUpload, HttpTransport};
use crate::types::{Operation, OperationStats};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};
use url::Url;

/// Commits document batches to a GSA feed endpoint
///
/// One committer is meant to be shared by every batch of a crawl: it holds the
/// validated endpoint, the feed encoder, and the transport whose connections
/// are reused across commits. Concurrent commits are independent; each stages
/// its own temporary file.
///
/// # Examples
///
/// ```no_run
/// use gsa_committer::{CommitterConfig, FeedCommitter, Operation};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let committer = FeedCommitter::http(CommitterConfig {
///     feed_url: "http://gsa.example.com:19900/xmlfeed".to_string(),
///     ..Default::default()
/// })?;
///
/// let stats = committer
///     .commit(vec![Operation::delete("http://www.example.com/gone")])
///     .await?;
/// assert_eq!(stats.removed, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FeedCommitter<T = HttpTransport> {
    feed_url: Url,
    encoder: FeedEncoder,
    temp_dir: Option<PathBuf>,
    transport: T,
}

impl FeedCommitter<HttpTransport> {
    /// Create a committer using an HTTP transport built from `config`
    pub fn http(config: CommitterConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout).map_err(|e| Error::Config {
            message: format!("failed to build HTTP client: {}", e),
            key: None,
        })?;
        Self::new(config, transport)
    }
}

impl<T: FeedTransport> FeedCommitter<T> {
    /// Create a committer with an explicit transport
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(config: CommitterConfig, transport: T) -> Result<Self> {
        let feed_url = config.validate()?;
        Ok(Self {
            feed_url,
            encoder: FeedEncoder::new(config.datasource),
            temp_dir: config.temp_dir,
            transport,
        })
    }

    /// Validated feed endpoint
    pub fn feed_url(&self) -> &Url {
        &self.feed_url
    }

    /// Transport used for uploads
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encode `batch` as one feed, upload it, and return what was sent
    ///
    /// The feed is written completely to a temporary file before the upload
    /// starts, so the endpoint either receives the whole batch or nothing.
    /// Nothing is retried here; use [`IsRetryable`](crate::error::IsRetryable)
    /// on the error to decide whether to submit the batch again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Commit`] wrapping a [`TransmissionError`] if encoding,
    /// staging or the upload fails, or if the endpoint answers with anything
    /// other than HTTP 200.
    pub async fn commit(&self, batch: Vec<Operation>) -> Result<OperationStats> {
        let operations = batch.len();

        self.commit_batch(batch).await.map_err(|source| {
            error!(
                operations,
                feed_url = %self.feed_url,
                transport = self.transport.name(),
                error = %source,
                "cannot commit document batch to GSA"
            );
            Error::Commit { operations, source }
        })
    }

    async fn commit_batch(
        &self,
        batch: Vec<Operation>,
    ) -> std::result::Result<OperationStats, TransmissionError> {
        let staged = self.stage(batch).await?;

        let upload = FeedUpload {
            path: staged.file.path().to_path_buf(),
            file_name: staged.file_name(),
            length: staged.length,
            datasource: self.encoder.datasource().to_string(),
            feed_type: self.encoder.feed_type(),
        };

        let response = self.transport.send(&self.feed_url, &upload).await?;

        if !response.is_success() {
            debug!(
                status = response.status,
                body = %response.body,
                "feed endpoint rejected upload"
            );
            return Err(TransmissionError::Status {
                code: response.status,
                reason: response.reason,
            });
        }

        info!(
            added = staged.stats.added,
            removed = staged.stats.removed,
            "sent {} additions and {} removals to GSA",
            staged.stats.added,
            staged.stats.removed
        );

        Ok(staged.stats)
    }

    /// Encode the batch into a temporary file without blocking the runtime
    async fn stage(
        &self,
        batch: Vec<Operation>,
    ) -> std::result::Result<StagedFeed, TransmissionError> {
        let encoder = self.encoder.clone();
        let temp_dir = self.temp_dir.clone();

        tokio::task::spawn_blocking(move || stage_batch(&encoder, temp_dir.as_deref(), batch))
            .await
            .map_err(|e| {
                TransmissionError::Storage(std::io::Error::other(format!(
                    "feed encoding task failed: {}",
                    e
                )))
            })?
    }
}

/// An encoded feed waiting for upload; the file is deleted on drop
struct StagedFeed {
    file: NamedTempFile,
    stats: OperationStats,
    length: u64,
}

impl StagedFeed {
    fn file_name(&self) -> String {
        self.file
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn stage_batch(
    encoder: &FeedEncoder,
    temp_dir: Option<&Path>,
    batch: Vec<Operation>,
) -> std::result::Result<StagedFeed, TransmissionError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("batch").suffix(".xml");
    let file = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(TransmissionError::Storage)?;

    debug!(
        path = ?file.path(),
        operations = batch.len(),
        "staging feed document"
    );

    let mut writer = BufWriter::new(file.as_file());
    let stats = encoder.encode(batch, &mut writer)?;
    writer.flush().map_err(TransmissionError::Storage)?;
    drop(writer);

    file.as_file()
        .sync_all()
        .map_err(TransmissionError::Storage)?;
    let length = file
        .as_file()
        .metadata()
        .map_err(TransmissionError::Storage)?
        .len();

    Ok(StagedFeed {
        file,
        stats,
        length,
    })
}

#[cfg(test)]
pub(crate) mod test_helpers;
