//! Shared test helpers for exercising FeedCommitter without a network.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::config::CommitterConfig;
use crate::error::TransmissionError;
use crate::transport::{FeedTransport, FeedUpload, TransportResponse};
use crate::types::{AddOperation, Operation};
use async_trait::async_trait;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;
use url::Url;

/// What the fake transport saw for one upload
#[derive(Debug, Clone)]
pub(crate) struct RecordedUpload {
    pub upload: FeedUpload,
    pub url: Url,
    /// Whether the staged file was on disk when the upload started
    pub existed: bool,
    /// Feed document read from the staged file
    pub document: String,
}

enum Reply {
    Status(u16, &'static str),
    Refused,
}

/// Transport that records uploads and answers with a canned reply
pub(crate) struct FakeTransport {
    reply: Reply,
    uploads: Mutex<Vec<RecordedUpload>>,
}

impl FakeTransport {
    pub(crate) fn ok() -> Self {
        Self::status(200, "OK")
    }

    pub(crate) fn status(code: u16, reason: &'static str) -> Self {
        Self {
            reply: Reply::Status(code, reason),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn refused() -> Self {
        Self {
            reply: Reply::Refused,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedTransport for FakeTransport {
    async fn send(
        &self,
        feed_url: &Url,
        upload: &FeedUpload,
    ) -> Result<TransportResponse, TransmissionError> {
        let existed = upload.path.exists();
        let document = std::fs::read_to_string(&upload.path).unwrap_or_default();
        self.uploads.lock().unwrap().push(RecordedUpload {
            upload: upload.clone(),
            url: feed_url.clone(),
            existed,
            document,
        });

        match self.reply {
            Reply::Status(status, reason) => Ok(TransportResponse {
                status,
                reason: reason.to_string(),
                body: String::new(),
            }),
            Reply::Refused => Err(TransmissionError::Storage(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Configuration staging feeds in `dir`
pub(crate) fn config_in(dir: &Path) -> CommitterConfig {
    CommitterConfig {
        feed_url: "http://gsa.test:19900/xmlfeed".to_string(),
        temp_dir: Some(dir.to_path_buf()),
        ..CommitterConfig::default()
    }
}

/// Add operation with the metadata the feed requires
pub(crate) fn add_op(url: &str, content: &str) -> Operation {
    AddOperation::new(url, Cursor::new(content.as_bytes().to_vec()))
        .with_metadata("url", url)
        .with_metadata("mimetype", "text/plain")
        .with_metadata("last-modified", "Tue, 6 Nov 2007 12:45:26 GMT")
        .into()
}

/// Number of entries left in a directory
pub(crate) fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
