//! Error types for gsa-committer
//!
//! Failures are layered the way a batch commit proceeds:
//! - [`EncodingError`] for problems writing the feed document
//! - [`TransmissionError`] for anything that stops a staged feed from being accepted
//! - [`Error`] at the crate surface, wrapping a failed commit with the batch size

use thiserror::Error;

/// Result type alias for gsa-committer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gsa-committer
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "feed_url")
        key: Option<String>,
    },

    /// Feed document could not be encoded
    ///
    /// Only produced by `?` when [`FeedEncoder::encode`](crate::FeedEncoder::encode)
    /// is driven directly. A failed commit reports encoding problems as
    /// [`Error::Commit`] with a [`TransmissionError::Encoding`] source.
    #[error("feed encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// A batch could not be committed to the appliance
    #[error("cannot commit batch of {operations} operations to GSA: {source}")]
    Commit {
        /// Number of operations in the failed batch
        operations: usize,
        /// Why the commit failed
        #[source]
        source: TransmissionError,
    },
}

impl Error {
    /// Build a configuration error for a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Errors raised while writing a feed document
#[derive(Debug, Error)]
pub enum EncodingError {
    /// The output sink rejected a write or flush
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The XML writer failed
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Reading a document's content stream failed partway
    #[error("failed to read content of {reference}: {source}")]
    ContentRead {
        /// Reference of the document whose content could not be read
        reference: String,
        /// Underlying read error
        #[source]
        source: std::io::Error,
    },

    /// An added document lacks a metadata field the feed requires
    #[error("document {reference} has no \"{field}\" metadata")]
    MissingMetadata {
        /// Reference of the incomplete document
        reference: String,
        /// The missing metadata field
        field: &'static str,
    },
}

/// Errors raised while staging or uploading a feed
#[derive(Debug, Error)]
pub enum TransmissionError {
    /// The feed document could not be encoded
    #[error("feed encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// The temporary feed file could not be created, written or read
    #[error("feed staging failed: {0}")]
    Storage(#[source] std::io::Error),

    /// The HTTP request failed before a response was received
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The appliance answered with something other than 200
    #[error("invalid response to feed upload, response code: {code}, response message: {reason}")]
    Status {
        /// HTTP status code
        code: u16,
        /// HTTP reason phrase
        reason: String,
    },
}

/// Classifies failures for callers that run their own retry policy
///
/// The committer never retries by itself; this only tells an outer
/// orchestrator whether resubmitting the same batch could succeed.
pub trait IsRetryable {
    /// Returns true if the failure is transient
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for TransmissionError {
    fn is_retryable(&self) -> bool {
        match self {
            // Bad documents stay bad
            TransmissionError::Encoding(_) => false,
            TransmissionError::Storage(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
            ),
            TransmissionError::Transport(e) => e.is_timeout() || e.is_connect(),
            TransmissionError::Status { code, .. } => {
                matches!(code, 408 | 429) || (500..600).contains(code)
            }
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Commit { source, .. } => source.is_retryable(),
            Error::Config { .. } => false,
            Error::Encoding(_) => false,
        }
    }
}
