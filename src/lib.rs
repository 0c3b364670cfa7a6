//! # gsa-committer
//!
//! Commits batches of document changes to a Google Search Appliance.
//!
//! A batch of [`Operation`]s is streamed into a single GSA feed document
//! (see [`feed::FeedEncoder`]), staged in a temporary file, and uploaded as a
//! `multipart/form-data` request to the appliance feed endpoint
//! (see [`FeedCommitter`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use gsa_committer::{AddOperation, CommitterConfig, FeedCommitter, Operation};
//! use std::io::Cursor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CommitterConfig {
//!         feed_url: "http://gsa.example.com:19900/xmlfeed".to_string(),
//!         ..Default::default()
//!     };
//!     let committer = FeedCommitter::http(config)?;
//!
//!     let batch = vec![
//!         AddOperation::new("http://www.example.com/a", Cursor::new("hello"))
//!             .with_metadata("mimetype", "text/plain")
//!             .with_metadata("last-modified", "Tue, 6 Nov 2007 12:45:26 GMT")
//!             .into(),
//!         Operation::delete("http://www.example.com/b"),
//!     ];
//!
//!     let stats = committer.commit(batch).await?;
//!     println!("{stats}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Batch commit: staging, upload and response validation
pub mod committer;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Streaming GSA feed document encoder
pub mod feed;
/// Feed upload transport
pub mod transport;
/// Operations and statistics
pub mod types;

// Re-export commonly used types
pub use committer::FeedCommitter;
pub use config::{BatchingConfig, CommitterConfig};
pub use error::{EncodingError, Error, IsRetryable, Result, TransmissionError};
pub use feed::FeedEncoder;
pub use transport::{FeedTransport, FeedUpload, HttpTransport, TransportResponse};
pub use types::{AddOperation, DeleteOperation, FeedType, Operation, OperationKind, OperationStats};
