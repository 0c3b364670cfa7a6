//! Feed upload transport
//!
//! [`FeedTransport`] is the seam between the committer and the network. The
//! production implementation, [`HttpTransport`], posts the staged feed as a
//! `multipart/form-data` request with a shared [`reqwest::Client`]; tests
//! substitute their own implementation.

use crate::error::TransmissionError;
use crate::types::FeedType;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

/// MIME type of the feed document part
const FEED_MIME_TYPE: &str = "application/xml";

/// Most bytes of a rejected upload's response body kept for diagnostics
pub const MAX_ERROR_BODY_LEN: usize = 4 * 1024;

/// A fully written feed document ready to be uploaded
#[derive(Clone, Debug)]
pub struct FeedUpload {
    /// Location of the encoded feed on disk
    pub path: PathBuf,
    /// File name announced for the `data` part
    pub file_name: String,
    /// Size of the feed document in bytes
    pub length: u64,
    /// Value of the `datasource` form field
    pub datasource: String,
    /// Value of the `feedtype` form field
    pub feed_type: FeedType,
}

/// Status line and body returned by the feed endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// HTTP reason phrase as sent by the endpoint
    pub reason: String,
    /// Start of the response body for rejected uploads, empty on success
    ///
    /// At most [`MAX_ERROR_BODY_LEN`] bytes are read.
    pub body: String,
}

impl TransportResponse {
    /// Whether the appliance accepted the feed (HTTP 200 only)
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Sends staged feeds to the appliance
///
/// Implementations must be safe to share between concurrent commits.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Upload one feed and return the endpoint's response
    ///
    /// Any status code is returned as a response; only failures to obtain a
    /// response at all are errors.
    async fn send(
        &self,
        feed_url: &Url,
        upload: &FeedUpload,
    ) -> Result<TransportResponse, TransmissionError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: FeedTransport + ?Sized> FeedTransport for Arc<T> {
    async fn send(
        &self,
        feed_url: &Url,
        upload: &FeedUpload,
    ) -> Result<TransportResponse, TransmissionError> {
        (**self).send(feed_url, upload).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Multipart HTTP transport backed by one reusable client
///
/// The client keeps its connection pool across calls, so one instance should
/// be created at startup and shared.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with an optional overall request timeout
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransmissionError> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wrap an existing client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn send(
        &self,
        feed_url: &Url,
        upload: &FeedUpload,
    ) -> Result<TransportResponse, TransmissionError> {
        let form = build_form(upload).await?;

        debug!(
            url = %feed_url,
            file = %upload.file_name,
            bytes = upload.length,
            "uploading feed"
        );

        let response = self
            .client
            .post(feed_url.as_str())
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let reason = reason_phrase(&response);
        let body = if status == 200 {
            String::new()
        } else {
            read_error_body(response).await
        };

        Ok(TransportResponse {
            status,
            reason,
            body,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Reason phrase from the status line, or the standard one when it matches
fn reason_phrase(response: &reqwest::Response) -> String {
    // hyper only records the phrase when it differs from the canonical one
    match response.extensions().get::<hyper::ext::ReasonPhrase>() {
        Some(phrase) => String::from_utf8_lossy(phrase.as_bytes()).into_owned(),
        None => response
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Read up to [`MAX_ERROR_BODY_LEN`] bytes of the body
async fn read_error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    while body.len() < MAX_ERROR_BODY_LEN {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(MAX_ERROR_BODY_LEN - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "failed to read feed endpoint response body");
                break;
            }
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Build the three-part upload form: `data`, `datasource`, `feedtype`, in that order
///
/// The feed document is streamed from disk rather than read into memory.
/// File names are sent as-is, the way browsers do.
async fn build_form(upload: &FeedUpload) -> Result<Form, TransmissionError> {
    let file = tokio::fs::File::open(&upload.path)
        .await
        .map_err(TransmissionError::Storage)?;
    let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

    let data = Part::stream_with_length(body, upload.length)
        .file_name(upload.file_name.clone())
        .mime_str(FEED_MIME_TYPE)?;

    Ok(Form::new()
        .percent_encode_noop()
        .part("data", data)
        .text("datasource", upload.datasource.clone())
        .text("feedtype", upload.feed_type.as_str()))
}
