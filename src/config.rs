//! Configuration types for gsa-committer

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Committer configuration
///
/// Only `feed_url` is required. The `batching` section is carried for the
/// queueing framework that decides when batches are committed; the committer
/// itself validates it but never acts on it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitterConfig {
    /// GSA feed endpoint, e.g. `http://gsa.example.com:19900/xmlfeed`
    #[serde(default)]
    pub feed_url: String,

    /// Data source name announced in the feed (default: "GSA_Commiter")
    #[serde(default = "default_datasource")]
    pub datasource: String,

    /// Directory for temporary feed files (None = system temp directory)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Overall timeout for one feed upload, in seconds (None = no timeout)
    #[serde(default, with = "seconds::option")]
    pub request_timeout: Option<Duration>,

    /// Batching and queueing settings for the surrounding framework
    #[serde(default)]
    pub batching: BatchingConfig,
}

impl Default for CommitterConfig {
    fn default() -> Self {
        Self {
            feed_url: String::new(),
            datasource: default_datasource(),
            temp_dir: None,
            request_timeout: None,
            batching: BatchingConfig::default(),
        }
    }
}

impl CommitterConfig {
    /// Check the configuration and return the parsed feed URL
    pub fn validate(&self) -> Result<Url> {
        let feed_url = parse_feed_url(&self.feed_url)?;

        if self.datasource.trim().is_empty() {
            return Err(Error::config("datasource", "datasource must not be empty"));
        }

        if let Some(timeout) = self.request_timeout
            && timeout.is_zero()
        {
            return Err(Error::config(
                "request_timeout",
                "request_timeout must be greater than zero",
            ));
        }

        self.batching.validate()?;
        Ok(feed_url)
    }
}

/// Settings owned by the batching framework around the committer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Maximum number of documents sent in one feed (default: 100)
    #[serde(default = "default_commit_batch_size")]
    pub commit_batch_size: usize,

    /// Directory where pending operations are queued (default: "./committer-queue")
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,

    /// Number of queued operations that triggers a commit (default: 1000)
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Maximum retries after a failed commit (default: 0)
    #[serde(default)]
    pub max_retries: u32,

    /// Maximum wait between retries, in seconds (default: 0)
    #[serde(default, with = "seconds")]
    pub max_retry_wait: Duration,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            commit_batch_size: default_commit_batch_size(),
            queue_dir: default_queue_dir(),
            queue_size: default_queue_size(),
            max_retries: 0,
            max_retry_wait: Duration::ZERO,
        }
    }
}

impl BatchingConfig {
    fn validate(&self) -> Result<()> {
        if self.commit_batch_size == 0 {
            return Err(Error::config(
                "commit_batch_size",
                "commit_batch_size must be at least 1",
            ));
        }
        if self.queue_size == 0 {
            return Err(Error::config("queue_size", "queue_size must be at least 1"));
        }
        Ok(())
    }
}

fn parse_feed_url(raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(Error::config("feed_url", "feed_url is required"));
    }

    let url = Url::parse(raw)
        .map_err(|e| Error::config("feed_url", format!("invalid feed_url '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::config(
            "feed_url",
            format!(
                "URL scheme '{}' is not allowed; only http and https are supported",
                scheme
            ),
        )),
    }
}

fn default_datasource() -> String {
    "GSA_Commiter".to_string()
}

fn default_commit_batch_size() -> usize {
    100
}

fn default_queue_dir() -> PathBuf {
    PathBuf::from("./committer-queue")
}

fn default_queue_size() -> usize {
    1000
}

/// Durations stored as whole seconds, the unit config files use for timeouts
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }

    /// Same encoding for optional settings; `null` means unset
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(timeout) => serializer.serialize_some(&timeout.as_secs()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
        }
    }
}
