//! Core types for gsa-committer

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::Read;

/// Metadata field holding the public URL of a document
pub const FIELD_URL: &str = "url";
/// Metadata field holding the MIME type of a document
pub const FIELD_MIMETYPE: &str = "mimetype";
/// Metadata field holding the last modification date of a document
pub const FIELD_LAST_MODIFIED: &str = "last-modified";

/// Date layout the appliance expects for `last-modified` (RFC 822, GMT)
const LAST_MODIFIED_FORMAT: &str = "%a, %-d %b %Y %H:%M:%S GMT";

/// Readable byte stream supplying the body of an added document
pub type ContentStream = Box<dyn Read + Send>;

/// Kind of a commit operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Document added or updated
    Add,
    /// Document removed
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Add => write!(f, "add"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A single document change to send to the appliance
///
/// Operations are owned by the caller until handed to the committer, which
/// consumes each add operation's content stream exactly once, in batch order.
#[derive(Debug)]
pub enum Operation {
    /// Add or update a document
    Add(AddOperation),
    /// Remove a document by reference
    Delete(DeleteOperation),
}

impl Operation {
    /// Create an add operation from its parts
    pub fn add(
        reference: impl Into<String>,
        metadata: BTreeMap<String, String>,
        content: impl Read + Send + 'static,
    ) -> Self {
        Operation::Add(AddOperation {
            reference: reference.into(),
            metadata,
            content: Box::new(content),
        })
    }

    /// Create a delete operation
    pub fn delete(reference: impl Into<String>) -> Self {
        Operation::Delete(DeleteOperation::new(reference))
    }

    /// Document reference this operation applies to
    pub fn reference(&self) -> &str {
        match self {
            Operation::Add(op) => &op.reference,
            Operation::Delete(op) => &op.reference,
        }
    }

    /// Kind of this operation
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Add(_) => OperationKind::Add,
            Operation::Delete(_) => OperationKind::Delete,
        }
    }
}

impl From<AddOperation> for Operation {
    fn from(op: AddOperation) -> Self {
        Operation::Add(op)
    }
}

impl From<DeleteOperation> for Operation {
    fn from(op: DeleteOperation) -> Self {
        Operation::Delete(op)
    }
}

/// Add or update a document
pub struct AddOperation {
    /// Document reference (usually its URL)
    pub reference: String,
    /// Document metadata; `url`, `mimetype` and `last-modified` end up in the feed
    pub metadata: BTreeMap<String, String>,
    /// Document body, read once while the feed is encoded
    pub content: ContentStream,
}

impl AddOperation {
    /// Create an add operation with empty metadata
    pub fn new(reference: impl Into<String>, content: impl Read + Send + 'static) -> Self {
        Self {
            reference: reference.into(),
            metadata: BTreeMap::new(),
            content: Box::new(content),
        }
    }

    /// Set a metadata field, replacing any previous value
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set `last-modified` from a timestamp, formatted the way the appliance expects
    pub fn with_last_modified(self, modified: DateTime<Utc>) -> Self {
        let value = format_last_modified(modified);
        self.with_metadata(FIELD_LAST_MODIFIED, value)
    }

    /// Look up a metadata field
    pub fn field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

impl std::fmt::Debug for AddOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddOperation")
            .field("reference", &self.reference)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Remove a document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteOperation {
    /// Reference of the document to remove
    pub reference: String,
}

impl DeleteOperation {
    /// Create a delete operation
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }
}

/// Format a timestamp as an RFC 822 GMT date, e.g. `Tue, 6 Nov 2007 12:45:26 GMT`
pub fn format_last_modified(modified: DateTime<Utc>) -> String {
    modified.format(LAST_MODIFIED_FORMAT).to_string()
}

/// Feed type announced in the feed header and the upload form
///
/// Only full feeds are produced: every record carries its content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FeedType {
    /// Full content feed
    #[default]
    Full,
}

impl FeedType {
    /// Wire value of this feed type
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Full => "full",
        }
    }
}

impl std::fmt::Display for FeedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts of operations written during one encode pass
#[must_use]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperationStats {
    /// Number of `record` elements written
    pub added: usize,
    /// Number of `remove` elements written
    pub removed: usize,
}

impl OperationStats {
    /// Total number of operations written
    pub fn total(&self) -> usize {
        self.added + self.removed
    }

    pub(crate) fn record(&mut self, kind: OperationKind) {
        match kind {
            OperationKind::Add => self.added += 1,
            OperationKind::Delete => self.removed += 1,
        }
    }
}

impl std::fmt::Display for OperationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} additions and {} removals", self.added, self.removed)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    #[test]
    fn test_operation_accessors() {
        let add: Operation = AddOperation::new("http://x/1", Cursor::new("body")).into();
        let delete = Operation::delete("http://x/2");

        assert_eq!(add.reference(), "http://x/1");
        assert_eq!(add.kind(), OperationKind::Add);
        assert_eq!(delete.reference(), "http://x/2");
        assert_eq!(delete.kind(), OperationKind::Delete);
    }

    #[test]
    fn test_with_metadata_replaces_value() {
        let op = AddOperation::new("ref", std::io::empty())
            .with_metadata(FIELD_MIMETYPE, "text/html")
            .with_metadata(FIELD_MIMETYPE, "text/plain");

        assert_eq!(op.field(FIELD_MIMETYPE), Some("text/plain"));
        assert_eq!(op.field(FIELD_URL), None);
    }

    #[test]
    fn test_last_modified_format() {
        let modified = Utc.with_ymd_and_hms(2007, 11, 6, 12, 45, 26).unwrap();
        let op = AddOperation::new("ref", std::io::empty()).with_last_modified(modified);

        assert_eq!(
            op.field(FIELD_LAST_MODIFIED),
            Some("Tue, 6 Nov 2007 12:45:26 GMT")
        );
    }

    #[test]
    fn test_last_modified_two_digit_day() {
        let modified = Utc.with_ymd_and_hms(2009, 11, 16, 2, 5, 6).unwrap();
        assert_eq!(format_last_modified(modified), "Mon, 16 Nov 2009 02:05:06 GMT");
    }

    #[test]
    fn test_add_operation_debug_omits_content() {
        let op = AddOperation::new("http://x/1", Cursor::new("secret body"));
        let debug = format!("{:?}", op);
        assert!(debug.contains("http://x/1"));
        assert!(!debug.contains("secret body"));
    }

    #[test]
    fn test_stats_display_and_total() {
        let mut stats = OperationStats::default();
        stats.record(OperationKind::Add);
        stats.record(OperationKind::Add);
        stats.record(OperationKind::Delete);

        assert_eq!(stats.total(), 3);
        assert_eq!(stats.to_string(), "2 additions and 1 removals");
    }

    #[test]
    fn test_feed_type_wire_value() {
        assert_eq!(FeedType::default().as_str(), "full");
        assert_eq!(FeedType::Full.to_string(), "full");
    }
}
