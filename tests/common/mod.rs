//! Common test utilities for gsa-committer integration tests

#![allow(dead_code)]

use gsa_committer::{AddOperation, CommitterConfig, Operation};
use std::io::Cursor;
use std::path::Path;

/// Last-modified value used by every fixture document
pub const LAST_MODIFIED: &str = "Tue, 6 Nov 2007 12:45:26 GMT";

/// Configuration pointing at a mock server, staging feeds in `temp_dir`
pub fn config_for(server_uri: &str, temp_dir: &Path) -> CommitterConfig {
    CommitterConfig {
        feed_url: format!("{}/xmlfeed", server_uri),
        temp_dir: Some(temp_dir.to_path_buf()),
        ..CommitterConfig::default()
    }
}

/// Plain-text document ready for the feed
pub fn text_document(url: &str, content: &str) -> Operation {
    AddOperation::new(url, Cursor::new(content.as_bytes().to_vec()))
        .with_metadata("url", url)
        .with_metadata("mimetype", "text/plain")
        .with_metadata("last-modified", LAST_MODIFIED)
        .into()
}

/// Number of entries left in a directory
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).expect("read temp dir").count()
}

/// Position of `needle` in `haystack`, panicking with context when absent
pub fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not found in request body:\n{haystack}"))
}
