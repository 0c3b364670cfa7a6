//! Streaming GSA feed document encoder
//!
//! Produces the XML document the appliance feed parser expects:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!DOCTYPE gsafeed PUBLIC "-//Google//DTD GSA Feeds//EN" "">
//! <gsafeed>
//!   <header><datasource>..</datasource><feedtype>full</feedtype></header>
//!   <group>
//!     <record url=".." mimetype=".." last-modified=".."><content>..</content></record>
//!     <remove>..</remove>
//!   </group>
//! </gsafeed>
//! ```
//!
//! The layout above is indented for reading only; the encoder writes no
//! whitespace between nodes. The appliance is strict about element and
//! attribute order, so both are fixed.

mod text;

use crate::error::EncodingError;
use crate::types::{
    AddOperation, DeleteOperation, FIELD_LAST_MODIFIED, FIELD_MIMETYPE, FIELD_URL, FeedType,
    Operation, OperationStats,
};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::borrow::Cow;
use std::io::{ErrorKind, Read, Write};
use tracing::{debug, warn};

/// Public identifier and empty system identifier of the feed DTD
const DOCTYPE: &str = r#"gsafeed PUBLIC "-//Google//DTD GSA Feeds//EN" """#;

/// Size of the buffer document content is streamed through (1 MiB)
pub const CONTENT_BUFFER_SIZE: usize = 1024 * 1024;

/// Writes batches of operations as GSA feed documents
#[derive(Clone, Debug)]
pub struct FeedEncoder {
    datasource: String,
    feed_type: FeedType,
}

impl Default for FeedEncoder {
    fn default() -> Self {
        Self::new("GSA_Commiter")
    }
}

impl FeedEncoder {
    /// Create an encoder announcing the given data source
    pub fn new(datasource: impl Into<String>) -> Self {
        Self {
            datasource: datasource.into(),
            feed_type: FeedType::Full,
        }
    }

    /// Data source written to the feed header
    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    /// Feed type written to the feed header
    pub fn feed_type(&self) -> FeedType {
        self.feed_type
    }

    /// Encode a batch into `sink` and return how many operations of each kind were written
    ///
    /// Operations are written in iteration order. The sink is flushed after
    /// every operation so large batches never pile up in a buffer and write
    /// failures surface at the operation that caused them. Each add operation's
    /// content stream is read to the end before the next operation starts.
    ///
    /// An empty batch yields a complete document with an empty `group`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The sink rejects a write or flush
    /// - A content stream fails while being read
    /// - An add operation has no `mimetype` or `last-modified` metadata
    ///
    /// On error the sink holds a truncated document and must be discarded.
    pub fn encode<I, W>(&self, batch: I, sink: W) -> Result<OperationStats, EncodingError>
    where
        I: IntoIterator<Item = Operation>,
        W: Write,
    {
        let mut writer = Writer::new(sink);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;
        writer.write_event(Event::Start(BytesStart::new("gsafeed")))?;
        self.write_header(&mut writer)?;
        writer.write_event(Event::Start(BytesStart::new("group")))?;

        let mut stats = OperationStats::default();
        // allocated on the first record, reused for every following one
        let mut buffer = Vec::new();

        for op in batch {
            let kind = op.kind();
            match op {
                Operation::Add(add) => write_record(&mut writer, add, &mut buffer)?,
                Operation::Delete(delete) => write_remove(&mut writer, &delete)?,
            }
            stats.record(kind);
            writer.get_mut().flush()?;
        }

        writer.write_event(Event::End(BytesEnd::new("group")))?;
        writer.write_event(Event::End(BytesEnd::new("gsafeed")))?;
        writer.get_mut().flush()?;

        debug!(
            added = stats.added,
            removed = stats.removed,
            datasource = %self.datasource,
            "feed document encoded"
        );

        Ok(stats)
    }

    fn write_header<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), EncodingError> {
        writer.write_event(Event::Start(BytesStart::new("header")))?;
        write_text_element(writer, "datasource", &self.datasource)?;
        write_text_element(writer, "feedtype", self.feed_type.as_str())?;
        writer.write_event(Event::End(BytesEnd::new("header")))?;
        Ok(())
    }
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<(), EncodingError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&text::sanitize(value))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn required_field<'a>(op: &'a AddOperation, field: &'static str) -> Result<&'a str, EncodingError> {
    op.field(field).ok_or_else(|| EncodingError::MissingMetadata {
        reference: op.reference.clone(),
        field,
    })
}

fn write_record<W: Write>(
    writer: &mut Writer<W>,
    mut op: AddOperation,
    buffer: &mut Vec<u8>,
) -> Result<(), EncodingError> {
    let url = op.field(FIELD_URL).unwrap_or(op.reference.as_str());
    let mimetype = required_field(&op, FIELD_MIMETYPE)?;
    let last_modified = required_field(&op, FIELD_LAST_MODIFIED)?;

    // attribute order is part of the wire format
    let mut record = BytesStart::new("record");
    record.push_attribute(("url", &*text::sanitize(url)));
    record.push_attribute(("mimetype", &*text::sanitize(mimetype)));
    record.push_attribute(("last-modified", &*text::sanitize(last_modified)));
    writer.write_event(Event::Start(record))?;

    if buffer.is_empty() {
        buffer.resize(CONTENT_BUFFER_SIZE, 0);
    }

    writer.write_event(Event::Start(BytesStart::new("content")))?;
    write_content(writer, &op.reference, &mut op.content, buffer)?;
    writer.write_event(Event::End(BytesEnd::new("content")))?;

    writer.write_event(Event::End(BytesEnd::new("record")))?;
    Ok(())
}

fn write_remove<W: Write>(
    writer: &mut Writer<W>,
    op: &DeleteOperation,
) -> Result<(), EncodingError> {
    write_text_element(writer, "remove", &op.reference)
}

/// Copy a content stream into the current element as character data
fn write_content<W: Write>(
    writer: &mut Writer<W>,
    reference: &str,
    content: &mut dyn Read,
    buffer: &mut [u8],
) -> Result<(), EncodingError> {
    let mut carried = 0;
    let mut replaced = false;

    loop {
        let read = match content.read(&mut buffer[carried..]) {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(EncodingError::ContentRead {
                    reference: reference.to_string(),
                    source,
                });
            }
        };
        if read == 0 {
            break;
        }

        let filled = carried + read;
        let complete = filled - text::incomplete_suffix_len(&buffer[..filled]);
        replaced |= write_chunk(writer, &buffer[..complete])?;

        buffer.copy_within(complete..filled, 0);
        carried = filled - complete;
    }

    // a sequence still open at end of stream is invalid, decode it lossily
    replaced |= write_chunk(writer, &buffer[..carried])?;

    if replaced {
        warn!(
            reference = %reference,
            "document content is not valid UTF-8, invalid bytes were replaced"
        );
    }
    Ok(())
}

/// Write one decoded chunk, returning whether invalid UTF-8 had to be replaced
fn write_chunk<W: Write>(writer: &mut Writer<W>, bytes: &[u8]) -> Result<bool, EncodingError> {
    if bytes.is_empty() {
        return Ok(false);
    }
    let decoded = String::from_utf8_lossy(bytes);
    let replaced = matches!(decoded, Cow::Owned(_));
    writer.write_event(Event::Text(BytesText::new(&text::sanitize(&decoded))))?;
    Ok(replaced)
}
