//! Streaming backup document parser and handler dispatch.
//!
//! A backup document is a single root element wrapping a flat sequence of
//! record elements. Each record is decoded into `(kind, ordered attributes)`
//! where nested child elements holding only text are folded into the
//! attribute map under the child's tag name (long text fields are stored
//! this way by the exporter). Completed records are dispatched to every
//! registered [`EntityHandler`] in registration order.
//!
//! The parse is forward-only and single-threaded; a handler error aborts
//! the whole traversal with that error. Handlers signal recoverable
//! per-record problems through their own result accumulators, never by
//! returning an error here.

pub mod writer;

use crate::error::{ImportError, Result};
use crate::progress::EntityCountProgress;
use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Ordered attribute map of a decoded record.
pub type Attributes = IndexMap<String, String>;

/// Receiver of decoded records.
///
/// Implementations cover all four pass families: partitioners, mapper
/// builders, validators and persisters.
pub trait EntityHandler {
    /// Called once before the first record of a traversal.
    fn start_document(&mut self) -> Result<()> {
        Ok(())
    }

    /// Handle one completed record.
    ///
    /// # Errors
    ///
    /// Returns an error only for structural problems (malformed record);
    /// this aborts the whole parse.
    fn handle_entity(&mut self, kind: &str, attributes: &Attributes) -> Result<()>;

    /// Called once after the last record of a traversal.
    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Ordered fan-out of one parse to many handlers, with optional progress.
#[derive(Default)]
pub struct ChainedHandler<'a> {
    handlers: Vec<&'a mut dyn EntityHandler>,
    progress: Option<EntityCountProgress>,
    entities_seen: u64,
}

impl<'a> ChainedHandler<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a progress processor that is ticked once per record.
    #[must_use]
    pub fn with_progress(progress: EntityCountProgress) -> Self {
        Self {
            handlers: Vec::new(),
            progress: Some(progress),
            entities_seen: 0,
        }
    }

    /// Register a handler. Handlers run in registration order.
    pub fn register(&mut self, handler: &'a mut dyn EntityHandler) {
        self.handlers.push(handler);
    }

    /// Records dispatched so far in this traversal.
    #[must_use]
    pub fn entities_seen(&self) -> u64 {
        self.entities_seen
    }

    fn start_document(&mut self) -> Result<()> {
        self.entities_seen = 0;
        for handler in &mut self.handlers {
            handler.start_document()?;
        }
        Ok(())
    }

    fn handle_entity(&mut self, kind: &str, attributes: &Attributes) -> Result<()> {
        self.entities_seen += 1;
        if let Some(progress) = &mut self.progress {
            progress.process(kind, self.entities_seen);
        }
        for handler in &mut self.handlers {
            handler.handle_entity(kind, attributes)?;
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        for handler in &mut self.handlers {
            handler.end_document()?;
        }
        Ok(())
    }
}

/// Summary of one parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Encoding label declared in the XML header, if any.
    pub encoding: Option<String>,
    /// Number of records dispatched.
    pub records: u64,
}

/// Streaming parser for backup documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackupXmlParser;

impl BackupXmlParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse the document at `path`, dispatching records to `chain`.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures, malformed XML (unbalanced tags,
    /// non-text content nested below a record, EOF mid-record) or the first
    /// error returned by a handler.
    pub fn parse_file(&self, path: &Path, chain: &mut ChainedHandler<'_>) -> Result<DocumentInfo> {
        let file = File::open(path)?;
        self.parse(BufReader::with_capacity(1 << 20, file), chain)
    }

    /// Parse a document from any buffered reader. See [`Self::parse_file`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::parse_file`].
    #[allow(clippy::too_many_lines)]
    pub fn parse<R: BufRead>(&self, source: R, chain: &mut ChainedHandler<'_>) -> Result<DocumentInfo> {
        let mut reader = Reader::from_reader(source);
        let mut buf = Vec::new();

        let mut info = DocumentInfo::default();
        let mut root_open = false;
        let mut root_closed = false;
        // (kind, attributes) of the record currently being assembled.
        let mut record: Option<(String, Attributes)> = None;
        // (field name, accumulated text) of the nested element currently open.
        let mut field: Option<(String, String)> = None;

        chain.start_document()?;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Decl(decl) => {
                    if let Some(encoding) = decl.encoding() {
                        let encoding = encoding.map_err(quick_xml::Error::from)?;
                        info.encoding = Some(String::from_utf8_lossy(&encoding).into_owned());
                    }
                }
                Event::Start(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    if !root_open {
                        if root_closed {
                            return Err(ImportError::parse(
                                name,
                                "content found after the document root was closed",
                            ));
                        }
                        root_open = true;
                    } else if record.is_none() {
                        record = Some((name, decode_attributes(&start)?));
                    } else if field.is_none() {
                        field = Some((name, String::new()));
                    } else {
                        let kind = record.as_ref().map_or_else(String::new, |(k, _)| k.clone());
                        return Err(ImportError::parse(
                            kind,
                            format!("unexpected nested element '{name}' below a record field"),
                        ));
                    }
                }
                Event::Empty(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    if !root_open {
                        return Err(ImportError::parse(
                            name,
                            "record found before the document root was opened",
                        ));
                    }
                    if let Some((_, attributes)) = &mut record {
                        // An empty child element folds in as an empty field.
                        attributes.insert(name, String::new());
                    } else {
                        let attributes = decode_attributes(&start)?;
                        chain.handle_entity(&name, &attributes)?;
                        info.records += 1;
                    }
                }
                Event::Text(text) => {
                    if let Some((_, value)) = &mut field {
                        value.push_str(&text.unescape()?);
                    }
                    // Whitespace between elements is ignored.
                }
                Event::CData(cdata) => {
                    if let Some((_, value)) = &mut field {
                        value.push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                    }
                }
                Event::End(_) => {
                    if let Some((name, value)) = field.take() {
                        // Mismatched end tags are already rejected by the
                        // reader, so this close belongs to the open field.
                        if let Some((_, attributes)) = &mut record {
                            attributes.insert(name, value);
                        }
                    } else if let Some((kind, attributes)) = record.take() {
                        chain.handle_entity(&kind, &attributes)?;
                        info.records += 1;
                    } else {
                        root_open = false;
                        root_closed = true;
                    }
                }
                Event::Eof => break,
                // Comments, processing instructions and doctype are skipped.
                _ => {}
            }
            buf.clear();
        }

        if record.is_some() || field.is_some() {
            return Err(ImportError::parse(
                "document",
                "the document ended in the middle of a record",
            ));
        }
        if root_open {
            return Err(ImportError::parse(
                "document",
                "the document ended before the root element was closed",
            ));
        }

        chain.end_document()?;
        Ok(info)
    }
}

fn decode_attributes(start: &quick_xml::events::BytesStart<'_>) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}
