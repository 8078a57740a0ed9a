//! Writer for partitioned intermediate documents.
//!
//! Partitions are re-parsed by the same [`super::BackupXmlParser`], so the
//! writer emits exactly the shape the parser consumes: a fixed XML header
//! with the source document's encoding label, a single root wrapper, and
//! one 4-space-indented record per line. Attribute order is preserved from
//! the source record and values are never altered; a value containing an
//! embedded newline is emitted as a CDATA-wrapped child element instead of
//! an attribute.

use crate::error::Result;
use crate::xml::Attributes;
use std::io::Write;

/// Root wrapper element of backup and partition documents.
pub const ROOT_ELEMENT: &str = "entity-engine-xml";

const INDENT: &str = "    ";

/// Streaming writer producing one partition document.
pub struct PartitionWriter<W: Write> {
    out: W,
    encoding: String,
    entity_count: u64,
}

impl<W: Write> PartitionWriter<W> {
    /// A writer that labels its header with `encoding` (the label is copied
    /// verbatim from the source document).
    pub fn new(out: W, encoding: impl Into<String>) -> Self {
        Self {
            out,
            encoding: encoding.into(),
            entity_count: 0,
        }
    }

    /// Write the XML header and open the root wrapper.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn start_document(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "<?xml version=\"1.0\" encoding=\"{}\"?>",
            self.encoding
        )?;
        writeln!(self.out, "<{ROOT_ELEMENT}>")?;
        Ok(())
    }

    /// Re-emit one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn write_record(&mut self, kind: &str, attributes: &Attributes) -> Result<()> {
        let (short, long): (Vec<_>, Vec<_>) = attributes
            .iter()
            .partition(|(_, value)| !value.contains('\n'));

        write!(self.out, "{INDENT}<{kind}")?;
        for (name, value) in short {
            write!(self.out, " {name}=\"{}\"", escape_attribute(value))?;
        }

        if long.is_empty() {
            writeln!(self.out, "/>")?;
        } else {
            writeln!(self.out, ">")?;
            for (name, value) in long {
                writeln!(
                    self.out,
                    "{INDENT}{INDENT}<{name}><![CDATA[{}]]></{name}>",
                    escape_cdata(value)
                )?;
            }
            writeln!(self.out, "{INDENT}</{kind}>")?;
        }

        self.entity_count += 1;
        Ok(())
    }

    /// Close the root wrapper and flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn end_document(&mut self) -> Result<()> {
        writeln!(self.out, "</{ROOT_ELEMENT}>")?;
        self.out.flush()?;
        Ok(())
    }

    /// Number of records written so far.
    #[must_use]
    pub fn entity_count(&self) -> u64 {
        self.entity_count
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// A literal "]]>" inside the value would terminate the CDATA section early.
fn escape_cdata(value: &str) -> String {
    value.replace("]]>", "]]]]><![CDATA[>")
}
