//! Items XML serializer.
//!
//! Produces the canonical bulk-load document:
//!
//! ```text
//! <?xml version="1.0" encoding="utf-8"?>
//! <items>
//!   <item id="0_5" class="Company" implements="">
//!     <attribute name="name" value="UberCorp"/>
//!     <collection name="departments">
//!       <reference ref_id="0_0"/>
//!       <reference ref_id="0_1"/>
//!     </collection>
//!   </item>
//! </items>
//! ```
//!
//! Each distinct item id is written once per writer. Referenced items are not
//! discovered: callers supply the full closure of items to write. An item is
//! rendered completely to a list of events before any of it reaches the sink,
//! so a failure never leaves half an element behind; items already written
//! stay written.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use tracing::{debug, info};

use crate::config::WriterConfig;
use crate::errors::{ItemXmlError, ItemXmlResult};
use crate::item::Item;
use crate::models::{ItemId, ItemRef, ItemSet, Value};
use crate::schema::{FieldKind, ID_FIELD};

const ROOT_TAG: &str = "items";
const INDENT_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Open,
}

// ---------------------------------------------------------------------------
// Text checks
// ---------------------------------------------------------------------------

/// The `Char` production of XML 1.0.
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Reject text no XML 1.0 document can carry, even escaped.
fn check_xml_text(field: &str, text: &str) -> ItemXmlResult<()> {
    match text.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(ItemXmlError::InvalidXmlChar {
            field: field.to_string(),
            codepoint: u32::from(c),
        }),
        None => Ok(()),
    }
}

/// Text written for a scalar; absent values are empty.
fn scalar_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::Str(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Streams items to a sink as items XML.
///
/// Call [`XmlWriter::begin`] once, write items, then [`XmlWriter::end`], which
/// closes the root element and hands the flushed sink back. A writer dropped
/// part-way (for example after an error) drops its sink with it.
pub struct XmlWriter<W: Write> {
    writer: Writer<W>,
    config: WriterConfig,
    written: HashSet<ItemId>,
    state: State,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, WriterConfig::default())
    }

    pub fn with_config(sink: W, config: WriterConfig) -> Self {
        Self {
            writer: Writer::new_with_indent(sink, b' ', INDENT_SIZE),
            config,
            written: HashSet::new(),
            state: State::Fresh,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Number of distinct items written so far.
    pub fn written_count(&self) -> usize {
        self.written.len()
    }

    pub fn begin(&mut self) -> ItemXmlResult<()> {
        if self.state != State::Fresh {
            return Err(ItemXmlError::WriterState("begin called more than once"));
        }
        check_xml_text("prefix", &self.config.prefix)?;
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self.writer.write_event(Event::Start(BytesStart::new(ROOT_TAG)))?;
        self.state = State::Open;
        debug!(prefix = %self.config.prefix, "Began items document");
        Ok(())
    }

    /// Write one item, unless an item with the same id was already written.
    pub fn write_item(&mut self, item: &Item) -> ItemXmlResult<()> {
        if self.state != State::Open {
            return Err(ItemXmlError::WriterState("write_item called before begin"));
        }
        if self.written.contains(&item.id()) {
            debug!(item = item.id(), "Skipping already written item");
            return Ok(());
        }
        let mut events = Vec::with_capacity(8);
        self.render_item(item, &mut events)?;
        for event in events {
            self.writer.write_event(event)?;
        }
        self.written.insert(item.id());
        Ok(())
    }

    pub fn write_items<'a, I>(&mut self, items: I) -> ItemXmlResult<()>
    where
        I: IntoIterator<Item = &'a Item>,
    {
        for item in items {
            self.write_item(item)?;
        }
        Ok(())
    }

    /// Close the root element, flush, and return the sink.
    pub fn end(mut self) -> ItemXmlResult<W> {
        if self.state != State::Open {
            return Err(ItemXmlError::WriterState("end called before begin"));
        }
        self.writer.write_event(Event::End(BytesEnd::new(ROOT_TAG)))?;
        let mut sink = self.writer.into_inner();
        sink.write_all(b"\n")?;
        sink.flush()?;
        info!(items = self.written.len(), "Finished items document");
        Ok(sink)
    }

    // -- rendering -----------------------------------------------------------

    fn prefixed(&self, id: ItemId) -> String {
        format!("{}{}", self.config.prefix, id)
    }

    fn render_item(&self, item: &Item, out: &mut Vec<Event<'static>>) -> ItemXmlResult<()> {
        let class = item.classname()?.unwrap_or("");
        let implements = item.implements()?.join(" ");

        let mut body = Vec::new();
        for (name, value) in item.properties() {
            if name != ID_FIELD {
                self.render_property(item, name, value, &mut body)?;
            }
        }

        let mut start = BytesStart::new("item");
        start.push_attribute(("id", self.prefixed(item.id()).as_str()));
        start.push_attribute(("class", class));
        start.push_attribute(("implements", implements.as_str()));
        if body.is_empty() {
            out.push(Event::Empty(start));
        } else {
            out.push(Event::Start(start));
            out.append(&mut body);
            out.push(Event::End(BytesEnd::new("item")));
        }
        Ok(())
    }

    fn render_property(
        &self,
        item: &Item,
        name: &str,
        value: &Value,
        out: &mut Vec<Event<'static>>,
    ) -> ItemXmlResult<()> {
        let kind = item.get_field_descriptor(name)?.kind;
        check_xml_text(name, name)?;
        if value.is_null() {
            if !self.config.allow_none {
                return Err(ItemXmlError::EmptyValue(name.to_string()));
            }
            debug!(item = item.id(), field = name, "Writing empty value");
            match kind {
                FieldKind::Attribute => out.push(self.render_attribute(name, "")),
                // Nothing to point at.
                FieldKind::Reference => {}
                FieldKind::Collection => self.render_collection(name, &ItemSet::new(), out),
            }
            return Ok(());
        }

        item.validate_property(name, value)?;
        match value {
            Value::Item(target) => out.push(self.render_reference(Some(name), target)),
            Value::Items(members) => self.render_collection(name, members, out),
            scalar => {
                let text = scalar_text(scalar);
                check_xml_text(name, &text)?;
                out.push(self.render_attribute(name, &text));
            }
        }
        Ok(())
    }

    fn render_attribute(&self, name: &str, text: &str) -> Event<'static> {
        let mut element = BytesStart::new("attribute");
        element.push_attribute(("name", name));
        element.push_attribute(("value", text));
        Event::Empty(element)
    }

    fn render_reference(&self, name: Option<&str>, target: &ItemRef) -> Event<'static> {
        let mut element = BytesStart::new("reference");
        if let Some(name) = name {
            element.push_attribute(("name", name));
        }
        element.push_attribute(("ref_id", self.prefixed(target.id()).as_str()));
        Event::Empty(element)
    }

    fn render_collection(&self, name: &str, members: &ItemSet, out: &mut Vec<Event<'static>>) {
        let mut element = BytesStart::new("collection");
        element.push_attribute(("name", name));
        if members.is_empty() {
            out.push(Event::Empty(element));
            return;
        }
        out.push(Event::Start(element));
        out.extend(members.iter().map(|member| self.render_reference(None, member)));
        out.push(Event::End(BytesEnd::new("collection")));
    }
}

// ---------------------------------------------------------------------------
// Whole-document helpers
// ---------------------------------------------------------------------------

/// Write `items` as a complete document to `sink` and return the sink.
pub fn write_document<'a, I, W>(items: I, sink: W, config: &WriterConfig) -> ItemXmlResult<W>
where
    I: IntoIterator<Item = &'a Item>,
    W: Write,
{
    let mut writer = XmlWriter::with_config(sink, config.clone());
    writer.begin()?;
    writer.write_items(items)?;
    writer.end()
}

/// Write `items` to the file at `path`, created or truncated, or to stdout
/// when no path is given. The file is closed on every exit path.
///
/// Output is not rolled back on failure: write to a temporary path and
/// rename it into place when a partial file must never be observed.
pub fn write_itemsxml<'a, I>(items: I, path: Option<&Path>, config: &WriterConfig) -> ItemXmlResult<()>
where
    I: IntoIterator<Item = &'a Item>,
{
    match path {
        Some(path) => {
            let file = File::create(path)?;
            let sink = write_document(items, BufWriter::new(file), config)?;
            drop(sink);
        }
        None => {
            let stdout = io::stdout();
            let sink = write_document(items, stdout.lock(), config)?;
            drop(sink);
        }
    }
    Ok(())
}
