//! Turns markup into a depth-first sequence of open/text/close events.
//!
//! HTML is handed to `scraper` (html5ever), which recovers from anything a
//! browser would recover from; the resulting tree is then flattened. XHTML is
//! read with `quick_xml`, keeping XML's rules for names, entities and CDATA,
//! but repairing bad nesting the way an HTML parser would. Only input that
//! cannot be tokenized at all (an unterminated tag, comment or CDATA section,
//! or no element whatsoever) is rejected.

use std::borrow::Cow;

use indexmap::IndexMap;
use log::trace;
use quick_xml::Reader;
use quick_xml::escape::{escape, partial_escape, unescape};
use quick_xml::events::{BytesStart, Event as XmlEvent};
use scraper::{ElementRef, Html};

use crate::Error;
use crate::options::ContentType;

/// Attributes of an element, in source order.
pub type Attributes = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open { name: String, attributes: Attributes },
    Text(String),
    Close { name: String },
}

/// A fully tokenized document.
///
/// Every `Open` event is matched by exactly one `Close` event, so the text or
/// markup inside an element is available as soon as the element is opened.
#[derive(Debug)]
pub struct Document {
    events: Vec<Event>,
    // for an `Open` at index i, the index of its `Close`
    closes: Vec<usize>,
    html: bool,
}

pub fn tokenize(input: &str, content_type: ContentType) -> Result<Document, Error> {
    let events = match content_type {
        ContentType::Html => walk_html(input),
        ContentType::Xhtml => walk_xhtml(input)?,
    };

    Document::new(events, content_type == ContentType::Html)
}

impl Document {
    fn new(events: Vec<Event>, html: bool) -> Result<Self, Error> {
        let mut closes: Vec<usize> = (0..events.len()).collect();
        let mut open = Vec::new();
        for (ix, event) in events.iter().enumerate() {
            match event {
                Event::Open { .. } => open.push(ix),
                Event::Close { name } => {
                    let start = open.pop().ok_or_else(|| {
                        Error::Internal(format!("close event for <{name}> without open event"))
                    })?;
                    closes[start] = ix;
                }
                Event::Text(_) => {}
            }
        }

        if !open.is_empty() {
            return Err(Error::Internal(format!(
                "{} element(s) left open by the tokenizer",
                open.len()
            )));
        }

        Ok(Self {
            events,
            closes,
            html,
        })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The index of the `Close` event matching the `Open` event at `open`.
    pub fn close_of(&self, open: usize) -> usize {
        self.closes[open]
    }

    /// The concatenation of all descendant text of the element opened at `open`.
    pub fn text_content(&self, open: usize) -> String {
        self.events[open + 1..self.close_of(open)]
            .iter()
            .filter_map(|e| match e {
                Event::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The serialized markup of all descendants of the element opened at `open`.
    pub fn inner_markup(&self, open: usize) -> String {
        let mut out = String::new();
        for event in &self.events[open + 1..self.close_of(open)] {
            match event {
                Event::Open { name, attributes } => {
                    out.push('<');
                    out.push_str(name);
                    for (attr, value) in attributes {
                        out.push(' ');
                        out.push_str(attr);
                        out.push_str("=\"");
                        out.push_str(&escape(value.as_str()));
                        out.push('"');
                    }
                    out.push('>');
                }
                Event::Text(text) => out.push_str(&partial_escape(text.as_str())),
                Event::Close { name } => {
                    if !(self.html && is_void_element(name)) {
                        out.push_str("</");
                        out.push_str(name);
                        out.push('>');
                    }
                }
            }
        }
        out
    }

    /// The `href` of the first `<base>` element, if any.
    pub fn base_href(&self) -> Option<&str> {
        self.events.iter().find_map(|e| match e {
            Event::Open { name, attributes } if name == "base" => {
                attributes.get("href").map(String::as_str)
            }
            _ => None,
        })
    }
}

fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn walk_html(input: &str) -> Vec<Event> {
    let doc = Html::parse_document(input);
    for err in doc.errors.iter() {
        trace!("html recovered from: {err}");
    }

    enum Step<'a> {
        Enter(ElementRef<'a>),
        Text(&'a str),
        Exit(&'a str),
    }

    let mut events = Vec::new();
    let mut stack = vec![Step::Enter(doc.root_element())];
    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(element) => {
                let el = element.value();
                let attributes = el
                    .attrs
                    .iter()
                    .map(|(qn, value)| {
                        let local: &str = &qn.local;
                        let name = match qn.prefix.as_deref() {
                            Some(prefix) => format!("{prefix}:{local}"),
                            None => local.to_string(),
                        };
                        (name, value.to_string())
                    })
                    .collect();

                events.push(Event::Open {
                    name: el.name().to_string(),
                    attributes,
                });
                stack.push(Step::Exit(el.name()));

                for child in element.children().rev() {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        stack.push(Step::Enter(child_el));
                    } else if let Some(text) = child.value().as_text() {
                        stack.push(Step::Text(&text.text));
                    }
                }
            }
            Step::Text(text) => events.push(Event::Text(text.to_string())),
            Step::Exit(name) => events.push(Event::Close {
                name: name.to_string(),
            }),
        }
    }

    events
}

fn walk_xhtml(input: &str) -> Result<Vec<Event>, Error> {
    // a leading byte order mark is not content
    let mut reader = Reader::from_str(input.strip_prefix('\u{FEFF}').unwrap_or(input));
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut walker = XhtmlWalker::default();
    loop {
        let event = reader.read_event().map_err(|err| Error::Markup {
            offset: offset(reader.error_position()),
            message: err.to_string(),
        })?;

        match event {
            XmlEvent::Start(start) => {
                let (name, attributes) = element(&reader, &start)?;
                walker.open(name, attributes);
            }
            XmlEvent::Empty(start) => {
                let (name, attributes) = element(&reader, &start)?;
                walker.empty(name, attributes);
            }
            XmlEvent::End(end) => {
                let end_name = end.name();
                let name = reader
                    .decoder()
                    .decode(end_name.as_ref())
                    .map_err(|err| markup_error(&reader, err))?;
                walker.close(&name);
            }
            XmlEvent::Text(text) => {
                let text = text.decode().map_err(|err| markup_error(&reader, err))?;
                walker.text(&text);
            }
            XmlEvent::CData(cdata) => {
                let text = reader
                    .decoder()
                    .decode(&cdata)
                    .map_err(|err| markup_error(&reader, err))?;
                walker.text(&text);
            }
            XmlEvent::GeneralRef(reference) => {
                let name = reference.decode().map_err(|err| markup_error(&reader, err))?;
                let entity = format!("&{name};");
                // unknown named references stay as written
                let resolved = unescape(&entity).map(Cow::into_owned);
                walker.text(&resolved.unwrap_or(entity));
            }
            XmlEvent::Eof => break,
            // declarations, processing instructions, doctype, comments
            _ => {}
        }
    }

    walker.finish(offset(reader.buffer_position()))
}

fn offset(position: impl TryInto<usize>) -> usize {
    position.try_into().unwrap_or(usize::MAX)
}

fn markup_error(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> Error {
    Error::Markup {
        offset: offset(reader.buffer_position()),
        message: err.to_string(),
    }
}

fn element(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<(String, Attributes), Error> {
    let decoder = reader.decoder();
    let name = decoder
        .decode(start.name().as_ref())
        .map_err(|err| markup_error(reader, err))?
        .into_owned();

    // HTML-style attributes: `inlist` needs no value
    let mut attributes = Attributes::new();
    for attr in start.html_attributes().with_checks(false) {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                trace!("<{name}>: skipping attribute ({err})");
                continue;
            }
        };

        let key = decoder
            .decode(attr.key.as_ref())
            .map_err(|err| markup_error(reader, err))?
            .into_owned();
        let raw = decoder
            .decode(&attr.value)
            .map_err(|err| markup_error(reader, err))?;

        // literal whitespace is normalized before references are expanded,
        // so `&#10;` survives as a newline
        let normalized = raw.replace(['\t', '\n', '\r'], " ");
        let value = unescape(&normalized)
            .map(Cow::into_owned)
            .unwrap_or_else(|err| {
                trace!("<{name} {key}>: keeping value undecoded ({err})");
                normalized.clone()
            });

        // the first occurrence of a duplicated attribute wins
        attributes.entry(key).or_insert(value);
    }

    Ok((name, attributes))
}

/// Rebuilds a balanced element sequence from XML events.
///
/// An end tag closes every element opened after its match; an end tag
/// with no match is dropped; whatever is open at the end of input is closed.
#[derive(Default)]
struct XhtmlWalker {
    events: Vec<Event>,
    open: Vec<String>,
    seen_root: bool,
}

impl XhtmlWalker {
    fn open(&mut self, name: String, attributes: Attributes) {
        self.seen_root = true;
        self.open.push(name.clone());
        self.events.push(Event::Open { name, attributes });
    }

    fn empty(&mut self, name: String, attributes: Attributes) {
        self.seen_root = true;
        self.events.push(Event::Open {
            name: name.clone(),
            attributes,
        });
        self.events.push(Event::Close { name });
    }

    fn close(&mut self, name: &str) {
        let Some(ix) = self.open.iter().rposition(|open| open == name) else {
            trace!("ignoring stray end tag </{name}>");
            return;
        };

        for open in self.open.drain(ix..).rev() {
            if open != name {
                trace!("<{open}> closed implicitly by </{name}>");
            }
            self.events.push(Event::Close { name: open });
        }
    }

    fn text(&mut self, text: &str) {
        if self.open.is_empty() {
            if !text.trim().is_empty() {
                trace!("ignoring text outside of an element");
            }
            return;
        }

        if text.is_empty() {
            return;
        }

        match self.events.last_mut() {
            Some(Event::Text(previous)) => previous.push_str(text),
            _ => self.events.push(Event::Text(text.to_string())),
        }
    }

    fn finish(mut self, offset: usize) -> Result<Vec<Event>, Error> {
        if !self.seen_root {
            return Err(Error::Markup {
                offset,
                message: "document has no root element".to_string(),
            });
        }

        for open in self.open.drain(..).rev() {
            trace!("<{open}> closed at end of input");
            self.events.push(Event::Close { name: open });
        }

        Ok(self.events)
    }
}
