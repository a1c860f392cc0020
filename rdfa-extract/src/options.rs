//! Options that control a single parse.

use std::fmt;
use std::str::FromStr;

/// The media type of the document being parsed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ContentType {
    /// `text/html`: parsed permissively, the way a browser would.
    #[default]
    Html,
    /// `application/xhtml+xml`: parsed as XML, with nesting errors repaired.
    Xhtml,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Html => "text/html",
            ContentType::Xhtml => "application/xhtml+xml",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
#[display("unsupported content type: `{_0}`")]
pub struct UnsupportedContentType(#[error(not(source))] pub String);

impl FromStr for ContentType {
    type Err = UnsupportedContentType;

    /// Accepts a media type with optional parameters, e.g. `text/html; charset=utf-8`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let essence = s.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case("text/html") {
            Ok(ContentType::Html)
        } else if essence.eq_ignore_ascii_case("application/xhtml+xml") {
            Ok(ContentType::Xhtml)
        } else {
            Err(UnsupportedContentType(s.to_string()))
        }
    }
}

/// How list mappings (`@inlist`) are turned into quads when they are flushed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ListStyle {
    /// One `(subject, predicate, member)` quad per member, in document order.
    /// An empty list produces `(subject, predicate, rdf:nil)`.
    #[default]
    Members,
    /// An `rdf:first`/`rdf:rest` collection of fresh blank nodes.
    Collection,
}

impl FromStr for ListStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "members" => Ok(ListStyle::Members),
            "collection" => Ok(ListStyle::Collection),
            other => Err(format!("unknown list style `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParserOptions {
    pub content_type: ContentType,
    pub list_style: ListStyle,
    /// Generate `xhv:role` triples for `@role` attributes.
    pub role_attribute: bool,
    /// Type `@datetime` (and `<time>`) values as xsd date/time literals.
    pub datetime_typing: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            content_type: ContentType::Html,
            list_style: ListStyle::Members,
            role_attribute: true,
            datetime_typing: true,
        }
    }
}

impl ParserOptions {
    pub fn for_content_type(content_type: ContentType) -> Self {
        Self {
            content_type,
            ..Default::default()
        }
    }

    pub fn with_list_style(self, list_style: ListStyle) -> Self {
        Self { list_style, ..self }
    }
}
