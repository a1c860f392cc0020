//! Extracts RDF quads from HTML and XHTML documents annotated with RDFa 1.1.
//!
//! Quads are delivered while the document is walked, in document order,
//! rather than collected into a graph first. [`extract`] hands them to a
//! closure; [`boundary`] wraps the same processing for embedding hosts that
//! need plain-record terms and a result value instead of errors.
//!
//! ```
//! use oxiri::Iri;
//! use rdfa_extract::{ParserOptions, extract};
//!
//! let html = r##"<p prefix="foaf: http://xmlns.com/foaf/0.1/"
//!                  about="#me" property="foaf:name">Alice</p>"##;
//! let mut quads = Vec::new();
//! extract(
//!     html,
//!     Iri::parse("http://example.com/".to_string()).unwrap(),
//!     &ParserOptions::default(),
//!     |quad| quads.push(quad),
//! )
//! .unwrap();
//!
//! assert_eq!(
//!     quads[0].to_string(),
//!     r#"<http://example.com/#me> <http://xmlns.com/foaf/0.1/name> "Alice""#
//! );
//! ```

use oxiri::Iri;
use oxrdf::{Graph, Quad};

pub mod boundary;
pub mod codec;
mod context;
mod lists;
mod markup;
pub mod model;
pub mod options;
mod processor;

pub use boundary::{
    BoundaryQuad, BoundaryTerm, CancellationSignal, Extractor, ParseOutcome, QuadSink,
    SinkError, TermKind, parse,
};
pub use context::{Advisory, initial_context_prefixes, initial_context_terms};
pub use options::{ContentType, ListStyle, ParserOptions, UnsupportedContentType};
pub use processor::Output;

#[derive(derive_more::Error, derive_more::Display, derive_more::From, Debug)]
pub enum Error {
    #[display("IRI parse error: `{iri}`")]
    IriParseError {
        source: oxiri::IriParseError,
        iri: String,
    },

    #[display("{_0}")]
    UnsupportedContentType(UnsupportedContentType),

    #[display("malformed markup at byte {offset}: {message}")]
    #[from(skip)]
    Markup { offset: usize, message: String },

    #[display("parse cancelled")]
    #[from(skip)]
    Cancelled,

    #[display("internal error: {_0}")]
    #[from(skip)]
    Internal(#[error(not(source))] String),
}

/// Extracts quads from `input`, passing each to `emit` as soon as it is known.
///
/// `base` is used for relative IRIs unless the document declares its own
/// (`<base href>`, or `xml:base` in XHTML). If this fails part-way, the
/// quads already passed to `emit` stay valid.
pub fn extract(
    input: &str,
    base: Iri<String>,
    options: &ParserOptions,
    mut emit: impl FnMut(Quad),
) -> Result<(), Error> {
    extract_with(input, base, options, &mut emit, &CancellationSignal::new())
}

/// Extracts quads into a graph.
pub fn extract_graph(
    input: &str,
    base: Iri<String>,
    options: &ParserOptions,
) -> Result<Graph, Error> {
    let mut graph = Graph::new();
    extract_with(input, base, options, &mut graph, &CancellationSignal::new())?;
    Ok(graph)
}

/// Extracts quads into any [`Output`], stopping between events once `cancel` is raised.
pub fn extract_with(
    input: &str,
    base: Iri<String>,
    options: &ParserOptions,
    output: &mut dyn Output,
    cancel: &CancellationSignal,
) -> Result<(), Error> {
    let document = markup::tokenize(input, options.content_type)?;

    let base = match document.base_href() {
        Some(href) => match base.resolve(href) {
            Ok(resolved) => resolved,
            Err(err) => {
                output.advisory(
                    Advisory::Warning,
                    format!("Invalid <base href=\"{href}\">: {err}"),
                );
                base
            }
        },
        None => base,
    };

    let host = context::host_for(options.content_type);
    processor::RDFaProcessor::new(output, options, host).run(&document, base, cancel)
}
