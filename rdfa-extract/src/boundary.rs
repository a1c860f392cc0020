//! The surface handed to embedding hosts.
//!
//! Quads cross the boundary as plain records ([`BoundaryTerm`]) with no
//! identity beyond their fields. Delivery goes through a [`Scheduler`] whose
//! deferred tasks run immediately and in order, so a host without timers or
//! threads sees exactly one sink call per quad, before parsing moves on.
//!
//! Whatever happens inside, a parse ends in a [`ParseOutcome`].

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use oxiri::Iri;
use oxrdf::{BlankNode, GraphName, Literal, NamedNode, Quad, Subject, Term};
use serde::{Deserialize, Serialize};

use crate::context::Advisory;
use crate::options::{ContentType, ParserOptions};
use crate::processor::Output;
use crate::{Error, codec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermKind {
    NamedNode,
    BlankNode,
    Literal,
    DefaultGraph,
}

/// One term of a delivered quad.
///
/// Literals always carry their datatype IRI. Language-tagged literals also
/// carry `language` (their datatype is `rdf:langString`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundaryTerm {
    pub kind: TermKind,
    pub value: String,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

impl BoundaryTerm {
    fn plain(kind: TermKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    pub fn default_graph() -> Self {
        Self::plain(TermKind::DefaultGraph, "")
    }
}

impl From<&NamedNode> for BoundaryTerm {
    fn from(node: &NamedNode) -> Self {
        Self::plain(TermKind::NamedNode, node.as_str())
    }
}

impl From<&BlankNode> for BoundaryTerm {
    fn from(node: &BlankNode) -> Self {
        Self::plain(TermKind::BlankNode, node.as_str())
    }
}

impl From<&Literal> for BoundaryTerm {
    fn from(literal: &Literal) -> Self {
        Self {
            kind: TermKind::Literal,
            value: literal.value().to_string(),
            language: literal.language().map(str::to_string),
            datatype: Some(literal.datatype().as_str().to_string()),
        }
    }
}

impl From<&GraphName> for BoundaryTerm {
    fn from(graph: &GraphName) -> Self {
        match graph {
            GraphName::NamedNode(node) => node.into(),
            GraphName::BlankNode(node) => node.into(),
            GraphName::DefaultGraph => Self::default_graph(),
        }
    }
}

impl TryFrom<&Subject> for BoundaryTerm {
    type Error = Error;

    fn try_from(subject: &Subject) -> Result<Self, Self::Error> {
        match subject {
            Subject::NamedNode(node) => Ok(node.into()),
            Subject::BlankNode(node) => Ok(node.into()),
            #[allow(unreachable_patterns)]
            other => Err(Error::Internal(format!("unsupported subject: {other}"))),
        }
    }
}

impl TryFrom<&Term> for BoundaryTerm {
    type Error = Error;

    fn try_from(term: &Term) -> Result<Self, Self::Error> {
        match term {
            Term::NamedNode(node) => Ok(node.into()),
            Term::BlankNode(node) => Ok(node.into()),
            Term::Literal(literal) => Ok(literal.into()),
            #[allow(unreachable_patterns)]
            other => Err(Error::Internal(format!("unsupported object: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundaryQuad {
    pub subject: BoundaryTerm,
    pub predicate: BoundaryTerm,
    pub object: BoundaryTerm,
    pub graph: BoundaryTerm,
}

impl TryFrom<&Quad> for BoundaryQuad {
    type Error = Error;

    fn try_from(quad: &Quad) -> Result<Self, Self::Error> {
        Ok(Self {
            subject: (&quad.subject).try_into()?,
            predicate: (&quad.predicate).into(),
            object: (&quad.object).try_into()?,
            graph: (&quad.graph_name).into(),
        })
    }
}

/// A failure reported by a [`QuadSink`]. It is logged and otherwise ignored.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
#[display("{_0}")]
pub struct SinkError(#[error(not(source))] pub String);

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Consumer of delivered quads.
pub trait QuadSink {
    fn on_quad(
        &mut self,
        subject: BoundaryTerm,
        predicate: BoundaryTerm,
        object: BoundaryTerm,
        graph: BoundaryTerm,
    ) -> Result<(), SinkError>;
}

impl<F> QuadSink for F
where
    F: FnMut(BoundaryTerm, BoundaryTerm, BoundaryTerm, BoundaryTerm) -> Result<(), SinkError>,
{
    fn on_quad(
        &mut self,
        subject: BoundaryTerm,
        predicate: BoundaryTerm,
        object: BoundaryTerm,
        graph: BoundaryTerm,
    ) -> Result<(), SinkError> {
        self(subject, predicate, object, graph)
    }
}

impl QuadSink for Vec<BoundaryQuad> {
    fn on_quad(
        &mut self,
        subject: BoundaryTerm,
        predicate: BoundaryTerm,
        object: BoundaryTerm,
        graph: BoundaryTerm,
    ) -> Result<(), SinkError> {
        self.push(BoundaryQuad {
            subject,
            predicate,
            object,
            graph,
        });
        Ok(())
    }
}

/// A queue of deferred tasks with no notion of time.
///
/// "Deferring" only records the task; [`Scheduler::run_pending`] runs
/// everything queued, in registration order.
pub struct Scheduler<C> {
    queue: VecDeque<Box<dyn FnOnce(&mut C)>>,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

impl<C> Scheduler<C> {
    pub fn defer(&mut self, task: impl FnOnce(&mut C) + 'static) {
        self.queue.push_back(Box::new(task));
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Runs queued tasks until the queue is empty, returning how many ran.
    pub fn run_pending(&mut self, cx: &mut C) -> usize {
        let mut ran = 0;
        while let Some(task) = self.queue.pop_front() {
            task(cx);
            ran += 1;
        }
        ran
    }
}

/// A flag a host can raise to stop a parse between events.
///
/// Clones share the flag. Once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal(Arc<AtomicBool>);

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag. Returns `true` only for the call that raised it.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The result of a boundary parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParseOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<Result<(), Error>> for ParseOutcome {
    fn from(result: Result<(), Error>) -> Self {
        match result {
            Ok(()) => Self::succeeded(),
            Err(err) => Self::failed(err.to_string()),
        }
    }
}

struct Delivery<'s> {
    sink: &'s mut dyn QuadSink,
    delivered: usize,
    rejected: usize,
}

impl Delivery<'_> {
    fn deliver(&mut self, quad: BoundaryQuad) {
        let BoundaryQuad {
            subject,
            predicate,
            object,
            graph,
        } = quad;

        let sink = &mut *self.sink;
        match panic::catch_unwind(AssertUnwindSafe(|| {
            sink.on_quad(subject, predicate, object, graph)
        })) {
            Ok(Ok(())) => self.delivered += 1,
            Ok(Err(err)) => {
                self.rejected += 1;
                debug!("sink rejected quad: {err}");
            }
            Err(payload) => {
                self.rejected += 1;
                debug!("sink panicked: {}", panic_message(payload.as_ref()));
            }
        }
    }
}

// Adapts the processor's output to a sink.
struct BoundaryOutput<'s> {
    scheduler: Scheduler<Delivery<'s>>,
    delivery: Delivery<'s>,
}

impl<'s> BoundaryOutput<'s> {
    fn new(sink: &'s mut dyn QuadSink) -> Self {
        Self {
            scheduler: Scheduler::default(),
            delivery: Delivery {
                sink,
                delivered: 0,
                rejected: 0,
            },
        }
    }
}

impl Output for BoundaryOutput<'_> {
    fn quad(&mut self, quad: Quad) {
        match BoundaryQuad::try_from(&quad) {
            Ok(quad) => {
                self.scheduler.defer(move |delivery| delivery.deliver(quad));
                self.scheduler.run_pending(&mut self.delivery);
            }
            Err(err) => warn!("quad cannot cross the boundary: {err}"),
        }
    }

    fn advisory(&mut self, kind: Advisory, message: String) {
        debug!("suppressed {kind}: {message}");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Parses documents on behalf of a host.
///
/// An extractor is `Send` and runs one parse at a time; use one per thread
/// to parse concurrently.
#[derive(Debug, Default)]
pub struct Extractor {
    options: ParserOptions,
    // replaced once a parse finishes, so a cancelled parse does not
    // cancel the ones after it
    cancel: Mutex<CancellationSignal>,
}

impl Extractor {
    /// The content type of `options` is replaced by the one given to each parse.
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            cancel: Mutex::default(),
        }
    }

    fn signal(&self) -> MutexGuard<'_, CancellationSignal> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A handle that cancels the parse in progress, or the next one if none
    /// is running. Later parses are unaffected.
    pub fn cancellation(&self) -> CancellationSignal {
        self.signal().clone()
    }

    pub fn parse(
        &self,
        markup: &str,
        base_iri: &str,
        content_type: &str,
        sink: &mut impl QuadSink,
    ) -> ParseOutcome {
        let sink: &mut dyn QuadSink = sink;
        let cancel = self.signal().clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_parse(markup, base_iri, content_type, sink, &cancel)
        }))
        .unwrap_or_else(|payload| {
            Err(Error::Internal(panic_message(payload.as_ref()).to_string()))
        });
        *self.signal() = CancellationSignal::new();

        if let Err(err) = &result {
            warn!("parse of <{base_iri}> failed: {err}");
        }
        result.into()
    }

    /// Parses UTF-8 bytes.
    pub fn parse_bytes(
        &self,
        markup: &[u8],
        base_iri: &str,
        content_type: &str,
        sink: &mut impl QuadSink,
    ) -> ParseOutcome {
        self.parse(&codec::decode_to_string(markup), base_iri, content_type, sink)
    }

    /// Parses text given as UTF-16 code units.
    pub fn parse_host(
        &self,
        markup: &[u16],
        base_iri: &str,
        content_type: &str,
        sink: &mut impl QuadSink,
    ) -> ParseOutcome {
        self.parse_bytes(&codec::encode_utf8(markup), base_iri, content_type, sink)
    }

    fn try_parse(
        &self,
        markup: &str,
        base_iri: &str,
        content_type: &str,
        sink: &mut dyn QuadSink,
        cancel: &CancellationSignal,
    ) -> Result<(), Error> {
        let content_type: ContentType = content_type.parse()?;
        let base = Iri::parse(base_iri.to_string()).map_err(|source| Error::IriParseError {
            source,
            iri: base_iri.to_string(),
        })?;

        let options = ParserOptions {
            content_type,
            ..self.options.clone()
        };

        let mut output = BoundaryOutput::new(sink);
        let result = crate::extract_with(markup, base, &options, &mut output, cancel);
        debug!(
            "{} quad(s) delivered, {} rejected by the sink",
            output.delivery.delivered, output.delivery.rejected
        );
        result
    }
}

/// Parses `markup` with a fresh [`Extractor`].
pub fn parse(
    markup: &str,
    base_iri: &str,
    content_type: &str,
    sink: &mut impl QuadSink,
) -> ParseOutcome {
    Extractor::default().parse(markup, base_iri, content_type, sink)
}
