//! Evaluation contexts and CURIE/IRI resolution.
//!
//! A context is built for every element and handed to its children behind an
//! `Rc`. Children never modify it: anything an element changes (prefixes,
//! vocabulary, language) goes into a new context for its own descendants.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use curie::{Curie, ExpansionError, PrefixMapping};
use icu::locale::LanguageIdentifier;
use log::trace;
use oxiri::{Iri, IriParseError};
use oxrdf::{NamedNode, NamedOrBlankNode};

use crate::lists::{ListMapping, SharedList};
use crate::model::{BlankNodes, xhv_vocab};
use crate::options::ContentType;

/// Non-fatal problems found while processing.
///
/// These correspond to the warning classes of the RDFa processor graph. They
/// never fail a parse.
#[derive(derive_more::Display, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Advisory {
    Warning,
    UnresolvedCurie,
    UnresolvedTerm,
    PrefixRedefinition,
}

#[derive(Clone, Debug)]
pub(crate) enum IncompleteTriple {
    List(SharedList),
    Forward(NamedNode),
    Reverse(NamedNode),
}

pub(crate) enum Relation {
    Forward(NamedNode),
    Reverse(NamedNode),
    List(NamedNode),
}

#[derive(Clone)]
// “During processing, each rule is applied using information provided by an evaluation context.
//  An initial context is created when processing begins. That context has the following members:
pub(crate) struct EvaluationContext {
    // “The base. This will usually be the IRI of the document being processed,
    //  but it could be some other IRI, set by some other mechanism, such as the (X)HTML base element.
    pub base: Iri<String>,

    // “The parent subject. The initial value will be the same as the initial value of base,
    //  but it will usually change during the course of processing.
    pub parent_subject: Rc<NamedOrBlankNode>,

    // “The parent object. In some situations the object of a statement becomes the subject
    //  of any nested statements, and this member is used to convey this value.
    // Only the root element sees `None` here.
    pub parent_object: Option<Rc<NamedOrBlankNode>>,

    // “A list of current, in-scope IRI mappings.
    pub iri_mappings: Rc<PrefixMapping>,

    // “A list of incomplete triples. A triple can be incomplete when no object resource is provided
    //  alongside a predicate that requires a resource (i.e., @rel or @rev).
    pub incomplete_triples: Vec<IncompleteTriple>,

    // “A list mapping that associates IRIs with lists.
    pub list_mapping: Rc<RefCell<ListMapping>>,

    // “The language. Note that there is no default language.
    pub language: Option<Rc<LanguageIdentifier>>,

    // “The term mappings, a list of terms and their associated IRIs.
    pub term_mappings: Rc<BTreeMap<String, NamedNode>>,

    // “The default vocabulary, a value to use as the prefix IRI when a term unknown to the RDFa Processor
    //  is used.
    pub default_vocab: Option<NamedNode>,
}

impl EvaluationContext {
    pub fn new(base: Iri<String>, host: &dyn HostLanguage) -> Self {
        // resolving "" drops any fragment, so the base can be used
        // directly as the value of an empty CURIE
        let base = base.resolve("").unwrap_or(base);
        Self {
            parent_subject: Rc::new(NamedNode::new_unchecked(base.as_str()).into()),
            base,
            term_mappings: Rc::new(initial_context_terms().clone()),
            parent_object: None,
            language: None,
            default_vocab: host.default_vocabulary(),
            list_mapping: Default::default(),
            incomplete_triples: Default::default(),
            iri_mappings: Rc::new(initial_context_prefixes().clone()),
        }
    }
}

// “During the course of processing a number of locally scoped values are needed, as follows:
#[derive(Clone)]
pub(crate) struct LocalScope<'a> {
    pub advise: &'a dyn Fn(Advisory, String),
    pub blank_nodes: &'a RefCell<BlankNodes>,
    pub eval_context: &'a EvaluationContext,
    // “An initially empty list of IRI mappings, called the local list of IRI mappings.
    pub iri_mappings: Rc<PrefixMapping>,
    // “An initially empty list of incomplete triples, called the local list of incomplete triples.
    pub incomplete_triples: Vec<IncompleteTriple>,
    // “An initially empty language value.
    pub current_language: Option<Rc<LanguageIdentifier>>,
    // “A skip element flag, which indicates whether the current element can safely be ignored
    //  since it has no relevant RDFa attributes.
    pub skip_element: bool,
    // “A new subject value, which once calculated will set the parent subject in an evaluation context.
    pub new_subject: Option<Rc<NamedOrBlankNode>>,
    // “A value for the current object resource, the resource to use when creating triples that have a resource object.
    pub current_object_resource: Option<Rc<NamedOrBlankNode>>,
    // “A value for the typed resource, the source for creating rdf:type relationships to types specified in @typeof.
    pub typed_resource: Option<Rc<NamedOrBlankNode>>,
    // “The local term mappings, a list of terms and their associated IRIs.
    pub term_mappings: Rc<BTreeMap<String, NamedNode>>,
    // “The local list mapping, mapping IRIs to lists
    pub list_mappings: Rc<RefCell<ListMapping>>,
    // “A local default vocabulary, an IRI to use as a prefix mapping when a term is used.
    pub default_vocab: Option<NamedNode>,
}

enum CurieError {
    EmptyCurie,
    InvalidIri(String),
    Expansion(ExpansionError),
}

struct NotCurie;
struct NotTerm;

// Schemes that are recognisably IRIs even though they lack "//".
const OPAQUE_SCHEMES: &[&str] = &[
    "urn", "mailto", "tag", "data", "tel", "geo", "did", "doi", "about", "news", "sip",
];

impl<'b> LocalScope<'b> {
    pub fn new(
        eval_context: &'b EvaluationContext,
        advise: &'b dyn Fn(Advisory, String),
        blank_nodes: &'b RefCell<BlankNodes>,
    ) -> Self {
        // “First, the local values are initialized, as follows:
        Self {
            advise,
            blank_nodes,
            eval_context,
            skip_element: false,
            new_subject: None,
            current_object_resource: None,
            typed_resource: None,
            // “the local list of IRI mappings is set to the list of IRI mappings from the evaluation context;
            iri_mappings: eval_context.iri_mappings.clone(),
            incomplete_triples: Default::default(),
            // “the list mapping is set to (a reference of) the list mapping from the evaluation context;
            list_mappings: eval_context.list_mapping.clone(),
            current_language: eval_context.language.clone(),
            term_mappings: eval_context.term_mappings.clone(),
            default_vocab: eval_context.default_vocab.clone(),
        }
    }

    /// An empty CURIE resolves to the base.
    pub fn empty_curie(&self) -> NamedNode {
        NamedNode::new_unchecked(self.eval_context.base.as_str())
    }

    // When resolving a term, the outcome might be that it _must_ be ignored.
    // This is indicated by returning [`None`].
    fn resolve_term(&self, term: &str) -> Result<Option<NamedNode>, NotTerm> {
        // [rdfa-core] 7.5.3
        // > term     ::=  NCNameStartChar termChar*
        // > termChar ::=  ( NameChar - ':' ) | '/'
        if term.is_empty()
            || term.starts_with('/')
            || !term
                .split('/')
                .all(|s| rxml_validation::validate_ncname(s).is_ok())
        {
            return Err(NotTerm);
        }

        // > If there is a local default vocabulary the IRI is obtained
        // > by concatenating that value and the term.
        if let Some(vocab) = &self.default_vocab {
            return Ok(NamedNode::new(format!("{}{term}", vocab.as_str())).ok());
        }

        // > Otherwise, check if the term matches an item in the list of local term mappings.
        // > First compare against the list case-sensitively,
        if let Some(iri) = self.term_mappings.get(term) {
            return Ok(Some(iri.clone()));
        }

        // > and if there is no match then compare case-insensitively.
        if let Some(iri) = self
            .term_mappings
            .iter()
            .find_map(|(key, iri)| key.eq_ignore_ascii_case(term).then(|| iri.clone()))
        {
            return Ok(Some(iri));
        }

        // > Otherwise, the term has no associated IRI and MUST be ignored.
        (self.advise)(
            Advisory::UnresolvedTerm,
            format!("Unresolved term: {term} (no vocabulary in scope)"),
        );
        Ok(None)
    }

    /// Resolves a (non-safe) CURIE to an IRI or bnode.
    fn resolve_curie(&self, value: &str) -> Result<NamedOrBlankNode, CurieError> {
        if value.is_empty() {
            return Err(CurieError::EmptyCurie);
        }

        let lowered;
        let curie = if let Some((prefix, suffix)) = value.split_once(':') {
            if prefix == "_" {
                // [_:] is allowed by RDFa; it and every other label are
                // scoped to this parse
                return Ok(self.blank_nodes.borrow_mut().labelled(suffix).into());
            }

            // prefixes are matched case-insensitively
            lowered = prefix.to_ascii_lowercase();
            Curie::new(Some(&lowered), suffix)
        } else {
            Curie::new(None, value)
        };

        match self.iri_mappings.expand_curie(&curie) {
            // Usually this is an absolute IRI, but a relative IRI can
            // (though should not) be used as a prefix, so resolve it.
            Ok(iri) => match self.resolve_relative_iri(&iri) {
                Ok(absolute) => Ok(absolute.into()),
                Err(_) => Err(CurieError::InvalidIri(iri)),
            },
            Err(err) => Err(CurieError::Expansion(err)),
        }
    }

    /// Whether a `prefix:reference` value with an unmapped prefix should still be read as an IRI.
    ///
    /// Values like `http://...` or `urn:...` are; values like `foaf:name`
    /// with no `foaf` mapping are unresolved CURIEs and produce nothing.
    fn unmapped_curie_is_iri(&self, value: &str) -> bool {
        match value.split_once(':') {
            Some((prefix, reference)) => {
                reference.starts_with("//")
                    || OPAQUE_SCHEMES
                        .iter()
                        .any(|scheme| scheme.eq_ignore_ascii_case(prefix))
                    // not even shaped like a CURIE, e.g. "./a:b"
                    || rxml_validation::validate_ncname(prefix).is_err()
            }
            None => true,
        }
    }

    /// Resolves a SafeCURIE or CURIE to an IRI or bnode.
    fn resolve_safecurie_or_curie(&self, value: &str) -> Result<Option<NamedOrBlankNode>, NotCurie> {
        if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            return match self.resolve_curie(inner) {
                Ok(iri) => Ok(Some(iri)),
                // if it's a SafeCURIE we MUST ignore it
                Err(err) => {
                    match err {
                        CurieError::EmptyCurie
                        | CurieError::Expansion(ExpansionError::MissingDefault) => {}
                        CurieError::InvalidIri(iri) => (self.advise)(
                            Advisory::UnresolvedCurie,
                            format!("Invalid CURIE: {value} (expanded to invalid IRI value <{iri}>)"),
                        ),
                        CurieError::Expansion(ExpansionError::Invalid) => (self.advise)(
                            Advisory::UnresolvedCurie,
                            format!("Invalid CURIE: {value} (no such prefix defined)"),
                        ),
                    }
                    Ok(None)
                }
            };
        }

        match self.resolve_curie(value) {
            Ok(value) => Ok(Some(value)),
            Err(CurieError::Expansion(ExpansionError::Invalid))
                if !self.unmapped_curie_is_iri(value) =>
            {
                (self.advise)(
                    Advisory::UnresolvedCurie,
                    format!("Unresolved CURIE: {value} (no such prefix defined)"),
                );
                Ok(None)
            }
            Err(_) => Err(NotCurie),
        }
    }

    /// Resolves an IRI-only attribute value.
    pub fn attribute_iri(&self, value: &str) -> Option<NamedNode> {
        match self.resolve_relative_iri(value) {
            Ok(iri) => Some(iri),
            Err(err) => {
                self.report_invalid_iri(err, value);
                None
            }
        }
    }

    /// Resolves an IRI against the base.
    pub fn resolve_relative_iri(&self, value: &str) -> Result<NamedNode, IriParseError> {
        let iri = self.eval_context.base.resolve(value)?;
        Ok(NamedNode::new_unchecked(iri.into_inner()))
    }

    fn resolve_absolute_iri(&self, value: &str) -> Result<NamedNode, IriParseError> {
        Ok(NamedNode::new_unchecked(Iri::parse(value.to_string())?.into_inner()))
    }

    pub fn safecurie_or_curie_or_iri(&self, value: &str) -> Option<NamedOrBlankNode> {
        match self.resolve_safecurie_or_curie(value) {
            Ok(val) => val, // value or MUST be ignored
            Err(NotCurie) => self.attribute_iri(value).map(NamedOrBlankNode::from),
        }
    }

    fn curie_or_absiri(&self, value: &str) -> Option<NamedOrBlankNode> {
        match self.resolve_curie(value) {
            Ok(val) => Some(val),
            Err(CurieError::Expansion(ExpansionError::Invalid))
                if !self.unmapped_curie_is_iri(value) =>
            {
                (self.advise)(
                    Advisory::UnresolvedCurie,
                    format!("Unresolved CURIE: {value} (no such prefix defined)"),
                );
                None
            }
            // MUST be ignored
            Err(_) => match self.resolve_absolute_iri(value) {
                Ok(iri) => Some(iri.into()),
                Err(err) => {
                    self.report_invalid_iri(err, value);
                    None
                }
            },
        }
    }

    fn report_invalid_iri(&self, err: IriParseError, value: &str) {
        (self.advise)(Advisory::Warning, format!("Invalid IRI: <{value}> ({err})"));
    }

    pub fn term_or_curie_or_absiri(&self, value: &str) -> Option<NamedOrBlankNode> {
        match self.resolve_term(value) {
            Ok(result) => result.map(NamedOrBlankNode::from), // value or MUST be ignored
            Err(NotTerm) => self.curie_or_absiri(value),
        }
    }

    pub fn many_curie_or_absiri(&self, value: &str) -> Vec<NamedOrBlankNode> {
        value
            .split_ascii_whitespace()
            .filter_map(|v| self.curie_or_absiri(v))
            .collect()
    }

    pub fn many_term_or_curie_or_absiri(&self, value: &str) -> Vec<NamedOrBlankNode> {
        value
            .split_ascii_whitespace()
            .filter_map(|v| self.term_or_curie_or_absiri(v))
            .collect()
    }

    /// Adds a prefix to the local IRI mappings, copying them first if they are shared.
    pub fn add_prefix(&mut self, prefix: &str, iri: &str) {
        // RDFa prefixes are case-insensitive and stored lower-case
        let prefix = prefix.to_ascii_lowercase();
        let mappings = Rc::make_mut(&mut self.iri_mappings);

        if let Ok(existing) = mappings.expand_curie(&Curie::new(Some(&prefix), "")) {
            if existing != iri {
                (self.advise)(
                    Advisory::PrefixRedefinition,
                    format!("Prefix '{prefix}' redefined from <{existing}> to <{iri}>"),
                );
            }
        }

        match mappings.add_prefix(&prefix, iri) {
            Ok(()) => trace!("- prefix {prefix}: now maps to <{iri}>"),
            Err(_) => (self.advise)(
                Advisory::Warning,
                format!("Invalid prefix: the prefix '{prefix}' is reserved."),
            ),
        }
    }
}

/// Rules that differ between the host languages.
pub(crate) trait HostLanguage {
    fn default_vocabulary(&self) -> Option<NamedNode>;

    /// Whether `xml:base` changes the base IRI.
    fn honours_xml_base(&self) -> bool;
}

// [HTML-RDFA] 3.1
pub(crate) struct HtmlHost;

impl HostLanguage for HtmlHost {
    // “The default vocabulary URI is undefined.
    fn default_vocabulary(&self) -> Option<NamedNode> {
        None
    }

    fn honours_xml_base(&self) -> bool {
        false
    }
}

// XHTML is processed with the HTML+RDFa rules, but being XML it also
// understands xml:base.
pub(crate) struct XhtmlHost;

impl HostLanguage for XhtmlHost {
    fn default_vocabulary(&self) -> Option<NamedNode> {
        None
    }

    fn honours_xml_base(&self) -> bool {
        true
    }
}

pub(crate) fn host_for(content_type: ContentType) -> &'static dyn HostLanguage {
    match content_type {
        ContentType::Html => &HtmlHost,
        ContentType::Xhtml => &XhtmlHost,
    }
}

pub fn initial_context_terms() -> &'static BTreeMap<String, NamedNode> {
    // https://www.w3.org/2011/rdfa-context/rdfa-1.1
    static INITIAL_CONTEXT: std::sync::OnceLock<BTreeMap<String, NamedNode>> =
        std::sync::OnceLock::new();
    INITIAL_CONTEXT.get_or_init(|| {
        [
            (
                "describedby",
                "http://www.w3.org/2007/05/powder-s#describedby",
            ),
            ("license", "http://www.w3.org/1999/xhtml/vocab#license"),
            ("role", xhv_vocab::ROLE.as_str()),
        ]
        .into_iter()
        .map(|(term, iri)| (term.to_string(), NamedNode::new_unchecked(iri)))
        .collect()
    })
}

pub fn initial_context_prefixes() -> &'static PrefixMapping {
    static INITIAL_CONTEXT: std::sync::OnceLock<PrefixMapping> = std::sync::OnceLock::new();
    // https://www.w3.org/2011/rdfa-context/rdfa-1.1
    INITIAL_CONTEXT.get_or_init(|| {
        let mut mapping = PrefixMapping::default();
        for (prefix, iri) in [
            // Defined by [rdfa-core]
            ("", xhv_vocab::NAMESPACE),
            // W3C documents
            ("as", "https://www.w3.org/ns/activitystreams#"),
            ("csvw", "http://www.w3.org/ns/csvw#"),
            ("dcat", "http://www.w3.org/ns/dcat#"),
            ("dqv", "http://www.w3.org/ns/dqv#"),
            ("duv", "http://www.w3.org/ns/duv#"),
            ("grddl", "http://www.w3.org/2003/g/data-view#"),
            ("jsonld", "http://json-ld.org/vocab#"),
            ("ldp", "http://www.w3.org/ns/ldp#"),
            ("ma", "http://www.w3.org/ns/ma-ont#"),
            ("oa", "http://www.w3.org/ns/oa#"),
            ("odrl", "http://www.w3.org/ns/odrl/2/"),
            ("org", "http://www.w3.org/ns/org#"),
            ("owl", "http://www.w3.org/2002/07/owl#"),
            ("prov", "http://www.w3.org/ns/prov#"),
            ("qb", "http://purl.org/linked-data/cube#"),
            ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
            ("rdfa", "http://www.w3.org/ns/rdfa#"),
            ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
            ("rif", "http://www.w3.org/2007/rif#"),
            ("rr", "http://www.w3.org/ns/r2rml#"),
            ("sd", "http://www.w3.org/ns/sparql-service-description#"),
            ("skos", "http://www.w3.org/2004/02/skos/core#"),
            ("skosxl", "http://www.w3.org/2008/05/skos-xl#"),
            ("sosa", "http://www.w3.org/ns/sosa/"),
            ("ssn", "http://www.w3.org/ns/ssn/"),
            ("time", "http://www.w3.org/2006/time#"),
            ("void", "http://rdfs.org/ns/void#"),
            ("wdr", "http://www.w3.org/2007/05/powder#"),
            ("wdrs", "http://www.w3.org/2007/05/powder-s#"),
            ("xhv", xhv_vocab::NAMESPACE),
            ("xml", "http://www.w3.org/XML/1998/namespace"),
            ("xsd", "http://www.w3.org/2001/XMLSchema#"),
            // "widely used"
            ("cc", "http://creativecommons.org/ns#"),
            ("ctag", "http://commontag.org/ns#"),
            ("dc", "http://purl.org/dc/terms/"),
            ("dc11", "http://purl.org/dc/elements/1.1/"),
            ("dcterms", "http://purl.org/dc/terms/"),
            ("foaf", "http://xmlns.com/foaf/0.1/"),
            ("gr", "http://purl.org/goodrelations/v1#"),
            ("ical", "http://www.w3.org/2002/12/cal/icaltzd#"),
            ("og", "http://ogp.me/ns#"),
            ("rev", "http://purl.org/stuff/rev#"),
            ("schema", "http://schema.org/"),
            ("sioc", "http://rdfs.org/sioc/ns#"),
            ("v", "http://rdf.data-vocabulary.org/#"),
            ("vcard", "http://www.w3.org/2006/vcard/ns#"),
        ] {
            // none of these is the reserved "_" prefix
            let _ = mapping.add_prefix(prefix, iri);
        }
        mapping
    })
}
