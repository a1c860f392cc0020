//! The RDFa processing sequence, run over a tokenized document.
//!
//! Quads are handed to an [`Output`] as soon as they are known. The only
//! quads that wait are list members, which are emitted when the element that
//! owns the list closes.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use icu::locale::LanguageIdentifier;
use itertools::Itertools;
use log::{debug, trace};
use oxiri::Iri;
use oxrdf::{
    GraphName, Literal, NamedNode, NamedNodeRef, NamedOrBlankNode, Quad, Term, TripleRef,
};
use vec1::{Size0Error, Vec1};

use crate::Error;
use crate::boundary::CancellationSignal;
use crate::context::{
    Advisory, EvaluationContext, HostLanguage, IncompleteTriple, LocalScope, Relation,
};
use crate::markup::{Attributes, Document, Event};
use crate::model::{BlankNodes, RDF_HTML, make_literal, rdfa_vocab, xhv_vocab};
use crate::options::ParserOptions;

/// Receives everything a parse produces.
pub trait Output {
    fn quad(&mut self, quad: Quad);

    /// Called for problems that do not stop the parse.
    fn advisory(&mut self, kind: Advisory, message: String) {
        debug!("{kind}: {message}");
    }
}

impl<F: FnMut(Quad)> Output for F {
    fn quad(&mut self, quad: Quad) {
        self(quad);
    }
}

impl Output for oxrdf::Graph {
    fn quad(&mut self, quad: Quad) {
        self.insert(TripleRef::new(&quad.subject, &quad.predicate, &quad.object));
    }
}

enum Attr<T> {
    Missing,
    Empty,
    Value(T),
}

impl<T> Attr<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Attr<U> {
        match self {
            Attr::Missing => Attr::Missing,
            Attr::Empty => Attr::Empty,
            Attr::Value(v) => Attr::Value(f(v)),
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Attr::Missing)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Attr::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Attr::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// An open element, with access to its content.
struct ElementView<'d> {
    name: &'d str,
    attributes: &'d Attributes,
    open: usize,
    document: &'d Document,
    is_root: bool,
}

impl<'d> ElementView<'d> {
    fn attr(&self, name: &str) -> Option<&'d str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn text(&self) -> String {
        self.document.text_content(self.open)
    }

    fn inner_markup(&self) -> String {
        self.document.inner_markup(self.open)
    }
}

pub(crate) struct RDFaProcessor<'o, 'p> {
    output: RefCell<&'o mut dyn Output>,
    blank_nodes: RefCell<BlankNodes>,
    options: &'p ParserOptions,
    host: &'static dyn HostLanguage,
}

impl<'o, 'p> RDFaProcessor<'o, 'p> {
    pub fn new(
        output: &'o mut dyn Output,
        options: &'p ParserOptions,
        host: &'static dyn HostLanguage,
    ) -> Self {
        Self {
            output: RefCell::new(output),
            blank_nodes: Default::default(),
            options,
            host,
        }
    }

    pub fn run(
        &self,
        document: &Document,
        base: Iri<String>,
        cancel: &CancellationSignal,
    ) -> Result<(), Error> {
        struct Frame {
            // the context the element was processed with
            received: Rc<EvaluationContext>,
            // the context it hands to its children
            context: Rc<EvaluationContext>,
        }

        let root = Rc::new(EvaluationContext::new(base, self.host));
        let mut stack: Vec<Frame> = Vec::new();

        for (ix, event) in document.events().iter().enumerate() {
            if cancel.is_cancelled() {
                debug!("parse cancelled at event {ix}");
                return Err(Error::Cancelled);
            }

            match event {
                Event::Open { name, attributes } => {
                    let received = stack
                        .last()
                        .map_or_else(|| root.clone(), |frame| frame.context.clone());
                    let element = ElementView {
                        name,
                        attributes,
                        open: ix,
                        document,
                        is_root: stack.is_empty(),
                    };
                    let context = Rc::new(self.process_element(&received, &element)?);
                    stack.push(Frame { received, context });
                }
                Event::Text(_) => {}
                Event::Close { name } => {
                    let frame = stack.pop().ok_or_else(|| {
                        Error::Internal(format!("</{name}> closes no open element"))
                    })?;
                    self.close_element(&frame.received, &frame.context);
                }
            }
        }

        Ok(())
    }

    // 14.
    // “Finally, if there is one or more mapping in the local list mapping,
    //  list triples are generated as follows:
    // “For each IRI in the local list mapping, if the equivalent list does not
    //  exist in the evaluation context, indicating that the list was originally
    //  instantiated on the current element, use the list as follows:
    fn close_element(&self, received: &EvaluationContext, context: &EvaluationContext) {
        // a shared mapping belongs to an ancestor, which flushes it
        if Rc::ptr_eq(&received.list_mapping, &context.list_mapping)
            || context.list_mapping.borrow().is_empty()
        {
            return;
        }

        let quads = context.list_mapping.borrow_mut().flush_all(
            &context.parent_subject,
            self.options.list_style,
            &mut self.blank_nodes.borrow_mut(),
        );
        for quad in quads {
            trace!("- Emitting list quad: {quad}");
            self.emit(quad);
        }
    }

    fn emit_output(&self, tr: TripleRef<'_>) {
        trace!("- Emitting output triple: {tr}");
        self.emit(tr.into_owned().in_graph(GraphName::DefaultGraph));
    }

    fn emit(&self, quad: Quad) {
        self.output.borrow_mut().quad(quad);
    }

    fn advise(&self, kind: Advisory, message: String) {
        self.output.borrow_mut().advisory(kind, message);
    }

    fn fresh_blank(&self) -> Rc<NamedOrBlankNode> {
        Rc::new(self.blank_nodes.borrow_mut().fresh().into())
    }

    fn process_element(
        &self,
        eval_context: &EvaluationContext,
        element: &ElementView<'_>,
    ) -> Result<EvaluationContext, Error> {
        let advise = |kind: Advisory, message: String| self.advise(kind, message);

        let attr_iri = |name, proj: &dyn Fn(&str) -> Option<NamedNode>| match element.attr(name) {
            None => Attr::Missing,
            Some(v) => match proj(v) {
                None => Attr::Empty,
                Some(v) => Attr::Value(v),
            },
        };

        let attr1 =
            |name, proj: &dyn Fn(&str) -> Option<NamedOrBlankNode>| match element.attr(name) {
                None => Attr::Missing,
                Some(v) => match proj(v) {
                    None => Attr::Empty,
                    Some(v) => Attr::Value(v),
                },
            };

        let attr_many =
            |name, proj: &dyn Fn(&str) -> Vec<NamedOrBlankNode>| match element.attr(name) {
                None => Attr::Missing,
                Some(v) => match Vec1::try_from_vec(proj(v)) {
                    Err(Size0Error) => Attr::Empty,
                    Ok(v) => Attr::Value(v),
                },
            };

        let attr_many_pred =
            |name, proj: &dyn Fn(&str) -> Vec<NamedOrBlankNode>| match element.attr(name) {
                None => Attr::Missing,
                Some(v) => {
                    let data = proj(v)
                        .into_iter()
                        .filter_map(|v| self.to_predicate(name, v))
                        .collect();
                    match Vec1::try_from_vec(data) {
                        Err(Size0Error) => Attr::Empty,
                        Ok(v) => Attr::Value(v),
                    }
                }
            };

        trace!(
            "<{}> {}",
            element.name,
            element
                .attributes
                .iter()
                .map(|(n, v)| format!("@{n}='{v}'"))
                .join(" ")
        );

        let is_root_element = element.is_root;
        debug_assert!(is_root_element == eval_context.parent_object.is_none());

        // xml:base applies to the element it appears on
        let rebased;
        let eval_context = match element
            .attr("xml:base")
            .filter(|_| self.host.honours_xml_base())
        {
            Some(xml_base) => match eval_context.base.resolve(xml_base) {
                Ok(base) => {
                    let base = base.resolve("").unwrap_or(base);
                    trace!("- xml:base is now: {base}");
                    rebased = EvaluationContext {
                        base,
                        ..eval_context.clone()
                    };
                    &rebased
                }
                Err(err) => {
                    self.advise(
                        Advisory::Warning,
                        format!("Invalid xml:base: <{xml_base}> ({err})"),
                    );
                    eval_context
                }
            },
            None => eval_context,
        };

        // 1.
        let mut local = LocalScope::new(eval_context, &advise, &self.blank_nodes);

        // [rdfa-core] 7.5: 2.
        // > Next the current element is examined for any change to the default vocabulary via @vocab.
        if let Some(vocab) = element.attr("vocab") {
            if vocab.is_empty() {
                trace!("- @vocab is empty, resetting default vocabulary");
                // > If the value is empty, then the local default vocabulary
                // > MUST be reset to the Host Language defined default (if any).
                local.default_vocab = self.host.default_vocabulary();
            }
            // > If @vocab is present and contains a value,
            else if let Some(vocab) = local.attribute_iri(vocab) {
                trace!("- default vocabulary is now: {vocab}");
                // > The value of @vocab is used to generate a triple as follows:
                self.emit_output(TripleRef::new(
                    // >   subject = base
                    NamedNodeRef::new_unchecked(eval_context.base.as_str()),
                    // >   predicate = http://www.w3.org/ns/rdfa#usesVocabulary
                    rdfa_vocab::USES_VOCABULARY,
                    // >   object = value from @vocab
                    &vocab,
                ));
                local.default_vocab = Some(vocab);
            }
        }

        // 3.
        // “Next, the current element is examined for IRI mappings and these are added to the local list of IRI mappings.
        //  Note that an IRI mapping will simply overwrite any current mapping in the list that has the same name;
        // xmlns: declarations go first so that @prefix wins
        let mut declared: Vec<(&str, &str)> = element
            .attributes
            .iter()
            .filter_map(|(name, value)| Some((name.strip_prefix("xmlns:")?, value.as_str())))
            .collect();

        if let Some(prefixes) = element.attr("prefix") {
            for (prefix, iri) in prefixes.split_ascii_whitespace().tuples() {
                match prefix.strip_suffix(':') {
                    Some(prefix) => declared.push((prefix, iri)),
                    None => self.advise(
                        Advisory::Warning,
                        format!("@prefix syntax error: '{prefix}' must end with ':'"),
                    ),
                }
            }
        }

        // note that there is never a default ("no prefix") mapping
        for (prefix, iri) in declared {
            local.add_prefix(prefix, iri);
        }

        // 4. Language
        // “The current element is also parsed for any language information,
        //  and if present, current language is set accordingly;
        if let Some(lang) = element.attr("xml:lang").or(element.attr("lang")) {
            if lang.is_empty() {
                local.current_language = None;
            } else {
                match LanguageIdentifier::from_str(lang) {
                    Ok(lang) => {
                        trace!("- current language is now: {lang}");
                        local.current_language = Some(Rc::new(lang));
                    }
                    Err(e) => self.advise(
                        Advisory::Warning,
                        format!("Invalid language identifier ({lang}): {e}"),
                    ),
                }
            }
        }

        let property: Attr<Vec1<NamedNode>> =
            attr_many_pred("property", &|v| local.many_term_or_curie_or_absiri(v));

        let inlist = element.attr("inlist").is_some();
        let rel: Option<Vec<Relation>>;
        let rev: Option<Vec<Relation>>;

        let rel_dir = if inlist {
            Relation::List
        } else {
            Relation::Forward
        };
        let rev_dir = Relation::Reverse;

        if property.is_present() {
            // [html-rdfa] extension #7
            // > if the @property attribute and the @rel and/or @rev attribute exists
            // > on the same element, the non-CURIE and non-URI @rel and @rev values
            // > are ignored. If, after this, the value of @rel and/or @rev becomes empty,
            // > then the processor MUST act as if the respective attribute is not present.
            rel = match attr_many_pred("rel", &|v| local.many_curie_or_absiri(v)) {
                Attr::Missing | Attr::Empty => None,
                Attr::Value(v) => Some(v.into_iter().map(rel_dir).collect()),
            };
            rev = match attr_many_pred("rev", &|v| local.many_curie_or_absiri(v)) {
                Attr::Missing | Attr::Empty => None,
                Attr::Value(v) => Some(v.into_iter().map(rev_dir).collect()),
            };
        } else {
            rel = match attr_many_pred("rel", &|v| local.many_term_or_curie_or_absiri(v)) {
                Attr::Missing => None,
                Attr::Empty => Some(Vec::new()),
                Attr::Value(v) => Some(v.into_iter().map(rel_dir).collect()),
            };
            rev = match attr_many_pred("rev", &|v| local.many_term_or_curie_or_absiri(v)) {
                Attr::Missing => None,
                Attr::Empty => Some(Vec::new()),
                Attr::Value(v) => Some(v.into_iter().map(rev_dir).collect()),
            };
        }

        let relations = match (rel, rev) {
            (None, None) => None,
            (Some(rel), None) => Some(rel),
            (None, Some(rev)) => Some(rev),
            (Some(mut rel), Some(rev)) => {
                rel.extend(rev);
                Some(rel)
            }
        };

        // [role-attribute]
        // > If a Host Language contains the @role attribute, then an
        // > RDFa processor processing a document written in that Host Language
        // > according to the rules of that Host Language MAY generate additional
        // > triples for role attributes. If these additional triples are being generated,
        // > then they MUST be generated as follows:
        if let Some(role) = element.attr("role").filter(|_| self.options.role_attribute) {
            // > If @id is present, it is used to supply the subject by concatenating
            // > the document's 'base', a fragment separator '#', and the value of @id.
            // > Otherwise the subject is a unique newly created bnode.
            let role_subject: Rc<NamedOrBlankNode> = match element
                .attr("id")
                .and_then(|id| local.resolve_relative_iri(&format!("#{id}")).ok())
            {
                Some(iri) => Rc::new(iri.into()),
                None => self.fresh_blank(),
            };

            // > An RDFa Processor MUST behave as if there is an in-scope vocabulary
            // > of http://www.w3.org/1999/xhtml/vocab# for the value(s) of the @role attribute.
            let role_local = LocalScope {
                default_vocab: Some(NamedNode::new_unchecked(xhv_vocab::NAMESPACE)),
                ..local.clone()
            };

            // > Remember that @role values are defined using the datatype TERMorCURIEorAbsIRIs.
            for role in role_local.many_term_or_curie_or_absiri(role) {
                self.emit_output(TripleRef::new(role_subject.as_ref(), xhv_vocab::ROLE, &role));
            }
        }

        let content = element.attr("content");

        let type_of: Attr<Vec1<NamedOrBlankNode>> =
            attr_many("typeof", &|v| local.many_term_or_curie_or_absiri(v));

        let about: Attr<Rc<NamedOrBlankNode>> =
            attr1("about", &|v| local.safecurie_or_curie_or_iri(v)).map(Rc::new);
        let resource: Attr<Rc<NamedOrBlankNode>> =
            attr1("resource", &|x| local.safecurie_or_curie_or_iri(x)).map(Rc::new);

        let href: Attr<NamedNode> = attr_iri("href", &|v| local.attribute_iri(v));
        let src: Attr<NamedNode> = attr_iri("src", &|v| local.attribute_iri(v));

        // a blank node cannot be a datatype, which leaves the attribute empty
        let datatype: Attr<NamedNode> = attr_iri("datatype", &|v| {
            local
                .term_or_curie_or_absiri(v)
                .and_then(|dt| self.to_predicate("datatype", dt))
        });

        // read from the "resource attributes"
        let resource_present = resource.is_present() || href.is_present() || src.is_present();
        let resource_value: Option<Rc<NamedOrBlankNode>> = resource
            .value()
            .cloned()
            .or_else(|| Some(Rc::new(href.into_value()?.into())))
            .or_else(|| Some(Rc::new(src.into_value()?.into())));

        // 5.
        // “If the current element contains no @rel or @rev attribute,
        if relations.is_none() {
            // 5.1
            // “If the current element contains the @property attribute, but does
            //  not contain either the @content or @datatype attributes, then
            if property.is_present() && content.is_none() && !datatype.is_present() {
                // > new subject is set to the resource obtained from the first match from the following rule:
                if let Some(about) = about.value() {
                    trace!("- Using @about as new subject");
                    local.new_subject = Some(about.clone());
                }
                // > - otherwise, if the element is the root element of the document,
                //     then act as if there is an empty @about present
                else if is_root_element {
                    trace!("- Using empty @about as new subject");
                    local.new_subject = Some(Rc::new(local.empty_curie().into()));
                }
                // > - otherwise, if parent object is present, new subject is set to the value of parent object.
                else if let Some(parent_object) = &eval_context.parent_object {
                    trace!("- Using parent object as new subject: {parent_object}");
                    local.new_subject = Some(parent_object.clone());
                }

                // “If @typeof is present then typed resource is set to the resource obtained from
                //  the first match from the following rules:
                if type_of.is_present() {
                    if let Some(about) = about.value() {
                        trace!("- Using @about as typed resource");
                        local.typed_resource = Some(about.clone());
                    } else if is_root_element {
                        local.typed_resource = Some(Rc::new(local.empty_curie().into()));
                    } else {
                        // “by using the resource from @resource, if present,
                        //  otherwise, by using the IRI from @href, if present,
                        //  otherwise, by using the IRI from @src, if present,
                        //  otherwise, the value of typed resource is set to a newly created bnode.
                        let typed_resource = match &resource_value {
                            Some(resource) => resource.clone(),
                            None => {
                                trace!("- Using new blank node as typed resource");
                                self.fresh_blank()
                            }
                        };

                        local.typed_resource = Some(typed_resource.clone());

                        // “The value of the current object resource is then set to the value of typed resource.
                        local.current_object_resource = Some(typed_resource);
                    }
                }
            }
            // 5.2: “otherwise:
            else {
                // > If the element contains an @about, @href, @src, or @resource attribute,
                // > new subject is set to the resource obtained as follows:
                if about.is_present() || resource_present {
                    if let Some(about) = about.value() {
                        trace!("- Using @about as new subject");
                        local.new_subject = Some(about.clone())
                    } else if let Some(resource) = &resource_value {
                        trace!("- Using @resource/@href/@src as new subject");
                        local.new_subject = Some(resource.clone());
                    }
                }

                // [html-rdfa] extension #8
                // > if no IRI is provided by a resource attribute, then first check to see
                // > if the element is the head or body element. If it is, then set new
                // > subject to parent object.
                let is_head_or_body = element.name == "head" || element.name == "body";
                if local.new_subject.is_none() && is_head_or_body {
                    trace!(
                        "- [head/body] using parent object as new subject: {:?}",
                        eval_context.parent_object
                    );
                    local.new_subject = eval_context.parent_object.clone();
                }

                // > otherwise, if no resource is provided by a resource attribute,
                // > then the first match from the following rules will apply:
                if local.new_subject.is_none() {
                    if is_root_element {
                        trace!("- Using empty CURIE as new subject (root element)");
                        local.new_subject = Some(Rc::new(local.empty_curie().into()));
                    } else if type_of.is_present() {
                        trace!("- Using blank node as new subject (@typeof present)");
                        local.new_subject = Some(self.fresh_blank());
                    } else if let Some(parent_object) = &eval_context.parent_object {
                        trace!("- Using parent object as new subject: {parent_object}");
                        local.new_subject = Some(parent_object.clone());

                        // “Additionally, if @property is not present then the skip element flag is set to 'true'.
                        if !property.is_present() {
                            trace!("- Skip element set to 'true' (no @property).");
                            local.skip_element = true;
                        }
                    }
                }

                // “Finally, if @typeof is present, set the typed resource to the value of new subject.
                if type_of.is_present() {
                    local.typed_resource = local.new_subject.clone();
                }
            }
        }
        // 6.
        else {
            // > new subject is set to the resource obtained from the first match from the following rules:
            // > by using the resource from @about, if present
            if let Some(about) = about.value() {
                trace!("- Using @about as new subject: {about}");
                local.new_subject = Some(about.clone());

                // “if the @typeof attribute is present, set typed resource to new subject.
                if type_of.is_present() {
                    local.typed_resource = local.new_subject.clone();
                }
            }

            // “If no resource is provided then the first match from the following rules will apply:
            if local.new_subject.is_none() {
                if is_root_element {
                    trace!("- Using empty CURIE as new subject (root element)");
                    local.new_subject = Some(Rc::new(local.empty_curie().into()));
                } else {
                    trace!("- Using parent object as new subject");
                    local.new_subject = eval_context.parent_object.clone();
                }
            }

            // > Then the current object resource is set to the resource obtained from the first match from the following rules:
            if let Some(resource) = &resource_value {
                trace!("- Using @resource/@href/@src as current object resource: {resource}");
                local.current_object_resource = Some(resource.clone());
            }
            // “otherwise, if @typeof is present and @about is not, use a newly created bnode.
            else if type_of.is_present() && !about.is_present() {
                trace!("- Using blank node as current object resource (@typeof present)");
                local.current_object_resource = Some(self.fresh_blank());
            }

            // “If @typeof is present and @about is not, set typed resource to current object resource.
            if type_of.is_present() && !about.is_present() {
                local.typed_resource = local.current_object_resource.clone();
            }
        }

        let Some(new_subject) = local.new_subject.clone() else {
            return Err(Error::Internal(format!(
                "no subject established for <{}>",
                element.name
            )));
        };

        // 7.
        // “If in any of the previous steps a typed resource was set to a non-null value,
        //  it is now used to provide a subject for type values;
        if let (Some(typed_resource), Some(type_of)) =
            (local.typed_resource.as_deref(), type_of.value())
        {
            for type_iri in type_of {
                self.emit_output(TripleRef::new(typed_resource, oxrdf::vocab::rdf::TYPE, type_iri));
            }
        }

        // 8.
        // “If in any of the previous steps a new subject
        //  was set to a non-null value different from the parent object;
        if Some(&new_subject) != eval_context.parent_object.as_ref() {
            // “The list mapping taken from the evaluation context is set to a new, empty mapping.
            trace!("- Setting new list mapping");
            local.list_mappings = Default::default();
        }

        // 9.
        // “If in any of the previous steps a current object resource was set to a non-null value,
        //  it is now used to generate triples and add entries to the local list mapping:
        if let Some(current_object_resource) = local.current_object_resource.clone() {
            if let Some(relations) = &relations {
                let term: Rc<Term> = Rc::new(current_object_resource.as_ref().clone().into());
                for relation in relations {
                    match relation {
                        // > if the local list mapping does not contain a list associated with the IRI,
                        // > instantiate a new list and add to local list mappings
                        Relation::List(predicate) => {
                            local
                                .list_mappings
                                .borrow_mut()
                                .append(predicate, term.clone());
                        }
                        Relation::Forward(predicate) => {
                            self.emit_output(TripleRef::new(
                                new_subject.as_ref(),
                                predicate,
                                current_object_resource.as_ref(),
                            ));
                        }
                        Relation::Reverse(predicate) => {
                            self.emit_output(TripleRef::new(
                                current_object_resource.as_ref(),
                                predicate,
                                new_subject.as_ref(),
                            ));
                        }
                    }
                }
            }
        }
        // [rdfa-core] 7.5: 10.
        // > If however current object resource was set to null, but there are predicates present,
        // > then they must be stored as incomplete triples, pending the discovery of a subject
        // > that can be used as the object.
        else if let Some(revrel) = &relations {
            trace!("- current object resource is null, storing incomplete triples");
            // > Also, current object resource should be set to a newly created bnode
            local.current_object_resource = Some(self.fresh_blank());
            for relation in revrel {
                match relation {
                    Relation::List(p) => {
                        let list = local.list_mappings.borrow_mut().ensure_list(p);
                        local.incomplete_triples.push(IncompleteTriple::List(list));
                    }
                    Relation::Forward(p) => {
                        local
                            .incomplete_triples
                            .push(IncompleteTriple::Forward(p.clone()));
                    }
                    Relation::Reverse(p) => {
                        local
                            .incomplete_triples
                            .push(IncompleteTriple::Reverse(p.clone()));
                    }
                }
            }

            trace!("- incomplete triples: {:?}", local.incomplete_triples);
        }

        // 11.
        // “The next step of the iteration is to establish any current property value;
        if let Some(properties) = property.into_value() {
            let lang = local.current_language.as_ref().map(|l| l.to_string());
            let literal = |value: &str, datatype: Option<NamedNodeRef<'_>>| -> Term {
                let (literal, degraded) = make_literal(value, lang.as_deref(), datatype);
                if degraded {
                    self.advise(
                        Advisory::Warning,
                        format!("rdf:langString requires a language tag: \"{value}\""),
                    );
                }
                literal.into()
            };

            let mut otherwise_datatype: Option<NamedNodeRef<'static>> = None;
            let content_val: Cow<'_, str> = if let Some(content) = content {
                content.into()
            } else {
                // [html-rdfa] extension #9 & #10
                let value = element.attr("datetime").map(Cow::Borrowed).or_else(|| {
                    (element.name == "time").then(|| Cow::Owned(element.text()))
                });

                match value {
                    Some(dt) => {
                        if self.options.datetime_typing {
                            otherwise_datatype = temporal_datatype(&dt);
                        }
                        dt
                    }
                    None => Cow::Owned(element.text()),
                }
            };

            let current_property_value: Term = match &datatype {
                // “as a plain literal if @datatype is present but has an empty value
                Attr::Empty => {
                    trace!("- Empty datatype, using plain literal");
                    literal(&content_val, None)
                }
                // “as an XML literal if @datatype is present and is set to XMLLiteral
                Attr::Value(datatype)
                    if datatype.as_ref() == oxrdf::vocab::rdf::XML_LITERAL
                        || datatype.as_ref() == RDF_HTML =>
                {
                    Literal::new_typed_literal(element.inner_markup(), datatype.clone()).into()
                }
                // “as a typed literal if @datatype is present, does not have an empty value
                Attr::Value(datatype) => literal(&content_val, Some(datatype.as_ref())),
                Attr::Missing => {
                    if let Some(otherwise_datatype) = otherwise_datatype {
                        // [html-rdfa] extension #9
                        literal(&content_val, Some(otherwise_datatype))
                    }
                    // “otherwise, as a plain literal using the value of @content if @content is present.
                    else if let Some(content) = content {
                        literal(content, None)
                    }
                    // “otherwise, if the @rel, @rev, and @content attributes are not present,
                    //  as a resource obtained from @resource, @href or @src
                    else if let (None, Some(resource)) = (&relations, &resource_value) {
                        resource.as_ref().clone().into()
                    }
                    // “otherwise, if @typeof is present and @about is not, the value of typed resource.
                    else if let Some(typed_resource) = local
                        .typed_resource
                        .as_ref()
                        .filter(|_| type_of.is_present() && !about.is_present())
                    {
                        typed_resource.as_ref().clone().into()
                    }
                    // otherwise as a plain literal.
                    else {
                        literal(&content_val, None)
                    }
                }
            };

            // “If the element also includes the @inlist attribute, the current property
            //  value is added to the local list mapping
            if inlist {
                let term: Rc<Term> = Rc::new(current_property_value);
                for property in properties {
                    local
                        .list_mappings
                        .borrow_mut()
                        .append(&property, term.clone());
                }
            } else {
                for property in properties {
                    self.emit_output(TripleRef::new(
                        new_subject.as_ref(),
                        &property,
                        &current_property_value,
                    ));
                }
            }
        }

        // 12.
        // “If the skip element flag is 'false', and new subject was set to a non-null value,
        //  then any incomplete triples within the current context should be completed:
        if !local.skip_element {
            for incomplete in eval_context.incomplete_triples.iter() {
                match incomplete {
                    // “If direction is 'none',
                    //  the new subject is added to the list from the iterated incomplete triple.
                    IncompleteTriple::List(list) => list
                        .borrow_mut()
                        .push(Rc::new(new_subject.as_ref().clone().into())),
                    // “If direction is 'forward' then the following triple is generated:
                    IncompleteTriple::Forward(predicate) => {
                        self.emit_output(TripleRef::new(
                            eval_context.parent_subject.as_ref(),
                            predicate,
                            new_subject.as_ref(),
                        ));
                    }
                    // “If direction is 'reverse' then this is the triple generated:
                    IncompleteTriple::Reverse(predicate) => {
                        self.emit_output(TripleRef::new(
                            new_subject.as_ref(),
                            predicate,
                            eval_context.parent_subject.as_ref(),
                        ));
                    }
                }
            }
        }

        // 13.
        // “If the skip element flag is 'true' then the new evaluation context is a copy of the current
        //  context that was passed in to this level of processing, with the language and list of IRI
        //  mappings values replaced with the local values;
        if local.skip_element {
            Ok(EvaluationContext {
                language: local.current_language,
                iri_mappings: local.iri_mappings,
                // ERRATA: this also needs to be copied
                default_vocab: local.default_vocab,
                ..eval_context.clone()
            })
        } else {
            Ok(EvaluationContext {
                base: eval_context.base.clone(),
                parent_object: Some(
                    local
                        .current_object_resource
                        .clone()
                        .unwrap_or_else(|| new_subject.clone()),
                ),
                parent_subject: new_subject,
                iri_mappings: local.iri_mappings,
                incomplete_triples: local.incomplete_triples,
                list_mapping: local.list_mappings,
                language: local.current_language,
                default_vocab: local.default_vocab,
                // ERRATA: undocumented, but assumed
                term_mappings: local.term_mappings,
            })
        }
    }

    fn to_predicate(&self, name: &str, v: NamedOrBlankNode) -> Option<NamedNode> {
        match v {
            NamedOrBlankNode::NamedNode(x) => Some(x),
            NamedOrBlankNode::BlankNode(b) => {
                self.advise(
                    Advisory::Warning,
                    format!("@{name} cannot refer to a bnode: [{b}]"),
                );
                None
            }
        }
    }
}

/// The xsd type a `@datetime` value lexically matches, if any.
fn temporal_datatype(value: &str) -> Option<NamedNodeRef<'static>> {
    use oxrdf::vocab::xsd;

    if oxsdatatypes::Duration::from_str(value).is_ok() {
        Some(xsd::DURATION)
    } else if oxsdatatypes::DateTime::from_str(value).is_ok() {
        Some(xsd::DATE_TIME)
    } else if oxsdatatypes::Date::from_str(value).is_ok() {
        Some(xsd::DATE)
    } else if oxsdatatypes::Time::from_str(value).is_ok() {
        Some(xsd::TIME)
    } else if oxsdatatypes::GYearMonth::from_str(value).is_ok() {
        Some(xsd::G_YEAR_MONTH)
    } else if oxsdatatypes::GYear::from_str(value).is_ok() {
        Some(xsd::G_YEAR)
    } else {
        None
    }
}
