//! RDF terms as produced by the processor.
//!
//! Values are `oxrdf` types. This module adds the pieces that are specific to
//! RDFa extraction: the vocabularies the processor emits, blank-node labels
//! that are scoped to one parse, and the rule for building literals.

use std::collections::HashMap;

use oxrdf::{BlankNode, Literal, NamedNodeRef, vocab::rdf};

pub mod rdfa_vocab {
    use oxrdf::NamedNodeRef;

    pub static USES_VOCABULARY: NamedNodeRef =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#usesVocabulary");
}

pub mod xhv_vocab {
    use oxrdf::NamedNodeRef;

    pub static NAMESPACE: &str = "http://www.w3.org/1999/xhtml/vocab#";

    pub static ROLE: NamedNodeRef =
        NamedNodeRef::new_unchecked("http://www.w3.org/1999/xhtml/vocab#role");
}

pub static RDF_HTML: NamedNodeRef =
    NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#HTML");

/// Allocates blank nodes for one parse.
///
/// Labels are `b0`, `b1`, ... in allocation order, so the same input always
/// yields the same labels. Labels written in the document (`_:x`) are mapped
/// onto allocated nodes, which keeps them from colliding with generated ones.
#[derive(Default)]
pub struct BlankNodes {
    next: usize,
    named: HashMap<String, BlankNode>,
}

impl BlankNodes {
    pub fn fresh(&mut self) -> BlankNode {
        let id = self.next;
        self.next += 1;
        BlankNode::new_unchecked(format!("b{id}"))
    }

    /// The node for a document label. The empty label is the `[_:]` node.
    pub fn labelled(&mut self, label: &str) -> BlankNode {
        if let Some(node) = self.named.get(label) {
            return node.clone();
        }

        let node = self.fresh();
        self.named.insert(label.to_string(), node.clone());
        node
    }
}

/// Builds a literal from a lexical value and the in-scope language and datatype.
///
/// A datatype always wins over a language. `rdf:langString` needs a language
/// and falls back to a simple literal without one; the caller is told so it
/// can raise an advisory.
pub fn make_literal(
    value: &str,
    language: Option<&str>,
    datatype: Option<NamedNodeRef<'_>>,
) -> (Literal, bool) {
    match datatype {
        Some(dt) if dt == rdf::LANG_STRING => match language {
            Some(lang) => (
                Literal::new_language_tagged_literal_unchecked(value, lang),
                false,
            ),
            None => (Literal::new_simple_literal(value), true),
        },
        Some(dt) => (Literal::new_typed_literal(value, dt), false),
        None => match language {
            Some(lang) => (
                Literal::new_language_tagged_literal_unchecked(value, lang),
                false,
            ),
            None => (Literal::new_simple_literal(value), false),
        },
    }
}
