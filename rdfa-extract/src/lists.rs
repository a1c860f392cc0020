//! List mappings: values collected for `@inlist` predicates.
//!
//! A mapping belongs to the element that instantiated it and is shared (by
//! reference) with descendants that keep the same subject. It is flushed to
//! quads exactly once, when the owning element closes.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use log::trace;
use oxrdf::vocab::rdf;
use oxrdf::{NamedNode, NamedOrBlankNode, Quad, Term, TermRef, TripleRef};

use crate::model::BlankNodes;
use crate::options::ListStyle;

pub type SharedList = Rc<RefCell<Vec<Rc<Term>>>>;

#[derive(Default)]
pub struct ListMapping {
    // first-use order, which is document order
    lists: IndexMap<NamedNode, SharedList>,
}

impl ListMapping {
    /// The list for `predicate`, instantiated empty if it does not exist yet.
    pub fn ensure_list(&mut self, predicate: &NamedNode) -> SharedList {
        if let Some(list) = self.lists.get(predicate) {
            return list.clone();
        }

        trace!(" - Created new list for predicate: {predicate}");
        let list = SharedList::default();
        self.lists.insert(predicate.clone(), list.clone());
        list
    }

    pub fn append(&mut self, predicate: &NamedNode, value: Rc<Term>) {
        trace!(" - Inserting into list ({predicate}): {value}");
        self.ensure_list(predicate).borrow_mut().push(value);
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Drains every list into quads about `subject`.
    ///
    /// The mapping is empty afterwards, so flushing it again yields nothing.
    pub fn flush_all(
        &mut self,
        subject: &NamedOrBlankNode,
        style: ListStyle,
        blank_nodes: &mut BlankNodes,
    ) -> Vec<Quad> {
        let mut quads = Vec::new();
        for (predicate, list) in std::mem::take(&mut self.lists) {
            let members = list.take();
            match style {
                ListStyle::Members => {
                    if members.is_empty() {
                        quads.push(quad(TripleRef::new(subject, &predicate, rdf::NIL)));
                    }
                    for member in &members {
                        quads.push(quad(TripleRef::new(subject, &predicate, member.as_ref())));
                    }
                }
                ListStyle::Collection => {
                    let cells: Vec<NamedOrBlankNode> = members
                        .iter()
                        .map(|_| blank_nodes.fresh().into())
                        .collect();

                    let head: TermRef<'_> = match cells.first() {
                        Some(cell) => cell.into(),
                        None => rdf::NIL.into(),
                    };
                    quads.push(quad(TripleRef::new(subject, &predicate, head)));

                    for (ix, (cell, member)) in cells.iter().zip(&members).enumerate() {
                        quads.push(quad(TripleRef::new(cell, rdf::FIRST, member.as_ref())));
                        let rest: TermRef<'_> = match cells.get(ix + 1) {
                            Some(next) => next.into(),
                            None => rdf::NIL.into(),
                        };
                        quads.push(quad(TripleRef::new(cell, rdf::REST, rest)));
                    }
                }
            }
        }
        quads
    }
}

fn quad(triple: TripleRef<'_>) -> Quad {
    triple.into_owned().in_graph(oxrdf::GraphName::DefaultGraph)
}

#[cfg(test)]
mod tests {
    use oxrdf::Literal;
    use pretty_assertions::assert_eq;

    use super::*;

    fn iri(s: &str) -> NamedNode {
        NamedNode::new_unchecked(s)
    }

    fn lit(s: &str) -> Rc<Term> {
        Rc::new(Literal::new_simple_literal(s).into())
    }

    fn render(quads: &[Quad]) -> Vec<String> {
        quads.iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn members_flush_in_order() {
        let mut mapping = ListMapping::default();
        let p = iri("http://ex/p");
        let q = iri("http://ex/q");
        mapping.append(&q, lit("x"));
        mapping.append(&p, lit("1"));
        mapping.append(&q, lit("y"));
        mapping.ensure_list(&iri("http://ex/empty"));

        let subject: NamedOrBlankNode = iri("http://ex/s").into();
        let quads = mapping.flush_all(&subject, ListStyle::Members, &mut BlankNodes::default());
        assert_eq!(
            render(&quads),
            vec![
                r#"<http://ex/s> <http://ex/q> "x""#,
                r#"<http://ex/s> <http://ex/q> "y""#,
                r#"<http://ex/s> <http://ex/p> "1""#,
                "<http://ex/s> <http://ex/empty> <http://www.w3.org/1999/02/22-rdf-syntax-ns#nil>",
            ]
        );

        assert!(mapping.is_empty());
        assert!(
            mapping
                .flush_all(&subject, ListStyle::Members, &mut BlankNodes::default())
                .is_empty()
        );
    }

    #[test]
    fn collection_flush() {
        let mut mapping = ListMapping::default();
        let p = iri("http://ex/p");
        mapping.append(&p, lit("a"));
        mapping.append(&p, lit("b"));

        let subject: NamedOrBlankNode = iri("http://ex/s").into();
        let quads = mapping.flush_all(
            &subject,
            ListStyle::Collection,
            &mut BlankNodes::default(),
        );
        let rdf = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
        assert_eq!(
            render(&quads),
            vec![
                "<http://ex/s> <http://ex/p> _:b0".to_string(),
                format!(r#"_:b0 <{rdf}first> "a""#),
                format!("_:b0 <{rdf}rest> _:b1"),
                format!(r#"_:b1 <{rdf}first> "b""#),
                format!("_:b1 <{rdf}rest> <{rdf}nil>"),
            ]
        );
    }

    #[test]
    fn shared_list_sees_later_appends() {
        let mut mapping = ListMapping::default();
        let p = iri("http://ex/p");
        let list = mapping.ensure_list(&p);
        list.borrow_mut().push(lit("late"));
        let subject: NamedOrBlankNode = iri("http://ex/s").into();
        let quads = mapping.flush_all(&subject, ListStyle::Members, &mut BlankNodes::default());
        assert_eq!(render(&quads), vec![r#"<http://ex/s> <http://ex/p> "late""#]);
    }
}
