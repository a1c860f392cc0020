use oxrdf::vocab::{rdf, xsd};
use pretty_assertions::assert_eq;
use rdfa_extract::{
    BoundaryQuad, BoundaryTerm, ContentType, Extractor, ListStyle, ParserOptions, SinkError,
    TermKind, parse,
};

mod utils;

const HTML: &str = "text/html";
const XHTML: &str = "application/xhtml+xml";

fn boundary_quads(markup: &str, content_type: &str) -> Vec<BoundaryQuad> {
    let mut quads = Vec::new();
    let outcome = parse(markup, "http://ex/", content_type, &mut quads);
    assert!(outcome.success, "parse failed: {:?}", outcome.error);
    quads
}

fn named(iri: &str) -> BoundaryTerm {
    BoundaryTerm {
        kind: TermKind::NamedNode,
        value: iri.to_string(),
        language: None,
        datatype: None,
    }
}

fn string_literal(value: &str) -> BoundaryTerm {
    BoundaryTerm {
        kind: TermKind::Literal,
        value: value.to_string(),
        language: None,
        datatype: Some(xsd::STRING.as_str().to_string()),
    }
}

#[test]
fn typed_subject_with_property() {
    let quads = boundary_quads(
        r##"<div about="#a" typeof="foaf:Person"><span property="foaf:name">Alice</span></div>"##,
        HTML,
    );

    assert_eq!(
        quads,
        vec![
            BoundaryQuad {
                subject: named("http://ex/#a"),
                predicate: named(rdf::TYPE.as_str()),
                object: named("http://xmlns.com/foaf/0.1/Person"),
                graph: BoundaryTerm::default_graph(),
            },
            BoundaryQuad {
                subject: named("http://ex/#a"),
                predicate: named("http://xmlns.com/foaf/0.1/name"),
                object: string_literal("Alice"),
                graph: BoundaryTerm::default_graph(),
            },
        ]
    );
}

#[test]
fn xhtml_with_unclosed_elements_is_recovered() {
    let quads = boundary_quads(
        r##"<html xmlns="http://www.w3.org/1999/xhtml"><body><div about="#x" property="dc:title">T</div><p>unclosed</body></html>"##,
        XHTML,
    );

    assert_eq!(
        quads,
        vec![BoundaryQuad {
            subject: named("http://ex/#x"),
            predicate: named("http://purl.org/dc/terms/title"),
            object: string_literal("T"),
            graph: BoundaryTerm::default_graph(),
        }]
    );
}

#[test]
fn untokenizable_xhtml_fails_without_delivering() {
    let mut quads: Vec<BoundaryQuad> = Vec::new();
    let outcome = parse(
        r##"<html xmlns="http://www.w3.org/1999/xhtml"><body><p about="#x" property="dc:title">T</p><div class="unterminated"##,
        "http://ex/",
        XHTML,
        &mut quads,
    );

    assert!(!outcome.success);
    assert!(!outcome.error.unwrap_or_default().is_empty());
    assert!(quads.is_empty());
}

#[test]
fn incomplete_triple_completed_by_child() {
    let quads = boundary_quads(
        r##"<div about="#alice" rel="foaf:knows"><p about="#bob"></p></div>"##,
        HTML,
    );

    assert_eq!(
        quads,
        vec![BoundaryQuad {
            subject: named("http://ex/#alice"),
            predicate: named("http://xmlns.com/foaf/0.1/knows"),
            object: named("http://ex/#bob"),
            graph: BoundaryTerm::default_graph(),
        }]
    );
}

#[test]
fn repeated_parses_are_identical() {
    let markup = r#"
        <div vocab="http://schema.org/" typeof="Person">
          <span property="name">Ann</span>
          <div rel="knows"><span typeof="Person" property="name">Bob</span></div>
          <ol><li property="award" inlist>First</li><li property="award" inlist>Second</li></ol>
        </div>"#;

    let first = boundary_quads(markup, HTML);
    let second = boundary_quads(markup, HTML);
    assert!(first.iter().any(|q| q.subject.kind == TermKind::BlankNode));
    assert_eq!(first, second);
}

#[test]
fn undeclared_prefixes_never_leak() {
    let quads = boundary_quads(
        r#"<div about="nope:thing" typeof="nope:Class">
             <span property="nope:p other:q foaf:name">V</span>
             <a rel="nope:r" href="http://example.com/x">x</a>
           </div>"#,
        HTML,
    );

    for quad in &quads {
        for term in [&quad.subject, &quad.predicate, &quad.object] {
            assert!(
                !term.value.starts_with("nope:") && !term.value.starts_with("other:"),
                "unresolved CURIE in {quad:?}"
            );
        }
    }

    assert!(quads.iter().any(|q| {
        q.predicate == named("http://xmlns.com/foaf/0.1/name") && q.object == string_literal("V")
    }));
}

#[test]
fn full_iris_with_unmapped_schemes_are_kept() {
    let quads = boundary_quads(
        r#"<p about="urn:isbn:0451450523" property="http://purl.org/dc/terms/title">Dune</p>"#,
        HTML,
    );

    assert_eq!(quads.len(), 1);
    assert_eq!(quads[0].subject, named("urn:isbn:0451450523"));
    assert_eq!(quads[0].predicate, named("http://purl.org/dc/terms/title"));
}

#[test]
fn list_members_follow_document_order_and_wait_for_close() {
    let markup = r##"
        <div prefix="ex: http://example.org/vocab#" about="#list">
          <span property="ex:item" inlist>1</span>
          <span property="ex:item" inlist>2</span>
          <span property="ex:other">after</span>
          <span property="ex:item" inlist>3</span>
        </div>
        <p about="#later" property="dc:title">later</p>"##;

    let quads = utils::collect(markup, &ParserOptions::default());

    insta::assert_snapshot!(utils::nquads(&quads), @r#"
    <http://example.org/#list> <http://example.org/vocab#other> "after" .
    <http://example.org/#list> <http://example.org/vocab#item> "1" .
    <http://example.org/#list> <http://example.org/vocab#item> "2" .
    <http://example.org/#list> <http://example.org/vocab#item> "3" .
    <http://example.org/#later> <http://purl.org/dc/terms/title> "later" .
    "#);
}

#[test]
fn lists_as_collections() {
    let markup = r##"<p prefix="ex: http://example.org/vocab#" about="#s">
        <span property="ex:seq" inlist>a</span><span property="ex:seq" inlist>b</span>
        <span rel="ex:empty" inlist></span>
    </p>"##;

    let options = ParserOptions::default().with_list_style(ListStyle::Collection);
    let quads = utils::collect(markup, &options);

    insta::assert_snapshot!(utils::nquads(&quads), @r#"
    <http://example.org/#s> <http://example.org/vocab#seq> _:b1 .
    _:b1 <http://www.w3.org/1999/02/22-rdf-syntax-ns#first> "a" .
    _:b1 <http://www.w3.org/1999/02/22-rdf-syntax-ns#rest> _:b2 .
    _:b2 <http://www.w3.org/1999/02/22-rdf-syntax-ns#first> "b" .
    _:b2 <http://www.w3.org/1999/02/22-rdf-syntax-ns#rest> <http://www.w3.org/1999/02/22-rdf-syntax-ns#nil> .
    <http://example.org/#s> <http://example.org/vocab#empty> <http://www.w3.org/1999/02/22-rdf-syntax-ns#nil> .
    "#);
}

#[test]
fn blank_node_subjects_snapshot() {
    let markup = r#"<div prefix="ex: http://example.org/vocab#" typeof="ex:Thing">
        <span property="ex:name">A</span>
        <a rel="ex:link" href="/other">x</a>
    </div>"#;

    let quads = utils::collect(markup, &ParserOptions::default());
    insta::assert_snapshot!(utils::nquads(&quads), @r#"
    _:b0 <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.org/vocab#Thing> .
    _:b0 <http://example.org/vocab#name> "A" .
    _:b0 <http://example.org/vocab#link> <http://example.org/other> .
    "#);
}

#[test]
fn datatype_wins_over_lang() {
    let quads = boundary_quads(
        r##"<p about="#x" lang="en" property="ex:n" prefix="ex: http://example.org/vocab#"
              datatype="xsd:integer">5</p>"##,
        HTML,
    );

    assert_eq!(quads.len(), 1);
    assert_eq!(
        quads[0].object,
        BoundaryTerm {
            kind: TermKind::Literal,
            value: "5".into(),
            language: None,
            datatype: Some(xsd::INTEGER.as_str().into()),
        }
    );
}

#[test]
fn lang_string_needs_a_language() {
    let quads = boundary_quads(
        r##"<div>
             <p about="#a" property="dc:title" datatype="rdf:langString">plain</p>
             <p about="#b" property="dc:title" datatype="rdf:langString" lang="de">Hallo</p>
           </div>"##,
        HTML,
    );

    assert_eq!(quads.len(), 2);
    assert_eq!(quads[0].object, string_literal("plain"));
    assert_eq!(quads[1].object.language.as_deref(), Some("de"));
    assert_eq!(
        quads[1].object.datatype.as_deref(),
        Some(rdf::LANG_STRING.as_str())
    );
}

#[test]
fn boundary_terms_as_json() {
    let quads = boundary_quads(r##"<p about="#x" property="dc:title" lang="fr">Bonjour</p>"##, HTML);

    insta::assert_snapshot!(serde_json::to_string_pretty(&quads[0].object).unwrap(), @r#"
    {
      "kind": "Literal",
      "value": "Bonjour",
      "language": "fr",
      "datatype": "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString"
    }
    "#);
}

#[test]
fn sink_failures_do_not_stop_the_parse() {
    let markup = r##"<div about="#x">
        <span property="dc:a">1</span>
        <span property="dc:b">2</span>
        <span property="dc:c">3</span>
    </div>"##;

    let mut seen = Vec::new();
    let outcome = parse(markup, "http://ex/", HTML, &mut |_s: BoundaryTerm,
                                                          p: BoundaryTerm,
                                                          _o: BoundaryTerm,
                                                          _g: BoundaryTerm| {
        seen.push(p.value.clone());
        match seen.len() {
            1 => Err(SinkError::new("not today")),
            2 => panic!("consumer crashed"),
            _ => Ok(()),
        }
    });

    assert!(outcome.success);
    assert_eq!(
        seen,
        vec![
            "http://purl.org/dc/terms/a",
            "http://purl.org/dc/terms/b",
            "http://purl.org/dc/terms/c",
        ]
    );
}

#[test]
fn cancelled_before_start() {
    let extractor = Extractor::default();
    assert!(extractor.cancellation().cancel());

    let mut quads: Vec<BoundaryQuad> = Vec::new();
    let outcome = extractor.parse(r##"<p about="#x" property="dc:title">T</p>"##, "http://ex/", HTML, &mut quads);

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("parse cancelled"));
    assert!(quads.is_empty());
}

#[test]
fn cancelled_from_the_sink() {
    let extractor = Extractor::default();
    let signal = extractor.cancellation();
    let markup = r##"<div about="#x">
        <span property="dc:a">1</span>
        <span property="dc:b">2</span>
    </div>"##;

    let mut delivered = 0;
    let outcome = extractor.parse(markup, "http://ex/", HTML, &mut |_s: BoundaryTerm,
                                                                   _p: BoundaryTerm,
                                                                   _o: BoundaryTerm,
                                                                   _g: BoundaryTerm| {
        delivered += 1;
        signal.cancel();
        Ok(())
    });

    assert!(!outcome.success);
    assert_eq!(delivered, 1);
}

#[test]
fn cancellation_ends_with_the_parse() {
    let extractor = Extractor::default();
    let stale = extractor.cancellation();
    stale.cancel();

    let mut quads: Vec<BoundaryQuad> = Vec::new();
    let outcome = extractor.parse(r##"<p about="#x" property="dc:title">T</p>"##, "http://ex/", HTML, &mut quads);
    assert!(!outcome.success);

    stale.cancel();
    let outcome = extractor.parse(r##"<p about="#y" property="dc:title">T</p>"##, "http://ex/", HTML, &mut quads);
    assert!(outcome.success, "parse failed: {:?}", outcome.error);
    assert_eq!(
        quads,
        vec![BoundaryQuad {
            subject: named("http://ex/#y"),
            predicate: named("http://purl.org/dc/terms/title"),
            object: string_literal("T"),
            graph: BoundaryTerm::default_graph(),
        }]
    );
    assert!(!extractor.cancellation().is_cancelled());
}

#[test]
fn host_strings_are_decoded() {
    let markup = r##"<p about="#x" property="dc:title">😀 ünïcödé</p>"##;
    let units: Vec<u16> = markup.encode_utf16().collect();

    let mut quads: Vec<BoundaryQuad> = Vec::new();
    let outcome = Extractor::default().parse_host(&units, "http://ex/", HTML, &mut quads);

    assert!(outcome.success);
    assert_eq!(quads[0].object, string_literal("😀 ünïcödé"));
}

#[test]
fn well_formed_xhtml() {
    let quads = boundary_quads(
        r##"<html xmlns="http://www.w3.org/1999/xhtml"><body><p about="#x" property="dc:title">T &amp; U</p><br/></body></html>"##,
        "application/xhtml+xml; charset=utf-8",
    );

    assert_eq!(quads.len(), 1);
    assert_eq!(quads[0].object, string_literal("T & U"));
}

#[test]
fn extract_graph_collects_everything() {
    let graph = rdfa_extract::extract_graph(
        r##"<div about="#a" typeof="foaf:Person"><span property="foaf:name">Alice</span></div>"##,
        utils::base(),
        &ParserOptions::for_content_type(ContentType::Html),
    )
    .unwrap();

    assert_eq!(graph.len(), 2);
}
