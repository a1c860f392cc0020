// Processing rules from https://www.w3.org/TR/rdfa-core/
use rstest::rstest;

mod utils;

#[rstest]
#[case::vocabulary_terms(
    r#"<div vocab="http://schema.org/" typeof="Person"><span property="name">Ann</span></div>"#,
    r#"
    @prefix rdfa: <http://www.w3.org/ns/rdfa#> .
    <> rdfa:usesVocabulary <http://schema.org/> .
    [] a <http://schema.org/Person> ; <http://schema.org/name> "Ann" .
    "#
)]
#[case::safe_curie_about(
    r#"<p about="[foaf:Alice]" property="foaf:name">Alice</p>"#,
    r#"<http://xmlns.com/foaf/0.1/Alice> <http://xmlns.com/foaf/0.1/name> "Alice" ."#
)]
#[case::unresolvable_safe_curie_is_ignored(
    r#"<p about="[nope:x]" property="dc:title">T</p>"#,
    r#"<> <http://purl.org/dc/terms/title> "T" ."#
)]
#[case::blank_node_labels(
    r#"<p about="_:a" property="dc:title">T</p><p about="_:a" property="dc:creator">C</p>"#,
    r#"_:x <http://purl.org/dc/terms/title> "T" ; <http://purl.org/dc/terms/creator> "C" ."#
)]
#[case::reverse_relation(
    r##"<div about="#a" rev="foaf:knows" resource="#b"></div>"##,
    r#"<#b> <http://xmlns.com/foaf/0.1/knows> <#a> ."#
)]
#[case::reverse_incomplete_triples(
    r##"<div about="#a" rev="foaf:knows"><p about="#b"></p></div>"##,
    r#"<#b> <http://xmlns.com/foaf/0.1/knows> <#a> ."#
)]
#[case::prefixes_are_case_insensitive(
    r##"<p prefix="EX: http://example.org/vocab#" about="#x" property="ex:name EX:label">N</p>"##,
    r#"<#x> <http://example.org/vocab#name> "N" ; <http://example.org/vocab#label> "N" ."#
)]
#[case::xmlns_prefix(
    r##"<p xmlns:ex="http://example.org/vocab#" about="#x" property="ex:name">N</p>"##,
    r#"<#x> <http://example.org/vocab#name> "N" ."#
)]
#[case::prefix_attribute_overrides_xmlns(
    r##"<p xmlns:ex="http://wrong.example/" prefix="ex: http://example.org/vocab#" about="#x" property="ex:name">N</p>"##,
    r#"<#x> <http://example.org/vocab#name> "N" ."#
)]
#[case::typed_content(
    r##"<span about="#x" property="dc:date" content="2020-01-01" datatype="xsd:date">Jan 1</span>"##,
    r#"<#x> <http://purl.org/dc/terms/date> "2020-01-01"^^<http://www.w3.org/2001/XMLSchema#date> ."#
)]
#[case::xml_literal(
    r##"<p about="#x" property="dc:description" datatype="rdf:XMLLiteral">Some <em>bold</em> text</p>"##,
    r#"<#x> <http://purl.org/dc/terms/description> "Some <em>bold</em> text"^^<http://www.w3.org/1999/02/22-rdf-syntax-ns#XMLLiteral> ."#
)]
#[case::property_ignores_term_rel(
    r##"<a about="#x" rel="license" property="dc:title" href="http://example.org/lic">Lic</a>"##,
    r#"<#x> <http://purl.org/dc/terms/title> <http://example.org/lic> ."#
)]
#[case::language_is_inherited(
    r##"<div lang="de"><p about="#x" property="dc:title">Hallo</p></div>"##,
    r#"<#x> <http://purl.org/dc/terms/title> "Hallo"@de ."#
)]
#[case::xml_lang_wins_over_lang(
    r##"<p about="#x" property="dc:title" xml:lang="fr" lang="de">Salut</p>"##,
    r#"<#x> <http://purl.org/dc/terms/title> "Salut"@fr ."#
)]
#[case::empty_lang_resets(
    r##"<div lang="de"><p about="#x" property="dc:title" lang="">Hallo</p></div>"##,
    r#"<#x> <http://purl.org/dc/terms/title> "Hallo" ."#
)]
#[case::chained_incomplete_triples(
    r##"<div about="#me" rel="foaf:knows">
          <div typeof="foaf:Person"><span property="foaf:name">Bob</span></div>
        </div>"##,
    r#"
    @prefix foaf: <http://xmlns.com/foaf/0.1/> .
    <#me> foaf:knows [ a foaf:Person ; foaf:name "Bob" ] .
    "#
)]
#[case::blank_node_predicates_are_dropped(
    r##"<p about="#x" property="_:p dc:title">T</p>"##,
    r#"<#x> <http://purl.org/dc/terms/title> "T" ."#
)]
#[case::inlist_resources(
    r##"<p about="#x" rel="dc:contributor" inlist>
          <a href="#a">A</a>
          <a href="#b">B</a>
        </p>"##,
    r#"<#x> <http://purl.org/dc/terms/contributor> <#a>, <#b> ."#
)]
fn rdfa_core(#[case] html: &str, #[case] ttl: &str) {
    utils::assert_graph(html, ttl);
}
