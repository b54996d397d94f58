use std::borrow::Cow;

use pretty_assertions::assert_eq;

use jnlp_xml::{Document, NodeType, TextPos};

#[test]
fn root_and_root_element() {
    let doc = Document::parse("<!-- comment --><jnlp/>").unwrap();
    assert!(doc.root().is_root());
    assert_eq!(doc.root().node_type(), NodeType::Root);
    assert_eq!(doc.root_element().name(), "jnlp");
}

#[test]
fn no_root_element_is_an_error() {
    let err = Document::parse("<!-- comment only -->").unwrap_err();
    assert_eq!(err.to_string(), "the document has no root element");
}

#[test]
fn qualified_names_are_kept_verbatim() {
    let doc = Document::parse("<j:jnlp xmlns:j='http://host/ns'/>").unwrap();
    let root = doc.root_element();
    assert_eq!(root.name(), "j:jnlp");
    assert!(root.has_name("j:jnlp"));
    assert!(!root.has_name("jnlp"));
    // Namespace declarations are ordinary attributes here.
    assert_eq!(root.attribute("xmlns:j"), Some("http://host/ns"));
}

#[test]
fn attribute_absence_is_not_emptiness() {
    let doc = Document::parse("<jnlp spec=''/>").unwrap();
    let root = doc.root_element();
    assert_eq!(root.attribute("spec"), Some(""));
    assert_eq!(root.attribute("version"), None);
    assert!(root.has_attribute("spec"));
    assert!(!root.has_attribute("version"));
}

#[test]
fn attributes_in_document_order() {
    let doc = Document::parse("<jnlp spec='1.0' version='7'/>").unwrap();
    let attrs = doc.root_element().attributes();
    assert_eq!(attrs.len(), 2);
    assert_eq!(attrs[0].name(), "spec");
    assert_eq!(attrs[0].value(), "1.0");
    assert_eq!(attrs[1].name(), "version");
    assert_eq!(attrs[1].value(), "7");
}

#[test]
fn attribute_positions() {
    let doc = Document::parse("<jnlp spec='1.0'/>").unwrap();
    let attr = &doc.root_element().attributes()[0];
    assert_eq!(doc.text_pos_at(attr.pos()), TextPos::new(1, 7));
    assert_eq!(doc.text_pos_at(attr.value_pos()), TextPos::new(1, 13));
}

#[test]
fn duplicated_attribute_is_an_error() {
    let err = Document::parse("<jnlp spec='1' spec='2'/>").unwrap_err();
    assert!(err.to_string().contains("attribute 'spec'"));
    assert!(err.to_string().contains("is already defined"));
}

#[test]
fn attribute_value_normalization() {
    let doc = Document::parse("<jnlp title='a&amp;b' os='a\nb'/>").unwrap();
    let root = doc.root_element();
    assert_eq!(root.attribute("title"), Some("a&b"));
    // Literal whitespace becomes a space.
    assert_eq!(root.attribute("os"), Some("a b"));
}

#[test]
fn children_are_ordered_and_restartable() {
    let doc = Document::parse(
        "<jnlp><information/><security/><resources/></jnlp>",
    )
    .unwrap();
    let root = doc.root_element();

    let names: Vec<_> = root.children().map(|n| n.name()).collect();
    assert_eq!(names, ["information", "security", "resources"]);

    // A second enumeration yields the same sequence.
    let again: Vec<_> = root.children().map(|n| n.name()).collect();
    assert_eq!(names, again);

    let reversed: Vec<_> = root.children().rev().map(|n| n.name()).collect();
    assert_eq!(reversed, ["resources", "security", "information"]);
}

#[test]
fn sibling_navigation() {
    let doc = Document::parse("<jnlp><a/><b/><c/></jnlp>").unwrap();
    let root = doc.root_element();
    let b = root.first_child().unwrap().next_sibling().unwrap();
    assert_eq!(b.name(), "b");
    assert_eq!(b.prev_sibling().unwrap().name(), "a");
    assert_eq!(b.next_sibling().unwrap().name(), "c");
    assert_eq!(root.last_child().unwrap().name(), "c");
    assert!(root.last_child().unwrap().next_sibling().is_none());
}

#[test]
fn descendants_in_document_order() {
    let doc = Document::parse(
        "<jnlp><information><title>T</title></information><resources/></jnlp>",
    )
    .unwrap();
    let kinds: Vec<_> = doc
        .descendants()
        .map(|n| (n.node_type(), n.name().to_string()))
        .collect();
    assert_eq!(
        kinds,
        [
            (NodeType::Root, String::new()),
            (NodeType::Element, "jnlp".to_string()),
            (NodeType::Element, "information".to_string()),
            (NodeType::Element, "title".to_string()),
            (NodeType::Text, String::new()),
            (NodeType::Element, "resources".to_string()),
        ]
    );
}

#[test]
fn text_of_a_single_text_child_borrows() {
    let doc = Document::parse("<title>plain</title>").unwrap();
    let text = doc.root_element().text().unwrap();
    assert!(matches!(text, Cow::Borrowed("plain")));
}

#[test]
fn text_concatenates_direct_text_children() {
    let doc = Document::parse("<vendor>A <![CDATA[&]]><!-- x --> B</vendor>").unwrap();
    // CDATA merges with the preceding text node; the comment splits the rest.
    assert_eq!(doc.root_element().text().as_deref(), Some("A & B"));
}

#[test]
fn text_ignores_nested_elements() {
    let doc = Document::parse("<information>a<title>b</title>c</information>").unwrap();
    assert_eq!(doc.root_element().text().as_deref(), Some("ac"));
}

#[test]
fn element_without_text_children_has_no_text() {
    let doc = Document::parse("<jnlp><information/></jnlp>").unwrap();
    assert_eq!(doc.root_element().text(), None);
}

#[test]
fn comment_and_pi_nodes() {
    let doc = Document::parse("<?pi value?><!-- note --><jnlp/>").unwrap();
    let mut children = doc.root().children();

    let pi = children.next().unwrap();
    assert!(pi.is_pi());
    let pi = pi.pi().unwrap();
    assert_eq!(pi.target, "pi");
    assert_eq!(pi.value, Some("value"));

    let comment = children.next().unwrap();
    assert!(comment.is_comment());
    assert_eq!(comment.text().as_deref(), Some(" note "));
}

#[test]
fn newlines_are_normalized_in_text() {
    let doc = Document::parse("<title>a\r\nb\rc</title>").unwrap();
    assert_eq!(doc.root_element().text().as_deref(), Some("a\nb\nc"));
}

#[test]
fn character_references_in_text() {
    let doc = Document::parse("<title>&#65;&#x42;&lt;</title>").unwrap();
    assert_eq!(doc.root_element().text().as_deref(), Some("AB<"));
}

#[test]
fn internal_entities_expand_as_text() {
    let doc = Document::parse(
        "<!DOCTYPE jnlp [<!ENTITY product 'Demo &amp; Co'>]>\
         <jnlp><title>&product;</title></jnlp>",
    )
    .unwrap();
    let title = doc.descendants().find(|n| n.has_name("title")).unwrap();
    assert_eq!(title.text().as_deref(), Some("Demo & Co"));
}

#[test]
fn nested_internal_entities() {
    let doc = Document::parse(
        "<!DOCTYPE jnlp [<!ENTITY a 'x'><!ENTITY b '&a;y'>]><jnlp>&b;</jnlp>",
    )
    .unwrap();
    assert_eq!(doc.root_element().text().as_deref(), Some("xy"));
}

#[test]
fn entity_reference_loop_is_an_error() {
    let err = Document::parse(
        "<!DOCTYPE jnlp [<!ENTITY a '&b;'><!ENTITY b '&a;'>]><jnlp>&a;</jnlp>",
    )
    .unwrap_err();
    assert!(err.to_string().contains("entity reference loop"));
}

#[test]
fn markup_in_entity_value_is_an_error() {
    let err = Document::parse(
        "<!DOCTYPE jnlp [<!ENTITY e '<icon/>'>]><jnlp>&e;</jnlp>",
    )
    .unwrap_err();
    assert!(err.to_string().contains("markup inside an entity value"));
}

#[test]
fn unknown_entity_reference_is_an_error() {
    let err = Document::parse("<jnlp>&nope;</jnlp>").unwrap_err();
    assert!(err.to_string().contains("unknown entity reference 'nope'"));
}

#[test]
fn mismatched_close_tag_is_an_error() {
    let err = Document::parse("<jnlp></info>").unwrap_err();
    assert_eq!(
        err.to_string(),
        "expected 'jnlp' close tag, not 'info' at 1:7"
    );
}

#[test]
fn node_positions() {
    let doc = Document::parse("<!-- c -->\n<jnlp>\n    <information/>\n</jnlp>").unwrap();
    let root = doc.root_element();
    assert_eq!(root.node_pos(), TextPos::new(2, 1));
    let info = root.first_element_child().unwrap();
    assert_eq!(doc.text_pos_at(info.pos()), TextPos::new(3, 5));
}

#[test]
fn codebase_resolves_upwards() {
    let doc = Document::parse(
        "<jnlp codebase='http://host/app/'>\
           <resources><jar href='a.jar'/></resources>\
         </jnlp>",
    )
    .unwrap();
    let jar = doc.descendants().find(|n| n.has_name("jar")).unwrap();
    assert_eq!(jar.codebase(), Some("http://host/app/"));
}

#[test]
fn codebase_nearest_declaration_wins() {
    let doc = Document::parse(
        "<jnlp codebase='http://host/outer/'>\
           <resources codebase='http://host/inner/'><jar/></resources>\
         </jnlp>",
    )
    .unwrap();
    let jar = doc.descendants().find(|n| n.has_name("jar")).unwrap();
    assert_eq!(jar.codebase(), Some("http://host/inner/"));
}

#[test]
fn codebase_absent_everywhere() {
    let doc = Document::parse("<jnlp><information/></jnlp>").unwrap();
    let info = doc.root_element().first_child().unwrap();
    assert_eq!(info.codebase(), None);
}

#[test]
fn codebase_on_the_node_itself() {
    let doc = Document::parse("<jnlp codebase='http://host/'/>").unwrap();
    assert_eq!(doc.root_element().codebase(), Some("http://host/"));
}
