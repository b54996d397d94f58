use std::error::Error;

use pretty_assertions::assert_eq;

use jnlp_xml::{
    prepare, ParseSettings, ParserMode, SecurityPolicyViolation, Stage, TreeBuildError,
};

const LENIENT: ParseSettings = ParseSettings { strict: false };
const STRICT: ParseSettings = ParseSettings { strict: true };

#[test]
fn well_formed_input_passes_through_unchanged() {
    let raw = b"<?xml version=\"1.0\"?><jnlp><information/></jnlp>";
    let prepared = prepare(raw, None, &LENIENT).unwrap();
    assert_eq!(prepared.as_str().as_bytes(), raw);
    assert!(prepared.repairs().is_empty());
    assert_eq!(prepared.mode(), ParserMode::Lenient);
    assert!(prepared.parse().is_ok());
}

#[test]
fn lenient_mode_repairs_a_bare_ampersand() {
    let raw = b"<?xml version=\"1.0\"?><jnlp><information>A & B</information></jnlp>";
    let prepared = prepare(raw, None, &LENIENT).unwrap();
    assert_eq!(prepared.repairs(), ["escape-bare-ampersands"]);

    let doc = prepared.parse().unwrap();
    let info = doc
        .descendants()
        .find(|n| n.has_name("information"))
        .unwrap();
    assert_eq!(info.text().as_deref(), Some("A & B"));
}

#[test]
fn strict_mode_rejects_a_bare_ampersand() {
    let raw = b"<?xml version=\"1.0\"?><jnlp><information>A & B</information></jnlp>";
    let prepared = prepare(raw, None, &STRICT).unwrap();
    assert!(prepared.repairs().is_empty());
    assert_eq!(prepared.mode(), ParserMode::Strict);

    let err = prepared.parse().unwrap_err();
    assert_eq!(err.stage, Stage::Parsing);
    assert_eq!(err.mode, ParserMode::Strict);
    assert_eq!(
        err.to_string(),
        "invalid XML document syntax (parsing stage, strict mode)"
    );
}

#[test]
fn repair_converges_after_one_pass() {
    let raw = b"<jnlp><vendor>A & B\x0C</vendor></jnlp>";
    let first = prepare(raw, None, &LENIENT).unwrap();
    assert!(!first.repairs().is_empty());

    let second = prepare(first.as_str().as_bytes(), None, &LENIENT).unwrap();
    assert!(second.repairs().is_empty());
    assert_eq!(first.as_str(), second.as_str());
}

#[test]
fn disallowed_control_characters_are_stripped() {
    let raw = b"<jnlp><title>a\x0Cb</title></jnlp>";
    let prepared = prepare(raw, None, &LENIENT).unwrap();
    assert_eq!(prepared.repairs(), ["strip-disallowed-chars"]);

    let doc = prepared.parse().unwrap();
    assert_eq!(doc.root_element().text().as_deref(), Some("ab"));
}

#[test]
fn strict_mode_rejects_disallowed_control_characters() {
    let raw = b"<jnlp><title>a\x0Cb</title></jnlp>";
    let prepared = prepare(raw, None, &STRICT).unwrap();
    let err = prepared.parse().unwrap_err();
    assert_eq!(err.stage, Stage::Parsing);
}

#[test]
fn recognized_references_are_not_double_escaped() {
    let raw = b"<jnlp><title>A &amp; B &#169;</title></jnlp>";
    let prepared = prepare(raw, None, &LENIENT).unwrap();
    assert!(prepared.repairs().is_empty());

    let doc = prepared.parse().unwrap();
    assert_eq!(doc.root_element().text().as_deref(), Some("A & B \u{a9}"));
}

#[test]
fn utf16le_bom_is_honored() {
    let mut raw = vec![0xFF, 0xFE];
    for unit in "<jnlp version='1'/>".encode_utf16() {
        raw.extend_from_slice(&unit.to_le_bytes());
    }

    let prepared = prepare(&raw, None, &LENIENT).unwrap();
    assert_eq!(prepared.charset(), "UTF-16LE");

    let doc = prepared.parse().unwrap();
    assert_eq!(doc.root_element().attribute("version"), Some("1"));
}

#[test]
fn declared_encoding_overrides_the_transport_hint() {
    let raw = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><jnlp vendor='caf\xE9'/>";
    let prepared = prepare(raw, Some("UTF-8"), &LENIENT).unwrap();
    let doc = prepared.parse().unwrap();
    assert_eq!(doc.root_element().attribute("vendor"), Some("caf\u{e9}"));
}

#[test]
fn transport_hint_applies_without_bom_or_declaration() {
    let raw = b"<jnlp vendor='caf\xE9'/>";
    let prepared = prepare(raw, Some("ISO-8859-1"), &LENIENT).unwrap();
    let doc = prepared.parse().unwrap();
    assert_eq!(doc.root_element().attribute("vendor"), Some("caf\u{e9}"));
}

#[test]
fn undecodable_bytes_fail_in_the_decoding_stage() {
    // Not valid UTF-8 and nothing declares another charset.
    let err = prepare(b"<jnlp vendor='caf\xE9'/>", None, &LENIENT).unwrap_err();
    assert_eq!(err.stage, Stage::Decoding);
    assert_eq!(err.mode, ParserMode::Lenient);
    assert!(err.source().is_some());
}

#[test]
fn unknown_declared_charset_fails_in_the_decoding_stage() {
    let raw = b"<?xml version=\"1.0\" encoding=\"x-bogus\"?><jnlp/>";
    let err = prepare(raw, None, &LENIENT).unwrap_err();
    assert_eq!(err.stage, Stage::Decoding);
    assert!(err.source().unwrap().to_string().contains("x-bogus"));
}

#[test]
fn external_dtd_subset_is_skipped_without_fetching() {
    // The URL must never be resolved; the document still parses.
    let raw = b"<!DOCTYPE jnlp SYSTEM \"http://192.0.2.1/jnlp.dtd\"><jnlp/>";
    let prepared = prepare(raw, None, &LENIENT).unwrap();
    let doc = prepared.parse().unwrap();
    assert_eq!(doc.root_element().name(), "jnlp");
}

#[test]
fn referencing_an_external_entity_is_fatal() {
    let raw = b"<!DOCTYPE jnlp [<!ENTITY ext SYSTEM \"http://192.0.2.1/x\">]>\
                <jnlp>&ext;</jnlp>";
    let prepared = prepare(raw, None, &LENIENT).unwrap();
    let err = prepared.parse().unwrap_err();
    assert_eq!(err.stage, Stage::Parsing);

    let cause = err
        .cause
        .as_ref()
        .unwrap()
        .downcast_ref::<TreeBuildError>()
        .unwrap();
    assert!(matches!(
        cause,
        TreeBuildError::Security(SecurityPolicyViolation::ExternalEntityReference { name, .. })
            if name == "ext"
    ));
}

#[test]
fn declaring_an_unused_external_entity_is_harmless() {
    let raw = b"<!DOCTYPE jnlp [<!ENTITY ext SYSTEM \"http://192.0.2.1/x\">]><jnlp/>";
    let prepared = prepare(raw, None, &LENIENT).unwrap();
    assert!(prepared.parse().is_ok());
}

#[test]
fn internal_entities_survive_the_full_pipeline() {
    let raw = b"<!DOCTYPE jnlp [<!ENTITY product 'Demo'>]>\
                <jnlp><title>&product;</title></jnlp>";
    let prepared = prepare(raw, None, &LENIENT).unwrap();
    let doc = prepared.parse().unwrap();
    let title = doc.descendants().find(|n| n.has_name("title")).unwrap();
    assert_eq!(title.text().as_deref(), Some("Demo"));
}

#[test]
fn failure_source_chain_reaches_the_engine() {
    let prepared = prepare(b"<jnlp><</jnlp>", None, &STRICT).unwrap();
    let err = prepared.parse().unwrap_err();

    // ParseFailure -> TreeBuildError -> engine error.
    let level1 = err.source().unwrap();
    let level2 = level1.source().unwrap();
    assert!(level2.to_string().contains("at 1:"));
}

#[test]
fn strict_mode_never_rewrites_the_text() {
    let raw = b"<jnlp><title>A &amp; B</title></jnlp>";
    let prepared = prepare(raw, None, &STRICT).unwrap();
    assert_eq!(prepared.as_str().as_bytes(), raw);
}
