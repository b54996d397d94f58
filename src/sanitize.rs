//! Best-effort repair of near-well-formed descriptor documents.
//!
//! Real-world descriptors are frequently hand-written or templated and carry
//! a small set of recurring defects that a strict parser would reject
//! outright. This module applies a fixed, ordered table of narrowly scoped
//! rewrite rules. The core invariant is *do no harm*: every rule is a
//! byte-identical no-op on input that is already well-formed.
//!
//! Each applied rule is logged and reported back by name, so callers can
//! observe that a malformed (possibly malicious) document was silently
//! repaired.

use std::borrow::Cow;

use crate::error::SanitizationError;

type RuleFn = fn(&str) -> Result<Option<String>, SanitizationError>;

struct Rule {
    name: &'static str,
    apply: RuleFn,
}

/// The repair table. Ordered, immutable, safe for concurrent reads.
///
/// Rules are independent: none touches text outside of its specific target,
/// so they compose in any order on disjoint defects.
static RULES: &[Rule] = &[
    Rule {
        name: "strip-disallowed-chars",
        apply: strip_disallowed_chars,
    },
    Rule {
        name: "escape-bare-ampersands",
        apply: escape_bare_ampersands,
    },
];

/// Runs the repair table over decoded text.
///
/// Returns the (possibly repaired) text together with the names of the rules
/// that changed it. Well-formed input always comes back borrowed and
/// untouched, with an empty rule list.
///
/// A rule that cannot run is logged and skipped; sanitization never fails.
pub fn sanitize(text: &str) -> (Cow<'_, str>, Vec<&'static str>) {
    let mut current = Cow::Borrowed(text);
    let mut applied = Vec::new();

    for rule in RULES {
        match (rule.apply)(&current) {
            Ok(Some(repaired)) => {
                log::debug!("sanitizer rule '{}' repaired the document", rule.name);
                applied.push(rule.name);
                current = Cow::Owned(repaired);
            }
            Ok(None) => {}
            Err(err) => {
                log::warn!("sanitizer rule skipped: {}", err);
            }
        }
    }

    (current, applied)
}

/// Removes characters outside the XML `Char` production.
///
/// Some producers embed raw control characters (NUL padding is a classic);
/// a conformant parser rejects the whole document for them. Disallowed
/// characters are illegal in every XML context, including CDATA and
/// comments, so filtering the whole stream cannot alter valid input.
fn strip_disallowed_chars(text: &str) -> Result<Option<String>, SanitizationError> {
    if !text.chars().any(is_disallowed_char) {
        return Ok(None);
    }
    Ok(Some(
        text.chars().filter(|&c| !is_disallowed_char(c)).collect(),
    ))
}

/// Checks for characters outside the XML 1.0 `Char` production.
///
/// Tab, CR and LF are the only permitted controls. Surrogate code points
/// cannot occur in a `&str`, so they need no check here.
fn is_disallowed_char(c: char) -> bool {
    !matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Rewrites a bare `&` into `&amp;`.
///
/// An `&` that does not begin a character reference or a syntactically valid
/// entity reference is the single most common defect in hand-written
/// descriptors (`<vendor>A & B</vendor>`). The rule skips comments, CDATA
/// sections, processing instructions and DOCTYPE internal subsets, where a
/// bare `&` is legal and must not be altered.
fn escape_bare_ampersands(text: &str) -> Result<Option<String>, SanitizationError> {
    let bytes = text.as_bytes();
    let mut out: Option<String> = None;
    let mut copied_to = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'<' => {
                let rest = &bytes[i..];
                if rest.starts_with(b"<!--") {
                    i = skip_past(bytes, i + 4, b"-->");
                } else if rest.starts_with(b"<![CDATA[") {
                    i = skip_past(bytes, i + 9, b"]]>");
                } else if rest.starts_with(b"<?") {
                    i = skip_past(bytes, i + 2, b"?>");
                } else if rest.starts_with(b"<!") {
                    i = skip_markup_decl(bytes, i);
                } else {
                    i += 1;
                }
            }
            b'&' if !is_reference_at(text, i) => {
                let out = out.get_or_insert_with(|| String::with_capacity(text.len() + 8));
                out.push_str(&text[copied_to..i]);
                out.push_str("&amp;");
                copied_to = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    Ok(out.map(|mut repaired| {
        repaired.push_str(&text[copied_to..]);
        repaired
    }))
}

/// Advances past the next occurrence of `terminator`, or to the end of input
/// when it is missing (truncated markup is someone else's error to report).
fn skip_past(bytes: &[u8], from: usize, terminator: &[u8]) -> usize {
    bytes[from..]
        .windows(terminator.len())
        .position(|window| window == terminator)
        .map(|pos| from + pos + terminator.len())
        .unwrap_or(bytes.len())
}

/// Advances past a `<!...>` markup declaration, balancing nested `<` / `>`
/// pairs so that a DOCTYPE internal subset is skipped as a whole.
///
/// Quoted literals (system identifiers, entity values) are opaque: a `<` or
/// `>` inside one must not affect the balance.
fn skip_markup_decl(bytes: &[u8], mut i: usize) -> usize {
    let mut depth = 0usize;
    let mut literal = None;
    while i < bytes.len() {
        let b = bytes[i];
        match literal {
            Some(quote) => {
                if b == quote {
                    literal = None;
                }
            }
            None => match b {
                b'"' | b'\'' => literal = Some(b),
                b'<' => depth += 1,
                b'>' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return i + 1;
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    bytes.len()
}

/// Checks whether the `&` at byte `pos` begins a character reference or a
/// syntactically valid entity reference.
///
/// The name production is checked in full rather than against the predefined
/// entity list: a reference to an entity declared in the internal DTD subset
/// is well-formed and must not be rewritten.
fn is_reference_at(text: &str, pos: usize) -> bool {
    let rest = &text[pos + 1..];
    let name = match rest.find(';') {
        Some(end) => &rest[..end],
        None => return false,
    };

    if let Some(number) = name.strip_prefix('#') {
        if let Some(hex) = number.strip_prefix('x') {
            return !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit());
        }
        return !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit());
    }

    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_name_start_char(c) => chars.all(is_name_char),
        _ => false,
    }
}

// https://www.w3.org/TR/xml/#NT-NameStartChar
fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | '_' | 'A'..='Z' | 'a'..='z'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

// https://www.w3.org/TR/xml/#NT-NameChar
fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}
