//! Charset resolution for raw descriptor bytes.
//!
//! Descriptors arrive from arbitrary servers, so the charset has to be
//! resolved before anything else can happen. The resolution order is:
//!
//! 1. a recognized byte-order marker (stripped from the output);
//! 2. the byte pattern of `<?` in a UTF-16 document without a BOM;
//! 3. the `encoding` pseudo-attribute of the XML declaration, scanned from
//!    the raw prolog bytes;
//! 4. the transport-declared charset (e.g. from a `Content-Type` header);
//! 5. UTF-8.
//!
//! Decoding is strict: invalid byte sequences are an error, never silently
//! replaced. Only a bounded prolog probe is read before the charset is
//! committed.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::error::EncodingError;

/// How many leading bytes are probed for an XML declaration.
const PROLOG_PROBE_LEN: usize = 1024;

/// A decoded character stream plus the charset that actually produced it.
///
/// The charset may differ from the transport hint when a BOM or an
/// in-document declaration overrides it. Once produced, the text is never
/// re-decoded.
#[derive(Debug)]
pub struct DecodedText<'a> {
    text: Cow<'a, str>,
    charset: &'static str,
}

impl<'a> DecodedText<'a> {
    /// Returns the decoded text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the name of the charset that was used to decode the input.
    ///
    /// Names follow the WHATWG encoding standard, e.g. `UTF-8`, `UTF-16LE`,
    /// `windows-1252`.
    pub fn charset(&self) -> &'static str {
        self.charset
    }

    pub(crate) fn into_text(self) -> Cow<'a, str> {
        self.text
    }
}

/// Decodes raw descriptor bytes into text.
///
/// `transport_charset` is the charset label declared by the transport layer,
/// if any. It is only consulted when neither a BOM nor an in-document
/// declaration determines the charset.
///
/// # Examples
///
/// ```
/// let decoded = jnlp_xml::decode(b"<jnlp/>", None).unwrap();
/// assert_eq!(decoded.as_str(), "<jnlp/>");
/// assert_eq!(decoded.charset(), "UTF-8");
/// ```
pub fn decode<'a>(
    bytes: &'a [u8],
    transport_charset: Option<&str>,
) -> Result<DecodedText<'a>, EncodingError> {
    // UTF-32 BOMs must be checked before the generic BOM lookup: the UTF-32LE
    // BOM starts with the UTF-16LE one.
    if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) || bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00])
    {
        return Err(EncodingError::UnsupportedCharset("UTF-32".to_string()));
    }

    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(encoding, &bytes[bom_len..]);
    }

    // A UTF-16 document without a BOM still betrays itself: '<?' maps to a
    // fixed four-byte pattern in either endianness.
    if bytes.starts_with(&[0x3C, 0x00, 0x3F, 0x00]) {
        return decode_with(UTF_16LE, bytes);
    }
    if bytes.starts_with(&[0x00, 0x3C, 0x00, 0x3F]) {
        return decode_with(UTF_16BE, bytes);
    }

    if let Some(label) = prolog_encoding(bytes) {
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| EncodingError::UnsupportedCharset(label.to_string()))?;
        return decode_with(encoding, bytes);
    }

    if let Some(label) = transport_charset {
        let label = label.trim();
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| EncodingError::UnsupportedCharset(label.to_string()))?;
        return decode_with(encoding, bytes);
    }

    decode_with(UTF_8, bytes)
}

fn decode_with<'a>(
    encoding: &'static Encoding,
    bytes: &'a [u8],
) -> Result<DecodedText<'a>, EncodingError> {
    match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => Ok(DecodedText {
            text,
            charset: encoding.name(),
        }),
        None => Err(EncodingError::MalformedBytes(encoding.name())),
    }
}

/// Extracts the `encoding` pseudo-attribute from the XML declaration, if the
/// document starts with one.
///
/// Works on raw bytes: every charset this resolver can reach here is an ASCII
/// superset (UTF-16 variants were recognized earlier from BOM or pattern).
fn prolog_encoding(bytes: &[u8]) -> Option<&str> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }

    let probe = &bytes[..bytes.len().min(PROLOG_PROBE_LEN)];
    let decl_end = find(probe, b"?>")?;
    let decl = &probe[..decl_end];

    let idx = find(decl, b"encoding")?;
    let mut rest = &decl[idx + b"encoding".len()..];
    rest = skip_space(rest);
    rest = rest.strip_prefix(b"=")?;
    rest = skip_space(rest);

    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[1..];
    let end = value.iter().position(|&b| b == quote)?;
    std::str::from_utf8(&value[..end]).ok()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn skip_space(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t' | b'\r' | b'\n', rest @ ..] = bytes {
        bytes = rest;
    }
    bytes
}
