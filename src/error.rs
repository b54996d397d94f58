//! The failure model of the ingestion pipeline.
//!
//! Every stage reports a typed error; the pipeline entry points fold any of
//! them into a single [`ParseFailure`] so that callers always deal with one
//! shape: which stage failed, which parser mode was active and a chained
//! underlying cause.

use std::error::Error as StdError;
use std::fmt;

use xmlparser::TextPos;

/// The pipeline stage that produced a failure.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    /// Charset resolution and byte decoding.
    Decoding,
    /// Best-effort syntactic repair.
    Sanitizing,
    /// Tokenization and tree building.
    Parsing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::Decoding => write!(f, "decoding"),
            Stage::Sanitizing => write!(f, "sanitizing"),
            Stage::Parsing => write!(f, "parsing"),
        }
    }
}

/// Whether sanitization was permitted for the failed document.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ParserMode {
    /// Repairs allowed. The default.
    #[default]
    Lenient,
    /// The document had to be well-formed as received.
    Strict,
}

impl fmt::Display for ParserMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParserMode::Lenient => write!(f, "lenient"),
            ParserMode::Strict => write!(f, "strict"),
        }
    }
}

/// The single failure value surfaced to callers.
///
/// Carries the failed [`Stage`], the active [`ParserMode`] and the original
/// error as a [`source`](StdError::source) chain. Cause chains can be more
/// than one level deep: a tree-building failure keeps the engine's own error
/// underneath it.
#[derive(Debug, thiserror::Error)]
#[error("{message} ({stage} stage, {mode} mode)")]
pub struct ParseFailure {
    /// The stage that failed.
    pub stage: Stage,
    /// The mode that was active at the time.
    pub mode: ParserMode,
    /// A human-readable description.
    pub message: String,
    /// The underlying typed error, if any.
    #[source]
    pub cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl ParseFailure {
    pub(crate) fn new<E>(stage: Stage, mode: ParserMode, message: &str, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ParseFailure {
            stage,
            mode,
            message: message.to_string(),
            cause: Some(Box::new(cause)),
        }
    }
}

/// The byte stream cannot be decoded under the resolved charset.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The charset label (from the prolog or the transport) is not recognized
    /// or not supported.
    #[error("unsupported charset '{0}'")]
    UnsupportedCharset(String),

    /// The bytes are not a valid sequence for the resolved charset.
    ///
    /// Replacement characters are never substituted; downstream diagnostics
    /// depend on faithful decoding.
    #[error("input is not a valid {0} byte sequence")]
    MalformedBytes(&'static str),
}

/// A repair rule could not run.
///
/// Sanitization is best-effort: the pipeline logs the error, skips the rule
/// and continues with the remaining rules.
#[derive(Debug, thiserror::Error)]
#[error("repair rule '{rule}' could not run: {reason}")]
pub struct SanitizationError {
    /// The name of the rule that failed.
    pub rule: &'static str,
    /// Why the rule could not complete.
    pub reason: String,
}

/// The sanitized text was rejected while building the tree.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    /// The tokenization engine rejected the document.
    #[error("invalid XML syntax: {0}")]
    Engine(#[from] xmlparser::Error),

    /// A close tag does not match the open element.
    #[error("expected '{expected}' close tag, not '{actual}' at {pos}")]
    UnexpectedCloseTag {
        /// The name of the currently open element.
        expected: String,
        /// The name found in the close tag.
        actual: String,
        /// Close tag position.
        pos: TextPos,
    },

    /// A reference to an entity that was not declared in the internal DTD
    /// subset.
    #[error("unknown entity reference '{0}' at {1}")]
    UnknownEntityReference(String, TextPos),

    /// An `&` that does not begin a character or entity reference.
    #[error("invalid character or entity reference at {0}")]
    InvalidReference(TextPos),

    /// A possible entity reference loop.
    #[error("a possible entity reference loop at {0}")]
    EntityReferenceLoop(TextPos),

    /// An internal entity value contains markup, which this parser does not
    /// expand.
    #[error("markup inside an entity value is not supported at {0}")]
    MarkupInEntity(TextPos),

    /// An element declares the same attribute name twice.
    #[error("attribute '{0}' at {1} is already defined")]
    DuplicatedAttribute(String, TextPos),

    /// The document has no root element.
    #[error("the document has no root element")]
    NoRootElement,
}

/// The document tried to trigger external entity or DTD resolution.
///
/// Always fatal and never silently ignored: descriptor documents are
/// untrusted, and resolution driven by document content is a known
/// exfiltration pattern. This crate performs no network or filesystem access.
#[derive(Debug, thiserror::Error)]
pub enum SecurityPolicyViolation {
    /// A reference to an entity whose declaration carries an external ID.
    #[error("entity '{name}' at {pos} requires external resolution, which is disabled")]
    ExternalEntityReference {
        /// The referenced entity name.
        name: String,
        /// Reference position.
        pos: TextPos,
    },
}

/// Any failure of the tree-building stage.
#[derive(Debug, thiserror::Error)]
pub enum TreeBuildError {
    /// The document is not well-formed.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The document attempted external resolution.
    #[error(transparent)]
    Security(#[from] SecurityPolicyViolation),
}
