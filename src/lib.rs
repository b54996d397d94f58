/*!
Ingest JNLP-style launch descriptors as a read-only tree.

A launch descriptor is fetched over the network from an arbitrary, possibly
misconfigured server, so the raw bytes cannot be trusted to be well-formed
or even correctly encoded. This crate runs them through a small pipeline and
either returns a navigable document tree or a single structured failure:

1. *decoding*: charset resolution (BOM, XML declaration, transport hint)
   and strict decoding, see [`decode`];
2. *sanitizing*: minimal, observable repair of common deviations from
   well-formedness, see [`sanitize`]; skipped in strict mode;
3. *parsing*: tree building on top of the `xmlparser` engine, see
   [`Document::parse`].

External DTD subsets and external entities are never resolved: document
content cannot cause any network or filesystem access.

The pipeline is stateless; invocations are independent and can run
concurrently.

# Examples

```
use jnlp_xml::ParseSettings;

let bytes = br#"<?xml version="1.0"?>
<jnlp codebase="http://host/app/">
    <information><title>A & B</title></information>
</jnlp>"#;

let prepared = jnlp_xml::prepare(bytes, None, &ParseSettings::default()).unwrap();
assert_eq!(prepared.repairs(), ["escape-bare-ampersands"]);

let doc = prepared.parse().unwrap();
let title = doc.descendants().find(|n| n.has_name("title")).unwrap();
assert_eq!(title.text().as_deref(), Some("A & B"));
assert_eq!(title.codebase(), Some("http://host/app/"));
```
*/

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

pub use xmlparser::TextPos;

mod encoding;
mod error;
mod parse;
mod sanitize;

pub use crate::encoding::{decode, DecodedText};
pub use crate::error::{
    EncodingError, ParseFailure, ParserMode, SanitizationError, SecurityPolicyViolation, Stage,
    SyntaxError, TreeBuildError,
};
pub use crate::sanitize::sanitize;

/// The attribute that declares the base URL for relative references inside
/// a descriptor.
///
/// Resolved upwards via [`Node::codebase`].
pub const CODEBASE_ATTR: &str = "codebase";

/// Settings for the ingestion pipeline.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ParseSettings {
    /// Reject any document that is not already well-formed instead of
    /// repairing it. Useful for conformance testing. Defaults to `false`.
    pub strict: bool,
}

/// Decoded and (in lenient mode) sanitized descriptor text, ready for
/// [`parse`](PreparedText::parse).
///
/// Keeps the charset that was actually used, the names of the repair rules
/// that fired and the active parser mode, so that diagnostics can report all
/// three regardless of the parse outcome.
#[derive(Debug)]
pub struct PreparedText {
    text: String,
    charset: &'static str,
    repairs: Vec<&'static str>,
    mode: ParserMode,
}

impl PreparedText {
    /// Returns the prepared text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the name of the charset the raw bytes were decoded with.
    pub fn charset(&self) -> &'static str {
        self.charset
    }

    /// Returns the names of the sanitizer rules that changed the document.
    ///
    /// Empty for well-formed input and always empty in strict mode. A
    /// non-empty list means the document was malformed as received and was
    /// silently repaired, so callers with stricter policies can reject it.
    pub fn repairs(&self) -> &[&'static str] {
        &self.repairs
    }

    /// Returns the parser mode this text was prepared under.
    pub fn mode(&self) -> ParserMode {
        self.mode
    }

    /// Builds the document tree.
    ///
    /// Any failure is folded into a [`ParseFailure`] carrying the active
    /// mode; the underlying [`TreeBuildError`] stays reachable through
    /// [`source`](std::error::Error::source). No partial tree is ever
    /// returned.
    pub fn parse(&self) -> Result<Document<'_>, ParseFailure> {
        Document::parse(&self.text).map_err(|e| {
            ParseFailure::new(Stage::Parsing, self.mode, "invalid XML document syntax", e)
        })
    }
}

/// Decodes and, unless strict mode is requested, sanitizes raw descriptor
/// bytes.
///
/// `transport_charset` is an optional charset label declared by the
/// transport (e.g. from an HTTP `Content-Type` header); a BOM or an
/// in-document declaration takes priority over it.
///
/// # Examples
///
/// ```
/// use jnlp_xml::{ParseSettings, Stage};
///
/// // Lenient mode repairs the bare ampersand.
/// let prepared = jnlp_xml::prepare(b"<jnlp><vendor>A & B</vendor></jnlp>", None,
///                                  &ParseSettings::default()).unwrap();
/// assert!(prepared.parse().is_ok());
///
/// // Strict mode hands the defect to the parser.
/// let prepared = jnlp_xml::prepare(b"<jnlp><vendor>A & B</vendor></jnlp>", None,
///                                  &ParseSettings { strict: true }).unwrap();
/// let err = prepared.parse().unwrap_err();
/// assert_eq!(err.stage, Stage::Parsing);
/// ```
pub fn prepare(
    bytes: &[u8],
    transport_charset: Option<&str>,
    settings: &ParseSettings,
) -> Result<PreparedText, ParseFailure> {
    let mode = if settings.strict {
        ParserMode::Strict
    } else {
        ParserMode::Lenient
    };

    let decoded = encoding::decode(bytes, transport_charset).map_err(|e| {
        ParseFailure::new(Stage::Decoding, mode, "cannot decode descriptor bytes", e)
    })?;
    let charset = decoded.charset();

    if settings.strict {
        return Ok(PreparedText {
            text: decoded.into_text().into_owned(),
            charset,
            repairs: Vec::new(),
            mode,
        });
    }

    let decoded_text = decoded.into_text();
    let (sanitized, repairs) = sanitize::sanitize(&decoded_text);
    Ok(PreparedText {
        text: sanitized.into_owned(),
        charset,
        repairs,
        mode,
    })
}

/// A parsed descriptor document.
///
/// A tree of [`Node`]s over an internal arena: the nodes themselves live in
/// a flat `Vec` and link to parents and siblings by index, so node handles
/// are plain `Copy` values. The tree is immutable once built, and every node
/// except the root has exactly one parent by construction.
///
/// The facade is engine-independent: nothing of the underlying tokenizer
/// leaks through it apart from the plain [`TextPos`] position type.
#[derive(PartialEq)]
pub struct Document<'input> {
    /// The original text.
    ///
    /// Required for `text_pos_at` and for qualified-name slices.
    text: &'input str,
    nodes: Vec<NodeData<'input>>,
    attrs: Vec<Attribute<'input>>,
}

impl<'input> Document<'input> {
    /// Returns the root node.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = jnlp_xml::Document::parse("<jnlp/>").unwrap();
    /// assert!(doc.root().is_root());
    /// assert!(doc.root().first_child().unwrap().has_name("jnlp"));
    /// ```
    pub fn root(&self) -> Node {
        Node {
            id: NodeId(0),
            d: &self.nodes[0],
            doc: self,
        }
    }

    /// Returns the root element of the document.
    ///
    /// Unlike `root`, will return the first element node.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = jnlp_xml::Document::parse("<!-- comment --><jnlp/>").unwrap();
    /// assert!(doc.root_element().has_name("jnlp"));
    /// ```
    pub fn root_element(&self) -> Node {
        // `unwrap` is safe, because the `Document` is guaranteed to have
        // at least one element.
        self.root().first_element_child().unwrap()
    }

    /// Returns an iterator over document's descendant nodes.
    ///
    /// Shorthand for `doc.root().descendants()`.
    pub fn descendants(&self) -> Descendants {
        self.root().descendants()
    }

    /// Calculates a line/column position from a byte position in the
    /// original document.
    ///
    /// **Note:** this operation is expensive.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = jnlp_xml::Document::parse("\
    /// <!-- comment -->
    /// <jnlp/>"
    /// ).unwrap();
    ///
    /// let root = doc.root_element();
    /// assert_eq!(doc.text_pos_at(root.pos()), jnlp_xml::TextPos::new(2, 1));
    /// ```
    pub fn text_pos_at(&self, pos: usize) -> TextPos {
        xmlparser::Stream::from(self.text).gen_text_pos_from(pos)
    }
}

impl<'input> fmt::Debug for Document<'input> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        if !self.root().has_children() {
            return write!(f, "Document []");
        }

        macro_rules! writeln_indented {
            ($depth:expr, $f:expr, $fmt:expr) => {
                for _ in 0..$depth { write!($f, "    ")?; }
                writeln!($f, $fmt)?;
            };
            ($depth:expr, $f:expr, $fmt:expr, $($arg:tt)*) => {
                for _ in 0..$depth { write!($f, "    ")?; }
                writeln!($f, $fmt, $($arg)*)?;
            };
        }

        fn print_children(
            parent: Node,
            depth: usize,
            f: &mut fmt::Formatter,
        ) -> Result<(), fmt::Error> {
            for child in parent.children() {
                if child.is_element() {
                    writeln_indented!(depth, f, "Element {{");
                    writeln_indented!(depth, f, "    name: {:?}", child.name());

                    if !child.attributes().is_empty() {
                        writeln_indented!(depth + 1, f, "attributes: [");
                        for attr in child.attributes() {
                            writeln_indented!(depth + 2, f, "{:?}", attr);
                        }
                        writeln_indented!(depth + 1, f, "]");
                    }

                    if child.has_children() {
                        writeln_indented!(depth, f, "    children: [");
                        print_children(child, depth + 2, f)?;
                        writeln_indented!(depth, f, "    ]");
                    }

                    writeln_indented!(depth, f, "}}");
                } else {
                    writeln_indented!(depth, f, "{:?}", child);
                }
            }

            Ok(())
        }

        writeln!(f, "Document [")?;
        print_children(self.root(), 1, f)?;
        writeln!(f, "]")?;

        Ok(())
    }
}

/// List of supported node types.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeType {
    /// The root node of the `Document`.
    Root,
    /// An element node.
    ///
    /// Only an element can have a name and attributes.
    Element,
    /// A processing instruction.
    PI,
    /// A comment node.
    Comment,
    /// A text node.
    Text,
}

/// A processing instruction.
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub struct PI<'input> {
    pub target: &'input str,
    pub value: Option<&'input str>,
}

/// Node ID.
///
/// Index into the `Document`-internal arena.
#[derive(Clone, Copy, PartialEq)]
struct NodeId(usize);

#[derive(PartialEq)]
enum NodeKind<'input> {
    Root,
    Element {
        name: &'input str,
        attributes: Range<usize>,
    },
    PI(PI<'input>),
    Comment(&'input str),
    Text(Cow<'input, str>),
}

#[derive(PartialEq)]
struct NodeData<'input> {
    parent: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    children: Option<(NodeId, NodeId)>,
    kind: NodeKind<'input>,
    orig_pos: usize,
}

/// An attribute.
#[derive(PartialEq)]
pub struct Attribute<'input> {
    name: &'input str,
    value: Cow<'input, str>,
    attr_pos: usize,
    value_pos: usize,
}

impl<'input> Attribute<'input> {
    /// Returns the attribute name, as written in the document.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = jnlp_xml::Document::parse("<jnlp spec='1.0'/>").unwrap();
    ///
    /// assert_eq!(doc.root_element().attributes()[0].name(), "spec");
    /// ```
    pub fn name(&self) -> &'input str {
        self.name
    }

    /// Returns the normalized attribute value.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = jnlp_xml::Document::parse("<jnlp spec='1.0'/>").unwrap();
    ///
    /// assert_eq!(doc.root_element().attributes()[0].value(), "1.0");
    /// ```
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the attribute name position in bytes in the original
    /// document.
    ///
    /// You can calculate a human-readable position via
    /// [`Document::text_pos_at`].
    ///
    /// ```text
    /// <jnlp spec='1.0'/>
    ///       ^
    /// ```
    pub fn pos(&self) -> usize {
        self.attr_pos
    }

    /// Returns the attribute value position in bytes in the original
    /// document.
    ///
    /// ```text
    /// <jnlp spec='1.0'/>
    ///             ^
    /// ```
    pub fn value_pos(&self) -> usize {
        self.value_pos
    }
}

impl<'input> fmt::Debug for Attribute<'input> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "Attribute {{ name: {:?}, value: {:?} }}",
            self.name, self.value
        )
    }
}

/// A node of the document tree.
///
/// A cheap `Copy` handle into the document arena. The public API only
/// navigates downwards (children) and sideways (siblings); parent links
/// exist internally to support [`Node::codebase`] but are deliberately not
/// exposed.
pub struct Node<'a, 'input> {
    /// Node ID.
    id: NodeId,

    /// The tree containing the node.
    doc: &'a Document<'input>,

    d: &'a NodeData<'input>,
}

impl<'a, 'input> Copy for Node<'a, 'input> {}

impl<'a, 'input> Clone for Node<'a, 'input> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, 'input> Eq for Node<'a, 'input> {}

impl<'a, 'input> PartialEq for Node<'a, 'input> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.doc, other.doc)
    }
}

impl<'a, 'input: 'a> Node<'a, 'input> {
    /// Returns node's type.
    pub fn node_type(&self) -> NodeType {
        match self.d.kind {
            NodeKind::Root => NodeType::Root,
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::PI { .. } => NodeType::PI,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Text(_) => NodeType::Text,
        }
    }

    /// Checks that node is a root node.
    pub fn is_root(&self) -> bool {
        self.node_type() == NodeType::Root
    }

    /// Checks that node is an element node.
    pub fn is_element(&self) -> bool {
        self.node_type() == NodeType::Element
    }

    /// Checks that node is a processing instruction node.
    pub fn is_pi(&self) -> bool {
        self.node_type() == NodeType::PI
    }

    /// Checks that node is a comment node.
    pub fn is_comment(&self) -> bool {
        self.node_type() == NodeType::Comment
    }

    /// Checks that node is a text node.
    pub fn is_text(&self) -> bool {
        self.node_type() == NodeType::Text
    }

    /// Returns node's document.
    pub fn document(&self) -> &'a Document<'input> {
        self.doc
    }

    /// Returns node's name, as written in the document.
    ///
    /// Returns an empty string for non-element nodes.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = jnlp_xml::Document::parse("<jnlp/>").unwrap();
    ///
    /// assert_eq!(doc.root_element().name(), "jnlp");
    /// ```
    pub fn name(&self) -> &'input str {
        match self.d.kind {
            NodeKind::Element { name, .. } => name,
            _ => "",
        }
    }

    /// Checks that node has the specified name.
    ///
    /// The comparison is case-sensitive.
    pub fn has_name(&self, name: &str) -> bool {
        match self.d.kind {
            NodeKind::Element { name: n, .. } => n == name,
            _ => false,
        }
    }

    /// Returns the value of the attribute with the specified name.
    ///
    /// Lookup is case-sensitive. Absence is distinct from an empty value:
    /// a missing attribute is `None`, an attribute written as `x=""` is
    /// `Some("")`.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = jnlp_xml::Document::parse("<jnlp spec=''/>").unwrap();
    ///
    /// assert_eq!(doc.root_element().attribute("spec"), Some(""));
    /// assert_eq!(doc.root_element().attribute("version"), None);
    /// ```
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.attributes()
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_ref())
    }

    /// Checks that the node has an attribute with the specified name.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes().iter().any(|a| a.name == name)
    }

    /// Returns element's attributes, in document order.
    pub fn attributes(&self) -> &'a [Attribute<'input>] {
        match self.d.kind {
            NodeKind::Element { ref attributes, .. } => &self.doc.attrs[attributes.clone()],
            _ => &[],
        }
    }

    /// Returns node's text content.
    ///
    /// - for an element, the concatenation of its direct text children
    ///   (`None` if it has no text children at all);
    /// - for a comment or a text node, its own text.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = jnlp_xml::Document::parse(
    ///     "<vendor>A <![CDATA[&]]><!-- x --> B</vendor>"
    /// ).unwrap();
    ///
    /// assert_eq!(doc.root_element().text().as_deref(), Some("A & B"));
    /// ```
    pub fn text(&self) -> Option<Cow<'a, str>> {
        match self.d.kind {
            NodeKind::Element { .. } => {
                let mut texts = self.children().filter_map(|child| child.text_data());
                let first = texts.next()?;
                match texts.next() {
                    None => Some(Cow::Borrowed(first)),
                    Some(second) => {
                        let mut all = String::with_capacity(first.len() + second.len());
                        all.push_str(first);
                        all.push_str(second);
                        for t in texts {
                            all.push_str(t);
                        }
                        Some(Cow::Owned(all))
                    }
                }
            }
            NodeKind::Comment(text) => Some(Cow::Borrowed(text)),
            NodeKind::Text(ref text) => Some(Cow::Borrowed(text.as_ref())),
            _ => None,
        }
    }

    fn text_data(&self) -> Option<&'a str> {
        match self.d.kind {
            NodeKind::Text(ref text) => Some(text.as_ref()),
            _ => None,
        }
    }

    /// Returns node as a processing instruction.
    pub fn pi(&self) -> Option<PI<'input>> {
        match self.d.kind {
            NodeKind::PI(pi) => Some(pi),
            _ => None,
        }
    }

    /// Resolves the nearest enclosing [`CODEBASE_ATTR`] declaration,
    /// starting from this node and walking up to the root.
    ///
    /// This is the only upward-looking operation of the facade; general
    /// parent navigation is intentionally not exposed.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = jnlp_xml::Document::parse(
    ///     "<jnlp codebase='http://host/app/'><information><title/></information></jnlp>"
    /// ).unwrap();
    ///
    /// let title = doc.descendants().find(|n| n.has_name("title")).unwrap();
    /// assert_eq!(title.codebase(), Some("http://host/app/"));
    /// ```
    pub fn codebase(&self) -> Option<&'a str> {
        let mut current = Some(*self);
        while let Some(node) = current {
            if let Some(value) = node.attribute(CODEBASE_ATTR) {
                return Some(value);
            }
            current = node.parent();
        }
        None
    }

    fn gen_node(&self, id: NodeId) -> Node<'a, 'input> {
        Node {
            id,
            d: &self.doc.nodes[id.0],
            doc: self.doc,
        }
    }

    // Parent linkage stays internal: the stable public contract only
    // navigates downwards.
    fn parent(&self) -> Option<Self> {
        self.d.parent.map(|id| self.gen_node(id))
    }

    /// Returns the previous sibling of this node.
    pub fn prev_sibling(&self) -> Option<Self> {
        self.d.prev_sibling.map(|id| self.gen_node(id))
    }

    /// Returns the next sibling of this node.
    pub fn next_sibling(&self) -> Option<Self> {
        self.d.next_sibling.map(|id| self.gen_node(id))
    }

    /// Returns the first child of this node.
    pub fn first_child(&self) -> Option<Self> {
        self.d.children.map(|(id, _)| self.gen_node(id))
    }

    /// Returns the first element child of this node.
    pub fn first_element_child(&self) -> Option<Self> {
        self.children().find(|n| n.is_element())
    }

    /// Returns the last child of this node.
    pub fn last_child(&self) -> Option<Self> {
        self.d.children.map(|(_, id)| self.gen_node(id))
    }

    /// Returns true if this node has children.
    pub fn has_children(&self) -> bool {
        self.d.children.is_some()
    }

    /// Returns an iterator over children nodes.
    ///
    /// The sequence is lazy, finite and restartable: the tree is immutable,
    /// so enumerating twice yields the same nodes.
    pub fn children(&self) -> Children<'a, 'input> {
        Children {
            front: self.first_child(),
            back: self.last_child(),
        }
    }

    /// Returns an iterator which traverses the subtree starting at this
    /// node.
    pub fn traverse(&self) -> Traverse<'a, 'input> {
        Traverse {
            root: *self,
            edge: None,
        }
    }

    /// Returns an iterator over this node and its descendants.
    pub fn descendants(&self) -> Descendants<'a, 'input> {
        Descendants(self.traverse())
    }

    /// Returns node's position in bytes in the original document.
    pub fn pos(&self) -> usize {
        self.d.orig_pos
    }

    /// Calculates node's line/column position in the original document.
    ///
    /// **Note:** this operation is expensive.
    pub fn node_pos(&self) -> TextPos {
        self.doc.text_pos_at(self.d.orig_pos)
    }
}

impl<'a, 'input: 'a> fmt::Debug for Node<'a, 'input> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self.d.kind {
            NodeKind::Root => write!(f, "Root"),
            NodeKind::Element { .. } => {
                write!(
                    f,
                    "Element {{ name: {:?}, attributes: {:?} }}",
                    self.name(),
                    self.attributes()
                )
            }
            NodeKind::PI(pi) => {
                write!(f, "PI {{ target: {:?}, value: {:?} }}", pi.target, pi.value)
            }
            NodeKind::Comment(text) => write!(f, "Comment({:?})", text),
            NodeKind::Text(ref text) => write!(f, "Text({:?})", text),
        }
    }
}

/// Iterator over children.
pub struct Children<'a, 'input> {
    front: Option<Node<'a, 'input>>,
    back: Option<Node<'a, 'input>>,
}

impl<'a, 'input> Clone for Children<'a, 'input> {
    fn clone(&self) -> Self {
        Self {
            front: self.front,
            back: self.back,
        }
    }
}

impl<'a, 'input> Iterator for Children<'a, 'input> {
    type Item = Node<'a, 'input>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            let node = self.front.take();
            self.back = None;
            node
        } else {
            let node = self.front.take();
            self.front = node.as_ref().and_then(Node::next_sibling);
            node
        }
    }
}

impl<'a, 'input> DoubleEndedIterator for Children<'a, 'input> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.back == self.front {
            let node = self.back.take();
            self.front = None;
            node
        } else {
            let node = self.back.take();
            self.back = node.as_ref().and_then(Node::prev_sibling);
            node
        }
    }
}

/// Open or close edge of a node.
#[derive(Debug)]
pub enum Edge<'a, 'input> {
    /// Open.
    Open(Node<'a, 'input>),
    /// Close.
    Close(Node<'a, 'input>),
}

impl<'a, 'input> Copy for Edge<'a, 'input> {}

impl<'a, 'input> Clone for Edge<'a, 'input> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, 'input> Eq for Edge<'a, 'input> {}

impl<'a, 'input> PartialEq for Edge<'a, 'input> {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Edge::Open(a), Edge::Open(b)) | (Edge::Close(a), Edge::Close(b)) => a == b,
            _ => false,
        }
    }
}

/// Iterator which traverses a subtree.
pub struct Traverse<'a, 'input> {
    root: Node<'a, 'input>,
    edge: Option<Edge<'a, 'input>>,
}

impl<'a, 'input> Clone for Traverse<'a, 'input> {
    fn clone(&self) -> Self {
        Self {
            root: self.root,
            edge: self.edge,
        }
    }
}

impl<'a, 'input> Iterator for Traverse<'a, 'input> {
    type Item = Edge<'a, 'input>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.edge {
            Some(Edge::Open(node)) => {
                self.edge = Some(match node.first_child() {
                    Some(first_child) => Edge::Open(first_child),
                    None => Edge::Close(node),
                });
            }
            Some(Edge::Close(node)) => {
                if node == self.root {
                    self.edge = None;
                } else if let Some(next_sibling) = node.next_sibling() {
                    self.edge = Some(Edge::Open(next_sibling));
                } else {
                    self.edge = node.parent().map(Edge::Close);
                }
            }
            None => {
                self.edge = Some(Edge::Open(self.root));
            }
        }

        self.edge
    }
}

/// Iterator over a node and its descendants.
pub struct Descendants<'a, 'input>(Traverse<'a, 'input>);

impl<'a, 'input> Clone for Descendants<'a, 'input> {
    fn clone(&self) -> Self {
        Descendants(self.0.clone())
    }
}

impl<'a, 'input> Iterator for Descendants<'a, 'input> {
    type Item = Node<'a, 'input>;

    fn next(&mut self) -> Option<Self::Item> {
        for edge in &mut self.0 {
            if let Edge::Open(node) = edge {
                return Some(node);
            }
        }

        None
    }
}
