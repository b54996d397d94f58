use std::borrow::Cow;
use std::mem;

use xmlparser::{
    ElementEnd, EntityDefinition, ExternalId, Reference, Stream, StrSpan, Token, Tokenizer,
};

use crate::error::{SecurityPolicyViolation, SyntaxError, TreeBuildError};
use crate::{Attribute, Document, NodeData, NodeId, NodeKind, PI};

// Maximum nesting depth of entity expansion before a reference loop is
// assumed.
const ENTITY_DEPTH: u8 = 10;

struct AttributeData<'input> {
    name: &'input str,
    value: Cow<'input, str>,
    attr_pos: usize,
    value_pos: usize,
}

/// An entity declared in the internal DTD subset with an inline value.
struct Entity<'input> {
    name: &'input str,
    value: StrSpan<'input>,
}

struct ParserData<'input> {
    attrs_start_idx: usize,
    tmp_attrs: Vec<AttributeData<'input>>,
    entities: Vec<Entity<'input>>,
    // Entities declared with an external ID. Declaring one is harmless;
    // referencing one is a security violation.
    external_entities: Vec<&'input str>,
    buffer: TextBuffer,
    after_text: bool,
}

#[derive(Clone, Copy)]
struct TagNameSpan<'input> {
    name: &'input str,
    pos: usize,
}

impl<'input> TagNameSpan<'input> {
    fn new_null() -> Self {
        Self { name: "", pos: 0 }
    }
}

impl<'input> Document<'input> {
    /// Parses the input XML string into a tree.
    ///
    /// The input must be an already decoded (and, in lenient pipelines,
    /// already sanitized) string; see [`prepare`](crate::prepare) for the
    /// full pipeline. Tokenization is delegated to the `xmlparser` engine.
    ///
    /// External DTD subsets are never fetched and external entities are
    /// never resolved, regardless of what the document declares.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = jnlp_xml::Document::parse("<jnlp><information/></jnlp>").unwrap();
    /// assert_eq!(doc.root_element().name(), "jnlp");
    /// ```
    pub fn parse(text: &str) -> Result<Document, TreeBuildError> {
        parse(text)
    }

    fn append(&mut self, parent_id: NodeId, kind: NodeKind<'input>, orig_pos: usize) -> NodeId {
        let new_child_id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent: Some(parent_id),
            prev_sibling: None,
            next_sibling: None,
            children: None,
            kind,
            orig_pos,
        });

        let last_child_id = self.nodes[parent_id.0].children.map(|(_, id)| id);
        self.nodes[new_child_id.0].prev_sibling = last_child_id;

        if let Some(id) = last_child_id {
            self.nodes[id.0].next_sibling = Some(new_child_id);
        }

        self.nodes[parent_id.0].children = Some(
            if let Some((first_child_id, _)) = self.nodes[parent_id.0].children {
                (first_child_id, new_child_id)
            } else {
                (new_child_id, new_child_id)
            },
        );

        new_child_id
    }
}

fn parse(text: &str) -> Result<Document, TreeBuildError> {
    let mut pd = ParserData {
        attrs_start_idx: 0,
        tmp_attrs: Vec::new(),
        entities: Vec::new(),
        external_entities: Vec::new(),
        buffer: TextBuffer::new(),
        after_text: false,
    };

    // Trying to guess rough nodes and attributes amount.
    let nodes_capacity = text.bytes().filter(|c| *c == b'<').count();
    let attributes_capacity = text.bytes().filter(|c| *c == b'=').count();

    let mut doc = Document {
        text,
        nodes: Vec::with_capacity(nodes_capacity),
        attrs: Vec::with_capacity(attributes_capacity),
    };

    doc.nodes.push(NodeData {
        parent: None,
        prev_sibling: None,
        next_sibling: None,
        children: None,
        kind: NodeKind::Root,
        orig_pos: 0,
    });

    let parser = Tokenizer::from(text);
    let mut parent_id = NodeId(0);
    let mut tag_name = TagNameSpan::new_null();
    process_tokens(parser, &mut parent_id, &mut tag_name, &mut pd, &mut doc)?;

    if !doc.root().children().any(|n| n.is_element()) {
        return Err(SyntaxError::NoRootElement.into());
    }

    Ok(doc)
}

fn process_tokens<'input>(
    parser: Tokenizer<'input>,
    parent_id: &mut NodeId,
    tag_name: &mut TagNameSpan<'input>,
    pd: &mut ParserData<'input>,
    doc: &mut Document<'input>,
) -> Result<(), TreeBuildError> {
    for token in parser {
        let token = token.map_err(SyntaxError::Engine)?;
        match token {
            Token::Declaration { .. } => {
                // The charset was already resolved from the raw bytes.
            }
            Token::ProcessingInstruction {
                target,
                content,
                span,
            } => {
                let pi = NodeKind::PI(PI {
                    target: target.as_str(),
                    value: content.map(|v| v.as_str()),
                });
                doc.append(*parent_id, pi, span.start());
                pd.after_text = false;
            }
            Token::Comment { text, span } => {
                doc.append(*parent_id, NodeKind::Comment(text.as_str()), span.start());
                pd.after_text = false;
            }
            Token::DtdStart { external_id, .. } | Token::EmptyDtd { external_id, .. } => {
                if let Some(id) = external_id {
                    // Never resolved. The untrusted document must not drive
                    // any network or filesystem access.
                    log::warn!("ignoring external DTD subset '{}'", external_id_uri(&id));
                }
            }
            Token::EntityDeclaration {
                name, definition, ..
            } => match definition {
                EntityDefinition::EntityValue(value) => pd.entities.push(Entity {
                    name: name.as_str(),
                    value,
                }),
                EntityDefinition::ExternalId(_) => pd.external_entities.push(name.as_str()),
            },
            Token::DtdEnd { .. } => {}
            Token::ElementStart { prefix, local, span } => {
                *tag_name = TagNameSpan {
                    name: qual_name(doc.text, prefix, local),
                    pos: span.start(),
                };
                pd.after_text = false;
            }
            Token::Attribute {
                prefix,
                local,
                value,
                ..
            } => {
                process_attribute(prefix, local, value, pd, doc)?;
            }
            Token::ElementEnd { end, span } => {
                process_element(*tag_name, end, span, parent_id, pd, doc)?;
            }
            Token::Text { text } => {
                process_text(text, *parent_id, pd, doc)?;
            }
            Token::Cdata { text, span } => {
                let cow_str = Cow::Borrowed(text.as_str());
                append_text(cow_str, *parent_id, span.start(), pd.after_text, doc);
                pd.after_text = true;
            }
        }
    }

    Ok(())
}

/// Returns the qualified name as written in the document.
///
/// Prefix and local part are adjacent in the source, so the qualified name
/// is a plain slice of the input, no allocation needed.
fn qual_name<'input>(
    text: &'input str,
    prefix: StrSpan<'input>,
    local: StrSpan<'input>,
) -> &'input str {
    if prefix.is_empty() {
        local.as_str()
    } else {
        &text[prefix.start()..local.end()]
    }
}

fn external_id_uri<'input>(id: &ExternalId<'input>) -> &'input str {
    match id {
        ExternalId::System(uri) => uri.as_str(),
        ExternalId::Public(_, uri) => uri.as_str(),
    }
}

fn process_attribute<'input>(
    prefix: StrSpan<'input>,
    local: StrSpan<'input>,
    value: StrSpan<'input>,
    pd: &mut ParserData<'input>,
    doc: &mut Document<'input>,
) -> Result<(), TreeBuildError> {
    let name = qual_name(doc.text, prefix, local);
    let attr_pos = if prefix.is_empty() {
        local.start()
    } else {
        prefix.start()
    };
    let value_pos = value.start();
    let value = normalize_attribute(
        doc.text,
        value,
        &pd.entities,
        &pd.external_entities,
        &mut pd.buffer,
    )?;

    pd.tmp_attrs.push(AttributeData {
        name,
        value,
        attr_pos,
        value_pos,
    });

    Ok(())
}

fn process_element<'input>(
    tag_name: TagNameSpan<'input>,
    end_token: ElementEnd<'input>,
    span: StrSpan<'input>,
    parent_id: &mut NodeId,
    pd: &mut ParserData<'input>,
    doc: &mut Document<'input>,
) -> Result<(), TreeBuildError> {
    pd.after_text = false;

    let mut attributes = 0..0;
    if !pd.tmp_attrs.is_empty() {
        for attr in &mut pd.tmp_attrs {
            // Check for duplicated attributes.
            if doc.attrs[pd.attrs_start_idx..]
                .iter()
                .any(|a| a.name == attr.name)
            {
                let pos = doc.text_pos_at(attr.attr_pos);
                return Err(SyntaxError::DuplicatedAttribute(attr.name.to_string(), pos).into());
            }

            doc.attrs.push(Attribute {
                name: attr.name,
                value: mem::replace(&mut attr.value, Cow::Borrowed("")),
                attr_pos: attr.attr_pos,
                value_pos: attr.value_pos,
            });
        }
        attributes = pd.attrs_start_idx..doc.attrs.len();
        pd.attrs_start_idx = doc.attrs.len();
    }
    pd.tmp_attrs.clear();

    match end_token {
        ElementEnd::Empty => {
            doc.append(
                *parent_id,
                NodeKind::Element {
                    name: tag_name.name,
                    attributes,
                },
                tag_name.pos,
            );
        }
        ElementEnd::Close(prefix, local) => {
            let closing = qual_name(doc.text, prefix, local);
            let expected = match doc.nodes[parent_id.0].kind {
                NodeKind::Element { name, .. } => name,
                // The engine has already rejected a close tag without an
                // open one, but never panic on its behalf.
                _ => return Err(unexpected_close_tag("", closing, span, doc)),
            };

            if closing != expected {
                return Err(unexpected_close_tag(expected, closing, span, doc));
            }

            if let Some(id) = doc.nodes[parent_id.0].parent {
                *parent_id = id;
            }
        }
        ElementEnd::Open => {
            *parent_id = doc.append(
                *parent_id,
                NodeKind::Element {
                    name: tag_name.name,
                    attributes,
                },
                tag_name.pos,
            );
        }
    }

    Ok(())
}

fn unexpected_close_tag(
    expected: &str,
    actual: &str,
    span: StrSpan,
    doc: &Document,
) -> TreeBuildError {
    SyntaxError::UnexpectedCloseTag {
        expected: expected.to_string(),
        actual: actual.to_string(),
        pos: doc.text_pos_at(span.start()),
    }
    .into()
}

fn process_text<'input>(
    text: StrSpan<'input>,
    parent_id: NodeId,
    pd: &mut ParserData<'input>,
    doc: &mut Document<'input>,
) -> Result<(), TreeBuildError> {
    // Add text as is if it has no references and no line endings to
    // normalize.
    if !text.as_str().bytes().any(|b| b == b'&' || b == b'\r') {
        append_text(
            Cow::Borrowed(text.as_str()),
            parent_id,
            text.start(),
            pd.after_text,
            doc,
        );
        pd.after_text = true;
        return Ok(());
    }

    pd.buffer.clear();

    let mut s = Stream::from_substr(doc.text, text.range());
    while !s.at_end() {
        match parse_next_chunk(&mut s, &pd.entities, &pd.external_entities)? {
            NextChunk::Byte(c) => {
                pd.buffer.push_from_text(c, s.at_end());
            }
            NextChunk::Char(c) => {
                // A character from a reference is taken literally and is not
                // subject to line-end normalization.
                pd.buffer.push_char_raw(c);
            }
            NextChunk::Text(fragment) => {
                expand_entity_text(
                    doc.text,
                    fragment,
                    1,
                    &pd.entities,
                    &pd.external_entities,
                    &mut pd.buffer,
                )?;
            }
        }
    }

    if !pd.buffer.is_empty() {
        let cow_text = Cow::Owned(pd.buffer.to_str().to_owned());
        append_text(cow_text, parent_id, text.start(), pd.after_text, doc);
        pd.after_text = true;
    }

    Ok(())
}

/// Expands an internal entity value into the text buffer.
///
/// Entity values expand as character data only; general entities carrying
/// markup are rejected rather than re-tokenized, which keeps the attack
/// surface of untrusted descriptors small. Nested references are followed up
/// to `ENTITY_DEPTH`.
fn expand_entity_text(
    full_text: &str,
    fragment: StrSpan,
    depth: u8,
    entities: &[Entity],
    external_entities: &[&str],
    buffer: &mut TextBuffer,
) -> Result<(), TreeBuildError> {
    let mut s = Stream::from_substr(full_text, fragment.range());

    if depth > ENTITY_DEPTH {
        return Err(SyntaxError::EntityReferenceLoop(s.gen_text_pos()).into());
    }

    if fragment.as_str().contains('<') {
        return Err(SyntaxError::MarkupInEntity(s.gen_text_pos()).into());
    }

    while !s.at_end() {
        match parse_next_chunk(&mut s, entities, external_entities)? {
            NextChunk::Byte(c) => buffer.push_from_text(c, s.at_end()),
            NextChunk::Char(c) => buffer.push_char_raw(c),
            NextChunk::Text(inner) => {
                expand_entity_text(
                    full_text,
                    inner,
                    depth + 1,
                    entities,
                    external_entities,
                    buffer,
                )?;
            }
        }
    }

    Ok(())
}

fn append_text<'input>(
    text: Cow<'input, str>,
    parent_id: NodeId,
    orig_pos: usize,
    after_text: bool,
    doc: &mut Document<'input>,
) {
    if after_text {
        // Merge with the previous text node (CDATA adjacent to character
        // data, expanded entities, ...).
        if let Some(node) = doc.nodes.iter_mut().last() {
            if let NodeKind::Text(ref mut prev_text) = node.kind {
                match *prev_text {
                    Cow::Borrowed(..) => {
                        *prev_text = Cow::Owned(prev_text.to_string() + &text);
                    }
                    Cow::Owned(ref mut s) => {
                        s.push_str(&text);
                    }
                }
            }
        }
    } else {
        doc.append(parent_id, NodeKind::Text(text), orig_pos);
    }
}

enum NextChunk<'a> {
    Byte(u8),
    Char(char),
    Text(StrSpan<'a>),
}

fn parse_next_chunk<'a>(
    s: &mut Stream<'a>,
    entities: &[Entity<'a>],
    external_entities: &[&str],
) -> Result<NextChunk<'a>, TreeBuildError> {
    debug_assert!(!s.at_end());

    // Safe, because we already checked that the stream is not at the end.
    let c = s.curr_byte_unchecked();

    if c != b'&' {
        s.advance(1);
        return Ok(NextChunk::Byte(c));
    }

    match s.try_consume_reference() {
        Some(Reference::Char(ch)) => Ok(NextChunk::Char(ch)),
        Some(Reference::Entity(name)) => match entities.iter().find(|e| e.name == name) {
            Some(entity) => Ok(NextChunk::Text(entity.value)),
            None => Err(unresolvable_entity(name, external_entities, s)),
        },
        // A bare '&' is not well-formed. The sanitizer repairs it in the
        // lenient pipeline; here it is an error.
        None => Err(SyntaxError::InvalidReference(s.gen_text_pos()).into()),
    }
}

/// An entity reference that cannot be expanded is either an attack
/// (externally-defined entity, resolution disabled) or a plain syntax error.
fn unresolvable_entity(name: &str, external_entities: &[&str], s: &Stream) -> TreeBuildError {
    let pos = s.gen_text_pos();
    if external_entities.contains(&name) {
        SecurityPolicyViolation::ExternalEntityReference {
            name: name.to_string(),
            pos,
        }
        .into()
    } else {
        SyntaxError::UnknownEntityReference(name.to_string(), pos).into()
    }
}

// https://www.w3.org/TR/REC-xml/#AVNormalize
fn normalize_attribute<'input>(
    full_text: &'input str,
    value: StrSpan<'input>,
    entities: &[Entity],
    external_entities: &[&str],
    buffer: &mut TextBuffer,
) -> Result<Cow<'input, str>, TreeBuildError> {
    if !is_normalization_required(&value) {
        return Ok(Cow::Borrowed(value.as_str()));
    }

    buffer.clear();
    _normalize_attribute(full_text, value, entities, external_entities, 0, buffer)?;
    Ok(Cow::Owned(buffer.to_str().to_owned()))
}

fn is_normalization_required(value: &StrSpan) -> bool {
    // We assume that `&` indicates an entity or a character reference.
    // But in rare cases it can be just another character.
    fn check(c: u8) -> bool {
        matches!(c, b'&' | b'\t' | b'\n' | b'\r')
    }

    value.as_str().bytes().any(check)
}

fn _normalize_attribute(
    full_text: &str,
    value: StrSpan,
    entities: &[Entity],
    external_entities: &[&str],
    depth: u8,
    buffer: &mut TextBuffer,
) -> Result<(), TreeBuildError> {
    let mut s = Stream::from_substr(full_text, value.range());
    while !s.at_end() {
        // Safe, because we already checked that the stream is not at the end.
        let c = s.curr_byte_unchecked();

        if c != b'&' {
            s.advance(1);
            buffer.push_from_attr(c, s.curr_byte().ok());
            continue;
        }

        match s.try_consume_reference() {
            Some(Reference::Char(ch)) => {
                // A character from a reference is kept literally, without
                // whitespace normalization.
                buffer.push_char_raw(ch);
            }
            Some(Reference::Entity(name)) => {
                if depth > ENTITY_DEPTH {
                    return Err(SyntaxError::EntityReferenceLoop(s.gen_text_pos()).into());
                }

                match entities.iter().find(|e| e.name == name) {
                    Some(entity) => {
                        _normalize_attribute(
                            full_text,
                            entity.value,
                            entities,
                            external_entities,
                            depth + 1,
                            buffer,
                        )?;
                    }
                    None => {
                        return Err(unresolvable_entity(name, external_entities, &s));
                    }
                }
            }
            None => {
                return Err(SyntaxError::InvalidReference(s.gen_text_pos()).into());
            }
        }
    }

    Ok(())
}

/// A byte buffer for text assembly with XML whitespace handling.
struct TextBuffer {
    buf: Vec<u8>,
}

impl TextBuffer {
    fn new() -> Self {
        TextBuffer {
            buf: Vec::with_capacity(32),
        }
    }

    fn push_raw(&mut self, c: u8) {
        self.buf.push(c);
    }

    fn push_char_raw(&mut self, c: char) {
        let mut utf8 = [0; 4];
        for b in c.encode_utf8(&mut utf8).bytes() {
            self.push_raw(b);
        }
    }

    // \n, \r and \t in attribute values are converted into spaces;
    // \r in \r\n is ignored.
    fn push_from_attr(&mut self, mut c: u8, c2: Option<u8>) {
        if c == b'\r' && c2 == Some(b'\n') {
            return;
        }

        c = match c {
            b'\n' | b'\r' | b'\t' => b' ',
            _ => c,
        };

        self.buf.push(c);
    }

    // Translate \r\n and any \r that is not followed by \n into a single \n.
    //
    // https://www.w3.org/TR/xml/#sec-line-ends
    fn push_from_text(&mut self, c: u8, at_end: bool) {
        if self.buf.last() == Some(&b'\r') {
            let idx = self.buf.len() - 1;
            self.buf[idx] = b'\n';

            if at_end && c == b'\r' {
                self.buf.push(b'\n');
            } else if c != b'\n' {
                self.buf.push(c);
            }
        } else if at_end && c == b'\r' {
            self.buf.push(b'\n');
        } else {
            self.buf.push(c);
        }
    }

    fn clear(&mut self) {
        self.buf.clear();
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn to_str(&self) -> &str {
        // The buffer receives whole UTF-8 characters only, so this cannot
        // fail.
        std::str::from_utf8(&self.buf).unwrap_or_default()
    }
}
