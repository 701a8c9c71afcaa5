//! The Wikitext serializer.
//!
//! Serialization interleaves four cooperating pieces: a recursive walk over
//! the arena DOM, per-element token emission through the handler registry,
//! context-aware text escaping, and separator splicing from the original
//! source. One mutable [`state::State`] record threads through all of them;
//! output leaves through a caller-supplied [`ChunkSink`] in strict document
//! order.

use crate::dom::{Attribute, DataParsoid, Document, NodeData, NodeId};
use separators::SepKind;
use state::{EscapeContext, State};
use std::borrow::Cow;
use token::{Tag, Token};

pub(crate) mod config;
mod escape;
mod handlers;
mod image;
mod links;
mod preprocess;
mod retokenize;
mod separators;
mod state;
#[cfg(test)]
mod tests;
mod token;

bitflags::bitflags! {
    /// Trace switches for the serializer subsystems.
    ///
    /// Tracing writes through `log::trace!`; a flag only selects which
    /// subsystems speak.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct TraceFlags: u8 {
        /// List open/close and bullet computation.
        const LIST = 1 << 0;
        /// Table and cell markup decisions.
        const TABLE = 1 << 1;
        /// Separator splicing.
        const SEP = 1 << 2;
        /// Escape engine decisions.
        const ESCAPE = 1 << 3;
        /// DOM walk progress.
        const WALK = 1 << 4;
    }
}

/// The page being serialized.
#[derive(Clone, Debug, Default)]
pub struct Page {
    /// The page title.
    pub name: String,
    /// The original Wikitext of the page, when known. Its presence enables
    /// verbatim separator splicing.
    pub src: Option<String>,
}

/// The document environment: everything the serializer knows about the page
/// beyond the DOM itself.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    /// The page under serialization.
    pub page: Page,
    /// Subsystem trace switches.
    pub trace: TraceFlags,
}

impl Environment {
    /// Creates an environment for a page without original source.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            page: Page {
                name: name.to_string(),
                src: None,
            },
            trace: TraceFlags::empty(),
        }
    }

    /// Creates an environment with the original Wikitext available for
    /// separator splicing.
    #[must_use]
    pub fn with_src(name: &str, src: &str) -> Self {
        Self {
            page: Page {
                name: name.to_string(),
                src: Some(src.to_string()),
            },
            trace: TraceFlags::empty(),
        }
    }

    /// Canonicalizes a title for link comparison. Underscores fold into
    /// spaces only when `fold_underscores` is set.
    #[must_use]
    pub fn normalize_title(&self, title: &str, fold_underscores: bool) -> String {
        crate::title::normalize(title, fold_underscores)
    }
}

/// Per-call serialization options.
#[derive(Clone, Copy, Debug)]
pub struct Options<'a> {
    /// The page environment.
    pub env: &'a Environment,
    /// An opaque string forwarded with every chunk. The serializer never
    /// interprets it.
    pub serialize_info: Option<&'a str>,
}

impl<'a> Options<'a> {
    /// Creates options for the given environment.
    #[must_use]
    pub fn new(env: &'a Environment) -> Self {
        Self {
            env,
            serialize_info: None,
        }
    }
}

/// The receiver of serialized output.
pub trait ChunkSink {
    /// Receives one output chunk, with the forwarded opaque info string.
    fn chunk(&mut self, text: &str, info: Option<&str>);

    /// Called once after the last chunk.
    fn end(&mut self) {}
}

/// Adapts a closure into a [`ChunkSink`].
#[derive(Debug)]
pub struct FnSink<F>(pub F);

impl<F: FnMut(&str, Option<&str>)> ChunkSink for FnSink<F> {
    fn chunk(&mut self, text: &str, info: Option<&str>) {
        (self.0)(text, info);
    }
}

/// A sink that concatenates chunks into a string.
#[derive(Debug, Default)]
pub(crate) struct StringSink(pub String);

impl ChunkSink for StringSink {
    fn chunk(&mut self, text: &str, _info: Option<&str>) {
        self.0.push_str(text);
    }
}

/// A serialization error.
///
/// Everything recoverable is logged and worked around in place; only
/// failures that poison the whole document surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `data-parsoid` attribute did not decode.
    #[error("invalid data-parsoid on <{tag}>: {err}")]
    Metadata {
        /// The tag carrying the attribute.
        tag: String,
        /// The decode failure.
        #[source]
        err: serde_json::Error,
    },
}

/// The result type used by fallible serializer functions.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;

/// Serializes the DOM under `root` into Wikitext chunks.
///
/// The document is preprocessed in place first (metadata decoding, text
/// coalescing, separator extraction), then walked in document order.
///
/// # Errors
///
/// Returns an error when a `data-parsoid` attribute fails to decode.
pub fn serialize<S: ChunkSink>(
    doc: &mut Document,
    root: NodeId,
    options: &Options<'_>,
    out: &mut S,
) -> Result {
    let mut state = State::new(options.env, options.serialize_info);
    preprocess::preprocess(&mut state, doc, root)?;

    serialize_node(&mut state, doc, root, out)?;
    serialize_token(&mut state, doc, Token::Eof, out)?;

    debug_assert!(
        state.list_stack.is_empty() && state.table_stack.is_empty() && state.wte_stack.is_empty(),
        "construct stacks must unwind by the end of the document"
    );
    out.end();
    Ok(())
}

/// Serializes the DOM under `root` into one Wikitext string.
///
/// # Errors
///
/// Returns an error when a `data-parsoid` attribute fails to decode.
pub fn serialize_to_string(doc: &mut Document, root: NodeId, options: &Options<'_>) -> Result<String> {
    let mut sink = StringSink::default();
    serialize(doc, root, options, &mut sink)?;
    Ok(sink.0)
}

/// Serializes one DOM node.
fn serialize_node(
    state: &mut State<'_>,
    doc: &Document,
    node: NodeId,
    out: &mut dyn ChunkSink,
) -> Result {
    match doc.data(node) {
        NodeData::Element(_) => serialize_element(state, doc, node, out),
        NodeData::Text(text) => {
            // The first text inside a block gathers the block's whole line
            // for the multi-piece escape analysis.
            let scope = doc.block_scope(node);
            if state.curr_line.scope != Some(scope) {
                state.curr_line.reset(Some(scope));
                state.curr_line.text = doc.inline_text(scope);
            }
            serialize_token(state, doc, Token::Text(text.clone()), out)
        }
        NodeData::Comment(comment) => {
            serialize_token(state, doc, Token::Comment(comment.clone()), out)
        }
    }
}

/// Serializes one element, dispatching between template-source emission,
/// node-level handlers, and the token path.
fn serialize_element(
    state: &mut State<'_>,
    doc: &Document,
    node: NodeId,
    out: &mut dyn ChunkSink,
) -> Result {
    let Some(element) = doc.element(node) else {
        return Ok(());
    };
    let name = element.name.clone();

    if state.env.trace.contains(TraceFlags::WALK) {
        log::trace!("walk <{name}>");
    }

    // Template-generated content serializes as the original template
    // expression, once; the expanded subtree is skipped.
    if state.active_template_id.is_none()
        && doc
            .type_of(node)
            .is_some_and(|t| t.split_ascii_whitespace().any(|t| t.starts_with("mw:Object/")))
    {
        let src = element.dp.src.clone().unwrap_or_else(|| {
            log::warn!("template content on <{name}> without recorded source");
            String::new()
        });
        state.active_template_id = doc.about(node).map(str::to_string);
        let tag = Tag {
            name: "meta".to_string(),
            attrs: vec![Attribute {
                key: "typeof".to_string(),
                value: "mw:TemplateSource".to_string(),
            }],
            dp: DataParsoid {
                src: Some(src),
                ..DataParsoid::default()
            },
            node: Some(node),
        };
        return serialize_token(state, doc, Token::SelfClosing(tag), out);
    }

    // Node-level handlers consume the whole subtree.
    let rel = doc.attr(node, "rel").unwrap_or_default();
    let is_image_link = rel.split_ascii_whitespace().any(|part| part == "mw:Image");
    if name == "figure" || (name == "a" && is_image_link) {
        return image::serialize_figure(state, doc, node, out);
    }
    if (name == "a" || name == "link")
        && let Some(ty) = links::link_type(rel)
    {
        return links::serialize_link(state, doc, node, ty, out);
    }
    if name == "span"
        && let Some(marker) = span_marker(doc, node)
    {
        return serialize_span_marker(state, doc, node, marker, out);
    }

    let tag = Tag::new(&name, &element.attrs, &element.dp, node);

    if config::VOID_TAGS.contains(name.as_str()) {
        return serialize_token(state, doc, Token::SelfClosing(tag), out);
    }

    let html_pre = name == "pre" && element.dp.html_syntax();

    serialize_token(state, doc, Token::StartTag(tag.clone()), out)?;

    if html_pre {
        state.in_html_pre = true;
        // The parser strips the first newline of an HTML <pre> body; it has
        // to come back or a leading blank line is lost.
        let leading_nl = doc.first_child(node).is_some_and(
            |first| matches!(doc.data(first), NodeData::Text(text) if text.starts_with('\n')),
        );
        if element.dp.stripped_nl || leading_nl {
            state.emit(out, "\n");
        }
    }

    serialize_children(state, doc, node, out)?;

    if html_pre {
        state.in_html_pre = false;
    }

    serialize_token(state, doc, Token::EndTag(tag), out)
}

/// Serializes the children of `node`, interposing separators between
/// adjacent element children and applying the link-trail guard.
fn serialize_children(
    state: &mut State<'_>,
    doc: &Document,
    node: NodeId,
    out: &mut dyn ChunkSink,
) -> Result {
    let children = doc.children(node).to_vec();
    let mut prev_element: Option<NodeId> = None;
    let mut recorded: Option<String> = None;

    for (index, child) in children.iter().copied().enumerate() {
        // Skip the remaining expanded output of the active template.
        if let Some(active) = state.active_template_id.clone() {
            if doc.about(child) == Some(active.as_str()) {
                continue;
            }
            state.active_template_id = None;
        }

        if is_separator_marker(doc, child) {
            recorded = doc.attr(child, "data-sep").map(str::to_string);
            continue;
        }
        if is_diff_marker(doc, child) {
            // Diff bookkeeping is invisible and must not break the
            // adjacency of the elements around it.
            serialize_node(state, doc, child, out)?;
            continue;
        }

        match doc.data(child) {
            NodeData::Element(_) => {
                if state.has_src() {
                    let (n1, kind) = match prev_element {
                        Some(prev) => (prev, SepKind::InterElement),
                        None => (node, SepKind::Start),
                    };
                    separators::emit_separator(state, doc, out, n1, child, kind, recorded.as_deref());
                }
                recorded = None;
                serialize_node(state, doc, child, out)?;
                if needs_tail_guard(doc, child, children.get(index + 1).copied()) {
                    state.emit(out, "<nowiki/>");
                }
                prev_element = Some(child);
            }
            _ => {
                recorded = None;
                prev_element = None;
                serialize_node(state, doc, child, out)?;
            }
        }
    }

    if state.has_src()
        && let Some(last) = prev_element
    {
        separators::emit_separator(state, doc, out, last, node, SepKind::End, recorded.as_deref());
    }
    state.active_template_id = None;
    Ok(())
}

/// Whether `child` is a separator marker produced by preprocessing.
fn is_separator_marker(doc: &Document, child: NodeId) -> bool {
    doc.is_element_named(child, "meta")
        && doc
            .type_of(child)
            .is_some_and(|t| t.split_ascii_whitespace().any(|t| t == "mw:Separator"))
}

/// Whether `child` is a diff bookkeeping marker.
fn is_diff_marker(doc: &Document, child: NodeId) -> bool {
    doc.is_element_named(child, "meta")
        && doc
            .type_of(child)
            .is_some_and(|t| t.split_ascii_whitespace().any(|t| t == "mw:DiffMarker"))
}

/// Whether a serialized wikilink needs a `<nowiki/>` guard so the letters
/// of the following text node do not merge into its link trail.
fn needs_tail_guard(doc: &Document, link: NodeId, next: Option<NodeId>) -> bool {
    doc.is_element_named(link, "a")
        && doc
            .attr(link, "rel")
            .is_some_and(|rel| rel.split_ascii_whitespace().any(|part| part == "mw:WikiLink"))
        && !doc.dp(link).html_syntax()
        && doc.dp(link).tail.is_none()
        && next.is_some_and(|next| {
            matches!(
                doc.data(next),
                NodeData::Text(text) if text.chars().next().is_some_and(|c| c.is_ascii_lowercase())
            )
        })
}

/// The generated-content span markers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SpanMarker {
    /// A `<nowiki>`-fenced region.
    Nowiki,
    /// A single source entity.
    Entity,
    /// Diff bookkeeping; contributes its text only.
    DiffMarker,
}

/// Identifies generated-content span markers by `typeof`.
fn span_marker(doc: &Document, node: NodeId) -> Option<SpanMarker> {
    let type_of = doc.type_of(node)?;
    for part in type_of.split_ascii_whitespace() {
        match part {
            "mw:Nowiki" => return Some(SpanMarker::Nowiki),
            "mw:Entity" => return Some(SpanMarker::Entity),
            "mw:DiffMarker" => return Some(SpanMarker::DiffMarker),
            _ => {}
        }
    }
    None
}

/// Serializes a generated-content span: only the inner text survives, with
/// escaping disabled across `mw:Nowiki` content.
fn serialize_span_marker(
    state: &mut State<'_>,
    doc: &Document,
    node: NodeId,
    marker: SpanMarker,
    out: &mut dyn ChunkSink,
) -> Result {
    match marker {
        SpanMarker::Nowiki => {
            state.in_no_wiki = true;
            for child in doc.children(node).to_vec() {
                serialize_node(state, doc, child, out)?;
            }
            state.in_no_wiki = false;
        }
        SpanMarker::Entity => {
            let dp = doc.dp(node);
            let text = dp
                .src
                .clone()
                .or_else(|| dp.src_content.clone())
                .unwrap_or_else(|| doc.inline_text(node));
            state.emit(out, &text);
        }
        SpanMarker::DiffMarker => {
            let text = doc.inline_text(node);
            state.emit(out, &text);
        }
    }
    Ok(())
}

/// Serializes the children of `node` into a string, optionally under an
/// escape context. Used for link content and figure captions, which embed
/// in markup of their own.
pub(crate) fn serialize_children_to_string(
    state: &mut State<'_>,
    doc: &Document,
    node: NodeId,
    context: Option<EscapeContext>,
) -> Result<String> {
    // Pending boundary whitespace belongs to the enclosing flow, not to the
    // embedded content.
    let saved_separator = state.buffered_separator.take();
    let saved_from_src = state.separator_emitted_from_src;

    if let Some(context) = context {
        state.wte_stack.push(context);
    }
    let mut sink = StringSink::default();
    let mut result = Ok(());
    for child in doc.children(node).to_vec() {
        result = serialize_node(state, doc, child, &mut sink);
        if result.is_err() {
            break;
        }
    }
    if context.is_some() {
        state.wte_stack.pop();
    }

    state.buffered_separator = saved_separator;
    state.separator_emitted_from_src = saved_from_src;
    result.map(|()| sink.0)
}

/// Serializes one token: the element handlers and the emission rules of the
/// token stream live here.
fn serialize_token(
    state: &mut State<'_>,
    doc: &Document,
    token: Token,
    out: &mut dyn ChunkSink,
) -> Result {
    state.prev_token = std::mem::replace(&mut state.curr_token, token.clone());
    if token.tag().is_some() {
        state.prev_tag_token = std::mem::replace(&mut state.curr_tag_token, token.clone());
    }

    match &token {
        Token::StartTag(tag) | Token::EndTag(tag) | Token::SelfClosing(tag) => {
            serialize_tag_token(state, doc, &token, tag, out);
        }
        Token::Text(text) => serialize_text_token(state, text, out),
        Token::Comment(comment) => {
            // Comments are transparent to start-of-line constructs.
            let (nl, sol) = (state.on_newline, state.on_start_of_line);
            state.emit(out, &format!("<!--{comment}-->"));
            state.on_newline = nl;
            state.on_start_of_line = sol;
        }
        Token::Newline => state.emit(out, "\n"),
        Token::Eof => {
            // A newline still buffered here is a synthetic trailing one;
            // with source available the document's real trailing whitespace
            // already came through the separator engine.
            state.buffered_separator = None;
        }
    }
    Ok(())
}

/// Serializes a start, end, or self-closing tag token.
fn serialize_tag_token(
    state: &mut State<'_>,
    doc: &Document,
    token: &Token,
    tag: &Tag,
    out: &mut dyn ChunkSink,
) {
    let is_end = matches!(token, Token::EndTag(_));

    if tag.name == "p" && p_suppressed(state, doc, tag) {
        return;
    }

    let handler = if effective_html_syntax(doc, tag) {
        None
    } else {
        handlers::handler_for(&tag.name)
    };

    let Some(handler) = handler else {
        let text = if is_end {
            handlers::serialize_html_end(tag)
        } else {
            handlers::serialize_html_start(tag)
        };
        state.emit(out, &text);
        return;
    };

    // The matching start pushed this element's escape context; its content
    // is over regardless of what the end edge does.
    if is_end && handler.escape.is_some() {
        state.wte_stack.pop();
    }

    let edge = if is_end { handler.end } else { handler.start };
    let Some(edge) = edge else {
        return;
    };
    if edge.ignore {
        return;
    }

    // The handler runs first: position-dependent results (list bullets,
    // implicit rows) override the static line flags.
    let handled = match edge.handle {
        Some(handle) => handle(state, tag, doc),
        None => handlers::Handled::default(),
    };
    let starts_line = handled.starts_line.unwrap_or(edge.starts_line);
    let ends_line = handled.ends_line.unwrap_or(edge.ends_line);

    if matches!(token, Token::StartTag(_))
        && let Some(context) = handler.escape
    {
        state.wte_stack.push(context);
    }

    // A marker that came out empty is invisible; it must not perturb line
    // bookkeeping or flush pending separators.
    if edge.sol_transparent && handled.text.is_empty() {
        return;
    }

    if starts_line && !state.on_start_of_line && state.single_line_mode <= 0 {
        state.emit_newline(out);
    }

    state.emit(out, &handled.text);

    if edge.emits_nl {
        state.emit(out, "\n");
    }
    if ends_line && !state.on_newline {
        state.emit_newline(out);
    }

    state.single_line_mode += i32::from(edge.single_line);
    if state.single_line_mode < 0 {
        log::warn!("single-line mode underflow on </{}>", tag.name);
        state.single_line_mode = 0;
    }
}

/// Serializes a text token: entity protection always, Wikitext escaping
/// outside literal regions, newline stripping in single-line mode, and the
/// indent-pre transform.
fn serialize_text_token(state: &mut State<'_>, text: &str, out: &mut dyn ChunkSink) {
    let mut text = Cow::Borrowed(text);
    if state.single_line_mode > 0 && text.contains('\n') {
        text = Cow::Owned(text.replace('\n', ""));
    }

    let protected = escape::escape_entity_lookalikes(&text);
    let escaped = if state.in_no_wiki || state.in_html_pre {
        protected.into_owned()
    } else {
        state.curr_line.num_pieces += 1;
        // Indent-pre text never lands at column 0: the transform puts its
        // space there first.
        let sol = state.on_start_of_line && !state.in_indent_pre;
        escape::escape_text(state, &protected, sol)
    };

    let transformed = if state.in_indent_pre {
        indent_pre_transform(state, &escaped)
    } else {
        escaped
    };
    state.emit(out, &transformed);
}

/// The indent-pre text transform: a space goes in front of every line the
/// text starts, and after every interior newline.
fn indent_pre_transform(state: &State<'_>, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    if state.on_start_of_line && !text.starts_with(' ') {
        out.push(' ');
    }
    let (body, trailing_nl) = match text.strip_suffix('\n') {
        Some(body) => (body, true),
        None => (text, false),
    };
    out += &body.replace('\n', "\n ");
    if trailing_nl {
        out.push('\n');
    }
    out
}

/// Whether a paragraph pair is a no-op in its position: directly inside a
/// list item or table cell, or while the suppression flag is toggled.
fn p_suppressed(state: &State<'_>, doc: &Document, tag: &Tag) -> bool {
    if state.ignore_p_tag {
        return true;
    }
    tag.node
        .and_then(|node| doc.parent(node))
        .and_then(|parent| doc.tag_name(parent))
        .is_some_and(|name| matches!(name, "li" | "dt" | "dd" | "td" | "th"))
}

/// Whether this tag serializes as literal HTML: either it was written that
/// way, or it belongs to a table or list whose markup was.
fn effective_html_syntax(doc: &Document, tag: &Tag) -> bool {
    if tag.dp.html_syntax() {
        return true;
    }
    if !matches!(
        tag.name.as_str(),
        "tbody" | "tr" | "td" | "th" | "caption" | "li" | "dt" | "dd"
    ) {
        return false;
    }
    let Some(node) = tag.node else {
        return false;
    };

    let mut current = doc.parent(node);
    while let Some(parent) = current {
        if let Some(name) = doc.tag_name(parent)
            && matches!(name, "table" | "ul" | "ol" | "dl")
        {
            return doc.dp(parent).html_syntax();
        }
        current = doc.parent(parent);
    }
    false
}
