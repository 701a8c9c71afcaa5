//! Serializer state threaded through the DOM walk.

use super::{ChunkSink, Environment, TraceFlags, token::Token};
use crate::dom::NodeId;
use indexmap::IndexMap;

/// One frame per enclosing native-syntax list element.
#[derive(Clone, Debug, Default)]
pub(crate) struct ListFrame {
    /// The cumulative bullet prefix for items of this list, including the
    /// contributions of every enclosing list.
    pub bullets: String,
    /// The bullet of the item currently open in this list (`;`/`:` for
    /// definition lists, empty for `ul`/`ol` items whose bullet is already
    /// part of `bullets`).
    pub item_bullet: String,
    /// The number of items opened in this list so far.
    pub item_count: u32,
    /// This list borrowed one level of single-line mode from its parent
    /// item; returned when the list closes.
    pub suspended_single_line: bool,
}

/// List and line state saved on table entry; lists do not cross table
/// boundaries.
#[derive(Clone, Debug, Default)]
pub(crate) struct TableSnapshot {
    /// The list stack at the point the table was opened.
    pub list_stack: Vec<ListFrame>,
    /// The single-line counter at the point the table was opened.
    pub single_line_mode: i32,
}

/// A context predicate consulted by the escape engine. The innermost open
/// context-sensitive construct determines which extra characters must not
/// survive unfenced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum EscapeContext {
    /// Inside a native heading.
    Heading,
    /// Inside a native list item.
    ListItem,
    /// Inside an external link.
    Link,
    /// Inside a bold or italic span.
    Quote,
    /// Inside a native table header cell.
    TableHeader,
    /// Inside a native table data cell.
    TableCell,
    /// Inside a wikilink target or content.
    WikiLink,
    /// Inside anchor content serialized for a caption or media link.
    Anchor,
}

/// Recorded template-generated attribute sources for one `about` id.
#[derive(Clone, Debug, Default)]
pub(crate) struct TplAttrSources {
    /// Whole key-value sources, by attribute name.
    pub kvs: IndexMap<String, String>,
    /// Key-only sources, by attribute name.
    pub ks: IndexMap<String, String>,
    /// Value-only sources, by attribute name.
    pub vs: IndexMap<String, String>,
}

/// The text-line accumulator, scoped to one block element.
#[derive(Clone, Debug, Default)]
pub(crate) struct LineState {
    /// The inline text of the enclosing block element, gathered at the first
    /// text node inside it.
    pub text: String,
    /// How many text pieces of the line have been serialized so far.
    pub num_pieces: u32,
    /// Whether the pair analysis has run for this line.
    pub processed: bool,
    /// The gathered line contains a wikilink or external link pair.
    pub has_bracket_pair: bool,
    /// The gathered line starts and ends with heading delimiters.
    pub has_heading_pair: bool,
    /// The block element this accumulator belongs to.
    pub scope: Option<NodeId>,
}

impl LineState {
    /// Resets the accumulator for a new block scope.
    pub fn reset(&mut self, scope: Option<NodeId>) {
        *self = LineState {
            scope,
            ..LineState::default()
        };
    }
}

/// The number of output characters retained for look-behind decisions.
const LAST_RES_WINDOW: usize = 100;

/// Serializer state.
///
/// One record per `serialize` call, created from the initial template and
/// threaded mutably through the entire walk.
#[derive(Debug)]
pub(crate) struct State<'a> {
    /// The environment of the page being serialized.
    pub env: &'a Environment,
    /// Opaque string forwarded with every chunk.
    pub info: Option<&'a str>,

    /// The last emission ended with a newline.
    pub on_newline: bool,
    /// The next emission will land at column 0 of a logical line.
    pub on_start_of_line: bool,
    /// When positive, newlines in text runs are stripped.
    pub single_line_mode: i32,
    /// One frame per enclosing native list element.
    pub list_stack: Vec<ListFrame>,
    /// Snapshots saved on table entry.
    pub table_stack: Vec<TableSnapshot>,
    /// Escape-context predicates; the top of the stack is consulted by the
    /// escape engine.
    pub wte_stack: Vec<EscapeContext>,
    /// Template-generated attribute sources, keyed by `about` id.
    pub tpl_attrs: IndexMap<String, TplAttrSources>,
    /// The line accumulator for the current block element.
    pub curr_line: LineState,
    /// Newlines requested by handlers, buffered while original source is
    /// available so the separator engine can override them.
    pub buffered_separator: Option<String>,
    /// The last boundary separator was spliced verbatim from the source.
    pub separator_emitted_from_src: bool,
    /// The token before `curr_token`.
    pub prev_token: Token,
    /// The token currently being serialized.
    pub curr_token: Token,
    /// The tag token before `curr_tag_token`.
    pub prev_tag_token: Token,
    /// The most recent tag token.
    pub curr_tag_token: Token,
    /// Escaping is disabled inside a literal-text fence.
    pub in_no_wiki: bool,
    /// Escaping is disabled inside an HTML-syntax `<pre>`.
    pub in_html_pre: bool,
    /// Text runs get an indent-pre space transform applied.
    pub in_indent_pre: bool,
    /// Paragraph tags are treated as no-ops.
    pub ignore_p_tag: bool,
    /// The tail of the emitted output, for adjacency checks such as
    /// mergeable apostrophes.
    pub last_res: String,
    /// The `about` id of the template whose generated subtree is being
    /// skipped.
    pub active_template_id: Option<String>,
}

impl<'a> State<'a> {
    /// Creates the state for one serialization call from the initial
    /// template.
    pub fn new(env: &'a Environment, info: Option<&'a str>) -> Self {
        Self {
            env,
            info,
            on_newline: true,
            on_start_of_line: true,
            single_line_mode: 0,
            list_stack: Vec::new(),
            table_stack: Vec::new(),
            wte_stack: Vec::new(),
            tpl_attrs: IndexMap::new(),
            curr_line: LineState::default(),
            buffered_separator: None,
            separator_emitted_from_src: false,
            prev_token: Token::Eof,
            curr_token: Token::Eof,
            prev_tag_token: Token::Eof,
            curr_tag_token: Token::Eof,
            in_no_wiki: false,
            in_html_pre: false,
            in_indent_pre: false,
            ignore_p_tag: false,
            last_res: String::new(),
            active_template_id: None,
        }
    }

    /// Whether the original Wikitext source is available for splicing.
    #[inline]
    pub fn has_src(&self) -> bool {
        self.env.page.src.is_some()
    }

    /// The original Wikitext source, when available.
    #[inline]
    pub fn src(&self) -> Option<&'a str> {
        self.env.page.src.as_deref()
    }

    /// The innermost escape context, if any construct is open.
    #[inline]
    pub fn escape_context(&self) -> Option<EscapeContext> {
        self.wte_stack.last().copied()
    }

    /// Emits a content chunk, flushing any buffered separator first.
    pub fn emit(&mut self, out: &mut dyn ChunkSink, text: &str) {
        if let Some(sep) = self.buffered_separator.take() {
            out.chunk(&sep, self.info);
            self.note_emitted(&sep);
        }
        if text.is_empty() {
            return;
        }
        self.separator_emitted_from_src = false;
        out.chunk(text, self.info);
        self.note_emitted(text);
    }

    /// Requests a handler-driven newline at a construct boundary.
    ///
    /// While source is available the newline is buffered so a successful
    /// source splice can displace it; a separator already emitted from
    /// source satisfies the request outright.
    pub fn emit_newline(&mut self, out: &mut dyn ChunkSink) {
        if self.separator_emitted_from_src {
            return;
        }
        if self.has_src() {
            self.buffered_separator
                .get_or_insert_with(String::new)
                .push('\n');
            self.on_newline = true;
            self.on_start_of_line = true;
        } else {
            self.emit(out, "\n");
        }
    }

    /// Emits a boundary separator spliced verbatim from the original
    /// source, displacing any buffered handler newlines.
    pub fn emit_separator(&mut self, out: &mut dyn ChunkSink, sep: &str) {
        self.buffered_separator = None;
        if !sep.is_empty() {
            out.chunk(sep, self.info);
            self.note_separator(sep);
        }
        self.separator_emitted_from_src = true;
        if self.env.trace.contains(TraceFlags::SEP) {
            log::trace!("separator from src: {sep:?}");
        }
    }

    /// Updates line-position tracking and the look-behind window after a
    /// content emission.
    fn note_emitted(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.on_newline = text.ends_with('\n');
        self.on_start_of_line = self.on_newline;
        self.push_last_res(text);
    }

    /// Updates line-position tracking after a source-spliced separator.
    ///
    /// A splice may end in indentation after a newline; that still counts
    /// as start-of-line for the construct that follows.
    fn note_separator(&mut self, sep: &str) {
        self.on_newline = sep.ends_with('\n');
        self.on_start_of_line = match sep.rfind('\n') {
            Some(at) => sep[at + 1..].bytes().all(|b| matches!(b, b' ' | b'\t')),
            None => false,
        };
        self.push_last_res(sep);
    }

    /// Appends to the look-behind window, keeping only its tail.
    fn push_last_res(&mut self, text: &str) {
        self.last_res.push_str(text);
        if self.last_res.len() > LAST_RES_WINDOW {
            let mut cut = self.last_res.len() - LAST_RES_WINDOW;
            while !self.last_res.is_char_boundary(cut) {
                cut += 1;
            }
            self.last_res.drain(..cut);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::Environment;

    /// A sink collecting chunks into a string for state-level tests.
    #[derive(Default)]
    struct Collect(String);

    impl ChunkSink for Collect {
        fn chunk(&mut self, text: &str, _info: Option<&str>) {
            self.0.push_str(text);
        }
    }

    #[test]
    fn buffered_newline_is_displaced_by_a_splice() {
        let env = Environment::with_src("Test", "a\n\nb");
        let mut state = State::new(&env, None);
        let mut out = Collect::default();

        state.emit(&mut out, "a");
        state.emit_newline(&mut out);
        assert_eq!(out.0, "a", "newline should be buffered while src is set");
        state.emit_separator(&mut out, "\n\n");
        state.emit(&mut out, "b");
        assert_eq!(out.0, "a\n\nb");
    }

    #[test]
    fn buffered_newline_flushes_without_a_splice() {
        let env = Environment::with_src("Test", "a\nb");
        let mut state = State::new(&env, None);
        let mut out = Collect::default();

        state.emit(&mut out, "a");
        state.emit_newline(&mut out);
        state.emit(&mut out, "b");
        assert_eq!(out.0, "a\nb");
    }

    #[test]
    fn splice_satisfies_later_newline_requests() {
        let env = Environment::with_src("Test", "a b");
        let mut state = State::new(&env, None);
        let mut out = Collect::default();

        state.emit_separator(&mut out, " ");
        state.emit_newline(&mut out);
        state.emit(&mut out, "b");
        assert_eq!(out.0, " b");
        assert!(!state.on_start_of_line);
    }

    #[test]
    fn start_of_line_survives_indented_splices() {
        let env = Environment::with_src("Test", "x");
        let mut state = State::new(&env, None);
        let mut out = Collect::default();

        state.emit_separator(&mut out, "\n  ");
        assert!(state.on_start_of_line);
        assert!(!state.on_newline);
    }
}
