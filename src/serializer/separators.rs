//! Verbatim reconstruction of inter-element whitespace from the original
//! source.
//!
//! When the parser recorded document source ranges, the text between two
//! adjacent elements can be copied straight out of the original Wikitext,
//! preserving blank lines and comments exactly. A splice is only trusted
//! when the extracted span contains nothing but whitespace and comments;
//! anything else means the ranges do not line up and the handler-driven
//! newlines win.

use super::{ChunkSink, state::State};
use crate::dom::{Document, NodeId};
use regex::Regex;
use std::sync::LazyLock;

/// The boundary kinds between two nodes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SepKind {
    /// Between a parent's opening markup and its first element child.
    Start,
    /// Between two adjacent element children.
    InterElement,
    /// Between the last element child and the parent's closing markup.
    End,
}

/// Matches a run of whitespace and well-formed comments, and nothing else.
static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\s|<!--(?:[^-]|-[^-]|--[^>])*-*-->)*$").unwrap());

/// Attempts to splice the separator between `n1` and `n2` from the original
/// source. Returns whether a splice (or recorded fallback) was emitted.
pub(crate) fn emit_separator(
    state: &mut State<'_>,
    doc: &Document,
    out: &mut dyn ChunkSink,
    n1: NodeId,
    n2: NodeId,
    kind: SepKind,
    recorded: Option<&str>,
) -> bool {
    if let Some(sep) = extract(state, doc, n1, n2, kind) {
        state.emit_separator(out, &sep);
        return true;
    }

    // The preprocessing pass may have recorded the original run on a
    // separator marker even when the ranges cannot be trusted.
    if let Some(recorded) = recorded {
        state.emit_separator(out, recorded);
        return true;
    }

    false
}

/// Extracts and validates the source span between two nodes.
fn extract(
    state: &State<'_>,
    doc: &Document,
    n1: NodeId,
    n2: NodeId,
    kind: SepKind,
) -> Option<String> {
    let src = state.src()?;
    let dsr1 = doc.dp(n1).dsr?;
    let dsr2 = doc.dp(n2).dsr?;

    let (from, to) = match kind {
        SepKind::Start => (dsr1.inner_start()?, dsr2.start()?),
        SepKind::InterElement => (dsr1.end()?, dsr2.start()?),
        SepKind::End => (dsr1.end()?, dsr2.inner_end()?),
    };

    if from > to || to > src.len() || !src.is_char_boundary(from) || !src.is_char_boundary(to) {
        log::warn!("separator range {from}..{to} does not fit the source");
        return None;
    }

    let sep = &src[from..to];
    if SEPARATOR.is_match(sep) {
        Some(sep.to_string())
    } else {
        // Silent fallback: the handler-driven newlines take over.
        log::debug!("separator span {from}..{to} is not whitespace: {sep:?}");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_pattern_accepts_whitespace_and_comments() {
        assert!(SEPARATOR.is_match(""));
        assert!(SEPARATOR.is_match("\n\n"));
        assert!(SEPARATOR.is_match("  \t\n"));
        assert!(SEPARATOR.is_match("\n<!-- note -->\n"));
        assert!(SEPARATOR.is_match("<!-- a --><!-- b -->"));
    }

    #[test]
    fn separator_pattern_rejects_content() {
        assert!(!SEPARATOR.is_match("\nx\n"));
        assert!(!SEPARATOR.is_match("<!-- unterminated"));
        assert!(!SEPARATOR.is_match("<!-- a --> x"));
    }
}
