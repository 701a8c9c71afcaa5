//! Title canonicalization for link comparison.
//!
//! Link simplification decides whether `[[target|content]]` can collapse to
//! `[[content]]` by comparing the two sides under MediaWiki title rules:
//! entity decoding, whitespace and underscore folding, and first-letter
//! case insensitivity.

use html_escape::decode_html_entities;
use std::borrow::Cow;

/// Returns true for characters that a title treats as foldable whitespace.
fn spacelike(c: char) -> bool {
    matches!(c, ' ' | '_' | '\t' | '\n' | '\r' | '\u{a0}')
}

/// Canonicalizes a link target or link text for comparison.
///
/// Underscores fold into spaces only when `fold_underscores` is set, so
/// callers can compare under both readings of the target.
pub(crate) fn normalize(text: &str, fold_underscores: bool) -> String {
    let decoded = decode_html_entities(text);
    let mut out = String::with_capacity(decoded.len());

    let mut pending_space = false;
    for c in decoded.chars() {
        if spacelike(c) && (fold_underscores || c != '_') {
            // Runs of whitespace collapse to a single space; leading and
            // trailing runs drop entirely.
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }

    capitalize_first(&out).into_owned()
}

/// Uppercases the first letter of a title, the way default-cased namespaces
/// treat page names.
fn capitalize_first(text: &str) -> Cow<'_, str> {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if !first.is_uppercase() => {
            let mut out = String::with_capacity(text.len());
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            Cow::Owned(out)
        }
        _ => Cow::Borrowed(text),
    }
}

/// Strips the pieces of a link target that the pipe trick removes.
///
/// ```wikitext
/// [[Namespace:Foo (bar)|]]  ->  Foo
/// [[Foo, bar|]]             ->  Foo
/// ```
pub(crate) fn strip_pipe_trick_chars(target: &str) -> &str {
    /// Word separators in title text: link targets may carry either form.
    fn is_break(byte: u8) -> bool {
        matches!(byte, b' ' | b'_')
    }

    let target = target
        .split_once(':')
        .map_or(target, |(_, rest)| rest)
        .trim_ascii();

    if target.ends_with(')')
        && let Some(open) = target.rfind('(')
        && open > 0
        && is_break(target.as_bytes()[open - 1])
    {
        return target[..open - 1].trim_matches([' ', '_']);
    }
    if let Some(comma) = target.find(',')
        && target.as_bytes().get(comma + 1).copied().is_some_and(is_break)
    {
        return target[..comma].trim_matches([' ', '_']);
    }
    target
}
