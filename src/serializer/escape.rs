//! Decides whether a text run must be wrapped in a literal-text fence.
//!
//! The strategy is all-or-nothing: if any substring of the run would change
//! meaning on re-parse, the whole run is wrapped in `<nowiki>…</nowiki>`.
//! Cheap character scans reject the common case before the re-tokenizer is
//! consulted.

use super::{
    TraceFlags,
    retokenize::{self, Probe},
    state::{EscapeContext, State},
    token::Token,
};
use regex::Regex;
use std::{borrow::Cow, sync::LazyLock};

/// Matches a line that would re-parse as a heading.
static HEADING_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=[^\n]*=[ \t]*\n*$").unwrap());

/// Escapes a text run for the current serialization context.
///
/// `sol` is true when the run will land at the start of a logical line.
pub(crate) fn escape_text(state: &mut State<'_>, text: &str, sol: bool) -> String {
    analyze_line(state);

    // Runs without any syntax-capable character cannot need fencing; the
    // line-pair triggers also depend on characters from the special set.
    if text.chars().all(char::is_whitespace)
        || (!has_wikitext_special(text) && !(sol && leading_space_then_content(text)))
    {
        return text.to_string();
    }

    let fenced = if unconditional_fence(text, sol) || context_fence(state, text) {
        true
    } else if quick_reject(text, sol) {
        false
    } else {
        tokenizer_fence(state, text, sol) || line_pair_fence(state, text)
    };

    if state.env.trace.contains(TraceFlags::ESCAPE) {
        log::trace!("escape sol={sol} fenced={fenced}: {text:?}");
    }
    if fenced { fence(text) } else { text.to_string() }
}

/// Triggers that fence regardless of context.
fn unconditional_fence(text: &str, sol: bool) -> bool {
    // A partial template expression is enough to derail the re-parse.
    if text.contains("{{") || text.contains("}}") {
        return true;
    }
    if sol && leading_space_then_content(text) {
        return true;
    }
    text.contains("~~~")
}

/// Context-free quick rejects for runs that cannot form a construct in the
/// given line position.
fn quick_reject(text: &str, sol: bool) -> bool {
    if sol {
        !text.starts_with([' ', '\t', '#', '*', ':', ';', '='])
            && !text.contains(['<', '[', ']', '>', '|', '\'', '!'])
            && !text.contains("----")
    } else {
        !text.contains("''") && memchr::memchr3(b'<', b'>', b']', text.as_bytes()).is_none()
    }
}

/// Whether the run contains any character that can participate in Wikitext
/// syntax.
fn has_wikitext_special(text: &str) -> bool {
    text.bytes().any(|b| {
        matches!(
            b,
            b'<' | b'>'
                | b'['
                | b']'
                | b'-'
                | b'+'
                | b'|'
                | b'\''
                | b'!'
                | b'='
                | b'#'
                | b'*'
                | b':'
                | b';'
                | b'~'
                | b'{'
                | b'}'
        )
    })
}

/// Whether the run starts with indentation that would trigger an indent-pre.
fn leading_space_then_content(text: &str) -> bool {
    let rest = text.trim_start_matches(' ');
    text.starts_with(' ') && !rest.is_empty() && !rest.starts_with('\n')
}

/// The contextual predicate of the innermost open construct.
fn context_fence(state: &State<'_>, text: &str) -> bool {
    match state.escape_context() {
        Some(EscapeContext::Heading) => {
            let line = state.curr_line.text.trim_end_matches([' ', '\t', '\n']);
            line.starts_with('=') && line.ends_with('=') && line.len() >= 2
        }
        Some(EscapeContext::ListItem) => text.starts_with(['#', '*', ':', ';']),
        Some(EscapeContext::Link) => text.contains(']'),
        Some(EscapeContext::Quote) => text.starts_with('\'') || text.ends_with('\''),
        Some(EscapeContext::TableHeader) => text.contains("!!"),
        Some(EscapeContext::WikiLink) => text.starts_with('|') || text.ends_with(']'),
        Some(EscapeContext::Anchor) => text.ends_with(']'),
        Some(EscapeContext::TableCell) => {
            text.contains('|') || (text.starts_with(['-', '+']) && bare_native_cell(state))
        }
        None => false,
    }
}

/// Whether the innermost cell was written as a bare `|` on its own line:
/// a leading `-` or `+` in such a cell would merge into row markup.
fn bare_native_cell(state: &State<'_>) -> bool {
    let Token::StartTag(tag) = &state.curr_tag_token else {
        return false;
    };
    matches!(tag.name.as_str(), "td" | "th")
        && tag.dp.dsr.is_some_and(|dsr| dsr.2 == Some(1))
        && !tag.dp.row_syntax()
        && tag.attrs.is_empty()
}

/// Runs the miniature re-tokenizer over the text and checks whether any
/// construct it finds would corrupt the run.
fn tokenizer_fence(state: &State<'_>, text: &str, sol: bool) -> bool {
    let mut probed: Cow<'_, str> = if sol {
        Cow::Borrowed(text)
    } else {
        // A leading placeholder suppresses start-of-line matches.
        Cow::Owned(format!("_{text}"))
    };
    if state.in_indent_pre && probed.contains('\n') {
        // Every line of an indent-pre is literal, so none of them may match
        // start-of-line constructs.
        probed = Cow::Owned(probed.replace('\n', "\n_"));
    }

    retokenize::tokenize(&probed).iter().any(Probe::forces_fence)
}

/// Lazily analyzes the gathered line once more than one piece contributes
/// to it.
fn analyze_line(state: &mut State<'_>) {
    let line = &mut state.curr_line;
    if line.processed || line.num_pieces <= 1 {
        return;
    }
    line.processed = true;
    line.has_heading_pair = HEADING_PAIR.is_match(&line.text);
    line.has_bracket_pair = retokenize::has_bracket_pair(&line.text);
}

/// The line-pair triggers: a piece that contributes one half of a heading
/// or link pair assembled across multiple pieces must be fenced.
fn line_pair_fence(state: &State<'_>, text: &str) -> bool {
    if state.curr_line.num_pieces <= 1 {
        return false;
    }
    (state.curr_line.has_heading_pair && text.starts_with('='))
        || (state.curr_line.has_bracket_pair && text.contains(']'))
}

/// Wraps `text` in a literal-text fence, preserving trailing newlines
/// outside the fence and masking any literal fence tags inside it.
pub(crate) fn fence(text: &str) -> String {
    let masked = text
        .replace("<nowiki>", "&lt;nowiki&gt;")
        .replace("</nowiki>", "&lt;/nowiki&gt;")
        .replace("<nowiki/>", "&lt;nowiki/&gt;");
    let content_end = masked.trim_end_matches('\n').len();
    format!(
        "<nowiki>{}</nowiki>{}",
        &masked[..content_end],
        &masked[content_end..]
    )
}

/// Protects entity lookalikes in a text run so that a re-parse decodes back
/// to the original characters.
pub(crate) fn escape_entity_lookalikes(text: &str) -> Cow<'_, str> {
    static ENTITY: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"&[#0-9a-zA-Z]+;").unwrap());

    let mut out = String::new();
    let mut flushed = 0;
    for m in ENTITY.find_iter(text) {
        if html_escape::decode_html_entities(m.as_str()) != m.as_str() {
            out += &text[flushed..m.start()];
            out += "&amp;";
            out += &m.as_str()[1..];
            flushed = m.end();
        }
    }

    if flushed == 0 {
        Cow::Borrowed(text)
    } else {
        out += &text[flushed..];
        Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::Environment;

    fn fresh<'a>(env: &'a Environment) -> State<'a> {
        State::new(env, None)
    }

    #[test]
    fn plain_text_passes_through() {
        let env = Environment::new("Test");
        let mut state = fresh(&env);
        assert_eq!(escape_text(&mut state, "plain words", true), "plain words");
        assert_eq!(escape_text(&mut state, "a - b", false), "a - b");
    }

    #[test]
    fn templates_and_signatures_are_fenced() {
        let env = Environment::new("Test");
        let mut state = fresh(&env);
        assert_eq!(
            escape_text(&mut state, "a {{tpl}} b", false),
            "<nowiki>a {{tpl}} b</nowiki>"
        );
        assert_eq!(
            escape_text(&mut state, "sig ~~~~", false),
            "<nowiki>sig ~~~~</nowiki>"
        );
    }

    #[test]
    fn indent_pre_trigger_only_at_start_of_line() {
        let env = Environment::new("Test");
        let mut state = fresh(&env);
        assert_eq!(
            escape_text(&mut state, " leading", true),
            "<nowiki> leading</nowiki>"
        );
        assert_eq!(escape_text(&mut state, " middle", false), " middle");
    }

    #[test]
    fn list_bullets_fence_at_start_of_line() {
        let env = Environment::new("Test");
        let mut state = fresh(&env);
        assert_eq!(
            escape_text(&mut state, "* not a list", true),
            "<nowiki>* not a list</nowiki>"
        );
    }

    #[test]
    fn quote_context_catches_edge_apostrophes() {
        let env = Environment::new("Test");
        let mut state = fresh(&env);
        state.wte_stack.push(EscapeContext::Quote);
        assert_eq!(
            escape_text(&mut state, "rock'", false),
            "<nowiki>rock'</nowiki>"
        );
        state.wte_stack.pop();
        assert_eq!(escape_text(&mut state, "rock'", false), "rock'");
    }

    #[test]
    fn wikilink_context_catches_pipes_and_brackets() {
        let env = Environment::new("Test");
        let mut state = fresh(&env);
        state.wte_stack.push(EscapeContext::WikiLink);
        assert_eq!(
            escape_text(&mut state, "|piped", false),
            "<nowiki>|piped</nowiki>"
        );
    }

    #[test]
    fn fencing_keeps_trailing_newlines_outside() {
        assert_eq!(fence("a''b\n\n"), "<nowiki>a''b</nowiki>\n\n");
    }

    #[test]
    fn fencing_masks_literal_fence_tags() {
        assert_eq!(
            fence("x <nowiki>y</nowiki>"),
            "<nowiki>x &lt;nowiki&gt;y&lt;/nowiki&gt;</nowiki>"
        );
    }

    #[test]
    fn entity_lookalikes_are_protected() {
        assert_eq!(escape_entity_lookalikes("a &lt; b"), "a &amp;lt; b");
        assert_eq!(escape_entity_lookalikes("a & b"), "a & b");
        assert_eq!(escape_entity_lookalikes("&bogus;"), "&bogus;");
    }

    #[test]
    fn heading_pieces_fence_when_the_line_pairs_up() {
        let env = Environment::new("Test");
        let mut state = fresh(&env);
        state.curr_line.text = "=text=".to_string();
        state.curr_line.num_pieces = 2;
        assert_eq!(
            escape_text(&mut state, "=text=", true),
            "<nowiki>=text=</nowiki>"
        );
    }
}
