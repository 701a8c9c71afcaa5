//! A miniature synchronous Wikitext re-tokenizer.
//!
//! The escape engine needs to know whether a run of plain text would, if
//! re-parsed, produce Wikitext constructs. This grammar answers exactly that
//! question: it classifies the input into construct probes without building
//! a token tree, and it never suspends, so it is safe to call from the
//! middle of serialization.
//!
//! Start-of-line sensitivity is encoded positionally: constructs anchored to
//! the start of a line only match at the start of the input or directly
//! after a newline. Callers suppress start-of-line matches by prefixing the
//! input with a placeholder character (see
//! [`escape`](super::escape)).

use super::config::{HTML5_TAGS, PAGE_PROP_MAGIC_WORDS, has_valid_protocol};

/// A Wikitext construct detected in a probed text run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Probe {
    /// A heading line (`= … =`).
    Heading,
    /// A list item bullet sequence at start of line.
    ListItem,
    /// A table start (`{|`).
    TableStart,
    /// A table row separator (`|-`).
    TableRow,
    /// A table caption (`|+`).
    TableCaption,
    /// A table data cell (`|` or `||`).
    TableCell,
    /// A table header cell (`!`).
    TableHeader,
    /// A table end (`|}`).
    TableEnd,
    /// A horizontal rule (`----`).
    Hr,
    /// A bold or italic apostrophe run.
    Quote,
    /// An internal link (`[[…]]`).
    WikiLink,
    /// A template or parameter opener (`{{`).
    Template,
    /// A behavior switch (`__WORD__`).
    BehaviorSwitch,
    /// A signature (`~~~` through `~~~~~`).
    Signature,
    /// A decodable HTML entity.
    Entity,
    /// A bracketed external link.
    ExtLink {
        /// Whether the target has a registered protocol.
        valid: bool,
    },
    /// A bare URL that would autolink.
    UrlLink,
    /// An XML-ish tag.
    Html {
        /// Whether the tag name is meaningful to the Wikitext parser.
        known: bool,
    },
}

impl Probe {
    /// Whether this construct surviving a re-parse would corrupt the text
    /// run, forcing a literal-text fence around it.
    pub fn forces_fence(&self) -> bool {
        match self {
            // A bare URL round-trips as itself, and a bracket pair with an
            // invalid protocol re-parses as plain text.
            Probe::UrlLink => false,
            Probe::ExtLink { valid } => *valid,
            // The parser entity-escapes unknown tags on its own.
            Probe::Html { known } => *known,
            _ => true,
        }
    }
}

/// Extension tag names that the parser treats specially even though they are
/// not whitelisted HTML.
fn is_extension_tag(name: &str) -> bool {
    name.eq_ignore_ascii_case("nowiki")
        || name.eq_ignore_ascii_case("includeonly")
        || name.eq_ignore_ascii_case("noinclude")
        || name.eq_ignore_ascii_case("onlyinclude")
        || name.eq_ignore_ascii_case("ref")
        || name.eq_ignore_ascii_case("references")
        || name.eq_ignore_ascii_case("gallery")
        || name.eq_ignore_ascii_case("pre")
}

peg::parser! { grammar probe() for str {
    /// The top-level probe rule: a sequence of lines.
    pub rule document() -> Vec<Probe>
    = ls:line() ** "\n" { ls.concat() }

    /// One line: an optional start-of-line construct followed by inline
    /// content.
    rule line() -> Vec<Probe>
    = s:sol_probe()? xs:inline_probe()*
    { s.into_iter().chain(xs.into_iter().flatten()).collect() }

    /// A construct that is only meaningful at the start of a line.
    rule sol_probe() -> Probe
    = heading()
    / hr()
    / list_item()
    / table_markup()

    /// A heading line.
    ///
    /// ```wikitext
    /// == Heading ==
    /// ```
    rule heading() -> Probe
    = l:$("=" [^'\n']*) &eolf()
    {?
        let trimmed = l.trim_end_matches([' ', '\t']);
        if trimmed.len() >= 2 && trimmed.ends_with('=') {
            Ok(Probe::Heading)
        } else {
            Err("heading")
        }
    }

    /// A horizontal rule.
    rule hr() -> Probe
    = "----" "-"* { Probe::Hr }

    /// A list item bullet sequence.
    rule list_item() -> Probe
    = ['*'|'#'|':'|';']+ { Probe::ListItem }

    /// Any table markup anchored to the start of a line.
    rule table_markup() -> Probe
    = "{|" { Probe::TableStart }
    / "|}" { Probe::TableEnd }
    / "|-" "-"* { Probe::TableRow }
    / "|+" { Probe::TableCaption }
    / "|" "|"? { Probe::TableCell }
    / "!" { Probe::TableHeader }

    /// An inline construct, or one plain character.
    rule inline_probe() -> Option<Probe>
    = t:(
        quote()
        / wikilink()
        / extlink()
        / urllink()
        / template()
        / behavior_switch()
        / entity()
        / xmlish_tag()
        / signature()
      ) { Some(t) }
    / [^'\n'] { None }

    /// A bold or italic apostrophe run.
    rule quote() -> Probe
    = "''" "'"* { Probe::Quote }

    /// An internal link.
    rule wikilink() -> Probe
    = "[[" (!"]]" [^'\n'])* "]]" { Probe::WikiLink }

    /// A bracketed external link. The protocol decides whether a re-parse
    /// would produce a link or leave the brackets as text.
    rule extlink() -> Probe
    = "[" target:$([^' '|'\t'|']'|'\n']*) ([' '|'\t']+ [^']'|'\n']*)? "]"
    { Probe::ExtLink { valid: has_valid_protocol(target) } }

    /// A bare URL.
    rule urllink() -> Probe
    = p:$(
        ['A'..='Z'|'a'..='z'] ['-'|'A'..='Z'|'a'..='z'|'0'..='9'|'+'|'.']* ":" "//"?
        [^' '|'\t'|'\n'|'['|']'|'<'|'>'|'"'|'{'|'}']+
      )
    {?
        if has_valid_protocol(p) {
            Ok(Probe::UrlLink)
        } else {
            Err("urllink")
        }
    }

    /// A template or template parameter opener.
    rule template() -> Probe
    = "{{" { Probe::Template }

    /// A behavior switch.
    ///
    /// ```wikitext
    /// __NOTOC__
    /// ```
    rule behavior_switch() -> Probe
    = "__" name:$((!"__" ['-'|'A'..='Z'|'a'..='z'])+) "__"
    {?
        if PAGE_PROP_MAGIC_WORDS.contains_key(name.to_ascii_lowercase().as_str()) {
            Ok(Probe::BehaviorSwitch)
        } else {
            Err("behavior switch")
        }
    }

    /// A decodable HTML entity.
    rule entity() -> Probe
    = m:$("&" ['#'|'0'..='9'|'a'..='z'|'A'..='Z']+ ";")
    {?
        if html_escape::decode_html_entities(m) == m {
            Err("entity")
        } else {
            Ok(Probe::Entity)
        }
    }

    /// An XML-ish start, end, or self-closing tag.
    rule xmlish_tag() -> Probe
    = "<" "/"?
      name:$(['A'..='Z'|'a'..='z'] ['-'|'A'..='Z'|'a'..='z'|'0'..='9']*)
      [^'>'|'\n']* ">"
    {
        let name = name.to_ascii_lowercase();
        Probe::Html {
            known: HTML5_TAGS.contains(name.as_str()) || is_extension_tag(&name),
        }
    }

    /// A signature.
    rule signature() -> Probe
    = "~~~" "~"* { Probe::Signature }

    /// Any newline or end of input.
    rule eolf() = &"\n" / ![_]
}}

/// Probes `text` for Wikitext constructs. Never fails; unparseable input
/// yields no probes.
pub(crate) fn tokenize(text: &str) -> Vec<Probe> {
    probe::document(text).unwrap_or_default()
}

/// A reduced pass that only reports whether the text contains a bracketed
/// link pair, used by the line-level escape analysis.
pub(crate) fn has_bracket_pair(text: &str) -> bool {
    tokenize(text)
        .iter()
        .any(|p| matches!(p, Probe::WikiLink | Probe::ExtLink { valid: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn assert_fences(text: &str, expected: bool) {
        let fences = tokenize(text).iter().any(Probe::forces_fence);
        assert_eq!(fences, expected, "probing {text:?}");
    }

    #[test]
    fn plain_text_is_inert() {
        assert_fences("just some words", false);
        assert_fences("1 + 1 = 2 apples", false);
        assert_fences("a [lone bracket", false);
    }

    #[test]
    fn quotes_and_links_force_fences() {
        assert_fences("''italic''", true);
        assert_fences("a [[link]] b", true);
        assert_fences("[https://example.com x]", true);
    }

    #[test]
    fn invalid_extlinks_and_bare_urls_are_inert() {
        assert_fences("[not a link]", false);
        assert_fences("see https://example.com for details", false);
    }

    #[test]
    fn sol_constructs_only_match_at_line_start() {
        assert_fences("* bullet", true);
        assert_fences("_* not a bullet", false);
        assert_fences("text\n# ordered", true);
        assert_fences("== h ==", true);
        assert_fences("_== not a heading ==", false);
        assert_fences("x = y", false);
    }

    #[test]
    fn table_markup_matches_at_line_start() {
        assert_fences("{| class", true);
        assert_fences("|cell", true);
        assert_fences("!header", true);
        assert_fences("_a | b", false);
    }

    #[test]
    fn tags_follow_the_whitelist() {
        assert_fences("a <b> c", true);
        assert_fences("<nowiki>x</nowiki>", true);
        assert_fences("a <madeup> c", false);
    }

    #[test]
    fn entities_force_fences() {
        assert_fences("5 &lt; 6", true);
        assert_fences("a &oops; b", false);
    }

    #[test]
    fn bracket_pair_detection() {
        assert!(has_bracket_pair("a [[b]] c"));
        assert!(has_bracket_pair("[//example.com x]"));
        assert!(!has_bracket_pair("a ] b [ c"));
    }
}
