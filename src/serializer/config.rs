//! Static Wikitext tables used throughout the serializer.

// The tag lists are loosely based on `parse_wiki_text`. The upstream
// copyright is:
//
// SPDX-License-Identifier: MIT
// SPDX-FileCopyright: Copyright 2019 Fredrik Portström and other contributors

use phf::{Map, Set};

/// HTML5 tags allowed in Wikitext.
pub(crate) static HTML5_TAGS: Set<&str> = phf::phf_set! {
    // Explicit `<a>` tags are forbidden in Wikitext.
    "abbr",
    "b", "bdi", "bdo", "big", "blockquote", "br",
    "caption", "center", "cite", "code",
    "data", "dd", "del", "dfn", "div", "dl", "dt",
    "em",
    "font",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "i", "ins",
    "kbd",
    "li",
    "mark",
    "ol",
    "p", "pre",
    "q",
    "rb", "rp", "rt", "rtc", "ruby",
    "s", "samp", "small", "span", "strike", "strong", "sub", "sup",
    "table", "td", "th", "time", "tr", "tt",
    "u", "ul",
    "var",
    "wbr",
};

/// Void HTML5 tags.
pub(crate) static VOID_TAGS: Set<&str> = phf::phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img",
    "input", "link", "meta", "param", "source",
    "track", "wbr",
};

/// Block-level tags, used for line scoping and newline normalization.
pub(crate) static BLOCK_TAGS: Set<&str> = phf::phf_set! {
    "blockquote", "body",
    "dd", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "li",
    "ol",
    "p", "pre",
    "table", "td", "th", "tr",
    "ul",
};

/// Protocols that can start an external link.
pub(crate) static URL_PROTOCOLS: Set<&str> = phf::phf_set! {
    "//",
    "ftp://", "ftps://",
    "gopher://",
    "http://", "https://",
    "irc://", "ircs://",
    "mailto:",
    "news:", "nntp://",
    "sftp://", "ssh://", "svn://",
    "telnet://",
    "worldwind://",
};

/// Simple image options: maps `img_` + the written value to the canonical
/// option key it satisfies. An option `{k, v}` is simple when
/// `SIMPLE_IMG_OPTIONS["img_" + v] == k`; it round-trips as the bare value.
pub(crate) static SIMPLE_IMG_OPTIONS: Map<&str, &str> = phf::phf_map! {
    "img_border" => "border",
    "img_frame" => "format",
    "img_framed" => "format",
    "img_frameless" => "format",
    "img_thumb" => "format",
    "img_thumbnail" => "format",
    "img_left" => "halign",
    "img_right" => "halign",
    "img_center" => "halign",
    "img_none" => "halign",
    "img_baseline" => "valign",
    "img_sub" => "valign",
    "img_super" => "valign",
    "img_top" => "valign",
    "img_text-top" => "valign",
    "img_middle" => "valign",
    "img_bottom" => "valign",
    "img_text-bottom" => "valign",
};

/// Prefix image options: maps the canonical option key to the magic-word
/// pattern its value is interpolated into.
pub(crate) static PREFIX_IMG_OPTIONS: Map<&str, &str> = phf::phf_map! {
    "link" => "link=$1",
    "alt" => "alt=$1",
    "page" => "page=$1",
    "upright" => "upright=$1",
    "lang" => "lang=$1",
    "thumbtime" => "thumbtime=$1",
};

/// Canonical magic words for page properties serialized from
/// `mw:PageProp/<name>` metas when no recorded spelling survives.
pub(crate) static PAGE_PROP_MAGIC_WORDS: Map<&str, &str> = phf::phf_map! {
    "notoc" => "__NOTOC__",
    "forcetoc" => "__FORCETOC__",
    "toc" => "__TOC__",
    "noeditsection" => "__NOEDITSECTION__",
    "nogallery" => "__NOGALLERY__",
    "index" => "__INDEX__",
    "noindex" => "__NOINDEX__",
    "newsectionlink" => "__NEWSECTIONLINK__",
    "nonewsectionlink" => "__NONEWSECTIONLINK__",
    "hiddencat" => "__HIDDENCAT__",
    "staticredirect" => "__STATICREDIRECT__",
};

/// Returns true if `target` starts with a registered external link protocol
/// followed by at least one more character.
pub(crate) fn has_valid_protocol(target: &str) -> bool {
    URL_PROTOCOLS.iter().any(|protocol| {
        target
            .get(..protocol.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(protocol))
            && target.len() > protocol.len()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_requires_an_address() {
        assert!(has_valid_protocol("https://example.com"));
        assert!(has_valid_protocol("//example.com"));
        assert!(!has_valid_protocol("https://"));
        assert!(!has_valid_protocol("example.com"));
    }
}
