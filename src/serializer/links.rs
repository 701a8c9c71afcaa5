//! Reconstruction of link markup from anchor elements.
//!
//! Link round-tripping is driven by the `rel` attribute: internal wikilinks
//! (with category, language, and interwiki variants) rebuild `[[…]]` markup
//! including pipe-trick and link-trail recovery, while external links
//! rebuild `[url …]`, numbered, bare-URL, and magic-link forms.

use super::{ChunkSink, Result, serialize_children_to_string, state::{EscapeContext, State}};
use crate::{
    dom::{DataParsoid, Document, NodeId},
    title,
};
use std::borrow::Cow;

/// The recognized link flavors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LinkType {
    /// `[[Target]]` and `[[Target|content]]`.
    Wiki,
    /// `[[Category:Name|sort key]]`.
    Category,
    /// `[[xx:Page]]` interlanguage links.
    Language,
    /// `[[prefix:Page]]` interwiki links.
    Interwiki,
    /// `[url content]`.
    Ext,
    /// A bare URL emitted without brackets.
    ExtUrl,
    /// `[url]` with generated ordinal content.
    ExtNumbered,
    /// ISBN/RFC/PMID magic links, emitted as their inner text.
    Magic,
}

/// Maps a `rel` attribute to a link flavor. Unknown values fall through to
/// the default HTML serializer.
pub(crate) fn link_type(rel: &str) -> Option<LinkType> {
    for part in rel.split_ascii_whitespace() {
        let ty = match part {
            "mw:WikiLink" => Some(LinkType::Wiki),
            "mw:WikiLink/Category" => Some(LinkType::Category),
            "mw:WikiLink/Language" => Some(LinkType::Language),
            "mw:WikiLink/Interwiki" => Some(LinkType::Interwiki),
            "mw:ExtLink" => Some(LinkType::Ext),
            "mw:ExtLink/URL" => Some(LinkType::ExtUrl),
            "mw:ExtLink/Numbered" => Some(LinkType::ExtNumbered),
            "mw:ExtLink/ISBN" | "mw:ExtLink/RFC" | "mw:ExtLink/PMID" => Some(LinkType::Magic),
            _ => None,
        };
        if ty.is_some() {
            return ty;
        }
    }
    None
}

/// Serializes an anchor (or category `<link>`) element.
pub(crate) fn serialize_link(
    state: &mut State<'_>,
    doc: &Document,
    node: NodeId,
    ty: LinkType,
    out: &mut dyn ChunkSink,
) -> Result {
    let dp = doc.dp(node).clone();
    // Title targets decode back to text; URL targets keep their escapes.
    let decode = matches!(
        ty,
        LinkType::Wiki | LinkType::Category | LinkType::Language | LinkType::Interwiki
    );
    let target = resolve_target(state, doc, node, decode);

    match ty {
        LinkType::Wiki => serialize_wikilink(state, doc, node, &dp, &target, out),
        LinkType::Category => serialize_category(state, &dp, &target, out),
        LinkType::Language | LinkType::Interwiki => {
            // The interwiki prefix survives in the recorded source; without
            // it, the decoded href target is the best reconstruction.
            if let Some(src) = &dp.src {
                state.emit(out, src);
            } else {
                state.emit(out, &format!("[[{target}]]"));
            }
            Ok(())
        }
        LinkType::Ext => serialize_extlink(state, doc, node, &target, out),
        LinkType::ExtUrl => {
            state.emit(out, &target);
            Ok(())
        }
        LinkType::ExtNumbered => {
            state.emit(out, &format!("[{target}]"));
            Ok(())
        }
        LinkType::Magic => {
            let content = doc.inline_text(node);
            state.emit(out, &content);
            Ok(())
        }
    }
}

/// Resolves the link target, preferring a template-generated attribute
/// source recorded for this element's `about` id over the `href` value.
fn resolve_target(state: &State<'_>, doc: &Document, node: NodeId, decode: bool) -> String {
    if let Some(about) = doc.about(node)
        && let Some(sources) = state.tpl_attrs.get(about)
        && let Some(src) = sources.vs.get("href").or_else(|| sources.kvs.get("href"))
    {
        return src.clone();
    }

    let href = doc.attr(node, "href").unwrap_or_default();
    if decode {
        decode_href(href).into_owned()
    } else {
        href.to_string()
    }
}

/// Decodes an `href` attribute into link-target text.
fn decode_href(href: &str) -> Cow<'_, str> {
    let trimmed = href.strip_prefix("./").unwrap_or(href);
    percent_encoding::percent_decode_str(trimmed).decode_utf8_lossy()
}

/// Serializes an internal wikilink.
fn serialize_wikilink(
    state: &mut State<'_>,
    doc: &Document,
    node: NodeId,
    dp: &DataParsoid,
    target: &str,
    out: &mut dyn ChunkSink,
) -> Result {
    // `[[` precedes the content, so whatever comes next is mid-line.
    state.on_start_of_line = false;
    let raw_content = serialize_children_to_string(state, doc, node, Some(EscapeContext::WikiLink))?;
    let (prefix, content, tail) = split_link_content_string(&raw_content, dp);

    let can_use_simple = can_use_simple(dp, target, content);
    let can_use_pipe_trick = can_use_pipe_trick(dp, target, content);

    let mut text = String::new();
    text += prefix;
    text += "[[";
    if can_use_simple {
        // The content names the same title, so it doubles as the target.
        text += content;
    } else {
        text += target;
        text.push('|');
        if !can_use_pipe_trick {
            if content.is_empty() {
                // An empty pipe would be expanded by the pre-save transform.
                text += "<nowiki/>";
            } else {
                text += content;
            }
        }
    }
    text += "]]";
    text += tail;

    state.emit(out, &text);
    Ok(())
}

/// Whether `[[target|content]]` may collapse to `[[content]]`.
fn can_use_simple(dp: &DataParsoid, target: &str, content: &str) -> bool {
    if content.is_empty() || dp.pipetrick || dp.piped_syntax() {
        return false;
    }
    title::normalize(content, false) == title::normalize(target, false)
        || title::normalize(content, true) == title::normalize(target, true)
}

/// Whether `[[target|content]]` may collapse to the pipe trick
/// `[[target|]]`.
fn can_use_pipe_trick(dp: &DataParsoid, target: &str, content: &str) -> bool {
    if !dp.pipetrick {
        return false;
    }
    let stripped = title::strip_pipe_trick_chars(target);
    title::normalize(content, false) == title::normalize(stripped, false)
        || title::normalize(content, true) == title::normalize(stripped, true)
}

/// Serializes a category link, recovering the sort key from the target
/// fragment.
fn serialize_category(
    state: &mut State<'_>,
    dp: &DataParsoid,
    target: &str,
    out: &mut dyn ChunkSink,
) -> Result {
    let (name, sort_key) = match target.split_once('#') {
        Some((name, key)) => (name, Some(key)),
        None => (target, None),
    };
    let (prefix, content, tail) = split_link_content_string(sort_key.unwrap_or(""), dp);

    let mut text = String::new();
    text += prefix;
    text += "[[";
    text += name;
    if sort_key.is_some() {
        text.push('|');
        text += content;
    }
    text += "]]";
    text += tail;

    state.emit(out, &text);
    Ok(())
}

/// Serializes a bracketed external link.
fn serialize_extlink(
    state: &mut State<'_>,
    doc: &Document,
    node: NodeId,
    target: &str,
    out: &mut dyn ChunkSink,
) -> Result {
    state.on_start_of_line = false;
    let content = serialize_children_to_string(state, doc, node, Some(EscapeContext::Link))?;

    let mut text = String::new();
    text.push('[');
    text += target;
    if !content.is_empty() {
        text.push(' ');
        text += &content;
    }
    text.push(']');

    state.emit(out, &text);
    Ok(())
}

/// Peels the recorded link trail and prefix off serialized link content.
///
/// ```wikitext
/// [[Foo|bar]]s
/// ```
///
/// round-trips with `tail: "s"` recorded on the anchor and `bars` as its
/// DOM text; the trail must come back out of the content before emission.
pub(crate) fn split_link_content_string<'a>(
    content: &'a str,
    dp: &'a DataParsoid,
) -> (&'a str, &'a str, &'a str) {
    let mut rest = content;

    let tail = match dp.tail.as_deref() {
        Some(tail) if !tail.is_empty() && rest.ends_with(tail) => {
            rest = &rest[..rest.len() - tail.len()];
            tail
        }
        _ => "",
    };
    let prefix = match dp.prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() && rest.starts_with(prefix) => {
            rest = &rest[prefix.len()..];
            prefix
        }
        _ => "",
    };

    (prefix, rest, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel_dispatch() {
        assert_eq!(link_type("mw:WikiLink"), Some(LinkType::Wiki));
        assert_eq!(link_type("mw:WikiLink/Category"), Some(LinkType::Category));
        assert_eq!(link_type("mw:ExtLink/Numbered"), Some(LinkType::ExtNumbered));
        assert_eq!(link_type("mw:ExtLink/ISBN"), Some(LinkType::Magic));
        assert_eq!(link_type("nofollow"), None);
    }

    #[test]
    fn content_splitting_peels_tail_and_prefix() {
        let dp = DataParsoid {
            tail: Some("s".into()),
            prefix: Some("a".into()),
            ..DataParsoid::default()
        };
        assert_eq!(split_link_content_string("abars", &dp), ("a", "bar", "s"));
        assert_eq!(split_link_content_string("bar", &dp), ("", "bar", ""));
    }

    #[test]
    fn simple_links_need_matching_titles() {
        let dp = DataParsoid::default();
        assert!(can_use_simple(&dp, "Foo", "Foo"));
        assert!(can_use_simple(&dp, "Foo_bar", "foo bar"));
        assert!(!can_use_simple(&dp, "Foo", "Bar"));

        let piped = DataParsoid {
            stx: Some("piped".into()),
            ..DataParsoid::default()
        };
        assert!(!can_use_simple(&piped, "Foo", "Foo"));
    }

    #[test]
    fn pipe_trick_matches_stripped_target() {
        let dp = DataParsoid {
            pipetrick: true,
            ..DataParsoid::default()
        };
        assert!(can_use_pipe_trick(&dp, "Foo (bar)", "Foo"));
        assert!(can_use_pipe_trick(&dp, "Help:Foo", "Foo"));
        assert!(!can_use_pipe_trick(&dp, "Foo (bar)", "Other"));
    }
}
