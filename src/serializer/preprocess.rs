//! The pre-walk pass over the document.
//!
//! Before the serializer walks the tree it decodes round-trip metadata,
//! collects template-generated attribute sources into the side table,
//! coalesces text nodes, and — depending on whether the original source is
//! available — either collapses inter-element whitespace into separator
//! markers or strips the syntactic newlines the serializer will regenerate.

use super::{Error, Result, state::State};
use crate::dom::{Attribute, DataParsoid, Document, Element, NodeData, NodeId};

/// Runs the full preprocessing pass.
pub(crate) fn preprocess(state: &mut State<'_>, doc: &mut Document, root: NodeId) -> Result {
    decode_metadata(doc, root)?;
    collect_template_attributes(state, doc, root);
    coalesce_text(doc, root);
    if state.has_src() {
        extract_separators(doc, root);
    } else {
        normalize_sourceless(doc, root);
    }
    Ok(())
}

/// Decodes `data-parsoid` attributes into typed records, once, ahead of the
/// walk. A malformed record is fatal: nothing downstream can trust the
/// ranges after one.
fn decode_metadata(doc: &mut Document, node: NodeId) -> Result {
    let Some(element) = doc.element(node) else {
        return Ok(());
    };
    let tag = element.name.clone();
    let json = element.attr("data-parsoid").map(str::to_string);

    if let Some(json) = json {
        let dp = DataParsoid::from_json(&json).map_err(|err| Error::Metadata { tag, err })?;
        if let Some(element) = doc.element_mut(node) {
            element.dp = dp;
        }
    }

    for child in doc.children(node).to_vec() {
        decode_metadata(doc, child)?;
    }
    Ok(())
}

/// Collects template-generated attribute sources from
/// `mw:objectAttr{,Key,Val}#name` markers into the side table.
fn collect_template_attributes(state: &mut State<'_>, doc: &Document, node: NodeId) {
    if doc.is_element_named(node, "meta")
        && let Some(property) = doc.attr(node, "property")
        && let Some(rest) = property.strip_prefix("mw:objectAttr")
        && let Some(about) = doc.about(node)
        && let Some(src) = doc.dp(node).src.clone()
    {
        let sources = state.tpl_attrs.entry(about.to_string()).or_default();
        match rest.split_once('#') {
            Some(("", attr)) => {
                sources.kvs.insert(attr.to_string(), src);
            }
            Some(("Key", attr)) => {
                sources.ks.insert(attr.to_string(), src);
            }
            Some(("Val", attr)) => {
                sources.vs.insert(attr.to_string(), src);
            }
            _ => log::warn!("unrecognized object attribute property {property:?}"),
        }
    }

    for child in doc.children(node).to_vec() {
        collect_template_attributes(state, doc, child);
    }
}

/// Concatenates adjacent text nodes and deletes empty ones.
fn coalesce_text(doc: &mut Document, node: NodeId) {
    let children = doc.children(node).to_vec();
    for child in &children {
        coalesce_text(doc, *child);
    }

    let mut index = 0;
    while index < doc.children(node).len() {
        let child = doc.children(node)[index];
        let NodeData::Text(text) = doc.data(child) else {
            index += 1;
            continue;
        };

        if text.is_empty() {
            doc.splice_children(node, index..index + 1, vec![]);
            continue;
        }

        // Pull every directly following text node into this one.
        let mut merged = text.clone();
        let mut run_end = index + 1;
        while run_end < doc.children(node).len() {
            let next = doc.children(node)[run_end];
            let NodeData::Text(next_text) = doc.data(next) else {
                break;
            };
            merged += next_text;
            run_end += 1;
        }
        if run_end > index + 1 {
            *doc.data_mut(child) = NodeData::Text(merged);
            doc.splice_children(node, index + 1..run_end, vec![]);
        }
        index += 1;
    }
}

/// Whether separator extraction must leave this element alone.
fn keeps_whitespace(doc: &Document, node: NodeId) -> bool {
    match doc.tag_name(node) {
        Some("pre") => true,
        Some("span") => doc
            .type_of(node)
            .is_some_and(|t| t.split_ascii_whitespace().any(|t| t == "mw:Entity")),
        _ => false,
    }
}

/// Replaces runs of whitespace text and comments between element children
/// with a single separator marker carrying the original run, after floating
/// diff markers leftward out of the runs.
fn extract_separators(doc: &mut Document, node: NodeId) {
    let children = doc.children(node).to_vec();
    for child in &children {
        if doc.element(*child).is_some() {
            extract_separators(doc, *child);
        }
    }

    if keeps_whitespace(doc, node)
        || !doc
            .children(node)
            .iter()
            .any(|child| doc.element(*child).is_some())
    {
        return;
    }

    float_diff_markers(doc, node);

    let mut index = 0;
    while index < doc.children(node).len() {
        let run_start = index;
        let mut recorded = String::new();
        while index < doc.children(node).len() {
            let child = doc.children(node)[index];
            match doc.data(child) {
                NodeData::Text(text) if text.chars().all(char::is_whitespace) => {
                    recorded += text;
                }
                NodeData::Comment(comment) => {
                    recorded += "<!--";
                    recorded += comment;
                    recorded += "-->";
                }
                _ => break,
            }
            index += 1;
        }

        if index == run_start {
            index += 1;
            continue;
        }

        // Only runs flanked by elements (or the parent's edges) fold into
        // separators; a comment floating in the middle of running text
        // stays a comment.
        let before_ok = run_start == 0 || doc.element(doc.children(node)[run_start - 1]).is_some();
        let after_ok = index == doc.children(node).len()
            || doc.element(doc.children(node)[index]).is_some();
        if !(before_ok && after_ok) {
            continue;
        }

        let marker = doc.create(NodeData::Element(Element {
            name: "meta".to_string(),
            attrs: vec![
                Attribute {
                    key: "typeof".to_string(),
                    value: "mw:Separator".to_string(),
                },
                Attribute {
                    key: "data-sep".to_string(),
                    value: recorded,
                },
            ],
            dp: DataParsoid::default(),
        }));
        doc.splice_children(node, run_start..index, vec![marker]);
        index = run_start + 1;
    }
}

/// Floats `mw:DiffMarker` metas leftward past whitespace runs so they sit
/// against the element they annotate.
fn float_diff_markers(doc: &mut Document, node: NodeId) {
    let mut index = 1;
    while index < doc.children(node).len() {
        let child = doc.children(node)[index];
        let is_diff_marker = doc.is_element_named(child, "meta")
            && doc
                .type_of(child)
                .is_some_and(|t| t.split_ascii_whitespace().any(|t| t == "mw:DiffMarker"));
        if is_diff_marker {
            let mut to = index;
            while to > 0 {
                let prev = doc.children(node)[to - 1];
                let floatable = doc.is_whitespace_text(prev)
                    || matches!(doc.data(prev), NodeData::Comment(_));
                if !floatable {
                    break;
                }
                to -= 1;
            }
            if to != index {
                doc.splice_children(node, index..index + 1, vec![]);
                doc.splice_children(node, to..to, vec![child]);
            }
        }
        index += 1;
    }
}

/// Without source, the newlines around block elements are syntactic: the
/// serializer regenerates them, so they come out of the text nodes now.
fn normalize_sourceless(doc: &mut Document, node: NodeId) {
    let children = doc.children(node).to_vec();
    for child in &children {
        if doc.element(*child).is_some() {
            normalize_sourceless(doc, *child);
        }
    }

    let mut index = 0;
    while index < doc.children(node).len() {
        let child = doc.children(node)[index];
        if doc.element(child).is_none() {
            index += 1;
            continue;
        }
        let is_block = doc
            .tag_name(child)
            .is_some_and(|name| super::config::BLOCK_TAGS.contains(name));
        if !is_block {
            index += 1;
            continue;
        }

        if index > 0 {
            let prev = doc.children(node)[index - 1];
            if let NodeData::Text(text) = doc.data(prev) {
                let trimmed = text.trim_end_matches('\n').to_string();
                if trimmed.len() != text.len() {
                    if trimmed.is_empty() {
                        doc.splice_children(node, index - 1..index, vec![]);
                        index -= 1;
                    } else {
                        *doc.data_mut(prev) = NodeData::Text(trimmed);
                    }
                }
            }
        }
        if index + 1 < doc.children(node).len() {
            let next = doc.children(node)[index + 1];
            if let NodeData::Text(text) = doc.data(next) {
                let trimmed = text.trim_start_matches('\n').to_string();
                if trimmed.len() != text.len() {
                    if trimmed.is_empty() {
                        doc.splice_children(node, index + 1..index + 2, vec![]);
                    } else {
                        *doc.data_mut(next) = NodeData::Text(trimmed);
                    }
                }
            }
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::Environment;

    #[test]
    fn text_nodes_coalesce() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.append(body, NodeData::Element(Element {
            name: "p".into(),
            ..Element::default()
        }));
        doc.append(p, NodeData::Text("a".into()));
        doc.append(p, NodeData::Text(String::new()));
        doc.append(p, NodeData::Text("b".into()));
        coalesce_text(&mut doc, body);

        assert_eq!(doc.children(p).len(), 1);
        let child = doc.children(p)[0];
        assert!(matches!(doc.data(child), NodeData::Text(t) if t == "ab"));
    }

    #[test]
    fn whitespace_between_elements_becomes_a_separator_marker() {
        let env = Environment::with_src("Test", "x");
        let mut state = State::new(&env, None);
        let mut doc = Document::new();
        let body = doc.body();
        doc.append(body, NodeData::Element(Element {
            name: "p".into(),
            ..Element::default()
        }));
        doc.append(body, NodeData::Text("\n\n".into()));
        doc.append(body, NodeData::Element(Element {
            name: "p".into(),
            ..Element::default()
        }));
        preprocess(&mut state, &mut doc, body).unwrap();

        assert_eq!(doc.children(body).len(), 3);
        let sep = doc.children(body)[1];
        assert_eq!(doc.type_of(sep), Some("mw:Separator"));
        assert_eq!(doc.attr(sep, "data-sep"), Some("\n\n"));
    }

    #[test]
    fn comments_between_text_stay_comments() {
        let env = Environment::with_src("Test", "x");
        let mut state = State::new(&env, None);
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.append(body, NodeData::Element(Element {
            name: "p".into(),
            ..Element::default()
        }));
        doc.append(p, NodeData::Text("a".into()));
        doc.append(p, NodeData::Comment(" c ".into()));
        doc.append(p, NodeData::Text("b".into()));
        preprocess(&mut state, &mut doc, body).unwrap();

        assert_eq!(doc.children(p).len(), 3);
        assert!(matches!(doc.data(doc.children(p)[1]), NodeData::Comment(_)));
    }

    #[test]
    fn sourceless_normalization_strips_block_adjacent_newlines() {
        let env = Environment::new("Test");
        let mut state = State::new(&env, None);
        let mut doc = Document::new();
        let body = doc.body();
        doc.append(body, NodeData::Text("before\n".into()));
        doc.append(body, NodeData::Element(Element {
            name: "p".into(),
            ..Element::default()
        }));
        doc.append(body, NodeData::Text("\nafter".into()));
        preprocess(&mut state, &mut doc, body).unwrap();

        assert!(matches!(doc.data(doc.children(body)[0]), NodeData::Text(t) if t == "before"));
        assert!(matches!(doc.data(doc.children(body)[2]), NodeData::Text(t) if t == "after"));
    }

    #[test]
    fn template_attribute_sources_are_collected() {
        let env = Environment::new("Test");
        let mut state = State::new(&env, None);
        let mut doc = Document::new();
        let body = doc.body();
        doc.append(body, NodeData::Element(Element {
            name: "meta".into(),
            attrs: vec![
                Attribute { key: "property".into(), value: "mw:objectAttrVal#href".into() },
                Attribute { key: "about".into(), value: "#mwt1".into() },
            ],
            dp: DataParsoid {
                src: Some("{{target}}".into()),
                ..DataParsoid::default()
            },
        }));
        preprocess(&mut state, &mut doc, body).unwrap();

        assert_eq!(
            state.tpl_attrs["#mwt1"].vs.get("href").map(String::as_str),
            Some("{{target}}")
        );
    }
}
