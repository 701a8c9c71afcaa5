//! Reconstruction of file links from figure elements.

use super::{
    ChunkSink, Result,
    config::{PREFIX_IMG_OPTIONS, SIMPLE_IMG_OPTIONS},
    serialize_children_to_string,
    state::{EscapeContext, State},
};
use crate::dom::{Document, ImageOption, NodeId};

/// Serializes a `<figure>` into a `[[File:…|opt|…|caption]]` link.
///
/// The figure's first element descendant must be the `<img>`; a trailing
/// `<figcaption>` holds caption content referenced by a null caption
/// option. A figure without an image is malformed: it logs, emits nothing,
/// and lets the document continue.
pub(crate) fn serialize_figure(
    state: &mut State<'_>,
    doc: &Document,
    node: NodeId,
    out: &mut dyn ChunkSink,
) -> Result {
    let Some(img) = find_image(doc, node) else {
        log::warn!("figure without an <img> descendant; skipping");
        state.emit(out, "");
        return Ok(());
    };

    let resource = doc
        .attr(img, "resource")
        .or_else(|| doc.attr(img, "src"))
        .unwrap_or_default();
    let resource = resource.strip_prefix("./").unwrap_or(resource).to_string();

    let caption = doc
        .last_child(node)
        .filter(|child| doc.is_element_named(*child, "figcaption"));

    let dp = doc.dp(node).clone();
    let mut text = String::from("[[");
    text += &resource;

    // Width and height arrive as separate options but serialize as one
    // `WxH` piece, so size is flushed one iteration after the last size
    // key, once both dimensions have been seen.
    let mut pending_size: Option<(Option<String>, Option<String>)> = None;
    for opt in &dp.opt_list {
        let is_size = matches!(opt.k.as_str(), "width" | "height");
        if !is_size && let Some(size) = pending_size.take() {
            push_option(&mut text, &format_size(size));
        }

        match opt.k.as_str() {
            "width" => {
                pending_size.get_or_insert((None, None)).0 = opt.v.clone();
            }
            "height" => {
                pending_size.get_or_insert((None, None)).1 = opt.v.clone();
            }
            "caption" => {
                let value = match &opt.v {
                    Some(value) => value.clone(),
                    None => match caption {
                        Some(caption) => {
                            // Caption content follows the `|` of the file
                            // link, never column 0.
                            state.on_start_of_line = false;
                            serialize_children_to_string(
                                state,
                                doc,
                                caption,
                                Some(EscapeContext::Anchor),
                            )?
                        }
                        None => {
                            log::warn!("figure caption option without a <figcaption>");
                            String::new()
                        }
                    },
                };
                push_option(&mut text, &value);
            }
            key => {
                if let Some(piece) = known_option(&dp, key, opt) {
                    push_option(&mut text, &piece);
                } else {
                    log::warn!("unrecognized image option {key:?}; dropped");
                }
            }
        }
    }
    if let Some(size) = pending_size.take() {
        push_option(&mut text, &format_size(size));
    }

    text += "]]";
    state.emit(out, &text);
    Ok(())
}

/// Appends one `|option` piece.
fn push_option(text: &mut String, piece: &str) {
    text.push('|');
    text.push_str(piece);
}

/// Resolves a non-size, non-caption option against the simple and prefix
/// option tables.
fn known_option(
    dp: &crate::dom::DataParsoid,
    key: &str,
    opt: &ImageOption,
) -> Option<String> {
    if let Some(value) = &opt.v
        && SIMPLE_IMG_OPTIONS
            .get(format!("img_{value}").as_str())
            .copied()
            == Some(key)
    {
        // A simple option round-trips as the value that was written.
        return Some(value.clone());
    }

    let pattern = dp
        .opt_names
        .get(key)
        .map(String::as_str)
        .or_else(|| PREFIX_IMG_OPTIONS.get(key).copied())?;
    Some(pattern.replace("$1", opt.v.as_deref().unwrap_or_default()))
}

/// Formats a deferred size option.
fn format_size((width, height): (Option<String>, Option<String>)) -> String {
    match (width, height) {
        (Some(width), Some(height)) => format!("{width}x{height}px"),
        (Some(width), None) => format!("{width}px"),
        (None, Some(height)) => format!("x{height}px"),
        (None, None) => String::new(),
    }
}

/// Finds the `<img>` inside a figure, looking through a wrapping anchor.
fn find_image(doc: &Document, figure: NodeId) -> Option<NodeId> {
    for child in doc.children(figure) {
        if doc.is_element_named(*child, "img") {
            return Some(*child);
        }
        if doc.is_element_named(*child, "a") || doc.is_element_named(*child, "span") {
            for inner in doc.children(*child) {
                if doc.is_element_named(*inner, "img") {
                    return Some(*inner);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_formats_one_or_both_dimensions() {
        assert_eq!(format_size((Some("120".into()), None)), "120px");
        assert_eq!(
            format_size((Some("120".into()), Some("80".into()))),
            "120x80px"
        );
        assert_eq!(format_size((None, Some("80".into()))), "x80px");
    }

    #[test]
    fn simple_options_round_trip_their_written_value() {
        let dp = crate::dom::DataParsoid::default();
        let opt = ImageOption {
            k: "format".into(),
            v: Some("thumb".into()),
        };
        assert_eq!(known_option(&dp, "format", &opt).as_deref(), Some("thumb"));
    }

    #[test]
    fn prefix_options_interpolate_their_value() {
        let dp = crate::dom::DataParsoid::default();
        let opt = ImageOption {
            k: "link".into(),
            v: Some("Main Page".into()),
        };
        assert_eq!(
            known_option(&dp, "link", &opt).as_deref(),
            Some("link=Main Page")
        );
    }
}
