//! Per-element handlers producing Wikitext fragments.
//!
//! Handlers are immutable records; anything position-dependent comes back
//! from the `handle` function as a fresh [`Handled`] value instead of being
//! rebound on the handler, so the registry can live in statics.

use super::{
    config::VOID_TAGS,
    state::{EscapeContext, ListFrame, State, TableSnapshot},
    token::{Tag, Token},
};
use crate::dom::Document;

/// A handler callback for one edge (start or end) of an element.
pub(crate) type HandleFn = fn(&mut State<'_>, &Tag, &Document) -> Handled;

/// The result of one handler invocation.
#[derive(Debug, Default)]
pub(crate) struct Handled {
    /// The Wikitext fragment to emit.
    pub text: String,
    /// Overrides the handler's static `starts_line` for this invocation.
    pub starts_line: Option<bool>,
    /// Overrides the handler's static `ends_line` for this invocation.
    pub ends_line: Option<bool>,
}

impl Handled {
    /// A plain text result with no flag overrides.
    fn text(text: impl Into<String>) -> Self {
        Handled {
            text: text.into(),
            ..Handled::default()
        }
    }
}

/// Static behavior of one edge of an element.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EdgeHandler {
    /// Produces the Wikitext fragment; `None` emits nothing.
    pub handle: Option<HandleFn>,
    /// The fragment must start at column 0 of a line.
    pub starts_line: bool,
    /// A newline must follow the fragment (buffered, may be displaced by a
    /// source splice).
    pub ends_line: bool,
    /// A newline is emitted directly after the fragment.
    pub emits_nl: bool,
    /// Adjustment to the single-line counter after this edge.
    pub single_line: i8,
    /// The token produces no output at all.
    pub ignore: bool,
    /// The fragment does not disturb start-of-line bookkeeping.
    pub sol_transparent: bool,
}

/// The all-defaults edge, for struct-update in the registry statics.
const NONE_EDGE: EdgeHandler = EdgeHandler {
    handle: None,
    starts_line: false,
    ends_line: false,
    emits_nl: false,
    single_line: 0,
    ignore: false,
    sol_transparent: false,
};

/// A per-element handler record.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TagHandler {
    /// Behavior of the opening edge (also used for self-closing tokens).
    pub start: Option<EdgeHandler>,
    /// Behavior of the closing edge.
    pub end: Option<EdgeHandler>,
    /// Escape context pushed while the element's content serializes.
    pub escape: Option<EscapeContext>,
}

/// Looks up the handler for a native-syntax element.
pub(crate) fn handler_for(name: &str) -> Option<&'static TagHandler> {
    Some(match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => &HEADING,
        "ul" => &UL,
        "ol" => &OL,
        "dl" => &DL,
        "li" => &LI,
        "dt" => &DT,
        "dd" => &DD,
        "table" => &TABLE,
        "tbody" => &TBODY,
        "tr" => &TR,
        "td" => &TD,
        "th" => &TH,
        "caption" => &CAPTION,
        "p" => &P,
        "pre" => &PRE,
        "b" => &B,
        "i" => &I,
        "hr" => &HR,
        "br" => &BR,
        "meta" => &META,
        "body" => &BODY,
        _ => return None,
    })
}

static HEADING: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(heading_start),
        starts_line: true,
        single_line: 1,
        ..NONE_EDGE
    }),
    end: Some(EdgeHandler {
        handle: Some(heading_end),
        ends_line: true,
        single_line: -1,
        ..NONE_EDGE
    }),
    escape: Some(EscapeContext::Heading),
};

static UL: TagHandler = list_handler(ul_start);
static OL: TagHandler = list_handler(ol_start);
static DL: TagHandler = list_handler(dl_start);

static LI: TagHandler = list_item_handler(li_start);
static DT: TagHandler = list_item_handler(dt_start);
static DD: TagHandler = list_item_handler(dd_start);

/// Builds the shared list-element handler shape.
const fn list_handler(start: HandleFn) -> TagHandler {
    TagHandler {
        start: Some(EdgeHandler {
            handle: Some(start),
            starts_line: true,
            ..NONE_EDGE
        }),
        end: Some(EdgeHandler {
            handle: Some(list_end),
            ends_line: true,
            ..NONE_EDGE
        }),
        escape: None,
    }
}

/// Builds the shared list-item handler shape.
const fn list_item_handler(start: HandleFn) -> TagHandler {
    TagHandler {
        start: Some(EdgeHandler {
            handle: Some(start),
            single_line: 1,
            ..NONE_EDGE
        }),
        end: Some(EdgeHandler {
            single_line: -1,
            ..NONE_EDGE
        }),
        escape: Some(EscapeContext::ListItem),
    }
}

static TABLE: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(table_start),
        starts_line: true,
        ..NONE_EDGE
    }),
    end: Some(EdgeHandler {
        handle: Some(table_end),
        starts_line: true,
        ends_line: true,
        ..NONE_EDGE
    }),
    escape: None,
};

static TBODY: TagHandler = TagHandler {
    // Purely structural; rows attach straight to the table markup.
    start: Some(EdgeHandler {
        ignore: true,
        ..NONE_EDGE
    }),
    end: Some(EdgeHandler {
        ignore: true,
        ..NONE_EDGE
    }),
    escape: None,
};

static TR: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(tr_start),
        starts_line: true,
        ..NONE_EDGE
    }),
    // The next row, cell, or table end breaks the line itself.
    end: Some(EdgeHandler { ..NONE_EDGE }),
    escape: None,
};

static TD: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(td_start),
        starts_line: true,
        single_line: 1,
        ..NONE_EDGE
    }),
    end: Some(EdgeHandler {
        single_line: -1,
        ..NONE_EDGE
    }),
    escape: Some(EscapeContext::TableCell),
};

static TH: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(th_start),
        starts_line: true,
        single_line: 1,
        ..NONE_EDGE
    }),
    end: Some(EdgeHandler {
        single_line: -1,
        ..NONE_EDGE
    }),
    escape: Some(EscapeContext::TableHeader),
};

static CAPTION: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(caption_start),
        starts_line: true,
        single_line: 1,
        ..NONE_EDGE
    }),
    end: Some(EdgeHandler {
        single_line: -1,
        ..NONE_EDGE
    }),
    escape: None,
};

static P: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(p_start),
        starts_line: true,
        ..NONE_EDGE
    }),
    end: Some(EdgeHandler {
        ends_line: true,
        ..NONE_EDGE
    }),
    escape: None,
};

static PRE: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(pre_start),
        starts_line: true,
        ..NONE_EDGE
    }),
    end: Some(EdgeHandler {
        handle: Some(pre_end),
        ends_line: true,
        ..NONE_EDGE
    }),
    escape: None,
};

static B: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(bold_start),
        ..NONE_EDGE
    }),
    end: Some(EdgeHandler {
        handle: Some(bold_end),
        ..NONE_EDGE
    }),
    escape: Some(EscapeContext::Quote),
};

static I: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(italic_start),
        ..NONE_EDGE
    }),
    end: Some(EdgeHandler {
        handle: Some(italic_end),
        ..NONE_EDGE
    }),
    escape: Some(EscapeContext::Quote),
};

static HR: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(hr_start),
        starts_line: true,
        ..NONE_EDGE
    }),
    end: None,
    escape: None,
};

static BR: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(br_start),
        ..NONE_EDGE
    }),
    end: None,
    escape: None,
};

static META: TagHandler = TagHandler {
    start: Some(EdgeHandler {
        handle: Some(meta_start),
        sol_transparent: true,
        ..NONE_EDGE
    }),
    end: None,
    escape: None,
};

static BODY: TagHandler = TagHandler {
    // The body contributes children only.
    start: Some(EdgeHandler { ..NONE_EDGE }),
    end: Some(EdgeHandler { ..NONE_EDGE }),
    escape: None,
};

/// The heading delimiter for an `hN` tag.
fn heading_delimiter(tag: &Tag) -> String {
    let level = tag
        .name
        .as_bytes()
        .get(1)
        .map_or(2, |b| usize::from(b.saturating_sub(b'0')))
        .clamp(1, 6);
    "=".repeat(level)
}

fn heading_start(_state: &mut State<'_>, tag: &Tag, _doc: &Document) -> Handled {
    Handled::text(heading_delimiter(tag))
}

fn heading_end(state: &mut State<'_>, tag: &Tag, _doc: &Document) -> Handled {
    let delimiter = heading_delimiter(tag);
    // An empty heading needs a fence between the delimiters or the re-parse
    // would see one run of `=`.
    if state.prev_token.is_start_of(&tag.name) {
        Handled::text(format!("<nowiki/>{delimiter}"))
    } else {
        Handled::text(delimiter)
    }
}

fn ul_start(state: &mut State<'_>, tag: &Tag, doc: &Document) -> Handled {
    list_start(state, tag, doc, "*")
}

fn ol_start(state: &mut State<'_>, tag: &Tag, doc: &Document) -> Handled {
    list_start(state, tag, doc, "#")
}

fn dl_start(state: &mut State<'_>, tag: &Tag, doc: &Document) -> Handled {
    list_start(state, tag, doc, "")
}

/// Opens a list: pushes a frame carrying the cumulative bullet prefix and
/// emits the bullets for the first item.
///
/// A list that starts as the first content of its parent list item
/// continues that item's line (`:*` style); otherwise it breaks the line
/// and emits the full prefix.
fn list_start(state: &mut State<'_>, _tag: &Tag, _doc: &Document, bullet: &str) -> Handled {
    let parent = state.list_stack.last();
    let bullets = match parent {
        Some(frame) => format!("{}{}{}", frame.bullets, frame.item_bullet, bullet),
        None => bullet.to_string(),
    };
    let continues_item_line = parent.is_some()
        && matches!(
            &state.prev_token,
            Token::StartTag(tag) if matches!(tag.name.as_str(), "li" | "dt" | "dd")
        );

    // Nested lists are allowed to break lines even while an item's text is
    // held to a single line; the matching restore happens on list end.
    let suspended_single_line = state.single_line_mode > 0;
    if suspended_single_line {
        state.single_line_mode -= 1;
    }

    state.list_stack.push(ListFrame {
        bullets: bullets.clone(),
        item_bullet: String::new(),
        item_count: 0,
        suspended_single_line,
    });

    if state.env.trace.contains(super::TraceFlags::LIST) {
        log::trace!("list open, prefix {bullets:?}");
    }

    if continues_item_line {
        Handled {
            text: bullet.to_string(),
            starts_line: Some(false),
            ends_line: None,
        }
    } else {
        Handled {
            text: bullets,
            starts_line: Some(true),
            ends_line: None,
        }
    }
}

fn list_end(state: &mut State<'_>, _tag: &Tag, _doc: &Document) -> Handled {
    if let Some(frame) = state.list_stack.pop() {
        if frame.suspended_single_line {
            state.single_line_mode += 1;
        }
    } else {
        log::warn!("list end without a matching list frame");
    }
    Handled::default()
}

fn li_start(state: &mut State<'_>, tag: &Tag, doc: &Document) -> Handled {
    list_item_start(state, tag, doc, "")
}

fn dt_start(state: &mut State<'_>, tag: &Tag, doc: &Document) -> Handled {
    list_item_start(state, tag, doc, ";")
}

fn dd_start(state: &mut State<'_>, tag: &Tag, doc: &Document) -> Handled {
    list_item_start(state, tag, doc, ":")
}

/// Opens a list item.
///
/// The first item of a list rides on the bullets the list start emitted;
/// later items re-emit the full cumulative prefix whenever they begin a
/// fresh line, and only their own bullet when they continue one (the
/// `;term:detail` form).
fn list_item_start(state: &mut State<'_>, tag: &Tag, _doc: &Document, bullet: &str) -> Handled {
    let multi_line_detail = bullet == ":"
        && !tag.dp.row_syntax()
        && matches!(&state.prev_tag_token, Token::EndTag(prev) if prev.name == "dt");
    let same_close = state.prev_token.is_end_of(&tag.name);
    let start_of_line = state.on_start_of_line;

    let Some(frame) = state.list_stack.last_mut() else {
        log::warn!("list item outside a list");
        return Handled::text(bullet);
    };
    frame.item_count += 1;
    frame.item_bullet = bullet.to_string();

    if frame.item_count > 1 && (start_of_line || same_close || multi_line_detail) {
        Handled {
            text: format!("{}{bullet}", frame.bullets),
            starts_line: Some(true),
            ends_line: None,
        }
    } else {
        Handled {
            text: bullet.to_string(),
            starts_line: Some(false),
            ends_line: None,
        }
    }
}

fn table_start(state: &mut State<'_>, tag: &Tag, _doc: &Document) -> Handled {
    // Lists do not cross table boundaries; the surrounding list state is
    // parked until the table closes.
    state.table_stack.push(TableSnapshot {
        list_stack: std::mem::take(&mut state.list_stack),
        single_line_mode: state.single_line_mode,
    });
    state.single_line_mode = 0;

    let mut text = match &tag.dp.start_tag_src {
        Some(src) => src.clone(),
        None => "{|".to_string(),
    };
    let attrs = wt_attributes(tag);
    if !attrs.is_empty() {
        text.push(' ');
        text += &attrs;
    }
    Handled::text(text)
}

fn table_end(state: &mut State<'_>, tag: &Tag, _doc: &Document) -> Handled {
    if let Some(snapshot) = state.table_stack.pop() {
        state.list_stack = snapshot.list_stack;
        state.single_line_mode = snapshot.single_line_mode;
    } else {
        log::warn!("table end without a matching snapshot");
    }
    Handled::text(tag.dp.end_tag_src.clone().unwrap_or_else(|| "|}".to_string()))
}

fn tr_start(state: &mut State<'_>, tag: &Tag, _doc: &Document) -> Handled {
    // The first row of a table is implicit in the `{|` line.
    if tag.dp.start_tag_src.is_none()
        && matches!(
            &state.prev_token,
            Token::StartTag(prev) if matches!(prev.name.as_str(), "tbody" | "table")
        )
    {
        return Handled {
            text: String::new(),
            starts_line: Some(false),
            ends_line: None,
        };
    }

    let mut text = tag
        .dp
        .start_tag_src
        .clone()
        .unwrap_or_else(|| "|-".to_string());
    let attrs = wt_attributes(tag);
    if !attrs.is_empty() {
        text.push(' ');
        text += &attrs;
    }
    Handled::text(text)
}

fn td_start(state: &mut State<'_>, tag: &Tag, doc: &Document) -> Handled {
    cell_start(state, tag, doc, "|", "||")
}

fn th_start(state: &mut State<'_>, tag: &Tag, doc: &Document) -> Handled {
    cell_start(state, tag, doc, "!", "!!")
}

/// Opens a table cell with either the line form or the inline row form of
/// its delimiter, followed by any attributes and their separator.
fn cell_start(
    state: &mut State<'_>,
    tag: &Tag,
    _doc: &Document,
    line_form: &str,
    row_form: &str,
) -> Handled {
    let row = tag.dp.row_syntax();
    let mut text = match &tag.dp.start_tag_src {
        Some(src) => src.clone(),
        None if row => row_form.to_string(),
        None => line_form.to_string(),
    };

    let attrs = wt_attributes(tag);
    if !attrs.is_empty() {
        text += &attrs;
        text += tag.dp.attr_sep_src.as_deref().unwrap_or("|");
    }

    if state.env.trace.contains(super::TraceFlags::TABLE) {
        log::trace!("cell open {text:?}");
    }

    Handled {
        text,
        starts_line: Some(!row),
        ends_line: None,
    }
}

fn caption_start(_state: &mut State<'_>, tag: &Tag, _doc: &Document) -> Handled {
    let mut text = tag
        .dp
        .start_tag_src
        .clone()
        .unwrap_or_else(|| "|+".to_string());
    let attrs = wt_attributes(tag);
    if !attrs.is_empty() {
        text += &attrs;
        text += tag.dp.attr_sep_src.as_deref().unwrap_or("|");
    }
    Handled::text(text)
}

fn p_start(state: &mut State<'_>, _tag: &Tag, _doc: &Document) -> Handled {
    // With source available the separator engine reconstructs paragraph
    // spacing; without it, a second newline re-opens the blank line between
    // adjacent paragraphs.
    if state.has_src() {
        return Handled::default();
    }
    let after_sibling_break = state.prev_tag_token.is_end_of("p")
        || matches!(
            &state.prev_tag_token,
            Token::SelfClosing(prev) if prev.name == "br"
        );
    if after_sibling_break {
        Handled::text("\n")
    } else {
        Handled::default()
    }
}

fn pre_start(state: &mut State<'_>, _tag: &Tag, _doc: &Document) -> Handled {
    state.in_indent_pre = true;
    Handled::default()
}

fn pre_end(state: &mut State<'_>, _tag: &Tag, _doc: &Document) -> Handled {
    state.in_indent_pre = false;
    Handled::default()
}

/// Emits a quote delimiter, guarding against merging into apostrophes
/// already at the end of the output.
fn quote_delimiter(state: &State<'_>, delimiter: &str) -> Handled {
    if state.last_res.ends_with("'''''") {
        Handled::text(format!("<nowiki/>{delimiter}"))
    } else {
        Handled::text(delimiter)
    }
}

fn bold_start(state: &mut State<'_>, _tag: &Tag, _doc: &Document) -> Handled {
    quote_delimiter(state, "'''")
}

fn bold_end(_state: &mut State<'_>, _tag: &Tag, _doc: &Document) -> Handled {
    Handled::text("'''")
}

fn italic_start(state: &mut State<'_>, _tag: &Tag, _doc: &Document) -> Handled {
    quote_delimiter(state, "''")
}

fn italic_end(_state: &mut State<'_>, _tag: &Tag, _doc: &Document) -> Handled {
    Handled::text("''")
}

fn hr_start(_state: &mut State<'_>, tag: &Tag, _doc: &Document) -> Handled {
    Handled {
        text: format!("----{}", "-".repeat(tag.dp.extra_dashes)),
        starts_line: None,
        ends_line: Some(!tag.dp.line_content),
    }
}

fn br_start(_state: &mut State<'_>, _tag: &Tag, _doc: &Document) -> Handled {
    Handled::text("\n")
}

/// Demultiplexes `<meta>` markers on `typeof`/`property`.
fn meta_start(state: &mut State<'_>, tag: &Tag, _doc: &Document) -> Handled {
    let type_of = tag.attr("typeof").unwrap_or_default();
    let property = tag.attr("property").unwrap_or_default();

    match type_of {
        // Synthesized by the walker for skipped template content.
        "mw:TemplateSource" => {
            return Handled::text(tag.dp.src.clone().unwrap_or_default());
        }
        "mw:tag" => {
            return match tag.attr("content") {
                Some("nowiki") => {
                    state.in_no_wiki = true;
                    Handled::text("<nowiki>")
                }
                Some("/nowiki") => {
                    state.in_no_wiki = false;
                    Handled::text("</nowiki>")
                }
                other => {
                    log::warn!("unrecognized mw:tag content {other:?}");
                    Handled::default()
                }
            };
        }
        "mw:IncludeOnly" | "mw:IncludeOnly/End" | "mw:NoInclude" | "mw:NoInclude/End"
        | "mw:OnlyInclude" | "mw:OnlyInclude/End" => {
            let text = tag.dp.src.clone().unwrap_or_else(|| {
                let (name, end) = match type_of.strip_suffix("/End") {
                    Some(name) => (name, "/"),
                    None => (type_of, ""),
                };
                let name = name.trim_start_matches("mw:").to_ascii_lowercase();
                format!("<{end}{name}>")
            });
            return Handled::text(text);
        }
        // Handled out of band by the separator engine and diff subsystem.
        "mw:DiffMarker" | "mw:Separator" => return Handled::default(),
        _ => {}
    }

    if let Some(name) = property.strip_prefix("mw:PageProp/") {
        let text = tag.dp.magic_src.clone().unwrap_or_else(|| {
            super::config::PAGE_PROP_MAGIC_WORDS
                .get(name.to_ascii_lowercase().as_str())
                .map_or_else(
                    || format!("__{}__", name.to_ascii_uppercase()),
                    |magic| (*magic).to_string(),
                )
        });
        return Handled::text(text);
    }

    // Unknown meta markers fall back to literal HTML.
    Handled::text(serialize_html_tag(tag, true))
}

/// Serializes element attributes as Wikitext `k="v"` pairs, skipping the
/// serializer's own bookkeeping attributes.
pub(crate) fn wt_attributes(tag: &Tag) -> String {
    let mut out = String::new();
    for attr in &tag.attrs {
        if is_internal_attribute(&attr.key) {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        if attr.value.is_empty() {
            out += &attr.key;
        } else {
            out += &attr.key;
            out += "=\"";
            out += &html_escape::encode_double_quoted_attribute(&attr.value);
            out.push('"');
        }
    }
    out
}

/// Round-trip bookkeeping attributes that never serialize.
fn is_internal_attribute(key: &str) -> bool {
    key == "typeof" || key == "about" || key.starts_with("data-parsoid") || key.starts_with("data-mw")
}

/// Serializes a literal HTML start tag.
///
/// An auto-inserted start tag was never in the source, and that check comes
/// first: a self-closing auto-inserted tag also produces nothing.
pub(crate) fn serialize_html_start(tag: &Tag) -> String {
    if tag.dp.auto_inserted_start {
        return String::new();
    }
    serialize_html_tag(tag, tag.dp.self_close || VOID_TAGS.contains(tag.name.as_str()))
}

/// Serializes a literal HTML end tag.
pub(crate) fn serialize_html_end(tag: &Tag) -> String {
    if tag.dp.auto_inserted_end
        || tag.dp.self_close
        || tag.dp.no_close
        || VOID_TAGS.contains(tag.name.as_str())
    {
        return String::new();
    }
    format!("</{}>", tag.name)
}

/// Assembles `<name attr="value"…>` markup.
fn serialize_html_tag(tag: &Tag, self_closing: bool) -> String {
    let mut out = String::new();
    out.push('<');
    out += &tag.name;
    for attr in &tag.attrs {
        if is_internal_attribute(&attr.key) {
            continue;
        }
        out.push(' ');
        out += &attr.key;
        if !attr.value.is_empty() {
            out += "=\"";
            out += &html_escape::encode_double_quoted_attribute(&attr.value);
            out.push('"');
        }
    }
    if self_closing {
        out += "/>";
    } else {
        out.push('>');
    }
    out
}
