//! Typed round-trip metadata decoded from `data-parsoid` attributes.

use indexmap::IndexMap;
use serde::Deserialize;

/// A document source range.
///
/// Maps an element onto a half-open byte range of the original Wikitext:
/// `[start, end, open_width, close_width]`, where the widths cover the
/// element's opening and closing markup. Individual entries may be absent
/// when the parser could not compute them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct Dsr(
    /// Offset of the first byte of the element.
    pub Option<usize>,
    /// Offset one past the last byte of the element.
    pub Option<usize>,
    /// Width of the opening markup.
    pub Option<usize>,
    /// Width of the closing markup.
    pub Option<usize>,
);

impl Dsr {
    /// Offset of the first byte of the element in the original source.
    #[inline]
    pub fn start(self) -> Option<usize> {
        self.0
    }

    /// Offset one past the last byte of the element.
    #[inline]
    pub fn end(self) -> Option<usize> {
        self.1
    }

    /// Offset of the first byte of the element content.
    pub fn inner_start(self) -> Option<usize> {
        match (self.0, self.2) {
            (Some(start), Some(open)) => Some(start + open),
            _ => None,
        }
    }

    /// Offset one past the last byte of the element content.
    pub fn inner_end(self) -> Option<usize> {
        match (self.1, self.3) {
            (Some(end), Some(close)) => end.checked_sub(close),
            _ => None,
        }
    }
}

/// A single member of an image option list.
///
/// ```wikitext
/// [[File:X.jpg|thumb|left|120x80px|Caption text]]
///              ^^^^^ ^^^^ ^^^^^^^^ ^^^^^^^^^^^^
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ImageOption {
    /// The canonical option key (`format`, `halign`, `width`, `caption`, …).
    pub k: String,
    /// The option value as written. `None` marks the caption slot whose text
    /// lives in the `<figcaption>` element instead.
    #[serde(default)]
    pub v: Option<String>,
}

/// Round-trip metadata attached to a single element.
///
/// The upstream parser records everything needed to reproduce the original
/// markup byte for byte: source spans, syntax variants, separator text, and
/// auto-correction markers. Every field is optional; an absent field means
/// the parser had nothing special to say.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DataParsoid {
    /// Verbatim source span for the whole construct.
    pub src: Option<String>,
    /// The document source range of the element.
    pub dsr: Option<Dsr>,
    /// Syntax variant. `"html"` marks literal HTML markup in the source.
    pub stx: Option<String>,
    /// Syntax sub-variant. `"row"` marks inline (same-line) table cells.
    pub stx_v: Option<String>,
    /// Verbatim opening markup (`{|`, `|-`, and friends, with decorations).
    #[serde(rename = "startTagSrc")]
    pub start_tag_src: Option<String>,
    /// Verbatim closing markup.
    #[serde(rename = "endTagSrc")]
    pub end_tag_src: Option<String>,
    /// Verbatim separator between table cell attributes and content.
    #[serde(rename = "attrSepSrc")]
    pub attr_sep_src: Option<String>,
    /// Link trail text absorbed into the link content.
    ///
    /// ```wikitext
    /// [[Foo]]s
    ///        ^
    /// ```
    pub tail: Option<String>,
    /// Link prefix text absorbed into the link content.
    pub prefix: Option<String>,
    /// The link was written with the pipe trick (`[[Foo (bar)|]]`).
    pub pipetrick: bool,
    /// The opening tag was inserted by tree building, not written in source.
    #[serde(rename = "autoInsertedStart")]
    pub auto_inserted_start: bool,
    /// The closing tag was inserted by tree building, not written in source.
    #[serde(rename = "autoInsertedEnd")]
    pub auto_inserted_end: bool,
    /// The tag was written self-closing (`<br/>`).
    #[serde(rename = "selfClose")]
    pub self_close: bool,
    /// The tag was written without any closing markup.
    #[serde(rename = "noClose")]
    pub no_close: bool,
    /// A leading newline was stripped from an HTML `<pre>` body.
    #[serde(rename = "strippedNL")]
    pub stripped_nl: bool,
    /// Dashes beyond the minimum four of a horizontal rule.
    pub extra_dashes: usize,
    /// Content followed the horizontal rule on the same source line.
    #[serde(rename = "lineContent")]
    pub line_content: bool,
    /// Verbatim magic word spelling for a page property.
    #[serde(rename = "magicSrc")]
    pub magic_src: Option<String>,
    /// Ordered image options as written in the file link.
    #[serde(rename = "optList")]
    pub opt_list: Vec<ImageOption>,
    /// Localized spellings for image options, keyed by canonical name.
    #[serde(rename = "optNames")]
    pub opt_names: IndexMap<String, String>,
    /// Verbatim source of generated content (entities, inclusion bodies).
    #[serde(rename = "srcContent")]
    pub src_content: Option<String>,
    /// Original tag name for constructs serialized under another name.
    #[serde(rename = "srcTagName")]
    pub src_tag_name: Option<String>,
}

impl DataParsoid {
    /// Decodes a `data-parsoid` attribute value.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether the element was written as literal HTML markup.
    #[inline]
    pub fn html_syntax(&self) -> bool {
        self.stx.as_deref() == Some("html")
    }

    /// Whether the element was written with piped link syntax.
    #[inline]
    pub fn piped_syntax(&self) -> bool {
        self.stx.as_deref() == Some("piped")
    }

    /// Whether a table cell was written inline on the row line (`||`/`!!`).
    #[inline]
    pub fn row_syntax(&self) -> bool {
        self.stx_v.as_deref() == Some("row")
    }
}
