//! Round-trip scenarios over builder-constructed documents.
//!
//! The inverse parser lives upstream, so equivalence is asserted on the
//! Wikitext side: each document is annotated the way the parser would
//! annotate it, and the serialized output must match the Wikitext that
//! would have produced it.

use super::*;
use crate::dom::{DocBuilder, Dsr, ImageOption};

#[track_caller]
fn assert_serializes(doc: Document, expected: &str) {
    let env = Environment::new("Test page");
    assert_serializes_with(doc, &env, expected);
}

#[track_caller]
fn assert_serializes_with(mut doc: Document, env: &Environment, expected: &str) {
    let _ = env_logger::try_init();
    let root = doc.body();
    let actual = serialize_to_string(&mut doc, root, &Options::new(env)).unwrap();
    assert_eq!(actual, expected);
}

/// Shorthand for metadata records built field by field.
fn dp(build: impl FnOnce(&mut DataParsoid)) -> DataParsoid {
    let mut dp = DataParsoid::default();
    build(&mut dp);
    dp
}

#[test]
fn bold_and_italic_round_trip() {
    let doc = DocBuilder::new()
        .open("p")
        .open("b")
        .text("bold")
        .close()
        .text(" and ")
        .open("i")
        .text("italic")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "'''bold''' and ''italic''\n");
}

#[test]
fn nested_lists_recover_cumulative_bullets() {
    let doc = DocBuilder::new()
        .open("ul")
        .open("li")
        .text(" a")
        .open("ul")
        .open("li")
        .text(" b")
        .close()
        .close()
        .close()
        .open("li")
        .text(" c")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "* a\n** b\n* c\n");
}

#[test]
fn definition_list_keeps_the_inline_detail_form() {
    let doc = DocBuilder::new()
        .open("dl")
        .open("dt")
        .text("term")
        .close()
        .open("dd")
        .dp(dp(|d| d.stx_v = Some("row".into())))
        .text("detail")
        .close()
        .close()
        .finish();
    assert_serializes(doc, ";term:detail\n");
}

#[test]
fn definition_list_breaks_the_multi_line_detail_form() {
    let doc = DocBuilder::new()
        .open("dl")
        .open("dt")
        .text("term")
        .close()
        .open("dd")
        .text("detail")
        .close()
        .close()
        .finish();
    assert_serializes(doc, ";term\n:detail\n");
}

#[test]
fn mixed_nesting_continues_the_item_line() {
    // A list that opens as the first content of its parent item extends
    // that item's bullet run instead of breaking the line.
    let doc = DocBuilder::new()
        .open("dl")
        .open("dd")
        .open("ul")
        .open("li")
        .text(" a")
        .close()
        .close()
        .close()
        .close()
        .finish();
    assert_serializes(doc, ":* a\n");
}

#[test]
fn link_trail_recovery() {
    let doc = DocBuilder::new()
        .open("p")
        .open("a")
        .attr("rel", "mw:WikiLink")
        .attr("href", "./Foo")
        .dp(dp(|d| {
            d.stx = Some("piped".into());
            d.tail = Some("s".into());
        }))
        .text("bars")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "[[Foo|bar]]s\n");
}

#[test]
fn simple_links_collapse() {
    let doc = DocBuilder::new()
        .open("p")
        .open("a")
        .attr("rel", "mw:WikiLink")
        .attr("href", "./Foo_bar")
        .text("Foo bar")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "[[Foo bar]]\n");
}

#[test]
fn link_trail_letters_get_a_guard() {
    let doc = DocBuilder::new()
        .open("p")
        .open("a")
        .attr("rel", "mw:WikiLink")
        .attr("href", "./Foo")
        .text("Foo")
        .close()
        .text("bar")
        .close()
        .finish();
    assert_serializes(doc, "[[Foo]]<nowiki/>bar\n");
}

#[test]
fn pipe_trick_preserved() {
    let doc = DocBuilder::new()
        .open("p")
        .open("a")
        .attr("rel", "mw:WikiLink")
        .attr("href", "./Foo_(bar)")
        .dp(dp(|d| d.pipetrick = true))
        .text("Foo")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "[[Foo_(bar)|]]\n");
}

#[test]
fn empty_link_content_gets_a_guard() {
    let doc = DocBuilder::new()
        .open("p")
        .open("a")
        .attr("rel", "mw:WikiLink")
        .attr("href", "./Foo")
        .dp(dp(|d| d.stx = Some("piped".into())))
        .close()
        .close()
        .finish();
    assert_serializes(doc, "[[Foo|<nowiki/>]]\n");
}

#[test]
fn category_sort_key() {
    let doc = DocBuilder::new()
        .open("link")
        .attr("rel", "mw:WikiLink/Category")
        .attr("href", "./Category:X#key")
        .close()
        .finish();
    assert_serializes(doc, "[[Category:X|key]]");
}

#[test]
fn category_without_sort_key() {
    let doc = DocBuilder::new()
        .open("link")
        .attr("rel", "mw:WikiLink/Category")
        .attr("href", "./Category:X")
        .close()
        .finish();
    assert_serializes(doc, "[[Category:X]]");
}

#[test]
fn external_link_forms() {
    let doc = DocBuilder::new()
        .open("p")
        .open("a")
        .attr("rel", "mw:ExtLink")
        .attr("href", "https://example.com/x")
        .text("Example")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "[https://example.com/x Example]\n");

    let doc = DocBuilder::new()
        .open("a")
        .attr("rel", "mw:ExtLink/Numbered")
        .attr("href", "https://example.com/x")
        .close()
        .finish();
    assert_serializes(doc, "[https://example.com/x]");

    let doc = DocBuilder::new()
        .open("a")
        .attr("rel", "mw:ExtLink/URL")
        .attr("href", "https://example.com/x")
        .text("https://example.com/x")
        .close()
        .finish();
    assert_serializes(doc, "https://example.com/x");

    let doc = DocBuilder::new()
        .open("a")
        .attr("rel", "mw:ExtLink/ISBN")
        .attr("href", "./Special:Booksources/1234567890")
        .text("ISBN 1-23-456789-0")
        .close()
        .finish();
    assert_serializes(doc, "ISBN 1-23-456789-0");
}

#[test]
fn native_table_syntax() {
    let doc = DocBuilder::new()
        .open("table")
        .open("tbody")
        .open("tr")
        .open("th")
        .text("a")
        .close()
        .open("th")
        .dp(dp(|d| d.stx_v = Some("row".into())))
        .text("b")
        .close()
        .close()
        .open("tr")
        .open("td")
        .text("c")
        .close()
        .open("td")
        .dp(dp(|d| d.stx_v = Some("row".into())))
        .text("d")
        .close()
        .close()
        .close()
        .close()
        .finish();
    assert_serializes(doc, "{|\n!a!!b\n|-\n|c||d\n|}\n");
}

#[test]
fn table_cell_attributes_keep_their_separator() {
    let doc = DocBuilder::new()
        .open("table")
        .open("tbody")
        .open("tr")
        .open("td")
        .attr("align", "right")
        .text("x")
        .close()
        .close()
        .close()
        .close()
        .finish();
    assert_serializes(doc, "{|\n|align=\"right\"|x\n|}\n");
}

#[test]
fn heading_separators_splice_from_source() {
    let src = "= H =\n\nparagraph\n\n= H2 =";
    let env = Environment::with_src("Test page", src);
    let doc = DocBuilder::new()
        .open("h1")
        .dp(dp(|d| d.dsr = Some(Dsr(Some(0), Some(5), Some(1), Some(1)))))
        .text(" H ")
        .close()
        .text("\n\n")
        .open("p")
        .dp(dp(|d| d.dsr = Some(Dsr(Some(7), Some(16), Some(0), Some(0)))))
        .text("paragraph")
        .close()
        .text("\n\n")
        .open("h2")
        .dp(dp(|d| d.dsr = Some(Dsr(Some(18), Some(24), Some(1), Some(1)))))
        .text(" H2 ")
        .close()
        .finish();
    assert_serializes_with(doc, &env, src);
}

#[test]
fn separator_markers_recover_whitespace_without_ranges() {
    let env = Environment::with_src("Test page", "foo\n\nbar");
    let doc = DocBuilder::new()
        .open("p")
        .text("foo")
        .close()
        .text("\n\n")
        .open("p")
        .text("bar")
        .close()
        .finish();
    assert_serializes_with(doc, &env, "foo\n\nbar");
}

#[test]
fn paragraphs_get_blank_line_without_source() {
    let doc = DocBuilder::new()
        .open("p")
        .text("foo")
        .close()
        .open("p")
        .text("bar")
        .close()
        .finish();
    assert_serializes(doc, "foo\n\nbar\n");
}

#[test]
fn empty_heading_gets_a_fence() {
    let doc = DocBuilder::new().open("h2").close().finish();
    assert_serializes(doc, "==<nowiki/>==\n");
}

#[test]
fn adjacent_quotes_get_a_guard() {
    let doc = DocBuilder::new()
        .open("p")
        .open("i")
        .open("b")
        .text("text")
        .close()
        .close()
        .open("i")
        .text("x")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "'''''text'''''<nowiki/>''x''\n");
}

#[test]
fn indent_pre_prefixes_every_line() {
    let doc = DocBuilder::new()
        .open("pre")
        .text(" a\nb")
        .close()
        .finish();
    assert_serializes(doc, " a\n b\n");
}

#[test]
fn html_pre_restores_its_stripped_newline() {
    let doc = DocBuilder::new()
        .open("pre")
        .dp(dp(|d| d.stx = Some("html".into())))
        .text("\nfoo")
        .close()
        .finish();
    assert_serializes(doc, "<pre>\n\nfoo</pre>");
}

#[test]
fn figure_options_round_trip() {
    let doc = DocBuilder::new()
        .open("figure")
        .dp(dp(|d| {
            d.opt_list = vec![
                ImageOption {
                    k: "format".into(),
                    v: Some("thumb".into()),
                },
                ImageOption {
                    k: "width".into(),
                    v: Some("120".into()),
                },
                ImageOption {
                    k: "caption".into(),
                    v: None,
                },
            ];
        }))
        .open("a")
        .attr("href", "./File:X.jpg")
        .open("img")
        .attr("resource", "./File:X.jpg")
        .close()
        .close()
        .open("figcaption")
        .text("The caption")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "[[File:X.jpg|thumb|120px|The caption]]");
}

#[test]
fn figure_size_pairs_flush_together() {
    let doc = DocBuilder::new()
        .open("figure")
        .dp(dp(|d| {
            d.opt_list = vec![
                ImageOption {
                    k: "width".into(),
                    v: Some("120".into()),
                },
                ImageOption {
                    k: "height".into(),
                    v: Some("80".into()),
                },
                ImageOption {
                    k: "format".into(),
                    v: Some("thumb".into()),
                },
            ];
        }))
        .open("img")
        .attr("resource", "./File:X.jpg")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "[[File:X.jpg|120x80px|thumb]]");
}

#[test]
fn template_output_collapses_to_its_source() {
    let doc = DocBuilder::new()
        .open("p")
        .attr("typeof", "mw:Object/Template")
        .attr("about", "#mwt1")
        .dp(dp(|d| d.src = Some("{{echo|hi}}".into())))
        .text("hi")
        .close()
        .open("span")
        .attr("about", "#mwt1")
        .text("more expanded output")
        .close()
        .finish();
    assert_serializes(doc, "{{echo|hi}}");
}

#[test]
fn nowiki_fence_markers_round_trip() {
    let doc = DocBuilder::new()
        .open("p")
        .open("meta")
        .attr("typeof", "mw:tag")
        .attr("content", "nowiki")
        .close()
        .text("''x''")
        .open("meta")
        .attr("typeof", "mw:tag")
        .attr("content", "/nowiki")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "<nowiki>''x''</nowiki>\n");
}

#[test]
fn page_property_magic_word() {
    let doc = DocBuilder::new()
        .open("meta")
        .attr("property", "mw:PageProp/notoc")
        .close()
        .finish();
    assert_serializes(doc, "__NOTOC__");
}

#[test]
fn entity_spans_keep_their_source_spelling() {
    let doc = DocBuilder::new()
        .open("p")
        .text("a")
        .open("span")
        .attr("typeof", "mw:Entity")
        .dp(dp(|d| d.src = Some("&nbsp;".into())))
        .text("\u{a0}")
        .close()
        .text("b")
        .close()
        .finish();
    assert_serializes(doc, "a&nbsp;b\n");
}

#[test]
fn unknown_elements_serialize_as_html() {
    let doc = DocBuilder::new()
        .open("p")
        .open("abbr")
        .attr("title", "X")
        .text("HTML")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "<abbr title=\"X\">HTML</abbr>\n");
}

#[test]
fn html_syntax_lists_serialize_as_html() {
    let doc = DocBuilder::new()
        .open("ul")
        .dp(dp(|d| d.stx = Some("html".into())))
        .open("li")
        .text("x")
        .close()
        .close()
        .finish();
    assert_serializes(doc, "<ul><li>x</li></ul>");
}

#[test]
fn paragraphs_inside_list_items_are_suppressed() {
    let doc = DocBuilder::new()
        .open("ul")
        .open("li")
        .open("p")
        .text("text")
        .close()
        .close()
        .close()
        .finish();
    assert_serializes(doc, "*text\n");
}

#[test]
fn list_lookalike_text_is_fenced() {
    let doc = DocBuilder::new()
        .open("p")
        .text("* not a list")
        .close()
        .finish();
    assert_serializes(doc, "<nowiki>* not a list</nowiki>\n");
}

#[test]
fn heading_lookalike_text_is_fenced() {
    let doc = DocBuilder::new()
        .open("p")
        .text("== x ==")
        .close()
        .finish();
    assert_serializes(doc, "<nowiki>== x ==</nowiki>\n");
}

#[test]
fn template_lookalike_text_is_fenced() {
    let doc = DocBuilder::new()
        .open("p")
        .text("a {{b}} c")
        .close()
        .finish();
    assert_serializes(doc, "<nowiki>a {{b}} c</nowiki>\n");
}

#[test]
fn horizontal_rule_keeps_extra_dashes() {
    let doc = DocBuilder::new()
        .open("hr")
        .dp(dp(|d| d.extra_dashes = 3))
        .close()
        .finish();
    assert_serializes(doc, "-------\n");
}

#[test]
fn construct_stacks_unwind() {
    let mut doc = DocBuilder::new()
        .open("table")
        .open("tbody")
        .open("tr")
        .open("td")
        .open("ul")
        .open("li")
        .text("x")
        .close()
        .close()
        .close()
        .close()
        .close()
        .close()
        .finish();
    let env = Environment::new("Test page");
    let root = doc.body();
    // The assertion lives inside `serialize`: construct stacks must be
    // empty when the call returns.
    serialize_to_string(&mut doc, root, &Options::new(&env)).unwrap();
}
