//! Comprehensive tests for tether-html
//!
//! Template shapes that bindings are compiled against.

use tether_dom::Selector;
use tether_html::{parse_fragment, HtmlSerializer, ParseError};

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_list_template() {
    let (tree, root) = parse_fragment(r#"<ul><li class="item"></li></ul>"#).unwrap();
    let sel = Selector::parse(".item").unwrap();
    let li = tree.query_selector(root, &sel).unwrap();
    assert_eq!(tree.tag_name(li), Some("li"));
}

#[test]
fn test_parse_nested_template() {
    let html = [
        r#"<h1 class="name"></h1>"#,
        r#"<div class="details">"#,
        r#"<div><span class="size"></span></div>"#,
        r#"<hr><h4 class="vendor"></h4>"#,
        r#"</div>"#,
    ]
    .concat();
    let (tree, root) = parse_fragment(&html).unwrap();
    assert_eq!(tree.child_ids(root).len(), 2);
    let details = tree.query_selector(root, &Selector::parse(".details").unwrap()).unwrap();
    assert_eq!(tree.child_ids(details).len(), 3);
}

#[test]
fn test_parse_form_controls() {
    let (tree, root) = parse_fragment(r#"<input type="checkbox"><textarea></textarea>"#).unwrap();
    let input = tree.query_selector(root, &Selector::parse("input").unwrap()).unwrap();
    assert_eq!(tree.attribute(input, "type"), Some("checkbox"));
    assert!(tree.query_selector(root, &Selector::parse("textarea").unwrap()).is_some());
}

#[test]
fn test_text_with_entities() {
    let (tree, root) = parse_fragment("<p>a &amp; b</p>").unwrap();
    assert_eq!(tree.text_content(root), "a & b");
}

#[test]
fn test_nbsp_is_kept() {
    let (tree, root) = parse_fragment("<p>&nbsp;</p>").unwrap();
    assert_eq!(tree.text_content(root), "\u{a0}");
}

#[test]
fn test_uppercase_tags_normalized() {
    let (tree, root) = parse_fragment("<DIV CLASS=\"x\"></DIV>").unwrap();
    let div = tree.first_child(root).unwrap();
    assert_eq!(tree.tag_name(div), Some("div"));
    assert_eq!(tree.attribute(div, "class"), Some("x"));
}

#[test]
fn test_empty_template() {
    assert!(matches!(parse_fragment(""), Err(ParseError::Empty)));
}

#[test]
fn test_whitespace_between_elements_is_kept() {
    let html = "<p><b class=\"f\"></b> <i class=\"l\"></i></p>";
    let (tree, root) = parse_fragment(html).unwrap();
    let p = tree.first_child(root).unwrap();
    assert_eq!(tree.child_ids(p).len(), 3);
    assert_eq!(HtmlSerializer::new().serialize_inner(&tree, root), html);
}

#[test]
fn test_whitespace_only_template_is_text() {
    let (tree, root) = parse_fragment(" \t\n").unwrap();
    assert_eq!(tree.child_ids(root).len(), 1);
    assert_eq!(tree.text_content(root), " \t\n");
}

// ============================================================================
// Context-only content
// ============================================================================

#[test]
fn test_parse_table_row_template() {
    let (tree, root) = parse_fragment(r#"<tr class="row"><td></td><td class="total"></td></tr>"#).unwrap();
    let tr = tree.first_child(root).unwrap();
    assert_eq!(tree.tag_name(tr), Some("tr"));
    assert_eq!(tree.child_ids(tr).len(), 2);
    assert!(tree.query_selector(root, &Selector::parse(".row > .total").unwrap()).is_some());
}

#[test]
fn test_parse_cells_options_and_columns() {
    for (html, tag) in [
        ("<td>a</td>", "td"),
        ("<th>a</th>", "th"),
        ("<option>a</option>", "option"),
        ("<col span=\"2\">", "col"),
        ("<tbody><tr></tr></tbody>", "tbody"),
    ] {
        let (tree, root) = parse_fragment(html).unwrap();
        let first = tree.first_child(root).unwrap();
        assert_eq!(tree.tag_name(first), Some(tag), "{html}");
    }
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_serialize_escapes_text() {
    let (mut tree, root) = parse_fragment("<textarea></textarea>").unwrap();
    let textarea = tree.first_child(root).unwrap();
    tree.set_text_content(textarea, "<foo>").unwrap();
    assert_eq!(
        HtmlSerializer::new().serialize_inner(&tree, root),
        "<textarea>&lt;foo&gt;</textarea>"
    );
}

#[test]
fn test_serialize_attribute_escaping() {
    let (mut tree, root) = parse_fragment("<a></a>").unwrap();
    let a = tree.first_child(root).unwrap();
    tree.set_attribute(a, "title", "\"quoted\" & <b>").unwrap();
    assert_eq!(
        HtmlSerializer::new().serialize_inner(&tree, root),
        r#"<a title="&quot;quoted&quot; &amp; &lt;b&gt;"></a>"#
    );
}

#[test]
fn test_serialize_raw_text() {
    let (tree, root) = parse_fragment("<div><style>a > b {}</style></div>").unwrap();
    assert_eq!(
        HtmlSerializer::new().serialize_inner(&tree, root),
        "<div><style>a > b {}</style></div>"
    );
}
