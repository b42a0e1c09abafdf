//! Comprehensive tests for tether
//!
//! Binding, list reconciliation, nested descriptors and rendering, run
//! against both the live tree and the string surface where it applies.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;
use tether::{
    Branch, Config, Descriptor, DomTree, Engine, List, MarkerStyle, NodeId, Outcome, Record, StringSurface, Surface,
    Template, Value,
};
use tether_html::HtmlSerializer;

trait Backend: Surface + Sized {
    fn fresh() -> Self;
    fn html(&self, node: NodeId) -> String;
}

impl Backend for DomTree {
    fn fresh() -> Self {
        DomTree::new()
    }

    fn html(&self, node: NodeId) -> String {
        HtmlSerializer::new().serialize_outer(self, node)
    }
}

impl Backend for StringSurface {
    fn fresh() -> Self {
        StringSurface::new()
    }

    fn html(&self, node: NodeId) -> String {
        self.serialize(node)
    }
}

const LIST: &str = r#"<ul><li class="item"></li></ul>"#;

fn letters(items: &[&str]) -> List {
    items.iter().copied().collect()
}

fn bind_list<S: Backend>(surface: &mut S, items: &List) -> (Record, NodeId) {
    let mut engine = Engine::default();
    let template = Template::parse(LIST).unwrap();
    let descriptor = Descriptor::new().key("items", ".item");
    let record = Record::new().with("items", items.clone());
    let host = engine.bind(surface, &record, &template, &descriptor).unwrap();
    (record, host)
}

// ============================================================================
// List scenario
// ============================================================================

fn scenario_truncate<S: Backend>() {
    let mut surface = S::fresh();
    let items = letters(&["a", "b", "c"]);
    let (_record, host) = bind_list(&mut surface, &items);
    assert_eq!(
        surface.html(host),
        r#"<ul><li class="item">a</li><li class="item">b</li><li class="item">c</li></ul>"#
    );

    items.truncate(&mut surface, 1).unwrap();
    assert_eq!(surface.html(host), r#"<ul><li class="item">a</li></ul>"#);
}

fn scenario_splice<S: Backend>() {
    let mut surface = S::fresh();
    let items = letters(&["a", "b", "c"]);
    let (_record, host) = bind_list(&mut surface, &items);

    let removed = items.splice(&mut surface, 1, 2, Vec::<Value>::new()).unwrap();
    assert_eq!(removed, vec![Value::from("b"), Value::from("c")]);
    assert_eq!(surface.html(host), r#"<ul><li class="item">a</li></ul>"#);
}

#[test]
fn test_scenario_truncate_tree() {
    scenario_truncate::<DomTree>();
}

#[test]
fn test_scenario_truncate_string() {
    scenario_truncate::<StringSurface>();
}

#[test]
fn test_scenario_splice_tree() {
    scenario_splice::<DomTree>();
}

#[test]
fn test_scenario_splice_string() {
    scenario_splice::<StringSurface>();
}

fn splice_middle<S: Backend>() {
    let mut surface = S::fresh();
    let items = letters(&["a", "b", "c"]);
    let (_record, host) = bind_list(&mut surface, &items);

    items
        .splice(&mut surface, 1, 1, vec![Value::from("x"), Value::from("y")])
        .unwrap();
    assert_eq!(
        surface.html(host),
        concat!(
            r#"<ul><li class="item">a</li><li class="item">x</li>"#,
            r#"<li class="item">y</li><li class="item">c</li></ul>"#
        )
    );

    items.unshift(&mut surface, "first").unwrap();
    items.shift(&mut surface).unwrap();
    items.insert_at(&mut surface, 4, "end").unwrap();
    items.remove_at(&mut surface, 0).unwrap();
    assert_eq!(
        surface.html(host),
        concat!(
            r#"<ul><li class="item">x</li><li class="item">y</li>"#,
            r#"<li class="item">c</li><li class="item">end</li></ul>"#
        )
    );
}

#[test]
fn test_splice_middle_tree() {
    splice_middle::<DomTree>();
}

#[test]
fn test_splice_middle_string() {
    splice_middle::<StringSurface>();
}

// ============================================================================
// Reconciliation properties
// ============================================================================

fn counting(calls: &Rc<Cell<usize>>) -> Branch {
    let counter = Rc::clone(calls);
    Branch::select("li").change(move |c| {
        counter.set(counter.get() + 1);
        Ok(Outcome::Replace(c.value.clone()))
    })
}

#[test]
fn test_same_reference_is_noop() {
    let calls = Rc::new(Cell::new(0));
    let mut engine = Engine::default();
    let mut tree = DomTree::new();
    let template = Template::parse("<ul><li></li></ul>").unwrap();
    let descriptor = Descriptor::new().key("items", counting(&calls));

    let record = Record::new().with("items", "x");
    engine.bind(&mut tree, &record, &template, &descriptor).unwrap();
    assert_eq!(calls.get(), 1);

    record.set(&mut tree, "items", "x").unwrap();
    assert_eq!(calls.get(), 1);

    let list = letters(&["a"]);
    record.set(&mut tree, "items", list.clone()).unwrap();
    assert_eq!(calls.get(), 2);
    record.set(&mut tree, "items", list.clone()).unwrap();
    assert_eq!(calls.get(), 2);
    assert!(list.is_bound());
}

#[test]
fn test_replacing_one_index_touches_one_node() {
    let calls = Rc::new(Cell::new(0));
    let mut engine = Engine::default();
    let mut tree = DomTree::new();
    let template = Template::parse("<ul><li></li></ul>").unwrap();
    let descriptor = Descriptor::new().key("items", counting(&calls));
    let items = letters(&["a", "b", "c"]);
    let record = Record::new().with("items", items.clone());
    let host = engine.bind(&mut tree, &record, &template, &descriptor).unwrap();
    let ul = tree.first_child(host).unwrap();
    let before = tree.child_ids(ul);
    assert_eq!(calls.get(), 3);

    let old = items.replace_at(&mut tree, 1, "x").unwrap();
    assert_eq!(old, Value::from("b"));
    assert_eq!(calls.get(), 4);
    assert_eq!(tree.child_ids(ul), before);
    assert_eq!(tree.text_content(before[1]), "x");
    assert_eq!(tree.text_content(before[0]), "a");
}

#[test]
fn test_index_wise_order() {
    let mut tree = DomTree::new();
    let items = letters(&["a", "b", "c"]);
    let (record, host) = bind_list(&mut tree, &items);
    let ul = tree.first_child(host).unwrap();
    let before = tree.child_ids(ul);

    // Dropping the head shifts values down; nodes stay by index
    record.set(&mut tree, "items", letters(&["b", "c"])).unwrap();
    assert_eq!(tree.child_ids(ul), vec![before[0], before[1], before[3]]);
    assert_eq!(tree.text_content(before[0]), "b");
    assert_eq!(tree.text_content(before[1]), "c");
    assert!(!items.is_bound());
}

fn push_pop_symmetry<S: Backend>() {
    let mut surface = S::fresh();
    let items = letters(&["a", "b"]);
    let (_record, host) = bind_list(&mut surface, &items);
    let before = surface.html(host);

    assert_eq!(items.push(&mut surface, "c").unwrap(), 3);
    assert_ne!(surface.html(host), before);
    assert_eq!(items.pop(&mut surface).unwrap(), Some(Value::from("c")));
    assert_eq!(surface.html(host), before);
}

#[test]
fn test_push_pop_symmetry_tree() {
    push_pop_symmetry::<DomTree>();
}

#[test]
fn test_push_pop_symmetry_string() {
    push_pop_symmetry::<StringSurface>();
}

#[test]
fn test_push_pop_keeps_node_identity() {
    let mut tree = DomTree::new();
    let items = letters(&["a", "b"]);
    let (_record, host) = bind_list(&mut tree, &items);
    let ul = tree.first_child(host).unwrap();
    let before = tree.child_ids(ul);

    items.push(&mut tree, "c").unwrap();
    items.pop(&mut tree).unwrap();
    assert_eq!(tree.child_ids(ul), before);
}

#[test]
fn test_skeleton_reuse_leaks_no_state() {
    let mut engine = Engine::default();
    let mut tree = DomTree::new();
    let template = Template::parse(LIST).unwrap();
    let descriptor = Descriptor::new().key("items", ".item");

    let first_items = letters(&["a", "b"]);
    let first = Record::new().with("items", first_items.clone());
    let second = Record::new().with("items", letters(&["z"]));
    let first_host = engine.bind(&mut tree, &first, &template, &descriptor).unwrap();
    let second_host = engine.bind(&mut tree, &second, &template, &descriptor).unwrap();

    first_items.push(&mut tree, "c").unwrap();
    first.set(&mut tree, "items", letters(&["q"])).unwrap();

    assert_eq!(tree.html(first_host), r#"<ul><li class="item">q</li></ul>"#);
    assert_eq!(tree.html(second_host), r#"<ul><li class="item">z</li></ul>"#);
    assert_eq!(engine.registry().len(), 1);

    let compiled = engine.registry().get(descriptor.id()).unwrap();
    let skeleton = HtmlSerializer::new().serialize_inner(compiled.skeleton().tree(), compiled.host());
    assert_eq!(skeleton, "<ul></ul>");
}

#[test]
fn test_reorder_reruns_full_comparison() {
    let mut tree = DomTree::new();
    let items = letters(&["c", "a", "b"]);
    let (_record, host) = bind_list(&mut tree, &items);
    let ul = tree.first_child(host).unwrap();
    let before = tree.child_ids(ul);

    items
        .sort_by(&mut tree, |a, b| a.to_text().cmp(&b.to_text()))
        .unwrap();
    assert_eq!(tree.child_ids(ul), before);
    assert_eq!(tree.text_content(ul), "abc");

    items.reverse(&mut tree).unwrap();
    assert_eq!(tree.text_content(ul), "cba");

    items.fill(&mut tree, "x", 1..).unwrap();
    assert_eq!(tree.text_content(ul), "cxx");

    items.copy_within(&mut tree, 0..1, 2).unwrap();
    assert_eq!(tree.text_content(ul), "cxc");
    assert_eq!(tree.child_ids(ul), before);
}

// ============================================================================
// Retained elements
// ============================================================================

#[test]
fn test_retained_node_stays_until_callback_removes_it() {
    let mut engine = Engine::default();
    let mut tree = DomTree::new();
    let template = Template::parse("<ul><li></li></ul>").unwrap();
    let descriptor = Descriptor::new().key(
        "items",
        Branch::select("li").change(|c| match c.value {
            Value::Null => Ok(Outcome::Retain),
            value => Ok(Outcome::Replace(value.clone())),
        }),
    );
    let items = letters(&["a", "b", "c"]);
    let record = Record::new().with("items", items.clone());
    let host = engine.bind(&mut tree, &record, &template, &descriptor).unwrap();
    let ul = tree.first_child(host).unwrap();
    let before = tree.child_ids(ul);

    items.pop(&mut tree).unwrap();
    assert_eq!(tree.child_ids(ul), before);
    assert_eq!(items.len(), 2);

    items.push(&mut tree, "z").unwrap();
    assert_eq!(tree.html(host), "<ul><li>a</li><li>b</li><li>c</li><li>z</li></ul>");

    // The retained node now belongs to whoever retained it
    tree.remove_child(ul, before[2]).unwrap();
    assert_eq!(tree.html(host), "<ul><li>a</li><li>b</li><li>z</li></ul>");
}

// ============================================================================
// Nested descriptors
// ============================================================================

const LATTE: &str = concat!(
    r#"<h1 class="name"></h1>"#,
    r#"<div class="details"><div><span class="size"></span></div><hr><h4 class="vendor"></h4></div>"#,
);

fn latte_descriptor() -> Descriptor {
    Descriptor::new().key("name", ".name").key(
        "details",
        Branch::select(".details").nested(Descriptor::new().key("size", ".size").key("vendor", ".vendor")),
    )
}

fn latte_data() -> Value {
    Value::from(json!({
        "name": "Pumpkin Spice Latte",
        "details": {
            "size": ["Tall", "Grande", "Venti"],
            "vendor": "Starbucks"
        }
    }))
}

const LATTE_HTML: &str = concat!(
    r#"<h1 class="name">Pumpkin Spice Latte</h1>"#,
    r#"<div class="details"><div><span class="size">Tall</span><span class="size">Grande</span>"#,
    r#"<span class="size">Venti</span></div><hr><h4 class="vendor">Starbucks</h4></div>"#,
);

#[test]
fn test_render_nested() {
    let mut engine = Engine::default();
    let html = engine.render(&latte_data(), &latte_descriptor(), Some(LATTE)).unwrap();
    assert_eq!(html, LATTE_HTML);
}

#[test]
fn test_bind_nested_and_update() {
    let mut engine = Engine::default();
    let mut tree = DomTree::new();
    let template = Template::parse(LATTE).unwrap();
    let Value::Record(record) = latte_data() else {
        panic!("expected a record");
    };
    let host = engine.bind(&mut tree, &record, &template, &latte_descriptor()).unwrap();
    assert_eq!(tree.html(host), LATTE_HTML);

    let details = record.get("details");
    let details = details.as_record().unwrap();
    assert!(details.is_bound());
    details.set(&mut tree, "vendor", "Peet's").unwrap();
    let sizes = details.get("size");
    sizes.as_list().unwrap().pop(&mut tree).unwrap();

    let html = tree.html(host);
    assert!(html.contains(r#"<h4 class="vendor">Peet's</h4>"#));
    assert!(!html.contains("Venti"));

    // Replacing the nested record rebuilds the subtree and frees the old one
    let fresh = Record::new().with("vendor", "Blue Bottle");
    record.set(&mut tree, "details", fresh.clone()).unwrap();
    assert!(!details.is_bound());
    assert!(!sizes.as_list().unwrap().is_bound());
    assert!(fresh.is_bound());
    assert_eq!(
        tree.html(host),
        concat!(
            r#"<h1 class="name">Pumpkin Spice Latte</h1>"#,
            r#"<div class="details"><div></div><hr><h4 class="vendor">Blue Bottle</h4></div>"#,
        )
    );

    record.set(&mut tree, "details", Value::Null).unwrap();
    assert_eq!(tree.html(host), r#"<h1 class="name">Pumpkin Spice Latte</h1>"#);
    assert!(!fresh.is_bound());
}

#[test]
fn test_paths_reach_list_items() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let descriptor = Descriptor::new().key(
        "details",
        Branch::select(".details").nested(Descriptor::new().key(
            "size",
            Branch::select(".size").change(move |c| {
                let target = c.path.target().unwrap();
                log.borrow_mut().push(format!("{} {}", c.path, target.len()));
                Ok(Outcome::Replace(c.value.clone()))
            }),
        )),
    );
    let mut engine = Engine::default();
    engine.render(&latte_data(), &descriptor, Some(LATTE)).unwrap();
    assert_eq!(
        *seen.borrow(),
        vec!["details.size[0] 2", "details.size[1] 2", "details.size[2] 2"]
    );
}

fn people_descriptor(log: &Rc<RefCell<Vec<String>>>) -> Descriptor {
    let log = Rc::clone(log);
    let person = Descriptor::new().key("name", ".name").key(
        "done",
        Branch::on_parent(|c| {
            if c.value.truthy() {
                c.surface.add_class(c.node, "done")?;
            } else {
                c.surface.remove_class(c.node, "done")?;
            }
            Ok(Outcome::Done)
        }),
    );
    Descriptor::new().key(
        "people",
        Branch::select("li").nested(person).mount(move |c| {
            let attached = c.surface.parent(c.node).is_some();
            let phase = if c.value.is_null() { "out" } else { "in" };
            log.borrow_mut().push(format!("{phase}:{attached}"));
            Ok(Outcome::Done)
        }),
    )
}

fn person(name: &str) -> Record {
    Record::new().with("name", name).with("done", false)
}

#[test]
fn test_mount_runs_after_attach_and_before_detach() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::default();
    let mut tree = DomTree::new();
    let template = Template::parse(r#"<ul><li class="task"><b class="name"></b></li></ul>"#).unwrap();
    let people: List = [person("ann"), person("bob")].into_iter().collect();
    let record = Record::new().with("people", people.clone());
    let host = engine.bind(&mut tree, &record, &template, &people_descriptor(&log)).unwrap();

    assert_eq!(*log.borrow(), vec!["in:true", "in:true"]);
    assert_eq!(
        tree.html(host),
        r#"<ul><li class="task"><b class="name">ann</b></li><li class="task"><b class="name">bob</b></li></ul>"#
    );

    people.pop(&mut tree).unwrap();
    assert_eq!(*log.borrow(), vec!["in:true", "in:true", "out:true"]);
    assert_eq!(tree.html(host), r#"<ul><li class="task"><b class="name">ann</b></li></ul>"#);
}

#[test]
fn test_parent_binding_toggles_host_class() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::default();
    let mut tree = DomTree::new();
    let template = Template::parse(r#"<ul><li class="task"><b class="name"></b></li></ul>"#).unwrap();
    let ann = person("ann");
    let people: List = [ann.clone()].into_iter().collect();
    let record = Record::new().with("people", people);
    let host = engine.bind(&mut tree, &record, &template, &people_descriptor(&log)).unwrap();

    ann.set(&mut tree, "done", true).unwrap();
    assert_eq!(
        tree.html(host),
        r#"<ul><li class="task done"><b class="name">ann</b></li></ul>"#
    );
    ann.set(&mut tree, "done", false).unwrap();
    assert_eq!(tree.html(host), r#"<ul><li class="task"><b class="name">ann</b></li></ul>"#);
}

#[test]
fn test_composite_replacement_rebuilds_one_node() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::default();
    let mut tree = DomTree::new();
    let template = Template::parse(r#"<ul><li class="task"><b class="name"></b></li></ul>"#).unwrap();
    let people: List = [person("a"), person("b"), person("c")].into_iter().collect();
    let record = Record::new().with("people", people.clone());
    let host = engine.bind(&mut tree, &record, &template, &people_descriptor(&log)).unwrap();
    let ul = tree.first_child(host).unwrap();
    let before = tree.child_ids(ul);

    let old = people.replace_at(&mut tree, 1, person("x")).unwrap();
    let after = tree.child_ids(ul);
    assert_eq!(after[0], before[0]);
    assert_ne!(after[1], before[1]);
    assert_eq!(after[2], before[2]);
    assert_eq!(tree.text_content(ul), "axc");
    assert!(!old.as_record().unwrap().is_bound());
}

#[test]
fn test_reordering_records_moves_bindings() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::default();
    let mut tree = DomTree::new();
    let template = Template::parse(r#"<ul><li class="task"><b class="name"></b></li></ul>"#).unwrap();
    let (a, b) = (person("a"), person("b"));
    let people: List = [a.clone(), b.clone()].into_iter().collect();
    let record = Record::new().with("people", people.clone());
    let host = engine.bind(&mut tree, &record, &template, &people_descriptor(&log)).unwrap();
    let ul = tree.first_child(host).unwrap();

    people.reverse(&mut tree).unwrap();
    assert_eq!(tree.text_content(ul), "ba");
    let children = tree.child_ids(ul);
    assert_eq!(b.host(), Some(children[0]));
    assert_eq!(a.host(), Some(children[1]));

    a.set(&mut tree, "name", "A").unwrap();
    assert_eq!(tree.text_content(ul), "bA");
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_render_form_controls() {
    let mut engine = Engine::default();
    let checkbox = Descriptor::new().key("checked", "input");
    let on = Value::from(json!({ "checked": true }));
    let off = Value::from(json!({ "checked": false }));
    assert_eq!(
        engine.render(&on, &checkbox, Some(r#"<input type="checkbox">"#)).unwrap(),
        r#"<input type="checkbox" checked>"#
    );
    assert_eq!(engine.render(&off, &checkbox, None).unwrap(), r#"<input type="checkbox">"#);

    let area = Descriptor::new().key("text", "textarea");
    let text = Value::from(json!({ "text": "<foo>" }));
    assert_eq!(
        engine.render(&text, &area, Some("<textarea></textarea>")).unwrap(),
        "<textarea>&lt;foo&gt;</textarea>"
    );

    let field = Descriptor::new().key("value", "input");
    let value = Value::from(json!({ "value": 42 }));
    assert_eq!(
        engine.render(&value, &field, Some(r#"<input type="text">"#)).unwrap(),
        r#"<input type="text" value="42">"#
    );
}

#[test]
fn test_render_comment_markers() {
    let mut engine = Engine::new(Config::default().with_marker(MarkerStyle::Comment));
    let descriptor = Descriptor::new().key("items", "li");
    let data = Value::from(json!({ "items": ["a", "b"] }));
    assert_eq!(
        engine.render(&data, &descriptor, Some("<ul><li></li></ul>")).unwrap(),
        r#"<ul><!-- begin "items" --><li>a</li><li>b</li><!-- end "items" --></ul>"#
    );
}

#[test]
fn test_render_keeps_static_content() {
    let mut engine = Engine::default();
    let descriptor = Descriptor::new().key("title", "h2");
    let template = r#"<section><header><em>static</em> &amp; fixed</header><h2></h2><footer>end</footer></section>"#;
    let data = Value::from(json!({ "title": "Hello" }));
    assert_eq!(
        engine.render(&data, &descriptor, Some(template)).unwrap(),
        r#"<section><header><em>static</em> &amp; fixed</header><h2>Hello</h2><footer>end</footer></section>"#
    );
}

fn order_mocha(surface: &mut dyn Surface, record: &Record) {
    let details = record.get("details");
    let sizes = details.as_record().unwrap().get("size");
    let sizes = sizes.as_list().unwrap();
    record.set(surface, "name", "Mocha").unwrap();
    sizes.shift(surface).unwrap();
    sizes.push(surface, "Trenta").unwrap();
}

#[test]
fn test_both_backends_agree() {
    let descriptor = latte_descriptor();
    let template = Template::parse(LATTE).unwrap();
    let mut engine = Engine::default();
    let (Value::Record(first), Value::Record(second)) = (latte_data(), latte_data()) else {
        panic!("expected records");
    };

    let mut tree = DomTree::new();
    let tree_host = engine.bind(&mut tree, &first, &template, &descriptor).unwrap();
    order_mocha(&mut tree, &first);

    let mut strings = StringSurface::new();
    let string_host = engine.bind(&mut strings, &second, &template, &descriptor).unwrap();
    order_mocha(&mut strings, &second);

    let html = strings.html(string_host);
    assert_eq!(tree.html(tree_host), html);
    assert!(html.starts_with(r#"<h1 class="name">Mocha</h1>"#));
    assert!(html.contains(r#"Grande</span><span class="size">Venti</span><span class="size">Trenta"#));
}

// ============================================================================
// Rehydration
// ============================================================================

fn named(tree: &DomTree, root: NodeId, tag: &str) -> Vec<NodeId> {
    tree.descendants(root).filter(|&id| tree.tag_name(id) == Some(tag)).collect()
}

#[test]
fn test_rehydrate_reuses_rendered_nodes() {
    let mut engine = Engine::default();
    let descriptor = Descriptor::new().key("items", ".item");
    let data = Value::from(json!({ "items": ["a", "b"] }));
    let html = engine.render(&data, &descriptor, Some(LIST)).unwrap();

    let (mut tree, root) = tether_html::parse_fragment(&html).unwrap();
    let ul = named(&tree, root, "ul")[0];
    let rendered = named(&tree, root, "li");

    let items = letters(&["a", "b"]);
    let record = Record::new().with("items", items.clone());
    let compiled = engine.compile(&Template::parse(LIST).unwrap(), &descriptor).unwrap();
    assert_eq!(engine.rehydrate(&mut tree, &record, &compiled, root).unwrap(), root);
    assert!(record.is_bound());
    assert!(items.is_bound());
    assert_eq!(tree.html(root), html);

    items.push(&mut tree, "c").unwrap();
    items.replace_at(&mut tree, 0, "z").unwrap();
    assert_eq!(
        tree.html(root),
        r#"<ul><li class="item">z</li><li class="item">b</li><li class="item">c</li></ul>"#
    );
    let now = named(&tree, root, "li");
    assert_eq!(&now[..2], &rendered[..]);
    assert_eq!(tree.parent(rendered[1]), Some(ul));

    items.truncate(&mut tree, 0).unwrap();
    assert_eq!(tree.html(root), "<ul></ul>");
}

#[test]
fn test_rehydrate_nested_records() {
    let mut engine = Engine::default();
    let descriptor = latte_descriptor();
    let html = engine.render(&latte_data(), &descriptor, Some(LATTE)).unwrap();
    let (mut tree, root) = tether_html::parse_fragment(&html).unwrap();
    let vendor = named(&tree, root, "h4")[0];
    let sizes_before = named(&tree, root, "span");

    let Value::Record(record) = latte_data() else {
        panic!("expected a record");
    };
    let compiled = engine.compile(&Template::parse(LATTE).unwrap(), &descriptor).unwrap();
    engine.rehydrate(&mut tree, &record, &compiled, root).unwrap();

    let details = record.get("details");
    let details = details.as_record().unwrap();
    assert!(details.is_bound());
    details.set(&mut tree, "vendor", "Peet's").unwrap();
    details.get("size").as_list().unwrap().pop(&mut tree).unwrap();
    record.set(&mut tree, "name", "Mocha").unwrap();

    assert_eq!(
        tree.html(root),
        concat!(
            r#"<h1 class="name">Mocha</h1>"#,
            r#"<div class="details"><div><span class="size">Tall</span><span class="size">Grande</span>"#,
            r#"</div><hr><h4 class="vendor">Peet's</h4></div>"#,
        )
    );
    assert_eq!(named(&tree, root, "h4"), vec![vendor]);
    assert_eq!(named(&tree, root, "span"), sizes_before[..2].to_vec());
}

#[test]
fn test_rehydrate_reuses_comment_markers() {
    let mut engine = Engine::new(Config::default().with_marker(MarkerStyle::Comment));
    let descriptor = Descriptor::new().key("items", "li");
    let data = Value::from(json!({ "items": ["a"] }));
    let html = engine.render(&data, &descriptor, Some("<ul><li></li></ul>")).unwrap();
    let (mut tree, root) = tether_html::parse_fragment(&html).unwrap();

    let items = letters(&["a"]);
    let record = Record::new().with("items", items.clone());
    let compiled = engine
        .compile(&Template::parse("<ul><li></li></ul>").unwrap(), &descriptor)
        .unwrap();
    engine.rehydrate(&mut tree, &record, &compiled, root).unwrap();
    assert_eq!(tree.html(root), html);

    items.push(&mut tree, "b").unwrap();
    assert_eq!(
        tree.html(root),
        r#"<ul><!-- begin "items" --><li>a</li><li>b</li><!-- end "items" --></ul>"#
    );
}

#[test]
fn test_rehydrate_then_bind_twice_is_rebind() {
    let mut engine = Engine::default();
    let descriptor = Descriptor::new().key("items", ".item");
    let html = engine
        .render(&Value::from(json!({ "items": ["a"] })), &descriptor, Some(LIST))
        .unwrap();
    let (mut tree, root) = tether_html::parse_fragment(&html).unwrap();
    let record = Record::new().with("items", letters(&["a"]));
    let compiled = engine.compile(&Template::parse(LIST).unwrap(), &descriptor).unwrap();
    engine.rehydrate(&mut tree, &record, &compiled, root).unwrap();
    assert!(matches!(
        engine.rehydrate(&mut tree, &record, &compiled, root),
        Err(tether::BindError::Rebind { what: "record" })
    ));
}
