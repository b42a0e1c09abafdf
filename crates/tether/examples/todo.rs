//! Example: binding a todo list and reconciling edits

use tether::helpers::{Animation, animate};
use tether::{Branch, Descriptor, DomTree, Engine, List, Record, Template};
use tether_html::HtmlSerializer;

const TEMPLATE: &str = r#"<section>
  <h1 class="title"></h1>
  <ul><li class="todo"><span class="text"></span></li></ul>
</section>"#;

fn main() -> anyhow::Result<()> {
    // Initialize logging (RUST_LOG=tether=trace shows every reconcile pass)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let todo = Descriptor::new()
        .key("text", ".text")
        .key("done", Branch::parent().change(|c| {
            if c.value.truthy() {
                c.surface.add_class(c.node, "done")?;
            } else {
                c.surface.remove_class(c.node, "done")?;
            }
            Ok(tether::Outcome::Done)
        }));
    let page = Descriptor::new().key("title", ".title").key(
        "todos",
        Branch::select(".todo")
            .nested(todo)
            .mount_with(animate(Animation::new().add("fresh"))),
    );

    let todos: List = ["write parser", "write reconciler"]
        .into_iter()
        .map(|text| Record::new().with("text", text).with("done", false))
        .collect();
    let record = Record::new().with("title", "Today").with("todos", todos.clone());

    let template = Template::parse(TEMPLATE)?;
    let mut engine = Engine::default();
    let mut tree = DomTree::new();
    let host = engine.bind(&mut tree, &record, &template, &page)?;
    let serializer = HtmlSerializer::new();
    println!("{}", serializer.serialize_outer(&tree, host));

    todos.push(&mut tree, Record::new().with("text", "ship it").with("done", false))?;
    if let Some(first) = todos.get(0).and_then(|v| v.as_record().cloned()) {
        first.set(&mut tree, "done", true)?;
    }
    todos.shift(&mut tree)?;
    record.set(&mut tree, "title", "Tomorrow")?;
    println!("{}", serializer.serialize_outer(&tree, host));

    Ok(())
}
