//! Mount and update round trips against the mock host.

use pretty_assertions::assert_eq;
use spark_reconciler::element::{host, text};
use spark_reconciler::testkit::{rig, HostOp};

#[test]
fn test_mount_mirrors_element_tree() {
    let r = rig();
    r.root.render(
        host("div")
            .attr("id", "app")
            .child(host("span").child(text("hello")))
            .child(text("world"))
            .into(),
    );
    r.flush();

    assert_eq!(
        r.snapshot(),
        "<#container><div id=\"app\"><span>\"hello\"</span>\"world\"</div></#container>"
    );
}

#[test]
fn test_leaf_text_update_patches_exactly_one_instance() {
    let r = rig();
    let tree = |label: &str| {
        host("div")
            .child(host("span").child(text(label)))
            .child(host("p").child(text("static")))
            .into()
    };

    r.root.render(tree("before"));
    r.flush();
    r.host.take_ops();

    r.root.render(tree("after"));
    r.flush();

    let ops = r.host.take_ops();
    assert_eq!(ops.len(), 1, "expected one host op, got {ops:?}");
    assert!(
        matches!(&ops[0], HostOp::UpdateText(_, content) if content == "after"),
        "expected a text patch, got {ops:?}"
    );
    assert!(r.snapshot().contains("\"after\""));
}

#[test]
fn test_attr_change_patches_instance_in_place() {
    let r = rig();
    r.root.render(host("div").attr("class", "a").into());
    r.flush();
    r.host.take_ops();

    r.root.render(host("div").attr("class", "b").into());
    r.flush();

    let ops = r.host.take_ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(
        &ops[0],
        HostOp::UpdateInstance(_, attrs) if attrs.get("class").map(String::as_str) == Some("b")
    ));
}

#[test]
fn test_identical_rerender_is_a_no_op_on_the_host() {
    let r = rig();
    r.root.render(host("div").attr("id", "x").child(text("hi")).into());
    r.flush();
    r.host.take_ops();

    r.root.render(host("div").attr("id", "x").child(text("hi")).into());
    r.flush();

    assert_eq!(r.host.take_ops(), Vec::new());
}

#[test]
fn test_unmount_removes_host_tree() {
    let r = rig();
    r.root.render(host("div").child(text("bye")).into());
    r.flush();
    assert!(r.snapshot().contains("<div>"));

    r.root.unmount();
    r.flush();
    assert_eq!(r.snapshot(), "<#container></#container>");
}

#[test]
fn test_ref_binds_after_commit_and_clears_on_unmount() {
    use std::cell::RefCell;
    use std::rc::Rc;
    use spark_reconciler::NodeRef;

    let node_ref: NodeRef = Rc::new(RefCell::new(None));

    let r = rig();
    r.root
        .render(host("div").node_ref(node_ref.clone()).into());
    r.flush();

    let bound = node_ref.borrow().expect("ref bound at commit");
    assert!(r.host.snapshot(bound).starts_with("<div>"));

    r.root.render(host("div").into());
    r.flush();
    assert!(node_ref.borrow().is_none(), "replaced ref is detached");

    // Re-bind, then unmount: the binding clears with the instance.
    r.root
        .render(host("div").node_ref(node_ref.clone()).into());
    r.flush();
    assert!(node_ref.borrow().is_some());
    r.root.unmount();
    r.flush();
    assert!(node_ref.borrow().is_none());
}

#[test]
fn test_keyed_fragment_groups_children_in_a_list() {
    use spark_reconciler::element::keyed_fragment;

    let r = rig();
    let tree = |first: &str| {
        host("div")
            .child(keyed_fragment("pair", [text(first), text("second")]))
            .child(host("hr").key("rule"))
            .into()
    };

    r.root.render(tree("first"));
    r.flush();
    assert_eq!(
        r.snapshot(),
        "<#container><div>\"first\"\"second\"<hr></hr></div></#container>"
    );
    r.host.take_ops();

    // The fragment keeps its identity: only the changed text is patched.
    r.root.render(tree("renamed"));
    r.flush();
    let ops = r.host.take_ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(&ops[0], HostOp::UpdateText(_, content) if content == "renamed"));
}

#[test]
fn test_type_change_remounts_subtree() {
    let r = rig();
    r.root.render(host("div").child(text("x")).into());
    r.flush();
    r.host.take_ops();

    r.root.render(host("section").child(text("x")).into());
    r.flush();

    let ops = r.host.take_ops();
    assert!(ops
        .iter()
        .any(|op| matches!(op, HostOp::CreateInstance(_, tag) if tag == "section")));
    assert!(ops.iter().any(|op| matches!(op, HostOp::RemoveChild { .. })));
    assert_eq!(
        r.snapshot(),
        "<#container><section>\"x\"</section></#container>"
    );
}
