//! Keyed list diffing observed through host operations.

use pretty_assertions::assert_eq;
use spark_reconciler::element::{host, text, Element};
use spark_reconciler::testkit::{rig, HostOp};

fn item(key: &str) -> Element {
    host("li").key(key).child(text(key)).into()
}

fn list(keys: &[&str]) -> Element {
    host("ul").children(keys.iter().map(|k| item(k))).into()
}

fn creates(ops: &[HostOp]) -> usize {
    ops.iter()
        .filter(|op| matches!(op, HostOp::CreateInstance(_, tag) if tag == "li"))
        .count()
}

fn removes(ops: &[HostOp]) -> usize {
    ops.iter()
        .filter(|op| matches!(op, HostOp::RemoveChild { .. }))
        .count()
}

fn moves(ops: &[HostOp]) -> usize {
    ops.iter()
        .filter(|op| {
            matches!(
                op,
                HostOp::AppendToContainer { .. } | HostOp::InsertToContainer { .. }
            )
        })
        .count()
}

#[test]
fn test_reversal_reuses_all_nodes() {
    let r = rig();
    r.root.render(list(&["a", "b", "c"]));
    r.flush();
    r.host.take_ops();

    r.root.render(list(&["c", "b", "a"]));
    r.flush();

    let ops = r.host.take_ops();
    // Every node is reused: nothing created, nothing destroyed. Under the
    // watermark rule "c" anchors and the two trailing entries move.
    assert_eq!(creates(&ops), 0, "no li may be recreated: {ops:?}");
    assert_eq!(removes(&ops), 0, "no li may be destroyed: {ops:?}");
    assert_eq!(moves(&ops), 2, "expected two move placements: {ops:?}");
    assert_eq!(
        r.snapshot(),
        "<#container><ul><li>\"c\"</li><li>\"b\"</li><li>\"a\"</li></ul></#container>"
    );
}

#[test]
fn test_append_reuses_prefix_and_inserts_tail() {
    let r = rig();
    r.root.render(list(&["1", "2", "3"]));
    r.flush();
    r.host.take_ops();

    r.root.render(list(&["1", "2", "3", "4"]));
    r.flush();

    let ops = r.host.take_ops();
    assert_eq!(creates(&ops), 1, "only the new li is created: {ops:?}");
    assert_eq!(removes(&ops), 0);
    assert_eq!(moves(&ops), 1, "only the new li is placed: {ops:?}");
    assert_eq!(
        r.snapshot(),
        "<#container><ul><li>\"1\"</li><li>\"2\"</li><li>\"3\"</li><li>\"4\"</li></ul></#container>"
    );
}

#[test]
fn test_removal_deletes_only_the_missing_entry() {
    let r = rig();
    r.root.render(list(&["1", "2", "3"]));
    r.flush();
    r.host.take_ops();

    r.root.render(list(&["1", "3"]));
    r.flush();

    let ops = r.host.take_ops();
    assert_eq!(creates(&ops), 0, "1 and 3 are reused: {ops:?}");
    assert_eq!(removes(&ops), 1, "only 2 is removed: {ops:?}");
    assert_eq!(
        r.snapshot(),
        "<#container><ul><li>\"1\"</li><li>\"3\"</li></ul></#container>"
    );
}

#[test]
fn test_insertion_in_the_middle_inserts_before_stable_sibling() {
    let r = rig();
    r.root.render(list(&["a", "c"]));
    r.flush();
    r.host.take_ops();

    r.root.render(list(&["a", "b", "c"]));
    r.flush();

    let ops = r.host.take_ops();
    assert_eq!(creates(&ops), 1);
    assert!(
        ops.iter()
            .any(|op| matches!(op, HostOp::InsertToContainer { .. })),
        "the new entry lands before its stable sibling: {ops:?}"
    );
    assert_eq!(
        r.snapshot(),
        "<#container><ul><li>\"a\"</li><li>\"b\"</li><li>\"c\"</li></ul></#container>"
    );
}

#[test]
fn test_key_match_with_type_change_recreates_node() {
    let r = rig();
    r.root.render(
        host("ul")
            .child(host("li").key("a").child(text("li-a")))
            .into(),
    );
    r.flush();
    r.host.take_ops();

    r.root.render(
        host("ul")
            .child(host("p").key("a").child(text("p-a")))
            .into(),
    );
    r.flush();

    let ops = r.host.take_ops();
    assert!(ops
        .iter()
        .any(|op| matches!(op, HostOp::CreateInstance(_, tag) if tag == "p")));
    assert_eq!(removes(&ops), 1);
}
