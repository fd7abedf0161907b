//! Keyed child reconciliation.
//!
//! Compares a node's previous children (the current buffer) with its new
//! element descriptions and produces reused, freshly created, moved and
//! deleted child nodes in a single left-to-right scan.
//!
//! # Algorithm
//!
//! 1. Single new child: scan the old sibling chain for a key match. A key
//!    and type match reuses the node and deletes the remaining siblings; a
//!    key match with a different type deletes the whole remaining chain; a
//!    key mismatch deletes that sibling and keeps scanning.
//! 2. Many new children: index the old chain by explicit key (falling back
//!    to position), then walk the new list reusing map hits and creating
//!    nodes for misses. Whatever is left in the map afterwards is deleted.
//! 3. Move detection: one running watermark (`last_placed_index`). A reused
//!    node whose old position is below the watermark must move and is
//!    flagged for placement; otherwise the watermark advances. This is an
//!    O(n) approximation — stable and correct, not minimal-move.
//!
//! Effect flags are only recorded when `track` is set; during a fresh mount
//! the whole subtree is inserted as one batch by its parent, so per-child
//! placements would be noise.

use std::collections::HashMap;

use crate::element::{Element, Key};
use crate::engine::node::{Flags, NodeKind, NodeProps};
use crate::engine::NodeKey;
use crate::pipeline::root::Session;

/// Reconcile `wip`'s children against `children`, wiring `wip.child`.
///
/// The diff runs tracked when `wip` has an alternate (an update pass over
/// this position); otherwise every child is freshly created untracked.
pub(crate) fn reconcile_children(session: &mut Session, wip: NodeKey, children: &[Element]) {
    let current = session.arena.get(wip).alternate;
    let first = match current {
        Some(cur) => {
            let first = session.arena.get(cur).child;
            reconcile_slice(session, wip, first, children, true)
        }
        None => reconcile_slice(session, wip, None, children, false),
    };
    session.arena.get_mut(wip).child = first;
}

fn reconcile_slice(
    session: &mut Session,
    parent: NodeKey,
    current_first: Option<NodeKey>,
    children: &[Element],
    track: bool,
) -> Option<NodeKey> {
    // A lone unkeyed fragment at the top folds into its children.
    if children.len() == 1 {
        if let Element::Fragment(f) = &children[0] {
            if f.key.is_none() {
                return reconcile_slice(session, parent, current_first, &f.children, track);
            }
        }
    }

    match children {
        [] => {
            delete_remaining(session, parent, current_first, track);
            None
        }
        [Element::Text(content)] => {
            let child = reconcile_single_text(session, parent, current_first, content, track);
            Some(place_single_child(session, child, track))
        }
        [element] => {
            let child = reconcile_single_element(session, parent, current_first, element, track);
            Some(place_single_child(session, child, track))
        }
        many => reconcile_array(session, parent, current_first, many, track),
    }
}

// =============================================================================
// Deletion staging
// =============================================================================

fn delete_child(session: &mut Session, parent: NodeKey, child: NodeKey, track: bool) {
    if !track {
        return;
    }
    let node = session.arena.get_mut(parent);
    node.deletions.push(child);
    node.flags |= Flags::CHILD_DELETION;
}

fn delete_remaining(
    session: &mut Session,
    parent: NodeKey,
    first: Option<NodeKey>,
    track: bool,
) {
    if !track {
        return;
    }
    let mut child = first;
    while let Some(c) = child {
        delete_child(session, parent, c, track);
        child = session.arena.get(c).sibling;
    }
}

// =============================================================================
// Single-child paths
// =============================================================================

/// Clone an existing node for reuse as the work-in-progress child.
fn use_node(session: &mut Session, existing: NodeKey, props: NodeProps) -> NodeKey {
    let wip = session.arena.create_work_in_progress(existing, props);
    let node = session.arena.get_mut(wip);
    node.index = 0;
    node.sibling = None;
    wip
}

/// Whether an existing node's type matches an element's.
fn element_matches_kind(session: &Session, node: NodeKey, element: &Element) -> bool {
    match (&session.arena.get(node).kind, element) {
        (NodeKind::Host(tag), Element::Host(e)) => *tag == e.tag,
        (NodeKind::Text, Element::Text(_)) => true,
        (NodeKind::Function(f), Element::Component(e)) => std::rc::Rc::ptr_eq(f, &e.render),
        (NodeKind::Fragment, Element::Fragment(_)) => true,
        (NodeKind::Provider(id), Element::Provider(e)) => *id == e.context,
        (NodeKind::Suspense, Element::Suspense(_)) => true,
        _ => false,
    }
}

/// The pending props an element contributes to its node.
fn element_pending_props(element: &Element) -> NodeProps {
    match element {
        Element::Host(e) => NodeProps::Host {
            attrs: e.attrs.clone(),
            children: e.children.clone(),
        },
        Element::Text(content) => NodeProps::Text(content.clone()),
        Element::Component(e) => NodeProps::Component(e.props.clone()),
        Element::Fragment(e) => NodeProps::Children(e.children.clone()),
        Element::Provider(e) => NodeProps::Provider {
            value: e.value.clone(),
            children: e.children.clone(),
        },
        Element::Suspense(e) => NodeProps::Suspense {
            children: e.children.clone(),
            fallback: e.fallback.clone(),
        },
    }
}

/// Refresh a reused node's ref binding slot from its element.
fn apply_element_ref(session: &mut Session, node: NodeKey, element: &Element) {
    if let Element::Host(e) = element {
        session.arena.get_mut(node).node_ref = e.node_ref.clone();
    }
}

fn reconcile_single_element(
    session: &mut Session,
    parent: NodeKey,
    current_first: Option<NodeKey>,
    element: &Element,
    track: bool,
) -> NodeKey {
    let key = element.key();
    let mut current = current_first;
    while let Some(cur) = current {
        let cur_key = session.arena.get(cur).key.clone();
        if cur_key.as_ref() == key {
            if element_matches_kind(session, cur, element) {
                let existing = use_node(session, cur, element_pending_props(element));
                apply_element_ref(session, existing, element);
                session.arena.get_mut(existing).parent = Some(parent);
                // This position fully replaces the sibling list.
                let rest = session.arena.get(cur).sibling;
                delete_remaining(session, parent, rest, track);
                return existing;
            }
            // Same key, different type: nothing further can match.
            delete_remaining(session, parent, Some(cur), track);
            break;
        }
        delete_child(session, parent, cur, track);
        current = session.arena.get(cur).sibling;
    }

    let fresh = session.arena.node_from_element(element);
    session.arena.get_mut(fresh).parent = Some(parent);
    fresh
}

fn reconcile_single_text(
    session: &mut Session,
    parent: NodeKey,
    current_first: Option<NodeKey>,
    content: &str,
    track: bool,
) -> NodeKey {
    let mut current = current_first;
    while let Some(cur) = current {
        if matches!(session.arena.get(cur).kind, NodeKind::Text) {
            let existing = use_node(session, cur, NodeProps::Text(content.to_string()));
            session.arena.get_mut(existing).parent = Some(parent);
            let rest = session.arena.get(cur).sibling;
            delete_remaining(session, parent, rest, track);
            return existing;
        }
        delete_child(session, parent, cur, track);
        current = session.arena.get(cur).sibling;
    }

    let fresh = session.arena.node_from_text(content.to_string());
    session.arena.get_mut(fresh).parent = Some(parent);
    fresh
}

fn place_single_child(session: &mut Session, child: NodeKey, track: bool) -> NodeKey {
    if track && session.arena.get(child).alternate.is_none() {
        session.arena.get_mut(child).flags |= Flags::PLACEMENT;
    }
    child
}

// =============================================================================
// Multi-child path
// =============================================================================

#[derive(PartialEq, Eq, Hash, Clone)]
enum MapKey {
    Key(Key),
    Index(u32),
}

fn reconcile_array(
    session: &mut Session,
    parent: NodeKey,
    current_first: Option<NodeKey>,
    children: &[Element],
    track: bool,
) -> Option<NodeKey> {
    // Index the existing children by explicit key, falling back to position.
    let mut existing: HashMap<MapKey, NodeKey> = HashMap::new();
    let mut current = current_first;
    while let Some(cur) = current {
        let node = session.arena.get(cur);
        let map_key = match &node.key {
            Some(key) => MapKey::Key(key.clone()),
            None => MapKey::Index(node.index),
        };
        existing.insert(map_key, cur);
        current = node.sibling;
    }

    let mut last_placed_index: u32 = 0;
    let mut first_new: Option<NodeKey> = None;
    let mut last_new: Option<NodeKey> = None;

    for (i, element) in children.iter().enumerate() {
        let index = i as u32;
        let Some(new_child) = update_from_map(session, &mut existing, index, element) else {
            continue;
        };

        {
            let node = session.arena.get_mut(new_child);
            node.index = index;
            node.parent = Some(parent);
            node.sibling = None;
        }
        match last_new {
            None => {
                first_new = Some(new_child);
                last_new = Some(new_child);
            }
            Some(prev) => {
                session.arena.get_mut(prev).sibling = Some(new_child);
                last_new = Some(new_child);
            }
        }

        if !track {
            continue;
        }

        match session.arena.get(new_child).alternate {
            Some(alt) => {
                let old_index = session.arena.get(alt).index;
                if old_index < last_placed_index {
                    // Reused, but now needs to move later in the order.
                    session.arena.get_mut(new_child).flags |= Flags::PLACEMENT;
                } else {
                    last_placed_index = old_index;
                }
            }
            None => {
                // Fresh node: plain insertion.
                session.arena.get_mut(new_child).flags |= Flags::PLACEMENT;
            }
        }
    }

    // Anything not consumed from the map has no counterpart anymore.
    let leftover: Vec<NodeKey> = existing.into_values().collect();
    for stale in leftover {
        delete_child(session, parent, stale, track);
    }

    first_new
}

/// Reuse-or-create one entry of the new child list.
fn update_from_map(
    session: &mut Session,
    existing: &mut HashMap<MapKey, NodeKey>,
    index: u32,
    element: &Element,
) -> Option<NodeKey> {
    let map_key = match element.key() {
        Some(key) => MapKey::Key(key.clone()),
        None => MapKey::Index(index),
    };
    let before = existing.get(&map_key).copied();

    if let Element::Fragment(f) = element {
        return Some(update_fragment(
            session,
            before,
            f.children.clone(),
            f.key.clone(),
            &map_key,
            existing,
        ));
    }

    if let Some(before) = before {
        if element_matches_kind(session, before, element) {
            existing.remove(&map_key);
            let reused = use_node(session, before, element_pending_props(element));
            apply_element_ref(session, reused, element);
            return Some(reused);
        }
    }
    Some(session.arena.node_from_element(element))
}

fn update_fragment(
    session: &mut Session,
    before: Option<NodeKey>,
    children: Vec<Element>,
    key: Option<Key>,
    map_key: &MapKey,
    existing: &mut HashMap<MapKey, NodeKey>,
) -> NodeKey {
    match before {
        Some(b) if matches!(session.arena.get(b).kind, NodeKind::Fragment) => {
            existing.remove(map_key);
            use_node(session, b, NodeProps::Children(children))
        }
        _ => session.arena.node_from_fragment(children, key),
    }
}
