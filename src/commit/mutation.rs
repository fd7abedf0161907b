//! Mutation and layout visitors.
//!
//! Per-node handlers invoked by the commit walks. Placement computes the
//! host insertion point (nearest stable, completed host sibling, else
//! append), deletion detaches whole host subtrees while unbinding refs and
//! collecting effect teardowns, and visibility toggles the nearest host
//! descendants without unmounting them.

use crate::engine::node::{Flags, NodeKind, NodeProps, OffscreenMode};
use crate::engine::NodeKey;
use crate::host::InstanceId;
use crate::pipeline::root::Session;

use super::passive::{collect_passive_effects, PassiveKind};

// =============================================================================
// Mutation
// =============================================================================

pub(crate) fn commit_mutation_on_node(s: &mut Session, node: NodeKey) {
    let flags = s.arena.get(node).flags;

    if flags.contains(Flags::PLACEMENT) {
        commit_placement(s, node);
        s.arena.get_mut(node).flags -= Flags::PLACEMENT;
    }

    if flags.contains(Flags::UPDATE) {
        commit_update(s, node);
        s.arena.get_mut(node).flags -= Flags::UPDATE;
    }

    if flags.contains(Flags::CHILD_DELETION) {
        let deletions = std::mem::take(&mut s.arena.get_mut(node).deletions);
        for child in deletions {
            commit_deletion(s, child);
        }
        s.arena.get_mut(node).flags -= Flags::CHILD_DELETION;
    }

    if flags.contains(Flags::PASSIVE_EFFECT) {
        collect_passive_effects(s, node, PassiveKind::Update);
        s.arena.get_mut(node).flags -= Flags::PASSIVE_EFFECT;
    }

    // Unbind the previous ref; layout rebinds the new one.
    if flags.contains(Flags::REF) && matches!(s.arena.get(node).kind, NodeKind::Host(_)) {
        let old_ref = s
            .arena
            .get(node)
            .alternate
            .and_then(|alt| s.arena.get(alt).node_ref.clone());
        if let Some(old_ref) = old_ref {
            *old_ref.borrow_mut() = None;
        }
    }

    if flags.contains(Flags::VISIBILITY) && matches!(s.arena.get(node).kind, NodeKind::Offscreen) {
        let hidden = matches!(
            s.arena.get(node).pending_props,
            NodeProps::Offscreen {
                mode: OffscreenMode::Hidden,
                ..
            }
        );
        hide_or_unhide_all_children(s, node, hidden);
        s.arena.get_mut(node).flags -= Flags::VISIBILITY;
    }
}

// =============================================================================
// Layout
// =============================================================================

pub(crate) fn commit_layout_on_node(s: &mut Session, node: NodeKey) {
    let flags = s.arena.get(node).flags;
    if flags.contains(Flags::REF) && matches!(s.arena.get(node).kind, NodeKind::Host(_)) {
        let n = s.arena.get(node);
        if let (Some(node_ref), instance) = (n.node_ref.clone(), n.instance) {
            *node_ref.borrow_mut() = instance;
        }
        s.arena.get_mut(node).flags -= Flags::REF;
    }
}

// =============================================================================
// Placement
// =============================================================================

fn commit_placement(s: &mut Session, node: NodeKey) {
    let Some(host_parent) = host_parent_of(s, node) else {
        return;
    };
    let before = host_sibling_of(s, node);
    insert_or_append_into_container(s, node, host_parent, before);
}

/// The nearest host container above `node`: an ancestor host instance, or
/// the root's container.
fn host_parent_of(s: &mut Session, node: NodeKey) -> Option<InstanceId> {
    let mut parent = s.arena.get(node).parent;
    while let Some(p) = parent {
        match &s.arena.get(p).kind {
            NodeKind::Host(_) => return s.arena.get(p).instance,
            NodeKind::Root => return Some(s.root.container),
            _ => parent = s.arena.get(p).parent,
        }
    }
    if cfg!(debug_assertions) {
        log::error!("placement target has no host parent");
    }
    None
}

/// The host instance `node` must be inserted before: the nearest completed,
/// non-moving host descendant of a following sibling. `None` means append.
fn host_sibling_of(s: &mut Session, node: NodeKey) -> Option<InstanceId> {
    let mut node = node;
    'find: loop {
        while s.arena.get(node).sibling.is_none() {
            let parent = s.arena.get(node).parent;
            match parent {
                None => return None,
                Some(p) => {
                    if matches!(s.arena.get(p).kind, NodeKind::Host(_) | NodeKind::Root) {
                        return None;
                    }
                    node = p;
                }
            }
        }
        match s.arena.get(node).sibling {
            Some(sibling) => node = sibling,
            None => return None,
        }

        while !matches!(s.arena.get(node).kind, NodeKind::Host(_) | NodeKind::Text) {
            // A node that is itself moving cannot anchor an insertion.
            if s.arena.get(node).flags.contains(Flags::PLACEMENT) {
                continue 'find;
            }
            match s.arena.get(node).child {
                None => continue 'find,
                Some(child) => node = child,
            }
        }

        if !s.arena.get(node).flags.contains(Flags::PLACEMENT) {
            return s.arena.get(node).instance;
        }
    }
}

/// Attach `node`'s host subtree roots into `container`, before `before` if
/// given.
fn insert_or_append_into_container(
    s: &mut Session,
    node: NodeKey,
    container: InstanceId,
    before: Option<InstanceId>,
) {
    let n = s.arena.get(node);
    if matches!(n.kind, NodeKind::Host(_) | NodeKind::Text) {
        if let Some(instance) = n.instance {
            match before {
                Some(before) => s.host.insert_child_to_container(instance, container, before),
                None => s.host.append_child_to_container(container, instance),
            }
        }
        return;
    }

    let mut child = n.child;
    while let Some(c) = child {
        insert_or_append_into_container(s, c, container, before);
        child = s.arena.get(c).sibling;
    }
}

// =============================================================================
// Updates
// =============================================================================

fn commit_update(s: &mut Session, node: NodeKey) {
    let kind_is_text = matches!(s.arena.get(node).kind, NodeKind::Text);
    let instance = s.arena.get(node).instance;
    let Some(instance) = instance else { return };

    if kind_is_text {
        let content = match &s.arena.get(node).pending_props {
            NodeProps::Text(content) => content.clone(),
            _ => String::new(),
        };
        s.host.commit_text_update(instance, &content);
    } else {
        let attrs = match &s.arena.get(node).pending_props {
            NodeProps::Host { attrs, .. } => attrs.clone(),
            _ => Default::default(),
        };
        s.host.commit_update(instance, &attrs);
    }
}

// =============================================================================
// Deletion
// =============================================================================

/// Unmount a staged subtree: collect its top-level host roots, unbind refs
/// and collect effect teardowns along the way, detach the host roots, then
/// free the nodes.
fn commit_deletion(s: &mut Session, subtree: NodeKey) {
    let mut host_roots: Vec<NodeKey> = Vec::new();

    // Depth-first over the whole deleted subtree.
    let mut node = subtree;
    'walk: loop {
        on_unmount(s, node, &mut host_roots);

        if let Some(child) = s.arena.get(node).child {
            node = child;
            continue;
        }
        if node == subtree {
            break;
        }
        while s.arena.get(node).sibling.is_none() {
            match s.arena.get(node).parent {
                None => break 'walk,
                Some(p) if p == subtree => break 'walk,
                Some(p) => node = p,
            }
        }
        match s.arena.get(node).sibling {
            Some(sibling) => node = sibling,
            None => break,
        }
    }

    if !host_roots.is_empty() {
        if let Some(host_parent) = host_parent_of(s, subtree) {
            for root in &host_roots {
                if let Some(instance) = s.arena.get(*root).instance {
                    s.host.remove_child(instance, host_parent);
                }
            }
        }
    }

    s.arena.get_mut(subtree).parent = None;
    s.arena.free_subtree(subtree);
}

fn on_unmount(s: &mut Session, node: NodeKey, host_roots: &mut Vec<NodeKey>) {
    match &s.arena.get(node).kind {
        NodeKind::Host(_) => {
            record_host_root(s, host_roots, node);
            if let Some(node_ref) = s.arena.get(node).node_ref.clone() {
                *node_ref.borrow_mut() = None;
            }
        }
        NodeKind::Text => record_host_root(s, host_roots, node),
        NodeKind::Function(_) => collect_passive_effects(s, node, PassiveKind::Unmount),
        NodeKind::Root
        | NodeKind::Fragment
        | NodeKind::Provider(_)
        | NodeKind::Suspense
        | NodeKind::Offscreen => {}
    }
}

/// Keep only subtree-root host nodes: the first host found, plus hosts that
/// are siblings of an already recorded root (several top-level hosts under
/// one deleted fragment). Hosts nested inside a recorded root are implied
/// by removing their ancestor.
fn record_host_root(s: &Session, list: &mut Vec<NodeKey>, unmounting: NodeKey) {
    match list.last() {
        None => list.push(unmounting),
        Some(&last) => {
            let mut node = s.arena.get(last).sibling;
            while let Some(n) = node {
                if n == unmounting {
                    list.push(unmounting);
                    break;
                }
                node = s.arena.get(n).sibling;
            }
        }
    }
}

// =============================================================================
// Visibility
// =============================================================================

/// Toggle display of the nearest host descendants of an offscreen
/// container, skipping nested hidden containers.
fn hide_or_unhide_all_children(s: &mut Session, finished: NodeKey, hidden: bool) {
    let mut node = finished;
    let mut host_subtree_root: Option<NodeKey> = None;

    loop {
        let (is_host, is_text, is_hidden_offscreen, instance, child) = {
            let n = s.arena.get(node);
            (
                matches!(n.kind, NodeKind::Host(_)),
                matches!(n.kind, NodeKind::Text),
                matches!(n.kind, NodeKind::Offscreen)
                    && node != finished
                    && matches!(
                        n.pending_props,
                        NodeProps::Offscreen {
                            mode: OffscreenMode::Hidden,
                            ..
                        }
                    ),
                n.instance,
                n.child,
            )
        };

        if is_host {
            if host_subtree_root.is_none() {
                host_subtree_root = Some(node);
                if let Some(instance) = instance {
                    if hidden {
                        s.host.hide_instance(instance);
                    } else {
                        s.host.unhide_instance(instance);
                    }
                }
            }
        } else if is_text {
            if host_subtree_root.is_none() {
                if let Some(instance) = instance {
                    if hidden {
                        s.host.hide_text_instance(instance);
                    } else {
                        let content = match &s.arena.get(node).memoized_props {
                            Some(NodeProps::Text(content)) => content.clone(),
                            _ => String::new(),
                        };
                        s.host.unhide_text_instance(instance, &content);
                    }
                }
            }
        } else if is_hidden_offscreen {
            // Already hidden on its own; leave it alone.
        } else if let Some(child) = child {
            node = child;
            continue;
        }

        if node == finished {
            return;
        }
        while s.arena.get(node).sibling.is_none() {
            let parent = s.arena.get(node).parent;
            match parent {
                None => return,
                Some(p) if p == finished => return,
                Some(p) => {
                    if host_subtree_root == Some(node) {
                        host_subtree_root = None;
                    }
                    node = p;
                }
            }
        }
        if host_subtree_root == Some(node) {
            host_subtree_root = None;
        }
        match s.arena.get(node).sibling {
            Some(sibling) => node = sibling,
            None => return,
        }
    }
}
