//! Complete-work: the bottom-up half of a tree-walk visit.
//!
//! Runs once a node's children are fully processed. Host kinds materialize
//! their instance on first pass (folding already-completed host descendants
//! in) or diff their committed props against the pending ones on later
//! passes. Stack-discipline kinds pop what their begin pushed. Every kind
//! finishes by bubbling its effect flags into the parent-visible subtree
//! bitset, which is what lets commit skip effect-free subtrees.

use crate::engine::node::{Flags, NodeKind, NodeProps};
use crate::engine::NodeKey;
use crate::host::InstanceId;
use crate::pipeline::root::Session;
use crate::render::begin::refs_equal;

pub(crate) fn complete_work(session: &mut Session, wip: NodeKey) {
    let kind = session.arena.get(wip).kind.clone();
    match kind {
        NodeKind::Host(tag) => {
            complete_host(session, wip, &tag);
            bubble_properties(session, wip);
        }
        NodeKind::Text => {
            complete_text(session, wip);
            bubble_properties(session, wip);
        }
        NodeKind::Provider(id) => {
            session.contexts.pop(id);
            bubble_properties(session, wip);
        }
        NodeKind::Suspense => {
            session.work.suspense_stack.pop();
            bubble_properties(session, wip);
        }
        NodeKind::Root | NodeKind::Function(_) | NodeKind::Fragment | NodeKind::Offscreen => {
            bubble_properties(session, wip);
        }
    }
}

// =============================================================================
// Host kinds
// =============================================================================

fn complete_host(session: &mut Session, wip: NodeKey, tag: &str) {
    let node = session.arena.get(wip);
    let alternate = node.alternate;
    let instance = node.instance;

    match (alternate, instance) {
        (Some(alt), Some(_)) => {
            // Update pass: raise flags only when something observable changed.
            let new_attrs = match &session.arena.get(wip).pending_props {
                NodeProps::Host { attrs, .. } => attrs.clone(),
                _ => Default::default(),
            };
            let old_attrs = match &session.arena.get(alt).memoized_props {
                Some(NodeProps::Host { attrs, .. }) => attrs.clone(),
                _ => Default::default(),
            };
            if old_attrs != new_attrs {
                session.arena.get_mut(wip).flags |= Flags::UPDATE;
            }

            let old_ref = session.arena.get(alt).node_ref.clone();
            let new_ref = session.arena.get(wip).node_ref.clone();
            if !refs_equal(&old_ref, &new_ref) {
                session.arena.get_mut(wip).flags |= Flags::REF;
            }
        }
        _ => {
            // First pass: build the instance and fold completed host
            // descendants into it, so the parent attaches one subtree.
            let attrs = match &session.arena.get(wip).pending_props {
                NodeProps::Host { attrs, .. } => attrs.clone(),
                _ => Default::default(),
            };
            let instance = session.host.create_instance(tag, &attrs);
            append_all_children(session, instance, wip);
            let node = session.arena.get_mut(wip);
            node.instance = Some(instance);
            if node.node_ref.is_some() {
                node.flags |= Flags::REF;
            }
        }
    }
}

fn complete_text(session: &mut Session, wip: NodeKey) {
    let node = session.arena.get(wip);
    let content = match &node.pending_props {
        NodeProps::Text(content) => content.clone(),
        _ => String::new(),
    };

    match (node.alternate, node.instance) {
        (Some(alt), Some(_)) => {
            let old_content = match &session.arena.get(alt).memoized_props {
                Some(NodeProps::Text(content)) => content.clone(),
                _ => String::new(),
            };
            if old_content != content {
                session.arena.get_mut(wip).flags |= Flags::UPDATE;
            }
        }
        _ => {
            let instance = session.host.create_text_instance(&content);
            session.arena.get_mut(wip).instance = Some(instance);
        }
    }
}

/// Append every completed host descendant of `wip` into `parent`, without
/// descending through host boundaries (a nested host already contains its
/// own children).
fn append_all_children(session: &mut Session, parent: InstanceId, wip: NodeKey) {
    let mut node = match session.arena.get(wip).child {
        Some(first) => first,
        None => return,
    };

    loop {
        let (is_host, instance, child) = {
            let n = session.arena.get(node);
            (
                matches!(n.kind, NodeKind::Host(_) | NodeKind::Text),
                n.instance,
                n.child,
            )
        };

        if is_host {
            if let Some(instance) = instance {
                session.host.append_initial_child(parent, instance);
            }
        } else if let Some(child) = child {
            node = child;
            continue;
        }

        if node == wip {
            return;
        }
        while session.arena.get(node).sibling.is_none() {
            match session.arena.get(node).parent {
                None => return,
                Some(p) if p == wip => return,
                Some(p) => node = p,
            }
        }
        let sibling = session.arena.get(node).sibling;
        node = match sibling {
            Some(s) => s,
            None => return,
        };
    }
}

// =============================================================================
// Flag propagation
// =============================================================================

/// Union the children's own and subtree flags into this node's subtree
/// bitset, re-anchoring child parent pointers on the way.
fn bubble_properties(session: &mut Session, wip: NodeKey) {
    let mut subtree = Flags::empty();
    let mut child = session.arena.get(wip).child;
    while let Some(c) = child {
        let node = session.arena.get_mut(c);
        subtree |= node.subtree_flags | node.flags;
        node.parent = Some(wip);
        child = node.sibling;
    }
    session.arena.get_mut(wip).subtree_flags |= subtree;
}
