//! Begin-work: the top-down half of a tree-walk visit.
//!
//! Dispatched exhaustively on the node kind. Each arm computes the node's
//! next children description and hands it to the diff, returning the first
//! child to descend into (or `None` to start completing). Function units
//! are the one arm that can suspend, which surfaces as the `Err` of the
//! returned result.

use crate::element::{Element, NodeRef};
use crate::engine::node::{Flags, MemoizedState, NodeKind, NodeProps, OffscreenMode};
use crate::engine::NodeKey;
use crate::pipeline::root::Session;
use crate::render::context::ContextId;
use crate::render::diff::reconcile_children;
use crate::render::hooks::render_with_hooks;
use crate::render::suspense::Suspend;
use crate::schedule::Lanes;

pub(crate) fn begin_work(
    session: &mut Session,
    wip: NodeKey,
    render_lanes: Lanes,
) -> Result<Option<NodeKey>, Suspend> {
    let kind = session.arena.get(wip).kind.clone();
    match kind {
        NodeKind::Root => Ok(update_root(session, wip, render_lanes)),
        NodeKind::Host(_) => Ok(update_host(session, wip)),
        NodeKind::Text => Ok(None),
        NodeKind::Function(_) => update_function(session, wip, render_lanes),
        NodeKind::Fragment => Ok(update_fragment(session, wip)),
        NodeKind::Provider(id) => Ok(update_provider(session, wip, id)),
        NodeKind::Suspense => Ok(update_suspense(session, wip)),
        NodeKind::Offscreen => Ok(update_offscreen(session, wip)),
    }
}

// =============================================================================
// Simple kinds
// =============================================================================

/// The root consumes its update queue; the processed element becomes its
/// memoized state and its single child description.
fn update_root(session: &mut Session, wip: NodeKey, render_lanes: Lanes) -> Option<NodeKey> {
    let Some(queue) = session.arena.get(wip).update_queue.clone() else {
        if cfg!(debug_assertions) {
            log::error!("root node has no update queue");
        }
        return None;
    };
    let next = queue.process(render_lanes);
    session.arena.get_mut(wip).memoized_state = MemoizedState::Element(next.clone());
    if let Some(alt) = session.arena.get(wip).alternate {
        // Keep the committed side in sync so an interrupted-and-restarted
        // pass starts from the same processed element.
        session.arena.get_mut(alt).memoized_state = MemoizedState::Element(next.clone());
    }

    match &next {
        Some(element) => reconcile_children(session, wip, std::slice::from_ref(element)),
        None => reconcile_children(session, wip, &[]),
    }
    session.arena.get(wip).child
}

fn update_host(session: &mut Session, wip: NodeKey) -> Option<NodeKey> {
    let children = match &session.arena.get(wip).pending_props {
        NodeProps::Host { children, .. } => children.clone(),
        _ => Vec::new(),
    };
    mark_ref(session, wip);
    reconcile_children(session, wip, &children);
    session.arena.get(wip).child
}

fn update_function(
    session: &mut Session,
    wip: NodeKey,
    render_lanes: Lanes,
) -> Result<Option<NodeKey>, Suspend> {
    let element = render_with_hooks(session, wip, render_lanes)?;
    reconcile_children(session, wip, std::slice::from_ref(&element));
    Ok(session.arena.get(wip).child)
}

fn update_fragment(session: &mut Session, wip: NodeKey) -> Option<NodeKey> {
    let children = match &session.arena.get(wip).pending_props {
        NodeProps::Children(children) => children.clone(),
        _ => Vec::new(),
    };
    reconcile_children(session, wip, &children);
    session.arena.get(wip).child
}

fn update_provider(session: &mut Session, wip: NodeKey, id: ContextId) -> Option<NodeKey> {
    let (value, children) = match &session.arena.get(wip).pending_props {
        NodeProps::Provider { value, children } => (value.clone(), children.clone()),
        _ => return None,
    };
    session.contexts.push(id, value);
    reconcile_children(session, wip, &children);
    session.arena.get(wip).child
}

fn update_offscreen(session: &mut Session, wip: NodeKey) -> Option<NodeKey> {
    let (mode, children) = match &session.arena.get(wip).pending_props {
        NodeProps::Offscreen { mode, children } => (*mode, children.clone()),
        _ => return None,
    };
    mark_visibility(session, wip, mode);
    reconcile_children(session, wip, &children);
    session.arena.get(wip).child
}

// =============================================================================
// Suspense
// =============================================================================

/// A suspense boundary renders its primary subtree inside an offscreen
/// container, plus a visible fallback sibling while captured. Which arm
/// runs depends on whether the boundary captured a suspension this pass
/// (the capture flag is set during unwind) and whether it is mounting.
fn update_suspense(session: &mut Session, wip: NodeKey) -> Option<NodeKey> {
    session.work.suspense_stack.push(wip);

    let show_fallback = session.arena.get(wip).flags.contains(Flags::DID_CAPTURE);
    if show_fallback {
        session.arena.get_mut(wip).flags -= Flags::DID_CAPTURE;
    }

    let (children, fallback) = match &session.arena.get(wip).pending_props {
        NodeProps::Suspense { children, fallback } => (children.clone(), fallback.clone()),
        _ => (Vec::new(), Vec::new()),
    };

    let current_primary = session
        .arena
        .get(wip)
        .alternate
        .and_then(|cur| session.arena.get(cur).child);

    match (current_primary, show_fallback) {
        (None, false) => Some(mount_suspense_primary(session, wip, children)),
        (None, true) => Some(mount_suspense_fallback(session, wip, children, fallback)),
        (Some(primary), false) => Some(update_suspense_primary(session, wip, primary, children)),
        (Some(primary), true) => Some(update_suspense_fallback(
            session, wip, primary, children, fallback,
        )),
    }
}

fn mount_suspense_primary(
    session: &mut Session,
    wip: NodeKey,
    children: Vec<Element>,
) -> NodeKey {
    let primary = session
        .arena
        .node_from_offscreen(OffscreenMode::Visible, children);
    session.arena.get_mut(primary).parent = Some(wip);
    session.arena.get_mut(wip).child = Some(primary);
    primary
}

fn mount_suspense_fallback(
    session: &mut Session,
    wip: NodeKey,
    children: Vec<Element>,
    fallback: Vec<Element>,
) -> NodeKey {
    // A primary subtree begun earlier this pass never completed; its fresh
    // nodes would otherwise be stranded in the arena.
    if let Some(stale) = session.arena.get(wip).child {
        if session.arena.get(stale).alternate.is_none() {
            session.arena.free_subtree(stale);
        }
    }

    let primary = session
        .arena
        .node_from_offscreen(OffscreenMode::Hidden, children);
    let fallback = session.arena.node_from_fragment(fallback, None);
    session.arena.get_mut(fallback).flags |= Flags::PLACEMENT;

    link_suspense_children(session, wip, primary, Some(fallback));
    fallback
}

fn update_suspense_primary(
    session: &mut Session,
    wip: NodeKey,
    current_primary: NodeKey,
    children: Vec<Element>,
) -> NodeKey {
    let current_fallback = session.arena.get(current_primary).sibling;

    let primary = session.arena.create_work_in_progress(
        current_primary,
        NodeProps::Offscreen {
            mode: OffscreenMode::Visible,
            children,
        },
    );
    mark_visibility(session, primary, OffscreenMode::Visible);
    link_suspense_children(session, wip, primary, None);

    // Leaving fallback display: the fallback subtree goes away exactly once.
    if let Some(fallback) = current_fallback {
        let node = session.arena.get_mut(wip);
        node.deletions.push(fallback);
        node.flags |= Flags::CHILD_DELETION;
    }
    primary
}

fn update_suspense_fallback(
    session: &mut Session,
    wip: NodeKey,
    current_primary: NodeKey,
    children: Vec<Element>,
    fallback: Vec<Element>,
) -> NodeKey {
    let current_fallback = session.arena.get(current_primary).sibling;

    let primary = session.arena.create_work_in_progress(
        current_primary,
        NodeProps::Offscreen {
            mode: OffscreenMode::Hidden,
            children,
        },
    );
    mark_visibility(session, primary, OffscreenMode::Hidden);

    let fallback = match current_fallback {
        Some(cur) => session
            .arena
            .create_work_in_progress(cur, NodeProps::Children(fallback)),
        None => {
            let fresh = session.arena.node_from_fragment(fallback, None);
            session.arena.get_mut(fresh).flags |= Flags::PLACEMENT;
            fresh
        }
    };

    link_suspense_children(session, wip, primary, Some(fallback));
    fallback
}

fn link_suspense_children(
    session: &mut Session,
    wip: NodeKey,
    primary: NodeKey,
    fallback: Option<NodeKey>,
) {
    {
        let node = session.arena.get_mut(primary);
        node.parent = Some(wip);
        node.sibling = fallback;
        node.index = 0;
    }
    if let Some(fb) = fallback {
        let node = session.arena.get_mut(fb);
        node.parent = Some(wip);
        node.sibling = None;
        node.index = 1;
    }
    session.arena.get_mut(wip).child = Some(primary);
}

// =============================================================================
// Flag marking
// =============================================================================

/// Raise the ref flag when a binding appears or changes identity.
fn mark_ref(session: &mut Session, wip: NodeKey) {
    let current = session.arena.get(wip).alternate;
    let new_ref = session.arena.get(wip).node_ref.clone();
    let changed = match current {
        None => new_ref.is_some(),
        Some(cur) => {
            let old_ref = session.arena.get(cur).node_ref.clone();
            !refs_equal(&old_ref, &new_ref)
        }
    };
    if changed {
        session.arena.get_mut(wip).flags |= Flags::REF;
    }
}

/// Raise the visibility flag when an offscreen container's committed mode
/// differs from the mode it is rendering with.
fn mark_visibility(session: &mut Session, offscreen: NodeKey, mode: OffscreenMode) {
    let Some(alt) = session.arena.get(offscreen).alternate else {
        return;
    };
    let old_mode = match session.arena.get(alt).memoized_props {
        Some(NodeProps::Offscreen { mode, .. }) => mode,
        _ => OffscreenMode::Visible,
    };
    if old_mode != mode {
        session.arena.get_mut(offscreen).flags |= Flags::VISIBILITY;
    }
}

pub(crate) fn refs_equal(a: &Option<NodeRef>, b: &Option<NodeRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => std::rc::Rc::ptr_eq(a, b),
        _ => false,
    }
}
