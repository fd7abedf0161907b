//! The work loop and its scheduler integration.
//!
//! An update anywhere in the tree merges its lane into the root's pending
//! set and asks for the root to be scheduled. Scheduling picks the most
//! urgent schedulable lane, cancels a superseded callback if a different
//! priority now leads, and runs the pass either synchronously (sync lane,
//! flushed at microtask timing, never yielding) or as a yieldable callback
//! on the external scheduler (any other lane).
//!
//! A pass walks the tree one unit of work at a time: begin-work descends,
//! complete-work walks back up through siblings and ancestors. The
//! concurrent loop checks the scheduler's yield signal before each unit and
//! parks the walk (`InComplete`) to be resumed by a continuation; a pass at
//! a different lane than the parked one discards and restarts instead. A
//! suspension unwinds to the nearest boundary and continues from there, or
//! marks the whole root suspended when there is none.

use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::node::NodeKind;
use crate::engine::NodeKey;
use crate::pipeline::root::{Session, SuspendedReason};
use crate::render::begin::begin_work;
use crate::render::complete::complete_work;
use crate::render::suspense::{unwind_work, Suspend};
use crate::schedule::{lanes_to_scheduler_priority, Continuation, Lane, Lanes};

/// How a render pass exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RootExitStatus {
    /// Yielded with work remaining; a continuation resumes it.
    InComplete,
    /// The work-in-progress tree is finished and ready to commit.
    Completed,
    /// Unwound past the root with no boundary; nothing to commit.
    DidNotComplete,
}

// =============================================================================
// Scheduling entry points
// =============================================================================

/// Record an update originating at `node` and make sure the root will
/// render it.
pub(crate) fn schedule_update_on_node(
    session: &Rc<RefCell<Session>>,
    node: NodeKey,
    lane: Lane,
) {
    {
        let mut s = session.borrow_mut();
        if !reaches_root(&s, node) {
            log::warn!("update scheduled on a detached node; ignoring");
            return;
        }
        s.root.lanes.mark_updated(lane);
    }
    ensure_root_is_scheduled(session);
}

/// Walk from `node` up its parent chain; an attached node ends at a
/// root-kind anchor.
fn reaches_root(session: &Session, node: NodeKey) -> bool {
    if !session.arena.contains(node) {
        return false;
    }
    let mut cursor = node;
    loop {
        let n = session.arena.get(cursor);
        match n.parent {
            Some(parent) if session.arena.contains(parent) => cursor = parent,
            Some(_) => return false,
            None => return matches!(n.kind, NodeKind::Root),
        }
    }
}

/// Reconcile the root's one tracked callback with its most urgent
/// schedulable lane.
pub(crate) fn ensure_root_is_scheduled(session: &Rc<RefCell<Session>>) {
    let mut s = session.borrow_mut();
    let next = s.root.lanes.next_lane();

    if next.is_empty() {
        if let Some(token) = s.root.callback.take() {
            s.scheduler.cancel_callback(token);
        }
        s.root.callback_priority = Lanes::empty();
        return;
    }

    // Same priority already scheduled: a time-slice continuation, not a
    // preemption. Leave it alone.
    if next == s.root.callback_priority {
        return;
    }

    if let Some(token) = s.root.callback.take() {
        s.scheduler.cancel_callback(token);
    }

    if cfg!(debug_assertions) {
        log::debug!("scheduling root at lane {next:?}");
    }

    if next == Lanes::SYNC {
        s.sync_queue
            .schedule(Box::new(|rc| perform_sync_work_on_root(rc)));
        let weak = s.me.clone();
        s.host.schedule_microtask(Box::new(move || {
            if let Some(rc) = weak.upgrade() {
                flush_sync_callbacks(&rc);
            }
        }));
    } else {
        let priority = lanes_to_scheduler_priority(next);
        let weak = s.me.clone();
        let token = s.scheduler.schedule_callback(
            priority,
            Continuation::new(move |did_timeout| {
                weak.upgrade()
                    .and_then(|rc| perform_concurrent_work_on_root(&rc, did_timeout))
            }),
        );
        s.root.callback = Some(token);
    }
    s.root.callback_priority = next;
}

/// Drain the synchronous queue, including work queued mid-flush.
pub(crate) fn flush_sync_callbacks(session: &Rc<RefCell<Session>>) {
    {
        let mut s = session.borrow_mut();
        if s.sync_queue.flushing {
            return;
        }
        s.sync_queue.flushing = true;
    }
    loop {
        let callbacks = session.borrow_mut().sync_queue.take();
        if callbacks.is_empty() {
            break;
        }
        for callback in callbacks {
            callback(session);
        }
    }
    session.borrow_mut().sync_queue.flushing = false;
}

// =============================================================================
// Pass drivers
// =============================================================================

/// Synchronous-lane pass: renders to completion in one go, then commits.
pub(crate) fn perform_sync_work_on_root(session: &Rc<RefCell<Session>>) {
    let next = session.borrow().root.lanes.next_lane();
    if next != Lanes::SYNC {
        // Batched-out or only lower-priority work left; reschedule it.
        ensure_root_is_scheduled(session);
        return;
    }

    match render_root(session, Lanes::SYNC, false) {
        RootExitStatus::Completed => {
            finish_render(session, Lanes::SYNC);
            crate::commit::commit_root(session);
        }
        RootExitStatus::DidNotComplete => {
            clear_in_flight(session);
            ensure_root_is_scheduled(session);
        }
        RootExitStatus::InComplete => {
            if cfg!(debug_assertions) {
                log::error!("synchronous pass reported an interrupt");
            }
        }
    }
}

/// Concurrent pass driver: flushes passive effects, renders a time slice,
/// and either commits or hands back a continuation.
pub(crate) fn perform_concurrent_work_on_root(
    session: &Rc<RefCell<Session>>,
    did_timeout: bool,
) -> Option<Continuation> {
    // Pending passive effects run before new render work; if running them
    // scheduled something more urgent, this task stands down.
    {
        let callback_before = session.borrow().root.callback;
        let did_flush = crate::commit::flush_passive_effects(session);
        if did_flush && session.borrow().root.callback != callback_before {
            return None;
        }
    }

    let lane = session.borrow().root.lanes.next_lane();
    if lane.is_empty() {
        return None;
    }
    let callback_at_entry = session.borrow().root.callback;

    // An overdue task stops yielding: starvation avoidance.
    let need_sync = lane == Lanes::SYNC || did_timeout;
    let exit = render_root(session, lane, !need_sync);

    ensure_root_is_scheduled(session);

    match exit {
        RootExitStatus::InComplete => {
            if session.borrow().root.callback != callback_at_entry {
                // A different priority took over; this task is stale.
                return None;
            }
            let weak = session.borrow().me.clone();
            Some(Continuation::new(move |did_timeout| {
                weak.upgrade()
                    .and_then(|rc| perform_concurrent_work_on_root(&rc, did_timeout))
            }))
        }
        RootExitStatus::Completed => {
            finish_render(session, lane);
            crate::commit::commit_root(session);
            None
        }
        RootExitStatus::DidNotComplete => {
            clear_in_flight(session);
            ensure_root_is_scheduled(session);
            None
        }
    }
}

fn finish_render(session: &Rc<RefCell<Session>>, lane: Lane) {
    let mut s = session.borrow_mut();
    let finished = s.arena.get(s.root.current).alternate;
    s.root.finished_work = finished;
    s.root.finished_lane = lane;
    s.work.wip_lanes = Lanes::empty();
}

fn clear_in_flight(session: &Rc<RefCell<Session>>) {
    let mut s = session.borrow_mut();
    s.work.wip = None;
    s.work.wip_lanes = Lanes::empty();
    drain_retry_pings(&mut s);
}

/// Re-enqueue lanes whose blocking data had already resolved by the time
/// the pass tried to wait on it.
pub(crate) fn drain_retry_pings(s: &mut Session) {
    for lane in std::mem::take(&mut s.work.retry_pings) {
        s.root.lanes.mark_pinged(lane);
        s.root.lanes.mark_updated(lane);
    }
}

// =============================================================================
// Render
// =============================================================================

/// Build (or continue building) the work-in-progress tree at `lane`.
pub(crate) fn render_root(
    session: &Rc<RefCell<Session>>,
    lane: Lane,
    should_time_slice: bool,
) -> RootExitStatus {
    if cfg!(debug_assertions) {
        log::debug!(
            "render pass at {lane:?} ({})",
            if should_time_slice { "sliced" } else { "sync" }
        );
    }

    {
        let mut s = session.borrow_mut();
        // A different lane than the parked pass: discard and restart.
        // The same lane resumes at the parked pointer.
        if s.work.wip_lanes != lane {
            prepare_fresh_stack(&mut s, lane);
        }
    }

    loop {
        let mut s = session.borrow_mut();

        // Consume a suspension captured by the previous loop iteration.
        if s.work.suspended_reason == SuspendedReason::OnData {
            s.work.suspended_reason = SuspendedReason::NotSuspended;
            match (s.work.wip, s.work.thrown.take()) {
                (Some(unit), Some(thrown)) => {
                    crate::render::suspense::throw_exception(&mut s, &thrown, lane);
                    throw_and_unwind(&mut s, unit, lane);
                }
                _ => {
                    s.work.thrown = None;
                }
            }
        }

        let outcome = if should_time_slice {
            work_loop_concurrent(&mut s)
        } else {
            work_loop_sync(&mut s)
        };
        match outcome {
            Ok(()) => break,
            Err(suspend) => {
                s.work.suspended_reason = SuspendedReason::OnData;
                s.work.thrown = Some(suspend);
            }
        }
    }

    let s = session.borrow();
    if s.work.did_not_complete {
        return RootExitStatus::DidNotComplete;
    }
    if should_time_slice && s.work.wip.is_some() {
        return RootExitStatus::InComplete;
    }
    if !should_time_slice && s.work.wip.is_some() && cfg!(debug_assertions) {
        log::error!("synchronous render pass ended with work remaining");
    }
    RootExitStatus::Completed
}

/// Reset the pass state and point the walk at a fresh clone of the root.
fn prepare_fresh_stack(s: &mut Session, lane: Lane) {
    s.root.finished_lane = Lanes::empty();
    s.root.finished_work = None;

    // Free fresh nodes of a discarded in-flight pass before rebuilding.
    if s.work.wip.is_some() {
        if let Some(old_wip_root) = s.arena.get(s.root.current).alternate {
            s.arena.free_discarded_pass(old_wip_root);
        }
    }

    let current = s.root.current;
    let wip_root = s.arena.create_work_in_progress(current, crate::engine::NodeProps::Root);
    s.work.wip = Some(wip_root);
    s.work.wip_lanes = lane;
    s.work.suspended_reason = SuspendedReason::NotSuspended;
    s.work.thrown = None;
    s.work.did_not_complete = false;
    s.work.suspense_stack.clear();
    s.contexts.clear();
}

fn work_loop_sync(s: &mut Session) -> Result<(), Suspend> {
    while let Some(wip) = s.work.wip {
        perform_unit_of_work(s, wip)?;
    }
    Ok(())
}

fn work_loop_concurrent(s: &mut Session) -> Result<(), Suspend> {
    while let Some(wip) = s.work.wip {
        if s.scheduler.should_yield() {
            break;
        }
        perform_unit_of_work(s, wip)?;
    }
    Ok(())
}

fn perform_unit_of_work(s: &mut Session, unit: NodeKey) -> Result<(), Suspend> {
    let render_lanes = s.work.wip_lanes;
    let next = begin_work(s, unit, render_lanes)?;
    let pending = s.arena.get(unit).pending_props.clone();
    s.arena.get_mut(unit).memoized_props = Some(pending);

    match next {
        Some(child) => s.work.wip = Some(child),
        None => complete_unit_of_work(s, unit),
    }
    Ok(())
}

fn complete_unit_of_work(s: &mut Session, from: NodeKey) {
    let mut node = Some(from);
    while let Some(k) = node {
        complete_work(s, k);
        if let Some(sibling) = s.arena.get(k).sibling {
            s.work.wip = Some(sibling);
            return;
        }
        node = s.arena.get(k).parent;
        s.work.wip = node;
    }
}

/// Unwind from a suspended unit toward its boundary, popping stack
/// disciplines on the way. With a boundary the walk re-enters it (now
/// marked captured, so it renders its fallback); without one the root
/// itself suspends and the pass is abandoned until a ping.
fn throw_and_unwind(s: &mut Session, unit: NodeKey, lane: Lane) {
    let mut cursor = Some(unit);
    while let Some(k) = cursor {
        if let Some(boundary) = unwind_work(s, k) {
            s.work.wip = Some(boundary);
            return;
        }
        cursor = s.arena.get(k).parent;
    }
    s.work.wip = None;
    s.work.did_not_complete = true;
    s.root.lanes.mark_suspended(lane);
}
