//! Commit phase.
//!
//! Applies the finished work-in-progress tree's effect flags to the host in
//! three ordered sub-phases:
//!
//! 1. **Mutation** — placements, content/prop patches, staged deletions,
//!    old-ref detachment, visibility toggles.
//! 2. **Buffer swap** — one pointer write makes the finished tree current;
//!    this is the atomic visible-update boundary.
//! 3. **Layout** — ref (re)attachment, now that host instances are final.
//!
//! Passive effects never run inside the commit; when the aggregated flags
//! call for them, a normal-priority callback is scheduled to flush them
//! (all destroys first, then all creates).
//!
//! Each walk descends only into subtrees whose aggregated flag bitset
//! intersects the phase mask, so effect-free regions are skipped whole.

pub(crate) mod mutation;
pub(crate) mod passive;

use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::node::Flags;
use crate::engine::NodeKey;
use crate::pipeline::root::Session;
use crate::pipeline::work_loop;
use crate::schedule::{Continuation, Lanes, SchedulerPriority};

pub(crate) use passive::flush_passive_effects;

/// Commit the root's finished work, if any.
pub(crate) fn commit_root(session: &Rc<RefCell<Session>>) {
    {
        let mut s = session.borrow_mut();
        let Some(finished) = s.root.finished_work.take() else {
            return;
        };
        if cfg!(debug_assertions) {
            log::debug!("commit at lane {:?}", s.root.finished_lane);
        }

        let lane = s.root.finished_lane;
        if lane.is_empty() && cfg!(debug_assertions) {
            log::error!("commit reached with no finished lane");
        }
        s.root.finished_lane = Lanes::empty();
        s.root.lanes.mark_finished(lane);

        // Schedule the passive flush before mutating, so effect-heavy
        // commits cannot miss it if mutation itself schedules work.
        let finished_node = s.arena.get(finished);
        let passive_bits =
            (finished_node.flags | finished_node.subtree_flags) & Flags::PASSIVE_MASK;
        if !passive_bits.is_empty() && !s.work.passive_scheduled {
            s.work.passive_scheduled = true;
            let weak = s.me.clone();
            s.scheduler.schedule_callback(
                SchedulerPriority::Normal,
                Continuation::new(move |_| {
                    if let Some(rc) = weak.upgrade() {
                        flush_passive_effects(&rc);
                    }
                    None
                }),
            );
        }

        let finished_node = s.arena.get(finished);
        let mask = Flags::MUTATION_MASK | Flags::PASSIVE_MASK;
        let has_effects = finished_node.flags.intersects(mask)
            || finished_node.subtree_flags.intersects(mask);

        if has_effects {
            commit_pass(
                &mut s,
                finished,
                Flags::MUTATION_MASK | Flags::PASSIVE_MASK,
                &mut mutation::commit_mutation_on_node,
            );
            // The single visible-update boundary.
            s.root.current = finished;
            commit_pass(
                &mut s,
                finished,
                Flags::LAYOUT_MASK,
                &mut mutation::commit_layout_on_node,
            );
        } else {
            s.root.current = finished;
        }

        s.work.passive_scheduled = false;
        work_loop::drain_retry_pings(&mut s);
    }
    work_loop::ensure_root_is_scheduled(session);
}

/// Depth-first effect walk: descend while the subtree bitset intersects
/// `mask`, otherwise visit the node and backtrack through siblings and
/// ancestors (visiting each on the way up).
fn commit_pass(
    s: &mut Session,
    finished: NodeKey,
    mask: Flags,
    visit: &mut dyn FnMut(&mut Session, NodeKey),
) {
    let mut next_effect = Some(finished);
    'outer: while let Some(current) = next_effect {
        let node = s.arena.get(current);
        let child = node.child;
        if node.subtree_flags.intersects(mask) && child.is_some() {
            next_effect = child;
            continue;
        }

        let mut node = Some(current);
        while let Some(n) = node {
            visit(s, n);
            if n == finished {
                break 'outer;
            }
            if let Some(sibling) = s.arena.get(n).sibling {
                next_effect = Some(sibling);
                continue 'outer;
            }
            node = s.arena.get(n).parent;
        }
        next_effect = None;
    }
}
