//! Passive effect collection and flushing.
//!
//! The mutation walk collects effect records off function units — the
//! update list from nodes flagged with a passive effect, the unmount list
//! from units inside deleted subtrees. The flush runs strictly later, at
//! normal priority, and in a fixed order: every unmount teardown, then
//! every update teardown, then every update create. A given effect's
//! teardown therefore always precedes its own re-create, and all teardowns
//! precede any create.

use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::node::{Flags, MemoizedState, NodeKind};
use crate::engine::NodeKey;
use crate::pipeline::root::Session;
use crate::render::hooks::{EffectTags, Hook};

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassiveKind {
    /// The unit is unmounting; only teardowns will run.
    Unmount,
    /// The unit updated with changed effect dependencies.
    Update,
}

/// Collect a function unit's effect records into the pending lists.
pub(crate) fn collect_passive_effects(s: &mut Session, node: NodeKey, kind: PassiveKind) {
    if !matches!(s.arena.get(node).kind, NodeKind::Function(_)) {
        return;
    }
    if kind == PassiveKind::Update && !s.arena.get(node).flags.contains(Flags::PASSIVE_EFFECT) {
        return;
    }

    let records: Vec<_> = match &s.arena.get(node).memoized_state {
        MemoizedState::Hooks(hooks) => hooks
            .iter()
            .filter_map(|hook| match hook {
                Hook::Effect(record) => Some(record.clone()),
                _ => None,
            })
            .collect(),
        _ => {
            if kind == PassiveKind::Update && cfg!(debug_assertions) {
                log::error!("passive effect flagged on a unit with no hook chain");
            }
            return;
        }
    };

    match kind {
        PassiveKind::Unmount => s.passive.unmount.extend(records),
        PassiveKind::Update => s.passive.update.extend(records),
    }
}

/// Run every pending passive effect. Returns whether anything ran.
///
/// User callbacks run with the session released, so they can dispatch
/// updates; any synchronous work they queued is flushed at the end.
pub(crate) fn flush_passive_effects(session: &Rc<RefCell<Session>>) -> bool {
    let (unmount, update) = {
        let mut s = session.borrow_mut();
        (
            std::mem::take(&mut s.passive.unmount),
            std::mem::take(&mut s.passive.update),
        )
    };

    let mut did_flush = false;

    // Unmounting units: teardown only, and the record is spent.
    for record in &unmount {
        if record.tag.get().contains(EffectTags::PASSIVE) {
            did_flush = true;
            if let Some(destroy) = record.destroy.borrow_mut().take() {
                destroy();
            }
            record.tag.set(record.tag.get() - EffectTags::HAS_EFFECT);
        }
    }

    // Updated units: every teardown before any create.
    let live = EffectTags::PASSIVE | EffectTags::HAS_EFFECT;
    for record in &update {
        if record.tag.get().contains(live) {
            did_flush = true;
            if let Some(destroy) = record.destroy.borrow_mut().take() {
                destroy();
            }
        }
    }
    for record in &update {
        if record.tag.get().contains(live) {
            did_flush = true;
            let cleanup = (record.create)();
            *record.destroy.borrow_mut() = cleanup;
        }
    }

    crate::pipeline::work_loop::flush_sync_callbacks(session);
    did_flush
}
