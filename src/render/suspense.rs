//! Data-dependency suspension.
//!
//! A render that cannot proceed without external data returns
//! `Err(Suspend)` carrying a [`Wakeable`] — a resolve-once cell the data
//! source completes later. The work loop treats the `Err` as an unwind
//! trigger: the nearest suspense boundary captures and shows its fallback,
//! and a ping listener on the wakeable re-enqueues the affected lane once
//! the data arrives.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::node::Flags;
use crate::engine::NodeKey;

static NEXT_WAKEABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one wakeable, used to deduplicate ping listeners.
pub type WakeableId = u64;

struct WakeableInner {
    id: WakeableId,
    resolved: Cell<bool>,
    listeners: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// A resolve-once signal for pending external data.
///
/// Clones share the same cell. Subscribing after resolution runs the
/// listener immediately.
#[derive(Clone)]
pub struct Wakeable {
    inner: Rc<WakeableInner>,
}

impl Wakeable {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(WakeableInner {
                id: NEXT_WAKEABLE_ID.fetch_add(1, Ordering::Relaxed),
                resolved: Cell::new(false),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> WakeableId {
        self.inner.id
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.resolved.get()
    }

    /// Mark the data as available and run every pending listener.
    /// Resolving twice is a no-op.
    pub fn resolve(&self) {
        if self.inner.resolved.replace(true) {
            return;
        }
        let listeners = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        for listener in listeners {
            listener();
        }
    }

    /// Run `listener` once the data resolves (immediately if it already has).
    pub fn subscribe(&self, listener: impl FnOnce() + 'static) {
        if self.inner.resolved.get() {
            listener();
        } else {
            self.inner.listeners.borrow_mut().push(Box::new(listener));
        }
    }
}

impl Default for Wakeable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Wakeable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wakeable")
            .field("id", &self.inner.id)
            .field("resolved", &self.inner.resolved.get())
            .finish()
    }
}

/// The payload of a suspended render.
#[derive(Clone, Debug)]
pub struct Suspend {
    pub wakeable: Wakeable,
}

impl From<Wakeable> for Suspend {
    fn from(wakeable: Wakeable) -> Self {
        Self { wakeable }
    }
}

impl From<&Wakeable> for Suspend {
    fn from(wakeable: &Wakeable) -> Self {
        Self {
            wakeable: wakeable.clone(),
        }
    }
}

// =============================================================================
// Capture and retry
// =============================================================================

/// Handle a suspension thrown while rendering at `lane`: mark the nearest
/// open boundary to capture during unwind, and make sure the wakeable's
/// resolution re-enqueues the lane.
pub(crate) fn throw_exception(
    session: &mut crate::pipeline::root::Session,
    suspend: &Suspend,
    lane: crate::schedule::Lane,
) {
    if let Some(&boundary) = session.work.suspense_stack.last() {
        session.arena.get_mut(boundary).flags |= Flags::SHOULD_CAPTURE;
    }
    attach_ping_listener(session, &suspend.wakeable, lane);
}

/// Subscribe a retry ping for (`wakeable`, `lane`), at most once per pair.
///
/// The ping marks the lane pinged and pending again and re-enters
/// scheduling; the cache entry is dropped so a later suspension on the same
/// wakeable can re-register.
fn attach_ping_listener(
    session: &mut crate::pipeline::root::Session,
    wakeable: &Wakeable,
    lane: crate::schedule::Lane,
) {
    let id = wakeable.id();
    let registered = session.root.ping_cache.entry(id).or_default();
    if registered.contains(lane) {
        return;
    }
    registered.insert(lane);

    if wakeable.is_resolved() {
        // Resolved between the read and now: retry without waiting.
        session.root.ping_cache.remove(&id);
        session.work.retry_pings.push(lane);
        return;
    }

    let weak = session.me.clone();
    wakeable.subscribe(move || {
        let Some(rc) = weak.upgrade() else {
            return;
        };
        {
            let mut s = rc.borrow_mut();
            s.root.ping_cache.remove(&id);
            s.root.lanes.mark_pinged(lane);
            s.root.lanes.mark_updated(lane);
        }
        crate::pipeline::work_loop::ensure_root_is_scheduled(&rc);
    });
}

// =============================================================================
// Unwind
// =============================================================================

/// Unwind one node on the path from a suspended unit to its boundary.
///
/// Suspense nodes pop themselves off the handler stack; a boundary marked
/// to capture converts the mark into a capture and is returned so the work
/// loop re-enters it (it will render its fallback). Providers pop their
/// context value so shadowing stays balanced across the aborted subtree.
pub(crate) fn unwind_work(
    session: &mut crate::pipeline::root::Session,
    node: NodeKey,
) -> Option<NodeKey> {
    let kind_is_suspense = matches!(
        session.arena.get(node).kind,
        crate::engine::NodeKind::Suspense
    );
    if kind_is_suspense {
        session.work.suspense_stack.pop();
        let flags = session.arena.get(node).flags;
        if flags.contains(Flags::SHOULD_CAPTURE) && !flags.contains(Flags::DID_CAPTURE) {
            session.arena.get_mut(node).flags =
                (flags - Flags::SHOULD_CAPTURE) | Flags::DID_CAPTURE;
            return Some(node);
        }
        return None;
    }
    if let crate::engine::NodeKind::Provider(id) = &session.arena.get(node).kind {
        let id = *id;
        session.contexts.pop(id);
    }
    None
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wakeable_runs_listeners_once_on_resolve() {
        let wakeable = Wakeable::new();
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        wakeable.subscribe(move || c.set(c.get() + 1));
        assert_eq!(count.get(), 0);

        wakeable.resolve();
        assert_eq!(count.get(), 1);

        wakeable.resolve();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_subscribe_after_resolve_fires_immediately() {
        let wakeable = Wakeable::new();
        wakeable.resolve();

        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        wakeable.subscribe(move || f.set(true));
        assert!(fired.get());
    }

    #[test]
    fn test_clones_share_state() {
        let a = Wakeable::new();
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        b.resolve();
        assert!(a.is_resolved());
    }
}
