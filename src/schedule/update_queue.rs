//! Per-stateful-unit update queues.
//!
//! Every stateful unit (the root and each state hook) owns one
//! [`UpdateQueue`]. Dispatching appends an [`Update`] — a replacement value
//! or a pure transition function, tagged with a lane — in arrival order.
//! Processing folds the queued actions over the unit's base state, but only
//! the updates whose lane is part of the lane set being rendered; the rest
//! are preserved for a later pass.
//!
//! # The three-way split
//!
//! Processing returns (and the queue stores) three things:
//!
//! - the **memoized state** — the fold result this pass will render with;
//! - the **base state** — the state as of just before the first skipped
//!   update, the known-good replay point;
//! - the **base queue** — every skipped update, in arrival order, plus a
//!   lane-cleared clone of every *applied* update that followed a skip, so
//!   replaying from the base state re-applies them in the original order.
//!
//! This is what makes priority preemption safe: a high-priority pass can
//! compute without waiting for low-priority updates, and the low-priority
//! updates are neither lost nor reordered when their lane finally renders.
//!
//! The queue is shared by both tree buffers (current and work-in-progress
//! clone the same handle), so an interrupted pass never strands updates on
//! a discarded tree.

use std::cell::RefCell;
use std::rc::Rc;

use crate::schedule::lanes::{is_subset, Lane, Lanes};

// =============================================================================
// Updates
// =============================================================================

/// A state transition: either a replacement value or a function of the
/// previous state.
pub enum Action<T> {
    Replace(T),
    Apply(Rc<dyn Fn(&T) -> T>),
}

impl<T: Clone> Action<T> {
    /// Apply this action to the previous state.
    pub fn apply(&self, prev: &T) -> T {
        match self {
            Action::Replace(value) => value.clone(),
            Action::Apply(f) => f(prev),
        }
    }
}

impl<T> Clone for Action<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Action::Replace(value) => Action::Replace(value.clone()),
            Action::Apply(f) => Action::Apply(f.clone()),
        }
    }
}

/// One pending state transition, tagged with its priority lane.
#[derive(Clone)]
pub struct Update<T> {
    pub action: Action<T>,
    pub lane: Lane,
}

impl<T> Update<T> {
    pub fn new(action: Action<T>, lane: Lane) -> Self {
        Self { action, lane }
    }
}

// =============================================================================
// Processing
// =============================================================================

/// Result of one processing pass over a queue.
pub struct Processed<T> {
    /// State to render with this pass.
    pub memoized_state: T,
    /// Replay point for the next pass.
    pub base_state: T,
    /// Updates to replay from `base_state` next pass, arrival order.
    pub base_queue: Vec<Update<T>>,
}

/// Fold `queue` over `base_state`, applying only updates whose lane is
/// contained in `render_lanes`.
///
/// Skipped updates are cloned into the returned base queue unchanged. Once
/// anything has been skipped, every subsequently *applied* update is also
/// cloned into the base queue with the empty lane, so the replay pass
/// applies it unconditionally and in the original position.
pub fn process_update_queue<T: Clone>(
    base_state: T,
    queue: Vec<Update<T>>,
    render_lanes: Lanes,
) -> Processed<T> {
    let mut new_state = base_state.clone();
    let mut new_base_state = base_state;
    let mut new_base_queue: Vec<Update<T>> = Vec::new();

    for update in queue {
        if !is_subset(render_lanes, update.lane) {
            // Insufficient priority: preserve, and pin the replay point to
            // the state just before the first skip.
            if new_base_queue.is_empty() {
                new_base_state = new_state.clone();
            }
            new_base_queue.push(update);
        } else {
            if !new_base_queue.is_empty() {
                new_base_queue.push(Update::new(update.action.clone(), Lanes::empty()));
            }
            new_state = update.action.apply(&new_state);
        }
    }

    if new_base_queue.is_empty() {
        new_base_state = new_state.clone();
    }

    Processed {
        memoized_state: new_state,
        base_state: new_base_state,
        base_queue: new_base_queue,
    }
}

// =============================================================================
// Shared queue
// =============================================================================

struct QueueInner<T> {
    /// Newly dispatched updates, arrival order.
    pending: Vec<Update<T>>,
    /// Replay point carried between passes.
    base_state: T,
    /// Skipped/replayed updates carried between passes, arrival order.
    base_queue: Vec<Update<T>>,
}

/// A shared update queue.
///
/// Cloning yields another handle to the same queue; the current and
/// work-in-progress nodes of one unit always share it.
pub struct UpdateQueue<T> {
    inner: Rc<RefCell<QueueInner<T>>>,
}

impl<T> Clone for UpdateQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> UpdateQueue<T> {
    /// Create a queue whose replay point is `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(QueueInner {
                pending: Vec::new(),
                base_state: initial,
                base_queue: Vec::new(),
            })),
        }
    }

    /// Append an update in arrival order.
    pub fn enqueue(&self, update: Update<T>) {
        self.inner.borrow_mut().pending.push(update);
    }

    /// Whether any update (pending or preserved) is waiting.
    pub fn has_work(&self) -> bool {
        let inner = self.inner.borrow();
        !inner.pending.is_empty() || !inner.base_queue.is_empty()
    }

    /// Consume the queue for one pass at `render_lanes`.
    ///
    /// The preserved base queue is replayed ahead of newly pending updates,
    /// then the three-way split is stored back. Returns the memoized state.
    pub fn process(&self, render_lanes: Lanes) -> T {
        let (base_state, queue) = {
            let mut inner = self.inner.borrow_mut();
            let mut queue = std::mem::take(&mut inner.base_queue);
            queue.append(&mut inner.pending);
            (inner.base_state.clone(), queue)
        };

        let result = process_update_queue(base_state, queue, render_lanes);

        let mut inner = self.inner.borrow_mut();
        inner.base_state = result.base_state;
        inner.base_queue = result.base_queue;
        result.memoized_state
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn replace(value: i32, lane: Lanes) -> Update<i32> {
        Update::new(Action::Replace(value), lane)
    }

    fn apply(f: impl Fn(&i32) -> i32 + 'static, lane: Lanes) -> Update<i32> {
        Update::new(Action::Apply(Rc::new(f)), lane)
    }

    #[test]
    fn test_same_lane_updates_fold_in_arrival_order() {
        let queue = UpdateQueue::new(1);
        queue.enqueue(apply(|n| n * 4, Lanes::DEFAULT));
        queue.enqueue(replace(10, Lanes::DEFAULT));
        queue.enqueue(apply(|n| n + 1, Lanes::DEFAULT));

        // Identical to folding left-to-right by hand: (1 * 4) -> 10 -> 11.
        assert_eq!(queue.process(Lanes::DEFAULT), 11);
    }

    #[test]
    fn test_lower_priority_updates_are_skipped_and_preserved() {
        let queue = UpdateQueue::new(0);
        queue.enqueue(apply(|n| n + 1, Lanes::DEFAULT)); // skipped
        queue.enqueue(apply(|n| n * 10, Lanes::SYNC)); // applied, then replayed

        // Sync-only pass: skip the default update but keep rendering.
        assert_eq!(queue.process(Lanes::SYNC), 0 * 10);
        assert!(queue.has_work());

        // Later pass including the default lane: same result as applying
        // both in arrival order from the start.
        assert_eq!(queue.process(Lanes::SYNC | Lanes::DEFAULT), (0 + 1) * 10);
        assert!(!queue.has_work());
    }

    #[test]
    fn test_replay_matches_running_both_lanes_from_the_start() {
        let build = || {
            let queue = UpdateQueue::new(2);
            queue.enqueue(apply(|n| n + 3, Lanes::DEFAULT));
            queue.enqueue(apply(|n| n * 2, Lanes::SYNC));
            queue.enqueue(apply(|n| n - 1, Lanes::DEFAULT));
            queue.enqueue(apply(|n| n * n, Lanes::SYNC));
            queue
        };

        // One pass with every lane.
        let all_at_once = build().process(Lanes::SYNC | Lanes::DEFAULT);

        // High-priority first, then the preserved lanes.
        let preempted = build();
        preempted.process(Lanes::SYNC);
        let replayed = preempted.process(Lanes::SYNC | Lanes::DEFAULT);

        assert_eq!(replayed, all_at_once);
    }

    #[test]
    fn test_base_state_rewinds_to_before_first_skip() {
        let queue = UpdateQueue::new(0);
        queue.enqueue(replace(5, Lanes::SYNC));
        queue.enqueue(replace(7, Lanes::DEFAULT)); // first skip
        queue.enqueue(replace(9, Lanes::SYNC));

        // Memoized state reflects every applied update...
        assert_eq!(queue.process(Lanes::SYNC), 9);
        // ...but replay starts from before the skip, so the preserved
        // ordering wins: 5 -> 7 -> 9.
        assert_eq!(queue.process(Lanes::DEFAULT | Lanes::SYNC), 9);

        let queue = UpdateQueue::new(0);
        queue.enqueue(replace(5, Lanes::SYNC));
        queue.enqueue(replace(7, Lanes::DEFAULT));
        assert_eq!(queue.process(Lanes::SYNC), 5);
        // The default update was last in arrival order; it must win now.
        assert_eq!(queue.process(Lanes::DEFAULT), 7);
    }

    #[test]
    fn test_empty_lane_updates_always_apply() {
        let queue = UpdateQueue::new(1);
        queue.enqueue(apply(|n| n + 1, Lanes::empty()));
        assert_eq!(queue.process(Lanes::SYNC), 2);
    }

    #[test]
    fn test_queue_is_shared_between_clones() {
        let queue = UpdateQueue::new(0);
        let other = queue.clone();
        other.enqueue(replace(3, Lanes::SYNC));
        assert_eq!(queue.process(Lanes::SYNC), 3);
    }
}
