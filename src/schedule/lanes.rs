//! Lane priority model.
//!
//! A lane is one bit of update priority; a lane set is a bitset of them.
//! Lower bit position means higher priority, so isolating the lowest set
//! bit of a pending set always yields the most urgent lane.
//!
//! A root carries four lane sets: `pending` (requested, unconsumed),
//! `suspended` (requested but blocked on external data), `pinged`
//! (previously suspended, now unblocked), and the lane that just finished.
//! [`RootLanes::next_lane`] implements starvation-free retry over them:
//! when every pending lane is suspended, the next schedulable lane is drawn
//! from pending ∩ pinged, never from lanes still actively suspended.

use crate::schedule::scheduler::SchedulerPriority;

bitflags::bitflags! {
    /// A set of update-priority lanes.
    ///
    /// Combine with bitwise OR: `Lanes::SYNC | Lanes::DEFAULT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Lanes: u32 {
        /// Immediate, non-yielding work (e.g. the initial `render` call).
        const SYNC = 1 << 0;
        /// Continuous input (drag, scroll) driven updates.
        const INPUT_CONTINUOUS = 1 << 1;
        /// Ordinary state updates.
        const DEFAULT = 1 << 2;
        /// Updates dispatched inside a transition scope.
        const TRANSITION = 1 << 3;
        /// Work that can wait for an idle period.
        const IDLE = 1 << 4;
    }
}

/// A single lane. Same representation as [`Lanes`] with one bit set
/// (or none, for the empty lane).
pub type Lane = Lanes;

/// Union of two lane sets.
#[inline]
pub fn merge(a: Lanes, b: Lanes) -> Lanes {
    a | b
}

/// The highest-priority lane in a set: its lowest set bit.
#[inline]
pub fn highest_priority(lanes: Lanes) -> Lane {
    let bits = lanes.bits();
    Lanes::from_bits_retain(bits & bits.wrapping_neg())
}

/// Whether `subset` is wholly contained in `set`.
///
/// Used to decide if an update's lane qualifies for the lane set being
/// rendered this pass. The empty lane is a subset of everything, which is
/// what makes replayed base-queue updates apply unconditionally.
#[inline]
pub fn is_subset(set: Lanes, subset: Lanes) -> bool {
    set.contains(subset)
}

/// Map the highest-priority lane of a set to an external scheduler priority.
pub fn lanes_to_scheduler_priority(lanes: Lanes) -> SchedulerPriority {
    let lane = highest_priority(lanes);
    if lane == Lanes::SYNC {
        SchedulerPriority::Immediate
    } else if lane == Lanes::INPUT_CONTINUOUS {
        SchedulerPriority::UserBlocking
    } else if lane == Lanes::DEFAULT {
        SchedulerPriority::Normal
    } else {
        SchedulerPriority::Idle
    }
}

/// Map an external scheduler priority to the lane new updates should carry.
pub fn scheduler_priority_to_lane(priority: SchedulerPriority) -> Lane {
    match priority {
        SchedulerPriority::Immediate => Lanes::SYNC,
        SchedulerPriority::UserBlocking => Lanes::INPUT_CONTINUOUS,
        SchedulerPriority::Normal | SchedulerPriority::Low => Lanes::DEFAULT,
        SchedulerPriority::Idle => Lanes::IDLE,
    }
}

// =============================================================================
// Per-root lane bookkeeping
// =============================================================================

/// The lane sets a root tracks between passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootLanes {
    /// Requested but not yet consumed by a committed pass.
    pub pending: Lanes,
    /// Requested but blocked pending external data.
    pub suspended: Lanes,
    /// Previously suspended lanes whose blocking data has resolved.
    pub pinged: Lanes,
}

impl RootLanes {
    /// Record a newly requested update lane.
    pub fn mark_updated(&mut self, lane: Lane) {
        self.pending = merge(self.pending, lane);
    }

    /// Record that rendering `lanes` blocked on external data.
    ///
    /// Suspended lanes leave `pending` so they stop being picked, but they
    /// are not dropped: a ping moves them back.
    pub fn mark_suspended(&mut self, lanes: Lanes) {
        self.suspended |= lanes;
        self.pending &= !lanes;
    }

    /// Record that external data for `lanes` resolved. Only lanes actually
    /// suspended become pinged.
    pub fn mark_pinged(&mut self, lanes: Lanes) {
        self.pinged |= self.suspended & lanes;
    }

    /// Remove a finished lane. Suspension bookkeeping resets; lanes that are
    /// still blocked will re-register on their next failing pass.
    pub fn mark_finished(&mut self, lane: Lane) {
        self.pending &= !lane;
        self.suspended = Lanes::empty();
        self.pinged = Lanes::empty();
    }

    /// The next lane the root should render, or the empty set if there is
    /// nothing schedulable.
    pub fn next_lane(&self) -> Lane {
        if self.pending.is_empty() {
            return Lanes::empty();
        }
        let unsuspended = self.pending & !self.suspended;
        if !unsuspended.is_empty() {
            return highest_priority(unsuspended);
        }
        // Everything pending is suspended; retry only what has been pinged.
        let pinged = self.pending & self.pinged;
        if !pinged.is_empty() {
            return highest_priority(pinged);
        }
        Lanes::empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_priority_is_lowest_bit() {
        assert_eq!(highest_priority(Lanes::SYNC | Lanes::IDLE), Lanes::SYNC);
        assert_eq!(
            highest_priority(Lanes::TRANSITION | Lanes::DEFAULT),
            Lanes::DEFAULT
        );
        assert_eq!(highest_priority(Lanes::empty()), Lanes::empty());
    }

    #[test]
    fn test_subset() {
        let set = Lanes::SYNC | Lanes::DEFAULT;
        assert!(is_subset(set, Lanes::SYNC));
        assert!(is_subset(set, Lanes::empty()));
        assert!(!is_subset(set, Lanes::IDLE));
        assert!(!is_subset(Lanes::SYNC, set));
    }

    #[test]
    fn test_next_lane_prefers_urgent_pending() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::IDLE);
        root.mark_updated(Lanes::DEFAULT);
        assert_eq!(root.next_lane(), Lanes::DEFAULT);
    }

    #[test]
    fn test_next_lane_skips_suspended_until_pinged() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::DEFAULT);
        root.mark_suspended(Lanes::DEFAULT);
        assert_eq!(root.next_lane(), Lanes::empty());

        // Resolution: the lane is pinged and becomes pending again.
        root.mark_pinged(Lanes::DEFAULT);
        root.mark_updated(Lanes::DEFAULT);
        assert_eq!(root.next_lane(), Lanes::DEFAULT);
    }

    #[test]
    fn test_ping_without_suspension_is_ignored() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::DEFAULT);
        root.mark_pinged(Lanes::IDLE);
        assert_eq!(root.pinged, Lanes::empty());
    }

    #[test]
    fn test_finished_clears_only_that_lane_from_pending() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::SYNC | Lanes::DEFAULT);
        root.mark_finished(Lanes::SYNC);
        assert_eq!(root.pending, Lanes::DEFAULT);
    }

    #[test]
    fn test_priority_mapping_round_trip() {
        for lane in [Lanes::SYNC, Lanes::INPUT_CONTINUOUS, Lanes::DEFAULT] {
            let priority = lanes_to_scheduler_priority(lane);
            assert_eq!(scheduler_priority_to_lane(priority), lane);
        }
        assert_eq!(
            lanes_to_scheduler_priority(Lanes::TRANSITION),
            SchedulerPriority::Idle
        );
    }
}
