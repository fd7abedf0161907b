//! Root handle and renderer session.
//!
//! Everything the reference implementation keeps in module-level globals —
//! the work-in-progress pointer, the lane bitsets, the hook cursor, the
//! context and suspense stacks, pending passive effects, the sync queue —
//! lives here as fields of one [`Session`]. The public [`Root`] owns the
//! session behind `Rc<RefCell<…>>`; independent roots (and tests) share
//! nothing.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::element::Element;
use crate::engine::node::{MemoizedState, Node, NodeKind, NodeProps};
use crate::engine::{Arena, NodeKey};
use crate::host::{HostConfig, InstanceId};
use crate::render::context::{ContextId, ContextStacks};
use crate::render::hooks::{EffectRecord, HookRuntime};
use crate::render::suspense::{Suspend, WakeableId};
use crate::schedule::{
    Action, CallbackToken, Lane, Lanes, RootLanes, TaskScheduler, Update, UpdateQueue,
};
use crate::schedule::sync_queue::SyncQueue;

// =============================================================================
// Session state
// =============================================================================

/// Scheduling state of the root.
pub(crate) struct RootSchedule {
    /// The host container the tree commits into.
    pub container: InstanceId,
    /// The live tree's root node (flipped at every commit).
    pub current: NodeKey,
    /// The finished work-in-progress root awaiting commit.
    pub finished_work: Option<NodeKey>,
    /// Lane of the pass that just finished rendering.
    pub finished_lane: Lanes,
    pub lanes: RootLanes,
    /// The one scheduled callback for this root, if any.
    pub callback: Option<CallbackToken>,
    pub callback_priority: Lanes,
    /// Per-wakeable lanes that already have a retry listener attached.
    pub ping_cache: HashMap<WakeableId, Lanes>,
}

/// Why the in-flight render pass stopped making progress.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum SuspendedReason {
    NotSuspended,
    OnData,
}

/// In-flight render pass state.
pub(crate) struct WorkState {
    /// Parked unit-of-work pointer; `None` between passes.
    pub wip: Option<NodeKey>,
    /// Lane of the in-flight pass (distinguishes resume from restart).
    pub wip_lanes: Lanes,
    pub suspended_reason: SuspendedReason,
    pub thrown: Option<Suspend>,
    /// A pass that unwound past the root without finding a boundary.
    pub did_not_complete: bool,
    /// Open suspense boundaries on the current walk path.
    pub suspense_stack: Vec<NodeKey>,
    /// Nesting depth of transition scopes.
    pub transition_depth: u32,
    /// Lanes whose wakeable was already resolved when the retry listener
    /// would have attached; re-enqueued once the pass settles.
    pub retry_pings: Vec<Lane>,
    /// Guards against scheduling the passive flush twice per commit.
    pub passive_scheduled: bool,
}

/// Effects collected during commit, awaiting the passive flush.
#[derive(Default)]
pub(crate) struct PendingPassive {
    pub unmount: Vec<Rc<EffectRecord>>,
    pub update: Vec<Rc<EffectRecord>>,
}

/// The renderer session: one root, one arena, one scheduler binding.
pub(crate) struct Session {
    pub arena: Arena,
    pub host: Box<dyn HostConfig>,
    pub scheduler: Box<dyn TaskScheduler>,
    pub root: RootSchedule,
    pub work: WorkState,
    pub contexts: ContextStacks,
    pub passive: PendingPassive,
    pub sync_queue: SyncQueue,
    /// Self-reference for scheduled callbacks and dispatch handles.
    pub me: Weak<RefCell<Session>>,
}

impl HookRuntime for Session {
    fn read_context_value(&self, id: ContextId) -> Option<Rc<dyn Any>> {
        self.contexts.read(id)
    }

    fn runtime_handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            session: self.me.clone(),
        }
    }
}

// =============================================================================
// Runtime handle
// =============================================================================

/// A weak, non-generic handle back into the session, carried by dispatch
/// functions and transition scopes. Every method degrades to a logged no-op
/// once the root is gone.
#[derive(Clone)]
pub struct RuntimeHandle {
    pub(crate) session: Weak<RefCell<Session>>,
}

impl RuntimeHandle {
    /// The lane a dispatch should carry right now.
    pub(crate) fn request_update_lane(&self) -> Lane {
        let Some(rc) = self.session.upgrade() else {
            return Lanes::DEFAULT;
        };
        match rc.try_borrow() {
            Ok(session) => crate::render::hooks::request_update_lane(&session),
            Err(_) => {
                log::warn!("state dispatched during render; tagging with the default lane");
                Lanes::DEFAULT
            }
        }
    }

    /// Merge `lane` into the root's pending set and (re)schedule it.
    pub(crate) fn schedule(&self, node: NodeKey, lane: Lane) {
        let Some(rc) = self.session.upgrade() else {
            return;
        };
        if rc.try_borrow_mut().is_err() {
            log::warn!("state dispatched during render; scheduling deferred to the active pass");
            return;
        }
        crate::pipeline::work_loop::schedule_update_on_node(&rc, node, lane);
    }

    pub(crate) fn enter_transition(&self) {
        if let Some(rc) = self.session.upgrade() {
            rc.borrow_mut().work.transition_depth += 1;
        }
    }

    pub(crate) fn exit_transition(&self) {
        if let Some(rc) = self.session.upgrade() {
            let mut session = rc.borrow_mut();
            session.work.transition_depth = session.work.transition_depth.saturating_sub(1);
        }
    }
}

// =============================================================================
// Root handle
// =============================================================================

/// A mounted reconciler root bound to one host container.
///
/// Dropping the handle drops the session; callbacks still held by the
/// external scheduler become no-ops.
pub struct Root {
    session: Rc<RefCell<Session>>,
}

impl Root {
    /// Create a root targeting `container`.
    pub fn new(
        host: impl HostConfig + 'static,
        scheduler: impl TaskScheduler + 'static,
        container: InstanceId,
    ) -> Self {
        let session = Rc::new_cyclic(|me: &Weak<RefCell<Session>>| {
            let mut arena = Arena::new();
            let mut root_node = Node::new(NodeKind::Root, NodeProps::Root, None);
            root_node.update_queue = Some(UpdateQueue::new(None));
            root_node.memoized_state = MemoizedState::Element(None);
            let current = arena.insert(root_node);

            RefCell::new(Session {
                arena,
                host: Box::new(host),
                scheduler: Box::new(scheduler),
                root: RootSchedule {
                    container,
                    current,
                    finished_work: None,
                    finished_lane: Lanes::empty(),
                    lanes: RootLanes::default(),
                    callback: None,
                    callback_priority: Lanes::empty(),
                    ping_cache: HashMap::new(),
                },
                work: WorkState {
                    wip: None,
                    wip_lanes: Lanes::empty(),
                    suspended_reason: SuspendedReason::NotSuspended,
                    thrown: None,
                    did_not_complete: false,
                    suspense_stack: Vec::new(),
                    transition_depth: 0,
                    retry_pings: Vec::new(),
                    passive_scheduled: false,
                },
                contexts: ContextStacks::default(),
                passive: PendingPassive::default(),
                sync_queue: SyncQueue::default(),
                me: me.clone(),
            })
        });
        Self { session }
    }

    /// Enqueue a root-level synchronous-lane update rendering `element`.
    pub fn render(&self, element: Element) {
        self.enqueue_root_update(Some(element));
    }

    /// Tear the tree down (renders an empty root).
    pub fn unmount(&self) {
        self.enqueue_root_update(None);
    }

    fn enqueue_root_update(&self, element: Option<Element>) {
        let (root_node, queue) = {
            let session = self.session.borrow();
            let node = session.root.current;
            (node, session.arena.get(node).update_queue.clone())
        };
        let Some(queue) = queue else {
            if cfg!(debug_assertions) {
                log::error!("root node has no update queue");
            }
            return;
        };
        queue.enqueue(Update::new(Action::Replace(element), Lanes::SYNC));
        crate::pipeline::work_loop::schedule_update_on_node(&self.session, root_node, Lanes::SYNC);
    }

    /// Lanes requested but not yet committed (diagnostics and tests).
    pub fn pending_lanes(&self) -> Lanes {
        self.session.borrow().root.lanes.pending
    }
}
