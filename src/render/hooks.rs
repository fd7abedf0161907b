//! Hook state machine.
//!
//! A function unit's state lives in an ordered chain of hook records on its
//! node, aligned positionally between renders: hook #n of this render pairs
//! with hook #n of the previous one. The pairing is what lets a plain
//! function retain state, so the number and order of hook calls must be
//! identical on every render of a unit — a mismatch is a fatal error, never
//! silently tolerated.
//!
//! Hooks are methods on [`HookCx`], the context handed to every render.
//! Whether a call mounts a fresh record or advances along the previous
//! chain is decided once per render ([`HookMode`]), the analogue of
//! swapping a mount/update dispatcher table.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::element::{Element, RenderResult};
use crate::engine::node::{Flags, MemoizedState, NodeKind, NodeProps};
use crate::engine::NodeKey;
use crate::error::FatalError;
use crate::pipeline::root::{RuntimeHandle, Session};
use crate::render::context::{Context, ContextId};
use crate::schedule::{Action, Lane, Lanes, Update, UpdateQueue};

// =============================================================================
// Effects
// =============================================================================

bitflags::bitflags! {
    /// Per-effect-record tags: the effect's category and whether this
    /// commit must run it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EffectTags: u8 {
        /// A passive (after-commit) effect.
        const PASSIVE = 1 << 0;
        /// Dependencies changed (or first mount): run on the next flush.
        const HAS_EFFECT = 1 << 1;
    }
}

/// Teardown returned by an effect's create function.
pub type Cleanup = Box<dyn FnOnce()>;

/// One effect hook's record.
///
/// The destroy cell is shared across the record's successors, so a create
/// that runs late still parks its cleanup where the eventual unmount finds
/// it.
pub struct EffectRecord {
    pub tag: Cell<EffectTags>,
    pub create: Rc<dyn Fn() -> Option<Cleanup>>,
    pub destroy: Rc<RefCell<Option<Cleanup>>>,
    pub deps: Rc<dyn Any>,
}

// =============================================================================
// Hook records
// =============================================================================

/// One entry of a unit's hook chain.
#[derive(Clone)]
pub enum Hook {
    State {
        /// Last computed value, as `Rc<T>`.
        memoized: Rc<dyn Any>,
        /// The shared `UpdateQueue<T>`, type-erased.
        queue: Rc<dyn Any>,
    },
    Effect(Rc<EffectRecord>),
    Ref(Rc<dyn Any>),
    Memo {
        value: Rc<dyn Any>,
        deps: Rc<dyn Any>,
    },
}

impl Hook {
    fn kind_name(&self) -> &'static str {
        match self {
            Hook::State { .. } => "state",
            Hook::Effect(_) => "effect",
            Hook::Ref(_) => "ref",
            Hook::Memo { .. } => "memo",
        }
    }
}

// =============================================================================
// Dispatch handles
// =============================================================================

/// Enqueues state transitions for one state hook and schedules the root.
///
/// Cloneable and usable from outside a render (event handlers, timers); the
/// transition it enqueues is tagged with the lane of the ambient scheduler
/// priority, or the transition lane inside a transition scope.
pub struct Dispatch<T> {
    queue: UpdateQueue<T>,
    node: NodeKey,
    handle: RuntimeHandle,
}

impl<T> Clone for Dispatch<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            node: self.node,
            handle: self.handle.clone(),
        }
    }
}

impl<T: Clone + 'static> Dispatch<T> {
    /// Replace the state with `value`.
    pub fn set(&self, value: T) {
        self.dispatch(Action::Replace(value));
    }

    /// Queue a pure transition of the previous state.
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.dispatch(Action::Apply(Rc::new(f)));
    }

    fn dispatch(&self, action: Action<T>) {
        let lane = self.handle.request_update_lane();
        self.queue.enqueue(Update::new(action, lane));
        self.handle.schedule(self.node, lane);
    }
}

/// Handle returned by [`HookCx::use_transition`].
#[derive(Clone)]
pub struct StartTransition {
    set_pending: Dispatch<bool>,
    handle: RuntimeHandle,
}

impl StartTransition {
    /// Run `scope`, tagging every update dispatched inside it with the
    /// transition lane. The pending flag flips on at ambient priority and
    /// off with the transition itself, so it stays up until the transition
    /// commits.
    pub fn run(&self, scope: impl FnOnce()) {
        self.set_pending.set(true);
        self.handle.enter_transition();
        scope();
        self.set_pending.set(false);
        self.handle.exit_transition();
    }
}

// =============================================================================
// Hook context
// =============================================================================

/// What the hook layer needs from the renderer session.
pub(crate) trait HookRuntime {
    fn read_context_value(&self, id: ContextId) -> Option<Rc<dyn Any>>;
    fn runtime_handle(&self) -> RuntimeHandle;
}

/// Mount appends fresh records; update walks the previous chain.
#[derive(Clone, Copy, PartialEq, Eq)]
enum HookMode {
    Mount,
    Update,
}

/// The per-render hook context handed to a function unit.
pub struct HookCx<'a> {
    rt: &'a mut dyn HookRuntime,
    node: NodeKey,
    mode: HookMode,
    cursor: usize,
    prev: Vec<Hook>,
    hooks: Vec<Hook>,
    flags_acc: Flags,
    render_lanes: Lanes,
}

impl<'a> HookCx<'a> {
    /// Pair this call with the previous render's record at the same
    /// position. Mount renders pair with nothing.
    fn paired_hook(&self, current_kind: &'static str) -> Option<Hook> {
        match self.mode {
            HookMode::Mount => None,
            HookMode::Update => match self.prev.get(self.cursor) {
                None => panic!("{}", FatalError::HookCountTooMany { index: self.cursor }),
                Some(hook) => {
                    if hook.kind_name() != current_kind {
                        panic!(
                            "{}",
                            FatalError::HookKindMismatch {
                                index: self.cursor,
                                previous: hook.kind_name(),
                                current: current_kind,
                            }
                        );
                    }
                    Some(hook.clone())
                }
            },
        }
    }

    fn push_hook(&mut self, hook: Hook) {
        self.hooks.push(hook);
        self.cursor += 1;
    }

    /// Retained state.
    ///
    /// Returns the current value and a [`Dispatch`] handle bound to this
    /// hook's queue. On update renders the queue is processed against the
    /// lanes of the pass, applying qualifying transitions in arrival order
    /// and preserving the rest.
    pub fn use_state<T: Clone + 'static>(&mut self, init: impl FnOnce() -> T) -> (T, Dispatch<T>) {
        let prev = self.paired_hook("state");
        let (value, queue) = match prev {
            None => {
                let value = init();
                (value.clone(), UpdateQueue::new(value))
            }
            Some(Hook::State { queue, .. }) => {
                let queue = queue
                    .downcast_ref::<UpdateQueue<T>>()
                    .expect("state hook type changed between renders")
                    .clone();
                (queue.process(self.render_lanes), queue)
            }
            Some(_) => unreachable!("paired_hook checked the kind"),
        };

        self.push_hook(Hook::State {
            memoized: Rc::new(value.clone()),
            queue: Rc::new(queue.clone()),
        });

        let dispatch = Dispatch {
            queue,
            node: self.node,
            handle: self.rt.runtime_handle(),
        };
        (value, dispatch)
    }

    /// A side effect run after commit, gated on `deps`.
    ///
    /// `create` runs after the commit in which `deps` first appear or
    /// change, and its returned cleanup runs before the next create and on
    /// unmount. All cleanups of a flush run before any create.
    pub fn use_effect<D: PartialEq + 'static>(
        &mut self,
        deps: D,
        create: impl Fn() -> Option<Cleanup> + 'static,
    ) {
        let prev = self.paired_hook("effect");
        let record = match prev {
            None => Rc::new(EffectRecord {
                tag: Cell::new(EffectTags::PASSIVE | EffectTags::HAS_EFFECT),
                create: Rc::new(create),
                destroy: Rc::new(RefCell::new(None)),
                deps: Rc::new(deps),
            }),
            Some(Hook::Effect(old)) => {
                let unchanged = old.deps.downcast_ref::<D>() == Some(&deps);
                let tag = if unchanged {
                    EffectTags::PASSIVE
                } else {
                    EffectTags::PASSIVE | EffectTags::HAS_EFFECT
                };
                Rc::new(EffectRecord {
                    tag: Cell::new(tag),
                    create: Rc::new(create),
                    destroy: old.destroy.clone(),
                    deps: Rc::new(deps),
                })
            }
            Some(_) => unreachable!("paired_hook checked the kind"),
        };

        if record.tag.get().contains(EffectTags::HAS_EFFECT) {
            self.flags_acc |= Flags::PASSIVE_EFFECT;
        }
        self.push_hook(Hook::Effect(record));
    }

    /// A mutable cell with stable identity across renders.
    ///
    /// With `init` of `|| None`, the returned cell doubles as a
    /// [`NodeRef`](crate::element::NodeRef) for host elements.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        let prev = self.paired_hook("ref");
        let cell = match prev {
            None => {
                let cell: Rc<RefCell<T>> = Rc::new(RefCell::new(init()));
                cell
            }
            Some(Hook::Ref(stored)) => match stored.downcast::<RefCell<T>>() {
                Ok(cell) => cell,
                Err(_) => panic!("ref hook type changed between renders"),
            },
            Some(_) => unreachable!("paired_hook checked the kind"),
        };
        self.push_hook(Hook::Ref(cell.clone()));
        cell
    }

    /// A memoized computation, recomputed only when `deps` change.
    pub fn use_memo<D: PartialEq + 'static, T: 'static>(
        &mut self,
        deps: D,
        compute: impl FnOnce() -> T,
    ) -> Rc<T> {
        let prev = self.paired_hook("memo");
        let (value, deps): (Rc<T>, Rc<dyn Any>) = match prev {
            Some(Hook::Memo {
                value,
                deps: old_deps,
            }) if old_deps.downcast_ref::<D>() == Some(&deps) => {
                let value = match value.downcast::<T>() {
                    Ok(value) => value,
                    Err(_) => panic!("memo hook type changed between renders"),
                };
                (value, old_deps)
            }
            None | Some(Hook::Memo { .. }) => (Rc::new(compute()), Rc::new(deps)),
            Some(_) => unreachable!("paired_hook checked the kind"),
        };
        self.push_hook(Hook::Memo {
            value: value.clone(),
            deps,
        });
        value
    }

    /// Read the nearest enclosing provider's value for `context`, or `None`
    /// outside any provider. Does not occupy a hook position.
    pub fn use_context<T: 'static>(&mut self, context: &Context<T>) -> Option<Rc<T>> {
        self.rt
            .read_context_value(context.id())
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// A transition scope: `(is_pending, start)` where updates dispatched
    /// inside `start.run(..)` carry the transition lane.
    pub fn use_transition(&mut self) -> (bool, StartTransition) {
        let (pending, set_pending) = self.use_state(|| false);
        let start = StartTransition {
            set_pending,
            handle: self.rt.runtime_handle(),
        };
        (pending, start)
    }
}

// =============================================================================
// Render entry
// =============================================================================

/// Invoke a function unit with a fresh hook context and store the resulting
/// hook chain on the node.
///
/// Panics with a [`FatalError`] if the unit called fewer hooks than its
/// previous render recorded (the called-more case panics at the offending
/// call site inside [`HookCx`]).
pub(crate) fn render_with_hooks(
    session: &mut Session,
    wip: NodeKey,
    render_lanes: Lanes,
) -> RenderResult {
    let (render, props) = {
        let node = session.arena.get(wip);
        match (&node.kind, &node.pending_props) {
            (NodeKind::Function(render), NodeProps::Component(props)) => {
                (render.clone(), props.clone())
            }
            _ => {
                if cfg!(debug_assertions) {
                    log::error!("render_with_hooks on a non-function node");
                }
                return Ok(Element::Fragment(crate::element::FragmentElement {
                    key: None,
                    children: Vec::new(),
                }));
            }
        }
    };

    let prev = session
        .arena
        .get(wip)
        .alternate
        .and_then(|alt| match &session.arena.get(alt).memoized_state {
            MemoizedState::Hooks(hooks) => Some(hooks.clone()),
            _ => None,
        });
    let mode = if prev.is_some() {
        HookMode::Update
    } else {
        HookMode::Mount
    };
    let prev = prev.unwrap_or_default();
    let prev_len = prev.len();

    let (result, hooks, cursor, flags_acc) = {
        let mut cx = HookCx {
            rt: session,
            node: wip,
            mode,
            cursor: 0,
            prev,
            hooks: Vec::new(),
            flags_acc: Flags::empty(),
            render_lanes,
        };
        let result = render(&mut cx, &props);
        (result, cx.hooks, cx.cursor, cx.flags_acc)
    };

    if result.is_ok() {
        if mode == HookMode::Update && cursor < prev_len {
            panic!(
                "{}",
                FatalError::HookCountTooFew {
                    expected: prev_len,
                    rendered: cursor,
                }
            );
        }
        let node = session.arena.get_mut(wip);
        node.memoized_state = MemoizedState::Hooks(hooks);
        node.flags |= flags_acc;
    }
    result
}

/// The lane a dispatch outside any explicit scope should carry: the
/// transition lane inside a transition, otherwise the lane mapped from the
/// external scheduler's current priority.
pub(crate) fn request_update_lane(session: &Session) -> Lane {
    if session.work.transition_depth > 0 {
        return Lanes::TRANSITION;
    }
    crate::schedule::scheduler_priority_to_lane(session.scheduler.current_priority())
}
