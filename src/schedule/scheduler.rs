//! External cooperative scheduler contract.
//!
//! The reconciler does not own a task queue or a frame clock. Yieldable
//! render work is handed to an external scheduler as [`Continuation`]
//! callbacks at one of five [`SchedulerPriority`] levels, and the work loop
//! polls [`TaskScheduler::should_yield`] between units of work to decide
//! when to give the host back control.
//!
//! Only one callback per root is tracked at a time; a superseded callback is
//! actively cancelled via its [`CallbackToken`] before a replacement is
//! scheduled.

/// Priority levels of the external scheduler, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchedulerPriority {
    Immediate,
    UserBlocking,
    Normal,
    Low,
    Idle,
}

/// Handle to a scheduled callback, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackToken(pub u64);

/// A unit of schedulable work.
///
/// Invoked with `did_timeout` — whether the scheduler considers the task
/// overdue (the work loop renders synchronously in that case, the
/// starvation-avoidance path). Returning `Some` asks the scheduler to run
/// the continuation in this task's place, keeping its token and priority.
pub struct Continuation(Box<dyn FnOnce(bool) -> Option<Continuation>>);

impl Continuation {
    pub fn new(f: impl FnOnce(bool) -> Option<Continuation> + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Consume and run the callback.
    pub fn run(self, did_timeout: bool) -> Option<Continuation> {
        (self.0)(did_timeout)
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Continuation")
    }
}

/// The collaborator contract a cooperative task scheduler must provide.
pub trait TaskScheduler {
    /// Enqueue `callback` at `priority`. Returns a token for cancellation.
    fn schedule_callback(
        &mut self,
        priority: SchedulerPriority,
        callback: Continuation,
    ) -> CallbackToken;

    /// Cancel a previously scheduled callback. Cancelling an already-run or
    /// unknown token is a no-op.
    fn cancel_callback(&mut self, token: CallbackToken);

    /// Whether the current task has used up its time slice and should yield
    /// back to the host.
    fn should_yield(&mut self) -> bool;

    /// The priority of the task currently executing (or the ambient
    /// priority outside of any task).
    fn current_priority(&self) -> SchedulerPriority;

    /// Run `f` with the ambient priority set to `priority`, restoring the
    /// previous priority afterwards. Updates dispatched inside `f` pick up
    /// their lane from this.
    fn run_with_priority(&mut self, priority: SchedulerPriority, f: Box<dyn FnOnce()>);
}
