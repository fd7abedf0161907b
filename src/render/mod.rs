//! The render phase: per-node begin/complete visits, the keyed child diff,
//! the hook state machine, context stacks, and data-dependency suspension.

pub(crate) mod begin;
pub(crate) mod complete;
pub mod context;
pub(crate) mod diff;
pub mod hooks;
pub mod suspense;

pub use context::{Context, ContextId};
pub use hooks::{Cleanup, Dispatch, EffectRecord, EffectTags, Hook, HookCx, StartTransition};
pub use suspense::{Suspend, Wakeable, WakeableId};
