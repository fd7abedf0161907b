//! # spark-reconciler
//!
//! Incremental, priority-scheduled UI reconciliation runtime for Rust.
//!
//! Given a tree of declarative element descriptors, the reconciler computes
//! the minimal set of mutations needed to bring a persistent host tree into
//! agreement, and re-runs that computation incrementally — and, off the
//! synchronous lane, interruptibly — as application state changes.
//!
//! ## Architecture
//!
//! Two tree buffers (current and work-in-progress) live side by side in one
//! node arena, mirrored through per-node alternate links. Updates carry a
//! priority lane; the work loop picks the most urgent pending lane, walks
//! the tree one unit of work at a time (begin-work down, complete-work up),
//! and the commit phase applies the accumulated effect flags to the host:
//!
//! ```text
//! dispatch → update queue (lane-tagged) → work loop → begin/complete + diff
//!          → effect flags → commit (mutation, buffer swap, layout) → host
//! ```
//!
//! The host environment and the cooperative task scheduler are external
//! collaborators behind the [`host::HostConfig`] and
//! [`schedule::TaskScheduler`] traits; [`testkit`] provides in-memory
//! doubles of both.
//!
//! ## Modules
//!
//! - [`element`] - Element descriptors and builder helpers
//! - [`engine`] - Node arena and the dual-buffer tree
//! - [`schedule`] - Lane priority model, update queues, scheduler contract
//! - [`render`] - Begin/complete tree walk, keyed diff, hooks, suspense
//! - [`pipeline`] - Root handle, renderer session, work loop
//! - [`host`] - Host adapter contract
//! - [`testkit`] - Mock host, manual scheduler, suspendable resources

pub mod element;
pub mod engine;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod render;
pub mod schedule;
pub mod testkit;

mod commit;

// Re-export commonly used items
pub use element::{
    component, component_fn, fragment, host as host_element, keyed_fragment, suspense, text,
    ComponentFn, Element, Key, NodeRef, Props, RenderResult,
};

pub use error::FatalError;

pub use host::{Attrs, HostConfig, InstanceId};

pub use schedule::{
    process_update_queue, Action, CallbackToken, Continuation, Lane, Lanes, SchedulerPriority,
    TaskScheduler, Update, UpdateQueue,
};

pub use render::{
    Cleanup, Context, Dispatch, HookCx, StartTransition, Suspend, Wakeable,
};

pub use pipeline::Root;
