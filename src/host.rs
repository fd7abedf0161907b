//! Host adapter contract.
//!
//! The reconciler never touches a concrete host tree (a DOM, a terminal
//! grid, a scene graph) directly. Everything it needs from the host
//! environment goes through [`HostConfig`], and host nodes are referred to
//! by opaque [`InstanceId`] handles issued by the adapter.
//!
//! The commit phase is the only caller of the mutating methods, and it calls
//! them in a well-defined order (placements before ref attachment, deletions
//! as whole detached subtrees). `schedule_microtask` is used by the
//! scheduling layer to flush synchronous-lane work at microtask timing.

use std::collections::BTreeMap;

/// Host element attributes, as committed to the host tree.
pub type Attrs = BTreeMap<String, String>;

/// Opaque handle to a host instance (element, text node, or container).
///
/// Issued by the host adapter; the reconciler only stores and returns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u64);

/// The collaborator contract a host environment must provide.
pub trait HostConfig {
    /// Create a host element instance of the given kind. Children are
    /// attached afterwards with [`append_initial_child`](Self::append_initial_child).
    fn create_instance(&mut self, kind: &str, attrs: &Attrs) -> InstanceId;

    /// Create a host text instance.
    fn create_text_instance(&mut self, content: &str) -> InstanceId;

    /// Attach an already-created child to a parent still under construction
    /// (bottom-up assembly during the render phase, before the tree is live).
    fn append_initial_child(&mut self, parent: InstanceId, child: InstanceId);

    /// Append a child at the end of a live container's child list.
    fn append_child_to_container(&mut self, container: InstanceId, child: InstanceId);

    /// Insert a child into a live container before the given sibling.
    fn insert_child_to_container(
        &mut self,
        child: InstanceId,
        container: InstanceId,
        before: InstanceId,
    );

    /// Detach a child from a live container.
    fn remove_child(&mut self, child: InstanceId, container: InstanceId);

    /// Apply an attribute patch to an already-created element instance.
    fn commit_update(&mut self, instance: InstanceId, attrs: &Attrs);

    /// Apply new content to an already-created text instance.
    fn commit_text_update(&mut self, instance: InstanceId, content: &str);

    /// Toggle an element instance into its display-hidden state without
    /// detaching it.
    fn hide_instance(&mut self, instance: InstanceId);

    /// Undo [`hide_instance`](Self::hide_instance).
    fn unhide_instance(&mut self, instance: InstanceId);

    /// Hide a text instance (hosts typically blank the content).
    fn hide_text_instance(&mut self, instance: InstanceId);

    /// Restore a hidden text instance to the given content.
    fn unhide_text_instance(&mut self, instance: InstanceId, content: &str);

    /// Run `task` at microtask timing, after the current unit of host work
    /// but before yielding to the host's timer queue.
    fn schedule_microtask(&mut self, task: Box<dyn FnOnce()>);
}
