//! Test and development doubles for the two external collaborators.
//!
//! - [`MockHost`] — an in-memory host tree that records every host call as
//!   a [`HostOp`] and can render structural snapshots.
//! - [`ManualScheduler`] — a cooperative scheduler driven by hand: tests
//!   decide when tasks run, what the ambient priority is, and when the
//!   yield signal fires.
//! - [`Resource`] — a suspendable async value backed by a [`Wakeable`].
//! - [`Rig`] — the three wired to a [`Root`], with a quiescence flush.
//!
//! Handles are cheap clones sharing interior state, so a test can keep one
//! while the reconciler owns the other.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::host::{Attrs, HostConfig, InstanceId};
use crate::pipeline::Root;
use crate::render::suspense::{Suspend, Wakeable};
use crate::schedule::{CallbackToken, Continuation, SchedulerPriority, TaskScheduler};

// =============================================================================
// Mock host
// =============================================================================

/// Every host mutation the reconciler performed, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateInstance(InstanceId, String),
    CreateText(InstanceId, String),
    AppendInitial { parent: InstanceId, child: InstanceId },
    AppendToContainer { container: InstanceId, child: InstanceId },
    InsertToContainer { child: InstanceId, container: InstanceId, before: InstanceId },
    RemoveChild { child: InstanceId, container: InstanceId },
    UpdateInstance(InstanceId, Attrs),
    UpdateText(InstanceId, String),
    Hide(InstanceId),
    Unhide(InstanceId),
}

#[derive(Debug, Default)]
struct MockInstance {
    tag: String,
    attrs: Attrs,
    text: Option<String>,
    children: Vec<InstanceId>,
    hidden: bool,
}

#[derive(Default)]
struct MockHostInner {
    nodes: HashMap<InstanceId, MockInstance>,
    next_id: u64,
    ops: Vec<HostOp>,
    microtasks: Vec<Box<dyn FnOnce()>>,
}

/// In-memory host adapter; clones share the same tree.
#[derive(Clone, Default)]
pub struct MockHost {
    inner: Rc<RefCell<MockHostInner>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a standalone container to mount a root into.
    pub fn create_container(&self) -> InstanceId {
        let mut inner = self.inner.borrow_mut();
        let id = InstanceId(inner.next_id);
        inner.next_id += 1;
        inner.nodes.insert(
            id,
            MockInstance {
                tag: "#container".to_string(),
                ..Default::default()
            },
        );
        id
    }

    /// Recorded host operations so far.
    pub fn ops(&self) -> Vec<HostOp> {
        self.inner.borrow().ops.clone()
    }

    /// Take and clear the recorded operations.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut self.inner.borrow_mut().ops)
    }

    /// Run the queued microtasks (once through; newly queued ones wait for
    /// the next call). Returns whether any ran.
    pub fn flush_microtasks(&self) -> bool {
        let tasks = std::mem::take(&mut self.inner.borrow_mut().microtasks);
        let ran = !tasks.is_empty();
        for task in tasks {
            task();
        }
        ran
    }

    /// Structural snapshot of a subtree, e.g.
    /// `<div id="a"><span>"hi"</span></div>`. Hidden instances are
    /// bracketed.
    pub fn snapshot(&self, root: InstanceId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        render_snapshot(&inner, root, &mut out);
        out
    }

    fn alloc(&self, instance: MockInstance) -> InstanceId {
        let mut inner = self.inner.borrow_mut();
        let id = InstanceId(inner.next_id);
        inner.next_id += 1;
        inner.nodes.insert(id, instance);
        id
    }
}

fn render_snapshot(inner: &MockHostInner, id: InstanceId, out: &mut String) {
    let Some(node) = inner.nodes.get(&id) else {
        out.push_str("<missing>");
        return;
    };
    if node.hidden {
        out.push('[');
    }
    if let Some(text) = &node.text {
        out.push('"');
        out.push_str(text);
        out.push('"');
    } else {
        out.push('<');
        out.push_str(&node.tag);
        for (name, value) in &node.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }
        out.push('>');
        for child in &node.children {
            render_snapshot(inner, *child, out);
        }
        out.push_str("</");
        out.push_str(&node.tag);
        out.push('>');
    }
    if node.hidden {
        out.push(']');
    }
}

impl HostConfig for MockHost {
    fn create_instance(&mut self, kind: &str, attrs: &Attrs) -> InstanceId {
        let id = self.alloc(MockInstance {
            tag: kind.to_string(),
            attrs: attrs.clone(),
            ..Default::default()
        });
        self.inner
            .borrow_mut()
            .ops
            .push(HostOp::CreateInstance(id, kind.to_string()));
        id
    }

    fn create_text_instance(&mut self, content: &str) -> InstanceId {
        let id = self.alloc(MockInstance {
            tag: "#text".to_string(),
            text: Some(content.to_string()),
            ..Default::default()
        });
        self.inner
            .borrow_mut()
            .ops
            .push(HostOp::CreateText(id, content.to_string()));
        id
    }

    fn append_initial_child(&mut self, parent: InstanceId, child: InstanceId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(node) = inner.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        inner.ops.push(HostOp::AppendInitial { parent, child });
    }

    fn append_child_to_container(&mut self, container: InstanceId, child: InstanceId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(node) = inner.nodes.get_mut(&container) {
            node.children.retain(|c| *c != child);
            node.children.push(child);
        }
        inner.ops.push(HostOp::AppendToContainer { container, child });
    }

    fn insert_child_to_container(
        &mut self,
        child: InstanceId,
        container: InstanceId,
        before: InstanceId,
    ) {
        let mut inner = self.inner.borrow_mut();
        if let Some(node) = inner.nodes.get_mut(&container) {
            node.children.retain(|c| *c != child);
            let at = node
                .children
                .iter()
                .position(|c| *c == before)
                .unwrap_or(node.children.len());
            node.children.insert(at, child);
        }
        inner.ops.push(HostOp::InsertToContainer {
            child,
            container,
            before,
        });
    }

    fn remove_child(&mut self, child: InstanceId, container: InstanceId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(node) = inner.nodes.get_mut(&container) {
            node.children.retain(|c| *c != child);
        }
        inner.ops.push(HostOp::RemoveChild { child, container });
    }

    fn commit_update(&mut self, instance: InstanceId, attrs: &Attrs) {
        let mut inner = self.inner.borrow_mut();
        if let Some(node) = inner.nodes.get_mut(&instance) {
            node.attrs = attrs.clone();
        }
        inner.ops.push(HostOp::UpdateInstance(instance, attrs.clone()));
    }

    fn commit_text_update(&mut self, instance: InstanceId, content: &str) {
        let mut inner = self.inner.borrow_mut();
        if let Some(node) = inner.nodes.get_mut(&instance) {
            node.text = Some(content.to_string());
        }
        inner.ops.push(HostOp::UpdateText(instance, content.to_string()));
    }

    fn hide_instance(&mut self, instance: InstanceId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(node) = inner.nodes.get_mut(&instance) {
            node.hidden = true;
        }
        inner.ops.push(HostOp::Hide(instance));
    }

    fn unhide_instance(&mut self, instance: InstanceId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(node) = inner.nodes.get_mut(&instance) {
            node.hidden = false;
        }
        inner.ops.push(HostOp::Unhide(instance));
    }

    fn hide_text_instance(&mut self, instance: InstanceId) {
        self.hide_instance(instance);
    }

    fn unhide_text_instance(&mut self, instance: InstanceId, content: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            if let Some(node) = inner.nodes.get_mut(&instance) {
                node.text = Some(content.to_string());
            }
        }
        self.unhide_instance(instance);
    }

    fn schedule_microtask(&mut self, task: Box<dyn FnOnce()>) {
        self.inner.borrow_mut().microtasks.push(task);
    }
}

// =============================================================================
// Manual scheduler
// =============================================================================

struct ScheduledTask {
    token: CallbackToken,
    priority: SchedulerPriority,
    seq: u64,
    callback: Continuation,
}

#[derive(Default)]
struct SchedulerInner {
    tasks: Vec<ScheduledTask>,
    next_token: u64,
    next_seq: u64,
    current_priority: Option<SchedulerPriority>,
    yield_after: Option<u32>,
}

/// Hand-driven cooperative scheduler; clones share the same queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_tasks(&self) -> bool {
        !self.inner.borrow().tasks.is_empty()
    }

    /// Make `should_yield` report true after the next `units` polls of the
    /// work loop (then keep yielding until re-armed). `None` never yields.
    pub fn set_yield_after(&self, units: Option<u32>) {
        self.inner.borrow_mut().yield_after = units;
    }

    /// Run the most urgent task once. A returned continuation keeps the
    /// task's token and place in the queue. Returns whether a task ran.
    pub fn run_next_task(&self, did_timeout: bool) -> bool {
        let task = {
            let mut inner = self.inner.borrow_mut();
            let best = inner
                .tasks
                .iter()
                .enumerate()
                .min_by_key(|(_, t)| (t.priority, t.seq))
                .map(|(i, _)| i);
            match best {
                None => return false,
                Some(i) => inner.tasks.remove(i),
            }
        };

        let previous = {
            let mut inner = self.inner.borrow_mut();
            inner.current_priority.replace(task.priority)
        };

        let continuation = task.callback.run(did_timeout);

        {
            let mut inner = self.inner.borrow_mut();
            inner.current_priority = previous;
            if let Some(callback) = continuation {
                inner.tasks.push(ScheduledTask {
                    token: task.token,
                    priority: task.priority,
                    seq: task.seq,
                    callback,
                });
            }
        }
        true
    }

    /// Run `f` at `priority` without going through the task queue (models
    /// dispatching from inside an event handler of that priority).
    pub fn run_at(&self, priority: SchedulerPriority, f: impl FnOnce()) {
        let previous = self.inner.borrow_mut().current_priority.replace(priority);
        f();
        self.inner.borrow_mut().current_priority = previous;
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule_callback(
        &mut self,
        priority: SchedulerPriority,
        callback: Continuation,
    ) -> CallbackToken {
        let mut inner = self.inner.borrow_mut();
        let token = CallbackToken(inner.next_token);
        inner.next_token += 1;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.push(ScheduledTask {
            token,
            priority,
            seq,
            callback,
        });
        token
    }

    fn cancel_callback(&mut self, token: CallbackToken) {
        self.inner.borrow_mut().tasks.retain(|t| t.token != token);
    }

    fn should_yield(&mut self) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.yield_after {
            None => false,
            Some(0) => true,
            Some(n) => {
                inner.yield_after = Some(n - 1);
                false
            }
        }
    }

    fn current_priority(&self) -> SchedulerPriority {
        self.inner
            .borrow()
            .current_priority
            .unwrap_or(SchedulerPriority::Normal)
    }

    fn run_with_priority(&mut self, priority: SchedulerPriority, f: Box<dyn FnOnce()>) {
        self.run_at(priority, f);
    }
}

// =============================================================================
// Resource
// =============================================================================

struct ResourceInner<T> {
    value: Option<T>,
    wakeable: Wakeable,
}

/// A suspendable async value: reads suspend until [`resolve`](Resource::resolve).
pub struct Resource<T> {
    inner: Rc<RefCell<ResourceInner<T>>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> Resource<T> {
    pub fn pending() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ResourceInner {
                value: None,
                wakeable: Wakeable::new(),
            })),
        }
    }

    pub fn ready(value: T) -> Self {
        let resource = Self::pending();
        resource.resolve(value);
        resource
    }

    /// The value, or a suspension to propagate with `?`.
    pub fn read(&self) -> Result<T, Suspend> {
        let inner = self.inner.borrow();
        match &inner.value {
            Some(value) => Ok(value.clone()),
            None => Err(Suspend::from(&inner.wakeable)),
        }
    }

    pub fn resolve(&self, value: T) {
        let wakeable = {
            let mut inner = self.inner.borrow_mut();
            inner.value = Some(value);
            inner.wakeable.clone()
        };
        wakeable.resolve();
    }
}

// =============================================================================
// Rig
// =============================================================================

/// A root wired to a mock host and manual scheduler.
pub struct Rig {
    pub root: Root,
    pub host: MockHost,
    pub scheduler: ManualScheduler,
    pub container: InstanceId,
}

/// Build a fresh rig.
pub fn rig() -> Rig {
    let host = MockHost::new();
    let container = host.create_container();
    let scheduler = ManualScheduler::new();
    let root = Root::new(host.clone(), scheduler.clone(), container);
    Rig {
        root,
        host,
        scheduler,
        container,
    }
}

impl Rig {
    /// Drain microtasks and scheduler tasks until nothing is left.
    pub fn flush(&self) {
        for _ in 0..10_000 {
            let mut progressed = self.host.flush_microtasks();
            if self.scheduler.run_next_task(false) {
                progressed = true;
            }
            if !progressed {
                return;
            }
        }
        panic!("rig did not quiesce after 10000 steps");
    }

    /// Structural snapshot of the mounted container.
    pub fn snapshot(&self) -> String {
        self.host.snapshot(self.container)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_host_tree_and_snapshot() {
        let mut host = MockHost::new();
        let container = host.create_container();

        let div = host.create_instance("div", &Attrs::from([("id".into(), "a".into())]));
        let text = host.create_text_instance("hi");
        host.append_initial_child(div, text);
        host.append_child_to_container(container, div);

        assert_eq!(
            host.snapshot(container),
            "<#container><div id=\"a\">\"hi\"</div></#container>"
        );

        host.remove_child(div, container);
        assert_eq!(host.snapshot(container), "<#container></#container>");
    }

    #[test]
    fn test_insert_before_positions_child() {
        let mut host = MockHost::new();
        let container = host.create_container();
        let a = host.create_text_instance("a");
        let b = host.create_text_instance("b");
        host.append_child_to_container(container, b);
        host.insert_child_to_container(a, container, b);
        assert_eq!(host.snapshot(container), "<#container>\"a\"\"b\"</#container>");
    }

    #[test]
    fn test_manual_scheduler_orders_by_priority_then_seq() {
        let mut scheduler = ManualScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (priority, name) in [
            (SchedulerPriority::Normal, "n1"),
            (SchedulerPriority::Immediate, "i"),
            (SchedulerPriority::Normal, "n2"),
        ] {
            let order = order.clone();
            scheduler.schedule_callback(
                priority,
                Continuation::new(move |_| {
                    order.borrow_mut().push(name);
                    None
                }),
            );
        }

        while scheduler.run_next_task(false) {}
        assert_eq!(*order.borrow(), vec!["i", "n1", "n2"]);
    }

    #[test]
    fn test_manual_scheduler_cancel() {
        let mut scheduler = ManualScheduler::new();
        let ran = Rc::new(RefCell::new(false));
        let r = ran.clone();
        let token = scheduler.schedule_callback(
            SchedulerPriority::Normal,
            Continuation::new(move |_| {
                *r.borrow_mut() = true;
                None
            }),
        );
        scheduler.cancel_callback(token);
        assert!(!scheduler.run_next_task(false));
        assert!(!*ran.borrow());
    }

    #[test]
    fn test_yield_after_counts_down() {
        let mut scheduler = ManualScheduler::new();
        scheduler.set_yield_after(Some(2));
        assert!(!scheduler.should_yield());
        assert!(!scheduler.should_yield());
        assert!(scheduler.should_yield());
        assert!(scheduler.should_yield());
    }

    #[test]
    fn test_resource_read_then_resolve() {
        let resource: Resource<i32> = Resource::pending();
        assert!(resource.read().is_err());
        resource.resolve(7);
        assert_eq!(resource.read().ok(), Some(7));
    }
}
