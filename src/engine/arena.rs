//! Node arena.
//!
//! Both tree buffers live in one slotmap; parent/child/sibling/alternate
//! relations are plain [`NodeKey`] fields. Handles are generational, so a
//! key held past its node's deletion reads back as absent instead of
//! aliasing a reused slot.
//!
//! The dual buffer is maintained by [`Arena::create_work_in_progress`]: the
//! first pass over a node allocates its alternate and cross-links the pair;
//! later passes reset the existing alternate's transient fields in place
//! instead of reallocating.

use slotmap::SlotMap;

use crate::element::Element;
use crate::engine::node::{Flags, Node, NodeKind, NodeProps, OffscreenMode};

slotmap::new_key_type! {
    /// Stable generational handle to a node.
    pub struct NodeKey;
}

/// Storage for every node of both buffers.
pub struct Arena {
    nodes: SlotMap<NodeKey, Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    pub fn insert(&mut self, node: Node) -> NodeKey {
        self.nodes.insert(node)
    }

    pub fn get(&self, key: NodeKey) -> &Node {
        &self.nodes[key]
    }

    pub fn get_mut(&mut self, key: NodeKey) -> &mut Node {
        &mut self.nodes[key]
    }

    pub fn try_get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // =========================================================================
    // Dual buffer
    // =========================================================================

    /// Clone `current` into its work-in-progress counterpart.
    ///
    /// Allocates and cross-links an alternate on first use; afterwards the
    /// same slot is reset and reused every pass. Identity fields, the shared
    /// update queue, the child pointer and the memoized props/state carry
    /// over; flags, subtree flags and staged deletions reset.
    pub fn create_work_in_progress(&mut self, current: NodeKey, pending_props: NodeProps) -> NodeKey {
        let wip = self.nodes[current].alternate;

        let wip = match wip {
            None => {
                let cur = &self.nodes[current];
                let mut node = Node::new(cur.kind.clone(), pending_props, cur.key.clone());
                node.instance = cur.instance;
                node.alternate = Some(current);
                let key = self.insert(node);
                self.nodes[current].alternate = Some(key);
                key
            }
            Some(wip) => {
                let node = &mut self.nodes[wip];
                node.pending_props = pending_props;
                node.flags = Flags::empty();
                node.subtree_flags = Flags::empty();
                node.deletions.clear();
                wip
            }
        };

        let cur = &self.nodes[current];
        let kind = cur.kind.clone();
        let node_ref = cur.node_ref.clone();
        let update_queue = cur.update_queue.clone();
        let child = cur.child;
        let memoized_props = cur.memoized_props.clone();
        let memoized_state = cur.memoized_state.clone();
        let instance = cur.instance;

        let node = &mut self.nodes[wip];
        node.kind = kind;
        node.node_ref = node_ref;
        node.update_queue = update_queue;
        node.child = child;
        node.memoized_props = memoized_props;
        node.memoized_state = memoized_state;
        node.instance = instance;
        wip
    }

    // =========================================================================
    // Node construction from elements
    // =========================================================================

    /// Create a fresh, unlinked node for an element description.
    pub fn node_from_element(&mut self, element: &Element) -> NodeKey {
        let node = match element {
            Element::Host(e) => {
                let mut node = Node::new(
                    NodeKind::Host(e.tag.clone()),
                    NodeProps::Host {
                        attrs: e.attrs.clone(),
                        children: e.children.clone(),
                    },
                    e.key.clone(),
                );
                node.node_ref = e.node_ref.clone();
                node
            }
            Element::Text(content) => {
                Node::new(NodeKind::Text, NodeProps::Text(content.clone()), None)
            }
            Element::Component(e) => Node::new(
                NodeKind::Function(e.render.clone()),
                NodeProps::Component(e.props.clone()),
                e.key.clone(),
            ),
            Element::Fragment(e) => Node::new(
                NodeKind::Fragment,
                NodeProps::Children(e.children.clone()),
                e.key.clone(),
            ),
            Element::Provider(e) => Node::new(
                NodeKind::Provider(e.context),
                NodeProps::Provider {
                    value: e.value.clone(),
                    children: e.children.clone(),
                },
                None,
            ),
            Element::Suspense(e) => Node::new(
                NodeKind::Suspense,
                NodeProps::Suspense {
                    children: e.children.clone(),
                    fallback: e.fallback.clone(),
                },
                None,
            ),
        };
        self.insert(node)
    }

    /// Create a fresh fragment node holding `children`.
    pub fn node_from_fragment(
        &mut self,
        children: Vec<Element>,
        key: Option<crate::element::Key>,
    ) -> NodeKey {
        self.insert(Node::new(
            NodeKind::Fragment,
            NodeProps::Children(children),
            key,
        ))
    }

    /// Create a fresh offscreen container node.
    pub fn node_from_offscreen(&mut self, mode: OffscreenMode, children: Vec<Element>) -> NodeKey {
        self.insert(Node::new(
            NodeKind::Offscreen,
            NodeProps::Offscreen { mode, children },
            None,
        ))
    }

    /// Create a fresh text node.
    pub fn node_from_text(&mut self, content: String) -> NodeKey {
        self.insert(Node::new(NodeKind::Text, NodeProps::Text(content), None))
    }

    // =========================================================================
    // Freeing
    // =========================================================================

    /// Remove a detached subtree and every alternate of its nodes.
    ///
    /// Only call after the subtree has been detached from both buffers (the
    /// commit deletion path); stale keys elsewhere read back as absent.
    pub fn free_subtree(&mut self, root: NodeKey) {
        let mut stack = vec![root];
        let mut doomed = Vec::new();
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if let Some(alt) = node.alternate {
                doomed.push(alt);
            }
            let mut child = node.child;
            doomed.push(key);
            while let Some(c) = child {
                stack.push(c);
                child = self.nodes.get(c).and_then(|n| n.sibling);
            }
        }
        for key in doomed {
            self.nodes.remove(key);
        }
    }

    /// Remove the freshly mounted (alternate-less) nodes of a discarded
    /// work-in-progress pass. Nodes with an alternate stay: they are shared
    /// with the current tree and will be reset on the next pass.
    pub fn free_discarded_pass(&mut self, wip_root: NodeKey) {
        let mut stack = vec![wip_root];
        let mut doomed = Vec::new();
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            let mut child = node.child;
            while let Some(c) = child {
                stack.push(c);
                child = self.nodes.get(c).and_then(|n| n.sibling);
            }
            if node.alternate.is_none() {
                doomed.push(key);
            }
        }
        for key in doomed {
            self.nodes.remove(key);
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{host, text};

    #[test]
    fn test_create_work_in_progress_links_alternates() {
        let mut arena = Arena::new();
        let el = host("div").into();
        let current = arena.node_from_element(&el);

        let wip = arena.create_work_in_progress(current, NodeProps::Children(Vec::new()));
        assert_eq!(arena.get(current).alternate, Some(wip));
        assert_eq!(arena.get(wip).alternate, Some(current));

        // Second pass reuses the same slot.
        let wip2 = arena.create_work_in_progress(current, NodeProps::Children(Vec::new()));
        assert_eq!(wip, wip2);
    }

    #[test]
    fn test_create_work_in_progress_resets_transient_fields() {
        let mut arena = Arena::new();
        let el = host("div").into();
        let current = arena.node_from_element(&el);
        let wip = arena.create_work_in_progress(current, NodeProps::Children(Vec::new()));

        let extra = arena.node_from_element(&text("x"));
        {
            let node = arena.get_mut(wip);
            node.flags = Flags::PLACEMENT;
            node.subtree_flags = Flags::UPDATE;
            node.deletions.push(extra);
        }

        arena.create_work_in_progress(current, NodeProps::Children(Vec::new()));
        let node = arena.get(wip);
        assert_eq!(node.flags, Flags::empty());
        assert_eq!(node.subtree_flags, Flags::empty());
        assert!(node.deletions.is_empty());
    }

    #[test]
    fn test_free_subtree_removes_children_and_alternates() {
        let mut arena = Arena::new();
        let parent = arena.node_from_element(&host("div").into());
        let child = arena.node_from_element(&text("x"));
        arena.get_mut(parent).child = Some(child);
        arena.get_mut(child).parent = Some(parent);
        let alt = arena.create_work_in_progress(parent, NodeProps::Children(Vec::new()));

        arena.free_subtree(parent);
        assert!(!arena.contains(parent));
        assert!(!arena.contains(child));
        assert!(!arena.contains(alt));
    }

    #[test]
    fn test_free_discarded_pass_keeps_shared_nodes() {
        let mut arena = Arena::new();
        let current = arena.node_from_element(&host("div").into());
        let wip = arena.create_work_in_progress(current, NodeProps::Children(Vec::new()));
        let fresh = arena.node_from_element(&text("new"));
        arena.get_mut(wip).child = Some(fresh);

        arena.free_discarded_pass(wip);
        assert!(arena.contains(current));
        assert!(arena.contains(wip));
        assert!(!arena.contains(fresh));
    }
}
