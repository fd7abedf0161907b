//! Tree nodes.
//!
//! One [`Node`] exists per tree position, across both buffers. A node in
//! the work-in-progress buffer mirrors its counterpart in the current
//! buffer through the `alternate` back-reference; identity (kind + key) is
//! what the diff compares, and the effect [`Flags`] record what the commit
//! phase must do to the host tree for this node.
//!
//! `subtree_flags` is the bitwise union of every descendant's own and
//! subtree flags, recomputed bottom-up each completed pass, so commit can
//! skip entire effect-free subtrees without visiting them.

use std::any::Any;
use std::rc::Rc;

use crate::element::{ComponentFn, Element, Key, NodeRef, Props};
use crate::engine::arena::NodeKey;
use crate::host::{Attrs, InstanceId};
use crate::render::context::ContextId;
use crate::render::hooks::Hook;
use crate::schedule::UpdateQueue;

// =============================================================================
// Effect flags
// =============================================================================

bitflags::bitflags! {
    /// Per-node effect flags, plus the masks gating each commit sub-phase.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u32 {
        /// Host instance must be attached (insertion or move).
        const PLACEMENT = 1 << 1;
        /// Host instance content/attributes must be patched.
        const UPDATE = 1 << 2;
        /// One or more children are staged for deletion on this node.
        const CHILD_DELETION = 1 << 3;
        /// A passive effect must run after this commit.
        const PASSIVE_EFFECT = 1 << 4;
        /// Ref binding must be detached (mutation) and reattached (layout).
        const REF = 1 << 5;
        /// An offscreen container's visibility changed.
        const VISIBILITY = 1 << 6;
        /// A suspense boundary captured a suspension this pass.
        const DID_CAPTURE = 1 << 7;
        /// A suspension occurred below; the boundary should capture during
        /// unwind.
        const SHOULD_CAPTURE = 1 << 8;

        /// Work performed by the commit mutation sub-phase.
        const MUTATION_MASK = Self::PLACEMENT.bits()
            | Self::UPDATE.bits()
            | Self::CHILD_DELETION.bits()
            | Self::REF.bits()
            | Self::VISIBILITY.bits();
        /// Work performed by the commit layout sub-phase.
        const LAYOUT_MASK = Self::REF.bits();
        /// Flags that require scheduling a passive-effect flush.
        const PASSIVE_MASK = Self::PASSIVE_EFFECT.bits() | Self::CHILD_DELETION.bits();
    }
}

// =============================================================================
// Node kinds and per-kind props
// =============================================================================

/// Whether an offscreen container's subtree is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffscreenMode {
    #[default]
    Visible,
    Hidden,
}

/// The closed set of node kinds, with type identity embedded where the kind
/// carries one (host tag, component function, context).
#[derive(Clone)]
pub enum NodeKind {
    /// The anchor at the top of a root's tree; owns the root update queue.
    Root,
    /// A concrete host element.
    Host(String),
    /// A host text node.
    Text,
    /// A function unit; state lives in its hook chain.
    Function(ComponentFn),
    /// A transparent grouping node.
    Fragment,
    /// Pushes a context value for its subtree.
    Provider(ContextId),
    /// A boundary that can swap between primary and fallback subtrees.
    Suspense,
    /// Container whose subtree can be hidden without unmounting.
    Offscreen,
}

impl NodeKind {
    /// Whether two kinds are the same node type for reuse purposes.
    /// Function identity is render-function pointer identity.
    pub fn same_type(&self, other: &NodeKind) -> bool {
        match (self, other) {
            (NodeKind::Root, NodeKind::Root) => true,
            (NodeKind::Host(a), NodeKind::Host(b)) => a == b,
            (NodeKind::Text, NodeKind::Text) => true,
            (NodeKind::Function(a), NodeKind::Function(b)) => Rc::ptr_eq(a, b),
            (NodeKind::Fragment, NodeKind::Fragment) => true,
            (NodeKind::Provider(a), NodeKind::Provider(b)) => a == b,
            (NodeKind::Suspense, NodeKind::Suspense) => true,
            (NodeKind::Offscreen, NodeKind::Offscreen) => true,
            _ => false,
        }
    }

    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Host(_) => "host",
            NodeKind::Text => "text",
            NodeKind::Function(_) => "function",
            NodeKind::Fragment => "fragment",
            NodeKind::Provider(_) => "provider",
            NodeKind::Suspense => "suspense",
            NodeKind::Offscreen => "offscreen",
        }
    }
}

impl std::fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Host(tag) => write!(f, "host<{tag}>"),
            other => f.write_str(other.name()),
        }
    }
}

/// Per-kind pending/memoized props.
#[derive(Clone)]
pub enum NodeProps {
    Root,
    Host {
        attrs: Attrs,
        children: Vec<Element>,
    },
    Text(String),
    Component(Props),
    Children(Vec<Element>),
    Offscreen {
        mode: OffscreenMode,
        children: Vec<Element>,
    },
    Provider {
        value: Rc<dyn Any>,
        children: Vec<Element>,
    },
    Suspense {
        children: Vec<Element>,
        fallback: Vec<Element>,
    },
}

/// The opaque state slot: the hook chain for function units, the processed
/// element for the root, nothing otherwise.
#[derive(Clone, Default)]
pub enum MemoizedState {
    #[default]
    None,
    /// Root: the element description computed from the root update queue.
    Element(Option<Element>),
    /// Function unit: its hook records, in call order.
    Hooks(Vec<Hook>),
}

// =============================================================================
// Node
// =============================================================================

/// One tree position in one buffer.
pub struct Node {
    pub kind: NodeKind,
    pub key: Option<Key>,
    pub node_ref: Option<NodeRef>,

    /// Props this pass is working from.
    pub pending_props: NodeProps,
    /// Props as of the last completed visit.
    pub memoized_props: Option<NodeProps>,
    pub memoized_state: MemoizedState,
    /// Root element queue; hook queues live inside the hook chain.
    pub update_queue: Option<UpdateQueue<Option<Element>>>,
    /// Host instance, once created (host and text kinds).
    pub instance: Option<InstanceId>,

    pub parent: Option<NodeKey>,
    pub child: Option<NodeKey>,
    pub sibling: Option<NodeKey>,
    /// Position among siblings; stable only within one pass.
    pub index: u32,

    /// Counterpart in the other buffer.
    pub alternate: Option<NodeKey>,

    pub flags: Flags,
    pub subtree_flags: Flags,
    /// Children staged for deletion at commit.
    pub deletions: Vec<NodeKey>,
}

impl Node {
    /// A fresh, unlinked node.
    pub fn new(kind: NodeKind, pending_props: NodeProps, key: Option<Key>) -> Self {
        Self {
            kind,
            key,
            node_ref: None,
            pending_props,
            memoized_props: None,
            memoized_state: MemoizedState::None,
            update_queue: None,
            instance: None,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            alternate: None,
            flags: Flags::empty(),
            subtree_flags: Flags::empty(),
            deletions: Vec::new(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::component_fn;

    #[test]
    fn test_masks_cover_their_flags() {
        assert!(Flags::MUTATION_MASK.contains(Flags::PLACEMENT));
        assert!(Flags::MUTATION_MASK.contains(Flags::VISIBILITY));
        assert!(!Flags::MUTATION_MASK.contains(Flags::PASSIVE_EFFECT));
        assert!(Flags::PASSIVE_MASK.contains(Flags::CHILD_DELETION));
        assert_eq!(Flags::LAYOUT_MASK, Flags::REF);
    }

    #[test]
    fn test_same_type_host_compares_tags() {
        let a = NodeKind::Host("div".into());
        let b = NodeKind::Host("div".into());
        let c = NodeKind::Host("span".into());
        assert!(a.same_type(&b));
        assert!(!a.same_type(&c));
        assert!(!a.same_type(&NodeKind::Text));
    }

    #[test]
    fn test_same_type_function_is_pointer_identity() {
        let f = component_fn(|_, _| Ok(crate::element::text("")));
        let g = component_fn(|_, _| Ok(crate::element::text("")));
        assert!(NodeKind::Function(f.clone()).same_type(&NodeKind::Function(f.clone())));
        assert!(!NodeKind::Function(f).same_type(&NodeKind::Function(g)));
    }
}
