//! The node tree: arena storage and the dual-buffer node model.

pub mod arena;
pub mod node;

pub use arena::{Arena, NodeKey};
pub use node::{Flags, MemoizedState, Node, NodeKind, NodeProps, OffscreenMode};
