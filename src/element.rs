//! Element descriptors.
//!
//! Applications describe what the host tree should look like as a tree of
//! plain [`Element`] values; the reconciler diffs consecutive descriptions
//! and mutates the host to match. Descriptors are cheap to clone (shared
//! payloads are reference-counted) and carry no host state.
//!
//! # Building elements
//!
//! ```ignore
//! use spark_reconciler::element::{host, text, component_fn};
//!
//! let app = component_fn(|cx, _props| {
//!     let (count, set_count) = cx.use_state(|| 0);
//!     Ok(host("div")
//!         .attr("class", "counter")
//!         .child(text(count.to_string()))
//!         .into())
//! });
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::host::{Attrs, InstanceId};
use crate::render::context::ContextId;
use crate::render::hooks::HookCx;
use crate::render::suspense::Suspend;

/// Positional key used by the keyed diff. Explicit keys beat positional
/// index matching when children reorder.
pub type Key = String;

/// A binding slot for a host instance, filled during the commit layout
/// phase and cleared when the instance unmounts or the ref is replaced.
pub type NodeRef = Rc<RefCell<Option<InstanceId>>>;

/// A function unit's render function.
///
/// Identity is pointer identity: create a component once and reuse the
/// handle across renders, or the diff will treat every render as a new
/// component type and remount the subtree.
pub type ComponentFn = Rc<dyn Fn(&mut HookCx<'_>, &Props) -> RenderResult>;

/// What a render returns: the child description, or a data-dependency
/// suspension to be handled by the nearest suspense boundary.
pub type RenderResult = Result<Element, Suspend>;

/// Wrap a closure as a [`ComponentFn`].
pub fn component_fn(f: impl Fn(&mut HookCx<'_>, &Props) -> RenderResult + 'static) -> ComponentFn {
    Rc::new(f)
}

// =============================================================================
// Props
// =============================================================================

/// Props handed to a function unit.
///
/// Host attributes and children carry the structural description; `payload`
/// carries an arbitrary typed value for component-specific props.
#[derive(Clone, Default)]
pub struct Props {
    pub attrs: Attrs,
    pub children: Vec<Element>,
    pub payload: Option<Rc<dyn Any>>,
}

impl Props {
    /// Downcast the payload to a concrete type.
    pub fn payload_as<T: 'static>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref())
    }
}

// =============================================================================
// Elements
// =============================================================================

/// One node of the declarative description consumed by the reconciler.
#[derive(Clone)]
pub enum Element {
    Host(HostElement),
    Text(String),
    Component(ComponentElement),
    Fragment(FragmentElement),
    Provider(ProviderElement),
    Suspense(SuspenseElement),
}

impl Element {
    /// The element's explicit key, if it has one.
    pub fn key(&self) -> Option<&Key> {
        match self {
            Element::Host(e) => e.key.as_ref(),
            Element::Component(e) => e.key.as_ref(),
            Element::Fragment(e) => e.key.as_ref(),
            Element::Text(_) | Element::Provider(_) | Element::Suspense(_) => None,
        }
    }
}

/// A host element: concrete tag, attributes, children.
#[derive(Clone)]
pub struct HostElement {
    pub tag: String,
    pub key: Option<Key>,
    pub node_ref: Option<NodeRef>,
    pub attrs: Attrs,
    pub children: Vec<Element>,
}

impl HostElement {
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn node_ref(mut self, node_ref: NodeRef) -> Self {
        self.node_ref = Some(node_ref);
        self
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }
}

/// A function unit invocation.
#[derive(Clone)]
pub struct ComponentElement {
    pub render: ComponentFn,
    pub key: Option<Key>,
    pub props: Props,
}

impl ComponentElement {
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn payload<T: 'static>(mut self, payload: T) -> Self {
        self.props.payload = Some(Rc::new(payload));
        self
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.props.children.push(child.into());
        self
    }
}

/// A keyless grouping of children, or a keyed one inside a list.
#[derive(Clone)]
pub struct FragmentElement {
    pub key: Option<Key>,
    pub children: Vec<Element>,
}

/// Provides a context value to every descendant until shadowed.
#[derive(Clone)]
pub struct ProviderElement {
    pub context: ContextId,
    pub value: Rc<dyn Any>,
    pub children: Vec<Element>,
}

/// A boundary that can show a fallback while its primary subtree waits for
/// external data.
#[derive(Clone)]
pub struct SuspenseElement {
    pub children: Vec<Element>,
    pub fallback: Vec<Element>,
}

// =============================================================================
// Constructors
// =============================================================================

/// Start a host element of the given tag.
pub fn host(tag: impl Into<String>) -> HostElement {
    HostElement {
        tag: tag.into(),
        key: None,
        node_ref: None,
        attrs: Attrs::new(),
        children: Vec::new(),
    }
}

/// A host text element.
pub fn text(content: impl Into<String>) -> Element {
    Element::Text(content.into())
}

/// Start a function unit invocation.
pub fn component(render: &ComponentFn) -> ComponentElement {
    ComponentElement {
        render: render.clone(),
        key: None,
        props: Props::default(),
    }
}

/// An unkeyed fragment. At the top of a child list it folds into its
/// children; inside a list it participates positionally.
pub fn fragment(children: impl IntoIterator<Item = Element>) -> Element {
    Element::Fragment(FragmentElement {
        key: None,
        children: children.into_iter().collect(),
    })
}

/// A keyed fragment: keeps its identity inside a keyed list.
pub fn keyed_fragment(key: impl Into<Key>, children: impl IntoIterator<Item = Element>) -> Element {
    Element::Fragment(FragmentElement {
        key: Some(key.into()),
        children: children.into_iter().collect(),
    })
}

/// A suspense boundary: `children` is the primary subtree, `fallback` what
/// shows while the primary is blocked on data.
pub fn suspense(
    fallback: impl IntoIterator<Item = Element>,
    children: impl IntoIterator<Item = Element>,
) -> Element {
    Element::Suspense(SuspenseElement {
        children: children.into_iter().collect(),
        fallback: fallback.into_iter().collect(),
    })
}

impl From<HostElement> for Element {
    fn from(e: HostElement) -> Self {
        Element::Host(e)
    }
}

impl From<ComponentElement> for Element {
    fn from(e: ComponentElement) -> Self {
        Element::Component(e)
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Element::Text(s.to_string())
    }
}

impl From<String> for Element {
    fn from(s: String) -> Self {
        Element::Text(s)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Host(e) => write!(f, "<{} ×{}>", e.tag, e.children.len()),
            Element::Text(s) => write!(f, "{s:?}"),
            Element::Component(e) => match &e.key {
                Some(key) => write!(f, "<component key={key:?}>"),
                None => write!(f, "<component>"),
            },
            Element::Fragment(e) => write!(f, "<fragment ×{}>", e.children.len()),
            Element::Provider(e) => write!(f, "<provider {:?}>", e.context),
            Element::Suspense(_) => write!(f, "<suspense>"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_builder() {
        let el = host("div")
            .attr("id", "root")
            .key("a")
            .child(text("hi"))
            .child(host("span"));

        assert_eq!(el.tag, "div");
        assert_eq!(el.attrs.get("id").map(String::as_str), Some("root"));
        assert_eq!(el.children.len(), 2);

        let el: Element = el.into();
        assert_eq!(el.key().map(String::as_str), Some("a"));
    }

    #[test]
    fn test_component_payload_downcast() {
        let render = component_fn(|_, _| Ok(text("x")));
        let el = component(&render).payload(42_u32);
        assert_eq!(el.props.payload_as::<u32>(), Some(&42));
        assert_eq!(el.props.payload_as::<i64>(), None);
    }

    #[test]
    fn test_text_conversions() {
        let a: Element = "hello".into();
        let b: Element = String::from("hello").into();
        match (a, b) {
            (Element::Text(a), Element::Text(b)) => assert_eq!(a, b),
            _ => panic!("expected text elements"),
        }
    }
}
