//! The component tree
//!
//! A [`Component`] is one element of the processed tree: identity,
//! attribute bag, ordered children, named facets, render/transience flags,
//! and an injected [`Behavior`]. Trees are built from
//! [`ComponentHandle`]s (`Rc<RefCell<Component>>`); the parent edge is a
//! weak back-reference, never an ownership edge.
//!
//! Structural invariants enforced here:
//! - a component has exactly one parent, or none at a root
//! - child and facet membership are mutually exclusive
//! - ids are non-empty, use letters/digits/'-'/'_', and never begin with
//!   the separator char or the generated-id prefix

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::behavior::{Behavior, NodeRef};
use crate::context::RequestContext;
use crate::error::{EngineError, Result};
use crate::events::{EventListener, ListenerEntry};
use crate::types::{ListenerPhase, GENERATED_ID_PREFIX, SEPARATOR_CHAR};

/// Shared handle to a component in a tree
pub type ComponentHandle = Rc<RefCell<Component>>;

type ParentRef = Weak<RefCell<Component>>;

/// Check a component id against the identifier rules
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with(SEPARATOR_CHAR)
        && !id.starts_with(GENERATED_ID_PREFIX)
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_id(id: &str) -> Result<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(EngineError::InvalidId(id.to_string()))
    }
}

/// Structure and flags of a component, independent of its behavior.
///
/// Behavior hooks receive this mutably alongside the request context, so a
/// behavior can mark its component invalid or read stored attributes while
/// the component itself is mutably borrowed.
pub struct ComponentCore {
    id: String,
    attributes: serde_json::Map<String, serde_json::Value>,
    children: Vec<ComponentHandle>,
    facets: IndexMap<String, ComponentHandle>,
    parent: ParentRef,
    rendered: bool,
    transient: bool,
    valid: bool,
    listeners: Vec<ListenerEntry>,
    next_listener_id: u64,
}

impl ComponentCore {
    fn new(id: String) -> Self {
        Self {
            id,
            attributes: serde_json::Map::new(),
            children: Vec::new(),
            facets: IndexMap::new(),
            parent: Weak::new(),
            rendered: true,
            transient: false,
            valid: true,
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    /// Component identifier, unique among siblings
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this component participates in output generation
    pub fn rendered(&self) -> bool {
        self.rendered
    }

    /// Set the rendered flag
    pub fn set_rendered(&mut self, rendered: bool) {
        self.rendered = rendered;
    }

    /// Whether this component is excluded from state capture
    pub fn transient(&self) -> bool {
        self.transient
    }

    /// Set the transient flag
    pub fn set_transient(&mut self, transient: bool) {
        self.transient = transient;
    }

    /// Whether decoded input passed conversion/validation so far
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Set the valid flag
    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Attributes stored directly in the map (property-backed names are
    /// never stored here)
    pub fn stored_attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }
}

/// One element of the component tree
pub struct Component {
    core: ComponentCore,
    behavior: Box<dyn Behavior>,
}

impl Component {
    /// Create a detached component with the given id and behavior
    pub fn new(id: impl Into<String>, behavior: Box<dyn Behavior>) -> Result<ComponentHandle> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Rc::new(RefCell::new(Component {
            core: ComponentCore::new(id),
            behavior,
        })))
    }

    /// Component identifier
    pub fn id(&self) -> &str {
        &self.core.id
    }

    /// Change the component identifier
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        validate_id(&id)?;
        self.core.id = id;
        Ok(())
    }

    /// The injected behavior
    pub fn behavior(&self) -> &dyn Behavior {
        self.behavior.as_ref()
    }

    /// The injected behavior, mutably
    pub fn behavior_mut(&mut self) -> &mut dyn Behavior {
        self.behavior.as_mut()
    }

    /// Structure and flags
    pub fn core(&self) -> &ComponentCore {
        &self.core
    }

    /// Structure and flags, mutably
    pub fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    /// Whether this component bounds identifier search
    pub fn is_naming_container(&self) -> bool {
        self.behavior.is_naming_container()
    }

    /// Whether this component participates in output generation
    pub fn rendered(&self) -> bool {
        self.core.rendered
    }

    /// Set the rendered flag
    pub fn set_rendered(&mut self, rendered: bool) {
        self.core.rendered = rendered;
    }

    /// Whether this component is excluded from state capture
    pub fn transient(&self) -> bool {
        self.core.transient
    }

    /// Set the transient flag
    pub fn set_transient(&mut self, transient: bool) {
        self.core.transient = transient;
    }

    /// Whether decoded input passed conversion/validation so far
    pub fn valid(&self) -> bool {
        self.core.valid
    }

    /// The parent component, if attached
    pub fn parent(&self) -> Option<ComponentHandle> {
        self.core.parent.upgrade()
    }

    /// Ordered child components
    pub fn children(&self) -> &[ComponentHandle] {
        &self.core.children
    }

    /// Number of children
    pub fn child_count(&self) -> usize {
        self.core.children.len()
    }

    /// Named facets, in insertion order
    pub fn facets(&self) -> &IndexMap<String, ComponentHandle> {
        &self.core.facets
    }

    /// Look up a facet by name
    pub fn facet(&self, name: &str) -> Option<ComponentHandle> {
        self.core.facets.get(name).cloned()
    }

    /// Facets (in insertion order) followed by children (in child order)
    pub fn facets_and_children(&self) -> Vec<ComponentHandle> {
        self.core
            .facets
            .values()
            .cloned()
            .chain(self.core.children.iter().cloned())
            .collect()
    }

    /// Read an attribute, deferring to property accessors for aliased names
    pub fn attribute(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "id" => Some(serde_json::Value::String(self.core.id.clone())),
            "rendered" => Some(serde_json::Value::Bool(self.core.rendered)),
            "transient" => Some(serde_json::Value::Bool(self.core.transient)),
            _ => self
                .behavior
                .property(name)
                .or_else(|| self.core.attributes.get(name).cloned()),
        }
    }

    /// Write an attribute, deferring to property accessors for aliased names
    pub fn set_attribute(&mut self, name: &str, value: serde_json::Value) -> Result<()> {
        match name {
            "id" => {
                let id = value.as_str().ok_or(EngineError::AttributeType {
                    name: name.to_string(),
                    expected: "string",
                })?;
                self.set_id(id.to_string())
            }
            "rendered" | "transient" => {
                let flag = value.as_bool().ok_or(EngineError::AttributeType {
                    name: name.to_string(),
                    expected: "boolean",
                })?;
                if name == "rendered" {
                    self.core.rendered = flag;
                } else {
                    self.core.transient = flag;
                }
                Ok(())
            }
            _ => {
                if self.behavior.set_property(name, &value)? {
                    Ok(())
                } else {
                    self.core.attributes.insert(name.to_string(), value);
                    Ok(())
                }
            }
        }
    }

    /// Remove a stored attribute.
    ///
    /// Property-backed names cannot be removed; they surface a
    /// [`EngineError::PropertyBackedAttribute`] immediately.
    pub fn remove_attribute(&mut self, name: &str) -> Result<Option<serde_json::Value>> {
        if matches!(name, "id" | "rendered" | "transient") || self.behavior.has_property(name) {
            return Err(EngineError::PropertyBackedAttribute(name.to_string()));
        }
        Ok(self.core.attributes.remove(name))
    }

    /// Register an event listener; returns its registration id
    pub fn add_listener(&mut self, listener: Rc<dyn EventListener>) -> u64 {
        let id = self.core.next_listener_id;
        self.core.next_listener_id += 1;
        self.core.listeners.push(ListenerEntry { id, listener });
        id
    }

    /// Deregister a listener by registration id
    pub fn remove_listener(&mut self, id: u64) -> bool {
        let before = self.core.listeners.len();
        self.core.listeners.retain(|entry| entry.id != id);
        self.core.listeners.len() != before
    }

    pub(crate) fn listener_snapshot(&self) -> Vec<(u64, ListenerPhase, Rc<dyn EventListener>)> {
        self.core
            .listeners
            .iter()
            .map(|entry| (entry.id, entry.listener.phase(), entry.listener.clone()))
            .collect()
    }

    pub(crate) fn run_decode(&mut self, node: NodeRef<'_>, ctx: &RequestContext) -> Result<()> {
        self.behavior.decode(&mut self.core, node, ctx)
    }

    pub(crate) fn run_validate(&mut self, node: NodeRef<'_>, ctx: &RequestContext) -> Result<()> {
        self.behavior.validate(&mut self.core, node, ctx)
    }

    pub(crate) fn run_update_model(
        &mut self,
        node: NodeRef<'_>,
        ctx: &RequestContext,
    ) -> Result<()> {
        self.behavior.update_model(&mut self.core, node, ctx)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.core.id)
            .field("type", &self.behavior.type_id())
            .field("children", &self.core.children.len())
            .field("facets", &self.core.facets.len())
            .field("rendered", &self.core.rendered)
            .field("transient", &self.core.transient)
            .finish()
    }
}

fn attach(parent: &ComponentHandle, child: &ComponentHandle) -> Result<()> {
    if Rc::ptr_eq(parent, child) {
        return Err(EngineError::SelfAttachment(child.borrow().id().to_string()));
    }
    let mut child_ref = child.borrow_mut();
    if child_ref.core.parent.upgrade().is_some() {
        return Err(EngineError::AlreadyAttached {
            child: child_ref.id().to_string(),
            parent: parent.borrow().id().to_string(),
        });
    }
    child_ref.core.parent = Rc::downgrade(parent);
    Ok(())
}

/// Append a child, taking structural ownership.
///
/// Fails if the child already has a parent (one parent per component) or if
/// parent and child are the same component.
pub fn add_child(parent: &ComponentHandle, child: ComponentHandle) -> Result<()> {
    attach(parent, &child)?;
    parent.borrow_mut().core.children.push(child);
    Ok(())
}

/// Insert a child at the given position (clamped to the child count)
pub fn insert_child(parent: &ComponentHandle, index: usize, child: ComponentHandle) -> Result<()> {
    attach(parent, &child)?;
    let mut parent_ref = parent.borrow_mut();
    let index = index.min(parent_ref.core.children.len());
    parent_ref.core.children.insert(index, child);
    Ok(())
}

/// Remove the child with the given id, clearing its parent reference
pub fn remove_child(parent: &ComponentHandle, id: &str) -> Option<ComponentHandle> {
    let child = {
        let mut parent_ref = parent.borrow_mut();
        let position = parent_ref
            .core
            .children
            .iter()
            .position(|c| c.borrow().id() == id)?;
        parent_ref.core.children.remove(position)
    };
    child.borrow_mut().core.parent = Weak::new();
    Some(child)
}

/// Set a named facet, taking structural ownership.
///
/// Replacing an existing facet detaches the previous component and returns
/// it. Facet order is preserved across replacement.
pub fn set_facet(
    parent: &ComponentHandle,
    name: impl Into<String>,
    child: ComponentHandle,
) -> Result<Option<ComponentHandle>> {
    attach(parent, &child)?;
    let previous = parent.borrow_mut().core.facets.insert(name.into(), child);
    if let Some(previous) = &previous {
        previous.borrow_mut().core.parent = Weak::new();
    }
    Ok(previous)
}

/// Remove a named facet, clearing its parent reference
pub fn remove_facet(parent: &ComponentHandle, name: &str) -> Option<ComponentHandle> {
    let removed = parent.borrow_mut().core.facets.shift_remove(name);
    if let Some(removed) = &removed {
        removed.borrow_mut().core.parent = Weak::new();
    }
    removed
}

/// Fully-qualified identifier: the nearest enclosing naming container's
/// client id, the separator, then this component's id
pub fn client_id(node: &ComponentHandle) -> String {
    let own = node.borrow().id().to_string();
    let mut current = node.borrow().parent();
    while let Some(parent) = current {
        if parent.borrow().is_naming_container() {
            return format!("{}{}{}", client_id(&parent), SEPARATOR_CHAR, own);
        }
        current = parent.borrow().parent();
    }
    own
}
