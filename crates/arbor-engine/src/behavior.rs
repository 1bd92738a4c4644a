//! Component behavior contract
//!
//! Instead of a deep inheritance chain, every component is a
//! [`ComponentCore`](crate::tree::ComponentCore) with an injected
//! [`Behavior`]. The behavior supplies per-phase actions, optional
//! property aliasing for the attribute map, and (when it cooperates)
//! opaque state for the snapshot codec.
//!
//! Concrete behaviors here cover the non-input widgets; input-capable
//! behavior lives in [`crate::input`].

use crate::context::RequestContext;
use crate::error::Result;
use crate::tree::{ComponentCore, ComponentHandle};

/// Identity of the node a behavior hook is running against.
///
/// Carries the owning handle (for queuing events) and the precomputed
/// fully-qualified client id (for request parameters and messages). Hooks
/// must not borrow the handle: the caller already holds it mutably.
pub struct NodeRef<'a> {
    /// Handle of the component being processed
    pub handle: &'a ComponentHandle,
    /// Fully-qualified client id of the component
    pub client_id: &'a str,
}

/// Injected behavior of a single component.
///
/// Every hook receives the component's core (structure, flags, attributes)
/// and the request context explicitly; there is no ambient state.
pub trait Behavior {
    /// Stable identifier used by the behavior registry to reconstruct this
    /// concrete type from a snapshot
    fn type_id(&self) -> &str;

    /// Whether this component bounds identifier search and prefixes the
    /// client ids of its descendants
    fn is_naming_container(&self) -> bool {
        false
    }

    /// Whether this component accepts request input
    fn is_input(&self) -> bool {
        false
    }

    /// Decode raw request input for this component
    fn decode(
        &mut self,
        core: &mut ComponentCore,
        node: NodeRef<'_>,
        ctx: &RequestContext,
    ) -> Result<()> {
        let _ = (core, node, ctx);
        Ok(())
    }

    /// Validate this component's decoded value
    fn validate(
        &mut self,
        core: &mut ComponentCore,
        node: NodeRef<'_>,
        ctx: &RequestContext,
    ) -> Result<()> {
        let _ = (core, node, ctx);
        Ok(())
    }

    /// Commit this component's validated value to its bound model
    fn update_model(
        &mut self,
        core: &mut ComponentCore,
        node: NodeRef<'_>,
        ctx: &RequestContext,
    ) -> Result<()> {
        let _ = (core, node, ctx);
        Ok(())
    }

    /// Opaque inner state for the snapshot codec; `None` means this
    /// behavior does not cooperate with stateful capture
    fn save_state(&self) -> Option<serde_json::Value> {
        None
    }

    /// Rebuild inner state captured by [`save_state`](Behavior::save_state)
    fn restore_state(&mut self, state: &serde_json::Value) -> Result<()> {
        let _ = state;
        Ok(())
    }

    /// Whether the given attribute name aliases a property of this behavior
    fn has_property(&self, name: &str) -> bool {
        let _ = name;
        false
    }

    /// Read a property that aliases an attribute name
    fn property(&self, name: &str) -> Option<serde_json::Value> {
        let _ = name;
        None
    }

    /// Write a property that aliases an attribute name.
    ///
    /// Returns `Ok(true)` if the name was handled, `Ok(false)` to fall back
    /// to the stored attribute map.
    fn set_property(&mut self, name: &str, value: &serde_json::Value) -> Result<bool> {
        let _ = (name, value);
        Ok(false)
    }
}

/// Plain container with no behavior of its own
#[derive(Debug, Default)]
pub struct PanelBehavior;

/// Registry identifier for [`PanelBehavior`]
pub const PANEL_TYPE: &str = "panel";

impl Behavior for PanelBehavior {
    fn type_id(&self) -> &str {
        PANEL_TYPE
    }
}

/// Naming container: bounds identifier search and prefixes descendant
/// client ids
#[derive(Debug, Default)]
pub struct FormBehavior;

/// Registry identifier for [`FormBehavior`]
pub const FORM_TYPE: &str = "form";

impl Behavior for FormBehavior {
    fn type_id(&self) -> &str {
        FORM_TYPE
    }

    fn is_naming_container(&self) -> bool {
        true
    }
}

/// Displays a value; not input-capable.
///
/// Does not cooperate with stateful capture: its value is persisted through
/// the codec's direct-value escape hatch instead.
#[derive(Debug, Default)]
pub struct OutputBehavior {
    value: Option<serde_json::Value>,
}

/// Registry identifier for [`OutputBehavior`]
pub const OUTPUT_TYPE: &str = "output";

impl OutputBehavior {
    /// Create an output holding the given value
    pub fn with_value(value: serde_json::Value) -> Self {
        Self { value: Some(value) }
    }

    /// The current value, if any
    pub fn value(&self) -> Option<&serde_json::Value> {
        self.value.as_ref()
    }
}

impl Behavior for OutputBehavior {
    fn type_id(&self) -> &str {
        OUTPUT_TYPE
    }

    fn has_property(&self, name: &str) -> bool {
        name == "value"
    }

    fn property(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "value" => self.value.clone(),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: &serde_json::Value) -> Result<bool> {
        match name {
            "value" => {
                self.value = Some(value.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
