//! Snapshot capture and restoration
//!
//! A [`Snapshot`] is the serializable state of a component tree between
//! requests. Capture walks the tree post-order, skipping transient
//! components entirely. Restoration has two modes: [`apply`] feeds captured
//! state back into an already-built tree (matching facets by name and
//! children by id), and [`rebuild`] reconstructs a whole tree from scratch
//! through a [`BehaviorRegistry`].
//!
//! Restoration is lenient: an unresolvable or incompatible fragment is
//! logged and skipped, never an error for the surrounding tree.

use serde::{Deserialize, Serialize};

use log::warn;

use crate::registry::BehaviorRegistry;
use crate::tree::{add_child, set_facet, Component, ComponentHandle};

/// Captured state of one component.
///
/// `own` carries what the behavior chose to persist; structure (facets and
/// children) nests recursively in tree order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    /// Component identifier
    pub id: String,
    /// Behavior type identifier, for registry reconstruction
    pub type_id: String,
    /// Rendered flag at capture time
    pub rendered: bool,
    /// Stored attributes (property-backed names are part of `own`)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Behavior-owned state
    #[serde(default)]
    pub own: OwnState,
    /// Captured facets, in facet order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<(String, NodeState)>,
    /// Captured children, in child order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeState>,
}

/// What a behavior contributed to the capture
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnState {
    /// The behavior holds no state worth capturing
    #[default]
    None,
    /// The behavior cooperated and produced its own opaque state
    Saved { state: serde_json::Value },
    /// Escape hatch for non-cooperating behaviors with a value property:
    /// the value itself is captured directly
    Opaque { value: serde_json::Value },
}

/// Serializable state of a whole component tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Captured root component
    pub root: NodeState,
}

impl Snapshot {
    /// Capture a tree; `None` when the root itself is transient
    pub fn capture(root: &ComponentHandle) -> Option<Self> {
        capture_node(root).map(|root| Self { root })
    }
}

fn capture_own(comp: &Component) -> OwnState {
    if let Some(state) = comp.behavior().save_state() {
        return OwnState::Saved { state };
    }
    match comp.behavior().property("value") {
        Some(value) => OwnState::Opaque { value },
        None => OwnState::None,
    }
}

/// Capture one component and everything below it; `None` when transient
pub fn capture_node(node: &ComponentHandle) -> Option<NodeState> {
    let comp = node.borrow();
    if comp.transient() {
        return None;
    }

    let facets = comp
        .facets()
        .iter()
        .filter_map(|(name, facet)| capture_node(facet).map(|state| (name.clone(), state)))
        .collect();
    let children = comp
        .children()
        .iter()
        .filter_map(capture_node)
        .collect();

    Some(NodeState {
        id: comp.id().to_string(),
        type_id: comp.behavior().type_id().to_string(),
        rendered: comp.rendered(),
        attributes: comp.core().stored_attributes().clone(),
        own: capture_own(&comp),
        facets,
        children,
    })
}

fn apply_own(node: &ComponentHandle, state: &NodeState) {
    match &state.own {
        OwnState::None => {}
        OwnState::Saved { state: inner } => {
            let result = node.borrow_mut().behavior_mut().restore_state(inner);
            if let Err(err) = result {
                warn!("skipping saved state for '{}': {err}", state.id);
            }
        }
        OwnState::Opaque { value } => {
            let result = node.borrow_mut().behavior_mut().set_property("value", value);
            match result {
                Ok(true) => {}
                Ok(false) => warn!(
                    "skipping captured value for '{}': no value property",
                    state.id
                ),
                Err(err) => warn!("skipping captured value for '{}': {err}", state.id),
            }
        }
    }
}

/// Feed captured state into an existing tree.
///
/// Facets match by name and children by id; structure present in the tree
/// but absent from the capture keeps its defaults, and captured fragments
/// with no matching component are logged and dropped. Children restore
/// before the component itself.
pub fn apply(node: &ComponentHandle, state: &NodeState) {
    {
        let comp = node.borrow();
        if comp.behavior().type_id() != state.type_id {
            warn!(
                "skipping state for '{}': captured type '{}' does not match '{}'",
                state.id,
                state.type_id,
                comp.behavior().type_id()
            );
            return;
        }
    }

    for (name, facet_state) in &state.facets {
        match node.borrow().facet(name) {
            Some(facet) => apply(&facet, facet_state),
            None => warn!("captured facet '{name}' of '{}' has no match", state.id),
        }
    }
    for child_state in &state.children {
        let child = node
            .borrow()
            .children()
            .iter()
            .find(|c| c.borrow().id() == child_state.id)
            .cloned();
        match child {
            Some(child) => apply(&child, child_state),
            None => warn!(
                "captured child '{}' of '{}' has no match",
                child_state.id, state.id
            ),
        }
    }

    let mut comp = node.borrow_mut();
    comp.set_rendered(state.rendered);
    drop(comp);
    for (name, value) in &state.attributes {
        if let Err(err) = node.borrow_mut().set_attribute(name, value.clone()) {
            warn!("skipping attribute '{name}' of '{}': {err}", state.id);
        }
    }
    apply_own(node, state);
}

/// Rebuild a component from captured state through a behavior registry.
///
/// Returns `None` (with a warning) when the behavior type is unregistered,
/// the id no longer passes validation, or the behavior rejects its saved
/// state. Unrestorable descendants are dropped from the rebuilt tree.
pub fn rebuild(state: &NodeState, registry: &BehaviorRegistry) -> Option<ComponentHandle> {
    let Some(behavior) = registry.create(&state.type_id) else {
        warn!(
            "cannot rebuild '{}': behavior type '{}' is not registered",
            state.id, state.type_id
        );
        return None;
    };
    let node = match Component::new(state.id.clone(), behavior) {
        Ok(node) => node,
        Err(err) => {
            warn!("cannot rebuild '{}': {err}", state.id);
            return None;
        }
    };

    {
        let mut comp = node.borrow_mut();
        comp.set_rendered(state.rendered);
    }
    for (name, value) in &state.attributes {
        if let Err(err) = node.borrow_mut().set_attribute(name, value.clone()) {
            warn!("skipping attribute '{name}' of '{}': {err}", state.id);
        }
    }
    if let OwnState::Saved { state: inner } = &state.own {
        let result = node.borrow_mut().behavior_mut().restore_state(inner);
        if let Err(err) = result {
            warn!("cannot rebuild '{}': {err}", state.id);
            return None;
        }
    } else {
        apply_own(&node, state);
    }

    for (name, facet_state) in &state.facets {
        if let Some(facet) = rebuild(facet_state, registry) {
            // name collisions cannot happen in captured state
            let _ = set_facet(&node, name.clone(), facet);
        }
    }
    for child_state in &state.children {
        if let Some(child) = rebuild(child_state, registry) {
            let _ = add_child(&node, child);
        }
    }
    Some(node)
}

/// Rebuild a whole tree from a snapshot
pub fn rebuild_snapshot(
    snapshot: &Snapshot,
    registry: &BehaviorRegistry,
) -> Option<ComponentHandle> {
    rebuild(&snapshot.root, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{FormBehavior, OutputBehavior, PanelBehavior};
    use crate::input::InputBehavior;
    use crate::registry::default_behaviors;

    fn make_tree() -> ComponentHandle {
        let root = Component::new("root", Box::new(FormBehavior)).unwrap();
        let heading =
            Component::new("heading", Box::new(OutputBehavior::with_value(serde_json::json!(
                "Sign up"
            ))))
            .unwrap();
        let name = Component::new("name", Box::new(InputBehavior::new())).unwrap();
        let scratch = Component::new("scratch", Box::new(PanelBehavior)).unwrap();
        scratch.borrow_mut().set_transient(true);

        set_facet(&root, "header", heading).unwrap();
        add_child(&root, name).unwrap();
        add_child(&root, scratch).unwrap();
        root
    }

    #[test]
    fn test_capture_skips_transient_components() {
        let root = make_tree();
        let snapshot = Snapshot::capture(&root).unwrap();

        assert_eq!(snapshot.root.id, "root");
        assert_eq!(snapshot.root.facets.len(), 1);
        // the transient child is gone
        assert_eq!(snapshot.root.children.len(), 1);
        assert_eq!(snapshot.root.children[0].id, "name");

        let transient_root = Component::new("r", Box::new(PanelBehavior)).unwrap();
        transient_root.borrow_mut().set_transient(true);
        assert!(Snapshot::capture(&transient_root).is_none());
    }

    #[test]
    fn test_non_cooperating_behavior_captures_its_value() {
        let root = make_tree();
        let snapshot = Snapshot::capture(&root).unwrap();

        let (_, heading) = &snapshot.root.facets[0];
        assert_eq!(
            heading.own,
            OwnState::Opaque {
                value: serde_json::json!("Sign up")
            }
        );
        // the input cooperates
        assert!(matches!(snapshot.root.children[0].own, OwnState::Saved { .. }));
    }

    #[test]
    fn test_apply_matches_facets_by_name_and_children_by_id() {
        let root = make_tree();
        root.borrow_mut()
            .set_attribute("style", serde_json::json!("wide"))
            .unwrap();
        let snapshot = Snapshot::capture(&root).unwrap();

        // a fresh tree with the same shape but different state
        let fresh = make_tree();
        let heading = fresh.borrow().facet("header").unwrap();
        heading
            .borrow_mut()
            .set_attribute("value", serde_json::json!("placeholder"))
            .unwrap();

        apply(&fresh, &snapshot.root);

        assert_eq!(
            fresh.borrow().attribute("style"),
            Some(serde_json::json!("wide"))
        );
        assert_eq!(
            heading.borrow().attribute("value"),
            Some(serde_json::json!("Sign up"))
        );
    }

    #[test]
    fn test_apply_skips_mismatched_types() {
        let root = make_tree();
        let snapshot = Snapshot::capture(&root).unwrap();

        let other = Component::new("root", Box::new(PanelBehavior)).unwrap();
        apply(&other, &snapshot.root);
        // nothing applied
        assert!(other.borrow().attribute("style").is_none());
    }

    #[test]
    fn test_rebuild_through_registry() {
        let root = make_tree();
        let snapshot = Snapshot::capture(&root).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: Snapshot = serde_json::from_str(&json).unwrap();

        let rebuilt = rebuild_snapshot(&decoded, &default_behaviors()).unwrap();
        let comp = rebuilt.borrow();
        assert_eq!(comp.id(), "root");
        assert!(comp.is_naming_container());
        assert_eq!(comp.child_count(), 1);
        let heading = comp.facet("header").unwrap();
        assert_eq!(
            heading.borrow().attribute("value"),
            Some(serde_json::json!("Sign up"))
        );
    }

    #[test]
    fn test_rebuild_drops_unregistered_fragments() {
        let root = make_tree();
        let mut snapshot = Snapshot::capture(&root).unwrap();
        snapshot.root.children[0].type_id = "vanished".to_string();

        let rebuilt = rebuild_snapshot(&snapshot, &default_behaviors()).unwrap();
        // the unresolvable child is dropped, the rest survives
        assert_eq!(rebuilt.borrow().child_count(), 0);
        assert!(rebuilt.borrow().facet("header").is_some());

        snapshot.root.type_id = "vanished".to_string();
        assert!(rebuild_snapshot(&snapshot, &default_behaviors()).is_none());
    }
}
