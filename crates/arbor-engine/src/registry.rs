//! Factory registries
//!
//! Snapshots identify behaviors and method expressions by stable type
//! strings; registries map those strings back to factories when state is
//! restored. Applications extend the defaults by registering their own
//! factories or merging whole registries.

use std::collections::HashMap;

use log::debug;

use arbor_el::{MethodExpression, TargetMethodExpression, TARGET_METHOD_EXPRESSION_TYPE};

use crate::behavior::{
    Behavior, FormBehavior, OutputBehavior, PanelBehavior, FORM_TYPE, OUTPUT_TYPE, PANEL_TYPE,
};
use crate::input::{InputBehavior, INPUT_TYPE};

type Factory<T> = Box<dyn Fn() -> Box<T>>;

/// Maps stable type identifiers to factories producing fresh instances
pub struct Registry<T: ?Sized> {
    entries: HashMap<String, Factory<T>>,
}

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a factory under a type identifier, replacing any previous
    /// registration for the same identifier
    pub fn register(
        &mut self,
        type_id: impl Into<String>,
        factory: impl Fn() -> Box<T> + 'static,
    ) {
        let type_id = type_id.into();
        if self.entries.insert(type_id.clone(), Box::new(factory)).is_some() {
            debug!("replaced registry entry for '{type_id}'");
        }
    }

    /// Produce a fresh instance for the given type identifier
    pub fn create(&self, type_id: &str) -> Option<Box<T>> {
        self.entries.get(type_id).map(|factory| factory())
    }

    /// Whether the identifier is registered
    pub fn contains(&self, type_id: &str) -> bool {
        self.entries.contains_key(type_id)
    }

    /// All registered identifiers, sorted
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Absorb another registry; its entries win on identifier collisions
    pub fn merge(&mut self, other: Registry<T>) {
        self.entries.extend(other.entries);
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of component behaviors, keyed by behavior type id
pub type BehaviorRegistry = Registry<dyn Behavior>;

/// Registry of method expressions, keyed by expression type id
pub type ExpressionRegistry = Registry<dyn MethodExpression>;

/// Registry preloaded with the built-in behaviors
pub fn default_behaviors() -> BehaviorRegistry {
    let mut registry = BehaviorRegistry::new();
    registry.register(PANEL_TYPE, || Box::new(PanelBehavior) as Box<dyn Behavior>);
    registry.register(FORM_TYPE, || Box::new(FormBehavior) as Box<dyn Behavior>);
    registry.register(OUTPUT_TYPE, || {
        Box::new(OutputBehavior::default()) as Box<dyn Behavior>
    });
    registry.register(INPUT_TYPE, || {
        Box::new(InputBehavior::default()) as Box<dyn Behavior>
    });
    registry
}

/// Registry preloaded with the built-in method expressions
pub fn default_expressions() -> ExpressionRegistry {
    let mut registry = ExpressionRegistry::new();
    registry.register(TARGET_METHOD_EXPRESSION_TYPE, || {
        Box::new(TargetMethodExpression::uninitialized()) as Box<dyn MethodExpression>
    });
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_builtin_behaviors() {
        let registry = default_behaviors();
        for type_id in [PANEL_TYPE, FORM_TYPE, OUTPUT_TYPE, INPUT_TYPE] {
            let behavior = registry.create(type_id).unwrap();
            assert_eq!(behavior.type_id(), type_id);
        }
        assert!(registry.create("unknown").is_none());
    }

    #[test]
    fn test_merge_prefers_incoming_entries() {
        let mut base = BehaviorRegistry::new();
        base.register("widget", || Box::new(PanelBehavior) as Box<dyn Behavior>);

        let mut extra = BehaviorRegistry::new();
        extra.register("widget", || Box::new(FormBehavior) as Box<dyn Behavior>);
        extra.register("other", || Box::new(PanelBehavior) as Box<dyn Behavior>);

        base.merge(extra);
        assert!(base.create("widget").unwrap().is_naming_container());
        assert_eq!(base.type_ids(), vec!["other", "widget"]);
    }
}
