//! Evaluation-context interface and in-memory doubles
//!
//! [`EvalContext`] is the single seam between the lifecycle engine and a
//! real expression evaluator: resolve a value expression, resolve a named
//! method target, or write a value back through an expression.
//!
//! [`MapEvalContext`] and [`NullEvalContext`] are deliberately simple
//! implementations for tests and for hosts that have no evaluator at all.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::EvalError;
use crate::method::{MethodSignature, MethodTarget};

/// Request-scoped evaluation context.
///
/// Implementations are not required to be thread-safe; a request is a
/// single logical thread of control.
pub trait EvalContext {
    /// Resolve a value expression to its current value
    fn resolve(&self, expr: &str) -> Result<serde_json::Value, EvalError>;

    /// Resolve a named method target.
    ///
    /// `Ok(None)` means the name resolved to null; `Err(NotFound)` means it
    /// did not resolve at all.
    fn resolve_target(&self, name: &str) -> Result<Option<Rc<dyn MethodTarget>>, EvalError>;

    /// Write a value back through an expression
    fn set_value(&self, expr: &str, value: serde_json::Value) -> Result<(), EvalError>;
}

/// An evaluation context with nothing in it.
///
/// Every lookup fails with [`EvalError::NotFound`]; useful when a request
/// has no evaluator attached.
pub struct NullEvalContext;

impl EvalContext for NullEvalContext {
    fn resolve(&self, expr: &str) -> Result<serde_json::Value, EvalError> {
        Err(EvalError::NotFound(expr.to_string()))
    }

    fn resolve_target(&self, name: &str) -> Result<Option<Rc<dyn MethodTarget>>, EvalError> {
        Err(EvalError::NotFound(name.to_string()))
    }

    fn set_value(&self, expr: &str, _value: serde_json::Value) -> Result<(), EvalError> {
        Err(EvalError::NotFound(expr.to_string()))
    }
}

/// In-memory evaluation context backed by expression-keyed maps.
///
/// Useful for tests to verify how the engine drives the evaluation
/// interface without a real expression language.
pub struct MapEvalContext {
    values: RefCell<HashMap<String, serde_json::Value>>,
    targets: HashMap<String, Option<Rc<dyn MethodTarget>>>,
}

impl MapEvalContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self {
            values: RefCell::new(HashMap::new()),
            targets: HashMap::new(),
        }
    }

    /// Seed a value for an expression string
    pub fn insert_value(&mut self, expr: impl Into<String>, value: serde_json::Value) {
        self.values.borrow_mut().insert(expr.into(), value);
    }

    /// Seed a method target under a name
    pub fn insert_target(&mut self, name: impl Into<String>, target: Rc<dyn MethodTarget>) {
        self.targets.insert(name.into(), Some(target));
    }

    /// Seed a name that resolves to null
    pub fn insert_null_target(&mut self, name: impl Into<String>) {
        self.targets.insert(name.into(), None);
    }

    /// Read back a value written through [`EvalContext::set_value`]
    pub fn value(&self, expr: &str) -> Option<serde_json::Value> {
        self.values.borrow().get(expr).cloned()
    }
}

impl Default for MapEvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalContext for MapEvalContext {
    fn resolve(&self, expr: &str) -> Result<serde_json::Value, EvalError> {
        self.values
            .borrow()
            .get(expr)
            .cloned()
            .ok_or_else(|| EvalError::NotFound(expr.to_string()))
    }

    fn resolve_target(&self, name: &str) -> Result<Option<Rc<dyn MethodTarget>>, EvalError> {
        match self.targets.get(name) {
            Some(target) => Ok(target.clone()),
            None => Err(EvalError::NotFound(name.to_string())),
        }
    }

    fn set_value(&self, expr: &str, value: serde_json::Value) -> Result<(), EvalError> {
        self.values.borrow_mut().insert(expr.to_string(), value);
        Ok(())
    }
}

/// Method target with a fixed signature list and canned results
pub struct StaticMethodTarget {
    signatures: Vec<MethodSignature>,
    results: HashMap<String, serde_json::Value>,
}

impl StaticMethodTarget {
    /// Create a target exposing the given signatures
    pub fn new(signatures: Vec<MethodSignature>) -> Self {
        Self {
            signatures,
            results: HashMap::new(),
        }
    }

    /// Set the canned result for a method name
    pub fn returning(mut self, name: impl Into<String>, result: serde_json::Value) -> Self {
        self.results.insert(name.into(), result);
        self
    }
}

impl MethodTarget for StaticMethodTarget {
    fn method_signatures(&self) -> Vec<MethodSignature> {
        self.signatures.clone()
    }

    fn invoke_method(
        &self,
        name: &str,
        _args: &[serde_json::Value],
    ) -> Result<serde_json::Value, EvalError> {
        self.results
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::TypeTag;

    #[test]
    fn test_map_context_resolve_and_set() {
        let mut ctx = MapEvalContext::new();
        ctx.insert_value("#{bean.count}", serde_json::json!(3));

        assert_eq!(ctx.resolve("#{bean.count}").unwrap(), serde_json::json!(3));
        assert!(matches!(
            ctx.resolve("#{bean.other}"),
            Err(EvalError::NotFound(_))
        ));

        ctx.set_value("#{bean.count}", serde_json::json!(4)).unwrap();
        assert_eq!(ctx.value("#{bean.count}"), Some(serde_json::json!(4)));
    }

    #[test]
    fn test_map_context_null_target() {
        let mut ctx = MapEvalContext::new();
        ctx.insert_null_target("bean");

        assert!(ctx.resolve_target("bean").unwrap().is_none());
        assert!(ctx.resolve_target("other").is_err());
    }

    #[test]
    fn test_null_context_rejects_everything() {
        let ctx = NullEvalContext;
        assert!(ctx.resolve("#{x}").is_err());
        assert!(ctx.resolve_target("x").is_err());
        assert!(ctx.set_value("#{x}", serde_json::json!(1)).is_err());
    }

    #[test]
    fn test_static_target_dispatch() {
        let target = StaticMethodTarget::new(vec![MethodSignature::new(
            "ping",
            vec![TypeTag::new("string")],
            TypeTag::new("string"),
        )])
        .returning("ping", serde_json::json!("pong"));

        assert_eq!(target.method_signatures().len(), 1);
        assert_eq!(
            target.invoke_method("ping", &[]).unwrap(),
            serde_json::json!("pong")
        );
        assert!(target.invoke_method("absent", &[]).is_err());
    }
}
