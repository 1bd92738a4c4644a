//! Compiled method expressions and method-shape metadata
//!
//! A [`MethodExpression`] is the newer, compiled form of a method reference
//! such as `#{bean.doWork}`. The engine's legacy adapter wraps one of these
//! behind the deprecated binding-by-string contract, which needs to compare
//! method *shapes*: [`MethodSignature`] and [`TypeTag`] stand in for the
//! reflective name/parameter/return comparison the older contract performed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::EvalContext;
use crate::error::EvalError;

/// Stable name for a value type, used when matching method signatures.
///
/// Tags compare by name only; two tags are the same type exactly when their
/// names are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeTag(String);

impl TypeTag {
    /// Create a tag from a stable type name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The tag's type name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The shape of a callable method: name, parameter types, return type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Method name
    pub name: String,
    /// Parameter types, in declaration order
    pub params: Vec<TypeTag>,
    /// Return type
    pub returns: TypeTag,
}

impl MethodSignature {
    /// Create a signature
    pub fn new(name: impl Into<String>, params: Vec<TypeTag>, returns: TypeTag) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
        }
    }
}

/// An object that exposes callable methods to expression evaluation.
///
/// This is the typed replacement for reflecting over a live object's
/// methods: a target declares its signatures and dispatches invocations
/// by method name.
pub trait MethodTarget {
    /// All method signatures this target exposes
    fn method_signatures(&self) -> Vec<MethodSignature>;

    /// Invoke a method by name
    fn invoke_method(
        &self,
        name: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, EvalError> {
        let _ = args;
        Err(EvalError::NotFound(name.to_string()))
    }
}

/// A compiled method expression.
///
/// Implementations that cooperate with state capture return `Some` from
/// both [`state_type_id`](MethodExpression::state_type_id) and
/// [`save_state`](MethodExpression::save_state); the engine's state codec
/// persists them as an {inner-state, type-identifier} pair and rebuilds
/// them through an expression registry.
pub trait MethodExpression {
    /// The textual expression this was compiled from
    fn expression_string(&self) -> &str;

    /// Resolve the expression to its method signature in the given context
    fn method_info(&self, ctx: &dyn EvalContext) -> Result<MethodSignature, EvalError>;

    /// Evaluate the expression, invoking the referenced method
    fn invoke(
        &self,
        ctx: &dyn EvalContext,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, EvalError>;

    /// Stable identifier used to reconstruct this concrete type, if any
    fn state_type_id(&self) -> Option<&str> {
        None
    }

    /// Opaque inner state for capture, if this type cooperates
    fn save_state(&self) -> Option<serde_json::Value> {
        None
    }

    /// Rebuild inner state captured by [`save_state`](MethodExpression::save_state)
    fn restore_state(&mut self, state: &serde_json::Value) -> Result<(), EvalError> {
        let _ = state;
        Ok(())
    }
}

/// Split a `#{target.method}` reference into its target and method parts.
///
/// Returns `None` for anything that does not have exactly that delimiter
/// shape; callers treat a parse failure as "no match" rather than an error.
pub fn parse_method_ref(expr: &str) -> Option<(&str, &str)> {
    let inner = expr.strip_prefix("#{")?.strip_suffix('}')?;
    let (target, method) = inner.split_once('.')?;
    let target = target.trim();
    let method = method.trim();
    if target.is_empty() || method.is_empty() {
        return None;
    }
    Some((target, method))
}

/// Reference [`MethodExpression`] that resolves its target through the
/// evaluation context and dispatches by method name.
///
/// Cooperates with state capture by saving its expression string.
pub struct TargetMethodExpression {
    expression: String,
    target: String,
    method: String,
}

/// Registry identifier for [`TargetMethodExpression`]
pub const TARGET_METHOD_EXPRESSION_TYPE: &str = "arbor.el.target-method";

impl TargetMethodExpression {
    /// Compile a `#{target.method}` reference.
    ///
    /// Fails with [`EvalError::Evaluation`] if the string does not have the
    /// expected delimiter shape.
    pub fn compile(expression: impl Into<String>) -> Result<Self, EvalError> {
        let expression = expression.into();
        let (target, method) = parse_method_ref(&expression)
            .ok_or_else(|| EvalError::evaluation(format!("malformed method reference '{expression}'")))?;
        let (target, method) = (target.to_string(), method.to_string());
        Ok(Self {
            expression,
            target,
            method,
        })
    }

    /// Placeholder instance used before state restoration
    pub fn uninitialized() -> Self {
        Self {
            expression: String::new(),
            target: String::new(),
            method: String::new(),
        }
    }

    fn resolve_target(
        &self,
        ctx: &dyn EvalContext,
    ) -> Result<std::rc::Rc<dyn MethodTarget>, EvalError> {
        ctx.resolve_target(&self.target)?
            .ok_or_else(|| EvalError::NullDereference(self.expression.clone()))
    }
}

impl MethodExpression for TargetMethodExpression {
    fn expression_string(&self) -> &str {
        &self.expression
    }

    fn method_info(&self, ctx: &dyn EvalContext) -> Result<MethodSignature, EvalError> {
        let target = self.resolve_target(ctx)?;
        target
            .method_signatures()
            .into_iter()
            .find(|sig| sig.name == self.method)
            .ok_or_else(|| EvalError::NotFound(self.expression.clone()))
    }

    fn invoke(
        &self,
        ctx: &dyn EvalContext,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, EvalError> {
        let target = self.resolve_target(ctx)?;
        target.invoke_method(&self.method, args)
    }

    fn state_type_id(&self) -> Option<&str> {
        Some(TARGET_METHOD_EXPRESSION_TYPE)
    }

    fn save_state(&self) -> Option<serde_json::Value> {
        Some(serde_json::Value::String(self.expression.clone()))
    }

    fn restore_state(&mut self, state: &serde_json::Value) -> Result<(), EvalError> {
        let expression = state
            .as_str()
            .ok_or_else(|| EvalError::evaluation("expected an expression string"))?;
        *self = Self::compile(expression)?;
        Ok(())
    }
}
