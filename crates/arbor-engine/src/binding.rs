//! Legacy method-binding adapter
//!
//! [`MethodBinding`] is the deprecated binding-by-string contract some
//! hosts still program against. [`MethodBindingAdapter`] wraps a compiled
//! [`MethodExpression`] behind it, reclassifying the evaluator's errors
//! into the binding contract's own kinds and persisting the wrapped
//! expression through the state codec.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use log::warn;

use arbor_el::{
    parse_method_ref, EvalContext, EvalError, MethodExpression, TargetMethodExpression, TypeTag,
};

use crate::error::{EngineError, Result};
use crate::registry::ExpressionRegistry;

/// Failures surfaced through the deprecated binding contract
#[derive(Debug, Error)]
pub enum BindingError {
    /// The referenced method could not be found
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// The binding's target resolved to null
    #[error("null reference: {0}")]
    NullReference(String),

    /// Any other evaluation failure, reported as its root cause
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Map an evaluator error onto the binding contract's error kinds.
///
/// Generic evaluation failures report their innermost cause: callers of the
/// deprecated contract expect the original failure, not the wrapper.
fn reclassify(err: EvalError) -> BindingError {
    match err {
        EvalError::NotFound(what) => BindingError::MethodNotFound(what),
        EvalError::NullDereference(expr) => BindingError::NullReference(expr),
        EvalError::PropertyNotFound(prop) => {
            BindingError::Evaluation(format!("property not found: {prop}"))
        }
        err @ EvalError::Evaluation { .. } => {
            BindingError::Evaluation(err.root_cause().to_string())
        }
    }
}

/// The deprecated binding-by-string contract
pub trait MethodBinding {
    /// The textual expression this binding was created from
    fn expression_string(&self) -> &str;

    /// The return type of the referenced method
    fn return_type(&self, ctx: &dyn EvalContext) -> std::result::Result<TypeTag, BindingError>;

    /// Invoke the referenced method
    fn invoke(
        &self,
        ctx: &dyn EvalContext,
        args: &[serde_json::Value],
    ) -> std::result::Result<serde_json::Value, BindingError>;
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum BindingState {
    /// The wrapped expression cooperated with capture
    Saved {
        state: serde_json::Value,
        type_id: String,
    },
    /// Fallback: only the expression string survived
    Opaque { expression: String },
}

/// Adapts a compiled [`MethodExpression`] to the deprecated
/// [`MethodBinding`] contract.
pub struct MethodBindingAdapter {
    expression: Option<Box<dyn MethodExpression>>,
    transient: bool,
}

impl MethodBindingAdapter {
    /// Wrap a compiled expression
    pub fn new(expression: Box<dyn MethodExpression>) -> Self {
        Self {
            expression: Some(expression),
            transient: false,
        }
    }

    /// Placeholder used before state restoration
    pub fn uninitialized() -> Self {
        Self {
            expression: None,
            transient: false,
        }
    }

    /// The wrapped expression, if initialized
    pub fn expression(&self) -> Option<&dyn MethodExpression> {
        self.expression.as_deref()
    }

    /// Whether this adapter is excluded from state capture
    pub fn transient(&self) -> bool {
        self.transient
    }

    /// Exclude this adapter from state capture
    pub fn set_transient(&mut self, transient: bool) {
        self.transient = transient;
    }

    /// Capture the wrapped expression; `None` when transient or
    /// uninitialized.
    ///
    /// Expressions that cooperate with capture persist their own state and
    /// type identifier; anything else falls back to the expression string.
    pub fn save_state(&self) -> Option<serde_json::Value> {
        if self.transient {
            return None;
        }
        let expression = self.expression.as_deref()?;
        let state = match (expression.state_type_id(), expression.save_state()) {
            (Some(type_id), Some(state)) => BindingState::Saved {
                state,
                type_id: type_id.to_string(),
            },
            _ => BindingState::Opaque {
                expression: expression.expression_string().to_string(),
            },
        };
        serde_json::to_value(state).ok()
    }

    /// Rebuild the wrapped expression from captured state
    pub fn restore_state(
        &mut self,
        state: &serde_json::Value,
        registry: &ExpressionRegistry,
    ) -> Result<()> {
        let state: BindingState =
            serde_json::from_value(state.clone()).map_err(|err| EngineError::IncompatibleState {
                type_id: "method-binding".to_string(),
                message: err.to_string(),
            })?;
        match state {
            BindingState::Saved { state, type_id } => {
                let Some(mut expression) = registry.create(&type_id) else {
                    warn!("expression type '{type_id}' is not registered");
                    return Err(EngineError::IncompatibleState {
                        type_id,
                        message: "expression type is not registered".to_string(),
                    });
                };
                expression.restore_state(&state)?;
                self.expression = Some(expression);
            }
            BindingState::Opaque { expression } => {
                let compiled = TargetMethodExpression::compile(expression)?;
                self.expression = Some(Box::new(compiled));
            }
        }
        Ok(())
    }

    /// Whether two adapters wrap the same expression, judged by their
    /// expression strings
    pub fn equals_adapter(&self, other: &MethodBindingAdapter) -> bool {
        match (&self.expression, &other.expression) {
            (Some(a), Some(b)) => a.expression_string() == b.expression_string(),
            (None, None) => true,
            _ => false,
        }
    }

    /// Best-effort comparison against an arbitrary [`MethodBinding`].
    ///
    /// Both expression strings are parsed as `#{target.method}` references;
    /// the other binding's target is resolved and its signatures searched
    /// for a method matching the other's name and return type with this
    /// expression's parameter types. Every failure along the way means
    /// "not equal", never an error.
    pub fn equals_binding(&self, other: &dyn MethodBinding, ctx: &dyn EvalContext) -> bool {
        let Some(expression) = self.expression.as_deref() else {
            return false;
        };
        if expression.expression_string() == other.expression_string() {
            return true;
        }
        let Some((_, own_method)) = parse_method_ref(expression.expression_string()) else {
            return false;
        };
        let Some((other_target, other_method)) = parse_method_ref(other.expression_string())
        else {
            return false;
        };
        if own_method != other_method {
            return false;
        }
        let Ok(Some(target)) = ctx.resolve_target(other_target) else {
            return false;
        };
        let Ok(own_info) = expression.method_info(ctx) else {
            return false;
        };
        let Ok(other_return) = other.return_type(ctx) else {
            return false;
        };
        target.method_signatures().iter().any(|sig| {
            sig.name == other_method && sig.returns == other_return && sig.params == own_info.params
        })
    }
}

impl MethodBinding for MethodBindingAdapter {
    fn expression_string(&self) -> &str {
        self.expression
            .as_deref()
            .map(MethodExpression::expression_string)
            .unwrap_or("")
    }

    fn return_type(&self, ctx: &dyn EvalContext) -> std::result::Result<TypeTag, BindingError> {
        let Some(expression) = self.expression.as_deref() else {
            return Err(BindingError::Evaluation("uninitialized binding".to_string()));
        };
        expression
            .method_info(ctx)
            .map(|info| info.returns)
            .map_err(reclassify)
    }

    fn invoke(
        &self,
        ctx: &dyn EvalContext,
        args: &[serde_json::Value],
    ) -> std::result::Result<serde_json::Value, BindingError> {
        let Some(expression) = self.expression.as_deref() else {
            return Err(BindingError::Evaluation("uninitialized binding".to_string()));
        };
        expression.invoke(ctx, args).map_err(reclassify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_expressions;
    use arbor_el::{MapEvalContext, MethodSignature, StaticMethodTarget};
    use std::rc::Rc;

    fn context_with_bean() -> MapEvalContext {
        let target = StaticMethodTarget::new(vec![MethodSignature::new(
            "doWork",
            vec![],
            TypeTag::new("string"),
        )])
        .returning("doWork", serde_json::json!("done"));

        let mut ctx = MapEvalContext::new();
        ctx.insert_target("bean", Rc::new(target));
        ctx
    }

    fn adapter(expr: &str) -> MethodBindingAdapter {
        MethodBindingAdapter::new(Box::new(TargetMethodExpression::compile(expr).unwrap()))
    }

    #[test]
    fn test_invoke_through_adapter() {
        let ctx = context_with_bean();
        let binding = adapter("#{bean.doWork}");

        assert_eq!(binding.expression_string(), "#{bean.doWork}");
        assert_eq!(
            binding.invoke(&ctx, &[]).unwrap(),
            serde_json::json!("done")
        );
        assert_eq!(
            binding.return_type(&ctx).unwrap(),
            TypeTag::new("string")
        );
    }

    #[test]
    fn test_error_reclassification() {
        let binding = adapter("#{bean.doWork}");

        // unresolvable target
        let err = binding.invoke(&MapEvalContext::new(), &[]).unwrap_err();
        assert!(matches!(err, BindingError::MethodNotFound(_)));

        // null target
        let mut ctx = MapEvalContext::new();
        ctx.insert_null_target("bean");
        let err = binding.invoke(&ctx, &[]).unwrap_err();
        assert!(matches!(err, BindingError::NullReference(_)));
    }

    #[test]
    fn test_generic_failure_reports_root_cause() {
        let err = reclassify(EvalError::evaluation_caused_by(
            "outer wrapper",
            std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"),
        ));
        match err {
            BindingError::Evaluation(message) => assert_eq!(message, "disk on fire"),
            other => panic!("expected Evaluation, got {other:?}"),
        }

        let err = reclassify(EvalError::PropertyNotFound("bean.nope".to_string()));
        assert!(matches!(err, BindingError::Evaluation(_)));
    }

    #[test]
    fn test_state_capture_prefers_cooperating_expressions() {
        let binding = adapter("#{bean.doWork}");
        let state = binding.save_state().unwrap();

        let mut restored = MethodBindingAdapter::uninitialized();
        restored.restore_state(&state, &default_expressions()).unwrap();
        assert_eq!(restored.expression_string(), "#{bean.doWork}");

        // transient adapters capture nothing
        let mut transient = adapter("#{bean.doWork}");
        transient.set_transient(true);
        assert!(transient.save_state().is_none());
    }

    #[test]
    fn test_opaque_state_falls_back_to_compilation() {
        let state = serde_json::to_value(BindingState::Opaque {
            expression: "#{bean.doWork}".to_string(),
        })
        .unwrap();

        let mut restored = MethodBindingAdapter::uninitialized();
        restored.restore_state(&state, &default_expressions()).unwrap();
        assert_eq!(restored.expression_string(), "#{bean.doWork}");

        let malformed = serde_json::to_value(BindingState::Opaque {
            expression: "not an expression".to_string(),
        })
        .unwrap();
        assert!(restored.restore_state(&malformed, &default_expressions()).is_err());
    }

    #[test]
    fn test_equals_binding_matches_by_shape() {
        let ctx = context_with_bean();
        let binding = adapter("#{bean.doWork}");
        let same = adapter("#{ bean . doWork }");

        // identical strings short-circuit
        assert!(binding.equals_binding(&binding, &ctx));
        // same target and method shape through resolution
        assert!(binding.equals_binding(&same, &ctx));
    }

    #[test]
    fn test_equals_binding_failures_mean_not_equal() {
        let ctx = context_with_bean();
        let binding = adapter("#{bean.doWork}");

        // different method name
        assert!(!binding.equals_binding(&adapter("#{bean.other}"), &ctx));

        // unresolvable target
        assert!(!binding.equals_binding(&adapter("#{ghost.doWork}"), &ctx));

        // null target
        let mut null_ctx = MapEvalContext::new();
        null_ctx.insert_null_target("bean");
        assert!(!binding.equals_binding(&adapter("#{ bean .doWork }"), &null_ctx));

        // unparseable expression on either side never matches
        struct Raw;
        impl MethodBinding for Raw {
            fn expression_string(&self) -> &str {
                "doWork"
            }
            fn return_type(
                &self,
                _ctx: &dyn EvalContext,
            ) -> std::result::Result<TypeTag, BindingError> {
                Ok(TypeTag::new("string"))
            }
            fn invoke(
                &self,
                _ctx: &dyn EvalContext,
                _args: &[serde_json::Value],
            ) -> std::result::Result<serde_json::Value, BindingError> {
                Err(BindingError::MethodNotFound("doWork".to_string()))
            }
        }
        assert!(!binding.equals_binding(&Raw, &ctx));
    }
}
