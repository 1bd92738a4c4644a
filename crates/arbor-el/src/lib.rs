//! Expression-language contracts for the Arbor component-tree engine
//!
//! This crate defines the *interface boundary* between the tree lifecycle
//! engine and whatever expression-language implementation surrounds it.
//! It deliberately contains no evaluator: just the error taxonomy, the
//! compiled method-expression abstraction, the method-shape metadata used
//! for signature matching, and the evaluation-context trait the engine
//! threads through every phase.
//!
//! Consumers plug in a real evaluator by implementing [`EvalContext`];
//! tests use the in-memory [`MapEvalContext`].

pub mod context;
pub mod error;
pub mod method;

pub use context::{EvalContext, MapEvalContext, NullEvalContext, StaticMethodTarget};
pub use error::EvalError;
pub use method::{
    parse_method_ref, MethodExpression, MethodSignature, MethodTarget, TargetMethodExpression,
    TypeTag, TARGET_METHOD_EXPRESSION_TYPE,
};
