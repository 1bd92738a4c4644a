//! Error taxonomy for expression evaluation

use thiserror::Error;

/// Failures surfaced by an expression evaluator.
///
/// The engine never swallows these; the legacy binding adapter reclassifies
/// them into the deprecated binding contract's own error kinds.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The expression's target (method or variable) could not be found
    #[error("not found: {0}")]
    NotFound(String),

    /// A base object was null partway through evaluation
    #[error("null dereference while evaluating '{0}'")]
    NullDereference(String),

    /// A named property does not exist on the resolved base object
    #[error("property not found: {0}")]
    PropertyNotFound(String),

    /// Any other evaluation failure, optionally carrying its cause
    #[error("evaluation failed: {message}")]
    Evaluation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + 'static>>,
    },
}

impl EvalError {
    /// Create a plain evaluation failure with no underlying cause
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
            source: None,
        }
    }

    /// Create an evaluation failure wrapping an underlying cause
    pub fn evaluation_caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + 'static,
    ) -> Self {
        Self::Evaluation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Walk the source chain to the innermost error.
    ///
    /// Used when reclassifying a generic evaluation failure: the deprecated
    /// binding contract reports the root cause, not the wrapper.
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        let mut current: &(dyn std::error::Error + 'static) = self;
        while let Some(source) = current.source() {
            current = source;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("inner failure")]
    struct Inner;

    #[test]
    fn test_root_cause_unwraps_chain() {
        let err = EvalError::evaluation_caused_by("outer", Inner);
        assert_eq!(err.root_cause().to_string(), "inner failure");
    }

    #[test]
    fn test_root_cause_without_source_is_self() {
        let err = EvalError::evaluation("bare");
        assert_eq!(err.root_cause().to_string(), "evaluation failed: bare");
    }
}
