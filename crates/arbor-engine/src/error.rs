//! Error types for the lifecycle engine
//!
//! Only conditions that abort the current operation live here. Locally
//! recovered conditions are plain values: conversion and validation
//! failures mark the component invalid, an unresolvable snapshot fragment
//! restores to `None`, and an aborted event delivery stops that one event.

use thiserror::Error;

use arbor_el::EvalError;

use crate::types::{GENERATED_ID_PREFIX, SEPARATOR_CHAR};

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort the current engine operation
#[derive(Debug, Error)]
pub enum EngineError {
    /// A component id violates the identifier rules
    #[error(
        "invalid component id '{0}': ids must be non-empty, use only letters, digits, '-' or '_', \
         and must not begin with '{SEPARATOR_CHAR}' or '{GENERATED_ID_PREFIX}'"
    )]
    InvalidId(String),

    /// A component was attached while it still had a parent
    #[error("component '{child}' already has a parent; detach it before attaching to '{parent}'")]
    AlreadyAttached { child: String, parent: String },

    /// A component was attached to itself
    #[error("component '{0}' cannot be attached to itself")]
    SelfAttachment(String),

    /// An attribute name is backed by a component property
    #[error("attribute '{0}' is backed by a component property and cannot be removed")]
    PropertyBackedAttribute(String),

    /// An attribute value has the wrong type for a property-backed name
    #[error("attribute '{name}' expects a {expected} value")]
    AttributeType { name: String, expected: &'static str },

    /// Captured state does not match the shape the behavior expects
    #[error("incompatible saved state for '{type_id}': {message}")]
    IncompatibleState { type_id: String, message: String },

    /// Expression evaluation failed outside the legacy adapter
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected fatal failure inside a phase action
    #[error("{0}")]
    Fatal(String),
}

impl EngineError {
    /// Create a fatal error with a message
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }
}
