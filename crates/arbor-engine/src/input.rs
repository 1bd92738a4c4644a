//! Input-capable components
//!
//! [`InputBehavior`] holds a submitted raw string, a converted local value,
//! attached validators and an optional write-back binding. Conversion and
//! validation failures never abort the request: they mark the component
//! invalid, record a message against its client id, and keep the raw
//! submission around so it can be re-rendered.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::behavior::{Behavior, NodeRef};
use crate::context::RequestContext;
use crate::error::{EngineError, Result};
use crate::events::{Event, EventKind};
use crate::tree::ComponentCore;
use crate::types::Message;

/// Registry identifier for [`InputBehavior`]
pub const INPUT_TYPE: &str = "input";

/// A raw submission that could not be converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    /// Human-readable description of the failure
    pub message: String,
}

impl ConversionError {
    /// Create a conversion error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Converts between raw request strings and typed values
pub trait Converter {
    /// Parse a raw submission into a typed value
    fn to_value(&self, raw: &str) -> std::result::Result<serde_json::Value, ConversionError>;

    /// Format a typed value for output
    fn to_text(&self, value: &serde_json::Value) -> String;
}

/// Identity converter: the submission is the value
#[derive(Debug, Default)]
pub struct TextConverter;

impl Converter for TextConverter {
    fn to_value(&self, raw: &str) -> std::result::Result<serde_json::Value, ConversionError> {
        Ok(serde_json::Value::String(raw.to_string()))
    }

    fn to_text(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Converts submissions to 64-bit integers
#[derive(Debug, Default)]
pub struct IntegerConverter;

impl Converter for IntegerConverter {
    fn to_value(&self, raw: &str) -> std::result::Result<serde_json::Value, ConversionError> {
        raw.trim()
            .parse::<i64>()
            .map(serde_json::Value::from)
            .map_err(|_| ConversionError::new(format!("'{raw}' is not an integer")))
    }

    fn to_text(&self, value: &serde_json::Value) -> String {
        value.to_string()
    }
}

/// A converted value rejected by a validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Human-readable description of the failure
    pub message: String,
}

impl ValidationFailure {
    /// Create a validation failure
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Checks a converted value before it reaches the model
pub trait Validator {
    /// Accept or reject a converted value
    fn validate(&self, value: &serde_json::Value) -> std::result::Result<(), ValidationFailure>;
}

/// Accepts numbers within an inclusive range
#[derive(Debug, Clone, Copy)]
pub struct RangeValidator {
    /// Lower bound, inclusive
    pub min: i64,
    /// Upper bound, inclusive
    pub max: i64,
}

impl RangeValidator {
    /// Create a range validator with inclusive bounds
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

impl Validator for RangeValidator {
    fn validate(&self, value: &serde_json::Value) -> std::result::Result<(), ValidationFailure> {
        let Some(n) = value.as_i64() else {
            return Err(ValidationFailure::new("value is not an integer"));
        };
        if n < self.min || n > self.max {
            return Err(ValidationFailure::new(format!(
                "{n} is outside the range {}..={}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct InputState {
    local_value: Option<serde_json::Value>,
    previous: Option<serde_json::Value>,
    submitted: Option<String>,
    value_binding: Option<String>,
}

/// An editable component that decodes, converts, validates and commits a
/// submitted value.
///
/// Attached converters and validators are configuration, not state: they
/// are not captured in snapshots and must be re-attached when the tree is
/// rebuilt.
pub struct InputBehavior {
    submitted: Option<String>,
    local_value: Option<serde_json::Value>,
    previous: Option<serde_json::Value>,
    converter: Box<dyn Converter>,
    validators: Vec<Box<dyn Validator>>,
    value_binding: Option<String>,
}

impl Default for InputBehavior {
    fn default() -> Self {
        Self {
            submitted: None,
            local_value: None,
            previous: None,
            converter: Box::new(TextConverter),
            validators: Vec::new(),
            value_binding: None,
        }
    }
}

impl InputBehavior {
    /// Create a text input with no validators and no binding
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the converter
    pub fn with_converter(mut self, converter: Box<dyn Converter>) -> Self {
        self.converter = converter;
        self
    }

    /// Attach a validator
    pub fn with_validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Bind the committed value to a writable expression
    pub fn with_value_binding(mut self, expr: impl Into<String>) -> Self {
        self.value_binding = Some(expr.into());
        self
    }

    /// The raw submission retained from the current request, if any
    pub fn submitted(&self) -> Option<&str> {
        self.submitted.as_deref()
    }

    /// The converted local value, if any
    pub fn local_value(&self) -> Option<&serde_json::Value> {
        self.local_value.as_ref()
    }
}

impl Behavior for InputBehavior {
    fn type_id(&self) -> &str {
        INPUT_TYPE
    }

    fn is_input(&self) -> bool {
        true
    }

    fn decode(
        &mut self,
        core: &mut ComponentCore,
        node: NodeRef<'_>,
        ctx: &RequestContext,
    ) -> Result<()> {
        let Some(raw) = ctx.param(node.client_id) else {
            // nothing submitted for this component
            return Ok(());
        };
        self.submitted = Some(raw.to_string());
        match self.converter.to_value(raw) {
            Ok(value) => {
                self.local_value = Some(value);
            }
            Err(err) => {
                core.set_valid(false);
                ctx.add_message(
                    Some(node.client_id),
                    Message::error("conversion failed").with_detail(err.to_string()),
                );
            }
        }
        Ok(())
    }

    fn validate(
        &mut self,
        core: &mut ComponentCore,
        node: NodeRef<'_>,
        ctx: &RequestContext,
    ) -> Result<()> {
        let Some(value) = self.local_value.clone() else {
            return Ok(());
        };
        for validator in &self.validators {
            if let Err(failure) = validator.validate(&value) {
                core.set_valid(false);
                ctx.add_message(
                    Some(node.client_id),
                    Message::error("validation failed").with_detail(failure.to_string()),
                );
                return Ok(());
            }
        }
        if self.previous.as_ref() != Some(&value) {
            ctx.queue_event(Event::new(
                node.handle.clone(),
                EventKind::ValueChange {
                    old: self.previous.clone(),
                    new: Some(value.clone()),
                },
            ));
        }
        self.previous = Some(value);
        self.submitted = None;
        Ok(())
    }

    fn update_model(
        &mut self,
        core: &mut ComponentCore,
        node: NodeRef<'_>,
        ctx: &RequestContext,
    ) -> Result<()> {
        let (Some(binding), Some(value)) = (self.value_binding.as_deref(), &self.local_value)
        else {
            return Ok(());
        };
        match ctx.eval().set_value(binding, value.clone()) {
            Ok(()) => {
                // committed to the model; the local copy is no longer the
                // source of truth
                self.local_value = None;
            }
            Err(err) => {
                core.set_valid(false);
                ctx.add_message(
                    Some(node.client_id),
                    Message::error("model update failed").with_detail(err.to_string()),
                );
            }
        }
        Ok(())
    }

    fn save_state(&self) -> Option<serde_json::Value> {
        let state = InputState {
            local_value: self.local_value.clone(),
            previous: self.previous.clone(),
            submitted: self.submitted.clone(),
            value_binding: self.value_binding.clone(),
        };
        serde_json::to_value(state).ok()
    }

    fn restore_state(&mut self, state: &serde_json::Value) -> Result<()> {
        let state: InputState =
            serde_json::from_value(state.clone()).map_err(|err| EngineError::IncompatibleState {
                type_id: INPUT_TYPE.to_string(),
                message: err.to_string(),
            })?;
        self.local_value = state.local_value;
        self.previous = state.previous;
        self.submitted = state.submitted;
        self.value_binding = state.value_binding;
        Ok(())
    }

    fn has_property(&self, name: &str) -> bool {
        name == "value"
    }

    fn property(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "value" => self.local_value.clone(),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: &serde_json::Value) -> Result<bool> {
        match name {
            "value" => {
                self.local_value = Some(value.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
