//! Arbor: a server-side, stateful component-tree lifecycle engine
//!
//! A tree of [`Component`]s is driven through an ordered request lifecycle:
//! restore saved state, decode raw input, validate, commit to the model,
//! then render and capture the next [`Snapshot`]. Components queue
//! [`Event`]s during processing; each phase broadcasts its events before
//! the engine moves on, and any phase can raise the forward-only
//! short-circuit signal that skips the remaining pre-render phases.
//!
//! Expression evaluation lives behind the [`arbor_el`] contracts; this
//! crate never evaluates an expression itself.
//!
//! ```
//! use arbor_engine::{
//!     add_child, Component, FormBehavior, InputBehavior, Lifecycle, RequestContext,
//! };
//!
//! let form = Component::new("form", Box::new(FormBehavior)).unwrap();
//! let name = Component::new("name", Box::new(InputBehavior::new())).unwrap();
//! add_child(&form, name).unwrap();
//!
//! let ctx = RequestContext::new().with_params([("form:name", "Ada")]);
//! let outcome = Lifecycle::without_renderer()
//!     .execute(&form, &ctx, None)
//!     .unwrap();
//! assert!(outcome.snapshot.is_some());
//! ```

pub mod behavior;
pub mod binding;
pub mod context;
pub mod error;
pub mod events;
pub mod input;
pub mod lifecycle;
pub mod registry;
pub mod state;
pub mod tree;
pub mod types;
pub mod walk;

pub use behavior::{
    Behavior, FormBehavior, NodeRef, OutputBehavior, PanelBehavior, FORM_TYPE, OUTPUT_TYPE,
    PANEL_TYPE,
};
pub use binding::{BindingError, MethodBinding, MethodBindingAdapter};
pub use context::RequestContext;
pub use error::{EngineError, Result};
pub use events::{AbortProcessing, Event, EventKind, EventListener, QueuedEvent};
pub use input::{
    ConversionError, Converter, InputBehavior, IntegerConverter, RangeValidator, TextConverter,
    ValidationFailure, Validator, INPUT_TYPE,
};
pub use lifecycle::{
    encode_tree, process_decodes, process_restore, process_updates, process_validators, Lifecycle,
    NullRenderer, Renderer, RequestOutcome,
};
pub use registry::{
    default_behaviors, default_expressions, BehaviorRegistry, ExpressionRegistry, Registry,
};
pub use state::{apply, capture_node, rebuild, rebuild_snapshot, NodeState, OwnState, Snapshot};
pub use tree::{
    add_child, client_id, insert_child, is_valid_id, remove_child, remove_facet, set_facet,
    Component, ComponentCore, ComponentHandle,
};
pub use types::{
    ListenerPhase, Message, Phase, Severity, GENERATED_ID_PREFIX, SEPARATOR_CHAR,
};
pub use walk::{find_component, root_of, visit_children_first};
