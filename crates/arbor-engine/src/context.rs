//! Per-request state
//!
//! One [`RequestContext`] is created per request and threaded explicitly
//! through every phase action. It owns the request parameters, the
//! component messages collected so far, the event queue, and the
//! short-circuit flag that skips the remaining phases.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use log::debug;

use arbor_el::{EvalContext, NullEvalContext};

use crate::events::{Event, QueuedEvent};
use crate::types::{Message, Phase};

/// Request-scoped state threaded through the lifecycle.
///
/// Interior mutability keeps the context shareable: phase actions receive
/// `&RequestContext` and still queue events, record messages and request
/// an early render.
pub struct RequestContext {
    params: HashMap<String, String>,
    messages: RefCell<Vec<(Option<String>, Message)>>,
    render_requested: Cell<bool>,
    queue: RefCell<VecDeque<QueuedEvent>>,
    eval: Rc<dyn EvalContext>,
}

impl RequestContext {
    /// Create a context with no parameters and a null evaluator
    pub fn new() -> Self {
        Self {
            params: HashMap::new(),
            messages: RefCell::new(Vec::new()),
            render_requested: Cell::new(false),
            queue: RefCell::new(VecDeque::new()),
            eval: Rc::new(NullEvalContext),
        }
    }

    /// Replace the expression evaluator
    pub fn with_evaluator(mut self, eval: Rc<dyn EvalContext>) -> Self {
        self.eval = eval;
        self
    }

    /// Add request parameters, keyed by fully-qualified client id
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Look up a request parameter by client id
    pub fn param(&self, client_id: &str) -> Option<&str> {
        self.params.get(client_id).map(String::as_str)
    }

    /// The expression evaluator for this request
    pub fn eval(&self) -> &dyn EvalContext {
        self.eval.as_ref()
    }

    /// Record a message, optionally attributed to a component's client id
    pub fn add_message(&self, client_id: Option<&str>, message: Message) {
        self.messages
            .borrow_mut()
            .push((client_id.map(str::to_string), message));
    }

    /// All messages recorded so far, in recording order
    pub fn messages(&self) -> Vec<(Option<String>, Message)> {
        self.messages.borrow().clone()
    }

    /// Messages attributed to the given client id
    pub fn messages_for(&self, client_id: &str) -> Vec<Message> {
        self.messages
            .borrow()
            .iter()
            .filter(|(id, _)| id.as_deref() == Some(client_id))
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Skip the remaining phases and go straight to rendering.
    ///
    /// Forward-only: once set it stays set for the rest of the request.
    pub fn request_render(&self) {
        if !self.render_requested.replace(true) {
            debug!("render requested; remaining phases will be skipped");
        }
    }

    /// Whether an early render has been requested
    pub fn render_requested(&self) -> bool {
        self.render_requested.get()
    }

    /// Append an event to the request queue
    pub fn queue_event(&self, event: Event) {
        self.queue.borrow_mut().push_back(QueuedEvent::new(event));
    }

    /// Put a partially-delivered event back on the queue for a later phase
    pub(crate) fn requeue(&self, queued: QueuedEvent) {
        self.queue.borrow_mut().push_back(queued);
    }

    /// Remove and return every queued event deliverable in the given phase
    pub(crate) fn take_deliverable(&self, phase: Phase) -> Vec<QueuedEvent> {
        let mut queue = self.queue.borrow_mut();
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(queue.len());
        for queued in queue.drain(..) {
            if queued.event.deliverable_in(phase) {
                taken.push(queued);
            } else {
                kept.push_back(queued);
            }
        }
        *queue = kept;
        taken
    }

    /// Number of events still queued
    pub fn pending_events(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::PanelBehavior;
    use crate::events::EventKind;
    use crate::tree::Component;
    use crate::types::ListenerPhase;

    #[test]
    fn test_params_by_client_id() {
        let ctx = RequestContext::new().with_params([("form:name", "ada")]);
        assert_eq!(ctx.param("form:name"), Some("ada"));
        assert_eq!(ctx.param("form:other"), None);
    }

    #[test]
    fn test_messages_attribution() {
        let ctx = RequestContext::new();
        ctx.add_message(Some("form:age"), Message::error("out of range"));
        ctx.add_message(None, Message::error("request failed"));

        assert_eq!(ctx.messages().len(), 2);
        let for_age = ctx.messages_for("form:age");
        assert_eq!(for_age.len(), 1);
        assert_eq!(for_age[0].summary, "out of range");
        assert!(ctx.messages_for("form:name").is_empty());
    }

    #[test]
    fn test_render_request_is_forward_only() {
        let ctx = RequestContext::new();
        assert!(!ctx.render_requested());
        ctx.request_render();
        ctx.request_render();
        assert!(ctx.render_requested());
    }

    #[test]
    fn test_take_deliverable_partitions_by_phase() {
        let ctx = RequestContext::new();
        let node = Component::new("source", Box::new(PanelBehavior)).unwrap();
        ctx.queue_event(Event::new(node.clone(), EventKind::Action));
        ctx.queue_event(
            Event::new(node.clone(), EventKind::Action).during(Phase::UpdateModel),
        );

        let now = ctx.take_deliverable(Phase::ApplyRequest);
        assert_eq!(now.len(), 1);
        assert_eq!(now[0].event.phase, ListenerPhase::AnyPhase);
        assert_eq!(ctx.pending_events(), 1);

        let later = ctx.take_deliverable(Phase::UpdateModel);
        assert_eq!(later.len(), 1);
        assert_eq!(ctx.pending_events(), 0);
    }
}
