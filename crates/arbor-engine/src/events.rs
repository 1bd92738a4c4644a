//! Event queuing and broadcast
//!
//! Events are queued into the request-scoped queue during a phase and
//! broadcast before that phase completes. Delivery on a component happens
//! in exactly two ordered groups: any-phase listeners first (each at most
//! once per event, no matter how many phases broadcast it), then listeners
//! registered for the current phase, both in registration order.
//!
//! A listener can abort an event: delivery of that event stops, the abort
//! is absorbed, and other queued events still process.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use log::{debug, trace};

use crate::context::RequestContext;
use crate::tree::{client_id, ComponentHandle};
use crate::types::{ListenerPhase, Phase};

/// Signal from a listener that no further processing should happen for the
/// current event. Not a fatal error: only the affected event stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortProcessing;

impl fmt::Display for AbortProcessing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("event processing aborted")
    }
}

impl std::error::Error for AbortProcessing {}

/// Payload of an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The component was activated (e.g. a command was triggered)
    Action,
    /// The component's value changed during validation
    ValueChange {
        old: Option<serde_json::Value>,
        new: Option<serde_json::Value>,
    },
    /// Application-defined payload
    Custom(serde_json::Value),
}

/// An event raised by a component during request processing
pub struct Event {
    /// The component the event originated from
    pub source: ComponentHandle,
    /// Payload
    pub kind: EventKind,
    /// Which phase(s) this event may be delivered in
    pub phase: ListenerPhase,
}

impl Event {
    /// Create an event deliverable in any phase
    pub fn new(source: ComponentHandle, kind: EventKind) -> Self {
        Self {
            source,
            kind,
            phase: ListenerPhase::AnyPhase,
        }
    }

    /// Restrict delivery to a specific phase
    pub fn during(mut self, phase: Phase) -> Self {
        self.phase = ListenerPhase::During(phase);
        self
    }

    /// Whether this event may be delivered in the given phase
    pub fn deliverable_in(&self, phase: Phase) -> bool {
        match self.phase {
            ListenerPhase::AnyPhase => true,
            ListenerPhase::During(p) => p == phase,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("source", &self.source.borrow().id())
            .field("kind", &self.kind)
            .field("phase", &self.phase)
            .finish()
    }
}

/// A listener registered on a component
pub trait EventListener {
    /// Which phase(s) this listener wants events in
    fn phase(&self) -> ListenerPhase {
        ListenerPhase::AnyPhase
    }

    /// Handle an event.
    ///
    /// Returning `Err(AbortProcessing)` stops delivery of this event only.
    fn process(&self, event: &Event) -> std::result::Result<(), AbortProcessing>;
}

/// A listener registration on a component, in registration order
pub(crate) struct ListenerEntry {
    pub id: u64,
    pub listener: Rc<dyn EventListener>,
}

/// An event sitting in the request-scoped queue.
///
/// Tracks which any-phase registrations have already received the event so
/// repeated broadcasts across phases never deliver it to them twice.
#[derive(Debug)]
pub struct QueuedEvent {
    /// The queued event
    pub event: Event,
    delivered_any: HashSet<u64>,
}

impl QueuedEvent {
    /// Wrap an event for queuing
    pub fn new(event: Event) -> Self {
        Self {
            event,
            delivered_any: HashSet::new(),
        }
    }
}

/// Broadcast an event to the listeners of its source component for the
/// given phase.
///
/// Returns `Ok(true)` if at least one phase-specific listener remains
/// registered for a phase later than `phase` (any-phase listeners never
/// count: they have already fired). `Err(AbortProcessing)` means a listener
/// stopped this event; the caller drops the event and continues.
///
/// The phase argument is a concrete [`Phase`], so broadcasting "for any
/// phase" is unrepresentable.
pub fn broadcast(
    queued: &mut QueuedEvent,
    phase: Phase,
) -> std::result::Result<bool, AbortProcessing> {
    let source = queued.event.source.clone();
    let entries = source.borrow().listener_snapshot();

    for (id, listener_phase, listener) in &entries {
        if *listener_phase == ListenerPhase::AnyPhase && queued.delivered_any.insert(*id) {
            listener.process(&queued.event)?;
        }
    }
    for (_, listener_phase, listener) in &entries {
        if *listener_phase == ListenerPhase::During(phase) {
            listener.process(&queued.event)?;
        }
    }

    // Future interest is judged after delivery: listeners may have been
    // added or removed while processing.
    let remaining = source.borrow().listener_snapshot();
    Ok(remaining
        .iter()
        .any(|(_, p, _)| matches!(p, ListenerPhase::During(later) if *later > phase)))
}

/// Drain and broadcast every event deliverable in the given phase,
/// repeating until broadcasting stops enqueuing new deliverable events.
///
/// Events whose broadcast reports future interest (and which remain
/// deliverable in a later phase) are requeued after the pump settles, so a
/// single phase never delivers the same event twice.
pub fn broadcast_pending(ctx: &RequestContext, phase: Phase) {
    let mut carry = Vec::new();
    loop {
        let batch = ctx.take_deliverable(phase);
        if batch.is_empty() {
            break;
        }
        for mut queued in batch {
            match broadcast(&mut queued, phase) {
                Ok(true) if queued.event.phase == ListenerPhase::AnyPhase => carry.push(queued),
                Ok(true) => {
                    // phase-restricted event: no later phase can deliver it
                    trace!(
                        "dropping phase-restricted event from '{}' after {:?}",
                        client_id(&queued.event.source),
                        phase
                    );
                }
                Ok(false) => {}
                Err(AbortProcessing) => {
                    debug!(
                        "event from '{}' aborted during {:?}",
                        client_id(&queued.event.source),
                        phase
                    );
                }
            }
        }
    }
    for queued in carry {
        ctx.requeue(queued);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::PanelBehavior;
    use crate::tree::Component;
    use std::cell::RefCell;

    /// Records every event it sees; optionally aborts.
    struct Recording {
        phase: ListenerPhase,
        log: Rc<RefCell<Vec<String>>>,
        name: &'static str,
        abort: bool,
    }

    impl Recording {
        fn new(
            phase: ListenerPhase,
            log: &Rc<RefCell<Vec<String>>>,
            name: &'static str,
        ) -> Rc<dyn EventListener> {
            Rc::new(Self {
                phase,
                log: log.clone(),
                name,
                abort: false,
            })
        }

        fn aborting(
            phase: ListenerPhase,
            log: &Rc<RefCell<Vec<String>>>,
            name: &'static str,
        ) -> Rc<dyn EventListener> {
            Rc::new(Self {
                phase,
                log: log.clone(),
                name,
                abort: true,
            })
        }
    }

    impl EventListener for Recording {
        fn phase(&self) -> ListenerPhase {
            self.phase
        }

        fn process(&self, _event: &Event) -> std::result::Result<(), AbortProcessing> {
            self.log.borrow_mut().push(self.name.to_string());
            if self.abort {
                Err(AbortProcessing)
            } else {
                Ok(())
            }
        }
    }

    fn source_with(listeners: Vec<Rc<dyn EventListener>>) -> ComponentHandle {
        let node = Component::new("source", Box::new(PanelBehavior)).unwrap();
        for listener in listeners {
            node.borrow_mut().add_listener(listener);
        }
        node
    }

    #[test]
    fn test_delivery_order_any_then_phase_specific() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = source_with(vec![
            Recording::new(
                ListenerPhase::During(Phase::ApplyRequest),
                &log,
                "specific",
            ),
            Recording::new(ListenerPhase::AnyPhase, &log, "any"),
        ]);

        let mut queued = QueuedEvent::new(Event::new(node, EventKind::Action));
        broadcast(&mut queued, Phase::ApplyRequest).unwrap();

        // any-phase group fires first despite later registration
        assert_eq!(*log.borrow(), vec!["any", "specific"]);
    }

    #[test]
    fn test_any_phase_listener_fires_at_most_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = source_with(vec![
            Recording::new(ListenerPhase::AnyPhase, &log, "any"),
            Recording::new(ListenerPhase::During(Phase::UpdateModel), &log, "late"),
        ]);

        let mut queued = QueuedEvent::new(Event::new(node, EventKind::Action));
        assert!(broadcast(&mut queued, Phase::ApplyRequest).unwrap());
        assert!(broadcast(&mut queued, Phase::ProcessValidations).unwrap());
        assert!(!broadcast(&mut queued, Phase::UpdateModel).unwrap());

        // the any-phase listener fired exactly once across three phases
        assert_eq!(*log.borrow(), vec!["any", "late"]);
    }

    #[test]
    fn test_future_interest_excludes_any_phase_listeners() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = source_with(vec![Recording::new(ListenerPhase::AnyPhase, &log, "any")]);

        let mut queued = QueuedEvent::new(Event::new(node, EventKind::Action));
        assert!(!broadcast(&mut queued, Phase::ApplyRequest).unwrap());
    }

    #[test]
    fn test_future_interest_tracks_later_phase_listeners() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = source_with(vec![Recording::new(
            ListenerPhase::During(Phase::UpdateModel),
            &log,
            "late",
        )]);

        let mut queued = QueuedEvent::new(Event::new(node.clone(), EventKind::Action));
        assert!(broadcast(&mut queued, Phase::ApplyRequest).unwrap());
        assert!(broadcast(&mut queued, Phase::ProcessValidations).unwrap());
        // once its own phase has run there is nothing later
        assert!(!broadcast(&mut queued, Phase::UpdateModel).unwrap());
    }

    #[test]
    fn test_abort_stops_only_this_event() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = source_with(vec![
            Recording::aborting(ListenerPhase::AnyPhase, &log, "aborts"),
            Recording::new(ListenerPhase::During(Phase::ApplyRequest), &log, "after"),
        ]);

        let mut queued = QueuedEvent::new(Event::new(node.clone(), EventKind::Action));
        assert!(broadcast(&mut queued, Phase::ApplyRequest).is_err());
        // delivery stopped before the phase-specific group
        assert_eq!(*log.borrow(), vec!["aborts"]);

        // a second event on the same component still processes
        let other = QueuedEvent::new(Event::new(node, EventKind::Action));
        assert!(other.event.deliverable_in(Phase::ApplyRequest));
    }

    #[test]
    fn test_pump_delivers_cascading_events() {
        let ctx = Rc::new(RequestContext::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = Component::new("source", Box::new(PanelBehavior)).unwrap();

        // enqueues one follow-up event the first time it fires
        struct Chaining {
            ctx: Rc<RequestContext>,
            log: Rc<RefCell<Vec<String>>>,
            fired: RefCell<bool>,
        }
        impl EventListener for Chaining {
            fn phase(&self) -> ListenerPhase {
                ListenerPhase::During(Phase::ApplyRequest)
            }
            fn process(&self, event: &Event) -> std::result::Result<(), AbortProcessing> {
                self.log.borrow_mut().push("fired".to_string());
                if !std::mem::replace(&mut self.fired.borrow_mut(), true) {
                    self.ctx
                        .queue_event(Event::new(event.source.clone(), EventKind::Action));
                }
                Ok(())
            }
        }
        node.borrow_mut().add_listener(Rc::new(Chaining {
            ctx: ctx.clone(),
            log: log.clone(),
            fired: RefCell::new(false),
        }));

        ctx.queue_event(Event::new(node.clone(), EventKind::Action));
        broadcast_pending(&ctx, Phase::ApplyRequest);

        // the follow-up was observed within the same pump
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(ctx.pending_events(), 0);
    }

    #[test]
    fn test_pump_retains_events_with_future_interest() {
        let ctx = RequestContext::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = source_with(vec![
            Recording::new(ListenerPhase::AnyPhase, &log, "any"),
            Recording::new(ListenerPhase::During(Phase::UpdateModel), &log, "late"),
        ]);

        ctx.queue_event(Event::new(node, EventKind::Action));
        broadcast_pending(&ctx, Phase::ApplyRequest);
        // retained: a later-phase listener is still interested
        assert_eq!(ctx.pending_events(), 1);

        broadcast_pending(&ctx, Phase::UpdateModel);
        assert_eq!(ctx.pending_events(), 0);
        assert_eq!(*log.borrow(), vec!["any", "late"]);
    }
}
