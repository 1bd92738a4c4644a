//! The phase-driven request lifecycle
//!
//! Four ordered phases (restore, decode, validate, update-model) followed
//! by a terminal render/save step. Each pre-render phase walks the tree
//! children-before-self, broadcasts the events queued during the phase, and
//! then consults the short-circuit signal: once set, the remaining
//! pre-render phases are skipped and the request jumps straight to
//! render/save.
//!
//! Failure rules (see [`crate::error`]): conversion failures recover
//! locally, validation and model-update failures set the short-circuit
//! signal, and any unexpected error sets the signal and then propagates
//! unchanged.

use log::{debug, trace};

use crate::behavior::NodeRef;
use crate::context::RequestContext;
use crate::error::Result;
use crate::events::broadcast_pending;
use crate::state::{apply, NodeState, Snapshot};
use crate::tree::{client_id, ComponentHandle};
use crate::types::Phase;
use crate::walk::visit_children_first;

/// Restore phase: feed a captured fragment into an existing tree.
///
/// No validation runs and no events fire; fragment matching is lenient
/// (see [`apply`]).
pub fn process_restore(root: &ComponentHandle, state: &NodeState) {
    apply(root, state);
}

fn fail_fatally<T>(ctx: &RequestContext, result: Result<T>) -> Result<T> {
    if result.is_err() {
        // bookkeeping first, then the error propagates unchanged
        ctx.request_render();
    }
    result
}

/// Decode phase: every component reads its own raw input, children before
/// self.
///
/// Conversion failures recover locally (the component is invalid, a
/// message is recorded, siblings still decode) and never set the
/// short-circuit signal by themselves.
pub fn process_decodes(root: &ComponentHandle, ctx: &RequestContext) -> Result<()> {
    visit_children_first(root, &mut |node| {
        let cid = client_id(node);
        trace!("decode '{cid}'");
        let result = node.borrow_mut().run_decode(
            NodeRef {
                handle: node,
                client_id: &cid,
            },
            ctx,
        );
        fail_fatally(ctx, result)
    })
}

/// Validate phase: input-capable components still valid after decode run
/// their validators, children before self.
///
/// A validation failure marks the component invalid and sets the
/// short-circuit signal for the rest of the request.
pub fn process_validators(root: &ComponentHandle, ctx: &RequestContext) -> Result<()> {
    visit_children_first(root, &mut |node| {
        {
            let comp = node.borrow();
            if !comp.behavior().is_input() || !comp.valid() {
                return Ok(());
            }
        }
        let cid = client_id(node);
        trace!("validate '{cid}'");
        let result = node.borrow_mut().run_validate(
            NodeRef {
                handle: node,
                client_id: &cid,
            },
            ctx,
        );
        fail_fatally(ctx, result)?;
        if !node.borrow().valid() {
            debug!("'{cid}' failed validation");
            ctx.request_render();
        }
        Ok(())
    })
}

/// Update-model phase: input-capable components still valid after
/// validation commit their values, children before self.
///
/// A commit failure marks the component invalid and sets the short-circuit
/// signal.
pub fn process_updates(root: &ComponentHandle, ctx: &RequestContext) -> Result<()> {
    visit_children_first(root, &mut |node| {
        {
            let comp = node.borrow();
            if !comp.behavior().is_input() || !comp.valid() {
                return Ok(());
            }
        }
        let cid = client_id(node);
        trace!("update model '{cid}'");
        let result = node.borrow_mut().run_update_model(
            NodeRef {
                handle: node,
                client_id: &cid,
            },
            ctx,
        );
        fail_fatally(ctx, result)?;
        if !node.borrow().valid() {
            debug!("'{cid}' failed to commit");
            ctx.request_render();
        }
        Ok(())
    })
}

/// Produces output for one component during render/save
pub trait Renderer {
    /// Append this component's output
    fn encode(&self, node: &ComponentHandle, ctx: &RequestContext, out: &mut String);
}

/// Renderer that produces no output.
///
/// For hosts that only want the lifecycle's state handling, and for tests.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn encode(&self, _node: &ComponentHandle, _ctx: &RequestContext, _out: &mut String) {}
}

/// Encode a tree pre-order (self, then facets and children), skipping any
/// component whose rendered flag is off together with its whole subtree
pub fn encode_tree(
    root: &ComponentHandle,
    renderer: &dyn Renderer,
    ctx: &RequestContext,
) -> String {
    let mut out = String::new();
    encode_into(root, renderer, ctx, &mut out);
    out
}

fn encode_into(
    node: &ComponentHandle,
    renderer: &dyn Renderer,
    ctx: &RequestContext,
    out: &mut String,
) {
    if !node.borrow().rendered() {
        return;
    }
    renderer.encode(node, ctx, out);
    let kids = node.borrow().facets_and_children();
    for kid in kids {
        encode_into(&kid, renderer, ctx, out);
    }
}

/// Result of one request: the rendered output and the snapshot to persist
/// for the next request
#[derive(Debug)]
pub struct RequestOutcome {
    /// Rendered markup
    pub markup: String,
    /// Captured tree state; `None` when the whole tree is transient
    pub snapshot: Option<Snapshot>,
}

/// Drives the full phase sequence over a tree
pub struct Lifecycle {
    renderer: Box<dyn Renderer>,
}

impl Lifecycle {
    /// Create a lifecycle with the given renderer
    pub fn new(renderer: Box<dyn Renderer>) -> Self {
        Self { renderer }
    }

    /// Create a lifecycle that renders nothing
    pub fn without_renderer() -> Self {
        Self::new(Box::new(NullRenderer))
    }

    /// Run one request over the tree.
    ///
    /// The saved snapshot (if any) restores first; then decode, validate
    /// and update-model run in order, each followed by its event broadcast
    /// and a short-circuit check. Render/save always runs, even when an
    /// earlier phase set the short-circuit signal. A fatal error aborts
    /// the request without rendering.
    pub fn execute(
        &self,
        root: &ComponentHandle,
        ctx: &RequestContext,
        saved: Option<&Snapshot>,
    ) -> Result<RequestOutcome> {
        if let Some(snapshot) = saved {
            debug!("phase {:?}", Phase::RestoreState);
            process_restore(root, &snapshot.root);
        }

        let phases: [(Phase, fn(&ComponentHandle, &RequestContext) -> Result<()>); 3] = [
            (Phase::ApplyRequest, process_decodes),
            (Phase::ProcessValidations, process_validators),
            (Phase::UpdateModel, process_updates),
        ];
        for (phase, processor) in phases {
            if ctx.render_requested() {
                debug!("skipping {phase:?}: render requested");
                continue;
            }
            debug!("phase {phase:?}");
            processor(root, ctx)?;
            broadcast_pending(ctx, phase);
        }

        debug!("phase {:?}", Phase::RenderResponse);
        let markup = encode_tree(root, self.renderer.as_ref(), ctx);
        let snapshot = Snapshot::capture(root);
        Ok(RequestOutcome { markup, snapshot })
    }
}
