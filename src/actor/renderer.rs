//! Renderer: the machine that turns system snapshots into output.
//!
//! The renderer starts in `setup`. The first render request is drawn
//! synchronously while the event is processed and moves it to `idle`, where
//! it stays. Every later request is handed to the frame scheduler, so
//! drawing happens on the next frame and never inline with the request.

use super::executor::ActorContext;
use super::machine::Machine;
use super::messages::{Event, StateValue, FIRST_RENDER_REQUESTED, RENDER_REQUESTED};
use crate::error::{BoxError, Result, SystemError};
use crate::system::SystemSnapshot;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, trace};

/// Renderer state before the first render.
pub const SETUP_STATE: &str = "setup";

/// Renderer state after the first render.
pub const IDLE_STATE: &str = "idle";

/// The external drawing function.
pub type RenderFn = dyn FnMut(&SystemSnapshot) -> std::result::Result<(), BoxError>;

/// How render requests arriving within one frame are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoalescePolicy {
    /// At most one render per frame, using the latest snapshot.
    #[default]
    LatestPerFrame,
    /// One render per request, in request order.
    EveryRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Setup,
    Idle,
}

/// Shared between the machine and the callbacks it schedules.
struct Painter {
    render: RefCell<Box<RenderFn>>,
    renders: Cell<u64>,
}

impl Painter {
    fn draw(&self, snapshot: &SystemSnapshot) -> Result<()> {
        let mut render = self.render.borrow_mut();
        (*render)(snapshot).map_err(SystemError::RenderCallback)?;
        self.renders.set(self.renders.get() + 1);
        Ok(())
    }
}

/// The renderer machine.
pub struct Renderer {
    phase: Phase,
    policy: CoalescePolicy,
    painter: Rc<Painter>,
    /// Latest snapshot waiting for a scheduled frame.
    pending: Rc<RefCell<Option<SystemSnapshot>>>,
}

impl Renderer {
    /// Create a renderer around a drawing function.
    pub fn new<F>(render: F) -> Self
    where
        F: FnMut(&SystemSnapshot) -> std::result::Result<(), BoxError> + 'static,
    {
        Self {
            phase: Phase::Setup,
            policy: CoalescePolicy::default(),
            painter: Rc::new(Painter {
                render: RefCell::new(Box::new(render)),
                renders: Cell::new(0),
            }),
            pending: Rc::new(RefCell::new(None)),
        }
    }

    /// Zero-argument factory for [`System::register`](crate::System::register).
    pub fn factory<F>(render: F) -> impl FnOnce() -> Self
    where
        F: FnMut(&SystemSnapshot) -> std::result::Result<(), BoxError> + 'static,
    {
        move || Self::new(render)
    }

    /// Choose the coalescing policy.
    #[must_use]
    pub fn with_policy(mut self, policy: CoalescePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The coalescing policy in use.
    pub const fn policy(&self) -> CoalescePolicy {
        self.policy
    }

    /// Completed renders so far.
    pub fn renders(&self) -> u64 {
        self.painter.renders.get()
    }

    fn decode(event: &Event) -> Result<SystemSnapshot> {
        let payload = event
            .payload
            .clone()
            .ok_or_else(|| SystemError::malformed(&event.kind, None))?;
        serde_json::from_value(payload).map_err(|e| SystemError::malformed(&event.kind, Some(e)))
    }

    fn schedule(&self, snapshot: SystemSnapshot, cx: &ActorContext) {
        let painter = self.painter.clone();
        match self.policy {
            CoalescePolicy::EveryRequest => {
                cx.frames().schedule(Box::new(move |tick| {
                    trace!(frame = tick.frame, "rendering frame");
                    painter.draw(&snapshot)
                }));
            }
            CoalescePolicy::LatestPerFrame => {
                let already_scheduled = self.pending.borrow_mut().replace(snapshot).is_some();
                if already_scheduled {
                    trace!("render already scheduled, replacing snapshot");
                    return;
                }
                let pending = self.pending.clone();
                cx.frames().schedule(Box::new(move |tick| {
                    let Some(snapshot) = pending.borrow_mut().take() else {
                        return Ok(());
                    };
                    trace!(frame = tick.frame, "rendering frame");
                    painter.draw(&snapshot)
                }));
            }
        }
    }
}

impl Machine for Renderer {
    fn state(&self) -> StateValue {
        match self.phase {
            Phase::Setup => StateValue::new(SETUP_STATE),
            Phase::Idle => StateValue::new(IDLE_STATE),
        }
    }

    fn context(&self) -> Result<Value> {
        Ok(json!({ "renders": self.renders() }))
    }

    fn handle(&mut self, event: Event, cx: &mut ActorContext) -> Result<()> {
        match (self.phase, event.kind.as_str()) {
            (Phase::Setup, FIRST_RENDER_REQUESTED) => {
                let snapshot = Self::decode(&event)?;
                debug!("first render");
                self.painter.draw(&snapshot)?;
                self.phase = Phase::Idle;
            }
            (Phase::Idle, RENDER_REQUESTED) => {
                let snapshot = Self::decode(&event)?;
                self.schedule(snapshot, cx);
            }
            (phase, kind) => {
                trace!(?phase, event = kind, "renderer ignores event");
            }
        }
        Ok(())
    }
}
