//! Actor handles and upstream links.

use super::executor::{ActorCell, Ready, Runtime};
use super::messages::{Event, MachineSnapshot};
use crate::error::{Result, SystemError};
use crate::routing::Destination;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::rc::{Rc, Weak};

/// Unique identifier of a spawned actor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque reference to a running machine.
///
/// Sending enqueues the event and returns immediately; the event is
/// processed the next time the system drains its run queue.
#[derive(Clone)]
pub struct ActorRef {
    pub(crate) cell: Rc<ActorCell>,
    pub(crate) runtime: Rc<Runtime>,
}

impl ActorRef {
    /// The actor's id.
    pub fn id(&self) -> ActorId {
        self.cell.id
    }

    /// The name the actor was spawned under.
    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// Enqueue an event for this actor.
    pub fn send(&self, event: Event) {
        if self.cell.sender.send(event).is_ok() {
            self.runtime.enqueue(Ready::Actor(self.cell.clone()));
        }
    }

    /// Read the actor's current state and context.
    ///
    /// Fails with [`SystemError::ActorBusy`] when called on an actor that
    /// is in the middle of processing an event.
    pub fn snapshot(&self) -> Result<MachineSnapshot> {
        let machine = self
            .cell
            .machine
            .try_borrow()
            .map_err(|_| SystemError::ActorBusy(self.cell.name.clone()))?;
        machine.snapshot()
    }

    /// Number of events waiting in the mailbox.
    pub fn pending(&self) -> usize {
        self.cell.mailbox.len()
    }

    pub(crate) fn downgrade(&self) -> Weak<ActorCell> {
        Rc::downgrade(&self.cell)
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.cell.id == other.cell.id
    }
}

impl Eq for ActorRef {}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.cell.id)
            .field("name", &self.cell.name)
            .finish()
    }
}

#[derive(Clone)]
enum Target {
    /// The orchestrator's own mailbox.
    Root,
    /// Another actor. Weak so that a child never keeps its parent alive.
    Actor { cell: Weak<ActorCell>, name: String },
}

/// Link from an actor to its immediate parent.
///
/// Injected when the actor is spawned. Every bubble event travels through
/// it exactly one level up; the parent decides whether to relay further.
#[derive(Clone)]
pub struct Upstream {
    target: Target,
    runtime: Rc<Runtime>,
}

impl Upstream {
    pub(crate) fn root(runtime: Rc<Runtime>) -> Self {
        Self {
            target: Target::Root,
            runtime,
        }
    }

    pub(crate) fn actor(parent: &ActorRef) -> Self {
        Self {
            target: Target::Actor {
                cell: parent.downgrade(),
                name: parent.name().to_string(),
            },
            runtime: parent.runtime.clone(),
        }
    }

    /// True when the parent is the orchestrator.
    pub const fn is_root(&self) -> bool {
        matches!(self.target, Target::Root)
    }

    /// Send an event to the parent.
    pub fn send(&self, event: Event) {
        match &self.target {
            Target::Root => self.runtime.send_root(event),
            Target::Actor { cell, name } => match cell.upgrade() {
                Some(cell) => ActorRef {
                    cell,
                    runtime: self.runtime.clone(),
                }
                .send(event),
                None => tracing::warn!(parent = %name, event = %event, "parent is gone, dropping bubble event"),
            },
        }
    }

    /// Send the standardized request event for `destination`.
    pub fn request(&self, destination: Destination, payload: Option<Value>) {
        self.send(destination.event(payload));
    }

    /// Ask the orchestrator to deliver `event` to the `app` actor.
    pub fn request_app(&self, event: &Event) -> Result<()> {
        self.request(Destination::App, Some(encode(event)?));
        Ok(())
    }

    /// Ask the orchestrator to deliver `event` to the `ui` actor.
    pub fn request_ui(&self, event: &Event) -> Result<()> {
        self.request(Destination::Ui, Some(encode(event)?));
        Ok(())
    }

    /// Ask the orchestrator for a render.
    pub fn request_render(&self) {
        self.request(Destination::Render, None);
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Target::Root => f.write_str("Upstream(root)"),
            Target::Actor { name, .. } => write!(f, "Upstream({name})"),
        }
    }
}

fn encode(value: &impl Serialize) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
