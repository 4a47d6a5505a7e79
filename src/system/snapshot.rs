//! Snapshot composer.

use super::registry::{ActorName, Registry};
use crate::actor::{ActorRef, Event, MachineSnapshot, FIRST_RENDER_REQUESTED, RENDER_REQUESTED};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Combined view of `app` and `ui` handed to the render callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// The `app` actor's state and context.
    pub app: MachineSnapshot,
    /// The `ui` actor's state and context.
    pub ui: MachineSnapshot,
}

/// Read both actors as they are right now.
pub fn compose(app: &ActorRef, ui: &ActorRef) -> Result<SystemSnapshot> {
    Ok(SystemSnapshot {
        app: app.snapshot()?,
        ui: ui.snapshot()?,
    })
}

/// Build the render request event for the renderer from a fresh snapshot.
pub fn render_request(registry: &Registry, first: bool) -> Result<Event> {
    let snapshot = compose(
        registry.require(ActorName::App)?,
        registry.require(ActorName::Ui)?,
    )?;
    let kind = if first {
        FIRST_RENDER_REQUESTED
    } else {
        RENDER_REQUESTED
    };
    Ok(Event::with_payload(kind, serde_json::to_value(snapshot)?))
}
