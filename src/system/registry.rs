//! The three named slots owned by the orchestrator.

use crate::actor::ActorRef;
use crate::error::{Result, SystemError};
use std::fmt;
use std::str::FromStr;

/// Name of a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorName {
    /// Application state.
    App,
    /// The renderer.
    Renderer,
    /// UI state.
    Ui,
}

impl ActorName {
    /// Every slot, in registry order.
    pub const ALL: [Self; 3] = [Self::App, Self::Renderer, Self::Ui];

    /// Lowercase name, also used as the spawned actor's name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Renderer => "renderer",
            Self::Ui => "ui",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::App => 0,
            Self::Renderer => 1,
            Self::Ui => 2,
        }
    }
}

impl fmt::Display for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorName {
    type Err = SystemError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| SystemError::UnknownTarget(s.to_string()))
    }
}

/// Handles of `app`, `renderer` and `ui`, each possibly unset.
#[derive(Debug, Default)]
pub struct Registry {
    slots: [Option<ActorRef>; 3],
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle stored under `name`, if any.
    pub fn get(&self, name: ActorName) -> Option<&ActorRef> {
        self.slots[name.index()].as_ref()
    }

    /// The handle stored under `name`, or [`SystemError::ActorNotRegistered`].
    pub fn require(&self, name: ActorName) -> Result<&ActorRef> {
        self.get(name).ok_or(SystemError::ActorNotRegistered(name))
    }

    /// Store `actor` under `name`, returning the handle it replaces.
    pub(crate) fn set(&mut self, name: ActorName, actor: ActorRef) -> Option<ActorRef> {
        self.slots[name.index()].replace(actor)
    }

    /// First unset slot, in registry order.
    pub fn missing(&self) -> Option<ActorName> {
        ActorName::ALL.into_iter().find(|name| self.get(*name).is_none())
    }

    /// True when every slot is set.
    pub fn is_complete(&self) -> bool {
        self.missing().is_none()
    }
}
