//! The `Machine` trait: what a spawned actor runs.

use super::executor::ActorContext;
use super::messages::{Event, MachineSnapshot, StateValue};
use crate::error::Result;
use serde_json::Value;

/// A message-driven state machine.
///
/// The executor calls [`Machine::start`] once when the actor is spawned and
/// then [`Machine::handle`] for every event in its mailbox, one at a time.
/// The context is private to the machine; other actors only ever see the
/// copy returned by [`Machine::snapshot`].
pub trait Machine {
    /// Current state.
    fn state(&self) -> StateValue;

    /// Current context as a JSON value.
    fn context(&self) -> Result<Value>;

    /// Entry hook, run synchronously at spawn time.
    fn start(&mut self, cx: &mut ActorContext) -> Result<()> {
        let _ = cx;
        Ok(())
    }

    /// Process one event to completion.
    fn handle(&mut self, event: Event, cx: &mut ActorContext) -> Result<()>;

    /// Capture state and context.
    fn snapshot(&self) -> Result<MachineSnapshot> {
        Ok(MachineSnapshot {
            state: self.state(),
            context: self.context()?,
        })
    }
}

/// Zero-argument constructor of a machine, consumed at registration.
pub type MachineFactory = Box<dyn FnOnce() -> Box<dyn Machine>>;

/// Erase a typed factory.
pub fn boxed<M, F>(factory: F) -> MachineFactory
where
    M: Machine + 'static,
    F: FnOnce() -> M + 'static,
{
    Box::new(move || Box::new(factory()) as Box<dyn Machine>)
}
