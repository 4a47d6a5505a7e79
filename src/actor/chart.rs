//! Declarative state charts.
//!
//! A [`StateChart`] is a [`Machine`] described as data: named states, the
//! transitions each state takes on an event type, and the actions bound to
//! those transitions. The routing helpers in [`crate::routing`] produce
//! actions and transitions for this type.
//!
//! ```ignore
//! let counter = StateChart::builder("counter", Counter { count: 0 })
//!     .initial("idle")
//!     .state(
//!         "idle",
//!         StateNode::new().on(
//!             "INC",
//!             Transition::new().actions(with_render_request(vec![
//!                 Action::assign("increment", |ctx: &mut Counter, _| ctx.count += 1),
//!             ])),
//!         ),
//!     )
//!     .build()?;
//! ```

use super::executor::ActorContext;
use super::machine::Machine;
use super::messages::{Event, StateValue};
use crate::error::{Result, SystemError};
use crate::routing::{self, Destination};
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Event passed to the initial state's entry actions.
pub const INIT_EVENT: &str = "triad.init";

type ActionFn<C> = dyn Fn(&mut C, &Event, &mut ActorContext) -> Result<()>;

/// A named function bound to a transition or to a state's entry.
pub struct Action<C> {
    name: Cow<'static, str>,
    run: Rc<ActionFn<C>>,
}

impl<C> Action<C> {
    /// An effecting action with full access to the actor context.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, run: F) -> Self
    where
        F: Fn(&mut C, &Event, &mut ActorContext) -> Result<()> + 'static,
    {
        Self {
            name: name.into(),
            run: Rc::new(run),
        }
    }

    /// A pure context update.
    pub fn assign<F>(name: impl Into<Cow<'static, str>>, update: F) -> Self
    where
        F: Fn(&mut C, &Event) + 'static,
    {
        Self::new(name, move |ctx, event, _| {
            update(ctx, event);
            Ok(())
        })
    }

    /// Send an event built from context and triggering event to the parent.
    /// `None` sends nothing.
    pub fn send_upstream<F>(name: impl Into<Cow<'static, str>>, build: F) -> Self
    where
        F: Fn(&C, &Event) -> Option<Event> + 'static,
    {
        Self::new(name, move |ctx, event, cx| {
            if let Some(out) = build(ctx, event) {
                cx.upstream().send(out);
            }
            Ok(())
        })
    }

    /// The action's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut C, event: &Event, cx: &mut ActorContext) -> Result<()> {
        trace!(action = %self.name, event = %event, "running action");
        (self.run)(ctx, event, cx)
    }
}

impl<C> Clone for Action<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            run: self.run.clone(),
        }
    }
}

impl<C> fmt::Debug for Action<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({})", self.name)
    }
}

/// What happens when a state receives a given event type.
pub struct Transition<C> {
    target: Option<String>,
    actions: Vec<Action<C>>,
}

impl<C> Transition<C> {
    /// A transition that stays in the current state and runs no actions.
    pub const fn new() -> Self {
        Self {
            target: None,
            actions: Vec::new(),
        }
    }

    /// A transition to `target`.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            actions: Vec::new(),
        }
    }

    /// Append one action.
    #[must_use]
    pub fn action(mut self, action: Action<C>) -> Self {
        self.actions.push(action);
        self
    }

    /// Append several actions, in order.
    #[must_use]
    pub fn actions(mut self, actions: Vec<Action<C>>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Names of the bound actions.
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(Action::name).collect()
    }
}

impl<C> Default for Transition<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// One state of a chart.
pub struct StateNode<C> {
    on: HashMap<String, Transition<C>>,
    entry: Vec<Action<C>>,
}

impl<C> StateNode<C> {
    /// A state with no transitions.
    pub fn new() -> Self {
        Self {
            on: HashMap::new(),
            entry: Vec::new(),
        }
    }

    /// Handle `event_type` with `transition`.
    #[must_use]
    pub fn on(mut self, event_type: impl Into<String>, transition: Transition<C>) -> Self {
        self.on.insert(event_type.into(), transition);
        self
    }

    /// Run `action` whenever the state is entered.
    #[must_use]
    pub fn entry(mut self, action: Action<C>) -> Self {
        self.entry.push(action);
        self
    }
}

impl<C> Default for StateNode<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`StateChart`].
pub struct StateChartBuilder<C> {
    id: String,
    initial: Option<String>,
    context: C,
    states: HashMap<String, StateNode<C>>,
    on: HashMap<String, Transition<C>>,
}

impl<C> StateChartBuilder<C> {
    /// Name of the initial state.
    #[must_use]
    pub fn initial(mut self, state: impl Into<String>) -> Self {
        self.initial = Some(state.into());
        self
    }

    /// Add a state.
    #[must_use]
    pub fn state(mut self, name: impl Into<String>, node: StateNode<C>) -> Self {
        self.states.insert(name.into(), node);
        self
    }

    /// Chart-level transition, taken when the current state has none for
    /// `event_type`.
    #[must_use]
    pub fn on(mut self, event_type: impl Into<String>, transition: Transition<C>) -> Self {
        self.on.insert(event_type.into(), transition);
        self
    }

    /// Re-forward requests for `destination` to the parent from any state.
    #[must_use]
    pub fn relay(self, destination: Destination) -> Self
    where
        C: 'static,
    {
        let (event_type, transition) = routing::relay(destination);
        self.on(event_type, transition)
    }

    /// Validate and build the chart.
    ///
    /// Charts without states get a single implicit `"active"` state.
    pub fn build(mut self) -> Result<StateChart<C>> {
        if self.states.is_empty() && self.initial.is_none() {
            self.states.insert("active".to_string(), StateNode::new());
            self.initial = Some("active".to_string());
        }

        let initial = self
            .initial
            .ok_or_else(|| SystemError::InvalidMachine(format!("`{}` has no initial state", self.id)))?;
        if !self.states.contains_key(&initial) {
            return Err(SystemError::InvalidMachine(format!(
                "`{}`: initial state `{initial}` is not defined",
                self.id
            )));
        }

        let transitions = self
            .states
            .values()
            .flat_map(|node| node.on.values())
            .chain(self.on.values());
        for transition in transitions {
            if let Some(target) = &transition.target {
                if !self.states.contains_key(target) {
                    return Err(SystemError::InvalidMachine(format!(
                        "`{}`: transition targets unknown state `{target}`",
                        self.id
                    )));
                }
            }
        }

        Ok(StateChart {
            id: self.id,
            states: self.states,
            on: self.on,
            current: initial,
            context: self.context,
        })
    }
}

/// A [`Machine`] defined by states, transitions and actions.
pub struct StateChart<C> {
    id: String,
    states: HashMap<String, StateNode<C>>,
    on: HashMap<String, Transition<C>>,
    current: String,
    context: C,
}

impl<C> StateChart<C> {
    /// Start describing a chart with the given initial context.
    pub fn builder(id: impl Into<String>, context: C) -> StateChartBuilder<C> {
        StateChartBuilder {
            id: id.into(),
            initial: None,
            context,
            states: HashMap::new(),
            on: HashMap::new(),
        }
    }

    /// The chart's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The typed context.
    pub const fn data(&self) -> &C {
        &self.context
    }

    fn enter(&mut self, event: &Event, cx: &mut ActorContext) -> Result<()> {
        let entry = self
            .states
            .get(&self.current)
            .map(|node| node.entry.clone())
            .unwrap_or_default();
        for action in &entry {
            action.run(&mut self.context, event, cx)?;
        }
        Ok(())
    }
}

impl<C: Serialize> Machine for StateChart<C> {
    fn state(&self) -> StateValue {
        StateValue::new(self.current.as_str())
    }

    fn context(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.context)?)
    }

    fn start(&mut self, cx: &mut ActorContext) -> Result<()> {
        self.enter(&Event::new(INIT_EVENT), cx)
    }

    fn handle(&mut self, event: Event, cx: &mut ActorContext) -> Result<()> {
        let transition = self
            .states
            .get(&self.current)
            .and_then(|node| node.on.get(&event.kind))
            .or_else(|| self.on.get(&event.kind));
        let Some(transition) = transition else {
            trace!(chart = %self.id, state = %self.current, event = %event, "unhandled event");
            return Ok(());
        };

        let target = transition.target.clone();
        let actions = transition.actions.clone();
        for action in &actions {
            action.run(&mut self.context, &event, cx)?;
        }

        if let Some(target) = target {
            trace!(chart = %self.id, from = %self.current, to = %target, "transition");
            self.current = target;
            self.enter(&event, cx)?;
        }
        Ok(())
    }
}
