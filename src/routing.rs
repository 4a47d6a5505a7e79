//! Upward request routing.
//!
//! Descendant actors never hold a handle to `app`, `ui` or `renderer`. They
//! send a standardized request event to their immediate parent, and every
//! level re-forwards it the same way until it reaches the orchestrator.
//!
//! There are three symmetric instances of the protocol, one per
//! [`Destination`], each made of:
//!
//! - a transition augmenter ([`with_app_update_request`],
//!   [`with_ui_update_request`], [`with_render_request`]) that appends the
//!   bubble step to a transition's actions,
//! - a bubble action factory ([`bubble`], [`bubble_with`]),
//! - a relay transition ([`relay`]) that intermediate levels install so the
//!   request keeps travelling up,
//! - direct-request helpers on [`Upstream`](crate::actor::Upstream) and the
//!   [`send_app`] / [`send_ui`] actions.

use crate::actor::{Action, Event, Transition, APP_UPDATE_REQUESTED, RENDER_REQUESTED, UI_UPDATE_REQUESTED};
use serde_json::Value;
use std::fmt;

/// Where a bubbled request ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// The `app` actor receives the payload.
    App,
    /// The `ui` actor receives the payload.
    Ui,
    /// The renderer receives a fresh snapshot.
    Render,
}

impl Destination {
    /// All destinations.
    pub const ALL: [Self; 3] = [Self::App, Self::Ui, Self::Render];

    /// Event type of the standardized request.
    pub const fn event_type(self) -> &'static str {
        match self {
            Self::App => APP_UPDATE_REQUESTED,
            Self::Ui => UI_UPDATE_REQUESTED,
            Self::Render => RENDER_REQUESTED,
        }
    }

    /// Destination named by a request event type.
    pub fn from_event_type(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dest| dest.event_type() == kind)
    }

    /// Name of the bubble action installed in charts.
    pub const fn action_name(self) -> &'static str {
        match self {
            Self::App => "requestAppUpdate",
            Self::Ui => "requestUiUpdate",
            Self::Render => "requestRenderUpdate",
        }
    }

    /// Build the standardized request event.
    pub fn event(self, payload: Option<Value>) -> Event {
        Event {
            kind: self.event_type().to_string(),
            payload,
        }
    }

    /// Payload forwarded when no transform is given: the triggering event's
    /// payload for app and ui requests, nothing for renders.
    fn default_payload(self, event: &Event) -> Option<Value> {
        match self {
            Self::App | Self::Ui => event.payload.clone(),
            Self::Render => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::App => "app",
            Self::Ui => "ui",
            Self::Render => "render",
        })
    }
}

/// Bubble action with the default payload.
pub fn bubble<C: 'static>(destination: Destination) -> Action<C> {
    bubble_with(destination, move |_, event| destination.default_payload(event))
}

/// Bubble action whose payload is computed from the actor's context and
/// the triggering event.
pub fn bubble_with<C, F>(destination: Destination, transform: F) -> Action<C>
where
    C: 'static,
    F: Fn(&C, &Event) -> Option<Value> + 'static,
{
    Action::new(destination.action_name(), move |ctx, event, cx| {
        cx.upstream().request(destination, transform(ctx, event));
        Ok(())
    })
}

/// Append the bubble step for `destination` to a transition's actions.
pub fn with_request<C: 'static>(destination: Destination, mut actions: Vec<Action<C>>) -> Vec<Action<C>> {
    actions.push(bubble(destination));
    actions
}

/// [`with_request`] for app update requests.
pub fn with_app_update_request<C: 'static>(actions: Vec<Action<C>>) -> Vec<Action<C>> {
    with_request(Destination::App, actions)
}

/// [`with_request`] for ui update requests.
pub fn with_ui_update_request<C: 'static>(actions: Vec<Action<C>>) -> Vec<Action<C>> {
    with_request(Destination::Ui, actions)
}

/// [`with_request`] for render requests.
pub fn with_render_request<C: 'static>(actions: Vec<Action<C>>) -> Vec<Action<C>> {
    with_request(Destination::Render, actions)
}

/// Transition that re-forwards an incoming request to the parent unchanged.
///
/// Install it at every intermediate level between a requesting descendant
/// and the orchestrator.
pub fn relay<C: 'static>(destination: Destination) -> (&'static str, Transition<C>) {
    (
        destination.event_type(),
        Transition::new().action(bubble(destination)),
    )
}

/// Action requesting that `build`'s event be delivered to the `app` actor.
pub fn send_app<C, F>(build: F) -> Action<C>
where
    C: 'static,
    F: Fn(&C, &Event) -> Event + 'static,
{
    Action::new("sendApp", move |ctx, event, cx| cx.upstream().request_app(&build(ctx, event)))
}

/// Action requesting that `build`'s event be delivered to the `ui` actor.
pub fn send_ui<C, F>(build: F) -> Action<C>
where
    C: 'static,
    F: Fn(&C, &Event) -> Event + 'static,
{
    Action::new("sendUi", move |ctx, event, cx| cx.upstream().request_ui(&build(ctx, event)))
}
