//! Actor Model: message-driven state machines on a cooperative executor.
//!
//! Every actor runs a [`Machine`] and owns a FIFO mailbox. Actors never
//! call each other; they send [`Event`]s, and the executor processes them one
//! at a time, to completion, in send order.
//!
//! - **Machines**: implement [`Machine`] by hand or describe a [`StateChart`]
//! - **Upstream**: each actor holds an [`Upstream`] link to its parent,
//!   injected at spawn time
//! - **Renderer**: the built-in machine that draws system snapshots
//! - **Frames**: deferred work goes through a [`FrameScheduler`], fired by a
//!   [`FrameClock`] ([`Ticker`] or [`ManualClock`])
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   Event    ┌──────────────┐
//! │    actor     │ ─────────▶ │   mailbox    │
//! └──────────────┘            └──────────────┘
//!        ▲                           │
//!        │ handle(event)             │ run queue (global FIFO)
//!        │                           ▼
//! ┌──────────────┐            ┌──────────────┐
//! │   Machine    │ ◀───────── │   Executor   │
//! └──────────────┘            └──────────────┘
//!        │
//!        │ schedule(callback)
//!        ▼
//! ┌──────────────┐   Tick     ┌──────────────┐
//! │  FrameQueue  │ ◀───────── │ Ticker thread│
//! └──────────────┘            └──────────────┘
//! ```

mod chart;
pub(crate) mod executor;
mod frame;
mod handle;
mod machine;
mod messages;
mod renderer;
mod ticker;

pub use chart::{Action, StateChart, StateChartBuilder, StateNode, Transition, INIT_EVENT};
pub use executor::ActorContext;
pub use frame::{FrameCallback, FrameClock, FrameQueue, FrameScheduler, ManualClock};
pub(crate) use frame::frame_time;
pub use handle::{ActorId, ActorRef, Upstream};
pub use machine::{boxed, Machine, MachineFactory};
pub use messages::{
    Event, MachineSnapshot, StateValue, APP_UPDATE_REQUESTED, FIRST_RENDER_REQUESTED, RENDER_REQUESTED,
    UI_UPDATE_REQUESTED,
};
pub use renderer::{CoalescePolicy, RenderFn, Renderer, IDLE_STATE, SETUP_STATE};
pub use ticker::{Tick, Ticker};
