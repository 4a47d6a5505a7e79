//! # Triad
//!
//! A hierarchical actor runtime for applications split into three parts:
//! application state (`app`), UI state (`ui`) and a `renderer`.
//!
//! The root [`System`] owns the three actors. Actors deeper in the tree never
//! address them directly: they bubble standardized requests to their parent,
//! level by level, until the system forwards them.
//!
//! ## Core Concepts
//!
//! - **Machines**: every actor runs a [`Machine`], usually a declarative
//!   [`StateChart`]
//! - **Upward routing**: [`routing`] builds the actions that send
//!   `APP_UPDATE_REQUESTED`, `UI_UPDATE_REQUESTED` and `RENDER_REQUESTED` to
//!   the parent
//! - **Snapshots**: renders receive a [`SystemSnapshot`] of `app` and `ui`
//!   taken when the request is processed
//! - **Frame-aligned rendering**: the first render is synchronous, later
//!   ones wait for the next frame
//!
//! ## Example
//!
//! ```rust,ignore
//! use triad::{ActorName, Renderer, System};
//!
//! let mut system = System::new();
//! system.register(ActorName::App, app_chart)?;
//! system.register(ActorName::Ui, ui_chart)?;
//! system.register(ActorName::Renderer, Renderer::factory(|snapshot| {
//!     println!("{}", snapshot.app.context);
//!     Ok(())
//! }))?;
//! system.start()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod config;
pub mod error;
pub mod logging;
pub mod routing;
pub mod system;
pub mod terminal;

// Re-exports for convenience
pub use actor::{
    Action, ActorContext, ActorRef, CoalescePolicy, Event, FrameClock, Machine, MachineSnapshot, ManualClock,
    Renderer, StateChart, StateNode, StateValue, Tick, Ticker, Transition, Upstream,
};
pub use config::SystemConfig;
pub use error::{BoxError, Result, SystemError};
pub use routing::Destination;
pub use system::{ActorName, System, SystemSnapshot, SystemState};
