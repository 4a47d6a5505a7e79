//! System: the root orchestrator.
//!
//! The system owns the three top-level actors (`app`, `ui`, `renderer`),
//! receives every request that bubbles up from them and forwards it to the
//! actor it names. It also drives the executor and the frame queue, so
//! every public call returns only once no actor has pending work.
//!
//! ```text
//!                      ┌──────────────┐
//!      send(event) ──▶ │    System    │ ◀── APP/UI_UPDATE_REQUESTED,
//!                      │ idle/running │     RENDER_REQUESTED (bubbled)
//!                      └──────────────┘
//!                 ┌───────────┼────────────┐
//!                 ▼           ▼            ▼
//!              ┌─────┐    ┌──────┐    ┌──────────┐
//!              │ app │    │  ui  │    │ renderer │ ──▶ frame queue
//!              └─────┘    └──────┘    └──────────┘
//!                            │
//!                        children ...
//! ```

mod registry;
pub mod snapshot;

pub use registry::{ActorName, Registry};
pub use snapshot::SystemSnapshot;

use crate::actor::executor::{Executor, Ready};
use crate::actor::{boxed, frame_time, ActorRef, Event, FrameClock, FrameQueue, Machine, MachineFactory, Tick};
use crate::config::SystemConfig;
use crate::error::{Result, SystemError};
use crate::routing::Destination;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Lifecycle state of the orchestrator. Once started there is no way back
/// to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Accepting registrations.
    Idle,
    /// Started; forwarding requests.
    Running,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
        })
    }
}

/// The root orchestrator.
pub struct System {
    /// Configuration.
    config: SystemConfig,
    /// Lifecycle state.
    state: SystemState,
    /// The three top-level actors.
    registry: Registry,
    /// Run queue and root mailbox.
    executor: Executor,
    /// Scheduler handed to actors for frame-aligned work.
    frames: Rc<FrameQueue>,
}

impl System {
    /// Create a system with default configuration.
    pub fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    /// Create a system with custom configuration.
    pub fn with_config(config: SystemConfig) -> Self {
        let frames = Rc::new(FrameQueue::new());
        let executor = Executor::new(frames.clone(), config.inspect);
        Self {
            config,
            state: SystemState::Idle,
            registry: Registry::new(),
            executor,
            frames,
        }
    }

    /// Spawn the machine built by `factory` and store it under `name`.
    ///
    /// The machine's start hook runs immediately, with the system as its
    /// parent. Registering a name twice replaces the first actor. Once the
    /// system is running, registrations are dropped.
    ///
    /// # Errors
    ///
    /// Fails if the start hook fails or if processing the events it sent
    /// fails.
    pub fn register<M, F>(&mut self, name: ActorName, factory: F) -> Result<()>
    where
        M: Machine + 'static,
        F: FnOnce() -> M + 'static,
    {
        self.register_boxed(name, boxed(factory))
    }

    /// [`System::register`] for an already type-erased factory.
    ///
    /// # Errors
    ///
    /// See [`System::register`].
    pub fn register_boxed(&mut self, name: ActorName, factory: MachineFactory) -> Result<()> {
        if self.state == SystemState::Running {
            warn!(actor = %name, "system is running, dropping registration");
            return Ok(());
        }

        let actor = self
            .executor
            .runtime()
            .spawn(name.as_str(), factory(), self.executor.root_upstream())?;
        debug!(actor = %name, id = %actor.id(), "registered");

        if let Some(previous) = self.registry.set(name, actor) {
            // The old actor keeps running until its last handle goes away
            warn!(actor = %name, replaced = %previous.id(), "actor registered twice, replacing");
        }

        self.run_until_idle()
    }

    /// Move to `running` and render the initial snapshot synchronously.
    ///
    /// Calling it again while running does nothing.
    ///
    /// # Errors
    ///
    /// [`SystemError::ActorNotRegistered`] if a slot is unset, or any error
    /// from composing or drawing the first render. The system stays idle in
    /// every failure case, so `start` can be called again.
    pub fn start(&mut self) -> Result<()> {
        if self.state == SystemState::Running {
            debug!("already running, ignoring start");
            return Ok(());
        }
        if let Some(missing) = self.registry.missing() {
            return Err(SystemError::ActorNotRegistered(missing));
        }

        let request = snapshot::render_request(&self.registry, true)?;
        let renderer = self.registry.require(ActorName::Renderer)?.clone();

        self.state = SystemState::Running;
        info!("system running");

        renderer.send(request);
        if let Err(e) = self.run_until_idle() {
            warn!(error = %e, "first render failed, back to idle");
            self.state = SystemState::Idle;
            return Err(e);
        }
        Ok(())
    }

    /// Inject an event at the root as if a top-level actor had bubbled it.
    ///
    /// # Errors
    ///
    /// Any error raised while processing the event and everything it
    /// triggers.
    pub fn send(&mut self, event: Event) -> Result<()> {
        self.executor.runtime().send_root(event);
        self.run_until_idle()
    }

    /// Fire one frame: run the scheduled callbacks, then process whatever
    /// they sent. Returns the number of callbacks run.
    ///
    /// # Errors
    ///
    /// The first failing frame callback, usually a render callback error.
    pub fn tick(&mut self) -> Result<usize> {
        let frame = self.frames.frames();
        let elapsed = frame_time(self.config.frame_interval(), frame);
        self.fire(Tick { frame, elapsed })
    }

    /// Fire a frame on every tick of `clock` until it is exhausted.
    ///
    /// Actors are left alive when this returns.
    ///
    /// # Errors
    ///
    /// The first error raised by a frame or by event processing.
    pub fn run(&mut self, clock: &mut impl FrameClock) -> Result<()> {
        self.run_until_idle()?;
        while let Some(tick) = clock.next_tick() {
            self.fire(tick)?;
        }
        debug!(frames = self.frames.frames(), "clock exhausted");
        Ok(())
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SystemState {
        self.state
    }

    /// Handle of a registered actor, for inspection.
    pub fn handle(&self, name: ActorName) -> Option<ActorRef> {
        self.registry.get(name).cloned()
    }

    /// The registry.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Configuration in use.
    pub const fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Callbacks waiting for the next frame.
    pub fn pending_frames(&self) -> usize {
        self.frames.pending()
    }

    fn fire(&mut self, tick: Tick) -> Result<usize> {
        let ran = self.frames.flush(tick)?;
        self.run_until_idle()?;
        Ok(ran)
    }

    /// Process queued events until no actor has pending work.
    fn run_until_idle(&mut self) -> Result<()> {
        while let Some(ready) = self.executor.next() {
            match ready {
                Ready::Root => {
                    if let Some(event) = self.executor.root_event() {
                        self.handle_request(event)?;
                    }
                }
                Ready::Actor(cell) => self.executor.deliver(&cell)?,
            }
        }
        Ok(())
    }

    fn handle_request(&mut self, event: Event) -> Result<()> {
        if self.state == SystemState::Idle {
            debug!(event = %event, "not running, dropping request");
            return Ok(());
        }

        match Destination::from_event_type(&event.kind) {
            Some(Destination::App) => self.forward(ActorName::App, event),
            Some(Destination::Ui) => self.forward(ActorName::Ui, event),
            Some(Destination::Render) => {
                let request = snapshot::render_request(&self.registry, false)?;
                self.registry.require(ActorName::Renderer)?.send(request);
                Ok(())
            }
            None => Err(SystemError::UnknownTargetEvent(event.kind)),
        }
    }

    /// Deliver the event carried in a request's payload to `name`.
    fn forward(&self, name: ActorName, request: Event) -> Result<()> {
        let target = self.registry.require(name)?;
        let payload = request
            .payload
            .ok_or_else(|| SystemError::malformed(&request.kind, None))?;
        let event: Event = serde_json::from_value(payload)
            .map_err(|e| SystemError::malformed(&request.kind, Some(e)))?;
        debug!(to = %name, event = %event, "forwarding");
        target.send(event);
        Ok(())
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("state", &self.state)
            .field("registry", &self.registry)
            .field("queued", &self.executor.queued())
            .field("pending_frames", &self.frames.pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{
        Action, ActorContext, CoalescePolicy, ManualClock, Renderer, StateChart, StateNode, StateValue,
        Transition, APP_UPDATE_REQUESTED, RENDER_REQUESTED, UI_UPDATE_REQUESTED,
    };
    use crate::routing::{bubble_with, send_app, send_ui, with_render_request, with_ui_update_request};
    use proptest::prelude::*;
    use serde::Serialize;
    use serde_json::{json, Value};
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    #[derive(Serialize)]
    struct Counter {
        count: u64,
    }

    #[derive(Serialize)]
    struct Title {
        title: String,
    }

    fn app() -> StateChart<Counter> {
        StateChart::builder("app", Counter { count: 0 })
            .on(
                "INC",
                Transition::new().action(Action::assign("increment", |ctx: &mut Counter, _| {
                    ctx.count += 1;
                })),
            )
            .build()
            .unwrap()
    }

    fn ui() -> StateChart<Title> {
        StateChart::builder("ui", Title { title: String::new() })
            .build()
            .unwrap()
    }

    /// Records every event it receives.
    struct Recorder {
        seen: Rc<RefCell<Vec<Event>>>,
    }

    impl Machine for Recorder {
        fn state(&self) -> StateValue {
            StateValue::new("recording")
        }

        fn context(&self) -> Result<Value> {
            Ok(json!({ "seen": self.seen.borrow().len() }))
        }

        fn handle(&mut self, event: Event, _: &mut ActorContext) -> Result<()> {
            self.seen.borrow_mut().push(event);
            Ok(())
        }
    }

    fn recorder() -> (Rc<RefCell<Vec<Event>>>, impl FnOnce() -> Recorder) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let inner = seen.clone();
        (seen, move || Recorder { seen: inner })
    }

    type Renders = Rc<RefCell<Vec<SystemSnapshot>>>;

    fn renderer(policy: CoalescePolicy) -> (Renders, impl FnOnce() -> Renderer) {
        let renders: Renders = Rc::new(RefCell::new(Vec::new()));
        let log = renders.clone();
        let factory = move || {
            Renderer::new(move |snapshot| {
                log.borrow_mut().push(snapshot.clone());
                Ok(())
            })
            .with_policy(policy)
        };
        (renders, factory)
    }

    fn started(policy: CoalescePolicy) -> (System, Renders) {
        let mut system = System::new();
        let (renders, factory) = renderer(policy);
        system.register(ActorName::App, app).unwrap();
        system.register(ActorName::Ui, ui).unwrap();
        system.register(ActorName::Renderer, factory).unwrap();
        system.start().unwrap();
        (system, renders)
    }

    fn app_request(event: &Event) -> Event {
        Event::with_payload(APP_UPDATE_REQUESTED, serde_json::to_value(event).unwrap())
    }

    #[test]
    fn test_start_renders_initial_snapshot_once() {
        let mut system = System::new();
        let (renders, factory) = renderer(CoalescePolicy::default());
        // Registration order is free
        system.register(ActorName::Renderer, factory).unwrap();
        system.register(ActorName::Ui, ui).unwrap();
        system.register(ActorName::App, app).unwrap();
        assert_eq!(system.state(), SystemState::Idle);

        system.start().unwrap();

        assert_eq!(system.state(), SystemState::Running);
        let renders = renders.borrow();
        assert_eq!(renders.len(), 1);
        assert_eq!(renders[0].app.context["count"], 0);
        assert_eq!(renders[0].ui.context["title"], "");
        assert_eq!(system.pending_frames(), 0);

        let renderer = system.handle(ActorName::Renderer).unwrap();
        assert!(renderer.snapshot().unwrap().state.matches("idle"));
    }

    #[test]
    fn test_second_start_is_ignored() {
        let (mut system, renders) = started(CoalescePolicy::default());
        system.start().unwrap();
        assert_eq!(renders.borrow().len(), 1);
    }

    #[test]
    fn test_start_with_missing_slot_fails() {
        let mut system = System::new();
        let (renders, factory) = renderer(CoalescePolicy::default());
        system.register(ActorName::App, app).unwrap();
        system.register(ActorName::Renderer, factory).unwrap();

        assert!(matches!(
            system.start(),
            Err(SystemError::ActorNotRegistered(ActorName::Ui))
        ));
        assert_eq!(system.state(), SystemState::Idle);
        assert!(renders.borrow().is_empty());
    }

    #[test]
    fn test_app_request_forwarded_verbatim() {
        let mut system = System::new();
        let (seen, factory) = recorder();
        let (_, render) = renderer(CoalescePolicy::default());
        system.register(ActorName::App, factory).unwrap();
        system.register(ActorName::Ui, ui).unwrap();
        system.register(ActorName::Renderer, render).unwrap();
        system.start().unwrap();

        let event = Event::with_payload("ADD_TODO", json!({ "title": "milk", "tags": [1, 2] }));
        system.send(app_request(&event)).unwrap();
        assert_eq!(*seen.borrow(), vec![event]);
    }

    #[test]
    fn test_ui_request_forwarded_verbatim() {
        let mut system = System::new();
        let (seen, factory) = recorder();
        let (_, render) = renderer(CoalescePolicy::default());
        system.register(ActorName::App, app).unwrap();
        system.register(ActorName::Ui, factory).unwrap();
        system.register(ActorName::Renderer, render).unwrap();
        system.start().unwrap();

        let event = Event::new("TOGGLE_SIDEBAR");
        system
            .send(Event::with_payload(UI_UPDATE_REQUESTED, serde_json::to_value(&event).unwrap()))
            .unwrap();
        assert_eq!(*seen.borrow(), vec![event]);
    }

    #[test]
    fn test_requests_dropped_while_idle() {
        let mut system = System::new();
        let (seen, factory) = recorder();
        system.register(ActorName::App, factory).unwrap();

        system.send(app_request(&Event::new("EARLY"))).unwrap();
        system.send(Event::new("NOT_A_REQUEST")).unwrap();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_snapshots_taken_at_processing_time() {
        let (mut system, renders) = started(CoalescePolicy::EveryRequest);

        system.send(app_request(&Event::new("INC"))).unwrap();
        system.send(Event::new(RENDER_REQUESTED)).unwrap();
        system.send(app_request(&Event::new("INC"))).unwrap();
        system.send(Event::new(RENDER_REQUESTED)).unwrap();

        assert_eq!(system.tick().unwrap(), 2);
        let renders = renders.borrow();
        assert_eq!(renders.len(), 3);
        assert_eq!(renders[1].app.context, json!({ "count": 1 }));
        assert_eq!(renders[2].app.context, json!({ "count": 2 }));
    }

    #[test]
    fn test_latest_per_frame_renders_once_with_later_snapshot() {
        let (mut system, renders) = started(CoalescePolicy::LatestPerFrame);

        system.send(Event::new(RENDER_REQUESTED)).unwrap();
        system.send(app_request(&Event::new("INC"))).unwrap();
        system.send(Event::new(RENDER_REQUESTED)).unwrap();
        // Scheduled, not drawn inline
        assert_eq!(renders.borrow().len(), 1);

        system.tick().unwrap();
        let renders = renders.borrow();
        assert_eq!(renders.len(), 2);
        assert_eq!(renders[1].app.context, json!({ "count": 1 }));
    }

    #[test]
    fn test_every_request_renders_twice_in_order() {
        let (mut system, renders) = started(CoalescePolicy::EveryRequest);

        system.send(Event::new(RENDER_REQUESTED)).unwrap();
        system.send(app_request(&Event::new("INC"))).unwrap();
        system.send(Event::new(RENDER_REQUESTED)).unwrap();
        system.tick().unwrap();

        let counts: Vec<_> = renders.borrow().iter().map(|s| s.app.context["count"].clone()).collect();
        assert_eq!(counts, vec![json!(0), json!(0), json!(1)]);
    }

    #[test]
    fn test_reregistration_replaces_first_actor() {
        let mut system = System::new();
        let (first, first_factory) = recorder();
        let (second, second_factory) = recorder();
        let (_, render) = renderer(CoalescePolicy::default());
        system.register(ActorName::App, first_factory).unwrap();
        system.register(ActorName::App, second_factory).unwrap();
        system.register(ActorName::Ui, ui).unwrap();
        system.register(ActorName::Renderer, render).unwrap();
        system.start().unwrap();

        system.send(app_request(&Event::new("PING"))).unwrap();
        system.send(app_request(&Event::new("PING"))).unwrap();
        assert!(first.borrow().is_empty());
        assert_eq!(second.borrow().len(), 2);
    }

    #[test]
    fn test_register_after_start_is_dropped() {
        let (mut system, _) = started(CoalescePolicy::default());
        let before = system.handle(ActorName::App).unwrap();
        let (seen, factory) = recorder();

        system.register(ActorName::App, factory).unwrap();
        system.send(app_request(&Event::new("INC"))).unwrap();

        assert_eq!(system.handle(ActorName::App).unwrap(), before);
        assert!(seen.borrow().is_empty());
        assert_eq!(before.snapshot().unwrap().context, json!({ "count": 1 }));
    }

    #[test]
    fn test_unknown_event_fails_fast() {
        let (mut system, _) = started(CoalescePolicy::default());
        assert!(matches!(
            system.send(Event::new("SAVE_REQUESTED")),
            Err(SystemError::UnknownTargetEvent(kind)) if kind == "SAVE_REQUESTED"
        ));
    }

    #[test]
    fn test_missing_payload_is_malformed() {
        let (mut system, _) = started(CoalescePolicy::default());
        assert!(matches!(
            system.send(Event::new(APP_UPDATE_REQUESTED)),
            Err(SystemError::MalformedPayload { source: None, .. })
        ));
        assert!(matches!(
            system.send(Event::with_payload(UI_UPDATE_REQUESTED, json!(42))),
            Err(SystemError::MalformedPayload { source: Some(_), .. })
        ));
    }

    #[test]
    fn test_null_payload_forwarded_as_null() {
        let mut system = System::new();
        let (seen, factory) = recorder();
        let (_, render) = renderer(CoalescePolicy::default());
        system.register(ActorName::App, factory).unwrap();
        system.register(ActorName::Ui, ui).unwrap();
        system.register(ActorName::Renderer, render).unwrap();
        system.start().unwrap();

        let clear = Event::with_payload("CLEAR", Value::Null);
        system.send(app_request(&clear)).unwrap();
        system.send(app_request(&Event::new("RESET"))).unwrap();
        assert_eq!(*seen.borrow(), vec![clear, Event::new("RESET")]);
    }

    #[test]
    fn test_extra_payload_keys_are_malformed() {
        let (mut system, _) = started(CoalescePolicy::default());
        assert!(matches!(
            system.send(Event::with_payload(
                APP_UPDATE_REQUESTED,
                json!({ "type": "ADD", "title": "milk" })
            )),
            Err(SystemError::MalformedPayload { source: Some(_), .. })
        ));
    }

    /// An `app` whose context cannot be read while `broken` is set.
    struct Fragile {
        broken: Rc<Cell<bool>>,
    }

    impl Machine for Fragile {
        fn state(&self) -> StateValue {
            StateValue::new("ready")
        }

        fn context(&self) -> Result<Value> {
            if self.broken.get() {
                return Err(SystemError::InvalidMachine("context unavailable".to_string()));
            }
            Ok(json!({}))
        }

        fn handle(&mut self, _: Event, _: &mut ActorContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_composition_keeps_system_idle() {
        let mut system = System::new();
        let broken = Rc::new(Cell::new(true));
        let flag = broken.clone();
        let (renders, render) = renderer(CoalescePolicy::default());
        system.register(ActorName::App, move || Fragile { broken: flag }).unwrap();
        system.register(ActorName::Ui, ui).unwrap();
        system.register(ActorName::Renderer, render).unwrap();

        assert!(matches!(system.start(), Err(SystemError::InvalidMachine(_))));
        assert_eq!(system.state(), SystemState::Idle);
        assert!(renders.borrow().is_empty());

        broken.set(false);
        system.start().unwrap();
        assert_eq!(system.state(), SystemState::Running);
        assert_eq!(renders.borrow().len(), 1);

        system.send(Event::new(RENDER_REQUESTED)).unwrap();
        system.tick().unwrap();
        assert_eq!(renders.borrow().len(), 2);
    }

    fn forward<C: 'static>(child: &'static str) -> Action<C> {
        Action::new("forward", move |_, event: &Event, cx: &mut ActorContext| {
            if let Some(child) = cx.child(child) {
                child.send(event.clone());
            }
            Ok(())
        })
    }

    fn item() -> StateChart<()> {
        let add = send_app(|_, event: &Event| Event {
            kind: "ADD".to_string(),
            payload: event.payload.clone(),
        });
        StateChart::builder("item", ())
            .on("ADD_TODO", Transition::new().actions(with_render_request(vec![add])))
            .build()
            .unwrap()
    }

    fn list() -> StateChart<()> {
        StateChart::builder("list", ())
            .initial("ready")
            .state(
                "ready",
                StateNode::new().entry(Action::new("spawnItem", |_, _, cx| {
                    cx.spawn("item", item)?;
                    Ok(())
                })),
            )
            .on("ADD_TODO", Transition::new().action(forward("item")))
            .relay(Destination::App)
            .relay(Destination::Render)
            .build()
            .unwrap()
    }

    /// `ui` -> `list` -> `item`. Only `item` knows what to ask for; the two
    /// levels above it relay.
    fn nested_ui() -> StateChart<Title> {
        StateChart::builder("ui", Title { title: String::new() })
            .initial("ready")
            .state(
                "ready",
                StateNode::new().entry(Action::new("spawnList", |_, _, cx| {
                    cx.spawn("list", list)?;
                    Ok(())
                })),
            )
            .on("ADD_TODO", Transition::new().action(forward("list")))
            .relay(Destination::App)
            .relay(Destination::Render)
            .build()
            .unwrap()
    }

    #[test]
    fn test_request_bubbles_through_intermediate_levels() {
        let mut system = System::new();
        let (seen, factory) = recorder();
        let (renders, render) = renderer(CoalescePolicy::default());
        system.register(ActorName::App, factory).unwrap();
        system.register(ActorName::Ui, nested_ui).unwrap();
        system.register(ActorName::Renderer, render).unwrap();
        system.start().unwrap();

        let todo = json!({ "title": "milk" });
        let add = Event::with_payload("ADD_TODO", todo.clone());
        system
            .send(Event::with_payload(UI_UPDATE_REQUESTED, serde_json::to_value(&add).unwrap()))
            .unwrap();

        assert_eq!(*seen.borrow(), vec![Event::with_payload("ADD", todo)]);
        assert_eq!(system.pending_frames(), 1);
        system.tick().unwrap();
        assert_eq!(renders.borrow().len(), 2);
    }

    #[derive(Serialize)]
    struct Label {
        source: String,
    }

    /// Leaf under `app`: tells its parent with a custom event and asks for
    /// `ui` updates directly.
    fn field() -> StateChart<()> {
        let changed = Action::send_upstream("notifyPanel", |_, event: &Event| {
            Some(Event {
                kind: "FIELD_CHANGED".to_string(),
                payload: event.payload.clone(),
            })
        });
        let renamed = send_ui(|_, event: &Event| Event {
            kind: "FIELD_RENAMED".to_string(),
            payload: event.payload.clone(),
        });
        StateChart::builder("field", ())
            .on("RENAME", Transition::new().action(changed).action(renamed))
            .on("NOTIFY", Transition::new().actions(with_ui_update_request(Vec::new())))
            .build()
            .unwrap()
    }

    /// Turns the leaf's custom event into a `ui` request built from its own
    /// context.
    fn panel() -> StateChart<Label> {
        let title_changed = bubble_with(Destination::Ui, |ctx: &Label, event: &Event| {
            let title = event.payload.as_ref().map_or(Value::Null, |p| p["title"].clone());
            Some(json!({ "type": "TITLE_CHANGED", "payload": { "source": ctx.source, "title": title } }))
        });
        StateChart::builder("panel", Label { source: "panel".to_string() })
            .initial("ready")
            .state(
                "ready",
                StateNode::new().entry(Action::new("spawnField", |_, _, cx| {
                    cx.spawn("field", field)?;
                    Ok(())
                })),
            )
            .on("RENAME", Transition::new().action(forward("field")))
            .on("NOTIFY", Transition::new().action(forward("field")))
            .on("FIELD_CHANGED", Transition::new().action(title_changed))
            .relay(Destination::Ui)
            .build()
            .unwrap()
    }

    fn nested_app() -> StateChart<Counter> {
        StateChart::builder("app", Counter { count: 0 })
            .initial("ready")
            .state(
                "ready",
                StateNode::new().entry(Action::new("spawnPanel", |_, _, cx| {
                    cx.spawn("panel", panel)?;
                    Ok(())
                })),
            )
            .on("RENAME", Transition::new().action(forward("panel")))
            .on("NOTIFY", Transition::new().action(forward("panel")))
            .relay(Destination::Ui)
            .build()
            .unwrap()
    }

    #[test]
    fn test_ui_request_from_app_descendant() {
        let mut system = System::new();
        let (seen, factory) = recorder();
        let (_, render) = renderer(CoalescePolicy::default());
        system.register(ActorName::App, nested_app).unwrap();
        system.register(ActorName::Ui, factory).unwrap();
        system.register(ActorName::Renderer, render).unwrap();
        system.start().unwrap();

        let rename = Event::with_payload("RENAME", json!({ "title": "milk" }));
        system.send(app_request(&rename)).unwrap();
        let toast = Event::with_payload("TOAST", json!("saved"));
        let notify = Event::with_payload("NOTIFY", serde_json::to_value(&toast).unwrap());
        system.send(app_request(&notify)).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                Event::with_payload("TITLE_CHANGED", json!({ "source": "panel", "title": "milk" })),
                Event::with_payload("FIELD_RENAMED", json!({ "title": "milk" })),
                toast,
            ]
        );
    }

    #[test]
    fn test_render_failure_surfaces_from_start() {
        let mut system = System::new();
        system.register(ActorName::App, app).unwrap();
        system.register(ActorName::Ui, ui).unwrap();
        system
            .register(ActorName::Renderer, Renderer::factory(|_| Err("no display".into())))
            .unwrap();

        assert!(matches!(system.start(), Err(SystemError::RenderCallback(_))));
        assert_eq!(system.state(), SystemState::Idle);
    }

    #[test]
    fn test_start_retries_after_render_failure() {
        let mut system = System::new();
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        system.register(ActorName::App, app).unwrap();
        system.register(ActorName::Ui, ui).unwrap();
        system
            .register(
                ActorName::Renderer,
                Renderer::factory(move |_| {
                    counter.set(counter.get() + 1);
                    if counter.get() == 1 {
                        return Err("display not ready".into());
                    }
                    Ok(())
                }),
            )
            .unwrap();

        assert!(system.start().is_err());
        system.start().unwrap();
        assert_eq!(attempts.get(), 2);

        let renderer = system.handle(ActorName::Renderer).unwrap();
        assert!(renderer.snapshot().unwrap().state.matches("idle"));
    }

    #[test]
    fn test_render_failure_surfaces_from_tick() {
        let mut system = System::new();
        let mut calls = 0;
        system.register(ActorName::App, app).unwrap();
        system.register(ActorName::Ui, ui).unwrap();
        system
            .register(
                ActorName::Renderer,
                Renderer::factory(move |_| {
                    calls += 1;
                    if calls > 1 {
                        return Err("display lost".into());
                    }
                    Ok(())
                }),
            )
            .unwrap();
        system.start().unwrap();

        system.send(Event::new(RENDER_REQUESTED)).unwrap();
        assert!(matches!(system.tick(), Err(SystemError::RenderCallback(_))));
    }

    #[test]
    fn test_run_drives_frames_until_clock_exhausted() {
        let (mut system, renders) = started(CoalescePolicy::default());
        system.send(Event::new(RENDER_REQUESTED)).unwrap();

        let mut clock = ManualClock::new(3, Duration::from_millis(16));
        system.run(&mut clock).unwrap();

        assert_eq!(renders.borrow().len(), 2);
        assert_eq!(system.pending_frames(), 0);
        // Actors outlive the run loop
        system.send(app_request(&Event::new("INC"))).unwrap();
        let app = system.handle(ActorName::App).unwrap();
        assert_eq!(app.snapshot().unwrap().context, json!({ "count": 1 }));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z ]{0,12}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_payloads_reach_destination_unchanged(
            kind in "[A-Z_]{1,16}",
            payload in proptest::option::of(arb_json()),
            to_ui in any::<bool>(),
        ) {
            let mut system = System::new();
            let (seen, factory) = recorder();
            let (_, render) = renderer(CoalescePolicy::default());
            let (target, other) = if to_ui {
                (ActorName::Ui, ActorName::App)
            } else {
                (ActorName::App, ActorName::Ui)
            };
            system.register(target, factory).unwrap();
            system.register(other, ui).unwrap();
            system.register(ActorName::Renderer, render).unwrap();
            system.start().unwrap();

            let event = Event { kind, payload };
            let request = if to_ui { Destination::Ui } else { Destination::App };
            system.send(request.event(Some(serde_json::to_value(&event).unwrap()))).unwrap();

            prop_assert_eq!(seen.borrow().clone(), vec![event]);
        }
    }
}
