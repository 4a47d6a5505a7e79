//! Todos Demo: A scripted todo list driven through the actor tree.
//!
//! `app` owns the todo list. `ui` owns a `create-todo` form child that asks
//! `app` for new todos through the upward routing protocol; `app` answers
//! by sending `TODO_ADDED` to `ui`. The renderer draws each snapshot to the
//! terminal at the configured frame rate.
//!
//! Set `RUST_LOG=triad=debug` to see the routing (logs go to stderr).

use serde::Serialize;
use serde_json::{json, Value};
use triad::actor::ActorContext;
use triad::routing::{send_app, send_ui, with_render_request};
use triad::terminal::Surface;
use triad::{
    Action, ActorName, Destination, Event, Renderer, StateChart, StateNode, System, SystemConfig, SystemSnapshot,
    Ticker, Transition,
};

/// Frames between two scripted user actions.
const STEP_FRAMES: u64 = 20;

#[derive(Debug, Clone, Serialize)]
struct Todo {
    id: u64,
    title: String,
}

#[derive(Default, Serialize)]
struct Todos {
    todos: Vec<Todo>,
    next_id: u64,
}

fn title_of(event: &Event) -> String {
    event
        .payload
        .as_ref()
        .and_then(|p| p["title"].as_str())
        .unwrap_or_default()
        .to_string()
}

fn id_of(event: &Event) -> Option<u64> {
    event.payload.as_ref().and_then(|p| p["id"].as_u64())
}

fn app() -> Result<StateChart<Todos>, triad::SystemError> {
    let add = Action::assign("addTodo", |ctx: &mut Todos, event| {
        ctx.todos.push(Todo {
            id: ctx.next_id,
            title: title_of(event),
        });
        ctx.next_id += 1;
    });
    let notify_added = send_ui(|ctx: &Todos, _| {
        let todo = ctx.todos.last().map(|t| json!(t)).unwrap_or(Value::Null);
        Event::with_payload("TODO_ADDED", json!({ "todo": todo }))
    });
    let delete = Action::assign("deleteTodo", |ctx: &mut Todos, event| {
        let id = id_of(event);
        ctx.todos.retain(|t| Some(t.id) != id);
    });
    let notify_deleted = send_ui(|_, event: &Event| Event {
        kind: "TODO_DELETED".to_string(),
        payload: event.payload.clone(),
    });

    StateChart::builder("app", Todos::default())
        .initial("idle")
        .state(
            "idle",
            StateNode::new()
                .on("TODO_ADDITION_REQUEST", Transition::new().action(add).action(notify_added))
                .on("TODO_DELETION_REQUEST", Transition::new().action(delete).action(notify_deleted)),
        )
        .build()
}

#[derive(Default, Serialize)]
struct Form {
    title: String,
}

fn create_todo() -> Result<StateChart<Form>, triad::SystemError> {
    let update = Action::assign("updateTodoTitle", |ctx: &mut Form, event| ctx.title = title_of(event));
    let clear = Action::assign("clearInput", |ctx: &mut Form, _| ctx.title.clear());
    let request = send_app(|ctx: &Form, _| {
        Event::with_payload("TODO_ADDITION_REQUEST", json!({ "title": ctx.title }))
    });

    StateChart::builder("create-todo", Form::default())
        .initial("idle")
        .state(
            "idle",
            StateNode::new()
                .on("TITLE_UPDATED", Transition::new().actions(with_render_request(vec![update])))
                .on(
                    "SUBMIT",
                    Transition::to("waitingForAddition").actions(with_render_request(vec![request])),
                ),
        )
        .state(
            "waitingForAddition",
            StateNode::new().on("TODO_ADDED", Transition::to("idle").actions(with_render_request(vec![clear]))),
        )
        .build()
}

#[derive(Default, Serialize)]
struct Screen {
    items: Vec<u64>,
}

fn forward_to(child: &'static str) -> Action<Screen> {
    Action::new("forward", move |_, event: &Event, cx: &mut ActorContext| {
        if let Some(child) = cx.child(child) {
            child.send(event.clone());
        }
        Ok(())
    })
}

fn ui() -> Result<StateChart<Screen>, triad::SystemError> {
    let spawn_form = Action::new("registerCreateTodoRef", |_, _, cx: &mut ActorContext| {
        let form = create_todo()?;
        cx.spawn("create-todo", move || form)?;
        Ok(())
    });
    let track = Action::assign("registerTodosListItem", |ctx: &mut Screen, event| {
        if let Some(id) = event.payload.as_ref().and_then(|p| p["todo"]["id"].as_u64()) {
            ctx.items.push(id);
        }
    });
    let untrack = Action::assign("destroyTodosListItem", |ctx: &mut Screen, event| {
        let id = id_of(event);
        ctx.items.retain(|item| Some(*item) != id);
    });

    StateChart::builder("ui", Screen::default())
        .initial("idle")
        .state(
            "idle",
            StateNode::new()
                .entry(spawn_form)
                .on("TITLE_UPDATED", Transition::new().action(forward_to("create-todo")))
                .on("SUBMIT", Transition::new().action(forward_to("create-todo")))
                .on(
                    "TODO_ADDED",
                    Transition::new().actions(with_render_request(vec![track, forward_to("create-todo")])),
                )
                .on("TODO_DELETED", Transition::new().actions(with_render_request(vec![untrack]))),
        )
        .relay(Destination::App)
        .relay(Destination::Render)
        .build()
}

fn view(snapshot: &SystemSnapshot) -> Vec<String> {
    let mut lines = vec![
        "Triad Todos Demo".to_string(),
        format!("app: {}   ui: {}", snapshot.app.state, snapshot.ui.state),
        String::new(),
    ];
    let todos = snapshot.app.context["todos"].as_array().cloned().unwrap_or_default();
    if todos.is_empty() {
        lines.push("  (no todos yet)".to_string());
    }
    for todo in todos {
        lines.push(format!("  [{}] {}", todo["id"], todo["title"].as_str().unwrap_or_default()));
    }
    lines
}

fn ui_request(kind: &str, payload: Value) -> Event {
    Destination::Ui.event(Some(json!({ "type": kind, "payload": payload })))
}

fn main() -> Result<(), triad::BoxError> {
    triad::logging::init("warn")?;

    let config = SystemConfig::default().with_target_fps(30);
    let interval = config.frame_interval();
    let mut system = System::with_config(config);

    let mut surface = Surface::stdout()?;
    let (app, ui) = (app()?, ui()?);
    system.register(ActorName::App, move || app)?;
    system.register(ActorName::Ui, move || ui)?;
    system.register(
        ActorName::Renderer,
        Renderer::factory(move |snapshot| {
            surface.draw(&view(snapshot))?;
            Ok(())
        }),
    )?;
    system.start()?;

    let mut script = vec![
        ui_request("TITLE_UPDATED", json!({ "title": "buy milk" })),
        ui_request("SUBMIT", Value::Null),
        ui_request("TITLE_UPDATED", json!({ "title": "write docs" })),
        ui_request("SUBMIT", Value::Null),
        Destination::App.event(Some(json!({ "type": "TODO_DELETION_REQUEST", "payload": { "id": 0 } }))),
    ]
    .into_iter();

    let ticker = Ticker::spawn(interval)?;
    let mut frames = 0u64;
    while ticker.receiver().recv().is_ok() {
        if frames % STEP_FRAMES == 0 {
            let Some(event) = script.next() else { break };
            system.send(event)?;
        }
        system.tick()?;
        frames += 1;
    }

    // Hold the final frame for a moment
    let mut ticker = ticker.take(STEP_FRAMES * 2);
    system.run(&mut ticker)?;
    ticker.join();
    Ok(())
}
