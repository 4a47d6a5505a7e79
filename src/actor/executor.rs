//! Cooperative single-threaded executor.
//!
//! Every actor owns a FIFO mailbox. A global run queue holds one entry per
//! enqueued event, so events are processed one at a time, to completion, in
//! the order they were sent. Sending never runs the receiver inline.

use super::frame::{FrameQueue, FrameScheduler};
use super::handle::{ActorId, ActorRef, Upstream};
use super::machine::Machine;
use super::messages::Event;
use crate::error::{Result, SystemError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, info, trace};

/// State shared by every handle of one system.
pub(crate) struct Runtime {
    queue: RefCell<VecDeque<Ready>>,
    root_tx: Sender<Event>,
    next_id: Cell<u64>,
    frames: Rc<FrameQueue>,
    inspect: bool,
}

/// One unit of pending work.
pub(crate) enum Ready {
    /// An event waits in the orchestrator's mailbox.
    Root,
    /// An event waits in this actor's mailbox.
    Actor(Rc<ActorCell>),
}

/// A spawned actor: machine, mailbox and links.
pub(crate) struct ActorCell {
    pub(crate) id: ActorId,
    pub(crate) name: String,
    pub(crate) sender: Sender<Event>,
    pub(crate) mailbox: Receiver<Event>,
    pub(crate) machine: RefCell<Box<dyn Machine>>,
    pub(crate) upstream: Upstream,
    pub(crate) children: RefCell<Vec<ActorRef>>,
}

impl Runtime {
    pub(crate) fn enqueue(&self, ready: Ready) {
        self.queue.borrow_mut().push_back(ready);
    }

    pub(crate) fn send_root(&self, event: Event) {
        if self.root_tx.send(event).is_ok() {
            self.enqueue(Ready::Root);
        }
    }

    /// Create an actor and run its entry hook.
    pub(crate) fn spawn(
        self: &Rc<Self>,
        name: &str,
        machine: Box<dyn Machine>,
        upstream: Upstream,
    ) -> Result<ActorRef> {
        let id = ActorId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let (sender, mailbox) = unbounded();
        let actor = ActorRef {
            cell: Rc::new(ActorCell {
                id,
                name: name.to_string(),
                sender,
                mailbox,
                machine: RefCell::new(machine),
                upstream,
                children: RefCell::new(Vec::new()),
            }),
            runtime: self.clone(),
        };

        debug!(actor = name, %id, "spawning actor");
        let mut cx = ActorContext {
            this: actor.clone(),
        };
        actor
            .cell
            .machine
            .try_borrow_mut()
            .map_err(|_| SystemError::ActorBusy(name.to_string()))?
            .start(&mut cx)?;

        Ok(actor)
    }
}

/// Owner side of a runtime: drives the run queue.
pub(crate) struct Executor {
    runtime: Rc<Runtime>,
    root_rx: Receiver<Event>,
}

impl Executor {
    pub(crate) fn new(frames: Rc<FrameQueue>, inspect: bool) -> Self {
        let (root_tx, root_rx) = unbounded();
        Self {
            runtime: Rc::new(Runtime {
                queue: RefCell::new(VecDeque::new()),
                root_tx,
                next_id: Cell::new(0),
                frames,
                inspect,
            }),
            root_rx,
        }
    }

    pub(crate) const fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }

    pub(crate) fn root_upstream(&self) -> Upstream {
        Upstream::root(self.runtime.clone())
    }

    /// Pop the next unit of work.
    pub(crate) fn next(&self) -> Option<Ready> {
        self.runtime.queue.borrow_mut().pop_front()
    }

    /// Take the orchestrator's next event.
    pub(crate) fn root_event(&self) -> Option<Event> {
        self.root_rx.try_recv().ok()
    }

    /// Number of queued units of work.
    pub(crate) fn queued(&self) -> usize {
        self.runtime.queue.borrow().len()
    }

    /// Hand the next mailbox event of `cell` to its machine.
    pub(crate) fn deliver(&self, cell: &Rc<ActorCell>) -> Result<()> {
        let Ok(event) = cell.mailbox.try_recv() else {
            trace!(actor = %cell.name, "empty mailbox");
            return Ok(());
        };

        if self.runtime.inspect {
            info!(actor = %cell.name, id = %cell.id, event = %event, payload = ?event.payload, "event");
        } else {
            debug!(actor = %cell.name, id = %cell.id, event = %event, "processing event");
        }

        let mut machine = cell
            .machine
            .try_borrow_mut()
            .map_err(|_| SystemError::ActorBusy(cell.name.clone()))?;
        let mut cx = ActorContext {
            this: ActorRef {
                cell: cell.clone(),
                runtime: self.runtime.clone(),
            },
        };
        machine.handle(event, &mut cx)
    }
}

/// What a machine may do while processing an event.
pub struct ActorContext {
    this: ActorRef,
}

impl ActorContext {
    /// Handle of the actor being processed.
    pub const fn this(&self) -> &ActorRef {
        &self.this
    }

    /// Link to the immediate parent.
    pub fn upstream(&self) -> &Upstream {
        &self.this.cell.upstream
    }

    /// Spawn a child whose upstream is this actor.
    pub fn spawn<M, F>(&mut self, name: &str, factory: F) -> Result<ActorRef>
    where
        M: Machine + 'static,
        F: FnOnce() -> M,
    {
        let upstream = Upstream::actor(&self.this);
        let child = self
            .this
            .runtime
            .spawn(name, Box::new(factory()), upstream)?;
        self.this.cell.children.borrow_mut().push(child.clone());
        Ok(child)
    }

    /// Most recently spawned child with the given name.
    pub fn child(&self, name: &str) -> Option<ActorRef> {
        self.this
            .cell
            .children
            .borrow()
            .iter()
            .rev()
            .find(|child| child.name() == name)
            .cloned()
    }

    /// Send an event to any actor.
    pub fn send(&self, to: &ActorRef, event: Event) {
        to.send(event);
    }

    /// Send an event to this actor itself; it is processed after the
    /// current one.
    pub fn send_self(&self, event: Event) {
        self.this.send(event);
    }

    /// The frame scheduler for deferred work.
    pub fn frames(&self) -> Rc<dyn FrameScheduler> {
        self.this.runtime.frames.clone()
    }
}
