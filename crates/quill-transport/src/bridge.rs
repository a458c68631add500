//! Push-to-pull bridge shared by both adapters.
//!
//! Producers (SSE frame handlers, IPC listeners) push into an [`EventSink`];
//! the caller pulls from the [`EventStream`] half of a [`StreamHandle`]. The
//! queue is an unbounded channel because IPC listeners fire from synchronous
//! callbacks that cannot wait for capacity. The `ended` flag is a watch channel
//! so an idle consumer blocks on "new event or end" instead of polling.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};

use crate::stream::StreamEvent;

type Action = Box<dyn FnOnce() + Send + 'static>;

/// Actions that fire at most once. Registering after the slot fired runs the
/// action immediately.
#[derive(Default)]
struct OnceActions {
    fired: bool,
    pending: Vec<Action>,
}

struct ActionSlot(Mutex<OnceActions>);

impl ActionSlot {
    fn new() -> Self {
        Self(Mutex::new(OnceActions::default()))
    }

    fn lock(&self) -> MutexGuard<'_, OnceActions> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, action: Action) {
        let mut guard = self.lock();
        if guard.fired {
            drop(guard);
            action();
        } else {
            guard.pending.push(action);
        }
    }

    fn fire(&self) -> bool {
        let pending = {
            let mut guard = self.lock();
            if guard.fired {
                return false;
            }
            guard.fired = true;
            std::mem::take(&mut guard.pending)
        };
        for action in pending {
            action();
        }
        true
    }
}

struct Shared {
    ended: watch::Sender<bool>,
    teardown: ActionSlot,
    cleanup: ActionSlot,
}

impl Shared {
    fn is_ended(&self) -> bool {
        *self.ended.borrow()
    }

    /// Sets `ended`; returns whether it was already set.
    fn mark_ended(&self) -> bool {
        self.ended.send_replace(true)
    }

    fn cancel(&self) {
        if self.mark_ended() {
            return;
        }
        self.teardown.fire();
    }

    fn finalize(&self) {
        self.mark_ended();
        self.cleanup.fire();
    }
}

/// Creates a connected producer/consumer pair for one stream.
pub fn bridge() -> (EventSink, StreamHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (ended, ended_rx) = watch::channel(false);
    let shared = Arc::new(Shared {
        ended,
        teardown: ActionSlot::new(),
        cleanup: ActionSlot::new(),
    });
    let sink = EventSink {
        tx,
        shared: shared.clone(),
    };
    let handle = StreamHandle {
        events: EventStream {
            rx,
            ended_rx,
            shared: shared.clone(),
            done: false,
        },
        cancel: CancelHandle { shared },
    };
    (sink, handle)
}

/// Producer half of a bridge. Cheap to clone; every listener of a stream
/// holds one.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
    shared: Arc<Shared>,
}

impl EventSink {
    /// Enqueues an event. Returns false, dropping the event, once the stream
    /// has ended or been cancelled.
    pub fn push(&self, event: StreamEvent) -> bool {
        if self.shared.is_ended() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Marks natural completion. Events already queued are still delivered.
    pub fn end(&self) {
        self.shared.mark_ended();
    }

    pub fn is_ended(&self) -> bool {
        self.shared.is_ended()
    }

    /// Registers an action to run when the caller cancels (close the
    /// connection, notify the remote side).
    pub fn on_cancel(&self, action: impl FnOnce() + Send + 'static) {
        self.shared.teardown.register(Box::new(action));
    }

    /// Registers an action to run exactly once when the consumption loop
    /// exits (deregister listeners, release the connection).
    pub fn on_cleanup(&self, action: impl FnOnce() + Send + 'static) {
        self.shared.cleanup.register(Box::new(action));
    }
}

/// Cancels a stream. Clone it to cancel from another task.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Ends the stream and tears down its source.
    ///
    /// Idempotent, and a no-op after natural completion. Events queued before
    /// the call are still yielded.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    pub fn is_ended(&self) -> bool {
        self.shared.is_ended()
    }
}

/// Consumer half of a bridge: a finite, non-restartable event sequence.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    ended_rx: watch::Receiver<bool>,
    shared: Arc<Shared>,
    done: bool,
}

impl EventStream {
    /// Waits for the next event.
    ///
    /// Returns `None` once the stream has ended and its queue is drained;
    /// cleanup has run by then.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.done {
            return None;
        }
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
            if *self.ended_rx.borrow_and_update() {
                // A push that completed before `end` is visible once the flag
                // is; drain it before terminating.
                match self.rx.try_recv() {
                    Ok(event) => return Some(event),
                    Err(_) => break,
                }
            }
            tokio::select! {
                biased;
                item = self.rx.recv() => match item {
                    Some(event) => return Some(event),
                    None => break,
                },
                changed = self.ended_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.finish();
        None
    }

    /// Converts into a `futures::Stream`.
    pub fn into_stream(self) -> impl futures::Stream<Item = StreamEvent> + Send {
        futures::stream::unfold(self, |mut events| async move {
            events.next_event().await.map(|event| (event, events))
        })
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.shared.finalize();
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Returned by `Transport::stream`: the event sequence plus its cancel
/// capability.
pub struct StreamHandle {
    events: EventStream,
    cancel: CancelHandle,
}

impl StreamHandle {
    /// Waits for the next event; see [`EventStream::next_event`].
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.next_event().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Splits the handle so events and cancellation can live in different
    /// tasks.
    pub fn into_parts(self) -> (EventStream, CancelHandle) {
        (self.events, self.cancel)
    }

    pub fn into_stream(self) -> impl futures::Stream<Item = StreamEvent> + Send {
        self.events.into_stream()
    }

    /// Drains every remaining event.
    pub async fn collect(mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        while let Some(event) = self.next_event().await {
            out.push(event);
        }
        out
    }
}
