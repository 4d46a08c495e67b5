use crate::api::ClientError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;

/// A unit of work for the queue. The returned future completing is the completion signal,
/// so the operation must report its outcome (e.g. invoke its callback) before it resolves.
pub type Operation = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Nothing is running
    Idle,
    /// One operation has been dequeued and is executing
    Busy,
}

struct Inner {
    pending: VecDeque<Operation>,
    state: State,
}

/// A FIFO of operations with a single in-flight slot.
///
/// Enqueueing onto an idle queue moves it to `Busy` and spawns one drain task which runs the
/// operations strictly in order, awaiting each before dequeuing the next. The drain task flips
/// the queue back to `Idle` under the same lock it dequeues with, so an enqueue either sees a
/// running drain task or starts a new one.
#[derive(Clone)]
pub struct OperationQueue {
    inner: Arc<Mutex<Inner>>,
    runtime: Handle,
}

impl OperationQueue {
    /// Creates a queue bound to the current tokio runtime
    pub fn new() -> Result<OperationQueue, ClientError> {
        let runtime = Handle::try_current().map_err(|e| ClientError::Runtime(e.to_string()))?;
        Ok(OperationQueue::with_runtime(runtime))
    }

    pub fn with_runtime(runtime: Handle) -> OperationQueue {
        OperationQueue {
            inner: Arc::new(Mutex::new(Inner {
                pending: VecDeque::new(),
                state: State::Idle,
            })),
            runtime,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    /// Number of operations waiting, not counting the one in flight
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn enqueue(&self, op: Operation) {
        self.enqueue_all(vec![op]);
    }

    /// Appends `ops` as one contiguous run; nothing enqueued concurrently lands between them
    pub fn enqueue_all(&self, ops: Vec<Operation>) {
        let start = {
            let mut inner = self.lock();
            inner.pending.extend(ops);
            if inner.state == State::Idle && !inner.pending.is_empty() {
                inner.state = State::Busy;
                true
            } else {
                false
            }
        };

        if start {
            log::debug!("Operation queue busy");
            let queue = self.clone();
            self.runtime.spawn(queue.drain());
        }
    }

    fn next(&self) -> Option<Operation> {
        let mut inner = self.lock();
        let next = inner.pending.pop_front();
        if next.is_none() {
            inner.state = State::Idle;
            log::debug!("Operation queue idle");
        }
        next
    }

    async fn drain(self) {
        while let Some(op) = self.next() {
            let run = AssertUnwindSafe(async move { op().await }).catch_unwind();
            if run.await.is_err() {
                log::error!("Queued operation panicked; continuing with the next one");
            }
        }
    }
}
