//! The one-slot mailbox between the dispatcher and a session's worker.
//!
//! A single `Mutex`-guarded three-state cell stands in for the original
//! server's pair of `reading`/`writing` booleans: `AwaitingRequest` is
//! when the dispatcher may deposit, `Ready` is when the worker may take,
//! and `Processing` covers the time the worker spends acting on the
//! request, during which neither side may touch the mailbox. This keeps
//! the two invariants ("never both waiting to act at once") enforced by
//! construction rather than by two separately-checked flags.

use std::sync::{Condvar, Mutex};

use tfs_proto::Request;

enum State {
    AwaitingRequest,
    Ready(Request),
    Processing,
}

pub struct Mailbox {
    state: Mutex<State>,
    producer_may_write: Condvar,
    consumer_may_read: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::AwaitingRequest),
            producer_may_write: Condvar::new(),
            consumer_may_read: Condvar::new(),
        }
    }

    /// Dispatcher side. Blocks until the mailbox is empty, then deposits
    /// `request`. Returns `false` if `running` went false first.
    pub fn deposit(&self, request: Request, running: impl Fn() -> bool) -> bool {
        let mut guard = self.state.lock().unwrap();
        while !matches!(*guard, State::AwaitingRequest) && running() {
            guard = self.producer_may_write.wait(guard).unwrap();
        }
        if !matches!(*guard, State::AwaitingRequest) {
            return false;
        }
        *guard = State::Ready(request);
        self.consumer_may_read.notify_one();
        true
    }

    /// Worker side. Blocks until a request is ready, then takes it and
    /// marks the mailbox `Processing`. Returns `None` if `running` went
    /// false before anything was deposited.
    pub fn take(&self, running: impl Fn() -> bool) -> Option<Request> {
        let mut guard = self.state.lock().unwrap();
        while matches!(*guard, State::AwaitingRequest) && running() {
            guard = self.consumer_may_read.wait(guard).unwrap();
        }
        match std::mem::replace(&mut *guard, State::Processing) {
            State::Ready(request) => Some(request),
            other => {
                *guard = other;
                None
            }
        }
    }

    /// Worker side: the request has been fully answered. Clears the
    /// mailbox and wakes the dispatcher if it's waiting to deposit.
    pub fn finish(&self) {
        let mut guard = self.state.lock().unwrap();
        *guard = State::AwaitingRequest;
        self.producer_may_write.notify_one();
    }

    /// Wakes both sides so they observe a server-wide shutdown. The
    /// shared `running` flag checked inside each wait loop is what
    /// actually tells them to stop.
    pub fn notify_shutdown(&self) {
        self.producer_may_write.notify_all();
        self.consumer_may_read.notify_all();
    }
}
