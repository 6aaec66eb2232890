// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Instant;

use flux::{Completion, Event, Id, Reply, ScheduleTimeout, Timeout, TimerHandle};
use tracing::trace;

use crate::Submission;

const ERR_POISONED_LOCK: &str = "timer state lock poisoned by a panicking thread";

/// Answers the routine-side timer protocol: registrations are kept in a
/// deadline-ordered heap served by one worker thread, which submits the
/// corresponding [`Timeout`] event into the host queue when a deadline
/// passes.
///
/// Releasing the [`TimerHandle`] returned from a registration deregisters
/// the timer before it fires, so cancelled sleeps do not leak timeouts
/// into the queue. The worker stops and is joined when the service drops.
#[derive(Debug)]
pub(crate) struct TimerService {
    shared: Arc<TimerShared>,
    worker: Option<thread::JoinHandle<()>>,
}

#[derive(Debug)]
struct TimerShared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

#[derive(Debug, Default)]
struct TimerState {
    pending: BinaryHeap<Entry>,
    /// Ids deregistered while still pending; skipped when they surface.
    cancelled: HashSet<Id>,
    stop: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    deadline: Instant,
    id: Id,
}

// `BinaryHeap` is a max-heap; order entries so the earliest deadline
// surfaces first.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TimerService {
    pub fn new(tx: mpsc::Sender<Submission>) -> Self {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState::default()),
            wakeup: Condvar::new(),
        });

        let worker = thread::Builder::new()
            .name("flux-timer".to_owned())
            .spawn({
                let shared = Arc::clone(&shared);
                move || worker_loop(&shared, &tx)
            })
            .expect("failed to spawn the timer worker thread");

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Registers a timer and builds the reply carrying its release handle.
    pub fn register(&self, schedule: ScheduleTimeout) -> Reply {
        match Instant::now().checked_add(schedule.duration) {
            Some(deadline) => {
                let mut state = self.shared.state.lock().expect(ERR_POISONED_LOCK);
                state.pending.push(Entry {
                    deadline,
                    id: schedule.id,
                });
                drop(state);
                self.shared.wakeup.notify_one();
                trace!(id = %schedule.id, "timer registered");
            }
            None => {
                // The deadline would be so far in the future that the timer
                // can be treated as never firing; there is nothing to keep.
                trace!(id = %schedule.id, "timer deadline out of range, never fires");
            }
        }

        let shared = Arc::clone(&self.shared);
        let id = schedule.id;
        let handle = TimerHandle::new(move || {
            let mut state = shared.state.lock().expect(ERR_POISONED_LOCK);
            if state.pending.iter().any(|entry| entry.id == id) {
                state.cancelled.insert(id);
                drop(state);
                shared.wakeup.notify_one();
                trace!(id = %id, "timer deregistered");
            }
        });

        Completion::Value(Box::new(handle))
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().expect(ERR_POISONED_LOCK);
            state.stop = true;
        }
        self.shared.wakeup.notify_one();

        if let Some(worker) = self.worker.take() {
            // A panicking worker has already reported through the panic
            // hook; there is nothing further to do with the result.
            _ = worker.join();
        }
    }
}

fn worker_loop(shared: &TimerShared, tx: &mpsc::Sender<Submission>) {
    let mut state = shared.state.lock().expect(ERR_POISONED_LOCK);

    loop {
        if state.stop {
            return;
        }

        // Discard entries deregistered while they were pending.
        while let Some(entry) = state.pending.peek().copied() {
            if state.cancelled.remove(&entry.id) {
                _ = state.pending.pop();
            } else {
                break;
            }
        }

        let Some(entry) = state.pending.peek().copied() else {
            state = shared.wakeup.wait(state).expect(ERR_POISONED_LOCK);
            continue;
        };

        let now = Instant::now();
        if entry.deadline <= now {
            _ = state.pending.pop();
            trace!(id = %entry.id, "timer fired");
            // A closed queue means the host is gone; the timeout has
            // nowhere to go and is dropped.
            _ = tx.send(Submission::Event(Event::new(Timeout(entry.id))));
            continue;
        }

        let (reacquired, _timed_out) = shared
            .wakeup
            .wait_timeout(state, entry.deadline - now)
            .expect(ERR_POISONED_LOCK);
        state = reacquired;
    }
}
