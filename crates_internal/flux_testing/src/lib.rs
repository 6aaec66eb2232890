// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test aids for the flux workspace: observable resources, canned events,
//! drive helpers for routines, and a watchdog for host-loop tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use flux::{Completion, Event, Flux, Reply, Request, Scoped};
use thiserror::Error;

/// If something (whatever) does not happen in a test within this time, the
/// test will fail.
///
/// We are conservative here and allow much time - this is only to break
/// out of infinite loops, not for any situations that are actually
/// expected.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes a thread-safe function on a background thread and abandons it
/// if it does not complete before [`TEST_TIMEOUT`].
///
/// Returns `None` when the function panicked or timed out; in both cases
/// the result channel closes without a value.
#[must_use]
pub fn execute_or_abandon<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (sender, receiver) = mpsc::channel();

    thread::spawn(move || {
        let result = f();
        _ = sender.send(result);
    });

    receiver.recv_timeout(TEST_TIMEOUT).ok()
}

/// An observable scoped resource that counts how often it was released.
///
/// The counter is shared, so a test keeps the [`ReleaseCount`] and moves
/// the probe into the routine under test.
#[derive(Debug)]
pub struct ReleaseProbe {
    releases: Arc<AtomicUsize>,
}

impl ReleaseProbe {
    /// A fresh probe and the counter observing it.
    #[must_use]
    pub fn new() -> (Self, ReleaseCount) {
        let releases = Arc::new(AtomicUsize::new(0));
        let probe = Self {
            releases: Arc::clone(&releases),
        };
        (probe, ReleaseCount(releases))
    }
}

impl Scoped for ReleaseProbe {
    fn release(&self) {
        _ = self.releases.fetch_add(1, Ordering::Relaxed);
    }
}

/// Observer half of a [`ReleaseProbe`].
#[derive(Debug, Clone)]
pub struct ReleaseCount(Arc<AtomicUsize>);

impl ReleaseCount {
    /// How often the probe has been released so far.
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// A shared counter for observing finalizers and side effects.
#[derive(Debug, Clone, Default)]
pub struct Mark(Arc<AtomicUsize>);

impl Mark {
    /// A fresh counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one hit.
    pub fn hit(&self) {
        _ = self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// How often [`hit`](Self::hit) was called.
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Canned test event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping;

/// Canned test event, distinct from [`Ping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong;

/// Canned test event carrying a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Num(pub i32);

/// Canned failure payload for routines under test.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TestError(pub &'static str);

/// Starts `routine` and feeds it `events` in order, stopping early once it
/// completes.
///
/// # Panics
///
/// Panics when the routine issues a request; use [`drive_with`] for
/// routines that talk to a host.
#[must_use]
pub fn drive<T: 'static>(routine: Flux<T>, events: &[Event]) -> Flux<T> {
    drive_with(routine, events, |request| {
        panic!("unexpected request `{}`", request.type_name())
    })
}

/// Starts `routine` and feeds it `events` in order, resolving every
/// request through `handler` and stopping early once the routine
/// completes.
#[must_use]
pub fn drive_with<T: 'static>(
    routine: Flux<T>,
    events: &[Event],
    mut handler: impl FnMut(Request) -> Reply,
) -> Flux<T> {
    let mut routine = routine.start().dispatch_requests(&mut handler);

    for event in events {
        if routine.is_completed() {
            break;
        }
        routine = routine.step(event).dispatch_requests(&mut handler);
    }

    routine
}

/// A request handler replying to everything with the unit value.
#[must_use]
pub fn reply_unit(_request: Request) -> Reply {
    Completion::Value(Box::new(()))
}
