// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use tracing::trace;

use crate::{BoxError, Completion, Event, Reply, Request};

/// Thunk building a routine on demand; forced by [`Flux::start`].
pub type Thunk<T> = Box<dyn FnOnce() -> Flux<T>>;

/// Continuation of a waiting routine, applied to the next event.
pub type EventCont<T> = Box<dyn FnOnce(&Event) -> Flux<T>>;

/// Continuation of a requesting routine, applied to the host's reply.
pub type ReplyCont<T> = Box<dyn FnOnce(Reply) -> Flux<T>>;

/// A suspended interactive routine in one of four states.
///
/// A flux advances only synchronously: [`Flux::start`] forces `Delay`
/// nodes, [`Flux::step`] delivers one event to a `Waiting` routine, and
/// [`Flux::dispatch_requests`] resolves pending `Requesting` nodes. Between
/// two suspension points execution is synchronous and non-interruptible.
///
/// Continuations are total and always return a *started* flux - a `Delay`
/// never appears at the top of a stepped routine.
pub enum Flux<T> {
    /// Not yet started; the thunk builds the routine on demand so that
    /// side effects in the prologue of a composed routine are deferred to
    /// start time rather than construction time.
    Delay(Thunk<T>),

    /// Paused awaiting the next event.
    Waiting(EventCont<T>),

    /// Paused awaiting the host's reply to the carried request.
    Requesting(Request, ReplyCont<T>),

    /// Terminal; the outcome never changes.
    Completed(Completion<T>),
}

impl<T: 'static> Flux<T> {
    /// A routine that completes immediately with `value`.
    #[must_use]
    pub fn value(value: T) -> Self {
        Self::Completed(Completion::Value(value))
    }

    /// A routine that completes immediately with `error`.
    #[must_use]
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Completed(Completion::Error(error.into()))
    }

    /// A routine that is already cancelled.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::Completed(Completion::Cancelled)
    }

    /// A routine that completes immediately with `outcome`.
    #[must_use]
    pub fn completed(outcome: Completion<T>) -> Self {
        Self::Completed(outcome)
    }

    /// Defers `thunk` until the routine is started.
    #[must_use]
    pub fn delay(thunk: impl FnOnce() -> Self + 'static) -> Self {
        Self::Delay(Box::new(thunk))
    }

    /// Drives through `Delay` nodes until the routine is started.
    ///
    /// This loop is the trampoline that keeps long synchronous bind chains
    /// stack-safe. Idempotent on already-started routines.
    #[must_use]
    pub fn start(mut self) -> Self {
        while let Self::Delay(thunk) = self {
            self = thunk();
        }
        self
    }

    /// Delivers one event to a waiting routine.
    ///
    /// # Panics
    ///
    /// Panics if the routine is not `Waiting` - stepping a completed,
    /// requesting, or unstarted routine is a programmer error.
    #[must_use]
    pub fn step(self, event: &Event) -> Self {
        match self {
            Self::Waiting(cont) => cont(event),
            other => panic!("step requires a waiting routine, found {other:?}"),
        }
    }

    /// Requests cooperative cancellation.
    ///
    /// A waiting routine receives the distinguished [`Cancel`](crate::Cancel)
    /// event and is expected to unwind through its finalizers into
    /// `Cancelled`. A requesting routine defers: the pending request must be
    /// resolved by the host first, after which cancellation resumes. A
    /// completed routine is inert and returned unchanged.
    ///
    /// # Panics
    ///
    /// Panics on an unstarted routine.
    #[must_use]
    pub fn try_cancel(self) -> Self {
        match self {
            Self::Waiting(cont) => {
                trace!("delivering cancellation to waiting routine");
                cont(&Event::cancel())
            }
            Self::Requesting(request, cont) => {
                trace!(
                    request = request.type_name(),
                    "cancellation deferred past pending request"
                );
                Self::Requesting(request, Box::new(move |reply| cont(reply).try_cancel()))
            }
            completed @ Self::Completed(_) => completed,
            Self::Delay(_) => panic!("cannot cancel a routine that was never started"),
        }
    }

    /// Resolves consecutive pending requests through `handler`, stopping at
    /// the first `Waiting` or `Completed` state.
    #[must_use]
    pub fn dispatch_requests(mut self, mut handler: impl FnMut(Request) -> Reply) -> Self {
        while let Self::Requesting(request, cont) = self {
            self = cont(handler(request));
        }
        self
    }

    /// Whether the routine is paused awaiting an event.
    #[must_use]
    pub const fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting(_))
    }

    /// Whether the routine is paused awaiting a request reply.
    #[must_use]
    pub const fn is_requesting(&self) -> bool {
        matches!(self, Self::Requesting(..))
    }

    /// Whether the routine has reached its terminal state.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The terminal outcome, if the routine has completed.
    #[must_use]
    pub fn into_completion(self) -> Option<Completion<T>> {
        match self {
            Self::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }
}

impl Flux<()> {
    /// A routine that completes immediately with the unit value.
    #[must_use]
    pub fn unit() -> Self {
        Self::value(())
    }
}

impl<T> fmt::Debug for Flux<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delay(_) => f.write_str("Flux::Delay"),
            Self::Waiting(_) => f.write_str("Flux::Waiting"),
            Self::Requesting(request, _) => {
                f.debug_tuple("Flux::Requesting").field(request).finish()
            }
            Self::Completed(_) => f.write_str("Flux::Completed"),
        }
    }
}
