// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::sync::mpsc;

use flux::{Completion, Event, Flux, Reply, Request, ScheduleTimeout};
use tracing::{debug, trace};

use crate::queue::EventQueue;
use crate::timer::TimerService;
use crate::{HostError, Submission};

/// Resolves the requests a routine addresses to the host.
///
/// Called synchronously from the run loop while pending requests are
/// drained, before any further event is delivered.
#[cfg_attr(test, mockall::automock)]
pub trait HandleRequest {
    /// Produces the reply for one request.
    fn handle(&mut self, request: Request) -> Reply;
}

/// Adapts a closure into a [`HandleRequest`] implementation.
#[derive(Debug, Clone)]
pub struct RequestFn<F>(pub F);

impl<F> HandleRequest for RequestFn<F>
where
    F: FnMut(Request) -> Reply,
{
    fn handle(&mut self, request: Request) -> Reply {
        (self.0)(request)
    }
}

/// A request handler for routines that never issue requests of their own.
///
/// Timer-protocol requests are still served by the host's built-in timer
/// service; anything else is answered with
/// [`HostError::UnexpectedRequest`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRequests;

impl HandleRequest for NoRequests {
    fn handle(&mut self, request: Request) -> Reply {
        Completion::Error(Box::new(HostError::UnexpectedRequest {
            type_name: request.type_name(),
        }))
    }
}

/// Drives one routine against the event queue until it completes or the
/// host is shut down.
///
/// The host owns the only threads in the system: the caller's run thread,
/// on which every routine transition happens, and the timer worker.
#[derive(Debug)]
pub struct Host<H> {
    queue: EventQueue,
    timers: TimerService,
    handler: H,
}

impl<H: HandleRequest> Host<H> {
    /// Creates a host resolving routine requests through `handler`.
    pub fn new(handler: H) -> Self {
        let queue = EventQueue::new();
        let timers = TimerService::new(queue.sender());
        Self {
            queue,
            timers,
            handler,
        }
    }

    /// A cloneable handle for feeding the host from other threads.
    pub fn handle(&self) -> HostHandle {
        HostHandle {
            tx: self.queue.sender(),
        }
    }

    /// Runs `root` to completion on the calling thread.
    ///
    /// Per iteration the loop drains every pending request, then blocks on
    /// the queue for the next submission. A [`Timeout`](flux::Timeout)
    /// scheduled through the built-in timer service arrives as an ordinary
    /// event.
    ///
    /// Returns `Some` with the routine's `Value` or `Error` outcome, and
    /// `None` when the routine was cancelled - by a shutdown submission or
    /// by its own logic - before producing one.
    pub fn run<T: 'static>(&mut self, root: Flux<T>) -> Option<Completion<T>> {
        let mut routine = root.start();

        loop {
            routine = self.drain_requests(routine);

            match routine {
                Flux::Completed(Completion::Cancelled) => {
                    debug!("routine cancelled");
                    return None;
                }
                Flux::Completed(outcome) => {
                    debug!("routine completed");
                    return Some(outcome);
                }
                live => routine = live,
            }

            match self.queue.recv() {
                Submission::Event(event) => {
                    trace!(event = event.type_name(), "dispatching event");
                    routine = routine.step(&event);
                }
                Submission::Shutdown(ack) => {
                    debug!("shutdown requested, cancelling the routine");
                    let settled = self.drain_requests(routine.try_cancel());
                    let outcome = match settled.into_completion() {
                        Some(Completion::Cancelled) | None => None,
                        Some(other) => Some(other),
                    };
                    _ = ack.send(());
                    return outcome;
                }
            }
        }
    }

    /// Resolves every pending request: the timer protocol goes to the
    /// built-in service, everything else to the configured handler.
    fn drain_requests<T: 'static>(&mut self, routine: Flux<T>) -> Flux<T> {
        let timers = &self.timers;
        let handler = &mut self.handler;

        routine.dispatch_requests(|request| match request.downcast::<ScheduleTimeout>() {
            Ok(schedule) => timers.register(schedule),
            Err(request) => {
                trace!(request = request.type_name(), "dispatching request");
                handler.handle(request)
            }
        })
    }
}

/// Cloneable handle for submitting events to a running host and shutting
/// it down.
///
/// Valid while [`Host::run`] is executing on another thread; once the loop
/// has exited, submissions fail with [`HostError::Closed`].
#[derive(Debug, Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<Submission>,
}

impl HostHandle {
    /// Enqueues one event for the running routine.
    ///
    /// # Errors
    ///
    /// [`HostError::Closed`] when the host is gone.
    pub fn submit<E: Any + Send>(&self, event: E) -> Result<(), HostError> {
        self.tx
            .send(Submission::Event(Event::new(event)))
            .map_err(|_| HostError::Closed)
    }

    /// Cancels the running routine and blocks until the run loop has
    /// observed the cancellation and exited.
    ///
    /// # Errors
    ///
    /// [`HostError::Closed`] when the host is gone before the
    /// acknowledgement arrives.
    pub fn shutdown(&self) -> Result<(), HostError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Submission::Shutdown(ack_tx))
            .map_err(|_| HostError::Closed)?;
        ack_rx.recv().map_err(|_| HostError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_completes_a_value_routine_without_events() {
        let mut host = Host::new(NoRequests);
        let outcome = host.run(Flux::value(5));
        assert!(matches!(outcome, Some(Completion::Value(5))));
    }

    #[test]
    fn run_returns_none_for_a_self_cancelled_routine() {
        let mut host = Host::new(NoRequests);
        let outcome = host.run(Flux::<i32>::cancelled());
        assert!(outcome.is_none());
    }

    #[test]
    fn unexpected_requests_are_answered_with_an_error() {
        let mut host = Host::new(NoRequests);
        let outcome = host.run(flux::request::<_, i32>("who is asking"));

        let Some(Completion::Error(error)) = outcome else {
            panic!("expected the unexpected-request error");
        };
        assert!(
            error.to_string().contains("unexpected request"),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn requests_are_routed_to_a_mocked_handler() {
        let mut handler = MockHandleRequest::new();
        handler
            .expect_handle()
            .times(1)
            .returning(|_request| Completion::Value(Box::new(7_i32)));

        let mut host = Host::new(handler);
        let outcome = host.run(flux::request::<_, i32>("question"));
        assert!(matches!(outcome, Some(Completion::Value(7))));
    }
}
