// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use crate::{Completion, Flux, Id, ReplyCont, Request, Response, request};

/// Handle through which a control routine manages its sideshow: a nested,
/// replaceable routine that runs alongside the control without going
/// through the host's event channel.
///
/// Obtained from [`attach`]; the handle's requests are intercepted by the
/// attachment wrapper and never reach the host.
pub struct SideshowControl<S> {
    tag: Id,
    _state: PhantomData<fn(S)>,
}

impl<S> Clone for SideshowControl<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for SideshowControl<S> {}

impl<S> fmt::Debug for SideshowControl<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SideshowControl").field(&self.tag).finish()
    }
}

impl<S: Clone + 'static> SideshowControl<S> {
    /// Cancels the running sideshow (if any) and installs `show` in its
    /// place, recording `state` as the visible tag.
    ///
    /// Returns only after the incoming routine has advanced to `Waiting`
    /// or `Completed`. An error raised by the outgoing routine while it is
    /// cancelled, or by the incoming routine on its first advance, is
    /// returned here and leaves the sideshow idle; in the first case the
    /// incoming routine is discarded without being started.
    pub fn begin(&self, state: S, show: Flux<()>) -> Flux<()> {
        request(ReplaceShow {
            tag: self.tag,
            state,
            show,
        })
    }

    /// The state tag supplied with the most recent [`begin`](Self::begin),
    /// or `None` while the sideshow is idle.
    pub fn state(&self) -> Flux<Option<S>> {
        request(ShowState::<S> {
            tag: self.tag,
            _state: PhantomData,
        })
    }
}

/// In-band request installing a new sideshow.
struct ReplaceShow<S> {
    tag: Id,
    state: S,
    show: Flux<()>,
}

/// In-band request reading the current sideshow state tag.
struct ShowState<S> {
    tag: Id,
    _state: PhantomData<fn(S)>,
}

/// Attaches a sideshow slot to the control routine built by `control`.
///
/// The control routine receives a [`SideshowControl`] whose in-band
/// requests are intercepted here; every other request flows through to the
/// host unchanged. The slot is tagged with a fresh [`Id`] so nested
/// attachments do not interfere.
///
/// Per tick the sideshow advances first: its pending requests are hoisted
/// to the host before the control routine moves at all, and an incoming
/// event is delivered to the sideshow continuation before the control
/// continuation. When the control routine completes, the sideshow is
/// cancelled; a control error dominates a sideshow error in the combined
/// outcome.
pub fn attach<S, R, F>(control: F) -> Flux<R>
where
    S: Clone + 'static,
    R: 'static,
    F: FnOnce(SideshowControl<S>) -> Flux<R> + 'static,
{
    Flux::delay(move || {
        let tag = Id::fresh();
        let slot = Slot::<S> {
            tag,
            state: None,
            show: None,
        };
        let handle = SideshowControl {
            tag,
            _state: PhantomData,
        };
        slot.advance(control(handle).start())
    })
}

/// The attachment's book-keeping: the tag guarding interception, the
/// currently visible state, and the installed sideshow routine (live or
/// terminal; `None` while idle).
struct Slot<S> {
    tag: Id,
    state: Option<S>,
    show: Option<Flux<()>>,
}

impl<S: Clone + 'static> Slot<S> {
    /// Advances the sideshow through its pending requests, then the
    /// control routine, intercepting the control's in-band requests.
    fn advance<R: 'static>(mut self, control: Flux<R>) -> Flux<R> {
        // The sideshow goes first: its requests reach the host before the
        // control moves at all.
        if let Some(show) = self.show.take() {
            match show {
                Flux::Requesting(request, cont) => {
                    return Flux::Requesting(
                        request,
                        Box::new(move |reply| {
                            self.show = Some(cont(reply));
                            self.advance(control)
                        }),
                    );
                }
                settled => self.show = Some(settled),
            }
        }

        match control {
            Flux::Requesting(request, cont) => self.handle_request(request, cont),
            Flux::Waiting(cont) => Flux::Waiting(Box::new(move |event| {
                // The sideshow sees the event first, then the control.
                if let Some(show) = self.show.take() {
                    let show = match show {
                        Flux::Waiting(show_cont) => show_cont(event),
                        inert => inert,
                    };
                    self.show = Some(show);
                }
                self.advance(cont(event))
            })),
            Flux::Completed(outcome) => self.finish(outcome),
            Flux::Delay(_) => unreachable!("control routines are started before advancing"),
        }
    }

    /// Routes one control request: intercept our own tag, hoist everything
    /// else to the host.
    fn handle_request<R: 'static>(self, request: Request, cont: ReplyCont<R>) -> Flux<R> {
        let request = match request.downcast::<ReplaceShow<S>>() {
            Ok(replace) if replace.tag == self.tag => {
                trace!(tag = %self.tag, "replacing sideshow");
                return self.replace(replace.state, replace.show, cont);
            }
            // A nested attachment's request: hoist it onward untouched.
            Ok(replace) => Request::new(replace),
            Err(request) => request,
        };

        let request = match request.downcast::<ShowState<S>>() {
            Ok(query) if query.tag == self.tag => {
                let reply = Completion::Value(Box::new(self.state.clone()) as Response);
                return self.advance(cont(reply));
            }
            Ok(query) => Request::new(query),
            Err(request) => request,
        };

        Flux::Requesting(request, Box::new(move |reply| self.advance(cont(reply))))
    }

    /// Cancels the outgoing show, then installs the incoming one.
    fn replace<R: 'static>(mut self, state: S, incoming: Flux<()>, cont: ReplyCont<R>) -> Flux<R> {
        match self.show.take() {
            Some(outgoing) => self.cancel_outgoing(outgoing.try_cancel(), state, incoming, cont),
            None => self.install(state, incoming.start(), cont),
        }
    }

    fn cancel_outgoing<R: 'static>(
        mut self,
        outgoing: Flux<()>,
        state: S,
        incoming: Flux<()>,
        cont: ReplyCont<R>,
    ) -> Flux<R> {
        match outgoing {
            Flux::Requesting(request, outgoing_cont) => Flux::Requesting(
                request,
                Box::new(move |reply| {
                    self.cancel_outgoing(outgoing_cont(reply), state, incoming, cont)
                }),
            ),
            Flux::Completed(Completion::Error(error)) => {
                // The outgoing show failed while unwinding: the caller of
                // `begin` gets that error and the incoming show is
                // discarded without being started.
                trace!(tag = %self.tag, "outgoing sideshow failed during cancellation");
                self.state = None;
                self.advance(cont(Completion::Error(error)))
            }
            Flux::Completed(_) | Flux::Waiting(_) => self.install(state, incoming.start(), cont),
            Flux::Delay(_) => unreachable!("an installed sideshow is always started"),
        }
    }

    /// Drives the incoming show to `Waiting` or `Completed`, then answers
    /// the pending `begin`.
    fn install<R: 'static>(mut self, state: S, incoming: Flux<()>, cont: ReplyCont<R>) -> Flux<R> {
        match incoming {
            Flux::Requesting(request, incoming_cont) => Flux::Requesting(
                request,
                Box::new(move |reply| self.install(state, incoming_cont(reply), cont)),
            ),
            Flux::Completed(Completion::Error(error)) => {
                // An immediately failing show reports through `begin` and
                // leaves the sideshow idle.
                trace!(tag = %self.tag, "incoming sideshow failed on start");
                self.state = None;
                self.show = None;
                self.advance(cont(Completion::Error(error)))
            }
            show @ (Flux::Waiting(_) | Flux::Completed(_)) => {
                self.state = Some(state);
                self.show = Some(show);
                self.advance(cont(Completion::Value(Box::new(()) as Response)))
            }
            Flux::Delay(_) => unreachable!("the incoming show was started"),
        }
    }

    /// The control routine completed: tear down the sideshow and combine
    /// the outcomes.
    fn finish<R: 'static>(mut self, outcome: Completion<R>) -> Flux<R> {
        match self.show.take() {
            Some(show) => {
                trace!(tag = %self.tag, "control completed, cancelling sideshow");
                self.teardown(show.try_cancel(), outcome)
            }
            None => Flux::Completed(outcome),
        }
    }

    fn teardown<R: 'static>(self, show: Flux<()>, outcome: Completion<R>) -> Flux<R> {
        match show {
            Flux::Requesting(request, cont) => Flux::Requesting(
                request,
                Box::new(move |reply| self.teardown(cont(reply), outcome)),
            ),
            Flux::Completed(show_outcome) => Flux::Completed(combine(outcome, show_outcome)),
            // A cooperative routine completes on the cancellation event;
            // one that keeps waiting is abandoned as cancelled.
            Flux::Waiting(_) => Flux::Completed(combine(outcome, Completion::Cancelled)),
            Flux::Delay(_) => unreachable!("an installed sideshow is always started"),
        }
    }
}

/// A control error dominates a sideshow error; otherwise a sideshow error
/// surfaces through the control's non-error outcome.
fn combine<R>(control: Completion<R>, show: Completion<()>) -> Completion<R> {
    match (control, show) {
        (control @ Completion::Error(_), _) => control,
        (_, Completion::Error(error)) => Completion::Error(error),
        (control, _) => control,
    }
}
