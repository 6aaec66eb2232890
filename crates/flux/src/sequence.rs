// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::rc::Rc;

use crate::{BoxError, Completion, Flux};

impl<T: 'static> Flux<T> {
    /// Sequentially composes `self` with `k`.
    ///
    /// A `Value` outcome continues with `k`; `Error` and `Cancelled`
    /// short-circuit without invoking `k` at all.
    ///
    /// Binding a completed value defers into a `Delay` so that the
    /// [`start`](Flux::start) loop, not the call stack, drives long
    /// synchronous chains. Results delivered through continuations are
    /// forced before they are returned, preserving the invariant that a
    /// stepped routine is never a `Delay`.
    #[must_use]
    pub fn and_then<U, K>(self, k: K) -> Flux<U>
    where
        U: 'static,
        K: FnOnce(T) -> Flux<U> + 'static,
    {
        match self {
            Self::Delay(thunk) => Flux::delay(move || thunk().and_then(k)),
            Self::Waiting(cont) => {
                Flux::Waiting(Box::new(move |event| cont(event).and_then(k).start()))
            }
            Self::Requesting(request, cont) => Flux::Requesting(
                request,
                Box::new(move |reply| cont(reply).and_then(k).start()),
            ),
            Self::Completed(Completion::Value(value)) => Flux::delay(move || k(value)),
            Self::Completed(outcome) => Flux::Completed(outcome.propagate()),
        }
    }

    /// Transforms the value of a successful outcome.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Flux<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.and_then(move |value| Flux::value(f(value)))
    }

    /// Sequences `next` after `self`, discarding the current value.
    #[must_use]
    pub fn then<U: 'static>(self, next: Flux<U>) -> Flux<U> {
        self.and_then(move |_| next)
    }

    /// Runs `fin` exactly once when the routine completes by any path,
    /// including cancellation mid-flight.
    ///
    /// A finalizer error replaces a `Value` outcome but never overrides an
    /// existing `Error` or `Cancelled`.
    #[must_use]
    pub fn try_finally<F>(self, fin: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + 'static,
    {
        match self {
            Self::Delay(thunk) => Self::delay(move || thunk().try_finally(fin)),
            Self::Waiting(cont) => {
                Self::Waiting(Box::new(move |event| cont(event).try_finally(fin).start()))
            }
            Self::Requesting(request, cont) => Self::Requesting(
                request,
                Box::new(move |reply| cont(reply).try_finally(fin).start()),
            ),
            Self::Completed(outcome) => {
                let outcome = match (fin(), outcome) {
                    (Err(error), Completion::Value(_)) => Completion::Error(error),
                    (_, outcome) => outcome,
                };
                Self::Completed(outcome)
            }
        }
    }

    /// Runs `fin` exactly once when the routine completes by any path.
    #[must_use]
    pub fn finally<F>(self, fin: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.try_finally(move || {
            fin();
            Ok(())
        })
    }

    /// Recovers from an `Error` outcome by continuing with `handler`.
    ///
    /// Cancellation is not catchable; only [`try_finally`](Flux::try_finally)
    /// observes it.
    #[must_use]
    pub fn catch<H>(self, handler: H) -> Self
    where
        H: FnOnce(BoxError) -> Self + 'static,
    {
        match self {
            Self::Delay(thunk) => Self::delay(move || thunk().catch(handler)),
            Self::Waiting(cont) => {
                Self::Waiting(Box::new(move |event| cont(event).catch(handler).start()))
            }
            Self::Requesting(request, cont) => Self::Requesting(
                request,
                Box::new(move |reply| cont(reply).catch(handler).start()),
            ),
            Self::Completed(Completion::Error(error)) => Self::delay(move || handler(error)),
            completed @ Self::Completed(_) => completed,
        }
    }
}

/// A scoped resource whose release is guaranteed on every exit path of its
/// owning routine: normal completion, error, and cancellation.
pub trait Scoped {
    /// Releases the resource. Invoked exactly once.
    fn release(&self);
}

/// Acquires `resource` for the duration of `body`.
///
/// The body receives a shared handle to the resource; the release runs
/// exactly once when the body completes with a value, an error, or through
/// cancellation. The engine is single-threaded by contract, so the handle
/// is an `Rc`.
pub fn using<R, T, B>(resource: R, body: B) -> Flux<T>
where
    R: Scoped + 'static,
    T: 'static,
    B: FnOnce(Rc<R>) -> Flux<T> + 'static,
{
    let resource = Rc::new(resource);
    let guard = Rc::clone(&resource);
    Flux::delay(move || body(resource)).finally(move || guard.release())
}

/// Repeats `body` while `cond` holds, completing with the unit value once
/// the condition turns false.
///
/// Stack-safe over arbitrarily many synchronous iterations: every
/// iteration re-enters through a `Delay`, which [`Flux::start`] unwraps
/// iteratively.
pub fn repeat_while<C, B>(cond: C, body: B) -> Flux<()>
where
    C: Fn() -> bool + 'static,
    B: Fn() -> Flux<()> + 'static,
{
    Flux::delay(move || {
        if cond() {
            body().and_then(move |()| repeat_while(cond, body))
        } else {
            Flux::unit()
        }
    })
}

/// Runs `body` once per item, in order.
pub fn for_each<I, B>(items: I, body: B) -> Flux<()>
where
    I: IntoIterator + 'static,
    I::Item: 'static,
    I::IntoIter: 'static,
    B: Fn(I::Item) -> Flux<()> + 'static,
{
    fn advance<It, B>(mut items: It, body: B) -> Flux<()>
    where
        It: Iterator + 'static,
        It::Item: 'static,
        B: Fn(It::Item) -> Flux<()> + 'static,
    {
        Flux::delay(move || match items.next() {
            Some(item) => body(item).and_then(move |()| advance(items, body)),
            None => Flux::unit(),
        })
    }

    advance(items.into_iter(), body)
}
