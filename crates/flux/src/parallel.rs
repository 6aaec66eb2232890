// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::mem;

use tracing::trace;

use crate::{Completion, Event, Flux};

/// Winner of a two-way race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch<A, B> {
    /// The left routine finished first.
    Left(A),

    /// The right routine finished first.
    Right(B),
}

/// Runs two routines in parallel and completes when both have produced a
/// value.
///
/// The left routine starts first, has its requests drained first, and
/// receives each event first. The first `Error` or `Cancelled` observed in
/// either child cancels the sibling - running its finalizers - and becomes
/// the composite outcome; the sibling's own failure is swallowed.
pub fn join<A, B>(a: Flux<A>, b: Flux<B>) -> Flux<(A, B)>
where
    A: 'static,
    B: 'static,
{
    Flux::delay(move || advance_pair(a.start(), b.start()))
}

fn advance_pair<A, B>(a: Flux<A>, b: Flux<B>) -> Flux<(A, B)>
where
    A: 'static,
    B: 'static,
{
    // Hoist pending requests, left first. Re-entry re-scans, so chains of
    // requests drain in order before any event is consumed.
    let a = match a {
        Flux::Requesting(request, cont) => {
            return Flux::Requesting(
                request,
                Box::new(move |reply| advance_pair(cont(reply), b)),
            );
        }
        live => live,
    };
    let b = match b {
        Flux::Requesting(request, cont) => {
            return Flux::Requesting(request, Box::new(move |reply| advance_pair(a, cont(reply))));
        }
        live => live,
    };

    // The first observed failure resolves the composite; the sibling is
    // cancelled, left first.
    let a = match a {
        Flux::Completed(outcome) if !outcome.is_value() => {
            trace!("left routine failed, cancelling the right");
            return settle_losers(outcome.propagate(), vec![b], 0);
        }
        live => live,
    };
    let b = match b {
        Flux::Completed(outcome) if !outcome.is_value() => {
            trace!("right routine failed, cancelling the left");
            return settle_losers(outcome.propagate(), vec![a], 0);
        }
        live => live,
    };

    match (a, b) {
        (Flux::Completed(Completion::Value(left)), Flux::Completed(Completion::Value(right))) => {
            Flux::value((left, right))
        }
        (a, b) => Flux::Waiting(Box::new(move |event| {
            let a = deliver(a, event);
            let b = deliver(b, event);
            advance_pair(a, b)
        })),
    }
}

/// Runs the routines in parallel and completes with their values in input
/// order once every one of them has produced a value.
///
/// Left-to-right ordering applies to starting, request draining, event
/// delivery, and failure-triggered cancellation, exactly as in [`join`].
pub fn join_all<T: 'static>(routines: Vec<Flux<T>>) -> Flux<Vec<T>> {
    Flux::delay(move || {
        let children = routines.into_iter().map(Flux::start).collect();
        advance_all(children)
    })
}

fn advance_all<T: 'static>(mut children: Vec<Flux<T>>) -> Flux<Vec<T>> {
    // Hoist the first pending request, left to right. Re-entry re-scans
    // from the left so consecutive requests drain in order.
    for index in 0..children.len() {
        if children[index].is_requesting() {
            // The placeholder is overwritten before anyone can observe it.
            let slot = mem::replace(&mut children[index], Flux::cancelled());
            let Flux::Requesting(request, cont) = slot else {
                unreachable!("the slot was just checked to be requesting");
            };
            return Flux::Requesting(
                request,
                Box::new(move |reply| {
                    let mut children = children;
                    children[index] = cont(reply);
                    advance_all(children)
                }),
            );
        }
    }

    // The first failure, left to right, cancels every sibling.
    if let Some(index) = children
        .iter()
        .position(|child| matches!(child, Flux::Completed(outcome) if !outcome.is_value()))
    {
        let slot = mem::replace(&mut children[index], Flux::cancelled());
        let Flux::Completed(failure) = slot else {
            unreachable!("the slot was just checked to be completed");
        };
        trace!(child = index, "routine failed, cancelling its siblings");
        children.remove(index);
        return settle_losers(failure.propagate(), children, 0);
    }

    if children.iter().all(Flux::is_completed) {
        let values = children
            .into_iter()
            .map(|child| match child.into_completion() {
                Some(Completion::Value(value)) => value,
                _ => unreachable!("failures were settled above"),
            })
            .collect();
        return Flux::value(values);
    }

    Flux::Waiting(Box::new(move |event| {
        let children = children
            .into_iter()
            .map(|child| deliver(child, event))
            .collect();
        advance_all(children)
    }))
}

/// Races two routines; the first to complete wins and the loser is
/// cancelled without seeing the winning event.
///
/// A child that is already complete when the race starts wins before the
/// other sees any event at all; ties within one event break to the left.
/// The winner's outcome is returned as-is, including `Error` and
/// `Cancelled`. The loser always runs its finalizers; a failure raised by
/// the loser while it unwinds overrides only a `Value` outcome of the
/// winner.
pub fn race<A, B>(a: Flux<A>, b: Flux<B>) -> Flux<Branch<A, B>>
where
    A: 'static,
    B: 'static,
{
    Flux::delay(move || advance_race(a.start(), b.start()))
}

fn advance_race<A, B>(a: Flux<A>, b: Flux<B>) -> Flux<Branch<A, B>>
where
    A: 'static,
    B: 'static,
{
    // Hoist pending requests, left first.
    let a = match a {
        Flux::Requesting(request, cont) => {
            return Flux::Requesting(
                request,
                Box::new(move |reply| advance_race(cont(reply), b)),
            );
        }
        live => live,
    };
    let b = match b {
        Flux::Requesting(request, cont) => {
            return Flux::Requesting(request, Box::new(move |reply| advance_race(a, cont(reply))));
        }
        live => live,
    };

    // A completed child wins; ties break to the left.
    let a = match a {
        Flux::Completed(outcome) => {
            trace!("left routine won the race");
            return settle_losers(outcome.map(Branch::Left), vec![b], 0);
        }
        live => live,
    };
    let b = match b {
        Flux::Completed(outcome) => {
            trace!("right routine won the race");
            return settle_losers(outcome.map(Branch::Right), vec![a], 0);
        }
        live => live,
    };

    // Both children are now waiting.
    Flux::Waiting(Box::new(move |event| {
        let a = a.step(event);
        if a.is_completed() {
            // The left child won this tick: the right child is cancelled
            // without ever observing the event.
            let Some(outcome) = a.into_completion() else {
                unreachable!("the child was just checked to be completed");
            };
            trace!("left routine won the race at this tick");
            return settle_losers(outcome.map(Branch::Left), vec![b], 0);
        }

        let b = b.step(event);
        advance_race(a, b)
    }))
}

/// Races the routines in the vector; ties break by input order.
///
/// Completes with the winning child's index and value. Once a winner is
/// known within one event, the children after it do not receive that event
/// before being cancelled. Racing an empty vector never completes.
pub fn race_all<T: 'static>(routines: Vec<Flux<T>>) -> Flux<(usize, T)> {
    Flux::delay(move || {
        let children = routines.into_iter().map(Flux::start).collect();
        advance_race_all(children)
    })
}

fn advance_race_all<T: 'static>(mut children: Vec<Flux<T>>) -> Flux<(usize, T)> {
    // Hoist the first pending request, left to right.
    for index in 0..children.len() {
        if children[index].is_requesting() {
            // The placeholder is overwritten before anyone can observe it.
            let slot = mem::replace(&mut children[index], Flux::cancelled());
            let Flux::Requesting(request, cont) = slot else {
                unreachable!("the slot was just checked to be requesting");
            };
            return Flux::Requesting(
                request,
                Box::new(move |reply| {
                    let mut children = children;
                    children[index] = cont(reply);
                    advance_race_all(children)
                }),
            );
        }
    }

    // The first completed child, in input order, wins.
    if let Some(index) = children.iter().position(Flux::is_completed) {
        let slot = mem::replace(&mut children[index], Flux::cancelled());
        let Some(outcome) = slot.into_completion() else {
            unreachable!("the slot was just checked to be completed");
        };
        trace!(child = index, "routine won the race");
        children.remove(index);
        return settle_losers(outcome.map(|value| (index, value)), children, 0);
    }

    // Every child is waiting. Deliver the event left to right and break
    // out at the first winner: the remaining children keep their pre-event
    // state and are cancelled without observing it.
    Flux::Waiting(Box::new(move |event| {
        let mut stepped = Vec::with_capacity(children.len());
        let mut pending = children.into_iter();

        while let Some(child) = pending.next() {
            let child = child.step(event);
            if child.is_completed() {
                let index = stepped.len();
                let Some(outcome) = child.into_completion() else {
                    unreachable!("the child was just checked to be completed");
                };
                trace!(child = index, "routine won the race at this tick");
                stepped.extend(pending);
                return settle_losers(outcome.map(|value| (index, value)), stepped, 0);
            }
            stepped.push(child);
        }

        advance_race_all(stepped)
    }))
}

/// Delivers the event to a live child; completed children are inert.
fn deliver<T: 'static>(child: Flux<T>, event: &Event) -> Flux<T> {
    match child {
        Flux::Waiting(cont) => cont(event),
        inert => inert,
    }
}

/// Cancels every remaining loser, left to right, hoisting any requests
/// their teardown still needs resolved, and resolves the composite with
/// the merged outcome.
fn settle_losers<T, L>(mut primary: Completion<T>, mut losers: Vec<Flux<L>>, mut index: usize) -> Flux<T>
where
    T: 'static,
    L: 'static,
{
    while index < losers.len() {
        // The placeholder is overwritten or dropped before anyone can
        // observe it.
        let child = mem::replace(&mut losers[index], Flux::cancelled());
        match child.try_cancel() {
            Flux::Completed(outcome) => {
                primary = merge_loser(primary, outcome);
                index += 1;
            }
            Flux::Requesting(request, cont) => {
                return Flux::Requesting(
                    request,
                    Box::new(move |reply| {
                        let mut losers = losers;
                        losers[index] = cont(reply);
                        settle_losers(primary, losers, index)
                    }),
                );
            }
            // A cooperative routine completes on the cancellation event;
            // one that keeps waiting is abandoned as cancelled.
            Flux::Waiting(_) => {
                primary = merge_loser(primary, Completion::<L>::Cancelled);
                index += 1;
            }
            Flux::Delay(_) => unreachable!("children are started before cancellation reaches them"),
        }
    }

    Flux::Completed(primary)
}

/// First-failure policy: the primary outcome stands, except that a loser's
/// failure overrides a `Value`.
fn merge_loser<T, L>(primary: Completion<T>, loser: Completion<L>) -> Completion<T> {
    match (primary, loser) {
        (Completion::Value(_), Completion::Error(error)) => Completion::Error(error),
        (primary, _) => primary,
    }
}
