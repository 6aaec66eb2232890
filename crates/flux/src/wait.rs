// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;

use crate::{Completion, Event, Flux, FluxError, Request};

/// Waits for the first event accepted by `filter`.
///
/// Unmatched events are skipped silently and the routine keeps waiting.
/// The distinguished cancellation event completes the wait as `Cancelled`.
pub fn wait<R, F>(filter: F) -> Flux<R>
where
    R: 'static,
    F: Fn(&Event) -> Option<R> + 'static,
{
    Flux::Waiting(Box::new(move |event| {
        if event.is_cancel() {
            return Flux::cancelled();
        }

        match filter(event) {
            Some(value) => Flux::value(value),
            None => wait(filter),
        }
    }))
}

/// Waits for the first event of type `E` accepted by `filter`.
///
/// Events of other types are skipped without consulting the filter.
pub fn wait_for<E, R, F>(filter: F) -> Flux<R>
where
    E: Any,
    R: 'static,
    F: Fn(&E) -> Option<R> + 'static,
{
    wait(move |event| event.downcast_ref::<E>().and_then(|typed| filter(typed)))
}

/// Completes with the unit value on the first `E` for which `pred` holds.
pub fn wait_until<E, F>(pred: F) -> Flux<()>
where
    E: Any,
    F: Fn(&E) -> bool + 'static,
{
    wait_for(move |event: &E| pred(event).then_some(()))
}

/// The next event of type `E`.
pub fn next_event<E>() -> Flux<E>
where
    E: Any + Clone,
{
    wait_for(|event: &E| Some(event.clone()))
}

/// Sends a fire-and-forget command to the host.
///
/// The reply is ignored entirely; routing the command through the request
/// channel keeps it ordered with every other outbound request.
pub fn send<C: Any>(command: C) -> Flux<()> {
    Flux::Requesting(Request::new(command), Box::new(|_reply| Flux::unit()))
}

/// Dispatches `command` to the host and awaits its typed reply.
///
/// `Error` and `Cancelled` replies propagate into the routine's outcome; a
/// successful reply of the wrong type is a
/// [`FluxError::ReplyTypeMismatch`].
pub fn request<C, R>(command: C) -> Flux<R>
where
    C: Any,
    R: Any,
{
    Flux::Requesting(
        Request::new(command),
        Box::new(|reply| match reply {
            Completion::Value(response) => match response.downcast::<R>() {
                Ok(value) => Flux::value(*value),
                Err(_) => Flux::failed(FluxError::ReplyTypeMismatch {
                    expected: std::any::type_name::<R>(),
                }),
            },
            Completion::Error(error) => Flux::Completed(Completion::Error(error)),
            Completion::Cancelled => Flux::cancelled(),
        }),
    )
}
