// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::fmt;

use crate::Completion;

/// An opaque request dispatched by a routine and resolved into a [`Reply`].
///
/// Requests are resolved synchronously on the run thread, either by the
/// host's request handler or by an interposing combinator. Unlike
/// [`Event`](crate::Event) they never cross a thread boundary, so the
/// payload does not need to be `Send` and may even carry a routine (the
/// sideshow replacement request does).
pub struct Request {
    payload: Box<dyn Any>,
    type_name: &'static str,
}

impl Request {
    /// Erases a concrete request value.
    #[must_use]
    pub fn new<C: Any>(payload: C) -> Self {
        Self {
            payload: Box::new(payload),
            type_name: std::any::type_name::<C>(),
        }
    }

    /// Recovers the concrete request.
    ///
    /// On a type mismatch the request is returned unchanged so the caller
    /// can hoist it onward to the next resolver.
    pub fn downcast<C: Any>(self) -> Result<C, Self> {
        let type_name = self.type_name;
        match self.payload.downcast::<C>() {
            Ok(payload) => Ok(*payload),
            Err(payload) => Err(Self { payload, type_name }),
        }
    }

    /// A typed view of the payload, if it is a `C`.
    #[must_use]
    pub fn downcast_ref<C: Any>(&self) -> Option<&C> {
        self.payload.downcast_ref::<C>()
    }

    /// Name of the erased payload type, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Request").field(&self.type_name).finish()
    }
}

/// The host's raw answer to a request.
pub type Response = Box<dyn Any>;

/// Outcome delivered back into a requesting routine: a raw response, a
/// host-reported failure, or cancellation.
pub type Reply = Completion<Response>;
