// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::fmt;

use crate::Id;

/// An opaque event delivered to a waiting routine.
///
/// The engine never inspects the payload; the wait primitives apply
/// caller-supplied typed filters through [`Event::downcast_ref`]. Events
/// cross the thread boundary between submitters and the run loop, so the
/// payload must be `Send`.
pub struct Event {
    payload: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl Event {
    /// Erases a concrete event value.
    #[must_use]
    pub fn new<E>(payload: E) -> Self
    where
        E: Any + Send,
    {
        Self {
            payload: Box::new(payload),
            type_name: std::any::type_name::<E>(),
        }
    }

    /// The distinguished cancellation event.
    #[must_use]
    pub fn cancel() -> Self {
        Self::new(Cancel)
    }

    /// A typed view of the payload, if it is an `E`.
    #[must_use]
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// Whether this is the cancellation event.
    #[must_use]
    pub fn is_cancel(&self) -> bool {
        self.downcast_ref::<Cancel>().is_some()
    }

    /// Name of the erased payload type, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Event").field(&self.type_name).finish()
    }
}

/// The distinguished event that unwinds a waiting routine into `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancel;

/// Completion event of a host-scheduled timer, carrying the id the timer
/// was registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout(pub Id);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_recovers_the_payload() {
        let event = Event::new(42_i32);
        assert_eq!(event.downcast_ref::<i32>(), Some(&42));
        assert_eq!(event.downcast_ref::<String>(), None);
        assert!(!event.is_cancel());
    }

    #[test]
    fn cancel_event_is_recognized() {
        assert!(Event::cancel().is_cancel());
    }

    #[test]
    fn debug_names_the_payload_type() {
        let rendered = format!("{:?}", Event::new(7_u8));
        assert!(rendered.contains("u8"), "unexpected rendering: {rendered}");
    }
}
