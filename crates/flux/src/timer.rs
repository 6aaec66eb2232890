// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::Duration;

use crate::{Flux, Id, Scoped, Timeout, request, using, wait_until};

/// Request asking the host to fire a [`Timeout`] event after `duration`.
///
/// Answered with a [`TimerHandle`] whose release deregisters the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTimeout {
    /// Correlation id carried by the resulting `Timeout` event.
    pub id: Id,

    /// How long until the timer fires.
    pub duration: Duration,
}

/// Scoped registration of a host-side timer.
///
/// Held via [`using`] for the duration of a [`sleep`], so that a cancelled
/// sleep deregisters its timer instead of leaking it.
pub struct TimerHandle {
    deregister: Box<dyn Fn()>,
}

impl TimerHandle {
    /// Wraps the host-side deregistration hook.
    #[must_use]
    pub fn new(deregister: impl Fn() + 'static) -> Self {
        Self {
            deregister: Box::new(deregister),
        }
    }
}

impl Scoped for TimerHandle {
    fn release(&self) {
        (self.deregister)();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TimerHandle")
    }
}

/// Suspends the routine for `duration`.
///
/// Schedules a host timer under a fresh id, waits for the matching
/// [`Timeout`] event, and releases the registration on every exit path.
pub fn sleep(duration: Duration) -> Flux<()> {
    Flux::delay(move || {
        let id = Id::fresh();
        request::<_, TimerHandle>(ScheduleTimeout { id, duration }).and_then(move |handle| {
            using(handle, move |_handle| {
                wait_until(move |timeout: &Timeout| timeout.0 == id)
            })
        })
    })
}
