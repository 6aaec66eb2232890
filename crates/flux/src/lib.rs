// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A deterministic, single-threaded cooperative engine for interactive
//! value routines: long-running computations that suspend on discrete
//! external events, issue host-mediated requests, and can be cancelled at
//! any point with guaranteed release of scoped resources.
//!
//! The run-time representation of a routine is a [`Flux`], a sum of four
//! states:
//!
//! - [`Flux::Delay`] - not yet started; forced by [`Flux::start`].
//! - [`Flux::Waiting`] - paused awaiting the next event; advanced by
//!   [`Flux::step`].
//! - [`Flux::Requesting`] - paused awaiting the host's reply; advanced by
//!   [`Flux::dispatch_requests`].
//! - [`Flux::Completed`] - terminal, carrying a [`Completion`]: a value,
//!   an error, or cancellation.
//!
//! Routines compose sequentially ([`Flux::and_then`],
//! [`Flux::try_finally`], [`Flux::catch`], [`using`], [`repeat_while`]),
//! in parallel ([`join`], [`join_all`], [`race`], [`race_all`]) and as a
//! nested controlled routine ([`attach`]). The parallel combinators
//! guarantee left-to-right event ordering and cancel losing branches with
//! their finalizers run.
//!
//! # Example
//!
//! ```
//! use flux::{Completion, Event, wait_until};
//!
//! struct Connected;
//!
//! // Wait for a `Connected` event, then produce a greeting.
//! let routine = wait_until(|_: &Connected| true).map(|()| "hello");
//!
//! let routine = routine.start();
//! assert!(routine.is_waiting());
//!
//! let routine = routine.step(&Event::new(Connected));
//! assert!(matches!(
//!     routine.into_completion(),
//!     Some(Completion::Value("hello"))
//! ));
//! ```
//!
//! The event queue, run loop, and timer service live in the companion
//! `flux_host` crate; this crate is host-agnostic and performs no I/O.

mod completion;
mod error;
mod event;
mod id;
mod parallel;
mod request;
mod routine;
mod sequence;
mod sideshow;
mod timer;
mod wait;

pub use completion::*;
pub use error::*;
pub use event::*;
pub use id::*;
pub use parallel::*;
pub use request::*;
pub use routine::*;
pub use sequence::*;
pub use sideshow::*;
pub use timer::*;
pub use wait::*;

#[cfg(test)]
mod auto_traits {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(Event: Send);
    assert_impl_all!(Id: Send, Sync, Copy);
    assert_impl_all!(Cancel: Send, Sync);
    assert_impl_all!(Timeout: Send, Sync);

    // Requests are resolved on the run thread and may carry routines.
    assert_not_impl_any!(Request: Send);
    assert_not_impl_any!(Flux<()>: Send);
}
