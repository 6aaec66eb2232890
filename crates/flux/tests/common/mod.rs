// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared helpers for the integration tests.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use std::cell::Cell;
use std::rc::Rc;

use flux::{Event, Flux, Scoped};
use thiserror::Error;

/// An observable scoped resource counting its releases in a shared cell.
#[derive(Debug)]
pub struct Probe {
    releases: Rc<Cell<u32>>,
}

impl Probe {
    /// A fresh probe and the counter observing it.
    pub fn new() -> (Self, Rc<Cell<u32>>) {
        let releases = Rc::new(Cell::new(0));
        let probe = Self {
            releases: Rc::clone(&releases),
        };
        (probe, releases)
    }
}

impl Scoped for Probe {
    fn release(&self) {
        self.releases.set(self.releases.get() + 1);
    }
}

/// Canned failure payload.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct Boom(pub &'static str);

/// Canned test event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping;

/// Canned test event, distinct from [`Ping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong;

/// Canned test event carrying a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Num(pub i32);

/// Starts `routine` and feeds it `events` in order, stopping early once it
/// completes.
///
/// # Panics
///
/// Panics when the routine issues a request; these tests are host-free.
pub fn drive<T: 'static>(routine: Flux<T>, events: &[Event]) -> Flux<T> {
    let mut routine = routine.start();

    for event in events {
        if routine.is_completed() {
            break;
        }
        assert!(
            routine.is_waiting(),
            "these tests are host-free, no requests expected"
        );
        routine = routine.step(event);
    }

    routine
}
