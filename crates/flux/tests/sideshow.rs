// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Sideshow attachment contracts: synchronous replacement, error
//! forwarding through `begin`, shared event delivery, and outcome
//! precedence at teardown.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{Boom, Num, Ping, Pong, Probe, drive};
use flux::{Completion, Event, Flux, SideshowControl, attach, using, wait, wait_until};

#[test]
fn begin_replaces_the_sideshow_and_releases_the_old_resource_synchronously() {
    let (probe, releases) = Probe::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    let record = {
        let log = Rc::clone(&log);
        move |entry: String| log.borrow_mut().push(entry)
    };

    let releases_seen = Rc::clone(&releases);
    let control = attach(move |ctl: SideshowControl<&'static str>| {
        let record_idle = record.clone();
        let record_first = record.clone();
        let record_second = record.clone();

        ctl.state()
            .and_then(move |state| {
                record_idle(format!("{state:?}"));
                ctl.begin("one", using(probe, |_probe| wait_until(|_: &Ping| true)))
            })
            .and_then(move |()| ctl.state())
            .and_then(move |state| {
                record_first(format!("{state:?}"));
                ctl.begin("two", wait_until(|_: &Ping| true))
            })
            .and_then(move |()| {
                // The old sideshow's resource is gone before `begin`
                // returns to us.
                record_second(format!("released={}", releases_seen.get()));
                ctl.state()
            })
            .and_then(|state| {
                assert_eq!(state, Some("two"));
                wait_until(|_: &Pong| true).map(|()| 7)
            })
    });

    let routine = control.start();
    assert!(routine.is_waiting(), "control and sideshow both wait now");
    assert_eq!(releases.get(), 1);
    assert_eq!(
        *log.borrow(),
        ["None", "Some(\"one\")", "released=1"],
        "state transitions: idle, then active, then replaced"
    );

    let routine = routine.step(&Event::new(Pong));
    assert!(matches!(
        routine.into_completion(),
        Some(Completion::Value(7))
    ));
}

#[test]
fn begin_forwards_an_immediately_failing_show_and_leaves_the_slot_idle() {
    let control = attach(move |ctl: SideshowControl<&'static str>| {
        ctl.begin("doomed", Flux::failed(Boom("bad show")))
            .catch(|error| {
                assert_eq!(error.to_string(), "bad show");
                Flux::unit()
            })
            .and_then(move |()| ctl.state())
    });

    let routine = control.start();
    let Some(Completion::Value(state)) = routine.into_completion() else {
        panic!("expected the control to finish with the queried state");
    };
    assert_eq!(state, None, "a failed install leaves the sideshow idle");
}

#[test]
fn one_event_reaches_the_sideshow_before_the_control() {
    let order = Rc::new(RefCell::new(Vec::new()));

    let show_order = Rc::clone(&order);
    let show = wait(move |event| {
        show_order.borrow_mut().push("show");
        event.downcast_ref::<Pong>().map(|_| ())
    });

    let control_order = Rc::clone(&order);
    let control = attach(move |ctl: SideshowControl<i32>| {
        ctl.begin(1, show).and_then(move |()| {
            wait(move |event| {
                control_order.borrow_mut().push("control");
                event.downcast_ref::<Num>().map(|n| n.0)
            })
        })
    });

    let routine = drive(control, &[Event::new(Ping), Event::new(Num(3))]);

    assert!(matches!(
        routine.into_completion(),
        Some(Completion::Value(3))
    ));
    // Both continuations saw both events, sideshow first each time.
    assert_eq!(*order.borrow(), ["show", "control", "show", "control"]);
}

#[test]
fn control_completion_cancels_the_sideshow() {
    let (probe, releases) = Probe::new();

    let control = attach(move |ctl: SideshowControl<&'static str>| {
        ctl.begin("held", using(probe, |_probe| wait_until(|_: &Ping| true)))
            .and_then(|()| wait_until(|_: &Pong| true).map(|()| "done"))
    });

    let routine = drive(control, &[Event::new(Pong)]);

    assert!(matches!(
        routine.into_completion(),
        Some(Completion::Value("done"))
    ));
    assert_eq!(releases.get(), 1);
}

#[test]
fn a_sideshow_error_surfaces_through_a_successful_control() {
    let show = wait_until(|_: &Ping| true).and_then(|()| Flux::<()>::failed(Boom("show failed")));

    let control = attach(move |ctl: SideshowControl<i32>| {
        ctl.begin(1, show)
            .and_then(|()| wait_until(|_: &Ping| true).map(|()| "control fine"))
    });

    let routine = drive(control, &[Event::new(Ping)]);

    let Some(Completion::Error(error)) = routine.into_completion() else {
        panic!("expected the sideshow's error to surface");
    };
    assert_eq!(error.to_string(), "show failed");
}

#[test]
fn a_control_error_dominates_a_sideshow_error() {
    let show = wait_until(|_: &Ping| true).and_then(|()| Flux::<()>::failed(Boom("show failed")));

    let control = attach(move |ctl: SideshowControl<i32>| {
        ctl.begin(1, show).and_then(|()| {
            wait_until(|_: &Ping| true).and_then(|()| Flux::<&str>::failed(Boom("control failed")))
        })
    });

    let routine = drive(control, &[Event::new(Ping)]);

    let Some(Completion::Error(error)) = routine.into_completion() else {
        panic!("expected the control's error");
    };
    assert_eq!(error.to_string(), "control failed");
}

#[test]
fn an_erroring_sideshow_still_runs_its_finalizers() {
    let (probe, releases) = Probe::new();

    let show = using(probe, |_probe| {
        wait_until(|_: &Ping| true).and_then(|()| Flux::<()>::failed(Boom("show failed")))
    });

    let control = attach(move |ctl: SideshowControl<i32>| {
        ctl.begin(1, show)
            .and_then(|()| wait_until(|_: &Pong| true))
    });

    // The show errors on the first event while the control keeps waiting.
    let routine = drive(control, &[Event::new(Ping)]);
    assert!(routine.is_waiting());
    assert_eq!(releases.get(), 1);
}

#[test]
fn nested_attachments_do_not_intercept_each_other() {
    let control = attach(move |outer: SideshowControl<&'static str>| {
        outer
            .begin("outer show", wait_until(|_: &Ping| true))
            .and_then(move |()| {
                attach(move |inner: SideshowControl<&'static str>| {
                    inner
                        .begin("inner show", wait_until(|_: &Ping| true))
                        .and_then(move |()| outer.state())
                        .and_then(move |outer_state| {
                            assert_eq!(outer_state, Some("outer show"));
                            inner.state()
                        })
                        .and_then(|inner_state| {
                            assert_eq!(inner_state, Some("inner show"));
                            Flux::value(42)
                        })
                })
            })
    });

    let routine = control.start();
    assert!(matches!(
        routine.into_completion(),
        Some(Completion::Value(42))
    ));
}
