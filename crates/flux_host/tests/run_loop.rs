// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end host behavior: event dispatch, request ordering, timers,
//! and graceful shutdown.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use flux::{Branch, Completion, race, send, sleep, using, wait_until};
use flux_host::{Host, NoRequests, RequestFn};
use flux_testing::{Ping, Pong, ReleaseProbe, TEST_TIMEOUT, execute_or_abandon};

#[test]
fn queued_events_are_consumed_in_order() {
    let mut host = Host::new(NoRequests);

    let handle = host.handle();
    handle.submit(Ping).unwrap();
    handle.submit(Pong).unwrap();

    let routine = wait_until(|_: &Ping| true)
        .and_then(|()| wait_until(|_: &Pong| true))
        .map(|()| "both seen");

    let outcome = host.run(routine);
    assert!(matches!(outcome, Some(Completion::Value("both seen"))));
}

#[test]
fn sent_commands_reach_the_handler_in_program_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let mut host = Host::new(RequestFn(move |request: flux::Request| -> flux::Reply {
        sink.lock()
            .unwrap()
            .push(*request.downcast_ref::<i32>().unwrap());
        Completion::Value(Box::new(()))
    }));

    let routine = send(0_i32).then(send(1_i32)).then(send(2_i32));
    let outcome = host.run(routine);

    assert!(matches!(outcome, Some(Completion::Value(()))));
    assert_eq!(*seen.lock().unwrap(), [0, 1, 2]);
}

#[test]
fn requests_are_resolved_before_the_next_event_is_delivered() {
    let mut host = Host::new(RequestFn(|request: flux::Request| -> flux::Reply {
        let question = request.downcast::<i32>().unwrap();
        Completion::Value(Box::new(question * 2))
    }));

    host.handle().submit(Ping).unwrap();

    let routine = flux::request::<_, i32>(21_i32)
        .and_then(|answer| wait_until(|_: &Ping| true).map(move |()| answer));

    let outcome = host.run(routine);
    assert!(matches!(outcome, Some(Completion::Value(42))));
}

#[test]
fn shutdown_cancels_the_routine_and_unblocks_the_caller() {
    let (probe, releases) = ReleaseProbe::new();
    let (handle_tx, handle_rx) = mpsc::channel();

    let runner = thread::spawn(move || {
        let mut host = Host::new(NoRequests);
        handle_tx.send(host.handle()).unwrap();
        host.run(using(probe, |_probe| wait_until(|_: &Ping| true)))
    });

    let handle = handle_rx.recv_timeout(TEST_TIMEOUT).unwrap();
    handle.shutdown().unwrap();

    let outcome = runner.join().unwrap();
    assert!(outcome.is_none(), "a shutdown surfaces as no outcome");
    assert_eq!(releases.get(), 1, "cancellation must release the resource");
}

#[test]
fn sleep_completes_through_the_timer_service() {
    let outcome = execute_or_abandon(|| {
        let mut host = Host::new(NoRequests);
        host.run(sleep(Duration::from_millis(20)).map(|()| "woke up"))
    })
    .expect("the timer must fire well within the test timeout");

    assert!(matches!(outcome, Some(Completion::Value("woke up"))));
}

#[test]
fn a_lost_race_against_a_long_sleep_does_not_block_the_host() {
    let outcome = execute_or_abandon(|| {
        let mut host = Host::new(NoRequests);
        host.handle().submit(Ping).unwrap();

        // The sleep loses immediately; releasing its timer registration
        // must not keep the loop alive for the full hour.
        host.run(race(
            wait_until(|_: &Ping| true),
            sleep(Duration::from_secs(3600)),
        ))
    })
    .expect("the race must settle well within the test timeout");

    assert!(matches!(
        outcome,
        Some(Completion::Value(Branch::Left(())))
    ));
}

#[test]
fn submissions_fail_once_the_host_is_gone() {
    let handle = {
        let host = Host::new(NoRequests);
        host.handle()
    };

    assert!(handle.submit(Ping).is_err());
    assert!(handle.shutdown().is_err());
}
