// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::mpsc;

use flux::Event;

/// One entry in the host's FIFO.
#[derive(Debug)]
pub enum Submission {
    /// An external event for the running routine.
    Event(Event),

    /// Cancel the routine and exit the loop; acknowledged through the
    /// carried sender once the loop has observed the cancellation.
    Shutdown(oneshot::Sender<()>),
}

/// The thread-safe FIFO feeding the run loop: enqueue from any thread,
/// blocking dequeue on the run thread.
#[derive(Debug)]
pub(crate) struct EventQueue {
    rx: mpsc::Receiver<Submission>,
    tx: mpsc::Sender<Submission>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { rx, tx }
    }

    /// A new producer handle for the queue.
    pub fn sender(&self) -> mpsc::Sender<Submission> {
        self.tx.clone()
    }

    /// Blocks until the next submission arrives.
    pub fn recv(&self) -> Submission {
        // The queue owns one sender itself, so the channel cannot
        // disconnect while the host is alive.
        self.rx
            .recv()
            .expect("the host owns a sender, the queue cannot disconnect")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submissions_come_out_in_fifo_order() {
        let queue = EventQueue::new();
        let tx = queue.sender();

        tx.send(Submission::Event(Event::new(1_i32))).unwrap();
        tx.send(Submission::Event(Event::new(2_i32))).unwrap();

        let Submission::Event(first) = queue.recv() else {
            panic!("expected an event");
        };
        let Submission::Event(second) = queue.recv() else {
            panic!("expected an event");
        };

        assert_eq!(first.downcast_ref::<i32>(), Some(&1));
        assert_eq!(second.downcast_ref::<i32>(), Some(&2));
    }
}
