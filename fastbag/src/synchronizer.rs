// Copyright 2025 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;

/// How an [`acquire`](Synchronizer::acquire) call came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcquireResult {
    /// The published sequence advanced past the witness.
    Acquired,
    /// The timeout elapsed first.
    TimedOut,
    /// [`interrupt_all`](Synchronizer::interrupt_all) fired while parked.
    Interrupted,
}

#[derive(Debug)]
struct Shared {
    /// Latest sequence value made visible by a publisher.
    published: u64,
    /// Tickets of parked waiters, oldest at the front.
    tickets: VecDeque<u64>,
    next_ticket: u64,
    /// Bumped by `interrupt_all`; waiters compare against the value they saw
    /// when they parked.
    interrupt_epoch: u64,
}

/// A long-valued synchronizer that parks borrowers until the published
/// sequence passes the witness they captured before scanning.
///
/// Waiters queue behind each other in ticket order: a waiter acquires only
/// when its ticket is at the head of the queue, which gives soft FIFO among
/// parked threads without touching the lock-free fast paths elsewhere in the
/// bag. A later waiter whose witness is already satisfied still yields to the
/// head waiter until that one acquires, times out, or is interrupted.
#[derive(Debug)]
pub(crate) struct Synchronizer {
    shared: Mutex<Shared>,
    wakeup: Condvar,
    parked: AtomicUsize,
}

impl Synchronizer {
    pub(crate) fn new() -> Self {
        Self {
            shared: Mutex::new(Shared {
                published: 0,
                tickets: VecDeque::new(),
                next_ticket: 0,
                interrupt_epoch: 0,
            }),
            wakeup: Condvar::new(),
            parked: AtomicUsize::new(0),
        }
    }

    /// Parks the calling thread until the published sequence exceeds
    /// `witness`, for at most `timeout`.
    ///
    /// Succeeds immediately, even with a zero timeout, when the sequence has
    /// already passed the witness and nobody is queued ahead.
    pub(crate) fn acquire(&self, witness: u64, timeout: Duration) -> AcquireResult {
        let mut shared = self.shared.lock();
        if shared.published > witness && shared.tickets.is_empty() {
            return AcquireResult::Acquired;
        }
        if timeout.is_zero() {
            return AcquireResult::TimedOut;
        }

        let ticket = shared.next_ticket;
        shared.next_ticket += 1;
        shared.tickets.push_back(ticket);
        let epoch = shared.interrupt_epoch;

        self.parked.fetch_add(1, Ordering::Relaxed);
        let _parked = scopeguard::guard((), |()| {
            self.parked.fetch_sub(1, Ordering::Relaxed);
        });

        // Instants this far in the future cannot be represented; wait
        // unbounded instead.
        let deadline = Instant::now().checked_add(timeout);
        let outcome = loop {
            if shared.interrupt_epoch != epoch {
                break AcquireResult::Interrupted;
            }
            if shared.published > witness && shared.tickets.front() == Some(&ticket) {
                break AcquireResult::Acquired;
            }
            match deadline {
                Some(deadline) => {
                    if self.wakeup.wait_until(&mut shared, deadline).timed_out() {
                        if shared.interrupt_epoch != epoch {
                            break AcquireResult::Interrupted;
                        }
                        if shared.published > witness && shared.tickets.front() == Some(&ticket) {
                            break AcquireResult::Acquired;
                        }
                        break AcquireResult::TimedOut;
                    }
                }
                None => self.wakeup.wait(&mut shared),
            }
        };

        if let Some(at) = shared.tickets.iter().position(|t| *t == ticket) {
            shared.tickets.remove(at);
        }
        drop(shared);
        // Successors re-evaluate against the new head.
        self.wakeup.notify_all();
        outcome
    }

    /// Publishes `sequence` and wakes every parked waiter for re-evaluation.
    ///
    /// The published value only moves forward; a release that lost the race
    /// with a higher one is a no-op.
    pub(crate) fn release(&self, sequence: u64) {
        let mut shared = self.shared.lock();
        if sequence > shared.published {
            shared.published = sequence;
        }
        let wake = !shared.tickets.is_empty();
        drop(shared);
        if wake {
            self.wakeup.notify_all();
        }
    }

    /// Wakes every thread currently parked and makes its acquire report
    /// [`AcquireResult::Interrupted`]. Threads that park afterwards are
    /// unaffected.
    pub(crate) fn interrupt_all(&self) {
        let mut shared = self.shared.lock();
        shared.interrupt_epoch += 1;
        drop(shared);
        self.wakeup.notify_all();
    }

    /// The number of threads currently parked in [`acquire`](Self::acquire).
    pub(crate) fn waiting(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}
