//! Fair counting semaphore with strict FIFO admission.
//!
//! # Purpose
//!
//! The coordinator serializes every admission decision through one binary
//! semaphore (the *gate*) and parks transfers on per-component zero-permit
//! semaphores (the *signals*). Fairness of the gate is contractual: a thread
//! that started waiting earlier must enter the critical section earlier, or
//! device wait queues could be overtaken and the FIFO admission ordering
//! would be unobservable.
//!
//! # Design
//!
//! Mutex + Condvar with an explicit ticket queue. `acquire` enqueues a
//! ticket and sleeps until it is at the head *and* a permit is free, so
//! permits are always granted in arrival order. `release` uses
//! `notify_all`: with `notify_one` an arbitrary non-head waiter could be the
//! only thread woken, re-check, and sleep again while the head starves.
//!
//! # Critical-section inheritance
//!
//! The gate is a semaphore rather than a lock guard on purpose: a thread
//! inside the critical section may wake a parked peer by releasing the
//! peer's signal *without* releasing the gate. The woken thread returns from
//! its `acquire` logically inside the critical section and is the one that
//! must eventually release the gate (or hand it off again). No guard type
//! can express that ownership transfer, so entry and exit stay explicit.
//!
//! Signals are used in a strict 0/1 regime but permits bank like any
//! semaphore: releasing a signal before its owner parks is fine, the owner's
//! `acquire` then returns immediately.

use std::collections::VecDeque;

#[cfg(not(loom))]
use std::sync::{Condvar, Mutex};

#[cfg(loom)]
use loom::sync::{Condvar, Mutex};

#[derive(Debug)]
struct SemState {
    /// Currently available permits.
    permits: usize,
    /// Tickets of threads blocked in `acquire`, oldest first.
    queue: VecDeque<u64>,
    /// Next ticket to hand out. Monotone; never reused.
    next_ticket: u64,
}

/// Counting semaphore granting permits in strict arrival order.
#[derive(Debug)]
pub(crate) struct Semaphore {
    state: Mutex<SemState>,
    cv: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `permits` initial permits.
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(SemState {
                permits,
                queue: VecDeque::new(),
                next_ticket: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Take one permit, blocking in FIFO order until one is available.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. User callbacks never run
    /// under this mutex, so poisoning means a coordinator thread panicked
    /// mid-update; there is no sane recovery from that.
    pub(crate) fn acquire(&self) {
        let mut st = self.state.lock().expect("semaphore mutex poisoned");
        let ticket = st.next_ticket;
        st.next_ticket += 1;
        st.queue.push_back(ticket);

        while st.permits == 0 || st.queue.front() != Some(&ticket) {
            st = self.cv.wait(st).expect("semaphore condvar poisoned");
        }
        let head = st.queue.pop_front();
        debug_assert_eq!(head, Some(ticket), "woke out of ticket order");
        st.permits -= 1;

        // A permit may remain for the next ticket in line; it cannot observe
        // the head change without a wakeup.
        if st.permits > 0 && !st.queue.is_empty() {
            self.cv.notify_all();
        }
    }

    /// Return one permit and wake waiters.
    pub(crate) fn release(&self) {
        let mut st = self.state.lock().expect("semaphore mutex poisoned");
        st.permits += 1;
        drop(st);
        self.cv.notify_all();
    }

    /// Snapshot of available permits. Test aid; stale the moment it returns.
    #[cfg(test)]
    pub(crate) fn permits(&self) -> usize {
        self.state.lock().expect("semaphore mutex poisoned").permits
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn binary_mutual_exclusion() {
        let sem = Arc::new(Semaphore::new(1));
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sem = Arc::clone(&sem);
                let in_section = Arc::clone(&in_section);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    for _ in 0..200 {
                        sem.acquire();
                        let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        in_section.fetch_sub(1, Ordering::SeqCst);
                        sem.release();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(sem.permits(), 1);
    }

    #[test]
    fn banked_release_unblocks_later_acquire() {
        let sem = Semaphore::new(0);
        sem.release();
        // Must not block: the permit was banked before the acquire.
        sem.acquire();
        assert_eq!(sem.permits(), 0);
    }

    #[test]
    fn fifo_order_is_respected() {
        let sem = Arc::new(Semaphore::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let started = Arc::new(Barrier::new(2));

        let mut handles = Vec::new();
        for i in 0..4 {
            let sem = Arc::clone(&sem);
            let order = Arc::clone(&order);
            let worker_started = Arc::clone(&started);
            handles.push(thread::spawn(move || {
                worker_started.wait();
                sem.acquire();
                order.lock().unwrap().push(i);
                sem.release();
            }));
            // Stagger arrivals so ticket order matches spawn order.
            started.wait();
            thread::sleep(Duration::from_millis(30));
        }

        // All four are now parked; the first release admits them in order.
        sem.release();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn handoff_keeps_section_exclusive() {
        // Waker releases the signal while keeping the gate: the woken thread
        // must observe the waker's writes and no third thread may slip in.
        let gate = Arc::new(Semaphore::new(1));
        let signal = Arc::new(Semaphore::new(0));
        let shared = Arc::new(AtomicUsize::new(0));

        gate.acquire();

        let wakee = {
            let gate = Arc::clone(&gate);
            let signal = Arc::clone(&signal);
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                signal.acquire();
                // Inherited the section: the waker's write is visible.
                assert_eq!(shared.load(Ordering::SeqCst), 1);
                shared.store(2, Ordering::SeqCst);
                gate.release();
            })
        };

        let third = {
            let gate = Arc::clone(&gate);
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                // Can only enter after the wakee releases the gate.
                gate.acquire();
                assert_eq!(shared.load(Ordering::SeqCst), 2);
                gate.release();
            })
        };

        thread::sleep(Duration::from_millis(30));
        shared.store(1, Ordering::SeqCst);
        signal.release(); // handoff: gate deliberately not released here

        wakee.join().unwrap();
        third.join().unwrap();
        assert_eq!(shared.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn counting_permits_admit_up_to_capacity() {
        let sem = Arc::new(Semaphore::new(3));
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let sem = Arc::clone(&sem);
                let in_section = Arc::clone(&in_section);
                let max_seen = Arc::clone(&max_seen);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    sem.acquire();
                    let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    in_section.fetch_sub(1, Ordering::SeqCst);
                    sem.release();
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
        assert_eq!(sem.permits(), 3);
    }
}

#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::sync::atomic::{AtomicUsize, Ordering};
    use loom::sync::Arc;
    use loom::thread;

    /// Handoff ordering under loom's exhaustive scheduler: the wakee always
    /// observes the waker's pre-handoff write, regardless of interleaving.
    #[test]
    fn loom_handoff_orders_writes() {
        loom::model(|| {
            let gate = Arc::new(Semaphore::new(1));
            let signal = Arc::new(Semaphore::new(0));
            let shared = Arc::new(AtomicUsize::new(0));

            let wakee = {
                let gate = Arc::clone(&gate);
                let signal = Arc::clone(&signal);
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    signal.acquire();
                    assert_eq!(shared.load(Ordering::SeqCst), 1);
                    gate.release();
                })
            };

            gate.acquire();
            shared.store(1, Ordering::SeqCst);
            signal.release();

            wakee.join().unwrap();
        });
    }
}
