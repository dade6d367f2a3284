//! Admission, slot reservation, and progress coordination.
//!
//! # Architecture
//!
//! ```text
//!  execute() threads                    Coordinator
//!  ─────────────────        ┌────────────────────────────────────┐
//!   setup_prepare   ──────► │ gate (fair FIFO semaphore)         │
//!   finalize_prepare ─────► │   └── state: Mutex<CoordState>     │
//!   setup_perform   ──────► │        devices / components /      │
//!   finalize_perform ─────► │        wait queues / counters      │
//!  parked on per-component  └────────────────────────────────────┘
//!  reservation / handoff signals
//! ```
//!
//! Two locking levels with distinct jobs:
//!
//! - The **gate** delimits logical critical sections. It is held across a
//!   whole admission decision and can be *handed off*: a waker releases a
//!   parked thread's signal while keeping the gate, and the woken thread
//!   resumes inside the same critical section. Decisions the waker recorded
//!   (slot grants, replacement links, cycle paths) reach the wakee with no
//!   intervening writer.
//! - The **state mutex** protects memory. It is taken for short bookkeeping
//!   bursts only and is never held while parking, releasing the gate, or
//!   running user callbacks.
//!
//! # Gate contract
//!
//! | Gate               | Entered by        | Exits via                      |
//! |--------------------|-------------------|--------------------------------|
//! | `setup_prepare`    | acquire           | release, waiter/cycle handoff  |
//! | `finalize_prepare` | acquire           | release, claimant handoff      |
//! | `setup_perform`    | acquire           | release (may park in between)  |
//! | `finalize_perform` | acquire           | release                        |
//!
//! A thread parks in exactly two places: its component's `reservation`
//! signal (slot admission) and a leaver's `handoff` signal (waiting for the
//! inherited slot's `prepare` to finish). Neither lock is held while parked.

pub(crate) mod cycle;
pub(crate) mod state;

use std::sync::{Mutex, MutexGuard};

use crate::config::SystemConfig;
use crate::errors::TransferError;
use crate::ids::{ComponentId, DeviceId};
use crate::metrics::MetricsSnapshot;
use crate::sync::Semaphore;
use crate::transfer::TransferKind;
use crate::validate;

use state::{ComponentKey, CoordState};

/// The single-mutex admission coordinator.
#[derive(Debug)]
pub(crate) struct Coordinator {
    gate: Semaphore,
    state: Mutex<CoordState>,
}

impl Coordinator {
    pub(crate) fn new(config: &SystemConfig) -> Self {
        Self {
            gate: Semaphore::new(1),
            state: Mutex::new(CoordState::from_config(config)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordState> {
        self.state.lock().expect("coordinator state poisoned")
    }

    /// Leave the critical section normally.
    fn release_gate(&self, st: MutexGuard<'_, CoordState>) {
        #[cfg(debug_assertions)]
        st.assert_invariants();
        drop(st);
        self.gate.release();
    }

    /// Hand the critical section to the head waiter of `device`'s queue if
    /// one exists (a freshly unclaimed leaving slot is waiting for it);
    /// otherwise leave normally. The wakee dequeues itself.
    fn release_to_waiter(&self, mut st: MutexGuard<'_, CoordState>, device: DeviceId) {
        match st.device(device).waiting.front().copied() {
            Some(head) => {
                let signal = st.component(head).reservation.clone();
                st.counters.handoffs += 1;
                drop(st);
                signal.release();
            }
            None => self.release_gate(st),
        }
    }

    /// Consume one step of an admitted cycle: pop self off the owned path,
    /// hand the remainder plus the critical section to the next member, or
    /// leave normally once the path is spent.
    fn wake_next_in_cycle(&self, mut st: MutexGuard<'_, CoordState>, me: ComponentKey) {
        let mut path = st
            .component_mut(me)
            .path
            .take()
            .expect("cycle wake without a path");
        let tail = path.pop();
        debug_assert_eq!(tail, Some(me), "cycle path tail is not self");

        match path.last().copied() {
            Some(next) => {
                let signal = st.component(next).reservation.clone();
                st.component_mut(next).path = Some(path);
                st.counters.handoffs += 1;
                drop(st);
                signal.release();
            }
            None => self.release_gate(st),
        }
    }

    /// Park the calling thread on `key`'s reservation signal until a slot
    /// decision has been made for it. Enqueues on `device`, gives up the
    /// gate, and returns with the critical section inherited and the
    /// component dequeued.
    fn wait_for_reservation(
        &self,
        mut st: MutexGuard<'_, CoordState>,
        device: DeviceId,
        key: ComponentKey,
    ) -> MutexGuard<'_, CoordState> {
        let signal = st.component(key).reservation.clone();
        st.device_mut(device).waiting.push_back(key);
        st.counters.queued_admissions += 1;
        #[cfg(debug_assertions)]
        st.assert_invariants();
        drop(st);
        self.gate.release();

        signal.acquire();
        // Critical section inherited from the waker.
        let mut st = self.lock();
        st.remove_waiting(device, key);
        st
    }

    // ---- gates ------------------------------------------------------------

    /// Admission gate. Validates, registers the transfer, and blocks until
    /// the component holds a slot commitment on its destination (or, for
    /// REMOVE, until its departure is booked). On `Ok` the gate has been
    /// released (or handed off) and the caller may run `prepare`.
    pub(crate) fn setup_prepare(
        &self,
        id: ComponentId,
        source: Option<DeviceId>,
        destination: Option<DeviceId>,
    ) -> Result<(TransferKind, ComponentKey), TransferError> {
        self.gate.acquire();
        let mut st = self.lock();

        let kind = match validate::classify(&st, id, source, destination) {
            Ok(kind) => kind,
            Err(error) => {
                st.counters.rejected += 1;
                drop(st);
                self.gate.release();
                return Err(error);
            }
        };

        let key = match kind {
            TransferKind::Add => st.insert_component(id),
            TransferKind::Move => st.key_of(id).expect("validated component exists"),
            TransferKind::Remove => {
                let key = st.key_of(id).expect("validated component exists");
                // The public id is free again from this moment; the slab
                // entry lives on until finalize_perform.
                st.detach_id(id);
                key
            }
        };
        {
            let comp = st.component_mut(key);
            comp.is_operated_on = true;
            comp.destination_device = destination;
        }

        match kind {
            TransferKind::Remove => {
                let source = source.expect("REMOVE has a source");
                let replaced = st.begin_reservation(key);
                debug_assert!(!replaced);
                self.release_to_waiter(st, source);
            }
            TransferKind::Add => {
                let destination = destination.expect("ADD has a destination");
                if st.device(destination).unreserved() == 0 {
                    st = self.wait_for_reservation(st, destination, key);
                    // The waker guaranteed a claimable slot.
                }
                let replaced = st.begin_reservation(key);
                self.count_admission(&mut st, replaced);
                self.release_gate(st);
            }
            TransferKind::Move => {
                let source = source.expect("MOVE has a source");
                let destination = destination.expect("MOVE has a destination");
                self.setup_prepare_move(st, key, source, destination);
            }
        }

        Ok((kind, key))
    }

    /// MOVE admission: free slot, replacement claim, cycle, or wait.
    fn setup_prepare_move<'a>(
        &'a self,
        mut st: MutexGuard<'a, CoordState>,
        key: ComponentKey,
        source: DeviceId,
        destination: DeviceId,
    ) {
        if st.device(destination).has_empty_slot() {
            let replaced = st.begin_reservation(key);
            self.count_admission(&mut st, replaced);
            self.release_to_waiter(st, source);
            return;
        }

        if let Some(path) = cycle::find_cycle(&st, key) {
            st.admit_cycle(&path);
            st.component_mut(key).path = Some(path);
            self.wake_next_in_cycle(st, key);
            return;
        }

        if st.device(destination).unreserved() == 0 {
            st = self.wait_for_reservation(st, destination, key);
        }

        if st.component(key).path.is_some() {
            // Woken as a member of a cycle someone else admitted: the slot
            // ring is already booked, only the wake chain continues here.
            self.wake_next_in_cycle(st, key);
        } else {
            // Either an unclaimed leaver existed up front, or the waker
            // guaranteed one before waking us.
            let replaced = st.begin_reservation(key);
            self.count_admission(&mut st, replaced);
            self.release_to_waiter(st, source);
        }
    }

    fn count_admission(&self, st: &mut MutexGuard<'_, CoordState>, replaced: bool) {
        if replaced {
            st.counters.replacement_admissions += 1;
        } else {
            st.counters.direct_admissions += 1;
        }
    }

    /// Post-`prepare` gate for MOVE and REMOVE: the source slot is now
    /// physically vacated. Erases the component from its old device and
    /// lets a claimant (if one is already parked) into its `perform` phase.
    pub(crate) fn finalize_prepare(&self, key: ComponentKey) {
        self.gate.acquire();
        let mut st = self.lock();

        st.remove_from_current(key);

        match st.component(key).source_for_replacement {
            Some(claimant) if st.component(claimant).is_waiting_for_replacement => {
                // The claimant parked on our handoff signal; pass it the
                // critical section. It clears the link pair on wake.
                let signal = st.component(key).handoff.clone();
                st.counters.handoffs += 1;
                drop(st);
                signal.release();
            }
            Some(claimant) => {
                // Claimant exists but has not reached its perform gate; it
                // must not wait on us once we are gone. Break the pair.
                st.component_mut(claimant).destination_replacement = None;
                st.component_mut(key).source_for_replacement = None;
                self.release_gate(st);
            }
            None => self.release_gate(st),
        }
    }

    /// Pre-`perform` gate for ADD and MOVE: if the inherited slot's leaver
    /// has not finished its `prepare`, park until it signals.
    pub(crate) fn setup_perform(&self, key: ComponentKey) {
        self.gate.acquire();
        let mut st = self.lock();

        let Some(leaver) = st.component(key).destination_replacement else {
            self.release_gate(st);
            return;
        };

        let signal = st.component(leaver).handoff.clone();
        st.component_mut(key).is_waiting_for_replacement = true;
        drop(st);
        self.gate.release();

        signal.acquire();
        // Critical section inherited from the leaver's finalize_prepare.
        let mut st = self.lock();
        {
            let comp = st.component_mut(key);
            comp.is_waiting_for_replacement = false;
            comp.destination_replacement = None;
        }
        st.component_mut(leaver).source_for_replacement = None;
        self.release_gate(st);
    }

    /// Post-`perform` gate: the component has arrived (or is gone).
    pub(crate) fn finalize_perform(&self, key: ComponentKey, kind: TransferKind) {
        self.gate.acquire();
        let mut st = self.lock();
        {
            let comp = st.component_mut(key);
            comp.current_device = comp.destination_device.take();
            comp.is_operated_on = false;
            debug_assert!(comp.path.is_none());
            debug_assert!(comp.destination_replacement.is_none());
        }
        match kind {
            TransferKind::Add => st.counters.adds_completed += 1,
            TransferKind::Move => st.counters.moves_completed += 1,
            TransferKind::Remove => {
                st.counters.removes_completed += 1;
                st.free_slot(key);
            }
        }
        self.release_gate(st);
    }

    // ---- introspection ----------------------------------------------------

    pub(crate) fn metrics(&self) -> MetricsSnapshot {
        self.gate.acquire();
        let st = self.lock();
        let snapshot = st.counters.snapshot();
        drop(st);
        self.gate.release();
        snapshot
    }

    /// `(resident, capacity)` for `device`, or `None` if unregistered.
    pub(crate) fn device_occupancy(&self, device: DeviceId) -> Option<(usize, usize)> {
        self.gate.acquire();
        let st = self.lock();
        let occupancy = st
            .has_device(device)
            .then(|| (st.resident_count(device), st.device(device).capacity));
        drop(st);
        self.gate.release();
        occupancy
    }
}
