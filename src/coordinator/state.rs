//! Coordinator bookkeeping: the device table and the component slab.
//!
//! # Layout
//!
//! Components live in a slab indexed by [`ComponentKey`]; the public
//! [`ComponentId`] maps to a key through a side table. The indirection
//! matters for REMOVE: the public id is detached at admission (so a
//! concurrent ADD of the same id validates as brand new) while the slab
//! entry stays alive until the removal's final gate, because device sets and
//! replacement links still point at it.
//!
//! # Slot accounting
//!
//! Per device, three collections and one counter:
//!
//! | Field     | Meaning                                                    |
//! |-----------|------------------------------------------------------------|
//! | `present` | occupying or committed to a slot; a leaver stays listed    |
//! |           | until its `prepare` completes                              |
//! | `leaving` | admitted outbound; slot claimable by exactly one incomer   |
//! | `waiting` | blocked awaiting a slot, FIFO by admission attempt         |
//! | `reserved`| slot commitments: `present` minus still-present leavers    |
//!
//! `has_empty_slot` (`|present| < capacity`) answers "can an incomer take a
//! slot with no strings attached"; `unreserved` (`capacity - reserved`)
//! answers "is there a leaver whose slot nobody has claimed yet".
//!
//! All mutation happens with the coordinator gate held. Methods here assert
//! the guarantees their callers establish; a failed assert is a coordinator
//! bug, not a user error.

use std::collections::VecDeque;
use std::sync::Arc;

use ahash::AHashMap;

use crate::config::SystemConfig;
use crate::ids::{ComponentId, DeviceId};
use crate::metrics::Counters;
use crate::sync::Semaphore;

/// Slab index of a live component. Never reused while the entry is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ComponentKey(u32);

/// Per-device slot bookkeeping.
#[derive(Debug)]
pub(crate) struct DeviceState {
    pub(crate) capacity: usize,
    pub(crate) reserved: usize,
    pub(crate) present: Vec<ComponentKey>,
    pub(crate) leaving: Vec<ComponentKey>,
    pub(crate) waiting: VecDeque<ComponentKey>,
}

impl DeviceState {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            reserved: 0,
            present: Vec::new(),
            leaving: Vec::new(),
            waiting: VecDeque::new(),
        }
    }

    /// A slot nobody occupies or has committed to.
    #[inline]
    pub(crate) fn has_empty_slot(&self) -> bool {
        self.present.len() < self.capacity
    }

    /// Slots whose leaver has not been claimed yet.
    #[inline]
    pub(crate) fn unreserved(&self) -> usize {
        self.capacity.saturating_sub(self.reserved)
    }
}

/// Per-component transfer state.
#[derive(Debug)]
pub(crate) struct ComponentState {
    pub(crate) id: ComponentId,
    pub(crate) current_device: Option<DeviceId>,
    pub(crate) destination_device: Option<DeviceId>,
    pub(crate) is_operated_on: bool,
    pub(crate) is_waiting_for_replacement: bool,
    /// Incomer that will inherit this component's slot when it vacates.
    pub(crate) source_for_replacement: Option<ComponentKey>,
    /// Outbound component whose slot this component inherits.
    pub(crate) destination_replacement: Option<ComponentKey>,
    /// Remaining cycle members to wake, oldest link first, self last.
    /// Handed from member to member as the cycle admission is consumed.
    pub(crate) path: Option<Vec<ComponentKey>>,
    /// Wakes this component out of a device wait queue.
    pub(crate) reservation: Arc<Semaphore>,
    /// Wakes this component's successor into its `perform` phase.
    pub(crate) handoff: Arc<Semaphore>,
}

impl ComponentState {
    fn new(id: ComponentId) -> Self {
        Self {
            id,
            current_device: None,
            destination_device: None,
            is_operated_on: false,
            is_waiting_for_replacement: false,
            source_for_replacement: None,
            destination_replacement: None,
            path: None,
            reservation: Arc::new(Semaphore::new(0)),
            handoff: Arc::new(Semaphore::new(0)),
        }
    }
}

/// The whole mutable coordinator state, protected by one mutex.
#[derive(Debug)]
pub(crate) struct CoordState {
    devices: AHashMap<DeviceId, DeviceState>,
    ids: AHashMap<ComponentId, ComponentKey>,
    slots: Vec<Option<ComponentState>>,
    free: Vec<u32>,
    pub(crate) counters: Counters,
}

impl CoordState {
    /// Build the registry from a validated configuration.
    pub(crate) fn from_config(config: &SystemConfig) -> Self {
        let mut state = Self {
            devices: config
                .capacities()
                .iter()
                .map(|(&device, &capacity)| (device, DeviceState::new(capacity)))
                .collect(),
            ids: AHashMap::with_capacity(config.placement().len()),
            slots: Vec::with_capacity(config.placement().len()),
            free: Vec::new(),
            counters: Counters::default(),
        };
        for (&component, &device) in config.placement() {
            let key = state.insert_component(component);
            state.component_mut(key).current_device = Some(device);
            let dev = state.device_mut(device);
            dev.present.push(key);
            dev.reserved += 1;
        }
        state
    }

    // ---- lookups -----------------------------------------------------

    #[inline]
    pub(crate) fn has_device(&self, device: DeviceId) -> bool {
        self.devices.contains_key(&device)
    }

    pub(crate) fn device(&self, device: DeviceId) -> &DeviceState {
        self.devices.get(&device).expect("device not registered")
    }

    pub(crate) fn device_mut(&mut self, device: DeviceId) -> &mut DeviceState {
        self.devices.get_mut(&device).expect("device not registered")
    }

    #[inline]
    pub(crate) fn key_of(&self, id: ComponentId) -> Option<ComponentKey> {
        self.ids.get(&id).copied()
    }

    pub(crate) fn component(&self, key: ComponentKey) -> &ComponentState {
        self.slots[key.0 as usize]
            .as_ref()
            .expect("component slot is vacant")
    }

    pub(crate) fn component_mut(&mut self, key: ComponentKey) -> &mut ComponentState {
        self.slots[key.0 as usize]
            .as_mut()
            .expect("component slot is vacant")
    }

    // ---- component lifecycle ------------------------------------------

    /// Allocate a slab entry for `id` and map the public id to it.
    pub(crate) fn insert_component(&mut self, id: ComponentId) -> ComponentKey {
        let state = ComponentState::new(id);
        let key = match self.free.pop() {
            Some(index) => {
                debug_assert!(self.slots[index as usize].is_none());
                self.slots[index as usize] = Some(state);
                ComponentKey(index)
            }
            None => {
                let index = u32::try_from(self.slots.len()).expect("component slab overflow");
                self.slots.push(Some(state));
                ComponentKey(index)
            }
        };
        let previous = self.ids.insert(id, key);
        assert!(previous.is_none(), "component id registered twice: {id}");
        key
    }

    /// Detach the public id from its slab entry. The entry stays alive; a
    /// later ADD of the same id gets a fresh entry.
    pub(crate) fn detach_id(&mut self, id: ComponentId) {
        let detached = self.ids.remove(&id);
        assert!(detached.is_some(), "detaching unknown component id: {id}");
    }

    /// Free a slab entry once nothing references it anymore.
    pub(crate) fn free_slot(&mut self, key: ComponentKey) {
        let entry = self.slots[key.0 as usize]
            .take()
            .expect("freeing a vacant component slot");
        assert!(
            entry.source_for_replacement.is_none() && entry.destination_replacement.is_none(),
            "freeing {} with a live replacement link",
            entry.id
        );
        debug_assert!(entry.path.is_none());
        self.free.push(key.0);
    }

    // ---- slot accounting ----------------------------------------------

    /// Mark `key` as an admitted leaver on its current device.
    ///
    /// The component stays in `present` until its `prepare` completes, but
    /// its slot commitment is released for an incomer to claim.
    pub(crate) fn mark_leaving(&mut self, key: ComponentKey) {
        let device = self
            .component(key)
            .current_device
            .expect("leaver has no current device");
        let dev = self.device_mut(device);
        debug_assert!(!dev.leaving.contains(&key), "component already leaving");
        assert!(dev.reserved > 0, "leaving a device with no commitments");
        dev.leaving.push(key);
        dev.reserved -= 1;
    }

    /// Commit a slot on `key`'s destination device.
    ///
    /// Returns `true` if the commitment claimed a vacating component's slot
    /// (a replacement link was installed), `false` for a plain empty slot.
    ///
    /// # Panics
    ///
    /// Panics if the device is full and has no unclaimed leaver; callers
    /// only reserve when one of the two is guaranteed.
    pub(crate) fn reserve(&mut self, key: ComponentKey) -> bool {
        let destination = self
            .component(key)
            .destination_device
            .expect("reserving with no destination");

        let replaced = if self.device(destination).has_empty_slot() {
            self.component_mut(key).destination_replacement = None;
            false
        } else {
            let donor = self
                .device(destination)
                .leaving
                .iter()
                .copied()
                .find(|&leaver| self.component(leaver).source_for_replacement.is_none())
                .unwrap_or_else(|| {
                    panic!("no unclaimed leaving component on fully reserved {destination}")
                });
            self.link_replacement(donor, key);
            true
        };

        let dev = self.device_mut(destination);
        dev.present.push(key);
        dev.reserved += 1;
        assert!(
            dev.reserved <= dev.capacity,
            "over-reserved {destination}: {} of {}",
            dev.reserved,
            dev.capacity
        );
        replaced
    }

    /// Commit a slot for a cycle member, inheriting `donor`'s slot directly.
    ///
    /// Unlike [`Self::reserve`] there is no claim scan: the cycle admission
    /// dictates exactly whose slot each member takes.
    pub(crate) fn reserve_in_cycle(&mut self, member: ComponentKey, donor: ComponentKey) {
        let destination = self
            .component(member)
            .destination_device
            .expect("cycle member has no destination");
        debug_assert_eq!(
            self.component(donor).current_device,
            Some(destination),
            "cycle donor does not reside on the member's destination"
        );
        self.link_replacement(donor, member);
        let dev = self.device_mut(destination);
        dev.present.push(member);
        dev.reserved += 1;
        assert!(dev.reserved <= dev.capacity, "over-reserved {destination}");
    }

    /// Install the inverse replacement pair: `claimant` inherits `leaver`'s
    /// slot when it vacates.
    pub(crate) fn link_replacement(&mut self, leaver: ComponentKey, claimant: ComponentKey) {
        debug_assert!(self.component(leaver).source_for_replacement.is_none());
        self.component_mut(leaver).source_for_replacement = Some(claimant);
        self.component_mut(claimant).destination_replacement = Some(leaver);
    }

    /// Mark leaving (MOVE/REMOVE) and commit the destination slot (ADD/MOVE).
    ///
    /// Returns whether the commitment claimed a leaver's slot; `false` for
    /// REMOVE, which commits nothing.
    pub(crate) fn begin_reservation(&mut self, key: ComponentKey) -> bool {
        if self.component(key).current_device.is_some() {
            self.mark_leaving(key);
        }
        if self.component(key).destination_device.is_some() {
            self.reserve(key)
        } else {
            false
        }
    }

    /// Admit a whole cycle at once: every member becomes a leaver, then each
    /// member inherits the slot of the next entry in `path` (wrapping).
    pub(crate) fn admit_cycle(&mut self, path: &[ComponentKey]) {
        assert!(path.len() >= 2, "a reservation cycle needs two members");
        for &member in path {
            self.mark_leaving(member);
        }
        for (index, &member) in path.iter().enumerate() {
            let donor = path[(index + 1) % path.len()];
            self.reserve_in_cycle(member, donor);
        }
        self.counters.cycles_admitted += 1;
        self.counters.longest_cycle = self.counters.longest_cycle.max(path.len() as u64);
    }

    /// Drop `key` from a device's wait queue (it was woken and re-entered).
    pub(crate) fn remove_waiting(&mut self, device: DeviceId, key: ComponentKey) {
        let dev = self.device_mut(device);
        let position = dev
            .waiting
            .iter()
            .position(|&waiter| waiter == key)
            .expect("woken component missing from wait queue");
        dev.waiting.remove(position);
    }

    /// Erase `key` from its old device's `present` and `leaving` sets once
    /// its `prepare` has completed. The physical slot is free from here on.
    pub(crate) fn remove_from_current(&mut self, key: ComponentKey) {
        let device = self
            .component(key)
            .current_device
            .expect("vacating with no current device");
        let dev = self.device_mut(device);
        dev.present.retain(|&k| k != key);
        dev.leaving.retain(|&k| k != key);
    }

    // ---- invariant checking ---------------------------------------------

    /// Structural invariants, checked in debug builds at gate boundaries.
    #[cfg(debug_assertions)]
    pub(crate) fn assert_invariants(&self) {
        let mut present_on: AHashMap<ComponentKey, usize> = AHashMap::new();
        let mut seen_waiting: AHashMap<ComponentKey, DeviceId> = AHashMap::new();

        for (&device, dev) in &self.devices {
            assert!(
                dev.reserved <= dev.capacity,
                "{device}: reserved {} exceeds capacity {}",
                dev.reserved,
                dev.capacity
            );
            let present_leavers = dev
                .present
                .iter()
                .filter(|key| dev.leaving.contains(key))
                .count();
            assert_eq!(
                dev.reserved,
                dev.present.len() - present_leavers,
                "{device}: reserved count out of sync"
            );
            // Wakes happen in the same critical section that frees a slot,
            // so an unclaimed slot never coexists with a populated queue.
            if dev.unreserved() > 0 {
                assert!(
                    dev.waiting.is_empty(),
                    "{device}: unclaimed slots while transfers wait"
                );
            }
            for &key in &dev.present {
                *present_on.entry(key).or_insert(0) += 1;
            }
            for &key in &dev.leaving {
                assert!(
                    self.component(key).current_device == Some(device),
                    "leaving component not resident here"
                );
            }
            for &key in &dev.waiting {
                let waiter = self.component(key);
                assert_eq!(
                    waiter.destination_device,
                    Some(device),
                    "waiter queued on a device it does not target"
                );
                assert!(waiter.is_operated_on, "idle component in a wait queue");
                let prior = seen_waiting.insert(key, device);
                assert!(prior.is_none(), "component waiting on two devices");
            }
        }

        for (&key, &count) in &present_on {
            // An in-flight mover sits in its source's present set until its
            // prepare completes and in its destination's from admission.
            assert!(count <= 2, "component present on more than two devices");
            if count == 2 {
                let comp = self.component(key);
                assert!(
                    comp.is_operated_on && comp.destination_device.is_some(),
                    "idle component present on two devices"
                );
            }
        }

        for (index, entry) in self.slots.iter().enumerate() {
            let Some(slot) = entry else { continue };
            let key = ComponentKey(index as u32);
            if let Some(claimant) = slot.source_for_replacement {
                assert_eq!(
                    self.component(claimant).destination_replacement,
                    Some(key),
                    "replacement links are not inverse"
                );
            }
            if let Some(donor) = slot.destination_replacement {
                assert_eq!(
                    self.component(donor).source_for_replacement,
                    Some(key),
                    "replacement links are not inverse"
                );
            }
            if !slot.is_operated_on {
                assert!(slot.destination_device.is_none());
                assert!(slot.source_for_replacement.is_none());
                assert!(slot.destination_replacement.is_none());
                assert!(slot.path.is_none());
            }
        }
    }

    // ---- introspection ---------------------------------------------------

    /// Components physically resident on `device` (leavers included,
    /// reserved incomers excluded). Meaningful at quiescent points.
    pub(crate) fn resident_count(&self, device: DeviceId) -> usize {
        self.device(device)
            .present
            .iter()
            .filter(|&&key| self.component(key).current_device == Some(device))
            .count()
    }
}
