//! The user-facing transfer contract.
//!
//! A transfer names one component, an optional source, an optional
//! destination, and supplies the two-phase payload: `prepare` (make room /
//! stage data) followed by `perform` (carry the data over). Both callbacks
//! run on the submitting thread, in that order, never under a coordinator
//! lock, and may take arbitrarily long.

use crate::ids::{ComponentId, DeviceId};

/// Classification of a transfer, derived from which endpoints are present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransferKind {
    /// No source: the component enters the system.
    Add,
    /// Both endpoints: the component relocates.
    Move,
    /// No destination: the component leaves the system.
    Remove,
}

/// A single ADD, MOVE, or REMOVE request with its two-phase payload.
///
/// Implementations are driven by [`crate::StorageSystem::execute`] and must
/// be `Sync`. The id accessors must return the same values for the duration
/// of the call.
pub trait ComponentTransfer: Sync {
    /// The component being transferred.
    fn component_id(&self) -> ComponentId;

    /// Where the component currently resides; `None` for ADD.
    fn source_device_id(&self) -> Option<DeviceId>;

    /// Where the component is headed; `None` for REMOVE.
    fn destination_device_id(&self) -> Option<DeviceId>;

    /// First phase. For MOVE/REMOVE this vacates the source slot; the slot
    /// is inheritable by a waiting transfer once this returns.
    fn prepare(&self);

    /// Second phase. Never starts before the `prepare` of the transfer whose
    /// slot this one inherits has returned.
    fn perform(&self);
}

/// Closure-backed [`ComponentTransfer`], convenient for embedding and tests.
pub struct TransferFn<P, Q> {
    component: ComponentId,
    source: Option<DeviceId>,
    destination: Option<DeviceId>,
    prepare: P,
    perform: Q,
}

impl<P, Q> TransferFn<P, Q>
where
    P: Fn(),
    Q: Fn(),
{
    pub fn new(
        component: ComponentId,
        source: Option<DeviceId>,
        destination: Option<DeviceId>,
        prepare: P,
        perform: Q,
    ) -> Self {
        Self {
            component,
            source,
            destination,
            prepare,
            perform,
        }
    }

    /// ADD: bring `component` into the system on `destination`.
    pub fn add(component: ComponentId, destination: DeviceId, prepare: P, perform: Q) -> Self {
        Self::new(component, None, Some(destination), prepare, perform)
    }

    /// MOVE: relocate `component` from `source` to `destination`.
    pub fn relocate(
        component: ComponentId,
        source: DeviceId,
        destination: DeviceId,
        prepare: P,
        perform: Q,
    ) -> Self {
        Self::new(component, Some(source), Some(destination), prepare, perform)
    }

    /// REMOVE: take `component` off `source` and out of the system.
    pub fn remove(component: ComponentId, source: DeviceId, prepare: P, perform: Q) -> Self {
        Self::new(component, Some(source), None, prepare, perform)
    }
}

impl<P, Q> ComponentTransfer for TransferFn<P, Q>
where
    P: Fn() + Sync,
    Q: Fn() + Sync,
{
    fn component_id(&self) -> ComponentId {
        self.component
    }

    fn source_device_id(&self) -> Option<DeviceId> {
        self.source
    }

    fn destination_device_id(&self) -> Option<DeviceId> {
        self.destination
    }

    fn prepare(&self) {
        (self.prepare)()
    }

    fn perform(&self) {
        (self.perform)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn transfer_fn_reports_endpoints() {
        let t = TransferFn::relocate(
            ComponentId::from_raw(1),
            DeviceId::from_raw(2),
            DeviceId::from_raw(3),
            || {},
            || {},
        );
        assert_eq!(t.component_id(), ComponentId::from_raw(1));
        assert_eq!(t.source_device_id(), Some(DeviceId::from_raw(2)));
        assert_eq!(t.destination_device_id(), Some(DeviceId::from_raw(3)));
    }

    #[test]
    fn transfer_fn_invokes_callbacks() {
        let calls = AtomicUsize::new(0);
        let t = TransferFn::add(
            ComponentId::from_raw(1),
            DeviceId::from_raw(1),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
            },
            || {
                calls.fetch_add(10, Ordering::SeqCst);
            },
        );
        t.prepare();
        t.perform();
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }
}
