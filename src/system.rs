//! The public entry point: system construction and the transfer driver.
//!
//! `execute` is the whole user surface. Each call validates, admits, and
//! then drives the transfer's two-phase payload on the calling thread,
//! interleaving coordinator gates with the user callbacks:
//!
//! ```text
//! ADD:    setup_prepare -> prepare ------------------> setup_perform -> perform -> finalize_perform
//! MOVE:   setup_prepare -> prepare -> finalize_prepare -> setup_perform -> perform -> finalize_perform
//! REMOVE: setup_prepare -> prepare -> finalize_prepare ----------------> perform -> finalize_perform
//! ```
//!
//! The callbacks never run under a coordinator lock. A call may block for
//! arbitrarily long awaiting admission; it returns only once `perform` has
//! returned and the completion is booked.

use crate::config::SystemConfig;
use crate::coordinator::Coordinator;
use crate::errors::{ConfigError, TransferError};
use crate::ids::DeviceId;
use crate::metrics::MetricsSnapshot;
use crate::transfer::{ComponentTransfer, TransferKind};

/// Coordinates concurrent component transfers across a fixed device set.
///
/// Shared across threads by reference; every outstanding transfer runs on
/// its submitting thread.
///
/// ```
/// use relocator_rs::{ComponentId, DeviceId, StorageSystem, SystemConfig, TransferFn};
///
/// let system = StorageSystem::new(
///     SystemConfig::new()
///         .with_device(DeviceId::from_raw(1), 2)
///         .with_device(DeviceId::from_raw(2), 1)
///         .with_component(ComponentId::from_raw(7), DeviceId::from_raw(1)),
/// )
/// .unwrap();
///
/// let transfer = TransferFn::relocate(
///     ComponentId::from_raw(7),
///     DeviceId::from_raw(1),
///     DeviceId::from_raw(2),
///     || { /* vacate the source slot */ },
///     || { /* carry the data over */ },
/// );
/// system.execute(&transfer).unwrap();
/// ```
#[derive(Debug)]
pub struct StorageSystem {
    coordinator: Coordinator,
}

impl StorageSystem {
    /// Build a system from a validated configuration.
    ///
    /// Device capacities and the device set are immutable afterwards;
    /// initial components start resident and unoperated.
    pub fn new(config: SystemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            coordinator: Coordinator::new(&config),
        })
    }

    /// Carry out one transfer synchronously.
    ///
    /// Returns once both callbacks have run, or with a [`TransferError`]
    /// if admission rejected the transfer (in which case neither callback
    /// ran and nothing changed).
    pub fn execute<T>(&self, transfer: &T) -> Result<(), TransferError>
    where
        T: ComponentTransfer + ?Sized,
    {
        let (kind, key) = self.coordinator.setup_prepare(
            transfer.component_id(),
            transfer.source_device_id(),
            transfer.destination_device_id(),
        )?;

        transfer.prepare();

        match kind {
            TransferKind::Add => {
                self.coordinator.setup_perform(key);
                transfer.perform();
            }
            TransferKind::Move => {
                self.coordinator.finalize_prepare(key);
                self.coordinator.setup_perform(key);
                transfer.perform();
            }
            TransferKind::Remove => {
                self.coordinator.finalize_prepare(key);
                // Nothing to wait for: the vacated slot has no predecessor.
                transfer.perform();
            }
        }

        self.coordinator.finalize_perform(key, kind);
        Ok(())
    }

    /// Counters accumulated so far.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.coordinator.metrics()
    }

    /// `(resident, capacity)` for `device`, or `None` if it is not
    /// registered. Residents include components whose outbound transfer has
    /// not finished `prepare`; reserved incomers are excluded. Stable only
    /// at quiescent points.
    pub fn device_occupancy(&self, device: DeviceId) -> Option<(usize, usize)> {
        self.coordinator.device_occupancy(device)
    }
}
