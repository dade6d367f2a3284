//! System configuration: device capacities and initial component placement.
//!
//! Configuration is a trusted, checked input: [`crate::StorageSystem::new`]
//! validates it once and construction fails with a typed [`ConfigError`]
//! before any coordination state exists. After construction the device set
//! and capacities are immutable.

use ahash::AHashMap;

use crate::errors::ConfigError;
use crate::ids::{ComponentId, DeviceId};

/// Device capacities plus the initial placement of components.
///
/// Built with the `with_*` helpers or from pre-assembled maps:
///
/// ```
/// use relocator_rs::{ComponentId, DeviceId, SystemConfig};
///
/// let config = SystemConfig::new()
///     .with_device(DeviceId::from_raw(1), 2)
///     .with_device(DeviceId::from_raw(2), 1)
///     .with_component(ComponentId::from_raw(10), DeviceId::from_raw(1));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Default)]
pub struct SystemConfig {
    capacities: AHashMap<DeviceId, usize>,
    placement: AHashMap<ComponentId, DeviceId>,
}

impl SystemConfig {
    /// Empty configuration. Invalid until at least one device and one
    /// component are added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble from existing maps.
    #[must_use]
    pub fn from_maps(
        capacities: AHashMap<DeviceId, usize>,
        placement: AHashMap<ComponentId, DeviceId>,
    ) -> Self {
        Self {
            capacities,
            placement,
        }
    }

    /// Register a device with the given slot capacity.
    ///
    /// Registering the same device twice keeps the last capacity.
    #[must_use]
    pub fn with_device(mut self, device: DeviceId, capacity: usize) -> Self {
        self.capacities.insert(device, capacity);
        self
    }

    /// Place a component on a device at startup.
    #[must_use]
    pub fn with_component(mut self, component: ComponentId, device: DeviceId) -> Self {
        self.placement.insert(component, device);
        self
    }

    /// Registered devices and their capacities.
    #[inline]
    pub fn capacities(&self) -> &AHashMap<DeviceId, usize> {
        &self.capacities
    }

    /// Initial component placement.
    #[inline]
    pub fn placement(&self) -> &AHashMap<ComponentId, DeviceId> {
        &self.placement
    }

    /// Check the configuration.
    ///
    /// Rules: both maps non-empty, every capacity positive, every placement
    /// on a registered device, and no device filled past its capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacities.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        if self.placement.is_empty() {
            return Err(ConfigError::NoComponents);
        }
        for (&device, &capacity) in &self.capacities {
            if capacity == 0 {
                return Err(ConfigError::ZeroCapacity { device });
            }
        }

        let mut occupancy: AHashMap<DeviceId, usize> = AHashMap::new();
        for (&component, &device) in &self.placement {
            if !self.capacities.contains_key(&device) {
                return Err(ConfigError::UnknownDevice { component, device });
            }
            *occupancy.entry(device).or_insert(0) += 1;
        }
        for (&device, &placed) in &occupancy {
            let capacity = self.capacities[&device];
            if placed > capacity {
                return Err(ConfigError::DeviceOverfull {
                    device,
                    capacity,
                    placed,
                });
            }
        }
        Ok(())
    }
}
