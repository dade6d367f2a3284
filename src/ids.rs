//! Opaque identifiers for devices and components.
//!
//! Both ids are thin `u64` newtypes. The coordinator never interprets the
//! value; callers typically derive them from their own inventory (volume
//! serials, content hashes, counters).

use std::fmt;

/// Identifier for a bounded-capacity storage device.
///
/// Devices are registered once at system construction and never change.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(u64);

impl DeviceId {
    /// Create a device id from a raw value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        DeviceId(raw)
    }

    /// Get the raw id value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-{}", self.0)
    }
}

/// Identifier for an addressable unit of data placed on exactly one device.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Create a component id from a raw value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        ComponentId(raw)
    }

    /// Get the raw id value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component-{}", self.0)
    }
}

const _: () = {
    assert!(std::mem::size_of::<DeviceId>() == 8);
    assert!(std::mem::size_of::<ComponentId>() == 8);
};
