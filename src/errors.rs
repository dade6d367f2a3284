//! Error types for transfer admission and system construction.
//!
//! Errors are split by lifecycle stage: `ConfigError` covers construction-time
//! validation, `TransferError` covers rejection of a submitted transfer. Both
//! are `#[non_exhaustive]`; consumers should keep a fallback match arm.
//!
//! Every `TransferError` is raised from validation, under the coordinator
//! mutex but before any state mutation: a rejected transfer has no side
//! effects and neither of its callbacks runs. Invariant breaches *inside* the
//! coordinator are programming errors and panic instead of surfacing here.

use std::error::Error;
use std::fmt;

use crate::ids::{ComponentId, DeviceId};

/// Rejection of a submitted transfer.
///
/// The variants mirror the admission checks, in the order they are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransferError {
    /// Both source and destination are absent; the transfer describes nothing.
    IllegalTransferType { component: ComponentId },
    /// A named source or destination device is not registered.
    DeviceDoesNotExist { device: DeviceId },
    /// ADD of a component the system already tracks. `device` is where the
    /// component resides (its in-flight destination if its own ADD has not
    /// completed yet).
    ComponentAlreadyExists {
        component: ComponentId,
        device: DeviceId,
    },
    /// The component is unknown, or resides on a device other than the
    /// claimed source.
    ComponentDoesNotExist {
        component: ComponentId,
        device: DeviceId,
    },
    /// The destination equals the component's current device.
    ComponentDoesNotNeedTransfer {
        component: ComponentId,
        device: DeviceId,
    },
    /// Another transfer for this component is already in progress.
    ComponentIsBeingOperatedOn { component: ComponentId },
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalTransferType { component } => {
                write!(f, "{component}: neither source nor destination given")
            }
            Self::DeviceDoesNotExist { device } => {
                write!(f, "{device} is not registered")
            }
            Self::ComponentAlreadyExists { component, device } => {
                write!(f, "{component} already exists on {device}")
            }
            Self::ComponentDoesNotExist { component, device } => {
                write!(f, "{component} does not exist on {device}")
            }
            Self::ComponentDoesNotNeedTransfer { component, device } => {
                write!(f, "{component} is already on {device}")
            }
            Self::ComponentIsBeingOperatedOn { component } => {
                write!(f, "{component} is being operated on by another transfer")
            }
        }
    }
}

impl Error for TransferError {}

/// Rejection of a system configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The device map is empty.
    NoDevices,
    /// The initial placement is empty.
    NoComponents,
    /// A device was declared with capacity zero.
    ZeroCapacity { device: DeviceId },
    /// The initial placement names an unregistered device.
    UnknownDevice {
        component: ComponentId,
        device: DeviceId,
    },
    /// The initial placement puts more components on a device than it holds.
    DeviceOverfull {
        device: DeviceId,
        capacity: usize,
        placed: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevices => write!(f, "no devices configured"),
            Self::NoComponents => write!(f, "no initial component placement configured"),
            Self::ZeroCapacity { device } => {
                write!(f, "{device} has capacity 0")
            }
            Self::UnknownDevice { component, device } => {
                write!(f, "{component} placed on unregistered {device}")
            }
            Self::DeviceOverfull {
                device,
                capacity,
                placed,
            } => {
                write!(
                    f,
                    "{device} holds {placed} components but has capacity {capacity}"
                )
            }
        }
    }
}

impl Error for ConfigError {}
