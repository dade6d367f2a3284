//! Transfer classification.
//!
//! Runs under the coordinator mutex, immediately after acquisition and
//! before any mutation. The check order is part of the contract: an ADD of
//! a known component reports `ComponentAlreadyExists` even if that component
//! is also mid-operation, because existence is checked first.

use crate::coordinator::state::CoordState;
use crate::errors::TransferError;
use crate::ids::{ComponentId, DeviceId};
use crate::transfer::TransferKind;

/// Classify a transfer as ADD / MOVE / REMOVE or reject it.
pub(crate) fn classify(
    state: &CoordState,
    component: ComponentId,
    source: Option<DeviceId>,
    destination: Option<DeviceId>,
) -> Result<TransferKind, TransferError> {
    if source.is_none() && destination.is_none() {
        return Err(TransferError::IllegalTransferType { component });
    }

    for named in [source, destination].into_iter().flatten() {
        if !state.has_device(named) {
            return Err(TransferError::DeviceDoesNotExist { device: named });
        }
    }

    let known = state.key_of(component);

    if source.is_none() {
        if let Some(key) = known {
            let comp = state.component(key);
            // A component whose own ADD is still in flight has no current
            // device yet; report the device it is bound for.
            let device = comp
                .current_device
                .or(comp.destination_device)
                .expect("tracked component has no device at all");
            return Err(TransferError::ComponentAlreadyExists { component, device });
        }
    }

    if let Some(claimed) = source {
        let resides_there = known
            .map(|key| state.component(key).current_device == Some(claimed))
            .unwrap_or(false);
        if !resides_there {
            return Err(TransferError::ComponentDoesNotExist {
                component,
                device: claimed,
            });
        }
    }

    if let (Some(wanted), Some(key)) = (destination, known) {
        if state.component(key).current_device == Some(wanted) {
            return Err(TransferError::ComponentDoesNotNeedTransfer {
                component,
                device: wanted,
            });
        }
    }

    if let Some(key) = known {
        if state.component(key).is_operated_on {
            return Err(TransferError::ComponentIsBeingOperatedOn { component });
        }
    }

    Ok(match (source, destination) {
        (None, Some(_)) => TransferKind::Add,
        (Some(_), None) => TransferKind::Remove,
        (Some(_), Some(_)) => TransferKind::Move,
        (None, None) => unreachable!("rejected above"),
    })
}
