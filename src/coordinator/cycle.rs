//! Cycle detection over the wait-for graph of pending moves.
//!
//! A move into a fully reserved device can still make progress if the
//! pending moves form a closed chain: every member vacates a slot that the
//! previous member inherits. The graph searched here has devices as
//! vertices; each component queued in some device's wait queue contributes
//! an edge from its current device to the device it waits on (followed here
//! in reverse, from the searcher's residence toward its destination).
//!
//! Search order is contractual: children are tried in wait-queue insertion
//! order, so the earliest eligible waiters form the cycle that is found.
//! Devices are visited at most once per search, bounding cost at O(V+E).
//!
//! The returned path lists the terminal member first and the searcher last;
//! admission consumes it tail-first, each member handing the remainder to
//! the next one it wakes.

use ahash::AHashSet;

use crate::ids::DeviceId;

use super::state::{ComponentKey, CoordState};

/// Search for a reservation cycle rooted at `searcher`, a move whose
/// destination is fully reserved. Returns the cycle members, terminal
/// first, `searcher` last; `None` if no closed chain exists yet.
pub(crate) fn find_cycle(state: &CoordState, searcher: ComponentKey) -> Option<Vec<ComponentKey>> {
    let start = state
        .component(searcher)
        .current_device
        .expect("cycle search requires a resident mover");
    let target = state
        .component(searcher)
        .destination_device
        .expect("cycle search requires a destination");
    debug_assert_ne!(start, target, "self-move admitted into cycle search");

    let mut visited = AHashSet::new();
    let mut path = search(state, start, target, &mut visited)?;
    path.push(searcher);
    Some(path)
}

fn search(
    state: &CoordState,
    device: DeviceId,
    target: DeviceId,
    visited: &mut AHashSet<DeviceId>,
) -> Option<Vec<ComponentKey>> {
    visited.insert(device);

    for &waiter in &state.device(device).waiting {
        // ADD waiters reside nowhere and contribute no edge.
        let Some(origin) = state.component(waiter).current_device else {
            continue;
        };
        if origin == target {
            // This waiter closes the chain back to the searcher's
            // destination; it becomes the terminal member.
            return Some(vec![waiter]);
        }
        if visited.contains(&origin) {
            continue;
        }
        if let Some(mut path) = search(state, origin, target, visited) {
            path.push(waiter);
            return Some(path);
        }
    }
    None
}
