//! Admission and slot-reservation coordinator for concurrent component
//! relocation across bounded-capacity devices.
//!
//! User threads submit transfers (ADD, MOVE, REMOVE of one component) to a
//! [`StorageSystem`]; each call runs the transfer's two-phase payload
//! (`prepare`, then `perform`) to completion on the calling thread. The
//! crate's job is everything in between: deciding under a single fair mutex
//! whether a transfer may begin, whose vacated slot it inherits, and the
//! exact moments its phases may run without violating capacity or ordering
//! guarantees.
//!
//! High-level flow of one `execute` call:
//! 1) Validate and classify under the coordinator mutex; reject with a typed
//!    error before any side effect.
//! 2) Admit: take a free slot, claim a vacating component's slot, join a
//!    detected reservation cycle, or park FIFO in the destination's wait
//!    queue until a waker hands over the critical section.
//! 3) Run `prepare`; a MOVE/REMOVE then releases its old slot to the next
//!    claimant or queued waiter.
//! 4) Run `perform`, gated so it never starts before the `prepare` of the
//!    transfer whose slot it inherited has returned.
//!
//! A progress guarantee worth naming: when pending moves form a closed chain
//! with no free slot anywhere (a can only move where b is, b only where a
//! is), the coordinator detects the cycle and admits all of its members as
//! one atomic burst of critical-section handoffs.

pub mod config;
pub mod errors;
pub mod ids;
pub mod metrics;
pub mod transfer;

mod coordinator;
mod sync;
mod system;
mod validate;

pub use config::SystemConfig;
pub use errors::{ConfigError, TransferError};
pub use ids::{ComponentId, DeviceId};
pub use metrics::MetricsSnapshot;
pub use system::StorageSystem;
pub use transfer::{ComponentTransfer, TransferFn, TransferKind};
