//! Blocking synchronization primitives for the coordinator.

mod semaphore;

pub(crate) use semaphore::Semaphore;
