//! Web Farm Synchronization Library
//!
//! Several application nodes share one database but each keeps private
//! in-memory caches. This crate keeps those caches consistent: a node that
//! changes shared state emits a typed cluster task, and every other node
//! executes it against its own caches.
//!
//! ## Architecture Modules
//! - **`farm`**: task registry, creation gate, dispatcher, GroupData optimizer,
//!   the shared task log contract and its producer/consumer sides.
//! - **`worker`**: timer-driven single-consumer queues that linearize in-memory
//!   mutations on one node, one queue per worker type.
//! - **`sessions`**: the session cache, a worker-queue specialization keeping
//!   per-site session indices consistent under concurrent producers.
//! - **`tasks`**: the built-in Data, Storage and System task families.
//! - **`node`**: node-local caches and the context tasks execute against.
//! - **`config`** / **`error`**: node configuration and error types.

pub mod config;
pub mod error;
pub mod farm;
pub mod node;
pub mod sessions;
pub mod tasks;
pub mod worker;
