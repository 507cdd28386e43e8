//! Node-Local Worker Queues
//!
//! A reusable primitive for linearizing in-memory mutations on one node.
//!
//! ## Model
//! - **Producers** enqueue from any thread without blocking.
//! - **One background task per worker type** wakes on a fixed tick, drains
//!   everything queued and processes the items in FIFO order.
//! - **Failures are isolated**: an error or panic in one item is logged and the
//!   item dropped; the loop keeps going.
//!
//! ## Submodules
//! - **`queue`**: the `QueueWorker` trait and the `WorkerQueue` loop.
//! - **`hub`**: `WorkerHub`, which keeps one queue per worker type.

pub mod hub;
pub mod queue;

#[cfg(test)]
mod tests;
