//! Session Cache Module
//!
//! Keeps three linked per-site indices (all sessions, authenticated users,
//! hidden users) consistent while many request threads report session changes
//! at once.
//!
//! ## Design
//! - **Single writer**: every mutation is a `SessionsCachingAction` applied by the
//!   `sessions` worker queue, so the indices are only ever written by one task.
//! - **Concurrent readers**: queries read the site-keyed `DashMap` directly and
//!   materialize results before returning.
//! - **Removal de-duplication**: a second removal for a user whose removal is
//!   still queued is dropped.
//!
//! ## Submodules
//! - **`types`**: `SessionRecord`, `SessionsCachingAction`, `SessionsInfo`.
//! - **`worker`**: `SessionCacheWorker`, the queue worker applying actions.
//! - **`cache`**: `SessionCache`, the public handle.

pub mod cache;
pub mod types;
pub mod worker;

#[cfg(test)]
mod tests;
