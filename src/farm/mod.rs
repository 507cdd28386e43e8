//! Web Farm Task Module
//!
//! Lets any subsystem declare a typed, serializable "cluster task" and keeps
//! every node's private caches in step with changes made elsewhere.
//!
//! ## Lifecycle
//! 1. **Registration**: each task type is registered once at start-up in the
//!    `TaskRegistry` with its memory-only flag and optimization policy.
//! 2. **Creation**: the emitting node asks the `CreationGate` whether the task is
//!    worth creating (size, storage, switches, type-specific condition).
//! 3. **Persistence**: accepted tasks are appended to the shared `TaskLog`,
//!    optionally grouped first (`GroupData`).
//! 4. **Execution**: every other node's `TaskProcessor` reads the log and the
//!    `TaskDispatcher` rebuilds and runs each payload. Delivery is at-least-once,
//!    so payloads must be idempotent.
//!
//! ## Submodules
//! - **`types`**: task instances, type configs, log entries.
//! - **`registry`**: the `ClusterTask` contract and the type registry.
//! - **`gate`**: creation checks and the global task switches.
//! - **`dispatcher`**: reconstruct-and-execute on the receiving node.
//! - **`optimizer`**: GroupData merging of pending tasks.
//! - **`log`**: the shared log contract and an in-memory implementation.
//! - **`emitter`** / **`processor`**: producer and consumer sides of the log.
//! - **`protocol`** / **`handlers`**: HTTP surface of a node.

pub mod dispatcher;
pub mod emitter;
pub mod gate;
pub mod handlers;
pub mod log;
pub mod optimizer;
pub mod processor;
pub mod protocol;
pub mod registry;
pub mod types;
