//! Node-local state: the private caches a web farm node keeps and the context
//! handed to every executing task.

pub mod caches;
pub mod context;
