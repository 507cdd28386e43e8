//! Built-in Cluster Task Families
//!
//! - **`data`**: object dictionary invalidation.
//! - **`storage`**: file storage synchronization.
//! - **`system`**: cache resets, session sync, site rename.
//!
//! Each family exposes its stable type ids as constants; `register_all` wires
//! them into a registry at start-up.

pub mod data;
pub mod storage;
pub mod system;

use crate::error::FarmResult;
use crate::farm::registry::{TaskRegistration, TaskRegistry};
use crate::farm::types::OptimizationKind;

/// Registers every built-in task type.
pub fn register_all(registry: &TaskRegistry) -> FarmResult<()> {
    registry.register::<data::InvalidateObjectTask>(
        data::INVALIDATE_OBJECT,
        true,
        OptimizationKind::GroupData,
    )?;
    registry.register::<data::ClearHashtablesTask>(
        data::CLEAR_HASHTABLES,
        true,
        OptimizationKind::GroupData,
    )?;

    registry.register::<storage::UpdateFileTask>(storage::UPDATE_FILE, false, OptimizationKind::None)?;
    registry.register::<storage::DeleteFileTask>(storage::DELETE_FILE, false, OptimizationKind::None)?;

    registry.register_with(
        TaskRegistration::<system::ClearCacheTask>::new(system::CLEAR_CACHE)
            .memory_task(true)
            .optimization(OptimizationKind::GroupData),
    )?;
    registry.register::<system::SyncSessionTask>(system::SYNC_SESSION, true, OptimizationKind::None)?;
    registry.register::<system::RenameSiteTask>(system::RENAME_SITE, true, OptimizationKind::None)?;

    Ok(())
}
