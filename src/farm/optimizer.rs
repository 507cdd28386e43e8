//! GroupData optimization: identical pending tasks collapse into the first one.

use super::registry::TaskRegistry;
use super::types::*;

use std::collections::HashSet;

/// Removes later duplicates of GroupData tasks, keeping the original order.
///
/// Two tasks are duplicates when type, target and text data match. Tasks that
/// carry binary data or a file path are never merged.
pub fn optimize(registry: &TaskRegistry, tasks: Vec<TaskInstance>) -> Vec<TaskInstance> {
    let before = tasks.len();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();

    let optimized: Vec<TaskInstance> = tasks
        .into_iter()
        .filter(|task| {
            if registry.get_optimization(&task.type_id) != OptimizationKind::GroupData
                || task.binary_data.is_some()
                || task.file_path.is_some()
            {
                return true;
            }
            seen.insert((
                task.type_id.clone(),
                task.target.clone(),
                task.text().unwrap_or("").to_string(),
            ))
        })
        .collect();

    if optimized.len() < before {
        tracing::debug!("Grouped {} pending tasks into {}", before, optimized.len());
    }

    optimized
}
