//! Named in-process dictionaries (object hashtables, settings, metadata) that
//! cluster tasks invalidate.

use dashmap::DashMap;
use serde_json::Value;

#[derive(Default)]
pub struct LocalCaches {
    /// Structure: `Table name -> Key -> Value`.
    tables: DashMap<String, DashMap<String, Value>>,
}

impl LocalCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, table: &str, key: &str, value: Value) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn get(&self, table: &str, key: &str) -> Option<Value> {
        self.tables
            .get(table)
            .and_then(|entries| entries.get(key).map(|entry| entry.value().clone()))
    }

    pub fn remove(&self, table: &str, key: &str) -> bool {
        self.tables
            .get(table)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Drops a whole table. Returns whether it existed.
    pub fn clear_table(&self, table: &str) -> bool {
        self.tables.remove(table).is_some()
    }

    /// Drops every table. Returns how many there were.
    pub fn clear_all(&self) -> usize {
        let count = self.tables.len();
        self.tables.clear();
        count
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.tables.get(table).map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}
