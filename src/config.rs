//! Node Configuration
//!
//! Defaults, optionally overlaid by a JSON file (`--config`), then by
//! individual command-line flags.

use crate::worker::queue::DEFAULT_TICK;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Cluster-wide file-sync ceiling for binary task payloads.
pub const DEFAULT_MAX_BINARY_SIZE: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FarmConfig {
    /// HTTP address of the node's task endpoints.
    pub bind_addr: SocketAddr,
    pub max_binary_size: usize,
    /// Storage roots shared by all nodes; files there are never synchronized.
    pub shared_storage_roots: Vec<PathBuf>,
    /// Root of this node's private file storage.
    pub file_root: PathBuf,
    pub worker_tick_ms: u64,
    pub poll_interval_ms: u64,
    /// How often buffered tasks are grouped and written to the log.
    pub flush_interval_ms: u64,
    pub poll_batch_size: usize,
    pub shutdown_grace_ms: u64,
    pub allow_tasks: bool,
    pub allow_anonymous_tasks: bool,
    pub log_level: String,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 6000)),
            max_binary_size: DEFAULT_MAX_BINARY_SIZE,
            shared_storage_roots: Vec::new(),
            file_root: PathBuf::from("./files"),
            worker_tick_ms: DEFAULT_TICK.as_millis() as u64,
            poll_interval_ms: 1000,
            flush_interval_ms: 500,
            poll_batch_size: 100,
            shutdown_grace_ms: 5000,
            allow_tasks: true,
            allow_anonymous_tasks: false,
            log_level: "INFO".to_string(),
        }
    }
}

impl FarmConfig {
    /// Builds the configuration from `std::env::args()`-style arguments
    /// (program name first).
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = match find_flag(args, "--config") {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" => {
                    value_of(args, i)?;
                    i += 2;
                }
                "--bind" => {
                    config.bind_addr = value_of(args, i)?.parse()?;
                    i += 2;
                }
                "--max-binary-size" => {
                    config.max_binary_size = value_of(args, i)?.parse()?;
                    i += 2;
                }
                "--shared-root" => {
                    config.shared_storage_roots.push(PathBuf::from(value_of(args, i)?));
                    i += 2;
                }
                "--file-root" => {
                    config.file_root = PathBuf::from(value_of(args, i)?);
                    i += 2;
                }
                "--tick-ms" => {
                    config.worker_tick_ms = value_of(args, i)?.parse()?;
                    i += 2;
                }
                "--poll-ms" => {
                    config.poll_interval_ms = value_of(args, i)?.parse()?;
                    i += 2;
                }
                "--flush-ms" => {
                    config.flush_interval_ms = value_of(args, i)?.parse()?;
                    i += 2;
                }
                "--grace-ms" => {
                    config.shutdown_grace_ms = value_of(args, i)?.parse()?;
                    i += 2;
                }
                "--log-level" => {
                    config.log_level = value_of(args, i)?.to_string();
                    i += 2;
                }
                "--allow-anonymous" => {
                    config.allow_anonymous_tasks = true;
                    i += 1;
                }
                "--disable-tasks" => {
                    config.allow_tasks = false;
                    i += 1;
                }
                _ => {
                    i += 1;
                }
            }
        }

        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read config file {}: {}", path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn worker_tick(&self) -> Duration {
        Duration::from_millis(self.worker_tick_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

fn value_of(args: &[String], i: usize) -> Result<&str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{} requires a value", args[i]))
}

fn find_flag(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1).cloned())
}
