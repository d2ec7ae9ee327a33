//! Kernel configuration
//!
//! Sizing and timing constants, loadable from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Time;

pub const DEFAULT_MAX_PROCESSES: usize = 10;
pub const DEFAULT_QUANTUM: Time = 40;
pub const DEFAULT_INITIAL_SEMAPHORE_VALUE: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Process table capacity
    pub max_processes: usize,

    /// Time slice before a running process is preempted
    pub quantum: Time,

    /// Starting value of every semaphore
    pub initial_semaphore_value: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_processes: DEFAULT_MAX_PROCESSES,
            quantum: DEFAULT_QUANTUM,
            initial_semaphore_value: DEFAULT_INITIAL_SEMAPHORE_VALUE,
        }
    }
}

impl KernelConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: KernelConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Process 0 exists from boot.
        if self.max_processes == 0 {
            return Err(ConfigError::Invalid("max_processes must be at least 1".into()));
        }

        if self.quantum == 0 {
            return Err(ConfigError::Invalid("quantum must be at least 1".into()));
        }

        Ok(())
    }
}
