//! Store configuration.
//!
//! Configuration is plain data, usually built in code or loaded from TOML:
//!
//! ```toml
//! run_mode = "stage"
//!
//! [backend]
//! kind = "persistent"
//! path = "./data/store"
//!
//! [backend.options]
//! sync_on_write = false
//! max_log_size = 1048576
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreResult, ValidationError};
use crate::logging::RunMode;

/// Configuration for persistent storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    /// Whether to fsync after every write (slower but safer).
    pub sync_on_write: bool,
    /// Bytes a class log may grow past its last snapshot before a write
    /// triggers compaction.
    pub max_log_size: u64,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_log_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl PersistentConfig {
    const MIN_LOG_SIZE: u64 = 4 * 1024; // 4 KiB minimum to avoid compacting on every write

    /// Checks limits.
    ///
    /// # Errors
    /// `InvalidConfig` if `max_log_size` is below 4 KiB.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.max_log_size < Self::MIN_LOG_SIZE {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "max_log_size must be at least {} bytes (got {})",
                    Self::MIN_LOG_SIZE,
                    self.max_log_size
                ),
            });
        }
        Ok(self)
    }
}

/// Which backend the store uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Keep everything in process memory.
    #[default]
    Memory,
    /// Durable per-class logs under `path`.
    Persistent {
        /// Store directory; created on open.
        path: PathBuf,
        /// Log tuning.
        #[serde(default)]
        options: PersistentConfig,
    },
}

/// Top-level store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Where records live.
    pub backend: BackendConfig,
    /// Log verbosity.
    pub run_mode: RunMode,
}

impl StoreConfig {
    /// In-memory store with the default run mode.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Persistent store at `path` with default options.
    #[must_use]
    pub fn persistent(path: impl AsRef<Path>) -> Self {
        Self {
            backend: BackendConfig::Persistent {
                path: path.as_ref().to_path_buf(),
                options: PersistentConfig::default(),
            },
            run_mode: RunMode::default(),
        }
    }

    /// Sets the run mode.
    #[must_use]
    pub const fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    /// `InvalidConfig` on syntax errors, unknown values, or bad limits.
    pub fn from_toml_str(source: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        Ok(config.validate()?)
    }

    /// Validates nested settings.
    ///
    /// # Errors
    /// See [`PersistentConfig::validate`].
    pub fn validate(self) -> Result<Self, ValidationError> {
        let backend = match self.backend {
            BackendConfig::Persistent { path, options } => BackendConfig::Persistent {
                path,
                options: options.validate()?,
            },
            other => other,
        };
        Ok(Self { backend, ..self })
    }
}
