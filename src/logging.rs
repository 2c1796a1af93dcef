//! Run modes and log output.
//!
//! The store, its backends, and the mailer report through `tracing`. How
//! much they report is decided by a [`RunMode`] handed to them at
//! construction, not by global state:
//!
//! | mode        | events emitted            |
//! |-------------|---------------------------|
//! | `benchmark` | debug, info, warn, error  |
//! | `debug`     | debug, info, warn, error  |
//! | `stage`     | info, warn, error         |
//! | `live`      | error                     |
//! | `silent`    | nothing                   |

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::error::{StoreError, StoreResult};

/// How verbose the store and its collaborators are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Same output as `Debug`, for timing runs.
    Benchmark,
    /// Per-operation detail.
    Debug,
    /// Lifecycle events and problems.
    Stage,
    /// Errors only.
    #[default]
    Live,
    /// No output.
    Silent,
}

impl RunMode {
    /// Most verbose level emitted in this mode.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Benchmark | Self::Debug => LevelFilter::DEBUG,
            Self::Stage => LevelFilter::INFO,
            Self::Live => LevelFilter::ERROR,
            Self::Silent => LevelFilter::OFF,
        }
    }

    /// Returns true if events at `level` are emitted in this mode.
    #[must_use]
    pub fn allows(self, level: Level) -> bool {
        level <= self.level_filter()
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Benchmark => "benchmark",
            Self::Debug => "debug",
            Self::Stage => "stage",
            Self::Live => "live",
            Self::Silent => "silent",
        };
        f.write_str(name)
    }
}

/// Emits a `tracing` event if the given run mode allows its level.
///
/// `inform!(mode, INFO, class = %name, "entity saved")`
macro_rules! inform {
    ($mode:expr, $level:ident, $($arg:tt)+) => {
        if $mode.allows(::tracing::Level::$level) {
            ::tracing::event!(::tracing::Level::$level, $($arg)+);
        }
    };
}
pub(crate) use inform;

/// Installs a global fmt subscriber for binaries and tests.
///
/// `RUST_LOG` takes precedence; otherwise the run mode's level is used.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init(mode: RunMode) -> StoreResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(mode.level_filter().to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| StoreError::internal(format!("failed to install log subscriber: {e}")))
}
