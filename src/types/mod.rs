pub mod entity;
pub mod error;
pub mod progress;
pub mod utils;

pub use entity::*;
pub use error::{ErrorKind, LedgerError, Result, ResultExt};
pub use progress::*;
pub use utils::{format_coverage, ratio};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Type-safe wrapper for verification run sequence numbers
///
/// Prevents accidental mixing of run ids with entry counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RunId(u64);

impl RunId {
    /// Sentinel for driver reports made before any verification run exists
    pub const NONE: Self = Self(0);

    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for RunId {
    fn from(seq: u64) -> Self {
        Self(seq)
    }
}
