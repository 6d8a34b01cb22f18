//! Crate-wide error type.
//!
//! One variant family per error kind the design distinguishes: malformed
//! input aborts before rendering starts, numerical failures are normally
//! counted rather than propagated (see `stats::FrameStats::numeric_errors`)
//! and only surfaced as an `Error` when a whole frame must be abandoned,
//! budget exhaustion is not an error at all but shares this type so the
//! driver can return it through the same `Result`, and programming errors
//! mark conditions the type system could not rule out.

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("input error: {0}")]
    Input(String),

    #[error("numerical error at pixel ({x}, {y}): {reason}")]
    Numerical { x: u32, y: u32, reason: String },

    #[error("budget reached: {0}")]
    Budget(BudgetKind),

    #[error("programming error: {0}")]
    Programming(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetKind {
    Samples,
    Seconds,
}

impl std::fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetKind::Samples => write!(f, "sample budget"),
            BudgetKind::Seconds => write!(f, "wall-clock budget"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Raises a [`Error::Programming`] in release builds and panics with the
/// located message in debug builds, matching "abort with a located
/// assertion" without taking down a batch render process in production.
#[macro_export]
macro_rules! programming_error {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        if cfg!(debug_assertions) {
            panic!("{}", msg);
        } else {
            return Err($crate::core::error::Error::Programming(msg));
        }
    }};
}

/// Maps an [`Error`] onto the exit codes from the CLI surface: 0 success,
/// 1 usage error, 2 I/O error, 3 numerical error above threshold.
pub fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Input(_) => 1,
        Error::Io(_) => 2,
        Error::Numerical { .. } => 3,
        Error::Budget(_) => 0,
        Error::Programming(_) => 70, // EX_SOFTWARE, matches "bug in the core"
    }
}
