//! Conditional logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! Each module that uses them declares its own switch:
//! ```rust
//! const ENABLE_LOGS: bool = true;
//!
//! use shopreel::{log_info, log_warn, log_error};
//! ```
//! The macros are exported at the crate root.

/// Info-level logging, skipped when the calling module sets
/// `ENABLE_LOGS` to false.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level logging, skipped when the calling module sets
/// `ENABLE_LOGS` to false.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level logging, skipped when the calling module sets
/// `ENABLE_LOGS` to false.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
