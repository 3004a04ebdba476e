//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! The background loops (heartbeat, presence, recorder ticker) log on every
//! tick, so each of those modules can silence itself without touching the
//! global `RUST_LOG` filter:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_warn};
//!
//! log_debug!("[session] heartbeat for {}", user_id);
//! ```

/// `log::debug!` when the calling module's `ENABLE_LOGS` is `true`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// `log::info!` when the calling module's `ENABLE_LOGS` is `true`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::warn!` when the calling module's `ENABLE_LOGS` is `true`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Errors are reported regardless of `ENABLE_LOGS`: a swallowed remote
/// failure must always leave a trace.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}
