/// Macro for prefixed status logging to stderr (only when stderr is a terminal).
///
/// Usage:
/// ```ignore
/// log_status!("jamf", "Dismissing notification {}", id);
/// log_status!("mist", "Downloading {} {}", name, version);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {
        if ::std::io::IsTerminal::is_terminal(&::std::io::stderr()) {
            eprintln!(concat!("[", $prefix, "] {}"), format_args!($($arg)*));
        }
    };
}

/// Debug logging to stderr, emitted when `$enabled` is true or the
/// `PKGSTEPS_DEBUG` variable is set in the process environment.
///
/// Usage:
/// ```ignore
/// log_debug!(env.get_bool("debug"), "Patch json is {}", patch);
/// ```
#[macro_export]
macro_rules! log_debug {
    ($enabled:expr, $($arg:tt)*) => {
        if $enabled || ::std::env::var_os("PKGSTEPS_DEBUG").is_some() {
            eprintln!("[debug] DEBUG - {}", format_args!($($arg)*));
        }
    };
}

pub mod core;

// Re-export everything from core for ergonomic library use
// Users can write `pkgsteps::env` instead of `pkgsteps::core::env`
pub use core::*;
