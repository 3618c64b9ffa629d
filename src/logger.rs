//! Console diagnostics with colored prefixes.
//!
//! Reports go to stdout; everything here goes to stderr so `--json` output
//! stays machine-readable.
//!
//! ```ignore
//! log!("scan"; "indexing {} files", count);
//! warn!("link"; "possible bad image link `{}` in `{}`", raw, file.display());
//! debug!("resolve"; "`{}` is out of docset", raw);
//! ```

use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);
static QUIET: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

pub fn set_quiet(q: bool) {
    QUIET.store(q, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::SeqCst)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Debug,
}

/// Progress message, suppressed by `--quiet`.
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        if !$crate::logger::is_quiet() {
            $crate::logger::emit($crate::logger::Level::Info, $module, &format!($($arg)*))
        }
    }};
}

/// Recoverable problem (bad link, failed delete). Always printed.
#[macro_export]
macro_rules! warn {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::emit($crate::logger::Level::Warn, $module, &format!($($arg)*))
    }};
}

/// Only shown with `--verbose`.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::emit($crate::logger::Level::Debug, $module, &format!($($arg)*))
        }
    }};
}

pub fn emit(level: Level, module: &str, message: &str) {
    eprintln!("{} {}", prefix(level, module), message);
}

fn prefix(level: Level, module: &str) -> String {
    let tag = format!("[{module}]");
    match level {
        Level::Info => tag.cyan().bold().to_string(),
        Level::Warn => tag.yellow().bold().to_string(),
        Level::Debug => tag.dimmed().to_string(),
    }
}
