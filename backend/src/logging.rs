//! Console logging and panic reporting.
//!
//! `init_tracing` installs the `tracing` subscriber (stderr, `RUST_LOG`
//! filter with a caller-chosen default level). `install_panic_hook` routes panics through
//! `tracing` and writes a crash log to the config directory before the
//! default hook runs.

use std::any::Any;
use std::fs;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

use crate::paths;

const CRASH_LOG_FILE: &str = "crash.log";

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Install the panic hook. Call once at startup.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let details = format_crash_details(panic_info);
        tracing::error!("[CrashHandler] {}", details.lines().next().unwrap_or_default());

        match write_crash_log(&paths::get_config_dir(), &details) {
            Some(path) => tracing::error!("[CrashHandler] Crash log written to {:?}", path),
            None => tracing::error!("[CrashHandler] Could not write crash log"),
        }

        default_hook(panic_info);
    }));
}

/// Message carried by a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "(unknown panic payload)".to_string()
    }
}

fn format_crash_details(panic_info: &PanicHookInfo) -> String {
    let location = panic_info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "unknown location".to_string());

    format!(
        "Panic at {}: {}\nTime: {}\nVersion: {}\nOS: {} {}\n\n{}",
        location,
        panic_message(panic_info.payload()),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
        std::backtrace::Backtrace::force_capture()
    )
}

/// Write `details` to `<dir>/crash.log`, returning the path on success
fn write_crash_log(dir: &Path, details: &str) -> Option<PathBuf> {
    if let Err(e) = fs::create_dir_all(dir) {
        eprintln!("[CrashHandler] Failed to create config directory {:?}: {}", dir, e);
        return None;
    }

    let log_path = dir.join(CRASH_LOG_FILE);
    match fs::write(&log_path, details) {
        Ok(()) => Some(log_path),
        Err(e) => {
            eprintln!("[CrashHandler] Failed to write crash log {:?}: {}", log_path, e);
            None
        }
    }
}
