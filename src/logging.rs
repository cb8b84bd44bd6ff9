//! Installs the process-wide `tracing` subscriber. The writer is selected by
//! mode: a non-blocking file appender rooted at `log/blockchain.log` in
//! interactive mode, or stdout in server mode.
//!
//! The subscriber is installed once from `main`, which gets back an owned
//! [`WorkerGuard`] that it must keep alive for the life of the process —
//! dropping it flushes and stops the background writer thread.

use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_DIR: &str = "log";
const LOG_FILE: &str = "blockchain.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the subscriber and returns the guard that keeps its background
/// flush thread alive.
pub fn init(is_server_mode: bool) -> anyhow::Result<WorkerGuard> {
    if is_server_mode {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(writer)
            .init();
        Ok(guard)
    } else {
        fs::create_dir_all(LOG_DIR)?;
        let file_appender = tracing_appender::rolling::never(LOG_DIR, LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Ok(guard)
    }
}
