//! Injected logging capability for the conversion service.
//!
//! [`LogDiagnostics`] forwards to the `log` facade, so whatever logger the
//! host process installs (the `md2pdf` binary uses `env_logger`) receives the
//! messages. Tests swap in [`MemoryDiagnostics`] to assert on what was reported.

use std::sync::Mutex;

/// Severity of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

pub trait Diagnostics: Send + Sync {
    fn debug(&self, msg: &str);
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Forwards every message to the `log` crate under the `md2pdf` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn debug(&self, msg: &str) {
        log::debug!(target: "md2pdf", "{msg}");
    }

    fn info(&self, msg: &str) {
        log::info!(target: "md2pdf", "{msg}");
    }

    fn warn(&self, msg: &str) {
        log::warn!(target: "md2pdf", "{msg}");
    }

    fn error(&self, msg: &str) {
        log::error!(target: "md2pdf", "{msg}");
    }
}

/// Keeps messages in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    records: Mutex<Vec<(Level, String)>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Messages recorded at exactly `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    fn push(&self, level: Level, msg: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((level, msg.to_string()));
        }
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn debug(&self, msg: &str) {
        self.push(Level::Debug, msg);
    }

    fn info(&self, msg: &str) {
        self.push(Level::Info, msg);
    }

    fn warn(&self, msg: &str) {
        self.push(Level::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.push(Level::Error, msg);
    }
}

impl<D: Diagnostics + ?Sized> Diagnostics for std::sync::Arc<D> {
    fn debug(&self, msg: &str) {
        (**self).debug(msg)
    }

    fn info(&self, msg: &str) {
        (**self).info(msg)
    }

    fn warn(&self, msg: &str) {
        (**self).warn(msg)
    }

    fn error(&self, msg: &str) {
        (**self).error(msg)
    }
}
