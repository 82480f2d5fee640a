/// Defines the severity levels for log messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// Very fine-grained events, per-frame noise included.
    Trace,
    /// Events that are most useful while debugging a transfer.
    Debug,
    /// Coarse-grained progress of the application.
    Info,
    /// Potentially harmful situations.
    Warn,
    /// Errors that still allow the application to continue running.
    Error,
}

impl LogLevel {
    /// Fixed-width label used when formatting log lines.
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO ",
            LogLevel::Warn => "WARN ",
            LogLevel::Error => "ERROR",
        }
    }
}
