//! # Native Logging
//!
//! Receives log lines from the native library through its C callback and
//! hands them to a [`LogSink`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          LOG CALLBACK PATH                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  libotto ──► log_trampoline (extern "C")                                │
//! │                 │  user_data = *const Arc<dyn LogSink>                  │
//! │                 │  C strings → lossy UTF-8                              │
//! │                 │  panics caught, never unwound into C                  │
//! │                 ▼                                                       │
//! │            LogSink::log(&LogRecord)                                     │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │            TracingLogSink ──► tracing (target "otto::native")           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sink is owned by the [`Instance`](crate::Instance) it was registered
//! with and stays alive until that instance is dropped.

use std::fmt;
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::ffi::lossy_string;

/// Severity of a native log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug output (1)
    Debug,
    /// Informational (2)
    Info,
    /// Warning (3)
    Warn,
    /// Error (4)
    Error,
    /// A level this binding does not know
    Unknown(i32),
}

impl LogLevel {
    /// Map the native level value.
    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            other => LogLevel::Unknown(other),
        }
    }

    /// The native level value.
    pub fn as_raw(self) -> i32 {
        match self {
            LogLevel::Debug => 1,
            LogLevel::Info => 2,
            LogLevel::Warn => 3,
            LogLevel::Error => 4,
            LogLevel::Unknown(other) => other,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Unknown(value) => write!(f, "LEVEL({})", value),
        }
    }
}

/// One log line emitted by the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Id of the emitting instance
    pub instance_id: String,
    /// Timestamp as formatted by the library
    pub timestamp: String,
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
}

/// Receiver for native log lines.
///
/// Called from whatever thread the library logs on.
pub trait LogSink: Send + Sync {
    /// Handle one log line
    fn log(&self, record: &LogRecord);
}

impl<F> LogSink for F
where
    F: Fn(&LogRecord) + Send + Sync,
{
    fn log(&self, record: &LogRecord) {
        self(record)
    }
}

/// Forwards native log lines to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, record: &LogRecord) {
        let LogRecord {
            instance_id,
            timestamp,
            level,
            message,
        } = record;
        match level {
            LogLevel::Debug => {
                tracing::debug!(
                    target: "otto::native",
                    instance = %instance_id,
                    %timestamp,
                    "{}",
                    message
                )
            }
            LogLevel::Info => {
                tracing::info!(
                    target: "otto::native",
                    instance = %instance_id,
                    %timestamp,
                    "{}",
                    message
                )
            }
            LogLevel::Warn => {
                tracing::warn!(
                    target: "otto::native",
                    instance = %instance_id,
                    %timestamp,
                    "{}",
                    message
                )
            }
            LogLevel::Error => {
                tracing::error!(
                    target: "otto::native",
                    instance = %instance_id,
                    %timestamp,
                    "{}",
                    message
                )
            }
            LogLevel::Unknown(raw) => {
                tracing::info!(
                    target: "otto::native",
                    instance = %instance_id,
                    %timestamp,
                    level = raw,
                    "{}",
                    message
                )
            }
        }
    }
}

/// C entry point registered with the library.
///
/// # Safety
///
/// `user_data` must be null or point to an `Arc<dyn LogSink>` that outlives
/// the call; the string arguments must be null or NUL-terminated.
pub(crate) unsafe extern "C" fn log_trampoline(
    instance_id: *const c_char,
    timestamp: *const c_char,
    level: c_int,
    message: *const c_char,
    user_data: *mut c_void,
) {
    if user_data.is_null() {
        return;
    }
    let sink = &*(user_data as *const Arc<dyn LogSink>);
    let record = LogRecord {
        instance_id: lossy_string(instance_id).unwrap_or_default(),
        timestamp: lossy_string(timestamp).unwrap_or_default(),
        level: LogLevel::from_raw(level),
        message: lossy_string(message).unwrap_or_default(),
    };
    if catch_unwind(AssertUnwindSafe(|| sink.log(&record))).is_err() {
        tracing::error!("Log sink panicked; log line dropped");
    }
}
