// src/services/audit_service.rs
use std::fmt;

/// `tracing` target routed to the audit log file by the subscriber in `main`.
pub const AUDIT_TARGET: &str = "audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable sink for security-relevant events.
pub trait AuditSink: Send + Sync {
    fn record(&self, message: &str, severity: Severity);
}

/// Emits audit events on the `audit` target; the subscriber appends them to
/// the audit log file.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!(target: AUDIT_TARGET, severity = %severity, "{}", message),
            Severity::Warning => tracing::warn!(target: AUDIT_TARGET, severity = %severity, "{}", message),
            Severity::Error => tracing::error!(target: AUDIT_TARGET, severity = %severity, "{}", message),
        }
    }
}

/// Collects events in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    pub events: std::sync::Mutex<Vec<(String, Severity)>>,
}

#[cfg(test)]
impl MemoryAuditSink {
    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl AuditSink for MemoryAuditSink {
    fn record(&self, message: &str, severity: Severity) {
        if let Ok(mut events) = self.events.lock() {
            events.push((message.to_string(), severity));
        }
    }
}
