//! Mode-dependent reaction to validation failures.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use crate::options::{Mode, Options};
use crate::validate::BlockReason;

/// Severity passed to the logging callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        })
    }
}

/// Logging callback invoked on every blocking or reporting decision.
pub type Logger = Arc<dyn Fn(LogLevel, &str, Option<&BlockEvent>) + Send + Sync>;

/// A single blocking or reporting decision, handed to the logger and then
/// discarded.
#[derive(Debug, Clone)]
pub struct BlockEvent {
    /// The validated target.
    pub url: String,
    pub reason: BlockReason,
    /// The resolved address, for post-DNS decisions.
    pub ip: Option<IpAddr>,
    /// The caller-supplied hostname, when it differs from the target.
    pub hostname: Option<String>,
    pub timestamp: SystemTime,
}

/// Decide whether a validation failure aborts the connection, emitting at
/// most one logger call.
///
/// Block mode logs at error level and aborts; report mode logs at warn level
/// and lets the connection proceed. Allow mode never reaches this point (the
/// interceptor bypasses validation entirely), so it aborts nothing.
pub(crate) fn resolve_action(
    options: &Options,
    target: &str,
    reason: BlockReason,
    resolved_ip: Option<IpAddr>,
    original_hostname: Option<&str>,
) -> bool {
    let event = BlockEvent {
        url: target.to_string(),
        reason,
        ip: resolved_ip,
        hostname: original_hostname.map(str::to_string),
        timestamp: SystemTime::now(),
    };

    match options.mode {
        Mode::Block => {
            debug!(host = %target, reason = %reason, "blocking connection");
            if let Some(logger) = &options.logger {
                logger(LogLevel::Error, &format!("SSRF blocked: {reason}"), Some(&event));
            }
            true
        }
        Mode::Report => {
            debug!(host = %target, reason = %reason, "reporting, connection proceeds");
            if let Some(logger) = &options.logger {
                logger(
                    LogLevel::Warn,
                    &format!("SSRF detected (report mode): {reason}"),
                    Some(&event),
                );
            }
            false
        }
        Mode::Allow => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type LogRecord = (LogLevel, String, Option<BlockEvent>);

    fn capture() -> (Arc<Mutex<Vec<LogRecord>>>, Options) {
        let records: Arc<Mutex<Vec<LogRecord>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        let options = Options::new().logger(move |level, message, event| {
            sink.lock()
                .unwrap()
                .push((level, message.to_string(), event.cloned()));
        });
        (records, options)
    }

    #[test]
    fn test_block_mode_aborts_and_logs_error() {
        let (records, options) = capture();
        let abort = resolve_action(&options, "10.0.0.1", BlockReason::PrivateIp, None, Some("10.0.0.1"));
        assert!(abort);

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        let (level, message, event) = &records[0];
        assert_eq!(*level, LogLevel::Error);
        assert_eq!(message, "SSRF blocked: private_ip");
        let event = event.as_ref().unwrap();
        assert_eq!(event.url, "10.0.0.1");
        assert_eq!(event.reason, BlockReason::PrivateIp);
        assert!(event.ip.is_none());
    }

    #[test]
    fn test_report_mode_proceeds_and_logs_warn() {
        let (records, options) = capture();
        let options = options.mode(Mode::Report);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let abort = resolve_action(
            &options,
            "legitimate.com",
            BlockReason::DnsRebinding,
            Some(ip),
            Some("legitimate.com"),
        );
        assert!(!abort);

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        let (level, message, event) = &records[0];
        assert_eq!(*level, LogLevel::Warn);
        assert_eq!(message, "SSRF detected (report mode): dns_rebinding");
        assert_eq!(event.as_ref().unwrap().ip, Some(ip));
    }

    #[test]
    fn test_no_logger_still_aborts() {
        let options = Options::new();
        assert!(resolve_action(
            &options,
            "169.254.169.254",
            BlockReason::CloudMetadata,
            None,
            None,
        ));
    }

    #[test]
    fn test_logger_invoked_exactly_once() {
        let (records, options) = capture();
        resolve_action(&options, "evil.com", BlockReason::DeniedDomain, None, None);
        assert_eq!(records.lock().unwrap().len(), 1);
    }
}
