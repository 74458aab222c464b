//! Guard configuration.

use std::fmt;
use std::sync::Arc;

use crate::action::{BlockEvent, LogLevel, Logger};
use crate::policy::Policy;

/// What happens when validation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Abort the connection and surface an error. The default.
    #[default]
    Block,
    /// Log the event and let the connection proceed.
    Report,
    /// Bypass all validation entirely; no checks, no logging.
    Allow,
}

/// Configuration for one guarded connection factory.
///
/// Built once, read-only afterwards; cloning is cheap (the logger is behind
/// an `Arc`). Defaults: `mode` is [`Mode::Block`], cloud-metadata blocking
/// and DNS-rebinding detection are on, no policy, no logger.
///
/// # Example
///
/// ```rust
/// use hostguard::{Mode, Options, Policy};
///
/// let options = Options::new()
///     .mode(Mode::Report)
///     .policy(Policy::new().deny_tld("internal"))
///     .metadata_host("metadata.corp.example");
/// ```
#[derive(Clone)]
pub struct Options {
    pub(crate) metadata_hosts: Vec<String>,
    pub(crate) mode: Mode,
    pub(crate) policy: Option<Policy>,
    pub(crate) block_cloud_metadata: bool,
    pub(crate) detect_dns_rebinding: bool,
    pub(crate) logger: Option<Logger>,
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl Options {
    pub fn new() -> Self {
        Self {
            metadata_hosts: Vec::new(),
            mode: Mode::Block,
            policy: None,
            block_cloud_metadata: true,
            detect_dns_rebinding: true,
            logger: None,
        }
    }

    /// Set the operation mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach a domain policy.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Add a metadata host to block in addition to the static table.
    pub fn metadata_host(mut self, host: &str) -> Self {
        self.metadata_hosts.push(host.to_string());
        self
    }

    /// Enable or disable cloud-metadata blocking (default on).
    pub fn block_cloud_metadata(mut self, enabled: bool) -> Self {
        self.block_cloud_metadata = enabled;
        self
    }

    /// Enable or disable post-DNS revalidation (default on).
    pub fn detect_dns_rebinding(mut self, enabled: bool) -> Self {
        self.detect_dns_rebinding = enabled;
        self
    }

    /// Install a logging callback, invoked once per blocking or reporting
    /// decision.
    pub fn logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(LogLevel, &str, Option<&BlockEvent>) + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("metadata_hosts", &self.metadata_hosts)
            .field("mode", &self.mode)
            .field("policy", &self.policy)
            .field("block_cloud_metadata", &self.block_cloud_metadata)
            .field("detect_dns_rebinding", &self.detect_dns_rebinding)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}
