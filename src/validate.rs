//! Host validation: the unified pre-DNS / post-DNS decision.

use std::fmt;
use std::net::IpAddr;

use crate::classify::{is_ip_address, is_public_unicast, is_valid_domain};
use crate::metadata::is_cloud_metadata_host;
use crate::options::Options;
use crate::policy::evaluate_policy;

/// Why a host was blocked. Exactly one reason accompanies every blocked
/// [`Verdict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// The target is an IP literal outside public unicast space.
    PrivateIp,
    /// The target is a known cloud metadata endpoint.
    CloudMetadata,
    /// The target is neither an IP literal nor a syntactically valid domain.
    InvalidDomain,
    /// A previously accepted name resolved to an unsafe address.
    DnsRebinding,
    /// The target matches a deny-domain pattern.
    DeniedDomain,
    /// The target's TLD is denied by policy.
    DeniedTld,
    /// An allowlist is configured and the target is not on it.
    NotAllowedDomain,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            BlockReason::PrivateIp => "private_ip",
            BlockReason::CloudMetadata => "cloud_metadata",
            BlockReason::InvalidDomain => "invalid_domain",
            BlockReason::DnsRebinding => "dns_rebinding",
            BlockReason::DeniedDomain => "denied_domain",
            BlockReason::DeniedTld => "denied_tld",
            BlockReason::NotAllowedDomain => "not_allowed_domain",
        };
        f.write_str(token)
    }
}

/// Outcome of a single host validation. A fresh value per check, never
/// cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    Blocked(BlockReason),
}

impl Verdict {
    #[must_use]
    pub fn is_safe(&self) -> bool {
        matches!(self, Verdict::Safe)
    }

    /// The block reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<BlockReason> {
        match self {
            Verdict::Safe => None,
            Verdict::Blocked(reason) => Some(*reason),
        }
    }
}

/// Validate a hostname or IP literal against the configured checks.
///
/// Pure function of its inputs; the interceptor calls it twice per
/// connection, first with the caller-supplied hostname and again with each
/// DNS-resolved address.
///
/// Check order (first failure wins):
/// 1. cloud metadata endpoints (unless `block_cloud_metadata` is off) —
///    before anything else, so an explicit metadata target is reported as
///    `cloud_metadata` and not as a mere private IP;
/// 2. domain policy, for non-IP hostnames;
/// 3. public-unicast range check, for IP literals;
/// 4. domain syntax, for whatever names remain.
///
/// Note that policy applies only to names: an `allow_domains` list cannot
/// restrict raw-IP targets, which see only the range check.
pub fn validate_host(hostname: &str, options: &Options) -> Verdict {
    let host = normalize_host(hostname);

    if options.block_cloud_metadata && is_cloud_metadata_host(&host, &options.metadata_hosts) {
        return Verdict::Blocked(BlockReason::CloudMetadata);
    }

    let is_ip = is_ip_address(&host);

    if !is_ip {
        let verdict = evaluate_policy(&host, options.policy.as_ref());
        if !verdict.is_safe() {
            return verdict;
        }
    }

    if is_ip {
        return match host.parse::<IpAddr>() {
            Ok(ip) if is_public_unicast(ip) => Verdict::Safe,
            _ => Verdict::Blocked(BlockReason::PrivateIp),
        };
    }

    if !is_valid_domain(&host) {
        return Verdict::Blocked(BlockReason::InvalidDomain);
    }

    Verdict::Safe
}

/// Lowercase, strip a trailing FQDN dot and IPv6 brackets.
pub(crate) fn normalize_host(hostname: &str) -> String {
    let mut host = hostname.to_lowercase();
    if host.ends_with('.') {
        host.pop();
    }
    host.trim_start_matches('[').trim_end_matches(']').to_string()
}
