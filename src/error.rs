//! Error types for hostguard.

use std::net::{IpAddr, Ipv4Addr};

use thiserror::Error;

use crate::validate::BlockReason;

/// Errors raised when a connection is aborted or cannot be initiated.
#[derive(Debug, Error)]
pub enum Error {
    /// Target is an IP literal outside public unicast space.
    #[error("Private IP address {target} is not allowed")]
    PrivateIp { target: String },

    /// Target is a known cloud metadata endpoint.
    #[error("Cloud metadata endpoint {target} is not allowed")]
    CloudMetadata { target: String },

    /// Target is neither an IP literal nor a valid domain name.
    #[error("Invalid domain {target}")]
    InvalidDomain { target: String },

    /// A previously accepted name resolved to an unsafe address.
    #[error("DNS rebinding attack detected for {hostname} -> {ip}")]
    DnsRebinding { hostname: String, ip: IpAddr },

    /// Target matches a deny-domain pattern.
    #[error("Domain {target} is denied by policy")]
    DeniedDomain { target: String },

    /// Target's TLD is denied by policy.
    #[error("TLD of {target} is denied by policy")]
    DeniedTld { target: String },

    /// An allowlist is configured and the target is not on it.
    #[error("Domain {target} is not in the allowed list")]
    NotAllowedDomain { target: String },

    /// Malformed target URL or forbidden scheme.
    #[error("Invalid URL: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// DNS resolution failed in the underlying connection layer.
    #[error("DNS error for {host}: {message}")]
    Dns { host: String, message: String },

    /// The underlying connection attempt failed.
    #[error("Connection failed for {host}: {message}")]
    ConnectFailed { host: String, message: String },
}

impl Error {
    /// Build the abort error for a blocked target.
    pub(crate) fn blocked(reason: BlockReason, target: &str, resolved_ip: Option<IpAddr>) -> Self {
        let target = target.to_string();
        match reason {
            BlockReason::PrivateIp => Error::PrivateIp { target },
            BlockReason::CloudMetadata => Error::CloudMetadata { target },
            BlockReason::InvalidDomain => Error::InvalidDomain { target },
            BlockReason::DnsRebinding => Error::DnsRebinding {
                hostname: target,
                ip: resolved_ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            },
            BlockReason::DeniedDomain => Error::DeniedDomain { target },
            BlockReason::DeniedTld => Error::DeniedTld { target },
            BlockReason::NotAllowedDomain => Error::NotAllowedDomain { target },
        }
    }

    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn dns(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dns {
            host: host.into(),
            message: message.into(),
        }
    }

    pub(crate) fn connect_failed(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            host: host.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_templates() {
        assert_eq!(
            Error::blocked(BlockReason::PrivateIp, "10.0.0.1", None).to_string(),
            "Private IP address 10.0.0.1 is not allowed"
        );
        assert_eq!(
            Error::blocked(BlockReason::CloudMetadata, "169.254.169.254", None).to_string(),
            "Cloud metadata endpoint 169.254.169.254 is not allowed"
        );
        assert_eq!(
            Error::blocked(BlockReason::InvalidDomain, "localhost", None).to_string(),
            "Invalid domain localhost"
        );
        assert_eq!(
            Error::blocked(BlockReason::DeniedDomain, "evil.com", None).to_string(),
            "Domain evil.com is denied by policy"
        );
        assert_eq!(
            Error::blocked(BlockReason::DeniedTld, "printer.local", None).to_string(),
            "TLD of printer.local is denied by policy"
        );
        assert_eq!(
            Error::blocked(BlockReason::NotAllowedDomain, "other.com", None).to_string(),
            "Domain other.com is not in the allowed list"
        );
    }

    #[test]
    fn test_dns_rebinding_message() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let error = Error::DnsRebinding {
            hostname: "legitimate.com".to_string(),
            ip,
        };
        assert_eq!(
            error.to_string(),
            "DNS rebinding attack detected for legitimate.com -> 127.0.0.1"
        );
    }
}
