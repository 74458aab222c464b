//! Domain allow/deny policy evaluation.
//!
//! Policies are pure validation constraints on hostnames: no user identity,
//! no request context, no time-based logic. Once built, a [`Policy`] is
//! read-only to the core.

use crate::classify::extract_tld;
use crate::validate::{BlockReason, Verdict};

/// Allow/deny domain lists and denied TLDs.
///
/// A domain entry is either an exact domain (which implicitly also matches
/// its subdomains) or a `*.` wildcard form explicitly marking subdomain
/// matching; see [`matches_domain_pattern`] for the exact rule.
///
/// # Precedence
///
/// When `allow_domains` is non-empty it is exclusive and authoritative:
/// hostnames matching an entry are safe, everything else is blocked with
/// `not_allowed_domain`, and the deny lists are never consulted.
///
/// # Example
///
/// ```rust
/// use hostguard::{evaluate_policy, Policy};
///
/// let policy = Policy::new()
///     .deny_domain("*.internal.example.com")
///     .deny_tld("local");
///
/// assert!(!evaluate_policy("api.internal.example.com", Some(&policy)).is_safe());
/// assert!(!evaluate_policy("printer.local", Some(&policy)).is_safe());
/// assert!(evaluate_policy("example.com", Some(&policy)).is_safe());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Policy {
    allow_domains: Vec<String>,
    deny_domains: Vec<String>,
    deny_tlds: Vec<String>,
}

impl Policy {
    /// Create an empty policy that allows everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an allowed domain pattern. A non-empty allowlist is exclusive:
    /// only matching hostnames pass.
    pub fn allow_domain(mut self, pattern: &str) -> Self {
        self.allow_domains.push(pattern.to_lowercase());
        self
    }

    /// Add a denied domain pattern.
    pub fn deny_domain(mut self, pattern: &str) -> Self {
        self.deny_domains.push(pattern.to_lowercase());
        self
    }

    /// Add a denied TLD (last hostname label, matched case-insensitively).
    pub fn deny_tld(mut self, tld: &str) -> Self {
        self.deny_tlds.push(tld.to_lowercase());
        self
    }

    fn is_empty(&self) -> bool {
        self.allow_domains.is_empty() && self.deny_domains.is_empty() && self.deny_tlds.is_empty()
    }
}

/// Evaluate a hostname against a policy.
///
/// Fixed precedence, short-circuiting:
/// 1. no policy or all lists empty → safe
/// 2. non-empty allowlist → safe iff the hostname matches an entry
///    (`not_allowed_domain` otherwise; deny lists are not consulted)
/// 3. hostname matches a deny pattern → `denied_domain`
/// 4. hostname's TLD is denied → `denied_tld`
/// 5. otherwise safe
pub fn evaluate_policy(hostname: &str, policy: Option<&Policy>) -> Verdict {
    let Some(policy) = policy else {
        return Verdict::Safe;
    };
    if policy.is_empty() {
        return Verdict::Safe;
    }

    let host = hostname.to_lowercase();

    if !policy.allow_domains.is_empty() {
        return if policy
            .allow_domains
            .iter()
            .any(|pattern| matches_domain_pattern(&host, pattern))
        {
            Verdict::Safe
        } else {
            Verdict::Blocked(BlockReason::NotAllowedDomain)
        };
    }

    if policy
        .deny_domains
        .iter()
        .any(|pattern| matches_domain_pattern(&host, pattern))
    {
        return Verdict::Blocked(BlockReason::DeniedDomain);
    }

    if !policy.deny_tlds.is_empty() {
        let tld = extract_tld(&host);
        if policy.deny_tlds.iter().any(|denied| *denied == tld) {
            return Verdict::Blocked(BlockReason::DeniedTld);
        }
    }

    Verdict::Safe
}

/// Match a hostname against a domain pattern, case-insensitive on both sides.
///
/// - exact equality matches;
/// - `*.base` matches `base` itself and any subdomain of it;
/// - a plain pattern also matches all of its subdomains.
pub fn matches_domain_pattern(hostname: &str, pattern: &str) -> bool {
    let host = hostname.to_lowercase();
    let pattern = pattern.to_lowercase();

    if host == pattern {
        return true;
    }

    if let Some(base) = pattern.strip_prefix("*.") {
        return host == base || host.ends_with(&format!(".{base}"));
    }

    host.ends_with(&format!(".{pattern}"))
}
