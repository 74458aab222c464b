//! Address classification: IP literals, public-unicast ranges, TLDs and
//! domain syntax.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;

use ipnet::IpNet;

/// Address ranges that are not publicly routable unicast space.
///
/// Covers unspecified, loopback, RFC1918 private, link-local, CGNAT,
/// documentation/benchmarking nets, multicast, reserved and broadcast for
/// IPv4, plus the IPv6 equivalents (unique-local, link-local, multicast,
/// documentation).
static NON_PUBLIC_NETS: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    // These are all well-known CIDR ranges; parse failures would be a
    // programming error.
    let ranges = [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.0.0.0/24",
        "192.0.2.0/24",
        "192.88.99.0/24",
        "192.168.0.0/16",
        "198.18.0.0/15",
        "198.51.100.0/24",
        "203.0.113.0/24",
        "224.0.0.0/4",
        "240.0.0.0/4",
        "255.255.255.255/32",
        "::/128",
        "::1/128",
        "2001:db8::/32",
        "fc00::/7",
        "fe80::/10",
        "ff00::/8",
    ];
    ranges
        .iter()
        .filter_map(|s| s.parse::<IpNet>().ok())
        .collect()
});

/// Check whether the input parses as an IPv4 or IPv6 literal.
///
/// Bracketed IPv6 forms (`[::1]`) are accepted, matching how hosts appear in
/// URL authorities.
pub fn is_ip_address(input: &str) -> bool {
    let bare = input.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<IpAddr>().is_ok()
}

/// Check whether an address is publicly routable unicast.
///
/// Returns `false` for loopback, link-local, private, CGNAT, multicast,
/// documentation and reserved ranges. IPv4-mapped and IPv4-compatible IPv6
/// addresses are classified by their embedded IPv4 address, so
/// `::ffff:10.0.0.1` is treated the same as `10.0.0.1`.
pub fn is_public_unicast(ip: IpAddr) -> bool {
    let ip = canonical(ip);
    !NON_PUBLIC_NETS.iter().any(|net| net.contains(&ip))
}

/// Unwrap IPv4 addresses embedded in IPv6 before range classification.
fn canonical(ip: IpAddr) -> IpAddr {
    let IpAddr::V6(v6) = ip else { return ip };

    if let Some(v4) = v6.to_ipv4_mapped() {
        return IpAddr::V4(v4);
    }

    // IPv4-compatible IPv6 (::x.x.x.x) - deprecated but still parses.
    // Skip :: and ::1, which are unspecified/loopback, not embeddings.
    let segments = v6.segments();
    if segments[0..6] == [0, 0, 0, 0, 0, 0] && (segments[6] != 0 || segments[7] > 1) {
        return IpAddr::V4(Ipv4Addr::new(
            (segments[6] >> 8) as u8,
            segments[6] as u8,
            (segments[7] >> 8) as u8,
            segments[7] as u8,
        ));
    }

    ip
}

/// Extract the last label of a hostname, lowercased.
///
/// Returns an empty string for an empty hostname. A bare label with no dot
/// (e.g. `localhost`) is returned whole as its own TLD, so "deny bare
/// hostnames" policies can be written as `deny_tld("localhost")`.
pub fn extract_tld(hostname: &str) -> String {
    hostname
        .to_lowercase()
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_string()
}

/// Check whether a hostname is a syntactically valid domain name.
///
/// ASCII-only (no Unicode), RFC-1123 labels: alphanumeric and hyphens, no
/// leading or trailing hyphen, at most 63 characters per label and 253
/// total. Requires at least two labels, and the last label must not be
/// all-numeric (that would be a malformed IP, not a domain). Subdomains of
/// any depth are accepted; a single trailing dot (FQDN notation) is ignored.
pub fn is_valid_domain(hostname: &str) -> bool {
    let host = hostname.strip_suffix('.').unwrap_or(hostname);
    if host.is_empty() || host.len() > 253 {
        return false;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    if labels
        .last()
        .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_digit()))
    {
        return false;
    }

    labels.iter().all(|label| is_valid_label(label))
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}
