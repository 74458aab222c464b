//! Cloud metadata endpoints, the highest-value SSRF targets.

/// Hostnames and IP literals of known cloud metadata services.
///
/// Process-wide and read-only; caller-supplied hosts are unioned in at check
/// time, never merged into this table.
pub const METADATA_HOSTS: &[&str] = &[
    "169.254.169.254",                      // AWS / GCP / Azure / DigitalOcean / Oracle
    "fd00:ec2::254",                        // AWS IMDS over IPv6
    "169.254.170.2",                        // AWS ECS task metadata
    "instance-data",                        // AWS alternate (EC2-Classic)
    "metadata.google.internal",             // GCP
    "metadata.goog",                        // GCP
    "metadata.azure.internal",              // Azure
    "192.0.0.192",                          // Oracle Cloud legacy
    "100.100.100.200",                      // Alibaba Cloud
    "kubernetes.default",                   // Kubernetes API from a pod
    "kubernetes.default.svc",
    "kubernetes.default.svc.cluster.local",
];

/// Check whether a hostname is a known cloud metadata endpoint.
///
/// Matching is case-insensitive exact membership in [`METADATA_HOSTS`]
/// unioned with `custom_hosts`.
pub fn is_cloud_metadata_host(hostname: &str, custom_hosts: &[String]) -> bool {
    let host = hostname.to_lowercase();
    METADATA_HOSTS.iter().any(|&h| h == host)
        || custom_hosts.iter().any(|h| h.to_lowercase() == host)
}
