//! # hostguard
//!
//! SSRF-guarded outbound connections for Rust.
//!
//! `hostguard` wraps a connection factory with two-phase validation: the
//! target hostname is checked before any socket is opened (private IPs,
//! cloud-metadata endpoints, domain policy), and every DNS-resolved address
//! is re-checked once the connection layer reports it, catching DNS
//! rebinding attacks where a permitted-looking domain resolves somewhere
//! forbidden.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostguard::{guard, ConnectParams, Connector, Options};
//!
//! # async fn example() -> Result<(), hostguard::Error> {
//! let factory = guard("https://api.example.com", Options::new());
//! // Fails synchronously: private IPs are blocked before any socket opens.
//! let result = factory.connect(&ConnectParams::new("10.0.0.1", 443));
//! assert!(result.is_err());
//! # Ok(())
//! # }
//! ```
//!
//! The validation primitives are usable on their own, without the
//! interceptor:
//!
//! ```rust
//! use hostguard::{validate_host, Options};
//!
//! assert!(!validate_host("169.254.169.254", &Options::new()).is_safe());
//! assert!(validate_host("example.com", &Options::new()).is_safe());
//! ```

mod action;
mod classify;
mod error;
mod guard;
mod metadata;
mod options;
mod policy;
mod tcp;
mod validate;

pub use action::{BlockEvent, LogLevel, Logger};
pub use classify::{extract_tld, is_ip_address, is_public_unicast, is_valid_domain};
pub use error::Error;
pub use guard::{
    guard, AbortHandle, ConnectParams, Connection, Connector, GuardedConnector, Resolution,
    ResolutionObserver,
};
pub use metadata::{is_cloud_metadata_host, METADATA_HOSTS};
pub use options::{Mode, Options};
pub use policy::{evaluate_policy, matches_domain_pattern, Policy};
pub use tcp::{Scheme, TcpAbort, TcpConnection, TcpConnector};
pub use validate::{validate_host, BlockReason, Verdict};
