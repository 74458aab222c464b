//! The connection interceptor: wraps a connection factory with pre-DNS and
//! post-DNS host validation.

use std::net::IpAddr;

use tracing::debug;
use url::Url;

use crate::action::resolve_action;
use crate::error::Error;
use crate::options::{Mode, Options};
use crate::tcp::{Scheme, TcpConnector};
use crate::validate::{normalize_host, validate_host, BlockReason, Verdict};

/// Outcome of the connection layer's name resolution, delivered at most once
/// per connection.
pub type Resolution = std::io::Result<Vec<IpAddr>>;

/// One-shot observer for the address-resolution notification.
pub type ResolutionObserver = Box<dyn FnOnce(Resolution) + Send>;

/// Parameters for initiating a connection.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Target hostname or IP literal.
    pub host: String,
    /// Target port; `None` falls back to the connector's default.
    pub port: Option<u16>,
}

impl ConnectParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
        }
    }

    /// Extract connection parameters from a parsed URL.
    ///
    /// Only `http` and `https` URLs with a host are accepted.
    pub fn from_url(url: &Url) -> Result<Self, Error> {
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(Error::invalid_url(
                    url.as_str(),
                    format!("scheme '{scheme}' not allowed, only http/https"),
                ));
            }
        }
        let host = url
            .host_str()
            .ok_or_else(|| Error::invalid_url(url.as_str(), "URL must have a host"))?;
        Ok(Self {
            host: host.to_string(),
            port: url.port_or_known_default(),
        })
    }
}

/// An underlying connection factory: the black box that actually opens
/// sockets.
///
/// Initiation is synchronous and hands back an in-flight [`Connection`]
/// (possibly `None` when the layer produces no handle, which the guard
/// treats as a no-op). DNS resolution, timeouts and TLS are the factory's
/// business, not the guard's.
pub trait Connector {
    /// Marker preventing double-wrapping: `true` only for guards. Wrapping
    /// an already-guarded connector yields a passthrough.
    const GUARDED: bool = false;

    type Conn: Connection;

    /// Begin a connection to the target.
    fn connect(&self, params: &ConnectParams) -> Result<Option<Self::Conn>, Error>;
}

/// An in-flight connection produced by a [`Connector`].
pub trait Connection {
    type Abort: AbortHandle;

    /// Register a one-shot observer for the address-resolution notification.
    /// The observer fires at most once; a second registration is ignored.
    fn on_resolved(&mut self, observer: ResolutionObserver);

    /// Handle for forcibly terminating this connection, usable from the
    /// resolution observer.
    fn abort_handle(&self) -> Self::Abort;
}

/// Forcibly terminates an in-flight connection. Terminal and irreversible on
/// that connection; aborting twice is a no-op.
pub trait AbortHandle: Send + 'static {
    fn abort(&self, error: Error);
}

/// A connection factory wrapped with SSRF validation.
///
/// Before delegating to the inner factory the target hostname is validated
/// (pre-DNS). If the connection layer later reports the resolved addresses,
/// each one is re-validated (post-DNS) and the connection is terminated on
/// the first unsafe address, with the reason reported as `dns_rebinding`.
///
/// In [`Mode::Allow`] the guard is created inactive and delegates verbatim;
/// no validation or logging ever occurs for that instance.
pub struct GuardedConnector<C> {
    inner: C,
    options: Options,
    active: bool,
}

impl<C: Connector> GuardedConnector<C> {
    /// Wrap a connection factory. Each factory instance should be wrapped at
    /// most once; wrapping a guard produces a passthrough.
    pub fn new(inner: C, options: Options) -> Self {
        let active = options.mode != Mode::Allow && !C::GUARDED;
        Self {
            inner,
            options,
            active,
        }
    }
}

impl<C: Connector> Connector for GuardedConnector<C> {
    const GUARDED: bool = true;

    type Conn = C::Conn;

    fn connect(&self, params: &ConnectParams) -> Result<Option<Self::Conn>, Error> {
        if !self.active {
            return self.inner.connect(params);
        }

        let host = normalize_host(&params.host);

        // Pre-DNS phase: the target as the caller named it.
        if let Verdict::Blocked(reason) = validate_host(&host, &self.options) {
            debug!(host = %host, reason = %reason, "pre-DNS validation failed");
            if resolve_action(&self.options, &host, reason, None, Some(&host)) {
                return Err(Error::blocked(reason, &host, None));
            }
        }

        let Some(mut conn) = self.inner.connect(params)? else {
            return Ok(None);
        };

        // Post-DNS phase: revalidate every resolved address reactively.
        if self.options.detect_dns_rebinding {
            let abort = conn.abort_handle();
            let options = self.options.clone();
            conn.on_resolved(Box::new(move |resolution| {
                // Resolution failures propagate through the connection layer
                let Ok(ips) = resolution else { return };
                for ip in ips {
                    if validate_host(&ip.to_string(), &options).is_safe() {
                        continue;
                    }
                    debug!(host = %host, ip = %ip, "post-DNS validation failed");
                    let should_abort = resolve_action(
                        &options,
                        &host,
                        BlockReason::DnsRebinding,
                        Some(ip),
                        Some(&host),
                    );
                    if should_abort {
                        abort.abort(Error::DnsRebinding {
                            hostname: host.clone(),
                            ip,
                        });
                        break;
                    }
                }
            }));
        }

        Ok(Some(conn))
    }
}

/// Create a guarded connection factory for a target URL or protocol hint.
///
/// A hint starting with `https` selects the HTTPS family (default port 443),
/// anything else HTTP. Every call constructs a fresh underlying
/// [`TcpConnector`]; factories are independent and share no state beyond the
/// static metadata table.
///
/// # Example
///
/// ```rust,no_run
/// use hostguard::{guard, ConnectParams, Connector, Options};
///
/// # async fn example() -> Result<(), hostguard::Error> {
/// let factory = guard("https://api.example.com", Options::new());
/// let conn = factory.connect(&ConnectParams::new("api.example.com", 443))?;
/// # Ok(())
/// # }
/// ```
pub fn guard(target: &str, options: Options) -> GuardedConnector<TcpConnector> {
    let scheme = if target.to_ascii_lowercase().starts_with("https") {
        Scheme::Https
    } else {
        Scheme::Http
    };
    GuardedConnector::new(TcpConnector::new(scheme), options)
}
