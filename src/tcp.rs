//! Tokio-based connection factory: the concrete connection layer the guard
//! wraps.
//!
//! Resolves the target with `hickory-resolver`, emits the one-shot
//! address-resolution notification, then opens a `TcpStream` to the resolved
//! addresses. Termination requests race the connection attempt.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use hickory_resolver::TokioResolver;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::Error;
use crate::guard::{AbortHandle, ConnectParams, Connection, Connector, Resolution, ResolutionObserver};

/// Protocol family of a connection factory, selecting the default port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// A plain TCP connection factory.
///
/// Connection initiation spawns a background task, so [`Connector::connect`]
/// must be called from within a Tokio runtime. Each factory instance is
/// independent; nothing is shared across instances.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    scheme: Scheme,
}

impl TcpConnector {
    pub fn new(scheme: Scheme) -> Self {
        Self { scheme }
    }
}

impl Connector for TcpConnector {
    type Conn = TcpConnection;

    fn connect(&self, params: &ConnectParams) -> Result<Option<TcpConnection>, Error> {
        let host = params.host.clone();
        let port = params.port.unwrap_or(self.scheme.default_port());

        let slot = Arc::new(Mutex::new(ObserverSlot::Empty));
        let (done_tx, done_rx) = oneshot::channel();
        let (abort_tx, mut abort_rx) = oneshot::channel::<Error>();

        let task_slot = slot.clone();
        let task_host = host.clone();
        tokio::spawn(async move {
            let ips = match resolve(&task_host).await {
                Ok(ips) => {
                    debug!(host = %task_host, ?ips, "resolved");
                    deliver(&task_slot, Ok(ips.clone()));
                    ips
                }
                Err(err) => {
                    debug!(host = %task_host, %err, "resolution failed");
                    deliver(&task_slot, Err(std::io::Error::other(err.to_string())));
                    let _ = done_tx.send(Err(err));
                    return;
                }
            };

            // The resolution observer may have requested termination already.
            if let Ok(err) = abort_rx.try_recv() {
                let _ = done_tx.send(Err(err));
                return;
            }

            let attempt = async {
                let mut last_error: Option<std::io::Error> = None;
                for ip in ips {
                    match TcpStream::connect(SocketAddr::new(ip, port)).await {
                        Ok(stream) => return Ok(stream),
                        Err(err) => last_error = Some(err),
                    }
                }
                Err(last_error.unwrap_or_else(|| std::io::Error::other("no addresses to try")))
            };

            tokio::select! {
                biased;
                Ok(err) = &mut abort_rx => {
                    let _ = done_tx.send(Err(err));
                }
                result = attempt => {
                    let _ = done_tx.send(
                        result.map_err(|err| Error::connect_failed(&task_host, err.to_string())),
                    );
                }
            }
        });

        Ok(Some(TcpConnection {
            host,
            slot,
            abort: Arc::new(Mutex::new(Some(abort_tx))),
            done: done_rx,
        }))
    }
}

/// An in-flight TCP connection.
pub struct TcpConnection {
    host: String,
    slot: Arc<Mutex<ObserverSlot>>,
    abort: Arc<Mutex<Option<oneshot::Sender<Error>>>>,
    done: oneshot::Receiver<Result<TcpStream, Error>>,
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl TcpConnection {
    /// Wait for the connection attempt to finish.
    ///
    /// Returns the established stream, or the error that aborted the
    /// attempt (DNS failure, connect failure, or forcible termination).
    pub async fn established(self) -> Result<TcpStream, Error> {
        let host = self.host.clone();
        match self.done.await {
            Ok(result) => result,
            Err(_) => Err(Error::connect_failed(host, "connection task dropped")),
        }
    }
}

impl Connection for TcpConnection {
    type Abort = TcpAbort;

    fn on_resolved(&mut self, observer: ResolutionObserver) {
        let resolution = {
            let mut slot = lock(&self.slot);
            match std::mem::replace(&mut *slot, ObserverSlot::Done) {
                ObserverSlot::Empty => {
                    *slot = ObserverSlot::Waiting(observer);
                    return;
                }
                ObserverSlot::Delivered(resolution) => resolution,
                // Already registered or already notified: ignore
                waiting @ ObserverSlot::Waiting(_) => {
                    *slot = waiting;
                    return;
                }
                ObserverSlot::Done => return,
            }
        };
        observer(resolution);
    }

    fn abort_handle(&self) -> TcpAbort {
        TcpAbort {
            sender: self.abort.clone(),
        }
    }
}

/// Termination handle for a [`TcpConnection`].
#[derive(Clone)]
pub struct TcpAbort {
    sender: Arc<Mutex<Option<oneshot::Sender<Error>>>>,
}

impl AbortHandle for TcpAbort {
    fn abort(&self, error: Error) {
        if let Some(sender) = lock(&self.sender).take() {
            let _ = sender.send(error);
        }
    }
}

/// Latch between the resolving task and the observer registration: whichever
/// side arrives first parks its half until the other shows up.
enum ObserverSlot {
    Empty,
    Waiting(ResolutionObserver),
    Delivered(Resolution),
    Done,
}

fn deliver(slot: &Mutex<ObserverSlot>, resolution: Resolution) {
    let observer = {
        let mut slot = lock(slot);
        match std::mem::replace(&mut *slot, ObserverSlot::Done) {
            ObserverSlot::Waiting(observer) => observer,
            ObserverSlot::Empty => {
                *slot = ObserverSlot::Delivered(resolution);
                return;
            }
            _ => return,
        }
    };
    observer(resolution);
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Resolve a hostname to its addresses. IP literals short-circuit without
/// touching the resolver.
async fn resolve(host: &str) -> Result<Vec<IpAddr>, Error> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let resolver = TokioResolver::builder_tokio()
        .map_err(|e| Error::dns(host, e.to_string()))?
        .build();

    let response = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| Error::dns(host, e.to_string()))?;

    let ips: Vec<IpAddr> = response.iter().collect();
    if ips.is_empty() {
        return Err(Error::dns(host, "no IP addresses found"));
    }
    Ok(ips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::GuardedConnector;
    use crate::options::{Mode, Options};
    use crate::validate::BlockReason;
    use tokio::net::TcpListener;

    async fn local_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_connect_ip_literal() {
        let (_listener, port) = local_listener().await;
        let connector = TcpConnector::new(Scheme::Http);
        let conn = connector
            .connect(&ConnectParams::new("127.0.0.1", port))
            .unwrap()
            .unwrap();
        let stream = conn.established().await.unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_observer_receives_resolved_addresses() {
        let (_listener, port) = local_listener().await;
        let connector = TcpConnector::new(Scheme::Http);
        let mut conn = connector
            .connect(&ConnectParams::new("127.0.0.1", port))
            .unwrap()
            .unwrap();

        let seen: Arc<Mutex<Option<Resolution>>> = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        conn.on_resolved(Box::new(move |resolution| {
            *sink.lock().unwrap() = Some(resolution);
        }));

        conn.established().await.unwrap();
        let seen = seen.lock().unwrap().take().unwrap().unwrap();
        assert_eq!(seen, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn test_abort_terminates_connection() {
        let (_listener, port) = local_listener().await;
        let connector = TcpConnector::new(Scheme::Http);
        let conn = connector
            .connect(&ConnectParams::new("127.0.0.1", port))
            .unwrap()
            .unwrap();

        conn.abort_handle().abort(Error::DnsRebinding {
            hostname: "example.com".to_string(),
            ip: "127.0.0.1".parse().unwrap(),
        });

        let err = conn.established().await.unwrap_err();
        assert!(err.to_string().contains("DNS rebinding attack detected"));
    }

    #[tokio::test]
    async fn test_abort_is_idempotent() {
        let (_listener, port) = local_listener().await;
        let connector = TcpConnector::new(Scheme::Http);
        let conn = connector
            .connect(&ConnectParams::new("127.0.0.1", port))
            .unwrap()
            .unwrap();

        let handle = conn.abort_handle();
        handle.abort(Error::connect_failed("127.0.0.1", "first"));
        handle.abort(Error::connect_failed("127.0.0.1", "second"));

        let err = conn.established().await.unwrap_err();
        assert!(err.to_string().contains("first"));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with no listener
        let (listener, port) = local_listener().await;
        drop(listener);

        let connector = TcpConnector::new(Scheme::Http);
        let conn = connector
            .connect(&ConnectParams::new("127.0.0.1", port))
            .unwrap()
            .unwrap();
        let err = conn.established().await.unwrap_err();
        assert!(matches!(err, Error::ConnectFailed { .. }));
    }

    #[tokio::test]
    async fn test_default_ports() {
        assert_eq!(Scheme::Http.default_port(), 80);
        assert_eq!(Scheme::Https.default_port(), 443);
    }

    // ==================== Guard over the real connector ====================

    #[tokio::test]
    async fn test_guarded_blocks_loopback_before_connecting() {
        let factory = GuardedConnector::new(TcpConnector::new(Scheme::Http), Options::new());
        let err = factory
            .connect(&ConnectParams::new("127.0.0.1", 80))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Private IP address 127.0.0.1 is not allowed"
        );
    }

    #[tokio::test]
    async fn test_guarded_report_mode_end_to_end() {
        // In report mode the connection to a private address proceeds, with
        // one warning pre-DNS and one forced-dns_rebinding warning post-DNS.
        let (_listener, port) = local_listener().await;
        let records: Arc<Mutex<Vec<BlockReason>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = records.clone();
        let options = Options::new().mode(Mode::Report).logger(move |_, _, event| {
            if let Some(event) = event {
                sink.lock().unwrap().push(event.reason);
            }
        });

        let factory = GuardedConnector::new(TcpConnector::new(Scheme::Http), options);
        let conn = factory
            .connect(&ConnectParams::new("127.0.0.1", port))
            .unwrap()
            .unwrap();
        conn.established().await.unwrap();

        let records = records.lock().unwrap();
        assert_eq!(
            *records,
            vec![BlockReason::PrivateIp, BlockReason::DnsRebinding]
        );
    }

    #[tokio::test]
    async fn test_guarded_allow_mode_connects_anywhere() {
        let (_listener, port) = local_listener().await;
        let factory = GuardedConnector::new(
            TcpConnector::new(Scheme::Http),
            Options::new().mode(Mode::Allow),
        );
        let conn = factory
            .connect(&ConnectParams::new("127.0.0.1", port))
            .unwrap()
            .unwrap();
        assert!(conn.established().await.is_ok());
    }
}
