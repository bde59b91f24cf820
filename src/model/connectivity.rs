//! Network reachability: the monitor contract and two implementations

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Source of the yes/no "network reachable" signal
pub trait ConnectivityMonitor: Send + Sync {
    /// Point-in-time snapshot
    fn is_connected(&self) -> bool;

    /// Every subsequent change, pushed
    fn changes(&self) -> BoxStream<'static, bool>;
}

/// Monitor whose value is set by its owner
#[derive(Clone)]
pub struct WatchConnectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl WatchConnectivity {
    pub fn new(connected: bool) -> Self {
        let (tx, _rx) = watch::channel(connected);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_connected(&self, connected: bool) {
        // send_if_modified keeps repeated values out of the change stream
        let changed = self.tx.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
        if changed {
            tracing::info!(connected, "Connectivity changed");
        }
    }
}

impl ConnectivityMonitor for WatchConnectivity {
    fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    fn changes(&self) -> BoxStream<'static, bool> {
        // a fresh receiver starts with the current value marked seen
        let rx = self.tx.subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let value = *rx.borrow_and_update();
            Some((value, rx))
        })
        .boxed()
    }
}

pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Monitor that periodically opens a TCP connection to a host.
///
/// Probing stops when the token passed to [`ProbeConnectivity::spawn`] is
/// cancelled.
#[derive(Clone)]
pub struct ProbeConnectivity {
    state: WatchConnectivity,
}

impl ProbeConnectivity {
    /// Start probing `addr` (`host:port`). Reports disconnected until the
    /// first probe succeeds.
    pub fn spawn(addr: String, interval: Duration, cancel: CancellationToken) -> Self {
        let state = WatchConnectivity::new(false);
        let publisher = state.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(addr, "Connectivity probe stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let reachable = probe(&addr).await;
                        publisher.set_connected(reachable);
                    }
                }
            }
        });

        Self { state }
    }
}

async fn probe(addr: &str) -> bool {
    match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::trace!(addr, error = %e, "Connectivity probe failed");
            false
        }
        Err(_) => {
            tracing::trace!(addr, "Connectivity probe timed out");
            false
        }
    }
}

impl ConnectivityMonitor for ProbeConnectivity {
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn changes(&self) -> BoxStream<'static, bool> {
        self.state.changes()
    }
}

/// `host:port` to probe for an http(s) base URL
pub fn probe_address(base_url: &str) -> Option<String> {
    let url = reqwest::Url::parse(base_url).ok()?;
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    Some(format!("{host}:{port}"))
}
