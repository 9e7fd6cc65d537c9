//! TCP accept loop.
//!
//! Every accepted connection is served by its own task, concurrently with all others.
//! Tasks share nothing but the [`AppState`]: the ledger handle (a pool for PostgreSQL)
//! and read-only settings. Ordering between connections is whatever the ledger's row
//! locks impose.
//!
//! On shutdown the listener stops accepting and [`serve`] waits for the connections it
//! already accepted, up to [`ServerSettings::drain_timeout`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::handlers::connection::handle_connection;
use crate::store::Ledger;

/// Back-off after a failed `accept`, e.g. when the process is out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Per-connection limits and presentation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Bound on receiving the request frame and on writing the response frame
    pub read_timeout: Duration,

    /// Bound on the whole store operation; exceeding it rolls the unit back
    pub store_timeout: Duration,

    /// Prefix for amounts in history reports
    pub currency_symbol: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            store_timeout: Duration::from_secs(5),
            currency_symbol: "₹".to_string(),
        }
    }
}

impl ServerSettings {
    /// Longest a connection can stay open: read the request, run the store work, write
    /// the response. Also how long shutdown waits for open connections.
    pub fn drain_timeout(&self) -> Duration {
        self.read_timeout * 2 + self.store_timeout
    }
}

/// State cloned into every connection task.
#[derive(Debug, Clone)]
pub struct AppState<L> {
    pub ledger: L,
    pub settings: Arc<ServerSettings>,
}

impl<L> AppState<L> {
    pub fn new(ledger: L, settings: ServerSettings) -> Self {
        Self {
            ledger,
            settings: Arc::new(settings),
        }
    }
}

/// Accept connections until `shutdown` resolves, then wait for the ones already
/// accepted to finish.
///
/// Each connection ends on its own once its single response is written or a timeout
/// fires. Connections still open after the drain timeout are abandoned.
pub async fn serve<L, S>(listener: TcpListener, state: AppState<L>, shutdown: S)
where
    L: Ledger,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let connections = TaskTracker::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let state = state.clone();
                    let span = tracing::info_span!("connection", %peer);

                    connections.spawn(
                        async move {
                            if let Err(err) = handle_connection(stream, state).await {
                                tracing::warn!(error = %err, "Connection aborted");
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    drop(listener);
    connections.close();
    tracing::info!(
        open = connections.len(),
        "Shutdown requested, no longer accepting connections"
    );

    let drain = state.settings.drain_timeout();
    if timeout(drain, connections.wait()).await.is_err() {
        tracing::warn!(
            open = connections.len(),
            ?drain,
            "Connections still open after drain timeout"
        );
    }
}
