//! Per-connection state machine.
//!
//! `Accepted → ReadRequest → Dispatch → WriteResponse → Closed`
//!
//! Exactly one request and one response per connection. The response is encoded into
//! a complete frame before anything is written, so a client never sees half a
//! response; if the write itself fails the peer is gone and the socket is dropped.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::codec::ServerCodec;
use crate::error::ConnectionError;
use crate::models::response::Response;
use crate::server::AppState;
use crate::store::Ledger;

use super::requests::handle_request;

/// Serve one client connection to completion.
///
/// # Errors
///
/// Returns a [`ConnectionError`] for transport failures: the client disconnected, sent
/// a truncated frame, or was too slow to send its request or read the response. No
/// response is written in those cases. Requests that arrive but cannot be decoded
/// are not errors; they are answered with a rejection and the connection closes
/// normally.
pub async fn handle_connection<L: Ledger>(
    stream: TcpStream,
    state: AppState<L>,
) -> Result<(), ConnectionError> {
    let settings = state.settings.clone();
    let mut framed = Framed::new(stream, ServerCodec::new());

    let received = timeout(settings.read_timeout, framed.next()).await;
    let request = match received {
        Err(_) => return Err(ConnectionError::ReadTimeout),
        Ok(None) => return Err(ConnectionError::Disconnected),
        Ok(Some(Ok(request))) => request,
        Ok(Some(Err(err))) => {
            let Some(rejection) = err.rejection() else {
                return Err(err.into());
            };
            tracing::warn!(error = %err, code = rejection.code(), "Rejecting request");
            return write_response(&mut framed, rejection, settings.read_timeout).await;
        }
    };

    let kind = request.kind();
    tracing::debug!(%kind, account = request.account(), "Request received");

    // Store work is bounded by the services, which stop the clock before committing
    let response = handle_request(&state, request).await;

    tracing::info!(%kind, code = response.code(), "Request served");
    write_response(&mut framed, response, settings.read_timeout).await
}

async fn write_response(
    framed: &mut Framed<TcpStream, ServerCodec>,
    response: Response,
    limit: Duration,
) -> Result<(), ConnectionError> {
    match timeout(limit, framed.send(response)).await {
        Ok(sent) => sent.map_err(ConnectionError::from),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}
