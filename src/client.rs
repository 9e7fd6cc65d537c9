//! Client relay.
//!
//! Opens one connection per request, sends the request, reads the single response
//! and closes. Every step is bounded by the client timeout (5 seconds by default).

use std::io;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::{ClientCodec, CodecError};
use crate::models::money::Money;
use crate::models::request::Request;
use crate::models::response::Response;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Could not connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    /// The outcome of a mutating request sent before the timeout is unknown; retry it
    /// only with the same idempotency key.
    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Server closed the connection without responding")]
    NoResponse,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Generate a fresh idempotency key for a mutating request.
pub fn new_idempotency_key() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone)]
pub struct BankClient {
    addr: String,
    timeout: Duration,
}

impl BankClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn deposit(
        &self,
        account: &str,
        amount: Money,
        idempotency_key: Option<String>,
    ) -> Result<Response, ClientError> {
        self.send(&Request::Deposit {
            account: account.to_string(),
            amount,
            idempotency_key,
        })
        .await
    }

    pub async fn withdraw(
        &self,
        account: &str,
        amount: Money,
        idempotency_key: Option<String>,
    ) -> Result<Response, ClientError> {
        self.send(&Request::Withdrawal {
            account: account.to_string(),
            amount,
            idempotency_key,
        })
        .await
    }

    pub async fn history(&self, account: &str) -> Result<Response, ClientError> {
        self.send(&Request::History {
            account: account.to_string(),
        })
        .await
    }

    /// Send one request over a fresh connection and wait for its response.
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let stream = timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
            .map_err(|source| ClientError::Connect {
                addr: self.addr.clone(),
                source,
            })?;

        let mut framed = Framed::new(stream, ClientCodec::new());

        timeout(self.timeout, framed.send(request))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;

        let received = timeout(self.timeout, framed.next()).await;
        match received {
            Err(_) => Err(ClientError::Timeout(self.timeout)),
            Ok(None) => Err(ClientError::NoResponse),
            Ok(Some(response)) => Ok(response?),
        }
    }
}
