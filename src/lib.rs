//! Bank Server
//!
//! A TCP server that executes deposit, withdrawal and transaction-history requests
//! against a PostgreSQL ledger with transactional guarantees: money is never lost,
//! duplicated or applied to the wrong account, and concurrent withdrawals on one
//! account serialize on its row lock.
//!
//! # Architecture
//!
//! - **Protocol**: one length-prefixed JSON request and one response per connection
//! - **Concurrency**: one tokio task per connection
//! - **Database**: PostgreSQL with sqlx; each atomic unit borrows its own pooled connection
//! - **Amounts**: fixed-point cents end to end
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Bind the TCP listener
//! 5. Accept connections until Ctrl-C

pub mod client;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;
pub mod services;
pub mod store;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::error::AppError;
use crate::server::AppState;
use crate::store::postgres::PgLedger;

/// Run the server against PostgreSQL until Ctrl-C.
///
/// # Errors
///
/// Fails only during startup: pool creation, migrations or binding the listener.
/// Once accepting, store and client failures are handled per connection.
pub async fn run(config: Config) -> Result<(), AppError> {
    let pool = db::create_pool(
        &config.database_url,
        config.database_max_connections,
        config.store_timeout(),
    )
    .await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "Database pool created"
    );

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let listener = TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("Bank server listening on {}", listener.local_addr()?);

    let state = AppState::new(PgLedger::new(pool), config.server_settings());
    server::serve(listener, state, shutdown_signal()).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Could not listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}
