//! Command-line relay: sends one request to the bank server and prints the answer.
//!
//! ```text
//! bank-client deposit ACC-1 500.00
//! bank-client --server 10.0.0.5:5000 withdraw ACC-1 20 --idempotency-key retry-42
//! bank-client history ACC-1
//! ```

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rust_bank_server::client::{BankClient, new_idempotency_key};
use rust_bank_server::models::money::Money;
use tracing_subscriber::EnvFilter;

/// Send one request to the bank server
#[derive(Parser, Debug)]
#[command(name = "bank-client")]
#[command(about = "Send one deposit, withdrawal or history request to the bank server", long_about = None)]
struct CliArgs {
    /// Server address
    #[arg(long, value_name = "HOST:PORT", default_value = "127.0.0.1:5000")]
    server: String,

    /// Connect, send and receive timeout
    #[arg(long, value_name = "SECONDS", default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add money to an account
    Deposit {
        account: String,
        amount: Money,
        /// Reuse the key printed by a timed-out attempt to retry it safely
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Take money out of an account
    Withdraw {
        account: String,
        amount: Money,
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Show the balance and all transactions, newest first
    History { account: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args = CliArgs::parse();
    let client = BankClient::new(args.server).with_timeout(Duration::from_secs(args.timeout));

    let result = match args.command {
        Command::Deposit {
            account,
            amount,
            idempotency_key,
        } => {
            let key = idempotency_key.unwrap_or_else(new_idempotency_key);
            eprintln!("idempotency key: {key}");
            client.deposit(&account, amount, Some(key)).await
        }
        Command::Withdraw {
            account,
            amount,
            idempotency_key,
        } => {
            let key = idempotency_key.unwrap_or_else(new_idempotency_key);
            eprintln!("idempotency key: {key}");
            client.withdraw(&account, amount, Some(key)).await
        }
        Command::History { account } => client.history(&account).await,
    };

    let response = result?;
    println!("{response}");

    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
