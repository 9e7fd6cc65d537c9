//! End-to-end tests over real TCP connections.
//!
//! Each test starts the server on an ephemeral localhost port backed by the in-memory
//! ledger, talks to it with `BankClient` or with hand-written frames, and checks both
//! the responses and the resulting ledger state.

use std::net::SocketAddr;
use std::time::Duration;

use rust_bank_server::client::BankClient;
use rust_bank_server::models::money::Money;
use rust_bank_server::models::response::Response;
use rust_bank_server::models::transaction::TransactionKind;
use rust_bank_server::server::{AppState, ServerSettings, serve};
use rust_bank_server::store::Ledger;
use rust_bank_server::store::memory::MemoryLedger;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    ledger: MemoryLedger,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start(ledger: MemoryLedger) -> Self {
        Self::start_with(ledger, ServerSettings::default()).await
    }

    async fn start_with(ledger: MemoryLedger, settings: ServerSettings) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, stop) = oneshot::channel::<()>();

        let state = AppState::new(ledger.clone(), settings);
        let handle = tokio::spawn(serve(listener, state, async move {
            let _ = stop.await;
        }));

        Self {
            addr,
            ledger,
            shutdown,
            handle,
        }
    }

    fn client(&self) -> BankClient {
        BankClient::new(self.addr.to_string())
    }

    async fn balance(&self, account_id: &str) -> Money {
        self.ledger
            .find_account(account_id)
            .await
            .unwrap()
            .expect("account exists")
            .balance
    }
}

fn cents(value: i64) -> Money {
    Money::from_cents(value)
}

async fn write_frame(stream: &mut TcpStream, body: &str) {
    stream.write_u32(body.len() as u32).await.unwrap();
    stream.write_all(body.as_bytes()).await.unwrap();
}

async fn read_frame(stream: &mut TcpStream) -> Value {
    let len = stream.read_u32().await.unwrap();
    let mut buf = vec![0; len as usize];
    stream.read_exact(&mut buf).await.unwrap();
    serde_json::from_slice(&buf).unwrap()
}

/// Send one raw JSON body as a frame and return the decoded response body.
async fn exchange_raw(addr: SocketAddr, body: &str) -> Value {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    write_frame(&mut stream, body).await;
    read_frame(&mut stream).await
}

#[tokio::test]
async fn deposit_withdraw_history_scenario() {
    let server = TestServer::start(MemoryLedger::with_accounts([("ACC-1", cents(100_000))])).await;
    let client = server.client();

    let response = client.deposit("ACC-1", cents(50_000), None).await.unwrap();
    assert_eq!(response.message(), "Deposit Successful!");
    assert_eq!(server.balance("ACC-1").await, cents(150_000));

    let response = client.withdraw("ACC-1", cents(200_000), None).await.unwrap();
    assert_eq!(response.message(), "Insufficient Balance!");
    assert_eq!(server.balance("ACC-1").await, cents(150_000));

    let response = client.withdraw("ACC-1", cents(150_000), None).await.unwrap();
    assert_eq!(response.message(), "Withdrawal Successful!");
    assert_eq!(server.balance("ACC-1").await, Money::ZERO);

    let Response::History(report) = client.history("ACC-1").await.unwrap() else {
        panic!("expected a history report");
    };
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "Current Balance: ₹0.00");
    assert!(lines[2].ends_with(" - Withdrawal: ₹1500.00"), "{report}");
    assert!(lines[3].ends_with(" - Deposit: ₹500.00"), "{report}");
    assert_eq!(lines.len(), 4);

    let kinds: Vec<TransactionKind> = server
        .ledger
        .records()
        .await
        .iter()
        .map(|record| record.kind)
        .collect();
    assert_eq!(kinds, vec![TransactionKind::Deposit, TransactionKind::Withdrawal]);
}

#[tokio::test]
async fn deposit_to_unknown_account_leaves_store_untouched() {
    let server = TestServer::start(MemoryLedger::with_accounts([("ACC-1", cents(100))])).await;

    let response = server.client().deposit("ZZZ", cents(500), None).await.unwrap();

    assert_eq!(response.message(), "Deposit Failed - Account not found!");
    assert!(server.ledger.records().await.is_empty());
    assert_eq!(server.balance("ACC-1").await, cents(100));
}

#[tokio::test]
async fn history_for_unknown_account() {
    let server = TestServer::start(MemoryLedger::new()).await;

    let response = server.client().history("nobody").await.unwrap();

    assert_eq!(response, Response::NoTransactionsFound);
    assert_eq!(response.message(), "No Transactions Found!");
}

#[tokio::test]
async fn unknown_request_type_gets_invalid_request() {
    let server = TestServer::start(MemoryLedger::with_accounts([("ACC-1", cents(100))])).await;

    let body = exchange_raw(server.addr, r#"{"type":"TRANSFER","account":"ACC-1"}"#).await;
    assert_eq!(body["code"], "invalid_request");
    assert_eq!(body["message"], "INVALID_REQUEST");

    // The server keeps serving afterwards
    let response = server.client().deposit("ACC-1", cents(1), None).await.unwrap();
    assert_eq!(response, Response::DepositSuccessful);
}

#[tokio::test]
async fn malformed_amount_gets_kind_specific_rejection() {
    let server = TestServer::start(MemoryLedger::with_accounts([("ACC-1", cents(100))])).await;

    let body = exchange_raw(
        server.addr,
        r#"{"type":"WITHDRAW","account":"ACC-1","amount":"12.345"}"#,
    )
    .await;

    assert_eq!(body["message"], "Invalid withdrawal request.");
    assert_eq!(server.balance("ACC-1").await, cents(100));
}

#[tokio::test]
async fn non_positive_amount_is_invalid_over_the_wire() {
    let server = TestServer::start(MemoryLedger::with_accounts([("ACC-1", cents(100))])).await;

    let body = exchange_raw(
        server.addr,
        r#"{"type":"DEPOSIT","account":"ACC-1","amount":"0"}"#,
    )
    .await;

    assert_eq!(body["message"], "Invalid deposit request.");
    assert!(server.ledger.records().await.is_empty());
}

#[tokio::test]
async fn client_disconnect_does_not_affect_other_clients() {
    let server = TestServer::start(MemoryLedger::with_accounts([("ACC-1", cents(100))])).await;

    // Connect and hang up without sending anything
    drop(TcpStream::connect(server.addr).await.unwrap());

    // Send half a frame and hang up
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_u32(64).await.unwrap();
    stream.write_all(b"{\"type\":").await.unwrap();
    drop(stream);

    let response = server.client().withdraw("ACC-1", cents(40), None).await.unwrap();
    assert_eq!(response, Response::WithdrawalSuccessful);
    assert_eq!(server.balance("ACC-1").await, cents(60));
}

#[tokio::test]
async fn idle_connection_is_closed_after_read_timeout() {
    let settings = ServerSettings {
        read_timeout: Duration::from_millis(200),
        ..ServerSettings::default()
    };
    let server = TestServer::start_with(MemoryLedger::new(), settings).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("server should close the idle connection");

    // Closed without a response
    assert_eq!(read.unwrap_or(0), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_withdrawals_over_tcp_never_overdraw() {
    let server = TestServer::start(MemoryLedger::with_accounts([("ACC-1", cents(100_000))])).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let client = server.client();
            tokio::spawn(async move { client.withdraw("ACC-1", cents(30_000), None).await })
        })
        .collect();

    let mut withdrawn = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            Response::WithdrawalSuccessful => withdrawn += 30_000,
            Response::InsufficientBalance => {}
            other => panic!("unexpected response: {other:?}"),
        }
    }

    assert_eq!(withdrawn, 90_000);
    assert_eq!(server.balance("ACC-1").await, cents(10_000));
}

#[tokio::test]
async fn retried_withdrawal_with_same_key_applies_once() {
    let server = TestServer::start(MemoryLedger::with_accounts([("ACC-1", cents(1_000))])).await;
    let client = server.client();
    let key = rust_bank_server::client::new_idempotency_key();

    for _ in 0..3 {
        let response = client
            .withdraw("ACC-1", cents(300), Some(key.clone()))
            .await
            .unwrap();
        assert_eq!(response, Response::WithdrawalSuccessful);
    }

    assert_eq!(server.balance("ACC-1").await, cents(700));
    assert_eq!(server.ledger.records().await.len(), 1);
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let server = TestServer::start(MemoryLedger::new()).await;
    let addr = server.addr;

    server.shutdown.send(()).unwrap();
    server.handle.await.unwrap();

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn amount_sent_as_json_number_is_invalid() {
    let server = TestServer::start(MemoryLedger::with_accounts([("ACC-1", cents(100))])).await;

    let body = exchange_raw(
        server.addr,
        r#"{"type":"DEPOSIT","account":"ACC-1","amount":500.0}"#,
    )
    .await;

    assert_eq!(body["code"], "invalid_deposit");
    assert_eq!(body["message"], "Invalid deposit request.");
    assert_eq!(server.balance("ACC-1").await, cents(100));
}

#[tokio::test]
async fn store_timeout_rolls_back_and_frees_the_ledger() {
    let settings = ServerSettings {
        store_timeout: Duration::from_millis(100),
        ..ServerSettings::default()
    };
    let server = TestServer::start_with(
        MemoryLedger::with_accounts([("ACC-1", cents(100_000))]),
        settings,
    )
    .await;
    let client = server.client();
    server.ledger.stall_appends(Duration::from_secs(2));

    let response = client.deposit("ACC-1", cents(50_000), None).await.unwrap();

    assert_eq!(response.message(), "Deposit Failed!");
    assert_eq!(server.balance("ACC-1").await, cents(100_000));
    assert!(server.ledger.records().await.is_empty());

    server.ledger.stall_appends(Duration::ZERO);
    let response = client.deposit("ACC-1", cents(50_000), None).await.unwrap();

    assert_eq!(response, Response::DepositSuccessful);
    assert_eq!(server.balance("ACC-1").await, cents(150_000));
}

#[tokio::test]
async fn accepted_connection_is_served_after_shutdown() {
    let TestServer {
        addr,
        ledger,
        shutdown,
        handle,
    } = TestServer::start(MemoryLedger::with_accounts([("ACC-1", cents(100))])).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    // Let the accept loop pick the connection up
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished(), "serve returned with a connection open");

    write_frame(
        &mut stream,
        r#"{"type":"DEPOSIT","account":"ACC-1","amount":"2.50"}"#,
    )
    .await;
    let body = read_frame(&mut stream).await;
    assert_eq!(body["message"], "Deposit Successful!");

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("serve returns once the connection is done")
        .unwrap();

    let account = ledger.find_account("ACC-1").await.unwrap().unwrap();
    assert_eq!(account.balance, cents(350));
}
