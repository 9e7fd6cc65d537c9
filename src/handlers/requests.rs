//! Request routing.
//!
//! Maps each decoded request to its service:
//! - DEPOSIT - `transaction_service::execute_deposit`
//! - WITHDRAW - `transaction_service::execute_withdrawal`
//! - TRANSACTION_HISTORY - `history_service::transaction_history`

use crate::models::request::Request;
use crate::models::response::Response;
use crate::server::AppState;
use crate::services::{history_service, transaction_service};
use crate::store::Ledger;

pub async fn handle_request<L: Ledger>(state: &AppState<L>, request: Request) -> Response {
    let limit = state.settings.store_timeout;

    match request {
        Request::Deposit {
            account,
            amount,
            idempotency_key,
        } => {
            transaction_service::execute_deposit(
                &state.ledger,
                &account,
                amount,
                idempotency_key.as_deref(),
                limit,
            )
            .await
        }
        Request::Withdrawal {
            account,
            amount,
            idempotency_key,
        } => {
            transaction_service::execute_withdrawal(
                &state.ledger,
                &account,
                amount,
                idempotency_key.as_deref(),
                limit,
            )
            .await
        }
        Request::History { account } => {
            history_service::transaction_history(
                &state.ledger,
                &account,
                &state.settings.currency_symbol,
                limit,
            )
            .await
        }
    }
}
