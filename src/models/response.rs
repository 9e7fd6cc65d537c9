//! Responses returned to clients.
//!
//! Every response is a `(code, message)` pair on the wire. The code is a stable
//! machine-readable identifier; the message is the exact text the client displays.

use std::fmt;

use super::request::RequestKind;

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    DepositSuccessful,
    DepositAccountNotFound,
    DepositFailed,
    InvalidDeposit,

    WithdrawalSuccessful,
    WithdrawalAccountNotFound,
    InsufficientBalance,
    WithdrawalFailed,
    InvalidWithdrawal,

    /// Rendered history report
    History(String),
    NoTransactionsFound,
    InvalidAccount,

    /// Unknown or undecodable request
    InvalidRequest,
}

impl Response {
    /// Validation failure for a request of the given kind.
    pub fn invalid(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Deposit => Response::InvalidDeposit,
            RequestKind::Withdrawal => Response::InvalidWithdrawal,
            RequestKind::History => Response::InvalidAccount,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Response::DepositSuccessful => "deposit_successful",
            Response::DepositAccountNotFound => "deposit_account_not_found",
            Response::DepositFailed => "deposit_failed",
            Response::InvalidDeposit => "invalid_deposit",
            Response::WithdrawalSuccessful => "withdrawal_successful",
            Response::WithdrawalAccountNotFound => "withdrawal_account_not_found",
            Response::InsufficientBalance => "insufficient_balance",
            Response::WithdrawalFailed => "withdrawal_failed",
            Response::InvalidWithdrawal => "invalid_withdrawal",
            Response::History(_) => "history",
            Response::NoTransactionsFound => "no_transactions_found",
            Response::InvalidAccount => "invalid_account",
            Response::InvalidRequest => "invalid_request",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Response::DepositSuccessful => "Deposit Successful!",
            Response::DepositAccountNotFound => "Deposit Failed - Account not found!",
            Response::DepositFailed => "Deposit Failed!",
            Response::InvalidDeposit => "Invalid deposit request.",
            Response::WithdrawalSuccessful => "Withdrawal Successful!",
            Response::WithdrawalAccountNotFound => "Withdrawal Failed - Account not found!",
            Response::InsufficientBalance => "Insufficient Balance!",
            Response::WithdrawalFailed => "Withdrawal Failed!",
            Response::InvalidWithdrawal => "Invalid withdrawal request.",
            Response::History(report) => report,
            Response::NoTransactionsFound => "No Transactions Found!",
            Response::InvalidAccount => "Invalid account number.",
            Response::InvalidRequest => "INVALID_REQUEST",
        }
    }

    /// Rebuild a response from its wire pair. Returns `None` for an unknown code.
    pub fn from_wire(code: &str, message: String) -> Option<Self> {
        let response = match code {
            "deposit_successful" => Response::DepositSuccessful,
            "deposit_account_not_found" => Response::DepositAccountNotFound,
            "deposit_failed" => Response::DepositFailed,
            "invalid_deposit" => Response::InvalidDeposit,
            "withdrawal_successful" => Response::WithdrawalSuccessful,
            "withdrawal_account_not_found" => Response::WithdrawalAccountNotFound,
            "insufficient_balance" => Response::InsufficientBalance,
            "withdrawal_failed" => Response::WithdrawalFailed,
            "invalid_withdrawal" => Response::InvalidWithdrawal,
            "history" => Response::History(message),
            "no_transactions_found" => Response::NoTransactionsFound,
            "invalid_account" => Response::InvalidAccount,
            "invalid_request" => Response::InvalidRequest,
            _ => return None,
        };
        Some(response)
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Response::DepositSuccessful | Response::WithdrawalSuccessful | Response::History(_)
        )
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
