//! Requests accepted by the server.

use std::fmt;

use super::money::Money;

/// One decoded client request.
///
/// Amounts are carried as parsed but not yet validated: a zero or negative amount is
/// a well-formed request that the transaction handler rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Deposit {
        account: String,
        amount: Money,
        idempotency_key: Option<String>,
    },
    Withdrawal {
        account: String,
        amount: Money,
        idempotency_key: Option<String>,
    },
    History {
        account: String,
    },
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Deposit { .. } => RequestKind::Deposit,
            Request::Withdrawal { .. } => RequestKind::Withdrawal,
            Request::History { .. } => RequestKind::History,
        }
    }

    pub fn account(&self) -> &str {
        match self {
            Request::Deposit { account, .. }
            | Request::Withdrawal { account, .. }
            | Request::History { account } => account,
        }
    }
}

/// Request type tag as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Deposit,
    Withdrawal,
    History,
}

impl RequestKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            RequestKind::Deposit => "DEPOSIT",
            RequestKind::Withdrawal => "WITHDRAW",
            RequestKind::History => "TRANSACTION_HISTORY",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "DEPOSIT" => Some(RequestKind::Deposit),
            "WITHDRAW" => Some(RequestKind::Withdrawal),
            "TRANSACTION_HISTORY" => Some(RequestKind::History),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
