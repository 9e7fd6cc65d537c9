//! Wire codec for the one-request/one-response protocol.
//!
//! # Framing
//!
//! Every message is a single frame: a 4-byte big-endian length followed by a UTF-8
//! JSON body. Frames are handled by `LengthDelimitedCodec`; this module only maps
//! bodies to and from [`Request`] and [`Response`].
//!
//! # Request body
//!
//! ```json
//! { "type": "DEPOSIT", "account": "ACC-1", "amount": "500.00", "idempotency_key": "k-1" }
//! ```
//!
//! Amounts travel as decimal strings so no precision is lost in transit.
//!
//! # Response body
//!
//! ```json
//! { "code": "deposit_successful", "message": "Deposit Successful!" }
//! ```

use std::io;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::models::money::{Money, MoneyError};
use crate::models::request::{Request, RequestKind};
use crate::models::response::Response;

/// Largest request frame the server accepts.
pub const MAX_REQUEST_LENGTH: usize = 16 * 1024;

/// Largest response frame; history reports grow with the log.
pub const MAX_RESPONSE_LENGTH: usize = 8 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Socket error, truncated stream or oversized frame.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown request type '{0}'")]
    UnknownKind(String),

    /// Known request type with a missing or unparseable field.
    #[error("Malformed {kind} request: {reason}")]
    Malformed { kind: RequestKind, reason: String },

    #[error("Unknown response code '{0}'")]
    UnknownResponse(String),
}

impl CodecError {
    /// Response owed to a client whose request could not be decoded.
    ///
    /// Returns `None` when the failure is on the transport itself; the peer is gone or
    /// the stream is unusable, so nothing is written.
    pub fn rejection(&self) -> Option<Response> {
        match self {
            CodecError::Io(err) if err.kind() == io::ErrorKind::InvalidData => {
                Some(Response::InvalidRequest)
            }
            CodecError::Io(_) => None,
            CodecError::Malformed { kind, .. } => Some(Response::invalid(*kind)),
            CodecError::Json(_) | CodecError::UnknownKind(_) | CodecError::UnknownResponse(_) => {
                Some(Response::InvalidRequest)
            }
        }
    }
}

/// Request body as the client writes it.
#[derive(Debug, Serialize)]
struct WireRequest {
    #[serde(rename = "type")]
    kind: String,
    account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    idempotency_key: Option<String>,
}

/// Request body as the server reads it.
///
/// Only `type` is typed up front. The other fields are checked once the kind is known,
/// so a field of the wrong JSON type gets that kind's rejection.
#[derive(Debug, Deserialize)]
struct InboundRequest {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    account: Option<Value>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    idempotency_key: Option<Value>,
}

/// A string field, or `None` if absent or null.
fn text_field(value: Option<Value>, name: &str) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(other) => Err(format!("{name} must be a string, got {other}")),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireResponse {
    code: String,
    message: String,
}

impl TryFrom<InboundRequest> for Request {
    type Error = CodecError;

    fn try_from(inbound: InboundRequest) -> Result<Self, Self::Error> {
        let kind = RequestKind::from_tag(&inbound.kind)
            .ok_or(CodecError::UnknownKind(inbound.kind))?;
        let malformed = |reason: String| CodecError::Malformed { kind, reason };

        let account = text_field(inbound.account, "account")
            .map_err(malformed)?
            .ok_or_else(|| malformed("missing account".into()))?;

        if kind == RequestKind::History {
            return Ok(Request::History { account });
        }

        let amount: Money = text_field(inbound.amount, "amount")
            .map_err(malformed)?
            .ok_or_else(|| malformed("missing amount".into()))?
            .parse()
            .map_err(|err: MoneyError| malformed(err.to_string()))?;
        let idempotency_key = text_field(inbound.idempotency_key, "idempotency_key")
            .map_err(malformed)?
            .filter(|key| !key.is_empty());

        Ok(match kind {
            RequestKind::Deposit => Request::Deposit {
                account,
                amount,
                idempotency_key,
            },
            _ => Request::Withdrawal {
                account,
                amount,
                idempotency_key,
            },
        })
    }
}

impl From<&Request> for WireRequest {
    fn from(request: &Request) -> Self {
        let (amount, idempotency_key) = match request {
            Request::Deposit {
                amount,
                idempotency_key,
                ..
            }
            | Request::Withdrawal {
                amount,
                idempotency_key,
                ..
            } => (Some(amount.to_string()), idempotency_key.clone()),
            Request::History { .. } => (None, None),
        };

        WireRequest {
            kind: request.kind().as_str().to_string(),
            account: request.account().to_string(),
            amount,
            idempotency_key,
        }
    }
}

fn frames(max_frame_length: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_length)
        .new_codec()
}

/// Server side: decodes requests, encodes responses.
#[derive(Debug)]
pub struct ServerCodec {
    requests: LengthDelimitedCodec,
    responses: LengthDelimitedCodec,
}

impl ServerCodec {
    pub fn new() -> Self {
        Self {
            requests: frames(MAX_REQUEST_LENGTH),
            responses: frames(MAX_RESPONSE_LENGTH),
        }
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ServerCodec {
    type Item = Request;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.requests.decode(src)? else {
            return Ok(None);
        };
        let inbound: InboundRequest = serde_json::from_slice(&frame)?;
        Request::try_from(inbound).map(Some)
    }
}

impl Encoder<Response> for ServerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&WireResponse {
            code: item.code().to_string(),
            message: item.message().to_string(),
        })?;
        self.responses.encode(Bytes::from(body), dst)?;
        Ok(())
    }
}

/// Client side: encodes requests, decodes responses.
#[derive(Debug)]
pub struct ClientCodec {
    requests: LengthDelimitedCodec,
    responses: LengthDelimitedCodec,
}

impl ClientCodec {
    pub fn new() -> Self {
        Self {
            requests: frames(MAX_REQUEST_LENGTH),
            responses: frames(MAX_RESPONSE_LENGTH),
        }
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Encoder<&'a Request> for ClientCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &'a Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&WireRequest::from(item))?;
        self.requests.encode(Bytes::from(body), dst)?;
        Ok(())
    }
}

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.responses.decode(src)? else {
            return Ok(None);
        };
        let wire: WireResponse = serde_json::from_slice(&frame)?;
        Response::from_wire(&wire.code, wire.message)
            .map(Some)
            .ok_or(CodecError::UnknownResponse(wire.code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use rstest::rstest;

    fn frame(body: &str) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32(body.len() as u32);
        buf.put_slice(body.as_bytes());
        buf
    }

    fn decode(body: &str) -> Result<Option<Request>, CodecError> {
        ServerCodec::new().decode(&mut frame(body))
    }

    #[test]
    fn decodes_deposit_with_exact_amount() {
        let request = decode(r#"{"type":"DEPOSIT","account":"ACC-1","amount":"500.05"}"#)
            .unwrap()
            .unwrap();

        assert_eq!(
            request,
            Request::Deposit {
                account: "ACC-1".into(),
                amount: Money::from_cents(50_005),
                idempotency_key: None,
            }
        );
    }

    #[test]
    fn decodes_withdrawal_with_idempotency_key() {
        let request = decode(
            r#"{"type":"WITHDRAW","account":"ACC-1","amount":"20","idempotency_key":"k-1"}"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            request,
            Request::Withdrawal {
                account: "ACC-1".into(),
                amount: Money::from_cents(2_000),
                idempotency_key: Some("k-1".into()),
            }
        );
    }

    #[test]
    fn empty_idempotency_key_is_ignored() {
        let request =
            decode(r#"{"type":"DEPOSIT","account":"A","amount":"1","idempotency_key":""}"#)
                .unwrap()
                .unwrap();

        assert!(matches!(
            request,
            Request::Deposit {
                idempotency_key: None,
                ..
            }
        ));
    }

    #[test]
    fn history_ignores_amount() {
        let request = decode(r#"{"type":"TRANSACTION_HISTORY","account":"ACC-9","amount":"x"}"#)
            .unwrap()
            .unwrap();

        assert_eq!(
            request,
            Request::History {
                account: "ACC-9".into()
            }
        );
    }

    #[test]
    fn non_positive_amounts_still_decode() {
        let request = decode(r#"{"type":"WITHDRAW","account":"A","amount":"-5"}"#)
            .unwrap()
            .unwrap();

        assert!(matches!(request, Request::Withdrawal { amount, .. } if amount == Money::from_cents(-500)));
    }

    #[rstest]
    #[case::unknown_type(r#"{"type":"TRANSFER","account":"A"}"#, Response::InvalidRequest)]
    #[case::missing_type(r#"{"account":"A"}"#, Response::InvalidRequest)]
    #[case::not_json("DEPOSIT A 10", Response::InvalidRequest)]
    #[case::not_an_object("42", Response::InvalidRequest)]
    #[case::deposit_without_amount(r#"{"type":"DEPOSIT","account":"A"}"#, Response::InvalidDeposit)]
    #[case::deposit_float_noise(
        r#"{"type":"DEPOSIT","account":"A","amount":"0.1000001"}"#,
        Response::InvalidDeposit
    )]
    #[case::withdrawal_bad_amount(
        r#"{"type":"WITHDRAW","account":"A","amount":"lots"}"#,
        Response::InvalidWithdrawal
    )]
    #[case::withdrawal_without_account(
        r#"{"type":"WITHDRAW","amount":"1"}"#,
        Response::InvalidWithdrawal
    )]
    #[case::history_without_account(r#"{"type":"TRANSACTION_HISTORY"}"#, Response::InvalidAccount)]
    #[case::non_string_type(r#"{"type":7,"account":"A"}"#, Response::InvalidRequest)]
    #[case::deposit_numeric_amount(
        r#"{"type":"DEPOSIT","account":"A","amount":500.0}"#,
        Response::InvalidDeposit
    )]
    #[case::deposit_null_amount(
        r#"{"type":"DEPOSIT","account":"A","amount":null}"#,
        Response::InvalidDeposit
    )]
    #[case::withdrawal_numeric_account(
        r#"{"type":"WITHDRAW","account":7,"amount":"1"}"#,
        Response::InvalidWithdrawal
    )]
    #[case::withdrawal_object_key(
        r#"{"type":"WITHDRAW","account":"A","amount":"1","idempotency_key":{}}"#,
        Response::InvalidWithdrawal
    )]
    #[case::history_numeric_account(
        r#"{"type":"TRANSACTION_HISTORY","account":42}"#,
        Response::InvalidAccount
    )]
    fn undecodable_requests_get_a_rejection(#[case] body: &str, #[case] expected: Response) {
        let err = decode(body).unwrap_err();
        assert_eq!(err.rejection(), Some(expected));
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let mut buf = frame(r#"{"type":"DEPOSIT","account":"A","amount":"1"}"#);
        let mut head = buf.split_to(10);

        let mut codec = ServerCodec::new();
        assert!(codec.decode(&mut head).unwrap().is_none());

        head.unsplit(buf);
        assert!(codec.decode(&mut head).unwrap().is_some());
    }

    #[test]
    fn oversized_frame_is_rejected_as_invalid_request() {
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_REQUEST_LENGTH + 1) as u32);

        let err = ServerCodec::new().decode(&mut buf).unwrap_err();
        assert_eq!(err.rejection(), Some(Response::InvalidRequest));
    }

    #[test]
    fn transport_errors_get_no_rejection() {
        let err = CodecError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(err.rejection(), None);
    }

    #[test]
    fn client_request_is_readable_by_server() {
        let request = Request::Withdrawal {
            account: "ACC-1".into(),
            amount: Money::from_cents(150_000),
            idempotency_key: Some("abc".into()),
        };

        let mut buf = BytesMut::new();
        ClientCodec::new().encode(&request, &mut buf).unwrap();
        assert_eq!(ServerCodec::new().decode(&mut buf).unwrap(), Some(request));
        assert!(buf.is_empty());
    }

    #[test]
    fn server_response_is_readable_by_client() {
        let report = "Current Balance: ₹0.00\n\n2026-01-01 10:00:00 - Deposit: ₹5.00\n";

        let mut buf = BytesMut::new();
        ServerCodec::new()
            .encode(Response::History(report.into()), &mut buf)
            .unwrap();

        assert_eq!(
            ClientCodec::new().decode(&mut buf).unwrap(),
            Some(Response::History(report.into()))
        );
    }

    #[test]
    fn client_rejects_unknown_response_code() {
        let mut buf = frame(r#"{"code":"teapot","message":"short and stout"}"#);
        let err = ClientCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::UnknownResponse(code) if code == "teapot"));
    }
}
