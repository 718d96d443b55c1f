//! Wire Types
//!
//! Every request and every response is one MessagePack map followed by a
//! single newline byte.
//!
//! ## Requests
//!
//! | field    | required       | meaning                                  |
//! |----------|----------------|------------------------------------------|
//! | `cmd`    | always         | `get`, `set` or `del`                    |
//! | `key`    | always         | the key, as `str` or `bin`               |
//! | `value`  | `set` only     | any MessagePack value                    |
//! | `expire` | optional `set` | TTL in seconds; absent or `<= 0` = never |
//!
//! ## Responses
//!
//! | field    | present when                                     |
//! |----------|--------------------------------------------------|
//! | `status` | always; `true` on success                        |
//! | `value`  | a `get` found a live entry                       |
//! | `msg`    | `"OK"` after `set`/`del`, or the error message   |
//! | `code`   | errors only: 100, 200, 300 or 400                |

use bytes::Bytes;
use rmpv::Value;
use std::fmt;
use tracing::error;

/// Byte that terminates every request and response.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Error codes carried in the `code` field of a failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The request was not a decodable MessagePack map
    CommandDecode,
    /// A required field was missing or had the wrong type
    CommandFormat,
    /// The `cmd` field named an unknown command
    CommandNotFound,
    /// The store failed to execute the command
    CommandExecute,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            ErrorCode::CommandDecode => 100,
            ErrorCode::CommandFormat => 200,
            ErrorCode::CommandNotFound => 300,
            ErrorCode::CommandExecute => 400,
        }
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            100 => Some(ErrorCode::CommandDecode),
            200 => Some(ErrorCode::CommandFormat),
            300 => Some(ErrorCode::CommandNotFound),
            400 => Some(ErrorCode::CommandExecute),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A validated client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Get { key: String },
    Set { key: String, value: Value, ttl: i64 },
    Del { key: String },
}

impl Request {
    /// The lowercase command token sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Get { .. } => "get",
            Request::Set { .. } => "set",
            Request::Del { .. } => "del",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Request::Get { key } | Request::Set { key, .. } | Request::Del { key } => key,
        }
    }

    /// Builds the request map. `expire` is only sent for a positive TTL.
    pub fn to_wire(&self) -> Value {
        let mut fields = vec![
            (Value::from("cmd"), Value::from(self.name())),
            (Value::from("key"), Value::from(self.key())),
        ];
        if let Request::Set { value, ttl, .. } = self {
            fields.push((Value::from("value"), value.clone()));
            if *ttl > 0 {
                fields.push((Value::from("expire"), Value::from(*ttl)));
            }
        }
        Value::Map(fields)
    }

    /// Encodes the request as one newline-terminated frame.
    pub fn serialize(&self) -> Bytes {
        frame(&self.to_wire())
    }
}

/// A response to a single request.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Result of a `get`. `None` when the key is absent or expired.
    Value(Option<Value>),

    /// Acknowledges a `set` or `del`.
    Ok,

    /// Any failed request.
    Error { code: ErrorCode, msg: String },
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok
    }

    pub fn value(value: Option<Value>) -> Self {
        Response::Value(value)
    }

    pub fn error(code: ErrorCode, msg: impl Into<String>) -> Self {
        Response::Error {
            code,
            msg: msg.into(),
        }
    }

    /// The `status` field: false only for errors.
    pub fn is_success(&self) -> bool {
        !matches!(self, Response::Error { .. })
    }

    /// Builds the response map, always ending with `status`.
    pub fn to_wire(&self) -> Value {
        let mut fields = Vec::with_capacity(3);
        match self {
            Response::Value(Some(value)) => {
                fields.push((Value::from("value"), value.clone()));
            }
            Response::Value(None) => {}
            Response::Ok => {
                fields.push((Value::from("msg"), Value::from("OK")));
            }
            Response::Error { code, msg } => {
                fields.push((Value::from("code"), Value::from(code.as_u16())));
                fields.push((Value::from("msg"), Value::from(msg.as_str())));
            }
        }
        fields.push((Value::from("status"), Value::from(self.is_success())));
        Value::Map(fields)
    }

    /// Encodes the response as one newline-terminated frame.
    pub fn serialize(&self) -> Bytes {
        frame(&self.to_wire())
    }
}

/// Encodes `value` and appends the frame delimiter.
fn frame(value: &Value) -> Bytes {
    let mut buf = Vec::with_capacity(64);
    if let Err(e) = rmpv::encode::write_value(&mut buf, value) {
        error!(error = %e, "Frame encode error");
    }
    buf.push(FRAME_DELIMITER);
    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(frame: &[u8]) -> Value {
        assert_eq!(frame.last(), Some(&FRAME_DELIMITER));
        rmpv::decode::read_value(&mut &frame[..frame.len() - 1]).unwrap()
    }

    fn field<'a>(map: &'a Value, name: &str) -> Option<&'a Value> {
        map.as_map()
            .unwrap()
            .iter()
            .find(|(k, _)| k.as_str() == Some(name))
            .map(|(_, v)| v)
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::CommandDecode.as_u16(), 100);
        assert_eq!(ErrorCode::CommandFormat.as_u16(), 200);
        assert_eq!(ErrorCode::CommandNotFound.as_u16(), 300);
        assert_eq!(ErrorCode::CommandExecute.as_u16(), 400);
        assert_eq!(ErrorCode::from_u16(300), Some(ErrorCode::CommandNotFound));
        assert_eq!(ErrorCode::from_u16(500), None);
    }

    #[test]
    fn test_ok_response() {
        let wire = decode(&Response::ok().serialize());

        assert_eq!(field(&wire, "msg").and_then(Value::as_str), Some("OK"));
        assert_eq!(field(&wire, "status").and_then(Value::as_bool), Some(true));
        assert!(field(&wire, "code").is_none());
    }

    #[test]
    fn test_value_response() {
        let wire = decode(&Response::value(Some(Value::from("1"))).serialize());
        assert_eq!(field(&wire, "value").and_then(Value::as_str), Some("1"));
        assert_eq!(field(&wire, "status").and_then(Value::as_bool), Some(true));

        let wire = decode(&Response::value(None).serialize());
        assert!(field(&wire, "value").is_none());
        assert_eq!(field(&wire, "status").and_then(Value::as_bool), Some(true));
    }

    #[test]
    fn test_error_response() {
        let response = Response::error(ErrorCode::CommandFormat, "key 'cmd' not found");
        assert!(!response.is_success());

        let wire = decode(&response.serialize());
        assert_eq!(field(&wire, "code").and_then(Value::as_u64), Some(200));
        assert_eq!(
            field(&wire, "msg").and_then(Value::as_str),
            Some("key 'cmd' not found")
        );
        assert_eq!(field(&wire, "status").and_then(Value::as_bool), Some(false));
    }

    #[test]
    fn test_request_wire_fields() {
        let wire = decode(
            &Request::Set {
                key: "k".into(),
                value: Value::from(5),
                ttl: 0,
            }
            .serialize(),
        );
        assert_eq!(field(&wire, "cmd").and_then(Value::as_str), Some("set"));
        assert_eq!(field(&wire, "key").and_then(Value::as_str), Some("k"));
        assert_eq!(field(&wire, "value").and_then(Value::as_i64), Some(5));
        assert!(field(&wire, "expire").is_none());

        let wire = decode(
            &Request::Set {
                key: "k".into(),
                value: Value::from(5),
                ttl: 30,
            }
            .serialize(),
        );
        assert_eq!(field(&wire, "expire").and_then(Value::as_i64), Some(30));
    }
}
