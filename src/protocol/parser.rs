//! Request and Response Parsing
//!
//! Turns one frame (the bytes of a single line, delimiter already removed)
//! into a typed [`Request`] or [`Response`].
//!
//! Validation happens in a fixed order, and the first failure decides the
//! error code:
//! 1. The frame must decode as a MessagePack map with textual keys (100)
//! 2. `cmd` must be present and textual (200)
//! 3. `cmd` must name a known command, in any ASCII case (300)
//! 4. The command's own fields must be present and well-typed (200)
//!
//! `str` and `bin` are interchangeable wherever text is expected and are
//! normalized to `String` here, so nothing downstream sees raw bytes.

use crate::protocol::types::{ErrorCode, Request, Response};
use crate::storage::convert;
use rmpv::Value;
use thiserror::Error;

/// Errors reported back to the client as a failed response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The frame is not a decodable MessagePack map
    #[error("{0}")]
    Decode(String),

    /// A required field is missing or has the wrong type
    #[error("{0}")]
    Format(String),

    /// Unknown command token
    #[error("{0}")]
    NotFound(String),

    /// The store could not execute the command
    #[error("{0}")]
    Execute(String),
}

impl CommandError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CommandError::Decode(_) => ErrorCode::CommandDecode,
            CommandError::Format(_) => ErrorCode::CommandFormat,
            CommandError::NotFound(_) => ErrorCode::CommandNotFound,
            CommandError::Execute(_) => ErrorCode::CommandExecute,
        }
    }
}

impl From<CommandError> for Response {
    fn from(err: CommandError) -> Self {
        Response::error(err.code(), err.to_string())
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, CommandError>;

/// Parses a request frame.
pub fn parse_request(frame: &[u8]) -> ParseResult<Request> {
    let fields = decode_map(frame)?;

    let cmd = text_field(&fields, "cmd")?;
    let request = match cmd.to_ascii_lowercase().as_str() {
        "get" => Request::Get {
            key: text_field(&fields, "key")?,
        },
        "set" => {
            let key = text_field(&fields, "key")?;
            let value = lookup(&fields, "value")
                .cloned()
                .ok_or_else(|| missing("value"))?;
            let ttl = match lookup(&fields, "expire") {
                None | Some(Value::Nil) => 0,
                Some(expire) => convert::to_int(expire).ok_or_else(|| {
                    CommandError::Format("key 'expire' not type integer".to_string())
                })?,
            };
            Request::Set { key, value, ttl }
        }
        "del" => Request::Del {
            key: text_field(&fields, "key")?,
        },
        _ => {
            return Err(CommandError::NotFound(format!(
                "cmd format error: unknown command '{}'",
                cmd
            )))
        }
    };

    Ok(request)
}

/// Parses a response frame, as received by a client.
pub fn parse_response(frame: &[u8]) -> ParseResult<Response> {
    let fields = decode_map(frame)?;

    let status = lookup(&fields, "status")
        .and_then(Value::as_bool)
        .ok_or_else(|| CommandError::Format("response format error: no status".to_string()))?;

    if status {
        if lookup(&fields, "msg").is_some() {
            return Ok(Response::Ok);
        }
        return Ok(Response::Value(
            lookup(&fields, "value").filter(|v| !v.is_nil()).cloned(),
        ));
    }

    let code = lookup(&fields, "code")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
        .and_then(ErrorCode::from_u16)
        .ok_or_else(|| CommandError::Format("response format error: bad code".to_string()))?;
    let msg = lookup(&fields, "msg")
        .and_then(convert::to_text)
        .unwrap_or_default();

    Ok(Response::Error { code, msg })
}

/// Decodes a frame into `(field name, value)` pairs.
fn decode_map(frame: &[u8]) -> ParseResult<Vec<(String, Value)>> {
    let value = rmpv::decode::read_value(&mut &frame[..])
        .map_err(|e| CommandError::Decode(format!("decode error: {}", e)))?;

    let entries = match value {
        Value::Map(entries) => entries,
        other => {
            return Err(CommandError::Decode(format!(
                "decode error: expected a map, got {}",
                other
            )))
        }
    };

    entries
        .into_iter()
        .map(|(k, v)| match convert::raw_str(&k) {
            Some(name) => Ok((name.to_string(), v)),
            None => Err(CommandError::Decode(format!(
                "decode error: map key {} is not a string",
                k
            ))),
        })
        .collect()
}

/// Finds a field; with duplicate names the last one wins.
fn lookup<'a>(fields: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    fields
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v)
}

fn text_field(fields: &[(String, Value)], name: &str) -> ParseResult<String> {
    let value = lookup(fields, name).ok_or_else(|| missing(name))?;
    convert::raw_str(value)
        .map(str::to_string)
        .ok_or_else(|| CommandError::Format(format!("key '{}' not type string", name)))
}

fn missing(name: &str) -> CommandError {
    CommandError::Format(format!("key '{}' not found", name))
}
