//! Command Handler
//!
//! Executes decoded requests against the bucket ring and builds the
//! response for each one. The handler holds nothing but a reference to the
//! shared ring, so cloning it per connection is cheap.
//!
//! ## Error Mapping
//!
//! | failure                          | response                       |
//! |----------------------------------|--------------------------------|
//! | frame not a msgpack map          | `status=false, code=100`       |
//! | missing / mistyped field         | `status=false, code=200`       |
//! | unknown `cmd`                    | `status=false, code=300`       |
//! | `get` on absent or expired key   | `status=true`, no `value`      |
//! | any other store failure          | `status=false, code=400`       |

use crate::protocol::{parse_request, CommandError, Request, Response};
use crate::storage::{BucketRing, StoreError};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Dispatches requests to the store.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    /// The shared store
    ring: Arc<BucketRing>,
}

impl CommandHandler {
    /// Creates a new command handler over the given ring.
    pub fn new(ring: Arc<BucketRing>) -> Self {
        Self { ring }
    }

    /// Handles one raw frame and returns the encoded, newline-terminated
    /// response.
    pub fn execute(&self, frame: &[u8]) -> Bytes {
        let response = match parse_request(frame) {
            Ok(request) => self.dispatch(request),
            Err(e) => {
                debug!(code = e.code().as_u16(), error = %e, "Rejected request");
                Response::from(e)
            }
        };
        response.serialize()
    }

    /// Executes a validated request.
    pub fn dispatch(&self, request: Request) -> Response {
        trace!(cmd = request.name(), key = request.key(), "Dispatching");

        let result = match request {
            Request::Get { key } => self.cmd_get(&key),
            Request::Set { key, value, ttl } => self
                .ring
                .set(key, value, ttl)
                .map(|()| Response::ok()),
            Request::Del { key } => self.ring.del(&key).map(|()| Response::ok()),
        };

        result.unwrap_or_else(|e| Response::from(CommandError::Execute(e.to_string())))
    }

    /// A missing value is not an error: it reads back as an absent `value`.
    fn cmd_get(&self, key: &str) -> Result<Response, StoreError> {
        match self.ring.get(key) {
            Ok(value) => Ok(Response::value(Some(value))),
            Err(StoreError::ValueNotFound) => Ok(Response::value(None)),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{parse_response, ErrorCode};
    use crate::storage::envelope::{now_unix, Envelope};
    use rmpv::Value;

    fn create_handler() -> CommandHandler {
        CommandHandler::new(Arc::new(BucketRing::new(10).unwrap()))
    }

    fn make_command(fields: &[(&str, Value)]) -> Vec<u8> {
        let map = Value::Map(
            fields
                .iter()
                .map(|(k, v)| (Value::from(*k), v.clone()))
                .collect(),
        );
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &map).unwrap();
        buf
    }

    fn run(handler: &CommandHandler, fields: &[(&str, Value)]) -> Response {
        let bytes = handler.execute(&make_command(fields));
        assert_eq!(bytes.last(), Some(&b'\n'));
        parse_response(&bytes).unwrap()
    }

    fn error_code(response: &Response) -> Option<ErrorCode> {
        match response {
            Response::Error { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[test]
    fn test_set_get() {
        let handler = create_handler();

        let response = run(
            &handler,
            &[
                ("cmd", Value::from("set")),
                ("key", Value::from("a")),
                ("value", Value::from("1")),
            ],
        );
        assert_eq!(response, Response::Ok);

        let response = run(&handler, &[("cmd", Value::from("get")), ("key", Value::from("a"))]);
        assert_eq!(response, Response::Value(Some(Value::from("1"))));
    }

    #[test]
    fn test_get_nonexistent() {
        let handler = create_handler();

        let response = run(
            &handler,
            &[("cmd", Value::from("get")), ("key", Value::from("nonexistent"))],
        );
        assert_eq!(response, Response::Value(None));
    }

    #[test]
    fn test_get_expired_is_absent() {
        let ring = Arc::new(BucketRing::new(10).unwrap());
        let bytes = Envelope::expiring_at(Value::from("x"), now_unix() - 1)
            .encode()
            .unwrap();
        ring.route("b").unwrap().insert_raw("b", bytes);
        let handler = CommandHandler::new(ring);

        let response = run(&handler, &[("cmd", Value::from("get")), ("key", Value::from("b"))]);
        assert_eq!(response, Response::Value(None));
    }

    #[test]
    fn test_del() {
        let handler = create_handler();

        run(
            &handler,
            &[
                ("cmd", Value::from("set")),
                ("key", Value::from("a")),
                ("value", Value::from(1)),
            ],
        );

        let del = [("cmd", Value::from("del")), ("key", Value::from("a"))];
        assert_eq!(run(&handler, &del), Response::Ok);
        // Deleting again still succeeds
        assert_eq!(run(&handler, &del), Response::Ok);

        let response = run(&handler, &[("cmd", Value::from("get")), ("key", Value::from("a"))]);
        assert_eq!(response, Response::Value(None));
    }

    #[test]
    fn test_uppercase_commands() {
        let handler = create_handler();

        let response = run(
            &handler,
            &[
                ("cmd", Value::from("SET")),
                ("key", Value::from("a")),
                ("value", Value::from("1")),
            ],
        );
        assert_eq!(response, Response::Ok);

        let response = run(&handler, &[("cmd", Value::from("GET")), ("key", Value::from("a"))]);
        assert_eq!(response, Response::Value(Some(Value::from("1"))));
    }

    #[test]
    fn test_set_with_expire() {
        let handler = create_handler();

        run(
            &handler,
            &[
                ("cmd", Value::from("set")),
                ("key", Value::from("b")),
                ("value", Value::from("x")),
                ("expire", Value::from(1)),
            ],
        );

        let get = [("cmd", Value::from("get")), ("key", Value::from("b"))];
        assert_eq!(run(&handler, &get), Response::Value(Some(Value::from("x"))));

        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(run(&handler, &get), Response::Value(None));
    }

    #[test]
    fn test_missing_cmd() {
        let handler = create_handler();

        let response = run(&handler, &[("key", Value::from("a"))]);
        assert_eq!(error_code(&response), Some(ErrorCode::CommandFormat));
        assert!(!response.is_success());
    }

    #[test]
    fn test_unknown_command() {
        let handler = create_handler();

        let response = run(
            &handler,
            &[("cmd", Value::from("frobnicate")), ("key", Value::from("a"))],
        );
        assert_eq!(error_code(&response), Some(ErrorCode::CommandNotFound));
    }

    #[test]
    fn test_undecodable_frame() {
        let handler = create_handler();

        let bytes = handler.execute(b"\xc1garbage");
        let response = parse_response(&bytes).unwrap();
        assert_eq!(error_code(&response), Some(ErrorCode::CommandDecode));
    }

    #[test]
    fn test_empty_frame_is_decode_error() {
        let handler = create_handler();

        let response = parse_response(&handler.execute(b"")).unwrap();
        assert_eq!(error_code(&response), Some(ErrorCode::CommandDecode));
    }

    #[test]
    fn test_empty_ring_is_execute_error() {
        let handler = CommandHandler::new(Arc::new(BucketRing::empty()));

        for cmd in ["get", "del"] {
            let response = run(&handler, &[("cmd", Value::from(cmd)), ("key", Value::from("a"))]);
            assert_eq!(
                response,
                Response::error(ErrorCode::CommandExecute, "bucket not found")
            );
        }

        let response = run(
            &handler,
            &[
                ("cmd", Value::from("set")),
                ("key", Value::from("a")),
                ("value", Value::from(1)),
            ],
        );
        assert_eq!(error_code(&response), Some(ErrorCode::CommandExecute));
    }

    #[test]
    fn test_corrupt_entry_is_execute_error() {
        let ring = Arc::new(BucketRing::new(1).unwrap());
        ring.bucket(0).unwrap().insert_raw("a", b"value".to_vec());
        let handler = CommandHandler::new(ring);

        let response = run(&handler, &[("cmd", Value::from("get")), ("key", Value::from("a"))]);
        assert_eq!(error_code(&response), Some(ErrorCode::CommandExecute));
    }
}
