//! Wire Protocol
//!
//! ringkv speaks newline-framed MessagePack: each request and each response
//! is a single MessagePack map followed by `\n`. One response is written per
//! request, in order, on the same connection.
//!
//! ## Modules
//!
//! - `types`: `Request`, `Response`, error codes and frame encoding
//! - `parser`: validation of incoming request (and response) frames
//!
//! ## Example
//!
//! ```
//! use ringkv::protocol::{parse_request, Request, Response};
//! use rmpv::Value;
//!
//! let frame = Request::Set { key: "name".into(), value: Value::from("ringkv"), ttl: 0 }.serialize();
//! let request = parse_request(&frame[..frame.len() - 1]).unwrap();
//! assert_eq!(request.key(), "name");
//!
//! let bytes = Response::ok().serialize();
//! assert_eq!(bytes.last(), Some(&b'\n'));
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_request, parse_response, CommandError, ParseResult};
pub use types::{ErrorCode, Request, Response, FRAME_DELIMITER};
