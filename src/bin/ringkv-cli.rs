//! ringkv-cli - interactive client
//!
//! ```text
//! ringkv> set name ringkv 60
//! OK
//! ringkv> get name
//! ringkv
//! ringkv> del name
//! OK
//! ringkv> get name
//! (nil)
//! ```

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use ringkv::protocol::{parse_response, Request, Response, FRAME_DELIMITER};
use ringkv::storage::convert;
use rmpv::Value;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const PROMPT: &str = "ringkv> ";

fn build_cli() -> Command {
    Command::new("ringkv-cli")
        .about("Interactive client for ringkv")
        .version(ringkv::VERSION)
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .help("Print version")
                .action(ArgAction::Version),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .default_value("localhost")
                .help("Server host"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_parser(clap::value_parser!(u16))
                .default_value("6700")
                .help("Server port"),
        )
        .arg(
            Arg::new("socket")
                .short('s')
                .long("socket")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Connect to a Unix socket instead of TCP"),
        )
        .arg(
            Arg::new("log")
                .short('l')
                .long("log")
                .value_name("LEVEL")
                .default_value("info")
                .help("Log level"),
        )
}

/// What one input line asks the client to do.
#[derive(Debug, PartialEq)]
enum Input {
    Empty,
    Quit,
    Send(Request),
    /// Rejected locally, never sent
    Usage(String),
}

fn parse_input(line: &str) -> Input {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = tokens.first() else {
        return Input::Empty;
    };
    let cmd = first.to_ascii_lowercase();

    let arity_error = || Input::Usage(format!("wrong number of arguments for '{}' command", cmd));

    match cmd.as_str() {
        "quit" | "exit" => Input::Quit,
        "get" => match tokens.get(1) {
            Some(key) => Input::Send(Request::Get {
                key: key.to_string(),
            }),
            None => arity_error(),
        },
        "del" => match tokens.get(1) {
            Some(key) => Input::Send(Request::Del {
                key: key.to_string(),
            }),
            None => arity_error(),
        },
        "set" => {
            let (Some(key), Some(value)) = (tokens.get(1), tokens.get(2)) else {
                return arity_error();
            };
            let ttl = match tokens.get(3) {
                Some(raw) => match raw.parse::<i64>() {
                    Ok(ttl) => ttl,
                    Err(e) => {
                        return Input::Usage(format!(
                            "command '{}' arguments format error: {}",
                            cmd, e
                        ))
                    }
                },
                None => 0,
            };
            let request = Request::Set {
                key: key.to_string(),
                value: Value::from(*value),
                ttl,
            };
            // A ttl of 10 encodes as the byte 0x0a, which would split the frame
            if !frameable(&request) {
                return Input::Usage(format!(
                    "command '{}' cannot be sent: the encoded request contains a newline byte (try another ttl)",
                    cmd
                ));
            }
            Input::Send(request)
        }
        _ => Input::Usage(format!("Unknown command '{}'", first)),
    }
}

/// True if the request encodes without a delimiter byte before its end.
fn frameable(request: &Request) -> bool {
    let frame = request.serialize();
    !frame[..frame.len() - 1].contains(&FRAME_DELIMITER)
}

/// Renders a server reply the way the prompt prints it.
fn render(response: &Response) -> String {
    match response {
        Response::Ok => "OK".to_string(),
        Response::Value(None) => "(nil)".to_string(),
        Response::Value(Some(value)) => {
            convert::to_text(value).unwrap_or_else(|| value.to_string())
        }
        Response::Error { msg, .. } => msg.clone(),
    }
}

/// Sends one request and waits for its reply line.
async fn roundtrip<S>(conn: &mut BufReader<S>, request: &Request) -> anyhow::Result<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    conn.write_all(&request.serialize())
        .await
        .context("send error")?;

    let mut line = Vec::new();
    let n = conn
        .read_until(b'\n', &mut line)
        .await
        .context("response error")?;
    if n == 0 {
        anyhow::bail!("connection closed by server");
    }
    debug!(bytes = n, "Received response");

    parse_response(&line).context("response decode error")
}

/// Reads commands from stdin until `quit`, end of input, or a lost connection.
async fn session<S>(stream: S) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut conn = BufReader::new(stream);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}", PROMPT);
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            println!();
            return Ok(());
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => return Ok(()),
            Input::Usage(msg) => println!("{}", msg),
            Input::Send(request) => {
                let response = roundtrip(&mut conn, &request).await?;
                println!("{}", render(&response));
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let level = matches
        .get_one::<String>("log")
        .map(String::as_str)
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{}'", level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = matches.get_one::<PathBuf>("socket") {
        #[cfg(unix)]
        {
            let stream = tokio::net::UnixStream::connect(path)
                .await
                .with_context(|| format!("failed to connect to {}", path.display()))?;
            return session(stream).await;
        }
        #[cfg(not(unix))]
        anyhow::bail!("unix sockets are not supported: {}", path.display());
    }

    let host = matches
        .get_one::<String>("host")
        .map(String::as_str)
        .unwrap_or("localhost");
    let port = matches.get_one::<u16>("port").copied().unwrap_or(6700);
    let stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", host, port))?;
    session(stream).await
}
