//! ringkv server
//!
//! Loads settings from an optional TOML file, applies command-line
//! overrides, then serves until SIGINT, SIGTERM, SIGHUP or SIGQUIT.

use anyhow::Context;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use ringkv::config::Config;
use ringkv::server::Server;
use ringkv::shutdown::Shutdown;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn build_cli() -> Command {
    Command::new("ringkv")
        .about("Sharded in-memory key-value server")
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
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("TOML config file; flags given explicitly override it"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_parser(clap::value_parser!(u16))
                .default_value("6700")
                .help("TCP port to listen on"),
        )
        .arg(
            Arg::new("sock")
                .short('s')
                .long("sock")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Unix socket path; replaces the TCP listener"),
        )
        .arg(
            Arg::new("bucket-num")
                .long("bucket-num")
                .aliases(["bucket_num", "bn"])
                .value_parser(clap::value_parser!(i64))
                .default_value("10")
                .allow_negative_numbers(true)
                .help("Number of buckets"),
        )
        .arg(
            Arg::new("gc-cycle")
                .long("gc-cycle")
                .aliases(["gc_cycle", "gc"])
                .value_parser(clap::value_parser!(u64))
                .default_value("10")
                .help("Seconds between two expiry sweeps"),
        )
        .arg(
            Arg::new("log")
                .short('l')
                .long("log")
                .value_name("LEVEL")
                .default_value("info")
                .help("Log level, used when RUST_LOG is unset"),
        )
}

fn from_command_line(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Builds the effective config: file values first, then explicit flags.
fn load_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let file_given = matches.get_one::<PathBuf>("config").is_some();
    let take = |id: &str| !file_given || from_command_line(matches, id);

    if take("port") {
        if let Some(port) = matches.get_one::<u16>("port") {
            config.port = *port;
        }
    }
    if let Some(sock) = matches.get_one::<PathBuf>("sock") {
        config.sock = Some(sock.clone());
    }
    if take("bucket-num") {
        if let Some(n) = matches.get_one::<i64>("bucket-num") {
            config.bucket_num = *n;
        }
    }
    if take("gc-cycle") {
        if let Some(n) = matches.get_one::<u64>("gc-cycle") {
            config.gc_cycle = *n;
        }
    }
    if take("log") {
        if let Some(level) = matches.get_one::<String>("log") {
            config.log_level = level.clone();
        }
    }

    Ok(config)
}

/// Waits for the first termination signal.
#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut hup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        result = tokio::signal::ctrl_c() => { result?; "SIGINT" }
        _ = term.recv() => "SIGTERM",
        _ = hup.recv() => "SIGHUP",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

fn spawn_signal_listener(shutdown: Shutdown) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => info!(signal = name, "Received signal"),
            Err(e) => error!(error = %e, "Failed to listen for signals"),
        }
        shutdown.trigger();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();
    let config = load_config(&matches)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let server_config = config.server_config()?;
    info!(
        version = ringkv::VERSION,
        listen = %server_config.listen,
        buckets = server_config.shard_count,
        gc_cycle_secs = config.gc_cycle,
        "Starting ringkv"
    );

    let server = Server::bind(server_config).await?;
    spawn_signal_listener(server.shutdown_handle());

    server.run().await?;
    Ok(())
}
