// src/main.rs

//! The main entry point for the audiomux server and its command-line client.

use anyhow::{Context, Result, anyhow};
use audiomux::client::{ClientSession, WriterRenderer};
use audiomux::config::Config;
use audiomux::core::Command;
use audiomux::server::MediaServer;
use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("audiomux version {VERSION}");
        return Ok(());
    }

    if args.len() > 1 && args[1] == "--client" {
        // --- Client Mode ---
        if args.len() < 4 {
            eprintln!("Usage: audiomux --client ADDR PLAY|STOP|SEEK <offset>|CLOSE [--out path]");
            std::process::exit(1);
        }
        init_client_logging(&env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()));
        return run_client(&args).await;
    }

    // --- Server Mode ---
    let config = match load_config(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    init_logging(&log_level);

    if let Err(e) = run_server(config).await {
        error!("Server runtime error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

/// Sets up the compact, colored formatter with the given filter.
fn init_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .compact()
        .with_ansi(true)
        .init();
}

/// Client mode may write the stream to stdout, so logs go to stderr.
fn init_client_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .compact()
        .with_ansi(false)
        .with_writer(io::stderr)
        .init();
}

/// Loads the config file and applies command-line overrides.
fn load_config(args: &[String]) -> Result<Config> {
    let explicit_path = flag_value(args, "--config")?;
    let mut config = match explicit_path {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::from_file(DEFAULT_CONFIG_PATH)?,
        None => Config::default(),
    };

    if let Some(port_str) = flag_value(args, "--port")? {
        config.port = port_str
            .parse::<u16>()
            .map_err(|_| anyhow!("Invalid port number: {port_str}"))?;
    }
    if let Some(file) = flag_value(args, "--file")? {
        config.file_path = file.to_string();
    }

    config.validate()?;
    Ok(config)
}

/// Returns the value following `flag`, if the flag is present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|arg| arg == flag) {
        Some(i) => args
            .get(i + 1)
            .map(|s| Some(s.as_str()))
            .ok_or_else(|| anyhow!("{flag} flag requires a value")),
        None => Ok(None),
    }
}

/// Runs the blocking event loop on its own thread while this task listens
/// for termination signals.
async fn run_server(config: Config) -> Result<()> {
    let server = MediaServer::bind(config)?;
    let shutdown = server.shutdown_handle();
    let mut server_task = tokio::task::spawn_blocking(move || server.run());

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    tokio::select! {
        biased;

        _ = sigint.recv() => {
            info!("SIGINT received, initiating graceful shutdown.");
            shutdown.trigger()?;
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received, initiating graceful shutdown.");
            shutdown.trigger()?;
        }
        res = &mut server_task => {
            res.map_err(|e| anyhow!("Server thread panicked: {e:?}"))??;
            return Ok(());
        }
    }

    server_task
        .await
        .map_err(|e| anyhow!("Server thread panicked: {e:?}"))??;
    Ok(())
}

/// Sends one command and writes the response stream to `--out` or stdout.
async fn run_client(args: &[String]) -> Result<()> {
    let addr = args[2].as_str();
    let name = args[3].as_str();
    let arg = args.get(4).map(String::as_str).filter(|a| !a.starts_with("--"));
    let command = Command::from_parts(name, arg)?;

    let mut session = ClientSession::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {addr}"))?;

    if !command.streams() {
        session.send(command).await?;
        return Ok(());
    }

    let out: Box<dyn Write> = match flag_value(args, "--out")? {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create '{path}'"))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut renderer = WriterRenderer::new(out);
    let total = session.run(command, &mut renderer).await?;
    info!("Received {} bytes from {}", total, addr);
    Ok(())
}
