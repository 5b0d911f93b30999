//! SetuIO - TCP to serial gateway daemon
//!
//! Listens for one control client at a time (default port 4444) and bridges
//! it to a Roomba over its serial Open Interface.

use setu_io::{Config, Error, GatewayServer, Result, Robot};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const DEFAULT_CONFIG_PATH: &str = "/etc/setu-io.toml";

/// Command line options
struct Args {
    config_path: Option<String>,
    stub: bool,
}

/// Parse arguments.
///
/// Supports:
/// - `setu-io <path>` (positional)
/// - `setu-io --config <path>` / `setu-io -c <path>`
/// - `--stub` to run against the simulated robot
fn parse_args() -> Args {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut parsed = Args {
        config_path: None,
        stub: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" if i + 1 < args.len() => {
                parsed.config_path = Some(args[i + 1].clone());
                i += 1;
            }
            "--stub" => parsed.stub = true,
            arg if !arg.starts_with('-') && parsed.config_path.is_none() => {
                parsed.config_path = Some(arg.to_string());
            }
            arg => eprintln!("Ignoring unknown argument: {}", arg),
        }
        i += 1;
    }
    parsed
}

/// An explicit path must exist; the default path may be absent
fn load_config(args: &Args) -> Result<(Config, String)> {
    match &args.config_path {
        Some(path) => Ok((Config::load(path)?, path.clone())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Ok((
            Config::load(DEFAULT_CONFIG_PATH)?,
            DEFAULT_CONFIG_PATH.to_string(),
        )),
        None => Ok((Config::default(), "built-in defaults".to_string())),
    }
}

fn main() -> Result<()> {
    let args = parse_args();
    let (mut config, source) = load_config(&args)?;
    if args.stub {
        config.device.stub = true;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("SetuIO v{} starting...", env!("CARGO_PKG_VERSION"));
    if args.config_path.is_none() && source != DEFAULT_CONFIG_PATH {
        log::warn!("{} not found, using built-in defaults", DEFAULT_CONFIG_PATH);
    }
    log::info!("Using config: {}", source);
    if config.device.stub {
        log::info!("Device: simulated robot (stub)");
    } else {
        log::info!(
            "Device: {} @ {} baud",
            config.device.port,
            config.device.baud_rate
        );
    }

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let robot = Robot::open(&config)?;
    let server = GatewayServer::bind(&config, robot, running)?;
    log::info!("SetuIO running. Press Ctrl-C to stop.");

    let sessions = server.serve();
    if let Err(e) = server.shutdown() {
        log::error!("Robot disconnect failed: {}", e);
        return Err(e);
    }

    log::info!("SetuIO stopped ({} session(s) served)", sessions);
    Ok(())
}
