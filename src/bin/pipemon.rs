//! pipemon command line
//!
//! Loads a monitoring configuration, prints the resulting configuration as XML
//! and optionally replays events read from stdin.

use std::io::{self, BufRead};
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use pipemon::{load_config, EventSource, MonitorManager};

/// Command line options
struct Args {
    /// Path of the TOML configuration file
    config_path: Option<String>,
    /// Replay events from stdin
    replay: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config_path: None,
        replay: false,
    };

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--replay" | "-r" => parsed.replay = true,
            "--help" | "-h" => {
                println!("pipemon - pipeline alarm monitoring");
                println!();
                println!("USAGE:");
                println!("    pipemon [OPTIONS] [CONFIG]");
                println!();
                println!("OPTIONS:");
                println!("    -r, --replay    Fire events read from stdin as '<adapter> <source> <event_code>'");
                println!("    -h, --help      Print help information");
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => {
                eprintln!("error: unknown argument: {flag}");
                std::process::exit(1);
            }
            path => {
                if parsed.config_path.is_some() {
                    eprintln!("error: more than one configuration file given");
                    std::process::exit(1);
                }
                parsed.config_path = Some(path.to_string());
            }
        }
    }

    if parsed.config_path.is_none() {
        parsed.config_path = std::env::var("PIPEMON_CONFIG_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty());
    }
    parsed
}

/// Fires one event per well-formed stdin line; returns (fired, skipped).
fn replay(manager: &MonitorManager) -> io::Result<(usize, usize)> {
    let mut fired = 0;
    let mut skipped = 0;
    for line in io::stdin().lock().lines() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => {}
            [adapter, source, event_code] => {
                let source = EventSource::new(*adapter, *source).shared();
                manager.fire_event(&source, event_code);
                fired += 1;
            }
            _ => {
                tracing::warn!(line = %line, "expected '<adapter> <source> <event_code>', skipping");
                skipped += 1;
            }
        }
    }
    Ok((fired, skipped))
}

fn main() -> ExitCode {
    let args = parse_args();

    let config = match load_config(args.config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    tracing::info!(
        config = args.config_path.as_deref().unwrap_or("<defaults>"),
        "starting pipemon"
    );

    let manager = match config.build_manager() {
        Ok(manager) => manager,
        Err(err) => {
            tracing::error!(error = %err, "invalid monitoring configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = manager.configure() {
        // Monitors that failed are excluded; the rest keep running.
        tracing::error!(error = %err, "monitoring configured with errors");
    }

    match manager.to_xml() {
        Ok(xml) => println!("{xml}"),
        Err(err) => {
            tracing::error!(error = %err, "could not export configuration");
            return ExitCode::FAILURE;
        }
    }

    if args.replay {
        match replay(&manager) {
            Ok((fired, skipped)) => tracing::info!(fired, skipped, "replay finished"),
            Err(err) => {
                tracing::error!(error = %err, "could not read stdin");
                return ExitCode::FAILURE;
            }
        }
        match serde_json::to_string_pretty(&manager.status()) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                tracing::error!(error = %err, "could not serialize status");
                return ExitCode::FAILURE;
            }
        }
    }

    manager.shutdown();
    ExitCode::SUCCESS
}
