//! azure-devops-mcp: MCP server for Azure DevOps work item field mapping
//!
//! Serves one session over stdio by default, or one session per connection
//! when a TCP listen address is configured.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use azure_devops_mcp::config;
use azure_devops_mcp::mcp::server::{serve_stdio, serve_tcp};

/// MCP server for Azure DevOps work item field mapping.
///
/// Maps friendly field names to reference names, converts values, and checks
/// required fields so AI assistants can prepare valid work items.
#[derive(Parser, Debug)]
#[command(name = "azure-devops-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    /// Serve over TCP on this address instead of stdio
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber. Logs go to stderr; stdout carries
/// protocol messages.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the interactive-use notice printed to stderr at startup.
fn license_notice() -> String {
    let mut notice = format!(
        "azure-devops-mcp {}  Copyright (C) 2026  {}\n\
         This program comes with ABSOLUTELY NO WARRANTY.\n\
         This is free software, licensed under {}.\n",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_AUTHORS").replace(':', ", "),
        env!("CARGO_PKG_LICENSE"),
    );
    let repository = env!("CARGO_PKG_REPOSITORY");
    if !repository.is_empty() {
        notice.push_str(&format!("Source: {repository}\n"));
    }
    notice
}

/// Entry point for the azure-devops-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig was read from: {}", default_path.display());
                    eprintln!("See config/example-config.json for the format");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // Display GPL license notice (required by GPLv3 Section 5d)
    eprintln!("{}", license_notice());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting azure-devops-mcp server"
    );

    let context = match azure_devops_mcp::build_server_context(&cfg) {
        Ok(context) => context,
        Err(e) => {
            error!(error = %e, "Failed to register capabilities");
            return ExitCode::FAILURE;
        }
    };
    info!(registry = ?context.registry(), "Capabilities registered");

    // The CLI flag wins over the configuration file; validation already
    // checked that the configured address parses.
    let listen = args.listen.or_else(|| {
        cfg.server
            .listen
            .as_deref()
            .and_then(|addr| addr.parse().ok())
    });

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        match listen {
            Some(addr) => serve_tcp(context, addr).await,
            None => {
                info!("MCP server ready, waiting for client on stdio...");
                serve_stdio(context).await
            }
        }
    });

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn license_notice_names_crate_and_license() {
        let notice = license_notice();
        assert!(notice.starts_with("azure-devops-mcp "));
        assert!(notice.contains("azure-devops-mcp contributors"));
        assert!(notice.contains("ABSOLUTELY NO WARRANTY"));
        assert!(notice.contains("GPL-3.0-or-later"));
    }

    #[test]
    fn log_level_precedence() {
        assert_eq!(get_log_level(0, false, "debug"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "nonsense"), Level::WARN);
        assert_eq!(get_log_level(2, false, "error"), Level::DEBUG);
        assert_eq!(get_log_level(3, true, "trace"), Level::ERROR);
    }

    #[test]
    fn parses_listen_flag() {
        let args = Args::parse_from(["azure-devops-mcp", "--listen", "127.0.0.1:7000", "-vv"]);
        assert_eq!(args.listen, Some("127.0.0.1:7000".parse().unwrap()));
        assert_eq!(args.verbose, 2);
        assert!(args.config.is_none());
    }
}
