//! netput server: entry point.
//!
//! Accepts netput clients over TCP, authenticates them with a shared password,
//! and logs every input event it receives.
//!
//! # Usage
//!
//! ```text
//! netput-server [OPTIONS]
//!
//! Options:
//!   --config   <PATH>  Config file [default: platform config dir]
//!   --bind     <IP>    Listen address (overrides the config file)
//!   --port     <PORT>  Listen port (overrides the config file)
//!   --password <PW>    Shared password (overrides the config file)
//!   --write-config     Write the effective config to the config file and exit
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable          | Description              |
//! |-------------------|--------------------------|
//! | `NETPUT_CONFIG`   | Config file path         |
//! | `NETPUT_BIND`     | Listen address           |
//! | `NETPUT_PORT`     | Listen port              |
//! | `NETPUT_PASSWORD` | Shared password          |
//!
//! `RUST_LOG` overrides the log level from the config file.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use netput_core::protocol::credential::Usage;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use netput_server::infrastructure::storage::config::{self, ServerConfig};
use netput_server::{DispatchTable, PasswordAuthenticator, ServerBuilder};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// netput input-event relay server.
#[derive(Debug, Parser)]
#[command(
    name = "netput-server",
    about = "Receives input events from netput clients",
    version
)]
struct Cli {
    /// Path of the TOML config file.
    ///
    /// A missing file is not an error; built-in defaults are used.
    #[arg(long, env = "NETPUT_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.
    #[arg(long, env = "NETPUT_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "NETPUT_PORT")]
    port: Option<u16>,

    /// Password clients must present.  Without one every connect is rejected.
    #[arg(long, env = "NETPUT_PASSWORD")]
    password: Option<String>,

    /// Write the effective configuration (file plus overrides) back to the
    /// config file, then exit without serving.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        Ok(self.into_path_and_config()?.1)
    }

    fn into_path_and_config(self) -> anyhow::Result<(PathBuf, ServerConfig)> {
        let path = match self.config {
            Some(path) => path,
            None => config::default_config_path().context("no --config given")?,
        };
        let mut cfg = config::load_config(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;

        if let Some(bind) = self.bind {
            cfg.network.bind_address = bind;
        }
        if let Some(port) = self.port {
            cfg.network.port = port;
        }
        if let Some(password) = self.password {
            cfg.auth.password = Some(password);
        }
        Ok((path, cfg))
    }
}

/// Saves the effective configuration to the config file, returning its path.
fn write_config_file(cli: Cli) -> anyhow::Result<PathBuf> {
    let (path, cfg) = cli.into_path_and_config()?;
    config::save_config(&path, &cfg)
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    Ok(path)
}

/// Handlers that log each event.  A real deployment would inject the events
/// into the local input system instead.
fn logging_handlers() -> DispatchTable {
    DispatchTable::builder()
        .on_keyboard(|session, e| {
            info!(
                "{session}: key {} {:?}{}",
                e.key_code,
                e.state,
                if e.repeat { " (repeat)" } else { "" }
            )
        })
        .on_mouse_motion(|session, e| {
            debug!(
                "{session}: motion to ({}, {}) by ({}, {})",
                e.x, e.y, e.relative_x, e.relative_y
            )
        })
        .on_mouse_button(|session, e| {
            info!(
                "{session}: button {:?} {:?} at ({}, {})",
                e.button, e.state, e.x, e.y
            )
        })
        .on_mouse_wheel(|session, e| {
            debug!(
                "{session}: wheel ({}, {}) precise ({}, {})",
                e.x, e.y, e.precise_x, e.precise_y
            )
        })
        .on_window(|session, e| {
            info!(
                "{session}: window {} {:?} ({}, {})",
                e.window_id, e.event_type, e.arg1, e.arg2
            )
        })
        .build()
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.write_config {
        let path = write_config_file(cli)?;
        println!("configuration written to {}", path.display());
        return Ok(());
    }
    let cfg = cli.into_server_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level)),
        )
        .init();

    let addr: SocketAddr = cfg.network.socket_addr()?;
    let mut builder = ServerBuilder::new()
        .session_policy(cfg.session.policy)
        .dispatch_table(logging_handlers())
        .with_tcp(addr);

    match cfg.auth.password.as_deref() {
        Some(password) => {
            let mut auth = PasswordAuthenticator::new(password);
            if let Some(id) = cfg.auth.ping_session_id.as_deref() {
                auth = auth.with_pinned_session(Usage::Ping, id);
            }
            builder = builder.authenticator(auth);
        }
        None => warn!("no password configured; all clients will be rejected"),
    }

    let mut server = builder
        .build()
        .with_context(|| format!("failed to start server on {addr}"))?;
    info!(
        "netput server starting on {} (session policy {:?})",
        server.local_addr().unwrap_or(addr),
        cfg.session.policy
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let handle = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                handle.shutdown();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    server.run().await?;

    info!("netput server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};
    use netput_server::SessionPolicy;

    /// Parses `args` with the `NETPUT_*` environment fallbacks removed, so
    /// variables exported in the test environment cannot leak in.
    fn try_parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let matches = Cli::command()
            .mut_args(|arg| arg.env(None::<&str>))
            .try_get_matches_from(args.iter().copied())?;
        Cli::from_arg_matches(&matches)
    }

    fn parse(args: &[&str]) -> Cli {
        try_parse(args).unwrap()
    }

    fn missing_config() -> String {
        std::env::temp_dir()
            .join("netput-server-cli-test-missing.toml")
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_cli_without_flags_has_no_overrides() {
        let cli = parse(&["netput-server"]);

        assert!(cli.bind.is_none());
        assert!(cli.port.is_none());
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        // Arrange
        let path = missing_config();
        let cli = parse(&["netput-server", "--config", path.as_str()]);

        // Act
        let cfg = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(cfg.network.port, 24850);
        assert_eq!(cfg.network.bind_address, "127.0.0.1");
        assert_eq!(cfg.session.policy, SessionPolicy::RequireActive);
    }

    #[test]
    fn test_flags_override_config_values() {
        // Arrange
        let path = missing_config();
        let cli = parse(&[
            "netput-server",
            "--config",
            path.as_str(),
            "--bind",
            "0.0.0.0",
            "--port",
            "9001",
            "--password",
            "pw",
        ]);

        // Act
        let cfg = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(cfg.network.socket_addr().unwrap().to_string(), "0.0.0.0:9001");
        assert_eq!(cfg.auth.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_exported_variables_do_not_leak_into_parsing() {
        // Arrange
        std::env::set_var("NETPUT_PORT", "9002");

        // Act
        let cli = parse(&["netput-server"]);

        // Assert
        assert!(cli.port.is_none());
    }

    #[test]
    fn test_invalid_port_is_rejected_by_parser() {
        let result = try_parse(&["netput-server", "--port", "70000"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_write_config_saves_effective_settings() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("netput-cli-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("server.toml");
        let path_arg = path.to_string_lossy().into_owned();
        let cli = parse(&[
            "netput-server",
            "--config",
            path_arg.as_str(),
            "--port",
            "9100",
            "--write-config",
        ]);
        assert!(cli.write_config);

        // Act
        let written = write_config_file(cli).unwrap();

        // Assert
        let cfg = config::load_config(&written).unwrap();
        assert_eq!(cfg.network.port, 9100);
        assert_eq!(cfg.network.bind_address, "127.0.0.1");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_logging_handlers_cover_every_kind() {
        let table = logging_handlers();
        assert_eq!(table.registered_kinds().len(), 5);
    }
}
