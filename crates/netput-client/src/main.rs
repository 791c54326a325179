//! netput client: entry point.
//!
//! Connects to a netput server, opens a session, and then either
//! disconnects straight away (`--usage ping`, a health check) or sends a
//! short burst of sample input events first (`--usage input`).
//!
//! # Usage
//!
//! ```text
//! netput-client [OPTIONS]
//!
//! Options:
//!   --host       <HOST>  Server IP address [default: 127.0.0.1]
//!   --port       <PORT>  Server port [default: 24850]
//!   --password   <PW>    Shared password [default: empty]
//!   --usage      <U>     ping | input [default: ping]
//!   --mode       <M>     acknowledged | fire-and-forget [default: acknowledged]
//!   --timeout-ms <MS>    Per-call timeout, 0 disables [default: 5000]
//!   --retry-secs <SECS>  Keep retrying the TCP connect this long [default: 0]
//! ```
//!
//! Every option can also be set through a `NETPUT_*` environment variable
//! (`NETPUT_HOST`, `NETPUT_PORT`, ...).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use netput_core::protocol::credential::{Credential, Usage};
use netput_core::protocol::events::{
    InputState, KeyboardEvent, MouseButton, MouseButtonEvent, MouseButtonStateMask,
    MouseMotionEvent, WindowEvent, WindowEventType,
};
use netput_core::{DeliveryMode, TransportError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use netput_client::{ClientProxy, TcpClientTransport};

/// Pause between TCP connect attempts while `--retry-secs` allows retrying.
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// netput input-event relay client.
#[derive(Debug, Parser)]
#[command(
    name = "netput-client",
    about = "Sends input events to a netput server",
    version
)]
struct Cli {
    /// IP address of the server.
    #[arg(long, default_value = "127.0.0.1", env = "NETPUT_HOST")]
    host: String,

    /// TCP port of the server.
    #[arg(long, default_value_t = 24850, env = "NETPUT_PORT")]
    port: u16,

    /// Shared password placed in the credential.
    #[arg(long, default_value = "", env = "NETPUT_PASSWORD")]
    password: String,

    /// What the session is for: `ping` or `input`.
    #[arg(long, default_value = "ping", value_parser = parse_usage, env = "NETPUT_USAGE")]
    usage: Usage,

    /// `acknowledged` waits for the server on every event;
    /// `fire-and-forget` does not.
    #[arg(long, default_value = "acknowledged", env = "NETPUT_MODE")]
    mode: DeliveryMode,

    /// Per-call timeout in milliseconds.  0 waits indefinitely.
    #[arg(long, default_value_t = 5000, env = "NETPUT_TIMEOUT_MS")]
    timeout_ms: u64,

    /// How long to keep retrying the TCP connect.  0 tries once.
    #[arg(long, default_value_t = 0, env = "NETPUT_RETRY_SECS")]
    retry_secs: u64,
}

fn parse_usage(s: &str) -> Result<Usage, String> {
    match s {
        "ping" => Ok(Usage::Ping),
        "input" => Ok(Usage::Input),
        other => Err(format!("unknown usage '{other}' (expected ping or input)")),
    }
}

/// Settings derived from the command line.
#[derive(Debug)]
struct ClientSettings {
    server_addr: SocketAddr,
    credential: Credential,
    mode: DeliveryMode,
    timeout: Option<Duration>,
    retry_for: Duration,
}

impl Cli {
    /// Converts the parsed CLI arguments into [`ClientSettings`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--host` is not a valid IP address.
    fn into_client_settings(self) -> anyhow::Result<ClientSettings> {
        let server_addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid server address: '{}:{}'", self.host, self.port))?;

        Ok(ClientSettings {
            server_addr,
            credential: Credential::new(self.usage, self.password),
            mode: self.mode,
            timeout: (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)),
            retry_for: Duration::from_secs(self.retry_secs),
        })
    }
}

/// Opens the TCP connection, retrying until `retry_for` has elapsed.
async fn connect_with_retry(settings: &ClientSettings) -> anyhow::Result<TcpClientTransport> {
    let started = Instant::now();
    loop {
        match TcpClientTransport::connect(settings.server_addr, settings.timeout).await {
            Ok(transport) => return Ok(transport),
            Err(e @ (TransportError::ConnectFailed(_) | TransportError::Timeout))
                if started.elapsed() + RETRY_INTERVAL <= settings.retry_for =>
            {
                warn!("{e}; retrying in {RETRY_INTERVAL:?}");
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("could not reach {}", settings.server_addr))
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Sends one event of every kind.
async fn send_sample_input(proxy: &ClientProxy) -> anyhow::Result<()> {
    let window_id = 1;

    proxy
        .send_window(WindowEvent {
            timestamp: now_ms(),
            window_id,
            event_type: WindowEventType::FocusGained,
            arg1: 0,
            arg2: 0,
        })
        .await?;
    proxy
        .send_mouse_motion(MouseMotionEvent {
            timestamp: now_ms(),
            window_id,
            state_mask: MouseButtonStateMask::default(),
            x: 100,
            y: 100,
            relative_x: 10,
            relative_y: -5,
        })
        .await?;
    for state in [InputState::Pressed, InputState::Released] {
        proxy
            .send_mouse_button(MouseButtonEvent {
                timestamp: now_ms(),
                window_id,
                button: MouseButton::Left,
                state,
                double_click: false,
                x: 100,
                y: 100,
            })
            .await?;
    }
    proxy.send_mouse_wheel_steps(now_ms(), window_id, 0, -1).await?;
    for (state, repeat) in [
        (InputState::Pressed, false),
        (InputState::Pressed, true),
        (InputState::Released, false),
    ] {
        proxy
            .send_keyboard(KeyboardEvent {
                timestamp: now_ms(),
                window_id,
                state,
                repeat,
                // HID usage for 'A'
                key_code: 0x04,
            })
            .await?;
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Cli::parse().into_client_settings()?;
    info!(
        "netput client connecting to {} ({} session, {:?})",
        settings.server_addr,
        settings.credential.usage.name(),
        settings.mode
    );

    let transport = connect_with_retry(&settings).await?;
    let mut proxy = ClientProxy::new(Arc::new(transport), settings.mode);
    proxy.on_error(|e| warn!("event lost: {e}"));

    let session_id = proxy
        .connect(&settings.credential.encode())
        .await
        .context("connect failed")?;
    info!("session {session_id} established");

    if settings.credential.usage == Usage::Input {
        send_sample_input(&proxy).await.context("sending input failed")?;
        info!("sample input sent");
    }

    proxy.disconnect().await.context("disconnect failed")?;
    info!("session {session_id} closed");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
