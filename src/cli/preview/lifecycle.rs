//! Server lifecycle management.

use std::net::{SocketAddr, ToSocketAddrs};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tiny_http::Server;

use crate::config::DEFAULT_PORT;
use crate::utils::exec::Cmd;
use crate::{debug, log};

/// Maximum number of port binding attempts when no port was requested.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind the HTTP server.
///
/// An explicit `port` is used as is. Without one, ports are tried upwards
/// from [`DEFAULT_PORT`].
pub fn bind(hostname: &str, port: Option<u16>) -> Result<(Server, SocketAddr)> {
    let (base_port, attempts) = match port {
        Some(port) => (port, 1),
        None => (DEFAULT_PORT, MAX_PORT_RETRIES),
    };
    let mut last_error = None;

    for offset in 0..attempts {
        let port = base_port.saturating_add(offset);
        let addr = (hostname, port)
            .to_socket_addrs()
            .with_context(|| format!("Invalid hostname: {hostname}"))?
            .next()
            .ok_or_else(|| anyhow!("Invalid hostname: {hostname}"))?;

        match Server::http(addr) {
            Ok(server) => {
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, addr));
            }
            Err(e) => {
                debug!("preview"; "port {} unavailable: {}", port, e);
                last_error = Some(e);
            }
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        attempts,
        base_port,
        base_port.saturating_add(attempts - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Open `url` in the default browser without waiting for it.
pub fn open_browser(url: &str) {
    let cmd = if cfg!(target_os = "macos") {
        Cmd::new("open").arg(url)
    } else if cfg!(windows) {
        Cmd::new("cmd").args(["/c", "start", url])
    } else {
        Cmd::new("xdg-open").arg(url)
    };
    thread::spawn(move || {
        if let Err(e) = cmd.run() {
            log!("preview"; "failed to open browser: {e}");
        }
    });
}

/// Wait for the socket server to stop (max 2 seconds).
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
