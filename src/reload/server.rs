//! Live-reload socket server.
//!
//! One acceptor thread owns the listener and a small tokio runtime. Each
//! accepted connection gets a pump thread and a session task on that runtime.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, TryRecvError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::session::Session;
use super::socket::{handshake, pump};
use super::watch::NotifyBackend;
use crate::config::SiteConfig;
use crate::{debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Accept loop poll interval while idle.
const ACCEPT_INTERVAL: Duration = Duration::from_millis(100);

/// Bound live-reload listener, not yet accepting.
pub struct ReloadServer {
    listener: TcpListener,
    port: u16,
}

impl ReloadServer {
    /// Bind on `host`, starting at `base_port` and moving up if it is taken.
    pub fn bind(host: &str, base_port: u16) -> Result<Self> {
        let (listener, port) = try_bind_port(host, base_port, MAX_PORT_RETRIES)?;
        if port != base_port {
            log!("socket"; "port {} in use, using {} instead", base_port, port);
        }
        listener.set_nonblocking(true)?;
        Ok(Self { listener, port })
    }

    /// Port the browser should connect to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Start accepting on a background thread until `shutdown_rx` fires.
    pub fn spawn(self, config: Arc<SiteConfig>, shutdown_rx: Receiver<()>) -> JoinHandle<()> {
        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    log!("socket"; "failed to create runtime: {e}");
                    return;
                }
            };
            let backend = match NotifyBackend::new() {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    log!("watch"; "failed to create watcher: {e}");
                    return;
                }
            };
            self.accept_loop(&config, &backend, runtime.handle(), &shutdown_rx);
            runtime.shutdown_timeout(Duration::from_millis(500));
        })
    }

    fn accept_loop(
        &self,
        config: &Arc<SiteConfig>,
        backend: &Arc<NotifyBackend>,
        runtime: &Handle,
        shutdown_rx: &Receiver<()>,
    ) {
        loop {
            match shutdown_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    debug!("socket"; "client connected: {}", addr);
                    connect(stream, Arc::clone(config), Arc::clone(backend), runtime.clone());
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_INTERVAL);
                }
                Err(e) => {
                    log!("socket"; "accept error: {}", e);
                    thread::sleep(ACCEPT_INTERVAL);
                }
            }
        }
    }
}

/// Handshake on a fresh thread, then run the session and pump.
fn connect(stream: TcpStream, config: Arc<SiteConfig>, backend: Arc<NotifyBackend>, runtime: Handle) {
    thread::spawn(move || {
        // Blocking for the handshake
        let _ = stream.set_nonblocking(false);
        let Some(ws) = handshake(stream) else { return };
        debug!("socket"; "socket open");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session = Session::new(config, backend, events_tx.clone(), outbound_tx);
        runtime.spawn(session.run(events_rx));

        pump(ws, events_tx, outbound_rx);
        debug!("socket"; "socket closed");
    });
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(host: &str, base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind((host, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.map(anyhow::Error::from).unwrap_or_else(|| anyhow::anyhow!("no ports tried")))
        .with_context(|| format!("Failed to bind socket server after {max_retries} attempts"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use tempfile::TempDir;
    use tungstenite::Message;

    #[test]
    fn test_bind_skips_taken_port() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        match try_bind_port("127.0.0.1", port, 10) {
            Ok((_, actual)) => assert_ne!(actual, port),
            // Every following port may be taken on a busy machine.
            Err(e) => assert!(e.to_string().contains("Failed to bind")),
        }
    }

    #[test]
    fn test_stale_hello_over_socket() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.md"), "# Home").unwrap();
        let config = Arc::new(test_config(dir.path(), ""));

        let server = ReloadServer::bind("127.0.0.1", 0).unwrap();
        let port = server.port();
        let (shutdown_tx, shutdown_rx) = crossbeam::channel::unbounded();
        let handle = server.spawn(config, shutdown_rx);

        let (mut ws, _) = tungstenite::connect(format!("ws://127.0.0.1:{port}/_observablehq")).unwrap();
        ws.send(Message::Text(r#"{"type":"hello","path":"/","hash":"stale"}"#.into()))
            .unwrap();
        match ws.read().unwrap() {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"type":"reload"}"#),
            other => panic!("unexpected frame: {other:?}"),
        }
        ws.close(None).unwrap();

        shutdown_tx.send(()).unwrap();
        handle.join().unwrap();
    }
}
