//! Socket pump: moves frames between one WebSocket and its session.
//!
//! The pump thread owns the socket in non-blocking mode. Inbound text goes to
//! the session queue; the outbound queue is drained in FIFO order.

use std::io;
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tungstenite::WebSocket;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message;

use super::session::{Outbound, SessionEvent};
use crate::{debug, log};

/// The only path accepted during the handshake.
pub const SOCKET_PATH: &str = "/_observablehq";

/// Idle delay between polls.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Complete the handshake, rejecting any path but [`SOCKET_PATH`].
pub fn handshake(stream: TcpStream) -> Option<WebSocket<TcpStream>> {
    let check = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if request.uri().path() == SOCKET_PATH {
            return Ok(response);
        }
        let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    };

    // Blocking during the handshake, non-blocking after.
    match tungstenite::accept_hdr(stream, check) {
        Ok(ws) => {
            if let Err(e) = ws.get_ref().set_nonblocking(true) {
                log!("socket"; "failed to configure socket: {e}");
                return None;
            }
            Some(ws)
        }
        Err(e) => {
            debug!("socket"; "handshake failed: {e}");
            None
        }
    }
}

/// Pump until either side goes away. Always posts `Closed` before returning.
pub fn pump(
    mut ws: WebSocket<TcpStream>,
    events: UnboundedSender<SessionEvent>,
    mut outbound: UnboundedReceiver<Outbound>,
) {
    loop {
        let mut idle = true;

        match ws.read() {
            Ok(Message::Text(text)) => {
                idle = false;
                if events.send(SessionEvent::Message(text.as_str().to_string())).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                debug!("socket"; "socket close");
                break;
            }
            Ok(_) => idle = false,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                debug!("socket"; "socket error: {e}");
                break;
            }
        }

        match drain(&mut ws, &mut outbound) {
            Ok(true) => idle = false,
            Ok(false) => {}
            Err(()) => break,
        }

        if idle {
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    let _ = events.send(SessionEvent::Closed);
}

/// Write queued messages. `Ok(true)` if anything was written, `Err` once the
/// connection should end.
fn drain(ws: &mut WebSocket<TcpStream>, outbound: &mut UnboundedReceiver<Outbound>) -> Result<bool, ()> {
    let mut wrote = false;
    loop {
        match outbound.try_recv() {
            Ok(Outbound::Send(message)) => {
                wrote = true;
                match ws.send(Message::Text(message.to_json().into())) {
                    Ok(()) => {}
                    // Buffered by tungstenite; flushed on a later pass.
                    Err(tungstenite::Error::Io(ref e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        debug!("socket"; "send failed: {e}");
                        return Err(());
                    }
                }
            }
            Ok(Outbound::Terminate) => {
                let _ = ws.get_ref().shutdown(Shutdown::Both);
                return Err(());
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => return Err(()),
        }
    }

    match ws.flush() {
        Ok(()) => Ok(wrote),
        Err(tungstenite::Error::Io(ref e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(wrote),
        Err(e) => {
            debug!("socket"; "flush failed: {e}");
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::message::ServerMessage;
    use std::net::TcpListener;
    use tokio::sync::mpsc;
    use tungstenite::stream::MaybeTlsStream;

    type Client = WebSocket<MaybeTlsStream<TcpStream>>;

    fn connect(path: &str) -> (Client, Option<WebSocket<TcpStream>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("ws://127.0.0.1:{port}{path}");
        let client = std::thread::spawn(move || tungstenite::connect(url).map(|(ws, _)| ws));
        let (stream, _) = listener.accept().unwrap();
        let server = handshake(stream);
        let client = client.join().unwrap();
        match (client, server) {
            (Ok(client), server) => (client, server),
            (Err(_), None) => panic!("rejected"),
            (Err(e), Some(_)) => panic!("client failed: {e}"),
        }
    }

    #[test]
    fn test_rejects_other_paths() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = std::thread::spawn(move || tungstenite::connect(format!("ws://127.0.0.1:{port}/other")));
        let (stream, _) = listener.accept().unwrap();
        assert!(handshake(stream).is_none());
        assert!(client.join().unwrap().is_err());
    }

    #[test]
    fn test_pump_forwards_both_ways() {
        let (mut client, server) = connect(SOCKET_PATH);
        let server = server.unwrap();
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let pump = std::thread::spawn(move || pump(server, events_tx, out_rx));

        client.send(Message::Text("hi".into())).unwrap();
        match events.blocking_recv() {
            Some(SessionEvent::Message(text)) => assert_eq!(text, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }

        out_tx.send(Outbound::Send(ServerMessage::Reload)).unwrap();
        match client.read().unwrap() {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"type":"reload"}"#),
            other => panic!("unexpected frame: {other:?}"),
        }

        client.close(None).unwrap();
        let _ = client.flush();
        pump.join().unwrap();
        assert!(matches!(events.blocking_recv(), Some(SessionEvent::Closed)));
    }

    #[test]
    fn test_terminate_drops_connection() {
        let (mut client, server) = connect(SOCKET_PATH);
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let pump = std::thread::spawn(move || pump(server.unwrap(), events_tx, out_rx));

        out_tx.send(Outbound::Terminate).unwrap();
        pump.join().unwrap();
        assert!(matches!(events.blocking_recv(), Some(SessionEvent::Closed)));
        assert!(client.read().is_err());
    }
}
