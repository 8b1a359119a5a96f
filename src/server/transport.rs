//! WebSocket transport.
//!
//! The socket lives on its own thread: a non-blocking poll loop that moves
//! text frames between the socket and a pair of tokio channels.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::HeaderValue;
use tungstenite::protocol::Message;
use tungstenite::{Error as WsError, WebSocket};

use crate::core::is_shutdown;
use crate::session::{is_valid_session_id, new_session_id};

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "wave_session";
/// Query parameter carrying the session id.
pub const SESSION_PARAM: &str = "sid";
/// Response header announcing the session id.
pub const SESSION_HEADER: &str = "x-wave-session";

/// Idle wait of the poll loop.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Session id presented by the client, if well formed. The cookie wins over
/// the query parameter.
pub fn requested_session(req: &Request) -> Option<String> {
    let from_cookie = req
        .headers()
        .get_all("cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, id)| id.to_string());

    let from_query = || {
        let query = req.uri().query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == SESSION_PARAM)
            .map(|(_, id)| id.into_owned())
    };

    from_cookie
        .filter(|id| is_valid_session_id(id))
        .or_else(|| from_query().filter(|id| is_valid_session_id(id)))
}

/// Complete the WebSocket handshake on a blocking stream.
///
/// Returns the socket and the session id: the requested one, or a freshly
/// minted id. Either way the id is echoed in the response header.
pub fn handshake(stream: TcpStream) -> Result<(WebSocket<TcpStream>, String)> {
    let mut session_id = String::new();

    let callback = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
        session_id = requested_session(req).unwrap_or_else(new_session_id);
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            resp.headers_mut().insert(SESSION_HEADER, value);
        }
        Ok(resp)
    };

    let ws = tungstenite::accept_hdr(stream, callback).map_err(|e| anyhow!("handshake failed: {e}"))?;
    ws.get_ref().set_nonblocking(true)?;
    Ok((ws, session_id))
}

/// Poll `ws` until either side goes away.
///
/// Text from the socket goes to `inbound`. Text from `outbound` goes to the
/// socket. Dropping `inbound` on return tells the driver the client is gone.
pub fn pump(
    mut ws: WebSocket<TcpStream>,
    inbound: mpsc::Sender<String>,
    mut outbound: mpsc::Receiver<String>,
) {
    loop {
        if is_shutdown() {
            let _ = ws.close(None);
            let _ = ws.flush();
            break;
        }

        let mut busy = false;

        match ws.read() {
            Ok(Message::Text(text)) => {
                busy = true;
                if inbound.blocking_send(text.as_str().to_owned()).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                crate::debug!("conn"; "client closed");
                let _ = ws.flush();
                break;
            }
            Ok(_) => busy = true,
            Err(WsError::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {}
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
            Err(e) => {
                crate::debug!("conn"; "read failed: {}", e);
                break;
            }
        }

        loop {
            match outbound.try_recv() {
                Ok(text) => {
                    busy = true;
                    if !write(&mut ws, Message::Text(text.into())) {
                        return;
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    let _ = ws.close(None);
                    let _ = ws.flush();
                    return;
                }
            }
        }

        // Pongs and partially written frames.
        match ws.flush() {
            Ok(()) => {}
            Err(WsError::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {}
            Err(_) => break,
        }

        if !busy {
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Queue a frame. A full socket buffer is not an error; the frame is flushed
/// on a later pass.
fn write(ws: &mut WebSocket<TcpStream>, msg: Message) -> bool {
    match ws.send(msg) {
        Ok(()) => true,
        Err(WsError::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => true,
        Err(e) => {
            crate::debug!("conn"; "write failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "CS23456789ABCDEFGH";
    const OTHER: &str = "CSZZZZZZZZZZZZZZZZ";

    fn request(uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_session_from_cookie() {
        let cookie = format!("theme=dark; {SESSION_COOKIE}={ID}");
        assert_eq!(requested_session(&request("/ws", Some(&cookie))).as_deref(), Some(ID));
    }

    #[test]
    fn test_session_from_query() {
        let uri = format!("/ws?x=1&{SESSION_PARAM}={ID}");
        assert_eq!(requested_session(&request(&uri, None)).as_deref(), Some(ID));
    }

    #[test]
    fn test_cookie_wins_over_query() {
        let uri = format!("/ws?{SESSION_PARAM}={OTHER}");
        let cookie = format!("{SESSION_COOKIE}={ID}");
        assert_eq!(requested_session(&request(&uri, Some(&cookie))).as_deref(), Some(ID));
    }

    #[test]
    fn test_malformed_ids_ignored() {
        assert_eq!(requested_session(&request("/ws", None)), None);
        assert_eq!(requested_session(&request("/ws?sid=CS1", None)), None);
        let cookie = format!("{SESSION_COOKIE}=not-an-id");
        let uri = format!("/ws?{SESSION_PARAM}={ID}");
        assert_eq!(requested_session(&request(&uri, Some(&cookie))).as_deref(), Some(ID));
    }
}
