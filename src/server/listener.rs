//! TCP acceptor.

use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::core::is_shutdown;

/// Ports tried above the configured one when it is taken.
const MAX_PORT_RETRIES: u16 = 10;

/// Idle wait between non-blocking accepts.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Bind `interface:port`, moving up one port at a time while it is in use.
///
/// Port 0 lets the OS pick.
pub fn bind(interface: IpAddr, port: u16) -> Result<(TcpListener, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let addr = SocketAddr::new(interface, port.saturating_add(offset));
        match TcpListener::bind(addr) {
            Ok(listener) => {
                let local = listener.local_addr()?;
                if offset > 0 {
                    crate::log!("serve"; "port {} in use, using {}", port, local.port());
                }
                return Ok((listener, local));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind {}:{} after {} attempts: {}",
        interface,
        port,
        MAX_PORT_RETRIES,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Accept connections on a dedicated thread and hand them to `tx`.
///
/// Stops on shutdown, on a signal from `stop`, or once `tx` is closed.
/// Dropping `tx` on exit ends the receiving loop.
pub fn spawn_acceptor(
    listener: TcpListener,
    tx: mpsc::Sender<TcpStream>,
    stop: crossbeam::channel::Receiver<()>,
) -> Result<std::thread::JoinHandle<()>> {
    listener.set_nonblocking(true)?;

    let handle = std::thread::Builder::new()
        .name("wavesync-accept".into())
        .spawn(move || {
            loop {
                if is_shutdown() || stop.try_recv().is_ok() {
                    crate::debug!("serve"; "acceptor stopped");
                    break;
                }
                match listener.accept() {
                    Ok((stream, addr)) => {
                        crate::debug!("conn"; "accepted {}", addr);
                        // Handshake runs in blocking mode.
                        let _ = stream.set_nonblocking(false);
                        if tx.blocking_send(stream).is_err() {
                            break;
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(ACCEPT_POLL);
                    }
                    Err(e) => {
                        crate::log!("serve"; "accept error: {}", e);
                        std::thread::sleep(ACCEPT_POLL);
                    }
                }
            }
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn test_bind_moves_past_taken_port() {
        let (taken, addr) = bind(LOCALHOST, 0).unwrap();
        let (_next, next_addr) = bind(LOCALHOST, addr.port()).unwrap();
        assert_ne!(next_addr.port(), addr.port());
        drop(taken);
    }

    #[tokio::test]
    async fn test_acceptor_forwards_streams_and_stops() {
        let (listener, addr) = bind(LOCALHOST, 0).unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = crossbeam::channel::bounded(1);
        let handle = spawn_acceptor(listener, tx, stop_rx).unwrap();

        let _client = tokio::task::spawn_blocking(move || TcpStream::connect(addr))
            .await
            .unwrap()
            .unwrap();
        let stream = rx.recv().await.unwrap();
        assert_eq!(stream.local_addr().unwrap().port(), addr.port());

        stop_tx.send(()).unwrap();
        assert!(rx.recv().await.is_none());
        handle.join().unwrap();
    }
}
