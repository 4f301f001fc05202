//! TCP transport for the two roles. Each side runs exactly one receiver
//! thread that decodes frames and forwards them to the session actor; all
//! writes go through the `PeerLink` the session owns.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{sleep, spawn, JoinHandle};
use std::time::{Duration, Instant};

use crate::communication_protocol::{encode_frame, FrameDecoder, WireMessage};
use crate::config::Settings;
use crate::error::NetworkError;
use crate::session::SessionMsg;

const READ_BUFFER: usize = 4096;

/// Write half of a connection.
#[derive(Debug)]
pub struct PeerLink {
    stream: TcpStream,
    addr: SocketAddr,
}

impl PeerLink {
    pub fn new(stream: TcpStream) -> Result<PeerLink, NetworkError> {
        let addr = stream.peer_addr()?;
        Ok(PeerLink { stream, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn send(&mut self, msg: &WireMessage) -> Result<(), NetworkError> {
        let frame = encode_frame(msg)?;
        self.stream.write_all(&frame)?;
        self.stream.flush()?;
        log::debug!("Sent {} to {}", msg.kind(), self.addr);
        Ok(())
    }

    /// Shuts both directions so the receiver thread sees the disconnect.
    pub fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

type ActiveStream = Arc<Mutex<Option<TcpStream>>>;

/// Socket timeouts applied to every accepted or dialed connection. The
/// write timeout keeps a peer that stops reading from stalling the session.
#[derive(Debug, Clone, Copy)]
struct Timeouts {
    read: Duration,
    write: Duration,
}

impl Timeouts {
    fn from_settings(settings: &Settings) -> Timeouts {
        Timeouts { read: settings.read_timeout, write: settings.write_timeout }
    }
}

/// Owner of the receiver thread. `stop` unblocks and joins it.
#[derive(Debug)]
pub struct NetworkHandle {
    running: Arc<AtomicBool>,
    active: ActiveStream,
    thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl NetworkHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Clears the running flag, shuts the socket down so a pending read
    /// returns, and waits up to `timeout` for the thread to finish.
    pub fn stop(mut self, timeout: Duration) {
        self.running.store(false, Ordering::SeqCst);
        if let Ok(guard) = self.active.lock() {
            if let Some(stream) = guard.as_ref() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
        let thread = match self.thread.take() {
            Some(t) => t,
            None => return,
        };
        let deadline = Instant::now() + timeout;
        while !thread.is_finished() && Instant::now() < deadline {
            sleep(Duration::from_millis(10));
        }
        if thread.is_finished() {
            if thread.join().is_err() {
                log::error!("Network thread panicked");
            }
            log::info!("Network stopped");
        } else {
            log::warn!("Network thread did not stop within {:?}, detaching it", timeout);
        }
    }
}

fn set_active(active: &ActiveStream, stream: Option<TcpStream>) {
    if let Ok(mut guard) = active.lock() {
        *guard = stream;
    }
}

/// Binds `0.0.0.0:port` and serves one client at a time, returning to
/// accept after a disconnect. Bind errors are reported synchronously.
pub fn host(settings: &Settings, sessions: Sender<SessionMsg>) -> Result<NetworkHandle, NetworkError> {
    let bind_addr = format!("0.0.0.0:{}", settings.port);
    let listener = TcpListener::bind(&bind_addr)
        .map_err(|source| NetworkError::Connection { addr: bind_addr.clone(), source })?;
    listener.set_nonblocking(true)?;
    let local_addr = listener.local_addr()?;
    log::info!("Hosting on {}, waiting for a client...", local_addr);

    let running = Arc::new(AtomicBool::new(true));
    let active: ActiveStream = Arc::new(Mutex::new(None));
    let timeouts = Timeouts::from_settings(settings);
    let accept_poll = settings.accept_poll;

    let thread_running = running.clone();
    let thread_active = active.clone();
    let thread = spawn(move || {
        while thread_running.load(Ordering::SeqCst) {
            let stream = match listener.accept() {
                Ok((stream, addr)) => {
                    log::info!("Client connected: {}", addr);
                    stream
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    sleep(accept_poll);
                    continue;
                }
                Err(e) => {
                    log::error!("Cannot accept connection: {}", e);
                    break;
                }
            };
            if !serve_connection(stream, timeouts, &thread_running, &thread_active, &sessions) {
                break;
            }
            if thread_running.load(Ordering::SeqCst) {
                log::info!("Client disconnected, waiting for a new connection...");
            }
        }
        log::info!("Host stopped");
    });

    Ok(NetworkHandle { running, active, thread: Some(thread), local_addr })
}

/// Dials the host. Connection errors are reported synchronously so the UI
/// can go back to its menu.
pub fn join(host: &str, settings: &Settings, sessions: Sender<SessionMsg>) -> Result<NetworkHandle, NetworkError> {
    let target = format!("{}:{}", host.trim(), settings.port);
    let connection_error = |source| NetworkError::Connection { addr: target.clone(), source };
    let addr = target.to_socket_addrs()
        .map_err(connection_error)?
        .next()
        .ok_or_else(|| connection_error(ErrorKind::AddrNotAvailable.into()))?;
    let stream = TcpStream::connect_timeout(&addr, settings.connect_timeout).map_err(connection_error)?;
    let local_addr = stream.local_addr()?;
    log::info!("Connected to {}", addr);

    let running = Arc::new(AtomicBool::new(true));
    let active: ActiveStream = Arc::new(Mutex::new(None));
    let timeouts = Timeouts::from_settings(settings);

    let thread_running = running.clone();
    let thread_active = active.clone();
    let thread = spawn(move || {
        serve_connection(stream, timeouts, &thread_running, &thread_active, &sessions);
        log::info!("Client stopped");
    });

    Ok(NetworkHandle { running, active, thread: Some(thread), local_addr })
}

/// Registers the connection with the session and runs the receive loop
/// until the peer leaves or `running` drops. Returns false once the session
/// is gone.
fn serve_connection(
    stream: TcpStream,
    timeouts: Timeouts,
    running: &AtomicBool,
    active: &ActiveStream,
    sessions: &Sender<SessionMsg>,
) -> bool {
    let link = match prepare(&stream, timeouts) {
        Ok(link) => link,
        Err(e) => {
            log::error!("Cannot set up connection: {}", e);
            return true;
        }
    };
    set_active(active, stream.try_clone().ok());
    if sessions.send(SessionMsg::PeerConnected(link)).is_err() {
        log::error!("Session is gone, dropping connection");
        set_active(active, None);
        return false;
    }

    let result = receive_loop(stream, running, sessions);
    set_active(active, None);
    match result {
        Ok(()) => {}
        Err(NetworkError::Disconnected) => log::info!("Peer disconnected"),
        Err(e) => log::error!("Connection closed: {}", e),
    }
    sessions.send(SessionMsg::PeerDisconnected).is_ok()
}

fn prepare(stream: &TcpStream, timeouts: Timeouts) -> Result<PeerLink, NetworkError> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(timeouts.read))?;
    stream.set_write_timeout(Some(timeouts.write))?;
    stream.set_nodelay(true)?;
    PeerLink::new(stream.try_clone()?)
}

fn receive_loop(mut stream: TcpStream, running: &AtomicBool, sessions: &Sender<SessionMsg>) -> Result<(), NetworkError> {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; READ_BUFFER];
    while running.load(Ordering::SeqCst) {
        let n = match stream.read(&mut buf) {
            Ok(0) => return Err(NetworkError::Disconnected),
            Ok(n) => n,
            Err(e) => {
                let e = NetworkError::from(e);
                if e.is_transient() {
                    continue;
                }
                if !running.load(Ordering::SeqCst) {
                    return Ok(());
                }
                return Err(e);
            }
        };
        decoder.push(&buf[..n]);
        while let Some(decoded) = decoder.next_message() {
            match decoded {
                Ok(msg) => {
                    log::debug!("Received {}", msg.kind());
                    if sessions.send(SessionMsg::Remote(msg)).is_err() {
                        return Ok(());
                    }
                }
                Err(e @ NetworkError::FrameTooLarge(_)) => return Err(e),
                Err(e) => log::warn!("Dropping message: {}", e),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    use crate::config::Settings;
    use crate::network::{prepare, Timeouts};

    #[test]
    fn test_prepare_sets_socket_timeouts() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let dialed = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (accepted, _) = listener.accept().unwrap();

        let settings = Settings { write_timeout: Duration::from_millis(750), ..Settings::default() };
        let link = prepare(&accepted, Timeouts::from_settings(&settings)).unwrap();
        assert_eq!(accepted.read_timeout().unwrap(), Some(settings.read_timeout));
        assert_eq!(link.stream.write_timeout().unwrap(), Some(Duration::from_millis(750)));
        assert_eq!(link.addr(), dialed.local_addr().unwrap());
    }
}
