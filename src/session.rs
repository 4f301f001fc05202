use std::collections::HashSet;
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{sleep, spawn, JoinHandle};
use std::time::Duration;

use crate::board::{in_bounds, Color, Square};
use crate::chat::{validate_outgoing, ChatEntry, ChatLog};
use crate::communication_protocol::{Snapshot, WireMessage};
use crate::config::Settings;
use crate::error::{ChatError, MoveError, SessionError};
use crate::game::Game;
use crate::network::PeerLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
    /// Both colors on one machine, nothing sent.
    Local,
}

impl Role {
    pub fn color(&self) -> Option<Color> {
        match self {
            Role::Host => Some(Color::White),
            Role::Client => Some(Color::Black),
            Role::Local => None,
        }
    }

    pub fn peer(&self) -> Role {
        match self {
            Role::Host => Role::Client,
            Role::Client => Role::Host,
            Role::Local => Role::Local,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Host => write!(f, "Host"),
            Role::Client => write!(f, "Client"),
            Role::Local => write!(f, "Local"),
        }
    }
}

#[derive(Debug)]
pub enum SessionMsg {
    LocalMove { start: Square, end: Square, reply: Sender<Result<(), MoveError>> },
    LocalChat { text: String, reply: Sender<Result<(), ChatError>> },
    LegalMoves { square: Square, reply: Sender<HashSet<Square>> },
    View { reply: Sender<GameView> },
    Remote(WireMessage),
    PeerConnected(PeerLink),
    PeerDisconnected,
    Tick,
    Shutdown,
}

/// Read-only copy of the session handed to the UI.
#[derive(Debug, Clone)]
pub struct GameView {
    pub role: Role,
    pub snapshot: Snapshot,
    pub chat: Vec<ChatEntry>,
    pub connected: bool,
    pub history_len: usize,
}

/// Game and chat owned by the session thread. Every handler returns the
/// messages to send to the peer; nothing is returned while unconnected.
#[derive(Debug)]
pub struct SessionState {
    pub role: Role,
    pub game: Game,
    pub chat: ChatLog,
    pub connected: bool,
}

impl SessionState {
    pub fn new(role: Role, settings: &Settings) -> SessionState {
        let mut game = Game::with_time_mode(settings.time_mode);
        if role == Role::Local {
            game.start();
        }
        SessionState { role, game, chat: ChatLog::with_capacity(settings.chat_capacity), connected: false }
    }

    /// The color this side may move, `None` when both are local.
    fn own_color(&self) -> Option<Color> {
        if self.connected { self.role.color() } else { None }
    }

    fn outgoing(&self, msgs: Vec<WireMessage>) -> Vec<WireMessage> {
        if self.connected { msgs } else { Vec::new() }
    }

    fn snapshot_msg(&self) -> WireMessage {
        WireMessage::Snapshot(Box::new(self.game.snapshot()))
    }

    pub fn local_move(&mut self, start: Square, end: Square) -> Result<Vec<WireMessage>, MoveError> {
        if let (Some(own), Some(piece)) = (self.own_color(), self.game.board.get(start)) {
            if piece.color != own {
                return Err(MoveError::NotYourPiece(own));
            }
        }
        self.game.try_move(start, end)?;
        Ok(self.outgoing(vec![WireMessage::Move { start, end }, self.snapshot_msg()]))
    }

    pub fn legal_moves(&self, square: Square) -> HashSet<Square> {
        match (self.own_color(), self.game.board.get(square)) {
            (Some(own), Some(piece)) if piece.color != own => HashSet::new(),
            _ => self.game.legal_moves(square),
        }
    }

    pub fn local_chat(&mut self, text: &str) -> Result<Vec<WireMessage>, ChatError> {
        let message = validate_outgoing(text)?;
        self.chat.push(&self.role.to_string(), &message);
        Ok(self.outgoing(vec![WireMessage::Chat { message }]))
    }

    pub fn remote(&mut self, msg: WireMessage) -> Vec<WireMessage> {
        match msg {
            WireMessage::Move { start, end } if !in_bounds(start) || !in_bounds(end) => {
                log::warn!("Malformed move {:?} -> {:?} from {}, requesting sync", start, end, self.role.peer());
                self.outgoing(vec![WireMessage::SyncRequest])
            }
            WireMessage::Move { start, end } => {
                let own = self.role.color();
                let mover = self.game.board.get(start).map(|p| p.color);
                let result = if own.is_some() && mover == own {
                    Err(MoveError::NotYourPiece(self.role.peer().color().unwrap_or(Color::White)))
                } else {
                    self.game.try_move(start, end).map(|_| ())
                };
                match result {
                    Ok(()) => Vec::new(),
                    Err(e) => {
                        log::warn!("Rejected move from {}: {}, requesting sync", self.role.peer(), e);
                        self.outgoing(vec![WireMessage::SyncRequest])
                    }
                }
            }
            WireMessage::Snapshot(snapshot) => {
                self.game.restore(*snapshot);
                log::debug!("Snapshot applied, {} to move", self.game.turn);
                Vec::new()
            }
            WireMessage::Chat { message } => {
                self.chat.push(&self.role.peer().to_string(), &message);
                Vec::new()
            }
            WireMessage::SyncRequest => self.outgoing(vec![self.snapshot_msg()]),
        }
    }

    /// The host starts or resumes the clock for the side to move when its
    /// client arrives and sends the current position either way.
    pub fn peer_connected(&mut self) -> Vec<WireMessage> {
        self.connected = true;
        log::info!("{} connected", self.role.peer());
        if self.role != Role::Host {
            return Vec::new();
        }
        self.game.start();
        vec![self.snapshot_msg()]
    }

    /// Stops both clocks until a peer is back; play continues locally.
    pub fn peer_disconnected(&mut self) {
        if self.connected {
            log::info!("{} left, continuing locally", self.role.peer());
            self.game.pause();
        }
        self.connected = false;
    }

    pub fn tick(&mut self) {
        self.game.tick();
    }

    pub fn view(&self) -> GameView {
        GameView {
            role: self.role,
            snapshot: self.game.snapshot(),
            chat: self.chat.entries(),
            connected: self.connected,
            history_len: self.game.history.len(),
        }
    }
}

fn send_all(link: &mut Option<PeerLink>, state: &mut SessionState, msgs: Vec<WireMessage>) {
    let Some(peer) = link.as_mut() else { return };
    for msg in msgs {
        if let Err(e) = peer.send(&msg) {
            log::error!("Cannot send {} to {}, error: {}", msg.kind(), peer.addr(), e);
            peer.close();
            *link = None;
            state.peer_disconnected();
            return;
        }
    }
}

/// Actor loop. Owns the game, the chat log and the write half of the
/// connection until `Shutdown` arrives or every sender is dropped.
pub fn handle_session(mut state: SessionState, receiver: Receiver<SessionMsg>) {
    let mut link: Option<PeerLink> = None;
    loop {
        let msg = match receiver.recv() {
            Ok(m) => m,
            Err(_) => break,
        };
        match msg {
            SessionMsg::LocalMove { start, end, reply } => {
                let result = state.local_move(start, end).map(|out| send_all(&mut link, &mut state, out));
                if let Err(e) = &result {
                    log::debug!("Move refused: {}", e);
                }
                let _ = reply.send(result);
            }
            SessionMsg::LocalChat { text, reply } => {
                let result = state.local_chat(&text).map(|out| send_all(&mut link, &mut state, out));
                let _ = reply.send(result);
            }
            SessionMsg::LegalMoves { square, reply } => {
                let _ = reply.send(state.legal_moves(square));
            }
            SessionMsg::View { reply } => {
                let _ = reply.send(state.view());
            }
            SessionMsg::Remote(wire) => {
                let out = state.remote(wire);
                send_all(&mut link, &mut state, out);
            }
            SessionMsg::PeerConnected(peer) => {
                log::debug!("Peer link to {}", peer.addr());
                if let Some(old) = link.replace(peer) {
                    old.close();
                }
                let out = state.peer_connected();
                send_all(&mut link, &mut state, out);
            }
            SessionMsg::PeerDisconnected => {
                link = None;
                state.peer_disconnected();
            }
            SessionMsg::Tick => state.tick(),
            SessionMsg::Shutdown => break,
        }
    }
    if let Some(peer) = link {
        peer.close();
    }
    log::debug!("Session stopped");
}

/// Sends `Tick` every `interval` until the session goes away.
pub fn thread_clock_ticker(sender: Sender<SessionMsg>, interval: Duration) {
    loop {
        sleep(interval);
        if sender.send(SessionMsg::Tick).is_err() {
            return;
        }
    }
}

/// UI-side handle to a running session thread.
pub struct Session {
    sender: Sender<SessionMsg>,
    thread: Option<JoinHandle<()>>,
}

impl Session {
    pub fn spawn(state: SessionState) -> Session {
        let (sender, receiver) = channel();
        let thread = spawn(move || handle_session(state, receiver));
        Session { sender, thread: Some(thread) }
    }

    pub fn sender(&self) -> Sender<SessionMsg> {
        self.sender.clone()
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> SessionMsg) -> Result<T, SessionError> {
        let (reply, response) = channel();
        self.sender.send(make(reply)).map_err(|_| SessionError::Closed)?;
        response.recv().map_err(|_| SessionError::Closed)
    }

    pub fn try_move(&self, start: Square, end: Square) -> Result<(), SessionError> {
        Ok(self.request(|reply| SessionMsg::LocalMove { start, end, reply })??)
    }

    pub fn send_chat(&self, text: &str) -> Result<(), SessionError> {
        let text = text.to_string();
        Ok(self.request(|reply| SessionMsg::LocalChat { text, reply })??)
    }

    pub fn legal_moves(&self, square: Square) -> Result<HashSet<Square>, SessionError> {
        self.request(|reply| SessionMsg::LegalMoves { square, reply })
    }

    pub fn view(&self) -> Result<GameView, SessionError> {
        self.request(|reply| SessionMsg::View { reply })
    }

    pub fn shutdown(mut self) {
        let _ = self.sender.send(SessionMsg::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Session thread panicked");
            }
        }
    }
}
