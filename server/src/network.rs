//! Server network layer handling WebSocket sessions and event serialization

use crate::error::ArenaError;
use crate::game::Arena;
use crate::router;
use crate::utils::{generate_session_id, unix_timestamp_secs};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Frame, ServerEvent, SessionId, DEFAULT_HOST, DEFAULT_PORT};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Frames queued per session before broadcasts to it start dropping
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            outbound_buffer: 256,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Serial number of an accepted TCP connection, unique for the process lifetime
pub type ConnectionId = u64;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        connection: ConnectionId,
        id: SessionId,
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
    },
    Frame {
        connection: ConnectionId,
        text: String,
    },
    Disconnected {
        connection: ConnectionId,
    },
}

/// A registered WebSocket session and its outbound queue
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    pub sender: mpsc::Sender<Message>,
}

/// Main server owning the arena and every session's outbound queue
///
/// Connection tasks only forward messages; all state changes happen in
/// [`Server::run`], one message at a time.
pub struct Server {
    listener: Option<TcpListener>,
    arena: Arena,
    sessions: HashMap<ConnectionId, Session>,
    outbound_buffer: usize,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            arena: Arena::new(),
            sessions: HashMap::new(),
            outbound_buffer: config.outbound_buffer.max(1),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Spawns task that accepts TCP connections and starts a session for each
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();
        let outbound_buffer = self.outbound_buffer;

        tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut next_connection: ConnectionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let connection = next_connection;
                        next_connection += 1;
                        let id = generate_session_id(&mut rng);
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            connection,
                            id,
                            outbound_buffer,
                            server_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Processes one message from a connection task
    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected {
                connection,
                id,
                addr,
                sender,
            } => match self.arena.connect(id.clone()) {
                Ok(events) => {
                    let session = Session {
                        id,
                        addr,
                        connected_at: Instant::now(),
                        sender,
                    };
                    self.sessions.insert(connection, session);
                    self.broadcast(&events);
                }
                Err(e) => {
                    // Dropping the sender closes the writer and with it the socket
                    error!("Rejecting connection {} from {}: {}", connection, addr, e);
                }
            },
            ServerMessage::Frame { connection, text } => {
                // Rejected connections were never registered
                let Some(session) = self.sessions.get(&connection) else {
                    return;
                };
                let id = session.id.clone();
                match router::route(&mut self.arena, &id, &text, unix_timestamp_secs()) {
                    Ok(events) => self.broadcast(&events),
                    Err(ArenaError::UnknownEvent(name)) => {
                        debug!("Ignoring unknown event {} from {}", name, id);
                    }
                    Err(e) => warn!("Dropping frame from {}: {}", id, e),
                }
            }
            ServerMessage::Disconnected { connection } => {
                let Some(session) = self.sessions.remove(&connection) else {
                    return;
                };
                info!(
                    "Session {} from {} ended after {:.1}s",
                    session.id,
                    session.addr,
                    session.connected_at.elapsed().as_secs_f32()
                );
                let events = self.arena.disconnect(&session.id);
                self.broadcast(&events);
            }
        }
    }

    /// Sends each event to every registered session, sender included
    fn broadcast(&self, events: &[ServerEvent]) {
        for event in events {
            let text = match serde_json::to_string(event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize {}: {}", event.name(), e);
                    continue;
                }
            };

            for session in self.sessions.values() {
                let id = &session.id;
                match session.sender.try_send(Message::text(text.clone())) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!("Outbound queue full for {}, dropping {}", id, event.name());
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Session {} already closing, skipping {}", id, event.name());
                    }
                }
            }
        }
    }

    /// Main server loop; processes session messages strictly one at a time
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();
        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            self.handle_message(message);
        }

        info!("Server shutting down");
        Ok(())
    }
}

/// Drives a single WebSocket session until it closes
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection: ConnectionId,
    id: SessionId,
    outbound_buffer: usize,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };
    info!("Client {} connected from {}", id, addr);

    let (mut ws_sink, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<Message>(outbound_buffer);

    match serde_json::to_string(&Frame::session(&id)) {
        Ok(text) => {
            if tx.send(Message::text(text)).await.is_err() {
                return;
            }
        }
        Err(e) => {
            error!("Failed to encode session frame for {}: {}", id, e);
            return;
        }
    }

    let writer_id = id.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sink.send(message).await {
                debug!("Write to {} failed: {}", writer_id, e);
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    if server_tx
        .send(ServerMessage::Connected {
            connection,
            id: id.clone(),
            addr,
            sender: tx,
        })
        .is_err()
    {
        writer.abort();
        return;
    }

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let frame = ServerMessage::Frame {
                    connection,
                    text: text.as_str().to_owned(),
                };
                if server_tx.send(frame).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => warn!("Ignoring binary frame from {}", id),
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error for {}: {}", id, e);
                break;
            }
        }
    }

    info!("Client {} disconnected", id);
    let _ = server_tx.send(ServerMessage::Disconnected { connection });
    // The writer ends once the main loop drops this session's sender
    if let Err(e) = writer.await {
        error!("Writer task failed: {}", e);
    }
}
