//! Individual control session handling

use super::registry::{ConnectionId, Session, SessionRegistry};
use crate::command::{CommandDispatcher, Dispatch};
use crate::events::{EventSink, NO_SESSION};
use crate::shutdown::Shutdown;
use crate::vehicle::VehicleHandle;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use vehicle_shared::{
    codec::{self, LineDecoder, Message},
    defaults, reason, Handshake, MessageType,
};

/// Upper bound on flushing and closing the write side of a finished session
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Shared collaborators every session handler needs
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<SessionRegistry>,
    pub dispatcher: CommandDispatcher,
    pub sink: Arc<dyn EventSink>,
    pub admin_secret: Arc<str>,
    pub max_line_len: usize,
}

impl SessionContext {
    pub fn new(
        vehicle: VehicleHandle,
        registry: Arc<SessionRegistry>,
        sink: Arc<dyn EventSink>,
        admin_secret: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(vehicle, registry.clone()),
            registry,
            sink,
            admin_secret: admin_secret.into(),
            max_line_len: defaults::MAX_LINE_LEN,
        }
    }
}

/// Lifecycle of one control connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingHandshake,
    Authorized,
    Serving,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::AwaitingHandshake => "AWAITING_HANDSHAKE",
            Phase::Authorized => "AUTHORIZED",
            Phase::Serving => "SERVING",
            Phase::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Why the inbound side of a connection stopped
#[derive(Debug)]
enum Hangup {
    Eof,
    ReadFailed(std::io::Error),
    Protocol(codec::CodecError),
    Shutdown,
}

impl fmt::Display for Hangup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hangup::Eof => f.write_str("peer closed"),
            Hangup::ReadFailed(e) => write!(f, "read error: {}", e),
            Hangup::Protocol(e) => write!(f, "{}", e),
            Hangup::Shutdown => f.write_str("server shutdown"),
        }
    }
}

/// Drives one connection from handshake to close
pub struct SessionHandler<S> {
    connection: ConnectionId,
    addr: SocketAddr,
    reader: ReadHalf<S>,
    writer: WriteHalf<S>,
    decoder: LineDecoder,
    read_buf: Vec<u8>,
    ctx: SessionContext,
    shutdown: Shutdown,
    session_id: Option<String>,
    phase: Phase,
}

impl<S> SessionHandler<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Create a handler for a freshly accepted stream
    pub fn new(
        stream: S,
        connection: ConnectionId,
        addr: SocketAddr,
        ctx: SessionContext,
        shutdown: Shutdown,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            connection,
            addr,
            reader,
            writer,
            decoder: LineDecoder::with_max_line_len(ctx.max_line_len),
            read_buf: vec![0u8; 4096],
            ctx,
            shutdown,
            session_id: None,
            phase: Phase::AwaitingHandshake,
        }
    }

    /// Run the connection to completion; always ends in `Closed`
    pub async fn run(mut self) -> Phase {
        self.record(&format!("STATE -> {}", self.phase));

        if let Some(session) = self.handshake().await {
            self.serve(session).await;
        }

        self.close().await;
        self.phase
    }

    async fn handshake(&mut self) -> Option<Session> {
        let line = match self.recv_line().await {
            Ok(line) => line,
            Err(hangup) => {
                self.record(&format!("DISCONNECTED ({})", hangup));
                return None;
            }
        };
        self.record(&format!("NEW {}", line));

        let msg = codec::decode(line.as_bytes());
        if msg.kind() != Some(MessageType::Conn) {
            self.reject(reason::INVALID_MESSAGE, "BAD_HANDSHAKE").await;
            return None;
        }

        let Some(handshake) = Handshake::parse(&msg.payload) else {
            self.reject(reason::INVALID_MESSAGE, "BAD_HANDSHAKE_FMT").await;
            return None;
        };

        if let Handshake::Admin { password, .. } = &handshake {
            if password.as_str() != &*self.ctx.admin_secret {
                warn!("Rejected admin credentials from {}", self.addr);
                self.reject(reason::INVALID_CREDENTIALS, "AUTH_FAIL").await;
                return None;
            }
        }

        self.transition(Phase::Authorized);

        let registered = self
            .ctx
            .registry
            .register(self.connection, self.addr, handshake.role())
            .await;
        let mut session = match registered {
            Ok(session) => session,
            Err(e) => {
                warn!("Refusing {}: {}", self.addr, e);
                self.reject(reason::MAX_CLIENTS_REACHED, "MAX_CLIENTS").await;
                return None;
            }
        };
        self.session_id = Some(session.id.clone());

        let udp_port = handshake.udp_port();
        if udp_port > 0 {
            self.ctx.registry.set_udp_port(self.connection, udp_port).await;
            session.udp_port = udp_port;
        }

        let ack = Message::new(MessageType::Cack.as_str(), session.id.clone());
        if !self.send(&ack, None).await {
            return None;
        }

        info!(
            "Session {} ({}) connected from {} udp={}",
            session.id, session.role, self.addr, session.udp_port
        );
        Some(session)
    }

    async fn serve(&mut self, session: Session) {
        self.transition(Phase::Serving);

        loop {
            let line = match self.recv_line().await {
                Ok(line) => line,
                Err(hangup) => {
                    self.record(&format!("DISCONNECTED ({})", hangup));
                    break;
                }
            };
            self.ctx.registry.touch(self.connection).await;
            self.record(&line);

            let msg = codec::decode(line.as_bytes());
            let dispatch = self.ctx.dispatcher.dispatch(&session, &msg).await;
            if !self.send(dispatch.message(), None).await {
                break;
            }

            if let Dispatch::Disconnect(_) = dispatch {
                self.record("DISCONNECT");
                break;
            }
        }
    }

    async fn close(&mut self) {
        if let Some(session) = self.ctx.registry.unregister(self.connection).await {
            info!(
                "Session {} closed ({}) after {:?}",
                session.id,
                self.addr,
                session.connected_at.elapsed()
            );
        }
        match timeout(CLOSE_TIMEOUT, self.writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Shutdown of {} failed: {}", self.addr, e),
            Err(_) => debug!("Shutdown of {} timed out", self.addr),
        }
        self.transition(Phase::Closed);
    }

    /// Answer a failed handshake with `CERR|<reason>`
    async fn reject(&mut self, reason_code: &str, tag: &str) {
        let msg = Message::new(MessageType::Cerr.as_str(), reason_code);
        self.send(&msg, Some(tag)).await;
    }

    /// Write one message; false when the channel is broken
    async fn send(&mut self, msg: &Message, tag: Option<&str>) -> bool {
        let encoded = msg.encode();
        let written = tokio::select! {
            written = self.writer.write_all(&encoded) => Some(written),
            _ = self.shutdown.recv() => None,
        };
        let Some(written) = written else {
            self.record(&format!("DISCONNECTED ({})", Hangup::Shutdown));
            return false;
        };
        if let Err(e) = written {
            debug!("Write to {} failed: {}", self.addr, e);
            self.record(&format!("SEND_FAILED: {}", e));
            return false;
        }

        let text = String::from_utf8_lossy(&encoded);
        match tag {
            Some(tag) => self.record(&format!("{} {}", tag, text.trim_end())),
            None => self.record(&text),
        }
        true
    }

    /// Read the next complete line from the peer
    async fn recv_line(&mut self) -> Result<String, Hangup> {
        loop {
            match self.decoder.next_line() {
                Ok(Some(line)) => return Ok(line),
                Ok(None) => {}
                Err(e) => return Err(Hangup::Protocol(e)),
            }

            let read = tokio::select! {
                read = self.reader.read(&mut self.read_buf) => read,
                _ = self.shutdown.recv() => return Err(Hangup::Shutdown),
            };

            match read {
                Ok(0) => return Err(Hangup::Eof),
                Ok(n) => self.decoder.extend(&self.read_buf[..n]),
                Err(e) => return Err(Hangup::ReadFailed(e)),
            }
        }
    }

    fn transition(&mut self, phase: Phase) {
        self.phase = phase;
        self.record(&format!("STATE -> {}", phase));
    }

    fn record(&self, text: &str) {
        let session_id = self.session_id.as_deref().unwrap_or(NO_SESSION);
        self.ctx.sink.record(session_id, self.addr, text);
    }
}
