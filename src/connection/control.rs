//! Request/reply control connection over TCP

use anyhow::{anyhow, bail, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use vehicle_shared::{
    codec::{self, LineDecoder, Message},
    Handshake, MessageType,
};

/// An open control channel; one request in flight at a time
pub struct ControlConnection {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    decoder: LineDecoder,
    read_buf: Vec<u8>,
    peer: SocketAddr,
}

impl ControlConnection {
    /// Connect to the server
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| anyhow!("Timed out connecting to {}", addr))??;
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            reader,
            writer,
            decoder: LineDecoder::new(),
            read_buf: vec![0u8; 4096],
            peer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Perform the `CONN` handshake and return the assigned session id
    pub async fn handshake(&mut self, handshake: &Handshake) -> Result<String> {
        let reply = self
            .request(MessageType::Conn, &handshake.to_payload())
            .await?;

        match reply.kind() {
            Some(MessageType::Cack) => Ok(reply.payload),
            Some(MessageType::Cerr) => bail!("Handshake rejected: {}", reply.payload),
            _ => bail!("Unexpected handshake reply: {:?}", reply),
        }
    }

    /// Send one message and wait for the reply
    pub async fn request(&mut self, kind: MessageType, payload: &str) -> Result<Message> {
        self.send(kind, payload).await?;
        self.recv()
            .await?
            .ok_or_else(|| anyhow!("Server closed the connection"))
    }

    pub async fn send(&mut self, kind: MessageType, payload: &str) -> Result<()> {
        let encoded = codec::encode_kind(kind, payload);
        debug!("-> {}", String::from_utf8_lossy(&encoded).trim_end());
        self.writer.write_all(&encoded).await?;
        Ok(())
    }

    /// Next message from the server, `None` once it closes the channel
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(msg) = self.decoder.decode_next()? {
                debug!("<- {}|{}", msg.msg_type, msg.payload);
                return Ok(Some(msg));
            }

            let n = self.reader.read(&mut self.read_buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }

    /// Send `DISC` and wait for the acknowledgement
    pub async fn disconnect(mut self) -> Result<()> {
        let reply = self.request(MessageType::Disc, "").await?;
        if reply.kind() != Some(MessageType::Dack) {
            bail!("Unexpected disconnect reply: {:?}", reply);
        }
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    /// Answers each line with the next canned reply, then closes
    async fn scripted_server(replies: Vec<&'static str>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            let mut received = Vec::new();
            for reply in replies {
                let Some(line) = lines.next_line().await.unwrap() else {
                    break;
                };
                received.push(line);
                writer.write_all(reply.as_bytes()).await.unwrap();
            }
            received
        });
        (addr, task)
    }

    #[tokio::test]
    async fn test_handshake_and_command() {
        let (addr, server) =
            scripted_server(vec!["CACK|0005|A0001\n", "CMOK|0008|EXECUTED\n", "DACK|0007|GOODBYE\n"])
                .await;

        let mut conn = ControlConnection::connect(&addr, Duration::from_secs(2))
            .await
            .unwrap();
        let hs = Handshake::Admin {
            password: "admin123".into(),
            udp_port: 5005,
        };
        assert_eq!(conn.handshake(&hs).await.unwrap(), "A0001");

        let reply = conn.request(MessageType::SpeedUp, "").await.unwrap();
        assert_eq!(reply, Message::new("CMOK", "EXECUTED"));
        conn.disconnect().await.unwrap();

        assert_eq!(
            server.await.unwrap(),
            vec![
                "CONN|0019|ADMIN:admin123:5005",
                "SPUP|0000|",
                "DISC|0000|",
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_handshake() {
        let (addr, _server) = scripted_server(vec!["CERR|0019|INVALID_CREDENTIALS\n"]).await;

        let mut conn = ControlConnection::connect(&addr, Duration::from_secs(2))
            .await
            .unwrap();
        let hs = Handshake::Admin {
            password: "nope".into(),
            udp_port: 0,
        };
        let err = conn.handshake(&hs).await.unwrap_err();
        assert!(err.to_string().contains("INVALID_CREDENTIALS"));
    }

    #[tokio::test]
    async fn test_server_close_is_none() {
        let (addr, _server) = scripted_server(vec![]).await;
        let mut conn = ControlConnection::connect(&addr, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(conn.recv().await.unwrap().is_none());
    }
}
