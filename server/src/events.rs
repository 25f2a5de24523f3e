//! Session event log
//!
//! Every handshake, state transition and message in or out of a session is
//! recorded through an [`EventSink`]. Sinks are synchronous and must return
//! promptly; they are called from inside session tasks.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use vehicle_shared::now_ms;

/// Session id recorded before a handshake has assigned one
pub const NO_SESSION: &str = "-";

/// Append-only destination for session events
pub trait EventSink: Send + Sync {
    fn record(&self, session_id: &str, remote: SocketAddr, text: &str);
}

/// Emits each event as a structured tracing record
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, session_id: &str, remote: SocketAddr, text: &str) {
        info!(
            session = session_id,
            ip = %remote.ip(),
            port = remote.port(),
            "{}",
            text.trim_end()
        );
    }
}

/// Appends `[<epoch-ms>] [<session>] <ip>:<port> - <text>` lines to a file
#[derive(Debug)]
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for FileSink {
    fn record(&self, session_id: &str, remote: SocketAddr, text: &str) {
        let line = format!(
            "[{}] [{}] {}:{} - {}\n",
            now_ms(),
            session_id,
            remote.ip(),
            remote.port(),
            text.trim_end()
        );

        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            warn!("Failed to append session event: {}", e);
        }
    }
}

/// Forwards every event to each inner sink in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn record(&self, session_id: &str, remote: SocketAddr, text: &str) {
        for sink in &self.sinks {
            sink.record(session_id, remote, text);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemorySink;
    use super::*;

    fn remote() -> SocketAddr {
        "10.0.0.7:40000".parse().unwrap()
    }

    #[test]
    fn test_file_sink_appends_lines() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("server.log");

        let sink = FileSink::open(&path).expect("open log");
        sink.record(NO_SESSION, remote(), "NEW CONN|0008|OBSERVER\n");
        sink.record("O0001", remote(), "CACK|0005|O0001");
        drop(sink);

        // reopening appends rather than truncating
        let sink = FileSink::open(&path).expect("reopen log");
        sink.record("O0001", remote(), "DISCONNECTED");

        let contents = std::fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("[-] 10.0.0.7:40000 - NEW CONN|0008|OBSERVER"));
        assert!(lines[1].ends_with("[O0001] 10.0.0.7:40000 - CACK|0005|O0001"));
        assert!(lines[2].ends_with("DISCONNECTED"));
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(MemorySink::default());
        let b = Arc::new(MemorySink::default());
        let fanout = FanoutSink::new()
            .with(a.clone())
            .with(Arc::new(TracingSink))
            .with(b.clone());

        fanout.record("A0001", remote(), "SPUP|0000|");

        assert_eq!(a.texts(), vec!["SPUP|0000|"]);
        assert_eq!(b.events(), a.events());
    }
}
