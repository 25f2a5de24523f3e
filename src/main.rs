mod command;
mod config;
mod connection;
mod telemetry;

use anyhow::Result;
use command::ConsoleCommand;
use config::ClientConfig;
use connection::ControlConnection;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vehicle_shared::{Handshake, MessageType, Role};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ClientConfig::from_env()?;
    info!("Vehicle client starting: {} as {}", config.server, config.role);

    // Telemetry arrives on a local UDP socket announced in the handshake
    let udp = telemetry::bind(config.udp_port).await?;
    let udp_port = udp.local_addr()?.port();
    info!("Telemetry socket on UDP:{}", udp_port);

    let mut conn = ControlConnection::connect(&config.server, config.connect_timeout).await?;
    let handshake = match config.role {
        Role::Admin => Handshake::Admin {
            password: config.password.clone(),
            udp_port,
        },
        Role::Observer => Handshake::Observer { udp_port },
    };
    let session_id = conn.handshake(&handshake).await?;
    info!("Connected to {} as session {}", conn.peer(), session_id);

    tokio::spawn(telemetry::run(udp));

    info!("Commands: up, down, left, right, list, quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match command::parse(&line) {
            Some(ConsoleCommand::Send(kind)) => match conn.request(kind, "").await {
                Ok(reply) => print_reply(kind, &reply),
                Err(e) => {
                    error!("Connection lost: {}", e);
                    return Ok(());
                }
            },
            Some(ConsoleCommand::Quit) => break,
            None if line.trim().is_empty() => {}
            None => warn!("Unknown command: {}", line.trim()),
        }
    }

    conn.disconnect().await?;
    info!("Disconnected");
    Ok(())
}

fn print_reply(request: MessageType, reply: &vehicle_shared::Message) {
    match reply.kind() {
        Some(MessageType::Cmok) => info!("{} -> {}", request, reply.payload),
        Some(MessageType::List) => {
            let mut entries = reply.payload.split('|');
            let count = entries.next().unwrap_or("0");
            info!("{} session(s) connected", count);
            for entry in entries {
                info!("  {}", entry);
            }
        }
        _ => warn!("{} -> {} {}", request, reply.msg_type, reply.payload),
    }
}
