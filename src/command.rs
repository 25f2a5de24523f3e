//! Console commands understood by the client

use vehicle_shared::MessageType;

/// A line typed by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Forward a request to the server
    Send(MessageType),
    /// Disconnect and exit
    Quit,
}

/// Parse one console line; `None` for blank or unknown input
pub fn parse(line: &str) -> Option<ConsoleCommand> {
    let command = match line.trim().to_ascii_lowercase().as_str() {
        "spup" | "up" | "faster" => ConsoleCommand::Send(MessageType::SpeedUp),
        "spdn" | "down" | "slower" => ConsoleCommand::Send(MessageType::SpeedDown),
        "tnlf" | "left" => ConsoleCommand::Send(MessageType::TurnLeft),
        "tnrt" | "right" => ConsoleCommand::Send(MessageType::TurnRight),
        "list" | "users" => ConsoleCommand::Send(MessageType::List),
        "quit" | "exit" | "disc" => ConsoleCommand::Quit,
        _ => return None,
    };
    Some(command)
}
