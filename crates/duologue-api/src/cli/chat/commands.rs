//! Slash command parsing for the chat loop.
//!
//! Commands start with `/`; anything else is sent as a message.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Exit the chat.
    Exit,
    /// Switch to the conversation with another partner.
    Switch(String),
    /// Unknown or incomplete command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts.get(1).map(|s| s.trim()).filter(|s| !s.is_empty());

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        "/switch" | "/with" => match arg {
            Some(partner) => Some(ChatCommand::Switch(partner.to_string())),
            None => Some(ChatCommand::Unknown(
                "/switch requires an email or username".to_string(),
            )),
        },
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Help text listing all available commands.
pub fn help_text() -> String {
    [
        String::new(),
        format!("  {}", style("Available commands:").bold()),
        String::new(),
        format!("  {}            {}", style("/help").cyan(), "Show this help message"),
        format!("  {} {}", style("/switch <partner>").cyan(), "Chat with someone else"),
        format!("  {}            {}", style("/quit").cyan(), "Leave the chat"),
        String::new(),
        format!("  {}", style("Ctrl+D to exit").dim()),
        String::new(),
    ]
    .join("\n")
}
