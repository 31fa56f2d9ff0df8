//! Banner printed whenever a conversation becomes active.

use console::style;

use duologue_types::conversation::ConversationId;
use duologue_types::user::User;

/// Print the partner and conversation id, with a hint about slash commands.
pub fn print_conversation_banner(partner: &User, conversation_id: &ConversationId) {
    let id = conversation_id.as_str();

    println!();
    println!(
        "  {} {} {}",
        style("💬").bold(),
        style(&partner.username).cyan().bold(),
        style(format!("<{}>", partner.email)).dim()
    );
    println!(
        "  {}  {}",
        style("Conversation:").bold(),
        style(&id[..8.min(id.len())]).dim()
    );
    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+D to exit").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}
