//! Conversation CLI commands: list, open, send.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use duologue_core::identity::StaticIdentity;
use duologue_types::message::ChatMessage;
use duologue_types::user::User;

use crate::cli::user::find_user;
use crate::state::AppState;

/// Sign the `--as` user in for this process.
pub async fn acting_user(state: &AppState, as_user: &str) -> Result<(User, StaticIdentity)> {
    let user = find_user(state, as_user).await?;
    let identity = StaticIdentity::signed_in(user.id.clone());
    Ok((user, identity))
}

/// List every conversation the acting user takes part in.
pub async fn list_conversations(state: &AppState, as_user: &str, json: bool) -> Result<()> {
    let (me, _) = acting_user(state, as_user).await?;
    let conversations = state.services.resolver().conversations_for(&me.id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!(
            "  {} No conversations yet. Start one with: {}",
            style("i").blue().bold(),
            style(format!("duo chat <partner> --as {}", me.username)).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Partner").fg(Color::White),
        Cell::new("Email").fg(Color::White),
        Cell::new("Conversation").fg(Color::White),
    ]);

    for conversation in &conversations {
        let Some(partner_id) = conversation.partner_of(&me.id) else {
            continue;
        };
        let (name, email) = match state.services.directory().get(partner_id).await? {
            Some(partner) => (partner.username, partner.email),
            None => (partner_id.to_string(), "-".to_string()),
        };
        table.add_row(vec![
            Cell::new(name).fg(Color::Cyan),
            Cell::new(email),
            Cell::new(&conversation.id).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Find or create the conversation with `partner` and print its history.
pub async fn open_conversation(
    state: &AppState,
    partner: &str,
    as_user: &str,
    json: bool,
) -> Result<()> {
    let (me, identity) = acting_user(state, as_user).await?;
    let mut session = state.services.session(&identity)?;
    let subscription = session.select_partner(partner).await?;
    let conversation_id = subscription.conversation_id().clone();
    drop(subscription);

    let history = state.services.messages().history(&conversation_id).await?;

    if json {
        let out = serde_json::json!({
            "conversation_id": conversation_id,
            "partner": session.partner(),
            "messages": history,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let partner = session.partner().cloned();
    let partner_name = partner.as_ref().map_or("?", |p| p.username.as_str());
    println!();
    println!(
        "  {} Conversation with {}",
        style("💬").bold(),
        style(partner_name).cyan()
    );
    println!("  {}", style(&conversation_id).dim());
    println!();
    if history.is_empty() {
        println!("  {}", style("No messages yet.").dim());
    }
    for message in &history {
        println!("  {}", format_message(message, &me, partner.as_ref()));
    }
    println!();
    Ok(())
}

/// Send one message to `partner` as the acting user.
pub async fn send_message(
    state: &AppState,
    partner: &str,
    text: &str,
    as_user: &str,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let (_, identity) = acting_user(state, as_user).await?;
    let mut session = state.services.session(&identity)?;
    // The live feed is not needed for a one-shot send.
    drop(session.select_partner(partner).await?);
    let message_id = session.send(text).await?;

    if json {
        let out = serde_json::json!({
            "id": message_id,
            "conversation_id": session.active_conversation(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !quiet {
        println!("  {} Sent", style("✓").green().bold());
    }
    Ok(())
}

/// One rendered line: local time, author, body. Own messages are green.
pub fn format_message(message: &ChatMessage, me: &User, partner: Option<&User>) -> String {
    let time = chrono::DateTime::from_timestamp_millis(message.timestamp)
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());

    let author = if message.is_from(&me.id) {
        style(me.username.clone()).green().bold()
    } else {
        let name = partner
            .filter(|p| p.id == message.sender_id)
            .map_or_else(|| message.sender_id.to_string(), |p| p.username.clone());
        style(name).cyan().bold()
    };

    format!("{} {} {}", style(time).dim(), author, message.body)
}
