//! Main chat loop orchestration.
//!
//! Signs the acting user in, selects the first partner, then multiplexes
//! keyboard input and the active conversation's message feed in one
//! `tokio::select!` loop until the user quits.

use std::io::Write;

use console::style;
use rustyline_async::SharedWriter;
use tracing::warn;

use duologue_core::{ChatSession, MessageSubscription};
use duologue_infra::store::ConfiguredStore;
use duologue_types::error::ChatError;
use duologue_types::message::ChatMessage;
use duologue_types::user::User;

use crate::cli::conversation::{acting_user, format_message};
use crate::state::AppState;

use super::banner::print_conversation_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};

/// Run the interactive chat loop as `as_user`, starting with `partner`.
pub async fn run_chat_loop(state: &AppState, as_user: &str, partner: &str) -> anyhow::Result<()> {
    let (me, identity) = acting_user(state, as_user).await?;
    let mut session = state.services.session(&identity)?;

    // Resolve the first partner before touching the terminal so lookup
    // errors surface as a normal command failure.
    let mut feed = Some(session.select_partner(partner).await?);
    if let (Some(partner), Some(id)) = (session.partner(), session.active_conversation()) {
        print_conversation_banner(partner, id);
    }

    let (mut chat_input, mut writer) = ChatInput::new(prompt_for(&me, session.partner()))
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    loop {
        tokio::select! {
            item = next_message(&mut feed) => match item {
                Some(Ok(message)) => {
                    let line = format_message(&message, &me, session.partner());
                    let _ = writeln!(writer, "  {line}");
                }
                Some(Err(e)) => {
                    warn!(error = %e, "message feed failed");
                    print_error(&mut writer, &e);
                    feed = None;
                }
                None => feed = None,
            },

            event = chat_input.read_line() => match event {
                InputEvent::Eof | InputEvent::Interrupted => {
                    let _ = writeln!(writer, "\n  {}", style("Chat ended.").dim());
                    break;
                }
                InputEvent::Line(line) if line.is_empty() => {}
                InputEvent::Line(line) => match commands::parse(&line) {
                    Some(ChatCommand::Exit) => {
                        let _ = writeln!(writer, "  {}", style("Chat ended.").dim());
                        break;
                    }
                    Some(ChatCommand::Help) => {
                        let _ = writeln!(writer, "{}", commands::help_text());
                    }
                    Some(ChatCommand::Switch(identifier)) => {
                        feed = switch_partner(&mut session, &identifier, &mut writer).await;
                        chat_input.update_prompt(&prompt_for(&me, session.partner()));
                    }
                    Some(ChatCommand::Unknown(cmd)) => {
                        let _ = writeln!(
                            writer,
                            "  {} Unknown command: {}. Type /help for available commands.",
                            style("?").yellow().bold(),
                            cmd
                        );
                    }
                    None => {
                        if let Err(e) = session.send(&line).await {
                            print_error(&mut writer, &e);
                        }
                    }
                },
            },
        }
    }

    session.close();
    chat_input.flush();
    Ok(())
}

/// Select a new partner. The old feed is torn down even when this fails.
async fn switch_partner(
    session: &mut ChatSession<ConfiguredStore>,
    identifier: &str,
    writer: &mut SharedWriter,
) -> Option<MessageSubscription> {
    match session.select_partner(identifier).await {
        Ok(subscription) => {
            if let Some(partner) = session.partner() {
                let _ = writeln!(
                    writer,
                    "\n  {} Now chatting with {}\n",
                    style("💬").bold(),
                    style(&partner.username).cyan().bold()
                );
            }
            Some(subscription)
        }
        Err(e) => {
            print_error(writer, &e);
            None
        }
    }
}

async fn next_message(
    feed: &mut Option<MessageSubscription>,
) -> Option<Result<ChatMessage, ChatError>> {
    match feed {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

fn prompt_for(me: &User, partner: Option<&User>) -> String {
    match partner {
        Some(partner) => format!(
            "  {} {} ",
            style(&me.username).green().bold(),
            style(format!("→ {} >", partner.username)).dim()
        ),
        None => format!(
            "  {} {} ",
            style(&me.username).green().bold(),
            style("(no conversation, /switch <partner>) >").dim()
        ),
    }
}

fn print_error(writer: &mut SharedWriter, e: &ChatError) {
    let hint = match e {
        ChatError::NoActiveConversation => " Use /switch <partner> first.",
        ChatError::PartnerNotFound(_) => " Check the email or username.",
        _ => "",
    };
    let _ = writeln!(writer, "  {} {e}.{hint}", style("!").red().bold());
}
