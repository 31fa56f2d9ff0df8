//! Directory CLI commands: add, show.

use anyhow::Result;
use console::style;

use duologue_types::error::ChatError;
use duologue_types::user::{NewUser, User, UserId};

use crate::state::AppState;

/// Register a user profile.
///
/// # Examples
///
/// ```bash
/// duo user add --email alice@x.com --username alice
/// ```
pub async fn add_user(
    state: &AppState,
    email: String,
    username: String,
    id: Option<String>,
    json: bool,
) -> Result<()> {
    let mut new_user = NewUser::new(email, username);
    if let Some(id) = id {
        new_user.id = UserId::from(id);
    }
    let user = state.services.directory().register(new_user).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
        return Ok(());
    }

    println!();
    println!("  {} User registered!", style("✓").green().bold());
    println!();
    print_user(&user);
    println!();
    Ok(())
}

/// Show a user by email, username or id.
pub async fn show_user(state: &AppState, identifier: &str, json: bool) -> Result<()> {
    let user = find_user(state, identifier).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
        return Ok(());
    }

    println!();
    print_user(&user);
    println!();
    Ok(())
}

/// Resolve a user by email or username, falling back to the raw id.
pub async fn find_user(state: &AppState, identifier: &str) -> Result<User> {
    let directory = state.services.directory();
    match directory.lookup(identifier).await {
        Ok(user) => Ok(user),
        Err(ChatError::PartnerNotFound(_)) => directory
            .get(&UserId::from(identifier.trim()))
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No user matches '{identifier}'. Register one with: duo user add --email <email> --username <name>"
                )
            }),
        Err(e) => Err(e.into()),
    }
}

fn print_user(user: &User) {
    println!("  {}  {}", style("Username:").bold(), style(&user.username).cyan());
    println!("  {}     {}", style("Email:").bold(), &user.email);
    println!("  {}        {}", style("ID:").bold(), style(&user.id).dim());
}
