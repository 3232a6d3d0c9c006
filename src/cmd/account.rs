//! Account commands: `signup` and `users`.

use anyhow::Result;
use console::style;
use dialoguer::Confirm;
use std::path::Path;

use super::super::Cli;
use super::DeckSession;
use super::render::{print_board, print_state};

pub async fn cmd_signup(project_dir: &Path, cli: &Cli, user: &str) -> Result<()> {
    let user = user.trim();
    if user.is_empty() {
        anyhow::bail!("User id must not be empty");
    }

    let mut session = DeckSession::open(project_dir, cli).await?;
    let owned = user.to_string();
    let exists = session
        .gateway
        .db()
        .call(move |db| Ok(db.load_board_document(&owned)?.is_some()))
        .await?;
    if exists {
        anyhow::bail!("User '{}' already exists", user);
    }

    session.controller.sign_up(user).await;
    session.finish().await;
    println!("{} Created account {}", style("✓").green(), style(user).bold());
    print_state(&session.controller.state().await);
    print_board(&session.controller.board().await);
    Ok(())
}

pub async fn cmd_users(project_dir: &Path, cli: &Cli, delete: Option<&str>) -> Result<()> {
    let session = DeckSession::open(project_dir, cli).await?;

    if let Some(user) = delete {
        if !cli.yes {
            let confirm = Confirm::new()
                .with_prompt(format!("Delete the stored board for '{}'?", user))
                .default(false)
                .interact()
                .unwrap_or(false);
            if !confirm {
                println!("Aborted.");
                return Ok(());
            }
        }
        let owned = user.to_string();
        if session.gateway.db().call(move |db| db.delete_user(&owned)).await? {
            println!("{} Deleted {}", style("✓").green(), style(user).bold());
        } else {
            println!("User '{}' not found.", user);
        }
        return Ok(());
    }

    let users = session.gateway.db().call(|db| db.list_users()).await?;

    if users.is_empty() {
        println!("No users found. Run 'taskdeck signup <user>' to create one.");
        return Ok(());
    }

    println!("{:<24} {:<6} Updated", "User", "Tasks");
    println!("{:<24} {:<6} -------", "------------------------", "-----");
    for user in &users {
        println!("{:<24} {:<6} {}", user.id, user.task_count, user.updated_at);
    }
    Ok(())
}
