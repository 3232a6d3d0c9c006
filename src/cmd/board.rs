//! Board view and mutation commands.

use anyhow::Result;
use dialoguer::Confirm;
use std::path::Path;

use taskdeck::board::GenerationMode;

use super::super::Cli;
use super::DeckSession;
use super::render::{self, print_board, print_state, resolve_column, resolve_task};

pub async fn cmd_board(project_dir: &Path, cli: &Cli) -> Result<()> {
    let mut session = DeckSession::open(project_dir, cli).await?;
    session.finish().await;
    print_state(&session.controller.state().await);
    print_board(&session.controller.board().await);
    Ok(())
}

pub async fn cmd_move(project_dir: &Path, cli: &Cli, task: &str, column: &str) -> Result<()> {
    let mut session = DeckSession::open(project_dir, cli).await?;
    let current = session.controller.board().await;
    let task_id = resolve_task(&current, task)?;
    let column_id = resolve_column(&current, column);

    let board = session.controller.move_task(&task_id, &column_id).await?;
    session.finish().await;
    print_state(&session.controller.state().await);
    print_board(&board);
    Ok(())
}

/// `forward` / `back`: move to the adjacent column in display order.
pub async fn cmd_step(project_dir: &Path, cli: &Cli, task: &str, forward: bool) -> Result<()> {
    let mut session = DeckSession::open(project_dir, cli).await?;
    let task_id = resolve_task(&session.controller.board().await, task)?;

    let board = if forward {
        session.controller.move_forward(&task_id).await?
    } else {
        session.controller.move_backward(&task_id).await?
    };
    session.finish().await;
    print_state(&session.controller.state().await);
    print_board(&board);
    Ok(())
}

pub async fn cmd_generate(project_dir: &Path, cli: &Cli, prompt: &str, single: bool) -> Result<()> {
    let mut session = DeckSession::open(project_dir, cli).await?;
    let mode = if single {
        GenerationMode::Single
    } else {
        GenerationMode::Full
    };

    println!("Generating tasks for \"{}\"...", prompt);
    let outcome = session.controller.generate_tasks(prompt, mode).await?;
    session.finish().await;

    if !outcome.added.is_empty() {
        println!(
            "{} Added {} task(s) to {}",
            console::style("✓").green(),
            outcome.added.len(),
            outcome
                .board
                .column_of(&outcome.added[0])
                .and_then(|id| outcome.board.column(id))
                .map(|c| c.title.as_str())
                .unwrap_or("the board")
        );
    }
    print_state(&session.controller.state().await);
    print_board(&outcome.board);
    Ok(())
}

pub async fn cmd_prompt(project_dir: &Path, cli: &Cli, task: &str) -> Result<()> {
    let mut session = DeckSession::open(project_dir, cli).await?;
    let task_id = resolve_task(&session.controller.board().await, task)?;

    let board = session.controller.attach_generated_prompt(&task_id).await?;
    session.finish().await;
    print_state(&session.controller.state().await);
    match board.task(&task_id) {
        Some(task) if task.generated_prompt.is_some() => render::print_prompt(task),
        Some(_) => println!("No prompt stored for this task."),
        None => println!("Task '{}' not found.", task),
    }
    Ok(())
}

pub async fn cmd_reset(project_dir: &Path, cli: &Cli) -> Result<()> {
    let mut session = DeckSession::open(project_dir, cli).await?;
    let task_count = session.controller.board().await.task_count();

    if !cli.yes && task_count > 0 {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "This will delete all {} task(s) from the board. Are you sure?",
                task_count
            ))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirm {
            println!("Aborted.");
            return Ok(());
        }
    }

    let board = session.controller.reset_board().await?;
    session.finish().await;
    println!("Board reset.");
    print_state(&session.controller.state().await);
    print_board(&board);
    Ok(())
}
