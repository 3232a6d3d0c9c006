//! Terminal rendering for boards, notices and task references.

use anyhow::Result;
use console::style;

use taskdeck::board::{Board, GenerationNotice, SessionState, Task};

const SHORT_ID_LEN: usize = 8;

/// `task-<uuid>` shortened to the first few uuid characters.
pub fn short_id(task_id: &str) -> &str {
    let rest = task_id.strip_prefix("task-").unwrap_or(task_id);
    match rest.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &rest[..end],
        None => rest,
    }
}

pub fn print_state(state: &SessionState) {
    match state {
        SessionState::Ready { .. } => println!("{}", style(state).dim()),
        _ => eprintln!(
            "{} {} (changes are not saved; pass --user to sign in)",
            style("⚠").yellow(),
            state
        ),
    }
}

pub fn print_board(board: &Board) {
    println!();
    for column in board.columns() {
        let tasks = board.column_tasks(&column.id);
        println!(
            "{} {}",
            style(&column.title).bold().cyan(),
            style(format!("({})", tasks.len())).dim()
        );
        if tasks.is_empty() {
            println!("  {}", style("-").dim());
        }
        for task in tasks {
            print_task_line(task);
        }
        println!();
    }
}

fn print_task_line(task: &Task) {
    let marker = if task.generated_prompt.is_some() {
        format!(" {}", style("[prompt]").magenta())
    } else {
        String::new()
    };
    println!(
        "  {} {}{}",
        style(short_id(&task.id)).dim(),
        task.title,
        marker
    );
    if !task.description.is_empty() {
        println!("           {}", style(&task.description).dim());
    }
}

pub fn print_prompt(task: &Task) {
    if let Some(prompt) = &task.generated_prompt {
        println!("{}", style(&task.title).bold());
        println!();
        println!("{}", prompt);
    }
}

pub fn print_notice(notice: &GenerationNotice) {
    eprintln!(
        "{} {}: {}",
        style("⚠").yellow(),
        style(&notice.title).yellow().bold(),
        notice.message
    );
}

pub fn print_save_failure(user_id: &str, error: &str) {
    eprintln!(
        "  {} could not save board for {}: {}",
        style("Error:").red().bold(),
        user_id,
        error
    );
}

/// Resolve a task reference: full id, or a unique prefix of the id with or
/// without the `task-` prefix. Unmatched references pass through unchanged
/// so the session's unknown-id policy decides.
pub fn resolve_task(board: &Board, reference: &str) -> Result<String> {
    if board.task(reference).is_some() {
        return Ok(reference.to_string());
    }
    let matches: Vec<&str> = board
        .tasks()
        .map(|t| t.id.as_str())
        .filter(|id| {
            id.starts_with(reference)
                || id
                    .strip_prefix("task-")
                    .is_some_and(|rest| rest.starts_with(reference))
        })
        .collect();
    match matches.as_slice() {
        [] => Ok(reference.to_string()),
        [single] => Ok(single.to_string()),
        _ => anyhow::bail!(
            "Task reference '{}' is ambiguous ({} matches); use more characters",
            reference,
            matches.len()
        ),
    }
}

/// Resolve a column reference by id or case-insensitive title.
pub fn resolve_column(board: &Board, reference: &str) -> String {
    if board.column(reference).is_some() {
        return reference.to_string();
    }
    board
        .columns()
        .find(|c| c.title.eq_ignore_ascii_case(reference))
        .map(|c| c.id.clone())
        .unwrap_or_else(|| reference.to_string())
}
