//! End-to-end tests for the taskdeck CLI.
//!
//! Every test runs against its own temporary project directory and SQLite
//! file. Task generation uses a small shell script in place of an LLM CLI.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use taskdeck::board::Board;
use taskdeck::board::db::BoardDb;

/// Helper to create a taskdeck Command isolated from the caller's environment
fn taskdeck(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("taskdeck");
    cmd.current_dir(dir.path())
        .env_remove("TASKDECK_DB")
        .env_remove("TASKDECK_GENERATOR_CMD")
        .env_remove("RUST_LOG");
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join(".taskdeck").join("taskdeck.db")
}

/// Read a user's stored board straight from the database.
fn stored_board(dir: &TempDir, user: &str) -> Option<Board> {
    let db = BoardDb::new(&db_path(dir)).unwrap();
    db.load_board_document(user)
        .unwrap()
        .map(|doc| serde_json::from_str(&doc).unwrap())
}

fn task_id_by_title(board: &Board, title: &str) -> String {
    board
        .tasks()
        .find(|t| t.title == title)
        .map(|t| t.id.clone())
        .unwrap_or_else(|| panic!("no task titled {}", title))
}

fn write_config(dir: &Path, content: &str) {
    let deck_dir = dir.join(".taskdeck");
    fs::create_dir_all(&deck_dir).unwrap();
    fs::write(deck_dir.join("taskdeck.toml"), content).unwrap();
}

/// Install a generator script that answers task requests with two tasks and
/// prompt requests with a fixed prompt.
#[cfg(unix)]
fn install_fake_generator(dir: &TempDir, extra_config: &str) {
    let script = dir.path().join("fake-llm.sh");
    fs::write(
        &script,
        r#"input=$(cat)
case "$input" in
  *"senior full-stack"*) echo "Scaffold the repo, then add CI." ;;
  *) echo 'Here you go: [{"title":"Set up repo","description":"Init git"},{"title":"Write API","description":"REST endpoints"}]' ;;
esac
"#,
    )
    .unwrap();
    write_config(
        dir.path(),
        &format!(
            "[generator]\ncommand = \"sh\"\nargs = [\"{}\"]\ntimeout_secs = 30\n{}",
            script.display(),
            extra_config
        ),
    );
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_taskdeck_help() {
        let dir = create_temp_project();
        taskdeck(&dir).arg("--help").assert().success();
    }

    #[test]
    fn test_taskdeck_version() {
        let dir = create_temp_project();
        taskdeck(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_board_logged_out_shows_default_columns() {
        let dir = create_temp_project();
        taskdeck(&dir)
            .arg("board")
            .assert()
            .success()
            .stdout(predicate::str::contains("To Do"))
            .stdout(predicate::str::contains("In Progress"))
            .stdout(predicate::str::contains("Done"))
            .stderr(predicate::str::contains("logged out"));
    }

    #[test]
    fn test_board_for_unknown_user_stores_nothing() {
        let dir = create_temp_project();
        taskdeck(&dir)
            .args(["--user", "ghost", "board"])
            .assert()
            .success()
            .stdout(predicate::str::contains("signed in as ghost"));
        // loading never writes back
        assert!(stored_board(&dir, "ghost").is_none());
    }
}

// =============================================================================
// Accounts
// =============================================================================

mod accounts {
    use super::*;

    #[test]
    fn test_signup_creates_seed_board() {
        let dir = create_temp_project();
        taskdeck(&dir)
            .args(["signup", "alice"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created account"));

        let board = stored_board(&dir, "alice").expect("board stored");
        assert_eq!(board, Board::seed());

        taskdeck(&dir)
            .arg("users")
            .assert()
            .success()
            .stdout(predicate::str::contains("alice"));
    }

    #[test]
    fn test_signup_existing_user_fails() {
        let dir = create_temp_project();
        taskdeck(&dir).args(["signup", "bob"]).assert().success();
        taskdeck(&dir)
            .args(["signup", "bob"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_users_delete() {
        let dir = create_temp_project();
        taskdeck(&dir).args(["signup", "dave"]).assert().success();
        taskdeck(&dir)
            .args(["--yes", "users", "--delete", "dave"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Deleted"));
        assert!(stored_board(&dir, "dave").is_none());

        taskdeck(&dir)
            .args(["--yes", "users", "--delete", "dave"])
            .assert()
            .success()
            .stdout(predicate::str::contains("not found"));
    }

    #[test]
    fn test_users_empty() {
        let dir = create_temp_project();
        taskdeck(&dir)
            .arg("users")
            .assert()
            .success()
            .stdout(predicate::str::contains("No users found"));
    }

    #[test]
    fn test_db_flag_and_env_select_database() {
        let dir = create_temp_project();
        let custom = dir.path().join("custom.db");
        taskdeck(&dir)
            .arg("--db")
            .arg(&custom)
            .args(["signup", "carol"])
            .assert()
            .success();
        assert!(custom.exists());
        assert!(!db_path(&dir).exists());

        taskdeck(&dir)
            .env("TASKDECK_DB", &custom)
            .arg("users")
            .assert()
            .success()
            .stdout(predicate::str::contains("carol"));
    }
}

// =============================================================================
// Generation and mutations
// =============================================================================

#[cfg(unix)]
mod board_flow {
    use super::*;

    #[test]
    fn test_generate_persists_tasks_for_signed_in_user() {
        let dir = create_temp_project();
        install_fake_generator(&dir, "");

        taskdeck(&dir)
            .args(["--user", "alice", "generate", "todo app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Added 2 task(s) to To Do"))
            .stdout(predicate::str::contains("Set up repo"));

        let board = stored_board(&dir, "alice").expect("board stored");
        assert_eq!(board.task_count(), 2);
        let todo: Vec<&str> = board
            .column_tasks("todo")
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(todo, vec!["Set up repo", "Write API"]);

        // reload from storage in a fresh process
        taskdeck(&dir)
            .args(["--user", "alice", "board"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Write API"));
    }

    #[test]
    fn test_generate_single_adds_one_task() {
        let dir = create_temp_project();
        install_fake_generator(&dir, "");

        taskdeck(&dir)
            .args(["--user", "alice", "generate", "--single", "login page"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Added 1 task(s)"));
        assert_eq!(stored_board(&dir, "alice").unwrap().task_count(), 1);
    }

    #[test]
    fn test_generate_logged_out_is_not_saved() {
        let dir = create_temp_project();
        install_fake_generator(&dir, "");

        taskdeck(&dir)
            .args(["generate", "todo app"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Set up repo"))
            .stderr(predicate::str::contains("not saved"));

        taskdeck(&dir)
            .arg("users")
            .assert()
            .success()
            .stdout(predicate::str::contains("No users found"));
    }

    #[test]
    fn test_move_forward_and_back() {
        let dir = create_temp_project();
        install_fake_generator(&dir, "");
        taskdeck(&dir)
            .args(["--user", "alice", "generate", "todo app"])
            .assert()
            .success();
        let id = task_id_by_title(&stored_board(&dir, "alice").unwrap(), "Write API");

        taskdeck(&dir)
            .args(["--user", "alice", "move", &id, "done"])
            .assert()
            .success();
        assert_eq!(
            stored_board(&dir, "alice").unwrap().column_of(&id),
            Some("done")
        );

        taskdeck(&dir)
            .args(["--user", "alice", "back", &id])
            .assert()
            .success();
        assert_eq!(
            stored_board(&dir, "alice").unwrap().column_of(&id),
            Some("in-progress")
        );

        // short id prefix and column title both resolve
        let short = &id["task-".len().."task-".len() + 8];
        taskdeck(&dir)
            .args(["--user", "alice", "move", short, "To Do"])
            .assert()
            .success();
        let board = stored_board(&dir, "alice").unwrap();
        assert_eq!(board.column_of(&id), Some("todo"));
        // moves append to the target column
        assert_eq!(board.column_tasks("todo").last().unwrap().id, id);
    }

    #[test]
    fn test_forward_from_last_column_is_noop() {
        let dir = create_temp_project();
        install_fake_generator(&dir, "");
        taskdeck(&dir)
            .args(["--user", "alice", "generate", "--single", "x"])
            .assert()
            .success();
        let id = task_id_by_title(&stored_board(&dir, "alice").unwrap(), "Set up repo");

        taskdeck(&dir)
            .args(["--user", "alice", "move", &id, "done"])
            .assert()
            .success();
        taskdeck(&dir)
            .args(["--user", "alice", "forward", &id])
            .assert()
            .success();
        assert_eq!(
            stored_board(&dir, "alice").unwrap().column_of(&id),
            Some("done")
        );
    }

    #[test]
    fn test_unknown_task_tolerated_by_default() {
        let dir = create_temp_project();
        install_fake_generator(&dir, "");
        taskdeck(&dir)
            .args(["--user", "alice", "generate", "x"])
            .assert()
            .success();
        let before = stored_board(&dir, "alice").unwrap();

        taskdeck(&dir)
            .args(["--user", "alice", "move", "no-such-task", "done"])
            .assert()
            .success();
        assert_eq!(stored_board(&dir, "alice").unwrap(), before);
    }

    #[test]
    fn test_unknown_task_rejected_when_configured() {
        let dir = create_temp_project();
        install_fake_generator(&dir, "\n[session]\nunknown_id_policy = \"reject\"\n");
        taskdeck(&dir)
            .args(["--user", "alice", "generate", "x"])
            .assert()
            .success();

        taskdeck(&dir)
            .args(["--user", "alice", "move", "no-such-task", "done"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn test_prompt_is_stored_on_task() {
        let dir = create_temp_project();
        install_fake_generator(&dir, "");
        taskdeck(&dir)
            .args(["--user", "alice", "generate", "x"])
            .assert()
            .success();
        let id = task_id_by_title(&stored_board(&dir, "alice").unwrap(), "Set up repo");

        taskdeck(&dir)
            .args(["--user", "alice", "prompt", &id])
            .assert()
            .success()
            .stdout(predicate::str::contains("Scaffold the repo"));

        let board = stored_board(&dir, "alice").unwrap();
        assert_eq!(
            board.task(&id).unwrap().generated_prompt.as_deref(),
            Some("Scaffold the repo, then add CI.")
        );
    }

    #[test]
    fn test_reset_with_yes_clears_board() {
        let dir = create_temp_project();
        install_fake_generator(&dir, "");
        taskdeck(&dir)
            .args(["--user", "alice", "generate", "x"])
            .assert()
            .success();

        taskdeck(&dir)
            .args(["--user", "alice", "--yes", "reset"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Board reset"));
        assert_eq!(stored_board(&dir, "alice").unwrap(), Board::seed());
    }

    #[test]
    fn test_failing_generator_reports_notice() {
        let dir = create_temp_project();
        write_config(
            dir.path(),
            "[generator]\ncommand = \"sh\"\nargs = [\"-c\", \"cat >/dev/null; exit 3\"]\n",
        );

        taskdeck(&dir)
            .args(["--user", "alice", "generate", "x"])
            .assert()
            .success()
            .stderr(predicate::str::contains("AI Generation Failed"));
        // nothing changed, so nothing was written
        assert!(stored_board(&dir, "alice").is_none());
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_missing_generator_command_reports_configuration_error() {
        let dir = create_temp_project();
        write_config(dir.path(), "[generator]\ncommand = \"\"\n");

        taskdeck(&dir)
            .args(["generate", "anything"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Configuration Error"));
    }

    #[test]
    fn test_config_init_and_show() {
        let dir = create_temp_project();
        taskdeck(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created taskdeck.toml"));
        assert!(dir.path().join(".taskdeck/taskdeck.toml").exists());

        taskdeck(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[session]"))
            .stdout(predicate::str::contains("unknown_id_policy = \"tolerate\""));

        taskdeck(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_warns_on_empty_command() {
        let dir = create_temp_project();
        write_config(dir.path(), "[generator]\ncommand = \"\"\n");
        taskdeck(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("task generation is disabled"));
    }

    #[test]
    fn test_generator_env_override() {
        let dir = create_temp_project();
        taskdeck(&dir)
            .env("TASKDECK_GENERATOR_CMD", "")
            .args(["generate", "anything"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Configuration Error"));
    }
}
