//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                         |
//! |-----------|----------------------------------------------------------|
//! | `board`   | `Board`, `Move`, `Forward`, `Back`, `Generate`, `Prompt`, `Reset` |
//! | `account` | `Signup`, `Users`                                        |
//! | `config`  | `Config`                                                 |
//! | `render`  | shared board / notice printing                           |
//!
//! Every invocation opens its own session: sign in (when `--user` is given),
//! run one operation, wait for autosave to drain, print the result.

pub mod account;
pub mod board;
pub mod config;
pub mod render;

pub use account::{cmd_signup, cmd_users};
pub use board::{cmd_board, cmd_generate, cmd_move, cmd_prompt, cmd_reset, cmd_step};
pub use config::cmd_config;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};

use taskdeck::board::db::SqliteGateway;
use taskdeck::board::{SessionController, SessionEvent};
use taskdeck::config::DeckConfig;

use super::Cli;

/// One CLI invocation's view of the board.
pub struct DeckSession {
    pub controller: SessionController,
    pub gateway: Arc<SqliteGateway>,
    events: broadcast::Receiver<SessionEvent>,
}

impl DeckSession {
    /// Open storage and the generator; sign in when `--user` was given.
    pub async fn open(project_dir: &Path, cli: &Cli) -> Result<Self> {
        let config = DeckConfig::load(project_dir)?.with_cli_db(cli.db.clone());
        let gateway = Arc::new(SqliteGateway::open(&config.resolved_db_path())?);
        let controller = SessionController::new(
            gateway.clone(),
            Arc::new(config.generator()),
            config.session_config(),
        );
        let events = controller.subscribe();

        let session = Self {
            controller,
            gateway,
            events,
        };
        if let Some(user) = &cli.user {
            session.controller.sign_in(user).await;
        }
        Ok(session)
    }

    /// Wait for pending saves, then print notices and save failures
    /// collected since the session opened.
    pub async fn finish(&mut self) {
        self.controller.flush().await;
        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::Notice { notice }) => render::print_notice(&notice),
                Ok(SessionEvent::SaveFailed { user_id, error }) => {
                    render::print_save_failure(&user_id, &error)
                }
                Ok(SessionEvent::StateChanged { .. } | SessionEvent::BoardChanged { .. }) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "session events lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}
