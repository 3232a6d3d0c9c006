//! Session controller: ties auth state to board load/save.
//!
//! ```text
//!            SignedIn(u)              load done
//! LoggedOut ────────────> Loading ─────────────> Ready ──┐ mutation → autosave
//!     ^                      │                     │ <───┘
//!     └──────── SignedOut ───┴─────────────────────┘
//! ```
//!
//! Installing a loaded board goes through the same `publish` path as a user
//! mutation. A one-shot flag armed just before that publish suppresses the
//! save it would otherwise trigger. Arming, publishing and consuming all
//! happen under one lock, so no mutation can slip in between.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::autosave::{AutosaveConfig, AutosaveQueue, SaveStatus};
use super::events::{SessionEvent, broadcast_event};
use super::gateway::{BoardGateway, LoadOutcome};
use super::generator::{GenerationMode, GenerationNotice, TaskGenerator};
use super::models::{Board, Task};
use super::mutator::{BoardMutator, InsertOutcome, UnknownIdPolicy};
use crate::errors::BoardError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    Loading { user_id: String },
    Ready { user_id: String },
}

impl SessionState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            SessionState::LoggedOut => None,
            SessionState::Loading { user_id } | SessionState::Ready { user_id } => Some(user_id),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready { .. })
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::LoggedOut => write!(f, "logged out"),
            SessionState::Loading { user_id } => write!(f, "loading board for {}", user_id),
            SessionState::Ready { user_id } => write!(f, "signed in as {}", user_id),
        }
    }
}

/// Transitions reported by the external auth-state notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(String),
    SignedOut,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub unknown_id_policy: UnknownIdPolicy,
    pub autosave: AutosaveConfig,
}

struct SessionInner {
    state: SessionState,
    board: Board,
    /// Bumped on every sign-in/out; a load or generation result for an
    /// older epoch is discarded.
    epoch: u64,
    suppress_next_autosave: bool,
    autosave: Option<AutosaveQueue>,
    /// Queue of the last session that was signed out or replaced. Its
    /// pending write must land before the next load reads the store.
    draining: Option<AutosaveQueue>,
}

pub struct SessionController {
    gateway: Arc<dyn BoardGateway>,
    generator: Arc<dyn TaskGenerator>,
    mutator: BoardMutator,
    autosave_config: AutosaveConfig,
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn BoardGateway>,
        generator: Arc<dyn TaskGenerator>,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            gateway,
            generator,
            mutator: BoardMutator::new(config.unknown_id_policy),
            autosave_config: config.autosave,
            inner: Mutex::new(SessionInner {
                state: SessionState::LoggedOut,
                board: Board::seed(),
                epoch: 0,
                suppress_next_autosave: false,
                autosave: None,
                draining: None,
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    /// Current board snapshot.
    pub async fn board(&self) -> Board {
        self.inner.lock().await.board.clone()
    }

    pub async fn handle_auth_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(user_id) => self.sign_in(&user_id).await,
            AuthEvent::SignedOut => self.sign_out().await,
        }
    }

    /// LoggedOut/Ready → Loading → Ready. Load failures fall back to the seed
    /// board; they never block the session.
    pub async fn sign_in(&self, user_id: &str) {
        let (epoch, previous) = {
            let mut inner = self.inner.lock().await;
            inner.epoch += 1;
            inner.state = SessionState::Loading {
                user_id: user_id.to_string(),
            };
            inner.board = Board::seed();
            inner.suppress_next_autosave = false;
            Self::retire_autosave(&mut inner);
            self.emit_state(&inner);
            (inner.epoch, inner.draining.clone())
        };

        if let Some(previous) = previous {
            debug!(user_id, previous = previous.user_id(), "waiting for pending save before load");
            previous.wait_idle().await;
        }

        let outcome = self.gateway.load(user_id).await;
        match &outcome {
            LoadOutcome::Loaded(board) => {
                info!(user_id, tasks = board.task_count(), "loaded board")
            }
            LoadOutcome::Absent => info!(user_id, "no stored board; starting from the default board"),
            LoadOutcome::Failed(reason) => {
                warn!(user_id, "board load failed, using the default board: {}", reason)
            }
        }
        let board = outcome.into_board();

        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            debug!(user_id, "discarding board load for a superseded session");
            return;
        }
        inner.autosave = Some(AutosaveQueue::new(
            user_id,
            self.gateway.clone(),
            self.autosave_config,
            self.events.clone(),
        ));
        inner.state = SessionState::Ready {
            user_id: user_id.to_string(),
        };
        inner.suppress_next_autosave = true;
        self.publish(&mut inner, board).await;
        self.emit_state(&inner);
    }

    /// Create the stored seed board for a new account, then sign in.
    /// A failed initial write is logged; the session still proceeds.
    pub async fn sign_up(&self, user_id: &str) {
        if let Err(e) = self.gateway.save(user_id, &Board::seed()).await {
            warn!(user_id, "failed to create the initial board: {}", e);
        }
        self.sign_in(user_id).await;
    }

    /// Back to LoggedOut with the transient default board. A save already in
    /// flight is left to finish; the next sign-in waits for it.
    pub async fn sign_out(&self) {
        let mut inner = self.inner.lock().await;
        inner.epoch += 1;
        inner.state = SessionState::LoggedOut;
        inner.suppress_next_autosave = false;
        Self::retire_autosave(&mut inner);
        let seed = Board::seed();
        self.publish(&mut inner, seed).await;
        self.emit_state(&inner);
    }

    /// Wait for the current session's pending saves to finish.
    pub async fn flush(&self) {
        let queue = self.inner.lock().await.autosave.clone();
        if let Some(queue) = queue {
            queue.wait_idle().await;
        }
    }

    pub async fn save_status(&self) -> Option<SaveStatus> {
        let queue = self.inner.lock().await.autosave.clone();
        match queue {
            Some(queue) => Some(queue.status().await),
            None => None,
        }
    }

    pub async fn move_task(&self, task_id: &str, target_column_id: &str) -> Result<Board, BoardError> {
        self.apply(|mutator, board| mutator.move_task(board, task_id, target_column_id))
            .await
    }

    /// Move to the next column in display order; a no-op in the last column.
    pub async fn move_forward(&self, task_id: &str) -> Result<Board, BoardError> {
        self.apply(|mutator, board| match board.column_of(task_id) {
            Some(current) => match board.neighbors(current).1 {
                Some(next) => mutator.move_task(board, task_id, next),
                None => Ok(board.clone()),
            },
            None => mutator.unresolved(board, missing_task(task_id)),
        })
        .await
    }

    /// Move to the previous column in display order; a no-op in the first.
    pub async fn move_backward(&self, task_id: &str) -> Result<Board, BoardError> {
        self.apply(|mutator, board| match board.column_of(task_id) {
            Some(current) => match board.neighbors(current).0 {
                Some(prev) => mutator.move_task(board, task_id, prev),
                None => Ok(board.clone()),
            },
            None => mutator.unresolved(board, missing_task(task_id)),
        })
        .await
    }

    pub async fn update_task(&self, updated: Task) -> Result<Board, BoardError> {
        self.apply(|mutator, board| mutator.update_task(board, updated))
            .await
    }

    /// Caller must have obtained explicit confirmation from the user.
    pub async fn reset_board(&self) -> Result<Board, BoardError> {
        self.apply(|mutator, _| Ok(mutator.reset_board())).await
    }

    /// Ask the generator for tasks and insert the accepted ones.
    pub async fn generate_tasks(
        &self,
        prompt: &str,
        mode: GenerationMode,
    ) -> Result<InsertOutcome, BoardError> {
        let epoch = self.current_epoch().await?;
        let proposals = self.generator.generate(prompt, mode).await;

        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            debug!(tasks = proposals.len(), "discarding generated tasks for a superseded session");
            let board = inner.board.clone();
            return Ok(self.mutator.insert_generated_tasks(&board, proposals));
        }
        let outcome = self.mutator.insert_generated_tasks(&inner.board, proposals);
        if let Some(notice) = &outcome.notice {
            broadcast_event(
                &self.events,
                SessionEvent::Notice {
                    notice: notice.clone(),
                },
            );
        }
        if !outcome.board.same_snapshot(&inner.board) {
            self.publish(&mut inner, outcome.board.clone()).await;
        }
        Ok(outcome)
    }

    /// Generate a working prompt for one task and store it on the task.
    /// Generator failures are reported as a notice and leave the board as is.
    pub async fn attach_generated_prompt(&self, task_id: &str) -> Result<Board, BoardError> {
        let (epoch, task, board) = {
            let inner = self.inner.lock().await;
            Self::check_not_loading(&inner)?;
            (inner.epoch, inner.board.task(task_id).cloned(), inner.board.clone())
        };
        let Some(task) = task else {
            return self.mutator.unresolved(&board, missing_task(task_id));
        };

        match self.generator.actionable_prompt(&task).await {
            Ok(prompt) => {
                let mut inner = self.inner.lock().await;
                if inner.epoch != epoch {
                    debug!(task_id, "discarding generated prompt for a superseded session");
                    return Ok(inner.board.clone());
                }
                self.apply_locked(&mut inner, |mutator, board| {
                    // Re-read so an edit made while generating is kept.
                    let mut current = match board.task(task_id) {
                        Some(current) => current.clone(),
                        None => task,
                    };
                    current.generated_prompt = Some(prompt);
                    mutator.update_task(board, current)
                })
                .await
            }
            Err(e) => {
                warn!(task_id, "prompt generation failed: {:#}", e);
                broadcast_event(
                    &self.events,
                    SessionEvent::Notice {
                        notice: GenerationNotice {
                            title: "Prompt generation failed".to_string(),
                            message: format!("{:#}", e),
                        },
                    },
                );
                Ok(self.board().await)
            }
        }
    }

    async fn apply<F>(&self, f: F) -> Result<Board, BoardError>
    where
        F: FnOnce(&BoardMutator, &Board) -> Result<Board, BoardError>,
    {
        let mut inner = self.inner.lock().await;
        self.apply_locked(&mut inner, f).await
    }

    async fn apply_locked<F>(&self, inner: &mut SessionInner, f: F) -> Result<Board, BoardError>
    where
        F: FnOnce(&BoardMutator, &Board) -> Result<Board, BoardError>,
    {
        Self::check_not_loading(inner)?;
        let next = f(&self.mutator, &inner.board)?;
        if next.same_snapshot(&inner.board) {
            return Ok(next);
        }
        self.publish(inner, next.clone()).await;
        Ok(next)
    }

    /// Install `board` and notify observers. In Ready this requests an
    /// autosave unless the one-shot suppression flag is armed, in which case
    /// the flag is consumed instead.
    async fn publish(&self, inner: &mut SessionInner, board: Board) {
        inner.board = board.clone();
        broadcast_event(
            &self.events,
            SessionEvent::BoardChanged {
                board: board.clone(),
            },
        );
        if !inner.state.is_ready() {
            return;
        }
        if std::mem::take(&mut inner.suppress_next_autosave) {
            debug!("autosave suppressed for freshly loaded board");
            return;
        }
        if let Some(queue) = &inner.autosave {
            queue.request(board).await;
        }
    }

    fn emit_state(&self, inner: &SessionInner) {
        broadcast_event(
            &self.events,
            SessionEvent::StateChanged {
                state: inner.state.clone(),
            },
        );
    }

    /// Epoch of the current session, refusing while a load is pending.
    async fn current_epoch(&self) -> Result<u64, BoardError> {
        let inner = self.inner.lock().await;
        Self::check_not_loading(&inner)?;
        Ok(inner.epoch)
    }

    /// Detach the live queue. An idle earlier queue is simply replaced.
    fn retire_autosave(inner: &mut SessionInner) {
        if let Some(queue) = inner.autosave.take() {
            inner.draining = Some(queue);
        }
    }

    fn check_not_loading(inner: &SessionInner) -> Result<(), BoardError> {
        match &inner.state {
            SessionState::Loading { user_id } => Err(BoardError::SessionNotReady {
                user_id: user_id.clone(),
            }),
            _ => Ok(()),
        }
    }
}

fn missing_task(task_id: &str) -> BoardError {
    BoardError::TaskNotFound {
        id: task_id.to_string(),
    }
}
