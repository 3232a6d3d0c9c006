use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::generator::{is_sentinel, GenerationNotice};
use super::models::{Board, GeneratedTask, Task, TODO_COLUMN};
use crate::errors::BoardError;

/// What a mutation does when a task or column id does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownIdPolicy {
    /// Return the board unchanged and log a warning (double-submit races).
    #[default]
    Tolerate,
    /// Fail with `TaskNotFound` / `ColumnNotFound`.
    Reject,
}

impl std::fmt::Display for UnknownIdPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnknownIdPolicy::Tolerate => write!(f, "tolerate"),
            UnknownIdPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for UnknownIdPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tolerate" => Ok(UnknownIdPolicy::Tolerate),
            "reject" => Ok(UnknownIdPolicy::Reject),
            _ => anyhow::bail!(
                "Invalid unknown-id policy '{}'. Valid values: tolerate, reject",
                s
            ),
        }
    }
}

/// Result of inserting a generated batch.
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    pub board: Board,
    /// Ids of the inserted tasks, in the order they now appear.
    pub added: Vec<String>,
    /// Set when sentinel entries were filtered or nothing was added.
    pub notice: Option<GenerationNotice>,
}

/// Board mutation operations. Each returns a new `Board`; the input is
/// never modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardMutator {
    policy: UnknownIdPolicy,
}

impl BoardMutator {
    pub fn new(policy: UnknownIdPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnknownIdPolicy {
        self.policy
    }

    /// Apply the unknown-id policy to an unresolved identifier.
    pub(crate) fn unresolved(&self, board: &Board, err: BoardError) -> Result<Board, BoardError> {
        match self.policy {
            UnknownIdPolicy::Tolerate => {
                warn!("ignoring mutation: {}", err);
                Ok(board.clone())
            }
            UnknownIdPolicy::Reject => Err(err),
        }
    }

    /// Move `task_id` to the end of `target_column_id`.
    ///
    /// Moving a task into the column it already occupies keeps its
    /// position. Adjacency is not enforced here.
    pub fn move_task(
        &self,
        board: &Board,
        task_id: &str,
        target_column_id: &str,
    ) -> Result<Board, BoardError> {
        let Some(source) = board.column_of(task_id).map(str::to_owned) else {
            return self.unresolved(
                board,
                BoardError::TaskNotFound {
                    id: task_id.to_string(),
                },
            );
        };
        if !board.columns.contains_key(target_column_id) {
            return self.unresolved(
                board,
                BoardError::ColumnNotFound {
                    id: target_column_id.to_string(),
                },
            );
        }
        if source == target_column_id {
            debug!(task_id, column = target_column_id, "task already in target column");
            return Ok(board.clone());
        }

        let mut next = board.clone();
        if let Some(column) = next.columns.get_mut(&source) {
            Arc::make_mut(column).task_ids.retain(|id| id != task_id);
        }
        if let Some(column) = next.columns.get_mut(target_column_id) {
            Arc::make_mut(column).task_ids.push(task_id.to_string());
        }
        debug!(task_id, from = %source, to = target_column_id, "moved task");
        Ok(next)
    }

    /// Replace the stored task with `updated`. Column membership is untouched.
    pub fn update_task(&self, board: &Board, updated: Task) -> Result<Board, BoardError> {
        if !board.tasks.contains_key(&updated.id) {
            return self.unresolved(board, BoardError::TaskNotFound { id: updated.id });
        }
        let mut next = board.clone();
        Arc::make_mut(&mut next.tasks).insert(updated.id.clone(), Arc::new(updated));
        Ok(next)
    }

    /// Insert a generated batch at the top of the "To Do" column.
    ///
    /// Each accepted entry gets a fresh id. The batch keeps its own order and
    /// lands ahead of everything already in the column. Sentinel entries and
    /// entries with a blank title are dropped; a sentinel is reported back as
    /// the outcome's notice.
    pub fn insert_generated_tasks(&self, board: &Board, new_tasks: Vec<GeneratedTask>) -> InsertOutcome {
        let mut notice = None;
        let mut accepted = Vec::new();
        for generated in new_tasks {
            if is_sentinel(&generated.title) {
                warn!(title = %generated.title, "generator returned an error sentinel");
                if notice.is_none() {
                    notice = Some(GenerationNotice::from_sentinel(&generated));
                }
                continue;
            }
            if generated.title.trim().is_empty() {
                debug!("dropping generated task with blank title");
                continue;
            }
            accepted.push(generated);
        }

        let Some(target) = board
            .columns
            .contains_key(TODO_COLUMN)
            .then(|| TODO_COLUMN.to_string())
            .or_else(|| board.column_order.first().cloned())
        else {
            warn!("board has no columns; generated tasks discarded");
            return InsertOutcome {
                board: board.clone(),
                added: Vec::new(),
                notice: notice.or_else(|| Some(GenerationNotice::nothing_added())),
            };
        };

        if accepted.is_empty() {
            return InsertOutcome {
                board: board.clone(),
                added: Vec::new(),
                notice: notice.or_else(|| Some(GenerationNotice::nothing_added())),
            };
        }

        let mut next = board.clone();
        let mut added = Vec::with_capacity(accepted.len());
        {
            let tasks = Arc::make_mut(&mut next.tasks);
            for generated in accepted {
                let id = new_task_id();
                tasks.insert(
                    id.clone(),
                    Arc::new(Task {
                        id: id.clone(),
                        title: generated.title,
                        description: generated.description,
                        generated_prompt: None,
                    }),
                );
                added.push(id);
            }
        }
        if let Some(column) = next.columns.get_mut(&target) {
            let column = Arc::make_mut(column);
            let mut task_ids = added.clone();
            task_ids.append(&mut column.task_ids);
            column.task_ids = task_ids;
        }
        debug!(count = added.len(), column = %target, "inserted generated tasks");

        InsertOutcome {
            board: next,
            added,
            notice,
        }
    }

    /// The seed board. Callers gate this behind an explicit confirmation.
    pub fn reset_board(&self) -> Board {
        Board::seed()
    }
}

fn new_task_id() -> String {
    format!("task-{}", uuid::Uuid::new_v4())
}
