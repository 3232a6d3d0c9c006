use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::BoardError;

pub const TODO_COLUMN: &str = "todo";
pub const IN_PROGRESS_COLUMN: &str = "in-progress";
pub const DONE_COLUMN: &str = "done";

const SEED_COLUMNS: [(&str, &str); 3] = [
    (TODO_COLUMN, "To Do"),
    (IN_PROGRESS_COLUMN, "In Progress"),
    (DONE_COLUMN, "Done"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    pub task_ids: Vec<String>,
}

impl Column {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            task_ids: Vec::new(),
        }
    }
}

/// A task proposal returned by a generator, before it has an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl GeneratedTask {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Full Kanban state for one session.
///
/// The task map and every column sit behind `Arc`, so cloning a board is
/// cheap and a mutation only copies what it touches (`Arc::make_mut`).
/// Existing snapshots are never modified in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub(crate) tasks: Arc<BTreeMap<String, Arc<Task>>>,
    pub(crate) columns: BTreeMap<String, Arc<Column>>,
    pub(crate) column_order: Arc<[String]>,
}

impl Default for Board {
    fn default() -> Self {
        Self::seed()
    }
}

impl Board {
    /// The static default board: three empty columns, no tasks.
    pub fn seed() -> Self {
        let columns = SEED_COLUMNS
            .iter()
            .map(|(id, title)| (id.to_string(), Arc::new(Column::new(id, title))))
            .collect();
        let column_order: Vec<String> = SEED_COLUMNS.iter().map(|(id, _)| id.to_string()).collect();
        Self {
            tasks: Arc::new(BTreeMap::new()),
            columns,
            column_order: column_order.into(),
        }
    }

    /// Build a board from explicit parts. Column order follows `columns`.
    pub fn from_parts(tasks: Vec<Task>, columns: Vec<Column>) -> Result<Self, BoardError> {
        let column_order: Vec<String> = columns.iter().map(|c| c.id.clone()).collect();
        let board = Self {
            tasks: Arc::new(
                tasks
                    .into_iter()
                    .map(|t| (t.id.clone(), Arc::new(t)))
                    .collect(),
            ),
            columns: columns
                .into_iter()
                .map(|c| (c.id.clone(), Arc::new(c)))
                .collect(),
            column_order: column_order.into(),
        };
        board.validate()?;
        Ok(board)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id).map(|t| t.as_ref())
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().map(|t| t.as_ref())
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.get(id).map(|c| c.as_ref())
    }

    /// Columns in display order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.column_order
            .iter()
            .filter_map(|id| self.columns.get(id).map(|c| c.as_ref()))
    }

    pub fn column_order(&self) -> &[String] {
        &self.column_order
    }

    /// Tasks of one column in display order. Unknown ids are skipped.
    pub fn column_tasks(&self, column_id: &str) -> Vec<&Task> {
        self.column(column_id)
            .map(|c| c.task_ids.iter().filter_map(|id| self.task(id)).collect())
            .unwrap_or_default()
    }

    /// The column currently holding `task_id`, scanning in column order.
    pub fn column_of(&self, task_id: &str) -> Option<&str> {
        self.columns()
            .find(|c| c.task_ids.iter().any(|id| id == task_id))
            .map(|c| c.id.as_str())
    }

    /// Previous and next column ids around `column_id`. These are the only
    /// move targets offered to a user; the mutator itself accepts any column.
    pub fn neighbors(&self, column_id: &str) -> (Option<&str>, Option<&str>) {
        let Some(index) = self.column_order.iter().position(|id| id == column_id) else {
            return (None, None);
        };
        let prev = index
            .checked_sub(1)
            .and_then(|i| self.column_order.get(i))
            .map(String::as_str);
        let next = self.column_order.get(index + 1).map(String::as_str);
        (prev, next)
    }

    /// True when `other` is the very same snapshot (shared storage), which is
    /// what a no-op mutation returns.
    pub fn same_snapshot(&self, other: &Board) -> bool {
        Arc::ptr_eq(&self.tasks, &other.tasks)
            && Arc::ptr_eq(&self.column_order, &other.column_order)
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|((ka, a), (kb, b))| ka == kb && Arc::ptr_eq(a, b))
    }

    /// True when the column layout matches the seed board's.
    pub fn has_seed_layout(&self) -> bool {
        self.column_order.len() == SEED_COLUMNS.len()
            && self
                .column_order
                .iter()
                .zip(SEED_COLUMNS.iter())
                .all(|(id, (seed_id, _))| id == seed_id)
    }

    /// Check the structural invariants:
    /// - `column_order` and `columns` name the same set of columns
    /// - every referenced task id exists in `tasks`
    /// - every task sits in exactly one column, exactly once
    pub fn validate(&self) -> Result<(), BoardError> {
        let ordered: HashSet<&str> = self.column_order.iter().map(String::as_str).collect();
        if ordered.len() != self.column_order.len() {
            return Err(BoardError::InvariantViolation(
                "columnOrder contains duplicates".into(),
            ));
        }
        for id in self.columns.keys() {
            if !ordered.contains(id.as_str()) {
                return Err(BoardError::InvariantViolation(format!(
                    "column {} is missing from columnOrder",
                    id
                )));
            }
        }
        for id in self.column_order.iter() {
            match self.columns.get(id) {
                Some(column) if column.id == *id => {}
                Some(column) => {
                    return Err(BoardError::InvariantViolation(format!(
                        "column keyed {} carries id {}",
                        id, column.id
                    )));
                }
                None => {
                    return Err(BoardError::InvariantViolation(format!(
                        "columnOrder names unknown column {}",
                        id
                    )));
                }
            }
        }

        let mut placed: HashSet<&str> = HashSet::new();
        for column in self.columns() {
            for task_id in &column.task_ids {
                if !self.tasks.contains_key(task_id) {
                    return Err(BoardError::InvariantViolation(format!(
                        "column {} references unknown task {}",
                        column.id, task_id
                    )));
                }
                if !placed.insert(task_id.as_str()) {
                    return Err(BoardError::InvariantViolation(format!(
                        "task {} appears more than once",
                        task_id
                    )));
                }
            }
        }
        for (id, task) in self.tasks.iter() {
            if task.id != *id {
                return Err(BoardError::InvariantViolation(format!(
                    "task keyed {} carries id {}",
                    id, task.id
                )));
            }
            if !placed.contains(id.as_str()) {
                return Err(BoardError::InvariantViolation(format!(
                    "task {} is not in any column",
                    id
                )));
            }
        }
        Ok(())
    }
}
