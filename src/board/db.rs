use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::warn;

use super::gateway::{BoardGateway, LoadOutcome, decode_board};
use super::models::Board;
use crate::errors::BoardError;

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub task_count: usize,
    pub updated_at: String,
}

/// SQLite document store: one row per user, the board as a JSON document.
pub struct BoardDb {
    conn: Connection,
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.run_migrations().context("Failed to run migrations")?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.run_migrations().context("Failed to run migrations")?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    board TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );
                ",
            )
            .context("Failed to create users table")?;
        Ok(())
    }

    pub fn load_board_document(&self, user_id: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT board FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query board document")
    }

    /// Insert or replace the user's board document in a single statement.
    pub fn upsert_board_document(&self, user_id: &str, document: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO users (id, board) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET board = excluded.board, updated_at = datetime('now')",
                params![user_id, document],
            )
            .context("Failed to upsert board document")?;
        Ok(())
    }

    pub fn delete_user(&self, user_id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![user_id])
            .context("Failed to delete user")?;
        Ok(count > 0)
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, board, updated_at FROM users ORDER BY id")
            .context("Failed to prepare list_users")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("Failed to query users")?;
        let mut users = Vec::new();
        for row in rows {
            let (id, document, updated_at) = row.context("Failed to read user row")?;
            let task_count = serde_json::from_str::<Board>(&document)
                .map(|b| b.task_count())
                .unwrap_or(0);
            users.push(UserRecord {
                id,
                task_count,
                updated_at,
            });
        }
        Ok(users)
    }
}

/// `BoardGateway` backed by `BoardDb`.
#[derive(Clone)]
pub struct SqliteGateway {
    db: DbHandle,
}

impl SqliteGateway {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        Ok(Self::new(DbHandle::new(BoardDb::new(path)?)))
    }

    pub fn db(&self) -> &DbHandle {
        &self.db
    }
}

#[async_trait]
impl BoardGateway for SqliteGateway {
    async fn load(&self, user_id: &str) -> LoadOutcome {
        if user_id.is_empty() {
            return LoadOutcome::Absent;
        }
        let owned = user_id.to_string();
        match self.db.call(move |db| db.load_board_document(&owned)).await {
            Ok(Some(document)) => decode_board(user_id, &document),
            Ok(None) => LoadOutcome::Absent,
            Err(e) => {
                warn!(user_id, "failed to load board: {:#}", e);
                LoadOutcome::Failed(format!("{:#}", e))
            }
        }
    }

    async fn save(&self, user_id: &str, board: &Board) -> Result<(), BoardError> {
        if user_id.is_empty() {
            return Ok(());
        }
        let document = serde_json::to_string(board)
            .context("Failed to serialize board")
            .map_err(BoardError::Persistence)?;
        let owned = user_id.to_string();
        self.db
            .call(move |db| db.upsert_board_document(&owned, &document))
            .await
            .map_err(BoardError::Persistence)
    }
}
