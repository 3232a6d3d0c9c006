use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, warn};

use super::events::{SessionEvent, broadcast_event};
use super::gateway::BoardGateway;
use super::models::Board;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// Extra attempts after the first failed write.
    pub retries: u32,
    /// Base delay; attempt `n` waits `backoff * n`.
    pub backoff: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaveStatus {
    pub saves_completed: u64,
    pub saves_failed: u64,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct Slot {
    in_flight: bool,
    pending: Option<Board>,
    status: SaveStatus,
}

struct Inner {
    user_id: String,
    gateway: Arc<dyn BoardGateway>,
    config: AutosaveConfig,
    slot: Mutex<Slot>,
    idle: watch::Sender<bool>,
    events: broadcast::Sender<SessionEvent>,
}

/// Single-slot coalescing save queue for one user session.
///
/// At most one write is in flight. Requests arriving meanwhile replace the
/// pending slot, so only the newest snapshot is written next. Writes are
/// therefore applied in request order and never overlap.
#[derive(Clone)]
pub struct AutosaveQueue {
    inner: Arc<Inner>,
}

impl AutosaveQueue {
    pub fn new(
        user_id: &str,
        gateway: Arc<dyn BoardGateway>,
        config: AutosaveConfig,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                user_id: user_id.to_string(),
                gateway,
                config,
                slot: Mutex::new(Slot::default()),
                idle,
                events,
            }),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Queue `board` for saving. Returns without waiting for the write.
    pub async fn request(&self, board: Board) {
        let mut slot = self.inner.slot.lock().await;
        if slot.in_flight {
            if slot.pending.replace(board).is_some() {
                debug!(user_id = %self.inner.user_id, "coalesced pending save");
            }
            return;
        }
        slot.in_flight = true;
        self.inner.idle.send_replace(false);
        drop(slot);

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.drain(board).await });
    }

    /// Wait until no write is in flight and nothing is pending.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.idle.subscribe();
        // The sender lives in `inner`, which we hold, so this cannot fail.
        let _ = rx.wait_for(|idle| *idle).await;
    }

    pub async fn status(&self) -> SaveStatus {
        self.inner.slot.lock().await.status.clone()
    }
}

impl Inner {
    async fn drain(&self, first: Board) {
        let mut board = first;
        loop {
            let result = self.write_with_retry(&board).await;
            let mut slot = self.slot.lock().await;
            match result {
                Ok(()) => {
                    slot.status.saves_completed += 1;
                    slot.status.last_saved_at = Some(Utc::now());
                    slot.status.last_error = None;
                }
                Err(error) => {
                    slot.status.saves_failed += 1;
                    slot.status.last_error = Some(error.clone());
                    broadcast_event(
                        &self.events,
                        SessionEvent::SaveFailed {
                            user_id: self.user_id.clone(),
                            error,
                        },
                    );
                }
            }
            match slot.pending.take() {
                Some(next) => board = next,
                None => {
                    slot.in_flight = false;
                    self.idle.send_replace(true);
                    return;
                }
            }
        }
    }

    async fn write_with_retry(&self, board: &Board) -> Result<(), String> {
        let mut attempt = 0u32;
        loop {
            match self.gateway.save(&self.user_id, board).await {
                Ok(()) => {
                    debug!(user_id = %self.user_id, attempt, "board saved");
                    return Ok(());
                }
                Err(e) if attempt < self.config.retries => {
                    attempt += 1;
                    warn!(
                        user_id = %self.user_id,
                        attempt,
                        "board save failed, retrying: {}", e
                    );
                    tokio::time::sleep(self.config.backoff * attempt).await;
                }
                Err(e) => {
                    warn!(user_id = %self.user_id, "board save failed, giving up: {}", e);
                    return Err(e.to_string());
                }
            }
        }
    }
}
