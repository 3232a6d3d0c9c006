use tokio::sync::broadcast;
use tracing::trace;

use super::generator::GenerationNotice;
use super::models::Board;
use super::session::SessionState;

/// Notifications for whatever renders the session (CLI, UI, tests).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged { state: SessionState },
    BoardChanged { board: Board },
    Notice { notice: GenerationNotice },
    SaveFailed { user_id: String, error: String },
}

/// Send an event to all subscribers. Having no subscriber is fine.
pub fn broadcast_event(tx: &broadcast::Sender<SessionEvent>, event: SessionEvent) {
    if tx.send(event).is_err() {
        trace!("no session event subscribers");
    }
}
