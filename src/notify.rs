use serde::Serialize;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::types::{PlayerId, TournamentId};

// ── Payloads ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TournamentStart,
    NewMatchup,
    RequestAccepted,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::TournamentStart => "tournament_start",
            NotificationKind::NewMatchup => "new_matchup",
            NotificationKind::RequestAccepted => "request_accepted",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub user_id: PlayerId,
    /// Tournament or match the notification is about.
    pub related_id: Uuid,
    pub message: String,
}

// ── Port ───────────────────────────────────────────────────────────────

/// Fire-and-forget signal consumed by the UI layer. Implementations must
/// not block the engine; delivery failures are theirs to log, never to
/// propagate.
pub trait NotificationPort: Send + Sync {
    fn notify(&self, notification: Notification);

    /// Cache-invalidation event: the bracket view for a tournament changed
    /// and any rendered copy of it is stale.
    fn bracket_changed(&self, tournament_id: TournamentId) {
        let _ = tournament_id;
    }
}

/// Default port: writes every signal to the log and nothing else.
#[derive(Default)]
pub struct TracingNotifier;

impl NotificationPort for TracingNotifier {
    fn notify(&self, notification: Notification) {
        info!(
            kind = notification.kind.as_str(),
            user = %notification.user_id,
            related = %notification.related_id,
            "{}",
            notification.message
        );
    }

    fn bracket_changed(&self, tournament_id: TournamentId) {
        info!(tournament = %tournament_id, "bracket view changed");
    }
}

/// Test port that records everything it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    invalidated: Mutex<Vec<TournamentId>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        RecordingNotifier::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn sent_of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.kind == kind)
            .collect()
    }

    pub fn invalidated(&self) -> Vec<TournamentId> {
        self.invalidated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl NotificationPort for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification);
    }

    fn bracket_changed(&self, tournament_id: TournamentId) {
        self.invalidated
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tournament_id);
    }
}
