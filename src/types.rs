use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Id aliases ─────────────────────────────────────────────────────────

pub type TournamentId = Uuid;
pub type MatchId = Uuid;
pub type PlayerId = Uuid;

// ── Tournament ─────────────────────────────────────────────────────────

/// Tournament record. Created by the signup layer; the engine only flips
/// `started` and `finished`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: TournamentId,
    pub creator: PlayerId,
    pub max_player_count: u32,
    pub player_count: u32,
    pub started: bool,
    pub finished: bool,
    pub private: bool,
}

// ── Match ──────────────────────────────────────────────────────────────

/// One node of the bracket tree. Structural fields (`round`,
/// `home_matchup_id`, `away_matchup_id`) never change after generation;
/// only the player slots, `winner_id` and `updated_at_ms` mutate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    /// 1 = earliest round; the final has the maximum round.
    pub round: u32,
    pub home_matchup_id: Option<MatchId>,
    pub away_matchup_id: Option<MatchId>,
    pub home_player_id: Option<PlayerId>,
    pub away_player_id: Option<PlayerId>,
    pub winner_id: Option<PlayerId>,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slot {
    Home,
    Away,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::Home => Slot::Away,
            Slot::Away => Slot::Home,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Unscheduled,
    AwaitingOpponent,
    Ready,
    Decided,
}

impl Match {
    pub fn player_in(&self, slot: Slot) -> Option<PlayerId> {
        match slot {
            Slot::Home => self.home_player_id,
            Slot::Away => self.away_player_id,
        }
    }

    /// Which slot a player occupies, if any.
    pub fn slot_of(&self, player_id: PlayerId) -> Option<Slot> {
        if self.home_player_id == Some(player_id) {
            Some(Slot::Home)
        } else if self.away_player_id == Some(player_id) {
            Some(Slot::Away)
        } else {
            None
        }
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.slot_of(player_id).is_some()
    }

    pub fn opponent_of(&self, player_id: PlayerId) -> Option<PlayerId> {
        self.slot_of(player_id)
            .and_then(|slot| self.player_in(slot.other()))
    }

    pub fn state(&self) -> MatchState {
        if self.winner_id.is_some() {
            MatchState::Decided
        } else if self.home_player_id.is_some() && self.away_player_id.is_some() {
            MatchState::Ready
        } else if self.home_player_id.is_some() || self.away_player_id.is_some() {
            MatchState::AwaitingOpponent
        } else {
            MatchState::Unscheduled
        }
    }
}

// ── Partial updates ────────────────────────────────────────────────────

/// Partial update for a match row. Outer `Some` means "write this field";
/// the inner value is what gets written, so `Some(None)` clears a slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchPatch {
    pub home_player_id: Option<Option<PlayerId>>,
    pub away_player_id: Option<Option<PlayerId>>,
    pub winner_id: Option<Option<PlayerId>>,
    pub updated_at_ms: Option<u64>,
}

impl MatchPatch {
    pub fn fill_slot(slot: Slot, player_id: PlayerId, now_ms: u64) -> MatchPatch {
        let mut patch = MatchPatch {
            updated_at_ms: Some(now_ms),
            ..MatchPatch::default()
        };
        match slot {
            Slot::Home => patch.home_player_id = Some(Some(player_id)),
            Slot::Away => patch.away_player_id = Some(Some(player_id)),
        }
        patch
    }

    /// Reset used by the override cascade: empty the slot the wrongly
    /// advanced player held and un-decide the match.
    pub fn clear_slot_and_winner(slot: Slot, now_ms: u64) -> MatchPatch {
        let mut patch = MatchPatch {
            winner_id: Some(None),
            updated_at_ms: Some(now_ms),
            ..MatchPatch::default()
        };
        match slot {
            Slot::Home => patch.home_player_id = Some(None),
            Slot::Away => patch.away_player_id = Some(None),
        }
        patch
    }

    pub fn set_winner(player_id: PlayerId, now_ms: u64) -> MatchPatch {
        MatchPatch {
            winner_id: Some(Some(player_id)),
            updated_at_ms: Some(now_ms),
            ..MatchPatch::default()
        }
    }

    pub fn clear_winner(now_ms: u64) -> MatchPatch {
        MatchPatch {
            winner_id: Some(None),
            updated_at_ms: Some(now_ms),
            ..MatchPatch::default()
        }
    }

    pub fn apply(&self, m: &mut Match) {
        if let Some(value) = self.home_player_id {
            m.home_player_id = value;
        }
        if let Some(value) = self.away_player_id {
            m.away_player_id = value;
        }
        if let Some(value) = self.winner_id {
            m.winner_id = value;
        }
        if let Some(value) = self.updated_at_ms {
            m.updated_at_ms = value;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TournamentPatch {
    pub started: Option<bool>,
    pub finished: Option<bool>,
}

impl TournamentPatch {
    pub fn started(value: bool) -> TournamentPatch {
        TournamentPatch {
            started: Some(value),
            ..TournamentPatch::default()
        }
    }

    pub fn finished(value: bool) -> TournamentPatch {
        TournamentPatch {
            finished: Some(value),
            ..TournamentPatch::default()
        }
    }

    pub fn apply(&self, t: &mut Tournament) {
        if let Some(value) = self.started {
            t.started = value;
        }
        if let Some(value) = self.finished {
            t.finished = value;
        }
    }
}
