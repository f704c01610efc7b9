use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::error::{BracketError, Result};
use crate::types::{Match, MatchId, MatchPatch, Tournament, TournamentId, TournamentPatch};

// ── Store trait ────────────────────────────────────────────────────────

/// Durable storage for tournaments and matches. The engine treats this as
/// an injected dependency and never assumes anything about the backend
/// beyond the contracts documented per method.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn get_tournament(&self, id: TournamentId) -> Result<Tournament>;

    async fn list_matches(&self, tournament_id: TournamentId) -> Result<Vec<Match>>;

    async fn get_match(&self, id: MatchId) -> Result<Match>;

    /// Batch insert used only by bracket generation. Implementations must
    /// be all-or-nothing: a partially written bracket is worse than none.
    async fn insert_matches(&self, tournament_id: TournamentId, matches: Vec<Match>)
        -> Result<()>;

    async fn update_match(&self, id: MatchId, patch: MatchPatch) -> Result<Match>;

    async fn update_tournament(
        &self,
        id: TournamentId,
        patch: TournamentPatch,
    ) -> Result<Tournament>;
}

// ── In-memory implementation ───────────────────────────────────────────

#[derive(Default)]
struct StoreInner {
    tournaments: HashMap<TournamentId, Tournament>,
    matches: HashMap<MatchId, Match>,
    /// Match ids per tournament in insertion order, so listings are stable.
    tournament_matches: HashMap<TournamentId, Vec<MatchId>>,
}

/// Reference `MatchStore` backed by process memory. Suitable for tests and
/// for hosts that persist elsewhere; real deployments wrap their database
/// behind the same trait.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        MemoryMatchStore::default()
    }

    /// Seed a tournament row. Registration is owned by the surrounding
    /// application, so this lives off the trait.
    pub fn insert_tournament(&self, tournament: Tournament) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .tournament_matches
            .entry(tournament.id)
            .or_default();
        guard.tournaments.insert(tournament.id, tournament);
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn get_tournament(&self, id: TournamentId) -> Result<Tournament> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .tournaments
            .get(&id)
            .cloned()
            .ok_or_else(|| BracketError::not_found(format!("Tournament {id} not found.")))
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> Result<Vec<Match>> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !guard.tournaments.contains_key(&tournament_id) {
            return Err(BracketError::not_found(format!(
                "Tournament {tournament_id} not found."
            )));
        }
        let ids = guard
            .tournament_matches
            .get(&tournament_id)
            .cloned()
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| guard.matches.get(id).cloned())
            .collect())
    }

    async fn get_match(&self, id: MatchId) -> Result<Match> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .matches
            .get(&id)
            .cloned()
            .ok_or_else(|| BracketError::not_found(format!("Match {id} not found.")))
    }

    async fn insert_matches(
        &self,
        tournament_id: TournamentId,
        matches: Vec<Match>,
    ) -> Result<()> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !guard.tournaments.contains_key(&tournament_id) {
            return Err(BracketError::not_found(format!(
                "Tournament {tournament_id} not found."
            )));
        }
        // Validate the whole batch before touching anything; the commit
        // below must never be partial.
        for m in &matches {
            if m.tournament_id != tournament_id {
                return Err(BracketError::validation(format!(
                    "Match {} belongs to tournament {}, not {tournament_id}.",
                    m.id, m.tournament_id
                )));
            }
            if guard.matches.contains_key(&m.id) {
                return Err(BracketError::conflict(format!(
                    "Match {} already exists.",
                    m.id
                )));
            }
        }
        let new_ids: Vec<MatchId> = matches.iter().map(|m| m.id).collect();
        guard
            .tournament_matches
            .entry(tournament_id)
            .or_default()
            .extend(new_ids);
        for m in matches {
            guard.matches.insert(m.id, m);
        }
        Ok(())
    }

    async fn update_match(&self, id: MatchId, patch: MatchPatch) -> Result<Match> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let m = guard
            .matches
            .get_mut(&id)
            .ok_or_else(|| BracketError::not_found(format!("Match {id} not found.")))?;
        patch.apply(m);
        Ok(m.clone())
    }

    async fn update_tournament(
        &self,
        id: TournamentId,
        patch: TournamentPatch,
    ) -> Result<Tournament> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let t = guard
            .tournaments
            .get_mut(&id)
            .ok_or_else(|| BracketError::not_found(format!("Tournament {id} not found.")))?;
        patch.apply(t);
        Ok(t.clone())
    }
}
