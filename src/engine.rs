use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::bracket;
use crate::bracket_index::BracketIndex;
use crate::config::{append_audit_log, now_ms, EngineConfig};
use crate::correction;
use crate::error::{BracketError, Result};
use crate::notify::{Notification, NotificationKind, NotificationPort};
use crate::progression;
use crate::store::MatchStore;
use crate::types::{Match, MatchId, PlayerId, TournamentId, TournamentPatch};

/// Caller-facing bracket service. Every operation is a stateless request
/// against the injected store; the only in-process state is a lazily
/// created lock per tournament, held across each mutating operation so
/// result submission is compare-and-set and the override cascade never
/// interleaves with a concurrent submission (a plain row store provides
/// neither ordering on its own).
pub struct BracketEngine<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    config: EngineConfig,
    locks: Mutex<HashMap<TournamentId, Arc<AsyncMutex<()>>>>,
}

impl<S: MatchStore, N: NotificationPort> BracketEngine<S, N> {
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: EngineConfig) -> Self {
        BracketEngine {
            store,
            notifier,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn tournament_lock(&self, tournament_id: TournamentId) -> Arc<AsyncMutex<()>> {
        let mut guard = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        guard.entry(tournament_id).or_default().clone()
    }

    /// Builds and persists the bracket for a tournament, then flips its
    /// `started` flag. `seeded_players` come from the signup layer in
    /// seeding order. All matches land in one all-or-nothing batch; a
    /// persistence failure leaves the tournament not started.
    pub async fn start_tournament(
        &self,
        tournament_id: TournamentId,
        seeded_players: &[PlayerId],
    ) -> Result<()> {
        let lock = self.tournament_lock(tournament_id);
        let _guard = lock.lock().await;

        let tournament = self.store.get_tournament(tournament_id).await?;
        if tournament.started {
            return Err(BracketError::conflict("Tournament has already started."));
        }

        let generated =
            bracket::build_bracket(&tournament, seeded_players, &self.config, now_ms())?;
        let walkovers = generated.walkovers;
        append_audit_log(
            &self.config,
            "generate",
            &format!(
                "tournament={tournament_id} players={} matches={} walkovers={}",
                seeded_players.len(),
                generated.matches.len(),
                walkovers.len(),
            ),
        );
        self.store
            .insert_matches(tournament_id, generated.matches)
            .await?;
        self.store
            .update_tournament(tournament_id, TournamentPatch::started(true))
            .await?;

        // Walkover winners advance before the generator returns, so round
        // 2 slots are pre-filled where a bye was resolved.
        for walkover_id in walkovers {
            let walkover = self.store.get_match(walkover_id).await?;
            progression::propagate_decided(
                self.store.as_ref(),
                self.notifier.as_ref(),
                &self.config,
                tournament_id,
                &walkover,
            )
            .await?;
        }

        if self.config.notifications_enabled {
            for &player in seeded_players {
                self.notifier.notify(Notification {
                    kind: NotificationKind::TournamentStart,
                    user_id: player,
                    related_id: tournament_id,
                    message: "The tournament has started.".to_string(),
                });
            }
        }
        self.notifier.bracket_changed(tournament_id);
        info!(
            tournament = %tournament_id,
            players = seeded_players.len(),
            "tournament started"
        );
        Ok(())
    }

    /// Records a decided match and advances the winner downstream, or
    /// finishes the tournament when the final was decided. Rejects
    /// already-decided matches with a conflict, so of two racing
    /// submissions exactly one succeeds.
    pub async fn submit_match_result(
        &self,
        tournament_id: TournamentId,
        match_id: MatchId,
        winner_id: PlayerId,
    ) -> Result<()> {
        let lock = self.tournament_lock(tournament_id);
        let _guard = lock.lock().await;

        let tournament = self.store.get_tournament(tournament_id).await?;
        if !tournament.started {
            return Err(BracketError::conflict("Tournament has not started."));
        }

        progression::submit_result(
            self.store.as_ref(),
            self.notifier.as_ref(),
            &self.config,
            tournament_id,
            match_id,
            winner_id,
        )
        .await?;
        self.notifier.bracket_changed(tournament_id);
        Ok(())
    }

    /// Admin correction of a mis-recorded result: resets everything the
    /// wrong outcome poisoned, then re-propagates the corrected winner.
    /// Runs entirely under the tournament lock.
    pub async fn override_match_result(
        &self,
        tournament_id: TournamentId,
        match_id: MatchId,
        new_winner_id: PlayerId,
    ) -> Result<()> {
        let lock = self.tournament_lock(tournament_id);
        let _guard = lock.lock().await;

        let tournament = self.store.get_tournament(tournament_id).await?;
        if !tournament.started {
            return Err(BracketError::conflict("Tournament has not started."));
        }

        correction::override_result(
            self.store.as_ref(),
            self.notifier.as_ref(),
            &self.config,
            tournament_id,
            match_id,
            new_winner_id,
        )
        .await?;
        self.notifier.bracket_changed(tournament_id);
        Ok(())
    }

    /// The match with the maximum round that no other match feeds into.
    pub async fn tournament_final_match(&self, tournament_id: TournamentId) -> Result<Match> {
        let matches = self.store.list_matches(tournament_id).await?;
        Ok(BracketIndex::build(matches)?.final_match().clone())
    }

    /// The champion, once the tournament is finished. `None` while play
    /// is still in progress (or reopened by an override).
    pub async fn tournament_winner(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Option<PlayerId>> {
        let tournament = self.store.get_tournament(tournament_id).await?;
        if !tournament.finished {
            return Ok(None);
        }
        let final_match = self.tournament_final_match(tournament_id).await?;
        Ok(final_match.winner_id)
    }
}
