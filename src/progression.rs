use tracing::info;

use crate::bracket_index::BracketIndex;
use crate::config::{now_ms, EngineConfig};
use crate::error::{BracketError, Result};
use crate::notify::{Notification, NotificationKind, NotificationPort};
use crate::store::MatchStore;
use crate::types::{Match, MatchId, MatchPatch, PlayerId, TournamentId, TournamentPatch};

/// Records a decided match and advances the winner. Compare-and-set: a
/// match that already has a winner is rejected, so of two racing
/// submissions exactly one lands. Caller must hold the tournament lock.
pub(crate) async fn submit_result<S: MatchStore + ?Sized>(
  store: &S,
  notifier: &dyn NotificationPort,
  config: &EngineConfig,
  tournament_id: TournamentId,
  match_id: MatchId,
  winner_id: PlayerId,
) -> Result<()> {
  let m = store.get_match(match_id).await?;
  if m.tournament_id != tournament_id {
    return Err(BracketError::not_found(format!(
      "Match {match_id} does not belong to tournament {tournament_id}.",
    )));
  }
  if m.winner_id.is_some() {
    return Err(BracketError::conflict("Match is already decided."));
  }
  if m.slot_of(winner_id).is_none() {
    return Err(BracketError::validation(
      "Winner must be one of the match players.",
    ));
  }

  let updated = store
    .update_match(match_id, MatchPatch::set_winner(winner_id, now_ms()))
    .await?;
  propagate_decided(store, notifier, config, tournament_id, &updated).await
}

/// Pushes a decided match's winner into the downstream slot, or marks the
/// tournament finished when the decided match is the final. Also used for
/// generation-time walkovers, whose winners are set before insert.
pub(crate) async fn propagate_decided<S: MatchStore + ?Sized>(
  store: &S,
  notifier: &dyn NotificationPort,
  config: &EngineConfig,
  tournament_id: TournamentId,
  m: &Match,
) -> Result<()> {
  let winner_id = m
    .winner_id
    .ok_or_else(|| BracketError::cascade("Cannot propagate an undecided match."))?;

  let index = BracketIndex::build(store.list_matches(tournament_id).await?)?;

  if index.is_final(m.id) {
    store
      .update_tournament(tournament_id, TournamentPatch::finished(true))
      .await?;
    info!(tournament = %tournament_id, winner = %winner_id, "tournament finished");
    return Ok(());
  }

  let (downstream_id, slot) = index.downstream_of(m.id).ok_or_else(|| {
    BracketError::cascade(format!(
      "No downstream match found for match {} in round {}.",
      m.id, m.round
    ))
  })?;

  let downstream = store
    .update_match(downstream_id, MatchPatch::fill_slot(slot, winner_id, now_ms()))
    .await?;
  info!(
    tournament = %tournament_id,
    from = %m.id,
    to = %downstream_id,
    winner = %winner_id,
    "winner advanced"
  );

  // The player already waiting in the other slot learns who they face.
  // An empty other slot means the next player has not arrived yet.
  if config.notifications_enabled {
    if let Some(opponent) = downstream.player_in(slot.other()) {
      notifier.notify(Notification {
        kind: NotificationKind::NewMatchup,
        user_id: opponent,
        related_id: downstream_id,
        message: format!("Your round {} opponent is set.", downstream.round),
      });
    }
  }

  Ok(())
}
