use tracing::{info, warn};

use crate::bracket_index::BracketIndex;
use crate::config::{append_audit_log, now_ms, EngineConfig};
use crate::error::{BracketError, Result};
use crate::notify::NotificationPort;
use crate::progression;
use crate::store::MatchStore;
use crate::types::{MatchId, MatchPatch, PlayerId, TournamentId, TournamentPatch};

/// Corrects a mis-recorded result. Finds every later-round match the
/// wrongly advanced player reached, clears that slot and the match's
/// decision, rolls back the finished flag if the final was touched, then
/// replays the overridden match with the corrected winner so it
/// re-propagates through the cleared slots. Caller must hold the
/// tournament lock for the whole call.
pub(crate) async fn override_result<S: MatchStore + ?Sized>(
  store: &S,
  notifier: &dyn NotificationPort,
  config: &EngineConfig,
  tournament_id: TournamentId,
  match_id: MatchId,
  new_winner_id: PlayerId,
) -> Result<()> {
  // Re-read under the lock; a caller-supplied snapshot could be stale.
  let m = store.get_match(match_id).await?;
  if m.tournament_id != tournament_id {
    return Err(BracketError::not_found(format!(
      "Match {match_id} does not belong to tournament {tournament_id}.",
    )));
  }
  let old_winner = m.winner_id.ok_or_else(|| {
    BracketError::validation("Cannot override a match that has not been decided.")
  })?;
  let (Some(home), Some(away)) = (m.home_player_id, m.away_player_id) else {
    return Err(BracketError::validation(
      "Cannot override a walkover: the match has no second player.",
    ));
  };
  let overridden_player = if new_winner_id == home {
    away
  } else if new_winner_id == away {
    home
  } else {
    return Err(BracketError::validation(
      "New winner must be one of the match players.",
    ));
  };

  // Resolving the final also validates the bracket structure; abort
  // before any mutation if it cannot be resolved.
  let index = BracketIndex::build(store.list_matches(tournament_id).await?)?;
  let final_id = index.final_match().id;

  let poisoned: Vec<(MatchId, u32)> = index
    .matches_for_player_after(overridden_player, m.round)
    .iter()
    .map(|affected| (affected.id, affected.round))
    .collect();

  append_audit_log(
    config,
    "override",
    &format!(
      "tournament={tournament_id} match={match_id} round={} winner {old_winner} -> \
       {new_winner_id}; resetting {} downstream match(es): {:?}",
      m.round,
      poisoned.len(),
      poisoned.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
    ),
  );
  info!(
    tournament = %tournament_id,
    match_id = %match_id,
    old_winner = %old_winner,
    new_winner = %new_winner_id,
    affected = poisoned.len(),
    "overriding match result"
  );

  // An empty set is valid: the wrong player lost immediately and never
  // advanced anywhere.
  let now = now_ms();
  let mut cleared_final = false;
  for (affected_id, affected_round) in &poisoned {
    let affected = index.get(*affected_id).ok_or_else(|| {
      BracketError::cascade(format!("Affected match {affected_id} vanished from the index."))
    })?;
    let slot = affected.slot_of(overridden_player).ok_or_else(|| {
      BracketError::cascade(format!(
        "Player {overridden_player} missing from match {affected_id} in round {affected_round}.",
      ))
    })?;
    store
      .update_match(*affected_id, MatchPatch::clear_slot_and_winner(slot, now))
      .await?;
    if *affected_id == final_id {
      cleared_final = true;
    }
  }

  if cleared_final {
    store
      .update_tournament(tournament_id, TournamentPatch::finished(false))
      .await?;
    warn!(tournament = %tournament_id, "finished flag rolled back by override");
  }

  // Un-decide the overridden match itself, then replay it through the
  // normal submission path so the corrected winner advances.
  store
    .update_match(match_id, MatchPatch::clear_winner(now))
    .await?;
  progression::submit_result(store, notifier, config, tournament_id, match_id, new_winner_id)
    .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bracket::build_bracket;
  use crate::notify::RecordingNotifier;
  use crate::store::MemoryMatchStore;
  use crate::types::{Match, MatchState, Tournament};
  use uuid::Uuid;

  struct Fixture {
    store: MemoryMatchStore,
    notifier: RecordingNotifier,
    config: EngineConfig,
    tournament_id: TournamentId,
    players: Vec<PlayerId>,
  }

  impl Fixture {
    async fn matches(&self) -> Vec<Match> {
      self.store.list_matches(self.tournament_id).await.unwrap()
    }

    async fn round_one_match_of(&self, player: PlayerId) -> Match {
      self
        .matches()
        .await
        .into_iter()
        .find(|m| m.round == 1 && m.has_player(player))
        .unwrap()
    }

    async fn final_match(&self) -> Match {
      BracketIndex::build(self.matches().await)
        .unwrap()
        .final_match()
        .clone()
    }

    async fn submit(&self, match_id: MatchId, winner: PlayerId) {
      progression::submit_result(
        &self.store,
        &self.notifier,
        &self.config,
        self.tournament_id,
        match_id,
        winner,
      )
      .await
      .unwrap();
    }

    async fn override_result(
      &self,
      match_id: MatchId,
      new_winner: PlayerId,
    ) -> Result<()> {
      override_result(
        &self.store,
        &self.notifier,
        &self.config,
        self.tournament_id,
        match_id,
        new_winner,
      )
      .await
    }

    async fn tournament(&self) -> Tournament {
      self.store.get_tournament(self.tournament_id).await.unwrap()
    }
  }

  async fn make_fixture(count: usize) -> Fixture {
    let store = MemoryMatchStore::new();
    let players: Vec<PlayerId> = (0..count).map(|_| Uuid::new_v4()).collect();
    let tournament = Tournament {
      id: Uuid::new_v4(),
      creator: players[0],
      max_player_count: 128,
      player_count: count as u32,
      started: true,
      finished: false,
      private: false,
    };
    let tournament_id = tournament.id;
    store.insert_tournament(tournament.clone());
    let config = EngineConfig {
      audit_log_dir: std::env::temp_dir()
        .join("bracket-engine-tests")
        .to_string_lossy()
        .to_string(),
      ..EngineConfig::default()
    };
    let generated = build_bracket(&tournament, &players, &config, 0).unwrap();
    store
      .insert_matches(tournament_id, generated.matches)
      .await
      .unwrap();
    Fixture {
      store,
      notifier: RecordingNotifier::new(),
      config,
      tournament_id,
      players,
    }
  }

  /// Plays a 4-player bracket to completion: seeds 1 and 2 win round 1,
  /// then seed 1 wins the final.
  async fn play_four_to_finish(fixture: &Fixture) -> (Match, Match, Match) {
    let (a, c) = (fixture.players[0], fixture.players[1]);
    let m1 = fixture.round_one_match_of(a).await;
    fixture.submit(m1.id, a).await;
    let m2 = fixture.round_one_match_of(c).await;
    fixture.submit(m2.id, c).await;
    let f = fixture.final_match().await;
    fixture.submit(f.id, a).await;
    (m1, m2, f)
  }

  #[tokio::test]
  async fn test_override_cascades_through_final() {
    let fixture = make_fixture(4).await;
    let (m1, _, _) = play_four_to_finish(&fixture).await;
    let a = fixture.players[0];
    let b = m1.opponent_of(a).unwrap();

    fixture.override_result(m1.id, b).await.unwrap();

    // The final lost the wrongly advanced player and its decision, the
    // corrected winner took the freed slot, and the tournament reopened.
    let f = fixture.final_match().await;
    assert!(!f.has_player(a));
    assert!(f.has_player(b));
    assert_eq!(f.winner_id, None);
    assert_eq!(f.state(), MatchState::Ready);
    assert!(!fixture.tournament().await.finished);

    let corrected = fixture.round_one_match_of(b).await;
    assert_eq!(corrected.winner_id, Some(b));
  }

  #[tokio::test]
  async fn test_replay_after_override_finishes_again() {
    let fixture = make_fixture(4).await;
    let (m1, _, f) = play_four_to_finish(&fixture).await;
    let a = fixture.players[0];
    let b = m1.opponent_of(a).unwrap();
    let c = fixture.players[1];

    fixture.override_result(m1.id, b).await.unwrap();
    fixture.submit(f.id, c).await;

    let tournament = fixture.tournament().await;
    assert!(tournament.finished);
    assert_eq!(fixture.final_match().await.winner_id, Some(c));
  }

  #[tokio::test]
  async fn test_override_with_empty_cascade() {
    let fixture = make_fixture(4).await;
    let a = fixture.players[0];
    let m1 = fixture.round_one_match_of(a).await;
    let b = m1.opponent_of(a).unwrap();
    fixture.submit(m1.id, a).await;

    // B never advanced, so only the overridden match itself changes.
    fixture.override_result(m1.id, b).await.unwrap();

    let corrected = fixture.round_one_match_of(b).await;
    assert_eq!(corrected.winner_id, Some(b));
    let f = fixture.final_match().await;
    assert!(f.has_player(b));
    assert!(!f.has_player(a));
  }

  #[tokio::test]
  async fn test_override_of_the_final_itself() {
    let fixture = make_fixture(4).await;
    let (_, _, f) = play_four_to_finish(&fixture).await;
    let a = fixture.players[0];
    let c = fixture.players[1];

    fixture.override_result(f.id, c).await.unwrap();

    let tournament = fixture.tournament().await;
    assert!(tournament.finished);
    let f = fixture.final_match().await;
    assert_eq!(f.winner_id, Some(c));
    assert!(f.has_player(a));
  }

  #[tokio::test]
  async fn test_walkover_override_is_rejected() {
    let fixture = make_fixture(3).await;
    let walkover = fixture
      .matches()
      .await
      .into_iter()
      .find(|m| m.round == 1 && m.state() == MatchState::Decided)
      .unwrap();
    let present = walkover.winner_id.unwrap();
    let before = fixture.matches().await;

    let result = fixture.override_result(walkover.id, present).await;
    assert!(matches!(result, Err(BracketError::Validation(_))));

    // Nothing mutated.
    let after = fixture.matches().await;
    for (b, a) in before.iter().zip(after.iter()) {
      assert_eq!(b.winner_id, a.winner_id);
      assert_eq!(b.home_player_id, a.home_player_id);
      assert_eq!(b.away_player_id, a.away_player_id);
    }
  }

  #[tokio::test]
  async fn test_undecided_override_is_rejected() {
    let fixture = make_fixture(4).await;
    let m1 = fixture.round_one_match_of(fixture.players[0]).await;
    let result = fixture
      .override_result(m1.id, fixture.players[0])
      .await;
    assert!(matches!(result, Err(BracketError::Validation(_))));
  }

  #[tokio::test]
  async fn test_outsider_new_winner_is_rejected() {
    let fixture = make_fixture(4).await;
    let a = fixture.players[0];
    let m1 = fixture.round_one_match_of(a).await;
    fixture.submit(m1.id, a).await;

    let result = fixture.override_result(m1.id, Uuid::new_v4()).await;
    assert!(matches!(result, Err(BracketError::Validation(_))));
    assert_eq!(
      fixture.round_one_match_of(a).await.winner_id,
      Some(a)
    );
  }

  #[tokio::test]
  async fn test_deep_cascade_clears_every_round() {
    // 8 players, seed 1 storms to the title, then the round-1 result is
    // overturned: every later round must drop them.
    let fixture = make_fixture(8).await;
    let a = fixture.players[0];

    // Decide all of round 1 (top seed by seed order wins each match).
    for m in fixture.matches().await.iter().filter(|m| m.round == 1) {
      let winner = fixture
        .players
        .iter()
        .copied()
        .find(|p| m.has_player(*p))
        .unwrap();
      fixture.submit(m.id, winner).await;
    }
    // Decide rounds 2 and 3 the same way.
    for round in [2u32, 3] {
      for m in fixture
        .matches()
        .await
        .iter()
        .filter(|m| m.round == round)
      {
        let winner = fixture
          .players
          .iter()
          .copied()
          .find(|p| m.has_player(*p))
          .unwrap();
        fixture.submit(m.id, winner).await;
      }
    }
    assert!(fixture.tournament().await.finished);

    let m1 = fixture.round_one_match_of(a).await;
    let b = m1.opponent_of(a).unwrap();
    fixture.override_result(m1.id, b).await.unwrap();

    for m in fixture.matches().await {
      if m.round > 1 {
        assert!(!m.has_player(a), "round {} still holds the loser", m.round);
      }
    }
    assert!(!fixture.tournament().await.finished);
    // The corrected winner is waiting in round 2.
    let index = BracketIndex::build(fixture.matches().await).unwrap();
    let later = index.matches_for_player_after(b, 1);
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].round, 2);
  }
}
