use std::collections::HashSet;

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{BracketError, Result};
use crate::types::{Match, MatchId, PlayerId, Tournament};

/// Output of bracket construction. `walkovers` lists the round-1 matches
/// that were auto-decided at generation time and still need their winners
/// propagated into round 2 after the batch is persisted.
pub struct GeneratedBracket {
  pub matches: Vec<Match>,
  pub walkovers: Vec<MatchId>,
}

/// Builds the complete match tree for `seeded_players` (seeding order =
/// list order). Pure construction; persistence and walkover propagation
/// happen in the engine.
pub fn build_bracket(
  tournament: &Tournament,
  seeded_players: &[PlayerId],
  config: &EngineConfig,
  now_ms: u64,
) -> Result<GeneratedBracket> {
  let count = seeded_players.len();
  if count < 2 {
    return Err(BracketError::validation(
      "A bracket needs at least two players.",
    ));
  }
  if count as u32 > config.max_entrants {
    return Err(BracketError::validation(format!(
      "Bracket size {count} exceeds the configured limit of {}.",
      config.max_entrants
    )));
  }
  if tournament.max_player_count > 0 && count as u32 > tournament.max_player_count {
    return Err(BracketError::validation(format!(
      "Bracket size {count} exceeds the tournament cap of {}.",
      tournament.max_player_count
    )));
  }
  if tournament.player_count > 0 && count as u32 != tournament.player_count {
    return Err(BracketError::validation(format!(
      "Got {count} seeded players but the tournament registered {}.",
      tournament.player_count
    )));
  }
  let mut seen = HashSet::new();
  for player in seeded_players {
    if !seen.insert(*player) {
      return Err(BracketError::validation(format!(
        "Player {player} appears more than once in the seeding list.",
      )));
    }
  }

  let slots = next_power_of_two(count);
  let positions = seed_positions(slots as u32);
  let round_count = slots.trailing_zeros();

  let mut matches = Vec::with_capacity(slots - 1);
  let mut walkovers = Vec::new();

  // Round 1: pair adjacent bracket positions. Seeds beyond `count` are
  // byes; a one-sided pairing is decided here as a walkover.
  let mut prev_round_ids = Vec::with_capacity(slots / 2);
  for i in 0..(slots / 2) {
    let home = player_for_seed(seeded_players, positions[i * 2]);
    let away = player_for_seed(seeded_players, positions[i * 2 + 1]);
    let winner_id = match (home, away) {
      (Some(player), None) | (None, Some(player)) => Some(player),
      _ => None,
    };
    let m = Match {
      id: Uuid::new_v4(),
      tournament_id: tournament.id,
      round: 1,
      home_matchup_id: None,
      away_matchup_id: None,
      home_player_id: home,
      away_player_id: away,
      winner_id,
      updated_at_ms: now_ms,
    };
    if winner_id.is_some() {
      walkovers.push(m.id);
    }
    prev_round_ids.push(m.id);
    matches.push(m);
  }

  // Rounds 2..: structural shells fed by the previous round's pairs.
  for round in 2..=round_count {
    let mut round_ids = Vec::with_capacity(prev_round_ids.len() / 2);
    for i in 0..(prev_round_ids.len() / 2) {
      let m = Match {
        id: Uuid::new_v4(),
        tournament_id: tournament.id,
        round,
        home_matchup_id: Some(prev_round_ids[i * 2]),
        away_matchup_id: Some(prev_round_ids[i * 2 + 1]),
        home_player_id: None,
        away_player_id: None,
        winner_id: None,
        updated_at_ms: now_ms,
      };
      round_ids.push(m.id);
      matches.push(m);
    }
    prev_round_ids = round_ids;
  }

  Ok(GeneratedBracket { matches, walkovers })
}

fn player_for_seed(seeded_players: &[PlayerId], seed: u32) -> Option<PlayerId> {
  seeded_players.get(seed as usize - 1).copied()
}

/// Standard bracket seeding: 1 stays on top, 2 anchors the opposite half,
/// and each doubling mirrors the seeds so the top seeds cannot collide
/// before the late rounds. Adjacent output pairs sum to `size + 1`.
pub fn seed_positions(size: u32) -> Vec<u32> {
  let mut seeds = vec![1u32];
  while seeds.len() < size as usize {
    let n = seeds.len() as u32;
    let mut next = Vec::with_capacity(seeds.len() * 2);
    for seed in seeds.iter().copied() {
      next.push(seed);
      next.push((n * 2 + 1).saturating_sub(seed));
    }
    seeds = next;
  }
  seeds
}

pub fn next_power_of_two(n: usize) -> usize {
  let value = n.max(1);
  if value.is_power_of_two() {
    return value;
  }
  value.next_power_of_two()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bracket_index::BracketIndex;
  use crate::types::MatchState;

  fn make_tournament(player_count: u32) -> Tournament {
    Tournament {
      id: Uuid::new_v4(),
      creator: Uuid::new_v4(),
      max_player_count: 128,
      player_count,
      started: false,
      finished: false,
      private: false,
    }
  }

  fn make_players(count: usize) -> Vec<PlayerId> {
    (0..count).map(|_| Uuid::new_v4()).collect()
  }

  fn build(count: usize) -> GeneratedBracket {
    let tournament = make_tournament(count as u32);
    let players = make_players(count);
    build_bracket(&tournament, &players, &EngineConfig::default(), 0).unwrap()
  }

  #[test]
  fn test_seed_positions_spread() {
    assert_eq!(seed_positions(4), vec![1, 4, 2, 3]);
    assert_eq!(seed_positions(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
  }

  #[test]
  fn test_round_count_and_single_final() {
    for count in [2usize, 3, 4, 5, 6, 8, 13] {
      let generated = build(count);
      let slots = next_power_of_two(count);
      let expected_rounds = slots.trailing_zeros();
      assert_eq!(generated.matches.len(), slots - 1, "count {count}");

      let index = BracketIndex::build(generated.matches).unwrap();
      assert_eq!(index.round_count(), expected_rounds, "count {count}");
      assert!(index.final_match().home_matchup_id.is_some() || expected_rounds == 1);
    }
  }

  #[test]
  fn test_walkovers_decided_at_generation() {
    for count in [3usize, 5, 6, 13] {
      let generated = build(count);
      let slots = next_power_of_two(count);
      assert_eq!(generated.walkovers.len(), slots - count, "count {count}");

      for m in generated
        .matches
        .iter()
        .filter(|m| generated.walkovers.contains(&m.id))
      {
        assert_eq!(m.round, 1);
        assert_eq!(m.state(), MatchState::Decided);
        let present = m.home_player_id.or(m.away_player_id).unwrap();
        assert_eq!(m.winner_id, Some(present));
        assert!(m.home_player_id.is_none() || m.away_player_id.is_none());
      }
    }
  }

  #[test]
  fn test_power_of_two_has_no_walkovers() {
    for count in [2usize, 4, 8] {
      let generated = build(count);
      assert!(generated.walkovers.is_empty(), "count {count}");
      for m in generated.matches.iter().filter(|m| m.round == 1) {
        assert_eq!(m.state(), MatchState::Ready);
      }
    }
  }

  #[test]
  fn test_top_seeds_on_opposite_sides() {
    let tournament = make_tournament(4);
    let players = make_players(4);
    let generated =
      build_bracket(&tournament, &players, &EngineConfig::default(), 0).unwrap();

    let round_one: Vec<&Match> = generated.matches.iter().filter(|m| m.round == 1).collect();
    assert_eq!(round_one.len(), 2);
    // Seeds 1 and 2 must not meet in round 1.
    let first = round_one
      .iter()
      .find(|m| m.has_player(players[0]))
      .unwrap();
    assert!(!first.has_player(players[1]));
    assert!(first.has_player(players[3]));
  }

  #[test]
  fn test_rejects_undersized_field() {
    let tournament = make_tournament(1);
    let players = make_players(1);
    let result = build_bracket(&tournament, &players, &EngineConfig::default(), 0);
    assert!(matches!(result, Err(BracketError::Validation(_))));
  }

  #[test]
  fn test_rejects_duplicate_player() {
    let tournament = make_tournament(4);
    let mut players = make_players(4);
    players[3] = players[0];
    let result = build_bracket(&tournament, &players, &EngineConfig::default(), 0);
    assert!(matches!(result, Err(BracketError::Validation(_))));
  }

  #[test]
  fn test_rejects_field_over_config_limit() {
    let tournament = make_tournament(8);
    let players = make_players(8);
    let config = EngineConfig {
      max_entrants: 4,
      ..EngineConfig::default()
    };
    let result = build_bracket(&tournament, &players, &config, 0);
    assert!(matches!(result, Err(BracketError::Validation(_))));
  }

  #[test]
  fn test_rejects_player_count_mismatch() {
    let tournament = make_tournament(6);
    let players = make_players(4);
    let result = build_bracket(&tournament, &players, &EngineConfig::default(), 0);
    assert!(matches!(result, Err(BracketError::Validation(_))));
  }
}
