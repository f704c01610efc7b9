use std::collections::HashMap;

use crate::error::{BracketError, Result};
use crate::types::{Match, MatchId, PlayerId, Slot};

/// In-memory index over one tournament's matches, built once per operation
/// from a `list_matches` read. Turns the flat matchup-pointer rows into
/// constant-time parent/child lookups instead of a query per propagation
/// step.
pub struct BracketIndex {
    matches: Vec<Match>,
    by_id: HashMap<MatchId, usize>,
    /// feeder match id -> (downstream match id, slot its winner fills).
    downstream: HashMap<MatchId, (MatchId, Slot)>,
    final_id: MatchId,
}

impl BracketIndex {
    /// Builds the index and verifies the structural invariants: pointers
    /// resolve, every match feeds at most one other, and exactly one match
    /// (the one with the maximum round) is fed by nobody.
    pub fn build(matches: Vec<Match>) -> Result<BracketIndex> {
        if matches.is_empty() {
            return Err(BracketError::cascade(
                "Tournament has no matches; bracket was never generated.",
            ));
        }

        let mut by_id: HashMap<MatchId, usize> = HashMap::with_capacity(matches.len());
        for (idx, m) in matches.iter().enumerate() {
            if by_id.insert(m.id, idx).is_some() {
                return Err(BracketError::cascade(format!(
                    "Duplicate match id {} in bracket.",
                    m.id
                )));
            }
        }

        let mut downstream: HashMap<MatchId, (MatchId, Slot)> = HashMap::new();
        for m in &matches {
            for (feeder, slot) in [
                (m.home_matchup_id, Slot::Home),
                (m.away_matchup_id, Slot::Away),
            ] {
                let Some(feeder) = feeder else {
                    continue;
                };
                if !by_id.contains_key(&feeder) {
                    return Err(BracketError::cascade(format!(
                        "Match {} points at unknown matchup {feeder}.",
                        m.id
                    )));
                }
                if downstream.insert(feeder, (m.id, slot)).is_some() {
                    return Err(BracketError::cascade(format!(
                        "Matchup {feeder} feeds more than one match.",
                    )));
                }
            }
        }

        let mut final_id = None;
        for m in &matches {
            if downstream.contains_key(&m.id) {
                continue;
            }
            if final_id.is_some() {
                return Err(BracketError::cascade(
                    "More than one match has no downstream match.",
                ));
            }
            final_id = Some(m.id);
        }
        let final_id = final_id.ok_or_else(|| {
            BracketError::cascade("No final match: every match feeds another.")
        })?;

        let max_round = matches.iter().map(|m| m.round).max().unwrap_or(0);
        let final_idx = by_id[&final_id];
        if matches[final_idx].round != max_round {
            return Err(BracketError::cascade(format!(
                "Final match {} is in round {}, but the bracket reaches round {max_round}.",
                final_id, matches[final_idx].round
            )));
        }

        Ok(BracketIndex {
            matches,
            by_id,
            downstream,
            final_id,
        })
    }

    pub fn get(&self, id: MatchId) -> Option<&Match> {
        self.by_id.get(&id).map(|idx| &self.matches[*idx])
    }

    pub fn final_match(&self) -> &Match {
        // final_id always resolves; build() put it in by_id.
        &self.matches[self.by_id[&self.final_id]]
    }

    pub fn is_final(&self, id: MatchId) -> bool {
        self.final_id == id
    }

    /// The single match a decided feeder advances its winner into, plus
    /// which slot the winner lands in. `None` only for the final.
    pub fn downstream_of(&self, id: MatchId) -> Option<(MatchId, Slot)> {
        self.downstream.get(&id).copied()
    }

    /// Every match after `round` in which `player_id` occupies a slot,
    /// ascending by round. At most one per round when the one-player-per-
    /// round invariant holds.
    pub fn matches_for_player_after(&self, player_id: PlayerId, round: u32) -> Vec<&Match> {
        let mut found: Vec<&Match> = self
            .matches
            .iter()
            .filter(|m| m.round > round && m.has_player(player_id))
            .collect();
        found.sort_by_key(|m| m.round);
        found
    }

    pub fn round_count(&self) -> u32 {
        self.matches.iter().map(|m| m.round).max().unwrap_or(0)
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }
}
