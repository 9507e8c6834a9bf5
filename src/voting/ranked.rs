use crate::error::ResultsError;
use crate::models::BallotChoice;
use crate::voting::simple::wrong_shape;
use crate::voting::{Outcome, RankedBallot, RoundCount, RunoffRound, Tally, WeightedBallot};
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};

/// First preferences become the reported counts; the full rankings are kept
/// on the tally for the runoff.
pub fn count_ballots(ballots: &[WeightedBallot<'_>], tally: &mut Tally) -> Result<(), ResultsError> {
    for ballot in ballots {
        let ranking = match ballot.choice {
            BallotChoice::Ranked { ranking } => ranking,
            other => return Err(wrong_shape(ballot.voter_id, other)),
        };

        let mut ordered: Vec<(u32, &String)> = Vec::with_capacity(ranking.len());
        let mut ranks_seen = HashSet::new();
        for (candidate_id, rank) in ranking {
            if !tally.counts.contains_key(candidate_id) {
                return Err(ResultsError::not_found("candidate", candidate_id.as_str()));
            }
            if !ranks_seen.insert(*rank) {
                return Err(ResultsError::Validation(format!(
                    "ballot from voter {} gives rank {} to more than one candidate",
                    ballot.voter_id, rank
                )));
            }
            ordered.push((*rank, candidate_id));
        }
        ordered.sort_by_key(|(rank, _)| *rank);

        let preferences: Vec<String> = ordered.into_iter().map(|(_, id)| id.clone()).collect();
        if let Some(first) = preferences.first() {
            tally.credit(first, ballot.weight)?;
        }

        tally.rankings.push(RankedBallot {
            weight: ballot.weight,
            preferences,
        });
    }
    Ok(())
}

/// Instant-runoff over the retained rankings.
///
/// Each round counts every ballot for its highest surviving preference.
/// The count stops when someone holds a strict majority of the live weight
/// or a single candidate is left. Otherwise every candidate sharing the
/// lowest count is eliminated at once. If all survivors share that count
/// they are declared tied and nobody wins.
pub fn instant_runoff(candidate_order: &[String], rankings: &[RankedBallot]) -> Outcome {
    let mut remaining: Vec<String> = candidate_order.to_vec();
    let mut rounds: Vec<RunoffRound> = Vec::new();
    let mut outcome = Outcome::default();

    loop {
        let round = rounds.len() + 1;
        let mut tallies: HashMap<&str, f64> = remaining.iter().map(|id| (id.as_str(), 0.0)).collect();
        let mut exhausted = 0.0;

        for ballot in rankings {
            let next = ballot
                .preferences
                .iter()
                .find(|id| tallies.contains_key(id.as_str()));
            match next {
                Some(id) => {
                    if let Some(count) = tallies.get_mut(id.as_str()) {
                        *count += ballot.weight;
                    }
                }
                None => exhausted += ballot.weight,
            }
        }

        let counts: Vec<RoundCount> = remaining
            .iter()
            .map(|id| RoundCount {
                candidate_id: id.clone(),
                votes: tallies[id.as_str()],
            })
            .collect();
        let live: f64 = counts.iter().map(|c| c.votes).sum();

        let mut this_round = RunoffRound {
            round,
            counts,
            eliminated: Vec::new(),
            exhausted,
        };

        if live <= 0.0 {
            rounds.push(this_round);
            break;
        }

        if remaining.len() == 1 {
            outcome.winners.insert(remaining[0].clone());
            rounds.push(this_round);
            break;
        }

        let leader = this_round
            .counts
            .iter()
            .max_by(|a, b| a.votes.total_cmp(&b.votes));
        if let Some(leader) = leader {
            if leader.votes * 2.0 > live {
                debug!(
                    "Candidate {} reached a majority in round {} ({} of {})",
                    leader.candidate_id, round, leader.votes, live
                );
                outcome.winners.insert(leader.candidate_id.clone());
                rounds.push(this_round);
                break;
            }
        }

        let lowest = this_round
            .counts
            .iter()
            .map(|c| c.votes)
            .fold(f64::INFINITY, f64::min);
        let eliminated: Vec<String> = this_round
            .counts
            .iter()
            .filter(|c| c.votes == lowest)
            .map(|c| c.candidate_id.clone())
            .collect();

        if eliminated.len() == remaining.len() {
            outcome.tied = remaining.iter().cloned().collect::<BTreeSet<_>>();
            rounds.push(this_round);
            break;
        }

        remaining.retain(|id| !eliminated.contains(id));
        this_round.eliminated = eliminated;
        rounds.push(this_round);
    }

    outcome.rounds = rounds;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BallotChoice, VotingMethod};
    use crate::voting::fixtures::*;
    use crate::voting::{aggregate, determine_outcome};

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn rb(order: &[&str], weight: f64) -> RankedBallot {
        RankedBallot {
            weight,
            preferences: ids(order),
        }
    }

    #[test]
    fn first_preferences_are_the_primary_count() {
        let election = election(VotingMethod::Ranked);
        let candidates = candidates(&["a", "b", "c"]);
        let voters = vec![voter("v1", 1.0), voter("v2", 1.0)];
        let ballots = vec![
            ballot("v1", ranked(&["b", "a"])),
            ballot("v2", ranked(&["b", "c", "a"])),
        ];

        let tally = aggregate(&election, &candidates, &voters, &ballots).unwrap();
        assert_eq!(tally.count("a"), 0.0);
        assert_eq!(tally.count("b"), 2.0);
        assert_eq!(tally.rankings.len(), 2);
        assert_eq!(tally.rankings[1].preferences, ids(&["b", "c", "a"]));
    }

    #[test]
    fn duplicate_rank_is_rejected() {
        let election = election(VotingMethod::Ranked);
        let voters = vec![voter("v1", 1.0)];
        let choice = BallotChoice::Ranked {
            ranking: [("a".to_string(), 1), ("b".to_string(), 1)].into_iter().collect(),
        };
        let ballots = vec![ballot("v1", choice)];

        let err = aggregate(&election, &candidates(&["a", "b"]), &voters, &ballots).unwrap_err();
        assert!(matches!(err, ResultsError::Validation(_)));
    }

    #[test]
    fn majority_in_first_round_ends_the_count() {
        let rankings = vec![rb(&["a"], 1.0), rb(&["a", "b"], 1.0), rb(&["b"], 1.0)];
        let outcome = instant_runoff(&ids(&["a", "b"]), &rankings);
        assert_eq!(outcome.winners, BTreeSet::from(["a".to_string()]));
        assert_eq!(outcome.rounds.len(), 1);
    }

    #[test]
    fn tied_lowest_candidates_are_eliminated_together() {
        // A:4, B:3, C:3 of 10. B and C go out together, their ballots move to A.
        let mut rankings = Vec::new();
        for _ in 0..4 {
            rankings.push(rb(&["a"], 1.0));
        }
        for _ in 0..3 {
            rankings.push(rb(&["b", "a"], 1.0));
        }
        for _ in 0..2 {
            rankings.push(rb(&["c", "a"], 1.0));
        }
        rankings.push(rb(&["c"], 1.0));

        let outcome = instant_runoff(&ids(&["a", "b", "c"]), &rankings);
        assert_eq!(outcome.winners, BTreeSet::from(["a".to_string()]));
        assert_eq!(outcome.rounds.len(), 2);
        assert_eq!(outcome.rounds[0].eliminated, ids(&["b", "c"]));
        assert_eq!(outcome.rounds[1].counts[0].votes, 9.0);
        assert_eq!(outcome.rounds[1].exhausted, 1.0);
    }

    #[test]
    fn redistribution_decides_the_winner() {
        // Round 1: A 4, B 3, C 2 -> C out, C ballots prefer B next -> B 5 > 4.5
        let mut rankings = Vec::new();
        for _ in 0..4 {
            rankings.push(rb(&["a", "b"], 1.0));
        }
        for _ in 0..3 {
            rankings.push(rb(&["b", "a"], 1.0));
        }
        for _ in 0..2 {
            rankings.push(rb(&["c", "b"], 1.0));
        }

        let outcome = instant_runoff(&ids(&["a", "b", "c"]), &rankings);
        assert_eq!(outcome.winners, BTreeSet::from(["b".to_string()]));
        assert_eq!(outcome.rounds[0].eliminated, ids(&["c"]));
        assert_eq!(outcome.rounds[1].counts[1].votes, 5.0);
    }

    #[test]
    fn weights_travel_with_redistributed_ballots() {
        // a 3, b 2, c 1.5 -> c out, b reaches 3.5 of 6.5
        let rankings = vec![rb(&["a"], 3.0), rb(&["b"], 2.0), rb(&["c", "b"], 1.5)];
        let outcome = instant_runoff(&ids(&["a", "b", "c"]), &rankings);
        assert_eq!(outcome.winners, BTreeSet::from(["b".to_string()]));
    }

    #[test]
    fn all_survivors_level_is_a_tie() {
        let rankings = vec![rb(&["a", "b"], 1.0), rb(&["b", "a"], 1.0)];
        let outcome = instant_runoff(&ids(&["a", "b"]), &rankings);
        assert!(outcome.winners.is_empty());
        assert_eq!(outcome.tied.len(), 2);
    }

    #[test]
    fn zero_vote_candidates_drop_before_anyone_else() {
        let rankings = vec![rb(&["a"], 1.0), rb(&["a"], 1.0), rb(&["b"], 1.0), rb(&["b"], 1.0)];
        let outcome = instant_runoff(&ids(&["a", "b", "c"]), &rankings);
        assert_eq!(outcome.rounds[0].eliminated, ids(&["c"]));
        assert_eq!(outcome.tied, BTreeSet::from(["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn no_ballots_no_winner() {
        let outcome = instant_runoff(&ids(&["a", "b"]), &[]);
        assert!(outcome.winners.is_empty());
        assert!(outcome.tied.is_empty());
        assert_eq!(outcome.rounds.len(), 1);
    }

    #[test]
    fn outcome_from_aggregate() {
        let election = election(VotingMethod::Ranked);
        let candidates = candidates(&["a", "b", "c"]);
        let voters = vec![voter("v1", 1.0), voter("v2", 1.0), voter("v3", 1.0)];
        let ballots = vec![
            ballot("v1", ranked(&["a", "c"])),
            ballot("v2", ranked(&["b", "c"])),
            ballot("v3", ranked(&["c", "b"])),
        ];

        let tally = aggregate(&election, &candidates, &voters, &ballots).unwrap();
        let outcome = determine_outcome(&tally, &candidates);
        // All three start level at 1, so nobody can be eliminated.
        assert!(outcome.winners.is_empty());
        assert_eq!(outcome.tied.len(), 3);
    }
}
