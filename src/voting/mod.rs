pub mod approval;
pub mod list;
pub mod ranked;
pub mod simple;

use crate::error::ResultsError;
use crate::models::{Ballot, BallotChoice, Candidate, Election, VotingMethod, Voter};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A ballot paired with the weight its voter carries in this election.
#[derive(Debug, Clone, Copy)]
pub struct WeightedBallot<'a> {
    pub voter_id: &'a str,
    pub weight: f64,
    pub choice: &'a BallotChoice,
}

/// A ranked ballot kept whole so the runoff can walk down its preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedBallot {
    pub weight: f64,
    // Candidate ids, most preferred first
    pub preferences: Vec<String>,
}

/// Raw aggregate of one election's ballots.
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    pub method: VotingMethod,
    // candidate id -> weighted count; every candidate has an entry
    pub counts: HashMap<String, f64>,
    // Every accepted ballot, abstentions included
    pub ballots_cast: usize,
    pub weighted_ballots_cast: f64,
    pub abstentions: usize,
    pub abstention_weight: f64,
    pub rankings: Vec<RankedBallot>,
    pub list_totals: BTreeMap<String, f64>,
}

impl Tally {
    fn empty(method: VotingMethod, candidates: &[Candidate]) -> Self {
        Self {
            method,
            counts: candidates.iter().map(|c| (c.id.clone(), 0.0)).collect(),
            ballots_cast: 0,
            weighted_ballots_cast: 0.0,
            abstentions: 0,
            abstention_weight: 0.0,
            rankings: Vec::new(),
            list_totals: BTreeMap::new(),
        }
    }

    pub fn count(&self, candidate_id: &str) -> f64 {
        self.counts.get(candidate_id).copied().unwrap_or(0.0)
    }

    pub(crate) fn credit(&mut self, candidate_id: &str, weight: f64) -> Result<(), ResultsError> {
        match self.counts.get_mut(candidate_id) {
            Some(count) => {
                *count += weight;
                Ok(())
            }
            None => Err(ResultsError::not_found("candidate", candidate_id)),
        }
    }
}

/// One round of an instant-runoff count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunoffRound {
    pub round: usize,
    pub counts: Vec<RoundCount>,
    pub eliminated: Vec<String>,
    // Weight of ballots with no surviving preference left
    pub exhausted: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundCount {
    pub candidate_id: String,
    pub votes: f64,
}

/// Who won, who tied. A tie never produces a winner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub winners: BTreeSet<String>,
    pub tied: BTreeSet<String>,
    pub rounds: Vec<RunoffRound>,
}

/// Turn the ballot set into per-candidate counts.
///
/// Ballots are expected to be well formed already; anything that is not
/// is reported instead of being dropped, since a silently missing vote is
/// worse than no result.
pub fn aggregate(
    election: &Election,
    candidates: &[Candidate],
    voters: &[Voter],
    ballots: &[Ballot],
) -> Result<Tally, ResultsError> {
    let weights = voter_weights(election, voters)?;
    let mut tally = Tally::empty(election.voting_method, candidates);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut marked: Vec<WeightedBallot<'_>> = Vec::with_capacity(ballots.len());

    for ballot in ballots {
        let weight = *weights.get(ballot.voter_id.as_str()).ok_or_else(|| {
            ResultsError::Validation(format!(
                "ballot from voter {} who is not on the electorate of election {}",
                ballot.voter_id, election.id
            ))
        })?;

        if !seen.insert(ballot.voter_id.as_str()) {
            return Err(ResultsError::Validation(format!(
                "voter {} cast more than one ballot",
                ballot.voter_id
            )));
        }

        tally.ballots_cast += 1;
        tally.weighted_ballots_cast += weight;

        if ballot.choice == BallotChoice::Abstain {
            if !election.allow_abstention {
                return Err(ResultsError::Validation(format!(
                    "voter {} abstained but election {} does not allow abstention",
                    ballot.voter_id, election.id
                )));
            }
            tally.abstentions += 1;
            tally.abstention_weight += weight;
            continue;
        }

        marked.push(WeightedBallot {
            voter_id: &ballot.voter_id,
            weight,
            choice: &ballot.choice,
        });
    }

    match election.voting_method {
        VotingMethod::Simple => simple::count_ballots(&marked, &mut tally)?,
        VotingMethod::Approval => approval::count_ballots(&marked, &mut tally)?,
        VotingMethod::Ranked => ranked::count_ballots(&marked, &mut tally)?,
        VotingMethod::List => list::count_ballots(candidates, &marked, &mut tally)?,
    }

    debug!(
        "Aggregated {} ballot(s) ({} abstention(s)) for election {}",
        tally.ballots_cast, tally.abstentions, election.id
    );

    Ok(tally)
}

/// Decide winners and ties from an aggregate.
pub fn determine_outcome(tally: &Tally, candidates: &[Candidate]) -> Outcome {
    match tally.method {
        VotingMethod::Ranked => {
            let order: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();
            ranked::instant_runoff(&order, &tally.rankings)
        }
        VotingMethod::Simple | VotingMethod::Approval | VotingMethod::List => {
            highest_count(&tally.counts)
        }
    }
}

/// Candidates sharing the maximum count. Equality is exact: counts are
/// deterministic sums of the same weights. Nobody wins with zero votes.
pub fn highest_count(counts: &HashMap<String, f64>) -> Outcome {
    let max = counts.values().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return Outcome::default();
    }

    let leaders: BTreeSet<String> = counts
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(id, _)| id.clone())
        .collect();

    if leaders.len() == 1 {
        Outcome {
            winners: leaders,
            ..Outcome::default()
        }
    } else {
        Outcome {
            tied: leaders,
            ..Outcome::default()
        }
    }
}

fn voter_weights<'a>(
    election: &Election,
    voters: &'a [Voter],
) -> Result<HashMap<&'a str, f64>, ResultsError> {
    let mut weights = HashMap::with_capacity(voters.len());
    for voter in voters {
        if !voter.weight.is_finite() || voter.weight <= 0.0 {
            return Err(ResultsError::ComputationInvariant(format!(
                "voter {} has non-positive weight {}",
                voter.id, voter.weight
            )));
        }
        let weight = if election.is_weighted { voter.weight } else { 1.0 };
        weights.insert(voter.id.as_str(), weight);
    }
    Ok(weights)
}
