use crate::error::ResultsError;
use crate::models::{Ballot, Candidate, Election, Voter};
use crate::quorum::{self, Participation, QuorumOutcome};
use crate::store::ElectionStore;
use crate::voting::{self, RunoffRound};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

const PERCENT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    pub candidate: Candidate,
    pub votes: f64,
    pub percentage: f64,
    pub is_winner: bool,
    pub is_tied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElectionStatistics {
    pub total_voters: usize,
    // Ballots received, abstentions included
    pub total_votes_cast: usize,
    pub weighted_votes_cast: f64,
    pub participation_rate: f64,
    pub abstentions: usize,
    // Only reported when the election allows abstaining
    pub abstention_percentage: Option<f64>,
    pub quorum: QuorumOutcome,
}

/// Immutable tally of one election at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSnapshot {
    pub election: Election,
    // In ballot (position) order
    pub candidates: Vec<CandidateResult>,
    pub statistics: ElectionStatistics,
    // Instant-runoff history, empty for other methods
    pub rounds: Vec<RunoffRound>,
    // Per-list totals, empty unless list voting
    pub list_totals: BTreeMap<String, f64>,
    pub computed_at: DateTime<Utc>,
}

impl ResultSnapshot {
    pub fn winners(&self) -> impl Iterator<Item = &CandidateResult> {
        self.candidates.iter().filter(|c| c.is_winner)
    }

    pub fn is_tied(&self) -> bool {
        self.candidates.iter().any(|c| c.is_tied)
    }

    pub fn candidate(&self, candidate_id: &str) -> Option<&CandidateResult> {
        self.candidates.iter().find(|c| c.candidate.id == candidate_id)
    }
}

/// Fetch everything for an election and tally it.
pub async fn compute(store: &dyn ElectionStore, election: Election) -> Result<ResultSnapshot, ResultsError> {
    let (candidates, voters, ballots) = tokio::try_join!(
        store.fetch_candidates(&election.id),
        store.fetch_voters(&election.id),
        store.fetch_ballots(&election.id),
    )?;

    assemble(election, candidates, &voters, &ballots, Utc::now())
}

/// Aggregate, check quorum, pick winners, and build the snapshot.
pub fn assemble(
    election: Election,
    mut candidates: Vec<Candidate>,
    voters: &[Voter],
    ballots: &[Ballot],
    computed_at: DateTime<Utc>,
) -> Result<ResultSnapshot, ResultsError> {
    candidates.sort_by_key(|c| c.position);

    let tally = voting::aggregate(&election, &candidates, voters, ballots)?;
    let participation = Participation {
        total_voters: voters.len(),
        ballots_cast: tally.ballots_cast,
        weighted_ballots_cast: tally.weighted_ballots_cast,
    };
    let quorum = quorum::evaluate(&election.quorum, &participation)?;
    let outcome = voting::determine_outcome(&tally, &candidates);

    for (candidate_id, count) in &tally.counts {
        if !count.is_finite() || *count < 0.0 {
            return Err(ResultsError::ComputationInvariant(format!(
                "candidate {} ended with count {}",
                candidate_id, count
            )));
        }
    }

    let base: f64 = tally.counts.values().sum::<f64>() + tally.abstention_weight;
    let percent_of = |value: f64| if base > 0.0 { value / base * 100.0 } else { 0.0 };

    let results: Vec<CandidateResult> = candidates
        .into_iter()
        .map(|candidate| {
            let votes = tally.count(&candidate.id);
            CandidateResult {
                is_winner: outcome.winners.contains(&candidate.id),
                is_tied: outcome.tied.contains(&candidate.id),
                percentage: percent_of(votes),
                votes,
                candidate,
            }
        })
        .collect();

    let abstention_percentage = election
        .allow_abstention
        .then(|| percent_of(tally.abstention_weight));

    let percent_total: f64 =
        results.iter().map(|r| r.percentage).sum::<f64>() + abstention_percentage.unwrap_or(0.0);
    let expected = if base > 0.0 { 100.0 } else { 0.0 };
    if (percent_total - expected).abs() > PERCENT_TOLERANCE {
        return Err(ResultsError::ComputationInvariant(format!(
            "percentages for election {} sum to {} instead of {}",
            election.id, percent_total, expected
        )));
    }

    let participation_rate = if participation.total_voters > 0 {
        participation.ballots_cast as f64 / participation.total_voters as f64 * 100.0
    } else {
        0.0
    };

    debug!(
        "Assembled results for election {}: {} candidate(s), {} winner(s), quorum reached: {}",
        election.id,
        results.len(),
        outcome.winners.len(),
        quorum.reached
    );

    Ok(ResultSnapshot {
        statistics: ElectionStatistics {
            total_voters: participation.total_voters,
            total_votes_cast: tally.ballots_cast,
            weighted_votes_cast: tally.weighted_ballots_cast,
            participation_rate,
            abstentions: tally.abstentions,
            abstention_percentage,
            quorum,
        },
        election,
        candidates: results,
        rounds: outcome.rounds,
        list_totals: tally.list_totals,
        computed_at,
    })
}
