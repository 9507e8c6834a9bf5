use async_trait::async_trait;

use crate::error::ResultsError;
use crate::models::{Ballot, Candidate, Election, Voter};

/// Read access to everything a tally needs.
///
/// Implementations report a missing election as `ResultsError::NotFound` and
/// I/O trouble as `ResultsError::TransientStore`. The engine never retries.
#[async_trait]
pub trait ElectionStore: Send + Sync {
    async fn fetch_election(&self, election_id: &str) -> Result<Election, ResultsError>;

    /// Candidates ordered by position.
    async fn fetch_candidates(&self, election_id: &str) -> Result<Vec<Candidate>, ResultsError>;

    async fn fetch_voters(&self, election_id: &str) -> Result<Vec<Voter>, ResultsError>;

    async fn fetch_ballots(&self, election_id: &str) -> Result<Vec<Ballot>, ResultsError>;
}
