use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ResultsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotingMethod {
    Simple,
    Approval,
    Ranked,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    Draft,
    Active,
    Closed,
    Archived,
}

impl ElectionStatus {
    /// Closed and archived elections never receive new ballots, so their
    /// results are fixed forever.
    pub fn is_terminal(self) -> bool {
        matches!(self, ElectionStatus::Closed | ElectionStatus::Archived)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuorumType {
    None,
    Percentage,
    Absolute,
    Weighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuorumPolicy {
    pub kind: QuorumType,
    // Percent for `Percentage`, ballot count for `Absolute`, weight units for `Weighted`.
    pub threshold: f64,
}

impl QuorumPolicy {
    pub fn none() -> Self {
        Self {
            kind: QuorumType::None,
            threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    pub id: String,
    pub title: String,
    pub description: String,
    pub voting_method: VotingMethod,
    pub is_secret: bool,
    pub is_weighted: bool,
    pub allow_abstention: bool,
    pub quorum: QuorumPolicy,
    pub status: ElectionStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub election_id: String,
    pub name: String,
    pub description: String,
    pub position: i64,
    // Party list this candidate belongs to, only meaningful for list voting
    pub list_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voter {
    pub id: String,
    pub election_id: String,
    pub email: String,
    pub name: String,
    pub weight: f64,
    pub has_voted: bool,
    pub invited_at: DateTime<Utc>,
}

/// One voter's choice, shaped by the election's voting method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum BallotChoice {
    Simple { candidate_id: String },
    Approval { candidate_ids: BTreeSet<String> },
    // candidate id -> rank, 1 is the most preferred
    Ranked { ranking: BTreeMap<String, u32> },
    List { list_id: String },
    Abstain,
}

impl BallotChoice {
    pub fn method(&self) -> Option<VotingMethod> {
        match self {
            BallotChoice::Simple { .. } => Some(VotingMethod::Simple),
            BallotChoice::Approval { .. } => Some(VotingMethod::Approval),
            BallotChoice::Ranked { .. } => Some(VotingMethod::Ranked),
            BallotChoice::List { .. } => Some(VotingMethod::List),
            BallotChoice::Abstain => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub voter_id: String,
    pub election_id: String,
    pub choice: BallotChoice,
    pub cast_at: DateTime<Utc>,
}

impl Election {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: String,
        description: String,
        voting_method: VotingMethod,
        is_secret: bool,
        is_weighted: bool,
        allow_abstention: bool,
        quorum: QuorumPolicy,
        duration_minutes: i64,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            voting_method,
            is_secret,
            is_weighted,
            allow_abstention,
            quorum,
            status: ElectionStatus::Draft,
            start_at: now,
            end_at: now + chrono::Duration::minutes(duration_minutes),
        }
    }
}

impl Candidate {
    pub fn new(election_id: &str, name: String, position: i64, list_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            election_id: election_id.to_string(),
            name,
            description: String::new(),
            position,
            list_id,
        }
    }
}

impl Voter {
    pub fn new(election_id: &str, email: String, name: String, weight: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            election_id: election_id.to_string(),
            email,
            name,
            weight,
            has_voted: false,
            invited_at: Utc::now(),
        }
    }
}

impl Ballot {
    pub fn new(voter_id: &str, election_id: &str, choice: BallotChoice) -> Self {
        Self {
            voter_id: voter_id.to_string(),
            election_id: election_id.to_string(),
            choice,
            cast_at: Utc::now(),
        }
    }
}

// Text codecs used by the SQL layer

impl VotingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            VotingMethod::Simple => "simple",
            VotingMethod::Approval => "approval",
            VotingMethod::Ranked => "ranked",
            VotingMethod::List => "list",
        }
    }
}

impl FromStr for VotingMethod {
    type Err = ResultsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(VotingMethod::Simple),
            "approval" => Ok(VotingMethod::Approval),
            "ranked" => Ok(VotingMethod::Ranked),
            "list" => Ok(VotingMethod::List),
            _ => Err(ResultsError::Validation(format!("Unknown voting method: {}", s))),
        }
    }
}

impl ElectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ElectionStatus::Draft => "draft",
            ElectionStatus::Active => "active",
            ElectionStatus::Closed => "closed",
            ElectionStatus::Archived => "archived",
        }
    }
}

impl FromStr for ElectionStatus {
    type Err = ResultsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ElectionStatus::Draft),
            "active" => Ok(ElectionStatus::Active),
            "closed" => Ok(ElectionStatus::Closed),
            "archived" => Ok(ElectionStatus::Archived),
            _ => Err(ResultsError::Validation(format!("Unknown election status: {}", s))),
        }
    }
}

impl QuorumType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuorumType::None => "none",
            QuorumType::Percentage => "percentage",
            QuorumType::Absolute => "absolute",
            QuorumType::Weighted => "weighted",
        }
    }
}

impl FromStr for QuorumType {
    type Err = ResultsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(QuorumType::None),
            "percentage" => Ok(QuorumType::Percentage),
            "absolute" => Ok(QuorumType::Absolute),
            "weighted" => Ok(QuorumType::Weighted),
            _ => Err(ResultsError::Validation(format!("Unknown quorum type: {}", s))),
        }
    }
}

impl fmt::Display for ElectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
