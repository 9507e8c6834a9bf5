use crate::models::{ElectionStatus, QuorumType, VotingMethod};
use crate::results::ResultSnapshot;
use crate::voting::RunoffRound;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Published shape of an election's results, consumed by the CSV, PDF and
/// JSON report generators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedResults {
    pub metadata: ExportMetadata,
    pub election: ExportedElection,
    pub statistics: ExportedStatistics,
    pub results: Vec<ExportedCandidate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rounds: Vec<RunoffRound>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub list_totals: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub generated_at: DateTime<Utc>,
    pub format_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedElection {
    pub id: String,
    pub title: String,
    pub description: String,
    pub voting_method: VotingMethod,
    pub status: ElectionStatus,
    pub is_secret: bool,
    pub is_weighted: bool,
    pub allow_abstention: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quorum_type: Option<QuorumType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quorum_value: Option<f64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedStatistics {
    pub total_voters: usize,
    pub total_votes: usize,
    pub weighted_votes: f64,
    pub participation_rate: f64,
    pub abstentions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstention_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quorum_required: Option<f64>,
    pub quorum_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedCandidate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub position: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    pub votes: f64,
    pub percentage: f64,
    pub is_winner: bool,
    pub is_tied: bool,
}

const FORMAT_VERSION: u32 = 1;

impl From<&ResultSnapshot> for ExportedResults {
    fn from(snapshot: &ResultSnapshot) -> Self {
        let election = &snapshot.election;
        let stats = &snapshot.statistics;

        // No quorum means no quorum fields at all, never a made-up default.
        let (quorum_type, quorum_value) = match election.quorum.kind {
            QuorumType::None => (None, None),
            kind => (Some(kind), Some(election.quorum.threshold)),
        };

        Self {
            metadata: ExportMetadata {
                generated_at: snapshot.computed_at,
                format_version: FORMAT_VERSION,
            },
            election: ExportedElection {
                id: election.id.clone(),
                title: election.title.clone(),
                description: election.description.clone(),
                voting_method: election.voting_method,
                status: election.status,
                is_secret: election.is_secret,
                is_weighted: election.is_weighted,
                allow_abstention: election.allow_abstention,
                quorum_type,
                quorum_value,
                start_date: election.start_at,
                end_date: election.end_at,
            },
            statistics: ExportedStatistics {
                total_voters: stats.total_voters,
                total_votes: stats.total_votes_cast,
                weighted_votes: stats.weighted_votes_cast,
                participation_rate: stats.participation_rate,
                abstentions: stats.abstentions,
                abstention_percentage: stats.abstention_percentage,
                quorum_required: stats.quorum.required,
                quorum_reached: stats.quorum.reached,
            },
            results: snapshot
                .candidates
                .iter()
                .map(|r| ExportedCandidate {
                    id: r.candidate.id.clone(),
                    name: r.candidate.name.clone(),
                    description: r.candidate.description.clone(),
                    position: r.candidate.position,
                    list_id: r.candidate.list_id.clone(),
                    votes: r.votes,
                    percentage: r.percentage,
                    is_winner: r.is_winner,
                    is_tied: r.is_tied,
                })
                .collect(),
            rounds: snapshot.rounds.clone(),
            list_totals: snapshot.list_totals.clone(),
        }
    }
}

pub fn to_json(snapshot: &ResultSnapshot) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ExportedResults::from(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuorumPolicy;
    use crate::results::assemble;
    use crate::voting::fixtures::*;

    fn snapshot(quorum: QuorumPolicy) -> ResultSnapshot {
        let mut election = election(VotingMethod::Simple);
        election.quorum = quorum;
        let voters = vec![voter("v1", 1.0), voter("v2", 1.0)];
        let ballots = vec![ballot("v1", simple("a")), ballot("v2", simple("a"))];
        assemble(election, candidates(&["a", "b"]), &voters, &ballots, Utc::now()).unwrap()
    }

    #[test]
    fn no_quorum_leaves_quorum_fields_out() {
        let json = to_json(&snapshot(QuorumPolicy::none())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value["election"].get("quorumType").is_none());
        assert!(value["election"].get("quorumValue").is_none());
        assert!(value["statistics"].get("quorumRequired").is_none());
        assert_eq!(value["statistics"]["quorumReached"], true);
    }

    #[test]
    fn quorum_passes_through_unchanged() {
        let exported = ExportedResults::from(&snapshot(QuorumPolicy {
            kind: QuorumType::Absolute,
            threshold: 3.0,
        }));
        assert_eq!(exported.election.quorum_type, Some(QuorumType::Absolute));
        assert_eq!(exported.election.quorum_value, Some(3.0));
        assert_eq!(exported.statistics.quorum_required, Some(3.0));
        assert!(!exported.statistics.quorum_reached);
    }

    #[test]
    fn sections_and_candidate_rows() {
        let snap = snapshot(QuorumPolicy::none());
        let value: serde_json::Value = serde_json::from_str(&to_json(&snap).unwrap()).unwrap();

        for section in ["metadata", "election", "statistics", "results"] {
            assert!(value.get(section).is_some(), "missing {}", section);
        }
        assert!(value.get("rounds").is_none());
        assert_eq!(value["election"]["votingMethod"], "simple");
        assert_eq!(value["results"][0]["name"], "A");
        assert_eq!(value["results"][0]["isWinner"], true);
        assert_eq!(value["results"][1]["votes"], 0.0);
    }

    #[test]
    fn runoff_rounds_use_the_same_field_casing() {
        let election = election(VotingMethod::Ranked);
        let voters = vec![voter("v1", 1.0), voter("v2", 1.0), voter("v3", 1.0)];
        let ballots = vec![
            ballot("v1", ranked(&["a"])),
            ballot("v2", ranked(&["b", "a"])),
            ballot("v3", ranked(&["a", "b"])),
        ];
        let snap = assemble(election, candidates(&["a", "b"]), &voters, &ballots, Utc::now()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&to_json(&snap).unwrap()).unwrap();

        let count = &value["rounds"][0]["counts"][0];
        assert_eq!(count["candidateId"], "a");
        assert_eq!(count["votes"], 2.0);
        assert!(count.get("candidate_id").is_none());
    }

    #[test]
    fn export_is_deterministic() {
        let snap = snapshot(QuorumPolicy::none());
        assert_eq!(to_json(&snap).unwrap(), to_json(&snap).unwrap());
        assert_eq!(ExportedResults::from(&snap).metadata.generated_at, snap.computed_at);
    }
}
