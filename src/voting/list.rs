use crate::error::ResultsError;
use crate::models::{BallotChoice, Candidate};
use crate::voting::simple::wrong_shape;
use crate::voting::{Tally, WeightedBallot};
use std::collections::BTreeMap;

/// Party-list counting.
///
/// Weight accrues to the list, then the list's head (lowest position) is
/// reported with the list's whole total. The rest of the list shows zero.
/// This is a display convention, not a seat apportionment.
pub fn count_ballots(
    candidates: &[Candidate],
    ballots: &[WeightedBallot<'_>],
    tally: &mut Tally,
) -> Result<(), ResultsError> {
    let heads = list_heads(candidates);
    let mut totals: BTreeMap<String, f64> = heads.keys().map(|id| (id.clone(), 0.0)).collect();

    for ballot in ballots {
        match ballot.choice {
            BallotChoice::List { list_id } => match totals.get_mut(list_id) {
                Some(total) => *total += ballot.weight,
                None => return Err(ResultsError::not_found("list", list_id.as_str())),
            },
            other => return Err(wrong_shape(ballot.voter_id, other)),
        }
    }

    for (list_id, total) in &totals {
        if let Some(head) = heads.get(list_id) {
            tally.credit(&head.id, *total)?;
        }
    }

    tally.list_totals = totals;
    Ok(())
}

// list id -> candidate with the lowest position on that list
fn list_heads(candidates: &[Candidate]) -> BTreeMap<String, &Candidate> {
    let mut heads: BTreeMap<String, &Candidate> = BTreeMap::new();
    for candidate in candidates {
        let Some(list_id) = &candidate.list_id else {
            continue;
        };
        heads
            .entry(list_id.clone())
            .and_modify(|head| {
                if candidate.position < head.position {
                    *head = candidate;
                }
            })
            .or_insert(candidate);
    }
    heads
}

#[cfg(test)]
mod tests {
    use crate::error::ResultsError;
    use crate::models::{BallotChoice, Candidate, VotingMethod};
    use crate::voting::fixtures::*;
    use crate::voting::{aggregate, determine_outcome};

    fn party_candidates() -> Vec<Candidate> {
        let mut list = candidates(&["red1", "red2", "blue1", "blue2"]);
        list[0].list_id = Some("red".to_string());
        list[0].position = 2;
        list[1].list_id = Some("red".to_string());
        list[1].position = 1;
        list[2].list_id = Some("blue".to_string());
        list[3].list_id = Some("blue".to_string());
        list
    }

    fn vote_list(id: &str) -> BallotChoice {
        BallotChoice::List {
            list_id: id.to_string(),
        }
    }

    #[test]
    fn list_total_is_reported_on_its_head_candidate() {
        let mut election = election(VotingMethod::List);
        election.is_weighted = true;
        let candidates = party_candidates();
        let voters = vec![voter("v1", 2.0), voter("v2", 1.0), voter("v3", 1.0)];
        let ballots = vec![
            ballot("v1", vote_list("red")),
            ballot("v2", vote_list("blue")),
            ballot("v3", vote_list("red")),
        ];

        let tally = aggregate(&election, &candidates, &voters, &ballots).unwrap();
        // red2 has the lower position on the red list
        assert_eq!(tally.count("red2"), 3.0);
        assert_eq!(tally.count("red1"), 0.0);
        assert_eq!(tally.count("blue1"), 1.0);
        assert_eq!(tally.count("blue2"), 0.0);
        assert_eq!(tally.list_totals["red"], 3.0);
        assert_eq!(tally.list_totals["blue"], 1.0);

        let outcome = determine_outcome(&tally, &candidates);
        assert!(outcome.winners.contains("red2"));
    }

    #[test]
    fn unknown_list_is_not_found() {
        let election = election(VotingMethod::List);
        let voters = vec![voter("v1", 1.0)];
        let ballots = vec![ballot("v1", vote_list("green"))];

        let err = aggregate(&election, &party_candidates(), &voters, &ballots).unwrap_err();
        assert_eq!(err, ResultsError::not_found("list", "green"));
    }
}
