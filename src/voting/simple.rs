use crate::error::ResultsError;
use crate::models::BallotChoice;
use crate::voting::{Tally, WeightedBallot};

/// Each ballot gives its voter's full weight to exactly one candidate.
pub fn count_ballots(ballots: &[WeightedBallot<'_>], tally: &mut Tally) -> Result<(), ResultsError> {
    for ballot in ballots {
        match ballot.choice {
            BallotChoice::Simple { candidate_id } => tally.credit(candidate_id, ballot.weight)?,
            other => return Err(wrong_shape(ballot.voter_id, other)),
        }
    }
    Ok(())
}

pub(crate) fn wrong_shape(voter_id: &str, choice: &BallotChoice) -> ResultsError {
    let shape = choice.method().map_or("abstain", |m| m.as_str());
    ResultsError::Validation(format!(
        "ballot from voter {} is a {} ballot, which this election does not accept",
        voter_id, shape
    ))
}
