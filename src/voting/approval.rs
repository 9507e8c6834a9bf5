use crate::error::ResultsError;
use crate::models::BallotChoice;
use crate::voting::simple::wrong_shape;
use crate::voting::{Tally, WeightedBallot};

/// Every approved candidate receives the voter's full weight. Approving
/// more candidates does not dilute a voter's influence.
pub fn count_ballots(ballots: &[WeightedBallot<'_>], tally: &mut Tally) -> Result<(), ResultsError> {
    for ballot in ballots {
        match ballot.choice {
            BallotChoice::Approval { candidate_ids } => {
                for candidate_id in candidate_ids {
                    tally.credit(candidate_id, ballot.weight)?;
                }
            }
            other => return Err(wrong_shape(ballot.voter_id, other)),
        }
    }
    Ok(())
}
