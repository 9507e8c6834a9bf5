use crate::error::ResultsError;
use crate::models::{QuorumPolicy, QuorumType};
use serde::Serialize;

/// Participation figures the quorum is measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Participation {
    pub total_voters: usize,
    pub ballots_cast: usize,
    pub weighted_ballots_cast: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuorumOutcome {
    // None when the election has no quorum requirement
    pub required: Option<f64>,
    // Measured value in the policy's own unit
    pub metric: f64,
    pub reached: bool,
}

pub fn evaluate(policy: &QuorumPolicy, participation: &Participation) -> Result<QuorumOutcome, ResultsError> {
    if policy.kind != QuorumType::None && (!policy.threshold.is_finite() || policy.threshold < 0.0) {
        return Err(ResultsError::Validation(format!(
            "{} quorum threshold must be a non-negative number, got {}",
            policy.kind.as_str(),
            policy.threshold
        )));
    }

    let outcome = match policy.kind {
        QuorumType::None => QuorumOutcome {
            required: None,
            metric: participation.ballots_cast as f64,
            reached: true,
        },
        QuorumType::Percentage => {
            // An empty electorate can never reach a percentage quorum.
            if participation.total_voters == 0 {
                QuorumOutcome {
                    required: Some(policy.threshold),
                    metric: 0.0,
                    reached: false,
                }
            } else {
                let turnout =
                    participation.ballots_cast as f64 / participation.total_voters as f64 * 100.0;
                QuorumOutcome {
                    required: Some(policy.threshold),
                    metric: turnout,
                    reached: turnout >= policy.threshold,
                }
            }
        }
        QuorumType::Absolute => {
            let cast = participation.ballots_cast as f64;
            QuorumOutcome {
                required: Some(policy.threshold),
                metric: cast,
                reached: cast >= policy.threshold,
            }
        }
        QuorumType::Weighted => QuorumOutcome {
            required: Some(policy.threshold),
            metric: participation.weighted_ballots_cast,
            reached: participation.weighted_ballots_cast >= policy.threshold,
        },
    };

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(kind: QuorumType, threshold: f64) -> QuorumPolicy {
        QuorumPolicy { kind, threshold }
    }

    fn turnout(total_voters: usize, ballots_cast: usize, weighted: f64) -> Participation {
        Participation {
            total_voters,
            ballots_cast,
            weighted_ballots_cast: weighted,
        }
    }

    #[test]
    fn no_quorum_is_always_reached() {
        let outcome = evaluate(&QuorumPolicy::none(), &turnout(10, 0, 0.0)).unwrap();
        assert!(outcome.reached);
        assert_eq!(outcome.required, None);
    }

    #[test]
    fn percentage_quorum_boundary() {
        let half = policy(QuorumType::Percentage, 50.0);

        let four = evaluate(&half, &turnout(10, 4, 4.0)).unwrap();
        assert!(!four.reached);
        assert_eq!(four.metric, 40.0);

        let five = evaluate(&half, &turnout(10, 5, 5.0)).unwrap();
        assert!(five.reached);
        assert_eq!(five.required, Some(50.0));
    }

    #[test]
    fn percentage_quorum_with_no_voters_is_not_reached() {
        let outcome = evaluate(&policy(QuorumType::Percentage, 0.0), &turnout(0, 0, 0.0)).unwrap();
        assert!(!outcome.reached);
        assert_eq!(outcome.metric, 0.0);
    }

    #[test]
    fn absolute_quorum_ignores_weight() {
        let three = policy(QuorumType::Absolute, 3.0);
        assert!(!evaluate(&three, &turnout(10, 2, 50.0)).unwrap().reached);
        assert!(evaluate(&three, &turnout(10, 3, 3.0)).unwrap().reached);
    }

    #[test]
    fn weighted_quorum_counts_weight_units() {
        let ten = policy(QuorumType::Weighted, 10.0);
        assert!(!evaluate(&ten, &turnout(10, 9, 9.5)).unwrap().reached);
        assert!(evaluate(&ten, &turnout(10, 2, 10.0)).unwrap().reached);
    }

    #[test]
    fn bad_threshold_is_a_validation_error() {
        let err = evaluate(&policy(QuorumType::Absolute, -1.0), &turnout(1, 1, 1.0)).unwrap_err();
        assert!(matches!(err, ResultsError::Validation(_)));

        let err = evaluate(&policy(QuorumType::Weighted, f64::NAN), &turnout(1, 1, 1.0)).unwrap_err();
        assert!(matches!(err, ResultsError::Validation(_)));
    }
}
