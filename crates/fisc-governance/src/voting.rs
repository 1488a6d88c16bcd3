use crate::types::{RuleSpec, Vote, VoteChoice, VotingStatus};
use crate::{GovernanceError, Result};
use fisc_types::{Principal, VotePower};
use tracing::debug;

/// Outcome of evaluating a closed voting window against a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyOutcome {
    Passed,
    QuorumNotMet {
        cast: VotePower,
        required: VotePower,
    },
    ThresholdNotMet {
        approval: VotePower,
        cast: VotePower,
        required_pct: u32,
    },
}

impl TallyOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, TallyOutcome::Passed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TallyOutcome::Passed => "passed",
            TallyOutcome::QuorumNotMet { .. } => "quorum_not_met",
            TallyOutcome::ThresholdNotMet { .. } => "threshold_not_met",
        }
    }
}

/// Weighted-vote bookkeeping shared by grants and group proposals.
///
/// Votes are write-once: a vote's weight is the voter's power at cast time
/// and is never revisited. The running tallies on [`VotingStatus`] are the
/// only inputs to [`evaluate`](TallyEngine::evaluate).
pub struct TallyEngine;

impl TallyEngine {
    /// Records one vote in an open window. Rejects votes outside the window,
    /// duplicate voters, and voters without power.
    pub fn cast(
        voting: &mut VotingStatus,
        voter: Principal,
        choice: VoteChoice,
        power: VotePower,
        now: i64,
    ) -> Result<()> {
        if voting.has_ended(now) {
            return Err(GovernanceError::VotingEnded);
        }
        if now < voting.start_time {
            return Err(GovernanceError::InvalidInput(
                "voting window has not opened".to_string(),
            ));
        }
        if voting.has_voted(&voter) {
            return Err(GovernanceError::DuplicateVote(voter.to_hex()));
        }
        if power.is_zero() {
            return Err(GovernanceError::NoVotingPower);
        }

        match choice {
            VoteChoice::Approve => {
                voting.approval_power = voting.approval_power.saturating_add(power);
            }
            VoteChoice::Reject => {
                voting.reject_power = voting.reject_power.saturating_add(power);
            }
        }
        voting.total_power = voting.total_power.saturating_add(power);

        voting.voters.insert(voter);
        voting.votes.push(Vote {
            voter,
            choice,
            power,
            timestamp: now,
        });

        debug!(
            voter = %voter,
            choice = ?choice,
            power = %power,
            total_power = %voting.total_power,
            "Vote counted"
        );

        Ok(())
    }

    /// Pass iff cast power reaches the quorum and the approval share of cast
    /// power reaches the threshold percentage. Evaluated in integer math so
    /// a 60-of-100 tally against threshold 60 passes exactly.
    pub fn evaluate(voting: &VotingStatus, rule: &RuleSpec) -> TallyOutcome {
        let cast = voting.total_power;

        if cast < rule.quorum {
            return TallyOutcome::QuorumNotMet {
                cast,
                required: rule.quorum,
            };
        }

        let approval_scaled = voting.approval_power.to_raw().saturating_mul(100);
        let required = (rule.threshold as u128).saturating_mul(cast.to_raw());

        if approval_scaled >= required {
            TallyOutcome::Passed
        } else {
            TallyOutcome::ThresholdNotMet {
                approval: voting.approval_power,
                cast,
                required_pct: rule.threshold,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(tag: u8) -> Principal {
        Principal::from_bytes([tag; 32])
    }

    fn open_window() -> VotingStatus {
        VotingStatus::open(1_000, 2_000)
    }

    fn rule(threshold: u32, quorum: u128) -> RuleSpec {
        RuleSpec {
            threshold,
            quorum: VotePower::from_raw(quorum),
            timelock_secs: None,
        }
    }

    #[test]
    fn test_cast_accumulates_tallies() {
        let mut voting = open_window();

        TallyEngine::cast(&mut voting, voter(1), VoteChoice::Approve, VotePower::from_raw(70), 1_100)
            .unwrap();
        TallyEngine::cast(&mut voting, voter(2), VoteChoice::Reject, VotePower::from_raw(30), 1_200)
            .unwrap();

        assert_eq!(voting.approval_power, VotePower::from_raw(70));
        assert_eq!(voting.reject_power, VotePower::from_raw(30));
        assert_eq!(voting.total_power, VotePower::from_raw(100));
        assert_eq!(voting.votes.len(), 2);
    }

    #[test]
    fn test_duplicate_vote_rejected() {
        let mut voting = open_window();

        TallyEngine::cast(&mut voting, voter(1), VoteChoice::Approve, VotePower::from_raw(10), 1_100)
            .unwrap();
        let result =
            TallyEngine::cast(&mut voting, voter(1), VoteChoice::Reject, VotePower::from_raw(10), 1_200);

        assert!(matches!(result, Err(GovernanceError::DuplicateVote(_))));
        assert_eq!(voting.total_power, VotePower::from_raw(10));
    }

    #[test]
    fn test_vote_after_end_rejected() {
        let mut voting = open_window();
        let result =
            TallyEngine::cast(&mut voting, voter(1), VoteChoice::Approve, VotePower::from_raw(10), 2_000);
        assert!(matches!(result, Err(GovernanceError::VotingEnded)));
    }

    #[test]
    fn test_powerless_voter_rejected() {
        let mut voting = open_window();
        let result =
            TallyEngine::cast(&mut voting, voter(1), VoteChoice::Approve, VotePower::ZERO, 1_100);
        assert!(matches!(result, Err(GovernanceError::NoVotingPower)));
    }

    #[test]
    fn test_evaluate_passes_quorum_and_threshold() {
        let mut voting = open_window();
        TallyEngine::cast(&mut voting, voter(1), VoteChoice::Approve, VotePower::from_raw(70), 1_100)
            .unwrap();
        TallyEngine::cast(&mut voting, voter(2), VoteChoice::Reject, VotePower::from_raw(30), 1_200)
            .unwrap();

        // 100 cast >= quorum 100; 70% approval >= 60%.
        assert!(TallyEngine::evaluate(&voting, &rule(60, 100)).passed());
    }

    #[test]
    fn test_evaluate_fails_quorum_regardless_of_ratio() {
        let mut voting = open_window();
        TallyEngine::cast(&mut voting, voter(1), VoteChoice::Approve, VotePower::from_raw(40), 1_100)
            .unwrap();

        let outcome = TallyEngine::evaluate(&voting, &rule(60, 100));
        assert!(matches!(outcome, TallyOutcome::QuorumNotMet { .. }));
    }

    #[test]
    fn test_evaluate_threshold_boundary_is_inclusive() {
        let mut voting = open_window();
        TallyEngine::cast(&mut voting, voter(1), VoteChoice::Approve, VotePower::from_raw(60), 1_100)
            .unwrap();
        TallyEngine::cast(&mut voting, voter(2), VoteChoice::Reject, VotePower::from_raw(40), 1_200)
            .unwrap();

        // Exactly 60-of-100 against threshold 60 passes.
        assert!(TallyEngine::evaluate(&voting, &rule(60, 100)).passed());

        // One unit short fails.
        let mut short = open_window();
        TallyEngine::cast(&mut short, voter(1), VoteChoice::Approve, VotePower::from_raw(59), 1_100)
            .unwrap();
        TallyEngine::cast(&mut short, voter(2), VoteChoice::Reject, VotePower::from_raw(41), 1_200)
            .unwrap();
        assert!(matches!(
            TallyEngine::evaluate(&short, &rule(60, 100)),
            TallyOutcome::ThresholdNotMet { .. }
        ));
    }

    #[test]
    fn test_evaluate_large_powers_do_not_overflow() {
        let mut voting = open_window();
        let big = VotePower::from_raw(u128::MAX / 200);
        TallyEngine::cast(&mut voting, voter(1), VoteChoice::Approve, big, 1_100).unwrap();

        assert!(TallyEngine::evaluate(&voting, &rule(100, 1)).passed());
    }
}
