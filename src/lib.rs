pub mod allocation;
pub mod config;
pub mod crypto;
pub mod governance;
pub mod snapshot;
pub mod tier;
pub mod types;

pub use allocation::{
    calculate_tier_pools, calculate_user_allocation, distribute_allocations_with_rolldown,
    distribute_with_report, requested_allocation, scale_oversubscribed_allocations,
    validate_allocation, AllocationError, AllocationOutcome, AllocationResult,
    TierAllocationReport, TierParticipant, TierPools,
};
pub use config::{
    ConfigError, DuplicateWalletPolicy, EngineConfig, PresaleAllocationConfig, TierConfig,
    TierParams, TierPoolSplit,
};
pub use crypto::{leaf_hash, merkle_root, sha3, verify_merkle_path, MerkleTree, EMPTY_ROOT};
pub use governance::{
    cast_milestone_vote, export_votes, has_already_voted, import_votes, is_voting_period_active,
    tally_milestone_votes, voting_power_distribution, ApprovalThreshold, Milestone,
    MilestoneOutcome, MilestoneStatus, MilestoneVote, MilestoneVoteTally, TierVoteCounts,
    VoteBreakdown, VoteChoice, VoteError, VotingPowerDistribution,
};
pub use snapshot::{
    check_early_unstake, create_snapshot, export_snapshot, import_snapshot,
    validate_tier_eligibility, verify_tier_proof, LockStatus, SnapshotError, StakeRecord,
    TierEligibility, TierParticipantSnapshot, TierSnapshot,
};
pub use tier::{calculate_vote_weight, classify, tier_multiplier};
pub use types::*;
