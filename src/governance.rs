//! Tier-weighted milestone voting
//!
//! Votes are weighted by the governance weight frozen in the presale
//! snapshot. Weight and tier are always read from the snapshot, never from
//! the caller, so a vote record cannot carry forged power into a tally.
//!
//! # Milestone lifecycle
//!
//! ```text
//! Open ──close()──▶ Tallied(Approved | Rejected)
//! ```
//!
//! A tally is recomputed from the full vote list every time. There is no
//! running counter to drift.

use crate::snapshot::TierSnapshot;
use crate::types::{Bps, TierLabel, Timestamp, BPS_DENOMINATOR, DEFAULT_APPROVAL_THRESHOLD_BPS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

const MS_PER_DAY: Timestamp = 24 * 60 * 60 * 1000;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("wallet {wallet} is not in the tier snapshot")]
    NotInSnapshot { wallet: String },
    #[error("wallet {wallet} has no voting power (tier NONE)")]
    NoVotingPower { wallet: String },
    #[error("vote is for presale {got}, snapshot is {expected}")]
    PresaleMismatch { expected: String, got: String },
    #[error("vote is for milestone {got}, expected {expected}")]
    MilestoneMismatch { expected: String, got: String },
    #[error("wallet {wallet} already voted on this milestone")]
    AlreadyVoted { wallet: String },
    #[error("voting on milestone {milestone_id} is closed")]
    VotingClosed { milestone_id: String },
    #[error("approval threshold {0} bps outside (0, 10000]")]
    InvalidThreshold(Bps),
    #[error("vote serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneVote {
    pub milestone_id: String,
    pub presale_id: String,
    pub wallet: String,
    pub tier: TierLabel,
    pub vote_weight: u32,
    pub vote: VoteChoice,
    pub timestamp: Timestamp,
}

/// Weighted approval required, in bps of total cast weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalThreshold(Bps);

impl ApprovalThreshold {
    pub fn from_bps(bps: Bps) -> Result<Self, VoteError> {
        if bps == 0 || bps > BPS_DENOMINATOR {
            return Err(VoteError::InvalidThreshold(bps));
        }
        Ok(Self(bps))
    }

    pub fn bps(&self) -> Bps {
        self.0
    }

    /// `approve / total ≥ threshold`, in integers. Zero total never passes.
    pub fn is_met(&self, approve_weight: u64, total_weight: u64) -> bool {
        if total_weight == 0 {
            return false;
        }
        approve_weight as u128 * BPS_DENOMINATOR as u128 >= self.0 as u128 * total_weight as u128
    }
}

impl Default for ApprovalThreshold {
    fn default() -> Self {
        Self(DEFAULT_APPROVAL_THRESHOLD_BPS)
    }
}

/// Build a vote record for `wallet`, with tier and weight taken from the snapshot.
pub fn cast_milestone_vote(
    wallet: &str,
    milestone_id: &str,
    presale_id: &str,
    choice: VoteChoice,
    snapshot: &TierSnapshot,
    timestamp: Timestamp,
) -> Result<MilestoneVote, VoteError> {
    if presale_id != snapshot.presale_id {
        return Err(VoteError::PresaleMismatch {
            expected: snapshot.presale_id.clone(),
            got: presale_id.to_string(),
        });
    }

    let participant = snapshot
        .participant(wallet)
        .ok_or_else(|| VoteError::NotInSnapshot { wallet: wallet.to_string() })?;

    if !participant.tier.is_eligible() || participant.governance_weight == 0 {
        return Err(VoteError::NoVotingPower { wallet: wallet.to_string() });
    }

    debug!(
        "Vote {:?} on {} by {} ({}, weight {})",
        choice, milestone_id, participant.wallet, participant.tier, participant.governance_weight
    );

    Ok(MilestoneVote {
        milestone_id: milestone_id.to_string(),
        presale_id: presale_id.to_string(),
        wallet: participant.wallet.clone(),
        tier: participant.tier,
        vote_weight: participant.governance_weight,
        vote: choice,
        timestamp,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierVoteCounts {
    pub approve: u64,
    pub reject: u64,
    pub weight: u64,
}

/// Approve/reject counts (not weights) per tier, plus the weight cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteBreakdown {
    pub gold: TierVoteCounts,
    pub silver: TierVoteCounts,
    pub bronze: TierVoteCounts,
}

impl VoteBreakdown {
    pub fn get(&self, tier: TierLabel) -> Option<&TierVoteCounts> {
        match tier {
            TierLabel::Gold => Some(&self.gold),
            TierLabel::Silver => Some(&self.silver),
            TierLabel::Bronze => Some(&self.bronze),
            TierLabel::None => None,
        }
    }

    fn get_mut(&mut self, tier: TierLabel) -> Option<&mut TierVoteCounts> {
        match tier {
            TierLabel::Gold => Some(&mut self.gold),
            TierLabel::Silver => Some(&mut self.silver),
            TierLabel::Bronze => Some(&mut self.bronze),
            TierLabel::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilestoneOutcome {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MilestoneStatus {
    #[default]
    Open,
    Tallied(MilestoneOutcome),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneVoteTally {
    pub milestone_id: String,
    /// Votes counted (after dropping ignored ones).
    pub total_votes: usize,
    pub approve_votes: usize,
    pub reject_votes: usize,
    pub approve_weight: u64,
    pub reject_weight: u64,
    /// Counted votes as a percentage of eligible snapshot participants.
    pub participation_rate: f64,
    /// Weighted approval, 0–100.
    pub approval_percentage: f64,
    pub is_approved: bool,
    /// Votes for another milestone/presale or from wallets without power.
    pub ignored_votes: usize,
    pub breakdown: VoteBreakdown,
    pub status: MilestoneStatus,
}

impl MilestoneVoteTally {
    pub fn total_weight(&self) -> u64 {
        self.approve_weight + self.reject_weight
    }
}

/// Weighted tally of `votes` against `snapshot`.
///
/// Each vote's tier and weight are re-read from the snapshot. Duplicate
/// votes from one wallet are not merged; the vote list is expected to be
/// de-duplicated by the caller's storage layer.
pub fn tally_milestone_votes(
    milestone_id: &str,
    votes: &[MilestoneVote],
    snapshot: &TierSnapshot,
    threshold: ApprovalThreshold,
) -> MilestoneVoteTally {
    let mut breakdown = VoteBreakdown::default();
    let mut approve_weight: u64 = 0;
    let mut reject_weight: u64 = 0;
    let mut approve_votes = 0usize;
    let mut reject_votes = 0usize;
    let mut ignored_votes = 0usize;

    for vote in votes {
        if vote.milestone_id != milestone_id || vote.presale_id != snapshot.presale_id {
            ignored_votes += 1;
            continue;
        }
        let Some(participant) = snapshot.participant(&vote.wallet) else {
            warn!("Ignoring vote from {}: not in snapshot", vote.wallet);
            ignored_votes += 1;
            continue;
        };
        let weight = participant.governance_weight as u64;
        let Some(counts) = breakdown.get_mut(participant.tier).filter(|_| weight > 0) else {
            warn!("Ignoring vote from {}: no voting power", vote.wallet);
            ignored_votes += 1;
            continue;
        };
        if vote.tier != participant.tier || vote.vote_weight != participant.governance_weight {
            warn!(
                "Vote from {} claims {}/{}, snapshot says {}/{}",
                vote.wallet, vote.tier, vote.vote_weight, participant.tier, weight
            );
        }

        counts.weight += weight;
        match vote.vote {
            VoteChoice::Approve => {
                counts.approve += 1;
                approve_votes += 1;
                approve_weight += weight;
            }
            VoteChoice::Reject => {
                counts.reject += 1;
                reject_votes += 1;
                reject_weight += weight;
            }
        }
    }

    let total_weight = approve_weight + reject_weight;
    let total_votes = approve_votes + reject_votes;
    let eligible_voters = snapshot.eligible_participants().count();

    let participation_rate = if eligible_voters > 0 {
        total_votes as f64 / eligible_voters as f64 * 100.0
    } else {
        0.0
    };
    let approval_percentage = if total_weight > 0 {
        approve_weight as f64 / total_weight as f64 * 100.0
    } else {
        0.0
    };
    let is_approved = threshold.is_met(approve_weight, total_weight);
    let outcome = if is_approved {
        MilestoneOutcome::Approved
    } else {
        MilestoneOutcome::Rejected
    };

    info!(
        "Milestone {} tallied: {:?} ({:.2}% of weight {}, threshold {} bps, {} votes, {} ignored)",
        milestone_id,
        outcome,
        approval_percentage,
        total_weight,
        threshold.bps(),
        total_votes,
        ignored_votes
    );

    MilestoneVoteTally {
        milestone_id: milestone_id.to_string(),
        total_votes,
        approve_votes,
        reject_votes,
        approve_weight,
        reject_weight,
        participation_rate,
        approval_percentage,
        is_approved,
        ignored_votes,
        breakdown,
        status: MilestoneStatus::Tallied(outcome),
    }
}

/// Case-insensitive check for an existing vote by `wallet` on `milestone_id`.
pub fn has_already_voted(wallet: &str, milestone_id: &str, existing: &[MilestoneVote]) -> bool {
    existing
        .iter()
        .any(|v| v.milestone_id == milestone_id && v.wallet.eq_ignore_ascii_case(wallet))
}

/// Inclusive voting window `[start, start + duration_days]`.
pub fn is_voting_period_active(
    voting_start: Timestamp,
    duration_days: u32,
    now: Timestamp,
) -> bool {
    let end = voting_start.saturating_add(duration_days as u64 * MS_PER_DAY);
    now >= voting_start && now <= end
}

/// One milestone's vote ledger and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub presale_id: String,
    pub voting_start: Timestamp,
    pub voting_duration_days: u32,
    votes: Vec<MilestoneVote>,
    status: MilestoneStatus,
}

impl Milestone {
    pub fn new(
        id: impl Into<String>,
        presale_id: impl Into<String>,
        voting_start: Timestamp,
        voting_duration_days: u32,
    ) -> Self {
        Self {
            id: id.into(),
            presale_id: presale_id.into(),
            voting_start,
            voting_duration_days,
            votes: Vec::new(),
            status: MilestoneStatus::Open,
        }
    }

    pub fn status(&self) -> MilestoneStatus {
        self.status
    }

    pub fn votes(&self) -> &[MilestoneVote] {
        &self.votes
    }

    pub fn is_open(&self, now: Timestamp) -> bool {
        self.status == MilestoneStatus::Open
            && is_voting_period_active(self.voting_start, self.voting_duration_days, now)
    }

    /// Record a vote. One vote per wallet; only while open.
    pub fn submit(&mut self, vote: MilestoneVote, now: Timestamp) -> Result<(), VoteError> {
        if !self.is_open(now) {
            return Err(VoteError::VotingClosed { milestone_id: self.id.clone() });
        }
        if vote.milestone_id != self.id {
            return Err(VoteError::MilestoneMismatch {
                expected: self.id.clone(),
                got: vote.milestone_id,
            });
        }
        if vote.presale_id != self.presale_id {
            return Err(VoteError::PresaleMismatch {
                expected: self.presale_id.clone(),
                got: vote.presale_id,
            });
        }
        if has_already_voted(&vote.wallet, &self.id, &self.votes) {
            return Err(VoteError::AlreadyVoted { wallet: vote.wallet });
        }
        self.votes.push(vote);
        Ok(())
    }

    /// Tally the stored votes without changing status.
    pub fn tally(
        &self,
        snapshot: &TierSnapshot,
        threshold: ApprovalThreshold,
    ) -> MilestoneVoteTally {
        tally_milestone_votes(&self.id, &self.votes, snapshot, threshold)
    }

    /// Stop accepting votes and record the outcome. Calling again re-derives
    /// the same tally from the same votes.
    pub fn close(
        &mut self,
        snapshot: &TierSnapshot,
        threshold: ApprovalThreshold,
    ) -> MilestoneVoteTally {
        let tally = self.tally(snapshot, threshold);
        self.status = tally.status;
        tally
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierPower {
    pub count: u64,
    pub weight: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VotingPowerDistribution {
    pub total: u64,
    pub gold: TierPower,
    pub silver: TierPower,
    pub bronze: TierPower,
}

/// Share of total voting power held by each tier, from frozen snapshot weights.
pub fn voting_power_distribution(snapshot: &TierSnapshot) -> VotingPowerDistribution {
    let power = |tier: TierLabel| {
        snapshot
            .participants
            .iter()
            .filter(|p| p.tier == tier)
            .fold((0u64, 0u64), |(count, weight), p| {
                (count + 1, weight + p.governance_weight as u64)
            })
    };
    let gold = power(TierLabel::Gold);
    let silver = power(TierLabel::Silver);
    let bronze = power(TierLabel::Bronze);
    let total = gold.1 + silver.1 + bronze.1;
    let share = |(count, weight): (u64, u64)| TierPower {
        count,
        weight,
        percentage: if total > 0 { weight as f64 / total as f64 * 100.0 } else { 0.0 },
    };

    VotingPowerDistribution {
        total,
        gold: share(gold),
        silver: share(silver),
        bronze: share(bronze),
    }
}

pub fn export_votes(votes: &[MilestoneVote]) -> Result<String, VoteError> {
    Ok(serde_json::to_string_pretty(votes)?)
}

pub fn import_votes(json: &str) -> Result<Vec<MilestoneVote>, VoteError> {
    Ok(serde_json::from_str(json)?)
}
