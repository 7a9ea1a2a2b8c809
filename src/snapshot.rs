//! Tier snapshots: immutable, Merkle-committed stake records
//!
//! A snapshot is built once per presale at the cutoff time and is the single
//! source of truth for both allocation sizing and vote eligibility. It is
//! never mutated; a re-snapshot produces a new value with a new root.
//!
//! Determinism: the same staker list (same order) and the same config always
//! produce the same root and the same proofs. Leaf order is input order.

use crate::allocation::TierParticipant;
use crate::config::{ConfigError, EngineConfig, TierConfig};
use crate::crypto::{leaf_hash, verify_merkle_path, MerkleTree};
use crate::tier::classify;
use crate::types::{
    hex_hash, hex_hashes, Bps, Hash, TierCounts, TierLabel, Timestamp, TokenAmount,
    LEAF_FIELD_SEPARATOR, MAX_TOKEN_AMOUNT,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("staker #{index} has an empty wallet")]
    EmptyWallet { index: usize },
    #[error("staker #{index} wallet contains reserved separator '|'")]
    InvalidWallet { index: usize },
    #[error("wallet {wallet} appears more than once")]
    DuplicateWallet { wallet: String },
    #[error("stake {amount} of {wallet} exceeds maximum")]
    StakeTooLarge { wallet: String, amount: TokenAmount },
    #[error("{count} stakers exceeds limit of {limit}")]
    TooManyParticipants { count: usize, limit: usize },
    #[error("lock expiry overflows for {wallet}")]
    TimestampOverflow { wallet: String },
    #[error("snapshot root does not match its participants")]
    IntegrityMismatch,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("snapshot serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One row of the staking ledger.
///
/// A wallet with no ledger entry is a stake of zero; callers pass it with
/// `staked_amount: 0` (classified NONE) rather than inventing data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRecord {
    pub wallet: String,
    pub staked_amount: TokenAmount,
    pub stake_timestamp: Timestamp,
}

impl StakeRecord {
    pub fn new(
        wallet: impl Into<String>,
        staked_amount: TokenAmount,
        stake_timestamp: Timestamp,
    ) -> Self {
        Self { wallet: wallet.into(), staked_amount, stake_timestamp }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierParticipantSnapshot {
    pub wallet: String,
    pub staked_amount: TokenAmount,
    pub tier: TierLabel,
    /// Frozen at snapshot time.
    pub allocation_multiplier_bps: Bps,
    /// Frozen at snapshot time.
    pub governance_weight: u32,
    pub stake_timestamp: Timestamp,
    pub lock_expiry_timestamp: Timestamp,
    /// Sibling hashes, leaf to root.
    #[serde(with = "hex_hashes")]
    pub snapshot_proof: Vec<Hash>,
}

impl TierParticipantSnapshot {
    pub fn leaf(&self) -> Hash {
        leaf_hash(&self.wallet, self.staked_amount, self.tier, self.stake_timestamp)
    }

    pub fn is_locked(&self, now: Timestamp) -> bool {
        now < self.lock_expiry_timestamp
    }

    pub fn to_allocation_request(&self) -> TierParticipant {
        TierParticipant {
            wallet: self.wallet.clone(),
            staked_amount: self.staked_amount,
            tier: self.tier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSnapshot {
    pub presale_id: String,
    pub snapshot_timestamp: Timestamp,
    #[serde(with = "hex_hash")]
    pub merkle_root: Hash,
    pub total_participants: usize,
    pub tier_breakdown: TierCounts,
    pub participants: Vec<TierParticipantSnapshot>,
}

impl TierSnapshot {
    /// Case-insensitive wallet lookup.
    pub fn participant(&self, wallet: &str) -> Option<&TierParticipantSnapshot> {
        self.participants.iter().find(|p| p.wallet.eq_ignore_ascii_case(wallet))
    }

    /// Participants with a tier above NONE.
    pub fn eligible_participants(&self) -> impl Iterator<Item = &TierParticipantSnapshot> {
        self.participants.iter().filter(|p| p.tier.is_eligible())
    }

    /// Allocation requests derived from the snapshot; NONE participants are skipped.
    pub fn allocation_requests(&self) -> Vec<TierParticipant> {
        self.eligible_participants().map(|p| p.to_allocation_request()).collect()
    }

    pub fn root_hex(&self) -> String {
        hex::encode(self.merkle_root)
    }

    /// Recompute the root, the counts and every stored proof from the participants.
    pub fn verify_integrity(&self) -> bool {
        if self.total_participants != self.participants.len() {
            return false;
        }
        let leaves: Vec<Hash> = self.participants.iter().map(|p| p.leaf()).collect();
        let tree = MerkleTree::build(leaves.clone());
        if tree.root() != self.merkle_root {
            return false;
        }
        let mut breakdown = TierCounts::default();
        for p in &self.participants {
            breakdown.increment(p.tier);
        }
        if breakdown != self.tier_breakdown {
            return false;
        }
        self.participants
            .iter()
            .zip(&leaves)
            .all(|(p, leaf)| verify_merkle_path(leaf, &p.snapshot_proof, &self.merkle_root))
    }
}

/// Build a snapshot of all stakers for a presale.
///
/// The whole batch is validated before anything is hashed; one bad record
/// fails the call.
pub fn create_snapshot(
    presale_id: &str,
    stakers: &[StakeRecord],
    snapshot_timestamp: Timestamp,
    config: &EngineConfig,
) -> Result<TierSnapshot, SnapshotError> {
    config.validate()?;
    validate_stakers(stakers, config.max_participants)?;

    let mut participants = Vec::with_capacity(stakers.len());
    let mut tier_breakdown = TierCounts::default();

    for staker in stakers {
        let participant = classify_staker(staker, &config.tiers, config.stake_lock_period_ms)?;
        tier_breakdown.increment(participant.tier);
        participants.push(participant);
    }

    let leaves: Vec<Hash> = participants.iter().map(|p| p.leaf()).collect();
    let tree = MerkleTree::build(leaves);
    for (i, participant) in participants.iter_mut().enumerate() {
        // Index is always in range: one leaf per participant
        participant.snapshot_proof = tree.proof(i).unwrap_or_default();
    }

    let snapshot = TierSnapshot {
        presale_id: presale_id.to_string(),
        snapshot_timestamp,
        merkle_root: tree.root(),
        total_participants: participants.len(),
        tier_breakdown,
        participants,
    };

    debug!(
        "Snapshot {} built: {} participants (gold={} silver={} bronze={}), root={}",
        presale_id,
        snapshot.total_participants,
        tier_breakdown.gold,
        tier_breakdown.silver,
        tier_breakdown.bronze,
        snapshot.root_hex()
    );

    Ok(snapshot)
}

fn validate_stakers(stakers: &[StakeRecord], limit: usize) -> Result<(), SnapshotError> {
    if stakers.len() > limit {
        return Err(SnapshotError::TooManyParticipants { count: stakers.len(), limit });
    }

    let mut seen = HashSet::with_capacity(stakers.len());
    for (index, staker) in stakers.iter().enumerate() {
        if staker.wallet.trim().is_empty() {
            return Err(SnapshotError::EmptyWallet { index });
        }
        if staker.wallet.contains(LEAF_FIELD_SEPARATOR) {
            return Err(SnapshotError::InvalidWallet { index });
        }
        if staker.staked_amount > MAX_TOKEN_AMOUNT {
            return Err(SnapshotError::StakeTooLarge {
                wallet: staker.wallet.clone(),
                amount: staker.staked_amount,
            });
        }
        if !seen.insert(staker.wallet.to_ascii_lowercase()) {
            return Err(SnapshotError::DuplicateWallet { wallet: staker.wallet.clone() });
        }
    }
    Ok(())
}

fn classify_staker(
    staker: &StakeRecord,
    tiers: &TierConfig,
    lock_period_ms: Timestamp,
) -> Result<TierParticipantSnapshot, SnapshotError> {
    let tier = classify(staker.staked_amount, tiers);
    let (allocation_multiplier_bps, governance_weight) = tiers
        .params(tier)
        .map(|p| (p.multiplier_bps, p.governance_weight))
        .unwrap_or((0, 0));
    let lock_expiry_timestamp = staker
        .stake_timestamp
        .checked_add(lock_period_ms)
        .ok_or_else(|| SnapshotError::TimestampOverflow { wallet: staker.wallet.clone() })?;

    Ok(TierParticipantSnapshot {
        wallet: staker.wallet.clone(),
        staked_amount: staker.staked_amount,
        tier,
        allocation_multiplier_bps,
        governance_weight,
        stake_timestamp: staker.stake_timestamp,
        lock_expiry_timestamp,
        snapshot_proof: Vec::new(),
    })
}

/// Check that `(wallet, staked_amount, tier, stake_timestamp)` is committed
/// under `expected_root`. Any changed field yields `false`.
pub fn verify_tier_proof(
    wallet: &str,
    staked_amount: TokenAmount,
    tier: TierLabel,
    stake_timestamp: Timestamp,
    proof: &[Hash],
    expected_root: &Hash,
) -> bool {
    let leaf = leaf_hash(wallet, staked_amount, tier, stake_timestamp);
    verify_merkle_path(&leaf, proof, expected_root)
}

/// Lock state of a participant at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    Active,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierEligibility {
    Eligible { lock: LockStatus },
    /// Claimed record is not committed under the snapshot root.
    InvalidProof,
    /// Record is genuine but its tier is NONE.
    NoTier,
}

impl TierEligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, TierEligibility::Eligible { .. })
    }
}

/// Validate a participant's claimed tier at contribution time.
///
/// After the lock expires the snapshot tier still stands; whether the wallet
/// kept its stake is a ledger question answered by `check_early_unstake`.
pub fn validate_tier_eligibility(
    participant: &TierParticipantSnapshot,
    snapshot: &TierSnapshot,
    now: Timestamp,
) -> TierEligibility {
    let proof_valid = verify_tier_proof(
        &participant.wallet,
        participant.staked_amount,
        participant.tier,
        participant.stake_timestamp,
        &participant.snapshot_proof,
        &snapshot.merkle_root,
    );
    if !proof_valid {
        return TierEligibility::InvalidProof;
    }
    if !participant.tier.is_eligible() {
        return TierEligibility::NoTier;
    }
    let lock = if participant.is_locked(now) {
        LockStatus::Active
    } else {
        LockStatus::Expired
    };
    TierEligibility::Eligible { lock }
}

/// True if the wallet is still inside its lock window and its current stake
/// no longer classifies to the snapshot tier.
pub fn check_early_unstake(
    participant: &TierParticipantSnapshot,
    current_staked_amount: TokenAmount,
    now: Timestamp,
    tiers: &TierConfig,
) -> bool {
    participant.is_locked(now) && classify(current_staked_amount, tiers) != participant.tier
}

pub fn export_snapshot(snapshot: &TierSnapshot) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Parse a snapshot and reject it unless its root matches its participants.
pub fn import_snapshot(json: &str) -> Result<TierSnapshot, SnapshotError> {
    let snapshot: TierSnapshot = serde_json::from_str(json)?;
    if !snapshot.verify_integrity() {
        return Err(SnapshotError::IntegrityMismatch);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EMPTY_ROOT;

    const NOW: Timestamp = 1_000_000_000_000;

    fn stakers() -> Vec<StakeRecord> {
        vec![
            StakeRecord::new("0xGold1", 175_000_000, NOW - 10_000),
            StakeRecord::new("0xSilver1", 87_500_000, NOW - 20_000),
            StakeRecord::new("0xBronze1", 17_500_000, NOW - 30_000),
            StakeRecord::new("0xNone1", 1_000, NOW - 40_000),
        ]
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = create_snapshot("p", &[], NOW, &EngineConfig::default()).unwrap();
        assert_eq!(snap.merkle_root, EMPTY_ROOT);
        assert_eq!(snap.total_participants, 0);
        assert!(snap.verify_integrity());
    }

    #[test]
    fn test_frozen_params() {
        let snap = create_snapshot("p", &stakers(), NOW, &EngineConfig::default()).unwrap();
        let gold = snap.participant("0xgold1").unwrap();
        assert_eq!(gold.allocation_multiplier_bps, 50_000);
        assert_eq!(gold.governance_weight, 3);
        let none = snap.participant("0xNone1").unwrap();
        assert_eq!(none.tier, TierLabel::None);
        assert_eq!(none.governance_weight, 0);
    }

    #[test]
    fn test_rejects_duplicate_wallet_case_insensitive() {
        let mut list = stakers();
        list.push(StakeRecord::new("0XGOLD1", 1, NOW));
        let err = create_snapshot("p", &list, NOW, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, SnapshotError::DuplicateWallet { .. }));
    }

    #[test]
    fn test_rejects_bad_wallets() {
        let cfg = EngineConfig::default();
        let empty = vec![StakeRecord::new("  ", 1, NOW)];
        assert!(matches!(
            create_snapshot("p", &empty, NOW, &cfg),
            Err(SnapshotError::EmptyWallet { index: 0 })
        ));
        let sep = vec![StakeRecord::new("a|b", 1, NOW)];
        assert!(matches!(
            create_snapshot("p", &sep, NOW, &cfg),
            Err(SnapshotError::InvalidWallet { index: 0 })
        ));
    }

    #[test]
    fn test_participant_limit() {
        let cfg = EngineConfig { max_participants: 2, ..EngineConfig::default() };
        let err = create_snapshot("p", &stakers(), NOW, &cfg).unwrap_err();
        assert!(matches!(err, SnapshotError::TooManyParticipants { count: 4, limit: 2 }));
    }

    #[test]
    fn test_rejects_oversized_stake() {
        let mut list = stakers();
        list.push(StakeRecord::new("0xWhale", MAX_TOKEN_AMOUNT + 1, NOW));
        let err = create_snapshot("p", &list, NOW, &EngineConfig::default()).unwrap_err();
        match err {
            SnapshotError::StakeTooLarge { wallet, amount } => {
                assert_eq!(wallet, "0xWhale");
                assert_eq!(amount, MAX_TOKEN_AMOUNT + 1);
            }
            other => panic!("unexpected error: {}", other),
        }

        let mut at_limit = stakers();
        at_limit.push(StakeRecord::new("0xWhale", MAX_TOKEN_AMOUNT, NOW));
        let snap = create_snapshot("p", &at_limit, NOW, &EngineConfig::default()).unwrap();
        assert_eq!(snap.participant("0xWhale").unwrap().tier, TierLabel::Gold);
    }

    #[test]
    fn test_timestamp_overflow() {
        let list = vec![StakeRecord::new("w", 1, u64::MAX)];
        let err = create_snapshot("p", &list, NOW, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, SnapshotError::TimestampOverflow { .. }));
    }

    #[test]
    fn test_integrity_detects_tamper() {
        let mut snap = create_snapshot("p", &stakers(), NOW, &EngineConfig::default()).unwrap();
        assert!(snap.verify_integrity());
        snap.participants[1].staked_amount += 1;
        assert!(!snap.verify_integrity());
    }
}
