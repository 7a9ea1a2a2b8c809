//! Tier and engine configuration
//!
//! Configuration is an immutable value handed to every entry point.
//! Two presales with different tier tables can be processed side by side.

use crate::types::{
    Bps, TierLabel, Timestamp, TokenAmount, BPS_DENOMINATOR, DEFAULT_APPROVAL_THRESHOLD_BPS,
    MAX_MULTIPLIER_BPS, MAX_PARTICIPANTS, MAX_TOKEN_AMOUNT, STAKE_LOCK_PERIOD_MS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must strictly increase with tier: {lower} (lower tier) >= {upper} (higher tier)")]
    NonIncreasing {
        field: &'static str,
        lower: u128,
        upper: u128,
    },
    #[error("{field} of {tier} must be greater than zero")]
    ZeroValue { field: &'static str, tier: TierLabel },
    #[error("multiplier of {tier} is {bps} bps, maximum is 1000000")]
    MultiplierTooLarge { tier: TierLabel, bps: Bps },
    #[error("tier pool split sums to {sum_bps} bps, expected 10000")]
    InvalidPoolSplit { sum_bps: u64 },
    #[error("{field} is {value}, maximum is 10^18")]
    AmountTooLarge { field: &'static str, value: TokenAmount },
    #[error("approval threshold {0} bps outside (0, 10000]")]
    InvalidThreshold(Bps),
    #[error("max_participants must be between 1 and 100000, got {0}")]
    InvalidParticipantLimit(usize),
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parameters for one non-NONE tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierParams {
    /// Minimum stake to qualify.
    pub threshold: TokenAmount,
    /// Allocation multiplier relative to the bronze base unit.
    pub multiplier_bps: Bps,
    /// Governance vote weight.
    pub governance_weight: u32,
    /// Default share of the sale pool.
    pub pool_share_bps: Bps,
    /// Display only.
    #[serde(default)]
    pub benefits: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub bronze: TierParams,
    pub silver: TierParams,
    pub gold: TierParams,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            bronze: TierParams {
                threshold: 17_500_000,
                multiplier_bps: 10_000,
                governance_weight: 1,
                pool_share_bps: 5_000,
                benefits: vec![
                    "Allocated based on availability".into(),
                    "Basic project access".into(),
                ],
            },
            silver: TierParams {
                threshold: 87_500_000,
                multiplier_bps: 25_000,
                governance_weight: 2,
                pool_share_bps: 3_000,
                benefits: vec![
                    "Top-tier allocation".into(),
                    "Priority access".into(),
                    "Community voting rights".into(),
                ],
            },
            gold: TierParams {
                threshold: 175_000_000,
                multiplier_bps: 50_000,
                governance_weight: 3,
                pool_share_bps: 2_000,
                benefits: vec![
                    "Guaranteed allocation".into(),
                    "Priority access".into(),
                    "Early project voting".into(),
                    "Reduced fees".into(),
                ],
            },
        }
    }
}

impl TierConfig {
    pub fn params(&self, tier: TierLabel) -> Option<&TierParams> {
        match tier {
            TierLabel::Gold => Some(&self.gold),
            TierLabel::Silver => Some(&self.silver),
            TierLabel::Bronze => Some(&self.bronze),
            TierLabel::None => None,
        }
    }

    /// Default pool split taken from the per-tier `pool_share_bps`.
    pub fn default_split(&self) -> TierPoolSplit {
        TierPoolSplit {
            bronze: self.bronze.pool_share_bps,
            silver: self.silver.pool_share_bps,
            gold: self.gold.pool_share_bps,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tiers = [
            (TierLabel::Bronze, &self.bronze),
            (TierLabel::Silver, &self.silver),
            (TierLabel::Gold, &self.gold),
        ];

        for (tier, p) in tiers {
            if p.threshold == 0 {
                return Err(ConfigError::ZeroValue { field: "threshold", tier });
            }
            if p.multiplier_bps == 0 {
                return Err(ConfigError::ZeroValue { field: "multiplier_bps", tier });
            }
            if p.governance_weight == 0 {
                return Err(ConfigError::ZeroValue { field: "governance_weight", tier });
            }
            if p.multiplier_bps > MAX_MULTIPLIER_BPS {
                return Err(ConfigError::MultiplierTooLarge { tier, bps: p.multiplier_bps });
            }
            if p.threshold > MAX_TOKEN_AMOUNT {
                return Err(ConfigError::AmountTooLarge { field: "threshold", value: p.threshold });
            }
        }

        for pair in tiers.windows(2) {
            let (lower, upper) = (pair[0].1, pair[1].1);
            strictly_increasing("threshold", lower.threshold, upper.threshold)?;
            strictly_increasing(
                "multiplier_bps",
                lower.multiplier_bps as u128,
                upper.multiplier_bps as u128,
            )?;
            strictly_increasing(
                "governance_weight",
                lower.governance_weight as u128,
                upper.governance_weight as u128,
            )?;
        }

        self.default_split().validate()
    }
}

fn strictly_increasing(field: &'static str, lower: u128, upper: u128) -> Result<(), ConfigError> {
    if lower >= upper {
        return Err(ConfigError::NonIncreasing { field, lower, upper });
    }
    Ok(())
}

/// Fractions of the sale pool per tier, in bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPoolSplit {
    pub bronze: Bps,
    pub silver: Bps,
    pub gold: Bps,
}

impl Default for TierPoolSplit {
    fn default() -> Self {
        Self { bronze: 5_000, silver: 3_000, gold: 2_000 }
    }
}

impl TierPoolSplit {
    pub fn share(&self, tier: TierLabel) -> Bps {
        match tier {
            TierLabel::Gold => self.gold,
            TierLabel::Silver => self.silver,
            TierLabel::Bronze => self.bronze,
            TierLabel::None => 0,
        }
    }

    pub fn sum_bps(&self) -> u64 {
        self.bronze as u64 + self.silver as u64 + self.gold as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum_bps = self.sum_bps();
        if sum_bps != BPS_DENOMINATOR as u64 {
            return Err(ConfigError::InvalidPoolSplit { sum_bps });
        }
        Ok(())
    }
}

/// What the allocator does when one wallet appears in more than one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateWalletPolicy {
    /// Later entry in GOLD → SILVER → BRONZE processing order replaces the earlier one.
    #[default]
    LastWriterWins,
    /// Fail the whole run.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresaleAllocationConfig {
    pub total_allocation_pool: TokenAmount,
    pub base_bronze_allocation_unit: TokenAmount,
    pub max_allocation_per_wallet: TokenAmount,
    #[serde(default)]
    pub tier_pool_split: Option<TierPoolSplit>,
    #[serde(default)]
    pub duplicate_policy: DuplicateWalletPolicy,
    /// Participants accepted per run; at most `MAX_PARTICIPANTS`.
    #[serde(default = "default_participant_limit")]
    pub max_participants: usize,
}

fn default_participant_limit() -> usize {
    MAX_PARTICIPANTS
}

impl PresaleAllocationConfig {
    pub fn new(
        total_allocation_pool: TokenAmount,
        base_bronze_allocation_unit: TokenAmount,
        max_allocation_per_wallet: TokenAmount,
    ) -> Self {
        Self {
            total_allocation_pool,
            base_bronze_allocation_unit,
            max_allocation_per_wallet,
            tier_pool_split: None,
            duplicate_policy: DuplicateWalletPolicy::default(),
            max_participants: MAX_PARTICIPANTS,
        }
    }

    pub fn with_split(mut self, split: TierPoolSplit) -> Self {
        self.tier_pool_split = Some(split);
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicateWalletPolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_participant_limit(mut self, limit: usize) -> Self {
        self.max_participants = limit;
        self
    }

    /// Explicit split, or the tier table's default.
    pub fn split(&self, tiers: &TierConfig) -> TierPoolSplit {
        self.tier_pool_split.unwrap_or_else(|| tiers.default_split())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("total_allocation_pool", self.total_allocation_pool),
            ("base_bronze_allocation_unit", self.base_bronze_allocation_unit),
            ("max_allocation_per_wallet", self.max_allocation_per_wallet),
        ] {
            if value > MAX_TOKEN_AMOUNT {
                return Err(ConfigError::AmountTooLarge { field, value });
            }
        }
        if self.max_participants == 0 || self.max_participants > MAX_PARTICIPANTS {
            return Err(ConfigError::InvalidParticipantLimit(self.max_participants));
        }
        if let Some(split) = &self.tier_pool_split {
            split.validate()?;
        }
        Ok(())
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tiers: TierConfig,
    pub stake_lock_period_ms: Timestamp,
    pub approval_threshold_bps: Bps,
    pub max_participants: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tiers: TierConfig::default(),
            stake_lock_period_ms: STAKE_LOCK_PERIOD_MS,
            approval_threshold_bps: DEFAULT_APPROVAL_THRESHOLD_BPS,
            max_participants: MAX_PARTICIPANTS,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tiers.validate()?;
        if self.approval_threshold_bps == 0 || self.approval_threshold_bps > BPS_DENOMINATOR {
            return Err(ConfigError::InvalidThreshold(self.approval_threshold_bps));
        }
        if self.max_participants == 0 || self.max_participants > MAX_PARTICIPANTS {
            return Err(ConfigError::InvalidParticipantLimit(self.max_participants));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert_eq!(TierConfig::default().default_split(), TierPoolSplit::default());
    }

    #[test]
    fn test_non_increasing_threshold_rejected() {
        let mut tiers = TierConfig::default();
        tiers.silver.threshold = tiers.gold.threshold;
        assert!(matches!(
            tiers.validate(),
            Err(ConfigError::NonIncreasing { field: "threshold", .. })
        ));
    }

    #[test]
    fn test_non_increasing_weight_rejected() {
        let mut tiers = TierConfig::default();
        tiers.bronze.governance_weight = 2;
        assert!(matches!(
            tiers.validate(),
            Err(ConfigError::NonIncreasing { field: "governance_weight", .. })
        ));
    }

    #[test]
    fn test_bad_split_rejected() {
        let split = TierPoolSplit { bronze: 5_000, silver: 3_000, gold: 3_000 };
        assert!(matches!(split.validate(), Err(ConfigError::InvalidPoolSplit { sum_bps: 11_000 })));

        let config = PresaleAllocationConfig::new(100_000, 2_000, 50_000).with_split(split);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "approval_threshold_bps": 5000 }"#).unwrap();
        assert_eq!(config.approval_threshold_bps, 5_000);
        assert_eq!(config.tiers, TierConfig::default());
        assert_eq!(config.stake_lock_period_ms, STAKE_LOCK_PERIOD_MS);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result = EngineConfig::from_json(r#"{ "approval_threshold_bps": 0 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidThreshold(0))));
    }
}
