//! Tier classification and per-tier lookups

use crate::config::TierConfig;
use crate::types::{Bps, TierLabel, TokenAmount};

/// Highest tier whose threshold is ≤ `staked_amount`, else NONE.
///
/// Thresholds are checked from the top down so the result is unique even
/// if a caller skips `TierConfig::validate`.
pub fn classify(staked_amount: TokenAmount, config: &TierConfig) -> TierLabel {
    if staked_amount >= config.gold.threshold {
        TierLabel::Gold
    } else if staked_amount >= config.silver.threshold {
        TierLabel::Silver
    } else if staked_amount >= config.bronze.threshold {
        TierLabel::Bronze
    } else {
        TierLabel::None
    }
}

/// Allocation multiplier in bps. NONE → 0.
pub fn tier_multiplier(tier: TierLabel, config: &TierConfig) -> Bps {
    config.params(tier).map(|p| p.multiplier_bps).unwrap_or(0)
}

/// Governance vote weight. NONE → 0.
pub fn calculate_vote_weight(tier: TierLabel, config: &TierConfig) -> u32 {
    config.params(tier).map(|p| p.governance_weight).unwrap_or(0)
}
