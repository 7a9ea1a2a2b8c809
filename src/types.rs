// Tier Engine: core types and constants
// Distributed under the MIT software license.

//! Shared value types for snapshots, allocation and governance.
//!
//! # Units
//!
//! | Quantity          | Type          | Unit                           |
//! |-------------------|---------------|--------------------------------|
//! | Stake, pool, cap  | `TokenAmount` | integer token minor units      |
//! | Ratios            | `Bps`         | basis points, 10_000 = 1.0     |
//! | Time              | `Timestamp`   | milliseconds since Unix epoch  |
//!
//! All arithmetic is integer. Every multiply-then-divide rounds down, so a
//! scaled distribution can never exceed the pool it was scaled against.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Hash = [u8; 32];
pub type TokenAmount = u128;
pub type Bps = u32;
pub type Timestamp = u64;

// =============================================================================
// LIMITS
// =============================================================================

/// One whole unit in basis points.
pub const BPS_DENOMINATOR: Bps = 10_000;

/// Largest single amount (stake, pool, base unit) accepted at a call boundary.
/// 10^18 × 100x multiplier × 10^18 pool stays below u128::MAX, so the
/// floor mul-div in the scaler cannot overflow for validated inputs.
pub const MAX_TOKEN_AMOUNT: TokenAmount = 1_000_000_000_000_000_000;

/// Largest allocation multiplier (100x).
pub const MAX_MULTIPLIER_BPS: Bps = 1_000_000;

/// Participants accepted per snapshot or allocation run.
/// Keeps the O(n log n) Merkle build within interactive latency.
pub const MAX_PARTICIPANTS: usize = 100_000;

/// Six 30-day months.
pub const STAKE_LOCK_PERIOD_MS: Timestamp = 6 * 30 * 24 * 60 * 60 * 1000;

/// Default weighted approval required for a milestone (66%).
pub const DEFAULT_APPROVAL_THRESHOLD_BPS: Bps = 6_600;

/// Separator used in the canonical leaf pre-image. Wallets may not contain it.
pub const LEAF_FIELD_SEPARATOR: char = '|';

// =============================================================================
// TIER LABEL
// =============================================================================

/// Staking tier. Ordered NONE < BRONZE < SILVER < GOLD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TierLabel {
    #[default]
    None,
    Bronze,
    Silver,
    Gold,
}

impl TierLabel {
    /// Allocation processing order: top tier first.
    pub const ROLLDOWN_ORDER: [TierLabel; 3] =
        [TierLabel::Gold, TierLabel::Silver, TierLabel::Bronze];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierLabel::None => "NONE",
            TierLabel::Bronze => "BRONZE",
            TierLabel::Silver => "SILVER",
            TierLabel::Gold => "GOLD",
        }
    }

    pub fn is_eligible(&self) -> bool {
        *self != TierLabel::None
    }
}

impl fmt::Display for TierLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier label: {0}")]
pub struct ParseTierError(pub String);

impl FromStr for TierLabel {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(TierLabel::None),
            "BRONZE" => Ok(TierLabel::Bronze),
            "SILVER" => Ok(TierLabel::Silver),
            "GOLD" => Ok(TierLabel::Gold),
            _ => Err(ParseTierError(s.to_string())),
        }
    }
}

/// Per-tier counter triple. NONE is never counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierCounts {
    pub gold: u64,
    pub silver: u64,
    pub bronze: u64,
}

impl TierCounts {
    pub fn get(&self, tier: TierLabel) -> u64 {
        match tier {
            TierLabel::Gold => self.gold,
            TierLabel::Silver => self.silver,
            TierLabel::Bronze => self.bronze,
            TierLabel::None => 0,
        }
    }

    pub fn increment(&mut self, tier: TierLabel) {
        match tier {
            TierLabel::Gold => self.gold += 1,
            TierLabel::Silver => self.silver += 1,
            TierLabel::Bronze => self.bronze += 1,
            TierLabel::None => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.gold + self.silver + self.bronze
    }
}

// =============================================================================
// INTEGER MATH
// =============================================================================

/// floor(a × b / d). `None` on overflow or zero divisor.
#[inline]
pub fn mul_div_floor(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    a.checked_mul(b).map(|p| p / d)
}

/// floor(amount × bps / 10_000).
#[inline]
pub fn apply_bps(amount: TokenAmount, bps: Bps) -> Option<TokenAmount> {
    mul_div_floor(amount, bps as u128, BPS_DENOMINATOR as u128)
}

/// Exact rational scaling factor in [0, 1]. Zero only when an empty
/// pool meets nonzero demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingFactor {
    pub numerator: TokenAmount,
    pub denominator: TokenAmount,
}

impl ScalingFactor {
    pub const ONE: ScalingFactor = ScalingFactor { numerator: 1, denominator: 1 };

    /// `pool / demand` when oversubscribed, otherwise one.
    pub fn for_pool(pool: TokenAmount, demand: TokenAmount) -> Self {
        if demand == 0 || demand <= pool {
            Self::ONE
        } else {
            Self { numerator: pool, denominator: demand }
        }
    }

    pub fn is_one(&self) -> bool {
        self.numerator == self.denominator
    }

    pub fn apply(&self, amount: TokenAmount) -> Option<TokenAmount> {
        if self.is_one() {
            return Some(amount);
        }
        mul_div_floor(amount, self.numerator, self.denominator)
    }

    pub fn as_f64(&self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        self.numerator as f64 / self.denominator as f64
    }
}

impl Default for ScalingFactor {
    fn default() -> Self {
        Self::ONE
    }
}

// =============================================================================
// HEX SERDE
// =============================================================================

/// Serialize a `Hash` as a lowercase hex string.
pub mod hex_hash {
    use super::Hash;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(&s, &mut out).map_err(de::Error::custom)?;
        Ok(out)
    }
}

/// Serialize a list of hashes (a Merkle path) as hex strings.
pub mod hex_hashes {
    use super::Hash;
    use serde::{Deserialize, Deserializer, Serializer, de, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(hashes: &[Hash], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(hashes.len()))?;
        for h in hashes {
            seq.serialize_element(&hex::encode(h))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Hash>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .iter()
            .map(|s| {
                let mut out = [0u8; 32];
                hex::decode_to_slice(s, &mut out).map_err(de::Error::custom)?;
                Ok(out)
            })
            .collect()
    }
}
