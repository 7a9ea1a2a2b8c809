//! Tier pool allocation with oversubscription scaling and rolldown
//!
//! # Algorithm
//!
//! ```text
//! pools      = split(total_pool)                 BRONZE / SILVER / GOLD
//! for tier in GOLD → SILVER → BRONZE:
//!     pool    = configured[tier] + carried
//!     demand  = Σ base_unit × multiplier[tier]
//!     factor  = pool / demand   if demand > pool, else 1
//!     final   = min(floor(request × factor), max_per_wallet)
//!     carried = pool − demand   if demand < pool, else 0
//! ```
//!
//! Requests inside a tier get an equal proportional haircut; there is no
//! ordering or lottery within a tier. The per-wallet cap is applied after
//! scaling and the shortfall it creates is not rolled down.
//!
//! All amounts are integer minor units and every division rounds down, so
//! Σ final over a tier never exceeds that tier's effective pool.

use crate::config::{
    ConfigError, DuplicateWalletPolicy, PresaleAllocationConfig, TierConfig, TierPoolSplit,
};
use crate::tier::tier_multiplier;
use crate::types::{apply_bps, mul_div_floor, ScalingFactor, TierLabel, TokenAmount};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("participant #{index} has an empty wallet")]
    EmptyWallet { index: usize },
    #[error("wallet {wallet} submitted for both {first} and {second}")]
    DuplicateWallet {
        wallet: String,
        first: TierLabel,
        second: TierLabel,
    },
    #[error("{count} participants exceeds limit of {limit}")]
    TooManyParticipants { count: usize, limit: usize },
    #[error("amount overflow while computing {context}")]
    AmountOverflow { context: &'static str },
    #[error("wallet {wallet} already has an allocation")]
    AlreadyAllocated { wallet: String },
    #[error("allocation {allocation} exceeds per-wallet cap {cap}")]
    ExceedsCap {
        allocation: TokenAmount,
        cap: TokenAmount,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Allocation request input. `tier` normally comes from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierParticipant {
    pub wallet: String,
    pub staked_amount: TokenAmount,
    pub tier: TierLabel,
}

impl TierParticipant {
    pub fn new(wallet: impl Into<String>, staked_amount: TokenAmount, tier: TierLabel) -> Self {
        Self { wallet: wallet.into(), staked_amount, tier }
    }
}

/// Per-tier sub-pools. NONE always has zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierPools {
    pub bronze: TokenAmount,
    pub silver: TokenAmount,
    pub gold: TokenAmount,
}

impl TierPools {
    pub fn get(&self, tier: TierLabel) -> TokenAmount {
        match tier {
            TierLabel::Gold => self.gold,
            TierLabel::Silver => self.silver,
            TierLabel::Bronze => self.bronze,
            TierLabel::None => 0,
        }
    }

    pub fn total(&self) -> TokenAmount {
        self.bronze + self.silver + self.gold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub wallet: String,
    pub tier: TierLabel,
    pub base_allocation: TokenAmount,
    pub requested_allocation: TokenAmount,
    pub scaling_factor: ScalingFactor,
    pub final_allocation: TokenAmount,
    pub is_oversubscribed: bool,
}

/// Pool accounting for one tier of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAllocationReport {
    pub tier: TierLabel,
    pub configured_pool: TokenAmount,
    pub rolled_in: TokenAmount,
    pub effective_pool: TokenAmount,
    pub participants: usize,
    pub demand: TokenAmount,
    pub distributed: TokenAmount,
    pub rolled_out: TokenAmount,
    pub scaling_factor: ScalingFactor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub results: BTreeMap<String, AllocationResult>,
    /// GOLD, SILVER, BRONZE in processing order.
    pub tiers: Vec<TierAllocationReport>,
    /// Surplus left after BRONZE; nothing below it to roll into.
    pub unallocated: TokenAmount,
}

impl AllocationOutcome {
    pub fn report(&self, tier: TierLabel) -> Option<&TierAllocationReport> {
        self.tiers.iter().find(|r| r.tier == tier)
    }

    pub fn total_distributed(&self) -> TokenAmount {
        self.tiers.iter().map(|r| r.distributed).sum()
    }
}

/// Split the sale pool by `split`.
///
/// Precondition: shares sum to 10_000 bps. Not checked here;
/// `PresaleAllocationConfig::validate` checks it for full runs.
pub fn calculate_tier_pools(
    total_pool: TokenAmount,
    split: &TierPoolSplit,
) -> Result<TierPools, AllocationError> {
    let share = |bps| {
        apply_bps(total_pool, bps).ok_or(AllocationError::AmountOverflow { context: "tier pool" })
    };
    Ok(TierPools {
        bronze: share(split.bronze)?,
        silver: share(split.silver)?,
        gold: share(split.gold)?,
    })
}

/// `base_unit × multiplier(tier)`, uncapped. NONE → 0.
pub fn requested_allocation(
    tier: TierLabel,
    base_unit: TokenAmount,
    tiers: &TierConfig,
) -> Result<TokenAmount, AllocationError> {
    apply_bps(base_unit, tier_multiplier(tier, tiers))
        .ok_or(AllocationError::AmountOverflow { context: "requested allocation" })
}

/// `min(base_unit × multiplier(tier), max_cap)`. NONE → 0.
pub fn calculate_user_allocation(
    tier: TierLabel,
    base_unit: TokenAmount,
    max_cap: TokenAmount,
    tiers: &TierConfig,
) -> Result<TokenAmount, AllocationError> {
    Ok(requested_allocation(tier, base_unit, tiers)?.min(max_cap))
}

/// Shrink every request by `pool / Σ requests` when oversubscribed.
///
/// Unchanged when demand fits. Each scaled amount is floored, so the
/// returned sum is ≤ `pool_size`.
pub fn scale_oversubscribed_allocations(
    requests: &BTreeMap<String, TokenAmount>,
    pool_size: TokenAmount,
) -> Result<BTreeMap<String, TokenAmount>, AllocationError> {
    let demand = total_demand(requests)?;
    if demand <= pool_size {
        return Ok(requests.clone());
    }

    requests
        .iter()
        .map(|(wallet, &requested)| {
            mul_div_floor(requested, pool_size, demand)
                .map(|scaled| (wallet.clone(), scaled))
                .ok_or(AllocationError::AmountOverflow { context: "scaled allocation" })
        })
        .collect()
}

fn total_demand(requests: &BTreeMap<String, TokenAmount>) -> Result<TokenAmount, AllocationError> {
    requests.values().try_fold(0u128, |acc, &r| {
        acc.checked_add(r).ok_or(AllocationError::AmountOverflow { context: "tier demand" })
    })
}

/// Allocation map keyed by wallet.
///
/// A wallet submitted under more than one tier is resolved by
/// `config.duplicate_policy`; with the default the entry processed last
/// (GOLD → SILVER → BRONZE) replaces earlier ones.
pub fn distribute_allocations_with_rolldown(
    participants: &[TierParticipant],
    config: &PresaleAllocationConfig,
    tiers: &TierConfig,
) -> Result<BTreeMap<String, AllocationResult>, AllocationError> {
    distribute_with_report(participants, config, tiers).map(|outcome| outcome.results)
}

/// Same as `distribute_allocations_with_rolldown`, plus per-tier pool accounting.
pub fn distribute_with_report(
    participants: &[TierParticipant],
    config: &PresaleAllocationConfig,
    tiers: &TierConfig,
) -> Result<AllocationOutcome, AllocationError> {
    config.validate()?;
    tiers.validate()?;
    let groups = group_by_tier(participants, config.duplicate_policy, config.max_participants)?;

    let pools = calculate_tier_pools(config.total_allocation_pool, &config.split(tiers))?;
    debug!(
        "Tier pools: gold={} silver={} bronze={} (total {})",
        pools.gold, pools.silver, pools.bronze, config.total_allocation_pool
    );

    let mut results: BTreeMap<String, AllocationResult> = BTreeMap::new();
    let mut reports = Vec::with_capacity(TierLabel::ROLLDOWN_ORDER.len());
    let mut carried: TokenAmount = 0;

    for tier in TierLabel::ROLLDOWN_ORDER {
        let configured_pool = pools.get(tier);
        let effective_pool = configured_pool
            .checked_add(carried)
            .ok_or(AllocationError::AmountOverflow { context: "rolldown pool" })?;

        let requested = requested_allocation(tier, config.base_bronze_allocation_unit, tiers)?;
        let requests: BTreeMap<String, TokenAmount> = groups
            .get(&tier)
            .map(|wallets| wallets.iter().map(|w| (w.clone(), requested)).collect())
            .unwrap_or_default();

        let demand = total_demand(&requests)?;
        let scaling_factor = ScalingFactor::for_pool(effective_pool, demand);
        let is_oversubscribed = demand > effective_pool;
        let scaled = scale_oversubscribed_allocations(&requests, effective_pool)?;

        let mut distributed: TokenAmount = 0;
        for (wallet, amount) in scaled {
            let final_allocation = amount.min(config.max_allocation_per_wallet);
            distributed += final_allocation;

            if let Some(prev) = results.get(&wallet) {
                warn!("Wallet {} in {} replaces its {} allocation", wallet, tier, prev.tier);
            }
            results.insert(
                wallet.clone(),
                AllocationResult {
                    wallet,
                    tier,
                    base_allocation: config.base_bronze_allocation_unit,
                    requested_allocation: requested,
                    scaling_factor,
                    final_allocation,
                    is_oversubscribed,
                },
            );
        }

        let rolled_out = effective_pool.saturating_sub(demand);
        debug!(
            "{}: pool {} (+{} rolled in), demand {} from {} wallets, factor {:.6}, distributed {}, rolls {}",
            tier,
            configured_pool,
            carried,
            demand,
            requests.len(),
            scaling_factor.as_f64(),
            distributed,
            rolled_out
        );

        reports.push(TierAllocationReport {
            tier,
            configured_pool,
            rolled_in: carried,
            effective_pool,
            participants: requests.len(),
            demand,
            distributed,
            rolled_out,
            scaling_factor,
        });
        carried = rolled_out;
    }

    Ok(AllocationOutcome { results, tiers: reports, unallocated: carried })
}

/// Group wallets by tier, dropping NONE. Repeats inside one tier collapse
/// to a single request.
///
/// Wallets compare case-insensitively, as in snapshots. Every entry for a
/// wallet is grouped under the spelling seen first, so a later tier's
/// entry replaces the earlier result instead of adding a second one.
fn group_by_tier(
    participants: &[TierParticipant],
    policy: DuplicateWalletPolicy,
    limit: usize,
) -> Result<HashMap<TierLabel, Vec<String>>, AllocationError> {
    if participants.len() > limit {
        return Err(AllocationError::TooManyParticipants { count: participants.len(), limit });
    }

    let mut groups: HashMap<TierLabel, Vec<String>> = HashMap::new();
    // lowercase wallet → (spelling seen first, tiers it was grouped under)
    let mut seen: HashMap<String, (String, Vec<TierLabel>)> =
        HashMap::with_capacity(participants.len());

    for (index, p) in participants.iter().enumerate() {
        if p.wallet.trim().is_empty() {
            return Err(AllocationError::EmptyWallet { index });
        }
        if !p.tier.is_eligible() {
            continue;
        }
        let entry = seen
            .entry(p.wallet.to_ascii_lowercase())
            .or_insert_with(|| (p.wallet.clone(), Vec::new()));
        if let Some(&first) = entry.1.first() {
            if policy == DuplicateWalletPolicy::Reject {
                return Err(AllocationError::DuplicateWallet {
                    wallet: p.wallet.clone(),
                    first,
                    second: p.tier,
                });
            }
        }
        if entry.1.contains(&p.tier) {
            continue;
        }
        entry.1.push(p.tier);
        groups.entry(p.tier).or_default().push(entry.0.clone());
    }

    Ok(groups)
}

/// Contribution-time check: one allocation per wallet, never above the cap.
pub fn validate_allocation(
    wallet: &str,
    allocation: TokenAmount,
    max_cap: TokenAmount,
    existing: &BTreeMap<String, AllocationResult>,
) -> Result<(), AllocationError> {
    if existing.contains_key(wallet) {
        return Err(AllocationError::AlreadyAllocated { wallet: wallet.to_string() });
    }
    if allocation > max_cap {
        return Err(AllocationError::ExceedsCap { allocation, cap: max_cap });
    }
    Ok(())
}
