//! Snapshot building, proof verification and eligibility

use tier_engine::{
    check_early_unstake, create_snapshot, export_snapshot, import_snapshot,
    validate_tier_eligibility, verify_tier_proof, EngineConfig, LockStatus, SnapshotError,
    StakeRecord, TierEligibility, TierLabel, TierSnapshot, Timestamp, STAKE_LOCK_PERIOD_MS,
};

const NOW: Timestamp = 1_000_000_000_000;

fn stakers() -> Vec<StakeRecord> {
    vec![
        StakeRecord::new("0xGold1", 175_000_000, NOW - 10_000),
        StakeRecord::new("0xSilver1", 87_500_000, NOW - 20_000),
        StakeRecord::new("0xBronze1", 17_500_000, NOW - 30_000),
        StakeRecord::new("0xNone1", 1_000, NOW - 40_000),
    ]
}

fn build() -> TierSnapshot {
    create_snapshot("presale-1", &stakers(), NOW, &EngineConfig::default()).unwrap()
}

#[test]
fn test_create_snapshot_breakdown() {
    let snapshot = build();
    assert_eq!(snapshot.presale_id, "presale-1");
    assert_eq!(snapshot.snapshot_timestamp, NOW);
    assert_eq!(snapshot.total_participants, 4);
    assert_eq!(snapshot.tier_breakdown.gold, 1);
    assert_eq!(snapshot.tier_breakdown.silver, 1);
    assert_eq!(snapshot.tier_breakdown.bronze, 1);
    // NONE is kept in the snapshot but not counted
    assert_eq!(snapshot.tier_breakdown.total(), 3);
    assert_eq!(snapshot.participant("0xNone1").unwrap().tier, TierLabel::None);
}

#[test]
fn test_assigns_tiers_and_lock_expiry() {
    let snapshot = build();
    let expected = [
        ("0xGold1", TierLabel::Gold),
        ("0xSilver1", TierLabel::Silver),
        ("0xBronze1", TierLabel::Bronze),
        ("0xNone1", TierLabel::None),
    ];
    for (wallet, tier) in expected {
        let p = snapshot.participant(wallet).unwrap();
        assert_eq!(p.tier, tier, "{}", wallet);
        assert_eq!(p.lock_expiry_timestamp, p.stake_timestamp + STAKE_LOCK_PERIOD_MS);
    }
}

#[test]
fn test_every_proof_round_trips() {
    let snapshot = build();
    for p in &snapshot.participants {
        assert!(verify_tier_proof(
            &p.wallet,
            p.staked_amount,
            p.tier,
            p.stake_timestamp,
            &p.snapshot_proof,
            &snapshot.merkle_root,
        ));
    }
}

#[test]
fn test_tampered_fields_fail() {
    let snapshot = build();
    let gold = snapshot.participant("0xGold1").unwrap();
    let root = &snapshot.merkle_root;
    let proof = &gold.snapshot_proof;

    let (wallet, amount, ts) = (gold.wallet.as_str(), gold.staked_amount, gold.stake_timestamp);

    assert!(!verify_tier_proof(wallet, amount + 1, gold.tier, ts, proof, root));
    assert!(!verify_tier_proof(wallet, amount, TierLabel::Silver, ts, proof, root));
    assert!(!verify_tier_proof(wallet, amount, gold.tier, ts + 1, proof, root));
    assert!(!verify_tier_proof("0xGold2", amount, gold.tier, ts, proof, root));
}

#[test]
fn test_deterministic() {
    let a = build();
    let b = build();
    assert_eq!(a, b);
    assert_eq!(export_snapshot(&a).unwrap(), export_snapshot(&b).unwrap());
}

#[test]
fn test_order_changes_root() {
    // [c, a, b, d] regroups the pairs; a plain reversal keeps them (pairs hash sorted)
    let list = stakers();
    let regrouped = vec![list[2].clone(), list[0].clone(), list[1].clone(), list[3].clone()];
    let a = build();
    let b = create_snapshot("presale-1", &regrouped, NOW, &EngineConfig::default()).unwrap();
    assert_ne!(a.merkle_root, b.merkle_root);
    assert!(b.verify_integrity());
}

#[test]
fn test_reversed_pairs_share_root() {
    let mut reversed = stakers();
    reversed.reverse();
    let b = create_snapshot("presale-1", &reversed, NOW, &EngineConfig::default()).unwrap();
    assert_eq!(build().merkle_root, b.merkle_root);
}

#[test]
fn test_odd_participant_counts() {
    for n in 1..=9usize {
        let list: Vec<StakeRecord> = (0..n)
            .map(|i| StakeRecord::new(format!("w{}", i), 20_000_000 * (i as u128 + 1), i as u64))
            .collect();
        let snapshot = create_snapshot("p", &list, NOW, &EngineConfig::default()).unwrap();
        assert!(snapshot.verify_integrity(), "n={}", n);
    }
}

#[test]
fn test_config_change_does_not_touch_old_snapshot() {
    let snapshot = build();
    let mut config = EngineConfig::default();
    config.tiers.gold.governance_weight = 10;
    let gold = snapshot.participant("0xGold1").unwrap();
    assert_eq!(gold.governance_weight, 3);
    assert!(snapshot.verify_integrity());
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = EngineConfig::default();
    config.tiers.silver.multiplier_bps = config.tiers.bronze.multiplier_bps;
    let err = create_snapshot("p", &stakers(), NOW, &config).unwrap_err();
    assert!(matches!(err, SnapshotError::Config(_)));
}

#[test]
fn test_eligibility() {
    let snapshot = build();
    let gold = snapshot.participant("0xGold1").unwrap();
    assert_eq!(
        validate_tier_eligibility(gold, &snapshot, NOW),
        TierEligibility::Eligible { lock: LockStatus::Active }
    );
    assert_eq!(
        validate_tier_eligibility(gold, &snapshot, gold.lock_expiry_timestamp),
        TierEligibility::Eligible { lock: LockStatus::Expired }
    );

    let none = snapshot.participant("0xNone1").unwrap();
    assert_eq!(validate_tier_eligibility(none, &snapshot, NOW), TierEligibility::NoTier);

    let mut forged = gold.clone();
    forged.staked_amount *= 2;
    assert_eq!(validate_tier_eligibility(&forged, &snapshot, NOW), TierEligibility::InvalidProof);
    assert!(!TierEligibility::InvalidProof.is_eligible());
}

#[test]
fn test_early_unstake() {
    let config = EngineConfig::default();
    let snapshot = build();
    let gold = snapshot.participant("0xGold1").unwrap();
    // Dropped to silver inside the lock window
    assert!(check_early_unstake(gold, 90_000_000, NOW, &config.tiers));
    // Still gold
    assert!(!check_early_unstake(gold, 200_000_000, NOW, &config.tiers));
    // Lock expired
    assert!(!check_early_unstake(gold, 0, gold.lock_expiry_timestamp, &config.tiers));
}

#[test]
fn test_export_import() {
    let snapshot = build();
    let json = export_snapshot(&snapshot).unwrap();
    assert!(json.contains(&snapshot.root_hex()));
    let imported = import_snapshot(&json).unwrap();
    assert_eq!(imported, snapshot);
}

#[test]
fn test_import_rejects_edited_snapshot() {
    let snapshot = build();
    let json = export_snapshot(&snapshot).unwrap().replace("17500000", "17500001");
    assert!(matches!(import_snapshot(&json), Err(SnapshotError::IntegrityMismatch)));
}

#[test]
fn test_allocation_requests_skip_none() {
    let requests = build().allocation_requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.tier != TierLabel::None));
}
