//! Tier classification and configuration

use tier_engine::{
    calculate_vote_weight, classify, create_snapshot, tier_multiplier, ConfigError, EngineConfig,
    SnapshotError, StakeRecord, TierConfig, TierLabel, MAX_MULTIPLIER_BPS, MAX_TOKEN_AMOUNT,
};

#[test]
fn test_threshold_edges() {
    let tiers = TierConfig::default();
    assert_eq!(classify(0, &tiers), TierLabel::None);
    assert_eq!(classify(17_499_999, &tiers), TierLabel::None);
    assert_eq!(classify(17_500_000, &tiers), TierLabel::Bronze);
    assert_eq!(classify(87_499_999, &tiers), TierLabel::Bronze);
    assert_eq!(classify(87_500_000, &tiers), TierLabel::Silver);
    assert_eq!(classify(174_999_999, &tiers), TierLabel::Silver);
    assert_eq!(classify(175_000_000, &tiers), TierLabel::Gold);
    assert_eq!(classify(u128::MAX, &tiers), TierLabel::Gold);
}

#[test]
fn test_classify_monotonic() {
    let tiers = TierConfig::default();
    let mut prev = TierLabel::None;
    for step in 0..400u128 {
        let tier = classify(step * 500_000, &tiers);
        assert!(tier >= prev);
        prev = tier;
    }
    assert_eq!(prev, TierLabel::Gold);
}

#[test]
fn test_weights_and_multipliers() {
    let tiers = TierConfig::default();
    let weights: Vec<u32> = [TierLabel::None, TierLabel::Bronze, TierLabel::Silver, TierLabel::Gold]
        .into_iter()
        .map(|t| calculate_vote_weight(t, &tiers))
        .collect();
    assert_eq!(weights, vec![0, 1, 2, 3]);
    assert_eq!(tier_multiplier(TierLabel::Silver, &tiers), 25_000);
    assert_eq!(tier_multiplier(TierLabel::None, &tiers), 0);
}

#[test]
fn test_custom_thresholds() {
    let mut tiers = TierConfig::default();
    tiers.bronze.threshold = 10;
    tiers.silver.threshold = 20;
    tiers.gold.threshold = 30;
    assert!(tiers.validate().is_ok());
    assert_eq!(classify(25, &tiers), TierLabel::Silver);
}

#[test]
fn test_overlapping_thresholds_rejected() {
    let mut tiers = TierConfig::default();
    tiers.gold.threshold = tiers.silver.threshold;
    assert!(matches!(tiers.validate(), Err(ConfigError::NonIncreasing { .. })));
}

#[test]
fn test_engine_config_json() {
    let json = r#"{
        "approval_threshold_bps": 5000,
        "tiers": {
            "bronze": { "threshold": 1, "multiplier_bps": 10000, "governance_weight": 1, "pool_share_bps": 5000 },
            "silver": { "threshold": 2, "multiplier_bps": 20000, "governance_weight": 2, "pool_share_bps": 3000 },
            "gold": { "threshold": 3, "multiplier_bps": 30000, "governance_weight": 3, "pool_share_bps": 2000 }
        }
    }"#;
    let config = EngineConfig::from_json(json).unwrap();
    assert_eq!(config.approval_threshold_bps, 5_000);
    assert_eq!(config.tiers.gold.threshold, 3);
    assert_eq!(config.max_participants, EngineConfig::default().max_participants);
}

#[test]
fn test_engine_config_rejects_bad_threshold() {
    let err = EngineConfig::from_json(r#"{ "approval_threshold_bps": 0 }"#).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidThreshold(0)));
}

#[test]
fn test_zero_tier_params_rejected() {
    let mut tiers = TierConfig::default();
    tiers.silver.governance_weight = 0;
    assert!(matches!(
        tiers.validate(),
        Err(ConfigError::ZeroValue { field: "governance_weight", tier: TierLabel::Silver })
    ));

    let mut tiers = TierConfig::default();
    tiers.bronze.multiplier_bps = 0;
    assert!(matches!(
        tiers.validate(),
        Err(ConfigError::ZeroValue { field: "multiplier_bps", tier: TierLabel::Bronze })
    ));
}

#[test]
fn test_oversized_tier_params_rejected() {
    let mut tiers = TierConfig::default();
    tiers.gold.multiplier_bps = MAX_MULTIPLIER_BPS + 1;
    assert!(matches!(
        tiers.validate(),
        Err(ConfigError::MultiplierTooLarge { tier: TierLabel::Gold, .. })
    ));

    let mut tiers = TierConfig::default();
    tiers.gold.threshold = MAX_TOKEN_AMOUNT + 1;
    assert!(matches!(
        tiers.validate(),
        Err(ConfigError::AmountTooLarge { field: "threshold", .. })
    ));
}

#[test]
fn test_invalid_tiers_fail_whole_snapshot() {
    let mut config = EngineConfig::default();
    config.tiers.gold.multiplier_bps = MAX_MULTIPLIER_BPS + 1;
    let stakers = vec![StakeRecord::new("w", 200_000_000, 0)];
    let err = create_snapshot("p", &stakers, 1, &config).unwrap_err();
    assert!(matches!(err, SnapshotError::Config(ConfigError::MultiplierTooLarge { .. })));
}
