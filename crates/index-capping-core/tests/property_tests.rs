use chrono::NaiveDate;
use index_capping_core::config::{Region, RuleParameters, RunConfig};
use index_capping_core::ingest::normalize;
use index_capping_core::reporting::build_status;
use index_capping_core::weighting::{
    aggregate_issuers, apply_daily_capping, apply_quarterly_capping, distribute, CappingStatus,
    PinKind,
};
use index_capping_core::RawRow;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::HashMap;

const TOLERANCE: Decimal = dec!(0.000001);

/// One row per market cap; rows are spread over `issuer_count` issuers.
fn snapshot(caps: &[u32], issuer_count: usize) -> Vec<RawRow> {
    caps.iter()
        .enumerate()
        .map(|(i, cap)| {
            json!({
                "ticker": format!("t{i:03}"),
                "issuer": format!("ISS{:03}", i % issuer_count),
                "price": cap,
                "shares": 1,
            })
            .as_object()
            .cloned()
            .unwrap()
        })
        .collect()
}

fn caps_strategy() -> impl Strategy<Value = Vec<u32>> {
    (
        prop::collection::vec(1u32..1000, 30..60),
        prop::collection::vec(5000u32..20000, 0..3),
    )
        .prop_map(|(mut small, large)| {
            small.extend(large);
            small
        })
}

fn region_strategy() -> impl Strategy<Value = Region> {
    prop_oneof![Just(Region::CPH), Just(Region::HEL), Just(Region::STO)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn daily_capping_terminates_and_holds_concentration_limit(
        caps in caps_strategy(),
        region in region_strategy(),
    ) {
        let table = normalize(&snapshot(&caps, caps.len())).unwrap();
        let issuers = aggregate_issuers(&table.constituents);
        let params = RuleParameters::for_region(&region);
        let outcome = apply_daily_capping(&issuers, &params).unwrap();

        prop_assert!(outcome.targets.iter().all(|t| t.target_weight >= Decimal::ZERO));
        if outcome.status == CappingStatus::Converged {
            let concentrated: Decimal = outcome
                .targets
                .iter()
                .map(|t| t.target_weight)
                .filter(|w| *w > params.concentration_threshold)
                .sum();
            prop_assert!(concentrated <= params.concentration_limit);
        }

        let pinned: Decimal = outcome
            .targets
            .iter()
            .filter(|t| t.pin.is_some())
            .map(|t| t.target_weight)
            .sum();
        let has_free = outcome
            .targets
            .iter()
            .any(|t| t.pin.is_none() && t.initial_weight > Decimal::ZERO);
        if has_free && pinned <= Decimal::ONE {
            prop_assert!((outcome.total_weight() - Decimal::ONE).abs() < TOLERANCE);
        }
    }

    #[test]
    fn quarterly_capping_respects_caps_and_top_slots(
        caps in caps_strategy(),
        region in region_strategy(),
    ) {
        let table = normalize(&snapshot(&caps, caps.len())).unwrap();
        let issuers = aggregate_issuers(&table.constituents);
        let params = RuleParameters::for_region(&region);
        let outcome = apply_quarterly_capping(&issuers, &params).unwrap();

        let top_slots = outcome
            .targets
            .iter()
            .filter(|t| t.pin == Some(PinKind::TopSlot))
            .count();
        prop_assert_eq!(top_slots, params.top_n_exception_slots.min(issuers.len()));
        for t in outcome.targets.iter().filter(|t| t.pin.is_none()) {
            prop_assert!(t.target_weight <= params.single_issuer_cap);
        }
        for t in outcome.targets.iter().filter(|t| t.pin == Some(PinKind::TopSlot)) {
            prop_assert_eq!(t.target_weight, params.quarterly_top_cap);
        }
        prop_assert!((outcome.total_weight() - Decimal::ONE).abs() < TOLERANCE);
    }

    #[test]
    fn distributed_rows_sum_to_issuer_target(
        caps in caps_strategy(),
        issuer_count in 25usize..30,
    ) {
        let table = normalize(&snapshot(&caps, issuer_count)).unwrap();
        let issuers = aggregate_issuers(&table.constituents);
        let params = RuleParameters::for_region(&Region::CPH);
        let outcome = apply_daily_capping(&issuers, &params).unwrap();
        let rows = distribute(&table.constituents, &outcome.weight_map());

        let mut by_issuer: HashMap<&str, Decimal> = HashMap::new();
        for row in &rows {
            *by_issuer.entry(row.issuer.as_str()).or_default() += row.weight;
        }
        for agg in &issuers {
            let target = outcome.target_for(&agg.issuer).unwrap().target_weight;
            let distributed = by_issuer.get(agg.issuer.as_str()).copied().unwrap_or_default();
            prop_assert!((distributed - target).abs() < TOLERANCE);
        }
    }

    #[test]
    fn status_is_idempotent(caps in caps_strategy(), quarterly in any::<bool>()) {
        let raw = snapshot(&caps, caps.len());
        let mut config = RunConfig::new(
            "OMXCCAPX",
            Region::CPH,
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        );
        config.quarterly = quarterly;
        let first = build_status(&raw, &config).unwrap();
        let second = build_status(&raw, &config).unwrap();
        prop_assert_eq!(first.result.rows, second.result.rows);
        prop_assert_eq!(first.result.passes, second.result.passes);
    }
}
