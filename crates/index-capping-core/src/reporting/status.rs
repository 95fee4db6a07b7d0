//! Daily status table: one row per constituent with capped weights, deltas and flags.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use super::flags::{detect_flags, render_flags};
use super::{current_capped_weights, round_amount, round_weight, run_pipeline};
use crate::config::RunConfig;
use crate::types::{as_of_timestamp, with_metadata, ComputationOutput, Money, RawRow, Rate};
use crate::weighting::{CappingMethod, CappingStatus};
use crate::IndexCappingResult;

/// One constituent row of the daily status table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRow {
    pub index_id: String,
    pub ticker: String,
    pub issuer: String,
    pub name: String,
    pub price: Decimal,
    pub shares: Decimal,
    pub shares_capped: Decimal,
    pub market_cap_uncapped: Money,
    pub market_cap_capped: Money,
    /// Target weight on the uncapped market-cap basis.
    pub weight: Rate,
    /// Target weight on the capped market-cap basis.
    pub capped_weight: Rate,
    /// `capped_weight` minus the current capped weight, unrounded.
    pub delta_pct: Rate,
    pub average_daily_volume: Decimal,
    pub as_of: String,
    pub region: String,
    pub flags: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTable {
    pub rows: Vec<StatusRow>,
    pub method: CappingMethod,
    pub capping_status: CappingStatus,
    pub passes: u32,
    /// Sum of issuer targets; 1 unless every issuer is pinned.
    pub total_weight: Rate,
}

/// Build the constituent-level status table for one index snapshot.
///
/// Uses daily capping unless the run is flagged quarterly. Rows keep input
/// order.
pub fn build_status(
    raw: &[RawRow],
    config: &RunConfig,
) -> IndexCappingResult<ComputationOutput<StatusTable>> {
    let start = Instant::now();
    let method = if config.quarterly {
        CappingMethod::QuarterlyException
    } else {
        CappingMethod::Daily
    };
    let run = run_pipeline(raw, config, method)?;

    let current = current_capped_weights(&run.table);
    let mut current_by_issuer: BTreeMap<String, Rate> = BTreeMap::new();
    for (c, w) in run.table.constituents.iter().zip(&current) {
        *current_by_issuer.entry(c.issuer.clone()).or_default() += *w;
    }
    let initial: HashMap<&str, Rate> = run
        .issuers
        .iter()
        .map(|i| (i.issuer.as_str(), i.initial_weight_uncapped))
        .collect();
    let flags = detect_flags(&initial, &current_by_issuer, &run.params);

    let as_of = as_of_timestamp(config.as_of);
    let region = config.region.code().to_string();

    let rows: Vec<StatusRow> = run
        .table
        .constituents
        .iter()
        .zip(&run.distributed)
        .zip(&current)
        .map(|((c, d), current_capped)| StatusRow {
            index_id: config.index_id.clone(),
            ticker: c.ticker.clone(),
            issuer: c.issuer.clone(),
            name: c.name.clone(),
            price: round_amount(c.price),
            shares: round_amount(c.shares_uncapped),
            shares_capped: round_amount(c.shares_capped),
            market_cap_uncapped: c.market_cap_uncapped,
            market_cap_capped: c.market_cap_capped,
            weight: round_weight(d.weight),
            capped_weight: round_weight(d.capped_weight),
            delta_pct: d.capped_weight - *current_capped,
            average_daily_volume: round_amount(c.average_daily_volume),
            as_of: as_of.clone(),
            region: region.clone(),
            flags: render_flags(flags.get(&c.issuer)),
        })
        .collect();

    let assumptions = serde_json::json!({
        "index_id": config.index_id,
        "region": region,
        "as_of": as_of,
        "method": method,
        "rules": run.params,
    });

    let result = StatusTable {
        rows,
        method,
        capping_status: run.outcome.status,
        passes: run.outcome.passes,
        total_weight: run.outcome.total_weight(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Issuer capping with pin-and-redistribute, distributed to constituents by market-cap share",
        &assumptions,
        run.warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;
    use crate::error::IndexCappingError;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn rows(values: Vec<Value>) -> Vec<RawRow> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn config() -> RunConfig {
        RunConfig::new(
            "OMXCCAPX",
            Region::CPH,
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        )
    }

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_three_issuers_all_pinned() {
        let raw = rows(vec![
            json!({"ticker": "a", "issuer": "A", "price": 50, "shares": 10}),
            json!({"ticker": "b", "issuer": "B", "price": 30, "shares": 10}),
            json!({"ticker": "c", "issuer": "C", "price": 20, "shares": 10}),
        ]);
        let out = build_status(&raw, &config()).unwrap();
        let table = &out.result;
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].ticker, "A");
        for row in &table.rows {
            assert_eq!(row.weight, dec!(0.07));
            assert_eq!(row.as_of, "2025-03-31T00:00:00+00:00");
            assert_eq!(row.region, "CPH");
            assert_eq!(row.index_id, "OMXCCAPX");
        }
        assert_eq!(table.total_weight, dec!(0.21));
        assert!(out.warnings.iter().any(|w| w.contains("residual weight has no recipient")));
    }

    #[test]
    fn test_zero_weight_free_issuer_leaves_residual() {
        let raw = rows(vec![
            json!({"ticker": "a", "issuer": "A", "price": 50, "shares": 10}),
            json!({"ticker": "z", "issuer": "Z", "price": 0, "shares": 10}),
        ]);
        let out = build_status(&raw, &config()).unwrap();
        let z = out.result.rows.iter().find(|r| r.ticker == "Z").unwrap();
        assert_eq!(z.weight, Decimal::ZERO);
        assert_eq!(out.result.total_weight, dec!(0.07));
        assert!(out.warnings.iter().any(|w| w.contains("residual weight has no recipient")));
    }

    #[test]
    fn test_delta_against_market_cap_share() {
        // Capped shares fall back to uncapped, so current weight is the mcap share.
        let mut values = vec![json!({"ticker": "big", "issuer": "BIG", "price": 20, "shares": 1})];
        for i in 0..24 {
            values.push(json!({"ticker": format!("t{i:02}"), "price": 4, "shares": 1}));
        }
        let raw = rows(values);
        let out = build_status(&raw, &config()).unwrap();
        let big = &out.result.rows[0];
        // Initial 20/116 > 10%: pinned at 7%.
        assert_eq!(big.capped_weight, dec!(0.07));
        let current = dec!(20) / dec!(116);
        assert!(approx_eq(big.delta_pct, dec!(0.07) - current, dec!(0.0000001)));
        assert_eq!(big.flags, "10% breach");
        assert!(approx_eq(out.result.total_weight, Decimal::ONE, dec!(0.000001)));
    }

    #[test]
    fn test_vendor_capped_weight_drives_delta() {
        let mut values = vec![];
        for i in 0..25 {
            values.push(json!({
                "ticker": format!("t{i:02}"),
                "price": 1,
                "shares": 1,
                "omx_weight_capped": 4.0,
            }));
        }
        let raw = rows(values);
        let out = build_status(&raw, &config()).unwrap();
        for row in &out.result.rows {
            assert_eq!(row.capped_weight, dec!(0.04));
            assert_eq!(row.delta_pct, Decimal::ZERO);
            assert_eq!(row.flags, "");
        }
    }

    #[test]
    fn test_flags_attach_to_every_row_of_issuer() {
        let mut values = vec![
            json!({"ticker": "nov-a", "issuer": "NOVO", "price": 10, "shares": 1}),
            json!({"ticker": "nov-b", "issuer": "NOVO", "price": 10, "shares": 1}),
        ];
        for i in 0..20 {
            values.push(json!({"ticker": format!("t{i:02}"), "price": 4, "shares": 1}));
        }
        let out = build_status(&rows(values), &config()).unwrap();
        assert_eq!(out.result.rows[0].flags, "10% breach");
        assert_eq!(out.result.rows[1].flags, "10% breach");
        assert_eq!(out.result.rows[2].flags, "");
        let novo: Rate = out.result.rows[..2].iter().map(|r| r.weight).sum();
        assert_eq!(novo, dec!(0.07));
    }

    #[test]
    fn test_quarterly_flag_switches_method() {
        let raw = rows(vec![
            json!({"ticker": "a", "price": 1, "shares": 1}),
            json!({"ticker": "b", "price": 1, "shares": 1}),
        ]);
        let mut cfg = config();
        cfg.quarterly = true;
        let out = build_status(&raw, &cfg).unwrap();
        assert_eq!(out.result.method, CappingMethod::QuarterlyException);
        assert!(out.result.rows.iter().all(|r| r.weight == dec!(0.07)));
    }

    #[test]
    fn test_empty_table_rejected() {
        let err = build_status(&[], &config()).unwrap_err();
        assert!(matches!(err, IndexCappingError::InsufficientData(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let raw = rows(vec![json!({"ticker": "a", "price": 1, "shares": 1})]);
        let mut cfg = config();
        cfg.aum = Some(dec!(-1));
        assert!(matches!(
            build_status(&raw, &cfg),
            Err(IndexCappingError::InvalidInput { .. })
        ));
    }
}
