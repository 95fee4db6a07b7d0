//! Issuer-level status table: capping pins and current-weight deltas per issuer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use super::flags::{detect_flags, render_flags};
use super::{current_capped_weights, round_amount, round_weight, run_pipeline};
use crate::config::RunConfig;
use crate::types::{as_of_timestamp, with_metadata, ComputationOutput, Money, RawRow, Rate};
use crate::weighting::{CappingMethod, PinKind};
use crate::IndexCappingResult;

/// One issuer row, keyed by `(as_of, issuer)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerStatusRow {
    pub as_of: String,
    pub index_id: String,
    pub region: String,
    pub issuer: String,
    pub constituent_count: usize,
    pub market_cap_uncapped: Money,
    pub market_cap_capped: Money,
    pub initial_weight_uncapped: Rate,
    pub initial_weight_capped: Rate,
    pub weight: Rate,
    pub current_capped_weight: Rate,
    pub delta_pct: Rate,
    /// Only present when an AUM is known for the run.
    pub delta_ccy: Option<Money>,
    pub pin: Option<PinKind>,
    pub flags: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerStatusTable {
    pub rows: Vec<IssuerStatusRow>,
    pub method: CappingMethod,
    pub aum: Option<Money>,
}

/// Issuer-level snapshot in uncapped market-cap order.
///
/// Daily runs only carry `delta_ccy` for an explicitly configured AUM;
/// quarterly runs fall back to the region default.
pub fn build_issuer_status(
    raw: &[RawRow],
    config: &RunConfig,
) -> IndexCappingResult<ComputationOutput<IssuerStatusTable>> {
    let start = Instant::now();
    let method = if config.quarterly {
        CappingMethod::QuarterlyException
    } else {
        CappingMethod::Daily
    };
    let run = run_pipeline(raw, config, method)?;

    let mut current_by_issuer: BTreeMap<String, Rate> = BTreeMap::new();
    for (c, w) in run
        .table
        .constituents
        .iter()
        .zip(current_capped_weights(&run.table))
    {
        let total = current_by_issuer.entry(c.issuer.clone()).or_default();
        *total = total.saturating_add(w);
    }
    let initial: HashMap<&str, Rate> = run
        .issuers
        .iter()
        .map(|i| (i.issuer.as_str(), i.initial_weight_uncapped))
        .collect();
    let flags = detect_flags(&initial, &current_by_issuer, &run.params);

    let aum = if config.quarterly {
        Some(config.resolved_aum())
    } else {
        config.aum
    }
    .filter(|a| *a > Decimal::ZERO);

    let as_of = as_of_timestamp(config.as_of);
    let region = config.region.code().to_string();

    let mut warnings = run.warnings;
    let mut out_of_range = 0usize;

    let rows: Vec<IssuerStatusRow> = run
        .issuers
        .iter()
        .map(|agg| {
            let target = run.outcome.target_for(&agg.issuer);
            let weight = target.map(|t| t.target_weight).unwrap_or(Decimal::ZERO);
            let current = current_by_issuer
                .get(&agg.issuer)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let delta = weight - current;
            IssuerStatusRow {
                as_of: as_of.clone(),
                index_id: config.index_id.clone(),
                region: region.clone(),
                issuer: agg.issuer.clone(),
                constituent_count: agg.constituent_count,
                market_cap_uncapped: agg.market_cap_uncapped,
                market_cap_capped: agg.market_cap_capped,
                initial_weight_uncapped: round_weight(agg.initial_weight_uncapped),
                initial_weight_capped: round_weight(agg.initial_weight_capped),
                weight: round_weight(weight),
                current_capped_weight: round_weight(current),
                delta_pct: round_weight(delta),
                delta_ccy: aum.map(|a| {
                    round_amount(delta.checked_mul(a).unwrap_or_else(|| {
                        out_of_range += 1;
                        Decimal::ZERO
                    }))
                }),
                pin: target.and_then(|t| t.pin),
                flags: render_flags(flags.get(&agg.issuer)),
            }
        })
        .collect();

    if out_of_range > 0 {
        warnings.push(format!(
            "{out_of_range} issuer(s) have a currency delta out of range; treated as zero"
        ));
    }

    let assumptions = serde_json::json!({
        "index_id": config.index_id,
        "region": region,
        "as_of": as_of,
        "method": method,
        "aum": aum,
        "rules": run.params,
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Issuer-level capping snapshot with current-weight deltas",
        &assumptions,
        warnings,
        elapsed,
        IssuerStatusTable { rows, method, aum },
    ))
}
