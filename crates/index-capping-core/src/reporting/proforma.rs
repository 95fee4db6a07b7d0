//! Quarterly rebalance proforma: target weights against current vendor
//! weights, translated into trade sizes and days to cover at the index AUM.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::{round_amount, round_weight, run_pipeline};
use crate::config::{Currency, RunConfig};
use crate::types::{as_of_timestamp, with_metadata, ComputationOutput, Money, RawRow, Rate};
use crate::weighting::{CappingMethod, CappingStatus};
use crate::IndexCappingResult;

const MILLION: Decimal = dec!(1000000);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProformaRow {
    pub index_id: String,
    pub ticker: String,
    pub issuer: String,
    pub name: String,
    pub price: Decimal,
    pub shares: Decimal,
    pub shares_capped: Decimal,
    pub market_cap_uncapped: Money,
    pub market_cap_capped: Money,
    pub current_weight_uncapped: Rate,
    pub current_weight_capped: Rate,
    pub weight: Rate,
    pub capped_weight: Rate,
    pub delta_pct: Rate,
    /// Trade size in index currency.
    pub delta_ccy: Money,
    /// Trade size in millions of shares.
    pub delta_vol: Decimal,
    pub days_to_cover: Decimal,
    pub average_daily_volume: Decimal,
    pub average_daily_volume_millions: Decimal,
    pub as_of: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProformaTable {
    pub rows: Vec<ProformaRow>,
    pub aum: Money,
    pub currency: Currency,
    pub capping_status: CappingStatus,
    pub passes: u32,
    pub total_weight: Rate,
}

/// Currency trade size, share volume in millions and days to cover for one
/// row, or `None` when any step overflows.
fn trade_sizes(
    delta_pct: Rate,
    aum: Money,
    price: Decimal,
    volume_millions: Decimal,
) -> Option<(Money, Decimal, Decimal)> {
    let delta_ccy = delta_pct.checked_mul(aum)?;
    let delta_vol = if price > Decimal::ZERO {
        delta_ccy.checked_div(price)?.checked_div(MILLION)?
    } else {
        Decimal::ZERO
    };
    let cover_divisor = if volume_millions.is_zero() {
        Decimal::ONE
    } else {
        volume_millions
    };
    let days_to_cover = delta_vol.abs().checked_div(cover_divisor)?;
    Some((delta_ccy, delta_vol, days_to_cover))
}

/// Build the quarterly proforma, rows sorted by uncapped market cap descending.
pub fn build_quarterly_proforma(
    raw: &[RawRow],
    config: &RunConfig,
) -> IndexCappingResult<ComputationOutput<ProformaTable>> {
    let start = Instant::now();
    let run = run_pipeline(raw, config, CappingMethod::QuarterlyException)?;
    let mut warnings = run.warnings;

    let aum = config.resolved_aum();
    if aum.is_zero() {
        warnings.push(format!(
            "No AUM configured for region {}; currency and volume deltas are zero",
            config.region
        ));
    }
    let profile = config.profile();

    let total_uncapped = run.table.total_market_cap_uncapped();
    let as_of = as_of_timestamp(config.as_of);
    let region = config.region.code().to_string();
    let mut out_of_range = 0usize;

    let mut rows: Vec<ProformaRow> = run
        .table
        .constituents
        .iter()
        .zip(&run.distributed)
        .map(|(c, d)| {
            let current_uncapped = match c.current_weight_uncapped {
                Some(w) => w,
                None if total_uncapped.is_zero() => Decimal::ZERO,
                None => c.market_cap_uncapped / total_uncapped,
            };
            let current_capped = c.current_weight_capped.unwrap_or(current_uncapped);

            let delta_pct = d.weight - current_capped;
            let volume_millions = c.average_daily_volume / MILLION;
            let (delta_ccy, delta_vol, days_to_cover) =
                trade_sizes(delta_pct, aum, c.price, volume_millions).unwrap_or_else(|| {
                    out_of_range += 1;
                    (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
                });

            ProformaRow {
                index_id: config.index_id.clone(),
                ticker: c.ticker.clone(),
                issuer: c.issuer.clone(),
                name: c.name.clone(),
                price: round_amount(c.price),
                shares: round_amount(c.shares_uncapped),
                shares_capped: round_amount(c.shares_capped),
                market_cap_uncapped: c.market_cap_uncapped,
                market_cap_capped: c.market_cap_capped,
                current_weight_uncapped: round_weight(current_uncapped),
                current_weight_capped: round_weight(current_capped),
                weight: round_weight(d.weight),
                capped_weight: round_weight(d.capped_weight),
                delta_pct: round_weight(delta_pct),
                delta_ccy: round_amount(delta_ccy),
                delta_vol: round_amount(delta_vol),
                days_to_cover: round_amount(days_to_cover),
                average_daily_volume: round_amount(c.average_daily_volume),
                average_daily_volume_millions: round_amount(volume_millions),
                as_of: as_of.clone(),
                region: region.clone(),
            }
        })
        .collect();

    if out_of_range > 0 {
        warnings.push(format!(
            "{out_of_range} row(s) have trade sizes out of range; treated as zero"
        ));
    }

    rows.sort_by(|a, b| b.market_cap_uncapped.cmp(&a.market_cap_uncapped));
    debug!(rows = rows.len(), %aum, "proforma built");

    let assumptions = serde_json::json!({
        "index_id": config.index_id,
        "region": region,
        "as_of": as_of,
        "aum": aum,
        "currency": profile.currency,
        "rules": run.params,
    });

    let result = ProformaTable {
        rows,
        aum,
        currency: profile.currency,
        capping_status: run.outcome.status,
        passes: run.outcome.passes,
        total_weight: run.outcome.total_weight(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Quarterly exception capping proforma with AUM-scaled trade sizes",
        &assumptions,
        warnings,
        elapsed,
        result,
    ))
}
