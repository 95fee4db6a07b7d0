//! Constituent normalisation.
//!
//! Turns a raw vendor snapshot into [`Constituent`] rows with non-null numeric
//! price, share counts, volume and per-row market caps on both the uncapped
//! and capped share basis. Numeric coercion never fails; the two table-level
//! fallbacks (missing capped shares, missing share counts altogether) are
//! applied here and reported as warnings. A market cap that overflows or lands
//! above [`MARKET_CAP_CEILING`] is zeroed with a warning.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::fields::{self, FieldCandidate};
use crate::error::IndexCappingError;
use crate::types::{Money, RawRow, Rate};
use crate::IndexCappingResult;

/// A single index constituent in canonical numeric form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    pub ticker: String,
    /// Grouping key; multiple share classes map to the same issuer.
    pub issuer: String,
    pub name: String,
    pub price: Decimal,
    pub shares_uncapped: Decimal,
    pub shares_capped: Decimal,
    /// Average daily volume in shares.
    pub average_daily_volume: Decimal,
    pub market_cap_uncapped: Money,
    pub market_cap_capped: Money,
    /// Vendor-published current uncapped index weight, when the snapshot carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_weight_uncapped: Option<Rate>,
    /// Vendor-published current capped index weight, when the snapshot carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_weight_capped: Option<Rate>,
}

/// Largest accepted per-row market cap; keeps table totals inside `Decimal` range.
pub const MARKET_CAP_CEILING: Money = dec!(1000000000000000000000);

/// `price * shares`, or `None` when the product overflows or exceeds the ceiling.
fn market_cap(price: Decimal, shares: Decimal) -> Option<Money> {
    price
        .checked_mul(shares)
        .filter(|m| *m <= MARKET_CAP_CEILING)
}

/// Normalised constituent table plus the data-quality notes gathered on the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub constituents: Vec<Constituent>,
    pub warnings: Vec<String>,
}

impl NormalizedTable {
    pub fn total_market_cap_uncapped(&self) -> Money {
        self.constituents.iter().map(|c| c.market_cap_uncapped).sum()
    }

    pub fn total_market_cap_capped(&self) -> Money {
        self.constituents.iter().map(|c| c.market_cap_capped).sum()
    }
}

/// Columns resolved once per table.
struct ResolvedColumns<'a> {
    ticker: Option<&'a FieldCandidate>,
    name: Option<&'a FieldCandidate>,
    issuer: Option<&'a FieldCandidate>,
    price: Option<&'a FieldCandidate>,
    shares_uncapped: Option<&'a FieldCandidate>,
    shares_capped: Option<&'a FieldCandidate>,
    volume: Option<&'a FieldCandidate>,
    current_uncapped: Option<&'a FieldCandidate>,
    current_capped: Option<&'a FieldCandidate>,
    weight_proxy: Option<&'a FieldCandidate>,
}

impl ResolvedColumns<'static> {
    fn resolve(table: &[RawRow]) -> Self {
        Self {
            ticker: fields::resolve_field(table, fields::TICKER),
            name: fields::resolve_field(table, fields::NAME),
            issuer: fields::resolve_field(table, fields::ISSUER),
            price: fields::resolve_field(table, fields::PRICE),
            shares_uncapped: fields::resolve_field(table, fields::SHARES_UNCAPPED),
            shares_capped: fields::resolve_field(table, fields::SHARES_CAPPED),
            volume: fields::resolve_field(table, fields::AVERAGE_DAILY_VOLUME),
            current_uncapped: fields::resolve_field(table, fields::CURRENT_WEIGHT_UNCAPPED),
            current_capped: fields::resolve_field(table, fields::CURRENT_WEIGHT_CAPPED),
            weight_proxy: fields::resolve_field(table, fields::WEIGHT_PROXY),
        }
    }
}

/// Normalise a raw constituent table. Fails only when the table is empty.
pub fn normalize(table: &[RawRow]) -> IndexCappingResult<NormalizedTable> {
    if table.is_empty() {
        return Err(IndexCappingError::InsufficientData(
            "Constituent table is empty".into(),
        ));
    }

    let cols = ResolvedColumns::resolve(table);
    debug!(
        price = cols.price.map(|f| f.name),
        shares = cols.shares_uncapped.map(|f| f.name),
        shares_capped = cols.shares_capped.map(|f| f.name),
        volume = cols.volume.map(|f| f.name),
        "resolved vendor columns"
    );

    let mut warnings = Vec::new();
    let mut missing_tickers = 0usize;
    let mut out_of_range = 0usize;

    let mut constituents: Vec<Constituent> = table
        .iter()
        .map(|row| {
            let ticker = fields::read_text(row, cols.ticker)
                .map(|t| t.to_uppercase())
                .unwrap_or_else(|| {
                    missing_tickers += 1;
                    String::new()
                });
            let issuer_text = fields::read_text(row, cols.issuer);
            let name = fields::read_text(row, cols.name)
                .or_else(|| issuer_text.clone())
                .unwrap_or_else(|| ticker.clone());
            let issuer = issuer_text.unwrap_or_else(|| name.to_uppercase());

            let price = fields::read_decimal(row, cols.price);
            let shares_uncapped = fields::read_decimal(row, cols.shares_uncapped);
            let shares_capped = fields::read_decimal(row, cols.shares_capped);
            let (market_cap_uncapped, market_cap_capped) = match (
                market_cap(price, shares_uncapped),
                market_cap(price, shares_capped),
            ) {
                (Some(uncapped), Some(capped)) => (uncapped, capped),
                _ => {
                    out_of_range += 1;
                    (Decimal::ZERO, Decimal::ZERO)
                }
            };

            Constituent {
                ticker,
                issuer,
                name,
                price,
                shares_uncapped,
                shares_capped,
                average_daily_volume: fields::read_decimal(row, cols.volume),
                market_cap_uncapped,
                market_cap_capped,
                current_weight_uncapped: cols
                    .current_uncapped
                    .map(|f| fields::read_decimal(row, Some(f))),
                current_weight_capped: cols
                    .current_capped
                    .map(|f| fields::read_decimal(row, Some(f))),
            }
        })
        .collect();

    if missing_tickers > 0 {
        warnings.push(format!("{missing_tickers} row(s) have no ticker"));
    }
    if out_of_range > 0 {
        warn!(rows = out_of_range, "market cap out of range, treated as zero");
        warnings.push(format!(
            "{out_of_range} row(s) have a market cap out of range; treated as zero"
        ));
    }

    let total_uncapped: Money = constituents.iter().map(|c| c.market_cap_uncapped).sum();
    let total_capped: Money = constituents.iter().map(|c| c.market_cap_capped).sum();

    // No capped share data: capped basis degrades to uncapped.
    if total_capped.is_zero() && total_uncapped > Decimal::ZERO {
        warn!("no capped share counts in snapshot, using uncapped shares for the capped basis");
        warnings.push("Capped share counts unavailable; capped basis equals uncapped".into());
        for c in &mut constituents {
            c.shares_capped = c.shares_uncapped;
            c.market_cap_capped = c.market_cap_uncapped;
        }
    }

    // No share counts at all: the published index weight stands in for market cap.
    if total_uncapped.is_zero() {
        if let Some(proxy) = cols.weight_proxy {
            let proxies: Vec<Decimal> = table
                .iter()
                .map(|row| fields::read_decimal(row, Some(proxy)))
                .map(|w| if w <= MARKET_CAP_CEILING { w } else { Decimal::ZERO })
                .collect();
            let proxy_total: Decimal = proxies.iter().copied().sum();
            if proxy_total > Decimal::ZERO {
                warn!(field = proxy.name, "market cap is zero, using index weight as proxy");
                warnings.push(format!(
                    "Market cap unavailable; '{}' used as market-cap proxy",
                    proxy.name
                ));
                for (c, w) in constituents.iter_mut().zip(proxies) {
                    c.market_cap_uncapped = w;
                    c.market_cap_capped = w;
                    c.shares_uncapped = Decimal::ONE;
                }
            }
        }
    }

    Ok(NormalizedTable {
        constituents,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    fn table(rows: Vec<Value>) -> Vec<RawRow> {
        rows.into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_reject_empty_table() {
        assert!(normalize(&[]).is_err());
    }

    #[test]
    fn test_market_caps_on_both_bases() {
        let t = table(vec![json!({
            "ticker": "novo b", "name": "Novo Nordisk", "price": "500",
            "shares": 1000, "shares_capped": 400, "avg_vol_30d_millions": 2
        })]);
        let out = normalize(&t).unwrap();
        let c = &out.constituents[0];
        assert_eq!(c.ticker, "NOVO B");
        assert_eq!(c.issuer, "NOVO NORDISK");
        assert_eq!(c.market_cap_uncapped, dec!(500000));
        assert_eq!(c.market_cap_capped, dec!(200000));
        assert_eq!(c.average_daily_volume, dec!(2000000));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_garbage_numbers_become_zero() {
        let t = table(vec![
            json!({"ticker": "A", "name": "A", "price": "abc", "shares": null}),
            json!({"ticker": "B", "name": "B", "price": 10, "shares": 5}),
        ]);
        let out = normalize(&t).unwrap();
        assert_eq!(out.constituents[0].price, Decimal::ZERO);
        assert_eq!(out.constituents[0].market_cap_uncapped, Decimal::ZERO);
        assert_eq!(out.constituents[1].market_cap_uncapped, dec!(50));
    }

    #[test]
    fn test_missing_capped_shares_fall_back_to_uncapped() {
        let t = table(vec![
            json!({"ticker": "A", "name": "A", "price": 10, "shares": 5}),
            json!({"ticker": "B", "name": "B", "price": 20, "shares": 5}),
        ]);
        let out = normalize(&t).unwrap();
        for c in &out.constituents {
            assert_eq!(c.shares_capped, c.shares_uncapped);
            assert_eq!(c.market_cap_capped, c.market_cap_uncapped);
        }
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_overflowing_market_cap_is_zeroed() {
        let t = table(vec![
            json!({"ticker": "HUGE", "name": "Huge", "price": "1e20", "shares": "1e20"}),
            json!({"ticker": "B", "name": "B", "price": 10, "shares": 5}),
        ]);
        let out = normalize(&t).unwrap();
        assert_eq!(out.constituents[0].market_cap_uncapped, Decimal::ZERO);
        assert_eq!(out.constituents[0].market_cap_capped, Decimal::ZERO);
        assert_eq!(out.constituents[1].market_cap_uncapped, dec!(50));
        assert_eq!(out.total_market_cap_uncapped(), dec!(50));
        assert!(out.warnings.iter().any(|w| w.contains("out of range")));
    }

    #[test]
    fn test_market_cap_above_ceiling_is_zeroed() {
        let t = table(vec![
            json!({"ticker": "A", "name": "A", "price": "1e12", "shares": "1e12"}),
            json!({"ticker": "B", "name": "B", "price": 10, "shares": 5}),
        ]);
        let out = normalize(&t).unwrap();
        assert_eq!(out.constituents[0].market_cap_uncapped, Decimal::ZERO);
        assert_eq!(out.constituents[0].price, dec!(1000000000000));
        assert_eq!(out.warnings.len(), 2);
    }

    #[test]
    fn test_weight_proxy_when_no_shares() {
        let t = table(vec![
            json!({"ticker": "A", "name": "A", "price": 10, "omx_weight": 60}),
            json!({"ticker": "B", "name": "B", "price": 20, "omx_weight": 40}),
        ]);
        let out = normalize(&t).unwrap();
        assert_eq!(out.constituents[0].market_cap_uncapped, dec!(0.60));
        assert_eq!(out.constituents[1].market_cap_capped, dec!(0.40));
        assert_eq!(out.constituents[0].shares_uncapped, Decimal::ONE);
        assert!(out.warnings.iter().any(|w| w.contains("proxy")));
    }

    #[test]
    fn test_zero_proxy_leaves_market_cap_zero() {
        let t = table(vec![json!({"ticker": "A", "name": "A", "omx_weight": 0})]);
        let out = normalize(&t).unwrap();
        assert_eq!(out.total_market_cap_uncapped(), Decimal::ZERO);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_explicit_issuer_groups_share_classes() {
        let t = table(vec![
            json!({"ticker": "MAERSK A", "name": "A.P. Moller A", "issuer": "A.P. Moller - Maersk", "price": 1, "shares": 1}),
            json!({"ticker": "MAERSK B", "name": "A.P. Moller B", "issuer": "A.P. Moller - Maersk", "price": 1, "shares": 1}),
        ]);
        let out = normalize(&t).unwrap();
        assert_eq!(out.constituents[0].issuer, out.constituents[1].issuer);
        assert_eq!(out.constituents[0].issuer, "A.P. Moller - Maersk");
    }

    #[test]
    fn test_name_falls_back_to_issuer() {
        let t = table(vec![json!({"ticker": "x", "issuer": "Xcorp", "price": 1, "shares": 1})]);
        let out = normalize(&t).unwrap();
        assert_eq!(out.constituents[0].name, "Xcorp");
    }

    #[test]
    fn test_missing_ticker_is_reported() {
        let t = table(vec![json!({"name": "Nameless", "price": 1, "shares": 1})]);
        let out = normalize(&t).unwrap();
        assert_eq!(out.constituents[0].ticker, "");
        assert!(out.warnings.iter().any(|w| w.contains("no ticker")));
    }

    #[test]
    fn test_current_weights_only_when_present() {
        let t = table(vec![
            json!({"ticker": "A", "name": "A", "price": 1, "shares": 1, "omx_weight_capped": 4.5}),
            json!({"ticker": "B", "name": "B", "price": 1, "shares": 1}),
        ]);
        let out = normalize(&t).unwrap();
        assert_eq!(out.constituents[0].current_weight_capped, Some(dec!(0.045)));
        assert_eq!(out.constituents[1].current_weight_capped, Some(Decimal::ZERO));
        assert_eq!(out.constituents[0].current_weight_uncapped, None);
    }
}
