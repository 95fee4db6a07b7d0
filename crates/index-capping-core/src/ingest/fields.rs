//! Vendor field resolution.
//!
//! The market-data snapshot arrives with whatever column names the vendor
//! endpoint produced for a given deployment: formula expressions, their
//! snake-cased HTTP variants, or already-harmonised names. Each canonical
//! field is described by an ordered list of candidate source names together
//! with the unit the source is expressed in. [`resolve_field`] picks the
//! first candidate that actually carries data; [`read_decimal`] reads and
//! rescales it per row, defaulting to zero.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::str::FromStr;

use crate::types::RawRow;

/// Unit a vendor field is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Ones,
    Millions,
    /// Percentage points (4.5 = 4.5%), rescaled to a fraction.
    Percent,
}

impl Unit {
    pub fn factor(self) -> Decimal {
        match self {
            Unit::Ones => Decimal::ONE,
            Unit::Millions => dec!(1000000),
            Unit::Percent => dec!(0.01),
        }
    }
}

/// A candidate source column for a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCandidate {
    pub name: &'static str,
    pub unit: Unit,
}

const fn ones(name: &'static str) -> FieldCandidate {
    FieldCandidate { name, unit: Unit::Ones }
}

const fn millions(name: &'static str) -> FieldCandidate {
    FieldCandidate { name, unit: Unit::Millions }
}

const fn percent(name: &'static str) -> FieldCandidate {
    FieldCandidate { name, unit: Unit::Percent }
}

pub const TICKER: &[FieldCandidate] = &[
    ones("ticker"),
    ones("FSYM_TICKER_EXCHANGE(0,\"ID\")"),
    ones("fsym_ticker_exchange_0_id_"),
];

pub const NAME: &[FieldCandidate] = &[
    ones("name"),
    ones("FG_COMPANY_NAME"),
    ones("fg_company_name"),
];

pub const ISSUER: &[FieldCandidate] = &[ones("issuer")];

pub const PRICE: &[FieldCandidate] = &[
    ones("price"),
    ones("FG_PRICE(NOW)"),
    ones("fg_price_now_"),
];

pub const SHARES_UNCAPPED: &[FieldCandidate] = &[ones("shares"), ones("shares_uncapped")];

pub const SHARES_CAPPED: &[FieldCandidate] = &[ones("shares_capped")];

/// Average daily volume, resolved to a share count.
pub const AVERAGE_DAILY_VOLUME: &[FieldCandidate] = &[
    ones("average_daily_volume"),
    ones("avg_daily_volume"),
    millions("avg_vol_30d_millions"),
    millions("avg_30d_volume_millions_raw"),
    millions("avg_30d_volume_millions"),
    ones("avg_30d_volume_shares"),
    millions("avg_vol_30d"),
    millions("avg_30d_volume"),
    ones("volume_last"),
];

pub const CURRENT_WEIGHT_UNCAPPED: &[FieldCandidate] =
    &[percent("omx_weight"), ones("current_weight")];

pub const CURRENT_WEIGHT_CAPPED: &[FieldCandidate] =
    &[percent("omx_weight_capped"), ones("current_capped_weight")];

/// Proportional index weight used as a market-cap proxy when share counts are missing.
pub const WEIGHT_PROXY: &[FieldCandidate] = &[percent("omx_weight")];

/// First candidate with at least one non-null value anywhere in the table.
pub fn resolve_field<'c>(
    table: &[RawRow],
    candidates: &'c [FieldCandidate],
) -> Option<&'c FieldCandidate> {
    candidates.iter().find(|c| {
        table
            .iter()
            .any(|row| row.get(c.name).is_some_and(|v| !v.is_null()))
    })
}

/// Coerce a JSON value into a non-negative decimal; anything unparsable is zero.
pub fn coerce_decimal(value: Option<&Value>) -> Decimal {
    let parsed = match value {
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(Value::String(s)) => parse_decimal(s),
        _ => None,
    };
    match parsed {
        Some(d) if d > Decimal::ZERO => d,
        _ => Decimal::ZERO,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Read a resolved numeric field from a row in canonical units.
///
/// A value that overflows when rescaled reads as zero.
pub fn read_decimal(row: &RawRow, field: Option<&FieldCandidate>) -> Decimal {
    match field {
        Some(f) => coerce_decimal(row.get(f.name))
            .checked_mul(f.unit.factor())
            .unwrap_or(Decimal::ZERO),
        None => Decimal::ZERO,
    }
}

/// Read a resolved text field; blanks and nulls are `None`, numbers are stringified.
pub fn read_text(row: &RawRow, field: Option<&FieldCandidate>) -> Option<String> {
    let value = row.get(field?.name)?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
