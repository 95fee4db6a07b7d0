//! Run configuration for the capping pipeline.
//!
//! Everything region-dependent lives here as plain data: the rule parameters
//! used by the capping engine, the vendor symbols and currency of each
//! exchange, and the per-run options (index id, as-of date, methodology, AUM).
//! Callers build a [`RunConfig`] and hand it to the builders; nothing is read
//! from the process environment inside the core.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IndexCappingError;
use crate::types::{Money, Rate};
use crate::IndexCappingResult;

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// Exchange region / index universe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Region {
    /// Copenhagen
    #[default]
    CPH,
    /// Helsinki
    HEL,
    /// Stockholm
    STO,
    Other(String),
}

impl Region {
    pub fn code(&self) -> &str {
        match self {
            Region::CPH => "CPH",
            Region::HEL => "HEL",
            Region::STO => "STO",
            Region::Other(code) => code.as_str(),
        }
    }

    /// CPH and HEL share the 7% exception regime and the five quarterly top slots.
    fn is_cph_or_hel(&self) -> bool {
        matches!(self, Region::CPH | Region::HEL)
    }
}

impl From<String> for Region {
    fn from(s: String) -> Self {
        match s.trim().to_uppercase().as_str() {
            "" | "CPH" => Region::CPH,
            "HEL" => Region::HEL,
            "STO" => Region::STO,
            other => Region::Other(other.to_string()),
        }
    }
}

impl From<Region> for String {
    fn from(r: Region) -> Self {
        r.code().to_string()
    }
}

impl FromStr for Region {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Region::from(s.to_string()))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Index currency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    DKK,
    EUR,
    SEK,
    Other(String),
}

// ---------------------------------------------------------------------------
// Rule parameters
// ---------------------------------------------------------------------------

/// Capping methodology parameters for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleParameters {
    /// Standard per-issuer cap (4.5%).
    pub single_issuer_cap: Rate,
    /// Relaxed cap for issuers whose uncapped weight exceeds `exception_threshold`.
    pub exception_cap: Rate,
    /// Aggregate limit on exception-capped issuers.
    pub aggregate_exposure_limit: Rate,
    /// Uncapped weight above which an issuer is pinned to the exception cap (10%).
    pub exception_threshold: Rate,
    /// Weight above which an issuer counts toward the concentration limit (5%).
    pub concentration_threshold: Rate,
    /// Maximum aggregate weight of issuers above `concentration_threshold` (40%).
    pub concentration_limit: Rate,
    /// Number of largest issuers pinned to `quarterly_top_cap` at quarterly rebalance.
    pub top_n_exception_slots: usize,
    /// Cap applied to the quarterly top slots.
    pub quarterly_top_cap: Rate,
}

impl RuleParameters {
    /// Rule set for a region. Unknown regions get the CPH daily caps and no quarterly top slots.
    pub fn for_region(region: &Region) -> Self {
        let exception_cap = match region {
            Region::STO => dec!(0.09),
            _ => dec!(0.07),
        };
        let (top_n_exception_slots, quarterly_top_cap) = if region.is_cph_or_hel() {
            (5, dec!(0.07))
        } else {
            (0, dec!(0.045))
        };
        Self {
            single_issuer_cap: dec!(0.045),
            exception_cap,
            aggregate_exposure_limit: dec!(0.36),
            exception_threshold: dec!(0.10),
            concentration_threshold: dec!(0.05),
            concentration_limit: dec!(0.40),
            top_n_exception_slots,
            quarterly_top_cap,
        }
    }

    pub fn validate(&self) -> IndexCappingResult<()> {
        let rates = [
            ("single_issuer_cap", self.single_issuer_cap),
            ("exception_cap", self.exception_cap),
            ("aggregate_exposure_limit", self.aggregate_exposure_limit),
            ("exception_threshold", self.exception_threshold),
            ("concentration_threshold", self.concentration_threshold),
            ("concentration_limit", self.concentration_limit),
            ("quarterly_top_cap", self.quarterly_top_cap),
        ];
        for (field, value) in rates {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                return Err(IndexCappingError::InvalidInput {
                    field: field.into(),
                    reason: format!("must be in (0, 1], got {value}"),
                });
            }
        }
        if self.single_issuer_cap > self.exception_cap {
            return Err(IndexCappingError::InvalidInput {
                field: "single_issuer_cap".into(),
                reason: "standard cap cannot exceed the exception cap".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Region profile
// ---------------------------------------------------------------------------

/// Vendor-facing description of a region: currency, share-count symbols and
/// the fallback fund size used for quarterly trade estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionProfile {
    pub region: Region,
    pub currency: Currency,
    /// Index symbol carrying uncapped share counts.
    pub shares_symbol: String,
    /// Index symbol carrying capped share counts, when the exchange publishes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capped_symbol: Option<String>,
    /// Constituent universe expression for the vendor screen.
    pub universe: String,
    /// Fund AUM used when the run does not supply one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_aum: Option<Money>,
}

impl RegionProfile {
    pub fn for_region(region: &Region) -> Self {
        match region {
            Region::CPH => Self {
                region: Region::CPH,
                currency: Currency::DKK,
                shares_symbol: "OMXCALLS".into(),
                capped_symbol: Some("OMXCCAPX".into()),
                universe: "(FG_CONSTITUENTS(140476,0,CLOSE))=1".into(),
                default_aum: Some(dec!(110000000000)),
            },
            Region::HEL => Self {
                region: Region::HEL,
                currency: Currency::EUR,
                shares_symbol: "OMXHALLS".into(),
                capped_symbol: Some("OMXHCAPX".into()),
                universe: "(FG_CONSTITUENTS(188676,0,CLOSE))=1".into(),
                default_aum: Some(dec!(22000000000)),
            },
            Region::STO => Self {
                region: Region::STO,
                currency: Currency::SEK,
                shares_symbol: "OMXSALLS".into(),
                capped_symbol: None,
                universe: "(FG_CONSTITUENTS(OMXSALLS,0,CLOSE))=1".into(),
                default_aum: None,
            },
            Region::Other(code) => Self {
                region: Region::Other(code.clone()),
                currency: Currency::DKK,
                shares_symbol: "OMXCALLS".into(),
                capped_symbol: Some("OMXCCAPX".into()),
                universe: "(FG_CONSTITUENTS(187183,0,CLOSE))=1".into(),
                default_aum: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Options for a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Index identifier stamped on every output row (e.g. "KAXCAP").
    pub index_id: String,
    pub region: Region,
    pub as_of: NaiveDate,
    /// Use the quarterly exception methodology instead of daily capping.
    #[serde(default)]
    pub quarterly: bool,
    /// Fund AUM in index currency; falls back to the region default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aum: Option<Money>,
    /// Overrides the region's rule parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleParameters>,
}

impl RunConfig {
    pub fn new(index_id: impl Into<String>, region: Region, as_of: NaiveDate) -> Self {
        Self {
            index_id: index_id.into(),
            region,
            as_of,
            quarterly: false,
            aum: None,
            rules: None,
        }
    }

    pub fn rule_parameters(&self) -> RuleParameters {
        self.rules
            .clone()
            .unwrap_or_else(|| RuleParameters::for_region(&self.region))
    }

    pub fn profile(&self) -> RegionProfile {
        RegionProfile::for_region(&self.region)
    }

    /// Explicit positive AUM, else the region default, else zero.
    pub fn resolved_aum(&self) -> Money {
        match self.aum {
            Some(aum) if aum > Decimal::ZERO => aum,
            _ => self.profile().default_aum.unwrap_or(Decimal::ZERO),
        }
    }

    pub fn validate(&self) -> IndexCappingResult<()> {
        if self.index_id.trim().is_empty() {
            return Err(IndexCappingError::InvalidInput {
                field: "index_id".into(),
                reason: "index id must not be empty".into(),
            });
        }
        if let Some(aum) = self.aum {
            if aum < Decimal::ZERO {
                return Err(IndexCappingError::InvalidInput {
                    field: "aum".into(),
                    reason: format!("AUM cannot be negative, got {aum}"),
                });
            }
        }
        self.rule_parameters().validate()
    }
}
