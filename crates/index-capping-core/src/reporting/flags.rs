//! Rule-breach annotations on the current capped weights.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::config::RuleParameters;
use crate::types::Rate;

const BREACH_EPSILON: Decimal = dec!(0.000000001);

/// A methodology breach on an issuer's current capped weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssuerFlag {
    /// Uncapped weight above the exception threshold and current weight above the exception cap.
    ExceptionBreach { threshold: Rate },
    /// Issuers above the concentration threshold exceed the concentration limit; cut this one.
    ConcentrationBreach { limit: Rate, cut_to: Rate },
}

fn pct(rate: Rate) -> Decimal {
    (rate * dec!(100)).normalize()
}

impl fmt::Display for IssuerFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuerFlag::ExceptionBreach { threshold } => write!(f, "{}% breach", pct(*threshold)),
            IssuerFlag::ConcentrationBreach { limit, cut_to } => {
                write!(f, "{}% breach — cut to {}%", pct(*limit), pct(*cut_to))
            }
        }
    }
}

/// Flag issuers given their initial uncapped weights and current capped weights.
///
/// The concentration flag goes to the smallest issuer above the threshold that
/// is not itself above the exception threshold (ties by issuer id).
pub fn detect_flags(
    initial_weights: &HashMap<&str, Rate>,
    current_weights: &BTreeMap<String, Rate>,
    params: &RuleParameters,
) -> BTreeMap<String, Vec<IssuerFlag>> {
    let mut flags: BTreeMap<String, Vec<IssuerFlag>> = BTreeMap::new();
    let initial = |issuer: &str| initial_weights.get(issuer).copied().unwrap_or(Decimal::ZERO);

    for (issuer, current) in current_weights {
        if initial(issuer) > params.exception_threshold
            && *current > params.exception_cap + BREACH_EPSILON
        {
            flags
                .entry(issuer.clone())
                .or_default()
                .push(IssuerFlag::ExceptionBreach {
                    threshold: params.exception_threshold,
                });
        }
    }

    let mut concentrated: Vec<(&String, Rate)> = current_weights
        .iter()
        .filter(|(_, w)| **w > params.concentration_threshold)
        .map(|(i, w)| (i, *w))
        .collect();
    let aggregate: Rate = concentrated
        .iter()
        .fold(Decimal::ZERO, |acc, (_, w)| acc.saturating_add(*w));
    if aggregate > params.concentration_limit + BREACH_EPSILON {
        concentrated.sort_by(|a, b| a.1.cmp(&b.1));
        if let Some((issuer, _)) = concentrated
            .iter()
            .find(|(issuer, _)| initial(issuer) <= params.exception_threshold)
        {
            flags
                .entry((*issuer).clone())
                .or_default()
                .push(IssuerFlag::ConcentrationBreach {
                    limit: params.concentration_limit,
                    cut_to: params.single_issuer_cap,
                });
        }
    }

    flags
}

/// Comma-joined flag text for persistence.
pub fn render_flags(flags: Option<&Vec<IssuerFlag>>) -> String {
    flags
        .map(|fs| {
            fs.iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}
