//! Issuer-to-constituent distribution.
//!
//! Each listing receives its issuer's target weight scaled by the listing's
//! share of the issuer's market cap, separately on the uncapped and capped
//! share basis.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::aggregate::share_of;
use crate::ingest::Constituent;
use crate::types::{Money, Rate};

/// Constituent-level share of the issuer target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributedWeight {
    pub ticker: String,
    pub issuer: String,
    /// Row market cap / issuer market cap, uncapped basis.
    pub issuer_share_uncapped: Rate,
    /// Row market cap / issuer market cap, capped basis.
    pub issuer_share_capped: Rate,
    /// Issuer target distributed on the uncapped basis.
    pub weight: Rate,
    /// Issuer target distributed on the capped basis.
    pub capped_weight: Rate,
}

/// Distribute issuer targets to constituents, preserving input row order.
/// Issuers missing from `targets` receive zero.
pub fn distribute(
    constituents: &[Constituent],
    targets: &HashMap<&str, Rate>,
) -> Vec<DistributedWeight> {
    let mut totals: HashMap<&str, (Money, Money)> = HashMap::new();
    for c in constituents {
        let entry = totals
            .entry(c.issuer.as_str())
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 += c.market_cap_uncapped;
        entry.1 += c.market_cap_capped;
    }

    constituents
        .iter()
        .map(|c| {
            let (issuer_uncapped, issuer_capped) = totals
                .get(c.issuer.as_str())
                .copied()
                .unwrap_or((Decimal::ZERO, Decimal::ZERO));
            let target = targets
                .get(c.issuer.as_str())
                .copied()
                .unwrap_or(Decimal::ZERO);
            let share_uncapped = share_of(c.market_cap_uncapped, issuer_uncapped);
            let share_capped = share_of(c.market_cap_capped, issuer_capped);
            DistributedWeight {
                ticker: c.ticker.clone(),
                issuer: c.issuer.clone(),
                issuer_share_uncapped: share_uncapped,
                issuer_share_capped: share_capped,
                weight: target * share_uncapped,
                capped_weight: target * share_capped,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    fn row(ticker: &str, issuer: &str, uncapped: Decimal, capped: Decimal) -> Constituent {
        Constituent {
            ticker: ticker.into(),
            issuer: issuer.into(),
            name: ticker.into(),
            price: dec!(1),
            shares_uncapped: uncapped,
            shares_capped: capped,
            average_daily_volume: Decimal::ZERO,
            market_cap_uncapped: uncapped,
            market_cap_capped: capped,
            current_weight_uncapped: None,
            current_weight_capped: None,
        }
    }

    #[test]
    fn test_share_classes_split_issuer_target() {
        let rows = vec![
            row("MAERSK A", "MAERSK", dec!(100), dec!(100)),
            row("MAERSK B", "MAERSK", dec!(300), dec!(100)),
            row("NOVO B", "NOVO", dec!(500), dec!(500)),
        ];
        let targets: HashMap<&str, Rate> = [("MAERSK", dec!(0.07)), ("NOVO", dec!(0.045))]
            .into_iter()
            .collect();
        let out = distribute(&rows, &targets);

        assert_eq!(out[0].weight, dec!(0.0175));
        assert_eq!(out[1].weight, dec!(0.0525));
        assert_eq!(out[0].capped_weight, dec!(0.035));
        assert_eq!(out[1].capped_weight, dec!(0.035));
        assert_eq!(out[2].weight, dec!(0.045));
        assert!(out[1].weight > out[0].weight);
    }

    #[test]
    fn test_rows_sum_to_issuer_target() {
        let rows = vec![
            row("X1", "X", dec!(7), dec!(3)),
            row("X2", "X", dec!(11), dec!(5)),
            row("X3", "X", dec!(13), dec!(0)),
        ];
        let targets: HashMap<&str, Rate> = [("X", dec!(0.0612))].into_iter().collect();
        let out = distribute(&rows, &targets);
        let uncapped: Decimal = out.iter().map(|d| d.weight).sum();
        let capped: Decimal = out.iter().map(|d| d.capped_weight).sum();
        assert!(approx_eq(uncapped, dec!(0.0612), dec!(0.000001)));
        assert!(approx_eq(capped, dec!(0.0612), dec!(0.000001)));
    }

    #[test]
    fn test_zero_issuer_market_cap_gives_zero() {
        let rows = vec![row("Z", "Z", dec!(0), dec!(0))];
        let targets: HashMap<&str, Rate> = [("Z", dec!(0.05))].into_iter().collect();
        let out = distribute(&rows, &targets);
        assert_eq!(out[0].weight, Decimal::ZERO);
        assert_eq!(out[0].capped_weight, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_issuer_gets_zero() {
        let rows = vec![row("Q", "Q", dec!(10), dec!(10))];
        let out = distribute(&rows, &HashMap::new());
        assert_eq!(out[0].weight, Decimal::ZERO);
        assert_eq!(out[0].issuer_share_uncapped, Decimal::ONE);
    }
}
