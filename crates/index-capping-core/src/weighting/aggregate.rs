//! Issuer aggregation.
//!
//! Caps apply per issuer, not per listing. Share classes of the same issuer
//! are summed here and each issuer receives its market-cap-proportional
//! initial weight on both share bases.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ingest::Constituent;
use crate::types::{Money, Rate};

/// Issuer-level market cap totals and initial weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerAggregate {
    pub issuer: String,
    pub market_cap_uncapped: Money,
    pub market_cap_capped: Money,
    pub initial_weight_uncapped: Rate,
    pub initial_weight_capped: Rate,
    pub constituent_count: usize,
}

/// Group constituents by issuer, sorted by descending uncapped market cap
/// (ties broken by issuer id so candidate order is reproducible).
pub fn aggregate_issuers(constituents: &[Constituent]) -> Vec<IssuerAggregate> {
    let mut grouped: BTreeMap<&str, (Money, Money, usize)> = BTreeMap::new();
    for c in constituents {
        let entry = grouped
            .entry(c.issuer.as_str())
            .or_insert((Decimal::ZERO, Decimal::ZERO, 0));
        entry.0 += c.market_cap_uncapped;
        entry.1 += c.market_cap_capped;
        entry.2 += 1;
    }

    let total_uncapped: Money = grouped.values().map(|g| g.0).sum();
    let total_capped: Money = grouped.values().map(|g| g.1).sum();

    let mut issuers: Vec<IssuerAggregate> = grouped
        .into_iter()
        .map(|(issuer, (uncapped, capped, count))| IssuerAggregate {
            issuer: issuer.to_string(),
            market_cap_uncapped: uncapped,
            market_cap_capped: capped,
            initial_weight_uncapped: share_of(uncapped, total_uncapped),
            initial_weight_capped: share_of(capped, total_capped),
            constituent_count: count,
        })
        .collect();

    issuers.sort_by(|a, b| {
        b.market_cap_uncapped
            .cmp(&a.market_cap_uncapped)
            .then_with(|| a.issuer.cmp(&b.issuer))
    });
    issuers
}

/// `part / total`, zero when the total is zero.
pub(crate) fn share_of(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        Decimal::ZERO
    } else {
        part / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    fn row(ticker: &str, issuer: &str, mcap: Decimal, mcap_capped: Decimal) -> Constituent {
        Constituent {
            ticker: ticker.into(),
            issuer: issuer.into(),
            name: issuer.into(),
            price: dec!(1),
            shares_uncapped: mcap,
            shares_capped: mcap_capped,
            average_daily_volume: Decimal::ZERO,
            market_cap_uncapped: mcap,
            market_cap_capped: mcap_capped,
            current_weight_uncapped: None,
            current_weight_capped: None,
        }
    }

    #[test]
    fn test_share_classes_are_summed() {
        let rows = vec![
            row("MAERSK A", "MAERSK", dec!(100), dec!(50)),
            row("MAERSK B", "MAERSK", dec!(300), dec!(150)),
            row("NOVO B", "NOVO", dec!(600), dec!(300)),
        ];
        let issuers = aggregate_issuers(&rows);
        assert_eq!(issuers.len(), 2);
        assert_eq!(issuers[0].issuer, "NOVO");
        assert_eq!(issuers[1].market_cap_uncapped, dec!(400));
        assert_eq!(issuers[1].constituent_count, 2);
        assert_eq!(issuers[1].initial_weight_uncapped, dec!(0.4));
        assert_eq!(issuers[1].initial_weight_capped, dec!(0.4));
    }

    #[test]
    fn test_weights_sum_to_one() {
        let rows = vec![
            row("A", "A", dec!(7), dec!(7)),
            row("B", "B", dec!(11), dec!(3)),
            row("C", "C", dec!(13), dec!(1)),
        ];
        let issuers = aggregate_issuers(&rows);
        let total: Decimal = issuers.iter().map(|i| i.initial_weight_uncapped).sum();
        let total_capped: Decimal = issuers.iter().map(|i| i.initial_weight_capped).sum();
        assert!(approx_eq(total, Decimal::ONE, dec!(0.000001)));
        assert!(approx_eq(total_capped, Decimal::ONE, dec!(0.000001)));
    }

    #[test]
    fn test_zero_total_gives_zero_weights() {
        let rows = vec![row("A", "A", dec!(0), dec!(0)), row("B", "B", dec!(0), dec!(0))];
        let issuers = aggregate_issuers(&rows);
        assert!(issuers
            .iter()
            .all(|i| i.initial_weight_uncapped.is_zero() && i.initial_weight_capped.is_zero()));
    }

    #[test]
    fn test_sorted_descending_with_stable_ties() {
        let rows = vec![
            row("B", "B", dec!(10), dec!(10)),
            row("A", "A", dec!(10), dec!(10)),
            row("C", "C", dec!(20), dec!(20)),
        ];
        let order: Vec<String> = aggregate_issuers(&rows).into_iter().map(|i| i.issuer).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }
}
