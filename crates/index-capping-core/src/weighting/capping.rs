//! Issuer capping engine.
//!
//! Covers:
//! 1. **Daily capping** -- issuers above the exception threshold are pinned to
//!    the exception cap; while issuers above the concentration threshold sum
//!    to more than the concentration limit, the *smallest* of them is pinned
//!    to the standard cap.
//! 2. **Quarterly exception capping** -- the top N issuers are pinned to the
//!    top-slot cap; any other issuer above the standard cap is pinned to it,
//!    *largest* first.
//!
//! Both variants share one recurrence: a pin set is carried between passes,
//! each pass redistributes the unpinned capacity `1 - sum(pins)` pro-rata over
//! the unpinned issuers' initial weights, and either returns or produces a
//! new pin set with exactly one more issuer. The pass count is therefore
//! bounded by the issuer count; the guard below turns anything else into a
//! `ConvergenceFailure`.
//!
//! When every issuer ends up pinned the unassigned residual is left
//! unassigned and the targets sum to less than one.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use super::aggregate::IssuerAggregate;
use crate::config::RuleParameters;
use crate::error::IndexCappingError;
use crate::types::Rate;
use crate::IndexCappingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Capping methodology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CappingMethod {
    Daily,
    QuarterlyException,
}

/// Which cap an issuer is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinKind {
    /// Relaxed cap for issuers above the exception threshold (daily).
    Exception,
    /// Standard single-issuer cap.
    Standard,
    /// Quarterly top-slot cap.
    TopSlot,
}

/// How the engine terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CappingStatus {
    Converged,
    /// Daily only: the concentration limit is still breached but every issuer
    /// above the threshold already holds the exception cap.
    AggregateLimitUnresolved,
}

/// Final target weight for one issuer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerTarget {
    pub issuer: String,
    pub initial_weight: Rate,
    pub target_weight: Rate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<PinKind>,
    /// Pass after which the pin was applied; 0 for pins set before the first pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_in_pass: Option<u32>,
}

/// Output of a capping run, in descending initial-weight order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CappingOutcome {
    pub method: CappingMethod,
    pub targets: Vec<IssuerTarget>,
    pub passes: u32,
    pub status: CappingStatus,
}

impl CappingOutcome {
    /// issuer -> target weight
    pub fn weight_map(&self) -> HashMap<&str, Rate> {
        self.targets
            .iter()
            .map(|t| (t.issuer.as_str(), t.target_weight))
            .collect()
    }

    pub fn target_for(&self, issuer: &str) -> Option<&IssuerTarget> {
        self.targets.iter().find(|t| t.issuer == issuer)
    }

    pub fn total_weight(&self) -> Rate {
        self.targets.iter().map(|t| t.target_weight).sum()
    }
}

// ---------------------------------------------------------------------------
// Pin set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pin {
    cap: Rate,
    kind: PinKind,
    pass: u32,
}

/// Immutable issuer -> pin map; `with` yields the next generation.
#[derive(Debug, Clone, Default, PartialEq)]
struct PinSet(BTreeMap<String, Pin>);

impl PinSet {
    fn with(&self, issuer: &str, cap: Rate, kind: PinKind, pass: u32) -> Self {
        let mut next = self.0.clone();
        next.insert(issuer.to_string(), Pin { cap, kind, pass });
        Self(next)
    }

    fn get(&self, issuer: &str) -> Option<&Pin> {
        self.0.get(issuer)
    }

    fn is_pinned(&self, issuer: &str) -> bool {
        self.0.contains_key(issuer)
    }

    fn total(&self) -> Rate {
        self.0.values().map(|p| p.cap).sum()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Run the capping engine with the given methodology.
pub fn apply_capping(
    issuers: &[IssuerAggregate],
    params: &RuleParameters,
    method: CappingMethod,
) -> IndexCappingResult<CappingOutcome> {
    match method {
        CappingMethod::Daily => apply_daily_capping(issuers, params),
        CappingMethod::QuarterlyException => apply_quarterly_capping(issuers, params),
    }
}

/// Daily capping: exception pins for the largest issuers, then standard pins
/// smallest-first until the concentration limit holds.
pub fn apply_daily_capping(
    issuers: &[IssuerAggregate],
    params: &RuleParameters,
) -> IndexCappingResult<CappingOutcome> {
    let ranked = rank_by_initial_weight(issuers);

    let mut pins = ranked
        .iter()
        .filter(|i| i.initial_weight_uncapped > params.exception_threshold)
        .fold(PinSet::default(), |pins, i| {
            pins.with(&i.issuer, params.exception_cap, PinKind::Exception, 0)
        });

    let max_passes = ranked.len() as u32 + 1;
    for pass in 1..=max_passes {
        let tentative = tentative_weights(&ranked, &pins);

        let concentrated: Vec<(usize, Rate)> = tentative
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, w)| *w > params.concentration_threshold)
            .collect();
        let aggregate: Rate = concentrated.iter().map(|(_, w)| *w).sum();
        debug!(pass, %aggregate, pinned = pins.len(), "daily capping pass");

        if aggregate <= params.concentration_limit {
            return Ok(build_outcome(
                CappingMethod::Daily,
                &ranked,
                &pins,
                tentative,
                pass,
                CappingStatus::Converged,
            ));
        }

        // Smallest unpinned issuer above the threshold; first in rank order on ties.
        let candidate = concentrated
            .iter()
            .filter(|(idx, _)| !pins.is_pinned(&ranked[*idx].issuer))
            .min_by(|a, b| a.1.cmp(&b.1));

        match candidate {
            Some(&(idx, weight)) => {
                debug!(issuer = %ranked[idx].issuer, %weight, "pinning to standard cap");
                pins = pins.with(
                    &ranked[idx].issuer,
                    params.single_issuer_cap,
                    PinKind::Standard,
                    pass,
                );
            }
            None => {
                warn!(
                    %aggregate,
                    limit = %params.concentration_limit,
                    "concentration limit unresolved, no issuer left to pin"
                );
                return Ok(build_outcome(
                    CappingMethod::Daily,
                    &ranked,
                    &pins,
                    tentative,
                    pass,
                    CappingStatus::AggregateLimitUnresolved,
                ));
            }
        }
    }

    Err(IndexCappingError::ConvergenceFailure {
        function: "daily_capping".into(),
        iterations: max_passes,
    })
}

/// Quarterly exception capping: top-slot pins, then standard pins
/// largest-first until no unpinned issuer exceeds the standard cap.
pub fn apply_quarterly_capping(
    issuers: &[IssuerAggregate],
    params: &RuleParameters,
) -> IndexCappingResult<CappingOutcome> {
    let ranked = rank_by_initial_weight(issuers);

    let mut pins = ranked
        .iter()
        .take(params.top_n_exception_slots)
        .fold(PinSet::default(), |pins, i| {
            pins.with(&i.issuer, params.quarterly_top_cap, PinKind::TopSlot, 0)
        });

    let max_passes = ranked.len() as u32 + 1;
    for pass in 1..=max_passes {
        let tentative = tentative_weights(&ranked, &pins);

        // Largest violator; `min_by` on reversed order keeps the first on ties.
        let violator = tentative
            .iter()
            .copied()
            .enumerate()
            .filter(|(idx, w)| {
                !pins.is_pinned(&ranked[*idx].issuer) && *w > params.single_issuer_cap
            })
            .min_by(|a, b| b.1.cmp(&a.1));

        match violator {
            Some((idx, weight)) => {
                debug!(pass, issuer = %ranked[idx].issuer, %weight, "pinning to standard cap");
                pins = pins.with(
                    &ranked[idx].issuer,
                    params.single_issuer_cap,
                    PinKind::Standard,
                    pass,
                );
            }
            None => {
                debug!(pass, pinned = pins.len(), "quarterly capping converged");
                return Ok(build_outcome(
                    CappingMethod::QuarterlyException,
                    &ranked,
                    &pins,
                    tentative,
                    pass,
                    CappingStatus::Converged,
                ));
            }
        }
    }

    Err(IndexCappingError::ConvergenceFailure {
        function: "quarterly_capping".into(),
        iterations: max_passes,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Stable sort by initial uncapped weight, descending.
fn rank_by_initial_weight(issuers: &[IssuerAggregate]) -> Vec<&IssuerAggregate> {
    let mut ranked: Vec<&IssuerAggregate> = issuers.iter().collect();
    ranked.sort_by(|a, b| b.initial_weight_uncapped.cmp(&a.initial_weight_uncapped));
    ranked
}

/// Pinned issuers keep their cap; the rest share `1 - sum(pins)` pro-rata by initial weight.
fn tentative_weights(ranked: &[&IssuerAggregate], pins: &PinSet) -> Vec<Rate> {
    let remaining = (Decimal::ONE - pins.total()).max(Decimal::ZERO);
    let free_total: Rate = ranked
        .iter()
        .filter(|i| !pins.is_pinned(&i.issuer))
        .map(|i| i.initial_weight_uncapped)
        .sum();
    let free_total = if free_total.is_zero() {
        Decimal::ONE
    } else {
        free_total
    };

    ranked
        .iter()
        .map(|i| match pins.get(&i.issuer) {
            Some(pin) => pin.cap,
            None => i.initial_weight_uncapped / free_total * remaining,
        })
        .collect()
}

fn build_outcome(
    method: CappingMethod,
    ranked: &[&IssuerAggregate],
    pins: &PinSet,
    tentative: Vec<Rate>,
    passes: u32,
    status: CappingStatus,
) -> CappingOutcome {
    let targets = ranked
        .iter()
        .zip(tentative)
        .map(|(i, w)| {
            let pin = pins.get(&i.issuer);
            IssuerTarget {
                issuer: i.issuer.clone(),
                initial_weight: i.initial_weight_uncapped,
                target_weight: w,
                pin: pin.map(|p| p.kind),
                pinned_in_pass: pin.map(|p| p.pass),
            }
        })
        .collect();
    CappingOutcome {
        method,
        targets,
        passes,
        status,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
