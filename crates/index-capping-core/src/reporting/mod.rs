//! Output tables: daily status, issuer status and the quarterly proforma.
//!
//! Every builder runs the same linear pipeline (normalise, aggregate, cap,
//! distribute) and then derives its reporting-only fields.

pub mod flags;
pub mod issuer_status;
pub mod proforma;
pub mod status;

pub use flags::{detect_flags, render_flags, IssuerFlag};
pub use issuer_status::{build_issuer_status, IssuerStatusRow, IssuerStatusTable};
pub use proforma::{build_quarterly_proforma, ProformaRow, ProformaTable};
pub use status::{build_status, StatusRow, StatusTable};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::config::{RuleParameters, RunConfig};
use crate::ingest::{normalize, NormalizedTable};
use crate::types::{RawRow, Rate};
use crate::weighting::{
    aggregate_issuers, apply_capping, distribute, CappingMethod, CappingOutcome, CappingStatus,
    DistributedWeight, IssuerAggregate,
};
use crate::IndexCappingResult;

/// Tolerance for the sum-to-one check on issuer targets.
const SUM_TOLERANCE: Decimal = dec!(0.000001);

/// Intermediate results shared by the builders.
pub(crate) struct PipelineRun {
    pub table: NormalizedTable,
    pub issuers: Vec<IssuerAggregate>,
    pub outcome: CappingOutcome,
    pub distributed: Vec<DistributedWeight>,
    pub params: RuleParameters,
    pub warnings: Vec<String>,
}

pub(crate) fn run_pipeline(
    raw: &[RawRow],
    config: &RunConfig,
    method: CappingMethod,
) -> IndexCappingResult<PipelineRun> {
    config.validate()?;
    let params = config.rule_parameters();

    let table = normalize(raw)?;
    let issuers = aggregate_issuers(&table.constituents);
    let outcome = apply_capping(&issuers, &params, method)?;
    let distributed = distribute(&table.constituents, &outcome.weight_map());

    let mut warnings = table.warnings.clone();
    if outcome.status == CappingStatus::AggregateLimitUnresolved {
        warnings.push(format!(
            "Concentration limit of {} still breached: every issuer above {} holds the exception cap",
            params.concentration_limit, params.concentration_threshold
        ));
    }
    let total = outcome.total_weight();
    if table.total_market_cap_uncapped() > Decimal::ZERO
        && (total - Decimal::ONE).abs() > SUM_TOLERANCE
    {
        warnings.push(format!(
            "Issuer targets sum to {}; residual weight has no recipient",
            total.round_dp(6)
        ));
    }

    info!(
        index_id = %config.index_id,
        region = %config.region,
        constituents = table.constituents.len(),
        issuers = issuers.len(),
        passes = outcome.passes,
        ?method,
        "capping complete"
    );

    Ok(PipelineRun {
        table,
        issuers,
        outcome,
        distributed,
        params,
        warnings,
    })
}

/// Current capped weight per row: vendor value when published, else the
/// row's share of total capped market cap.
pub(crate) fn current_capped_weights(table: &NormalizedTable) -> Vec<Rate> {
    let total = table.total_market_cap_capped();
    table
        .constituents
        .iter()
        .map(|c| match c.current_weight_capped {
            Some(w) => w,
            None if total.is_zero() => Decimal::ZERO,
            None => c.market_cap_capped / total,
        })
        .collect()
}

/// Prices, share counts, volumes and currency amounts.
pub(crate) fn round_amount(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// Weights and weight deltas.
pub(crate) fn round_weight(value: Decimal) -> Decimal {
    value.round_dp(4)
}
