//! Issuer aggregation, capping and distribution back to constituents.

pub mod aggregate;
pub mod capping;
pub mod distribute;

pub use aggregate::{aggregate_issuers, IssuerAggregate};
pub use capping::{
    apply_capping, apply_daily_capping, apply_quarterly_capping, CappingMethod, CappingOutcome,
    CappingStatus, IssuerTarget, PinKind,
};
pub use distribute::{distribute, DistributedWeight};
