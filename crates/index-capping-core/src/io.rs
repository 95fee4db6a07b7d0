//! Collaborator seams for market data in and output tables out.

use chrono::NaiveDate;
use serde_json::Value;

use crate::types::RawTable;
use crate::IndexCappingResult;

#[cfg(feature = "reporting")]
use crate::config::RunConfig;
#[cfg(feature = "reporting")]
use crate::reporting::{build_issuer_status, build_quarterly_proforma, build_status};
#[cfg(feature = "reporting")]
use serde::Serialize;
#[cfg(feature = "reporting")]
use tracing::info;

/// Supplies the raw constituent snapshot for an index and date.
pub trait ConstituentSource {
    fn fetch(&self, index_id: &str, as_of: NaiveDate) -> IndexCappingResult<RawTable>;
}

/// Accepts serialised output tables.
pub trait TableSink {
    fn write_table(&mut self, table: &str, payload: &Value) -> IndexCappingResult<()>;
}

/// A snapshot that is already in memory.
impl ConstituentSource for RawTable {
    fn fetch(&self, _index_id: &str, _as_of: NaiveDate) -> IndexCappingResult<RawTable> {
        Ok(self.clone())
    }
}

/// Collects written tables by name.
impl TableSink for Vec<(String, Value)> {
    fn write_table(&mut self, table: &str, payload: &Value) -> IndexCappingResult<()> {
        self.push((table.to_string(), payload.clone()));
        Ok(())
    }
}

pub const STATUS_TABLE: &str = "index_status";
pub const ISSUER_TABLE: &str = "index_issuer_status";
pub const PROFORMA_TABLE: &str = "index_quarterly_proforma";
pub const ISSUER_QUARTERLY_TABLE: &str = "index_issuer_status_quarterly";

#[cfg(feature = "reporting")]
fn write<T: Serialize>(sink: &mut dyn TableSink, table: &str, value: &T) -> IndexCappingResult<()> {
    let payload = serde_json::to_value(value)?;
    sink.write_table(table, &payload)
}

/// Fetch a snapshot and persist every table the run produces.
///
/// The status and issuer tables always use daily capping, whatever the run's
/// quarterly flag. Quarterly runs then add the proforma and a quarterly issuer
/// snapshot at the resolved AUM. Returns the table names written, in order.
#[cfg(feature = "reporting")]
pub fn run_snapshot(
    source: &dyn ConstituentSource,
    sink: &mut dyn TableSink,
    config: &RunConfig,
) -> IndexCappingResult<Vec<&'static str>> {
    let raw = source.fetch(&config.index_id, config.as_of)?;
    info!(index_id = %config.index_id, rows = raw.len(), "snapshot fetched");

    let daily = RunConfig {
        quarterly: false,
        ..config.clone()
    };
    let mut written = Vec::new();
    write(sink, STATUS_TABLE, &build_status(&raw, &daily)?)?;
    written.push(STATUS_TABLE);
    write(sink, ISSUER_TABLE, &build_issuer_status(&raw, &daily)?)?;
    written.push(ISSUER_TABLE);
    if config.quarterly {
        write(sink, PROFORMA_TABLE, &build_quarterly_proforma(&raw, config)?)?;
        written.push(PROFORMA_TABLE);
        write(sink, ISSUER_QUARTERLY_TABLE, &build_issuer_status(&raw, config)?)?;
        written.push(ISSUER_QUARTERLY_TABLE);
    }
    Ok(written)
}
