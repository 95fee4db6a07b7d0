use chrono::{NaiveDate, Utc};
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use index_capping_core::config::{Region, RunConfig};
use index_capping_core::io::run_snapshot;
use index_capping_core::parse_as_of;
use index_capping_core::reporting::{build_issuer_status, build_quarterly_proforma, build_status};

use crate::input::{self, SnapshotSource};
use crate::output::sink::DirectorySink;

/// Options shared by every capping command.
#[derive(Args)]
pub struct RunArgs {
    /// Constituent snapshot (.json array of rows or .csv); stdin when omitted
    #[arg(long)]
    pub input: Option<String>,

    /// YAML run configuration; flags and environment override its fields
    #[arg(long)]
    pub config: Option<String>,

    /// Index identifier stamped on every row
    #[arg(long, env = "INDEX_ID")]
    pub index_id: Option<String>,

    /// Exchange region (CPH, HEL, STO)
    #[arg(long, env = "REGION")]
    pub region: Option<Region>,

    /// Snapshot date (YYYY-MM-DD or RFC 3339); defaults to today (UTC)
    #[arg(long, value_parser = parse_date)]
    pub as_of: Option<NaiveDate>,

    /// Fund AUM in index currency
    #[arg(long, env = "AUM")]
    pub aum: Option<Decimal>,

    /// Use the quarterly exception methodology
    #[arg(long)]
    pub quarterly: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_as_of(s).map_err(|e| e.to_string())
}

impl RunArgs {
    /// Merge YAML config, environment and flags into a run configuration.
    fn run_config(&self) -> Result<RunConfig, Box<dyn std::error::Error>> {
        let mut config = match self.config {
            Some(ref path) => input::file::read_yaml::<RunConfig>(path)?,
            None => RunConfig::new(
                "",
                Region::default(),
                Utc::now().date_naive(),
            ),
        };
        if let Some(ref index_id) = self.index_id {
            config.index_id = index_id.clone();
        }
        if let Some(ref region) = self.region {
            config.region = region.clone();
        }
        if let Some(as_of) = self.as_of {
            config.as_of = as_of;
        }
        if self.aum.is_some() {
            config.aum = self.aum;
        }
        config.quarterly |= self.quarterly;
        if config.index_id.trim().is_empty() {
            config.index_id = config
                .profile()
                .capped_symbol
                .unwrap_or_else(|| config.profile().shares_symbol);
        }
        Ok(config)
    }

    fn source(&self) -> SnapshotSource {
        SnapshotSource {
            path: self.input.clone(),
        }
    }
}

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args)]
pub struct IssuersArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args)]
pub struct ProformaArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Directory receiving one JSON file per output table
    #[arg(long, default_value = "out")]
    pub out_dir: PathBuf,
}

pub fn run_status(args: StatusArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = args.run.run_config()?;
    let raw = args.run.source().load()?;
    let result = build_status(&raw, &config)?;
    let value = serde_json::to_value(result)?;
    log_preview(&value);
    Ok(value)
}

pub fn run_issuers(args: IssuersArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = args.run.run_config()?;
    let raw = args.run.source().load()?;
    let result = build_issuer_status(&raw, &config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_proforma(args: ProformaArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut config = args.run.run_config()?;
    config.quarterly = true;
    let raw = args.run.source().load()?;
    let result = build_quarterly_proforma(&raw, &config)?;
    let value = serde_json::to_value(result)?;
    log_preview(&value);
    Ok(value)
}

pub fn run_snapshot_tables(args: SnapshotArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = args.run.run_config()?;
    let source = args.run.source();
    let mut sink = DirectorySink {
        dir: args.out_dir.clone(),
    };
    let written = run_snapshot(&source, &mut sink, &config)?;
    Ok(serde_json::json!({
        "index_id": config.index_id,
        "region": config.region.code(),
        "as_of": config.as_of.to_string(),
        "quarterly": config.quarterly,
        "out_dir": args.out_dir.display().to_string(),
        "tables": written,
    }))
}

/// Log the ten largest row weights.
fn log_preview(value: &Value) {
    let Some(rows) = crate::output::result_rows(value) else {
        return;
    };
    let mut preview: Vec<(&str, Decimal)> = rows
        .iter()
        .filter_map(|r| {
            let ticker = r.get("ticker")?.as_str()?;
            let weight = r.get("weight")?.as_str()?.parse::<Decimal>().ok()?;
            Some((ticker, weight))
        })
        .collect();
    preview.sort_by(|a, b| b.1.cmp(&a.1));
    for (ticker, weight) in preview.into_iter().take(10) {
        info!(ticker, %weight, "top weight");
    }
}
