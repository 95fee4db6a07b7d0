use clap::Args;
use serde_json::Value;

use index_capping_core::config::{Region, RegionProfile, RuleParameters};

#[derive(Args)]
pub struct RegionsArgs {
    /// Only show this region
    #[arg(long, env = "REGION")]
    pub region: Option<Region>,
}

/// Region profiles with their capping parameters.
pub fn run_regions(args: RegionsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let regions = match args.region {
        Some(region) => vec![region],
        None => vec![Region::CPH, Region::HEL, Region::STO],
    };
    let rows: Vec<Value> = regions
        .iter()
        .map(|region| {
            let profile = RegionProfile::for_region(region);
            let rules = RuleParameters::for_region(region);
            serde_json::json!({
                "region": region.code(),
                "currency": profile.currency,
                "shares_symbol": profile.shares_symbol,
                "capped_symbol": profile.capped_symbol,
                "default_aum": profile.default_aum,
                "single_issuer_cap": rules.single_issuer_cap,
                "exception_cap": rules.exception_cap,
                "concentration_limit": rules.concentration_limit,
                "top_n_exception_slots": rules.top_n_exception_slots,
                "quarterly_top_cap": rules.quarterly_top_cap,
            })
        })
        .collect();
    Ok(serde_json::json!({ "result": { "rows": rows } }))
}
