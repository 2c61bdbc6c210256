//! Command handlers for rcl-cli.
//!
//! Output is `key=value` lines for scalars and pretty JSON for records, so
//! both humans and scripts can read it.

pub mod audit;
pub mod config;
pub mod ledger;
pub mod policy;

use anyhow::{Context, Result};
use serde_json::Value;

pub const ENV_LEDGER_URL: &str = "RCL_LEDGER_URL";

/// `--ledger`, then `RCL_LEDGER_URL`. No silent default: pointing the CLI at
/// the wrong database would print a confident empty summary.
pub fn ledger_url(flag: Option<String>) -> Result<String> {
    match flag {
        Some(url) => Ok(url),
        None => std::env::var(ENV_LEDGER_URL)
            .with_context(|| format!("pass --ledger or set {ENV_LEDGER_URL}")),
    }
}

pub fn print_json(v: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v).context("serialize output")?);
    Ok(())
}
