//! Inspect command implementation.

use crate::cli::InspectArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use mender_store::{DocumentStore, JsonStore};

/// Execute the inspect command.
pub fn execute_inspect(args: InspectArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let path = args.store.unwrap_or_else(|| config.store.clone());
    let mut store = JsonStore::new(&path).with_gatekeeper(config.gatekeeper()?);
    store.load()?;

    println!("{}", formatter.format_inferred(store.documents())?);
    Ok(())
}
