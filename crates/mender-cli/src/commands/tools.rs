//! Tools command implementation.

use crate::error::Result;
use crate::output::Formatter;
use mender_domain::tool_definitions;

/// Execute the tools command.
pub fn execute_tools(formatter: &Formatter) -> Result<()> {
    println!("{}", formatter.format_tools(&tool_definitions())?);
    Ok(())
}
