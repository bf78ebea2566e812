use std::fs;

use anyhow::{Context, Result};
use growmap::{active_categories, compile, CatchmentSelection};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::FilterArgs) -> Result<()> {
    let text = fs::read_to_string(&args.selection)
        .with_context(|| format!("Failed to read selection: {}", args.selection.display()))?;
    let mut selection: CatchmentSelection = serde_json::from_str(&text)
        .with_context(|| format!("Invalid selection file: {}", args.selection.display()))?;
    selection.normalize();

    let categories = active_categories(&selection);
    tracing::info!(?categories, "selection loaded");

    // Nothing selected: the map shows suburbs, which is a `null` filter.
    let filter = compile(&selection).map(|f| f.to_json()).unwrap_or(serde_json::Value::Null);
    let json = serde_json::to_string_pretty(&filter)?;
    match &args.output {
        Some(path) => fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
