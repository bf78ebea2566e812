use anyhow::Result;
use growmap::{HashScoreProvider, ScoreProvider};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::ScoreArgs) -> Result<()> {
    let score = HashScoreProvider.score(&args.name);
    println!("{}", serde_json::to_string_pretty(&score)?);
    Ok(())
}
