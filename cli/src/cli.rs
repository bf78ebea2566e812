use std::path::PathBuf;

/// Headless front end for place search and catchment filters
#[derive(clap::Parser, Debug)]
#[command(name = "growmap", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Overlay config file (JSON); defaults are used for anything it leaves out
    #[arg(short, long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Geocoding access token
    #[arg(long, env = "MAPBOX_ACCESS_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Resolve a suburb name to a place and camera move (prints JSON)
    Search(SearchArgs),

    /// Type-ahead suggestions for partial input
    Suggest(SuggestArgs),

    /// Compile a saved catchment selection into a map filter (prints JSON)
    Filter(FilterArgs),

    /// Placeholder investment score of a locality
    Score(ScoreArgs),
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Suburb name, e.g. "Red Hill"
    pub name: String,

    /// State name or code narrowing the search, e.g. QLD
    #[arg(short, long)]
    pub state: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SuggestArgs {
    /// Partial input (at least two characters)
    pub text: String,
}

#[derive(clap::Args, Debug)]
pub struct FilterArgs {
    /// Selection file in the sidebar's JSON shape
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub selection: PathBuf,

    /// Write the filter here instead of stdout
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ScoreArgs {
    /// Locality name
    pub name: String,
}
