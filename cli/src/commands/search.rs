use anyhow::{Context, Result};
use growmap::{Geocoder, MapboxGeocoder, SearchOutcome, SearchPipeline};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::SearchArgs) -> Result<()> {
    let config = crate::load_config(cli)?;
    let geocoder = MapboxGeocoder::new(&config).context("Geocoder unavailable (set --token or MAPBOX_ACCESS_TOKEN)")?;
    let mut pipeline = SearchPipeline::new(&config)?;

    let request = pipeline.begin(&args.name, args.state.as_deref());
    let result = geocoder.geocode(&request.query);
    let outcome = pipeline.complete(request.seq, result)
        .context("Search was superseded")?;

    if let SearchOutcome::Resolved { resolution, .. } = &outcome {
        tracing::info!(?resolution, "candidate chosen");
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
