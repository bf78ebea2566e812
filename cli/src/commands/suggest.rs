use anyhow::{bail, Context, Result};
use growmap::{prioritize, split_place_name, GeocodeQuery, Geocoder, MapboxGeocoder};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::SuggestArgs) -> Result<()> {
    if args.text.trim().chars().count() < 2 {
        bail!("Type at least two characters to get suggestions");
    }
    let config = crate::load_config(cli)?;
    let geocoder = MapboxGeocoder::new(&config).context("Geocoder unavailable (set --token or MAPBOX_ACCESS_TOKEN)")?;

    let candidates = geocoder.geocode(&GeocodeQuery::suggestions(&args.text))
        .context("Suggestion request failed")?;
    for candidate in prioritize(candidates) {
        let (name, state) = split_place_name(&candidate.place_name);
        match state {
            Some(state) => println!("{name}\t{state}\t{}", candidate.place_name),
            None => println!("{name}\t\t{}", candidate.place_name),
        }
    }
    Ok(())
}
