use geo::{Point, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::OverlayConfig;

/// Place-type tags returned by the geocoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceType {
    Country,
    Region,
    Postcode,
    District,
    Place,
    Locality,
    Neighborhood,
    Suburb,
    Address,
    Poi,
    #[serde(other)]
    Other,
}

impl PlaceType {
    pub fn to_str(&self) -> &'static str {
        match self {
            PlaceType::Country => "country",
            PlaceType::Region => "region",
            PlaceType::Postcode => "postcode",
            PlaceType::District => "district",
            PlaceType::Place => "place",
            PlaceType::Locality => "locality",
            PlaceType::Neighborhood => "neighborhood",
            PlaceType::Suburb => "suburb",
            PlaceType::Address => "address",
            PlaceType::Poi => "poi",
            PlaceType::Other => "other",
        }
    }
}

/// Type allow-list for resolving a typed place name to a boundary.
pub const PLACE_SEARCH_TYPES: [PlaceType; 4] =
    [PlaceType::Place, PlaceType::Locality, PlaceType::Neighborhood, PlaceType::Postcode];

/// One ranked geocoder result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceCandidate {
    pub id: String,
    /// Short name, e.g. `Red Hill`.
    pub text: String,
    /// Formatted label, e.g. `Red Hill, Queensland, Australia`.
    pub place_name: String,
    pub center: Point<f64>,
    pub bbox: Option<Rect<f64>>,
    pub place_types: Vec<PlaceType>,
    pub postcode: Option<String>,
}

impl PlaceCandidate {
    #[inline] pub fn has_type(&self, ty: PlaceType) -> bool { self.place_types.contains(&ty) }
}

/// Failures at the geocoding boundary.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(String),
    #[error("geocoding service returned HTTP {0}")]
    Status(u16),
    #[error("could not decode geocoding response: {0}")]
    Decode(String),
    #[error("no matching places found")]
    NoResults,
    #[error("no geocoding access token configured")]
    MissingToken,
    #[error("invalid geocoding endpoint: {0}")]
    InvalidEndpoint(String),
}

/// A geocoding request, independent of the transport that will carry it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeQuery {
    pub text: String,
    /// Empty means no type restriction.
    pub types: Vec<PlaceType>,
    pub limit: Option<u8>,
    pub autocomplete: bool,
}

impl GeocodeQuery {
    /// Query for resolving a place name, scoped by the optional state hint (`"Red Hill, Queensland"`).
    pub fn place(name: &str, state_hint: Option<&str>) -> Self {
        let text = match state_hint.map(str::trim).filter(|h| !h.is_empty()) {
            Some(hint) => format!("{}, {hint}", name.trim()),
            None => name.trim().to_string(),
        };
        Self { text, types: PLACE_SEARCH_TYPES.to_vec(), limit: None, autocomplete: false }
    }

    /// Type-ahead query: unrestricted types, more results, prefix matching.
    pub fn suggestions(text: &str) -> Self {
        Self { text: text.trim().to_string(), types: Vec::new(), limit: Some(12), autocomplete: true }
    }

    /// Full request URL, credential included.
    pub fn url(&self, config: &OverlayConfig) -> Result<Url, GeocodeError> {
        let token = config.access_token.as_deref().ok_or(GeocodeError::MissingToken)?;
        let mut url = Url::parse(&config.geocoding_endpoint)
            .map_err(|e| GeocodeError::InvalidEndpoint(e.to_string()))?;

        url.path_segments_mut()
            .map_err(|_| GeocodeError::InvalidEndpoint(config.geocoding_endpoint.clone()))?
            .pop_if_empty()
            .push(&format!("{}.json", self.text));

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("access_token", token);
            query.append_pair("country", &config.country);
            if !self.types.is_empty() {
                let types: Vec<&str> = self.types.iter().map(PlaceType::to_str).collect();
                query.append_pair("types", &types.join(","));
            }
            if let Some(limit) = self.limit {
                query.append_pair("limit", &limit.to_string());
            }
            if self.autocomplete {
                query.append_pair("autocomplete", "true");
            }
        }
        Ok(url)
    }
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    id: String,
    text: String,
    place_name: String,
    center: [f64; 2],
    #[serde(default)]
    bbox: Option<[f64; 4]>,
    #[serde(default)]
    place_type: Vec<PlaceType>,
    #[serde(default)]
    context: Vec<RawContext>,
}

#[derive(Deserialize)]
struct RawContext {
    id: String,
    text: String,
}

impl From<RawFeature> for PlaceCandidate {
    fn from(raw: RawFeature) -> Self {
        let postcode = if raw.place_type.contains(&PlaceType::Postcode) {
            Some(raw.text.clone())
        } else {
            raw.context.into_iter().find(|c| c.id.starts_with("postcode.")).map(|c| c.text)
        };

        Self {
            id: raw.id,
            text: raw.text,
            place_name: raw.place_name,
            center: Point::new(raw.center[0], raw.center[1]),
            bbox: raw.bbox.map(|[w, s, e, n]| Rect::new((w, s), (e, n))),
            place_types: raw.place_type,
            postcode,
        }
    }
}

/// Decode a geocoding response body into candidates, in the service's relevance order.
pub fn parse_response(body: &str) -> Result<Vec<PlaceCandidate>, GeocodeError> {
    let raw: RawResponse = serde_json::from_str(body).map_err(|e| GeocodeError::Decode(e.to_string()))?;
    Ok(raw.features.into_iter().map(PlaceCandidate::from).collect())
}

/// Anything that can answer a geocoding query synchronously.
pub trait Geocoder {
    fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<PlaceCandidate>, GeocodeError>;
}

impl<F> Geocoder for F
where
    F: Fn(&GeocodeQuery) -> Result<Vec<PlaceCandidate>, GeocodeError>,
{
    fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<PlaceCandidate>, GeocodeError> { self(query) }
}

#[cfg(feature = "geocode")]
pub use http::MapboxGeocoder;

#[cfg(feature = "geocode")]
mod http {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use tracing::debug;

    use super::*;

    /// Blocking HTTP geocoder against the Mapbox places API.
    #[derive(Debug, Clone)]
    pub struct MapboxGeocoder {
        client: Client,
        config: OverlayConfig,
    }

    impl MapboxGeocoder {
        pub fn new(config: &OverlayConfig) -> Result<Self, GeocodeError> {
            if config.access_token.is_none() {
                return Err(GeocodeError::MissingToken);
            }
            let client = Client::builder()
                .user_agent(concat!("growmap/", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| GeocodeError::Request(e.to_string()))?;
            Ok(Self { client, config: config.clone() })
        }
    }

    impl Geocoder for MapboxGeocoder {
        fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<PlaceCandidate>, GeocodeError> {
            let url = query.url(&self.config)?;
            debug!(query = %query.text, "geocoding request");

            let resp = self.client.get(url).send()
                .map_err(|e| GeocodeError::Request(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(GeocodeError::Status(status.as_u16()));
            }
            let body = resp.text().map_err(|e| GeocodeError::Request(e.to_string()))?;
            parse_response(&body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "id": "locality.1",
                "text": "Red Hill",
                "place_name": "Red Hill, Queensland, Australia",
                "center": [152.99, -27.45],
                "bbox": [152.98, -27.46, 153.01, -27.44],
                "place_type": ["locality"],
                "context": [{ "id": "postcode.77", "text": "4059" }, { "id": "region.5", "text": "Queensland" }]
            },
            {
                "id": "poi.9",
                "text": "Red Hill Lookout",
                "place_name": "Red Hill Lookout, Victoria, Australia",
                "center": [145.0, -38.3],
                "place_type": ["poi.landmark"]
            }
        ]
    }"#;

    #[test]
    fn parses_candidates_in_order() {
        let candidates = parse_response(BODY).unwrap();
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.text, "Red Hill");
        assert_eq!(first.center, Point::new(152.99, -27.45));
        assert_eq!(first.bbox.unwrap().width(), 153.01 - 152.98);
        assert_eq!(first.postcode.as_deref(), Some("4059"));
        assert!(first.has_type(PlaceType::Locality));

        assert_eq!(candidates[1].bbox, None);
        assert_eq!(candidates[1].place_types, vec![PlaceType::Other]);
    }

    #[test]
    fn malformed_body_is_decode_error() {
        assert!(matches!(parse_response("<html>"), Err(GeocodeError::Decode(_))));
        assert_eq!(parse_response("{}").unwrap(), vec![]);
    }

    #[test]
    fn place_query_url() {
        let config = OverlayConfig::default().with_access_token("pk.test");
        let url = GeocodeQuery::place("Red Hill", Some("Queensland")).url(&config).unwrap();

        assert_eq!(url.path(), "/geocoding/v5/mapbox.places/Red%20Hill,%20Queensland.json");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("access_token".into(), "pk.test".into())));
        assert!(pairs.contains(&("country".into(), "AU".into())));
        assert!(pairs.contains(&("types".into(), "place,locality,neighborhood,postcode".into())));
    }

    #[test]
    fn suggestion_query_is_unrestricted() {
        let config = OverlayConfig::default().with_access_token("pk.test");
        let url = GeocodeQuery::suggestions("bondi ").url(&config).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(!pairs.iter().any(|(k, _)| k == "types"));
        assert!(pairs.contains(&("limit".into(), "12".into())));
        assert!(pairs.contains(&("autocomplete".into(), "true".into())));
    }

    #[test]
    fn url_requires_token() {
        let err = GeocodeQuery::place("Bondi", None).url(&OverlayConfig::default()).unwrap_err();
        assert!(matches!(err, GeocodeError::MissingToken));
    }

    #[test]
    fn closures_are_geocoders() {
        let geocoder = |_: &GeocodeQuery| parse_response(BODY);
        assert_eq!(geocoder.geocode(&GeocodeQuery::place("Red Hill", None)).unwrap().len(), 2);
    }
}
