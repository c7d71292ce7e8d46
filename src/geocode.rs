use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;
use thiserror::Error;

use crate::suburbs::Coordinates;
use crate::utils::retry_wrapper;

const MAPBOX_BASE_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";
/// bias results towards Adelaide when a query is ambiguous
const ADELAIDE_PROXIMITY: &str = "138.6007,-34.9285";
const API_KEY_VAR: &str = "MAPBOX_API_KEY";
const LEGACY_API_KEY_VAR: &str = "MAPBOX_ACCESS_TOKEN";
const MAX_GEOCODE_RETRIES: usize = 3;
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// characters a raw query could use to break out of the URL path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("no Mapbox API key found, set {API_KEY_VAR} in the environment or .env")]
    MissingApiKey,
    #[error("cannot build http client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("geocoding service unavailable after {attempts} attempts: {source}")]
    Unavailable {
        attempts: usize,
        #[source]
        source: reqwest::Error,
    },
}

/// a resolved location with whatever locality the service attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    pub coordinates: Coordinates,
    pub place_name: String,
    pub locality: Option<String>,
}

/// resolves free-text queries to coordinates; `Ok(None)` means the service
/// answered but found nothing usable inside South Australia
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<GeocodedPlace>, GeocodeError>;
}

/// the query form that resolves a bare suburb name most reliably
pub fn suburb_query(name: &str) -> String {
    format!("{}, SA, Australia", name)
}

pub struct MapboxGeocoder {
    client: reqwest::Client,
    access_token: String,
}

impl MapboxGeocoder {
    /// read the access token from the environment, accepting the older
    /// variable name as well
    pub fn from_env() -> Result<Self, GeocodeError> {
        let token = std::env::var(API_KEY_VAR)
            .or_else(|_| std::env::var(LEGACY_API_KEY_VAR))
            .map_err(|_| GeocodeError::MissingApiKey)?;
        Self::new(token)
    }

    pub fn new(access_token: String) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(
            Self {
                client,
                access_token,
            }
        )
    }
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
        let url = format!(
            "{}/{}.json",
            MAPBOX_BASE_URL,
            utf8_percent_encode(query, PATH_SEGMENT)
        );
        let response = retry_wrapper(MAX_GEOCODE_RETRIES, || async {
            self.client
                .get(&url)
                .query(&[
                    ("access_token", self.access_token.as_str()),
                    ("country", "AU"),
                    ("limit", "1"),
                    ("proximity", ADELAIDE_PROXIMITY),
                    ("types", "place,locality,neighborhood,address"),
                ])
                .send()
                .await?
                .error_for_status()?
                .json::<GeocodeResponse>()
                .await
        })
        .await
        .map_err(|source| GeocodeError::Unavailable {
            attempts: MAX_GEOCODE_RETRIES + 1,
            source,
        })?;
        Ok(convert_response(response, query))
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    place_name: String,
    /// longitude first, then latitude
    center: [f64; 2],
    #[serde(default)]
    context: Vec<ContextItem>,
}

#[derive(Debug, Deserialize)]
struct ContextItem {
    id: String,
    text: String,
}

fn convert_response(response: GeocodeResponse, query: &str) -> Option<GeocodedPlace> {
    let feature = response.features.into_iter().next()?;
    let coordinates = Coordinates::new(feature.center[1], feature.center[0]);
    if !coordinates.within_south_australia() {
        warn!("geocoder placed [{}] outside South Australia, ignoring", query);
        return None;
    }
    let locality = feature
        .context
        .iter()
        .find(|item| item.id.starts_with("place"))
        .map(|item| item.text.clone())
        .or_else(|| {
            // second comma segment of the place name usually carries the
            // suburb when the context block is absent
            feature
                .place_name
                .split(',')
                .nth(1)
                .map(|part| part.trim().to_string())
        });
    Some(
        GeocodedPlace {
            coordinates,
            place_name: feature.place_name,
            locality,
        }
    )
}
