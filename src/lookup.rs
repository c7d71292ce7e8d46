use std::sync::LazyLock;

use anyhow::Result;
use log::{debug, info, warn};
use regex::Regex;

use crate::geocode::{GeocodeError, Geocoder};
use crate::geocode_cache::CoordinateCache;
use crate::record::AddressRecord;
use crate::suburbs::{normalize_name, Coordinates, SuburbRecord, SuburbTable};

static POSTCODE_REG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b5\d{3}\b").unwrap());
static NOISE_REG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(SOUTH AUSTRALIA|AUSTRALIA|SA)\b").unwrap());
static SEPARATOR_REG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,\-]+").unwrap());
// a number (house, unit/house or lot) followed by a word marks a street
// address anywhere in the query; postcodes are stripped before this runs
static STREET_REG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+[A-Z]?\s+[A-Z]{2}").unwrap());

#[derive(Debug, PartialEq, Eq)]
enum Query {
    Postcode(String),
    Name(String),
    Combined { name: String, postcode: String },
    Street(String),
    Empty,
}

/// decide what kind of query this is. State names, the country and
/// separators are noise around the parts that identify a suburb; a house,
/// unit or lot number marks a free-text street address.
fn classify(raw: &str) -> Query {
    let cleaned = normalize_name(raw);
    let postcode = POSTCODE_REG
        .find(&cleaned)
        .map(|found| found.as_str().to_string());

    let without_postcode = POSTCODE_REG.replace_all(&cleaned, " ");
    let without_noise = NOISE_REG.replace_all(&without_postcode, " ");
    let name = normalize_name(&SEPARATOR_REG.replace_all(&without_noise, " "));

    match (name.is_empty(), postcode) {
        (true, Some(postcode)) => Query::Postcode(postcode),
        (true, None) => Query::Empty,
        (false, _) if STREET_REG.is_match(&name) => Query::Street(raw.trim().to_string()),
        (false, Some(postcode)) => Query::Combined { name, postcode },
        (false, None) => Query::Name(name),
    }
}

/// resolve a free-text query to a known suburb, or via the geocoder for
/// street addresses. `Ok(None)` means nothing in South Australia matched.
pub async fn lookup(
    table: &SuburbTable,
    cache: &mut CoordinateCache,
    geocoder: Option<&dyn Geocoder>,
    query: &str,
) -> Result<Option<AddressRecord>> {
    let matched = match classify(query) {
        Query::Empty => {
            debug!("query [{}] contains nothing to match", query);
            return Ok(None);
        }
        Query::Street(raw) => return street_lookup(table, cache, geocoder, &raw).await,
        Query::Postcode(postcode) => match_by_postcode(table, &postcode),
        Query::Name(name) => match_by_name(table, &name),
        Query::Combined { name, postcode } => match_combined(table, &name, &postcode),
    };
    let Some(suburb) = matched else {
        return Ok(None);
    };
    info!("query [{}] matched suburb [{}]", query, suburb.name);

    let coordinates = match geocoder {
        Some(geocoder) => match cache.resolve(geocoder, &suburb.name).await {
            Ok(coordinates) => coordinates,
            Err(err) => {
                warn!("cannot geocode [{}]: {}", suburb.name, err);
                None
            }
        },
        None => cache.get(&suburb.name),
    };
    Ok(Some(AddressRecord::from_suburb(suburb, coordinates)))
}

fn match_by_postcode<'a>(table: &'a SuburbTable, postcode: &str) -> Option<&'a SuburbRecord> {
    table
        .records()
        .iter()
        .find(|record| record.postcode == postcode)
}

/// exact name first, then the first suburb containing the query
fn match_by_name<'a>(table: &'a SuburbTable, name: &str) -> Option<&'a SuburbRecord> {
    table.find_exact(name).or_else(|| {
        table
            .records()
            .iter()
            .find(|record| record.name.contains(name))
    })
}

/// both parts have to hold; a name in the wrong postcode is no match
fn match_combined<'a>(
    table: &'a SuburbTable,
    name: &str,
    postcode: &str,
) -> Option<&'a SuburbRecord> {
    table
        .records()
        .iter()
        .find(|record| record.name == name && record.postcode == postcode)
        .or_else(|| {
            table
                .records()
                .iter()
                .find(|record| record.name.contains(name) && record.postcode == postcode)
        })
}

async fn street_lookup(
    table: &SuburbTable,
    cache: &CoordinateCache,
    geocoder: Option<&dyn Geocoder>,
    raw: &str,
) -> Result<Option<AddressRecord>> {
    let geocoder = geocoder.ok_or(GeocodeError::MissingApiKey)?;
    let place = match geocoder.geocode(raw).await {
        Ok(Some(place)) => place,
        Ok(None) => return Ok(None),
        // a dead geocoder turns a street query into a plain miss
        Err(err) => {
            warn!("cannot geocode street query [{}]: {}", raw, err);
            return Ok(None);
        }
    };
    if !place.coordinates.within_south_australia() {
        debug!("geocoded [{}] lands outside South Australia", raw);
        return Ok(None);
    }
    let suburb = place
        .locality
        .as_deref()
        .and_then(|locality| table.find_exact(locality))
        .or_else(|| nearest_suburb(table, cache, place.coordinates));
    let Some(suburb) = suburb else {
        warn!("no reference suburb near [{}]", place.place_name);
        return Ok(None);
    };
    info!("street query [{}] enriched from suburb [{}]", raw, suburb.name);
    Ok(Some(AddressRecord::from_geocoded_street(&place, suburb)))
}

/// closest suburb with known coordinates, from the table or the cache
fn nearest_suburb<'a>(
    table: &'a SuburbTable,
    cache: &CoordinateCache,
    target: Coordinates,
) -> Option<&'a SuburbRecord> {
    table
        .records()
        .iter()
        .filter_map(|record| {
            record
                .coordinates
                .or_else(|| cache.get(&record.name))
                .map(|coordinates| (record, target.distance_km(&coordinates)))
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(record, _)| record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::GeocodedPlace;
    use async_trait::async_trait;

    struct FakeGeocoder {
        place: Option<GeocodedPlace>,
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, _query: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
            Ok(self.place.clone())
        }
    }

    fn table() -> SuburbTable {
        SuburbTable::bundled().unwrap()
    }

    fn empty_cache() -> (tempfile::TempDir, CoordinateCache) {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = CoordinateCache::load(&dir.path().join("cache.json"));
        (dir, cache)
    }

    #[test]
    fn classifies_a_bare_postcode() {
        assert_eq!(classify("5000"), Query::Postcode("5000".to_string()));
        assert_eq!(classify(" 5290 "), Query::Postcode("5290".to_string()));
    }

    #[test]
    fn classifies_a_suburb_name() {
        assert_eq!(classify("Adelaide"), Query::Name("ADELAIDE".to_string()));
        assert_eq!(classify("mount  gambier"), Query::Name("MOUNT GAMBIER".to_string()));
        assert_eq!(classify("Adelaide, SA"), Query::Name("ADELAIDE".to_string()));
    }

    #[test]
    fn classifies_name_with_postcode() {
        assert_eq!(
            classify("Adelaide, SA 5000, Australia"),
            Query::Combined {
                name: "ADELAIDE".to_string(),
                postcode: "5000".to_string()
            }
        );
        assert_eq!(
            classify("Glenelg 5045"),
            Query::Combined {
                name: "GLENELG".to_string(),
                postcode: "5045".to_string()
            }
        );
    }

    #[test]
    fn classifies_a_street_address() {
        assert_eq!(
            classify("12 North Terrace, Adelaide"),
            Query::Street("12 North Terrace, Adelaide".to_string())
        );
        assert_eq!(
            classify("5a Jetty Road, Glenelg 5045"),
            Query::Street("5a Jetty Road, Glenelg 5045".to_string())
        );
        assert_eq!(
            classify("5/12 Jetty Road, Glenelg"),
            Query::Street("5/12 Jetty Road, Glenelg".to_string())
        );
        assert_eq!(
            classify("Lot 50 Smith Road"),
            Query::Street("Lot 50 Smith Road".to_string())
        );
    }

    #[test]
    fn classifies_noise_as_empty() {
        assert_eq!(classify(""), Query::Empty);
        assert_eq!(classify("   "), Query::Empty);
        assert_eq!(classify("SA"), Query::Empty);
        assert_eq!(classify("South Australia, Australia"), Query::Empty);
    }

    #[tokio::test]
    async fn name_lookup_uses_cached_coordinates() {
        let table = table();
        let (_dir, mut cache) = empty_cache();
        cache.seed_from_table(&table);

        let record = lookup(&table, &mut cache, None, "Adelaide")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.suburb, "ADELAIDE");
        assert_eq!(record.postcode, "5000");
        assert_eq!(record.council, "CITY OF ADELAIDE");
        assert_eq!(record.latitude, Some(-34.9285));
        assert_eq!(record.full_address, "ADELAIDE, SA 5000, Australia");
    }

    #[tokio::test]
    async fn postcode_lookup_takes_the_first_row() {
        let table = table();
        let (_dir, mut cache) = empty_cache();

        let record = lookup(&table, &mut cache, None, "5000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.suburb, "ADELAIDE");

        let shared = lookup(&table, &mut cache, None, "5608")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shared.suburb, "WHYALLA NORRIE");
    }

    #[tokio::test]
    async fn combined_lookup_requires_both_parts() {
        let table = table();
        let (_dir, mut cache) = empty_cache();

        let record = lookup(&table, &mut cache, None, "Glenelg 5045")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.suburb, "GLENELG");

        let mismatch = lookup(&table, &mut cache, None, "Glenelg 5000").await.unwrap();
        assert!(mismatch.is_none());
    }

    #[tokio::test]
    async fn unknown_names_find_nothing() {
        let table = table();
        let (_dir, mut cache) = empty_cache();

        assert!(lookup(&table, &mut cache, None, "Atlantis").await.unwrap().is_none());
        assert!(lookup(&table, &mut cache, None, "9999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn street_lookup_enriches_from_the_nearest_suburb() {
        let table = table();
        let (_dir, mut cache) = empty_cache();
        let geocoder = FakeGeocoder {
            place: Some(GeocodedPlace {
                coordinates: Coordinates::new(-34.9800, 138.5120),
                place_name: "1 Jetty Road, South Australia, Australia".to_string(),
                locality: None,
            }),
        };

        let record = lookup(&table, &mut cache, Some(&geocoder), "1 Jetty Road, Glenelg")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.suburb, "GLENELG");
        assert_eq!(record.street_name.as_deref(), Some("1 Jetty Road"));
        assert_eq!(record.latitude, Some(-34.98));
    }

    #[tokio::test]
    async fn street_lookup_prefers_the_reported_locality() {
        let table = table();
        let (_dir, mut cache) = empty_cache();
        // coordinates sit in Adelaide, the locality says otherwise
        let geocoder = FakeGeocoder {
            place: Some(GeocodedPlace {
                coordinates: Coordinates::new(-34.9285, 138.6007),
                place_name: "10 Jetty Road, Glenelg, South Australia, Australia".to_string(),
                locality: Some("Glenelg".to_string()),
            }),
        };

        let record = lookup(&table, &mut cache, Some(&geocoder), "10 Jetty Road, Glenelg")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.suburb, "GLENELG");
        assert_eq!(record.postcode, "5045");
    }

    #[tokio::test]
    async fn street_lookup_outside_the_state_finds_nothing() {
        let table = table();
        let (_dir, mut cache) = empty_cache();
        let geocoder = FakeGeocoder {
            place: Some(GeocodedPlace {
                coordinates: Coordinates::new(-37.8183, 144.9671),
                place_name: "1 Flinders Street, Melbourne, Victoria, Australia".to_string(),
                locality: Some("Melbourne".to_string()),
            }),
        };

        let record = lookup(&table, &mut cache, Some(&geocoder), "1 Flinders Street, Melbourne")
            .await
            .unwrap();
        assert!(record.is_none());
    }

    struct OutageGeocoder;

    #[async_trait]
    impl Geocoder for OutageGeocoder {
        async fn geocode(&self, _query: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
            // an invalid URL yields a reqwest error without touching the network
            let source = reqwest::Client::new()
                .get("not a url")
                .send()
                .await
                .unwrap_err();
            Err(GeocodeError::Unavailable { attempts: 4, source })
        }
    }

    #[tokio::test]
    async fn street_lookup_degrades_to_none_when_the_geocoder_is_down() {
        let table = table();
        let (_dir, mut cache) = empty_cache();

        let record = lookup(&table, &mut cache, Some(&OutageGeocoder), "12 North Terrace, Adelaide")
            .await
            .unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn street_lookup_without_a_geocoder_fails() {
        let table = table();
        let (_dir, mut cache) = empty_cache();

        let result = lookup(&table, &mut cache, None, "12 North Terrace, Adelaide").await;
        assert!(result.is_err());
    }
}
