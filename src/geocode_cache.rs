use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::geocode::{suburb_query, GeocodeError, Geocoder};
use crate::suburbs::{normalize_name, Coordinates, SuburbTable};

pub const DEFAULT_CACHE_FILE: &str = "suburb_coordinate_cache.json";

const SOURCE_MAPBOX: &str = "mapbox";
const SOURCE_SEED: &str = "seed";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    lat: f64,
    lng: f64,
    source: String,
    timestamp: DateTime<Utc>,
}

/// read-through store of suburb coordinates, persisted as json so repeated
/// runs stop paying for geocoding. Misses are remembered in memory only, so
/// a suburb the service cannot place costs at most one call per run.
pub struct CoordinateCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
    misses: HashSet<String>,
    dirty: bool,
}

impl CoordinateCache {
    /// an unreadable or absent cache file never blocks a run, it only
    /// means starting cold
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&raw) {
                Ok(entries) => {
                    info!(
                        "loaded [{}] cached coordinates from [{}]",
                        entries.len(),
                        path.display()
                    );
                    entries
                }
                Err(err) => {
                    warn!("ignoring unreadable cache [{}]: {}", path.display(), err);
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                warn!("cannot read cache [{}]: {}", path.display(), err);
                HashMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            entries,
            misses: HashSet::new(),
            dirty: false,
        }
    }

    /// copy coordinates the reference table already carries, without
    /// overwriting anything the cache learned earlier
    pub fn seed_from_table(&mut self, table: &SuburbTable) {
        let mut seeded = 0;
        for record in table.records() {
            if let Some(coordinates) = record.coordinates {
                let key = normalize_name(&record.name);
                if !self.entries.contains_key(&key) {
                    self.insert(key, coordinates, SOURCE_SEED);
                    seeded += 1;
                }
            }
        }
        if seeded > 0 {
            debug!("seeded [{}] coordinates from the reference table", seeded);
        }
    }

    pub fn get(&self, name: &str) -> Option<Coordinates> {
        self.entries
            .get(&normalize_name(name))
            .map(|entry| Coordinates::new(entry.lat, entry.lng))
    }

    fn insert(&mut self, key: String, coordinates: Coordinates, source: &str) {
        self.entries.insert(
            key,
            CacheEntry {
                lat: coordinates.latitude,
                lng: coordinates.longitude,
                source: source.to_string(),
                timestamp: Utc::now(),
            },
        );
        self.dirty = true;
    }

    /// cached value if present, otherwise ask the geocoder once and
    /// remember whatever it says
    pub async fn resolve(
        &mut self,
        geocoder: &dyn Geocoder,
        name: &str,
    ) -> Result<Option<Coordinates>, GeocodeError> {
        let key = normalize_name(name);
        if let Some(entry) = self.entries.get(&key) {
            return Ok(Some(Coordinates::new(entry.lat, entry.lng)));
        }
        if self.misses.contains(&key) {
            return Ok(None);
        }
        match geocoder.geocode(&suburb_query(name)).await? {
            Some(place) => {
                debug!(
                    "geocoded [{}] to ({}, {})",
                    name, place.coordinates.latitude, place.coordinates.longitude
                );
                self.insert(key, place.coordinates, SOURCE_MAPBOX);
                Ok(Some(place.coordinates))
            }
            None => {
                debug!("no usable coordinates for [{}], remembering the miss", name);
                self.misses.insert(key);
                Ok(None)
            }
        }
    }

    /// resolve a batch of names up front; returns how many have coordinates
    pub async fn warm<'a, I>(&mut self, geocoder: &dyn Geocoder, names: I) -> Result<usize, GeocodeError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = 0;
        for name in names {
            if self.resolve(geocoder, name).await?.is_some() {
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    /// write the cache out atomically; a no-op while nothing changed
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let parent = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir)
                    .with_context(|| format!("cannot create cache directory [{}]", dir.display()))?;
                dir
            }
            _ => Path::new("."),
        };
        let file = NamedTempFile::new_in(parent).context("cannot create temporary cache file")?;
        serde_json::to_writer_pretty(file.as_file(), &self.entries)
            .context("cannot serialize coordinate cache")?;
        file.persist(&self.path)
            .with_context(|| format!("cannot persist cache to [{}]", self.path.display()))?;
        self.dirty = false;
        debug!(
            "persisted [{}] cached coordinates to [{}]",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for CoordinateCache {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(err) = self.flush() {
                warn!("cannot persist coordinate cache: {:?}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::GeocodedPlace;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeGeocoder {
        calls: AtomicUsize,
        place: Option<GeocodedPlace>,
    }

    impl FakeGeocoder {
        fn returning(coordinates: Option<Coordinates>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                place: coordinates.map(|coordinates| GeocodedPlace {
                    coordinates,
                    place_name: "somewhere".to_string(),
                    locality: None,
                }),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Acquire)
        }
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, _query: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::AcqRel);
            Ok(self.place.clone())
        }
    }

    #[tokio::test]
    async fn repeated_resolves_hit_the_service_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = CoordinateCache::load(&dir.path().join("cache.json"));
        let geocoder = FakeGeocoder::returning(Some(Coordinates::new(-34.9804, 138.5118)));

        let first = cache.resolve(&geocoder, "Glenelg").await.unwrap();
        let second = cache.resolve(&geocoder, "Glenelg").await.unwrap();
        assert_eq!(first, Some(Coordinates::new(-34.9804, 138.5118)));
        assert_eq!(first, second);
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn a_miss_is_not_asked_again() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = CoordinateCache::load(&dir.path().join("cache.json"));
        let geocoder = FakeGeocoder::returning(None);

        assert_eq!(cache.resolve(&geocoder, "Nowhere").await.unwrap(), None);
        assert_eq!(cache.resolve(&geocoder, "Nowhere").await.unwrap(), None);
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn seeded_coordinates_never_reach_the_service() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = CoordinateCache::load(&dir.path().join("cache.json"));
        cache.seed_from_table(&SuburbTable::bundled().unwrap());
        let geocoder = FakeGeocoder::returning(Some(Coordinates::new(0.0, 0.0)));

        let coordinates = cache.resolve(&geocoder, "Adelaide").await.unwrap().unwrap();
        assert_eq!(coordinates, Coordinates::new(-34.9285, 138.6007));
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn flush_and_reload_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let geocoder = FakeGeocoder::returning(Some(Coordinates::new(-35.1234, 138.9876)));

        let mut cache = CoordinateCache::load(&path);
        cache.resolve(&geocoder, "Somewhere New").await.unwrap();
        cache.flush().unwrap();

        let reloaded = CoordinateCache::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.get("Somewhere New"),
            Some(Coordinates::new(-35.1234, 138.9876))
        );
    }

    #[test]
    fn an_unreadable_cache_starts_cold() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "not json at all").unwrap();

        let cache = CoordinateCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn names_normalize_before_lookup() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = CoordinateCache::load(&dir.path().join("cache.json"));
        cache.seed_from_table(&SuburbTable::bundled().unwrap());

        assert_eq!(
            cache.get("  adelaide "),
            Some(Coordinates::new(-34.9285, 138.6007))
        );
    }
}
