use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::distribution::DistributionWeights;
use crate::geocode::Geocoder;
use crate::geocode_cache::CoordinateCache;
use crate::record::AddressRecord;
use crate::sampler::{SampleError, Sampler};
use crate::suburbs::{SuburbRecord, SuburbTable};
use crate::synth::{scatter_offset, synthesize, ScatterOffset, StreetAddress};

pub struct AddressGenerator<'a> {
    table: &'a SuburbTable,
    weights: DistributionWeights,
    rng: StdRng,
}

impl<'a> AddressGenerator<'a> {
    pub fn new(table: &'a SuburbTable, weights: DistributionWeights, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            table,
            weights,
            rng,
        }
    }

    /// generate a batch of addresses. Every random draw happens before any
    /// geocoding, so a fixed seed yields the same addresses no matter what
    /// the cache holds or the service answers.
    pub async fn generate(
        &mut self,
        count: usize,
        cache: &mut CoordinateCache,
        geocoder: Option<&dyn Geocoder>,
    ) -> Result<Vec<AddressRecord>, SampleError> {
        let sampler = Sampler::new(self.table, &self.weights)?;

        let mut draws: Vec<(&SuburbRecord, StreetAddress, ScatterOffset)> =
            Vec::with_capacity(count);
        for _ in 0..count {
            let suburb = sampler.sample(&mut self.rng);
            let street = synthesize(&mut self.rng);
            let offset = scatter_offset(&mut self.rng);
            draws.push((suburb, street, offset));
        }

        if let Some(geocoder) = geocoder {
            let names: BTreeSet<&str> = draws
                .iter()
                .map(|(suburb, _, _)| suburb.name.as_str())
                .collect();
            match cache.warm(geocoder, names).await {
                Ok(resolved) => info!("[{}] sampled suburbs have coordinates", resolved),
                Err(err) => warn!("continuing without fresh coordinates: {}", err),
            }
        }

        let records: Vec<AddressRecord> = draws
            .into_iter()
            .map(|(suburb, street, offset)| {
                let coordinates = cache.get(&suburb.name).map(|centre| offset.apply(centre));
                AddressRecord::from_street_and_suburb(
                    street.number,
                    street.name,
                    suburb,
                    coordinates,
                )
            })
            .collect();
        info!("generated [{}] addresses", records.len());
        Ok(records)
    }
}

#[derive(Debug, Serialize)]
pub struct CoordinateBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

/// how a generated batch actually distributed itself
#[derive(Debug, Serialize)]
pub struct DistributionSummary {
    pub total_count: usize,
    pub unique_suburbs: usize,
    pub remoteness_distribution: BTreeMap<String, usize>,
    pub socioeconomic_distribution: BTreeMap<u8, usize>,
    pub top_suburbs: Vec<(String, usize)>,
    pub coordinate_bounds: Option<CoordinateBounds>,
}

pub fn summarize(records: &[AddressRecord]) -> DistributionSummary {
    let mut remoteness_distribution = BTreeMap::new();
    let mut socioeconomic_distribution = BTreeMap::new();
    let mut per_suburb: BTreeMap<&str, usize> = BTreeMap::new();
    let mut bounds: Option<CoordinateBounds> = None;

    for record in records {
        *remoteness_distribution
            .entry(record.remoteness.to_string())
            .or_insert(0) += 1;
        *socioeconomic_distribution
            .entry(record.socio_economic_index)
            .or_insert(0) += 1;
        *per_suburb.entry(record.suburb.as_str()).or_insert(0) += 1;
        if let (Some(lat), Some(lng)) = (record.latitude, record.longitude) {
            bounds = Some(match bounds {
                None => CoordinateBounds {
                    lat_min: lat,
                    lat_max: lat,
                    lng_min: lng,
                    lng_max: lng,
                },
                Some(bounds) => CoordinateBounds {
                    lat_min: bounds.lat_min.min(lat),
                    lat_max: bounds.lat_max.max(lat),
                    lng_min: bounds.lng_min.min(lng),
                    lng_max: bounds.lng_max.max(lng),
                },
            });
        }
    }

    let unique_suburbs = per_suburb.len();
    let mut top_suburbs: Vec<(String, usize)> = per_suburb
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    top_suburbs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_suburbs.truncate(10);

    DistributionSummary {
        total_count: records.len(),
        unique_suburbs,
        remoteness_distribution,
        socioeconomic_distribution,
        top_suburbs,
        coordinate_bounds: bounds,
    }
}

impl fmt::Display for DistributionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total addresses: {}", self.total_count)?;
        writeln!(f, "Unique suburbs: {}", self.unique_suburbs)?;
        writeln!(f, "Remoteness:")?;
        for (category, count) in &self.remoteness_distribution {
            writeln!(f, "  {}: {}", category, count)?;
        }
        writeln!(f, "Socio-economic level:")?;
        for (level, count) in &self.socioeconomic_distribution {
            writeln!(f, "  {}: {}", level, count)?;
        }
        writeln!(f, "Top suburbs:")?;
        for (name, count) in &self.top_suburbs {
            writeln!(f, "  {}: {}", name, count)?;
        }
        match &self.coordinate_bounds {
            Some(bounds) => write!(
                f,
                "Coordinate bounds: lat {}..{}, lng {}..{}",
                bounds.lat_min, bounds.lat_max, bounds.lng_min, bounds.lng_max
            ),
            None => write!(f, "Coordinate bounds: none resolved"),
        }
    }
}
