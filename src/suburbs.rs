use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use log::info;
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;
use thiserror::Error;

/// curated SA reference dataset bundled into the binary
const BUNDLED_DATASET: &str = include_str!("../data/sa_suburbs.csv");

/// rough bounding box of South Australia
const SA_LAT_MIN: f64 = -38.0;
const SA_LAT_MAX: f64 = -25.0;
const SA_LNG_MIN: f64 = 129.0;
const SA_LNG_MAX: f64 = 141.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot read dataset: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid row [{line}]: {reason}")]
    InvalidRow { line: usize, reason: String },
    #[error("dataset contains no rows")]
    Empty,
}

/// ABS remoteness structure category attached to every suburb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter)]
pub enum Remoteness {
    #[serde(rename = "Major Cities of Australia")]
    MajorCities,
    #[serde(rename = "Inner Regional Australia")]
    InnerRegional,
    #[serde(rename = "Outer Regional Australia")]
    OuterRegional,
    #[serde(rename = "Remote Australia")]
    Remote,
    #[serde(rename = "Very Remote Australia")]
    VeryRemote,
    #[serde(rename = "Not Applicable")]
    NotApplicable,
}

impl Remoteness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Remoteness::MajorCities => "Major Cities of Australia",
            Remoteness::InnerRegional => "Inner Regional Australia",
            Remoteness::OuterRegional => "Outer Regional Australia",
            Remoteness::Remote => "Remote Australia",
            Remoteness::VeryRemote => "Very Remote Australia",
            Remoteness::NotApplicable => "Not Applicable",
        }
    }
}

impl std::fmt::Display for Remoteness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Remoteness {
    type Err = String;

    /// accepts the full category name case-insensitively, plus the short
    /// form without the trailing "Australia"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "MAJOR CITIES OF AUSTRALIA" | "MAJOR CITIES" => Ok(Remoteness::MajorCities),
            "INNER REGIONAL AUSTRALIA" | "INNER REGIONAL" => Ok(Remoteness::InnerRegional),
            "OUTER REGIONAL AUSTRALIA" | "OUTER REGIONAL" => Ok(Remoteness::OuterRegional),
            "REMOTE AUSTRALIA" | "REMOTE" => Ok(Remoteness::Remote),
            "VERY REMOTE AUSTRALIA" | "VERY REMOTE" => Ok(Remoteness::VeryRemote),
            "NOT APPLICABLE" => Ok(Remoteness::NotApplicable),
            _ => Err(s.to_string()),
        }
    }
}

/// WGS84 point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// bounding-box check, enough to reject results that landed interstate
    pub fn within_south_australia(&self) -> bool {
        (SA_LAT_MIN..=SA_LAT_MAX).contains(&self.latitude)
            && (SA_LNG_MIN..=SA_LNG_MAX).contains(&self.longitude)
    }

    /// great-circle distance in kilometres
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlng = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// one suburb of the reference table
#[derive(Debug, Clone, PartialEq)]
pub struct SuburbRecord {
    /// normalized (uppercase, whitespace-collapsed) suburb name
    pub name: String,
    pub council: String,
    /// four digits, kept as a string so leading zeros survive
    pub postcode: String,
    pub remoteness: Remoteness,
    /// SEIFA-style index, 0 (most disadvantaged) to 5 (least)
    pub socio_economic_index: u8,
    /// centre point shipped with the dataset, when known
    pub coordinates: Option<Coordinates>,
}

/// raw CSV row before validation
#[derive(Debug, Deserialize)]
struct RawSuburbRow {
    suburb: String,
    council: String,
    postcode: String,
    remoteness: String,
    socio_economic_index: u8,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl TryInto<SuburbRecord> for RawSuburbRow {
    type Error = String;

    fn try_into(self) -> Result<SuburbRecord, Self::Error> {
        let name = normalize_name(&self.suburb);
        if name.is_empty() {
            return Err("suburb name is empty".to_string());
        }
        let council = normalize_name(&self.council);
        if council.is_empty() {
            return Err("council name is empty".to_string());
        }
        let postcode = self.postcode.trim().to_string();
        if postcode.len() != 4 || !postcode.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid postcode [{}]", self.postcode));
        }
        let remoteness = self
            .remoteness
            .parse::<Remoteness>()
            .map_err(|value| format!("unknown remoteness category [{}]", value))?;
        if self.socio_economic_index > 5 {
            return Err(format!(
                "socio-economic index [{}] out of range, expected 0..=5",
                self.socio_economic_index
            ));
        }
        let coordinates = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                let coordinates = Coordinates::new(latitude, longitude);
                if !coordinates.within_south_australia() {
                    return Err(format!(
                        "coordinates ({}, {}) are outside South Australia",
                        latitude, longitude
                    ));
                }
                Some(coordinates)
            }
            (None, None) => None,
            _ => return Err("latitude and longitude must be given together".to_string()),
        };
        Ok(
            SuburbRecord {
                name,
                council,
                postcode,
                remoteness,
                socio_economic_index: self.socio_economic_index,
                coordinates,
            }
        )
    }
}

/// immutable reference table of SA suburbs
#[derive(Debug, Clone)]
pub struct SuburbTable {
    records: Vec<SuburbRecord>,
}

impl SuburbTable {
    /// load from a CSV path, or fall back to the bundled dataset
    pub fn load(path: Option<&Path>) -> Result<Self, DatasetError> {
        match path {
            Some(path) => {
                info!("loading reference data from [{}]", path.display());
                Self::from_reader(std::fs::File::open(path).map_err(csv::Error::from)?)
            }
            None => Self::bundled(),
        }
    }

    /// the dataset compiled into the binary
    pub fn bundled() -> Result<Self, DatasetError> {
        Self::from_reader(BUNDLED_DATASET.as_bytes())
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut records = Vec::new();
        for (idx, row) in rdr.deserialize::<RawSuburbRow>().enumerate() {
            // line 1 is the header
            let line = idx + 2;
            let record: SuburbRecord = row?
                .try_into()
                .map_err(|reason| DatasetError::InvalidRow { line, reason })?;
            records.push(record);
        }
        if records.is_empty() {
            return Err(DatasetError::Empty);
        }
        let table = Self { records };
        info!(
            "loaded [{}] suburbs across [{}] councils",
            table.len(),
            table.council_names().len()
        );
        Ok(table)
    }

    pub fn records(&self) -> &[SuburbRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// exact match on the normalized suburb name, first row wins
    pub fn find_exact(&self, name: &str) -> Option<&SuburbRecord> {
        let name = normalize_name(name);
        self.records.iter().find(|record| record.name == name)
    }

    /// rows for one suburb name only
    pub fn retain_suburb(&self, name: &str) -> Self {
        let name = normalize_name(name);
        Self {
            records: self
                .records
                .iter()
                .filter(|record| record.name == name)
                .cloned()
                .collect(),
        }
    }

    /// rows for one council only
    pub fn retain_council(&self, council: &str) -> Self {
        let council = normalize_name(council);
        Self {
            records: self
                .records
                .iter()
                .filter(|record| record.council == council)
                .cloned()
                .collect(),
        }
    }

    pub fn suburb_names(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|record| record.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn council_names(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|record| record.council.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// remoteness categories present in the data, in enum order
    pub fn remoteness_levels(&self) -> Vec<Remoteness> {
        self.records
            .iter()
            .map(|record| record.remoteness)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// socio-economic levels present in the data, ascending
    pub fn socio_levels(&self) -> Vec<u8> {
        self.records
            .iter()
            .map(|record| record.socio_economic_index)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// canonical form for suburb and council names: uppercased, trimmed,
/// inner whitespace collapsed
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}
