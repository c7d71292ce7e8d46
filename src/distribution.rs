use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use crate::suburbs::Remoteness;

#[derive(Debug, Error)]
pub enum WeightError {
    #[error("negative weight [{weight}] for {dimension} [{key}]")]
    Negative {
        dimension: &'static str,
        key: String,
        weight: f64,
    },
    #[error("weight for {dimension} [{key}] is not finite")]
    NonFinite { dimension: &'static str, key: String },
    #[error("socio-economic level [{0}] out of range, expected 0..=5")]
    SocioOutOfRange(u8),
}

/// Target sampling weights over the two demographic dimensions. Weights
/// need not sum to one; an empty map means every category weighs the same.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistributionWeights {
    #[serde(default)]
    pub remoteness: HashMap<Remoteness, f64>,
    #[serde(default)]
    pub socioeconomic: HashMap<u8, f64>,
}

impl DistributionWeights {
    /// the default weighting, skewed towards metropolitan Adelaide the way
    /// the state population is
    pub fn balanced() -> Self {
        Self {
            remoteness: HashMap::from([
                (Remoteness::MajorCities, 0.4),
                (Remoteness::InnerRegional, 0.25),
                (Remoteness::OuterRegional, 0.2),
                (Remoteness::Remote, 0.1),
                (Remoteness::VeryRemote, 0.05),
                (Remoteness::NotApplicable, 0.0),
            ]),
            socioeconomic: HashMap::from([
                (0, 0.05),
                (1, 0.10),
                (2, 0.20),
                (3, 0.25),
                (4, 0.25),
                (5, 0.15),
            ]),
        }
    }

    /// named preset, accepting both hyphenated and underscored spellings
    pub fn preset(name: &str) -> Option<Self> {
        let balanced = Self::balanced();
        match name.to_lowercase().replace('-', "_").as_str() {
            "city_focused" => Some(Self {
                remoteness: HashMap::from([
                    (Remoteness::MajorCities, 0.7),
                    (Remoteness::InnerRegional, 0.2),
                    (Remoteness::OuterRegional, 0.08),
                    (Remoteness::Remote, 0.02),
                    (Remoteness::VeryRemote, 0.0),
                    (Remoteness::NotApplicable, 0.0),
                ]),
                ..balanced
            }),
            "regional_focused" => Some(Self {
                remoteness: HashMap::from([
                    (Remoteness::MajorCities, 0.2),
                    (Remoteness::InnerRegional, 0.3),
                    (Remoteness::OuterRegional, 0.4),
                    (Remoteness::Remote, 0.1),
                    (Remoteness::VeryRemote, 0.0),
                    (Remoteness::NotApplicable, 0.0),
                ]),
                ..balanced
            }),
            "remote_focused" => Some(Self {
                remoteness: HashMap::from([
                    (Remoteness::MajorCities, 0.1),
                    (Remoteness::InnerRegional, 0.2),
                    (Remoteness::OuterRegional, 0.3),
                    (Remoteness::Remote, 0.3),
                    (Remoteness::VeryRemote, 0.1),
                    (Remoteness::NotApplicable, 0.0),
                ]),
                ..balanced
            }),
            "high_socio" => Some(Self {
                socioeconomic: HashMap::from([
                    (0, 0.02),
                    (1, 0.05),
                    (2, 0.13),
                    (3, 0.20),
                    (4, 0.30),
                    (5, 0.30),
                ]),
                ..balanced
            }),
            "low_socio" => Some(Self {
                socioeconomic: HashMap::from([
                    (0, 0.20),
                    (1, 0.30),
                    (2, 0.25),
                    (3, 0.15),
                    (4, 0.08),
                    (5, 0.02),
                ]),
                ..balanced
            }),
            "urban_high_socio" => Some(Self {
                remoteness: HashMap::from([
                    (Remoteness::MajorCities, 0.8),
                    (Remoteness::InnerRegional, 0.15),
                    (Remoteness::OuterRegional, 0.05),
                    (Remoteness::Remote, 0.0),
                    (Remoteness::VeryRemote, 0.0),
                    (Remoteness::NotApplicable, 0.0),
                ]),
                socioeconomic: HashMap::from([
                    (0, 0.02),
                    (1, 0.05),
                    (2, 0.13),
                    (3, 0.25),
                    (4, 0.30),
                    (5, 0.25),
                ]),
            }),
            "rural_mixed" => Some(Self {
                remoteness: HashMap::from([
                    (Remoteness::MajorCities, 0.1),
                    (Remoteness::InnerRegional, 0.3),
                    (Remoteness::OuterRegional, 0.35),
                    (Remoteness::Remote, 0.2),
                    (Remoteness::VeryRemote, 0.05),
                    (Remoteness::NotApplicable, 0.0),
                ]),
                ..balanced
            }),
            "balanced" => Some(balanced),
            _ => None,
        }
    }

    pub fn preset_names() -> [&'static str; 8] {
        [
            "balanced",
            "city-focused",
            "regional-focused",
            "remote-focused",
            "urban-high-socio",
            "rural-mixed",
            "high-socio",
            "low-socio",
        ]
    }

    /// all weight on one remoteness category, uniform over the rest
    pub fn pinned_remoteness(category: Remoteness) -> Self {
        Self {
            remoteness: HashMap::from([(category, 1.0)]),
            socioeconomic: HashMap::new(),
        }
    }

    /// all weight on one socio-economic level, uniform over the rest
    pub fn pinned_socio(level: u8) -> Self {
        Self {
            remoteness: HashMap::new(),
            socioeconomic: HashMap::from([(level, 1.0)]),
        }
    }

    /// load caller-supplied weights from a JSON file
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read weights file [{}]", path.display()))?;
        let weights: Self = serde_json::from_str(&raw)
            .with_context(|| format!("cannot parse weights file [{}]", path.display()))?;
        Ok(weights)
    }

    /// reject negative and non-finite weights before they reach the sampler
    pub fn validate(&self) -> Result<(), WeightError> {
        for (category, weight) in &self.remoteness {
            if !weight.is_finite() {
                return Err(WeightError::NonFinite {
                    dimension: "remoteness",
                    key: category.to_string(),
                });
            }
            if *weight < 0.0 {
                return Err(WeightError::Negative {
                    dimension: "remoteness",
                    key: category.to_string(),
                    weight: *weight,
                });
            }
        }
        for (level, weight) in &self.socioeconomic {
            if *level > 5 {
                return Err(WeightError::SocioOutOfRange(*level));
            }
            if !weight.is_finite() {
                return Err(WeightError::NonFinite {
                    dimension: "socio-economic",
                    key: level.to_string(),
                });
            }
            if *weight < 0.0 {
                return Err(WeightError::Negative {
                    dimension: "socio-economic",
                    key: level.to_string(),
                    weight: *weight,
                });
            }
        }
        Ok(())
    }
}
