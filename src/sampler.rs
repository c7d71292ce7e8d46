use std::collections::BTreeMap;

use log::debug;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use thiserror::Error;

use crate::distribution::DistributionWeights;
use crate::suburbs::{SuburbRecord, SuburbTable};

#[derive(Debug, Error)]
pub enum SampleError {
    /// every suburb group carrying requested weight is empty
    #[error("no suburbs carry any of the requested weight")]
    EmptyDistribution,
    #[error("cannot build weighted index: {0}")]
    Weights(#[from] rand::distr::weighted::Error),
}

/// Two-stage weighted sampler over the reference table: suburbs are grouped
/// by (remoteness, socio-economic index), a group is drawn by its combined
/// weight, then a member uniformly within it. Groups without members are
/// dropped and the remaining weights renormalize implicitly.
#[derive(Debug)]
pub struct Sampler<'a> {
    groups: Vec<Vec<&'a SuburbRecord>>,
    index: WeightedIndex<f64>,
}

impl<'a> Sampler<'a> {
    pub fn new(table: &'a SuburbTable, weights: &DistributionWeights) -> Result<Self, SampleError> {
        if table.is_empty() {
            return Err(SampleError::EmptyDistribution);
        }

        // with no weights at all, every row weighs the same regardless of
        // how the groups are sized
        if weights.remoteness.is_empty() && weights.socioeconomic.is_empty() {
            return Ok(
                Self {
                    groups: vec![table.records().iter().collect()],
                    index: WeightedIndex::new([1.0])?,
                }
            );
        }

        let mut grouped: BTreeMap<(crate::suburbs::Remoteness, u8), Vec<&SuburbRecord>> =
            BTreeMap::new();
        for record in table.records() {
            grouped
                .entry((record.remoteness, record.socio_economic_index))
                .or_default()
                .push(record);
        }

        let mut groups = Vec::new();
        let mut group_weights = Vec::new();
        for ((remoteness, socio), members) in grouped {
            let remoteness_weight = if weights.remoteness.is_empty() {
                1.0
            } else {
                weights.remoteness.get(&remoteness).copied().unwrap_or(0.0)
            };
            let socio_weight = if weights.socioeconomic.is_empty() {
                1.0
            } else {
                weights.socioeconomic.get(&socio).copied().unwrap_or(0.0)
            };
            let weight = remoteness_weight * socio_weight;
            if weight > 0.0 {
                groups.push(members);
                group_weights.push(weight);
            }
        }

        if groups.is_empty() {
            return Err(SampleError::EmptyDistribution);
        }
        debug!("sampling over [{}] populated suburb groups", groups.len());

        Ok(
            Self {
                index: WeightedIndex::new(group_weights)?,
                groups,
            }
        )
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &'a SuburbRecord {
        let group = &self.groups[self.index.sample(rng)];
        group[rng.random_range(0..group.len())]
    }
}

/// draw a single suburb; build a [`Sampler`] once when drawing repeatedly
pub fn select<'a, R: Rng + ?Sized>(
    table: &'a SuburbTable,
    weights: &DistributionWeights,
    rng: &mut R,
) -> Result<&'a SuburbRecord, SampleError> {
    Ok(Sampler::new(table, weights)?.sample(rng))
}
