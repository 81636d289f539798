use std::cmp::Ordering;

use crate::config::PairingConfig;
use crate::core::filters::ConstraintFilter;
use crate::core::spatial::distances_to_donors;
use crate::error::{PairingError, Result};
use crate::models::{
    AttributeTable, DistanceMatrix, DonorCandidate, Pair, ResolutionTag, Unit, UnitCatalog,
};

/// Thresholds steering the neighbourhood expansion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub min_spa_dist: f64,
    pub max_spa_dist: f64,
    pub spa_dist_step: f64,
    /// Donors at or below this distance count as co-located; `0` disables
    pub zero_spa_dist: f64,
    pub max_attr_dist: f64,
    pub min_attr_dist: f64,
    pub n_donor_max: usize,
}

impl SearchParams {
    pub fn from_config(config: &PairingConfig) -> Self {
        Self {
            min_spa_dist: config.search.min_spa_dist,
            max_spa_dist: config.general.max_spa_dist,
            spa_dist_step: config.search.spa_dist_step,
            zero_spa_dist: config.search.zero_spa_dist,
            max_attr_dist: config.search.max_attr_dist,
            min_attr_dist: config.search.min_attr_dist,
            n_donor_max: config.search.n_donor_max,
        }
    }
}

/// Result of searching donors for one receiver
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Resolved(Pair),
    /// Nothing passed the spatial, category and attribute thresholds
    NoCandidates,
    /// Candidates existed but the constraint filter removed every one
    ConstraintExhausted,
}

impl SearchOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, SearchOutcome::Resolved(_))
    }
}

/// Per-receiver donor search over one sub-round's distance matrices
///
/// Candidates are always considered in ascending donor id order, so ties on
/// attribute rank and in the proximity fallback go to the lowest id. A tie
/// for nearest among ranked donors goes to the first in rank order.
pub struct DonorSearch<'a, F: ConstraintFilter + ?Sized> {
    params: SearchParams,
    units: &'a UnitCatalog,
    spatial: &'a DistanceMatrix,
    filter: &'a F,
}

impl<'a, F: ConstraintFilter + ?Sized> DonorSearch<'a, F> {
    pub fn new(
        params: SearchParams,
        units: &'a UnitCatalog,
        spatial: &'a DistanceMatrix,
        filter: &'a F,
    ) -> Self {
        Self {
            params,
            units,
            spatial,
            filter,
        }
    }

    /// Expand the search radius until a good enough donor is found
    ///
    /// `attr` must be the matrix computed from `table`; only donors present in
    /// `table` are looked up in it.
    pub fn search(
        &self,
        receiver_id: &str,
        table: &AttributeTable,
        attr: &DistanceMatrix,
        tag: ResolutionTag,
    ) -> Result<SearchOutcome> {
        let receiver = self.receiver(receiver_id)?;

        // Donors of this sub-round sharing the receiver's category
        let mut pool_ids: Vec<&str> = table
            .donors
            .iter()
            .filter(|d| d.category == receiver.category)
            .map(|d| d.id.as_str())
            .collect();
        pool_ids.sort_unstable();
        let pool_spatial = distances_to_donors(self.spatial, receiver_id, &pool_ids)?;

        let co_located = self.nearest_co_located(receiver_id)?;

        let p = &self.params;
        let mut radius = p.min_spa_dist.min(p.max_spa_dist);
        let mut qualified: Vec<DonorCandidate>;
        loop {
            let mut in_reach = 0;
            qualified = Vec::new();
            for (donor, &spatial) in pool_ids.iter().zip(&pool_spatial) {
                let reachable = match co_located {
                    Some(nearest) => nearest == *donor,
                    None => spatial <= radius,
                };
                if !reachable {
                    continue;
                }
                in_reach += 1;
                let Some(attr_dist) = attr.get(receiver_id, donor) else {
                    continue;
                };
                if attr_dist <= p.max_attr_dist {
                    qualified.push(DonorCandidate {
                        donor_id: donor.to_string(),
                        attr_dist: Some(attr_dist),
                        spatial_dist: spatial,
                    });
                }
            }

            let best_attr = qualified
                .iter()
                .filter_map(|c| c.attr_dist)
                .min_by(f64::total_cmp);
            if best_attr.is_some_and(|d| d <= p.min_attr_dist) {
                break;
            }
            // A larger radius cannot change the candidate set any more
            if co_located.is_some() || in_reach == pool_ids.len() {
                break;
            }
            if radius >= p.max_spa_dist {
                break;
            }
            radius = (radius + p.spa_dist_step).min(p.max_spa_dist);
        }

        if qualified.is_empty() {
            return Ok(SearchOutcome::NoCandidates);
        }

        let mut ranked = self.filter.apply(receiver, qualified, self.units);
        if ranked.is_empty() {
            return Ok(SearchOutcome::ConstraintExhausted);
        }

        ranked.sort_by(|a, b| by_attr(a, b));
        ranked.truncate(p.n_donor_max);

        let best = nearest(&ranked);
        Ok(Pair::from_ranked(receiver_id, tag, &ranked, best)
            .map(SearchOutcome::Resolved)
            .unwrap_or(SearchOutcome::NoCandidates))
    }

    /// Last resort: the spatially nearest eligible donor, ignoring category
    /// and attribute similarity
    ///
    /// `attr`, when given, supplies the attribute distance reported alongside.
    pub fn proximity(
        &self,
        receiver_id: &str,
        attr: Option<&DistanceMatrix>,
    ) -> Result<SearchOutcome> {
        let receiver = self.receiver(receiver_id)?;

        let mut donor_ids: Vec<&str> = self.units.donors().map(|u| u.id.as_str()).collect();
        donor_ids.sort_unstable();
        let spatial = distances_to_donors(self.spatial, receiver_id, &donor_ids)?;

        let candidates: Vec<DonorCandidate> = donor_ids
            .iter()
            .zip(spatial)
            .map(|(donor, spatial_dist)| DonorCandidate {
                donor_id: donor.to_string(),
                attr_dist: attr.and_then(|m| m.get(receiver_id, donor)),
                spatial_dist,
            })
            .collect();

        let eligible = self.filter.apply(receiver, candidates, self.units);
        if eligible.is_empty() {
            return Ok(SearchOutcome::ConstraintExhausted);
        }

        let best = eligible[nearest(&eligible)].clone();
        Ok(Pair::from_ranked(receiver_id, ResolutionTag::Proximity, &[best], 0)
            .map(SearchOutcome::Resolved)
            .unwrap_or(SearchOutcome::ConstraintExhausted))
    }

    fn receiver(&self, receiver_id: &str) -> Result<&'a Unit> {
        self.units
            .get(receiver_id)
            .ok_or_else(|| PairingError::InvalidConfig(format!("unknown receiver {}", receiver_id)))
    }

    /// Spatially nearest donor within the co-location threshold, if any
    fn nearest_co_located(&self, receiver_id: &str) -> Result<Option<&'a str>> {
        if self.params.zero_spa_dist <= 0.0 {
            return Ok(None);
        }
        let mut donor_ids: Vec<&'a str> = self.units.donors().map(|u| u.id.as_str()).collect();
        donor_ids.sort_unstable();
        let spatial = distances_to_donors(self.spatial, receiver_id, &donor_ids)?;

        let mut best: Option<(&'a str, f64)> = None;
        for (donor, d) in donor_ids.into_iter().zip(spatial) {
            if d <= self.params.zero_spa_dist && best.map_or(true, |(_, b)| d < b) {
                best = Some((donor, d));
            }
        }
        Ok(best.map(|(id, _)| id))
    }
}

fn by_attr(a: &DonorCandidate, b: &DonorCandidate) -> Ordering {
    let a = a.attr_dist.unwrap_or(f64::INFINITY);
    let b = b.attr_dist.unwrap_or(f64::INFINITY);
    a.total_cmp(&b)
}

/// Index of the smallest spatial distance, first one on ties
fn nearest(candidates: &[DonorCandidate]) -> usize {
    let mut best = 0;
    for (i, c) in candidates.iter().enumerate().skip(1) {
        if c.spatial_dist < candidates[best].spatial_dist {
            best = i;
        }
    }
    best
}
