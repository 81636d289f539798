use std::collections::HashSet;

use crate::config::GeneralPars;
use crate::models::{DonorCandidate, Unit, UnitCatalog};

/// Domain eligibility rules applied to a receiver's candidate donors
///
/// Implementations keep the relative order of the candidates they retain.
pub trait ConstraintFilter {
    fn apply(
        &self,
        receiver: &Unit,
        candidates: Vec<DonorCandidate>,
        units: &UnitCatalog,
    ) -> Vec<DonorCandidate>;
}

/// Accepts every candidate
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstraints;

impl ConstraintFilter for NoConstraints {
    fn apply(&self, _: &Unit, candidates: Vec<DonorCandidate>, _: &UnitCatalog) -> Vec<DonorCandidate> {
        candidates
    }
}

/// Constraints configured under `pars.general`
#[derive(Debug, Clone, Default)]
pub struct GeneralConstraints {
    pub exclude_donors: HashSet<String>,
    pub regulation_col: Option<String>,
    pub area_col: Option<String>,
    pub max_area_ratio: Option<f64>,
}

impl GeneralConstraints {
    pub fn from_pars(pars: &GeneralPars) -> Self {
        Self {
            exclude_donors: pars.exclude_donors.iter().cloned().collect(),
            regulation_col: pars.regulation_col.clone(),
            area_col: pars.area_col.clone(),
            max_area_ratio: pars.max_area_ratio,
        }
    }

    pub fn is_eligible(&self, receiver: &Unit, donor: &Unit) -> bool {
        if self.exclude_donors.contains(&donor.id) {
            return false;
        }

        if let Some(col) = &self.regulation_col {
            if !same_regulation(receiver, donor, col) {
                return false;
            }
        }

        if let (Some(col), Some(max_ratio)) = (&self.area_col, self.max_area_ratio) {
            if !within_area_ratio(receiver, donor, col, max_ratio) {
                return false;
            }
        }

        true
    }
}

impl ConstraintFilter for GeneralConstraints {
    fn apply(
        &self,
        receiver: &Unit,
        candidates: Vec<DonorCandidate>,
        units: &UnitCatalog,
    ) -> Vec<DonorCandidate> {
        candidates
            .into_iter()
            .filter(|c| {
                units
                    .get(&c.donor_id)
                    .map(|donor| self.is_eligible(receiver, donor))
                    .unwrap_or(false)
            })
            .collect()
    }
}

/// Regulation status must agree; a missing value is its own status
#[inline]
pub fn same_regulation(receiver: &Unit, donor: &Unit, column: &str) -> bool {
    receiver.value(column) == donor.value(column)
}

/// Larger-over-smaller area ratio at most `max_ratio`; unknown areas pass
#[inline]
pub fn within_area_ratio(receiver: &Unit, donor: &Unit, column: &str, max_ratio: f64) -> bool {
    match (receiver.value(column), donor.value(column)) {
        (Some(a), Some(b)) if a > 0.0 && b > 0.0 => a.max(b) / a.min(b) <= max_ratio,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnitTag;
    use std::collections::BTreeMap;

    fn unit(id: &str, tag: UnitTag, regulated: Option<f64>, area: Option<f64>) -> Unit {
        Unit {
            id: id.to_string(),
            tag,
            category: "0".to_string(),
            values: BTreeMap::from([
                ("regulated".to_string(), regulated),
                ("area".to_string(), area),
            ]),
        }
    }

    fn candidate(id: &str) -> DonorCandidate {
        DonorCandidate {
            donor_id: id.to_string(),
            attr_dist: Some(0.1),
            spatial_dist: 10.0,
        }
    }

    fn catalog() -> UnitCatalog {
        UnitCatalog::new(vec![
            unit("d1", UnitTag::Donor, Some(0.0), Some(100.0)),
            unit("d2", UnitTag::Donor, Some(1.0), Some(120.0)),
            unit("d3", UnitTag::Donor, Some(0.0), Some(5000.0)),
            unit("d4", UnitTag::Donor, Some(0.0), None),
            unit("r1", UnitTag::Receiver, Some(0.0), Some(110.0)),
        ])
        .unwrap()
    }

    #[test]
    fn test_regulation_conflict_excluded() {
        let units = catalog();
        let filter = GeneralConstraints {
            regulation_col: Some("regulated".to_string()),
            ..Default::default()
        };
        let receiver = units.get("r1").unwrap();
        let kept = filter.apply(receiver, vec![candidate("d2"), candidate("d1")], &units);
        assert_eq!(kept, vec![candidate("d1")]);
    }

    #[test]
    fn test_area_ratio() {
        let units = catalog();
        let filter = GeneralConstraints {
            area_col: Some("area".to_string()),
            max_area_ratio: Some(10.0),
            ..Default::default()
        };
        let receiver = units.get("r1").unwrap();
        let kept = filter.apply(
            receiver,
            vec![candidate("d3"), candidate("d4"), candidate("d1")],
            &units,
        );
        let ids: Vec<_> = kept.iter().map(|c| c.donor_id.as_str()).collect();
        assert_eq!(ids, vec!["d4", "d1"]);
    }

    #[test]
    fn test_excluded_and_unknown_donors() {
        let units = catalog();
        let filter = GeneralConstraints {
            exclude_donors: HashSet::from(["d1".to_string()]),
            ..Default::default()
        };
        let receiver = units.get("r1").unwrap();
        let kept = filter.apply(
            receiver,
            vec![candidate("d1"), candidate("ghost"), candidate("d2")],
            &units,
        );
        assert_eq!(kept, vec![candidate("d2")]);
    }

    #[test]
    fn test_no_constraints() {
        let units = catalog();
        let receiver = units.get("r1").unwrap();
        let kept = NoConstraints.apply(receiver, vec![candidate("d1")], &units);
        assert_eq!(kept.len(), 1);
    }
}
