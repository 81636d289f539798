use std::collections::HashSet;

use crate::config::{PairingConfig, Settings};
use crate::core::{
    accumulator::PairingAccumulator,
    attribute::AttributeDistanceEngine,
    filters::{ConstraintFilter, GeneralConstraints},
    reducer::{AttributeReducer, AvailabilityReducer},
    search::{DonorSearch, SearchOutcome, SearchParams},
};
use crate::error::Result;
use crate::models::{DistanceMatrix, PairingSummary, PairingTable, ResolutionTag, UnitCatalog};

/// Result of a full pairing run
#[derive(Debug, Clone)]
pub struct PairingResult {
    pub table: PairingTable,
    pub summary: PairingSummary,
}

/// Pairing orchestrator - runs the attribute rounds and the proximity fallback
///
/// # Rounds
/// 1. `main`: the scenario's attribute set
/// 2. `base`: the base attribute set, for receivers still unpaired
/// 3. `proximity`: nearest eligible donor, for receivers the base round
///    could not pair
///
/// Within a round, unpaired receivers are worked off in sub-rounds grouped by
/// attribute availability; every sub-round gets a freshly computed attribute
/// distance matrix.
pub struct DonorMatcher {
    config: PairingConfig,
    engine: AttributeDistanceEngine,
    reducer: Box<dyn AttributeReducer>,
    filter: Box<dyn ConstraintFilter>,
}

impl DonorMatcher {
    pub fn new(config: PairingConfig) -> Self {
        let engine = AttributeDistanceEngine::from_config(&config);
        let filter = GeneralConstraints::from_pars(&config.general);
        Self {
            config,
            engine,
            reducer: Box::new(AvailabilityReducer),
            filter: Box::new(filter),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(PairingConfig::from_settings(settings)?))
    }

    pub fn with_engine(mut self, engine: AttributeDistanceEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_reducer(mut self, reducer: impl AttributeReducer + 'static) -> Self {
        self.reducer = Box::new(reducer);
        self
    }

    pub fn with_filter(mut self, filter: impl ConstraintFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    /// Pair every receiver in `units` with a donor
    ///
    /// `spatial` must hold a distance for every (receiver, donor) pair.
    pub fn run(&self, units: &UnitCatalog, spatial: &DistanceMatrix) -> Result<PairingResult> {
        let search = DonorSearch::new(
            SearchParams::from_config(&self.config),
            units,
            spatial,
            self.filter.as_ref(),
        );
        let mut acc = PairingAccumulator::new();

        let mut worklist: Vec<String> = units.receivers().map(|u| u.id.clone()).collect();
        let total_receivers = worklist.len();

        let rounds = [
            (ResolutionTag::Main, &self.config.main_attrs),
            (ResolutionTag::Base, &self.config.base_attrs),
        ];
        for (tag, attributes) in rounds {
            if worklist.is_empty() {
                break;
            }
            tracing::info!(round = %tag, receivers = worklist.len(), "starting attribute round");

            let mut pending = worklist.clone();
            let mut sub_round = 0;
            while !pending.is_empty() {
                sub_round += 1;
                let reduction = self.reducer.reduce(units, attributes, &pending)?;

                let mut skipped = reduction.skipped;
                if reduction.processed.is_empty() && skipped.is_empty() {
                    // Nothing left that this round can place
                    skipped = pending.clone();
                }
                let done: HashSet<&String> = reduction.processed.iter().chain(skipped.iter()).collect();
                pending.retain(|id| !done.contains(id));

                if !skipped.is_empty() {
                    tracing::info!(
                        round = %tag,
                        sub_round,
                        receivers = skipped.len(),
                        "receivers without usable attributes this round"
                    );
                }
                if tag == ResolutionTag::Base {
                    for id in &skipped {
                        self.fallback(&search, id, None, &mut acc)?;
                    }
                }

                if reduction.processed.is_empty() {
                    continue;
                }

                let table = &reduction.table;
                tracing::info!(
                    round = %tag,
                    sub_round,
                    attributes = ?table.attributes,
                    receivers = reduction.processed.len(),
                    donors = table.donors.len(),
                    "processing sub-round"
                );
                let attr = self.engine.compute(table)?;

                for id in &reduction.processed {
                    match search.search(id, table, &attr, tag)? {
                        SearchOutcome::Resolved(pair) => {
                            tracing::debug!(
                                receiver = %id,
                                donor = %pair.best_donor_id,
                                round = %tag,
                                "receiver paired"
                            );
                            acc.record(pair);
                        }
                        outcome => {
                            tracing::debug!(receiver = %id, round = %tag, ?outcome, "no donor this round");
                            if tag == ResolutionTag::Base {
                                self.fallback(&search, id, Some(&attr), &mut acc)?;
                            }
                        }
                    }
                }
            }

            worklist.retain(|id| !acc.is_resolved(id));
        }

        for id in &worklist {
            acc.mark_unresolved(id);
        }

        let (table, unresolved) = acc.finish();
        let mut summary = PairingSummary {
            method: self.config.method.to_string(),
            scenario: self.config.scenario.clone(),
            total_receivers,
            unresolved,
            ..Default::default()
        };
        for pair in &table.pairs {
            summary.count(pair.tag);
        }

        tracing::info!(
            total = summary.total_receivers,
            main = summary.resolved_main,
            base = summary.resolved_base,
            proximity = summary.resolved_proximity,
            unresolved = summary.unresolved.len(),
            "pairing complete"
        );
        if !summary.unresolved.is_empty() {
            tracing::warn!(receivers = ?summary.unresolved, "receivers left without a donor");
        }

        Ok(PairingResult { table, summary })
    }

    fn fallback(
        &self,
        search: &DonorSearch<'_, dyn ConstraintFilter>,
        receiver_id: &str,
        attr: Option<&DistanceMatrix>,
        acc: &mut PairingAccumulator,
    ) -> Result<()> {
        match search.proximity(receiver_id, attr)? {
            SearchOutcome::Resolved(pair) => {
                tracing::debug!(receiver = %receiver_id, donor = %pair.best_donor_id, "receiver paired by proximity");
                acc.record(pair);
            }
            _ => {
                tracing::warn!(receiver = %receiver_id, "constraints exclude every donor, receiver stays unpaired");
                acc.mark_unresolved(receiver_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DistanceMethod, GeneralPars, MethodPars};
    use crate::models::{Unit, UnitTag};
    use std::collections::BTreeMap;

    fn config() -> PairingConfig {
        PairingConfig {
            scenario: "hlr".to_string(),
            method: DistanceMethod::Gower,
            main_attrs: vec!["a".to_string(), "b".to_string()],
            base_attrs: vec!["a".to_string()],
            general: GeneralPars {
                max_spa_dist: 1000.0,
                regulation_col: None,
                area_col: None,
                max_area_ratio: None,
                exclude_donors: Vec::new(),
            },
            search: MethodPars {
                min_spa_dist: 0.0,
                zero_spa_dist: 0.0,
                max_attr_dist: 5.0,
                min_attr_dist: 0.1,
                n_donor_max: 2,
                spa_dist_step: 100.0,
                n_trees: 10,
                max_depth: 4,
                n_jobs: 1,
                seed: 0,
            },
        }
    }

    fn unit(id: &str, tag: UnitTag, category: &str, a: Option<f64>, b: Option<f64>) -> Unit {
        Unit {
            id: id.to_string(),
            tag,
            category: category.to_string(),
            values: BTreeMap::from([("a".to_string(), a), ("b".to_string(), b)]),
        }
    }

    fn spatial(rows: &[&str], cols: &[&str], values: Vec<f64>) -> DistanceMatrix {
        DistanceMatrix::new(
            rows.iter().map(|s| s.to_string()).collect(),
            cols.iter().map(|s| s.to_string()).collect(),
            values,
        )
        .unwrap()
    }

    #[test]
    fn test_main_round_resolves() {
        let units = UnitCatalog::new(vec![
            unit("D1", UnitTag::Donor, "1", Some(0.0), Some(0.0)),
            unit("D2", UnitTag::Donor, "1", Some(10.0), Some(10.0)),
            unit("R", UnitTag::Receiver, "1", Some(1.0), Some(1.0)),
        ])
        .unwrap();
        let spatial = spatial(&["R"], &["D1", "D2"], vec![50.0, 500.0]);

        let result = DonorMatcher::new(config()).run(&units, &spatial).unwrap();
        let pair = result.table.get("R").unwrap();
        assert_eq!(pair.tag, ResolutionTag::Main);
        assert_eq!(pair.best_donor_id, "D1");
        assert_eq!(result.summary.resolved_main, 1);
    }

    #[test]
    fn test_partial_attributes_get_later_sub_round() {
        // R lacks `b`, so the main round places it with `a` only after S
        let units = UnitCatalog::new(vec![
            unit("D1", UnitTag::Donor, "1", Some(0.0), Some(0.0)),
            unit("D2", UnitTag::Donor, "1", Some(10.0), Some(10.0)),
            unit("R", UnitTag::Receiver, "1", Some(1.0), None),
            unit("S", UnitTag::Receiver, "1", Some(9.0), Some(9.0)),
        ])
        .unwrap();
        let spatial = spatial(&["R", "S"], &["D1", "D2"], vec![50.0, 500.0, 500.0, 50.0]);

        let result = DonorMatcher::new(config()).run(&units, &spatial).unwrap();
        assert_eq!(result.table.len(), 2);
        assert_eq!(result.table.get("R").unwrap().best_donor_id, "D1");
        assert_eq!(result.table.get("S").unwrap().best_donor_id, "D2");
        assert!(result.table.pairs.iter().all(|p| p.tag == ResolutionTag::Main));
    }

    #[test]
    fn test_donor_gap_keeps_receiver_in_main_round() {
        // No donor carries `b`; `a` alone still pairs R in the main round
        let units = UnitCatalog::new(vec![
            unit("D1", UnitTag::Donor, "1", Some(0.0), None),
            unit("D2", UnitTag::Donor, "1", Some(10.0), None),
            unit("R", UnitTag::Receiver, "1", Some(1.0), Some(1.0)),
        ])
        .unwrap();
        let spatial = spatial(&["R"], &["D1", "D2"], vec![50.0, 500.0]);

        let result = DonorMatcher::new(config()).run(&units, &spatial).unwrap();
        let pair = result.table.get("R").unwrap();
        assert_eq!(pair.tag, ResolutionTag::Main);
        assert_eq!(pair.best_donor_id, "D1");
        assert_eq!(result.summary.resolved_main, 1);
    }

    #[test]
    fn test_receiver_without_attributes_gets_proximity() {
        let units = UnitCatalog::new(vec![
            unit("D1", UnitTag::Donor, "1", Some(0.0), Some(0.0)),
            unit("D2", UnitTag::Donor, "1", Some(10.0), Some(10.0)),
            unit("R", UnitTag::Receiver, "1", None, None),
        ])
        .unwrap();
        let spatial = spatial(&["R"], &["D1", "D2"], vec![800.0, 30.0]);

        let result = DonorMatcher::new(config()).run(&units, &spatial).unwrap();
        let pair = result.table.get("R").unwrap();
        assert_eq!(pair.tag, ResolutionTag::Proximity);
        assert_eq!(pair.best_donor_id, "D2");
        assert_eq!(pair.best_attr_dist, None);
    }

    #[test]
    fn test_constraint_exhaustion_is_reported() {
        let units = UnitCatalog::new(vec![
            unit("D1", UnitTag::Donor, "1", Some(0.0), Some(0.0)),
            unit("R", UnitTag::Receiver, "1", Some(1.0), Some(1.0)),
        ])
        .unwrap();
        let spatial = spatial(&["R"], &["D1"], vec![50.0]);
        let mut cfg = config();
        cfg.general.exclude_donors = vec!["D1".to_string()];

        let result = DonorMatcher::new(cfg).run(&units, &spatial).unwrap();
        assert!(result.table.is_empty());
        assert_eq!(result.summary.unresolved, vec!["R"]);
        assert_eq!(result.summary.total_receivers, 1);
    }
}
