use std::collections::HashSet;

use crate::models::{Pair, PairingTable};

/// Append-only collection of resolved pairs
///
/// A receiver is recorded at most once; later resolutions for the same
/// receiver are ignored, never merged or overwritten.
#[derive(Debug, Clone, Default)]
pub struct PairingAccumulator {
    pairs: Vec<Pair>,
    resolved: HashSet<String>,
    unresolved: Vec<String>,
}

impl PairingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair, rounding its attribute distances and best spatial
    /// distance to 3 decimals
    ///
    /// Returns `false` if the receiver already has a pair.
    pub fn record(&mut self, mut pair: Pair) -> bool {
        if self.resolved.contains(&pair.receiver_id) {
            tracing::warn!(receiver = %pair.receiver_id, "receiver already paired, keeping first pair");
            return false;
        }

        pair.best_attr_dist = pair.best_attr_dist.map(round3);
        pair.best_spatial_dist = round3(pair.best_spatial_dist);
        for d in pair.ranked_attr_dists.iter_mut() {
            *d = d.map(round3);
        }

        self.resolved.insert(pair.receiver_id.clone());
        self.pairs.push(pair);
        true
    }

    /// Note a receiver that exhausted every round without a donor
    pub fn mark_unresolved(&mut self, receiver_id: &str) {
        if !self.resolved.contains(receiver_id) && !self.unresolved.iter().any(|r| r == receiver_id) {
            self.unresolved.push(receiver_id.to_string());
        }
    }

    pub fn is_resolved(&self, receiver_id: &str) -> bool {
        self.resolved.contains(receiver_id)
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Final table and the receivers left without a donor
    pub fn finish(self) -> (PairingTable, Vec<String>) {
        (PairingTable { pairs: self.pairs }, self.unresolved)
    }
}

#[inline]
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResolutionTag;

    fn pair(receiver: &str, donor: &str, tag: ResolutionTag) -> Pair {
        Pair {
            receiver_id: receiver.to_string(),
            tag,
            best_donor_id: donor.to_string(),
            best_attr_dist: Some(0.123456),
            best_spatial_dist: 12.34567,
            ranked_donor_ids: vec![donor.to_string()],
            ranked_attr_dists: vec![Some(0.123456)],
            ranked_spatial_dists: vec![12.34567],
        }
    }

    #[test]
    fn test_rounding() {
        let mut acc = PairingAccumulator::new();
        assert!(acc.record(pair("r1", "d1", ResolutionTag::Main)));
        let recorded = &acc.pairs()[0];
        assert_eq!(recorded.best_attr_dist, Some(0.123));
        assert_eq!(recorded.best_spatial_dist, 12.346);
        assert_eq!(recorded.ranked_attr_dists, vec![Some(0.123)]);
        assert_eq!(recorded.ranked_spatial_dists, vec![12.34567]);
    }

    #[test]
    fn test_first_resolution_wins() {
        let mut acc = PairingAccumulator::new();
        assert!(acc.record(pair("r1", "d1", ResolutionTag::Main)));
        assert!(!acc.record(pair("r1", "d2", ResolutionTag::Proximity)));

        let (table, unresolved) = acc.finish();
        assert_eq!(table.len(), 1);
        assert_eq!(table.pairs[0].best_donor_id, "d1");
        assert!(unresolved.is_empty());
    }

    #[test]
    fn test_unresolved_listed_once() {
        let mut acc = PairingAccumulator::new();
        acc.record(pair("r1", "d1", ResolutionTag::Base));
        acc.mark_unresolved("r2");
        acc.mark_unresolved("r2");
        acc.mark_unresolved("r1");
        assert_eq!(acc.unresolved(), &["r2".to_string()]);
        assert!(acc.is_resolved("r1"));
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.0996), 0.1);
        assert_eq!(round3(2.0), 2.0);
    }
}
