use serde::{Deserialize, Serialize};

use crate::models::domain::{Pair, ResolutionTag};

/// Column header of the delimited pairing table
pub const PAIRING_HEADER: &str = "id,tag,donor,distAttr,distSpatial,donors,distAttrs,distSpatials";

/// Final donor-receiver pairing table, one row per resolved receiver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingTable {
    pub pairs: Vec<Pair>,
}

impl PairingTable {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, receiver_id: &str) -> Option<&Pair> {
        self.pairs.iter().find(|p| p.receiver_id == receiver_id)
    }

    /// Render as comma-separated text
    ///
    /// Ranked lists are comma-joined inside a quoted field, in rank order.
    pub fn to_delimited(&self) -> String {
        let mut out = String::with_capacity(64 * (self.pairs.len() + 1));
        out.push_str(PAIRING_HEADER);
        out.push('\n');
        for pair in &self.pairs {
            let fields = [
                quote(&pair.receiver_id),
                pair.tag.to_string(),
                quote(&pair.best_donor_id),
                pair.best_attr_dist.map(format_number).unwrap_or_default(),
                format_number(pair.best_spatial_dist),
                quote(&pair.ranked_donor_ids.join(",")),
                quote(
                    &pair
                        .ranked_attr_dists
                        .iter()
                        .map(|d| d.map(format_number).unwrap_or_default())
                        .collect::<Vec<_>>()
                        .join(","),
                ),
                quote(
                    &pair
                        .ranked_spatial_dists
                        .iter()
                        .map(|d| format_number(*d))
                        .collect::<Vec<_>>()
                        .join(","),
                ),
            ];
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }
}

/// Run-level counts and the receivers left without a donor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingSummary {
    pub method: String,
    pub scenario: String,
    pub total_receivers: usize,
    pub resolved_main: usize,
    pub resolved_base: usize,
    pub resolved_proximity: usize,
    pub unresolved: Vec<String>,
}

impl PairingSummary {
    pub fn count(&mut self, tag: ResolutionTag) {
        match tag {
            ResolutionTag::Main => self.resolved_main += 1,
            ResolutionTag::Base => self.resolved_base += 1,
            ResolutionTag::Proximity => self.resolved_proximity += 1,
        }
    }

    pub fn resolved(&self) -> usize {
        self.resolved_main + self.resolved_base + self.resolved_proximity
    }
}

fn format_number(v: f64) -> String {
    format!("{}", v)
}

fn quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
