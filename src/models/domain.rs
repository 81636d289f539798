use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{PairingError, Result};

/// Role of a unit in the pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitTag {
    Donor,
    Receiver,
}

/// A catchment with its category and numeric columns
///
/// `values` holds every numeric column of the input row, attributes and
/// metadata alike. A `None` or non-finite value is treated as missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub tag: UnitTag,
    pub category: String,
    #[serde(default)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl Unit {
    pub fn is_donor(&self) -> bool {
        self.tag == UnitTag::Donor
    }

    /// Finite value of a column, `None` when missing
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values
            .get(column)
            .copied()
            .flatten()
            .filter(|v| v.is_finite())
    }
}

/// All units of a run, in input order, indexed by id
#[derive(Debug, Clone)]
pub struct UnitCatalog {
    units: Vec<Unit>,
    index: HashMap<String, usize>,
}

impl UnitCatalog {
    pub fn new(units: Vec<Unit>) -> Result<Self> {
        let mut index = HashMap::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            if index.insert(unit.id.clone(), i).is_some() {
                return Err(PairingError::DuplicateUnit(unit.id.clone()));
            }
        }
        Ok(Self { units, index })
    }

    pub fn get(&self, id: &str) -> Option<&Unit> {
        self.index.get(id).map(|&i| &self.units[i])
    }

    pub fn donors(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(|u| u.tag == UnitTag::Donor)
    }

    pub fn receivers(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(|u| u.tag == UnitTag::Receiver)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// One row of an attribute table
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRow {
    pub id: String,
    pub category: String,
    pub values: Vec<f64>,
}

/// Attribute values for one sub-round
///
/// Donor rows come first, then receiver rows. Every value is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTable {
    pub attributes: Vec<String>,
    pub donors: Vec<AttributeRow>,
    pub receivers: Vec<AttributeRow>,
}

impl AttributeTable {
    /// Donor rows followed by receiver rows
    pub fn rows(&self) -> impl Iterator<Item = &AttributeRow> {
        self.donors.iter().chain(self.receivers.iter())
    }

    pub fn n_rows(&self) -> usize {
        self.donors.len() + self.receivers.len()
    }

    pub fn donor_ids(&self) -> Vec<String> {
        self.donors.iter().map(|r| r.id.clone()).collect()
    }

    pub fn receiver_ids(&self) -> Vec<String> {
        self.receivers.iter().map(|r| r.id.clone()).collect()
    }

    /// Row-major copy of all attribute values (donors first)
    pub fn value_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(|r| r.values.clone()).collect()
    }
}

/// Round in which a receiver was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTag {
    Main,
    Base,
    Proximity,
}

impl ResolutionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTag::Main => "main",
            ResolutionTag::Base => "base",
            ResolutionTag::Proximity => "proximity",
        }
    }
}

impl fmt::Display for ResolutionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A potential donor for one receiver
#[derive(Debug, Clone, PartialEq)]
pub struct DonorCandidate {
    pub donor_id: String,
    pub attr_dist: Option<f64>,
    pub spatial_dist: f64,
}

/// Resolved donor assignment for one receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    #[serde(rename = "id")]
    pub receiver_id: String,
    pub tag: ResolutionTag,
    #[serde(rename = "donor")]
    pub best_donor_id: String,
    #[serde(rename = "distAttr")]
    pub best_attr_dist: Option<f64>,
    #[serde(rename = "distSpatial")]
    pub best_spatial_dist: f64,
    #[serde(rename = "donors")]
    pub ranked_donor_ids: Vec<String>,
    #[serde(rename = "distAttrs")]
    pub ranked_attr_dists: Vec<Option<f64>>,
    #[serde(rename = "distSpatials")]
    pub ranked_spatial_dists: Vec<f64>,
}

impl Pair {
    /// Build a pair from ranked candidates and the index of the best one
    ///
    /// Returns `None` if `best` is out of range.
    pub fn from_ranked(
        receiver_id: &str,
        tag: ResolutionTag,
        ranked: &[DonorCandidate],
        best: usize,
    ) -> Option<Self> {
        let best_candidate = ranked.get(best)?;
        Some(Self {
            receiver_id: receiver_id.to_string(),
            tag,
            best_donor_id: best_candidate.donor_id.clone(),
            best_attr_dist: best_candidate.attr_dist,
            best_spatial_dist: best_candidate.spatial_dist,
            ranked_donor_ids: ranked.iter().map(|c| c.donor_id.clone()).collect(),
            ranked_attr_dists: ranked.iter().map(|c| c.attr_dist).collect(),
            ranked_spatial_dists: ranked.iter().map(|c| c.spatial_dist).collect(),
        })
    }
}
