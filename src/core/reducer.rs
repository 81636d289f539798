use crate::error::Result;
use crate::models::{AttributeRow, AttributeTable, Unit, UnitCatalog};

/// Outcome of reducing the unit table for one sub-round
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub table: AttributeTable,
    /// Pending receivers present in `table`; they are evaluated this sub-round
    pub processed: Vec<String>,
    /// Pending receivers with no usable attribute left in this round
    pub skipped: Vec<String>,
}

/// Restricts a round's attribute set to what the pending receivers can support
pub trait AttributeReducer {
    fn reduce(
        &self,
        units: &UnitCatalog,
        attributes: &[String],
        pending: &[String],
    ) -> Result<Reduction>;
}

/// Groups pending receivers by which attributes they have values for
///
/// Attributes no donor has a value for are left out of every pattern. The
/// group with the richest attribute coverage goes first (ties: more donors
/// complete on it, then the larger group, then the earlier one in worklist
/// order); a pattern no donor is complete on only goes when nothing else is
/// left. Donors and receivers enter the table only if they are complete on
/// that group's attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityReducer;

struct Group {
    mask: Vec<usize>,
    receivers: usize,
    donors: usize,
}

impl Group {
    fn rank(&self) -> (bool, usize, usize, usize) {
        (self.donors > 0, self.mask.len(), self.donors, self.receivers)
    }
}

impl AttributeReducer for AvailabilityReducer {
    fn reduce(
        &self,
        units: &UnitCatalog,
        attributes: &[String],
        pending: &[String],
    ) -> Result<Reduction> {
        let pending_units: Vec<&Unit> = pending.iter().filter_map(|id| units.get(id)).collect();

        let supported: Vec<bool> = attributes
            .iter()
            .map(|a| units.donors().any(|d| d.value(a).is_some()))
            .collect();
        let unsupported: Vec<&String> = attributes
            .iter()
            .zip(&supported)
            .filter(|(_, s)| !**s)
            .map(|(a, _)| a)
            .collect();
        if !unsupported.is_empty() {
            tracing::debug!(attributes = ?unsupported, "no donor has a value for these attributes");
        }

        let mut groups: Vec<Group> = Vec::new();
        for unit in &pending_units {
            let mask = availability(unit, attributes, &supported);
            match groups.iter_mut().find(|g| g.mask == mask) {
                Some(group) => group.receivers += 1,
                None => groups.push(Group {
                    mask,
                    receivers: 1,
                    donors: 0,
                }),
            }
        }
        for group in &mut groups {
            group.donors = units
                .donors()
                .filter(|d| group.mask.iter().all(|&i| d.value(&attributes[i]).is_some()))
                .count();
        }

        let mut best: Option<&Group> = None;
        for group in &groups {
            if best.map_or(true, |b| group.rank() > b.rank()) {
                best = Some(group);
            }
        }

        let mask = best.map(|g| g.mask.clone()).unwrap_or_default();
        if mask.is_empty() {
            return Ok(Reduction {
                table: AttributeTable {
                    attributes: Vec::new(),
                    donors: Vec::new(),
                    receivers: Vec::new(),
                },
                processed: Vec::new(),
                skipped: pending_units.iter().map(|u| u.id.clone()).collect(),
            });
        }

        let selected: Vec<String> = mask.iter().map(|&i| attributes[i].clone()).collect();
        let donors: Vec<AttributeRow> = units
            .donors()
            .filter_map(|u| complete_row(u, &selected))
            .collect();
        let receivers: Vec<AttributeRow> = pending_units
            .iter()
            .filter_map(|u| complete_row(u, &selected))
            .collect();
        let processed = receivers.iter().map(|r| r.id.clone()).collect();

        Ok(Reduction {
            table: AttributeTable {
                attributes: selected,
                donors,
                receivers,
            },
            processed,
            skipped: Vec::new(),
        })
    }
}

fn availability(unit: &Unit, attributes: &[String], supported: &[bool]) -> Vec<usize> {
    attributes
        .iter()
        .enumerate()
        .filter(|(i, a)| supported[*i] && unit.value(a).is_some())
        .map(|(i, _)| i)
        .collect()
}

fn complete_row(unit: &Unit, attributes: &[String]) -> Option<AttributeRow> {
    let values = attributes
        .iter()
        .map(|a| unit.value(a))
        .collect::<Option<Vec<f64>>>()?;
    Some(AttributeRow {
        id: unit.id.clone(),
        category: unit.category.clone(),
        values,
    })
}
