use std::collections::HashMap;

use crate::error::{PairingError, Result};

/// Dense distance matrix labelled by row and column ids
///
/// Used both for the receiver x donor spatial distances and the per
/// sub-round attribute distances. Lookups are keyed by id, never by position.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    row_ids: Vec<String>,
    col_ids: Vec<String>,
    row_index: HashMap<String, usize>,
    col_index: HashMap<String, usize>,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Build from row-major values
    pub fn new(row_ids: Vec<String>, col_ids: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if values.len() != row_ids.len() * col_ids.len() {
            return Err(PairingError::Degenerate(format!(
                "matrix of {}x{} given {} values",
                row_ids.len(),
                col_ids.len(),
                values.len()
            )));
        }
        let row_index = index_ids(&row_ids)?;
        let col_index = index_ids(&col_ids)?;
        Ok(Self {
            row_ids,
            col_ids,
            row_index,
            col_index,
            values,
        })
    }

    /// Build from one vector per column, each holding a value per row
    pub fn from_columns(
        row_ids: Vec<String>,
        col_ids: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let n_rows = row_ids.len();
        if columns.len() != col_ids.len() || columns.iter().any(|c| c.len() != n_rows) {
            return Err(PairingError::Degenerate(format!(
                "column data does not match a {}x{} matrix",
                n_rows,
                col_ids.len()
            )));
        }
        let n_cols = col_ids.len();
        let mut values = vec![0.0; n_rows * n_cols];
        for (j, column) in columns.iter().enumerate() {
            for (i, v) in column.iter().enumerate() {
                values[i * n_cols + j] = *v;
            }
        }
        Self::new(row_ids, col_ids, values)
    }

    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = *self.row_index.get(row)?;
        let j = *self.col_index.get(col)?;
        Some(self.values[i * self.col_ids.len() + j])
    }

    /// All values of one row, aligned with `col_ids`
    pub fn row(&self, row: &str) -> Option<&[f64]> {
        let i = *self.row_index.get(row)?;
        let n = self.col_ids.len();
        Some(&self.values[i * n..(i + 1) * n])
    }

    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    pub fn col_ids(&self) -> &[String] {
        &self.col_ids
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.row_ids.len(), self.col_ids.len())
    }
}

fn index_ids(ids: &[String]) -> Result<HashMap<String, usize>> {
    let mut index = HashMap::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        if index.insert(id.clone(), i).is_some() {
            return Err(PairingError::DuplicateUnit(id.clone()));
        }
    }
    Ok(index)
}
