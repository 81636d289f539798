use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::InputSettings;
use crate::core::spatial::matrix_from_coordinates;
use crate::error::{PairingError, Result};
use crate::models::{DistanceMatrix, Unit, UnitCatalog, UnitTag};

/// Reads unit records from JSON
///
/// Accepts either a bare array of flat records or an object holding them
/// under `units`. Every record needs `id`, `tag` and the category column;
/// all other fields must be numbers or null, except the metadata columns
/// listed in `non_attr_cols`, which are skipped when not numeric.
#[derive(Debug, Clone)]
pub struct UnitLoader {
    category_col: String,
    non_attr_cols: Vec<String>,
}

impl UnitLoader {
    pub fn new(category_col: impl Into<String>, non_attr_cols: Vec<String>) -> Self {
        Self {
            category_col: category_col.into(),
            non_attr_cols,
        }
    }

    pub fn load(&self, path: &Path) -> Result<UnitCatalog> {
        let text = fs::read_to_string(path)?;
        let catalog = self.parse(&text)?;
        tracing::info!(
            path = %path.display(),
            donors = catalog.donors().count(),
            receivers = catalog.receivers().count(),
            "units loaded"
        );
        Ok(catalog)
    }

    pub fn parse(&self, json: &str) -> Result<UnitCatalog> {
        let value: Value = serde_json::from_str(json)?;
        let records = match &value {
            Value::Array(records) => records,
            Value::Object(obj) => obj
                .get("units")
                .and_then(|u| u.as_array())
                .ok_or_else(|| PairingError::InvalidConfig("unit file has no units array".into()))?,
            _ => return Err(PairingError::InvalidConfig("unit file must hold a JSON array".into())),
        };

        let units = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let obj = record.as_object().ok_or_else(|| {
                    PairingError::InvalidConfig(format!("unit record {} is not an object", i))
                })?;
                self.unit(obj, i)
            })
            .collect::<Result<Vec<_>>>()?;

        UnitCatalog::new(units)
    }

    fn unit(&self, obj: &Map<String, Value>, index: usize) -> Result<Unit> {
        let id = match obj.get("id") {
            Some(v) => scalar_text(v).ok_or_else(|| PairingError::InvalidValue {
                unit: format!("#{}", index),
                column: "id".to_string(),
                value: v.to_string(),
            })?,
            None => {
                return Err(PairingError::MissingColumn {
                    unit: format!("#{}", index),
                    column: "id".to_string(),
                })
            }
        };

        let tag_value = obj.get("tag").ok_or_else(|| PairingError::MissingColumn {
            unit: id.clone(),
            column: "tag".to_string(),
        })?;
        let tag = match tag_value.as_str().map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("donor") => UnitTag::Donor,
            Some("receiver") => UnitTag::Receiver,
            _ => {
                return Err(PairingError::InvalidValue {
                    unit: id,
                    column: "tag".to_string(),
                    value: tag_value.to_string(),
                })
            }
        };

        let category_value = obj.get(&self.category_col).ok_or_else(|| PairingError::MissingColumn {
            unit: id.clone(),
            column: self.category_col.clone(),
        })?;
        let category = scalar_text(category_value).ok_or_else(|| PairingError::InvalidValue {
            unit: id.clone(),
            column: self.category_col.clone(),
            value: category_value.to_string(),
        })?;

        let mut values = BTreeMap::new();
        for (key, value) in obj {
            if key == "id" || key == "tag" || *key == self.category_col {
                continue;
            }
            match value {
                Value::Null => {
                    values.insert(key.clone(), None);
                }
                Value::Number(n) => {
                    values.insert(key.clone(), n.as_f64());
                }
                _ if self.non_attr_cols.contains(key) => {}
                other => {
                    return Err(PairingError::InvalidValue {
                        unit: id,
                        column: key.clone(),
                        value: other.to_string(),
                    })
                }
            }
        }

        Ok(Unit {
            id,
            tag,
            category,
            values,
        })
    }
}

/// Strings as-is, integers without a fractional part
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i.to_string()),
            None => n.as_f64().map(|f| f.to_string()),
        },
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct SpatialFile {
    ids: Vec<String>,
    distances: Vec<Vec<f64>>,
}

/// Parse a square spatial-distance matrix, `{"ids": [...], "distances": [[...]]}`
pub fn parse_spatial(json: &str) -> Result<DistanceMatrix> {
    let file: SpatialFile = serde_json::from_str(json)?;
    let n = file.ids.len();
    if file.distances.len() != n || file.distances.iter().any(|row| row.len() != n) {
        return Err(PairingError::InvalidConfig(format!(
            "spatial matrix must be {} x {} to match its ids",
            n, n
        )));
    }
    let values = file.distances.into_iter().flatten().collect();
    DistanceMatrix::new(file.ids.clone(), file.ids, values)
}

pub fn load_spatial(path: &Path) -> Result<DistanceMatrix> {
    let text = fs::read_to_string(path)?;
    let matrix = parse_spatial(&text)?;
    tracing::info!(path = %path.display(), units = matrix.shape().0, "spatial distances loaded");
    Ok(matrix)
}

/// Spatial matrix from the configured file, else from coordinate columns
pub fn spatial_from_settings(input: &InputSettings, units: &UnitCatalog) -> Result<DistanceMatrix> {
    if let Some(path) = &input.spatial {
        return load_spatial(Path::new(path));
    }
    match (&input.lat_col, &input.lon_col) {
        (Some(lat), Some(lon)) => {
            tracing::info!(lat_col = %lat, lon_col = %lon, "computing great-circle distances");
            matrix_from_coordinates(units, lat, lon)
        }
        _ => Err(PairingError::InvalidConfig(
            "either input.spatial or input.lat_col and input.lon_col must be set".into(),
        )),
    }
}
