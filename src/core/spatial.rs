use geo::{HaversineDistance, Point};

use crate::error::{PairingError, Result};
use crate::models::{DistanceMatrix, UnitCatalog};

/// Calculate the great-circle distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let a = Point::new(lon1, lat1);
    let b = Point::new(lon2, lat2);
    a.haversine_distance(&b) / 1000.0
}

/// Receiver x donor spatial matrix from coordinate columns, in kilometers
pub fn matrix_from_coordinates(
    units: &UnitCatalog,
    lat_col: &str,
    lon_col: &str,
) -> Result<DistanceMatrix> {
    let coords = |id: &str| -> Result<(f64, f64)> {
        let unit = units
            .get(id)
            .ok_or_else(|| PairingError::InvalidConfig(format!("unknown unit {}", id)))?;
        let lat = unit.value(lat_col).ok_or_else(|| PairingError::MissingColumn {
            unit: id.to_string(),
            column: lat_col.to_string(),
        })?;
        let lon = unit.value(lon_col).ok_or_else(|| PairingError::MissingColumn {
            unit: id.to_string(),
            column: lon_col.to_string(),
        })?;
        Ok((lat, lon))
    };

    let receivers: Vec<String> = units.receivers().map(|u| u.id.clone()).collect();
    let donors: Vec<String> = units.donors().map(|u| u.id.clone()).collect();
    let donor_coords = donors.iter().map(|d| coords(d.as_str())).collect::<Result<Vec<_>>>()?;

    let mut values = Vec::with_capacity(receivers.len() * donors.len());
    for r in &receivers {
        let (lat, lon) = coords(r.as_str())?;
        values.extend(
            donor_coords
                .iter()
                .map(|(dlat, dlon)| haversine_distance(lat, lon, *dlat, *dlon)),
        );
    }

    DistanceMatrix::new(receivers, donors, values)
}

/// Spatial distance from `receiver` to each donor, aligned with `donors`
pub fn distances_to_donors<S: AsRef<str>>(
    spatial: &DistanceMatrix,
    receiver: &str,
    donors: &[S],
) -> Result<Vec<f64>> {
    donors
        .iter()
        .map(|d| {
            spatial
                .get(receiver, d.as_ref())
                .ok_or_else(|| PairingError::MissingSpatialDistance {
                    receiver: receiver.to_string(),
                    donor: d.as_ref().to_string(),
                })
        })
        .collect()
}
