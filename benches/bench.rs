// Criterion benchmarks for Donor Pair

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use donor_pair::config::{DistanceMethod, GeneralPars, MethodPars, PairingConfig};
use donor_pair::core::{haversine_distance, AttributeDistance, GowerDistance, Pca, UnsupervisedForest};
use donor_pair::models::{AttributeRow, AttributeTable, DistanceMatrix, Unit, UnitCatalog, UnitTag};
use donor_pair::DonorMatcher;
use std::collections::BTreeMap;

const ATTRIBUTES: [&str; 4] = ["elev", "slope", "aridity", "forest"];

/// Deterministic pseudo-attribute for unit `i`, column `j`
fn attribute(i: usize, j: usize) -> f64 {
    ((i * 37 + j * 101) % 97) as f64 / 9.7 + j as f64
}

fn create_row(id: String, i: usize) -> AttributeRow {
    AttributeRow {
        id,
        category: (i % 2).to_string(),
        values: (0..ATTRIBUTES.len()).map(|j| attribute(i, j)).collect(),
    }
}

fn create_table(donors: usize, receivers: usize) -> AttributeTable {
    AttributeTable {
        attributes: ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
        donors: (0..donors).map(|i| create_row(format!("d{}", i), i)).collect(),
        receivers: (0..receivers)
            .map(|i| create_row(format!("r{}", i), donors + i))
            .collect(),
    }
}

fn create_units(donors: usize, receivers: usize) -> (UnitCatalog, DistanceMatrix) {
    let located = |i: usize| (39.0 + (i % 23) as f64 * 0.05, -106.0 + (i % 29) as f64 * 0.05);

    let unit = |id: String, tag: UnitTag, i: usize| Unit {
        id,
        tag,
        category: (i % 2).to_string(),
        values: ATTRIBUTES
            .iter()
            .enumerate()
            .map(|(j, a)| {
                // Every seventh receiver lacks its last attribute
                let missing = tag == UnitTag::Receiver && i % 7 == 0 && j == ATTRIBUTES.len() - 1;
                (a.to_string(), if missing { None } else { Some(attribute(i, j)) })
            })
            .collect::<BTreeMap<_, _>>(),
    };

    let mut units: Vec<Unit> = (0..donors).map(|i| unit(format!("d{}", i), UnitTag::Donor, i)).collect();
    units.extend((0..receivers).map(|i| unit(format!("r{}", i), UnitTag::Receiver, donors + i)));

    let mut values = Vec::with_capacity(donors * receivers);
    for r in 0..receivers {
        let (rlat, rlon) = located(donors + r);
        for d in 0..donors {
            let (dlat, dlon) = located(d);
            values.push(haversine_distance(rlat, rlon, dlat, dlon));
        }
    }
    let spatial = DistanceMatrix::new(
        (0..receivers).map(|i| format!("r{}", i)).collect(),
        (0..donors).map(|i| format!("d{}", i)).collect(),
        values,
    )
    .unwrap();

    (UnitCatalog::new(units).unwrap(), spatial)
}

fn create_config() -> PairingConfig {
    PairingConfig {
        scenario: "hlr".to_string(),
        method: DistanceMethod::Gower,
        main_attrs: ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
        base_attrs: vec!["elev".to_string(), "slope".to_string()],
        general: GeneralPars {
            max_spa_dist: 200.0,
            regulation_col: None,
            area_col: None,
            max_area_ratio: None,
            exclude_donors: Vec::new(),
        },
        search: MethodPars {
            min_spa_dist: 10.0,
            zero_spa_dist: 0.5,
            max_attr_dist: 0.4,
            min_attr_dist: 0.05,
            n_donor_max: 5,
            spa_dist_step: 10.0,
            n_trees: 50,
            max_depth: 8,
            n_jobs: 0,
            seed: 1,
        },
    }
}

fn bench_gower_matrix(c: &mut Criterion) {
    let gower = GowerDistance::new(Pca::default());
    let mut group = c.benchmark_group("gower_matrix");

    for donor_count in [50, 200, 1000].iter() {
        let table = create_table(*donor_count, 200);
        group.bench_with_input(BenchmarkId::new("donors", donor_count), donor_count, |b, _| {
            b.iter(|| gower.compute(black_box(&table)));
        });
    }

    group.finish();
}

fn bench_forest_distance(c: &mut Criterion) {
    let table = create_table(150, 50);
    let rows = table.value_rows();
    let forest = UnsupervisedForest::new(50, 8).with_seed(1).with_jobs(0);

    c.bench_function("forest_distance_200_rows", |b| {
        b.iter(|| forest.distance(black_box(&rows)));
    });
}

fn bench_pairing_run(c: &mut Criterion) {
    let matcher = DonorMatcher::new(create_config());
    let mut group = c.benchmark_group("pairing_run");
    group.sample_size(20);

    for receiver_count in [50, 250].iter() {
        let (units, spatial) = create_units(300, *receiver_count);
        group.bench_with_input(
            BenchmarkId::new("receivers", receiver_count),
            receiver_count,
            |b, _| {
                b.iter(|| matcher.run(black_box(&units), black_box(&spatial)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_gower_matrix, bench_forest_distance, bench_pairing_run);

criterion_main!(benches);
