use approx::assert_abs_diff_eq;
use blockfill::{
    dataset::{BUILD_FLOOR_AREA_COLUMN, FOOTPRINT_AREA_COLUMN},
    read_csv, read_csv_string, spatial::{IndexAlgorithm, NeighborIndex, NeighborSearch},
    strategy::idw_weights,
    write_csv, Block, BlockDataset, FactorizationStrategy, IdwStrategy, ImputeError, Imputer,
    ImputerConfig, KnnStrategy, SpacematrixStrategy, Strategy,
};

fn features() -> Vec<String> {
    vec![FOOTPRINT_AREA_COLUMN.to_string(), BUILD_FLOOR_AREA_COLUMN.to_string()]
}

/// A 6×5 grid of blocks: the west half is sparse with large sites, the east half dense
/// with small sites. Blocks 8 and 23 are unobserved.
fn city() -> BlockDataset {
    let blocks = (0..30)
        .map(|i| {
            let (col, row) = (i % 6, i / 6);
            let dense = col >= 3;
            let site = if dense { 300.0 + 7.0 * i as f64 } else { 1500.0 + 11.0 * i as f64 };
            let (gsi, fsi) = if dense { (0.55, 2.8) } else { (0.18, 0.4) };
            let jitter = 1.0 + 0.01 * ((i * 7) % 5) as f64;
            let block = Block::new(i + 1, 100.0 * col as f64, 100.0 * row as f64, site);
            if i + 1 == 8 || i + 1 == 23 {
                block
            } else {
                block
                    .with_footprint_area(site * gsi * jitter)
                    .with_build_floor_area(site * fsi * jitter)
            }
        })
        .collect::<Vec<_>>();
    BlockDataset::from_blocks(&blocks).unwrap()
}

#[test]
fn mean_strategy_scenario() {
    let known = [100.0, 120.0, 90.0, 110.0, 95.0, 105.0, 115.0, 85.0];
    let blocks = (1..=10)
        .map(|id| {
            let block = Block::new(id, id as f64, 0.0, 1000.0);
            match known.get(id as usize - 1) {
                Some(&area) => block.with_footprint_area(area),
                None => block,
            }
        })
        .collect::<Vec<_>>();
    let dataset = BlockDataset::from_blocks(&blocks).unwrap();

    let imputer = Imputer::new(&dataset, vec![FOOTPRINT_AREA_COLUMN.into()], Strategy::Mean).unwrap();
    let result = imputer.impute(&[9, 10]).unwrap();

    assert_eq!(result.ids(), &[9, 10]);
    for id in [9, 10] {
        assert_abs_diff_eq!(result.get(id, FOOTPRINT_AREA_COLUMN).unwrap().unwrap(), 102.5);
    }
}

#[test]
fn idw_discounts_the_far_neighbor() {
    // Two known blocks right next to the unknown one, three far away.
    let blocks = vec![
        Block::new(1, 1.0, 0.0, 100.0).with_footprint_area(10.0),
        Block::new(2, 0.0, 1.5, 100.0).with_footprint_area(12.0),
        Block::new(3, 40.0, 40.0, 100.0).with_footprint_area(500.0),
        Block::new(4, 60.0, 60.0, 100.0).with_footprint_area(600.0),
        Block::new(5, -70.0, 55.0, 100.0).with_footprint_area(700.0),
        Block::new(6, 0.0, 0.0, 100.0),
    ];
    let dataset = BlockDataset::from_blocks(&blocks).unwrap();

    let table = dataset.table(&["centroid_x".into(), "centroid_y".into()]).unwrap();
    let (known, unknown) = table.split(&[6]);
    let index = NeighborIndex::build(known.values().view(), 3, IndexAlgorithm::RTree).unwrap();
    let query = index.query(unknown.values().view()).unwrap().remove(0);
    assert_eq!(query.indices, vec![0, 1, 2]);

    let weights = idw_weights(&query.distances);
    assert!(weights[2] < weights[0] && weights[2] < weights[1]);

    let imputer = Imputer::new(&dataset, vec![FOOTPRINT_AREA_COLUMN.into()], IdwStrategy::new(3)).unwrap();
    let value = imputer.impute(&[6]).unwrap().get(6, FOOTPRINT_AREA_COLUMN).unwrap().unwrap();
    assert!(value > 10.0 && value < 13.0);
}

#[test]
fn neighbor_estimates_stay_within_neighbor_range() {
    let dataset = city();
    for strategy in [Strategy::from(KnnStrategy::new(4)), Strategy::from(IdwStrategy::new(4))] {
        let imputer = Imputer::new(&dataset, features(), strategy).unwrap();
        let result = imputer.impute(&[8, 23]).unwrap();

        let table = dataset.table(&["centroid_x".into(), "centroid_y".into(), FOOTPRINT_AREA_COLUMN.into()]).unwrap();
        let (known, unknown) = table.split(&[8, 23]);
        let neighbors = NeighborSearch::new(4).neighbors(&known, &unknown).unwrap();

        for (row, query) in neighbors.iter().enumerate() {
            let values = query.indices.iter()
                .map(|&i| known.values()[[i, 2]])
                .collect::<Vec<_>>();
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let imputed = result.values()[[row, 0]];
            assert!(imputed >= min - 1e-9 && imputed <= max + 1e-9);
        }
    }
}

#[test]
fn rtree_and_brute_force_agree() {
    let dataset = city();
    let rtree = Imputer::new(&dataset, features(), KnnStrategy::new(5)).unwrap().impute(&[8, 23]).unwrap();
    let brute = Imputer::new(&dataset, features(), KnnStrategy::new(5).with_algorithm(IndexAlgorithm::BruteForce))
        .unwrap()
        .impute(&[8, 23])
        .unwrap();
    assert_eq!(rtree, brute);
}

#[test]
fn disjoint_ids_leave_dataset_unchanged() {
    let dataset = city();
    let before = dataset.dataframe().clone();

    let imputer = Imputer::new(&dataset, features(), KnnStrategy::default()).unwrap();
    let result = imputer.impute(&[1000, 1001]).unwrap();

    assert!(result.is_empty());
    assert!(dataset.dataframe().equals_missing(&before));
}

#[test]
fn imputing_every_block_has_nothing_to_fit() {
    let dataset = city();
    let imputer = Imputer::new(&dataset, features(), Strategy::Mean).unwrap();
    let result = imputer.impute(dataset.ids());
    assert!(matches!(result, Err(ImputeError::EmptyTrainingSet)));
}

#[test]
fn spacematrix_is_deterministic_and_nonnegative() {
    let dataset = city();
    let strategy = SpacematrixStrategy::new(vec![]).with_clusters(4).with_coordinates();
    let imputer = Imputer::new(&dataset, features(), strategy).unwrap();

    let a = imputer.impute(&[8, 23]).unwrap();
    let b = imputer.impute(&[8, 23]).unwrap();
    assert_eq!(a, b);
    assert!(a.values().iter().all(|&v| v.is_finite() && v >= 0.0));
}

#[test]
fn spacematrix_without_site_area_is_a_ratio_error() {
    let dataset = read_csv_string("id,centroid_x,centroid_y,footprint_area,build_floor_area\n1,0,0,10,20\n2,1,1,,\n").unwrap();
    let result = Imputer::new(&dataset, features(), SpacematrixStrategy::default());
    assert!(matches!(result, Err(ImputeError::RatioComputation(_))));
}

#[test]
fn factorization_is_deterministic() {
    let dataset = city();
    let strategy = FactorizationStrategy::new(vec![]).with_rank(3);
    let imputer = Imputer::new(&dataset, features(), strategy).unwrap();

    let a = imputer.impute(&[8, 23]).unwrap();
    let b = imputer.impute(&[8, 23]).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.values().dim(), (2, 2));
    assert!(a.values().iter().all(|&v| v.is_finite() && v >= 0.0));
}

#[test]
fn csv_config_pipeline() {
    let csv = "\
id,centroid_x,centroid_y,site_area,footprint_area,build_floor_area
1,0,0,100,20,40
2,10,0,100,30,60
3,0,10,100,40,80
4,10,10,100,50,100
5,5,5,100,,
";
    let dataset = read_csv_string(csv).unwrap();
    let config = ImputerConfig::from_json_str(r#"{"strategy": "knn", "k": 4}"#).unwrap();
    let imputer = config.imputer(&dataset).unwrap();

    let missing = dataset.ids_missing_any(&config.features).unwrap();
    assert_eq!(missing, vec![5]);

    let result = imputer.impute(&missing).unwrap();
    assert_abs_diff_eq!(result.get(5, FOOTPRINT_AREA_COLUMN).unwrap().unwrap(), 35.0);
    assert_abs_diff_eq!(result.get(5, BUILD_FLOOR_AREA_COLUMN).unwrap().unwrap(), 70.0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("imputed.csv");
    write_csv(&result, &path).unwrap();

    let written = read_csv(&path).unwrap();
    assert_eq!(written.ids(), &[5]);
    assert_eq!(written.column_names(), vec!["id", "footprint_area", "build_floor_area"]);
}

#[test]
fn too_many_neighbors_is_reported() {
    let csv = "id,centroid_x,centroid_y,footprint_area,build_floor_area\n1,0,0,1,2\n2,1,0,3,4\n3,2,0,,\n";
    let dataset = read_csv_string(csv).unwrap();
    let imputer = Imputer::new(&dataset, features(), KnnStrategy::new(5)).unwrap();
    assert!(matches!(
        imputer.impute(&[3]),
        Err(ImputeError::InsufficientNeighbors { k: 5, available: 2 })
    ));
}
