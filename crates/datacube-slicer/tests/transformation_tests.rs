//! Extraction through axis transformations: cyclic axes, grid mappers,
//! merged axes, type changes and reversed axes.

use datacube_slicer::transform::mapper::{GridMapper, OctahedralGrid};
use datacube_slicer::{
    ArrayDatacube, AxisValue, EngineConfig, NodeId, Request, Retriever, SearchMethod, Shape,
    SliceError, SliceOptions, TensorIndexTree,
};
use test_utils::fixtures::options;
use test_utils::{assert_all_approx_eq, assert_approx_eq, offset_pattern, regular_longitudes};

fn ints(values: &[i64]) -> Vec<AxisValue> {
    values.iter().map(|v| AxisValue::Int(*v)).collect()
}

fn floats(values: &[f64]) -> Vec<AxisValue> {
    values.iter().map(|v| AxisValue::Float(*v)).collect()
}

fn strs(values: &[&str]) -> Vec<AxisValue> {
    values.iter().map(|v| AxisValue::from(*v)).collect()
}

fn as_floats(values: &[AxisValue]) -> Vec<f64> {
    values.iter().filter_map(AxisValue::as_f64).collect()
}

fn first_value(tree: &TensorIndexTree, leaf: NodeId, axis: &str) -> AxisValue {
    tree.flatten(leaf)
        .first(axis)
        .cloned()
        .unwrap_or_else(|| panic!("leaf has no {axis} value"))
}

fn retriever(dims: Vec<(&str, Vec<AxisValue>)>, options_yaml: &str) -> Retriever<ArrayDatacube> {
    let shape: Vec<usize> = dims.iter().map(|(_, coords)| coords.len()).collect();
    let dims = dims
        .into_iter()
        .map(|(name, coords)| (name.to_string(), coords))
        .collect();
    let options = SliceOptions::from_yaml_str(options_yaml).unwrap();
    let datacube = ArrayDatacube::new(dims, Vec::new(), offset_pattern(&shape), &options).unwrap();
    Retriever::new(datacube, EngineConfig::default()).unwrap()
}

fn lat_lon_box(lower: [f64; 2], upper: [f64; 2]) -> Shape {
    Shape::Box {
        axes: vec!["latitude".to_string(), "longitude".to_string()],
        lower_corner: floats(&lower),
        upper_corner: floats(&upper),
        method: SearchMethod::Strict,
    }
}

// ============================================================================
// Cyclic
// ============================================================================

#[test]
fn test_box_across_longitude_seam() {
    let retriever = retriever(
        vec![
            ("latitude", floats(&[10.0, 0.0, -10.0])),
            ("longitude", floats(&regular_longitudes(30.0))),
        ],
        options::CYCLIC_LONGITUDE_YAML,
    );
    let request = Request::new(vec![lat_lon_box([-10.0, -30.0], [10.0, 30.0])]).unwrap();
    let tree = retriever.retrieve(&request).unwrap();

    let leaves = tree.leaves();
    assert_eq!(leaves.len(), 3);
    for (leaf, (lat, row)) in leaves.iter().zip([(-10.0, 2.0), (0.0, 1.0), (10.0, 0.0)]) {
        assert_eq!(first_value(&tree, *leaf, "latitude"), AxisValue::Float(lat));

        let mut lons = as_floats(tree.values(*leaf));
        lons.sort_by(f64::total_cmp);
        assert_all_approx_eq!(&lons, &[0.0, 30.0, 330.0], 1e-9);

        let mut result = tree.result(*leaf).to_vec();
        result.sort_by(f64::total_cmp);
        let base = row * 12.0;
        assert_eq!(result, vec![base, base + 1.0, base + 11.0]);
    }
}

#[test]
fn test_longitude_beyond_one_period() {
    let retriever = retriever(
        vec![
            ("latitude", floats(&[0.0])),
            ("longitude", floats(&regular_longitudes(30.0))),
        ],
        options::CYCLIC_LONGITUDE_YAML,
    );
    let request = Request::new(vec![lat_lon_box([0.0, 350.0], [0.0, 420.0])]).unwrap();
    let tree = retriever.retrieve(&request).unwrap();

    let leaves = tree.leaves();
    assert_eq!(leaves.len(), 1);
    assert_all_approx_eq!(&as_floats(tree.values(leaves[0])), &[0.0, 30.0, 60.0], 1e-9);
    assert_eq!(tree.result(leaves[0]), &[0.0, 1.0, 2.0]);
}

#[test]
fn test_box_wider_than_one_period_fetches_each_point_once() {
    let retriever = retriever(
        vec![
            ("latitude", floats(&[0.0])),
            ("longitude", floats(&regular_longitudes(30.0))),
        ],
        options::CYCLIC_LONGITUDE_YAML,
    );
    let request = Request::new(vec![lat_lon_box([0.0, -10.0], [0.0, 370.0])]).unwrap();
    let tree = retriever.retrieve(&request).unwrap();

    let leaves = tree.leaves();
    assert_eq!(leaves.len(), 1);
    let lons = as_floats(tree.values(leaves[0]));
    assert_all_approx_eq!(&lons, &regular_longitudes(30.0), 1e-9);
    let expected: Vec<f64> = (0..12).map(|i| i as f64).collect();
    assert_eq!(tree.result(leaves[0]), expected.as_slice());
}

#[test]
fn test_point_on_upper_seam_matches_lower_bound() {
    let retriever = retriever(
        vec![
            ("latitude", floats(&[0.0])),
            ("longitude", floats(&regular_longitudes(30.0))),
        ],
        options::CYCLIC_LONGITUDE_YAML,
    );
    for lon in [0.0, 360.0, -360.0] {
        let request = Request::new(vec![lat_lon_box([0.0, lon], [0.0, lon])]).unwrap();
        let tree = retriever.retrieve(&request).unwrap();

        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 1, "longitude {lon}");
        assert_eq!(tree.values(leaves[0]), floats(&[0.0]).as_slice());
        assert_eq!(tree.result(leaves[0]), &[0.0]);
    }
}

// ============================================================================
// Grid mappers
// ============================================================================

#[test]
fn test_regular_grid_box() {
    let retriever = retriever(
        vec![
            ("step", ints(&[0, 6])),
            ("values", ints(&(0..32).collect::<Vec<_>>())),
        ],
        options::REGULAR_GRID_YAML,
    );
    let request = Request::new(vec![
        lat_lon_box([0.0, 0.0], [45.0, 90.0]),
        Shape::Select {
            axis: "step".to_string(),
            values: ints(&[0]),
            method: SearchMethod::Strict,
        },
    ])
    .unwrap();
    let tree = retriever.retrieve(&request).unwrap();

    let leaves = tree.leaves();
    assert_eq!(leaves.len(), 2);
    assert_eq!(first_value(&tree, leaves[0], "latitude"), AxisValue::Float(0.0));
    assert_eq!(tree.result(leaves[0]), &[16.0, 17.0, 18.0]);
    assert_eq!(first_value(&tree, leaves[1], "latitude"), AxisValue::Float(45.0));
    assert_eq!(tree.result(leaves[1]), &[8.0, 9.0, 10.0]);

    let storage = retriever.storage_tree(&tree).unwrap();
    let json = storage.to_json();
    let step = &json["children"][0];
    assert_eq!(step["axis"], "step");
    assert_eq!(step["indexes"], serde_json::json!([16, 17, 18, 8, 9, 10]));
    assert!(step.get("children").is_none());
}

#[test]
fn test_octahedral_disk_resolves_to_flat_indexes() {
    let grid = OctahedralGrid::new(32).unwrap();
    let retriever = retriever(
        vec![(
            "values",
            ints(&(0..grid.point_count() as i64).collect::<Vec<_>>()),
        )],
        options::OCTAHEDRAL_N32_YAML,
    );
    let disk = Shape::Disk {
        axes: vec!["latitude".to_string(), "longitude".to_string()],
        centre: vec![0.0, 0.0],
        radius: vec![10.0, 20.0],
    };
    let tree = retriever.retrieve(&Request::new(vec![disk]).unwrap()).unwrap();

    let leaves = tree.leaves();
    assert!(!leaves.is_empty());
    for leaf in leaves {
        let lat = first_value(&tree, leaf, "latitude").as_f64().unwrap();
        assert!(lat.abs() <= 10.36, "latitude {lat} outside the disk");

        let lons = as_floats(tree.values(leaf));
        assert_eq!(tree.result(leaf).len(), lons.len());
        for (lon, value) in lons.iter().zip(tree.result(leaf)) {
            assert!(*lon <= 20.71 || *lon >= 339.29, "longitude {lon} outside the disk");
            assert_approx_eq!(grid.unmap(lat, *lon).unwrap() as f64, *value, 1e-9);
        }
    }
}

#[test]
fn test_octahedral_box_past_upper_seam() {
    let grid = OctahedralGrid::new(32).unwrap();
    let retriever = retriever(
        vec![(
            "values",
            ints(&(0..grid.point_count() as i64).collect::<Vec<_>>()),
        )],
        options::OCTAHEDRAL_N32_YAML,
    );
    let request = Request::new(vec![lat_lon_box([0.0, 350.0], [5.0, 370.0])]).unwrap();
    let tree = retriever.retrieve(&request).unwrap();

    let leaves = tree.leaves();
    assert!(!leaves.is_empty());
    for leaf in leaves {
        let lat = first_value(&tree, leaf, "latitude").as_f64().unwrap();
        let lons = as_floats(tree.values(leaf));
        assert!(lons.iter().any(|lon| *lon == 0.0), "no seam longitude at {lat}");
        assert!(lons.iter().all(|lon| *lon < 10.0 + 1e-9 || (350.0..360.0).contains(lon)));

        let mut result = tree.result(leaf).to_vec();
        assert_eq!(result.len(), lons.len());
        for (lon, value) in lons.iter().zip(&result) {
            assert_approx_eq!(grid.unmap(lat, *lon).unwrap() as f64, *value, 1e-9);
        }
        result.dedup();
        assert_eq!(result.len(), lons.len());
    }
}

// ============================================================================
// Merge, type change, reverse, pre-path
// ============================================================================

#[test]
fn test_merged_date_time_span() {
    let yaml = format!(
        "{}{}",
        options::MERGED_DATE_TIME_YAML,
        r#"  - axis_name: step
    transformations:
      - name: type_change
        type: int
"#
    );
    let retriever = retriever(
        vec![
            ("date", strs(&["20000101", "20000102"])),
            ("time", strs(&["0000", "1200"])),
            ("step", strs(&["0", "6", "12"])),
        ],
        &yaml,
    );
    let request = Request::new(vec![
        Shape::Span {
            axis: "date".to_string(),
            lower: AxisValue::from("2000-01-01T12:00:00"),
            upper: AxisValue::from("2000-01-02T00:00:00"),
            method: SearchMethod::Strict,
        },
        Shape::Select {
            axis: "step".to_string(),
            values: ints(&[6]),
            method: SearchMethod::Strict,
        },
    ])
    .unwrap();
    let tree = retriever.retrieve(&request).unwrap();

    let leaves = tree.leaves();
    assert_eq!(leaves.len(), 2);
    assert_eq!(first_value(&tree, leaves[0], "date").to_string(), "2000-01-01T12:00:00");
    assert_eq!(tree.values(leaves[0]), ints(&[6]).as_slice());
    assert_eq!(tree.result(leaves[0]), &[4.0]);
    assert_eq!(tree.result(leaves[1]), &[7.0]);

    let json = retriever.storage_tree(&tree).unwrap().to_json();
    let date = &json["children"][0];
    assert_eq!(date["axis"], "date");
    assert_eq!(date["values"], serde_json::json!(["20000101"]));
    let time = &date["children"][0];
    assert_eq!(time["axis"], "time");
    assert_eq!(time["values"], serde_json::json!(["1200"]));
    assert_eq!(time["children"][0]["values"], serde_json::json!(["6"]));
}

#[test]
fn test_reversed_axis_is_searched_ascending() {
    let retriever = retriever(
        vec![
            ("level", ints(&[1000, 850, 500])),
            ("x", ints(&[0, 1])),
        ],
        r#"
axis_config:
  - axis_name: level
    transformations:
      - name: reverse
        is_reverse: true
"#,
    );
    let request = Request::new(vec![
        Shape::Span {
            axis: "level".to_string(),
            lower: AxisValue::Int(500),
            upper: AxisValue::Int(900),
            method: SearchMethod::Strict,
        },
        Shape::Select {
            axis: "x".to_string(),
            values: ints(&[1]),
            method: SearchMethod::Strict,
        },
    ])
    .unwrap();
    let tree = retriever.retrieve(&request).unwrap();

    let leaves = tree.leaves();
    assert_eq!(leaves.len(), 2);
    assert_eq!(first_value(&tree, leaves[0], "level"), AxisValue::Int(500));
    assert_eq!(tree.result(leaves[0]), &[5.0]);
    assert_eq!(first_value(&tree, leaves[1], "level"), AxisValue::Int(850));
    assert_eq!(tree.result(leaves[1]), &[3.0]);
}

#[test]
fn test_pre_path_restricts_values() {
    let retriever = retriever(
        vec![("class", strs(&["od", "rd"])), ("x", ints(&[0, 1, 2]))],
        "pre_path:\n  class: od\n",
    );
    let select = |class: &str| {
        Request::new(vec![
            Shape::Select {
                axis: "class".to_string(),
                values: strs(&[class]),
                method: SearchMethod::Strict,
            },
            Shape::All {
                axis: "x".to_string(),
            },
        ])
        .unwrap()
    };

    let tree = retriever.retrieve(&select("od")).unwrap();
    let leaves = tree.leaves();
    assert_eq!(leaves.len(), 1);
    assert_eq!(tree.result(leaves[0]), &[0.0, 1.0, 2.0]);

    let err = retriever.retrieve(&select("rd")).unwrap_err();
    assert!(matches!(err, SliceError::IndexNotFound { ref axis, .. } if axis == "class"));
}
