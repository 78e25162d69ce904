use chrono::NaiveDateTime;
use hydronet_build::feature::{
    BoundaryFeature, ChannelFeature, CrossSectionFeature, CulvertFeature, FeatureSet,
    ParameterizedProfileFeature, Point, Point3, PumpControlFeature, PumpFeature, WeirFeature,
};
use hydronet_build::io::timefmt;
use hydronet_build::{BuildConfig, FormatVersion, ModelBuilder, Serializer};

fn reference_time() -> NaiveDateTime {
    timefmt::parse_datetime("2023-01-01 00:00:00").unwrap()
}

// A small but complete dataset: two chained channels, one surveyed
// profile, a weir, a culvert, a pump, a constant and a time-series
// boundary at the free ends, and a catchment.
fn sample_features() -> FeatureSet {
    let mut features = FeatureSet::default();
    features.channels = vec![
        ChannelFeature {
            code: "ch-1".to_string(),
            geometry: vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
            friction_type: "manning".to_string(),
            friction_value: 0.03,
            order: 1,
        },
        ChannelFeature {
            code: "ch-2".to_string(),
            geometry: vec![Point::new(100.0, 0.0), Point::new(200.0, 50.0)],
            friction_type: "manning".to_string(),
            friction_value: 0.03,
            order: 1,
        },
    ];
    features.cross_sections = vec![CrossSectionFeature {
        code: "prof-1".to_string(),
        geometry: vec![
            Point3::new(50.0, -8.0, 1.5),
            Point3::new(50.0, 0.0, -0.5),
            Point3::new(50.0, 8.0, 1.5),
        ],
        friction_type: "manning".to_string(),
        friction_value: 0.03,
    }];
    features.parameterized_profiles = vec![ParameterizedProfileFeature {
        branch_code: "ch-2".to_string(),
        bottom_width: Some(4.0),
        bed_level_upstream: Some(-0.5),
        bed_level_downstream: Some(-0.7),
        embankment_left: Some(1.0),
        embankment_right: Some(1.2),
        slope_left: Some(2.0),
        slope_right: Some(2.0),
    }];
    features.weirs = vec![WeirFeature {
        code: "weir-1".to_string(),
        location: Point::new(150.0, 25.0),
        crest_level: 0.8,
        crest_width: 3.0,
        discharge_coeff: 1.0,
        cross_section: None,
    }];
    features.culverts = vec![CulvertFeature {
        code: "culv-1".to_string(),
        geometry: vec![Point::new(40.0, 5.0), Point::new(60.0, 5.0)],
        shape: "rond".to_string(),
        opening_height: 0.8,
        opening_width: 0.8,
        left_level: -0.3,
        right_level: -0.4,
        inlet_loss: 0.6,
        outlet_loss: 0.8,
        friction_type: "StricklerKs".to_string(),
        friction_value: 75.0,
    }];
    features.pumps = vec![PumpFeature {
        code: "pmp-1".to_string(),
        location: Point::new(80.0, 0.0),
        capacity: 90.0,
        direction: 1,
        control: PumpControlFeature::Absolute {
            start_level: 1.25,
            stop_level: 0.75,
        },
    }];
    features.boundaries = vec![
        BoundaryFeature {
            code: "bnd-west".to_string(),
            location: Point::new(0.0, 0.0),
            quantity: "waterstand".to_string(),
            value: Some(0.6),
            series: None,
        },
        BoundaryFeature {
            code: "bnd-east".to_string(),
            location: Point::new(200.0, 50.0),
            quantity: "afvoer".to_string(),
            value: None,
            series: Some(vec![
                (timefmt::parse_datetime("2023-01-01 00:00:00").unwrap(), 1.0),
                (timefmt::parse_datetime("2023-01-02 23:45:00").unwrap(), 2.5),
            ]),
        },
    ];
    features.catchments = vec![hydronet_build::feature::CatchmentFeature {
        code: "cat-1".to_string(),
        centroid: Point::new(50.0, 200.0),
        area_m2: 125000.0,
        runoff_coefficient: 0.45,
        node_code: None,
    }];
    features
}

#[test]
fn test_full_pipeline_writes_consistent_artifacts() {
    let mut config = BuildConfig::new(reference_time());
    config.mesh_cell_size = Some(50.0);
    config.initial_water_level = Some(0.8);
    let features = sample_features();

    let (model, summary) = ModelBuilder::new(config).build(&features);
    assert!(
        summary.rejected.is_empty(),
        "unexpected rejections: {:?}",
        summary.rejected
    );

    assert_eq!(model.network.nodes.len(), 3);
    assert_eq!(model.network.branches.len(), 2);
    // weir, culvert, pump
    assert_eq!(model.structures.len(), 3);
    assert_eq!(model.forcings.boundaries.len(), 2);
    assert_eq!(model.rr.catchments.len(), 1);
    assert!(model.mesh.as_ref().is_some_and(|m| !m.is_empty()));

    let dir = std::env::temp_dir().join("hydronet_pipeline_test");
    let _ = std::fs::remove_dir_all(&dir);
    let serializer = Serializer::new(FormatVersion::V2021_03, reference_time());
    let written = serializer.write_all(&dir, &model).unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    for expected in [
        "model.mdu",
        "crsdef.ini",
        "crsloc.ini",
        "structures.ini",
        "forcing.bc",
        "network_net.nc",
        "rr_catchments.ini",
        "rr_links.ini",
    ] {
        assert!(names.contains(&expected.to_string()), "missing {expected}");
    }

    // The control file references the initial condition; the forcing file
    // does not carry it.
    let mdu = std::fs::read_to_string(dir.join("model.mdu")).unwrap();
    assert!(mdu.contains("waterLevIni"));
    assert!(mdu.contains("0.800"));

    let bc = std::fs::read_to_string(dir.join("forcing.bc")).unwrap();
    assert!(!bc.contains("waterLevIni"));
    assert!(bc.contains("waterlevelbnd"));
    assert!(bc.contains("dischargebnd"));
    // Full zero-padded reference stamp, hour and minute intact.
    assert!(bc.contains("minutes since 2023-01-01 00:00:00"));
    // 2023-01-02 23:45 is 2865 minutes past the reference.
    assert!(bc.contains("2865.00"));

    // Pump capacity converted from m3/min to m3/s.
    let structures = std::fs::read_to_string(dir.join("structures.ini")).unwrap();
    assert!(structures.contains("1.500"));
    assert!(structures.contains("startLevelSuctionSide"));

    // Every node coordinate survives into the geometry file, including the
    // shared junction node.
    let nc = netcdf::open(dir.join("network_net.nc")).unwrap();
    let xs = nc
        .variable("network_node_x")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    assert_eq!(xs.len(), 3);
    assert!(xs.iter().any(|&x| (x - 100.0).abs() < 1e-9));
    assert!(nc.variable("mesh2d_face_nodes").is_some());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_culvert_length_uses_chainage_delta() {
    let config = BuildConfig::new(reference_time());
    let features = sample_features();
    let (model, _) = ModelBuilder::new(config).build(&features);

    let culvert = model.structures.get("culv-1").unwrap();
    match &culvert.kind {
        hydronet_build::structures::StructureKind::Culvert { length, .. } => {
            // The digitized line sits 5 m off the channel; the projected
            // chainage delta is exactly 20 m.
            assert!((length - 20.0).abs() < 1e-9);
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn test_old_format_still_serializes_without_orifices() {
    let config = BuildConfig::new(reference_time());
    let features = sample_features();
    let (model, _) = ModelBuilder::new(config).build(&features);

    let dir = std::env::temp_dir().join("hydronet_pipeline_old_format_test");
    let _ = std::fs::remove_dir_all(&dir);
    let serializer = Serializer::new(FormatVersion::V2020_02, reference_time());
    serializer.write_all(&dir, &model).unwrap();
    let structures = std::fs::read_to_string(dir.join("structures.ini")).unwrap();
    assert!(structures.contains("fileVersion"));
    assert!(structures.contains("2.00"));
    std::fs::remove_dir_all(&dir).unwrap();
}
