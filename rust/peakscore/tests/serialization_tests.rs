mod common;

use std::sync::Arc;

use common::{
    SyntheticOptions,
    calculators,
    synthetic_run,
    trained_model,
};
use peakscore::data_sources::{
    read_chromatograms,
    read_document,
    read_feature_table,
    save_feature_table,
    write_chromatograms,
    write_document,
};
use peakscore::errors::{
    ModelFormatError,
    PeakScoringError,
    RegistryError,
};
use peakscore::ml::TrainingOptions;
use peakscore::models::ChromatogramProvider;
use peakscore::registry::{
    AddOutcome,
    ConflictPolicy,
    PeakScoringModelList,
};
use peakscore::reintegration::{
    ReintegrationOptions,
    extract_features,
    reintegrate,
};
use peakscore::scoring::{
    PeakScoringModel,
    ScoringModelKind,
};

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("peakscore_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_trained_model_round_trips() {
    let run = synthetic_run(&SyntheticOptions::default());
    let model = trained_model(&run, "round trip");
    let json = model.to_json().unwrap();
    let back = PeakScoringModel::from_json(&json).unwrap();
    assert_eq!(back, model);
    assert_eq!(back.parameters(), model.parameters());
}

#[test]
fn test_model_without_calculators_is_rejected() {
    let json = r#"{"name": "empty", "kind": "mprophet", "calculators": []}"#;
    match PeakScoringModel::from_json(json) {
        Err(ModelFormatError::NoCalculators { model }) => assert_eq!(model, "empty"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_unknown_calculator_is_rejected() {
    let json = r#"{
        "name": "future",
        "calculators": [
            {"type": "intensity", "weight": 1.0},
            {"type": "ion_mobility_error", "weight": 2.0}
        ]
    }"#;
    let err = PeakScoringModel::from_json(json).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Peak scoring model future references unknown calculator ion_mobility_error"
    );
}

#[test]
fn test_older_record_loads_with_defaults_and_retrains() {
    // Written before the decoy and second best flags were stored.
    let json = r#"{
        "name": "older",
        "bias": -2.0,
        "decoy_mean": 0.0,
        "decoy_stdev": 1.0,
        "calculators": [
            {"type": "main_var_intensity", "weight": 1.5},
            {"type": "weighted_shape", "weight": null},
            {"type": "var_weighted_coelution", "weight": -0.25}
        ]
    }"#;
    let loaded = PeakScoringModel::from_json(json).unwrap();
    assert_eq!(loaded.kind(), ScoringModelKind::MProphet);
    assert!(loaded.uses_decoys());
    assert!(!loaded.uses_second_best());
    assert_eq!(loaded.calculators(), common::calculators().as_slice());
    assert_eq!(loaded.enabled_calculators(), vec![true, false, true]);

    let run = synthetic_run(&SyntheticOptions::default());
    let features = extract_features(&run.document, &run.chromatograms, loaded.calculators()).unwrap();
    let enabled = vec![true; 3];
    let options = TrainingOptions::default();
    let (retrained, _) = loaded
        .train(&features.targets, &features.decoys, &enabled, &options)
        .unwrap();
    let fresh = PeakScoringModel::with_calculator_list("older", ScoringModelKind::MProphet, common::calculators());
    let (expected, _) = fresh
        .train(&features.targets, &features.decoys, &enabled, &options)
        .unwrap();
    assert_eq!(retrained, expected);
}

#[test]
fn test_registry_conflicts_and_persistence() {
    let run = synthetic_run(&SyntheticOptions {
        num_targets: 30,
        num_decoys: 30,
        ..Default::default()
    });
    let model = trained_model(&run, "shared");
    let mut list = PeakScoringModelList::new();
    assert_eq!(list.add(model.clone(), ConflictPolicy::Reject), Ok(AddOutcome::Added));
    assert_eq!(
        list.add(model.clone(), ConflictPolicy::Reject),
        Err(RegistryError::NameConflict {
            kind: "peak scoring model",
            name: "shared".to_string()
        })
    );
    let err = PeakScoringError::from(list.add(model.clone(), ConflictPolicy::Reject).unwrap_err());
    assert_eq!(err.to_string(), "The peak scoring model shared already exists");

    // Averaging a model with itself leaves it unchanged.
    assert_eq!(list.add(model.clone(), ConflictPolicy::Average), Ok(AddOutcome::Averaged));
    assert_eq!(list.get("shared"), Some(&model));

    let untrained = PeakScoringModel::new("shared", ScoringModelKind::Legacy);
    assert!(matches!(
        list.add(untrained, ConflictPolicy::Average),
        Err(RegistryError::IncompatibleMerge { .. })
    ));

    let dir = temp_dir("registry");
    let path = dir.join("models.json");
    list.add(PeakScoringModel::new("fresh", ScoringModelKind::Legacy), ConflictPolicy::Reject)
        .unwrap();
    list.save(&path).unwrap();
    let loaded = PeakScoringModelList::load(&path).unwrap();
    assert_eq!(loaded, list);
    assert_eq!(loaded.names(), vec!["shared", "fresh"]);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_registry_load_reports_model_format_errors() {
    let dir = temp_dir("registry_errors");
    let path = dir.join("models.json");
    std::fs::write(
        &path,
        r#"[{
            "name": "future",
            "calculators": [{"type": "ion_mobility_error", "weight": 1.0}]
        }]"#,
    )
    .unwrap();
    match PeakScoringModelList::load(&path).unwrap_err() {
        PeakScoringError::ModelFormatError(ModelFormatError::UnknownCalculator { model, name }) => {
            assert_eq!(model, "future");
            assert_eq!(name, "ion_mobility_error");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    std::fs::write(&path, r#"[{"name": "empty", "calculators": []}]"#).unwrap();
    assert!(matches!(
        PeakScoringModelList::load(&path).unwrap_err(),
        PeakScoringError::ModelFormatError(ModelFormatError::NoCalculators { .. })
    ));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_registry_load_rejects_repeated_names() {
    let dir = temp_dir("registry_repeated");
    let path = dir.join("models.json");
    let mut list = PeakScoringModelList::new();
    list.add(PeakScoringModel::new("a", ScoringModelKind::Legacy), ConflictPolicy::Reject)
        .unwrap();
    list.add(PeakScoringModel::new("b", ScoringModelKind::MProphet), ConflictPolicy::Reject)
        .unwrap();
    let mut records = list.to_records();
    records[1].name = "a".to_string();
    std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

    let err = PeakScoringModelList::load(&path).unwrap_err();
    assert!(matches!(
        err,
        PeakScoringError::RegistryError(RegistryError::NameConflict { .. })
    ));
    assert_eq!(err.to_string(), "The peak scoring model a already exists");
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_document_and_chromatograms_round_trip() {
    let run = synthetic_run(&SyntheticOptions {
        num_targets: 6,
        num_decoys: 6,
        with_standard: true,
        ..Default::default()
    });
    let model = trained_model(&run, "files");
    let reintegrated = reintegrate(
        &run.document,
        &run.chromatograms,
        Arc::new(model),
        0.5,
        ReintegrationOptions::default(),
    )
    .unwrap();

    let dir = temp_dir("files");
    let doc_path = dir.join("document.json");
    write_document(&doc_path, &reintegrated).unwrap();
    let doc = read_document(&doc_path).unwrap();
    assert_eq!(&doc, reintegrated.as_ref());

    for name in ["chromatograms.json", "chromatograms.ndjson"] {
        let path = dir.join(name);
        write_chromatograms(&path, &run.chromatograms).unwrap();
        let chroms = read_chromatograms(&path).unwrap();
        assert_eq!(chroms.len(), run.chromatograms.len());
        let (_, group) = doc.iter_groups().next().unwrap();
        assert_eq!(
            chroms.group_chromatograms(group.id, 1),
            run.chromatograms.group_chromatograms(group.id, 1)
        );
    }

    let missing = read_document(&dir.join("missing.json")).unwrap_err();
    assert!(matches!(missing, PeakScoringError::Io { path: Some(_), .. }));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_exported_feature_table_trains_the_same_model() {
    let run = synthetic_run(&SyntheticOptions::default());
    let features = extract_features(&run.document, &run.chromatograms, &calculators()).unwrap();
    let path = temp_dir("export").join("features.tsv");
    save_feature_table(&path, &calculators(), &[&features.targets, &features.decoys]).unwrap();

    let table = read_feature_table(&path).unwrap();
    assert_eq!(table.calculators().unwrap(), calculators());
    assert_eq!(table.targets.len(), features.targets.len());
    assert_eq!(table.decoys.len(), features.decoys.len());
    assert_eq!(table.runs.len(), 2);

    let model = PeakScoringModel::with_calculator_list("exported", ScoringModelKind::MProphet, calculators());
    let enabled = [true, true, true];
    let options = TrainingOptions::default();
    let (from_table, _) = model.train(&table.targets, &table.decoys, &enabled, &options).unwrap();
    let (direct, _) = model.train(&features.targets, &features.decoys, &enabled, &options).unwrap();
    for (a, b) in from_table
        .calculator_weights()
        .iter()
        .zip(direct.calculator_weights().iter())
    {
        assert!((a.weight - b.weight).abs() < 1e-9, "{:?} vs {:?}", a, b);
    }
}
