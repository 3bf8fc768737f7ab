use std::sync::Mutex;

use rusty_prep::methods::{self, AlsBaseline, CutRange, RunningMedian};
use rusty_prep::pipeline::FnProcessor;
use rusty_prep::{
    run, run_default, Configuration, Dataset, Domain, FieldKeys, FieldValue, FieldWhitelist,
    FoldEngine, FoldRecord, FormatTag, ParamSet, PrepError,
};

fn identity() -> impl rusty_prep::SampleProcessor {
    FnProcessor::new("identity", ParamSet::new(), |args| {
        Ok(FieldValue::Series(args.y.to_vec()))
    })
}

fn ftir_dataset() -> Dataset {
    let mut dataset = Dataset::new();
    dataset.insert(
        "fold0",
        FoldRecord::new()
            .with("spectra", vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
            .with("axis_wavenumber", vec![400.0, 402.0, 404.0]),
    );
    dataset.insert(
        "fold1",
        FoldRecord::new()
            .with("spectra", vec![7.0, 8.0, 9.0])
            .with("axis_wavenumber", vec![400.0, 402.0, 404.0]),
    );
    dataset
}

#[test]
fn identity_round_trip_reproduces_the_dataset() {
    let input = ftir_dataset();
    for config in [Domain::Ftir.single(), Domain::Ftir.multi(), Domain::Ftir.paired()] {
        let output = run(&identity(), &config, &input, &ParamSet::new()).unwrap();
        assert_eq!(output, input, "round trip with {config}");
    }
}

#[test]
fn multi_field_preserves_label_then_row_order() {
    let seen = Mutex::new(Vec::new());
    let recorder = FnProcessor::new("record", ParamSet::new(), |args| {
        seen.lock().unwrap().push(args.y[0]);
        Ok(FieldValue::Series(args.y.iter().map(|v| v * 10.0).collect()))
    });

    let config = Configuration::builder(FieldWhitelist::new(&["A", "B"], &[]))
        .unpack(FormatTag::MultiField, FieldKeys::many(vec!["A", "B"]))
        .pack(FormatTag::MultiField, FieldKeys::many(vec!["A", "B"]))
        .build()
        .unwrap();
    let mut input = Dataset::new();
    input.insert(
        "f",
        FoldRecord::new()
            .with("A", vec![vec![1.0], vec![2.0], vec![3.0]])
            .with("B", vec![vec![4.0], vec![5.0]])
            .with("note", FieldValue::Text("kept".into())),
    );

    let output = run(&recorder, &config, &input, &ParamSet::new()).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);

    let fold = output.get("f").unwrap();
    assert_eq!(fold.get("A"), Some(&FieldValue::Matrix(vec![vec![10.0], vec![20.0], vec![30.0]])));
    assert_eq!(fold.get("B"), Some(&FieldValue::Matrix(vec![vec![40.0], vec![50.0]])));
    assert_eq!(fold.get("note"), Some(&FieldValue::Text("kept".into())));
}

#[test]
fn paired_field_broadcasts_a_shared_axis() {
    let pairs = Mutex::new(Vec::new());
    let recorder = FnProcessor::new("pairs", ParamSet::new(), |args| {
        let x = args.x.map(<[f64]>::to_vec);
        pairs.lock().unwrap().push((args.y.to_vec(), x));
        Ok(FieldValue::Series(args.y.to_vec()))
    });

    let mut input = Dataset::new();
    input.insert(
        "f",
        FoldRecord::new()
            .with("spectra", vec![vec![1.0, 2.0], vec![3.0, 4.0]])
            .with("axis_wavenumber", vec![10.0, 20.0]),
    );
    run(&recorder, &Domain::Ftir.paired(), &input, &ParamSet::new()).unwrap();

    let pairs = pairs.into_inner().unwrap();
    assert_eq!(pairs.len(), 2);
    for (i, (y, x)) in pairs.iter().enumerate() {
        assert_eq!(y[0], 1.0 + 2.0 * i as f64);
        assert_eq!(x.as_deref(), Some(&[10.0, 20.0][..]));
    }
}

#[test]
fn default_configuration_uses_the_data_field() {
    let mut input = Dataset::new();
    input.insert("f", FoldRecord::new().with("data", vec![5.0, 1.0, 4.0, 2.0, 8.0]));

    let output = run(&RunningMedian, &Configuration::default(), &input, &ParamSet::new()).unwrap();
    assert_eq!(
        output.get("f").unwrap().get("data"),
        Some(&FieldValue::Series(vec![5.0, 5.0, 4.0, 2.0, 4.0]))
    );
}

#[test]
fn als_removal_leaves_a_non_negative_mean_on_a_plateau() {
    let y: Vec<f64> = (0..120)
        .map(|i| 2.0 + 0.3 * ((i as f64) * 0.7).sin() + 0.2 * ((i as f64) * 2.3).cos())
        .collect();
    let mut input = Dataset::new();
    input.insert(
        "f",
        FoldRecord::new()
            .with("spectra", y.clone())
            .with("axis_wavenumber", (0..120).map(|i| i as f64).collect::<Vec<_>>()),
    );

    let overrides = ParamSet::new().with("p", 0.001).with("lam", 100000_i64);
    let output = run_default(&AlsBaseline, &input, &overrides).unwrap();
    let removal = output.get("f").unwrap().get("spectra").unwrap().as_series().unwrap();
    let mean = removal.iter().sum::<f64>() / removal.len() as f64;
    assert!(mean >= 0.0, "mean of corrected signal {mean}");
}

#[test]
fn both_output_keeps_per_sample_results_together() {
    let overrides = ParamSet::new().with("output", "both").with("window_size", 1_i64);
    let output = run_default(&methods::MedianBaseline, &ftir_dataset(), &overrides).unwrap();
    let fold0 = output.get("fold0").unwrap().get("spectra").unwrap();
    assert_eq!(
        fold0,
        &FieldValue::List(vec![
            FieldValue::Matrix(vec![vec![0.0; 3], vec![1.0, 2.0, 3.0]]),
            FieldValue::Matrix(vec![vec![0.0; 3], vec![4.0, 5.0, 6.0]]),
        ])
    );
}

#[test]
fn cut_range_keeps_values_and_axis_aligned() {
    let overrides = ParamSet::new().with("cut_range", (1_i64, 0_i64));
    let output = run_default(&CutRange, &ftir_dataset(), &overrides).unwrap();
    let fold1 = output.get("fold1").unwrap();
    assert_eq!(fold1.get("spectra"), Some(&FieldValue::Series(vec![8.0, 9.0])));
    assert_eq!(fold1.get("axis_wavenumber"), Some(&FieldValue::Series(vec![402.0, 404.0])));
}

#[test]
fn unknown_parameter_is_rejected_before_processing() {
    let overrides = ParamSet::new().with("windw_size", 5_i64);
    let err = run_default(&RunningMedian, &ftir_dataset(), &overrides).unwrap_err();
    assert!(matches!(err, PrepError::UnknownParameter { ref name, .. } if name == "windw_size"));
}

#[test]
fn reserved_override_is_rejected() {
    let overrides = ParamSet::new().with("y", 1.0);
    let err = run_default(&RunningMedian, &ftir_dataset(), &overrides).unwrap_err();
    assert!(matches!(err, PrepError::ReservedParameter(_)));
}

#[test]
fn missing_field_names_the_fold() {
    let mut input = ftir_dataset();
    input.insert("empty", FoldRecord::new());
    let err = run(&identity(), &Domain::Ftir.single(), &input, &ParamSet::new()).unwrap_err();
    assert!(matches!(err, PrepError::Fold { ref fold, .. } if fold == "empty"));
}

#[test]
fn parallel_and_sequential_runs_agree_on_every_method() {
    let input = ftir_dataset();
    let small = ParamSet::new();
    for processor in methods::catalog() {
        let config = Configuration::default();
        // Some methods reject folds this small; both runs must then fail alike.
        let mut data = Dataset::new();
        for (name, record) in input.iter() {
            if let Some(spectra) = record.get("spectra") {
                data.insert(name, FoldRecord::new().with("data", spectra.clone()));
            }
        }
        let sequential = FoldEngine::new().run(processor.as_ref(), &config, &data, &small);
        let parallel = FoldEngine::new()
            .parallel(true)
            .run(processor.as_ref(), &config, &data, &small);
        match (sequential, parallel) {
            (Ok(a), Ok(b)) => assert_eq!(a, b, "{}", processor.name()),
            (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string(), "{}", processor.name()),
            (a, b) => panic!("{} diverged: {a:?} vs {b:?}", processor.name()),
        }
    }
}

#[test]
fn dataset_json_keeps_fold_order() {
    let json = r#"{"zeta": {"data": [1.0, 2.0]}, "alpha": {"data": [[1.0], [2.0]]}}"#;
    let dataset: Dataset = serde_json::from_str(json).unwrap();
    assert_eq!(dataset.fold_names(), vec!["zeta", "alpha"]);

    let back = serde_json::to_string(&dataset).unwrap();
    assert!(back.find("zeta").unwrap() < back.find("alpha").unwrap());
}

#[test]
fn configuration_json_is_validated() {
    let ok = r#"{"domain": "ftir",
                 "unpack_mode": "paired_field",
                 "unpack_keys": {"y": "spectra", "x": "axis_wavenumber"},
                 "pack_mode": "single_field",
                 "pack_keys": {"y": "spectra"}}"#;
    let config: Configuration = serde_json::from_str(ok).unwrap();
    assert_eq!(config, Domain::Ftir.paired());

    let bad = r#"{"unpack_mode": "single_field",
                  "unpack_keys": {"y": "spectra"},
                  "pack_mode": "paired_field",
                  "pack_keys": {"y": "spectra", "x": "axis_wavenumber"}}"#;
    assert!(serde_json::from_str::<Configuration>(bad).is_err());
}

#[test]
fn configuration_json_without_a_domain_cannot_name_fields() {
    let json = r#"{"unpack_mode": "single_field", "unpack_keys": {"y": "totally_unlisted"}}"#;
    assert!(serde_json::from_str::<Configuration>(json).is_err());
}

#[test]
fn oversized_window_falls_back_to_the_whole_sample() {
    let overrides = ParamSet::new().with("window_size", i64::MAX);
    let output = run_default(&RunningMedian, &ftir_dataset(), &overrides).unwrap();
    assert_eq!(
        output.get("fold1").unwrap().get("spectra"),
        Some(&FieldValue::Series(vec![7.0, 8.0, 8.0]))
    );
}
