//! Container round trips through real files.

use ndarray::{ArrayD, IxDyn};
use seqfeed::config::{IteratorConfig, PipelineConfig};
use seqfeed::iterators::DataIterator;
use seqfeed::storage::{DataFile, DataFileError, DataFileWriter, FORMAT_NAME};
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "seqfeed_test_{}_{}.safetensors",
        name,
        std::process::id()
    ))
}

fn sequential(shape: &[usize], offset: f32) -> ArrayD<f32> {
    let n: usize = shape.iter().product();
    ArrayD::from_shape_vec(IxDyn(shape), (0..n).map(|x| x as f32 + offset).collect()).unwrap()
}

fn write_example(path: &PathBuf) {
    let mut writer = DataFileWriter::new().with_metadata("author", "tests");
    writer
        .group("training")
        .unwrap()
        .create_dataset("input_data", sequential(&[1, 6, 4], 0.0))
        .unwrap()
        .create_dataset("targets", sequential(&[1, 6, 1], 100.0))
        .unwrap();
    writer
        .add_dataset("validation", "input_data", sequential(&[1, 2, 4], 0.5))
        .unwrap();
    writer
        .add_dataset("validation", "targets", sequential(&[1, 3, 1], 0.5))
        .unwrap();
    writer.write(path).unwrap();
}

#[test]
fn round_trip_groups_and_datasets() {
    let path = temp_path("round_trip");
    write_example(&path);

    let file = DataFile::open(&path).unwrap();
    assert_eq!(file.groups().collect::<Vec<_>>(), vec!["training", "validation"]);
    assert_eq!(file.metadata().get("format").map(String::as_str), Some(FORMAT_NAME));
    assert_eq!(file.metadata().get("author").map(String::as_str), Some("tests"));

    let training = file.group("training").unwrap();
    assert_eq!(
        training.dataset_names().collect::<Vec<_>>(),
        vec!["input_data", "targets"]
    );
    assert_eq!(training.shape("input_data").unwrap(), &[1, 6, 4]);
    assert_eq!(
        training.dataset("targets").unwrap(),
        sequential(&[1, 6, 1], 100.0)
    );

    let data = training.load().unwrap();
    assert_eq!(data.num_sequences(), 6);
    assert_eq!(data.get("input_data"), Some(&sequential(&[1, 6, 4], 0.0)));

    std::fs::remove_file(&path).ok();
}

#[test]
fn missing_group_and_dataset() {
    let path = temp_path("missing");
    write_example(&path);
    let file = DataFile::open(&path).unwrap();

    match file.group("test") {
        Err(DataFileError::GroupNotFound { available, .. }) => {
            assert_eq!(available, vec!["training".to_string(), "validation".to_string()])
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(matches!(
        file.group("training").unwrap().dataset("mask"),
        Err(DataFileError::DatasetNotFound { .. })
    ));
    assert!(matches!(DataFile::open(temp_path("does_not_exist")), Err(DataFileError::Io(_))));

    std::fs::remove_file(&path).ok();
}

#[test]
fn convention_report_flags_batch_mismatch() {
    let path = temp_path("report");
    write_example(&path);
    let file = DataFile::open(&path).unwrap();

    let reports = file.check_conventions();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].group, "training");
    assert_eq!(reports[0].shared_batch(), Some(6));
    assert!(!reports[1].is_valid());
    assert!(reports[1].problems()[0].contains("batch size"));

    // Loading the broken group fails the same check.
    assert!(matches!(
        file.group("validation").unwrap().load(),
        Err(DataFileError::Data(_))
    ));
    // A consistent subset still loads.
    let subset = file
        .group("validation")
        .unwrap()
        .load_only(&["input_data"])
        .unwrap();
    assert_eq!(subset.num_sequences(), 2);

    std::fs::remove_file(&path).ok();
}

#[test]
fn root_group_datasets() {
    let path = temp_path("root");
    let mut writer = DataFileWriter::new();
    writer.add_dataset("", "default", sequential(&[2, 3, 1], 0.0)).unwrap();
    writer.write(&path).unwrap();

    let file = DataFile::open(&path).unwrap();
    assert_eq!(file.groups().collect::<Vec<_>>(), vec![""]);
    assert_eq!(file.group("").unwrap().load().unwrap().num_sequences(), 3);

    std::fs::remove_file(&path).ok();
}

#[test]
fn pipeline_from_file() {
    let path = temp_path("pipeline");
    write_example(&path);

    let config = PipelineConfig::new(&path)
        .with_iterator(IteratorConfig::Online { shuffle: false })
        .with_seed(3);
    let mut iterator = config.build().unwrap();
    assert_eq!(iterator.num_batches(), Some(6));
    let indices: Vec<usize> = iterator.epoch().map(|b| b.indices()[0]).collect();
    assert_eq!(indices, (0..6).collect::<Vec<_>>());

    let broken = PipelineConfig::new(&path).with_group("validation");
    assert!(broken.build().is_err());

    std::fs::remove_file(&path).ok();
}
