use std::fs;

use ndarray::{Array2, Array5};

use slicescope::data::idr::Source;
use slicescope::data::volume::{LabelVolume, PredictionSet, Volume};
use slicescope::export::export_dataset;
use slicescope::pipeline::LoadedDataset;

/// Three planes, curated labels on z=1 only, predictions everywhere.
fn demo_dataset() -> LoadedDataset {
    let mut intensity = Array5::<f32>::zeros((1, 1, 3, 4, 5));
    intensity[[0, 0, 1, 2, 2]] = 50.0;

    let mut labels = Array5::<u32>::zeros((1, 1, 3, 4, 5));
    labels[[0, 0, 1, 1, 1]] = 1;
    labels[[0, 0, 1, 2, 3]] = 2;

    let mut predictions = PredictionSet::new();
    let mut plane = Array2::<u32>::zeros((4, 5));
    plane[[0, 0]] = 1;
    predictions.insert(0, 0, plane, 1);
    predictions.insert(0, 1, Array2::zeros((4, 5)), 0);
    predictions.insert(0, 2, Array2::zeros((4, 5)), 0);

    LoadedDataset {
        source: Source::Local {
            path: "demo.zarr".into(),
            resolution: 0,
        },
        model_name: "2D_demo".to_string(),
        timepoint: 0,
        channel: 0,
        volume: Volume::new(intensity),
        labels: Some(LabelVolume::new(labels)),
        predictions,
    }
}

#[test]
fn writes_planes_and_summary() {
    let dir = tempfile::tempdir().expect("temp dir");
    let files = export_dataset(&demo_dataset(), dir.path()).expect("export");
    // 3 intensity + 1 curated + 3 predicted + summary.csv
    assert_eq!(files, 8);

    for name in [
        "z000_intensity.png",
        "z001_intensity.png",
        "z002_intensity.png",
        "z001_curated.png",
        "z000_predicted.png",
        "z002_predicted.png",
        "summary.csv",
    ] {
        assert!(dir.path().join(name).exists(), "missing {name}");
    }
    assert!(!dir.path().join("z000_curated.png").exists());

    let (width, height) =
        image::image_dimensions(dir.path().join("z001_curated.png")).expect("png header");
    assert_eq!((width, height), (5, 4));

    let summary = fs::read_to_string(dir.path().join("summary.csv")).expect("read summary");
    let mut lines = summary.lines();
    assert_eq!(lines.next(), Some("z,curated_objects,predicted_objects"));
    assert_eq!(lines.next(), Some("0,,1"));
    assert_eq!(lines.next(), Some("1,2,0"));
    assert_eq!(lines.next(), Some("2,,0"));
    assert_eq!(lines.next(), None);
}

#[test]
fn exports_without_labels() {
    let mut dataset = demo_dataset();
    dataset.labels = None;
    let dir = tempfile::tempdir().expect("temp dir");
    let files = export_dataset(&dataset, dir.path()).expect("export");
    assert_eq!(files, 7);
    assert!(!dir.path().join("z001_curated.png").exists());

    let summary = fs::read_to_string(dir.path().join("summary.csv")).expect("read summary");
    assert!(summary.contains("1,,0"));
}
