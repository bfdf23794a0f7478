use std::sync::Arc;

use ndarray::Array5;
use zarrs::array::{data_type, ArrayBuilder, DataType, FillValue};
use zarrs::storage::store::MemoryStore;
use zarrs::storage::ReadableStorage;

use slicescope::data::idr;
use slicescope::Error;

fn write_array<T: zarrs::array::Element>(
    store: &Arc<MemoryStore>,
    node: &str,
    dtype: DataType,
    fill: FillValue,
    data: Array5<T>,
) {
    let shape: Vec<u64> = data.shape().iter().map(|&s| s as u64).collect();
    let chunks = shape.clone();
    let array = ArrayBuilder::new(shape, dtype, chunks.try_into().expect("chunk shape"), fill)
        .dimension_names(["t", "c", "z", "y", "x"].into())
        .build(store.clone(), node)
        .expect("build array");
    array.store_metadata().expect("store metadata");
    array
        .store_array_subset_ndarray::<T, _>(&[0, 0, 0, 0, 0], data)
        .expect("store data");
}

/// A two-channel six-plane stack, optionally with labels on planes 2 and 5.
fn fixture(with_labels: bool) -> ReadableStorage {
    env_logger::try_init().ok();
    let store = Arc::new(MemoryStore::new());

    let mut image = Array5::<u16>::zeros((1, 2, 6, 8, 10));
    for z in 0..6 {
        image[[0, 0, z, 2, 3]] = (100 + z as u16) * 10;
    }
    image[[0, 1, 0, 0, 0]] = 7;
    write_array(
        &store,
        "/0",
        data_type::uint16(),
        FillValue::from(0u16),
        image,
    );

    if with_labels {
        let mut labels = Array5::<u16>::zeros((1, 1, 6, 8, 10));
        labels[[0, 0, 2, 4, 4]] = 1;
        labels[[0, 0, 2, 4, 5]] = 1;
        labels[[0, 0, 5, 1, 1]] = 3;
        write_array(
            &store,
            "/labels/0",
            data_type::uint16(),
            FillValue::from(0u16),
            labels,
        );
    }
    store
}

#[test]
fn reads_intensity_volume() {
    let storage = fixture(false);
    let array = idr::open_array(&storage, "/0").expect("open image array");
    let mut planes_done = 0;
    let volume = idr::load_volume(&array, |done, total| {
        assert_eq!(total, 12);
        planes_done = done;
    })
    .expect("load volume");
    assert_eq!(planes_done, 12);

    let dims = volume.dims();
    assert_eq!((dims.t, dims.c, dims.z, dims.y, dims.x), (1, 2, 6, 8, 10));
    let plane = volume.plane(0, 0, 3).expect("plane");
    assert_eq!(plane[(2, 3)], 1030.0);
    assert_eq!(plane[(0, 0)], 0.0);
    let other_channel = volume.plane(0, 1, 0).expect("plane");
    assert_eq!(other_channel[(0, 0)], 7.0);
}

#[test]
fn reads_sparse_labels() {
    let storage = fixture(true);
    let image = idr::open_array(&storage, "/0").expect("open image array");
    let volume = idr::load_volume(&image, |_, _| {}).expect("load volume");

    let label_array = idr::open_optional_array(&storage, "/labels/0")
        .expect("probe label array")
        .expect("label array present");
    let labels = idr::load_labels(&label_array, volume.dims(), |_, _| {}).expect("load labels");

    assert_eq!(labels.curated_planes(0), vec![2, 5]);
    assert_eq!(labels.curated_count(), 2);
    assert!(labels.plane(0, 0, 0).expect("plane").is_none());
    let plane = labels
        .plane(0, 1, 2) // image channel 1 clamps to the single label channel
        .expect("plane")
        .expect("curated plane");
    assert_eq!(plane[(4, 4)], 1);
    assert_eq!(plane[(4, 5)], 1);
}

#[test]
fn missing_label_hierarchy_is_not_an_error() {
    let storage = fixture(false);
    let probed = idr::open_optional_array(&storage, "/labels/0").expect("probe label array");
    assert!(probed.is_none());
}

#[test]
fn non_5d_arrays_are_rejected() {
    env_logger::try_init().ok();
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(
        vec![8, 10],
        data_type::uint16(),
        vec![8, 10].try_into().expect("chunk shape"),
        FillValue::from(0u16),
    )
    .build(store.clone(), "/flat")
    .expect("build array");
    array.store_metadata().expect("store metadata");

    let storage: ReadableStorage = store;
    let array = idr::open_array(&storage, "/flat").expect("open array");
    let err = idr::load_volume(&array, |_, _| {}).expect_err("2d array must be rejected");
    assert!(matches!(err, Error::ShapeMismatch(_)));
}

#[test]
fn label_shape_mismatch_is_rejected() {
    let storage = fixture(false);
    let image = idr::open_array(&storage, "/0").expect("open image array");
    let volume = idr::load_volume(&image, |_, _| {}).expect("load volume");

    let store = Arc::new(MemoryStore::new());
    write_array(
        &store,
        "/labels/0",
        data_type::uint16(),
        FillValue::from(0u16),
        Array5::<u16>::zeros((1, 1, 5, 8, 10)),
    );
    let short_storage: ReadableStorage = store;
    let label_array = idr::open_optional_array(&short_storage, "/labels/0")
        .expect("probe label array")
        .expect("label array present");
    let err =
        idr::load_labels(&label_array, volume.dims(), |_, _| {}).expect_err("z extents differ");
    assert!(matches!(err, Error::ShapeMismatch(_)));
}

#[test]
fn float_label_arrays_are_rejected() {
    let storage = fixture(false);
    let image = idr::open_array(&storage, "/0").expect("open image array");
    let volume = idr::load_volume(&image, |_, _| {}).expect("load volume");

    let store = Arc::new(MemoryStore::new());
    write_array(
        &store,
        "/labels/0",
        data_type::float32(),
        FillValue::from(0.0f32),
        Array5::<f32>::zeros((1, 2, 6, 8, 10)),
    );
    let float_storage: ReadableStorage = store;
    let label_array = idr::open_optional_array(&float_storage, "/labels/0")
        .expect("probe label array")
        .expect("label array present");
    let err = idr::load_labels(&label_array, volume.dims(), |_, _| {})
        .expect_err("float labels must be rejected");
    assert!(matches!(err, Error::UnsupportedDataType(_)));
}
