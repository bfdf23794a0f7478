//! Addressing and loading of OME-Zarr images, remote or local

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use ndarray::{s, Array2, Array5, ArrayD};
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::filesystem::FilesystemStore;
use zarrs::storage::{ReadableStorage, ReadableStorageTraits, StoreKey};

use crate::data::remote::{image_root_url, HttpStore};
use crate::data::volume::{Dims, LabelVolume, Volume};
use crate::error::{Error, Result};

/// Array handle over any readable store.
pub type ZarrArray = Array<dyn ReadableStorageTraits>;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A published IDR image at one resolution level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImage {
    pub endpoint: String,
    pub image_id: u64,
    pub resolution: u32,
}

impl RemoteImage {
    pub fn root_url(&self) -> String {
        image_root_url(&self.endpoint, self.image_id)
    }
}

/// Where an image hierarchy lives.
#[derive(Debug, Clone)]
pub enum Source {
    Idr(RemoteImage),
    Local { path: PathBuf, resolution: u32 },
}

impl Source {
    /// Open the store rooted at the `.zarr` group.
    pub fn storage(&self) -> Result<ReadableStorage> {
        match self {
            Self::Idr(image) => {
                let store = HttpStore::new(image.root_url())?;
                Ok(Arc::new(store))
            }
            Self::Local { path, .. } => {
                let store = FilesystemStore::new(path).map_err(|e| {
                    Error::invalid_source(format!("cannot open {}: {e}", path.display()))
                })?;
                Ok(Arc::new(store))
            }
        }
    }

    pub const fn resolution(&self) -> u32 {
        match self {
            Self::Idr(image) => image.resolution,
            Self::Local { resolution, .. } => *resolution,
        }
    }

    /// Node path of the intensity array within the hierarchy.
    pub fn image_node(&self) -> String {
        format!("/{}", self.resolution())
    }

    /// Node path of the curated label array.
    pub fn labels_node(&self) -> String {
        format!("/labels/{}", self.resolution())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idr(image) => write!(
                f,
                "IDR image {} (resolution {}) via {}",
                image.image_id, image.resolution, image.endpoint
            ),
            Self::Local { path, resolution } => {
                write!(f, "{} (resolution {resolution})", path.display())
            }
        }
    }
}

/// Normalize a user-supplied node path to `/a/b` form.
pub fn normalize_node(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

// ---------------------------------------------------------------------------
// Array opening
// ---------------------------------------------------------------------------

pub fn open_array(storage: &ReadableStorage, node: &str) -> Result<ZarrArray> {
    Ok(Array::open(storage.clone(), node)?)
}

/// Open an array that may legitimately be absent, e.g. the label hierarchy of
/// an unannotated image. Probes the V3 and V2 metadata keys directly so a
/// missing node comes back as `Ok(None)` instead of an open error.
pub fn open_optional_array(storage: &ReadableStorage, node: &str) -> Result<Option<ZarrArray>> {
    let rel = node.trim_start_matches('/');
    for metadata in ["zarr.json", ".zarray"] {
        let key = StoreKey::new(format!("{rel}/{metadata}"))
            .map_err(|e| Error::invalid_source(format!("invalid node path {node:?}: {e}")))?;
        if storage.get(&key)?.is_some() {
            return Ok(Some(open_array(storage, node)?));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Plane-by-plane loading
// ---------------------------------------------------------------------------

fn plane_subset(t: usize, c: usize, z: usize, dims: &Dims) -> ArraySubset {
    let (t, c, z) = (t as u64, c as u64, z as u64);
    ArraySubset::new_with_ranges(&[
        t..t + 1,
        c..c + 1,
        z..z + 1,
        0..dims.y as u64,
        0..dims.x as u64,
    ])
}

fn dtype_name(array: &ZarrArray) -> String {
    array
        .data_type()
        .name_v3()
        .map_or_else(String::new, Cow::into_owned)
}

fn into_plane<T>(data: ArrayD<T>, dims: &Dims) -> Result<Array2<T>> {
    data.into_shape_with_order((dims.y, dims.x))
        .map_err(|e| Error::shape_mismatch(format!("plane reshape failed: {e}")))
}

/// Read one (y, x) plane of intensities, converting from the stored dtype.
fn read_intensity_plane(
    array: &ZarrArray,
    t: usize,
    c: usize,
    z: usize,
    dims: &Dims,
) -> Result<Array2<f32>> {
    let subset = plane_subset(t, c, z, dims);
    let name = dtype_name(array);
    let plane: ArrayD<f32> = match name.as_str() {
        "uint8" => array
            .retrieve_array_subset_ndarray::<u8>(&subset)?
            .mapv(f32::from),
        "uint16" => array
            .retrieve_array_subset_ndarray::<u16>(&subset)?
            .mapv(f32::from),
        "int8" => array
            .retrieve_array_subset_ndarray::<i8>(&subset)?
            .mapv(f32::from),
        "int16" => array
            .retrieve_array_subset_ndarray::<i16>(&subset)?
            .mapv(f32::from),
        "uint32" => array
            .retrieve_array_subset_ndarray::<u32>(&subset)?
            .mapv(|v| v as f32),
        "int32" => array
            .retrieve_array_subset_ndarray::<i32>(&subset)?
            .mapv(|v| v as f32),
        "float32" => array.retrieve_array_subset_ndarray::<f32>(&subset)?,
        "float64" => array
            .retrieve_array_subset_ndarray::<f64>(&subset)?
            .mapv(|v| v as f32),
        other => {
            return Err(Error::UnsupportedDataType(format!(
                "intensity dtype {other:?}"
            )))
        }
    };
    into_plane(plane, dims)
}

/// Read one (y, x) plane of labels. Negative stored ids clamp to background.
fn read_label_plane(
    array: &ZarrArray,
    t: usize,
    c: usize,
    z: usize,
    dims: &Dims,
) -> Result<Array2<u32>> {
    let subset = plane_subset(t, c, z, dims);
    let name = dtype_name(array);
    let plane: ArrayD<u32> = match name.as_str() {
        "uint8" => array
            .retrieve_array_subset_ndarray::<u8>(&subset)?
            .mapv(u32::from),
        "uint16" => array
            .retrieve_array_subset_ndarray::<u16>(&subset)?
            .mapv(u32::from),
        "uint32" => array.retrieve_array_subset_ndarray::<u32>(&subset)?,
        "uint64" => array
            .retrieve_array_subset_ndarray::<u64>(&subset)?
            .mapv(|v| v.min(u64::from(u32::MAX)) as u32),
        "int8" => array
            .retrieve_array_subset_ndarray::<i8>(&subset)?
            .mapv(|v| v.max(0) as u32),
        "int16" => array
            .retrieve_array_subset_ndarray::<i16>(&subset)?
            .mapv(|v| v.max(0) as u32),
        "int32" => array
            .retrieve_array_subset_ndarray::<i32>(&subset)?
            .mapv(|v| v.max(0) as u32),
        "int64" => array
            .retrieve_array_subset_ndarray::<i64>(&subset)?
            .mapv(|v| v.clamp(0, i64::from(u32::MAX)) as u32),
        other => return Err(Error::UnsupportedDataType(format!("label dtype {other:?}"))),
    };
    into_plane(plane, dims)
}

/// Retrieve the whole intensity array plane by plane. `progress` receives
/// (planes done, planes total) after each plane.
pub fn load_volume<F>(array: &ZarrArray, mut progress: F) -> Result<Volume>
where
    F: FnMut(usize, usize),
{
    let dims = Dims::from_shape(array.shape())?;
    let total = dims.plane_count();
    let mut data = Array5::<f32>::zeros((dims.t, dims.c, dims.z, dims.y, dims.x));
    let mut done = 0;
    for t in 0..dims.t {
        for c in 0..dims.c {
            for z in 0..dims.z {
                let plane = read_intensity_plane(array, t, c, z, &dims)?;
                data.slice_mut(s![t, c, z, .., ..]).assign(&plane);
                done += 1;
                progress(done, total);
            }
        }
    }
    Ok(Volume::new(data))
}

/// Retrieve the curated label array. Chunks never written (unannotated
/// planes) decode as the fill value, which is background. The label extent
/// must match the image on every axis except channel.
pub fn load_labels<F>(array: &ZarrArray, image: &Dims, mut progress: F) -> Result<LabelVolume>
where
    F: FnMut(usize, usize),
{
    let dims = Dims::from_shape(array.shape())?;
    if (dims.t, dims.z, dims.y, dims.x) != (image.t, image.z, image.y, image.x) {
        return Err(Error::shape_mismatch(format!(
            "label extent (t={}, z={}, y={}, x={}) does not match image (t={}, z={}, y={}, x={})",
            dims.t, dims.z, dims.y, dims.x, image.t, image.z, image.y, image.x
        )));
    }
    let total = dims.plane_count();
    let mut data = Array5::<u32>::zeros((dims.t, dims.c, dims.z, dims.y, dims.x));
    let mut done = 0;
    for t in 0..dims.t {
        for c in 0..dims.c {
            for z in 0..dims.z {
                let plane = read_label_plane(array, t, c, z, &dims)?;
                data.slice_mut(s![t, c, z, .., ..]).assign(&plane);
                done += 1;
                progress(done, total);
            }
        }
    }
    Ok(LabelVolume::new(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_paths_follow_the_resolution() {
        let source = Source::Idr(RemoteImage {
            endpoint: "https://uk1s3.embassy.ebi.ac.uk".into(),
            image_id: 6001247,
            resolution: 2,
        });
        assert_eq!(source.image_node(), "/2");
        assert_eq!(source.labels_node(), "/labels/2");
    }

    #[test]
    fn node_normalization_is_idempotent() {
        assert_eq!(normalize_node("labels/0"), "/labels/0");
        assert_eq!(normalize_node("/labels/0"), "/labels/0");
        assert_eq!(normalize_node("/labels/0/"), "/labels/0");
    }
}
