//! Per-plane PNG export and the object-count summary CSV

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use ndarray::ArrayView2;

use crate::color::label_color;
use crate::error::{Error, Result};
use crate::pipeline::{object_counts, LoadedDataset};

/// Write one grayscale intensity PNG per z plane, label PNGs for every
/// curated or predicted plane, and a `summary.csv` of per-plane object
/// counts. Returns the number of files written.
pub fn export_dataset(dataset: &LoadedDataset, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir).map_err(|source| Error::ExportWrite {
        path: dir.to_path_buf(),
        source,
    })?;

    let dims = *dataset.volume.dims();
    let (t, c) = (dataset.timepoint, dataset.channel);
    let mut files = 0;
    for z in 0..dims.z {
        let intensity = dataset.volume.plane(t, c, z)?;
        save_png(
            gray_image(&intensity).into(),
            dir.join(format!("z{z:03}_intensity.png")),
        )?;
        files += 1;

        let curated = match &dataset.labels {
            Some(labels) => labels.plane(t, c, z)?,
            None => None,
        };
        if let Some(plane) = curated {
            save_png(
                label_image(&plane).into(),
                dir.join(format!("z{z:03}_curated.png")),
            )?;
            files += 1;
        }

        if let Some(plane) = dataset.predictions.plane(t, z) {
            save_png(
                label_image(&plane.labels.view()).into(),
                dir.join(format!("z{z:03}_predicted.png")),
            )?;
            files += 1;
        }
    }

    write_summary(dataset, dir)?;
    files += 1;
    log::debug!("wrote {files} files to {}", dir.display());
    Ok(files)
}

// ---------------------------------------------------------------------------
// Plane rasterization
// ---------------------------------------------------------------------------

/// Min-max windowed 8-bit rendering of an intensity plane.
fn gray_image(plane: &ArrayView2<'_, f32>) -> GrayImage {
    let (h, w) = plane.dim();
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in plane.iter() {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    let range = (max - min).max(f32::EPSILON);
    let mut image = GrayImage::new(w as u32, h as u32);
    for ((y, x), &v) in plane.indexed_iter() {
        let gray = if v.is_finite() {
            (((v - min) / range).clamp(0.0, 1.0) * 255.0) as u8
        } else {
            0
        };
        image.put_pixel(x as u32, y as u32, Luma([gray]));
    }
    image
}

/// Instance labels colorized on a black background.
fn label_image(labels: &ArrayView2<'_, u32>) -> RgbImage {
    let (h, w) = labels.dim();
    let mut image = RgbImage::new(w as u32, h as u32);
    for ((y, x), &id) in labels.indexed_iter() {
        if id != 0 {
            let color = label_color(id);
            image.put_pixel(x as u32, y as u32, Rgb([color.r(), color.g(), color.b()]));
        }
    }
    image
}

fn save_png(image: DynamicImage, path: PathBuf) -> Result<()> {
    image.save(&path).map_err(|error| match error {
        image::ImageError::IoError(source) => Error::ExportWrite { path, source },
        other => Error::Image(other),
    })
}

// ---------------------------------------------------------------------------
// Summary CSV
// ---------------------------------------------------------------------------

/// One row per z plane; count cells stay empty where nothing is annotated
/// or predicted.
fn write_summary(dataset: &LoadedDataset, dir: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(dir.join("summary.csv"))?;
    writer.write_record(["z", "curated_objects", "predicted_objects"])?;
    for counts in object_counts(dataset) {
        writer.write_record([
            counts.z.to_string(),
            counts.curated.map_or_else(String::new, |n| n.to_string()),
            counts.predicted.map_or_else(String::new, |n| n.to_string()),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn gray_image_windows_to_full_range() {
        let plane = array![[10.0_f32, 20.0], [30.0, 20.0]];
        let image = gray_image(&plane.view());
        assert_eq!(image.get_pixel(0, 0), &Luma([0]));
        assert_eq!(image.get_pixel(0, 1), &Luma([255]));
        assert_eq!(image.get_pixel(1, 0), &Luma([127]));
    }

    #[test]
    fn label_image_keeps_background_black() {
        let labels = array![[0_u32, 4], [4, 0]];
        let image = label_image(&labels.view());
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        let fg = label_color(4);
        assert_eq!(image.get_pixel(1, 0), &Rgb([fg.r(), fg.g(), fg.b()]));
    }
}
