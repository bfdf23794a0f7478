//! Registry of pretrained star-convex segmentation models

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Input memory layout expected by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Axes {
    /// Batch, height, width, channel (TensorFlow-style exports).
    Nhwc,
    /// Batch, channel, height, width.
    Nchw,
}

/// Everything needed to run a model and post-process its output.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictConfig {
    pub axes: Axes,
    /// Radial distances predicted per grid cell.
    pub n_rays: usize,
    /// Prediction grid stride (y, x): one candidate per `grid` pixels.
    pub grid: [usize; 2],
    /// Input extents are padded to a multiple of this.
    pub div_by: usize,
    /// Minimum object probability for a candidate.
    pub prob_thresh: f32,
    /// Maximum allowed overlap between accepted instances.
    pub nms_thresh: f32,
    /// Percentile pair for intensity normalization.
    pub norm_percentiles: [f32; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub weights_url: String,
    pub config: PredictConfig,
}

impl ModelEntry {
    pub fn weights_filename(&self) -> String {
        format!("{}.onnx", self.name)
    }

    /// Where the weights land in the cache directory.
    pub fn local_weights(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(self.weights_filename())
    }

    pub fn is_cached(&self, cache_dir: &Path) -> bool {
        self.local_weights(cache_dir).exists()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryIndex {
    #[serde(default)]
    pub version: u32,
    pub models: Vec<ModelEntry>,
}

impl RegistryIndex {
    /// Look up a model by name. Unknown names report what is available.
    pub fn resolve(&self, name: &str) -> Result<&ModelEntry> {
        self.models.iter().find(|m| m.name == name).ok_or_else(|| {
            let available = self
                .models
                .iter()
                .map(|m| m.name.clone())
                .collect::<Vec<_>>()
                .join(", ");
            Error::UnknownModel {
                name: name.to_string(),
                available,
            }
        })
    }
}

/// Models shipped with the application. A remote index can replace this list.
pub fn built_in() -> RegistryIndex {
    RegistryIndex {
        version: 1,
        models: vec![
            ModelEntry {
                name: "2D_demo".into(),
                description: "Demo nuclei model trained on downsampled 2018 Data Science Bowl images".into(),
                weights_url:
                    "https://github.com/stardist/stardist-models/releases/download/v0.1/python_2D_demo.onnx"
                        .into(),
                config: PredictConfig {
                    axes: Axes::Nhwc,
                    n_rays: 32,
                    grid: [2, 2],
                    div_by: 16,
                    prob_thresh: 0.486166,
                    nms_thresh: 0.5,
                    norm_percentiles: [1.0, 99.8],
                },
            },
            ModelEntry {
                name: "2D_versatile_fluo".into(),
                description: "Versatile model for fluorescent nuclei".into(),
                weights_url:
                    "https://github.com/stardist/stardist-models/releases/download/v0.1/python_2D_versatile_fluo.onnx"
                        .into(),
                config: PredictConfig {
                    axes: Axes::Nhwc,
                    n_rays: 32,
                    grid: [2, 2],
                    div_by: 16,
                    prob_thresh: 0.479071,
                    nms_thresh: 0.3,
                    norm_percentiles: [1.0, 99.8],
                },
            },
        ],
    }
}

/// Fetch a registry index from a URL.
pub fn fetch_registry(url: &str) -> Result<RegistryIndex> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("slicescope/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let response = client.get(url).send()?;
    if !response.status().is_success() {
        return Err(Error::HttpStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }
    let index: RegistryIndex = response.json()?;
    Ok(index)
}

/// Resolve the weights of a model to a local file, downloading on first use.
pub fn ensure_weights(entry: &ModelEntry, cache_dir: &Path) -> Result<PathBuf> {
    let target = entry.local_weights(cache_dir);
    if target.exists() {
        log::debug!("using cached weights {}", target.display());
        return Ok(target);
    }
    fs::create_dir_all(cache_dir)?;

    log::info!("downloading {} from {}", entry.name, entry.weights_url);
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("slicescope/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let response = client.get(&entry.weights_url).send()?;
    if !response.status().is_success() {
        return Err(Error::HttpStatus {
            status: response.status().as_u16(),
            url: entry.weights_url.clone(),
        });
    }
    let body = response.bytes()?;

    // Stage under a partial name; rename only once the full body is on disk.
    let partial = target.with_extension("onnx.part");
    fs::write(&partial, &body)?;
    fs::rename(&partial, &target)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_resolves_the_demo_model() {
        let index = built_in();
        let entry = index.resolve("2D_demo").unwrap();
        assert_eq!(entry.config.n_rays, 32);
        assert_eq!(entry.config.grid, [2, 2]);
        assert_eq!(entry.config.axes, Axes::Nhwc);
    }

    #[test]
    fn unknown_model_lists_the_alternatives() {
        let index = built_in();
        let err = index.resolve("3D_demo").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("3D_demo"));
        assert!(message.contains("2D_demo"));
        assert!(message.contains("2D_versatile_fluo"));
    }

    #[test]
    fn index_parses_from_json() {
        let raw = r#"{
            "version": 2,
            "models": [{
                "name": "2D_custom",
                "weights_url": "https://example.org/2D_custom.onnx",
                "config": {
                    "axes": "NCHW",
                    "n_rays": 48,
                    "grid": [1, 1],
                    "div_by": 8,
                    "prob_thresh": 0.4,
                    "nms_thresh": 0.35,
                    "norm_percentiles": [1.0, 99.0]
                }
            }]
        }"#;
        let index: RegistryIndex = serde_json::from_str(raw).unwrap();
        assert_eq!(index.version, 2);
        let entry = index.resolve("2D_custom").unwrap();
        assert_eq!(entry.config.axes, Axes::Nchw);
        assert_eq!(entry.config.n_rays, 48);
        assert_eq!(entry.weights_filename(), "2D_custom.onnx");
    }

    #[test]
    fn cache_path_is_per_model() {
        let index = built_in();
        let entry = index.resolve("2D_demo").unwrap();
        let path = entry.local_weights(Path::new("/tmp/cache"));
        assert_eq!(path, PathBuf::from("/tmp/cache/2D_demo.onnx"));
    }
}
