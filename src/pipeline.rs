//! End-to-end pipeline: fetch an image, resolve a model, segment every plane

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cli::Cli;
use crate::data::idr::{self, RemoteImage, Source};
use crate::data::volume::{count_objects, Dims, LabelVolume, PredictionSet, Volume};
use crate::progress::PipelineProgress;
use crate::seg::model::StarConvexModel;
use crate::seg::predict;
use crate::seg::registry;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Everything the pipeline needs, distilled from the command line. The
/// viewer keeps a copy so "Open local" can rerun the pipeline on another
/// hierarchy with the same model and slice selection.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub source: Source,
    /// Overrides the conventional `labels/<resolution>` node.
    pub labels_node: Option<String>,
    pub model: String,
    pub registry_url: Option<String>,
    pub cache_dir: PathBuf,
    pub timepoint: usize,
    pub channel: usize,
}

impl PipelineOptions {
    pub fn from_cli(cli: &Cli) -> Self {
        let source = match &cli.local_path {
            Some(path) => Source::Local {
                path: path.clone(),
                resolution: cli.resolution,
            },
            None => Source::Idr(RemoteImage {
                endpoint: cli.endpoint.clone(),
                image_id: cli.image_id,
                resolution: cli.resolution,
            }),
        };
        Self {
            source,
            labels_node: cli.labels_path.as_deref().map(idr::normalize_node),
            model: cli.model.clone(),
            registry_url: cli.registry_url.clone(),
            cache_dir: cli.resolved_cache_dir(),
            timepoint: cli.timepoint,
            channel: cli.channel,
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// One fully processed dataset, ready for the viewer or export.
pub struct LoadedDataset {
    pub source: Source,
    pub model_name: String,
    pub timepoint: usize,
    pub channel: usize,
    pub volume: Volume,
    pub labels: Option<LabelVolume>,
    pub predictions: PredictionSet,
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Resolve the model name through the registry, fetch its weights into the
/// cache, and load the inference session.
pub fn resolve_model(
    options: &PipelineOptions,
    progress: &PipelineProgress,
) -> Result<StarConvexModel> {
    let index = match &options.registry_url {
        Some(url) => registry::fetch_registry(url)
            .with_context(|| format!("fetching model registry from {url}"))?,
        None => registry::built_in(),
    };
    let entry = index.resolve(&options.model)?;

    let spinner = progress.spinner("preparing model");
    let weights = registry::ensure_weights(entry, &options.cache_dir)
        .with_context(|| format!("fetching weights for model {:?}", entry.name))?;
    let model = StarConvexModel::load(&weights, entry.config.clone())
        .with_context(|| format!("loading {}", weights.display()))?;
    spinner.clear();
    Ok(model)
}

/// Load intensities and curated labels from the source, then segment every
/// plane of the selected (timepoint, channel).
pub fn load_dataset(
    options: &PipelineOptions,
    model: &mut StarConvexModel,
    progress: &PipelineProgress,
) -> Result<LoadedDataset> {
    let storage = options
        .source
        .storage()
        .with_context(|| format!("opening {}", options.source))?;

    let image_node = options.source.image_node();
    let array = idr::open_array(&storage, &image_node)
        .with_context(|| format!("opening image array {image_node} in {}", options.source))?;
    let dims = Dims::from_shape(array.shape())?;
    dims.check_plane(options.timepoint, options.channel, 0)
        .context("requested timepoint/channel outside the image")?;
    log::info!(
        "image {}: t={} c={} z={} y={} x={}",
        options.source,
        dims.t,
        dims.c,
        dims.z,
        dims.y,
        dims.x
    );

    let bar = progress.phase("fetching image planes", dims.plane_count());
    let volume = idr::load_volume(&array, |done, total| bar.update(done, total))
        .context("fetching image planes")?;
    bar.finish();

    let labels = load_labels_if_present(options, &storage, &volume, progress)?;

    let bar = progress.phase("segmenting planes", dims.z);
    let predictions = predict::predict_volume(
        model,
        &volume,
        options.timepoint,
        options.channel,
        |done, total, objects| {
            bar.update(done, total);
            bar.note(format!("{objects} objects"));
        },
    )
    .context("segmenting planes")?;
    bar.finish();

    Ok(LoadedDataset {
        source: options.source.clone(),
        model_name: options.model.clone(),
        timepoint: options.timepoint,
        channel: options.channel,
        volume,
        labels,
        predictions,
    })
}

/// An image without a label hierarchy is not an error; the viewer just has
/// nothing curated to show.
fn load_labels_if_present(
    options: &PipelineOptions,
    storage: &zarrs::storage::ReadableStorage,
    volume: &Volume,
    progress: &PipelineProgress,
) -> Result<Option<LabelVolume>> {
    let labels_node = options
        .labels_node
        .clone()
        .unwrap_or_else(|| options.source.labels_node());
    let Some(label_array) = idr::open_optional_array(storage, &labels_node)
        .with_context(|| format!("probing label array {labels_node}"))?
    else {
        log::warn!("no curated labels at {labels_node}");
        return Ok(None);
    };

    let label_dims = Dims::from_shape(label_array.shape())?;
    let bar = progress.phase("fetching label planes", label_dims.plane_count());
    let labels = idr::load_labels(&label_array, volume.dims(), |done, total| {
        bar.update(done, total);
    })
    .context("fetching label planes")?;
    bar.finish();
    log::info!("curated labels on {} planes", labels.curated_count());
    Ok(Some(labels))
}

/// The whole pipeline. Returns the model alongside the dataset so the viewer
/// can rerun segmentation when another hierarchy is opened.
pub fn run(
    options: &PipelineOptions,
    progress: &PipelineProgress,
) -> Result<(LoadedDataset, StarConvexModel)> {
    let mut model = resolve_model(options, progress)?;
    let dataset = load_dataset(options, &mut model, progress)?;
    Ok((dataset, model))
}

/// Queryable prediction summary used by the side panel and the CSV export.
pub fn object_counts(dataset: &LoadedDataset) -> Vec<PlaneCounts> {
    let dims = dataset.volume.dims();
    let mut rows = Vec::with_capacity(dims.z);
    for z in 0..dims.z {
        let curated = dataset.labels.as_ref().and_then(|labels| {
            labels
                .plane(dataset.timepoint, dataset.channel, z)
                .ok()
                .flatten()
                .map(|plane| count_objects(&plane))
        });
        let predicted = dataset
            .predictions
            .plane(dataset.timepoint, z)
            .map(|plane| plane.objects);
        rows.push(PlaneCounts {
            z,
            curated,
            predicted,
        });
    }
    rows
}

/// Per-plane object counts; `curated` is `None` on unannotated planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneCounts {
    pub z: usize,
    pub curated: Option<usize>,
    pub predicted: Option<usize>,
}
