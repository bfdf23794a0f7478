use std::path::PathBuf;

use crate::pipeline::LoadedDataset;

// ---------------------------------------------------------------------------
// View options
// ---------------------------------------------------------------------------

/// How the label panes are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewOptions {
    /// Draw the intensity image underneath the labels.
    pub intensity_underlay: bool,
    /// Label opacity over the underlay; ignored when the underlay is off.
    pub label_opacity: f32,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            intensity_underlay: true,
            label_opacity: 0.6,
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Processed dataset (None until the pipeline delivers one).
    pub dataset: Option<LoadedDataset>,

    /// Bumped whenever dataset contents change, so cached textures rebuild.
    pub dataset_revision: u64,

    /// Plane cursor: which (t, c, z) is on screen.
    pub cursor_t: usize,
    pub cursor_c: usize,
    pub cursor_z: usize,

    pub view: ViewOptions,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Last export target, remembered across exports.
    pub export_dir: Option<PathBuf>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            dataset: None,
            dataset_revision: 0,
            cursor_t: 0,
            cursor_c: 0,
            cursor_z: 0,
            view: ViewOptions::default(),
            status_message: None,
            export_dir: None,
        }
    }
}

impl AppState {
    /// Ingest a processed dataset and place the cursor on the first curated
    /// plane (or the middle of the stack when nothing is curated).
    pub fn set_dataset(&mut self, dataset: LoadedDataset) {
        self.cursor_t = dataset.timepoint;
        self.cursor_c = dataset.channel;
        let curated = dataset
            .labels
            .as_ref()
            .map(|labels| labels.curated_planes(dataset.timepoint))
            .unwrap_or_default();
        self.cursor_z = curated
            .first()
            .copied()
            .unwrap_or(dataset.volume.dims().z / 2);
        self.dataset = Some(dataset);
        self.dataset_revision += 1;
        self.status_message = None;
    }

    /// Mark the dataset contents as changed so cached textures rebuild.
    pub fn touch(&mut self) {
        self.dataset_revision += 1;
    }

    pub fn max_z(&self) -> usize {
        self.dataset
            .as_ref()
            .map_or(0, |d| d.volume.dims().z.saturating_sub(1))
    }

    /// z indices carrying curated labels at the current timepoint.
    pub fn curated_zs(&self) -> Vec<usize> {
        self.dataset
            .as_ref()
            .and_then(|d| d.labels.as_ref())
            .map(|labels| labels.curated_planes(self.cursor_t))
            .unwrap_or_default()
    }

    /// Jump the cursor to the next (or previous) curated plane, if any.
    pub fn step_curated(&mut self, forward: bool) {
        let zs = self.curated_zs();
        let target = if forward {
            zs.iter().find(|&&z| z > self.cursor_z)
        } else {
            zs.iter().rev().find(|&&z| z < self.cursor_z)
        };
        if let Some(&z) = target {
            self.cursor_z = z;
        }
    }

    /// Whether the predictions on file belong to the (t, c) on screen.
    pub fn view_matches_predictions(&self) -> bool {
        self.dataset
            .as_ref()
            .is_some_and(|d| d.timepoint == self.cursor_t && d.channel == self.cursor_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_empty() {
        let state = AppState::default();
        assert!(state.dataset.is_none());
        assert_eq!(state.max_z(), 0);
        assert!(state.curated_zs().is_empty());
    }

    #[test]
    fn curated_stepping_without_labels_stays_put() {
        let mut state = AppState::default();
        state.cursor_z = 3;
        state.step_curated(true);
        state.step_curated(false);
        assert_eq!(state.cursor_z, 3);
    }
}
