use eframe::egui;

use crate::pipeline::{LoadedDataset, PipelineOptions};
use crate::seg::model::StarConvexModel;
use crate::state::AppState;
use crate::ui::{panels, view};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct SliceScopeApp {
    pub state: AppState,
    /// Kept so the viewer can rerun segmentation for another (t, c) or for
    /// a hierarchy opened from the File menu.
    pub model: Option<StarConvexModel>,
    pub options: PipelineOptions,
    cache: view::SliceCache,
}

impl SliceScopeApp {
    pub fn new(dataset: LoadedDataset, model: StarConvexModel, options: PipelineOptions) -> Self {
        let mut state = AppState::default();
        state.set_dataset(dataset);
        Self {
            state,
            model: Some(model),
            options,
            cache: view::SliceCache::default(),
        }
    }
}

impl eframe::App for SliceScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state, &mut self.model, &mut self.options);
        });

        // ---- Left side panel: navigation ----
        egui::SidePanel::left("navigation_panel")
            .default_width(280.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state, &mut self.model);
            });

        // ---- Central panel: curated vs predicted slices ----
        egui::CentralPanel::default().show(ctx, |ui| {
            self.cache.ensure(ctx, &self.state);
            view::slice_pair(ui, &self.state, &self.cache);
        });
    }
}
