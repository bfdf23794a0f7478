//! Side and top panels wrapped around the slice comparison view

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::idr::Source;
use crate::export;
use crate::pipeline::{self, PipelineOptions};
use crate::progress::PipelineProgress;
use crate::seg::model::StarConvexModel;
use crate::seg::predict;
use crate::state::AppState;
use crate::ui::plot;

// ---------------------------------------------------------------------------
// Left side panel – navigation and counts
// ---------------------------------------------------------------------------

/// Render the navigation panel: plane cursor, overlay options, and the
/// per-plane object counts.
pub fn side_panel(ui: &mut Ui, state: &mut AppState, model: &mut Option<StarConvexModel>) {
    ui.heading("Navigation");
    ui.separator();

    let Some(dims) = state.dataset.as_ref().map(|d| *d.volume.dims()) else {
        ui.label("No dataset loaded.");
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Plane cursor ----
            ui.add(
                egui::Slider::new(&mut state.cursor_z, 0..=dims.z.saturating_sub(1))
                    .text("z plane"),
            );
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("prev curated").clicked() {
                    state.step_curated(false);
                }
                if ui.small_button("next curated").clicked() {
                    state.step_curated(true);
                }
            });
            if dims.t > 1 {
                ui.add(egui::Slider::new(&mut state.cursor_t, 0..=dims.t - 1).text("timepoint"));
            }
            if dims.c > 1 {
                ui.add(egui::Slider::new(&mut state.cursor_c, 0..=dims.c - 1).text("channel"));
            }
            if !state.view_matches_predictions() {
                ui.label(RichText::new("Predictions belong to another timepoint/channel.").small());
                if ui.button("Segment this view").clicked() {
                    segment_current_view(state, model);
                }
            }
            ui.separator();

            // ---- Overlay options ----
            ui.checkbox(&mut state.view.intensity_underlay, "Intensity underlay");
            ui.add(
                egui::Slider::new(&mut state.view.label_opacity, 0.0..=1.0).text("label opacity"),
            );
            ui.separator();

            // ---- Counts ----
            ui.strong("Objects per plane");
            counts_table(ui, state);
            ui.separator();
            plot::counts_plot(ui, state);
        });
}

/// Curated vs predicted counts, one row per z plane. Clicking a row jumps
/// the cursor to that plane.
fn counts_table(ui: &mut Ui, state: &mut AppState) {
    let rows = match &state.dataset {
        Some(dataset) => pipeline::object_counts(dataset),
        None => return,
    };
    let cursor_z = state.cursor_z;
    let mut jump = None;
    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(40.0))
        .column(Column::remainder())
        .column(Column::remainder())
        .max_scroll_height(200.0)
        .header(18.0, |mut header| {
            header.col(|ui: &mut Ui| {
                ui.strong("z");
            });
            header.col(|ui: &mut Ui| {
                ui.strong("curated");
            });
            header.col(|ui: &mut Ui| {
                ui.strong("predicted");
            });
        })
        .body(|body| {
            body.rows(18.0, rows.len(), |mut row| {
                let counts = &rows[row.index()];
                row.set_selected(counts.z == cursor_z);
                row.col(|ui: &mut Ui| {
                    if ui
                        .selectable_label(counts.z == cursor_z, counts.z.to_string())
                        .clicked()
                    {
                        jump = Some(counts.z);
                    }
                });
                row.col(|ui: &mut Ui| {
                    ui.label(display_count(counts.curated));
                });
                row.col(|ui: &mut Ui| {
                    ui.label(display_count(counts.predicted));
                });
            });
        });
    if let Some(z) = jump {
        state.cursor_z = z;
    }
}

fn display_count(count: Option<usize>) -> String {
    count.map_or_else(|| "-".to_string(), |n| n.to_string())
}

/// Rerun segmentation for the (t, c) under the cursor, replacing the stored
/// predictions.
fn segment_current_view(state: &mut AppState, model: &mut Option<StarConvexModel>) {
    let Some(model) = model.as_mut() else {
        state.status_message = Some("Error: no model loaded".to_string());
        return;
    };
    let (t, c) = (state.cursor_t, state.cursor_c);
    let result = match state.dataset.as_mut() {
        Some(dataset) => {
            log::info!("segmenting t={t} c={c} with {}", dataset.model_name);
            predict::predict_volume(model, &dataset.volume, t, c, |_, _, _| {}).map(
                |predictions| {
                    dataset.predictions = predictions;
                    dataset.timepoint = t;
                    dataset.channel = c;
                },
            )
        }
        None => return,
    };
    match result {
        Ok(()) => {
            state.touch();
            state.status_message = None;
        }
        Err(error) => {
            log::error!("segmentation failed: {error}");
            state.status_message = Some(format!("Error: {error}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(
    ui: &mut Ui,
    state: &mut AppState,
    model: &mut Option<StarConvexModel>,
    options: &mut PipelineOptions,
) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open local OME-Zarr…").clicked() {
                open_local_dialog(state, model, options);
                ui.close_menu();
            }
            if ui.button("Export planes…").clicked() {
                export_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();
        summary_label(ui, state);

        if let Some(message) = state.status_message.as_deref() {
            ui.separator();
            if message.starts_with("Error") {
                ui.label(RichText::new(message).color(Color32::RED));
            } else {
                ui.label(message);
            }
        }
    });
}

fn summary_label(ui: &mut Ui, state: &AppState) {
    let Some(dataset) = &state.dataset else {
        ui.weak("no dataset");
        return;
    };
    let dims = dataset.volume.dims();
    let curated = dataset
        .labels
        .as_ref()
        .map_or(0, |labels| labels.curated_count());
    ui.label(format!(
        "{}  |  {}x{} planes, z={} t={} c={}  |  {} curated  |  model {}",
        dataset.source, dims.y, dims.x, dims.z, dims.t, dims.c, curated, dataset.model_name
    ));
}

// ---------------------------------------------------------------------------
// Dialogs
// ---------------------------------------------------------------------------

/// Pick an OME-Zarr hierarchy on disk and run the pipeline on it.
fn open_local_dialog(
    state: &mut AppState,
    model: &mut Option<StarConvexModel>,
    options: &mut PipelineOptions,
) {
    let Some(model) = model.as_mut() else {
        state.status_message = Some("Error: no model loaded".to_string());
        return;
    };
    let Some(path) = rfd::FileDialog::new()
        .set_title("Open an OME-Zarr hierarchy")
        .pick_folder()
    else {
        return;
    };
    options.source = Source::Local {
        resolution: options.source.resolution(),
        path,
    };
    let progress = PipelineProgress::new(false);
    match pipeline::load_dataset(options, model, &progress) {
        Ok(dataset) => {
            log::info!("loaded {}", dataset.source);
            state.set_dataset(dataset);
        }
        Err(error) => {
            log::error!("failed to open hierarchy: {error:#}");
            state.status_message = Some(format!("Error: {error:#}"));
        }
    }
}

/// Pick a target directory and write the per-plane exports.
fn export_dialog(state: &mut AppState) {
    if state.dataset.is_none() {
        state.status_message = Some("Error: nothing to export".to_string());
        return;
    }
    let mut dialog = rfd::FileDialog::new().set_title("Export planes and summary");
    if let Some(last) = &state.export_dir {
        dialog = dialog.set_directory(last);
    }
    let Some(dir) = dialog.pick_folder() else {
        return;
    };
    let result = match &state.dataset {
        Some(dataset) => export::export_dataset(dataset, &dir),
        None => return,
    };
    match result {
        Ok(files) => {
            log::info!("exported {files} files to {}", dir.display());
            state.status_message = Some(format!("Exported {files} files to {}", dir.display()));
            state.export_dir = Some(dir);
        }
        Err(error) => {
            log::error!("export failed: {error}");
            state.status_message = Some(format!("Error: {error}"));
        }
    }
}
