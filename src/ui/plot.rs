use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, Line, Plot, PlotPoints, Points, VLine};

use crate::pipeline::object_counts;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Objects-per-plane summary plot
// ---------------------------------------------------------------------------

const CURATED_COLOR: Color32 = Color32::GOLD;
const PREDICTED_COLOR: Color32 = Color32::LIGHT_BLUE;

/// Object counts along z: curated planes as markers (curation is sparse),
/// predictions as a line, and the cursor as a vertical rule.
pub fn counts_plot(ui: &mut Ui, state: &AppState) {
    let Some(dataset) = &state.dataset else {
        return;
    };
    let rows = object_counts(dataset);

    let curated: PlotPoints = rows
        .iter()
        .filter_map(|row| row.curated.map(|n| [row.z as f64, n as f64]))
        .collect();
    let predicted: PlotPoints = rows
        .iter()
        .filter_map(|row| row.predicted.map(|n| [row.z as f64, n as f64]))
        .collect();

    Plot::new("counts_plot")
        .legend(Legend::default())
        .x_axis_label("z plane")
        .y_axis_label("objects")
        .height(180.0)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .allow_boxed_zoom(false)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(predicted)
                    .name("predicted")
                    .color(PREDICTED_COLOR)
                    .width(1.5),
            );
            plot_ui.points(
                Points::new(curated)
                    .name("curated")
                    .color(CURATED_COLOR)
                    .radius(3.0),
            );
            plot_ui.vline(VLine::new(state.cursor_z as f64).color(Color32::GRAY));
        });
}
