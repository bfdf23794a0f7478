use eframe::egui::{self, ColorImage, Context, TextureHandle, TextureOptions, Ui};
use ndarray::ArrayView2;

use crate::color::label_color;
use crate::state::{AppState, ViewOptions};

// ---------------------------------------------------------------------------
// Plane rendering
// ---------------------------------------------------------------------------

fn finite_bounds(plane: &ArrayView2<'_, f32>) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in plane.iter() {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if min.is_finite() && max.is_finite() {
        (min, max)
    } else {
        (0.0, 1.0)
    }
}

/// Min-max windowed grayscale rendering of an intensity plane.
pub fn render_intensity(plane: &ArrayView2<'_, f32>) -> ColorImage {
    let (h, w) = plane.dim();
    let (min, max) = finite_bounds(plane);
    let range = (max - min).max(f32::EPSILON);
    let mut rgb = Vec::with_capacity(h * w * 3);
    for &v in plane.iter() {
        let gray = if v.is_finite() {
            (((v - min) / range).clamp(0.0, 1.0) * 255.0) as u8
        } else {
            0
        };
        rgb.extend_from_slice(&[gray, gray, gray]);
    }
    ColorImage::from_rgb([w, h], &rgb)
}

/// Colorized instance labels, optionally alpha-blended over the grayscale
/// intensity underlay. Background pixels show the underlay (or black).
pub fn render_labels(
    labels: &ArrayView2<'_, u32>,
    underlay: Option<&ArrayView2<'_, f32>>,
    opacity: f32,
) -> ColorImage {
    let (h, w) = labels.dim();
    let opacity = opacity.clamp(0.0, 1.0);
    let gray: Option<Vec<u8>> = underlay.map(|plane| {
        let (min, max) = finite_bounds(plane);
        let range = (max - min).max(f32::EPSILON);
        plane
            .iter()
            .map(|&v| {
                if v.is_finite() {
                    (((v - min) / range).clamp(0.0, 1.0) * 255.0) as u8
                } else {
                    0
                }
            })
            .collect()
    });

    let mut rgb = Vec::with_capacity(h * w * 3);
    for (index, &id) in labels.iter().enumerate() {
        let base = gray.as_ref().map_or(0, |g| g[index]);
        if id == 0 {
            rgb.extend_from_slice(&[base, base, base]);
        } else {
            let color = label_color(id);
            // opaque labels unless drawn over an underlay
            let alpha = if gray.is_some() { opacity } else { 1.0 };
            let blend = |channel: u8| {
                (f32::from(base) * (1.0 - alpha) + f32::from(channel) * alpha) as u8
            };
            rgb.extend_from_slice(&[blend(color.r()), blend(color.g()), blend(color.b())]);
        }
    }
    ColorImage::from_rgb([w, h], &rgb)
}

// ---------------------------------------------------------------------------
// Texture cache
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
struct CacheKey {
    t: usize,
    c: usize,
    z: usize,
    view: ViewOptions,
    revision: u64,
}

/// Textures for the slice on screen, rebuilt only when the cursor, overlay
/// options, or dataset change.
#[derive(Default)]
pub struct SliceCache {
    key: Option<CacheKey>,
    intensity: Option<TextureHandle>,
    curated: Option<TextureHandle>,
    predicted: Option<TextureHandle>,
}

impl SliceCache {
    pub fn curated(&self) -> Option<&TextureHandle> {
        self.curated.as_ref()
    }

    pub fn predicted(&self) -> Option<&TextureHandle> {
        self.predicted.as_ref()
    }

    pub fn intensity(&self) -> Option<&TextureHandle> {
        self.intensity.as_ref()
    }

    /// Rebuild textures if the cursor moved since the last frame.
    pub fn ensure(&mut self, ctx: &Context, state: &AppState) {
        let Some(dataset) = &state.dataset else {
            self.key = None;
            self.intensity = None;
            self.curated = None;
            self.predicted = None;
            return;
        };
        let key = CacheKey {
            t: state.cursor_t,
            c: state.cursor_c,
            z: state.cursor_z,
            view: state.view,
            revision: state.dataset_revision,
        };
        if self.key == Some(key) {
            return;
        }
        log::debug!(
            "rebuilding slice textures for t={} c={} z={}",
            key.t,
            key.c,
            key.z
        );

        let intensity_plane = dataset.volume.plane(key.t, key.c, key.z).ok();
        let underlay = if state.view.intensity_underlay {
            intensity_plane.as_ref()
        } else {
            None
        };

        self.intensity = intensity_plane
            .as_ref()
            .map(|plane| ctx.load_texture("intensity_slice", render_intensity(plane), TextureOptions::NEAREST));

        let curated_plane = dataset
            .labels
            .as_ref()
            .and_then(|labels| labels.plane(key.t, key.c, key.z).ok().flatten());
        self.curated = curated_plane.map(|plane| {
            ctx.load_texture(
                "curated_slice",
                render_labels(&plane, underlay, state.view.label_opacity),
                TextureOptions::NEAREST,
            )
        });

        let predicted_plane = state
            .view_matches_predictions()
            .then(|| dataset.predictions.plane(key.t, key.z))
            .flatten();
        self.predicted = predicted_plane.map(|plane| {
            ctx.load_texture(
                "predicted_slice",
                render_labels(&plane.labels.view(), underlay, state.view.label_opacity),
                TextureOptions::NEAREST,
            )
        });

        self.key = Some(key);
    }
}

// ---------------------------------------------------------------------------
// Central panel: the comparison panes
// ---------------------------------------------------------------------------

fn pane(
    ui: &mut Ui,
    title: &str,
    primary: Option<&TextureHandle>,
    fallback: Option<&TextureHandle>,
    note: &str,
) {
    ui.vertical_centered(|ui: &mut Ui| {
        ui.strong(title);
        if let Some(texture) = primary {
            ui.add(egui::Image::from_texture(texture).fit_to_exact_size(ui.available_size()));
        } else if let Some(texture) = fallback {
            ui.weak(note);
            ui.add(egui::Image::from_texture(texture).fit_to_exact_size(ui.available_size()));
        } else {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.label(note);
            });
        }
    });
}

/// Curated and predicted labels side by side for the current slice.
pub fn slice_pair(ui: &mut Ui, state: &AppState, cache: &SliceCache) {
    if state.dataset.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No dataset loaded  (File → Open local OME-Zarr…)");
        });
        return;
    }
    let z = state.cursor_z;
    let predicted_note = if state.view_matches_predictions() {
        format!("no prediction for plane z={z}")
    } else {
        "viewing a different timepoint/channel than was segmented".to_string()
    };
    ui.columns(2, |columns| {
        pane(
            &mut columns[0],
            "Curated",
            cache.curated(),
            cache.intensity(),
            &format!("no curated labels on plane z={z}"),
        );
        pane(
            &mut columns[1],
            "Predicted",
            cache.predicted(),
            cache.intensity(),
            &predicted_note,
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn intensity_windows_to_full_range() {
        let plane = array![[0.0_f32, 50.0], [100.0, 25.0]];
        let image = render_intensity(&plane.view());
        assert_eq!(image.size, [2, 2]);
        assert_eq!(image.pixels[0].r(), 0);
        assert_eq!(image.pixels[2].r(), 255);
        assert_eq!(image.pixels[1].r(), 127);
    }

    #[test]
    fn background_stays_black_without_underlay() {
        let labels = array![[0_u32, 3], [0, 3]];
        let image = render_labels(&labels.view(), None, 1.0);
        assert_eq!(image.pixels[0], eframe::egui::Color32::BLACK);
        assert_eq!(image.pixels[1], label_color(3));
    }

    #[test]
    fn underlay_shows_through_background() {
        let labels = array![[0_u32, 1]];
        let plane = array![[100.0_f32, 0.0]];
        let image = render_labels(&labels.view(), Some(&plane.view()), 0.5);
        // background takes the grayscale value
        assert_eq!(image.pixels[0].r(), 255);
        assert_eq!(image.pixels[0].g(), 255);
        // labelled pixel is a blend, not the pure label color
        assert_ne!(image.pixels[1], label_color(1));
    }
}
