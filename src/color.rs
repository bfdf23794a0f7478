use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Instance label colors
// ---------------------------------------------------------------------------

/// Deterministic color for an instance id.
///
/// Hues advance by the golden angle so neighbouring ids stay visually
/// distinct however many instances a plane holds; lightness cycles through
/// three bands to separate ids that land on similar hues. Id 0 is background
/// and is never colorized.
pub fn label_color(id: u32) -> Color32 {
    debug_assert_ne!(id, 0, "background has no color");
    let hue = (id as f32 * 137.508) % 360.0;
    let lightness = match id % 3 {
        0 => 0.65,
        1 => 0.55,
        _ => 0.45,
    };
    let hsl = Hsl::new(hue, 0.75, lightness);
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_deterministic() {
        assert_eq!(label_color(7), label_color(7));
        assert_eq!(label_color(10_000), label_color(10_000));
    }

    #[test]
    fn nearby_ids_get_distinct_colors() {
        let colors: Vec<Color32> = (1..=32).map(label_color).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
