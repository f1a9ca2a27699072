use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};
use plotters::style::RGBColor;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            to_rgb(rgb)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Diverging colour map for correlation heatmaps
// ---------------------------------------------------------------------------

const COOL: (u8, u8, u8) = (59, 76, 192);
const NEUTRAL: (u8, u8, u8) = (221, 221, 221);
const WARM: (u8, u8, u8) = (180, 4, 38);

/// Blue–grey–red map over `[-1, 1]`, mixed in linear RGB.
/// Undefined values map to the neutral colour.
pub fn diverging(value: f64) -> RGBColor {
    if value.is_nan() {
        return RGBColor(NEUTRAL.0, NEUTRAL.1, NEUTRAL.2);
    }
    let t = value.clamp(-1.0, 1.0) as f32;
    let (from, to, factor) = if t < 0.0 {
        (COOL, NEUTRAL, t + 1.0)
    } else {
        (NEUTRAL, WARM, t)
    };
    let mixed = linear(from).mix(linear(to), factor);
    to_rgb(Srgb::from_linear(mixed))
}

fn linear((r, g, b): (u8, u8, u8)) -> LinSrgb {
    Srgb::new(r, g, b).into_format::<f32>().into_linear()
}

fn to_rgb(rgb: Srgb) -> RGBColor {
    let rgb: Srgb<u8> = rgb.into_format();
    RGBColor(rgb.red, rgb.green, rgb.blue)
}
