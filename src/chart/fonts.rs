use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use plotters::style::{FontStyle, register_font};

/// Family name every chart label is drawn with.
pub const FAMILY: &str = "sans-serif";

const CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Outcome of the last registration and the preferred path it was made for.
#[derive(Debug, Clone, PartialEq)]
struct Registration {
    preferred: Option<PathBuf>,
    available: bool,
}

static REGISTERED: Mutex<Option<Registration>> = Mutex::new(None);

/// Register a font for chart text.
///
/// `preferred` is tried before the well-known system locations. The result
/// is cached until a call asks for a different preferred font. Returns
/// whether text can be drawn.
pub fn text_available(preferred: Option<&Path>) -> bool {
    let mut registered = REGISTERED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(current) = registered.as_ref().filter(|r| r.preferred.as_deref() == preferred) {
        return current.available;
    }

    let available = register(preferred);
    *registered = Some(Registration {
        preferred: preferred.map(Path::to_path_buf),
        available,
    });
    available
}

fn register(preferred: Option<&Path>) -> bool {
    for path in candidates(preferred) {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        // plotters keeps registered font data for the life of the process.
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        if register_font(FAMILY, FontStyle::Normal, bytes).is_ok() {
            log::debug!("Chart font: {}", path.display());
            return true;
        }
        log::warn!("Ignoring unusable font {}", path.display());
    }

    log::warn!("No usable TrueType font found; charts are drawn without text");
    false
}

fn candidates(preferred: Option<&Path>) -> impl Iterator<Item = PathBuf> {
    preferred
        .map(Path::to_path_buf)
        .into_iter()
        .chain(CANDIDATES.iter().map(PathBuf::from))
}
