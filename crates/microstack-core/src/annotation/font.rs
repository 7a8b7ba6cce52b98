use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use ndarray::Array2;
use tracing::debug;

use crate::consts::{GLYPH_COVERAGE_THRESHOLD, MAX_FONT_SIZE, SYSTEM_FONT_DIRS};
use crate::error::{MicroStackError, Result};

/// Measures and draws text as a binary mask.
pub trait TextRasterizer: Send + Sync {
    /// Pixel `(width, height)` of `text` rendered at `size`.
    fn measure(&self, text: &str, size: u32) -> (usize, usize);

    /// Set every mask pixel covered by `text`, whose box starts at `(left, top)`.
    /// Pixels falling outside the mask are dropped.
    fn draw(&self, text: &str, size: u32, left: i64, top: i64, mask: &mut Array2<bool>);
}

/// Maps a logical font name to a rasterizer.
pub trait FontResolver {
    fn resolve(&self, name: &str) -> Result<Box<dyn TextRasterizer>>;
}

/// Largest font size whose rendered width stays strictly below `limit`.
///
/// Returns 0 when not even size 1 fits.
pub fn fit_font_size(rasterizer: &dyn TextRasterizer, text: &str, limit: usize) -> u32 {
    let mut size = 1;
    while size <= MAX_FONT_SIZE && rasterizer.measure(text, size).0 < limit {
        size += 1;
    }
    size - 1
}

/// Render `text` into a fresh `(height, width)` mask.
pub fn render_text_mask(
    rasterizer: &dyn TextRasterizer,
    text: &str,
    size: u32,
    left: i64,
    top: i64,
    shape: (usize, usize),
) -> Array2<bool> {
    let mut mask = Array2::from_elem(shape, false);
    rasterizer.draw(text, size, left, top, &mut mask);
    mask
}

/// TrueType/OpenType rasterizer backed by `ab_glyph`.
pub struct GlyphRasterizer {
    font: FontVec,
}

impl GlyphRasterizer {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(data).map_err(|e| MicroStackError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Positioned glyphs for one line of text plus its pixel width and height.
    fn layout(&self, text: &str, size: u32) -> (Vec<Glyph>, f32, f32) {
        let scaled = self.font.as_scaled(PxScale::from(size as f32));
        let mut caret = 0.0f32;
        let mut previous = None;
        let mut glyphs = Vec::with_capacity(text.len());

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push(id.with_scale_and_position(scaled.scale(), point(caret, scaled.ascent())));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }

        (glyphs, caret, scaled.ascent() - scaled.descent())
    }
}

impl TextRasterizer for GlyphRasterizer {
    fn measure(&self, text: &str, size: u32) -> (usize, usize) {
        let (_, width, height) = self.layout(text, size);
        (width.ceil() as usize, height.ceil() as usize)
    }

    fn draw(&self, text: &str, size: u32, left: i64, top: i64, mask: &mut Array2<bool>) {
        let (h, w) = mask.dim();
        let (glyphs, _, _) = self.layout(text, size);

        for glyph in glyphs {
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                if coverage < GLYPH_COVERAGE_THRESHOLD {
                    return;
                }
                let col = left + bounds.min.x as i64 + gx as i64;
                let row = top + bounds.min.y as i64 + gy as i64;
                if row >= 0 && col >= 0 && (row as usize) < h && (col as usize) < w {
                    mask[[row as usize, col as usize]] = true;
                }
            });
        }
    }
}

/// Resolves fonts by searching directories for a file whose name contains
/// the logical font name.
#[derive(Clone, Debug, Default)]
pub struct FontDirectoryResolver {
    dirs: Vec<PathBuf>,
}

impl FontDirectoryResolver {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// `dirs` followed by the usual system font locations.
    pub fn with_system_dirs(dirs: Vec<PathBuf>) -> Self {
        let mut all = dirs;
        all.extend(SYSTEM_FONT_DIRS.iter().map(PathBuf::from));
        Self { dirs: all }
    }

    /// First matching font file, searching each directory tree in order.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.dirs.iter().find_map(|dir| find_in_dir(dir, name))
    }
}

impl FontResolver for FontDirectoryResolver {
    fn resolve(&self, name: &str) -> Result<Box<dyn TextRasterizer>> {
        let path = self.find(name).ok_or_else(|| {
            MicroStackError::Font(format!("no font matching '{name}' in {:?}", self.dirs))
        })?;
        debug!(font = %path.display(), "Resolved font");
        Ok(Box::new(GlyphRasterizer::from_path(&path)?))
    }
}

fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    let file_match = entries.iter().find(|p| {
        p.is_file()
            && p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(name))
    });
    if let Some(found) = file_match {
        return Some(found.clone());
    }

    entries
        .iter()
        .filter(|p| p.is_dir())
        .find_map(|sub| find_in_dir(sub, name))
}
