/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Default symmetric percentile clip for contrast correction (percent).
pub const DEFAULT_CONTRAST_PERCENTILE: f64 = 10.0;

/// Default distance in pixels between an annotation and the image border.
pub const DEFAULT_PADDING: usize = 10;

/// Default scale bar thickness in pixels.
pub const DEFAULT_BAR_THICKNESS: usize = 20;

/// Default scale bar length, in calibrated space units.
pub const DEFAULT_SCALE_LENGTH: f64 = 10.0;

/// Logical font name used when none is configured.
pub const DEFAULT_FONT: &str = "Arial.ttf";

/// Font directories searched after the configured ones.
pub const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/Library/Fonts",
    "/System/Library/Fonts",
    "C:\\Windows\\Fonts",
];

/// Upper bound for the dynamic font-size search.
pub const MAX_FONT_SIZE: u32 = 1024;

/// Glyph coverage at or above which a pixel belongs to the text mask.
pub const GLYPH_COVERAGE_THRESHOLD: f32 = 0.5;

/// Default space unit; bar lengths in this unit are already in pixels.
pub const PIXEL_UNIT: &str = "px";

/// Default time unit.
pub const FRAME_UNIT: &str = "frame";

/// Default extension appended to output paths that have none.
pub const DEFAULT_EXTENSION: &str = "tif";

/// Extensions accepted by the loader.
pub const LOADABLE_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "bmp", "gif", "jpg", "ser"];

/// Extensions accepted for single-frame output.
pub const FRAME_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "bmp", "jpg"];

/// Extensions accepted for multi-frame output.
pub const STACK_EXTENSIONS: &[&str] = &["tif", "tiff", "gif", "ser"];

/// Extensions accepted for video output.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4"];

/// Default video frame rate.
pub const DEFAULT_FPS: u32 = 25;

/// Default video codec handed to the encoder.
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";

/// Number of channels produced for video export (R, G, B).
pub const RGB_CHANNEL_COUNT: usize = 3;
