//! Stateful wrapper over a loaded buffer.
//!
//! [`ImageStack`] keeps the committed source data next to a working copy and
//! applies the engines to them. Every operation validates before it touches
//! any field, so a failing call leaves the stack exactly as it was.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::annotation::{scale_bar, time_stamps, ScaleBarParams, TextRasterizer, TimeStampParams};
use crate::buffer::{Buffer, Calibration};
use crate::correction::{
    background_correction, do_contrast_correction, set_contrast_correction, BackgroundParams,
    ContrastMapping, ContrastParams,
};
use crate::crop::crop;
use crate::error::{MicroStackError, Result};
use crate::export::{convert_bit_depth, BitDepth, ExportOptions};
use crate::io::{save_image, save_video, Persister, VideoEncoder};
use crate::montage::{make_montage, MontageParams};

/// Name given to stacks built without one.
pub const UNTITLED: &str = "Untitled";

/// The frame currently selected for display.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayFrame {
    /// Frame as stored in the working buffer.
    pub raw: Buffer,
    /// `raw` with the armed contrast mapping applied, or a copy of `raw`.
    pub corrected: Buffer,
}

/// Derive the displayed frame `index` of `array`.
pub fn derive_frame(array: &Buffer, index: usize, memo: Option<&ContrastMapping>) -> Result<DisplayFrame> {
    let raw = array.frame(index)?;
    let corrected = match memo {
        Some(mapping) => do_contrast_correction(&raw, mapping)?,
        None => raw.clone(),
    };
    Ok(DisplayFrame { raw, corrected })
}

/// A named image or sequence with its processing state.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageStack {
    name: String,
    source: Buffer,
    array: Buffer,
    frame_index: usize,
    contrast: Option<ContrastMapping>,
    calibration: Calibration,
}

impl ImageStack {
    pub fn new(buffer: Buffer, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            array: buffer.clone(),
            source: buffer,
            frame_index: 0,
            contrast: None,
            calibration: Calibration::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last committed raw data.
    pub fn source(&self) -> &Buffer {
        &self.source
    }

    /// Working buffer with every applied correction and overlay.
    pub fn array(&self) -> &Buffer {
        &self.array
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn n_frames(&self) -> usize {
        self.array.n_frames()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn contrast_mapping(&self) -> Option<&ContrastMapping> {
        self.contrast.as_ref()
    }

    /// Replace the working buffer with the background-corrected source.
    pub fn background_correction(&mut self, params: &BackgroundParams) -> Result<()> {
        let corrected = background_correction(&self.source, params)?;
        info!(
            name = %self.name,
            average = %params.average,
            correction = %params.correction,
            "Background corrected"
        );
        self.array = corrected;
        Ok(())
    }

    /// Compute a contrast mapping from the displayed frame and arm it.
    ///
    /// The working buffer is left alone; the mapping is applied whenever
    /// [`frame`](Self::frame) is derived.
    pub fn contrast_correction(&mut self, params: &ContrastParams) -> Result<()> {
        let raw = self.array.frame(self.frame_index)?;
        let mapping = set_contrast_correction(&raw, params)?;
        mapping.validate()?;
        debug!(
            old_min = mapping.old.min,
            old_max = mapping.old.max,
            new_min = mapping.new.min,
            new_max = mapping.new.max,
            "Contrast mapping armed"
        );
        self.contrast = Some(mapping);
        Ok(())
    }

    /// Apply the armed contrast mapping to every frame of the working buffer
    /// and disarm it. Does nothing when no mapping is armed.
    pub fn commit_contrast(&mut self) -> Result<()> {
        let Some(mapping) = self.contrast else {
            return Ok(());
        };
        let corrected = do_contrast_correction(&self.array, &mapping)?;
        info!(
            name = %self.name,
            old_min = mapping.old.min,
            old_max = mapping.old.max,
            "Contrast applied to stack"
        );
        self.array = corrected;
        self.contrast = None;
        Ok(())
    }

    /// Drop every correction and overlay, and disarm the contrast mapping.
    pub fn reset(&mut self) {
        self.array = self.source.clone();
        self.contrast = None;
    }

    /// Update the calibration; `None` keeps the current value.
    pub fn set_scale(
        &mut self,
        space_unit: Option<&str>,
        space_scale: Option<f64>,
        time_unit: Option<&str>,
        time_scale: Option<f64>,
    ) -> Result<()> {
        for scale in [space_scale, time_scale].into_iter().flatten() {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(MicroStackError::InvalidParameter(format!(
                    "calibration scale must be positive, got {scale}"
                )));
            }
        }

        if let Some(unit) = space_unit {
            self.calibration.space_unit = unit.to_string();
        }
        if let Some(scale) = space_scale {
            self.calibration.space_scale = scale;
        }
        if let Some(unit) = time_unit {
            self.calibration.time_unit = unit.to_string();
        }
        if let Some(scale) = time_scale {
            self.calibration.time_scale = scale;
        }
        Ok(())
    }

    /// Replace the whole calibration.
    pub fn set_calibration(&mut self, calibration: Calibration) -> Result<()> {
        self.set_scale(
            Some(&calibration.space_unit),
            Some(calibration.space_scale),
            Some(&calibration.time_unit),
            Some(calibration.time_scale),
        )
    }

    /// Independent deep copy.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Keep frames `first..last` of both the source and the working buffer.
    ///
    /// `last` defaults to the frame count. The selected frame index is
    /// clamped into the new range.
    pub fn reduced_range(&mut self, first: usize, last: Option<usize>) -> Result<()> {
        self.source.require_sequence()?;
        let total = self.source.n_frames();
        let last = last.unwrap_or(total);
        if first >= last || last > total {
            return Err(MicroStackError::OutOfBounds(format!(
                "frame range {first}..{last} is not a non-empty range within 0..{total}"
            )));
        }

        self.source = self.source.slice_frames(first..last);
        self.array = self.array.slice_frames(first..last);
        self.frame_index = self.frame_index.min(last - first - 1);
        info!(first, last, frames = last - first, "Reduced frame range");
        Ok(())
    }

    /// Crop the source and the working buffer to the same `(x, y)` rectangle.
    pub fn crop(&mut self, top_left: (i64, i64), bottom_right: Option<(i64, i64)>) -> Result<()> {
        let source = crop(&self.source, top_left, bottom_right)?;
        let array = crop(&self.array, top_left, bottom_right)?;
        info!(
            height = array.height(),
            width = array.width(),
            "Cropped stack"
        );
        self.source = source;
        self.array = array;
        Ok(())
    }

    /// Burn a scale bar into every frame, or into `frame` only.
    pub fn scale_bar(
        &mut self,
        params: &ScaleBarParams,
        frame: Option<usize>,
        rasterizer: Option<&dyn TextRasterizer>,
    ) -> Result<()> {
        self.array = scale_bar(&self.array, &self.calibration, params, frame, rasterizer)?;
        Ok(())
    }

    /// Burn the elapsed time into each frame.
    pub fn time_stamps(&mut self, params: &TimeStampParams, rasterizer: &dyn TextRasterizer) -> Result<()> {
        self.array = time_stamps(&self.array, &self.calibration, params, rasterizer)?;
        Ok(())
    }

    /// Select the displayed frame of a sequence.
    pub fn set_frame(&mut self, index: usize) -> Result<()> {
        self.source.require_sequence()?;
        let total = self.array.n_frames();
        if index >= total {
            return Err(MicroStackError::IndexOutOfRange { index, total });
        }
        self.frame_index = index;
        Ok(())
    }

    /// The displayed frame, derived from the current working buffer.
    pub fn frame(&self) -> Result<DisplayFrame> {
        derive_frame(&self.array, self.frame_index, self.contrast.as_ref())
    }

    /// Displayed frame normalized for export.
    pub fn export_frame(&self, save_raw: bool, bit_depth: BitDepth, rescale: bool) -> Result<Buffer> {
        let frame = self.frame()?;
        let selected = if save_raw { frame.raw } else { frame.corrected };
        convert_bit_depth(&selected, bit_depth, rescale)
    }

    /// Whole stack normalized for export; `save_raw` picks the source data.
    pub fn export_stack(&self, save_raw: bool, bit_depth: BitDepth, rescale: bool) -> Result<Buffer> {
        let selected = if save_raw { &self.source } else { &self.array };
        convert_bit_depth(selected, bit_depth, rescale)
    }

    /// Montage of the working buffer, normalized for export.
    pub fn export_montage(&self, params: &MontageParams, bit_depth: BitDepth, rescale: bool) -> Result<Buffer> {
        let montage = make_montage(&self.array, params)?;
        convert_bit_depth(&montage, bit_depth, rescale)
    }

    /// `<stem>[_<frame>]_saved`, where `stem` is the name without its extension.
    pub fn default_save_name(&self, frame: Option<usize>) -> String {
        let stem = Path::new(&self.name).with_extension("");
        let mut name = stem.to_string_lossy().into_owned();
        if let Some(frame) = frame {
            name.push_str(&format!("_{frame}"));
        }
        name.push_str("_saved");
        name
    }

    /// Save the displayed frame. The default name carries the 1-based frame number.
    pub fn save_frame(&self, persister: &dyn Persister, path: Option<&Path>, options: &ExportOptions) -> Result<PathBuf> {
        let path = self.output_path(path, Some(self.frame_index + 1));
        let frame = self.frame()?;
        let selected = if options.save_raw { frame.raw } else { frame.corrected };
        save_image(persister, &selected, &path, &options.extension, options.bit_depth, options.rescale)
    }

    pub fn save_stack(&self, persister: &dyn Persister, path: Option<&Path>, options: &ExportOptions) -> Result<PathBuf> {
        let path = self.output_path(path, None);
        let selected = if options.save_raw { &self.source } else { &self.array };
        save_image(persister, selected, &path, &options.extension, options.bit_depth, options.rescale)
    }

    /// Save a montage of the working buffer, by default as `<stem>_montage`.
    pub fn save_montage(
        &self,
        persister: &dyn Persister,
        path: Option<&Path>,
        params: &MontageParams,
        options: &ExportOptions,
    ) -> Result<PathBuf> {
        let montage = make_montage(&self.array, params)?;
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let stem = Path::new(&self.name).with_extension("");
                PathBuf::from(format!("{}_montage", stem.to_string_lossy()))
            }
        };
        save_image(persister, &montage, &path, &options.extension, options.bit_depth, options.rescale)
    }

    /// Encode the working buffer as a video, by default as `<stem>_saved.mp4`.
    pub fn save_video(
        &self,
        encoder: &dyn VideoEncoder,
        path: Option<&Path>,
        fps: u32,
        codec: &str,
    ) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(format!("{}.mp4", self.default_save_name(None))),
        };
        save_video(encoder, &self.array, &path, fps, codec)?;
        Ok(path)
    }

    fn output_path(&self, path: Option<&Path>, frame: Option<usize>) -> PathBuf {
        path.map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(self.default_save_name(frame)))
    }
}
