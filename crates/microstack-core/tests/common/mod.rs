#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::{Array2, Array3, Array4};

use microstack_core::annotation::{FontResolver, TextRasterizer};
use microstack_core::buffer::Buffer;
use microstack_core::error::Result;
use microstack_core::io::ser::SER_HEADER_SIZE;
use microstack_core::io::{Loaded, Loader, Persister, VideoEncoder};
use microstack_core::pipeline::{PipelineStage, ProgressReporter};

/// u8 stack whose samples vary with frame, row and column and never hit 0.
pub fn ramp_stack(frames: usize, height: usize, width: usize) -> Buffer {
    Buffer::U8(Array3::from_shape_fn((frames, height, width), |(f, r, c)| {
        ((f * 7 + r * 3 + c * 5) % 240 + 10) as u8
    }))
}

/// Stack where every sample of frame `i` equals `i + 1`.
pub fn numbered_stack(frames: usize, height: usize, width: usize) -> Buffer {
    Buffer::U8(Array3::from_shape_fn((frames, height, width), |(f, _, _)| {
        (f + 1) as u8
    }))
}

pub fn zeros_u8(frames: usize, height: usize, width: usize) -> Buffer {
    Buffer::U8(Array3::zeros((frames, height, width)))
}

pub fn frame_u8(buffer: &Buffer, index: usize) -> Array2<u8> {
    match buffer {
        Buffer::U8(a) => a.index_axis(ndarray::Axis(0), index).to_owned(),
        other => panic!("expected u8 buffer, got {}", other.element_type()),
    }
}

/// Build a SER file image with configurable bit depth and color mode.
pub fn build_ser(width: u32, height: u32, bit_depth: u32, color_id: i32, frames: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);

    // Magic (14 bytes)
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID (4 bytes)
    buf.extend_from_slice(&0i32.to_le_bytes());
    // ColorID (4 bytes)
    buf.extend_from_slice(&color_id.to_le_bytes());
    // LittleEndian = 0 (little-endian per Siril convention)
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(frames.len() as i32).to_le_bytes());
    // Observer (40 bytes)
    let mut observer = [0u8; 40];
    observer[..4].copy_from_slice(b"Test");
    buf.extend_from_slice(&observer);
    // Instrument, Telescope (40 bytes each)
    buf.extend_from_slice(&[0u8; 40]);
    buf.extend_from_slice(&[0u8; 40]);
    // DateTime, DateTimeUTC (8 bytes each)
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());
    assert_eq!(buf.len(), SER_HEADER_SIZE);

    for frame in frames {
        buf.extend_from_slice(frame);
    }
    buf
}

/// Every character is a solid `size` x `size` block.
pub struct BlockRasterizer;

impl TextRasterizer for BlockRasterizer {
    fn measure(&self, text: &str, size: u32) -> (usize, usize) {
        (text.chars().count() * size as usize, size as usize)
    }

    fn draw(&self, text: &str, size: u32, left: i64, top: i64, mask: &mut Array2<bool>) {
        let (w, h) = self.measure(text, size);
        let (rows, cols) = mask.dim();
        for r in top.max(0)..(top + h as i64).min(rows as i64) {
            for c in left.max(0)..(left + w as i64).min(cols as i64) {
                mask[[r as usize, c as usize]] = true;
            }
        }
    }
}

pub struct BlockFonts;

impl FontResolver for BlockFonts {
    fn resolve(&self, _name: &str) -> Result<Box<dyn TextRasterizer>> {
        Ok(Box::new(BlockRasterizer))
    }
}

/// Loader that hands out a fixed buffer whatever the path.
pub struct MemoryLoader(pub Buffer);

impl Loader for MemoryLoader {
    fn load(&self, _path: &Path) -> Result<Loaded> {
        Ok(Loaded::from_buffer(self.0.clone()))
    }
}

/// Persister that keeps everything it is given.
#[derive(Default)]
pub struct MemoryPersister {
    pub saved: Mutex<Vec<(PathBuf, Buffer)>>,
}

impl MemoryPersister {
    pub fn take(&self) -> Vec<(PathBuf, Buffer)> {
        std::mem::take(&mut *self.saved.lock().unwrap())
    }
}

impl Persister for MemoryPersister {
    fn persist(&self, buffer: &Buffer, path: &Path) -> Result<()> {
        self.saved
            .lock()
            .unwrap()
            .push((path.to_path_buf(), buffer.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEncoder {
    pub calls: Mutex<Vec<(PathBuf, (usize, usize, usize, usize), u32, String)>>,
}

impl VideoEncoder for RecordingEncoder {
    fn encode(&self, frames: &Array4<u8>, path: &Path, fps: u32, codec: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), frames.dim(), fps, codec.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub stages: Mutex<Vec<PipelineStage>>,
}

impl ProgressReporter for RecordingReporter {
    fn begin_stage(&self, stage: PipelineStage, _total_items: Option<usize>) {
        self.stages.lock().unwrap().push(stage);
    }
}
