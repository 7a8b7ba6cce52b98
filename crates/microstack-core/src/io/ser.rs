use std::fs::File;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::{Array2, Array3};

use crate::buffer::{Buffer, ElementType};
use crate::error::{MicroStackError, Result};

pub const SER_HEADER_SIZE: usize = 178;
pub const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

/// SER color identifiers that carry three interleaved planes.
const SER_COLOR_RGB: i32 = 100;
const SER_COLOR_BGR: i32 = 101;

/// SER file header (178 bytes).
#[derive(Clone, Debug)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
    pub observer: String,
    pub instrument: String,
    pub telescope: String,
    pub date_time: u64,
    pub date_time_utc: u64,
}

impl SerHeader {
    /// Header for a mono stack of the given shape and element type.
    pub fn mono(frames: usize, height: usize, width: usize, element: ElementType) -> Result<Self> {
        let pixel_depth = match element {
            ElementType::U8 => 8,
            ElementType::U16 => 16,
            ElementType::F32 => {
                return Err(MicroStackError::UnsupportedFormat(
                    "SER stacks must be 8 or 16-bit".into(),
                ))
            }
        };
        Ok(Self {
            color_id: 0,
            little_endian: true,
            width: width as u32,
            height: height as u32,
            pixel_depth,
            frame_count: frames as u32,
            observer: String::new(),
            instrument: String::new(),
            telescope: String::new(),
            date_time: 0,
            date_time_utc: 0,
        })
    }

    /// Bytes per pixel plane (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_pixel_plane(&self) -> usize {
        if self.pixel_depth <= 8 { 1 } else { 2 }
    }

    /// Number of planes per pixel (1 for mono/bayer, 3 for RGB/BGR).
    pub fn planes_per_pixel(&self) -> usize {
        match self.color_id {
            SER_COLOR_RGB | SER_COLOR_BGR => 3,
            _ => 1,
        }
    }

    /// Total bytes per frame, `None` on overflow.
    pub fn frame_byte_size(&self) -> Option<usize> {
        let pixels = (self.width as usize).checked_mul(self.height as usize)?;
        pixels.checked_mul(self.bytes_per_pixel_plane() * self.planes_per_pixel())
    }
}

/// Memory-mapped SER file reader.
pub struct SerReader {
    mmap: Mmap,
    frame_bytes: usize,
    pub header: SerHeader,
}

impl SerReader {
    /// Open a SER file and parse its header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only and lives as long as the reader.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SER_HEADER_SIZE {
            return Err(MicroStackError::InvalidSer(
                "File too small for SER header".into(),
            ));
        }

        if &mmap[0..14] != SER_MAGIC {
            return Err(MicroStackError::InvalidSer(
                "Missing LUCAM-RECORDER magic".into(),
            ));
        }

        let header = parse_header(&mmap[..SER_HEADER_SIZE])?;
        let frame_bytes = header
            .frame_byte_size()
            .ok_or_else(|| MicroStackError::InvalidSer("Frame size overflow".into()))?;

        let expected_data_size = SER_HEADER_SIZE + frame_bytes * header.frame_count as usize;
        if mmap.len() < expected_data_size {
            return Err(MicroStackError::InvalidSer(format!(
                "File truncated: expected at least {} bytes, got {}",
                expected_data_size,
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            frame_bytes,
            header,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Get the raw bytes for a single frame (zero-copy from mmap).
    pub fn frame_raw(&self, index: usize) -> Result<&[u8]> {
        let count = self.frame_count();
        if index >= count {
            return Err(MicroStackError::IndexOutOfRange {
                index,
                total: count,
            });
        }
        let offset = SER_HEADER_SIZE + index * self.frame_bytes;
        Ok(&self.mmap[offset..offset + self.frame_bytes])
    }

    /// Decode every frame into one buffer, keeping the stored bit depth.
    ///
    /// Colour files contribute their green plane.
    pub fn read_buffer(&self) -> Result<Buffer> {
        let n = self.frame_count();
        if n == 0 {
            return Err(MicroStackError::EmptySequence);
        }
        let h = self.header.height as usize;
        let w = self.header.width as usize;
        let planes = self.header.planes_per_pixel();
        let plane = if planes == 1 { 0 } else { 1 };

        if self.header.bytes_per_pixel_plane() == 1 {
            let mut data = Array3::<u8>::zeros((n, h, w));
            for i in 0..n {
                let raw = self.frame_raw(i)?;
                for ((row, col), px) in data.index_axis_mut(ndarray::Axis(0), i).indexed_iter_mut() {
                    *px = raw[(row * w + col) * planes + plane];
                }
            }
            Ok(Buffer::U8(data))
        } else {
            let mut data = Array3::<u16>::zeros((n, h, w));
            for i in 0..n {
                let raw = self.frame_raw(i)?;
                data.index_axis_mut(ndarray::Axis(0), i)
                    .assign(&decode_u16_plane(raw, h, w, planes, plane, self.header.little_endian));
            }
            Ok(Buffer::U16(data))
        }
    }
}

fn parse_header(buf: &[u8]) -> Result<SerHeader> {
    let mut cursor = std::io::Cursor::new(&buf[14..]); // skip magic

    let _lu_id = cursor.read_i32::<LittleEndian>()?;
    let color_id = cursor.read_i32::<LittleEndian>()?;
    let le_flag = cursor.read_i32::<LittleEndian>()?;
    let width = cursor.read_i32::<LittleEndian>()? as u32;
    let height = cursor.read_i32::<LittleEndian>()? as u32;
    let pixel_depth = cursor.read_i32::<LittleEndian>()? as u32;
    let frame_count = cursor.read_i32::<LittleEndian>()? as u32;

    let observer = read_fixed_string(&buf[42..82]);
    let instrument = read_fixed_string(&buf[82..122]);
    let telescope = read_fixed_string(&buf[122..162]);

    let mut cursor = std::io::Cursor::new(&buf[162..]);
    let date_time = cursor.read_u64::<LittleEndian>()?;
    let date_time_utc = cursor.read_u64::<LittleEndian>()?;

    if width == 0 || height == 0 {
        return Err(MicroStackError::InvalidSer(format!(
            "Invalid image dimensions: {width}x{height}"
        )));
    }
    if pixel_depth == 0 || pixel_depth > 16 {
        return Err(MicroStackError::InvalidSer(format!(
            "Unsupported pixel depth: {pixel_depth}"
        )));
    }

    // Follow Siril's convention: treat 0 as little-endian.
    let little_endian = le_flag != 1;

    Ok(SerHeader {
        color_id,
        little_endian,
        width,
        height,
        pixel_depth,
        frame_count,
        observer,
        instrument,
        telescope,
        date_time,
        date_time_utc,
    })
}

fn read_fixed_string(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

fn decode_u16_plane(
    raw: &[u8],
    height: usize,
    width: usize,
    planes: usize,
    plane_index: usize,
    little_endian: bool,
) -> Array2<u16> {
    Array2::from_shape_fn((height, width), |(row, col)| {
        let idx = ((row * width + col) * planes + plane_index) * 2;
        let pair = [raw[idx], raw[idx + 1]];
        if little_endian {
            u16::from_le_bytes(pair)
        } else {
            u16::from_be_bytes(pair)
        }
    })
}
