use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::Axis;

use crate::buffer::Buffer;
use crate::error::{MicroStackError, Result};
use crate::io::ser::{SerHeader, SER_HEADER_SIZE, SER_MAGIC};

/// Writes a valid SER file at the raw byte level.
pub struct SerWriter {
    writer: BufWriter<File>,
    frame_bytes: usize,
    frames_written: u32,
}

impl SerWriter {
    /// Create a new SER file and write the header.
    pub fn create(path: &Path, header: &SerHeader) -> Result<Self> {
        let frame_bytes = header
            .frame_byte_size()
            .ok_or_else(|| MicroStackError::InvalidSer("Frame size overflow".into()))?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, header)?;
        Ok(Self {
            writer,
            frame_bytes,
            frames_written: 0,
        })
    }

    /// Write a single raw frame (bytes must match the header's frame size).
    pub fn write_raw_frame(&mut self, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), self.frame_bytes);
        self.writer.write_all(data)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush and finalize the file.
    pub fn finalize(mut self) -> Result<u32> {
        self.writer.flush()?;
        Ok(self.frames_written)
    }
}

/// Write an 8 or 16-bit buffer as a mono little-endian SER stack.
pub fn write_ser(buffer: &Buffer, path: &Path) -> Result<()> {
    let (n, h, w) = buffer.dim();
    let header = SerHeader::mono(n, h, w, buffer.element_type())?;
    let mut writer = SerWriter::create(path, &header)?;

    match buffer {
        Buffer::U8(data) => {
            for frame in data.axis_iter(Axis(0)) {
                let bytes: Vec<u8> = frame.iter().copied().collect();
                writer.write_raw_frame(&bytes)?;
            }
        }
        Buffer::U16(data) => {
            for frame in data.axis_iter(Axis(0)) {
                let bytes: Vec<u8> = frame.iter().flat_map(|v| v.to_le_bytes()).collect();
                writer.write_raw_frame(&bytes)?;
            }
        }
        Buffer::F32(_) => {
            return Err(MicroStackError::UnsupportedFormat(
                "SER stacks must be 8 or 16-bit".into(),
            ))
        }
    }

    writer.finalize()?;
    Ok(())
}

fn write_header(w: &mut impl Write, header: &SerHeader) -> Result<()> {
    // Magic (14 bytes)
    w.write_all(SER_MAGIC)?;
    // LuID (4 bytes)
    w.write_all(&0i32.to_le_bytes())?;
    // ColorID (4 bytes)
    w.write_all(&header.color_id.to_le_bytes())?;
    // LittleEndian flag: 0 = little-endian (Siril convention)
    let le_flag: i32 = if header.little_endian { 0 } else { 1 };
    w.write_all(&le_flag.to_le_bytes())?;
    w.write_all(&(header.width as i32).to_le_bytes())?;
    w.write_all(&(header.height as i32).to_le_bytes())?;
    w.write_all(&(header.pixel_depth as i32).to_le_bytes())?;
    w.write_all(&(header.frame_count as i32).to_le_bytes())?;
    // Observer, Instrument, Telescope (40 bytes each)
    write_fixed_string(w, &header.observer, 40)?;
    write_fixed_string(w, &header.instrument, 40)?;
    write_fixed_string(w, &header.telescope, 40)?;
    // DateTime, DateTimeUTC (8 bytes each)
    w.write_all(&header.date_time.to_le_bytes())?;
    w.write_all(&header.date_time_utc.to_le_bytes())?;

    debug_assert_eq!(
        14 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 40 + 40 + 40 + 8 + 8,
        SER_HEADER_SIZE
    );
    Ok(())
}

fn write_fixed_string(w: &mut impl Write, s: &str, len: usize) -> Result<()> {
    let bytes = s.as_bytes();
    let to_write = bytes.len().min(len);
    w.write_all(&bytes[..to_write])?;
    w.write_all(&vec![0u8; len - to_write])?;
    Ok(())
}
