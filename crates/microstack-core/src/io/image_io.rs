use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, DynamicImage, ImageBuffer, Luma};
use ndarray::{Array2, ArrayView2, Axis};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::ColorType;
use tracing::{debug, info};

use crate::buffer::{Buffer, ElementType};
use crate::consts::{FRAME_EXTENSIONS, LOADABLE_EXTENSIONS, STACK_EXTENSIONS};
use crate::error::{MicroStackError, Result};
use crate::io::ser::SerReader;
use crate::io::ser_writer::write_ser;
use crate::io::{check_extension, extension_of, Loaded, Loader, Persister};

/// Loads single images, multi-page TIFF, GIF animations, SER files, and folders of images.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageLoader;

impl Loader for ImageLoader {
    fn load(&self, path: &Path) -> Result<Loaded> {
        let buffer = if path.is_dir() {
            load_folder(path)?
        } else if path.is_file() {
            load_file(path)?
        } else {
            return Err(MicroStackError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is neither a file nor a directory", path.display()),
            )));
        };

        let (frames, height, width) = buffer.dim();
        info!(
            path = %path.display(),
            frames,
            height,
            width,
            dtype = %buffer.element_type(),
            "Loaded image data"
        );
        Ok(Loaded::from_buffer(buffer))
    }
}

/// Writes 8/16-bit buffers: single frames through `image`, stacks as
/// multi-page TIFF, GIF or SER.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImagePersister;

impl Persister for ImagePersister {
    fn persist(&self, buffer: &Buffer, path: &Path) -> Result<()> {
        if buffer.is_sequence() {
            match check_extension(path, STACK_EXTENSIONS)?.as_str() {
                "gif" => save_gif(buffer, path),
                "ser" => write_ser(buffer, path),
                _ => save_tiff_stack(buffer, path),
            }
        } else {
            check_extension(path, FRAME_EXTENSIONS)?;
            save_frame(buffer, path)
        }
    }
}

fn load_file(path: &Path) -> Result<Buffer> {
    match check_extension(path, LOADABLE_EXTENSIONS)?.as_str() {
        "ser" => SerReader::open(path)?.read_buffer(),
        "gif" => load_gif(path),
        "tif" | "tiff" => load_tiff(path),
        _ => decode_image(image::open(path)?),
    }
}

/// Every file in `dir` sharing the extension of the first loadable one, in name order.
fn load_folder(dir: &Path) -> Result<Buffer> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| check_extension(p, LOADABLE_EXTENSIONS).is_ok())
        .collect();
    files.sort();

    let extension = files
        .first()
        .and_then(|p| extension_of(p))
        .ok_or(MicroStackError::EmptySequence)?;
    files.retain(|p| extension_of(p).as_deref() == Some(extension.as_str()));

    debug!(dir = %dir.display(), files = files.len(), %extension, "Loading folder");

    let parts = files
        .iter()
        .map(|p| load_file(p))
        .collect::<Result<Vec<_>>>()?;
    Buffer::concat(&parts)
}

fn load_gif(path: &Path) -> Result<Buffer> {
    let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
    let frames = decoder.into_frames().collect_frames()?;
    let grays = frames
        .into_iter()
        .map(|frame| {
            let gray = DynamicImage::ImageRgba8(frame.into_buffer()).to_luma8();
            to_array(gray.width(), gray.height(), gray.into_raw())
        })
        .collect::<Result<Vec<_>>>()?;
    Buffer::from_frames(&grays)
}

/// Every page of a grayscale TIFF; colour files fall back to their first page.
fn load_tiff(path: &Path) -> Result<Buffer> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    if !matches!(decoder.colortype()?, ColorType::Gray(_)) {
        return decode_image(image::open(path)?);
    }

    let mut pages = Vec::new();
    loop {
        let (width, height) = decoder.dimensions()?;
        let page = match decoder.read_image()? {
            DecodingResult::U8(raw) => Buffer::single(to_array(width, height, raw)?),
            DecodingResult::U16(raw) => Buffer::single(to_array(width, height, raw)?),
            DecodingResult::F32(raw) => Buffer::single(to_array(width, height, raw)?),
            _ => {
                return Err(MicroStackError::UnsupportedFormat(format!(
                    "{}: only 8-bit, 16-bit and float grayscale TIFF pages are supported",
                    path.display()
                )))
            }
        };
        pages.push(page);

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    debug!(path = %path.display(), pages = pages.len(), "Decoded TIFF");
    Buffer::concat(&pages)
}

/// Decode to the narrowest grayscale type that keeps the stored precision.
fn decode_image(img: DynamicImage) -> Result<Buffer> {
    let buffer = match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
            let gray = img.to_luma8();
            Buffer::single(to_array(gray.width(), gray.height(), gray.into_raw())?)
        }
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            let gray = img.to_luma32f();
            Buffer::single(to_array(gray.width(), gray.height(), gray.into_raw())?)
        }
        _ => {
            let gray = img.to_luma16();
            Buffer::single(to_array(gray.width(), gray.height(), gray.into_raw())?)
        }
    };
    Ok(buffer)
}

fn to_array<T>(width: u32, height: u32, raw: Vec<T>) -> Result<Array2<T>> {
    Array2::from_shape_vec((height as usize, width as usize), raw)
        .map_err(|e| MicroStackError::InvalidParameter(format!("decoded pixel buffer: {e}")))
}

fn save_frame(buffer: &Buffer, path: &Path) -> Result<()> {
    match buffer {
        Buffer::U8(data) => gray_image(data.index_axis(Axis(0), 0))?.save(path)?,
        Buffer::U16(data) => gray_image(data.index_axis(Axis(0), 0))?.save(path)?,
        Buffer::F32(_) => {
            return Err(MicroStackError::UnsupportedFormat(
                "float frames must be converted to 8 or 16-bit before saving".into(),
            ))
        }
    }
    debug!(path = %path.display(), "Frame written");
    Ok(())
}

fn save_gif(buffer: &Buffer, path: &Path) -> Result<()> {
    let Buffer::U8(data) = buffer else {
        return Err(MicroStackError::UnsupportedFormat(
            "GIF animations can only be saved in 8 bits".into(),
        ));
    };

    let frames = data
        .axis_iter(Axis(0))
        .map(|frame| {
            let rgba = DynamicImage::ImageLuma8(gray_image(frame)?).to_rgba8();
            Ok(image::Frame::new(rgba))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut encoder = GifEncoder::new(File::create(path)?);
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(frames)?;
    debug!(path = %path.display(), frames = data.len_of(Axis(0)), "Animation written");
    Ok(())
}

fn save_tiff_stack(buffer: &Buffer, path: &Path) -> Result<()> {
    if buffer.element_type() == ElementType::F32 {
        return Err(MicroStackError::UnsupportedFormat(
            "TIFF stacks must be converted to 8 or 16-bit before saving".into(),
        ));
    }
    let (n, h, w) = buffer.dim();
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    match buffer {
        Buffer::U8(data) => {
            for frame in data.axis_iter(Axis(0)) {
                let pixels: Vec<u8> = frame.iter().copied().collect();
                encoder.write_image::<colortype::Gray8>(w as u32, h as u32, &pixels)?;
            }
        }
        Buffer::U16(data) => {
            for frame in data.axis_iter(Axis(0)) {
                let pixels: Vec<u16> = frame.iter().copied().collect();
                encoder.write_image::<colortype::Gray16>(w as u32, h as u32, &pixels)?;
            }
        }
        Buffer::F32(_) => {
            return Err(MicroStackError::UnsupportedFormat(
                "TIFF stacks must be converted to 8 or 16-bit before saving".into(),
            ))
        }
    }
    debug!(path = %path.display(), frames = n, "TIFF stack written");
    Ok(())
}

fn gray_image<T>(frame: ArrayView2<'_, T>) -> Result<ImageBuffer<Luma<T>, Vec<T>>>
where
    T: image::Primitive,
    Luma<T>: image::Pixel<Subpixel = T>,
{
    let (h, w) = frame.dim();
    let pixels: Vec<T> = frame.iter().copied().collect();
    ImageBuffer::from_raw(w as u32, h as u32, pixels).ok_or_else(|| {
        MicroStackError::InvalidParameter(format!("pixel count does not match {w}x{h}"))
    })
}
