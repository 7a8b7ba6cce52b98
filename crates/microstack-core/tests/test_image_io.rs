mod common;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use ndarray::{Array2, Array3};
use tiff::encoder::{colortype, TiffEncoder};

use common::{build_ser, MemoryPersister};
use microstack_core::buffer::{Buffer, ElementType};
use microstack_core::error::MicroStackError;
use microstack_core::export::BitDepth;
use microstack_core::io::ser::SerReader;
use microstack_core::io::ser_writer::write_ser;
use microstack_core::io::{save_image, ImageLoader, ImagePersister, Loaded, Loader, Persister};

fn load(path: &Path) -> Loaded {
    ImageLoader.load(path).unwrap()
}

// ---------------------------------------------------------------------------
// SER
// ---------------------------------------------------------------------------

#[test]
fn test_ser_8bit_mono() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono8.ser");
    let frames = vec![vec![1u8, 2, 3, 4, 5, 6], vec![7u8, 8, 9, 10, 11, 12]];
    fs::write(&path, build_ser(3, 2, 8, 0, &frames)).unwrap();

    let reader = SerReader::open(&path).unwrap();
    assert_eq!(reader.frame_count(), 2);
    assert_eq!(reader.header.observer, "Test");

    let Loaded::MultiFrame(buffer) = load(&path) else {
        panic!("two-frame SER should load as a sequence");
    };
    assert_eq!(buffer.dim(), (2, 2, 3));
    let Buffer::U8(data) = buffer else {
        panic!("8-bit SER should decode to u8");
    };
    assert_eq!(data[[0, 1, 2]], 6);
    assert_eq!(data[[1, 0, 0]], 7);
}

#[test]
fn test_ser_16bit_little_endian() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono16.ser");
    let values: [u16; 4] = [1, 256, 1000, 65535];
    let frame: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(&path, build_ser(2, 2, 16, 0, &[frame.clone(), frame])).unwrap();

    let Buffer::U16(data) = SerReader::open(&path).unwrap().read_buffer().unwrap() else {
        panic!("16-bit SER should decode to u16");
    };
    assert_eq!(data[[0, 0, 1]], 256);
    assert_eq!(data[[1, 1, 0]], 1000);
    assert_eq!(data[[1, 1, 1]], 65535);
}

#[test]
fn test_ser_rgb_keeps_green_plane() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgb.ser");
    // 2x1 pixels, RGB interleaved
    let frame = vec![10u8, 20, 30, 40, 50, 60];
    fs::write(&path, build_ser(2, 1, 8, 100, &[frame])).unwrap();

    let Loaded::SingleFrame(Buffer::U8(data)) = load(&path) else {
        panic!("one-frame RGB SER should load as a u8 single frame");
    };
    assert_eq!(data.as_slice().unwrap(), &[20, 50]);
}

#[test]
fn test_ser_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.ser");
    let mut bytes = build_ser(4, 4, 8, 0, &[vec![0u8; 16]]);
    bytes.truncate(bytes.len() - 4);
    fs::write(&path, bytes).unwrap();
    assert!(matches!(
        SerReader::open(&path),
        Err(MicroStackError::InvalidSer(_))
    ));
}

#[test]
fn test_write_ser_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.ser");
    let buffer = Buffer::U16(Array3::from_shape_fn((3, 4, 5), |(f, r, c)| {
        (f * 20_000 + r * 100 + c) as u16
    }));
    write_ser(&buffer, &path).unwrap();

    let reader = SerReader::open(&path).unwrap();
    assert_eq!(reader.header.pixel_depth, 16);
    assert!(reader.header.little_endian);
    assert_eq!(reader.read_buffer().unwrap(), buffer);
}

#[test]
fn test_write_ser_rejects_float() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Buffer::F32(Array3::zeros((2, 2, 2)));
    assert!(matches!(
        write_ser(&buffer, &dir.path().join("f.ser")),
        Err(MicroStackError::UnsupportedFormat(_))
    ));
}

// ---------------------------------------------------------------------------
// Single images and animations
// ---------------------------------------------------------------------------

#[test]
fn test_png_u8_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    let buffer = Buffer::single(Array2::from_shape_fn((6, 9), |(r, c)| (r * 30 + c) as u8));
    ImagePersister.persist(&buffer, &path).unwrap();

    assert_eq!(load(&path), Loaded::SingleFrame(buffer));
}

#[test]
fn test_tif_u16_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.tif");
    let buffer = Buffer::single(Array2::from_shape_fn((5, 7), |(r, c)| (r * 9000 + c * 11) as u16));
    ImagePersister.persist(&buffer, &path).unwrap();

    let loaded = load(&path).into_buffer();
    assert_eq!(loaded.element_type(), ElementType::U16);
    assert_eq!(loaded, buffer);
}

#[test]
fn test_ser_stack_through_persister() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.ser");
    let buffer = common::ramp_stack(4, 8, 6);
    ImagePersister.persist(&buffer, &path).unwrap();

    assert_eq!(load(&path), Loaded::MultiFrame(buffer));
}

#[test]
fn test_multi_page_tiff_loads_every_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pages.tif");
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(&path).unwrap())).unwrap();
    for page in 0..3u16 {
        let pixels: Vec<u16> = (0..16).map(|i| page * 1000 + i).collect();
        encoder.write_image::<colortype::Gray16>(4, 4, &pixels).unwrap();
    }
    drop(encoder);

    let Loaded::MultiFrame(Buffer::U16(data)) = load(&path) else {
        panic!("three-page TIFF should load as a u16 sequence");
    };
    assert_eq!(data.dim(), (3, 4, 4));
    assert_eq!(data[[0, 0, 1]], 1);
    assert_eq!(data[[2, 3, 3]], 2015);
}

#[test]
fn test_tif_stack_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    for (name, buffer) in [
        ("stack8.tif", common::ramp_stack(4, 8, 6)),
        (
            "stack16.tiff",
            Buffer::U16(Array3::from_shape_fn((3, 5, 7), |(f, r, c)| (f * 20_000 + r * 100 + c) as u16)),
        ),
    ] {
        let path = dir.path().join(name);
        ImagePersister.persist(&buffer, &path).unwrap();
        assert_eq!(load(&path), Loaded::MultiFrame(buffer), "{name}");
    }
}

#[test]
fn test_float_tif_stack_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = Buffer::F32(Array3::zeros((2, 3, 3)));
    let path = dir.path().join("f.tif");
    assert!(matches!(
        ImagePersister.persist(&buffer, &path),
        Err(MicroStackError::UnsupportedFormat(_))
    ));
    assert!(!path.exists());
}

#[test]
fn test_gif_animation_loads_as_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anim.gif");
    let buffer = common::numbered_stack(3, 10, 12);
    ImagePersister.persist(&buffer, &path).unwrap();

    let Loaded::MultiFrame(loaded) = load(&path) else {
        panic!("animation should load as a sequence");
    };
    assert_eq!(loaded.dim(), (3, 10, 12));
    assert_eq!(loaded.element_type(), ElementType::U8);
}

#[test]
fn test_persister_format_rules() {
    let dir = tempfile::tempdir().unwrap();
    let stack16 = Buffer::U16(Array3::zeros((2, 4, 4)));
    let stack8 = common::zeros_u8(2, 4, 4);
    let frame = common::zeros_u8(1, 4, 4);
    let float_frame = Buffer::F32(Array3::zeros((1, 4, 4)));

    let cases = [
        (&stack16, "a.gif"),
        (&stack8, "b.png"),
        (&frame, "c.gif"),
        (&frame, "d.ser"),
        (&float_frame, "e.png"),
        (&frame, "noext"),
    ];
    for (buffer, name) in cases {
        assert!(
            matches!(
                ImagePersister.persist(buffer, &dir.path().join(name)),
                Err(MicroStackError::UnsupportedFormat(_))
            ),
            "{name} should be rejected"
        );
    }
}

// ---------------------------------------------------------------------------
// Folders
// ---------------------------------------------------------------------------

fn write_png(dir: &Path, name: &str, value: u8, shape: (usize, usize)) {
    let frame = Buffer::single(Array2::from_elem(shape, value));
    ImagePersister.persist(&frame, &dir.join(name)).unwrap();
}

#[test]
fn test_folder_loads_sorted_frames() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "img_02.png", 2, (4, 5));
    write_png(dir.path(), "img_00.png", 0, (4, 5));
    write_png(dir.path(), "img_01.png", 1, (4, 5));
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    // A different loadable extension is ignored once the first file fixes it.
    ImagePersister
        .persist(&common::zeros_u8(1, 9, 9), &dir.path().join("z_other.bmp"))
        .unwrap();

    let Loaded::MultiFrame(Buffer::U8(data)) = load(dir.path()) else {
        panic!("folder of frames should load as a u8 sequence");
    };
    assert_eq!(data.dim(), (3, 4, 5));
    for i in 0..3 {
        assert_eq!(data[[i, 0, 0]], i as u8);
    }
}

#[test]
fn test_empty_folder() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("readme.md"), "nothing to load").unwrap();
    assert!(matches!(
        ImageLoader.load(dir.path()),
        Err(MicroStackError::EmptySequence)
    ));
}

#[test]
fn test_folder_with_mismatched_shapes() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "a.png", 1, (4, 5));
    write_png(dir.path(), "b.png", 1, (5, 4));
    assert!(matches!(
        ImageLoader.load(dir.path()),
        Err(MicroStackError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ImageLoader.load(&dir.path().join("absent.tif")),
        Err(MicroStackError::Io(_))
    ));
}

// ---------------------------------------------------------------------------
// save_image
// ---------------------------------------------------------------------------

#[test]
fn test_save_image_adds_extension_and_normalizes() {
    let persister = MemoryPersister::default();
    let buffer = Buffer::F32(Array3::from_shape_fn((1, 2, 2), |(_, r, c)| (r * 2 + c) as f32));

    let path = save_image(&persister, &buffer, Path::new("out/frame"), "png", BitDepth::Eight, true).unwrap();
    assert_eq!(path, Path::new("out/frame.png"));

    let saved = persister.take();
    let Buffer::U8(data) = &saved[0].1 else {
        panic!("8-bit export should persist u8 data");
    };
    assert_eq!(data.as_slice().unwrap(), &[0, 85, 170, 255]);
}
