mod common;

use std::path::{Path, PathBuf};

use ndarray::Array3;

use common::{BlockRasterizer, MemoryPersister, RecordingEncoder};
use microstack_core::annotation::{ScaleBarParams, TimeStampParams};
use microstack_core::buffer::{Buffer, ElementType};
use microstack_core::correction::{do_contrast_correction, AverageMethod, BackgroundParams, ContrastParams};
use microstack_core::error::MicroStackError;
use microstack_core::export::{BitDepth, ExportOptions};
use microstack_core::image_stack::{derive_frame, ImageStack};
use microstack_core::io::{ImageLoader, ImagePersister, Loaded, Loader};
use microstack_core::montage::MontageParams;

fn stack(frames: usize) -> ImageStack {
    ImageStack::new(common::ramp_stack(frames, 20, 30), "cells.tif")
}

#[test]
fn test_new_stack_state() {
    let s = stack(4);
    assert_eq!(s.name(), "cells.tif");
    assert_eq!(s.frame_index(), 0);
    assert_eq!(s.n_frames(), 4);
    assert_eq!(s.source(), s.array());
    assert!(s.contrast_mapping().is_none());
    assert!(s.calibration().is_pixel_unit());
}

#[test]
fn test_background_then_reset() {
    let mut s = stack(4);
    s.background_correction(&BackgroundParams::default()).unwrap();
    assert_ne!(s.array(), s.source());
    s.contrast_correction(&ContrastParams::default()).unwrap();

    s.reset();
    assert_eq!(s.array(), s.source());
    assert!(s.contrast_mapping().is_none());
}

#[test]
fn test_failed_operations_leave_stack_unchanged() {
    let mut single = stack(1);
    let before = single.clone();
    assert!(matches!(
        single.background_correction(&BackgroundParams::default()),
        Err(MicroStackError::SequenceRequired { .. })
    ));
    assert!(single.crop((0, 0), Some((40, 10))).is_err());
    assert!(single.set_scale(None, Some(-1.0), None, None).is_err());
    assert!(single.set_frame(0).is_err());
    assert_eq!(single, before);
}

#[test]
fn test_contrast_memo_applies_to_displayed_frame() {
    let mut s = stack(3);
    let raw_view = s.frame().unwrap();
    assert_eq!(raw_view.raw, raw_view.corrected);

    s.contrast_correction(&ContrastParams::default()).unwrap();
    let view = s.frame().unwrap();
    assert_ne!(view.raw, view.corrected);
    assert_eq!(view.corrected.max(), 255.0);
    assert_eq!(view.corrected.min(), 0.0);
    // The working buffer itself is untouched.
    assert_eq!(s.array(), s.source());
}

#[test]
fn test_commit_contrast_applies_mapping_to_every_frame() {
    let mut s = stack(3);
    s.commit_contrast().unwrap();
    assert_eq!(s.array(), s.source());

    s.contrast_correction(&ContrastParams::default()).unwrap();
    let mapping = *s.contrast_mapping().unwrap();
    s.commit_contrast().unwrap();

    assert!(s.contrast_mapping().is_none());
    assert_eq!(s.n_frames(), 3);
    assert_eq!(s.array().element_type(), ElementType::U8);
    for i in 0..3 {
        let expected = do_contrast_correction(&s.source().frame(i).unwrap(), &mapping).unwrap();
        assert_eq!(s.array().frame(i).unwrap(), expected);
    }
    // The displayed frame is not corrected twice.
    let view = s.frame().unwrap();
    assert_eq!(view.raw, view.corrected);
}

#[test]
fn test_degenerate_contrast_keeps_previous_memo() {
    let mut s = stack(3);
    s.contrast_correction(&ContrastParams::default()).unwrap();
    let armed = *s.contrast_mapping().unwrap();

    let flat = ContrastParams {
        min: Some(7.0),
        max: Some(7.0),
        ..Default::default()
    };
    assert!(matches!(
        s.contrast_correction(&flat),
        Err(MicroStackError::InvalidRange { .. })
    ));
    assert_eq!(s.contrast_mapping(), Some(&armed));
}

#[test]
fn test_displayed_frame_follows_mutations() {
    let mut s = stack(3);
    s.set_frame(2).unwrap();
    s.crop((5, 5), Some((15, 12))).unwrap();
    let view = s.frame().unwrap();
    assert_eq!(view.raw.dim(), (1, 7, 10));
    assert_eq!(view.raw, derive_frame(s.array(), 2, None).unwrap().raw);
    assert_eq!(s.source().dim(), (3, 7, 10));
}

#[test]
fn test_reduced_range() {
    let mut s = stack(10);
    s.set_frame(8).unwrap();
    s.reduced_range(2, Some(5)).unwrap();
    assert_eq!(s.n_frames(), 3);
    assert_eq!(s.source().n_frames(), 3);
    assert_eq!(s.frame_index(), 2);

    let expected = common::ramp_stack(10, 20, 30).frame(4).unwrap();
    assert_eq!(s.frame().unwrap().raw, expected);

    s.reduced_range(1, None).unwrap();
    assert_eq!(s.n_frames(), 2);
    assert_eq!(s.frame_index(), 1);
}

#[test]
fn test_reduced_range_rejects_invalid_ranges() {
    let mut s = stack(10);
    let before = s.clone();
    for (first, last) in [(3, Some(2)), (0, Some(11)), (4, Some(4)), (10, None)] {
        assert!(
            matches!(s.reduced_range(first, last), Err(MicroStackError::OutOfBounds(_))),
            "{first}..{last:?} should be rejected"
        );
    }
    assert_eq!(s, before);

    let mut single = stack(1);
    assert!(matches!(
        single.reduced_range(0, None),
        Err(MicroStackError::SequenceRequired { .. })
    ));
}

#[test]
fn test_set_frame_bounds() {
    let mut s = stack(10);
    assert!(matches!(
        s.set_frame(10),
        Err(MicroStackError::IndexOutOfRange { index: 10, total: 10 })
    ));
    s.set_frame(9).unwrap();
    assert_eq!(s.frame_index(), 9);
}

#[test]
fn test_duplicate_is_independent() {
    let s = stack(3);
    let mut copy = s.duplicate();
    copy.crop((0, 0), Some((10, 10))).unwrap();
    copy.set_scale(Some("um"), Some(0.25), Some("s"), Some(2.0)).unwrap();
    assert_eq!(s.array().dim(), (3, 20, 30));
    assert!(s.calibration().is_pixel_unit());
    assert_eq!(copy.calibration().space_scale, 0.25);
    assert_eq!(copy.calibration().time_unit, "s");
}

#[test]
fn test_annotations_update_working_buffer() {
    let mut s = ImageStack::new(common::zeros_u8(3, 40, 100), "blank");
    let bar = ScaleBarParams {
        scale_length: 20.0,
        thickness: 4,
        add_text: false,
        ..Default::default()
    };
    s.scale_bar(&bar, Some(0), None).unwrap();
    s.time_stamps(&TimeStampParams::default(), &BlockRasterizer).unwrap();

    assert_eq!(common::frame_u8(s.array(), 0)[[27, 75]], 255);
    assert_eq!(common::frame_u8(s.array(), 1)[[27, 75]], 0);
    assert_eq!(common::frame_u8(s.array(), 1)[[10, 10]], 255);
    assert_eq!(s.source().max(), 0.0);
}

#[test]
fn test_time_stamps_on_single_frame() {
    let mut s = ImageStack::new(Buffer::U16(Array3::zeros((1, 50, 50))), "single");
    assert!(matches!(
        s.time_stamps(&TimeStampParams::default(), &BlockRasterizer),
        Err(MicroStackError::SequenceRequired { frames: 1 })
    ));
}

#[test]
fn test_background_contrast_crop_scenario() {
    let mut s = ImageStack::new(common::ramp_stack(10, 100, 100), "scenario");
    s.background_correction(&BackgroundParams {
        average: AverageMethod::Median,
        ..Default::default()
    })
    .unwrap();
    s.contrast_correction(&ContrastParams {
        percentile: 5.0,
        ..Default::default()
    })
    .unwrap();
    s.crop((10, 10), Some((90, 90))).unwrap();

    assert_eq!(s.array().dim(), (10, 80, 80));
    assert_eq!(s.array().element_type(), ElementType::U8);
    assert_eq!(s.frame().unwrap().corrected.dim(), (1, 80, 80));
}

#[test]
fn test_crop_beyond_bounds_keeps_stack() {
    let mut s = stack(2);
    let before = s.clone();
    assert!(matches!(
        s.crop((0, 0), Some((31, 20))),
        Err(MicroStackError::OutOfBounds(_))
    ));
    assert_eq!(s, before);
}

// ---------------------------------------------------------------------------
// Export and save
// ---------------------------------------------------------------------------

#[test]
fn test_default_save_name() {
    let s = stack(3);
    assert_eq!(s.default_save_name(None), "cells_saved");
    assert_eq!(s.default_save_name(Some(3)), "cells_3_saved");
    let untitled = ImageStack::new(common::zeros_u8(1, 2, 2), "Untitled");
    assert_eq!(untitled.default_save_name(None), "Untitled_saved");
}

#[test]
fn test_export_stack_raw_or_working() {
    let mut s = stack(3);
    s.background_correction(&BackgroundParams::default()).unwrap();
    let raw = s.export_stack(true, BitDepth::Eight, false).unwrap();
    let work = s.export_stack(false, BitDepth::Eight, false).unwrap();
    assert_eq!(&raw, s.source());
    assert_eq!(&work, s.array());
}

#[test]
fn test_export_frame_uses_corrected_view() {
    let mut s = stack(3);
    s.contrast_correction(&ContrastParams::default()).unwrap();
    let corrected = s.export_frame(false, BitDepth::Eight, false).unwrap();
    let raw = s.export_frame(true, BitDepth::Eight, false).unwrap();
    assert_eq!(corrected, s.frame().unwrap().corrected);
    assert_eq!(raw, s.frame().unwrap().raw);
}

#[test]
fn test_save_frame_default_name_and_depth() {
    let mut s = stack(3);
    s.set_frame(1).unwrap();
    let persister = MemoryPersister::default();
    let path = s.save_frame(&persister, None, &ExportOptions::default()).unwrap();
    assert_eq!(path, PathBuf::from("cells_2_saved.tif"));

    let saved = persister.take();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].1.dim(), (1, 20, 30));
    assert_eq!(saved[0].1.element_type(), ElementType::U16);
    assert_eq!(saved[0].1.max(), 65535.0);
}

#[test]
fn test_save_stack_and_montage() {
    let s = stack(4);
    let persister = MemoryPersister::default();
    let options = ExportOptions {
        extension: "ser".into(),
        bit_depth: BitDepth::Eight,
        ..Default::default()
    };
    let path = s.save_stack(&persister, None, &options).unwrap();
    assert_eq!(path, PathBuf::from("cells_saved.ser"));

    let path = s
        .save_montage(&persister, None, &MontageParams::default(), &ExportOptions::default())
        .unwrap();
    assert_eq!(path, PathBuf::from("cells_montage.tif"));

    let explicit = s
        .save_montage(&persister, Some(Path::new("grid.png")), &MontageParams::default(), &ExportOptions::default())
        .unwrap();
    assert_eq!(explicit, PathBuf::from("grid.png"));

    let saved = persister.take();
    assert_eq!(saved[0].1.dim(), (4, 20, 30));
    assert_eq!(saved[0].1.element_type(), ElementType::U8);
    assert_eq!(saved[1].1.dim(), (1, 40, 60));
}

#[test]
fn test_save_stack_with_default_options() {
    let s = stack(3);

    let persister = MemoryPersister::default();
    let path = s.save_stack(&persister, None, &ExportOptions::default()).unwrap();
    assert_eq!(path, PathBuf::from("cells_saved.tif"));

    let dir = tempfile::tempdir().unwrap();
    let path = s
        .save_stack(&ImagePersister, Some(&dir.path().join("cells_saved")), &ExportOptions::default())
        .unwrap();
    assert_eq!(path, dir.path().join("cells_saved.tif"));

    let Loaded::MultiFrame(loaded) = ImageLoader.load(&path).unwrap() else {
        panic!("a saved stack should load back as a sequence");
    };
    assert_eq!(loaded.dim(), (3, 20, 30));
    assert_eq!(loaded.element_type(), ElementType::U16);
    assert_eq!(loaded.max(), 65535.0);
}

#[test]
fn test_save_video() {
    let s = stack(4);
    let encoder = RecordingEncoder::default();
    let path = s.save_video(&encoder, None, 10, "libx264").unwrap();
    assert_eq!(path, PathBuf::from("cells_saved.mp4"));

    let calls = encoder.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, (4, 20, 30, 3));
    assert_eq!(calls[0].2, 10);
    assert_eq!(calls[0].3, "libx264");

    assert!(matches!(
        s.save_video(&encoder, None, 0, "libx264"),
        Err(MicroStackError::InvalidParameter(_))
    ));
}
