#![allow(dead_code)]

use image::{ImageFormat, Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use webp_squeeze::encoder::{encode_animation, AnimatedWebpEncoder, AnimationSettings};

pub const FRAME_COLORS: [[u8; 4]; 5] = [
    [230, 25, 25, 255],
    [25, 230, 25, 255],
    [25, 25, 230, 255],
    [230, 230, 25, 255],
    [25, 230, 230, 255],
];

/// Deterministic noise so that every frame is visibly different and
/// quality changes show up in the encoded size.
pub fn noise_frame(width: u32, height: u32, seed: u32) -> RgbaImage {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    RgbaImage::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let bytes = state.to_le_bytes();
        Rgba([bytes[1], bytes[2], bytes[3], 255])
    })
}

pub fn write_frames(path: &Path, frames: &[RgbaImage], duration_ms: u32) -> PathBuf {
    let data = encode_animation(frames, &AnimationSettings::new(95, duration_ms)).unwrap();
    fs::write(path, data).unwrap();
    path.to_path_buf()
}

/// `count` noise frames of `width`x`height`, every frame `duration_ms` long.
pub fn create_noise_animation(
    path: &Path,
    count: u32,
    width: u32,
    height: u32,
    duration_ms: u32,
) -> PathBuf {
    let frames: Vec<RgbaImage> = (0..count)
        .map(|i| noise_frame(width, height, i + 1))
        .collect();
    write_frames(path, &frames, duration_ms)
}

/// Noise frames whose display times follow `durations_ms`, one frame per entry.
pub fn create_timed_animation(
    path: &Path,
    durations_ms: &[u32],
    width: u32,
    height: u32,
) -> PathBuf {
    let mut encoder =
        AnimatedWebpEncoder::new(width, height, &AnimationSettings::new(95, 100)).unwrap();
    for (i, &duration) in durations_ms.iter().enumerate() {
        let frame = noise_frame(width, height, i as u32 + 1);
        encoder.add_frame_with_duration(&frame, duration).unwrap();
    }
    fs::write(path, encoder.finish().unwrap()).unwrap();
    path.to_path_buf()
}

/// One solid frame per entry of `FRAME_COLORS[..count]`.
pub fn create_color_animation(path: &Path, count: usize, duration_ms: u32) -> PathBuf {
    let frames: Vec<RgbaImage> = FRAME_COLORS[..count]
        .iter()
        .map(|&c| RgbaImage::from_pixel(32, 24, Rgba(c)))
        .collect();
    write_frames(path, &frames, duration_ms)
}

pub fn create_still_webp(path: &Path) -> PathBuf {
    noise_frame(16, 16, 7)
        .save_with_format(path, ImageFormat::WebP)
        .unwrap();
    path.to_path_buf()
}

pub fn create_garbage_file(path: &Path) -> PathBuf {
    fs::write(path, b"this is not an image at all").unwrap();
    path.to_path_buf()
}

/// A valid animation cut right after its extended header, before any frame.
pub fn create_truncated_animation(path: &Path) -> PathBuf {
    create_noise_animation(path, 3, 24, 24, 100);
    let data = fs::read(path).unwrap();
    fs::write(path, &data[..30]).unwrap();
    path.to_path_buf()
}

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}

pub fn create_test_output_directory(temp_dir: &Path) -> PathBuf {
    let output_dir = temp_dir.join("output");
    fs::create_dir(&output_dir).unwrap();
    output_dir
}

pub fn colors_close(actual: [u8; 4], expected: [u8; 4], tolerance: i32) -> bool {
    actual
        .iter()
        .zip(expected.iter())
        .take(3)
        .all(|(&a, &e)| (a as i32 - e as i32).abs() <= tolerance)
}
