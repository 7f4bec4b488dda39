use crate::error::Result;
use crate::processing::check_input_file;
use crate::source::SourceImage;
use crate::utils::{bytes_to_kb, format_file_size};
use std::path::{Path, PathBuf};

/// Container metadata of a WebP file, animated or not.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
    pub animated: bool,
    pub has_alpha: bool,
    /// `None` loops forever.
    pub loop_count: Option<u16>,
    pub frame_durations_ms: Vec<u32>,
}

impl AnimationInfo {
    pub fn total_duration_ms(&self) -> u64 {
        self.frame_durations_ms.iter().map(|&ms| u64::from(ms)).sum()
    }

    /// The duration a recompression without override would apply to every frame.
    pub fn default_duration_ms(&self) -> Option<u32> {
        self.frame_durations_ms.last().copied()
    }

    pub fn has_uniform_timing(&self) -> bool {
        self.frame_durations_ms.windows(2).all(|w| w[0] == w[1])
    }
}

/// Reads metadata and every frame duration. Decodes all frames, so corrupt
/// frame data is reported here too.
///
/// # Arguments
/// * `input_path` - Path to a WebP file, animated or still
///
/// # Returns
/// * `AnimationInfo`; a still image yields an empty duration list
pub fn get_animation_info(input_path: &Path) -> Result<AnimationInfo> {
    let file_size = check_input_file(input_path)?;
    let mut source = SourceImage::open(input_path)?;
    let (width, height) = source.dimensions();

    let mut frame_durations_ms = Vec::with_capacity(source.frame_count());
    while let Some(frame) = source.next_frame()? {
        frame_durations_ms.push(frame.duration_ms);
    }

    source.ensure_fully_decoded()?;

    Ok(AnimationInfo {
        path: input_path.to_path_buf(),
        file_size,
        width,
        height,
        frame_count: source.frame_count(),
        animated: source.is_animated(),
        has_alpha: source.has_alpha(),
        loop_count: source.loop_count(),
        frame_durations_ms,
    })
}

pub fn print_animation_info(info: &AnimationInfo) {
    crate::info!("📊 Analyzing image: {:?}", info.path);
    crate::info!("📋 Basic Information:");
    crate::info!("  📏 Canvas: {}x{} pixels", info.width, info.height);
    crate::info!(
        "  📦 File size: {:.2} KB ({})",
        bytes_to_kb(info.file_size),
        format_file_size(info.file_size)
    );
    crate::info!("  🎨 Alpha channel: {}", if info.has_alpha { "yes" } else { "no" });

    if !info.animated {
        crate::info!("  🎞️  Animated: no (single frame)");
        return;
    }

    crate::info!("  🎞️  Frames: {}", info.frame_count);
    match info.loop_count {
        None => crate::info!("  🔁 Loop: forever"),
        Some(n) => crate::info!("  🔁 Loop: {} time(s)", n),
    }
    crate::info!("  ⏱️  Total duration: {} ms", info.total_duration_ms());

    if info.has_uniform_timing() {
        if let Some(&ms) = info.frame_durations_ms.first() {
            crate::info!("  ⏱️  Frame duration: {} ms (uniform)", ms);
        }
    } else {
        crate::info!("  ⏱️  Frame durations (ms):");
        for (index, ms) in info.frame_durations_ms.iter().enumerate() {
            crate::info!("    #{:<4} {}", index, ms);
        }
    }

    crate::verbose!(
        "Recompressing without --duration applies {} ms to every frame",
        info.default_duration_ms()
            .unwrap_or(crate::constants::FALLBACK_FRAME_DURATION_MS)
    );
}
