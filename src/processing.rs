use crate::constants::{
    DEFAULT_QUALITY, DEFAULT_RESIZE_RATIO, FALLBACK_FRAME_DURATION_MS, MAX_FILE_SIZE,
    MAX_FRAME_DURATION_MS, MAX_QUALITY, MAX_TIMELINE_MS, MIN_QUALITY,
};
use crate::encoder::{encode_animation, AnimationSettings};
use crate::error::{RecompressionError, Result};
use crate::source::{Frame, SourceImage};
use crate::utils::{bytes_to_kb, calculate_compression_ratio};
use image::imageops::{self, FilterType};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecompressOptions {
    pub quality: i32,
    pub resize_ratio: f64,
    /// Uniform frame duration; `None` reuses the source's default.
    pub duration_ms: Option<u32>,
}

impl RecompressOptions {
    pub fn new(
        quality: Option<i32>,
        resize_ratio: Option<f64>,
        duration_ms: Option<u32>,
    ) -> Result<Self> {
        let options = Self {
            quality: quality.unwrap_or(DEFAULT_QUALITY),
            resize_ratio: resize_ratio.unwrap_or(DEFAULT_RESIZE_RATIO),
            duration_ms,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.quality) {
            return Err(RecompressionError::InvalidParameter(format!(
                "quality {} outside {}..={}",
                self.quality, MIN_QUALITY, MAX_QUALITY
            )));
        }
        if !self.resize_ratio.is_finite() || self.resize_ratio <= 0.0 {
            return Err(RecompressionError::InvalidParameter(format!(
                "resize ratio must be a positive number, got {}",
                self.resize_ratio
            )));
        }
        if let Some(ms) = self.duration_ms.filter(|&ms| ms > MAX_FRAME_DURATION_MS) {
            return Err(RecompressionError::InvalidParameter(format!(
                "frame duration {} ms exceeds {} ms",
                ms, MAX_FRAME_DURATION_MS
            )));
        }
        Ok(())
    }
}

impl Default for RecompressOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            resize_ratio: DEFAULT_RESIZE_RATIO,
            duration_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecompressionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: RecompressOptions,
}

impl RecompressionRequest {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        options: RecompressOptions,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            options,
        }
    }
}

/// Outcome of a successful recompression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeReport {
    pub original_size: u64,
    pub output_size: u64,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    pub frame_duration_ms: u32,
}

impl SizeReport {
    pub fn original_size_kb(&self) -> f64 {
        bytes_to_kb(self.original_size)
    }

    pub fn output_size_kb(&self) -> f64 {
        bytes_to_kb(self.output_size)
    }

    /// Percentage saved; negative when the output grew.
    pub fn compression_ratio(&self) -> f64 {
        calculate_compression_ratio(self.original_size, self.output_size)
    }
}

/// Scales a canvas by `ratio`, rounding each side to the nearest pixel.
///
/// # Returns
/// * `(width, height)` of the resized canvas, or `InvalidParameter` when a
///   side would round down to zero
pub fn target_dimensions(width: u32, height: u32, ratio: f64) -> Result<(u32, u32)> {
    if ratio == 1.0 {
        return Ok((width, height));
    }

    let target_width = (width as f64 * ratio).round();
    let target_height = (height as f64 * ratio).round();
    if target_width < 1.0 || target_height < 1.0 {
        return Err(RecompressionError::InvalidParameter(format!(
            "resize ratio {} turns {}x{} into an empty image",
            ratio, width, height
        )));
    }

    Ok((target_width as u32, target_height as u32))
}

/// Resamples a frame with Lanczos3; a frame already at the target size is returned as is.
pub fn resize_frame(frame: Frame, width: u32, height: u32) -> Frame {
    if frame.buffer.dimensions() == (width, height) {
        return frame;
    }
    Frame {
        buffer: imageops::resize(&frame.buffer, width, height, FilterType::Lanczos3),
        ..frame
    }
}

/// Override (zero included) wins over the source default, then the fallback.
/// A source default of 0 is a real value, not a missing one.
pub fn resolve_frame_duration(override_ms: Option<u32>, source_default_ms: Option<u32>) -> u32 {
    override_ms
        .or(source_default_ms)
        .unwrap_or(FALLBACK_FRAME_DURATION_MS)
}

/// Rejects animations whose uniform timeline would not fit libwebp's
/// timestamps.
///
/// # Arguments
/// * `frame_count` - Number of frames to encode
/// * `duration_ms` - Uniform duration of each frame
pub fn check_timeline_length(frame_count: usize, duration_ms: u32) -> Result<()> {
    let total = (frame_count as u64).saturating_mul(u64::from(duration_ms));
    if total > MAX_TIMELINE_MS {
        return Err(RecompressionError::InvalidParameter(format!(
            "{} frames of {} ms exceed the {} ms animation timeline",
            frame_count, duration_ms, MAX_TIMELINE_MS
        )));
    }
    Ok(())
}

/// Returns the input size, rejecting missing and oversized files.
pub fn check_input_file(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| RecompressionError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !metadata.is_file() {
        return Err(RecompressionError::Decode {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }
    if metadata.len() > MAX_FILE_SIZE {
        return Err(RecompressionError::FileTooLarge(metadata.len(), MAX_FILE_SIZE));
    }
    Ok(metadata.len())
}

/// Decodes every frame of `request.input`, resizes and retimes them uniformly,
/// and writes the re-encoded animation to `request.output`.
///
/// The output path is only replaced once the whole animation is encoded; on
/// error nothing is left behind.
///
/// # Arguments
/// * `request` - Input and output paths plus the validated options
///
/// # Returns
/// * `SizeReport` with the on-disk sizes of both files, or the first error hit
pub fn recompress(request: &RecompressionRequest) -> Result<SizeReport> {
    let options = request.options;
    options.validate()?;

    let original_size = check_input_file(&request.input)?;
    let mut source = SourceImage::open_animated(&request.input)?;
    if let Some(duration_ms) = options.duration_ms {
        check_timeline_length(source.frame_count(), duration_ms)?;
    }

    let (width, height) = source.dimensions();
    let (target_width, target_height) = target_dimensions(width, height, options.resize_ratio)?;

    let mut frames = Vec::with_capacity(source.frame_count());
    while let Some(frame) = source.next_frame()? {
        frames.push(resize_frame(frame, target_width, target_height));
    }
    source.ensure_fully_decoded()?;
    let source_default_ms = source.default_duration_ms();
    drop(source);

    let frame_duration_ms = resolve_frame_duration(options.duration_ms, source_default_ms);
    check_timeline_length(frames.len(), frame_duration_ms)?;
    let settings = AnimationSettings::new(options.quality, frame_duration_ms);
    let encoded = encode_animation(frames.iter().map(|frame| &frame.buffer), &settings).map_err(
        |source| RecompressionError::Encode {
            path: request.output.clone(),
            source,
        },
    )?;

    write_atomically(&request.output, &encoded)?;
    let output_size = fs::metadata(&request.output)
        .map_err(|source| RecompressionError::Write {
            path: request.output.clone(),
            source,
        })?
        .len();

    Ok(SizeReport {
        original_size,
        output_size,
        frame_count: frames.len(),
        width: target_width,
        height: target_height,
        frame_duration_ms,
    })
}

/// Writes `bytes` next to `path` and renames the file into place.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_error = |source| RecompressionError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_error)?;

    // Dropped (and deleted) on any early return.
    let mut temp = NamedTempFile::new_in(parent).map_err(write_error)?;
    temp.write_all(bytes).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_animation(path: &Path, frames: usize, width: u32, height: u32, duration: u32) {
        let frames: Vec<RgbaImage> = (0..frames)
            .map(|i| {
                let shade = (i * 80 % 256) as u8;
                RgbaImage::from_fn(width, height, |x, y| {
                    Rgba([shade, (x * 7) as u8, (y * 5) as u8, 255])
                })
            })
            .collect();
        let data = encode_animation(&frames, &AnimationSettings::new(90, duration)).unwrap();
        fs::write(path, data).unwrap();
    }

    #[test]
    fn test_recompress_options_default() {
        let options = RecompressOptions::new(None, None, None).unwrap();
        assert_eq!(options.quality, 80);
        assert_eq!(options.resize_ratio, 1.0);
        assert_eq!(options.duration_ms, None);
        assert_eq!(options, RecompressOptions::default());
    }

    #[test]
    fn test_recompress_options_invalid() {
        for quality in [-1, 101] {
            let result = RecompressOptions::new(Some(quality), None, None);
            assert!(matches!(result, Err(RecompressionError::InvalidParameter(_))));
        }
        for ratio in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            let result = RecompressOptions::new(None, Some(ratio), None);
            assert!(matches!(result, Err(RecompressionError::InvalidParameter(_))));
        }
        let result = RecompressOptions::new(None, None, Some(MAX_FRAME_DURATION_MS + 1));
        assert!(matches!(result, Err(RecompressionError::InvalidParameter(_))));

        assert!(RecompressOptions::new(Some(0), Some(0.01), Some(0)).is_ok());
        assert!(RecompressOptions::new(Some(100), Some(3.0), Some(MAX_FRAME_DURATION_MS)).is_ok());
    }

    #[test]
    fn test_target_dimensions() {
        assert_eq!(target_dimensions(100, 100, 1.0).unwrap(), (100, 100));
        assert_eq!(target_dimensions(100, 100, 0.5).unwrap(), (50, 50));
        assert_eq!(target_dimensions(101, 33, 0.5).unwrap(), (51, 17));
        assert_eq!(target_dimensions(10, 20, 1.5).unwrap(), (15, 30));
        assert!(matches!(
            target_dimensions(10, 10, 0.01),
            Err(RecompressionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_resolve_frame_duration() {
        assert_eq!(resolve_frame_duration(Some(20), Some(70)), 20);
        assert_eq!(resolve_frame_duration(Some(0), Some(70)), 0);
        assert_eq!(resolve_frame_duration(None, Some(70)), 70);
        assert_eq!(resolve_frame_duration(None, Some(0)), 0);
        assert_eq!(resolve_frame_duration(None, None), 100);
    }

    #[test]
    fn test_check_timeline_length() {
        assert!(check_timeline_length(3, 100).is_ok());
        assert!(check_timeline_length(1_000_000, 0).is_ok());
        assert!(check_timeline_length(128, MAX_FRAME_DURATION_MS).is_ok());
        assert!(matches!(
            check_timeline_length(129, MAX_FRAME_DURATION_MS),
            Err(RecompressionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_resize_frame_keeps_index_and_duration() {
        let frame = Frame {
            index: 4,
            duration_ms: 30,
            buffer: RgbaImage::from_pixel(20, 10, Rgba([1, 2, 3, 255])),
        };
        let resized = resize_frame(frame, 10, 5);
        assert_eq!(resized.index, 4);
        assert_eq!(resized.duration_ms, 30);
        assert_eq!(resized.buffer.dimensions(), (10, 5));
    }

    #[test]
    fn test_recompress_small_animation() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.webp");
        let output = dir.path().join("nested").join("out.webp");
        write_animation(&input, 3, 40, 30, 80);

        let options = RecompressOptions::new(Some(50), Some(0.5), None).unwrap();
        let report = recompress(&RecompressionRequest::new(&input, &output, options)).unwrap();

        assert_eq!(report.frame_count, 3);
        assert_eq!((report.width, report.height), (20, 15));
        assert_eq!(report.frame_duration_ms, 80);
        assert_eq!(report.original_size, fs::metadata(&input).unwrap().len());
        assert_eq!(report.output_size, fs::metadata(&output).unwrap().len());

        let leftovers: Vec<_> = fs::read_dir(output.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("out.webp")]);
    }

    #[test]
    fn test_recompress_invalid_quality_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.webp");
        let request = RecompressionRequest::new(
            dir.path().join("missing.webp"),
            &output,
            RecompressOptions {
                quality: 500,
                ..RecompressOptions::default()
            },
        );

        let err = recompress(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Processing);
        assert!(!output.exists());
    }

    #[test]
    fn test_recompress_rejects_overlong_timeline_before_writing() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.webp");
        let output = dir.path().join("out.webp");
        write_animation(&input, 129, 8, 8, 50);

        let options = RecompressOptions::new(None, None, Some(MAX_FRAME_DURATION_MS)).unwrap();
        let err = recompress(&RecompressionRequest::new(&input, &output, options)).unwrap_err();
        assert!(matches!(err, RecompressionError::InvalidParameter(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_check_input_file_missing() {
        let err = check_input_file(Path::new("/nonexistent/input.webp")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_size_report_helpers() {
        let report = SizeReport {
            original_size: 4096,
            output_size: 1024,
            frame_count: 2,
            width: 1,
            height: 1,
            frame_duration_ms: 100,
        };
        assert_eq!(report.original_size_kb(), 4.0);
        assert_eq!(report.output_size_kb(), 1.0);
        assert_eq!(report.compression_ratio(), 75.0);
    }
}
