//! Decoding side of the pipeline: an opened animated WebP and its frames.

use crate::error::{RecompressionError, Result};
use image::{DynamicImage, RgbImage, RgbaImage};
use image_webp::{DecodingError, LoopCount, WebPDecoder};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// One decoded canvas, owned independently of the decoder.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub duration_ms: u32,
    pub buffer: RgbaImage,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }
}

/// An animated WebP opened for sequential frame extraction.
///
/// Frames are decoded in order; `position` is the index of the next frame
/// `next_frame` will return.
pub struct SourceImage {
    path: PathBuf,
    decoder: WebPDecoder<BufReader<File>>,
    position: usize,
    last_duration_ms: Option<u32>,
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("path", &self.path)
            .field("frame_count", &self.frame_count())
            .field("position", &self.position)
            .finish()
    }
}

impl SourceImage {
    /// Opens and parses the container header. Fails with `Decode` when the
    /// file is unreadable or not a WebP file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| decode_error(path, e))?;
        let decoder = WebPDecoder::new(BufReader::new(file)).map_err(|e| decode_error(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            position: 0,
            last_duration_ms: None,
        })
    }

    /// Opens `path` and requires a real animation (flag set, more than one frame).
    pub fn open_animated(path: &Path) -> Result<Self> {
        let source = Self::open(path)?;
        if !source.is_animated() {
            return Err(RecompressionError::NotAnimated(path.to_path_buf()));
        }
        Ok(source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames; a still image counts as one.
    pub fn frame_count(&self) -> usize {
        if self.decoder.is_animated() {
            self.decoder.num_frames() as usize
        } else {
            1
        }
    }

    pub fn is_animated(&self) -> bool {
        self.decoder.is_animated() && self.decoder.num_frames() > 1
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.decoder.dimensions()
    }

    pub fn has_alpha(&self) -> bool {
        self.decoder.has_alpha()
    }

    /// `None` means the animation loops forever.
    pub fn loop_count(&self) -> Option<u16> {
        match self.decoder.loop_count() {
            LoopCount::Forever => None,
            LoopCount::Times(n) => Some(n.get()),
        }
    }

    /// Sum of all frame durations of one loop.
    pub fn total_duration_ms(&self) -> u64 {
        self.decoder.loop_duration()
    }

    /// The duration of the most recently decoded frame, which is what the
    /// source reports as its frame duration once extraction is done. A
    /// stored 0 is kept as 0; `None` until a frame has been decoded.
    pub fn default_duration_ms(&self) -> Option<u32> {
        self.last_duration_ms
    }

    /// Decodes the frame at `position` and advances the cursor. Returns
    /// `Ok(None)` past the last frame.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.read_next()?;
        if let Some(frame) = &frame {
            self.last_duration_ms = Some(frame.duration_ms);
        }
        Ok(frame)
    }

    /// Fails with `Decode` unless every frame the header announces was decoded.
    pub fn ensure_fully_decoded(&self) -> Result<()> {
        if self.is_animated() && self.position != self.frame_count() {
            return Err(RecompressionError::Decode {
                path: self.path.clone(),
                reason: format!(
                    "header announces {} frames, decoded {}",
                    self.frame_count(),
                    self.position
                ),
            });
        }
        Ok(())
    }

    /// Decodes every remaining frame in order.
    pub fn frames(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::with_capacity(self.frame_count().saturating_sub(self.position));
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if !self.decoder.is_animated() || self.position >= self.frame_count() {
            return Ok(None);
        }

        let (width, height) = self.decoder.dimensions();
        let index = self.position;
        let (buffer, duration_ms) = if self.decoder.has_alpha() {
            let mut canvas = RgbaImage::new(width, height);
            let duration = self.read_into(&mut canvas)?;
            (canvas, duration)
        } else {
            let mut canvas = RgbImage::new(width, height);
            let duration = self.read_into(&mut canvas)?;
            (DynamicImage::ImageRgb8(canvas).into_rgba8(), duration)
        };

        let Some(duration_ms) = duration_ms else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(Frame {
            index,
            duration_ms,
            buffer,
        }))
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<Option<u32>> {
        match self.decoder.read_frame(buf) {
            Ok(duration) => Ok(Some(duration)),
            Err(DecodingError::NoMoreFrames) => Ok(None),
            Err(e) => Err(decode_error(&self.path, e)),
        }
    }
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> RecompressionError {
    RecompressionError::Decode {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
