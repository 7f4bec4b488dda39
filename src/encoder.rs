//! Animated WebP encoding through libwebp's `WebPAnimEncoder`.
//!
//! The `image` crate can only write lossless still WebP files, so frames are
//! handed to libwebp directly. Every `unsafe` block of the crate lives here.

use crate::constants::{ENCODER_METHOD_SLOWEST, LOOP_FOREVER, MAX_CANVAS_DIMENSION};
use crate::error::{RecompressionError, Result};
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, ImageFormat, Rgba, RgbaImage};
use libwebp_sys::{
    WebPAnimEncoder, WebPAnimEncoderAdd, WebPAnimEncoderAssemble, WebPAnimEncoderDelete,
    WebPAnimEncoderGetError, WebPAnimEncoderNewInternal, WebPAnimEncoderOptions,
    WebPAnimEncoderOptionsInitInternal, WebPConfig, WebPData, WebPDataClear,
    WebPGetEncoderVersion, WebPGetMuxABIVersion, WebPGetMuxVersion, WebPPicture,
    WebPPictureFree, WebPPictureImportRGBA, WebPValidateConfig,
};
use std::ffi::{c_int, CStr};
use std::io::Cursor;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebpEncodeError {
    #[error("Invalid canvas dimensions: {width}x{height}. Allowed: 1..={max}")]
    InvalidDimensions { width: u32, height: u32, max: u32 },

    #[error("Frame {index} is {width}x{height}, canvas is {canvas_width}x{canvas_height}")]
    FrameSizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },

    #[error("Invalid encoder configuration: {0}")]
    InvalidConfig(String),

    #[error("libwebp could not create an animation encoder")]
    EncoderInit,

    #[error("Out of memory while importing frame {0}")]
    OutOfMemory(usize),

    #[error("Frame {index} rejected by encoder: {reason}")]
    FrameRejected { index: usize, reason: String },

    #[error("Animation timestamp overflow at frame {0}")]
    TimestampOverflow(usize),

    #[error("Failed to assemble animation: {0}")]
    Assemble(String),

    #[error("No frames to assemble")]
    NoFrames,
}

/// Encoder parameters shared by every frame of one animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSettings {
    pub quality: f32,
    /// libwebp effort, 0 (fast) to 6 (slowest, smallest).
    pub method: i32,
    pub frame_duration_ms: u32,
    /// 0 loops forever.
    pub loop_count: i32,
    pub minimize_size: bool,
}

impl AnimationSettings {
    pub fn new(quality: i32, frame_duration_ms: u32) -> Self {
        Self {
            quality: quality as f32,
            method: ENCODER_METHOD_SLOWEST,
            frame_duration_ms,
            loop_count: LOOP_FOREVER,
            minimize_size: true,
        }
    }
}

/// Frees the pixel planes libwebp allocates on import.
struct PictureGuard(WebPPicture);

impl PictureGuard {
    fn new(width: u32, height: u32) -> Option<Self> {
        let mut picture = WebPPicture::new().ok()?;
        picture.use_argb = 1;
        picture.width = width as c_int;
        picture.height = height as c_int;
        Some(Self(picture))
    }

    fn as_mut_ptr(&mut self) -> *mut WebPPicture {
        &mut self.0
    }
}

impl Drop for PictureGuard {
    fn drop(&mut self) {
        // SAFETY: the picture was initialised by WebPPictureInit; freeing an
        // unallocated picture is a no-op.
        unsafe { WebPPictureFree(&mut self.0) };
    }
}

/// Owns a `WebPAnimEncoder` handle. Frames added with `add_frame` are placed
/// on a uniform timeline: frame `i` starts at `i * frame_duration_ms`.
pub struct AnimatedWebpEncoder {
    handle: NonNull<WebPAnimEncoder>,
    config: WebPConfig,
    width: u32,
    height: u32,
    frame_duration: c_int,
    next_timestamp: c_int,
    frame_count: usize,
}

impl AnimatedWebpEncoder {
    pub fn new(
        width: u32,
        height: u32,
        settings: &AnimationSettings,
    ) -> std::result::Result<Self, WebpEncodeError> {
        if width == 0 || height == 0 || width > MAX_CANVAS_DIMENSION || height > MAX_CANVAS_DIMENSION
        {
            return Err(WebpEncodeError::InvalidDimensions {
                width,
                height,
                max: MAX_CANVAS_DIMENSION,
            });
        }

        let config = build_config(settings)?;
        let frame_duration = c_int::try_from(settings.frame_duration_ms).map_err(|_| {
            WebpEncodeError::InvalidConfig(format!(
                "frame duration {} ms out of range",
                settings.frame_duration_ms
            ))
        })?;

        let mut options = MaybeUninit::<WebPAnimEncoderOptions>::uninit();
        // SAFETY: libwebp fills every field of the options struct on success.
        let initialized = unsafe {
            WebPAnimEncoderOptionsInitInternal(options.as_mut_ptr(), WebPGetMuxABIVersion())
        };
        if initialized == 0 {
            return Err(WebpEncodeError::InvalidConfig(
                "libwebp mux ABI version mismatch".to_string(),
            ));
        }
        // SAFETY: checked above that initialisation succeeded.
        let mut options = unsafe { options.assume_init() };
        options.anim_params.loop_count = settings.loop_count;
        options.anim_params.bgcolor = 0;
        options.minimize_size = c_int::from(settings.minimize_size);

        // SAFETY: options outlives the call; libwebp copies what it needs.
        let raw = unsafe {
            WebPAnimEncoderNewInternal(
                width as c_int,
                height as c_int,
                &options,
                WebPGetMuxABIVersion(),
            )
        };
        let handle = NonNull::new(raw).ok_or(WebpEncodeError::EncoderInit)?;

        Ok(Self {
            handle,
            config,
            width,
            height,
            frame_duration,
            next_timestamp: 0,
            frame_count: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Appends a frame shown for the animation's uniform duration.
    pub fn add_frame(&mut self, frame: &RgbaImage) -> std::result::Result<(), WebpEncodeError> {
        self.add_timed_frame(frame, self.frame_duration)
    }

    /// Appends a frame shown for `duration_ms`, independent of the uniform
    /// duration the encoder was created with.
    pub fn add_frame_with_duration(
        &mut self,
        frame: &RgbaImage,
        duration_ms: u32,
    ) -> std::result::Result<(), WebpEncodeError> {
        let duration = c_int::try_from(duration_ms)
            .map_err(|_| WebpEncodeError::TimestampOverflow(self.frame_count))?;
        self.add_timed_frame(frame, duration)
    }

    fn add_timed_frame(
        &mut self,
        frame: &RgbaImage,
        duration: c_int,
    ) -> std::result::Result<(), WebpEncodeError> {
        let index = self.frame_count;
        if frame.dimensions() != (self.width, self.height) {
            return Err(WebpEncodeError::FrameSizeMismatch {
                index,
                width: frame.width(),
                height: frame.height(),
                canvas_width: self.width,
                canvas_height: self.height,
            });
        }

        let mut picture =
            PictureGuard::new(self.width, self.height).ok_or(WebpEncodeError::OutOfMemory(index))?;
        // SAFETY: `frame` holds width * height RGBA pixels, rows packed with a
        // stride of width * 4 bytes. libwebp copies them into its own planes.
        let imported = unsafe {
            WebPPictureImportRGBA(
                picture.as_mut_ptr(),
                frame.as_raw().as_ptr(),
                (self.width * 4) as c_int,
            )
        };
        if imported == 0 {
            return Err(WebpEncodeError::OutOfMemory(index));
        }

        // SAFETY: the encoder copies the canvas before returning, so the
        // picture may be freed right after.
        let added = unsafe {
            WebPAnimEncoderAdd(
                self.handle.as_ptr(),
                picture.as_mut_ptr(),
                self.next_timestamp,
                &self.config,
            )
        };
        if added == 0 {
            return Err(WebpEncodeError::FrameRejected {
                index,
                reason: self.last_error(),
            });
        }

        self.next_timestamp = self
            .next_timestamp
            .checked_add(duration)
            .ok_or(WebpEncodeError::TimestampOverflow(index))?;
        self.frame_count += 1;
        Ok(())
    }

    /// Closes the timeline and returns the assembled RIFF container.
    pub fn finish(self) -> std::result::Result<Vec<u8>, WebpEncodeError> {
        if self.frame_count == 0 {
            return Err(WebpEncodeError::NoFrames);
        }

        // The closing timestamp fixes how long the last frame stays on screen.
        // SAFETY: a null picture is libwebp's end-of-stream marker.
        let closed = unsafe {
            WebPAnimEncoderAdd(
                self.handle.as_ptr(),
                ptr::null_mut(),
                self.next_timestamp,
                ptr::null(),
            )
        };
        if closed == 0 {
            return Err(WebpEncodeError::Assemble(self.last_error()));
        }

        let mut data = WebPData::default();
        // SAFETY: `data` is a valid out-parameter; on success libwebp owns the
        // buffer until WebPDataClear.
        let assembled = unsafe { WebPAnimEncoderAssemble(self.handle.as_ptr(), &mut data) };
        if assembled == 0 || data.bytes.is_null() {
            return Err(WebpEncodeError::Assemble(self.last_error()));
        }

        // SAFETY: libwebp reported `size` readable bytes at `bytes`.
        let bytes = unsafe { std::slice::from_raw_parts(data.bytes, data.size) }.to_vec();
        // SAFETY: releases the buffer assembled above exactly once.
        unsafe { WebPDataClear(&mut data) };
        Ok(bytes)
    }

    fn last_error(&self) -> String {
        // SAFETY: the handle is live; the returned string is owned by libwebp
        // and valid until the next call on this encoder.
        let message = unsafe { WebPAnimEncoderGetError(self.handle.as_ptr()) };
        if message.is_null() {
            return "unknown libwebp error".to_string();
        }
        // SAFETY: non-null, NUL-terminated C string from libwebp.
        let text = unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned();
        if text.is_empty() {
            "unknown libwebp error".to_string()
        } else {
            text
        }
    }
}

impl Drop for AnimatedWebpEncoder {
    fn drop(&mut self) {
        // SAFETY: the handle came from WebPAnimEncoderNewInternal and is deleted once.
        unsafe { WebPAnimEncoderDelete(self.handle.as_ptr()) };
    }
}

fn build_config(settings: &AnimationSettings) -> std::result::Result<WebPConfig, WebpEncodeError> {
    let mut config = WebPConfig::new().map_err(|_| {
        WebpEncodeError::InvalidConfig("libwebp encoder ABI version mismatch".to_string())
    })?;
    config.lossless = 0;
    config.quality = settings.quality;
    config.method = settings.method;

    // SAFETY: `config` is fully initialised by WebPConfig::new.
    if unsafe { WebPValidateConfig(&config) } == 0 {
        return Err(WebpEncodeError::InvalidConfig(format!(
            "quality {} with method {} rejected by libwebp",
            settings.quality, settings.method
        )));
    }
    Ok(config)
}

/// Encodes `frames` in iteration order; the first frame fixes the canvas size.
pub fn encode_animation<'a, I>(
    frames: I,
    settings: &AnimationSettings,
) -> std::result::Result<Vec<u8>, WebpEncodeError>
where
    I: IntoIterator<Item = &'a RgbaImage>,
{
    let mut frames = frames.into_iter().peekable();
    let (width, height) = frames
        .peek()
        .map(|first| first.dimensions())
        .ok_or(WebpEncodeError::NoFrames)?;

    let mut encoder = AnimatedWebpEncoder::new(width, height, settings)?;
    for frame in frames {
        encoder.add_frame(frame)?;
    }
    encoder.finish()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecSupport {
    pub encoder_version: String,
    pub mux_version: String,
    pub webp_decoding: bool,
}

/// Confirms at startup that WebP decoding is compiled in and that libwebp can
/// produce an animation the decoder reads back.
pub fn probe_codec_support() -> Result<CodecSupport> {
    if !ImageFormat::WebP.reading_enabled() {
        return Err(RecompressionError::CodecUnavailable(
            "image crate built without WebP decoding".to_string(),
        ));
    }

    // SAFETY: plain version queries without arguments.
    let (encoder_version, mux_version) = unsafe { (WebPGetEncoderVersion(), WebPGetMuxVersion()) };
    if encoder_version <= 0 || mux_version <= 0 {
        return Err(RecompressionError::CodecUnavailable(
            "libwebp reported no encoder or mux version".to_string(),
        ));
    }

    let probe_frames = [
        RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])),
        RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255])),
    ];
    let encoded = encode_animation(&probe_frames, &AnimationSettings::new(75, 50))
        .map_err(|e| RecompressionError::CodecUnavailable(format!("probe encode failed: {}", e)))?;

    let decoder = WebPDecoder::new(Cursor::new(encoded)).map_err(|e| {
        RecompressionError::CodecUnavailable(format!("probe decode failed: {}", e))
    })?;
    if !decoder.has_animation() {
        return Err(RecompressionError::CodecUnavailable(
            "probe animation decoded as a still image".to_string(),
        ));
    }
    let decoded = decoder.into_frames().collect_frames().map_err(|e| {
        RecompressionError::CodecUnavailable(format!("probe decode failed: {}", e))
    })?;
    if decoded.len() != probe_frames.len() {
        return Err(RecompressionError::CodecUnavailable(format!(
            "probe animation decoded with {} frames, expected {}",
            decoded.len(),
            probe_frames.len()
        )));
    }

    Ok(CodecSupport {
        encoder_version: format_version(encoder_version),
        mux_version: format_version(mux_version),
        webp_decoding: true,
    })
}

/// libwebp packs versions as 0xMMmmpp.
fn format_version(packed: c_int) -> String {
    format!(
        "{}.{}.{}",
        (packed >> 16) & 0xff,
        (packed >> 8) & 0xff,
        packed & 0xff
    )
}
