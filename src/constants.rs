pub const DEFAULT_QUALITY: i32 = 80;
pub const MIN_QUALITY: i32 = 0;
pub const MAX_QUALITY: i32 = 100;

pub const DEFAULT_RESIZE_RATIO: f64 = 1.0;

/// Frame duration used when neither the caller nor the source provides one.
pub const FALLBACK_FRAME_DURATION_MS: u32 = 100;

/// Largest per-frame duration a WebP ANMF chunk can carry (24 bits).
pub const MAX_FRAME_DURATION_MS: u32 = (1 << 24) - 1;

/// libwebp stamps frames with a C `int`, so `frames * duration` must fit in it.
pub const MAX_TIMELINE_MS: u64 = i32::MAX as u64;

/// Largest canvas side a WebP bitstream can describe.
pub const MAX_CANVAS_DIMENSION: u32 = 16383;

/// Maximum input file size in bytes (100MB)
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

// libwebp encoder settings
pub const ENCODER_METHOD_SLOWEST: i32 = 6;
pub const LOOP_FOREVER: i32 = 0;

pub const WEBP_EXTENSION: &str = "webp";

pub const PROGRESS_SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

// Batch parallelism
pub const MIN_AVAILABLE_MEMORY_MIB: u64 = 256;
/// Decoded RGBA frames are far larger than the compressed container.
pub const DECODED_SIZE_MULTIPLIER: f64 = 40.0;

// Common output message prefixes
pub const ORIGINAL_SIZE_PREFIX: &str = "📊 Original size:";
pub const COMPRESSED_SIZE_PREFIX: &str = "📈 Compressed size:";
pub const COMPRESSION_RATIO_PREFIX: &str = "🎯 Compression ratio:";
pub const SUCCESS_PREFIX: &str = "✅";
pub const SKIP_PREFIX: &str = "⏭️ ";
pub const ERROR_PREFIX: &str = "❌";

// Process exit codes
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CODEC_UNAVAILABLE: u8 = 2;
