pub mod batch;
pub mod cli;
pub mod constants;
pub mod encoder;
pub mod error;
pub mod info;
pub mod logger;
pub mod processing;
pub mod source;
pub mod utils;

pub use batch::{
    collect_webp_files, generate_output_path, BatchConfig, BatchRunner, BatchSummary, FileReport,
};
pub use encoder::{
    encode_animation, probe_codec_support, AnimatedWebpEncoder, AnimationSettings, CodecSupport,
    WebpEncodeError,
};
pub use error::{ErrorKind, RecompressionError, Result};
pub use info::{get_animation_info, print_animation_info, AnimationInfo};
pub use processing::{
    recompress, resize_frame, resolve_frame_duration, target_dimensions, RecompressOptions,
    RecompressionRequest, SizeReport,
};
pub use source::{Frame, SourceImage};
