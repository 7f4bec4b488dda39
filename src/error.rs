use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::encoder::WebpEncodeError;

#[derive(Debug, Error)]
pub enum RecompressionError {
    #[error("Failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Not an animated image: {0:?}")]
    NotAnimated(PathBuf),

    #[error("Failed to encode {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: WebpEncodeError,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("File too large: {0} bytes. Maximum allowed: {1} bytes")]
    FileTooLarge(u64, u64),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Failed to create output directory: {0}")]
    DirectoryCreationFailed(PathBuf),

    #[error("No WebP files found in input path: {0}")]
    NoInputFilesFound(String),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),

    #[error("WebP codec support unavailable: {0}")]
    CodecUnavailable(String),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    NotAnimated,
    Encode,
    Processing,
}

impl RecompressionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecompressionError::Decode { .. } => ErrorKind::Decode,
            RecompressionError::NotAnimated(_) => ErrorKind::NotAnimated,
            RecompressionError::Encode { .. } | RecompressionError::Write { .. } => {
                ErrorKind::Encode
            }
            _ => ErrorKind::Processing,
        }
    }

    /// A skip means "nothing to do", not a broken file.
    pub fn is_skip(&self) -> bool {
        self.kind() == ErrorKind::NotAnimated
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Decode => "DecodeError",
            ErrorKind::NotAnimated => "NotAnimatedError",
            ErrorKind::Encode => "EncodeError",
            ErrorKind::Processing => "ProcessingError",
        };
        write!(f, "{}", name)
    }
}

pub type Result<T> = std::result::Result<T, RecompressionError>;
