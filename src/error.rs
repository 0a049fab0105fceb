use thiserror::Error;

/// Failures while fetching or decoding the base image.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("I/O error while reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("invalid placeholder size {0}x{1}")]
    InvalidSize(u32, u32),

    #[error("image load timed out after {0} ms")]
    TimedOut(u128),
}

/// A string that does not describe a `#rrggbb` color.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("expected 6 hex digits, got {0:?}")]
    Length(String),

    #[error("invalid hex digit in {0:?}")]
    Digit(String),

    #[error("expected H,S,V with H in 0..360 and S,V in 0..100, got {0:?}")]
    Hsv(String),
}

/// Failures of the generation request cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("generation timed out after {0} ms")]
    TimedOut(u128),
}
