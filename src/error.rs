use std::io;

/// Errors raised while loading and decoding a GIF.
///
/// Playback itself never fails: once frames are installed every step is
/// infallible and a missing surface or frame is a no-op.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("lzw error: {0}")]
    Lzw(String),

    #[error("invalid lzw minimum code size {0}")]
    InvalidCodeSize(u8),

    #[error("frame {index} at {left},{top} size {width}x{height} lies outside the logical screen")]
    FrameOutOfBounds {
        index: usize,
        left: u16,
        top: u16,
        width: u16,
        height: u16,
    },

    #[error("image needs {needed} bytes, over the {limit} byte limit")]
    MemoryLimit { needed: usize, limit: usize },

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("bad http response: {status} {status_text}")]
    Http { status: u16, status_text: String },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
