//! Plays decoded GIF animations onto a pixel surface.
//!
//! [`GifPlayer`] composites each frame's patch onto a persistent canvas
//! following the GIF disposal rules and advances on a fixed cadence driven by
//! the host's refresh loop.

mod config;
mod decompress;
mod error;
mod frame;
pub mod gif;
mod player;
mod surface;
#[cfg(test)]
mod test_util;
mod timing;

pub use config::{Args, PlayerConfig, Source, DEFAULT_DELAY};
pub use decompress::{decompress_frames, decompress_frames_limited, DEFAULT_MEMORY_LIMIT};
pub use error::Error;
pub use frame::{Dimensions, DisposalType, FrameDescriptor, FrameStore};
pub use player::{FrameChange, GifPlayer, PlayerState};
pub use surface::{Canvas, ImageData, Rect, Surface};
pub use timing::RequestTimeout;
