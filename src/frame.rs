use std::sync::Arc;
use std::time::Duration;

use crate::surface::Rect;

/// Size and placement of a frame's patch within the logical screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u16,
    pub height: u16,
    pub left: u16,
    pub top: u16,
}

impl Dimensions {
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn rect(&self) -> Rect {
        Rect {
            x: self.left as u32,
            y: self.top as u32,
            width: self.width as u32,
            height: self.height as u32,
        }
    }
}

/// What happens to a frame's area before the next frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposalType {
    #[default]
    None,
    DoNotDispose,
    RestoreBackground,
    /// Not supported: frames using it are skipped during playback.
    RestoreToPrevious,
}

impl From<u8> for DisposalType {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::DoNotDispose,
            2 => Self::RestoreBackground,
            3 => Self::RestoreToPrevious,
            // 0 and the reserved codes 4..=7
            _ => Self::None,
        }
    }
}

impl DisposalType {
    pub fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::DoNotDispose => 1,
            Self::RestoreBackground => 2,
            Self::RestoreToPrevious => 3,
        }
    }
}

/// One decoded frame: where it goes and its RGBA pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub dims: Dimensions,
    pub disposal: DisposalType,
    pub delay: Duration,
    pub transparent_index: Option<u8>,
    /// `width * height * 4` bytes, RGBA.
    pub patch: Vec<u8>,
}

/// The decoded frames of one GIF, shared immutably for a whole session.
#[derive(Debug, Clone, Default)]
pub struct FrameStore {
    frames: Arc<[FrameDescriptor]>,
    screen_width: u16,
    screen_height: u16,
}

impl FrameStore {
    pub fn new(frames: Vec<FrameDescriptor>, screen_width: u16, screen_height: u16) -> Self {
        Self {
            frames: frames.into(),
            screen_width,
            screen_height,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FrameDescriptor> {
        self.frames.get(index)
    }

    pub fn screen_size(&self) -> (u16, u16) {
        (self.screen_width, self.screen_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposal_codes() {
        for (code, expected) in [
            (0, DisposalType::None),
            (1, DisposalType::DoNotDispose),
            (2, DisposalType::RestoreBackground),
            (3, DisposalType::RestoreToPrevious),
            (5, DisposalType::None),
        ] {
            assert_eq!(DisposalType::from(code), expected);
        }
        assert_eq!(DisposalType::RestoreBackground.code(), 2);
    }

    #[test]
    fn dimensions_rect() {
        let dims = Dimensions {
            width: 3,
            height: 2,
            left: 4,
            top: 1,
        };
        assert_eq!(dims.area(), 6);
        assert_eq!(
            dims.rect(),
            Rect {
                x: 4,
                y: 1,
                width: 3,
                height: 2
            }
        );
    }

    #[test]
    fn empty_store() {
        let store = FrameStore::default();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.get(0).is_none());
    }
}
