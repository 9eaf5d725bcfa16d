//! Assembles small GIF files for tests.

use weezl::encode::Encoder;
use weezl::BitOrder;

/// Global palette used by every built GIF: black, red, green, blue.
pub const PALETTE: [[u8; 3]; 4] = [[0, 0, 0], [255, 0, 0], [0, 255, 0], [0, 0, 255]];

pub struct GifBuilder {
    bytes: Vec<u8>,
}

impl GifBuilder {
    pub fn new(width: u16, height: u16) -> Self {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        // global table present, 2^(1+1) entries
        bytes.extend_from_slice(&[0b1000_0001, 0, 0]);
        for color in PALETTE {
            bytes.extend_from_slice(&color);
        }
        Self { bytes }
    }

    pub fn control(mut self, disposal: u8, transparent: Option<u8>, delay_cs: u16) -> Self {
        let packed = (disposal << 2) | transparent.is_some() as u8;
        let [lo, hi] = delay_cs.to_le_bytes();
        self.bytes.extend_from_slice(&[
            b'!',
            0xF9,
            4,
            packed,
            lo,
            hi,
            transparent.unwrap_or(0),
            0,
        ]);
        self
    }

    pub fn comment(mut self, text: &[u8]) -> Self {
        self.bytes.extend_from_slice(&[b'!', 0xFE]);
        push_sub_blocks(&mut self.bytes, text);
        self
    }

    pub fn image(self, left: u16, top: u16, width: u16, height: u16, indices: &[u8]) -> Self {
        self.image_block(left, top, width, height, 0, indices)
    }

    /// `indices` must already be in interlaced row order.
    pub fn interlaced_image(self, width: u16, height: u16, indices: &[u8]) -> Self {
        self.image_block(0, 0, width, height, 0b0100_0000, indices)
    }

    fn image_block(
        mut self,
        left: u16,
        top: u16,
        width: u16,
        height: u16,
        packed: u8,
        indices: &[u8],
    ) -> Self {
        self.bytes.push(b',');
        for value in [left, top, width, height] {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        self.bytes.push(packed);
        self.bytes.push(2);
        let compressed = Encoder::new(BitOrder::Lsb, 2)
            .encode(indices)
            .expect("indices fit in a 2-bit code size");
        push_sub_blocks(&mut self.bytes, &compressed);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.bytes.push(b';');
        self.bytes
    }
}

fn push_sub_blocks(bytes: &mut Vec<u8>, data: &[u8]) {
    for chunk in data.chunks(255) {
        bytes.push(chunk.len() as u8);
        bytes.extend_from_slice(chunk);
    }
    bytes.push(0);
}
