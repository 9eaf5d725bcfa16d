//! GIF container
//! <https://en.wikipedia.org/wiki/GIF>
//!
//! Only the block structure is read here. Pixel data stays LZW-compressed
//! until [`crate::decompress_frames`] turns it into frames.

use log::debug;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::combinator::{complete, map, opt};
use nom::multi::{count, length_data, many0, many_till};
use nom::number::complete::{le_u16, u8 as byte};
use nom::sequence::{pair, preceded, terminated, tuple};
use nom::IResult;

use crate::Error;

pub trait Parse
where
    Self: Sized,
{
    fn parse(input: &[u8]) -> IResult<&[u8], Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Gif87a,
    Gif89a,
}

impl Parse for Version {
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        alt((
            map(tag(b"GIF87a"), |_| Self::Gif87a),
            map(tag(b"GIF89a"), |_| Self::Gif89a),
        ))(input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    pub colors: Vec<[u8; 3]>,
}

impl ColorTable {
    fn parse(input: &[u8], len: usize) -> IResult<&[u8], Self> {
        map(
            count(map(tuple((byte, byte, byte)), |(r, g, b)| [r, g, b]), len),
            |colors| Self { colors },
        )(input)
    }

    pub fn get(&self, index: u8) -> Option<[u8; 3]> {
        self.colors.get(index as usize).copied()
    }
}

/// Highest bit indicates presence, lowest three bits indicate length
fn color_table_spec(byte: u8) -> Option<usize> {
    (byte & 0b1000_0000 != 0).then(|| 1 << ((byte & 0b0000_0111) + 1))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalScreenDescriptor {
    pub width: u16,
    pub height: u16,
    pub global_color_table: Option<ColorTable>,
    pub bg_color: u8,
    pub pixel_aspect_ratio: u8,
}

impl Parse for LogicalScreenDescriptor {
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        tuple((le_u16, le_u16, byte, byte, byte))(input).and_then(
            |(rest, (width, height, packed, bg_color, pixel_aspect_ratio))| {
                let (rest, global_color_table) = match color_table_spec(packed) {
                    Some(len) => ColorTable::parse(rest, len).map(|(r, ct)| (r, Some(ct)))?,
                    None => (rest, None),
                };

                let lsd = Self {
                    width,
                    height,
                    global_color_table,
                    bg_color,
                    pixel_aspect_ratio,
                };

                Ok((rest, lsd))
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub local_color_table: Option<ColorTable>,
}

impl Parse for ImageDescriptor {
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        tuple((le_u16, le_u16, le_u16, le_u16, byte))(input).and_then(
            |(rest, (left, top, width, height, packed))| {
                let (rest, local_color_table) = match color_table_spec(packed) {
                    Some(len) => ColorTable::parse(rest, len).map(|(r, ct)| (r, Some(ct)))?,
                    None => (rest, None),
                };

                let id = Self {
                    left,
                    top,
                    width,
                    height,
                    interlaced: packed & 0b0100_0000 != 0,
                    local_color_table,
                };

                Ok((rest, id))
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: Version,
    pub screen_descriptor: LogicalScreenDescriptor,
}

impl Parse for Header {
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        map(
            pair(Version::parse, LogicalScreenDescriptor::parse),
            |(version, screen_descriptor)| Self {
                version,
                screen_descriptor,
            },
        )(input)
    }
}

/// Length-prefixed sub-blocks up to the zero-length terminator, joined.
/// A sub-block cut short by the end of input is an error, not `Incomplete`,
/// so the block list stops cleanly in front of it.
fn sub_blocks(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map(
        many_till(complete(length_data(byte)), tag(b"\0")),
        |(blocks, _): (Vec<&[u8]>, _)| blocks.concat(),
    )(input)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub min_code_size: u8,
    pub data: Vec<u8>,
}

impl Parse for ImageData {
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        map(pair(byte, sub_blocks), |(min_code_size, data)| Self {
            min_code_size,
            data,
        })(input)
    }
}

/// Per-frame metadata from a graphic control extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphicControl {
    pub disposal: u8,
    pub user_input: bool,
    pub transparent_index: Option<u8>,
    /// Hundredths of a second.
    pub delay_cs: u16,
}

impl GraphicControl {
    fn from_bytes(data: &[u8]) -> Option<Self> {
        let [packed, lo, hi, index, ..] = *data else {
            return None;
        };
        Some(Self {
            disposal: (packed >> 2) & 0b111,
            user_input: packed & 0b10 != 0,
            transparent_index: (packed & 0b1 != 0).then_some(index),
            delay_cs: u16::from_le_bytes([lo, hi]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub descriptor: ImageDescriptor,
    pub data: ImageData,
    /// The control block that preceded this image, if any.
    pub control: Option<GraphicControl>,
}

impl Parse for Image {
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        map(
            pair(ImageDescriptor::parse, ImageData::parse),
            |(descriptor, data)| Self {
                descriptor,
                data,
                control: None,
            },
        )(input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    GraphicControl,
    Comment,
    PlainText,
    Application,
    Unknown(u8),
}

impl From<u8> for ExtensionType {
    fn from(byte: u8) -> Self {
        match byte {
            0xF9 => Self::GraphicControl,
            0xFE => Self::Comment,
            0x01 => Self::PlainText,
            0xFF => Self::Application,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub ext_type: ExtensionType,
    pub data: Vec<u8>,
}

impl Parse for Extension {
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        map(pair(byte, sub_blocks), |(label, data)| Self {
            ext_type: label.into(),
            data,
        })(input)
    }
}

impl Extension {
    pub fn graphic_control(&self) -> Option<GraphicControl> {
        match self.ext_type {
            ExtensionType::GraphicControl => GraphicControl::from_bytes(&self.data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Image(Image),
    Extension(Extension),
}

impl Parse for Block {
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        alt((
            map(preceded(tag(b","), Image::parse), Self::Image),
            map(preceded(tag(b"!"), Extension::parse), Self::Extension),
        ))(input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gif {
    pub header: Header,
    pub blocks: Vec<Block>,
}

impl Parse for Gif {
    /// A missing trailer is accepted so truncated files keep every block
    /// that parsed completely.
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        map(
            terminated(pair(Header::parse, many0(Block::parse)), opt(tag(b";"))),
            |(header, blocks)| {
                let mut gif = Self { header, blocks };
                gif.attach_controls();
                gif
            },
        )(input)
    }
}

impl Gif {
    /// Hand each image the graphic control block that directly precedes it.
    fn attach_controls(&mut self) {
        let mut pending = None;
        for block in &mut self.blocks {
            match block {
                Block::Extension(ext) => {
                    if let Some(control) = ext.graphic_control() {
                        pending = Some(control);
                    }
                }
                Block::Image(image) => image.control = pending.take(),
            }
        }
    }

    pub fn width(&self) -> u16 {
        self.header.screen_descriptor.width
    }

    pub fn height(&self) -> u16 {
        self.header.screen_descriptor.height
    }

    pub fn global_color_table(&self) -> Option<&ColorTable> {
        self.header.screen_descriptor.global_color_table.as_ref()
    }

    pub fn images(&self) -> impl Iterator<Item = &Image> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Image(image) => Some(image),
            Block::Extension(_) => None,
        })
    }

    pub fn images_mut(&mut self) -> impl Iterator<Item = &mut Image> {
        self.blocks.iter_mut().filter_map(|block| match block {
            Block::Image(image) => Some(image),
            Block::Extension(_) => None,
        })
    }
}

/// Parse a whole GIF, reporting failures as an offset into `bytes`.
pub fn parse_gif(bytes: &[u8]) -> Result<Gif, Error> {
    match Gif::parse(bytes) {
        Ok((_, gif)) => Ok(gif),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(Error::Parse(format!(
            "{:?} at offset {}",
            e.code,
            bytes.len() - e.input.len()
        ))),
        Err(nom::Err::Incomplete(_)) => Err(Error::Parse("unexpected end of input".to_owned())),
    }
}

/// Some encoders only write a graphic control block for the first frame.
/// Images without one inherit the most recent control seen before them.
pub fn validate_and_fix(gif: &mut Gif) {
    let mut current = None;
    let mut fixed = 0;
    for image in gif.images_mut() {
        current = image.control.or(current);
        if image.control.is_none() && current.is_some() {
            image.control = current;
            fixed += 1;
        }
    }
    if fixed > 0 {
        debug!("filled in missing graphic control on {fixed} frames");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::GifBuilder;

    #[test]
    fn parse_version() {
        for (input, expected) in [(b"GIF87a", Version::Gif87a), (b"GIF89a", Version::Gif89a)] {
            assert_eq!(Version::parse(input).unwrap().1, expected);
        }
        assert!(Version::parse(b"GIF90a").is_err());
    }

    #[test]
    fn parse_sub_blocks() {
        let (rest, data) = sub_blocks(b"\x03abc\x02de\0tail").unwrap();
        assert_eq!(data, b"abcde".to_vec());
        assert_eq!(rest, b"tail");
    }

    #[test]
    fn parse_extension_block() {
        assert_eq!(
            Block::Extension(Extension {
                ext_type: ExtensionType::Comment,
                data: b"f7eyf8e7yh3872h".to_vec(),
            }),
            Block::parse(b"!\xFE\x09f7eyf8e7y\x06h3872h\0").unwrap().1
        );
    }

    #[test]
    fn parse_graphic_control() {
        let (_, block) = Block::parse(b"!\xF9\x04\x09\x0A\x00\x03\0").unwrap();
        let Block::Extension(ext) = block else {
            panic!("expected extension");
        };
        assert_eq!(
            ext.graphic_control(),
            Some(GraphicControl {
                disposal: 2,
                user_input: false,
                transparent_index: Some(3),
                delay_cs: 10,
            })
        );
    }

    #[test]
    fn color_table_sizes() {
        assert_eq!(color_table_spec(0b0000_0111), None);
        assert_eq!(color_table_spec(0b1000_0000), Some(2));
        assert_eq!(color_table_spec(0b1000_0111), Some(256));
    }

    #[test]
    fn parse_image_descriptor_with_local_table() {
        let input = b"\x01\x00\x02\x00\x03\x00\x04\x00\xC0\x01\x02\x03\x04\x05\x06rest";
        let (rest, descriptor) = ImageDescriptor::parse(input).unwrap();
        assert_eq!(rest, b"rest");
        assert_eq!(
            descriptor,
            ImageDescriptor {
                left: 1,
                top: 2,
                width: 3,
                height: 4,
                interlaced: true,
                local_color_table: Some(ColorTable {
                    colors: vec![[1, 2, 3], [4, 5, 6]],
                }),
            }
        );
    }

    #[test]
    fn parse_whole_gif() {
        let bytes = GifBuilder::new(4, 2)
            .comment(b"hello")
            .control(1, Some(0), 5)
            .image(0, 0, 2, 2, &[1, 1, 1, 1])
            .image(2, 0, 2, 2, &[2, 2, 2, 2])
            .build();

        let gif = parse_gif(&bytes).unwrap();
        assert_eq!(gif.header.version, Version::Gif89a);
        assert_eq!((gif.width(), gif.height()), (4, 2));
        assert_eq!(gif.global_color_table().unwrap().colors.len(), 4);
        assert_eq!(gif.blocks.len(), 4);
        assert!(matches!(gif.blocks[0], Block::Extension(_)));

        let images: Vec<_> = gif.images().collect();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].control.map(|c| c.delay_cs), Some(5));
        assert_eq!(images[1].control, None);
        assert_eq!(images[1].descriptor.left, 2);
    }

    #[test]
    fn truncated_gif_keeps_complete_frames() {
        let mut bytes = GifBuilder::new(2, 2)
            .image(0, 0, 2, 2, &[1, 1, 1, 1])
            .image(0, 0, 2, 2, &[2, 2, 2, 2])
            .build();
        // drop the trailer and the end of the second image
        bytes.truncate(bytes.len() - 4);

        let gif = parse_gif(&bytes).unwrap();
        assert_eq!(gif.images().count(), 1);
    }

    #[test]
    fn cut_anywhere_in_last_image_keeps_first() {
        let bytes = GifBuilder::new(2, 2)
            .image(0, 0, 2, 2, &[1, 1, 1, 1])
            .image(0, 0, 2, 2, &[2, 2, 2, 2])
            .build();

        // only the trailer missing
        let gif = parse_gif(&bytes[..bytes.len() - 1]).unwrap();
        assert_eq!(gif.images().count(), 2);

        // terminator, data sub-block, length byte, descriptor
        for cut in 2..=10 {
            let gif = parse_gif(&bytes[..bytes.len() - cut]).unwrap();
            assert_eq!(gif.images().count(), 1, "cut {cut}");
        }
    }

    #[test]
    fn short_sub_block_is_an_error() {
        assert!(matches!(
            sub_blocks(b"\x05ab"),
            Err(nom::Err::Error(_))
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(parse_gif(b"PNG\x89"), Err(Error::Parse(_))));
    }

    #[test]
    fn validate_and_fix_inherits_last_control() {
        let bytes = GifBuilder::new(1, 1)
            .control(2, None, 7)
            .image(0, 0, 1, 1, &[1])
            .image(0, 0, 1, 1, &[2])
            .control(1, Some(3), 9)
            .image(0, 0, 1, 1, &[3])
            .image(0, 0, 1, 1, &[0])
            .build();
        let mut gif = parse_gif(&bytes).unwrap();
        validate_and_fix(&mut gif);

        let disposals: Vec<_> = gif
            .images()
            .map(|image| image.control.map(|c| (c.disposal, c.delay_cs)))
            .collect();
        assert_eq!(
            disposals,
            vec![Some((2, 7)), Some((2, 7)), Some((1, 9)), Some((1, 9))]
        );
    }

    #[test]
    fn validate_and_fix_without_any_control() {
        let bytes = GifBuilder::new(1, 1).image(0, 0, 1, 1, &[1]).build();
        let mut gif = parse_gif(&bytes).unwrap();
        validate_and_fix(&mut gif);
        assert_eq!(gif.images().next().unwrap().control, None);
    }
}
