use std::time::Duration;

use log::{debug, warn};
use weezl::decode::Decoder as LzwDecoder;
use weezl::{BitOrder, LzwStatus};

use crate::frame::{Dimensions, DisposalType, FrameDescriptor};
use crate::gif::{ColorTable, Gif, Image};
use crate::Error;

/// Largest RGBA buffer, in bytes, a single frame or the canvas may need.
pub const DEFAULT_MEMORY_LIMIT: usize = 50_000_000;

/// Decode every image of `gif` into a frame. With `build_patches` off the
/// frames carry only their metadata.
pub fn decompress_frames(gif: &Gif, build_patches: bool) -> Result<Vec<FrameDescriptor>, Error> {
    decompress_frames_limited(gif, build_patches, DEFAULT_MEMORY_LIMIT)
}

/// Like [`decompress_frames`], refusing a canvas or frame whose RGBA buffer
/// would exceed `limit` bytes and any frame that leaves the logical screen.
pub fn decompress_frames_limited(
    gif: &Gif,
    build_patches: bool,
    limit: usize,
) -> Result<Vec<FrameDescriptor>, Error> {
    check_limit(gif.width() as usize * gif.height() as usize, limit)?;
    gif.images()
        .enumerate()
        .map(|(index, image)| {
            let dims = image_dims(image);
            let right = dims.left as u32 + dims.width as u32;
            let bottom = dims.top as u32 + dims.height as u32;
            if right > gif.width() as u32 || bottom > gif.height() as u32 {
                return Err(Error::FrameOutOfBounds {
                    index,
                    left: dims.left,
                    top: dims.top,
                    width: dims.width,
                    height: dims.height,
                });
            }
            check_limit(dims.area(), limit)?;
            decompress_frame(image, gif.global_color_table(), build_patches)
        })
        .collect()
}

fn check_limit(pixel_count: usize, limit: usize) -> Result<(), Error> {
    let needed = pixel_count.saturating_mul(4);
    if needed > limit {
        return Err(Error::MemoryLimit { needed, limit });
    }
    Ok(())
}

fn image_dims(image: &Image) -> Dimensions {
    let descriptor = &image.descriptor;
    Dimensions {
        width: descriptor.width,
        height: descriptor.height,
        left: descriptor.left,
        top: descriptor.top,
    }
}

fn decompress_frame(
    image: &Image,
    global: Option<&ColorTable>,
    build_patch: bool,
) -> Result<FrameDescriptor, Error> {
    let descriptor = &image.descriptor;
    let control = image.control.unwrap_or_default();
    let dims = image_dims(image);

    let patch = if build_patch {
        let fill = control.transparent_index.unwrap_or(0);
        let mut indices = lzw_decode(image, dims.area(), fill)?;
        if descriptor.interlaced {
            indices = deinterlace(&indices, dims.width as usize);
        }
        let table = descriptor.local_color_table.as_ref().or(global);
        generate_patch(&indices, table, control.transparent_index)
    } else {
        Vec::new()
    };

    Ok(FrameDescriptor {
        dims,
        disposal: DisposalType::from(control.disposal),
        delay: Duration::from_millis(control.delay_cs as u64 * 10),
        transparent_index: control.transparent_index,
        patch,
    })
}

/// Decompress exactly `pixel_count` color indices. A stream that ends early
/// is padded with `fill`; surplus output is dropped.
fn lzw_decode(image: &Image, pixel_count: usize, fill: u8) -> Result<Vec<u8>, Error> {
    let min_code_size = image.data.min_code_size;
    if !(1..=11).contains(&min_code_size) {
        return Err(Error::InvalidCodeSize(min_code_size));
    }

    let mut decoder = LzwDecoder::new(BitOrder::Lsb, min_code_size);
    let mut out = vec![fill; pixel_count];
    let mut input = image.data.data.as_slice();
    let mut written = 0;

    while written < pixel_count {
        let result = decoder.decode_bytes(input, &mut out[written..]);
        written += result.consumed_out;
        input = &input[result.consumed_in..];
        match result.status {
            Ok(LzwStatus::Done) | Ok(LzwStatus::NoProgress) => break,
            Ok(LzwStatus::Ok) => {}
            Err(err) => {
                if written == 0 {
                    return Err(Error::Lzw(format!("{err:?}")));
                }
                warn!("lzw stream corrupt after {written} of {pixel_count} pixels: {err:?}");
                break;
            }
        }
        if result.consumed_in == 0 && result.consumed_out == 0 {
            break;
        }
    }

    if written < pixel_count {
        debug!("partial frame: {written} of {pixel_count} pixels decoded");
    }
    Ok(out)
}

/// Reorder rows from the four-pass interlaced layout into top-to-bottom order.
fn deinterlace(pixels: &[u8], width: usize) -> Vec<u8> {
    if width == 0 {
        return pixels.to_vec();
    }
    let rows = pixels.len() / width;
    let mut out = vec![0; pixels.len()];
    let mut from_row = 0;
    for (start, step) in [(0, 8), (4, 8), (2, 4), (1, 2)] {
        for to_row in (start..rows).step_by(step) {
            let from = &pixels[from_row * width..(from_row + 1) * width];
            out[to_row * width..(to_row + 1) * width].copy_from_slice(from);
            from_row += 1;
        }
    }
    out
}

fn generate_patch(indices: &[u8], table: Option<&ColorTable>, transparent: Option<u8>) -> Vec<u8> {
    let mut patch = Vec::with_capacity(indices.len() * 4);
    for &index in indices {
        let color = (transparent != Some(index))
            .then(|| table.and_then(|t| t.get(index)))
            .flatten();
        match color {
            Some([r, g, b]) => patch.extend_from_slice(&[r, g, b, 255]),
            None => patch.extend_from_slice(&[0, 0, 0, 0]),
        }
    }
    patch
}
