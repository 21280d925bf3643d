//! Raster decoding, rescaling, and PNG encoding.
//!
//! Raster payloads of icon resources are either PNG streams or BMP DIB
//! fragments without a file header. Both forms are decoded by wrapping the
//! payload in a single-image container and running the container decoder.

use std::io::Cursor;

use image::{imageops, imageops::FilterType, ImageFormat, Rgba, RgbaImage};
use log::trace;

use crate::{errors::*, group::*, ico::*};

/// Decode a raster payload into an RGBA image.
///
/// Palette rasters and the transparency mask of DIB payloads are resolved by
/// the container decoder, the result always carries 8 bit RGBA pixels.
pub fn decode_raster(variant: &IconVariant, raster: &[u8]) -> Result<RgbaImage, RenderError> {
    let container = build_single_ico(variant, raster);
    let image = image::load_from_memory_with_format(&container, ImageFormat::Ico)
        .map_err(RenderError::InvalidRaster)?;
    Ok(image.to_rgba8())
}

/// Rescale an RGBA image to a square target size.
///
/// Color channels are premultiplied by alpha before filtering and divided
/// back out afterwards. Pixels that end up fully transparent are zeroed.
pub fn resample(image: RgbaImage, size: u32) -> RgbaImage {
    if image.width() == size && image.height() == size {
        return image;
    }
    let mut premultiplied = image;
    for pixel in premultiplied.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as u16;
        *pixel = Rgba([
            ((r as u16 * alpha + 127) / 255) as u8,
            ((g as u16 * alpha + 127) / 255) as u8,
            ((b as u16 * alpha + 127) / 255) as u8,
            a,
        ]);
    }
    let mut resized = imageops::resize(&premultiplied, size, size, FilterType::CatmullRom);
    for pixel in resized.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        if a == 0 {
            *pixel = Rgba([0, 0, 0, 0]);
        } else {
            let alpha = a as u16;
            *pixel = Rgba([
                (r as u16 * 255 / alpha).min(255) as u8,
                (g as u16 * 255 / alpha).min(255) as u8,
                (b as u16 * 255 / alpha).min(255) as u8,
                a,
            ]);
        }
    }
    resized
}

/// Encode an RGBA image as a PNG stream.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut data = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        .map_err(RenderError::EncodeFailed)?;
    Ok(data)
}

/// Decode a raster payload and produce a PNG stream at the target size.
pub fn render_png(variant: &IconVariant, raster: &[u8], size: u32) -> Result<Vec<u8>, RenderError> {
    let image = decode_raster(variant, raster)?;
    trace!(
        "decoded {}x{} raster, target size {}",
        image.width(),
        image.height(),
        size
    );
    let image = resample(image, size);
    encode_png(&image)
}

/// Decode a raster payload and produce a single-image ICO container holding a
/// PNG stream at the target size.
pub fn render_ico(variant: &IconVariant, raster: &[u8], size: u32) -> Result<Vec<u8>, RenderError> {
    let data = render_png(variant, raster, size)?;
    Ok(build_single_ico(&IconVariant::for_size(size), &data))
}
