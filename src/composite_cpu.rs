use image::RgbImage;

use crate::foundation::error::{StoryError, StoryResult};

pub type PremulRgba8 = [u8; 4];

/// Source-over of a premultiplied pixel onto an opaque RGB pixel.
pub fn over_opaque(dst: [u8; 3], src: PremulRgba8) -> [u8; 3] {
    if src[3] == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 3];
    for i in 0..3 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

/// Composite a full-frame premultiplied RGBA8 layer onto `dst`.
pub fn over_rgba8_premul_in_place(dst: &mut RgbImage, src: &[u8]) -> StoryResult<()> {
    let expected = (dst.width() as usize)
        .checked_mul(dst.height() as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| StoryError::validation("overlay buffer size overflow"))?;
    if src.len() != expected {
        return Err(StoryError::validation(
            "over_rgba8_premul_in_place expects a width*height*4 layer",
        ));
    }
    for (d, s) in dst.pixels_mut().zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        d.0 = over_opaque(d.0, [s[0], s[1], s[2], s[3]]);
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
