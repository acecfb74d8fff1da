//! Pixel routines: unpacking decoded images, expanding stencil masks,
//! box pre-scaling and soft-mask composition.
//!
//! `Pixmap` data is premultiplied RGBA; everything read from image buffers
//! is straight alpha and premultiplied on write.

use anyhow::{bail, Result as AnyResult};
use pdfcanvas::{
    color::Rgb,
    graphics::SoftMaskSubtype,
    image::{ImageData, ImageKind, MaskImage},
};
use tiny_skia::{Pixmap, PixmapRef, PremultipliedColorU8};

/// Images are unpacked in bands of this many rows.
pub const FULL_CHUNK_HEIGHT: u32 = 16;

/// Soft masks are composed in row chunks of about this many pixels.
pub const SMASK_CHUNK_PIXELS: u32 = 1 << 20;

const OPAQUE_BLACK: [u8; 4] = [0, 0, 0, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];
const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

fn premultiply(px: &mut [u8]) {
    let a = u16::from(px[3]);
    if a == 255 {
        return;
    }
    for c in &mut px[..3] {
        *c = ((u16::from(*c) * a + 127) / 255) as u8;
    }
}

/// Copy a band of straight RGBA rows into `dst` starting at row `y`.
fn put_chunk(dst: &mut Pixmap, chunk: &mut [u8], y: u32, rows: u32) {
    let row_len = dst.width() as usize * 4;
    let start = y as usize * row_len;
    let len = rows as usize * row_len;
    let chunk = &mut chunk[..len];
    chunk.chunks_exact_mut(4).for_each(premultiply);
    dst.data_mut()[start..start + len].copy_from_slice(chunk);
}

/// Unpack `img` into `dst`, which must have the image size. `transfer`
/// tables remap r, g, b and alpha before premultiplying.
pub fn put_binary_image_data(
    dst: &mut Pixmap,
    img: &ImageData,
    transfer: Option<&[[u8; 256]; 4]>,
) -> AnyResult<()> {
    if dst.width() != img.width || dst.height() != img.height {
        bail!(
            "image {}x{} does not fit surface {}x{}",
            img.width,
            img.height,
            dst.width(),
            dst.height()
        );
    }

    let width = img.width as usize;
    let row_bytes = img.kind.row_bytes(img.width);
    let src = &img.data[..];
    let mut chunk = vec![0u8; width * FULL_CHUNK_HEIGHT as usize * 4];
    let mut y = 0;
    while y < img.height {
        let rows = FULL_CHUNK_HEIGHT.min(img.height - y);
        for r in 0..rows as usize {
            let src_row = (y as usize + r) * row_bytes;
            let dest_row = &mut chunk[r * width * 4..(r + 1) * width * 4];
            match img.kind {
                ImageKind::Grayscale1Bpp => {
                    for (x, px) in dest_row.chunks_exact_mut(4).enumerate() {
                        let v = match src.get(src_row + x / 8) {
                            Some(byte) if byte & (0x80 >> (x % 8)) != 0 => WHITE,
                            Some(_) => OPAQUE_BLACK,
                            // ran out of input
                            None => TRANSPARENT,
                        };
                        px.copy_from_slice(&v);
                    }
                }
                ImageKind::Rgb24Bpp => {
                    for (x, px) in dest_row.chunks_exact_mut(4).enumerate() {
                        let s = src_row + x * 3;
                        match src.get(s..s + 3) {
                            Some(rgb) => {
                                px[..3].copy_from_slice(rgb);
                                px[3] = 255;
                            }
                            None => px.copy_from_slice(&TRANSPARENT),
                        }
                    }
                }
                ImageKind::Rgba32Bpp => {
                    let end = (src_row + width * 4).min(src.len());
                    let avail = end.saturating_sub(src_row);
                    if avail > 0 {
                        dest_row[..avail].copy_from_slice(&src[src_row..end]);
                    }
                    dest_row[avail..].fill(0);
                }
            }
            if let Some(tables) = transfer {
                for px in dest_row.chunks_exact_mut(4) {
                    for (c, table) in px.iter_mut().zip(tables) {
                        *c = table[*c as usize];
                    }
                }
            }
        }
        put_chunk(dst, &mut chunk, y, rows);
        y += rows;
    }
    Ok(())
}

/// Expand `height` rows of a 1-bit mask into RGBA pixels of `dest`. Set
/// bits give opaque black, clear bits transparent; `inverse_decode` swaps
/// the two. Rows are padded to whole bytes, input past the end of `src`
/// reads as `0xFF`. Returns the new source position and the number of
/// pixels written.
pub fn apply_mask_image_data(
    src: &[u8],
    mut src_pos: usize,
    dest: &mut [u8],
    width: u32,
    height: u32,
    inverse_decode: bool,
) -> (usize, usize) {
    let (zero, one) = if inverse_decode {
        (OPAQUE_BLACK, TRANSPARENT)
    } else {
        (TRANSPARENT, OPAQUE_BLACK)
    };
    let width = width as usize;
    let mut pixels = dest.chunks_exact_mut(4);
    let mut dest_pos = 0;
    for _ in 0..height {
        let mut x = 0;
        while x < width {
            let elem = src.get(src_pos).copied().unwrap_or(0xFF);
            src_pos += 1;
            for bit in 0..8.min(width - x) {
                let Some(px) = pixels.next() else {
                    return (src_pos, dest_pos);
                };
                let v = if elem & (0x80 >> bit) != 0 { one } else { zero };
                px.copy_from_slice(&v);
                dest_pos += 1;
            }
            x += 8;
        }
    }
    (src_pos, dest_pos)
}

/// Unpack a stencil mask into `dst`, which must have the mask size.
pub fn put_binary_image_mask(dst: &mut Pixmap, mask: &MaskImage) -> AnyResult<()> {
    if dst.width() != mask.width || dst.height() != mask.height {
        bail!("mask does not fit surface");
    }
    let mut chunk = vec![0u8; mask.width as usize * FULL_CHUNK_HEIGHT as usize * 4];
    let mut src_pos = 0;
    let mut y = 0;
    while y < mask.height {
        let rows = FULL_CHUNK_HEIGHT.min(mask.height - y);
        (src_pos, _) = apply_mask_image_data(
            &mask.data,
            src_pos,
            &mut chunk,
            mask.width,
            rows,
            mask.inverse_decode,
        );
        put_chunk(dst, &mut chunk, y, rows);
        y += rows;
    }
    Ok(())
}

/// Next size when halving an axis of `size` pixels.
pub fn half_size(size: u32) -> u32 {
    if size >= 16384 {
        (size / 2).saturating_sub(1).max(1)
    } else {
        size.div_ceil(2)
    }
}

/// Box filter `src` into `dst`, each destination pixel averages the source
/// pixels it covers.
pub fn box_downscale(src: PixmapRef, dst: &mut Pixmap) {
    let (sw, sh) = (src.width() as usize, src.height() as usize);
    let (dw, dh) = (dst.width() as usize, dst.height() as usize);
    let span = |i: usize, s: usize, d: usize| {
        let start = i * s / d;
        let end = ((i + 1) * s).div_ceil(d).clamp(start + 1, s);
        start..end
    };
    let src_px = src.pixels();
    let dst_px = dst.pixels_mut();
    for y in 0..dh {
        let ys = span(y, sh, dh);
        for x in 0..dw {
            let xs = span(x, sw, dw);
            let mut sum = [0u32; 4];
            let mut n = 0u32;
            for sy in ys.clone() {
                for sx in xs.clone() {
                    let p = src_px[sy * sw + sx];
                    sum[0] += u32::from(p.red());
                    sum[1] += u32::from(p.green());
                    sum[2] += u32::from(p.blue());
                    sum[3] += u32::from(p.alpha());
                    n += 1;
                }
            }
            let avg = sum.map(|v| ((v + n / 2) / n) as u8);
            // averages of premultiplied pixels stay premultiplied
            dst_px[y * dw + x] = PremultipliedColorU8::from_rgba(avg[0], avg[1], avg[2], avg[3])
                .unwrap_or(PremultipliedColorU8::TRANSPARENT);
        }
    }
}

/// Soft-mask parameters shared by all chunks of one composition.
#[derive(Debug, Clone, Copy)]
pub struct SoftMaskCompose<'a> {
    pub subtype: SoftMaskSubtype,
    pub backdrop: Option<Rgb>,
    pub transfer: Option<&'a [u8; 256]>,
}

impl SoftMaskCompose<'_> {
    /// Mask value in `0..=255` of a mask pixel, straight alpha.
    fn factor(&self, [mut r, mut g, mut b, a]: [u8; 4], layer_alpha: u8) -> u8 {
        if let Some([r0, g0, b0]) = self.backdrop {
            if a == 0 {
                (r, g, b) = (r0, g0, b0);
            } else if a < 255 {
                let blend = |c: u8, c0: u8| {
                    ((u32::from(c) * u32::from(a) + u32::from(c0) * (255 - u32::from(a))) >> 8)
                        as u8
                };
                (r, g, b) = (blend(r, r0), blend(g, g0), blend(b, b0));
            }
        }
        let layer_alpha = u32::from(layer_alpha);
        match self.subtype {
            SoftMaskSubtype::Luminosity => {
                let y = u32::from(r) * 77 + u32::from(g) * 152 + u32::from(b) * 28;
                match self.transfer {
                    Some(t) => ((layer_alpha * u32::from(t[(y >> 8) as usize])) >> 8) as u8,
                    None => ((layer_alpha * y) >> 16) as u8,
                }
            }
            SoftMaskSubtype::Alpha => {
                let alpha = self.transfer.map_or(a, |t| t[a as usize]);
                (layer_alpha * u32::from(alpha) / 255) as u8
            }
        }
    }
}

/// Integer pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Scale the alpha of `layer` pixels inside `layer_box` by the mask value
/// of the `mask` pixel at the same position shifted by `-mask_offset`.
/// Pixels outside `mask` read as transparent black. Mask samples are read
/// into a buffer one row chunk of about `chunk_pixels` pixels at a time.
pub fn compose_smask(
    mask: PixmapRef,
    mask_offset: (i32, i32),
    layer: &mut Pixmap,
    layer_box: PixelBox,
    params: &SoftMaskCompose,
    chunk_pixels: u32,
) {
    if layer_box.width == 0 || layer_box.height == 0 {
        return;
    }
    let chunk_rows = layer_box
        .height
        .min(chunk_pixels.div_ceil(layer_box.width).max(1));
    let (lw, lh) = (layer.width() as i32, layer.height() as i32);
    let (mw, mh) = (mask.width() as i32, mask.height() as i32);
    let mask_px = mask.pixels();
    let layer_px = layer.pixels_mut();
    let width = layer_box.width;

    // mask samples of the current chunk, demultiplied
    let mut samples: Vec<[u8; 4]> = Vec::with_capacity((chunk_rows * width) as usize);
    let mut row = 0;
    while row < layer_box.height {
        let rows = chunk_rows.min(layer_box.height - row);
        samples.clear();
        for dy in row..row + rows {
            let my = layer_box.y + dy as i32 - mask_offset.1;
            samples.extend((0..width).map(|dx| {
                let mx = layer_box.x + dx as i32 - mask_offset.0;
                if (0..mw).contains(&mx) && (0..mh).contains(&my) {
                    let c = mask_px[(my * mw + mx) as usize].demultiply();
                    [c.red(), c.green(), c.blue(), c.alpha()]
                } else {
                    TRANSPARENT
                }
            }));
        }
        for (i, m) in samples.iter().enumerate() {
            let i = i as u32;
            let ly = layer_box.y + (row + i / width) as i32;
            let lx = layer_box.x + (i % width) as i32;
            if !(0..lh).contains(&ly) || !(0..lw).contains(&lx) {
                continue;
            }
            let idx = (ly * lw + lx) as usize;
            let p = layer_px[idx];
            if p.alpha() == 0 {
                continue;
            }
            layer_px[idx] = scale_premultiplied(p, params.factor(*m, p.alpha()));
        }
        row += rows;
    }
}

fn scale_premultiplied(p: PremultipliedColorU8, new_alpha: u8) -> PremultipliedColorU8 {
    let a = u32::from(p.alpha());
    let scale = |c: u8| (u32::from(c) * u32::from(new_alpha) / a) as u8;
    PremultipliedColorU8::from_rgba(scale(p.red()), scale(p.green()), scale(p.blue()), new_alpha)
        .unwrap_or(PremultipliedColorU8::TRANSPARENT)
}
