//! Decoded image samples as delivered by the producer.

use std::rc::Rc;

/// Packed sample layout of an [`ImageData`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ImageKind {
    /// One bit per pixel, rows padded to whole bytes, bit set is white.
    Grayscale1Bpp,
    Rgb24Bpp,
    Rgba32Bpp,
}

impl ImageKind {
    /// Bytes of one packed row of `width` pixels.
    pub fn row_bytes(self, width: u32) -> usize {
        let w = width as usize;
        match self {
            Self::Grayscale1Bpp => w.div_ceil(8),
            Self::Rgb24Bpp => w * 3,
            Self::Rgba32Bpp => w * 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
    pub data: Rc<[u8]>,
    pub interpolate: bool,
}

impl ImageData {
    /// `None` if `data` is shorter than `height` packed rows.
    pub fn new(width: u32, height: u32, kind: ImageKind, data: impl Into<Rc<[u8]>>) -> Option<Self> {
        let data = data.into();
        (data.len() >= kind.row_bytes(width) * height as usize).then_some(Self {
            width,
            height,
            kind,
            data,
            interpolate: false,
        })
    }
}

/// 1-bit stencil mask, rows padded to whole bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskImage {
    pub width: u32,
    pub height: u32,
    pub data: Rc<[u8]>,
    /// Flip bit polarity: set bits become transparent.
    pub inverse_decode: bool,
    /// How many times the producer saw this mask painted, `> 1` turns on
    /// stencil caching.
    pub count: u32,
    /// Identity for the stencil cache.
    pub cache_key: Option<String>,
}

impl MaskImage {
    pub fn new(width: u32, height: u32, data: impl Into<Rc<[u8]>>, inverse_decode: bool) -> Self {
        Self {
            width,
            height,
            data: data.into(),
            inverse_decode,
            count: 1,
            cache_key: None,
        }
    }
}

/// Per-channel lookup tables applied to unpacked samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferMap {
    /// Same table for red, green and blue.
    Single(Box<[u8; 256]>),
    /// Red, green, blue and gray(alpha) tables, `None` keeps the channel.
    PerChannel(Box<[Option<[u8; 256]>; 4]>),
}

impl TransferMap {
    pub fn identity_table() -> [u8; 256] {
        std::array::from_fn(|i| i as u8)
    }

    /// Tables for r, g, b and alpha; alpha passes through unless a fourth
    /// table is given.
    pub fn tables(&self) -> [[u8; 256]; 4] {
        match self {
            Self::Single(t) => [**t, **t, **t, Self::identity_table()],
            Self::PerChannel(tables) => {
                std::array::from_fn(|i| tables[i].unwrap_or_else(Self::identity_table))
            }
        }
    }
}
