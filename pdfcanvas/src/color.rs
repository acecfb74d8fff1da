//! Device color conversion to 8-bit RGB.

use std::fmt::Write;

pub type Rgb = [u8; 3];

pub const BLACK: Rgb = [0, 0, 0];
pub const WHITE: Rgb = [255, 255, 255];

/// Float color component to byte. According to pdf file specification, float
/// color component should be rounded to nearest integer, See page 157 of
/// PDF 32000-1:2008
pub fn comp_to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0., 255.) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl DeviceColorSpace {
    /// Number of color components in this color space.
    pub fn components(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }

    /// `color` len should at least be `components()`, missing components
    /// are treated as zero.
    pub fn to_rgb(self, color: &[f32]) -> Rgb {
        let c = |i: usize| color.get(i).copied().unwrap_or_default();
        match self {
            Self::Gray => {
                let v = comp_to_u8(c(0));
                [v, v, v]
            }
            Self::Rgb => [comp_to_u8(c(0)), comp_to_u8(c(1)), comp_to_u8(c(2))],
            Self::Cmyk => cmyk_to_rgb(c(0), c(1), c(2), c(3)),
        }
    }
}

/// Polynomial approximation of a CMYK press profile.
#[allow(clippy::many_single_char_names)]
pub fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> Rgb {
    let c1 = 1.0 - c;
    let m1 = 1.0 - m;
    let y1 = 1.0 - y;
    let k1 = 1.0 - k;

    let x = c1 * m1 * y1 * k1; // 0 0 0 0
    let (mut r, mut g, mut b) = (x, x, x);

    let x = c1 * m1 * y1 * k; // 0 0 0 1
    r += 0.1373 * x;
    g += 0.1216 * x;
    b += 0.1255 * x;
    let x = c1 * m1 * y * k1; // 0 0 1 0
    r += x;
    g += 0.9490 * x;
    let x = c1 * m1 * y * k; // 0 0 1 1
    r += 0.1098 * x;
    g += 0.1020 * x;
    let x = c1 * m * y1 * k1; // 0 1 0 0
    r += 0.9255 * x;
    b += 0.5490 * x;
    let x = c1 * m * y1 * k; // 0 1 0 1
    r += 0.1412 * x;
    let x = c1 * m * y * k1; // 0 1 1 0
    r += 0.9294 * x;
    g += 0.1098 * x;
    b += 0.1412 * x;
    let x = c1 * m * y * k; // 0 1 1 1
    r += 0.1333 * x;
    let x = c * m1 * y1 * k1; // 1 0 0 0
    g += 0.6784 * x;
    b += 0.9373 * x;
    let x = c * m1 * y1 * k; // 1 0 0 1
    g += 0.0588 * x;
    b += 0.1412 * x;
    let x = c * m1 * y * k1; // 1 0 1 0
    g += 0.6510 * x;
    b += 0.3137 * x;
    let x = c * m1 * y * k; // 1 0 1 1
    g += 0.0745 * x;
    let x = c * m * y1 * k1; // 1 1 0 0
    r += 0.1804 * x;
    g += 0.1922 * x;
    b += 0.5725 * x;
    let x = c * m * y1 * k; // 1 1 0 1
    b += 0.0078 * x;
    let x = c * m * y * k1; // 1 1 1 0
    r += 0.2118 * x;
    g += 0.2119 * x;
    b += 0.2235 * x;

    [comp_to_u8(r), comp_to_u8(g), comp_to_u8(b)]
}

/// `#rrggbb`
pub fn make_hex_color(rgb: Rgb) -> String {
    let mut s = String::with_capacity(7);
    s.push('#');
    for c in rgb {
        // writing to a String never fails
        let _ = write!(s, "{c:02x}");
    }
    s
}

/// Relative luminance in `[0, 1]`, sRGB weights on linearized components.
pub fn relative_luminance(rgb: Rgb) -> f32 {
    let lin = |c: u8| {
        let c = f32::from(c) / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.0722f32.mul_add(
        lin(rgb[2]),
        0.2126f32.mul_add(lin(rgb[0]), 0.7152 * lin(rgb[1])),
    )
}

/// Remaps page colors onto a foreground/background pair, indexed by the
/// luminance of the original color: black maps to `foreground`, white to
/// `background`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighContrastMap {
    pub foreground: Rgb,
    pub background: Rgb,
    table: Box<[Rgb; 256]>,
}

impl HighContrastMap {
    /// `None` if the pair is the plain black on white, which needs no remapping.
    pub fn new(foreground: Rgb, background: Rgb) -> Option<Self> {
        if foreground == BLACK && background == WHITE {
            return None;
        }

        let mut table = Box::new([BLACK; 256]);
        for (i, entry) in table.iter_mut().enumerate() {
            let t = i as f32 / 255.0;
            for ch in 0..3 {
                let (f, b) = (f32::from(foreground[ch]), f32::from(background[ch]));
                entry[ch] = t.mul_add(b - f, f).round().clamp(0., 255.) as u8;
            }
        }
        Some(Self {
            foreground,
            background,
            table,
        })
    }

    pub fn map(&self, rgb: Rgb) -> Rgb {
        let idx = (relative_luminance(rgb) * 255.0).round().clamp(0., 255.) as usize;
        self.table[idx]
    }
}
