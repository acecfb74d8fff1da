use crate::{
    geom::{Matrix, Rectangle},
    image::TransferMap,
    store::ObjId,
};
use std::rc::Rc;

pub mod trans;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl<U> From<Point> for euclid::Point2D<f32, U> {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

impl<U> From<euclid::Point2D<f32, U>> for Point {
    fn from(p: euclid::Point2D<f32, U>) -> Self {
        Self::new(p.x, p.y)
    }
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::FromRepr)]
#[repr(u8)]
pub enum LineCapStyle {
    #[default]
    Butt = 0,
    Round = 1,
    Square = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::FromRepr)]
#[repr(u8)]
pub enum LineJoinStyle {
    #[default]
    Miter = 0,
    Round = 1,
    Bevel = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Default, strum::EnumString)]
pub enum RenderingIntent {
    AbsoluteColorimetric,
    #[default]
    RelativeColorimetric,
    Saturation,
    Perceptual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::FromRepr)]
#[repr(u8)]
pub enum TextRenderingMode {
    #[default]
    Fill = 0,
    Stroke = 1,
    FillAndStroke = 2,
    Invisible = 3,
    FillAndClip = 4,
    StrokeAndClip = 5,
    FillStrokeAndClip = 6,
    Clip = 7,
}

impl TextRenderingMode {
    pub fn fills(self) -> bool {
        matches!(
            self,
            Self::Fill | Self::FillAndStroke | Self::FillAndClip | Self::FillStrokeAndClip
        )
    }

    pub fn strokes(self) -> bool {
        matches!(
            self,
            Self::Stroke | Self::FillAndStroke | Self::StrokeAndClip | Self::FillStrokeAndClip
        )
    }

    /// Glyph outlines are added to the text clipping path.
    pub fn clips(self) -> bool {
        matches!(
            self,
            Self::FillAndClip | Self::StrokeAndClip | Self::FillStrokeAndClip | Self::Clip
        )
    }
}

/// PDF blend modes, parsed from their PDF names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
pub enum BlendMode {
    #[default]
    #[strum(serialize = "Normal", serialize = "Compatible")]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoftMaskSubtype {
    Alpha,
    #[default]
    Luminosity,
}

/// Soft mask carried by a group whose content builds the mask.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoftMaskSpec {
    pub subtype: SoftMaskSubtype,
    /// Backdrop color in RGB, blended under the mask content before sampling.
    pub backdrop: Option<[u8; 3]>,
    pub transfer_map: Option<Rc<TransferMap>>,
}

/// Flags and transform of a transparency group, see `beginGroup`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupOptions {
    pub matrix: Option<Matrix>,
    pub bbox: Rectangle,
    pub isolated: bool,
    pub knockout: bool,
    /// Set when the group is the content of a soft mask.
    pub smask: Option<SoftMaskSpec>,
}

/// One entry of an ExtGState dictionary, already decoded by the producer.
#[derive(Debug, Clone, PartialEq)]
pub enum GStateEntry {
    LineWidth(f32),
    LineCap(LineCapStyle),
    LineJoin(LineJoinStyle),
    MiterLimit(f32),
    Dash(Vec<f32>, f32),
    RenderingIntent(RenderingIntent),
    Flatness(f32),
    Font(ObjId, f32),
    StrokeAlpha(f32),
    FillAlpha(f32),
    /// PDF blend mode name, unknown names are logged and treated as `Normal`.
    BlendMode(String),
    /// `true` activates the soft mask built by the preceding mask group,
    /// `false` turns soft masking off.
    SoftMask(bool),
    TransferFunction(Option<Rc<TransferMap>>),
}
