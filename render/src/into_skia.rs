use pdfcanvas::{
    color::Rgb,
    geom::Rectangle,
    graphics::{BlendMode, LineCapStyle, LineJoinStyle, Point},
};

pub trait IntoSkia {
    type Output;
    fn into_skia(self) -> Self::Output;
}

impl IntoSkia for Point {
    type Output = tiny_skia::Point;

    fn into_skia(self) -> Self::Output {
        Self::Output::from_xy(self.x, self.y)
    }
}

impl IntoSkia for Rectangle {
    /// `None` if a coordinate is not finite.
    type Output = Option<tiny_skia::Rect>;

    fn into_skia(self) -> Self::Output {
        tiny_skia::Rect::from_ltrb(self.left_x, self.lower_y, self.right_x, self.upper_y)
    }
}

impl IntoSkia for LineCapStyle {
    type Output = tiny_skia::LineCap;

    fn into_skia(self) -> Self::Output {
        match self {
            Self::Butt => Self::Output::Butt,
            Self::Round => Self::Output::Round,
            Self::Square => Self::Output::Square,
        }
    }
}

impl IntoSkia for LineJoinStyle {
    type Output = tiny_skia::LineJoin;

    fn into_skia(self) -> Self::Output {
        match self {
            Self::Miter => Self::Output::Miter,
            Self::Round => Self::Output::Round,
            Self::Bevel => Self::Output::Bevel,
        }
    }
}

impl IntoSkia for BlendMode {
    type Output = tiny_skia::BlendMode;

    fn into_skia(self) -> Self::Output {
        use tiny_skia::BlendMode as B;
        match self {
            Self::Normal => B::SourceOver,
            Self::Multiply => B::Multiply,
            Self::Screen => B::Screen,
            Self::Overlay => B::Overlay,
            Self::Darken => B::Darken,
            Self::Lighten => B::Lighten,
            Self::ColorDodge => B::ColorDodge,
            Self::ColorBurn => B::ColorBurn,
            Self::HardLight => B::HardLight,
            Self::SoftLight => B::SoftLight,
            Self::Difference => B::Difference,
            Self::Exclusion => B::Exclusion,
            Self::Hue => B::Hue,
            Self::Saturation => B::Saturation,
            Self::Color => B::Color,
            Self::Luminosity => B::Luminosity,
        }
    }
}

pub fn rgb_to_skia(rgb: Rgb, alpha: f32) -> tiny_skia::Color {
    let mut c = tiny_skia::Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255);
    c.set_alpha(alpha);
    c
}
