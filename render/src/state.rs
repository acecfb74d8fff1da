//! Graphics state saved by `q` and restored by `Q`.

use crate::{into_skia::IntoSkia, surface::SharedSurface};
use ahash::HashMap;
use educe::Educe;
use log::debug;
use pdfcanvas::{
    color::{make_hex_color, HighContrastMap, Rgb, BLACK},
    font::LoadedFont,
    geom::{scale_min_max, singular_value_decompose_2d_scale, Matrix, MinMax, Rectangle},
    graphics::{BlendMode, LineCapStyle, LineJoinStyle, Point, SoftMaskSubtype, TextRenderingMode},
    image::TransferMap,
    pattern::PatternIr,
};
use std::rc::Rc;
use tiny_skia::{Stroke, StrokeDash};

/// What fill or stroke operations paint with.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintSource {
    Solid(Rgb),
    /// `color` is the stencil color of an uncolored tiling pattern.
    Pattern {
        pattern: Rc<PatternIr>,
        color: Option<Rgb>,
    },
    /// Painting has no visible effect.
    Transparent,
}

impl PaintSource {
    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern { .. })
    }
}

/// Kind of painting a path bounding box is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Fill,
    Stroke,
    Shading,
}

#[derive(Debug, Clone, Educe)]
#[educe(Default)]
pub struct TextState {
    pub font: Option<Rc<LoadedFont>>,
    pub font_size: f32,
    /// -1 if the font size was set negative, or the font is drawn right to left.
    #[educe(Default = 1.0)]
    pub font_direction: f32,
    pub char_spacing: f32,
    pub word_spacing: f32,
    #[educe(Default = 1.0)]
    pub h_scale: f32,
    pub leading: f32,
    pub rise: f32,
    pub render_mode: TextRenderingMode,
    #[educe(Default(expression = Matrix::identity()))]
    pub text_matrix: Matrix,
    #[educe(Default = 1.0)]
    pub text_matrix_scale: f32,
    pub x: f32,
    pub y: f32,
    pub line_x: f32,
    pub line_y: f32,
}

impl TextState {
    pub fn begin(&mut self) {
        self.set_text_matrix(Matrix::identity());
    }

    pub fn set_text_matrix(&mut self, m: Matrix) {
        self.text_matrix = m;
        self.text_matrix_scale = m.m11.hypot(m.m12);
        self.x = 0.0;
        self.line_x = 0.0;
        self.y = 0.0;
        self.line_y = 0.0;
    }

    pub fn move_text(&mut self, x: f32, y: f32) {
        self.line_x += x;
        self.line_y += y;
        self.x = self.line_x;
        self.y = self.line_y;
    }

    pub fn next_line(&mut self) {
        self.move_text(0.0, -self.leading);
    }
}

/// Soft mask rendered by a group, waiting to be activated by `SetGState`.
pub struct SMaskLayer {
    pub surface: SharedSurface,
    /// Device position of the mask surface origin.
    pub offset: (i32, i32),
    pub subtype: SoftMaskSubtype,
    pub backdrop: Option<Rgb>,
    /// Maps mask luminosity or alpha.
    pub transfer: Option<[u8; 256]>,
}

impl std::fmt::Debug for SMaskLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SMaskLayer")
            .field("surface", &self.surface.borrow().id())
            .field("offset", &self.offset)
            .field("subtype", &self.subtype)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Educe)]
#[educe(Default)]
pub struct GraphicsState {
    #[educe(Default(expression = PaintSource::Solid(BLACK)))]
    pub fill: PaintSource,
    #[educe(Default(expression = PaintSource::Solid(BLACK)))]
    pub stroke: PaintSource,
    #[educe(Default = 1.0)]
    pub fill_alpha: f32,
    #[educe(Default = 1.0)]
    pub stroke_alpha: f32,
    pub blend_mode: BlendMode,
    #[educe(Default = 1.0)]
    pub line_width: f32,
    pub line_cap: LineCapStyle,
    pub line_join: LineJoinStyle,
    #[educe(Default = 10.0)]
    pub miter_limit: f32,
    pub dash: Vec<f32>,
    pub dash_phase: f32,
    pub text: TextState,
    /// Device space bounds of the path under construction.
    pub min_max: MinMax,
    /// Device space bounds of the clip region.
    #[educe(Default(expression = Rectangle::EMPTY))]
    pub clip_box: Rectangle,
    pub active_smask: Option<Rc<SMaskLayer>>,
    pub transfer_map: Option<Rc<TransferMap>>,
    /// Path cursor in user space, the start of `v` curves.
    pub current_point: Point,
}

impl GraphicsState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            clip_box: Rectangle::from_xywh(0.0, 0.0, width as f32, height as f32),
            ..Default::default()
        }
    }

    pub fn update_path_min_max(&mut self, transform: &Matrix, x: f32, y: f32) {
        let p = transform.transform_point((x, y).into());
        self.min_max.update(p.x, p.y);
    }

    pub fn update_rect_min_max(&mut self, transform: &Matrix, rect: &Rectangle) {
        for (x, y) in [
            (rect.left_x, rect.lower_y),
            (rect.right_x, rect.lower_y),
            (rect.right_x, rect.upper_y),
            (rect.left_x, rect.upper_y),
        ] {
            self.update_path_min_max(transform, x, y);
        }
    }

    /// Merge user space bounds, `transform` only scales, flips or turns
    /// by a multiple of 90°.
    pub fn update_scaling_path_min_max(&mut self, transform: &Matrix, mut min_max: MinMax) {
        if min_max.is_empty() {
            return;
        }
        scale_min_max(transform, &mut min_max);
        let [x0, y0, x1, y1] = min_max.0;
        self.min_max.update(x0, y0);
        self.min_max.update(x1, y1);
    }

    /// Device bounds of the current path; stroke bounds are padded by half
    /// the line width scaled by `transform`.
    pub fn path_bbox(&self, kind: PathKind, transform: &Matrix) -> Option<Rectangle> {
        let mut rect = self.min_max.to_rect()?;
        if kind == PathKind::Stroke {
            let [sx, sy] = singular_value_decompose_2d_scale(transform);
            let (pad_x, pad_y) = (sx * self.line_width / 2.0, sy * self.line_width / 2.0);
            rect.left_x -= pad_x;
            rect.lower_y -= pad_y;
            rect.right_x += pad_x;
            rect.upper_y += pad_y;
        }
        Some(rect)
    }

    /// Path bounds limited by the clip box, `None` if nothing is visible.
    pub fn clipped_path_bbox(&self, kind: PathKind, transform: &Matrix) -> Option<Rectangle> {
        if self.clip_box.is_empty() {
            return None;
        }
        self.path_bbox(kind, transform)
            .and_then(|b| self.clip_box.intersect(&b))
    }

    /// Narrow the clip box to the current path, then start a new path.
    pub fn update_clip_from_path(&mut self) {
        let clip_box = self
            .min_max
            .to_rect()
            .and_then(|b| self.clip_box.intersect(&b))
            .unwrap_or(Rectangle::EMPTY);
        self.start_new_path_and_clip_box(clip_box);
    }

    pub fn start_new_path_and_clip_box(&mut self, clip_box: Rectangle) {
        self.clip_box = clip_box;
        self.min_max.reset();
    }

    pub fn is_empty_clip(&self) -> bool {
        self.clip_box.is_empty()
    }

    pub fn blend_mode(&self) -> tiny_skia::BlendMode {
        self.blend_mode.into_skia()
    }

    /// Stroke of `width` for the current line style, dash lengths and
    /// phase divided by `dash_scale`.
    pub fn stroke_style(&self, width: f32, dash_scale: f32) -> Stroke {
        let dash = (!self.dash.is_empty())
            .then(|| {
                let mut intervals: Vec<f32> = self.dash.iter().map(|d| d / dash_scale).collect();
                if intervals.len() % 2 == 1 {
                    intervals.extend_from_within(..);
                }
                StrokeDash::new(intervals, self.dash_phase / dash_scale)
            })
            .flatten();
        Stroke {
            width,
            miter_limit: self.miter_limit,
            line_cap: self.line_cap.into_skia(),
            line_join: self.line_join.into_skia(),
            dash,
        }
    }

    /// Text position in text space, rise applied.
    pub fn text_position(&self) -> Point {
        Point::new(self.text.x, self.text.y + self.text.rise)
    }
}

/// Resolved colors of the render, remapped when high contrast mode is on.
#[derive(Debug, Default)]
pub struct ColorCache {
    high_contrast: Option<HighContrastMap>,
    cache: HashMap<Rgb, Rgb>,
}

impl ColorCache {
    pub fn new(high_contrast: Option<HighContrastMap>) -> Self {
        Self {
            high_contrast,
            cache: HashMap::default(),
        }
    }

    pub fn high_contrast(&self) -> Option<&HighContrastMap> {
        self.high_contrast.as_ref()
    }

    pub fn resolve(&mut self, rgb: Rgb) -> Rgb {
        let Some(map) = &self.high_contrast else {
            return rgb;
        };
        *self.cache.entry(rgb).or_insert_with(|| {
            let mapped = map.map(rgb);
            debug!(
                "high contrast {} -> {}",
                make_hex_color(rgb),
                make_hex_color(mapped)
            );
            mapped
        })
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests;
