//! Path construction, fill, stroke and clip.

use super::CanvasGraphics;
use crate::{context::DrawingSurface, state::PathKind};
use anyhow::Result as AnyResult;
use log::debug;
use pdfcanvas::{
    geom::{bezier_bounding_box, is_scale_or_quarter_turn, Matrix, MinMax, Rectangle},
    graphics::Point,
    operator::PathOp,
};
use tiny_skia::FillRule;

/// Scale applied before stroking so a line never gets thinner than one
/// device pixel. `line_width` 0 means the thinnest line.
pub(crate) fn scale_for_stroking(m: &Matrix, line_width: f32) -> [f32; 2] {
    let (a, b, c, d) = (m.m11, m.m12, m.m21, m.m22);
    if b == 0.0 && c == 0.0 {
        let (norm_x, norm_y) = (a.abs(), d.abs());
        if norm_x == norm_y {
            if line_width == 0.0 {
                [1.0 / norm_x; 2]
            } else {
                let scaled = norm_x * line_width;
                [if scaled < 1.0 { 1.0 / scaled } else { 1.0 }; 2]
            }
        } else if line_width == 0.0 {
            [1.0 / norm_x, 1.0 / norm_y]
        } else {
            let scaled_x = norm_x * line_width;
            let scaled_y = norm_y * line_width;
            [
                if scaled_x < 1.0 { 1.0 / scaled_x } else { 1.0 },
                if scaled_y < 1.0 { 1.0 / scaled_y } else { 1.0 },
            ]
        }
    } else {
        let abs_det = (a * d - b * c).abs();
        let norm_x = a.hypot(b);
        let norm_y = c.hypot(d);
        if line_width == 0.0 {
            [norm_y / abs_det, norm_x / abs_det]
        } else {
            let base_area = line_width * abs_det;
            [
                if norm_y > base_area { norm_y / base_area } else { 1.0 },
                if norm_x > base_area { norm_x / base_area } else { 1.0 },
            ]
        }
    }
}

/// Width in user space of one device pixel, for hairlines.
pub(crate) fn single_pixel_width(m: &Matrix) -> f32 {
    let abs_det = (m.m11 * m.m22 - m.m12 * m.m21).abs();
    let sqnorm1 = m.m11.powi(2) + m.m21.powi(2);
    let sqnorm2 = m.m12.powi(2) + m.m22.powi(2);
    sqnorm1.max(sqnorm2).sqrt() / abs_det
}

impl CanvasGraphics {
    pub(super) fn construct_path(&mut self, ops: &[PathOp]) {
        let ctm = self.ctx.current_transform();
        let mut points = vec![];
        let curves = self.build_path(ops, &mut points);
        if is_scale_or_quarter_turn(&ctm) {
            // bounds in user space, mapped once
            let mut min_max = curves;
            for p in points {
                min_max.update(p.x, p.y);
            }
            self.state.update_scaling_path_min_max(&ctm, min_max);
        } else {
            for p in points {
                self.state.update_path_min_max(&ctm, p.x, p.y);
            }
            if let Some(rect) = curves.to_rect() {
                self.state.update_rect_min_max(&ctm, &rect);
            }
        }
    }

    /// Feed `ops` to the context. Collects on-path points into `points`,
    /// returns the user space bounds of the curves.
    fn build_path(&mut self, ops: &[PathOp], points: &mut Vec<Point>) -> MinMax {
        let mut curves = MinMax::default();
        let mut current = self.state.current_point;
        for op in ops {
            match *op {
                PathOp::MoveTo(p) => {
                    self.ctx.move_to(p.x, p.y);
                    points.push(p);
                    current = p;
                }
                PathOp::LineTo(p) => {
                    self.ctx.line_to(p.x, p.y);
                    points.push(p);
                    current = p;
                }
                PathOp::CurveTo(p1, p2, p3) => {
                    self.ctx.bezier_curve_to(p1.x, p1.y, p2.x, p2.y, p3.x, p3.y);
                    bezier_bounding_box(current, p1, p2, p3, &mut curves);
                    current = p3;
                }
                PathOp::CurveTo2(p2, p3) => {
                    self.ctx
                        .bezier_curve_to(current.x, current.y, p2.x, p2.y, p3.x, p3.y);
                    bezier_bounding_box(current, current, p2, p3, &mut curves);
                    current = p3;
                }
                PathOp::CurveTo3(p1, p3) => {
                    self.ctx.bezier_curve_to(p1.x, p1.y, p3.x, p3.y, p3.x, p3.y);
                    bezier_bounding_box(current, p1, p3, p3, &mut curves);
                    current = p3;
                }
                PathOp::Rectangle(p, w, h) => {
                    let (x, y) = (p.x, p.y);
                    let (xw, yh) = (x + w, y + h);
                    self.ctx.move_to(x, y);
                    if w == 0.0 || h == 0.0 {
                        self.ctx.line_to(xw, yh);
                    } else {
                        self.ctx.line_to(xw, y);
                        self.ctx.line_to(xw, yh);
                        self.ctx.line_to(x, yh);
                    }
                    points.push(p);
                    points.push(Point::new(xw, yh));
                    self.ctx.close_path();
                    current = p;
                }
                PathOp::ClosePath => self.ctx.close_path(),
            }
        }
        self.state.current_point = current;
        curves
    }

    pub(super) fn fill(&mut self, rule: FillRule, consume: bool) -> AnyResult<()> {
        let ctm = self.ctx.current_transform();
        let bbox = self.state.clipped_path_bbox(PathKind::Fill, &ctm);
        if bbox.is_some() {
            let source = self.state.fill.clone();
            let is_pattern = source.is_pattern();
            if is_pattern {
                self.ctx.save();
            }
            if let Some(brush) = self.brush(&source, PathKind::Fill, bbox)? {
                let paint = brush.paint(
                    self.state.fill_alpha,
                    self.state.blend_mode(),
                    self.ctx.active.anti_alias(),
                );
                self.ctx.active.fill(&paint, rule);
            }
            if is_pattern {
                self.ctx.restore();
            }
        } else {
            debug!("fill: path out of clip");
        }
        if consume {
            self.consume_path(bbox);
        }
        Ok(())
    }

    pub(super) fn stroke(&mut self, consume: bool) -> AnyResult<()> {
        let ctm = self.ctx.current_transform();
        let bbox = self.state.clipped_path_bbox(PathKind::Stroke, &ctm);
        if let Some(bbox) = bbox {
            let source = self.state.stroke.clone();
            let is_pattern = source.is_pattern();
            if is_pattern {
                self.ctx.save();
            }
            if let Some(brush) = self.brush(&source, PathKind::Stroke, Some(bbox))? {
                let paint = brush.paint(
                    self.state.stroke_alpha,
                    self.state.blend_mode(),
                    self.ctx.active.anti_alias(),
                );
                self.rescale_and_stroke(&paint);
            }
            if is_pattern {
                self.ctx.restore();
            }
        } else {
            debug!("stroke: path out of clip");
        }
        if consume {
            self.consume_path(bbox);
        }
        Ok(())
    }

    /// Stroke the current path, scaled up first if lines would come out
    /// thinner than a device pixel.
    fn rescale_and_stroke(&mut self, paint: &tiny_skia::Paint) {
        let ctm = self.ctx.current_transform();
        let line_width = self.state.line_width;
        let [sx, sy] = scale_for_stroking(&ctm, line_width);
        let width = if line_width == 0.0 { 1.0 } else { line_width };
        if sx == 1.0 && sy == 1.0 {
            let stroke = self.state.stroke_style(width, 1.0);
            self.ctx.active.stroke(paint, &stroke);
            return;
        }
        let stroke = self.state.stroke_style(width, sx.max(sy));
        self.ctx.save();
        self.ctx.scale(sx, sy);
        self.ctx.active.stroke(paint, &stroke);
        self.ctx.restore();
    }

    pub(super) fn close_stroke(&mut self) -> AnyResult<()> {
        self.ctx.close_path();
        self.stroke(true)
    }

    pub(super) fn fill_stroke(&mut self, rule: FillRule) -> AnyResult<()> {
        self.fill(rule, false)?;
        self.stroke(false)?;
        self.consume_path(None);
        Ok(())
    }

    pub(super) fn end_path(&mut self) {
        self.consume_path(None);
    }

    /// Apply a pending clip, or compose the painted area through the soft
    /// mask, then start a new path. `clip_box` is the device area painted,
    /// `None` for everything.
    pub(super) fn consume_path(&mut self, clip_box: Option<Rectangle>) {
        // an already empty clip box skips the context clip
        let empty_clip = self.state.is_empty_clip();
        match self.pending_clip.take() {
            Some(rule) => {
                self.state.update_clip_from_path();
                if !empty_clip {
                    self.ctx.clip(rule);
                }
            }
            None => self.compose(clip_box),
        }
        self.state.min_max.reset();
        self.ctx.begin_path();
    }
}
