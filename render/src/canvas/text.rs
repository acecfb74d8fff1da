//! Text showing. Glyphs are painted from outline programs; Type3 glyphs
//! run their own operator lists.

use super::{path::single_pixel_width, pattern::Brush, CanvasGraphics};
use crate::{
    context::DrawingSurface,
    glyph::GlyphProgram,
    scheduler::{execute_operator_list, Step},
    state::PathKind,
};
use anyhow::Result as AnyResult;
use log::{debug, warn};
use pdfcanvas::{
    font::{LoadedFont, PathCommand, TextItem},
    geom::Matrix,
    graphics::TextRenderingMode,
};
use std::rc::Rc;
use tiny_skia::FillRule;

/// Device outline of a glyph shown with a clipping render mode, clipped
/// at `EndText`.
pub(super) type TextClipPath = tiny_skia::Path;

/// Paint and line width a glyph is painted with.
struct GlyphPaint {
    fill: Option<Brush>,
    stroke: Option<Brush>,
    line_width: f32,
    mode: TextRenderingMode,
}

impl CanvasGraphics {
    pub(super) fn show_text(&mut self, items: &[TextItem]) -> AnyResult<()> {
        let Some(font) = self.state.text.font.clone() else {
            warn!("show text without font");
            return Ok(());
        };
        if font.is_type3() {
            return self.show_type3_text(&font, items);
        }
        let text = self.state.text.clone();
        let size = text.font_size;
        if size == 0.0 {
            return Ok(());
        }
        let mode = text.render_mode;
        let h_scale = text.h_scale * text.font_direction;
        let vertical = font.vertical;
        let spacing_dir = if vertical { 1.0 } else { -1.0 };
        let width_advance_scale = size * font.font_matrix.m11;

        let region = Some(self.state.clip_box);
        let mut fill = None;
        if mode.fills() {
            let source = self.state.fill.clone();
            fill = self.isolated_brush(&source, PathKind::Fill, region)?;
        }
        let mut stroke = None;
        if mode.strokes() {
            let source = self.state.stroke.clone();
            stroke = self.isolated_brush(&source, PathKind::Stroke, region)?;
        }

        self.ctx.save();
        self.ctx.transform(&text.text_matrix);
        self.ctx.translate(text.x, text.y + text.rise);
        let flip = if text.font_direction > 0.0 { -1.0 } else { 1.0 };
        self.ctx.scale(h_scale, flip);

        let mut line_width = self.state.line_width;
        if text.text_matrix_scale == 0.0 || line_width == 0.0 {
            if mode.strokes() {
                line_width = single_pixel_width(&self.ctx.current_transform());
            }
        } else {
            line_width /= text.text_matrix_scale;
        }
        let paint = GlyphPaint {
            fill,
            stroke,
            line_width,
            mode,
        };

        let mut x = 0.0;
        for item in items {
            let glyph = match item {
                TextItem::Spacing(v) => {
                    x += spacing_dir * v * size / 1000.0;
                    continue;
                }
                TextItem::Glyph(glyph) => glyph,
            };
            let spacing = if glyph.is_space { text.word_spacing } else { 0.0 } + text.char_spacing;
            let mut width = glyph.width;
            let (scaled_x, scaled_y) = if vertical {
                let vmetric = glyph.vmetric.unwrap_or(font.default_vmetrics);
                let vx = match glyph.vmetric {
                    Some(v) => -v[1],
                    None => -width * 0.5,
                } * width_advance_scale;
                let vy = vmetric[2] * width_advance_scale;
                width = -vmetric[0];
                (vx, x + vy)
            } else {
                (x, 0.0)
            };

            let (mut scaled_x, mut char_scale_x) = (scaled_x, 1.0);
            if font.remeasure && width > 0.0 && !vertical {
                let measured = self.glyphs.borrow_mut().advance(&font, &glyph.font_char);
                match measured {
                    Some(m) if width < m && self.option.subpixel_text() => {
                        char_scale_x = width / m;
                    }
                    Some(m) if width != m => {
                        // center the glyph in the PDF width
                        scaled_x += (width - m) * 0.5 * width_advance_scale;
                    }
                    _ => {}
                }
            }

            if glyph.is_in_font || font.missing_file {
                let at = (scaled_x, scaled_y, char_scale_x);
                self.paint_char(&font, &glyph.font_char, at, size, &paint);
                if let Some(accent) = &glyph.accent {
                    let at = (
                        scaled_x + size * accent.offset.x,
                        scaled_y - size * accent.offset.y,
                        char_scale_x,
                    );
                    self.paint_char(&font, &accent.font_char, at, size, &paint);
                }
            }

            x += if vertical {
                width * width_advance_scale - spacing * text.font_direction
            } else {
                width * width_advance_scale + spacing * text.font_direction
            };
        }
        if vertical {
            self.state.text.y -= x;
        } else {
            self.state.text.x += x * h_scale;
        }
        self.ctx.restore();
        self.compose(None);
        Ok(())
    }

    /// Paint one glyph at `(x, y)` of the current text space, narrowed
    /// horizontally by `scale_x`.
    fn paint_char(
        &mut self,
        font: &LoadedFont,
        font_char: &str,
        (x, y, scale_x): (f32, f32, f32),
        size: f32,
        paint: &GlyphPaint,
    ) {
        let Some(program) = self.glyphs.borrow_mut().outline(font, font_char) else {
            debug!("no outline for glyph {font_char:?} of font {}", font.name);
            return;
        };
        self.ctx.save();
        self.ctx.translate(x, y);
        if scale_x != 1.0 {
            self.ctx.scale(scale_x, 1.0);
        }
        self.ctx.begin_path();
        self.add_glyph_path(&program, &font.font_matrix, size);
        if let Some(brush) = &paint.fill {
            let p = brush.paint(
                self.state.fill_alpha,
                self.state.blend_mode(),
                self.ctx.active.anti_alias(),
            );
            self.ctx.active.fill(&p, FillRule::Winding);
        }
        if let Some(brush) = &paint.stroke {
            let p = brush.paint(
                self.state.stroke_alpha,
                self.state.blend_mode(),
                self.ctx.active.anti_alias(),
            );
            let stroke = self.state.stroke_style(paint.line_width, 1.0);
            self.ctx.active.stroke(&p, &stroke);
        }
        if paint.mode.clips() {
            let paths = self.pending_text_paths.get_or_insert_with(Vec::new);
            if let Some(path) = self.ctx.active.device_path() {
                paths.push(path);
            }
        }
        self.ctx.begin_path();
        self.ctx.restore();
    }

    /// Append a glyph program to the current path, glyph space mapped by
    /// `font_matrix` and scaled to `size`.
    fn add_glyph_path(&mut self, program: &GlyphProgram, font_matrix: &Matrix, size: f32) {
        self.ctx.save();
        self.ctx.transform(font_matrix);
        self.ctx.scale(size, -size);
        for cmd in program.iter() {
            match *cmd {
                PathCommand::MoveTo(p) => self.ctx.move_to(p.x, p.y),
                PathCommand::LineTo(p) => self.ctx.line_to(p.x, p.y),
                PathCommand::QuadTo(c, p) => self.ctx.quad_to(c.x, c.y, p.x, p.y),
                PathCommand::CubicTo(c1, c2, p) => {
                    self.ctx.bezier_curve_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y)
                }
                PathCommand::Close => self.ctx.close_path(),
                PathCommand::Save => self.ctx.save(),
                PathCommand::Restore => self.ctx.restore(),
                PathCommand::Transform(m) => self.ctx.transform(&m),
            }
        }
        self.ctx.restore();
    }

    /// Intersect the clip with the outlines of glyphs shown in a clipping
    /// render mode since `BeginText`.
    pub(super) fn end_text(&mut self) {
        self.ctx.begin_path();
        let Some(paths) = self.pending_text_paths.take() else {
            return;
        };
        for path in &paths {
            self.ctx.push_device_path(path);
        }
        self.ctx.clip(FillRule::Winding);
        self.ctx.begin_path();
    }

    fn show_type3_text(&mut self, font: &Rc<LoadedFont>, items: &[TextItem]) -> AnyResult<()> {
        let text = self.state.text.clone();
        let size = text.font_size;
        if text.render_mode == TextRenderingMode::Invisible || size == 0.0 {
            return Ok(());
        }
        let Some(procs) = &font.type3_glyphs else {
            return Ok(());
        };
        let direction = text.font_direction;
        let spacing_dir = if font.vertical { 1.0 } else { -1.0 };
        let h_scale = text.h_scale * direction;
        let font_matrix = font.font_matrix;

        self.ctx.save();
        self.ctx.transform(&text.text_matrix);
        self.ctx.translate(text.x, text.y);
        self.ctx.scale(h_scale, direction);
        let mut result = Ok(());
        for item in items {
            let glyph = match item {
                TextItem::Spacing(v) => {
                    let spacing = spacing_dir * v * size / 1000.0;
                    self.ctx.translate(spacing, 0.0);
                    self.state.text.x += spacing * h_scale;
                    continue;
                }
                TextItem::Glyph(glyph) => glyph,
            };
            let spacing = if glyph.is_space { text.word_spacing } else { 0.0 } + text.char_spacing;
            let list = glyph.operator_list_id.as_ref().and_then(|id| procs.get(id));
            match list {
                Some(list) => {
                    self.save();
                    self.ctx.scale(size, size);
                    self.ctx.transform(&font_matrix);
                    let step = execute_operator_list(self, list, 0, None, None);
                    self.restore();
                    match step {
                        Ok(Step::Blocked(i)) => warn!("type3 glyph stopped at operator {i}"),
                        Ok(_) => {}
                        Err(e) if e.is_fatal() => {
                            result = Err(e.into());
                            break;
                        }
                        Err(e) => warn!("type3 glyph {:?}: {e}", glyph.operator_list_id),
                    }
                }
                None => warn!(
                    "type3 character {:?} is not available",
                    glyph.operator_list_id
                ),
            }
            let width = glyph.width * font_matrix.m11 + font_matrix.m31;
            let advance = width * size + spacing;
            self.ctx.translate(advance, 0.0);
            self.state.text.x += advance * h_scale;
        }
        self.ctx.restore();
        result
    }
}
