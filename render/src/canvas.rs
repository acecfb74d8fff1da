//! Interpreter of operator lists onto a drawing context.
//!
//! `CanvasGraphics` owns the graphics state stack, the scratch surfaces
//! and the caches of one render. Painting operators are grouped in the
//! submodules: `path`, `image`, `group` (transparency groups and soft
//! masks), `pattern` and `text`.

use crate::{
    context::{Context, DrawingSurface, MirroredContext},
    error::RenderingCancelled,
    glyph::GlyphCache,
    into_skia::rgb_to_skia,
    raster::{compose_smask, PixelBox, SoftMaskCompose},
    state::{ColorCache, GraphicsState, PaintSource, SMaskLayer},
    surface::{ScratchCache, SharedSurface, SurfaceFactory},
    RenderOption,
};
use ahash::HashMap;
use anyhow::Result as AnyResult;
use log::{debug, error, info, warn};
use pdfcanvas::{
    color::{cmyk_to_rgb, DeviceColorSpace, WHITE},
    font::{GlyphOutlineProvider, LoadedFont},
    geom::{Matrix, Rectangle},
    graphics::{BlendMode, GStateEntry, RenderingIntent},
    operator::{ColorOrPattern, Operation},
    store::{ObjId, ObjValue, ObjectStores},
};
use std::{cell::Cell, cell::RefCell, rc::Rc};
use tiny_skia::{FillRule, FilterQuality, Paint, Pattern, SpreadMode, Transform};

mod group;
mod image;
mod path;
mod pattern;
mod text;

use group::PendingSMask;
use image::{CachedStencil, StencilKey};
use pattern::{PatternTile, TileKey};
use text::TextClipPath;

/// Flag shared between a render and its owner, set by `cancel()`.
pub type CancelFlag = Rc<Cell<Option<RenderingCancelled>>>;

/// Surface of an annotation rendered on its own canvas, with the context
/// it replaced.
#[derive(Debug)]
struct AnnotationCanvas {
    saved: Context,
}

/// Context a transparency group replaced, with the context depth and
/// state stack length before `BeginGroup`.
#[derive(Debug)]
struct GroupParent {
    ctx: Context,
    depth: usize,
    states: usize,
}

pub struct CanvasGraphics {
    ctx: MirroredContext,
    state: GraphicsState,
    state_stack: Vec<GraphicsState>,
    objs: ObjectStores,
    scratch: ScratchCache,
    option: Rc<RenderOption>,
    /// Transform of the page or form space, patterns are positioned in it.
    base_transform: Matrix,
    base_transform_stack: Vec<Matrix>,
    pending_clip: Option<FillRule>,
    /// Glyph outlines of clipping text modes, `Some` once such text was shown.
    pending_text_paths: Option<Vec<TextClipPath>>,
    /// Contexts painted onto before the open transparency groups.
    group_stack: Vec<GroupParent>,
    group_level: usize,
    smask_stack: Vec<PendingSMask>,
    smask_counter: usize,
    /// Mask of the last ended soft-mask group, activated by `SetGState`.
    temp_smask: Option<Rc<SMaskLayer>>,
    /// Main surface while painting onto the transparency layer.
    composite: Option<Context>,
    colors: ColorCache,
    glyphs: Rc<RefCell<GlyphCache>>,
    tiles: HashMap<TileKey, Rc<PatternTile>>,
    stencils: HashMap<StencilKey, CachedStencil>,
    annotation: Option<AnnotationCanvas>,
    annotation_canvases: HashMap<String, SharedSurface>,
    cancelled: CancelFlag,
}

impl std::fmt::Debug for CanvasGraphics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasGraphics")
            .field("ctx", &self.ctx)
            .field("depth", &self.state_stack.len())
            .field("group_level", &self.group_level)
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}

impl CanvasGraphics {
    pub fn new(
        surface: SharedSurface,
        objs: ObjectStores,
        factory: Rc<dyn SurfaceFactory>,
        option: Rc<RenderOption>,
    ) -> Self {
        let (width, height) = {
            let s = surface.borrow();
            (s.width(), s.height())
        };
        let mut ctx = Context::new(surface);
        ctx.set_anti_alias(option.anti_alias());
        let high_contrast = option
            .foreground_color()
            .zip(option.background_color())
            .and_then(|(fg, bg)| pdfcanvas::color::HighContrastMap::new(fg, bg));
        Self {
            ctx: MirroredContext::new(ctx),
            state: GraphicsState::new(width, height),
            state_stack: vec![],
            objs,
            scratch: ScratchCache::new(factory),
            option,
            base_transform: Matrix::identity(),
            base_transform_stack: vec![],
            pending_clip: None,
            pending_text_paths: None,
            group_stack: vec![],
            group_level: 0,
            smask_stack: vec![],
            smask_counter: 0,
            temp_smask: None,
            composite: None,
            colors: ColorCache::new(high_contrast),
            glyphs: Rc::new(RefCell::new(GlyphCache::new(None))),
            tiles: HashMap::default(),
            stencils: HashMap::default(),
            annotation: None,
            annotation_canvases: HashMap::default(),
            cancelled: Rc::default(),
        }
    }

    pub fn with_glyph_provider(mut self, provider: Rc<dyn GlyphOutlineProvider>) -> Self {
        self.glyphs = Rc::new(RefCell::new(GlyphCache::new(Some(provider))));
        self
    }

    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancelled = flag;
        self
    }

    /// Canvas painting a pattern tile or other sub-content, sharing objects,
    /// glyphs and options with `self`.
    fn nested(&self, surface: SharedSurface) -> Self {
        let mut r = Self::new(
            surface,
            self.objs.clone(),
            Rc::clone(self.scratch.factory()),
            Rc::clone(&self.option),
        );
        r.glyphs = Rc::clone(&self.glyphs);
        r.colors = ColorCache::new(self.colors.high_contrast().cloned());
        r.cancelled = Rc::clone(&self.cancelled);
        r.group_level = self.group_level;
        r
    }

    pub fn cancellation(&self) -> Option<RenderingCancelled> {
        self.cancelled.get()
    }

    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    pub fn depth(&self) -> usize {
        self.state_stack.len()
    }

    pub fn current_transform(&self) -> Matrix {
        self.ctx.current_transform()
    }

    pub fn base_transform(&self) -> Matrix {
        self.base_transform
    }

    pub fn scratch(&self) -> &ScratchCache {
        &self.scratch
    }

    pub fn option(&self) -> &RenderOption {
        &self.option
    }

    pub fn objs(&self) -> &ObjectStores {
        &self.objs
    }

    /// Surfaces of annotations rendered separately, keyed by annotation id.
    pub fn annotation_canvases(&self) -> &HashMap<String, SharedSurface> {
        &self.annotation_canvases
    }

    /// Paint the backdrop and set up the base transform.
    pub fn begin_drawing(&mut self) {
        let (width, height) = (self.ctx.active.width(), self.ctx.active.height());
        let background = match self.colors.high_contrast() {
            Some(map) => map.background,
            None => self.option.background_color().unwrap_or(WHITE),
        };
        if let Some(rect) = tiny_skia::Rect::from_xywh(0.0, 0.0, width as f32, height as f32) {
            let mut paint = Paint::default();
            paint.set_color(rgb_to_skia(background, 1.0));
            self.ctx.active.fill_device_rect(rect, &paint);
        }

        if self.option.transparency() {
            match self.scratch.get("transparent", width, height) {
                Ok(surface) => {
                    let mut layer = Context::new(surface);
                    layer.set_anti_alias(self.option.anti_alias());
                    layer.set_transform(self.ctx.current_transform());
                    let main = std::mem::replace(&mut self.ctx.active, layer);
                    self.composite = Some(main);
                }
                Err(e) => error!("create transparency layer: {e}"),
            }
        }

        self.ctx.save();
        self.ctx.transform(&self.option.transform());
        self.ctx.transform(&self.option.viewport().transform);
        self.base_transform = self.ctx.current_transform();
        debug!("base transform {:?}", self.base_transform);
    }

    /// Close everything still open, compose the transparency layer and
    /// release scratch surfaces and caches.
    pub fn end_drawing(&mut self) {
        self.restore_initial_state();
        self.scratch.clear();
        self.tiles.clear();
        self.stencils.clear();
        self.colors.clear();
        self.glyphs.borrow_mut().clear();
    }

    fn unwind(&mut self) {
        if let Some(annotation) = self.annotation.take() {
            if self.ctx.is_mirroring() {
                self.end_smask_mode();
            }
            self.ctx.active = annotation.saved;
        }
        if self.ctx.is_mirroring() {
            self.end_smask_mode();
        }
        // groups left open by an aborted list
        if let Some(bottom) = self.group_stack.drain(..).next() {
            self.ctx.active = bottom.ctx;
            while self.ctx.active.depth() > bottom.depth {
                self.ctx.restore();
            }
            self.state_stack.truncate(bottom.states + 1);
            if let Some(state) = self.state_stack.pop() {
                self.state = state;
            }
            self.group_level = 0;
            self.smask_stack.clear();
        }
        while !self.state_stack.is_empty() || self.ctx.is_mirroring() {
            self.restore();
        }
        self.state.active_smask = None;
    }

    fn restore_initial_state(&mut self) {
        self.unwind();
        if self.ctx.active.depth() > 0 {
            self.ctx.restore();
        }
        if let Some(main) = self.composite.take() {
            let layer = std::mem::replace(&mut self.ctx.active, main);
            let surface = layer.surface().borrow();
            self.ctx.active.draw_pixmap(
                surface.pixmap().as_ref(),
                Matrix::identity(),
                &tiny_skia::PixmapPaint::default(),
            );
        }
    }

    pub fn save(&mut self) {
        self.ctx.save();
        self.state_stack.push(self.state.clone());
    }

    pub fn restore(&mut self) {
        let Some(state) = self.state_stack.pop() else {
            // some files contain unpaired q/Q operations
            if self.ctx.is_mirroring() {
                self.end_smask_mode();
            }
            return;
        };
        self.state = state;
        self.ctx.restore();
        self.check_smask_state();
        self.pending_clip = None;
    }

    fn check_smask_state(&mut self) {
        let in_smask_mode = self.ctx.is_mirroring();
        if self.state.active_smask.is_some() && !in_smask_mode {
            self.begin_smask_mode();
        } else if self.state.active_smask.is_none() && in_smask_mode {
            self.end_smask_mode();
        }
    }

    /// Paint onto a scratch layer of the same size, mirroring state calls
    /// onto the suspended context. `compose()` moves painted pixels through
    /// the mask.
    fn begin_smask_mode(&mut self) {
        let (w, h) = (self.ctx.active.width(), self.ctx.active.height());
        let key = format!("smaskGroupAt{}", self.group_level);
        let surface = match self.scratch.get(&key, w, h) {
            Ok(s) => s,
            Err(e) => {
                error!("begin soft mask mode: {e}");
                return;
            }
        };
        let mut scratch = Context::new(surface);
        scratch.set_anti_alias(self.option.anti_alias());
        scratch.set_transform(self.ctx.current_transform());
        self.ctx.suspend(scratch);
        self.state.blend_mode = BlendMode::Normal;
        self.state.fill_alpha = 1.0;
        self.state.stroke_alpha = 1.0;
    }

    fn end_smask_mode(&mut self) {
        if self.ctx.resume().is_none() {
            debug!("end soft mask mode while not in it");
        }
    }

    /// Move pixels painted inside `dirty` (device space, `None` for the
    /// whole surface) through the active soft mask onto the suspended context.
    fn compose(&mut self, dirty: Option<Rectangle>) {
        let Some(smask) = self.state.active_smask.clone() else {
            return;
        };
        let Some(suspended) = &self.ctx.suspended else {
            return;
        };
        let (w, h) = (self.ctx.active.width(), self.ctx.active.height());
        let full = Rectangle::from_xywh(0.0, 0.0, w as f32, h as f32);
        let dirty = match dirty {
            Some(d) => d.intersect(&full),
            None => Some(full),
        };
        let layer_surface = Rc::clone(self.ctx.active.surface());
        if let Some(dirty) = dirty {
            let (x0, y0) = (dirty.left_x.floor(), dirty.lower_y.floor());
            let layer_box = PixelBox {
                x: x0 as i32,
                y: y0 as i32,
                width: (dirty.right_x.ceil() - x0) as u32,
                height: (dirty.upper_y.ceil() - y0) as u32,
            };
            let params = SoftMaskCompose {
                subtype: smask.subtype,
                backdrop: smask.backdrop,
                transfer: smask.transfer.as_ref(),
            };
            {
                let mask = smask.surface.borrow();
                let mut layer = layer_surface.borrow_mut();
                compose_smask(
                    mask.pixmap().as_ref(),
                    smask.offset,
                    layer.pixmap_mut(),
                    layer_box,
                    &params,
                    self.option.smask_chunk_pixels(),
                );
            }
            let layer = layer_surface.borrow();
            if let Some(rect) = tiny_skia::Rect::from_xywh(
                x0,
                y0,
                layer_box.width as f32,
                layer_box.height as f32,
            ) {
                let paint = Paint {
                    shader: Pattern::new(
                        layer.pixmap().as_ref(),
                        SpreadMode::Pad,
                        FilterQuality::Nearest,
                        1.0,
                        Transform::identity(),
                    ),
                    ..Default::default()
                };
                suspended.fill_device_rect(rect, &paint);
            }
        }
        self.ctx.active.clear();
    }

    fn set_gstate(&mut self, entries: &[GStateEntry]) {
        for entry in entries {
            match entry {
                GStateEntry::LineWidth(w) => self.state.line_width = *w,
                GStateEntry::LineCap(cap) => self.state.line_cap = *cap,
                GStateEntry::LineJoin(join) => self.state.line_join = *join,
                GStateEntry::MiterLimit(limit) => self.state.miter_limit = *limit,
                GStateEntry::Dash(dash, phase) => self.set_dash(dash, *phase),
                GStateEntry::RenderingIntent(intent) => self.set_rendering_intent(*intent),
                GStateEntry::Flatness(flatness) => self.set_flatness(*flatness),
                GStateEntry::Font(id, size) => self.set_font(id, *size),
                GStateEntry::StrokeAlpha(alpha) => self.state.stroke_alpha = *alpha,
                GStateEntry::FillAlpha(alpha) => self.state.fill_alpha = *alpha,
                GStateEntry::BlendMode(name) => {
                    self.state.blend_mode = name.parse().unwrap_or_else(|_| {
                        info!("unsupported blend mode {name}, use Normal");
                        BlendMode::Normal
                    });
                }
                GStateEntry::SoftMask(on) => {
                    let temp = self.temp_smask.take();
                    self.state.active_smask = if *on { temp } else { None };
                    self.check_smask_state();
                }
                GStateEntry::TransferFunction(map) => self.state.transfer_map = map.clone(),
            }
        }
    }

    fn set_dash(&mut self, dash: &[f32], phase: f32) {
        self.state.dash = dash.to_vec();
        self.state.dash_phase = phase;
    }

    fn set_flatness(&mut self, flatness: f32) {
        info!("not implemented: flatness: {}", flatness);
    }

    fn set_rendering_intent(&mut self, intent: RenderingIntent) {
        info!("not implemented: render intent: {:?}", intent);
    }

    fn transform(&mut self, m: &Matrix) {
        self.ctx.transform(m);
    }

    fn set_font(&mut self, id: &ObjId, size: f32) {
        let font = match self.objs.get(id) {
            Some(ObjValue::Font(font)) => font,
            other => {
                match other {
                    Some(ObjValue::Error(reason)) => warn!("font {id} failed: {reason}, use fallback"),
                    _ => warn!("font {id} not found, use fallback"),
                }
                Rc::new(LoadedFont {
                    id: id.clone(),
                    name: id.to_string(),
                    missing_file: true,
                    ..Default::default()
                })
            }
        };
        if font.font_matrix.m11 == 0.0 || font.font_matrix.m22 == 0.0 {
            warn!("invalid font matrix for font {id}");
        }
        // negative size mirrors glyphs, see `font_direction`
        let text = &mut self.state.text;
        if size < 0.0 {
            text.font_size = -size;
            text.font_direction = -1.0;
        } else {
            text.font_size = size;
            text.font_direction = 1.0;
        }
        text.font = Some(font);
    }

    fn set_fill(&mut self, source: PaintSource) {
        self.state.fill = source;
    }

    fn set_stroke(&mut self, source: PaintSource) {
        self.state.stroke = source;
    }

    fn pattern_source(color: &ColorOrPattern) -> PaintSource {
        match color {
            ColorOrPattern::Color(rgb) => PaintSource::Solid(*rgb),
            ColorOrPattern::Pattern { pattern, color } => PaintSource::Pattern {
                pattern: Rc::clone(pattern),
                color: *color,
            },
        }
    }

    fn begin_form(&mut self, matrix: Option<&Matrix>, bbox: Option<&Rectangle>) {
        self.save();
        self.base_transform_stack.push(self.base_transform);
        if let Some(m) = matrix {
            self.transform(m);
        }
        self.base_transform = self.ctx.current_transform();
        if let Some(bbox) = bbox {
            self.clip_rect(bbox);
        }
    }

    fn end_form(&mut self) {
        self.restore();
        match self.base_transform_stack.pop() {
            Some(m) => self.base_transform = m,
            None => warn!("form end without begin"),
        }
    }

    /// Intersect the clip with a user space rectangle.
    fn clip_rect(&mut self, rect: &Rectangle) {
        self.ctx
            .rect(rect.left_x, rect.lower_y, rect.width(), rect.height());
        let ctm = self.ctx.current_transform();
        self.state.update_rect_min_max(&ctm, rect);
        self.pending_clip = Some(FillRule::Winding);
        self.end_path();
    }

    fn begin_annotation(
        &mut self,
        id: &str,
        rect: &Rectangle,
        transform: &Matrix,
        matrix: &Matrix,
        has_own_canvas: bool,
    ) -> AnyResult<()> {
        self.unwind();
        self.save();
        self.ctx.set_transform(self.base_transform);
        let mut transform = *transform;
        if has_own_canvas && self.option.separate_annotations() {
            let (width, height) = (rect.width(), rect.height());
            transform.m31 -= rect.left_x;
            transform.m32 -= rect.lower_y;
            let [sx, sy] =
                pdfcanvas::geom::singular_value_decompose_2d_scale(&self.ctx.current_transform());
            let surface = self.scratch.factory().create(
                ((width * sx).ceil() as u32).max(1),
                ((height * sy).ceil() as u32).max(1),
            )?;
            self.annotation_canvases
                .insert(id.to_owned(), Rc::clone(&surface));
            let mut ctx = Context::new(surface);
            ctx.set_anti_alias(self.option.anti_alias());
            ctx.set_transform(Matrix::new(sx, 0.0, 0.0, -sy, 0.0, height * sy));
            let saved = std::mem::replace(&mut self.ctx.active, ctx);
            self.annotation = Some(AnnotationCanvas { saved });
        } else {
            self.end_path();
            self.ctx
                .rect(rect.left_x, rect.lower_y, rect.width(), rect.height());
            self.ctx.clip(FillRule::Winding);
            self.ctx.begin_path();
        }
        self.state = GraphicsState::new(self.ctx.active.width(), self.ctx.active.height());
        self.transform(&transform);
        self.transform(matrix);
        Ok(())
    }

    fn end_annotation(&mut self) {
        if let Some(annotation) = self.annotation.take() {
            if self.ctx.is_mirroring() {
                self.end_smask_mode();
            }
            self.ctx.active = annotation.saved;
        }
    }

    /// Run one operator. `Dependency` is handled by the scheduler.
    pub fn exec(&mut self, op: &Operation) -> AnyResult<()> {
        debug!("handle operation: {:?}", op);
        match op {
            Operation::Dependency(_) => {}

            // General graphics state
            Operation::SetLineWidth(w) => self.state.line_width = *w,
            Operation::SetLineCap(cap) => self.state.line_cap = *cap,
            Operation::SetLineJoin(join) => self.state.line_join = *join,
            Operation::SetMiterLimit(limit) => self.state.miter_limit = *limit,
            Operation::SetDash(dash, phase) => self.set_dash(dash, *phase),
            Operation::SetRenderingIntent(intent) => self.set_rendering_intent(*intent),
            Operation::SetFlatness(flatness) => self.set_flatness(*flatness),
            Operation::SetGState(entries) => self.set_gstate(entries),

            // Special graphics state
            Operation::Save => self.save(),
            Operation::Restore => self.restore(),
            Operation::Transform(m) => self.transform(m),

            // Path construction and painting
            Operation::ConstructPath(ops) => self.construct_path(ops),
            Operation::Stroke => self.stroke(true)?,
            Operation::CloseStroke => self.close_stroke()?,
            Operation::Fill => self.fill(FillRule::Winding, true)?,
            Operation::EoFill => self.fill(FillRule::EvenOdd, true)?,
            Operation::FillStroke => self.fill_stroke(FillRule::Winding)?,
            Operation::EoFillStroke => self.fill_stroke(FillRule::EvenOdd)?,
            Operation::CloseFillStroke => {
                self.ctx.close_path();
                self.fill_stroke(FillRule::Winding)?;
            }
            Operation::CloseEoFillStroke => {
                self.ctx.close_path();
                self.fill_stroke(FillRule::EvenOdd)?;
            }
            Operation::EndPath => self.end_path(),
            Operation::Clip => self.pending_clip = Some(FillRule::Winding),
            Operation::EoClip => self.pending_clip = Some(FillRule::EvenOdd),

            // Text
            Operation::BeginText => self.state.text.begin(),
            Operation::EndText => self.end_text(),
            Operation::SetCharSpacing(v) => self.state.text.char_spacing = *v,
            Operation::SetWordSpacing(v) => self.state.text.word_spacing = *v,
            Operation::SetHScale(v) => self.state.text.h_scale = v / 100.0,
            Operation::SetLeading(v) => self.state.text.leading = *v,
            Operation::SetFont(id, size) => self.set_font(id, *size),
            Operation::SetTextRenderingMode(mode) => self.state.text.render_mode = *mode,
            Operation::SetTextRise(v) => self.state.text.rise = *v,
            Operation::MoveText(x, y) => self.state.text.move_text(*x, *y),
            Operation::SetLeadingMoveText(x, y) => {
                self.state.text.leading = -y;
                self.state.text.move_text(*x, *y);
            }
            Operation::SetTextMatrix(m) => self.state.text.set_text_matrix(*m),
            Operation::NextLine => self.state.text.next_line(),
            Operation::ShowText(items) | Operation::ShowSpacedText(items) => {
                self.show_text(items)?
            }
            Operation::NextLineShowText(items) => {
                self.state.text.next_line();
                self.show_text(items)?;
            }
            Operation::NextLineSetSpacingShowText(word_spacing, char_spacing, items) => {
                self.state.text.word_spacing = *word_spacing;
                self.state.text.char_spacing = *char_spacing;
                self.state.text.next_line();
                self.show_text(items)?;
            }
            // widths are known from the font already
            Operation::SetCharWidth(..) => {}
            Operation::SetCharWidthAndBounds([_, _, llx, lly, urx, ury]) => {
                self.clip_rect(&Rectangle::from_lbrt(*llx, *lly, *urx, *ury));
            }

            // Color
            Operation::SetStrokeGray(g) => {
                self.set_stroke(PaintSource::Solid(DeviceColorSpace::Gray.to_rgb(&[*g])))
            }
            Operation::SetFillGray(g) => {
                self.set_fill(PaintSource::Solid(DeviceColorSpace::Gray.to_rgb(&[*g])))
            }
            Operation::SetStrokeRGBColor(rgb) => self.set_stroke(PaintSource::Solid(*rgb)),
            Operation::SetFillRGBColor(rgb) => self.set_fill(PaintSource::Solid(*rgb)),
            Operation::SetStrokeCMYKColor([c, m, y, k]) => {
                self.set_stroke(PaintSource::Solid(cmyk_to_rgb(*c, *m, *y, *k)))
            }
            Operation::SetFillCMYKColor([c, m, y, k]) => {
                self.set_fill(PaintSource::Solid(cmyk_to_rgb(*c, *m, *y, *k)))
            }
            Operation::SetStrokeColorN(color) => self.set_stroke(Self::pattern_source(color)),
            Operation::SetFillColorN(color) => self.set_fill(Self::pattern_source(color)),
            Operation::SetStrokeTransparent => self.set_stroke(PaintSource::Transparent),
            Operation::SetFillTransparent => self.set_fill(PaintSource::Transparent),

            Operation::ShadingFill(shading) => self.shading_fill(shading)?,

            // Images
            Operation::PaintImageXObject(id) => self.paint_image_x_object(id)?,
            Operation::PaintInlineImageXObject(img) => self.paint_inline_image(img)?,
            Operation::PaintImageMaskXObject(mask) => self.paint_image_mask(mask)?,
            Operation::PaintImageMaskXObjectGroup(masks) => self.paint_image_mask_group(masks)?,
            Operation::PaintImageMaskXObjectRepeat {
                mask,
                transform,
                positions,
            } => self.paint_image_mask_repeat(mask, transform, positions)?,
            Operation::PaintImageXObjectRepeat {
                id,
                scale_x,
                scale_y,
                positions,
            } => self.paint_image_repeat(id, *scale_x, *scale_y, positions)?,
            Operation::PaintSolidColorImageMask => self.paint_solid_color_image_mask()?,

            // Forms, groups and annotations
            Operation::PaintFormXObjectBegin(matrix, bbox) => {
                self.begin_form(matrix.as_ref(), bbox.as_ref())
            }
            Operation::PaintFormXObjectEnd => self.end_form(),
            Operation::BeginGroup(group) => self.begin_group(group)?,
            Operation::EndGroup(group) => self.end_group(group)?,
            Operation::BeginAnnotation {
                id,
                rect,
                transform,
                matrix,
                has_own_canvas,
            } => self.begin_annotation(id, rect, transform, matrix, *has_own_canvas)?,
            Operation::EndAnnotation => self.end_annotation(),

            // Marked content has no rendering effect
            Operation::BeginMarkedContent(_)
            | Operation::BeginMarkedContentProps(..)
            | Operation::MarkPoint(_)
            | Operation::MarkPointProps(_)
            | Operation::EndMarkedContent => {
                info!("not implemented: {:?}", op.op_code());
            }
            Operation::BeginCompat | Operation::EndCompat => {}
        }
        Ok(())
    }
}

/// `true` if images drawn through `m` (image pixels to device) should be
/// smoothed: when asked for, or when an image pixel covers no more than
/// 4/3 device pixels on some axis.
fn image_smoothing(m: &Matrix, interpolate: bool) -> FilterQuality {
    const ACTUAL_SCALE: f32 = 96.0 / 72.0;
    let [sx, sy] = pdfcanvas::geom::singular_value_decompose_2d_scale(m);
    if interpolate || sx <= ACTUAL_SCALE || sy <= ACTUAL_SCALE {
        FilterQuality::Bilinear
    } else {
        FilterQuality::Nearest
    }
}

#[cfg(test)]
mod tests;
