//! Canvas-like drawing context over a [`Surface`](crate::surface::Surface).
//!
//! A context keeps a transform and clip stack and a current path. Path
//! points are mapped to device space when they are added, so later
//! transform changes do not move an already built path.

use crate::surface::SharedSurface;
use log::debug;
use pdfcanvas::{
    geom::Matrix,
    graphics::trans::IntoSkiaTransform,
};
use std::rc::Rc;
use tiny_skia::{
    FillRule, Mask, Paint, Path as SkiaPath, PathBuilder, Pixmap, PixmapPaint, PixmapRef, Rect,
    Stroke, Transform,
};

/// State and path calls shared by every drawing context.
pub trait DrawingSurface {
    fn save(&mut self);
    fn restore(&mut self);
    /// Concatenate `m`, it applies to points before the current transform.
    fn transform(&mut self, m: &Matrix);
    fn set_transform(&mut self, m: Matrix);
    fn current_transform(&self) -> Matrix;

    fn scale(&mut self, sx: f32, sy: f32) {
        self.transform(&Matrix::scale(sx, sy));
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.transform(&Matrix::translation(x, y));
    }

    fn begin_path(&mut self);
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32);
    fn bezier_curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32);
    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32);
    fn close_path(&mut self);
    /// Intersect the clip region with the current path.
    fn clip(&mut self, rule: FillRule);
}

#[derive(Debug, Clone)]
struct ContextState {
    transform: Matrix,
    clip: Option<Rc<Mask>>,
}

pub struct Context {
    surface: SharedSurface,
    state: ContextState,
    stack: Vec<ContextState>,
    path: PathBuilder,
    anti_alias: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("surface", &self.surface.borrow().id())
            .field("transform", &self.state.transform)
            .field("clipped", &self.state.clip.is_some())
            .field("depth", &self.stack.len())
            .finish()
    }
}

impl Context {
    pub fn new(surface: SharedSurface) -> Self {
        Self {
            surface,
            state: ContextState {
                transform: Matrix::identity(),
                clip: None,
            },
            stack: vec![],
            path: PathBuilder::new(),
            anti_alias: true,
        }
    }

    pub fn set_anti_alias(&mut self, v: bool) {
        self.anti_alias = v;
    }

    pub fn anti_alias(&self) -> bool {
        self.anti_alias
    }

    pub fn surface(&self) -> &SharedSurface {
        &self.surface
    }

    pub fn width(&self) -> u32 {
        self.surface.borrow().width()
    }

    pub fn height(&self) -> u32 {
        self.surface.borrow().height()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn clip_mask(&self) -> Option<&Rc<Mask>> {
        self.state.clip.as_ref()
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        let p = self.state.transform.transform_point((x, y).into());
        (p.x, p.y)
    }

    /// Current path in device space, `None` if empty.
    pub fn device_path(&self) -> Option<SkiaPath> {
        self.path.clone().finish()
    }

    /// Append a device space path to the current path.
    pub fn push_device_path(&mut self, path: &SkiaPath) {
        self.path.push_path(path);
    }

    /// Run `f` with the surface pixels and the current clip mask.
    pub fn with_pixmap<R>(&self, f: impl FnOnce(&mut Pixmap, Option<&Mask>) -> R) -> R {
        let mut surface = self.surface.borrow_mut();
        f(surface.pixmap_mut(), self.state.clip.as_deref())
    }

    pub fn fill(&mut self, paint: &Paint, rule: FillRule) {
        let Some(path) = self.device_path() else {
            debug!("fill: empty path");
            return;
        };
        self.fill_device_path(&path, paint, rule);
    }

    pub fn fill_device_path(&self, path: &SkiaPath, paint: &Paint, rule: FillRule) {
        self.with_pixmap(|pixmap, mask| {
            pixmap.fill_path(path, paint, rule, Transform::identity(), mask)
        });
    }

    /// Stroke the current path. `stroke.width` is in the space of the current
    /// transform, so anisotropic transforms give anisotropic lines.
    pub fn stroke(&mut self, paint: &Paint, stroke: &Stroke) {
        let Some(path) = self.device_path() else {
            debug!("stroke: empty path");
            return;
        };
        let ts = self.state.transform.into_skia();
        let Some(user_path) = ts.invert().and_then(|inv| path.transform(inv)) else {
            debug!("stroke: transform not invertible");
            return;
        };
        self.with_pixmap(|pixmap, mask| pixmap.stroke_path(&user_path, paint, stroke, ts, mask));
    }

    /// Fill a device space rectangle.
    pub fn fill_device_rect(&self, rect: Rect, paint: &Paint) {
        self.with_pixmap(|pixmap, mask| pixmap.fill_rect(rect, paint, Transform::identity(), mask));
    }

    /// Draw `src` mapped by `transform`, which goes from source pixels to device.
    pub fn draw_pixmap(&self, src: PixmapRef, transform: Matrix, paint: &PixmapPaint) {
        self.with_pixmap(|pixmap, mask| {
            pixmap.draw_pixmap(0, 0, src, paint, transform.into_skia(), mask)
        });
    }

    /// Clear the whole surface to transparent, ignoring clip.
    pub fn clear(&self) {
        self.surface
            .borrow_mut()
            .pixmap_mut()
            .fill(tiny_skia::Color::TRANSPARENT);
    }

    /// Clear a device space rectangle, ignoring clip.
    pub fn clear_device_rect(&self, rect: Rect) {
        let paint = Paint {
            blend_mode: tiny_skia::BlendMode::Clear,
            ..Default::default()
        };
        self.surface
            .borrow_mut()
            .pixmap_mut()
            .fill_rect(rect, &paint, Transform::identity(), None);
    }
}

impl DrawingSurface for Context {
    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        match self.stack.pop() {
            Some(state) => self.state = state,
            None => debug!("context restore without save"),
        }
    }

    fn transform(&mut self, m: &Matrix) {
        self.state.transform = m.then(&self.state.transform);
    }

    fn set_transform(&mut self, m: Matrix) {
        self.state.transform = m;
    }

    fn current_transform(&self) -> Matrix {
        self.state.transform
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.path.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.path.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.path.quad_to(x1, y1, x, y);
    }

    fn bezier_curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.path.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(x, y);
        self.line_to(x + w, y);
        self.line_to(x + w, y + h);
        self.line_to(x, y + h);
        self.close_path();
    }

    fn close_path(&mut self) {
        self.path.close();
    }

    fn clip(&mut self, rule: FillRule) {
        let (w, h) = (self.width(), self.height());
        let Some(path) = self.device_path() else {
            // empty path clips everything away
            self.state.clip = Mask::new(w, h).map(Rc::new);
            return;
        };
        if let Some(mask) = &mut self.state.clip {
            Rc::make_mut(mask).intersect_path(&path, rule, self.anti_alias, Transform::identity());
            return;
        }
        if let Some(mut mask) = Mask::new(w, h) {
            mask.fill_path(&path, rule, self.anti_alias, Transform::identity());
            self.state.clip = Some(Rc::new(mask));
        }
    }
}

/// Active context plus the context suspended by soft-mask mode. While a
/// context is suspended, every state and path call is mirrored onto it so
/// its transform, clip and save depth keep in step with the active one.
#[derive(Debug)]
pub struct MirroredContext {
    pub active: Context,
    pub suspended: Option<Context>,
}

impl MirroredContext {
    pub fn new(active: Context) -> Self {
        Self {
            active,
            suspended: None,
        }
    }

    pub fn is_mirroring(&self) -> bool {
        self.suspended.is_some()
    }

    /// Make `scratch` the active context and mirror onto the current one.
    pub fn suspend(&mut self, scratch: Context) {
        debug_assert!(self.suspended.is_none(), "already suspended");
        let suspended = std::mem::replace(&mut self.active, scratch);
        self.suspended = Some(suspended);
    }

    /// Stop mirroring, the suspended context becomes active again; returns
    /// the scratch context.
    pub fn resume(&mut self) -> Option<Context> {
        let suspended = self.suspended.take()?;
        Some(std::mem::replace(&mut self.active, suspended))
    }

    /// Append a device space path to the current path of both contexts.
    pub fn push_device_path(&mut self, path: &SkiaPath) {
        self.each(|c| c.push_device_path(path));
    }

    fn each(&mut self, mut f: impl FnMut(&mut Context)) {
        f(&mut self.active);
        if let Some(s) = &mut self.suspended {
            f(s);
        }
    }
}

impl DrawingSurface for MirroredContext {
    fn save(&mut self) {
        self.each(Context::save);
    }

    fn restore(&mut self) {
        self.each(Context::restore);
    }

    fn transform(&mut self, m: &Matrix) {
        self.each(|c| c.transform(m));
    }

    fn set_transform(&mut self, m: Matrix) {
        self.each(|c| c.set_transform(m));
    }

    fn current_transform(&self) -> Matrix {
        self.active.current_transform()
    }

    fn begin_path(&mut self) {
        self.each(Context::begin_path);
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.each(|c| c.move_to(x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.each(|c| c.line_to(x, y));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.each(|c| c.quad_to(x1, y1, x, y));
    }

    fn bezier_curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.each(|c| c.bezier_curve_to(x1, y1, x2, y2, x, y));
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.each(|c| c.rect(x, y, w, h));
    }

    fn close_path(&mut self) {
        self.each(Context::close_path);
    }

    fn clip(&mut self, rule: FillRule) {
        self.each(|c| c.clip(rule));
    }
}
