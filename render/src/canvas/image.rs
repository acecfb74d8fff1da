//! Image XObjects and stencil masks.

use super::{image_smoothing, pattern::Brush, CanvasGraphics};
use crate::{
    context::{Context, DrawingSurface},
    error::RenderError,
    into_skia::{rgb_to_skia, IntoSkia},
    raster::{box_downscale, half_size, put_binary_image_data, put_binary_image_mask},
    state::{PaintSource, PathKind},
    surface::SharedSurface,
};
use anyhow::{anyhow, Result as AnyResult};
use log::{debug, warn};
use pdfcanvas::{
    color::Rgb,
    geom::{inverse_transform, Matrix, Rectangle},
    graphics::{
        trans::{image_to_user_space, IntoSkiaTransform},
        Point,
    },
    image::{ImageData, MaskImage},
    operator::PlacedMask,
    store::{ObjId, ObjValue},
};
use std::rc::Rc;
use tiny_skia::{FillRule, FilterQuality, PathBuilder, PixmapPaint};

/// Largest image or stencil in pixels, 16384 squared.
const MAX_IMAGE_PIXELS: u32 = 1 << 28;

/// Cache key of a colored stencil: mask identity, the linear part of the
/// transform and the fill color.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct StencilKey {
    image: String,
    transform: [u32; 4],
    color: Rgb,
}

/// Colored stencil kept for masks painted more than once. `offset` is the
/// device position relative to the translation of the transform.
#[derive(Debug)]
pub(super) struct CachedStencil {
    surface: SharedSurface,
    offset: (f32, f32),
}

/// Skip images with a size no surface can hold.
fn drawable_size(kind: &str, width: u32, height: u32) -> bool {
    let ok = width > 0
        && height > 0
        && width
            .checked_mul(height)
            .is_some_and(|n| n <= MAX_IMAGE_PIXELS);
    if !ok {
        warn!("{kind} of size {width}x{height} skipped");
    }
    ok
}

/// Mask image pixels to device space under `ctm`.
fn image_to_device(width: u32, height: u32, ctm: &Matrix) -> Matrix {
    image_to_user_space(width, height).to_untyped().then(ctm)
}

impl CanvasGraphics {
    /// Image or mask object of `id`. An object resolved to an error payload
    /// fails the painting operator with [`RenderError::DependencyFailed`].
    fn image_object(&self, id: &ObjId) -> Result<Option<ObjValue>, RenderError> {
        match self.objs.get(id) {
            Some(ObjValue::Error(reason)) => Err(RenderError::DependencyFailed {
                id: id.to_string(),
                reason: reason.to_string(),
            }),
            None => {
                warn!("dependent image {id} isn't ready yet");
                Ok(None)
            }
            v => Ok(v),
        }
    }

    pub(super) fn paint_image_x_object(&mut self, id: &ObjId) -> AnyResult<()> {
        match self.image_object(id)? {
            Some(ObjValue::Image(img)) => self.paint_image(&img),
            Some(ObjValue::Mask(mask)) => self.paint_image_mask(&mask),
            Some(v) => {
                warn!("object {id} is not an image: {v:?}");
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub(super) fn paint_inline_image(&mut self, img: &ImageData) -> AnyResult<()> {
        self.paint_image(img)
    }

    /// Unpack `img` into the `inlineImage` scratch surface, transfer
    /// functions applied.
    fn unpack_image(&mut self, img: &ImageData) -> AnyResult<SharedSurface> {
        let surface = self.image_scratch("inlineImage", img.width, img.height)?;
        let tables = self.state.transfer_map.as_ref().map(|t| t.tables());
        put_binary_image_data(surface.borrow_mut().pixmap_mut(), img, tables.as_ref())?;
        Ok(surface)
    }

    /// Scratch surface sized by content, a size the factory rejects fails
    /// the painting operator only.
    fn image_scratch(&mut self, key: &str, width: u32, height: u32) -> AnyResult<SharedSurface> {
        self.scratch.get(key, width, height).map_err(|e| match e {
            RenderError::InvalidSurfaceSize { width, height } => {
                anyhow!("no {key} surface of {width}x{height}")
            }
            e => e.into(),
        })
    }

    fn image_paint(&self, quality: FilterQuality) -> PixmapPaint {
        PixmapPaint {
            opacity: self.state.fill_alpha,
            blend_mode: self.state.blend_mode(),
            quality,
        }
    }

    fn paint_image(&mut self, img: &ImageData) -> AnyResult<()> {
        if !drawable_size("image", img.width, img.height) {
            return Ok(());
        }
        let ctm = self.ctx.current_transform();
        let img_to_device = image_to_device(img.width, img.height, &ctm);
        let Ok(inverse) = inverse_transform(&img_to_device) else {
            debug!("image transform not invertible, skipped");
            return Ok(());
        };
        let surface = self.unpack_image(img)?;
        let (scaled, width, height) = self.prescale(surface, &inverse)?;
        let paint = self.image_paint(image_smoothing(&img_to_device, img.interpolate));
        self.ctx.active.draw_pixmap(
            scaled.borrow().pixmap().as_ref(),
            image_to_device(width, height, &ctm),
            &paint,
        );
        self.compose(None);
        Ok(())
    }

    /// Halve `src` until one pixel covers no more than two device pixels,
    /// `inverse` maps device to image pixels. Returns the surface to draw
    /// and its size.
    fn prescale(
        &mut self,
        src: SharedSurface,
        inverse: &Matrix,
    ) -> AnyResult<(SharedSurface, u32, u32)> {
        let mut width_scale = inverse.m11.hypot(inverse.m12).max(1.0);
        let mut height_scale = inverse.m21.hypot(inverse.m22).max(1.0);
        let (mut width, mut height) = {
            let s = src.borrow();
            (s.width(), s.height())
        };
        let mut img = src;
        let mut key = "prescale1";
        while (width_scale > 2.0 && width > 1) || (height_scale > 2.0 && height > 1) {
            let (mut new_width, mut new_height) = (width, height);
            if width_scale > 2.0 && width > 1 {
                new_width = half_size(width);
                width_scale /= width as f32 / new_width as f32;
            }
            if height_scale > 2.0 && height > 1 {
                new_height = half_size(height);
                height_scale /= height as f32 / new_height as f32;
            }
            let dst = self.image_scratch(key, new_width, new_height)?;
            box_downscale(img.borrow().pixmap().as_ref(), dst.borrow_mut().pixmap_mut());
            img = dst;
            (width, height) = (new_width, new_height);
            key = if key == "prescale1" { "prescale2" } else { "prescale1" };
        }
        Ok((img, width, height))
    }

    /// `PaintImageXObjectRepeat`, one image at several positions.
    pub(super) fn paint_image_repeat(
        &mut self,
        id: &ObjId,
        scale_x: f32,
        scale_y: f32,
        positions: &[Point],
    ) -> AnyResult<()> {
        let Some(ObjValue::Image(img)) = self.image_object(id)? else {
            return Ok(());
        };
        if !drawable_size("image", img.width, img.height) {
            return Ok(());
        }
        let surface = self.unpack_image(&img)?;
        let ctm = self.ctx.current_transform();
        let surface = surface.borrow();
        for pos in positions {
            let entry = Matrix::new(scale_x, 0.0, 0.0, scale_y, pos.x, pos.y).then(&ctm);
            let img_to_device = image_to_device(img.width, img.height, &entry);
            let paint = self.image_paint(image_smoothing(&img_to_device, img.interpolate));
            self.ctx
                .active
                .draw_pixmap(surface.pixmap().as_ref(), img_to_device, &paint);
        }
        drop(surface);
        self.compose(None);
        Ok(())
    }

    /// Render `img` as a stencil colored with the fill paint, returns the
    /// surface and its device position. Stencils of masks painted more than
    /// once with a solid color are cached.
    fn create_mask_canvas(
        &mut self,
        img: &MaskImage,
    ) -> AnyResult<Option<(SharedSurface, (i32, i32))>> {
        if !drawable_size("image mask", img.width, img.height) {
            return Ok(None);
        }
        let ctm = self.ctx.current_transform();
        let fill = self.state.fill.clone();
        let solid = match &fill {
            PaintSource::Solid(rgb) => Some(self.colors.resolve(*rgb)),
            _ => None,
        };
        let cache_key = solid.filter(|_| img.count > 1).map(|color| StencilKey {
            image: img
                .cache_key
                .clone()
                .unwrap_or_else(|| format!("{:p}", Rc::as_ptr(&img.data))),
            transform: [ctm.m11, ctm.m12, ctm.m21, ctm.m22].map(f32::to_bits),
            color,
        });
        if let Some(cached) = cache_key.as_ref().and_then(|k| self.stencils.get(k)) {
            let offset_x = (cached.offset.0 + ctm.m31).round() as i32;
            let offset_y = (cached.offset.1 + ctm.m32).round() as i32;
            return Ok(Some((Rc::clone(&cached.surface), (offset_x, offset_y))));
        }

        let (width, height) = (img.width, img.height);
        let mask_surface = self.image_scratch("maskCanvas", width, height)?;
        put_binary_image_mask(mask_surface.borrow_mut().pixmap_mut(), img)?;

        let mask_to_device = image_to_device(width, height, &ctm);
        let bbox =
            Rectangle::from_xywh(0.0, 0.0, width as f32, height as f32).transform(&mask_to_device);
        let drawn_width = (bbox.width().round() as u32).max(1);
        let drawn_height = (bbox.height().round() as u32).max(1);
        let (offset_x, offset_y) = (bbox.left_x, bbox.lower_y);
        let mask_to_fill = mask_to_device.then_translate((-offset_x, -offset_y).into());
        let Ok(inverse) = inverse_transform(&mask_to_fill) else {
            debug!("image mask transform not invertible, skipped");
            return Ok(None);
        };
        let (scaled, scaled_width, scaled_height) = self.prescale(mask_surface, &inverse)?;

        let brush = match solid {
            Some(rgb) => Some(Brush::Color(rgb_to_skia(rgb, 1.0))),
            None => self
                .isolated_brush(&fill, PathKind::Fill, Some(bbox))?
                .map(|b| b.translated(-offset_x, -offset_y)),
        };

        let fill_surface = self.image_scratch("fillCanvas", drawn_width, drawn_height)?;
        let fill_ctx = Context::new(Rc::clone(&fill_surface));
        fill_ctx.draw_pixmap(
            scaled.borrow().pixmap().as_ref(),
            image_to_device(scaled_width, scaled_height, &mask_to_fill),
            &PixmapPaint {
                quality: image_smoothing(&mask_to_device, false),
                ..Default::default()
            },
        );
        match brush {
            Some(brush) => {
                let paint = brush.paint(1.0, tiny_skia::BlendMode::SourceIn, true);
                let full = Rectangle::from_xywh(0.0, 0.0, drawn_width as f32, drawn_height as f32);
                if let Some(rect) = full.into_skia() {
                    fill_ctx.fill_device_rect(rect, &paint);
                }
            }
            // transparent fill, the stencil paints nothing
            None => fill_ctx.clear(),
        }

        if let Some(key) = cache_key {
            if let Some(surface) = self.scratch.take("fillCanvas") {
                let offset = (offset_x - ctm.m31, offset_y - ctm.m32);
                self.stencils.insert(key, CachedStencil { surface, offset });
            }
        }
        Ok(Some((
            fill_surface,
            (offset_x.round() as i32, offset_y.round() as i32),
        )))
    }

    fn blit_stencil(&self, surface: &SharedSurface, x: f32, y: f32) {
        let paint = self.image_paint(FilterQuality::Nearest);
        self.ctx.active.draw_pixmap(
            surface.borrow().pixmap().as_ref(),
            Matrix::translation(x, y),
            &paint,
        );
    }

    fn draw_image_mask(&mut self, img: &MaskImage) -> AnyResult<()> {
        if let Some((surface, (x, y))) = self.create_mask_canvas(img)? {
            self.blit_stencil(&surface, x as f32, y as f32);
        }
        Ok(())
    }

    pub(super) fn paint_image_mask(&mut self, img: &MaskImage) -> AnyResult<()> {
        self.draw_image_mask(img)?;
        self.compose(None);
        Ok(())
    }

    pub(super) fn paint_image_mask_group(&mut self, masks: &[PlacedMask]) -> AnyResult<()> {
        for placed in masks {
            self.ctx.save();
            self.ctx.transform(&placed.transform);
            let r = self.draw_image_mask(&placed.mask);
            self.ctx.restore();
            r?;
        }
        self.compose(None);
        Ok(())
    }

    /// One mask at several positions, rendered once.
    pub(super) fn paint_image_mask_repeat(
        &mut self,
        mask: &MaskImage,
        transform: &Matrix,
        positions: &[Point],
    ) -> AnyResult<()> {
        let ctm = self.ctx.current_transform();
        self.ctx.save();
        self.ctx.transform(transform);
        let stencil = self.create_mask_canvas(mask);
        self.ctx.restore();
        let Some((surface, (offset_x, offset_y))) = stencil? else {
            return Ok(());
        };
        for pos in positions {
            let p = ctm.transform_point((pos.x, pos.y).into());
            self.blit_stencil(
                &surface,
                offset_x as f32 - ctm.m31 + p.x,
                offset_y as f32 - ctm.m32 + p.y,
            );
        }
        self.compose(None);
        Ok(())
    }

    /// Fill the unit square with the fill paint.
    pub(super) fn paint_solid_color_image_mask(&mut self) -> AnyResult<()> {
        let ctm = self.ctx.current_transform();
        let unit = Rectangle::from_xywh(0.0, 0.0, 1.0, 1.0);
        let path = unit
            .into_skia()
            .map(PathBuilder::from_rect)
            .and_then(|p| p.transform(ctm.into_skia()));
        let Some(path) = path else {
            return Ok(());
        };
        let fill = self.state.fill.clone();
        self.ctx.save();
        let brush = self.brush(&fill, PathKind::Fill, Some(unit.transform(&ctm)));
        if let Ok(Some(brush)) = &brush {
            let paint = brush.paint(
                self.state.fill_alpha,
                self.state.blend_mode(),
                self.ctx.active.anti_alias(),
            );
            self.ctx
                .active
                .fill_device_path(&path, &paint, FillRule::Winding);
        }
        self.ctx.restore();
        brush?;
        self.compose(None);
        Ok(())
    }
}
