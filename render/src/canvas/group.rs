//! Transparency groups. A group paints onto its own surface, sized to its
//! device bounds; soft-mask groups keep the surface as the next mask.

use super::{CanvasGraphics, GroupParent};
use crate::{
    context::{Context, DrawingSurface},
    state::SMaskLayer,
    surface::SharedSurface,
};
use anyhow::Result as AnyResult;
use log::{debug, info, warn};
use pdfcanvas::{
    color::Rgb,
    geom::{Matrix, Rectangle},
    graphics::{BlendMode, GroupOptions, SoftMaskSubtype},
};
use std::rc::Rc;
use tiny_skia::{FillRule, FilterQuality, PixmapPaint};

/// Soft-mask group being painted, becomes an [`SMaskLayer`] at its end.
#[derive(Debug)]
pub(super) struct PendingSMask {
    key: String,
    offset: (i32, i32),
    /// Device pixels per group pixel, above 1 if the group was too large.
    scale: [f32; 2],
    subtype: SoftMaskSubtype,
    backdrop: Option<Rgb>,
    transfer: Option<[u8; 256]>,
}

impl CanvasGraphics {
    pub(super) fn begin_group(&mut self, group: &GroupOptions) -> AnyResult<()> {
        self.save();
        // the group paints unmasked, the mask comes back with the restore
        // in `end_group`
        if self.ctx.is_mirroring() {
            self.end_smask_mode();
            self.state.active_smask = None;
        }
        let depth = self.ctx.active.depth().saturating_sub(1);
        let states = self.state_stack.len().saturating_sub(1);
        if !group.isolated {
            info!("not implemented: non-isolated group");
        }
        if group.knockout {
            info!("not implemented: knockout group");
        }

        let current = self.ctx.current_transform();
        let group_to_device = group.matrix.map_or(current, |m| m.then(&current));
        let (width, height) = (self.ctx.active.width(), self.ctx.active.height());
        let bounds = group
            .bbox
            .transform(&group_to_device)
            .intersect(&Rectangle::from_xywh(0.0, 0.0, width as f32, height as f32))
            .unwrap_or(Rectangle::EMPTY);
        let offset_x = bounds.left_x.floor();
        let offset_y = bounds.lower_y.floor();
        let mut drawn_width = ((bounds.right_x.ceil() - offset_x) as u32).max(1);
        let mut drawn_height = ((bounds.upper_y.ceil() - offset_y) as u32).max(1);
        let max_size = self.option.max_group_size();
        let (mut scale_x, mut scale_y) = (1.0, 1.0);
        if drawn_width > max_size {
            scale_x = drawn_width as f32 / max_size as f32;
            drawn_width = max_size;
        }
        if drawn_height > max_size {
            scale_y = drawn_height as f32 / max_size as f32;
            drawn_height = max_size;
        }
        self.state.start_new_path_and_clip_box(Rectangle::from_xywh(
            0.0,
            0.0,
            drawn_width as f32,
            drawn_height as f32,
        ));

        let mut key = format!("groupAt{}", self.group_level);
        if group.smask.is_some() {
            // two entries, masks used one after another stay intact
            key += &format!("_smask_{}", self.smask_counter % 2);
            self.smask_counter += 1;
        }
        let surface = match self.scratch.get(&key, drawn_width, drawn_height) {
            Ok(s) => s,
            Err(e) => {
                self.restore();
                return Err(e.into());
            }
        };
        debug!("begin group {key} {drawn_width}x{drawn_height} at ({offset_x}, {offset_y})");

        let to_group = current
            .then_translate((-offset_x, -offset_y).into())
            .then_scale(1.0 / scale_x, 1.0 / scale_y);
        let mut group_ctx = Context::new(surface);
        group_ctx.set_anti_alias(self.option.anti_alias());
        group_ctx.set_transform(group.matrix.map_or(to_group, |m| m.then(&to_group)));
        let bbox = &group.bbox;
        group_ctx.rect(bbox.left_x, bbox.lower_y, bbox.width(), bbox.height());
        group_ctx.clip(FillRule::Winding);
        group_ctx.begin_path();
        group_ctx.set_transform(to_group);

        match &group.smask {
            Some(smask) => self.smask_stack.push(PendingSMask {
                key,
                offset: (offset_x as i32, offset_y as i32),
                scale: [scale_x, scale_y],
                subtype: smask.subtype,
                backdrop: smask.backdrop,
                transfer: smask.transfer_map.as_ref().map(|t| t.tables()[0]),
            }),
            None => {
                // where the group surface is drawn at the end
                self.ctx.set_transform(
                    Matrix::scale(scale_x, scale_y).then_translate((offset_x, offset_y).into()),
                );
                self.ctx.save();
            }
        }

        let parent = std::mem::replace(&mut self.ctx.active, group_ctx);
        self.group_stack.push(GroupParent {
            ctx: parent,
            depth,
            states,
        });
        self.group_level += 1;
        self.state.blend_mode = BlendMode::Normal;
        self.state.fill_alpha = 1.0;
        self.state.stroke_alpha = 1.0;
        Ok(())
    }

    pub(super) fn end_group(&mut self, group: &GroupOptions) -> AnyResult<()> {
        if self.ctx.is_mirroring() {
            self.end_smask_mode();
        }
        let Some(parent) = self.group_stack.pop() else {
            warn!("end group without begin");
            return Ok(());
        };
        self.group_level = self.group_level.saturating_sub(1);
        let group_ctx = std::mem::replace(&mut self.ctx.active, parent.ctx);
        let group_surface = Rc::clone(group_ctx.surface());
        drop(group_ctx);

        if group.smask.is_some() {
            let r = match self.smask_stack.pop() {
                Some(pending) => self.finish_smask(pending, group_surface),
                None => {
                    warn!("soft mask group without pending mask");
                    Ok(())
                }
            };
            self.restore();
            return r;
        }

        self.ctx.restore();
        let matrix = self.ctx.current_transform();
        self.restore();
        let (width, height) = {
            let s = group_surface.borrow();
            (s.width(), s.height())
        };
        let paint = PixmapPaint {
            opacity: self.state.fill_alpha,
            blend_mode: self.state.blend_mode(),
            quality: FilterQuality::Nearest,
        };
        self.ctx
            .active
            .draw_pixmap(group_surface.borrow().pixmap().as_ref(), matrix, &paint);
        let dirty = Rectangle::from_xywh(0.0, 0.0, width as f32, height as f32).transform(&matrix);
        self.compose(Some(dirty));
        Ok(())
    }

    /// Keep the group surface as the mask activated by the next `SMask`
    /// graphics state entry.
    fn finish_smask(&mut self, pending: PendingSMask, surface: SharedSurface) -> AnyResult<()> {
        // the mask outlives the group, detach it from the scratch cache
        self.scratch.take(&pending.key);
        let surface = self.upscale_mask(surface, pending.scale)?;
        self.temp_smask = Some(Rc::new(SMaskLayer {
            surface,
            offset: pending.offset,
            subtype: pending.subtype,
            backdrop: pending.backdrop,
            transfer: pending.transfer,
        }));
        Ok(())
    }

    /// Mask painted at reduced size back to device resolution.
    fn upscale_mask(&self, surface: SharedSurface, [sx, sy]: [f32; 2]) -> AnyResult<SharedSurface> {
        if sx == 1.0 && sy == 1.0 {
            return Ok(surface);
        }
        let (width, height) = {
            let s = surface.borrow();
            (s.width(), s.height())
        };
        let full = self.scratch.factory().create(
            (width as f32 * sx).ceil() as u32,
            (height as f32 * sy).ceil() as u32,
        )?;
        Context::new(Rc::clone(&full)).draw_pixmap(
            surface.borrow().pixmap().as_ref(),
            Matrix::scale(sx, sy),
            &PixmapPaint {
                quality: FilterQuality::Bilinear,
                ..Default::default()
            },
        );
        Ok(full)
    }
}
