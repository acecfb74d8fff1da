//! Resolving fill and stroke sources to paint: solid colors, tiling
//! pattern tiles and shading tiles.

use super::CanvasGraphics;
use crate::{
    context::DrawingSurface,
    into_skia::{rgb_to_skia, IntoSkia},
    scheduler::{execute_operator_list, Step},
    shading::{create_mesh_tile, paint_radial_axial, tile_size_and_scale},
    state::{PaintSource, PathKind},
};
use anyhow::Result as AnyResult;
use log::{debug, warn};
use pdfcanvas::{
    color::{Rgb, BLACK},
    geom::{singular_value_decompose_2d_scale, Matrix, Rectangle},
    graphics::trans::IntoSkiaTransform,
    pattern::{PatternIr, ShadingIr, TilingIr, TilingPaintType},
};
use std::rc::Rc;
use tiny_skia::{BlendMode, Color, FilterQuality, Paint, Pattern, Pixmap, Shader, SpreadMode};

/// Resolved paint of a fill or stroke.
#[derive(Debug, Clone)]
pub(super) enum Brush {
    Color(Color),
    /// Pixmap painted through `transform`, pixmap pixels to device.
    Tile {
        pixmap: Rc<Pixmap>,
        transform: Matrix,
        spread: SpreadMode,
        quality: FilterQuality,
    },
}

impl Brush {
    pub fn paint(&self, alpha: f32, blend_mode: BlendMode, anti_alias: bool) -> Paint<'_> {
        let shader = match self {
            Self::Color(c) => {
                let mut c = *c;
                c.apply_opacity(alpha);
                Shader::SolidColor(c)
            }
            Self::Tile {
                pixmap,
                transform,
                spread,
                quality,
            } => Pattern::new(
                Pixmap::as_ref(pixmap),
                *spread,
                *quality,
                alpha,
                transform.into_skia(),
            ),
        };
        Paint {
            shader,
            blend_mode,
            anti_alias,
            ..Default::default()
        }
    }

    /// Same paint, moved by `(dx, dy)` device pixels.
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        match self {
            Self::Color(_) => self.clone(),
            Self::Tile {
                pixmap,
                transform,
                spread,
                quality,
            } => Self::Tile {
                pixmap: Rc::clone(pixmap),
                transform: transform.then_translate((dx, dy).into()),
                spread: *spread,
                quality: *quality,
            },
        }
    }
}

/// Cache key of a rendered tiling pattern tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) struct TileKey {
    pattern: usize,
    color: Option<Rgb>,
    scale: [u32; 2],
}

/// Rendered cell of a tiling pattern; tile pixel `(px, py)` is at pattern
/// space `(origin + p / scale)`.
#[derive(Debug)]
pub(super) struct PatternTile {
    // keeps the pattern alive, its address is part of the key
    _ir: Rc<TilingIr>,
    pixmap: Rc<Pixmap>,
    scale: [f32; 2],
    origin: (f32, f32),
}

impl CanvasGraphics {
    /// Paint of `source` for a path of `kind` covering device `region`;
    /// `None` if painting has no effect.
    pub(super) fn brush(
        &mut self,
        source: &PaintSource,
        kind: PathKind,
        region: Option<Rectangle>,
    ) -> AnyResult<Option<Brush>> {
        match source {
            PaintSource::Solid(rgb) => {
                let rgb = self.colors.resolve(*rgb);
                Ok(Some(Brush::Color(rgb_to_skia(rgb, 1.0))))
            }
            PaintSource::Transparent => Ok(None),
            PaintSource::Pattern { pattern, color } => match pattern.as_ref() {
                PatternIr::Tiling(ir) => self.tiling_brush(ir, *color).map(Some),
                PatternIr::Shading { shading, matrix } => {
                    let to_device = matrix
                        .unwrap_or_else(Matrix::identity)
                        .then(&self.base_transform);
                    let scale = combined_scale(matrix.as_ref(), &self.base_transform);
                    Ok(self.shading_brush(shading, to_device, scale, region, kind))
                }
            },
        }
    }

    /// `brush()` that leaves the clip untouched.
    pub(super) fn isolated_brush(
        &mut self,
        source: &PaintSource,
        kind: PathKind,
        region: Option<Rectangle>,
    ) -> AnyResult<Option<Brush>> {
        self.ctx.save();
        let brush = self.brush(source, kind, region);
        self.ctx.restore();
        brush
    }

    /// Paint a shading, `to_device` maps shading space to device space.
    /// Mesh shadings are rasterized at `scale` device pixels per unit.
    fn shading_brush(
        &mut self,
        shading: &ShadingIr,
        to_device: Matrix,
        scale: [f32; 2],
        region: Option<Rectangle>,
        kind: PathKind,
    ) -> Option<Brush> {
        match shading {
            ShadingIr::RadialAxial(sh) => {
                let region = region?;
                let (left, lower) = (region.left_x.floor(), region.lower_y.floor());
                let width = ((region.right_x - left).ceil() as u32).max(1);
                let height = ((region.upper_y - lower).ceil() as u32).max(1);
                let mut tile = Pixmap::new(width, height)?;
                let to_tile = to_device.then_translate((-left, -lower).into());
                paint_radial_axial(&mut tile, sh, to_tile.into_skia());
                Some(Brush::Tile {
                    pixmap: Rc::new(tile),
                    transform: Matrix::translation(left, lower),
                    spread: SpreadMode::Pad,
                    quality: FilterQuality::Nearest,
                })
            }
            ShadingIr::Mesh(mesh) => {
                if let Some(bbox) = &mesh.bbox {
                    self.clip_to_bbox(bbox, to_device);
                }
                // background only paints under pattern fills, not `sh`
                let background = (kind != PathKind::Shading)
                    .then_some(mesh.background)
                    .flatten();
                let tile =
                    create_mesh_tile(mesh, scale, background, self.option.max_pattern_size())?;
                Some(Brush::Tile {
                    transform: tile.to_mesh_space().then(&to_device),
                    pixmap: Rc::new(tile.pixmap),
                    spread: SpreadMode::Pad,
                    quality: FilterQuality::Bilinear,
                })
            }
            ShadingIr::Dummy => {
                debug!("unsupported shading painted as nothing");
                None
            }
        }
    }

    /// Intersect the clip with `bbox` mapped by `to_device`, keeping the
    /// current path.
    fn clip_to_bbox(&mut self, bbox: &Rectangle, to_device: Matrix) {
        let path = self.ctx.active.device_path();
        let ctm = self.ctx.current_transform();
        self.ctx.set_transform(to_device);
        self.ctx.begin_path();
        self.ctx
            .rect(bbox.left_x, bbox.lower_y, bbox.width(), bbox.height());
        self.ctx.clip(tiny_skia::FillRule::Winding);
        self.ctx.begin_path();
        self.ctx.set_transform(ctm);
        if let Some(path) = path {
            self.ctx.push_device_path(&path);
        }
    }

    fn tiling_brush(&mut self, ir: &Rc<TilingIr>, color: Option<Rgb>) -> AnyResult<Brush> {
        let [sx, sy] = combined_scale(Some(&ir.matrix), &self.base_transform);
        let key = TileKey {
            pattern: Rc::as_ptr(ir) as usize,
            color,
            scale: [sx.to_bits(), sy.to_bits()],
        };
        let tile = match self.tiles.get(&key) {
            Some(tile) => Rc::clone(tile),
            None => {
                let tile = Rc::new(self.render_tile(ir, color, [sx, sy])?);
                self.tiles.insert(key, Rc::clone(&tile));
                tile
            }
        };
        let [scale_x, scale_y] = tile.scale;
        let transform = Matrix::scale(1.0 / scale_x, 1.0 / scale_y)
            .then_translate(tile.origin.into())
            .then(&ir.matrix)
            .then(&self.base_transform);
        Ok(Brush::Tile {
            pixmap: Rc::clone(&tile.pixmap),
            transform,
            spread: SpreadMode::Repeat,
            quality: FilterQuality::Bilinear,
        })
    }

    /// Execute the pattern's operators into a tile of one step.
    fn render_tile(
        &mut self,
        ir: &Rc<TilingIr>,
        color: Option<Rgb>,
        [combined_x, combined_y]: [f32; 2],
    ) -> AnyResult<PatternTile> {
        let bbox = ir.bbox;
        // tile origin is the bbox corner, moved to 0 when negative
        let (mut x0, mut y0, mut x1, mut y1) = (bbox.left_x, bbox.lower_y, bbox.right_x, bbox.upper_y);
        if x0 < 0.0 {
            x1 += x0.abs();
            x0 = 0.0;
        }
        if y0 < 0.0 {
            y1 += y0.abs();
            y0 = 0.0;
        }
        let x_step = if ir.x_step == 0.0 { bbox.width() } else { ir.x_step };
        let y_step = if ir.y_step == 0.0 { bbox.height() } else { ir.y_step };
        let max_size = self.option.max_pattern_size();
        let (width, scale_x) =
            tile_size_and_scale(x_step, self.ctx.active.width(), combined_x, max_size);
        let (height, scale_y) =
            tile_size_and_scale(y_step, self.ctx.active.height(), combined_y, max_size);
        debug!("tiling pattern tile {width}x{height}, scale {scale_x} {scale_y}");

        let surface = self.scratch.factory().create(width, height)?;
        let mut graphics = self.nested(Rc::clone(&surface));
        if ir.paint_type == TilingPaintType::Uncolored {
            let color = color.unwrap_or(BLACK);
            graphics.state.fill = PaintSource::Solid(color);
            graphics.state.stroke = PaintSource::Solid(color);
        }
        graphics.ctx.translate(-scale_x * x0, -scale_y * y0);
        graphics.ctx.scale(scale_x, scale_y);
        graphics.ctx.save();
        graphics.clip_rect(&Rectangle::from_lbrt(x0, y0, x1, y1));
        graphics.base_transform = graphics.ctx.current_transform();
        let step = execute_operator_list(&mut graphics, &ir.operator_list, 0, None, None);
        graphics.end_drawing();
        match step? {
            Step::Blocked(i) => warn!("tiling pattern stopped at operator {i}, object missing"),
            step => debug!("tiling pattern painted: {step:?}"),
        }
        drop(graphics);

        let pixmap = surface.borrow().pixmap().clone();
        self.scratch.factory().destroy(surface);
        Ok(PatternTile {
            _ir: Rc::clone(ir),
            pixmap: Rc::new(pixmap),
            scale: [scale_x, scale_y],
            origin: (x0, y0),
        })
    }

    /// `sh`: paint a shading over the whole clip region.
    pub(super) fn shading_fill(&mut self, shading: &Rc<ShadingIr>) -> AnyResult<()> {
        self.save();
        let ctm = self.ctx.current_transform();
        let region = self.state.clip_box;
        let scale = singular_value_decompose_2d_scale(&ctm);
        if let Some(brush) =
            self.shading_brush(shading, ctm, scale, Some(region), PathKind::Shading)
        {
            let paint = brush.paint(
                self.state.fill_alpha,
                self.state.blend_mode(),
                self.ctx.active.anti_alias(),
            );
            let (w, h) = (self.ctx.active.width(), self.ctx.active.height());
            let full = Rectangle::from_xywh(0.0, 0.0, w as f32, h as f32);
            if let Some(rect) = full.into_skia() {
                self.ctx.active.fill_device_rect(rect, &paint);
            }
        }
        self.compose(None);
        self.restore();
        Ok(())
    }
}

/// Device pixels per pattern unit along both axes.
fn combined_scale(matrix: Option<&Matrix>, base: &Matrix) -> [f32; 2] {
    let [bx, by] = singular_value_decompose_2d_scale(base);
    match matrix {
        Some(m) => {
            let [mx, my] = singular_value_decompose_2d_scale(m);
            [mx * bx, my * by]
        }
        None => [bx, by],
    }
}
