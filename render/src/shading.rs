//! Shading rasterization: axial/radial gradients, Gouraud-shaded meshes and
//! tiling pattern sizing.

use crate::into_skia::{rgb_to_skia, IntoSkia};
use log::{debug, warn};
use pdfcanvas::{
    color::Rgb,
    geom::{singular_value_decompose_2d_scale, Matrix, Rectangle},
    graphics::{trans::from_skia, Point},
    pattern::{ColorStop, GradientKind, MeshFigure, MeshShading, RadialAxialShading},
};
use tiny_skia::{
    BlendMode, Color, FillRule, GradientStop, LinearGradient, Mask, Paint, PathBuilder, Pixmap,
    Rect, SpreadMode, Transform,
};

/// Offset of the first/last real stop when an end is not extended.
const SMALL_NUMBER: f32 = 1e-6;

/// Color at `t` of piecewise linear `stops`, sorted by `t`.
pub fn color_at(stops: &[ColorStop], t: f32) -> Rgb {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return [0, 0, 0];
    };
    if t <= first.t {
        return first.color;
    }
    if t >= last.t {
        return last.color;
    }
    let i = stops.partition_point(|s| s.t <= t);
    let (a, b) = (&stops[i - 1], &stops[i]);
    let k = if b.t > a.t { (t - a.t) / (b.t - a.t) } else { 0.0 };
    std::array::from_fn(|ch| {
        let (ca, cb) = (f32::from(a.color[ch]), f32::from(b.color[ch]));
        k.mul_add(cb - ca, ca).round() as u8
    })
}

/// Gradient stops with a background (or transparent) stop added at each
/// end that is not extended.
fn skia_stops(sh: &RadialAxialShading, alpha: f32) -> Vec<GradientStop> {
    let background = sh
        .background
        .map_or(Color::TRANSPARENT, |c| rgb_to_skia(c, alpha));
    let mut stops: Vec<(f32, Color)> = sh
        .stops
        .iter()
        .map(|s| (s.t, rgb_to_skia(s.color, alpha)))
        .collect();
    if !sh.extend[0] {
        if let Some(first) = stops.first_mut() {
            first.0 += SMALL_NUMBER;
        }
        stops.insert(0, (0.0, background));
    }
    if !sh.extend[1] {
        if let Some(last) = stops.last_mut() {
            last.0 -= SMALL_NUMBER;
        }
        stops.push((1.0, background));
    }
    stops
        .into_iter()
        .map(|(t, c)| GradientStop::new(t, c))
        .collect()
}

/// Clip mask of the shading's bounding box, in tile pixels.
pub fn bbox_mask(bbox: Option<Rectangle>, tile: &Pixmap, to_tile: Transform) -> Option<Mask> {
    let rect = bbox?.into_skia()?;
    let path = PathBuilder::from_rect(rect);
    let mut mask = Mask::new(tile.width(), tile.height())?;
    mask.fill_path(&path, FillRule::Winding, true, to_tile);
    Some(mask)
}

/// Paint an axial or radial shading into `tile`. `to_tile` maps shading
/// space to tile pixels.
pub fn paint_radial_axial(tile: &mut Pixmap, sh: &RadialAxialShading, to_tile: Transform) {
    let mask = bbox_mask(sh.bbox, tile, to_tile);
    match sh.kind {
        GradientKind::Axial => paint_axial(tile, sh, to_tile, mask.as_ref()),
        GradientKind::Radial => paint_radial(tile, sh, to_tile, mask.as_ref()),
    }
}

fn full_rect(tile: &Pixmap) -> Option<Rect> {
    Rect::from_xywh(0.0, 0.0, tile.width() as f32, tile.height() as f32)
}

fn paint_axial(tile: &mut Pixmap, sh: &RadialAxialShading, to_tile: Transform, mask: Option<&Mask>) {
    let Some(shader) = LinearGradient::new(
        sh.p0.into_skia(),
        sh.p1.into_skia(),
        skia_stops(sh, 1.0),
        SpreadMode::Pad,
        to_tile,
    ) else {
        debug!("degenerate axial shading");
        return;
    };
    let Some(rect) = full_rect(tile) else {
        return;
    };
    let paint = Paint {
        shader,
        ..Default::default()
    };
    tile.fill_rect(rect, &paint, Transform::identity(), mask);
}

/// Two-circle radial gradient, painted as filled circles from the outer
/// circle inwards.
fn paint_radial(tile: &mut Pixmap, sh: &RadialAxialShading, to_tile: Transform, mask: Option<&Mask>) {
    let (Point { x: x0, y: y0 }, Point { x: x1, y: y1 }) = (sh.p0, sh.p1);
    let (r0, r1) = (sh.r0, sh.r1);
    if r0 < 0.0 || r1 < 0.0 || (r0 == 0.0 && r1 == 0.0) {
        debug!("invalid radial shading radius: {r0} {r1}");
        return;
    }
    let Some(rect) = full_rect(tile) else {
        return;
    };
    let circle = |t: f32| {
        (
            t.mul_add(x1 - x0, x0),
            t.mul_add(y1 - y0, y0),
            t.mul_add(r1 - r0, r0),
        )
    };
    let color = |t: f32| color_at(&sh.stops, t);

    // number of steps from the device size of the gradient
    let scale: Matrix = from_skia(to_tile);
    let [sx, sy] = singular_value_decompose_2d_scale(&scale);
    let extent = (r0.max(r1) + (x1 - x0).hypot(y1 - y0)) * sx.max(sy);
    let steps = (extent.ceil() as usize).clamp(10, 2048);

    let (outer_t, inner_t, outer_extend, inner_extend) = if r1 >= r0 {
        (1.0, 0.0, sh.extend[1], sh.extend[0])
    } else {
        (0.0, 1.0, sh.extend[0], sh.extend[1])
    };

    let mut paint = Paint::default();
    if outer_extend {
        paint.set_color(rgb_to_skia(color(outer_t), 1.0));
        tile.fill_rect(rect, &paint, Transform::identity(), mask);
    } else if let Some(bg) = sh.background {
        paint.set_color(rgb_to_skia(bg, 1.0));
        tile.fill_rect(rect, &paint, Transform::identity(), mask);
    }

    for i in 0..=steps {
        let k = i as f32 / steps as f32;
        let t = k.mul_add(inner_t - outer_t, outer_t);
        let (x, y, r) = circle(t);
        let Some(path) = PathBuilder::from_circle(x, y, r) else {
            continue;
        };
        paint.set_color(rgb_to_skia(color(t), 1.0));
        tile.fill_path(&path, &paint, FillRule::Winding, to_tile, mask);
    }

    let (x, y, r) = circle(inner_t);
    if r > 0.0 && !inner_extend {
        if let Some(path) = PathBuilder::from_circle(x, y, r) {
            match sh.background {
                Some(bg) => paint.set_color(rgb_to_skia(bg, 1.0)),
                None => paint.blend_mode = BlendMode::Clear,
            }
            tile.fill_path(&path, &paint, FillRule::Winding, to_tile, mask);
        }
    }
}

/// Mesh coordinates to mesh-tile pixels.
#[derive(Debug, Clone, Copy)]
pub struct MeshContext {
    pub offset_x: f32,
    pub offset_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

/// RGBA buffer a mesh is rasterized into, straight alpha.
pub struct MeshBuffer<'a> {
    pub data: &'a mut [u8],
    pub width: usize,
    pub height: usize,
}

/// Gouraud-shade one triangle into `buf`, scanline by scanline. A
/// triangle of zero height is skipped.
#[allow(clippy::too_many_arguments)]
pub fn draw_triangle(
    buf: &mut MeshBuffer,
    ctx: &MeshContext,
    mut p1: Point,
    mut p2: Point,
    mut p3: Point,
    mut c1: Rgb,
    mut c2: Rgb,
    mut c3: Rgb,
) {
    if p1.y > p2.y {
        std::mem::swap(&mut p1, &mut p2);
        std::mem::swap(&mut c1, &mut c2);
    }
    if p2.y > p3.y {
        std::mem::swap(&mut p2, &mut p3);
        std::mem::swap(&mut c2, &mut c3);
    }
    if p1.y > p2.y {
        std::mem::swap(&mut p1, &mut p2);
        std::mem::swap(&mut c1, &mut c2);
    }
    let map = |p: Point| {
        (
            (p.x + ctx.offset_x) * ctx.scale_x,
            (p.y + ctx.offset_y) * ctx.scale_y,
        )
    };
    let (x1, y1) = map(p1);
    let (x2, y2) = map(p2);
    let (x3, y3) = map(p3);
    if y1 >= y3 {
        return;
    }

    let c = |c: Rgb| c.map(f32::from);
    let (c1, c2, c3) = (c(c1), c(c2), c(c3));
    let lerp = |a: [f32; 3], b: [f32; 3], k: f32| -> [f32; 3] {
        std::array::from_fn(|i| a[i] - (a[i] - b[i]) * k)
    };

    let min_y = (y1.round() as i64).max(0);
    let max_y = (y3.round() as i64).min(buf.height as i64 - 1);
    for y in min_y..=max_y {
        let yf = y as f32;
        let (xa, ca) = if yf < y2 {
            let k = if yf < y1 { 0.0 } else { (y1 - yf) / (y1 - y2) };
            (x1 - (x1 - x2) * k, lerp(c1, c2, k))
        } else {
            let k = if yf > y3 {
                1.0
            } else if y2 == y3 {
                0.0
            } else {
                (y2 - yf) / (y2 - y3)
            };
            (x2 - (x2 - x3) * k, lerp(c2, c3, k))
        };
        let k = if yf < y1 {
            0.0
        } else if yf > y3 {
            1.0
        } else {
            (y1 - yf) / (y1 - y3)
        };
        let (xb, cb) = (x1 - (x1 - x3) * k, lerp(c1, c3, k));

        let x_start = (xa.min(xb).round() as i64).max(0);
        let x_end = (xa.max(xb).round() as i64).min(buf.width as i64 - 1);
        for x in x_start..=x_end {
            let k = if xa == xb {
                0.0
            } else {
                ((xa - x as f32) / (xa - xb)).clamp(0.0, 1.0)
            };
            let rgb = lerp(ca, cb, k);
            let j = (y as usize * buf.width + x as usize) * 4;
            buf.data[j] = rgb[0] as u8;
            buf.data[j + 1] = rgb[1] as u8;
            buf.data[j + 2] = rgb[2] as u8;
            buf.data[j + 3] = 255;
        }
    }
}

fn draw_figure(buf: &mut MeshBuffer, figure: &MeshFigure, mesh: &MeshShading, ctx: &MeshContext) {
    let pt = |i: u32| mesh.coords.get(i as usize).copied();
    let cl = |i: u32| mesh.colors.get(i as usize).copied();
    let tri = |buf: &mut MeshBuffer, p: [u32; 3], c: [u32; 3]| {
        match (pt(p[0]), pt(p[1]), pt(p[2]), cl(c[0]), cl(c[1]), cl(c[2])) {
            (Some(p1), Some(p2), Some(p3), Some(c1), Some(c2), Some(c3)) => {
                draw_triangle(buf, ctx, p1, p2, p3, c1, c2, c3);
            }
            _ => warn!("mesh index out of range"),
        }
    };
    match figure {
        MeshFigure::Triangles { vertices, colors } => {
            for (p, c) in vertices.chunks_exact(3).zip(colors.chunks_exact(3)) {
                tri(buf, [p[0], p[1], p[2]], [c[0], c[1], c[2]]);
            }
        }
        MeshFigure::Lattice {
            vertices,
            colors,
            vertices_per_row,
        } => {
            let per_row = *vertices_per_row as usize;
            if per_row < 2 {
                warn!("lattice with {per_row} vertices per row");
                return;
            }
            let rows = (vertices.len() / per_row).saturating_sub(1);
            let cols = per_row - 1;
            for i in 0..rows {
                for j in 0..cols {
                    let q = i * per_row + j;
                    let (a, b, c, d) = (q, q + 1, q + per_row, q + per_row + 1);
                    let (Some(&pd), Some(&cd)) = (vertices.get(d), colors.get(d)) else {
                        continue;
                    };
                    tri(
                        buf,
                        [vertices[a], vertices[b], vertices[c]],
                        [colors[a], colors[b], colors[c]],
                    );
                    tri(
                        buf,
                        [pd, vertices[b], vertices[c]],
                        [cd, colors[b], colors[c]],
                    );
                }
            }
        }
    }
}

/// Mesh rasterized into a pixmap; tile pixel `(px, py)` sits at mesh
/// coordinate `(offset_x + px * scale_x, offset_y + py * scale_y)`.
pub struct MeshTile {
    pub pixmap: Pixmap,
    pub offset_x: f32,
    pub offset_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl MeshTile {
    /// Tile pixels to mesh space.
    pub fn to_mesh_space(&self) -> Matrix {
        Matrix::scale(self.scale_x, self.scale_y).then_translate((self.offset_x, self.offset_y).into())
    }
}

/// Oversampling of mesh tiles relative to the device scale.
const EXPECTED_SCALE: f32 = 1.1;
/// Transparent border around a mesh tile, so padding the tile as a pattern
/// extends transparency.
const BORDER_SIZE: u32 = 2;

/// Rasterize `mesh` at `combined_scale` device pixels per mesh unit,
/// clamped to `max_size` pixels per axis.
pub fn create_mesh_tile(
    mesh: &MeshShading,
    combined_scale: [f32; 2],
    background: Option<Rgb>,
    max_size: u32,
) -> Option<MeshTile> {
    let offset_x = mesh.bounds.left_x.floor();
    let offset_y = mesh.bounds.lower_y.floor();
    let bounds_width = (mesh.bounds.right_x.ceil() - offset_x).max(1.0);
    let bounds_height = (mesh.bounds.upper_y.ceil() - offset_y).max(1.0);
    let width = ((bounds_width * combined_scale[0] * EXPECTED_SCALE).abs().ceil() as u32)
        .clamp(1, max_size);
    let height = ((bounds_height * combined_scale[1] * EXPECTED_SCALE).abs().ceil() as u32)
        .clamp(1, max_size);
    let scale_x = bounds_width / width as f32;
    let scale_y = bounds_height / height as f32;
    let ctx = MeshContext {
        offset_x: -offset_x,
        offset_y: -offset_y,
        scale_x: 1.0 / scale_x,
        scale_y: 1.0 / scale_y,
    };

    let mut data = vec![0u8; width as usize * height as usize * 4];
    if let Some([r, g, b]) = background {
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&[r, g, b, 255]);
        }
    }
    let mut buf = MeshBuffer {
        data: &mut data,
        width: width as usize,
        height: height as usize,
    };
    for figure in &mesh.figures {
        draw_figure(&mut buf, figure, mesh, &ctx);
    }

    let mut pixmap = Pixmap::new(width + BORDER_SIZE * 2, height + BORDER_SIZE * 2)?;
    let padded_width = pixmap.width() as usize;
    // opaque pixels only, no premultiplication needed
    for (y, row) in data.chunks_exact(width as usize * 4).enumerate() {
        let start = ((y + BORDER_SIZE as usize) * padded_width + BORDER_SIZE as usize) * 4;
        pixmap.data_mut()[start..start + row.len()].copy_from_slice(row);
    }
    Some(MeshTile {
        pixmap,
        offset_x: offset_x - BORDER_SIZE as f32 * scale_x,
        offset_y: offset_y - BORDER_SIZE as f32 * scale_y,
        scale_x,
        scale_y,
    })
}

/// Tile size in pixels of one pattern step and the scale actually used.
/// The size is limited to the larger of `max_pattern_size` and the output
/// size; a clamped tile keeps the requested scale and crops the cell.
pub fn tile_size_and_scale(step: f32, real_output_size: u32, scale: f32, max_pattern_size: u32) -> (u32, f32) {
    let step = step.abs();
    let max_size = max_pattern_size.max(real_output_size);
    let size = (step * scale).ceil();
    if size >= max_size as f32 {
        (max_size, scale)
    } else if size < 1.0 {
        (1, if step > 0.0 { 1.0 / step } else { scale })
    } else {
        (size as u32, size / step)
    }
}

#[cfg(test)]
mod tests;
