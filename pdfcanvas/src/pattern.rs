//! Pattern and shading descriptions, resolved to paint lazily by the renderer.

use crate::{color::Rgb, geom::{Matrix, Rectangle}, graphics::Point, operator::OperatorList};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TilingPaintType {
    /// The tile carries its own colors.
    #[default]
    Colored = 1,
    /// The tile is a stencil painted with the color given at `scn` time.
    Uncolored = 2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TilingIr {
    pub operator_list: Rc<OperatorList>,
    pub matrix: Matrix,
    pub bbox: Rectangle,
    pub x_step: f32,
    pub y_step: f32,
    pub paint_type: TilingPaintType,
}

/// Gradient stop, `t` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub t: f32,
    pub color: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientKind {
    Axial,
    Radial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadialAxialShading {
    pub kind: GradientKind,
    pub bbox: Option<Rectangle>,
    pub stops: Vec<ColorStop>,
    pub p0: Point,
    pub p1: Point,
    /// Radii, ignored for axial shadings.
    pub r0: f32,
    pub r1: f32,
    /// Extend before `p0` and after `p1`.
    pub extend: [bool; 2],
    pub background: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeshFigure {
    /// Every three entries of `vertices` form a triangle.
    Triangles { vertices: Vec<u32>, colors: Vec<u32> },
    /// Rows of `vertices_per_row` vertices, each cell split into two triangles.
    Lattice {
        vertices: Vec<u32>,
        colors: Vec<u32>,
        vertices_per_row: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshShading {
    /// PDF shading type 4 to 7.
    pub shading_type: u8,
    pub coords: Vec<Point>,
    pub colors: Vec<Rgb>,
    pub figures: Vec<MeshFigure>,
    /// Bounds of `coords`.
    pub bounds: Rectangle,
    pub bbox: Option<Rectangle>,
    pub background: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShadingIr {
    RadialAxial(RadialAxialShading),
    Mesh(MeshShading),
    /// Unsupported shading, painted as nothing (or transparent black as a pattern).
    Dummy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternIr {
    Tiling(Rc<TilingIr>),
    Shading {
        shading: Rc<ShadingIr>,
        /// Pattern matrix, maps pattern space onto the default space of the page.
        matrix: Option<Matrix>,
    },
}
