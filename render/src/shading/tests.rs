use super::*;
use test_case::test_case;

fn stops(a: Rgb, b: Rgb) -> Vec<ColorStop> {
    vec![ColorStop { t: 0.0, color: a }, ColorStop { t: 1.0, color: b }]
}

#[test_case(-1.0, [0, 0, 0]; "before first")]
#[test_case(0.5, [128, 128, 128]; "middle")]
#[test_case(2.0, [255, 255, 255]; "after last")]
fn color_at_stops(t: f32, expected: Rgb) {
    assert_eq!(expected, color_at(&stops([0, 0, 0], [255, 255, 255]), t));
}

#[test_case(10.0, 100, 2.0 => (20, 2.0); "fits")]
#[test_case(10.0, 100, 1000.0 => (3000, 1000.0); "clamped to max pattern size")]
#[test_case(10.0, 5000, 1000.0 => (5000, 1000.0); "clamped to output size")]
#[test_case(0.5, 100, 1.0 => (1, 2.0); "at least one pixel")]
fn tile_sizes(step: f32, output: u32, scale: f32) -> (u32, f32) {
    tile_size_and_scale(step, output, scale, 3000)
}

fn buffer(data: &mut [u8], w: usize, h: usize) -> MeshBuffer<'_> {
    MeshBuffer {
        data,
        width: w,
        height: h,
    }
}

const IDENTITY: MeshContext = MeshContext {
    offset_x: 0.0,
    offset_y: 0.0,
    scale_x: 1.0,
    scale_y: 1.0,
};

#[test]
fn zero_height_triangle_is_skipped() {
    let mut data = vec![0u8; 4 * 4 * 4];
    let mut buf = buffer(&mut data, 4, 4);
    draw_triangle(
        &mut buf,
        &IDENTITY,
        Point::new(0.0, 2.0),
        Point::new(3.0, 2.0),
        Point::new(1.0, 2.0),
        [255, 0, 0],
        [255, 0, 0],
        [255, 0, 0],
    );
    assert!(data.iter().all(|&v| v == 0));
}

#[test]
fn same_color_triangle_fills_uniformly() {
    let mut data = vec![0u8; 8 * 8 * 4];
    let mut buf = buffer(&mut data, 8, 8);
    let c = [10, 20, 30];
    draw_triangle(
        &mut buf,
        &IDENTITY,
        Point::new(0.0, 0.0),
        Point::new(7.0, 0.0),
        Point::new(0.0, 7.0),
        c,
        c,
        c,
    );
    let painted: Vec<&[u8]> = data.chunks_exact(4).filter(|p| p[3] == 255).collect();
    assert!(painted.len() > 20);
    assert!(painted.iter().all(|p| p[..3] == c));
    // far corner outside the triangle
    assert_eq!(0, data[(7 * 8 + 7) * 4 + 3]);
}

#[test]
fn triangle_interpolates_colors() {
    let mut data = vec![0u8; 11 * 11 * 4];
    let mut buf = buffer(&mut data, 11, 11);
    draw_triangle(
        &mut buf,
        &IDENTITY,
        Point::new(0.0, 0.0),
        Point::new(10.0, 10.0),
        Point::new(0.0, 10.0),
        [0, 0, 0],
        [0, 0, 0],
        [200, 0, 0],
    );
    let red = |x: usize, y: usize| data[(y * 11 + x) * 4];
    assert!(red(0, 1) < red(0, 9));
}

fn square_mesh(color: Rgb) -> MeshShading {
    MeshShading {
        shading_type: 4,
        coords: vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
        ],
        colors: vec![color],
        figures: vec![MeshFigure::Triangles {
            vertices: vec![0, 1, 2, 0, 2, 3],
            colors: vec![0; 6],
        }],
        bounds: Rectangle::from_lbrt(0.0, 0.0, 4.0, 4.0),
        bbox: None,
        background: None,
    }
}

#[test]
fn mesh_tile_has_transparent_border() {
    let tile = create_mesh_tile(&square_mesh([255, 0, 0]), [1.0, 1.0], None, 3000).unwrap();
    // 4 * 1.1 rounded up, plus a border on each side
    assert_eq!((9, 9), (tile.pixmap.width(), tile.pixmap.height()));
    assert_eq!(0, tile.pixmap.pixel(0, 0).unwrap().alpha());
    let center = tile.pixmap.pixel(4, 4).unwrap();
    assert_eq!((255, 255), (center.red(), center.alpha()));
    let p = tile.to_mesh_space().transform_point((2.0, 2.0).into());
    assert!(p.x.abs() < 1e-5 && p.y.abs() < 1e-5, "{p:?}");
}

#[test]
fn mesh_tile_size_clamped() {
    let tile = create_mesh_tile(&square_mesh([0, 0, 0]), [1000.0, 1000.0], None, 100).unwrap();
    assert_eq!(104, tile.pixmap.width());
}

#[test]
fn lattice_mesh() {
    let mut mesh = square_mesh([0, 255, 0]);
    mesh.figures = vec![MeshFigure::Lattice {
        vertices: vec![0, 1, 3, 2],
        colors: vec![0; 4],
        vertices_per_row: 2,
    }];
    let tile = create_mesh_tile(&mesh, [1.0, 1.0], None, 3000).unwrap();
    assert_eq!(255, tile.pixmap.pixel(4, 4).unwrap().green());
}

fn axial(p0: f32, p1: f32, extend: bool) -> RadialAxialShading {
    RadialAxialShading {
        kind: GradientKind::Axial,
        bbox: None,
        stops: stops([0, 0, 0], [255, 255, 255]),
        p0: Point::new(p0, 0.0),
        p1: Point::new(p1, 0.0),
        r0: 0.0,
        r1: 0.0,
        extend: [extend, extend],
        background: None,
    }
}

#[test]
fn axial_gradient() {
    let mut tile = Pixmap::new(10, 1).unwrap();
    paint_radial_axial(&mut tile, &axial(0.0, 10.0, true), Transform::identity());
    assert!(tile.pixel(0, 0).unwrap().red() < 40);
    assert!(tile.pixel(9, 0).unwrap().red() > 215);
}

#[test]
fn axial_gradient_not_extended() {
    let mut tile = Pixmap::new(10, 1).unwrap();
    paint_radial_axial(&mut tile, &axial(2.0, 8.0, false), Transform::identity());
    assert_eq!(0, tile.pixel(0, 0).unwrap().alpha());
    assert_eq!(255, tile.pixel(5, 0).unwrap().alpha());
    assert_eq!(0, tile.pixel(9, 0).unwrap().alpha());
}

#[test]
fn axial_gradient_clipped_to_bbox() {
    let mut sh = axial(0.0, 10.0, true);
    sh.bbox = Some(Rectangle::from_lbrt(0.0, 0.0, 5.0, 1.0));
    let mut tile = Pixmap::new(10, 1).unwrap();
    paint_radial_axial(&mut tile, &sh, Transform::identity());
    assert_eq!(255, tile.pixel(2, 0).unwrap().alpha());
    assert_eq!(0, tile.pixel(8, 0).unwrap().alpha());
}

#[test]
fn radial_gradient() {
    let sh = RadialAxialShading {
        kind: GradientKind::Radial,
        bbox: None,
        stops: stops([255, 0, 0], [255, 0, 0]),
        p0: Point::new(5.0, 5.0),
        p1: Point::new(5.0, 5.0),
        r0: 0.0,
        r1: 4.0,
        extend: [false, false],
        background: None,
    };
    let mut tile = Pixmap::new(10, 10).unwrap();
    paint_radial_axial(&mut tile, &sh, Transform::identity());
    let center = tile.pixel(5, 5).unwrap();
    assert_eq!((255, 255), (center.red(), center.alpha()));
    assert_eq!(0, tile.pixel(0, 0).unwrap().alpha());
}

#[test]
fn radial_gradient_inner_circle_not_extended() {
    let sh = RadialAxialShading {
        kind: GradientKind::Radial,
        bbox: None,
        stops: stops([0, 0, 255], [0, 0, 255]),
        p0: Point::new(10.0, 10.0),
        p1: Point::new(10.0, 10.0),
        r0: 3.0,
        r1: 9.0,
        extend: [false, true],
        background: None,
    };
    let mut tile = Pixmap::new(20, 20).unwrap();
    paint_radial_axial(&mut tile, &sh, Transform::identity());
    assert_eq!(0, tile.pixel(10, 10).unwrap().alpha());
    assert_eq!(255, tile.pixel(10, 16).unwrap().alpha());
    // outer end extended over the whole tile
    assert_eq!(255, tile.pixel(0, 0).unwrap().alpha());
}
