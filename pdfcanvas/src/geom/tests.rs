use super::*;
use assert_approx_eq::assert_approx_eq;
use test_case::test_case;

fn assert_point_eq(exp: Point, actual: Point) {
    assert!(
        (exp.x - actual.x).abs() < 1e-3 && (exp.y - actual.y).abs() < 1e-3,
        "exp != actual: {:?} != {:?}",
        exp,
        actual
    );
}

#[test]
fn transform_applies_first_matrix_first() {
    let translate = Matrix::translation(10.0, 0.0);
    let scale = Matrix::scale(2.0, 2.0);
    let p = Point::new(1.0, 1.0);

    // translate then scale: (1 + 10) * 2
    assert_point_eq(
        Point::new(22.0, 2.0),
        apply_transform(p, &transform(&translate, &scale)),
    );
    // scale then translate: 1 * 2 + 10
    assert_point_eq(
        Point::new(12.0, 2.0),
        apply_transform(p, &transform(&scale, &translate)),
    );
}

#[test_case(Matrix::new(1., 2., 3., 4., 5., 6.), Matrix::new(0., 1., -1., 0., 7., -3.), Matrix::new(0.5, 0., 0.25, 2., 1., 1.))]
#[test_case(Matrix::scale(3., 1.), Matrix::translation(-4., 8.), Matrix::new(0.7, 0.7, -0.7, 0.7, 0., 0.))]
#[test_case(Matrix::identity(), Matrix::new(2., 0., 1., 2., 0., 0.), Matrix::scale(-1., -1.))]
fn composition_is_associative(a: Matrix, b: Matrix, c: Matrix) {
    for p in [
        Point::new(0., 0.),
        Point::new(1.5, -2.),
        Point::new(100., 37.),
    ] {
        let composed = apply_transform(p, &transform(&transform(&a, &b), &c));
        let stepped = apply_transform(apply_transform(apply_transform(p, &a), &b), &c);
        assert_point_eq(stepped, composed);

        let right = apply_transform(p, &transform(&a, &transform(&b, &c)));
        assert_point_eq(stepped, right);
    }
}

#[test_case(Matrix::new(1., 2., 3., 4., 5., 6.))]
#[test_case(Matrix::new(0., 1., -1., 0., 7., -3.))]
#[test_case(Matrix::new(3., 0.5, 0.2, 0.8, -10., 12.))]
fn inverse_round_trip(m: Matrix) {
    for p in [Point::new(0., 0.), Point::new(3., -4.), Point::new(250., 80.)] {
        let back = apply_inverse_transform(apply_transform(p, &m), &m).unwrap();
        assert_point_eq(p, back);
    }
}

#[test]
fn singular_matrix_has_no_inverse() {
    let m = Matrix::new(1., 2., 2., 4., 0., 0.);
    assert_eq!(
        Err(SingularMatrix),
        apply_inverse_transform(Point::new(1., 1.), &m)
    );
    assert_eq!(Err(SingularMatrix), inverse_transform(&m));
    assert_eq!(Err(SingularMatrix), inverse_transform(&Matrix::scale(0., 0.)));
}

#[test_case(Matrix::scale(3., 1.), [3., 1.]; "anisotropic")]
#[test_case(Matrix::scale(-2., 2.), [2., 2.]; "flip")]
#[test_case(Matrix::new(0., 2., -2., 0., 5., 5.), [2., 2.]; "rotate 90")]
#[test_case(Matrix::new(0.6, 0.8, -0.8, 0.6, 0., 0.), [1., 1.]; "pure rotation")]
#[test_case(Matrix::scale(0., 0.), [1., 1.]; "degenerate falls back to one")]
fn svd_scale(m: Matrix, exp: [f32; 2]) {
    let [sx, sy] = singular_value_decompose_2d_scale(&m);
    assert_approx_eq!(exp[0], sx, 1e-4);
    assert_approx_eq!(exp[1], sy, 1e-4);
}

#[test]
fn svd_scale_of_shear() {
    // [[1, 1], [0, 1]] has singular values golden ratio and its inverse
    let [sx, sy] = singular_value_decompose_2d_scale(&Matrix::new(1., 0., 1., 1., 0., 0.));
    assert_approx_eq!(1.618_034, sx, 1e-4);
    assert_approx_eq!(0.618_034, sy, 1e-4);
}

#[test]
fn intersect_never_grows() {
    let clip = Rectangle::from_xywh(0., 0., 100., 50.);
    for r in [
        Rectangle::from_xywh(-10., -10., 30., 30.),
        Rectangle::from_xywh(10., 10., 500., 5.),
        Rectangle::from_xywh(0., 0., 100., 50.),
    ] {
        let i = clip.intersect(&r).unwrap();
        assert!(i.area() <= clip.area());
        assert!(i.area() <= r.area());
    }
}

#[test]
fn intersect_disjoint_is_none() {
    let clip = Rectangle::from_xywh(0., 0., 10., 10.);
    assert_eq!(None, clip.intersect(&Rectangle::from_xywh(20., 20., 5., 5.)));
}

#[test]
fn rectangle_normalized() {
    let r = Rectangle::from_xywh(98.0, 519.0, 423.0, -399.0);
    assert_eq!(
        Rectangle::from_lbrt(98.0, 519.0 - 399.0, 98.0 + 423.0, 519.0),
        r
    );
    assert!(r.left_x <= r.right_x && r.lower_y <= r.upper_y);
}

#[test]
fn bezier_bbox_includes_extremum() {
    let mut bbox = MinMax::default();
    // symmetric arch, peak at t = 0.5, y = 75
    bezier_bounding_box(
        Point::new(0., 0.),
        Point::new(0., 100.),
        Point::new(100., 100.),
        Point::new(100., 0.),
        &mut bbox,
    );
    let [min_x, min_y, max_x, max_y] = bbox.0;
    assert_approx_eq!(0., min_x);
    assert_approx_eq!(0., min_y);
    assert_approx_eq!(100., max_x);
    assert_approx_eq!(75., max_y, 1e-3);
}

#[test]
fn bezier_bbox_near_linear() {
    let mut bbox = MinMax::default();
    bezier_bounding_box(
        Point::new(0., 0.),
        Point::new(1., 1.),
        Point::new(2., 2.),
        Point::new(3., 3.),
        &mut bbox,
    );
    assert_eq!([0., 0., 3., 3.], bbox.0);
}

#[test_case(Matrix::scale(2., -3.).then_translate((5., 7.).into()))]
#[test_case(Matrix::new(0., 2., -1., 0., 4., 1.))]
#[test_case(Matrix::new(0., -1., 3., 0., 0., 9.))]
fn scale_min_max_matches_corners(m: Matrix) {
    let r = Rectangle::from_lbrt(1., 2., 10., 4.);
    let mut mm = MinMax([r.left_x, r.lower_y, r.right_x, r.upper_y]);
    scale_min_max(&m, &mut mm);
    assert_eq!(Some(r.transform(&m)), mm.to_rect());
}

#[test]
fn min_max_empty_until_update() {
    let mut mm = MinMax::default();
    assert!(mm.is_empty());
    assert_eq!(None, mm.to_rect());
    mm.update(3., 4.);
    assert_eq!(Some(Rectangle::from_lbrt(3., 4., 3., 4.)), mm.to_rect());
}
