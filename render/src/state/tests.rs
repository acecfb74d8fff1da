use super::*;
use assert_approx_eq::assert_approx_eq;
use test_case::test_case;

#[test]
fn new_state_clip_box_covers_surface() {
    let state = GraphicsState::new(20, 10);
    assert_eq!(Rectangle::from_lbrt(0.0, 0.0, 20.0, 10.0), state.clip_box);
    assert_eq!(PaintSource::Solid(BLACK), state.fill);
    assert_eq!(1.0, state.line_width);
    assert!(state.min_max.is_empty());
}

#[test]
fn empty_path_has_no_bbox() {
    let state = GraphicsState::new(20, 10);
    assert_eq!(None, state.clipped_path_bbox(PathKind::Fill, &Matrix::identity()));
}

#[test]
fn path_bbox_clipped() {
    let mut state = GraphicsState::new(20, 10);
    let m = Matrix::scale(2.0, 2.0);
    state.update_rect_min_max(&m, &Rectangle::from_xywh(5.0, 2.0, 10.0, 10.0));
    assert_eq!(
        Some(Rectangle::from_lbrt(10.0, 4.0, 30.0, 24.0)),
        state.path_bbox(PathKind::Fill, &m)
    );
    assert_eq!(
        Some(Rectangle::from_lbrt(10.0, 4.0, 20.0, 10.0)),
        state.clipped_path_bbox(PathKind::Fill, &m)
    );
}

#[test]
fn stroke_bbox_padded_by_scaled_line_width() {
    let mut state = GraphicsState::new(100, 100);
    state.line_width = 4.0;
    let m = Matrix::scale(1.0, 3.0);
    state.update_path_min_max(&m, 10.0, 10.0);
    state.update_path_min_max(&m, 20.0, 10.0);
    let bbox = state.path_bbox(PathKind::Stroke, &m).unwrap();
    // singular values are sorted, larger first
    assert_approx_eq!(4.0, bbox.left_x);
    assert_approx_eq!(26.0, bbox.right_x);
    assert_approx_eq!(28.0, bbox.lower_y);
    assert_approx_eq!(32.0, bbox.upper_y);
}

#[test]
fn update_clip_from_path_narrows_clip_box() {
    let mut state = GraphicsState::new(20, 20);
    state.update_rect_min_max(&Matrix::identity(), &Rectangle::from_xywh(5.0, 5.0, 30.0, 5.0));
    state.update_clip_from_path();
    assert_eq!(Rectangle::from_lbrt(5.0, 5.0, 20.0, 10.0), state.clip_box);
    assert!(state.min_max.is_empty());
}

#[test]
fn update_clip_from_empty_path_empties_clip_box() {
    let mut state = GraphicsState::new(20, 20);
    state.update_clip_from_path();
    assert!(state.is_empty_clip());
    state.update_path_min_max(&Matrix::identity(), 1.0, 1.0);
    state.update_path_min_max(&Matrix::identity(), 2.0, 2.0);
    assert_eq!(None, state.clipped_path_bbox(PathKind::Fill, &Matrix::identity()));
}

#[test]
fn scaling_path_min_max() {
    let mut state = GraphicsState::new(100, 100);
    let mut user = MinMax::default();
    user.update(1.0, 2.0);
    user.update(3.0, 4.0);
    state.update_scaling_path_min_max(&Matrix::new(-2.0, 0.0, 0.0, 2.0, 10.0, 0.0), user);
    assert_eq!(Some(Rectangle::from_lbrt(4.0, 4.0, 8.0, 8.0)), state.min_max.to_rect());
}

#[test]
fn saved_state_is_independent() {
    let mut state = GraphicsState::new(10, 10);
    let saved = state.clone();
    state.line_width = 3.0;
    state.text.char_spacing = 1.0;
    assert_eq!(1.0, saved.line_width);
    assert_eq!(0.0, saved.text.char_spacing);
}

#[test_case(vec![], false; "solid")]
#[test_case(vec![3.0, 1.0], true; "even")]
#[test_case(vec![2.0], true; "odd repeats")]
#[test_case(vec![0.0, 0.0], false; "all zero")]
fn stroke_dash(dash: Vec<f32>, dashed: bool) {
    let state = GraphicsState {
        dash,
        ..GraphicsState::new(1, 1)
    };
    assert_eq!(dashed, state.stroke_style(1.0, 1.0).dash.is_some());
}

#[test]
fn stroke_style_from_state() {
    let state = GraphicsState {
        line_cap: LineCapStyle::Round,
        line_join: LineJoinStyle::Bevel,
        miter_limit: 4.0,
        ..GraphicsState::new(1, 1)
    };
    let stroke = state.stroke_style(2.5, 1.0);
    assert_eq!(2.5, stroke.width);
    assert_eq!(4.0, stroke.miter_limit);
    assert_eq!(tiny_skia::LineCap::Round, stroke.line_cap);
    assert_eq!(tiny_skia::LineJoin::Bevel, stroke.line_join);
}

#[test]
fn text_matrix_resets_position() {
    let mut text = TextState::default();
    text.move_text(5.0, 6.0);
    text.set_text_matrix(Matrix::new(3.0, 4.0, 0.0, 1.0, 7.0, 8.0));
    assert_eq!(5.0, text.text_matrix_scale);
    assert_eq!((0.0, 0.0, 0.0, 0.0), (text.x, text.y, text.line_x, text.line_y));
}

#[test]
fn move_text_and_next_line() {
    let mut text = TextState::default();
    text.move_text(10.0, 20.0);
    text.x += 4.0;
    text.leading = 12.0;
    text.next_line();
    assert_eq!((10.0, 8.0), (text.x, text.y));
    assert_eq!((10.0, 8.0), (text.line_x, text.line_y));
}

#[test]
fn text_position_includes_rise() {
    let mut state = GraphicsState::new(1, 1);
    state.text.move_text(1.0, 2.0);
    state.text.rise = 3.0;
    assert_eq!(Point::new(1.0, 5.0), state.text_position());
}

#[test]
fn color_cache_without_high_contrast() {
    let mut cache = ColorCache::new(None);
    assert_eq!([1, 2, 3], cache.resolve([1, 2, 3]));
}

#[test]
fn color_cache_remaps_high_contrast() {
    let mut cache = ColorCache::new(HighContrastMap::new([255, 255, 0], [0, 0, 128]));
    assert_eq!([255, 255, 0], cache.resolve(BLACK));
    assert_eq!([0, 0, 128], cache.resolve([255, 255, 255]));
    cache.clear();
    assert_eq!([255, 255, 0], cache.resolve(BLACK));
}

#[test]
fn dash_scale_keeps_width() {
    let state = GraphicsState {
        dash: vec![4.0, 2.0],
        dash_phase: 2.0,
        ..GraphicsState::new(1, 1)
    };
    let stroke = state.stroke_style(3.0, 2.0);
    assert_eq!(3.0, stroke.width);
    assert!(stroke.dash.is_some());
}
