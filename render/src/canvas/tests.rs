use super::{path::scale_for_stroking, path::single_pixel_width, *};
use crate::{
    error::RenderError,
    scheduler::{execute_operator_list, Step},
    surface::{PixmapFactory, SurfaceFactory},
    RenderOptionBuilder,
};
use assert_approx_eq::assert_approx_eq;
use mockall::mock;
use pdfcanvas::{
    font::{Accent, Glyph, PathCommand, TextItem},
    graphics::{GroupOptions, Point, TextRenderingMode},
    image::{ImageData, ImageKind, MaskImage},
    operator::{OperatorList, PathOp},
    pattern::{PatternIr, TilingIr, TilingPaintType},
};
use test_case::test_case;

mock! {
    Provider {}
    impl GlyphOutlineProvider for Provider {
        fn glyph_outline(&self, font: &LoadedFont, font_char: &str) -> Option<Vec<pdfcanvas::font::PathCommand>>;
        fn glyph_advance(&self, font: &LoadedFont, font_char: &str) -> Option<f32>;
    }
}

const RED: [u8; 4] = [255, 0, 0, 255];
const WHITE_PX: [u8; 4] = [255, 255, 255, 255];
const BLACK_PX: [u8; 4] = [0, 0, 0, 255];

fn canvas(width: u32, height: u32) -> CanvasGraphics {
    canvas_with(width, height, RenderOptionBuilder::new())
}

fn canvas_with(width: u32, height: u32, option: RenderOptionBuilder) -> CanvasGraphics {
    let factory: Rc<dyn SurfaceFactory> = Rc::new(PixmapFactory);
    let surface = factory.create(width, height).unwrap();
    let option = option.anti_alias(false).build();
    let mut canvas = CanvasGraphics::new(surface, ObjectStores::default(), factory, Rc::new(option));
    canvas.begin_drawing();
    canvas
}

fn run(canvas: &mut CanvasGraphics, ops: &[Operation]) {
    for op in ops {
        canvas.exec(op).unwrap();
    }
}

fn pixel(canvas: &CanvasGraphics, x: u32, y: u32) -> [u8; 4] {
    canvas.ctx.active.surface().borrow().pixel(x, y).unwrap()
}

fn rect(x: f32, y: f32, w: f32, h: f32) -> Operation {
    Operation::ConstructPath(vec![PathOp::Rectangle(Point::new(x, y), w, h)])
}

#[test_case(Matrix::identity(), 1.0 => [1.0, 1.0]; "identity")]
#[test_case(Matrix::scale(0.5, 0.5), 1.0 => [2.0, 2.0]; "uniform shrink")]
#[test_case(Matrix::scale(3.0, 1.0), 1.0 => [1.0, 1.0]; "anisotropic wide enough")]
#[test_case(Matrix::scale(3.0, 1.0), 0.0 => [1.0 / 3.0, 1.0]; "anisotropic hairline")]
#[test_case(Matrix::scale(0.5, 2.0), 1.0 => [2.0, 1.0]; "anisotropic thin axis")]
#[test_case(Matrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0), 1.0 => [1.0, 1.0]; "quarter turn")]
#[test_case(Matrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0), 0.0 => [1.0, 1.0]; "quarter turn hairline")]
fn stroke_scale(m: Matrix, line_width: f32) -> [f32; 2] {
    scale_for_stroking(&m, line_width)
}

#[test]
fn stroke_scale_sheared() {
    let m = Matrix::new(1.0, 0.0, 1.0, 1.0, 0.0, 0.0);
    let [sx, sy] = scale_for_stroking(&m, 0.5);
    assert_approx_eq!(2.0f32.sqrt() / 0.5, sx);
    assert_approx_eq!(2.0, sy);
}

#[test]
fn single_pixel_width_of_scale() {
    assert_approx_eq!(0.5, single_pixel_width(&Matrix::scale(2.0, 2.0)));
    assert_approx_eq!(1.0, single_pixel_width(&Matrix::identity()));
}

#[test_case(1.0, false => FilterQuality::Bilinear; "close to device size")]
#[test_case(4.0, false => FilterQuality::Nearest; "enlarged")]
#[test_case(4.0, true => FilterQuality::Bilinear; "interpolate asked")]
fn smoothing(scale: f32, interpolate: bool) -> FilterQuality {
    image_smoothing(&Matrix::scale(scale, scale), interpolate)
}

#[test]
fn fill_rect() {
    let mut c = canvas(20, 20);
    run(
        &mut c,
        &[
            Operation::SetFillRGBColor([255, 0, 0]),
            rect(2.0, 2.0, 5.0, 5.0),
            Operation::Fill,
        ],
    );
    assert_eq!(RED, pixel(&c, 4, 4));
    assert_eq!(WHITE_PX, pixel(&c, 10, 10));
    assert!(c.state.min_max.is_empty());
}

#[test]
fn fill_cmyk_and_gray() {
    let mut c = canvas(4, 2);
    run(
        &mut c,
        &[
            Operation::SetFillCMYKColor([0.0, 1.0, 1.0, 0.0]),
            rect(0.0, 0.0, 2.0, 2.0),
            Operation::Fill,
            Operation::SetFillGray(0.0),
            rect(2.0, 0.0, 2.0, 2.0),
            Operation::Fill,
        ],
    );
    let [r, g, b] = cmyk_to_rgb(0.0, 1.0, 1.0, 0.0);
    assert_eq!([r, g, b, 255], pixel(&c, 0, 0));
    assert_eq!(BLACK_PX, pixel(&c, 3, 1));
}

#[test]
fn transparent_fill_paints_nothing() {
    let mut c = canvas(4, 4);
    run(
        &mut c,
        &[Operation::SetFillTransparent, rect(0.0, 0.0, 4.0, 4.0), Operation::Fill],
    );
    assert_eq!(WHITE_PX, pixel(&c, 1, 1));
}

#[test]
fn unbalanced_saves_closed_at_end() {
    let mut c = canvas(4, 4);
    run(
        &mut c,
        &[
            Operation::Save,
            Operation::SetLineWidth(5.0),
            Operation::Save,
            Operation::Transform(Matrix::scale(2.0, 2.0)),
            Operation::SetFillRGBColor([255, 0, 0]),
        ],
    );
    assert_eq!(2, c.depth());
    c.end_drawing();
    assert_eq!(0, c.depth());
    assert_eq!(1.0, c.state.line_width);
    assert_eq!(PaintSource::Solid([0, 0, 0]), c.state.fill);
    assert_eq!(Matrix::identity(), c.current_transform());
    assert!(c.scratch.is_empty());
}

#[test]
fn restore_without_save_ignored() {
    let mut c = canvas(4, 4);
    run(&mut c, &[Operation::SetLineWidth(3.0), Operation::Restore]);
    assert_eq!(3.0, c.state.line_width);
    assert_eq!(0, c.depth());
}

#[test]
fn clip_limits_fill() {
    let mut c = canvas(20, 20);
    run(
        &mut c,
        &[
            rect(0.0, 0.0, 5.0, 20.0),
            Operation::Clip,
            Operation::EndPath,
            Operation::SetFillRGBColor([255, 0, 0]),
            rect(0.0, 0.0, 20.0, 20.0),
            Operation::Fill,
        ],
    );
    assert_eq!(Rectangle::from_lbrt(0.0, 0.0, 5.0, 20.0), c.state.clip_box);
    assert_eq!(RED, pixel(&c, 2, 10));
    assert_eq!(WHITE_PX, pixel(&c, 10, 10));
}

#[test]
fn disjoint_clips_make_fill_no_op() {
    let mut c = canvas(20, 20);
    run(
        &mut c,
        &[
            rect(0.0, 0.0, 5.0, 5.0),
            Operation::Clip,
            Operation::EndPath,
            rect(10.0, 10.0, 5.0, 5.0),
            Operation::Clip,
            Operation::EndPath,
            Operation::SetFillRGBColor([255, 0, 0]),
            rect(0.0, 0.0, 20.0, 20.0),
            Operation::Fill,
        ],
    );
    assert!(c.state.is_empty_clip());
    assert_eq!(WHITE_PX, pixel(&c, 2, 2));
    assert_eq!(WHITE_PX, pixel(&c, 12, 12));
}

#[test]
fn clip_dropped_by_restore() {
    let mut c = canvas(20, 20);
    run(
        &mut c,
        &[
            Operation::Save,
            rect(0.0, 0.0, 5.0, 5.0),
            Operation::Clip,
            Operation::EndPath,
            Operation::Restore,
            Operation::SetFillRGBColor([255, 0, 0]),
            rect(0.0, 0.0, 20.0, 20.0),
            Operation::Fill,
        ],
    );
    assert_eq!(RED, pixel(&c, 12, 12));
}

#[test]
fn hairline_stroke_one_pixel_wide() {
    let mut c = canvas(20, 20);
    run(
        &mut c,
        &[
            Operation::SetLineWidth(0.0),
            Operation::ConstructPath(vec![
                PathOp::MoveTo(Point::new(0.0, 5.5)),
                PathOp::LineTo(Point::new(20.0, 5.5)),
            ]),
            Operation::Stroke,
        ],
    );
    assert_eq!(BLACK_PX, pixel(&c, 10, 5));
    assert_eq!(WHITE_PX, pixel(&c, 10, 3));
    assert_eq!(WHITE_PX, pixel(&c, 10, 7));
}

#[test]
fn stroke_under_anisotropic_scale() {
    let mut c = canvas(40, 20);
    run(
        &mut c,
        &[
            Operation::Transform(Matrix::scale(3.0, 1.0)),
            Operation::SetLineWidth(2.0),
            Operation::ConstructPath(vec![
                PathOp::MoveTo(Point::new(0.0, 10.0)),
                PathOp::LineTo(Point::new(10.0, 10.0)),
            ]),
            Operation::Stroke,
        ],
    );
    // horizontal line, its width only scaled by y
    assert_eq!(BLACK_PX, pixel(&c, 15, 9));
    assert_eq!(BLACK_PX, pixel(&c, 15, 10));
    assert_eq!(WHITE_PX, pixel(&c, 15, 12));
    assert_eq!(WHITE_PX, pixel(&c, 15, 7));
}

#[test]
fn form_clipped_to_bbox() {
    let mut c = canvas(20, 20);
    run(
        &mut c,
        &[
            Operation::PaintFormXObjectBegin(
                Some(Matrix::translation(10.0, 0.0)),
                Some(Rectangle::from_xywh(0.0, 0.0, 5.0, 5.0)),
            ),
            Operation::SetFillRGBColor([255, 0, 0]),
            rect(-10.0, 0.0, 30.0, 30.0),
            Operation::Fill,
            Operation::PaintFormXObjectEnd,
        ],
    );
    assert_eq!(RED, pixel(&c, 12, 2));
    assert_eq!(WHITE_PX, pixel(&c, 2, 2));
    assert_eq!(WHITE_PX, pixel(&c, 12, 8));
    assert_eq!(0, c.depth());
    assert_eq!(Matrix::identity(), c.base_transform());
}

#[test]
fn group_composed_with_outer_alpha() {
    let mut c = canvas(20, 20);
    let group = Rc::new(GroupOptions {
        bbox: Rectangle::from_xywh(0.0, 0.0, 10.0, 10.0),
        isolated: true,
        ..Default::default()
    });
    run(
        &mut c,
        &[
            Operation::SetGState(vec![GStateEntry::FillAlpha(0.5)]),
            Operation::BeginGroup(Rc::clone(&group)),
            Operation::SetFillRGBColor([255, 0, 0]),
            rect(0.0, 0.0, 20.0, 20.0),
            Operation::Fill,
        ],
    );
    // alpha reset inside the group
    assert_eq!(1.0, c.state.fill_alpha);
    assert!(c.scratch.contains("groupAt0"));
    run(&mut c, &[Operation::EndGroup(group)]);

    assert_eq!(0, c.depth());
    assert_eq!(0.5, c.state.fill_alpha);
    let [r, g, b, a] = pixel(&c, 5, 5);
    assert_eq!((255, 255), (r, a));
    assert!((126..=129).contains(&g), "{g}");
    assert!((126..=129).contains(&b), "{b}");
    assert_eq!(WHITE_PX, pixel(&c, 15, 15));
}

#[test]
fn end_group_without_begin_ignored() {
    let mut c = canvas(4, 4);
    let group = Rc::new(GroupOptions::default());
    run(&mut c, &[Operation::EndGroup(group)]);
    assert_eq!(0, c.depth());
}

#[test]
fn soft_mask_alpha_group_masks_fill() {
    let mut c = canvas(20, 20);
    let mask_group = Rc::new(GroupOptions {
        bbox: Rectangle::from_xywh(0.0, 0.0, 20.0, 20.0),
        isolated: true,
        smask: Some(pdfcanvas::graphics::SoftMaskSpec {
            subtype: pdfcanvas::graphics::SoftMaskSubtype::Alpha,
            ..Default::default()
        }),
        ..Default::default()
    });
    run(
        &mut c,
        &[
            Operation::BeginGroup(Rc::clone(&mask_group)),
            rect(0.0, 0.0, 10.0, 20.0),
            Operation::Fill,
            Operation::EndGroup(mask_group),
            Operation::SetGState(vec![GStateEntry::SoftMask(true)]),
        ],
    );
    assert!(c.ctx.is_mirroring());
    run(
        &mut c,
        &[
            Operation::SetFillRGBColor([255, 0, 0]),
            rect(0.0, 0.0, 20.0, 20.0),
            Operation::Fill,
            Operation::SetGState(vec![GStateEntry::SoftMask(false)]),
        ],
    );
    assert!(!c.ctx.is_mirroring());
    assert_eq!(RED, pixel(&c, 5, 5));
    assert_eq!(WHITE_PX, pixel(&c, 15, 5));
}

#[test]
fn soft_mask_ends_with_restore() {
    let mut c = canvas(4, 4);
    let mask_group = Rc::new(GroupOptions {
        bbox: Rectangle::from_xywh(0.0, 0.0, 4.0, 4.0),
        smask: Some(Default::default()),
        ..Default::default()
    });
    run(
        &mut c,
        &[
            Operation::BeginGroup(Rc::clone(&mask_group)),
            Operation::EndGroup(mask_group),
            Operation::Save,
            Operation::SetGState(vec![GStateEntry::SoftMask(true)]),
        ],
    );
    assert!(c.ctx.is_mirroring());
    run(&mut c, &[Operation::Restore]);
    assert!(!c.ctx.is_mirroring());
    assert!(c.state.active_smask.is_none());
}

fn square_glyph() -> Vec<PathCommand> {
    vec![
        PathCommand::MoveTo(Point::new(0.0, 0.0)),
        PathCommand::LineTo(Point::new(1000.0, 0.0)),
        PathCommand::LineTo(Point::new(1000.0, 1000.0)),
        PathCommand::LineTo(Point::new(0.0, 1000.0)),
        PathCommand::Close,
    ]
}

fn square_font() -> LoadedFont {
    LoadedFont {
        id: ObjId::new("f1"),
        name: "Square".to_owned(),
        ..Default::default()
    }
}

/// Canvas with `font` resolved as `f1`, every glyph a 1000 unit square.
fn font_canvas(c: CanvasGraphics, font: LoadedFont, advance: Option<f32>) -> CanvasGraphics {
    let mut provider = MockProvider::new();
    provider
        .expect_glyph_outline()
        .returning(|_, _| Some(square_glyph()));
    provider
        .expect_glyph_advance()
        .returning(move |_, _| advance);
    let c = c.with_glyph_provider(Rc::new(provider));
    c.objs
        .page
        .resolve(&ObjId::new("f1"), ObjValue::Font(Rc::new(font)));
    c
}

fn text_canvas() -> CanvasGraphics {
    font_canvas(canvas(20, 20), square_font(), None)
}

fn show_square(mode: TextRenderingMode) -> Vec<Operation> {
    vec![
        Operation::BeginText,
        Operation::SetFont(ObjId::new("f1"), 10.0),
        Operation::SetTextRenderingMode(mode),
        Operation::ShowText(vec![TextItem::Glyph(Glyph::new("A", 1000.0))]),
        Operation::EndText,
    ]
}

#[test_log::test]
fn show_text_fills_glyph_and_advances() {
    let mut c = text_canvas();
    let ops = show_square(TextRenderingMode::Fill);
    run(&mut c, &ops[..4]);
    assert_approx_eq!(10.0, c.state.text.x);
    run(&mut c, &ops[4..]);
    assert_eq!(BLACK_PX, pixel(&c, 5, 5));
    assert_eq!(WHITE_PX, pixel(&c, 15, 5));
}

#[test]
fn show_text_spacing_moves_cursor() {
    let mut c = text_canvas();
    run(
        &mut c,
        &[
            Operation::BeginText,
            Operation::SetFont(ObjId::new("f1"), 10.0),
            Operation::SetCharSpacing(1.0),
            Operation::ShowSpacedText(vec![
                TextItem::Spacing(-500.0),
                TextItem::Glyph(Glyph::new("A", 1000.0)),
            ]),
        ],
    );
    // 5 from the spacing, 10 glyph width, 1 char spacing
    assert_approx_eq!(16.0, c.state.text.x);
    assert_eq!(WHITE_PX, pixel(&c, 2, 5));
    assert_eq!(BLACK_PX, pixel(&c, 8, 5));
}

#[test]
fn invisible_text_advances_only() {
    let mut c = text_canvas();
    run(&mut c, &show_square(TextRenderingMode::Invisible));
    assert_approx_eq!(10.0, c.state.text.x);
    assert_eq!(WHITE_PX, pixel(&c, 5, 5));
}

#[test]
fn clip_text_clips_later_fill() {
    let mut c = text_canvas();
    run(&mut c, &show_square(TextRenderingMode::Clip));
    assert_eq!(WHITE_PX, pixel(&c, 5, 5));
    run(
        &mut c,
        &[
            Operation::SetFillRGBColor([255, 0, 0]),
            rect(0.0, 0.0, 20.0, 20.0),
            Operation::Fill,
        ],
    );
    assert_eq!(RED, pixel(&c, 5, 5));
    assert_eq!(WHITE_PX, pixel(&c, 15, 15));
}

#[test]
fn missing_font_falls_back() {
    let mut c = canvas(4, 4);
    run(&mut c, &[Operation::SetFont(ObjId::new("nope"), -12.0)]);
    let text = &c.state.text;
    assert!(text.font.as_ref().unwrap().missing_file);
    assert_eq!(12.0, text.font_size);
    assert_eq!(-1.0, text.font_direction);
}

#[test]
fn inline_image_rows_top_down() {
    let mut c = canvas(10, 10);
    let img = ImageData::new(
        2,
        2,
        ImageKind::Rgb24Bpp,
        vec![255, 0, 0, 255, 0, 0, 0, 0, 255, 0, 0, 255],
    )
    .unwrap();
    run(
        &mut c,
        &[
            Operation::Transform(Matrix::scale(10.0, 10.0)),
            Operation::PaintInlineImageXObject(Rc::new(img)),
        ],
    );
    // first image row at user space top, device bottom without a viewport flip
    assert_eq!(RED, pixel(&c, 5, 7));
    assert_eq!([0, 0, 255, 255], pixel(&c, 5, 2));
}

#[test]
fn image_mask_painted_in_fill_color() {
    let mut c = canvas(8, 8);
    // left half set
    let mask = MaskImage::new(2, 1, vec![0b1000_0000], false);
    run(
        &mut c,
        &[
            Operation::SetFillRGBColor([255, 0, 0]),
            Operation::Transform(Matrix::scale(8.0, 8.0)),
            Operation::PaintImageMaskXObject(Rc::new(mask)),
        ],
    );
    assert_eq!(RED, pixel(&c, 2, 4));
    assert_eq!(WHITE_PX, pixel(&c, 6, 4));
}

#[test]
fn missing_image_skipped() {
    let mut c = canvas(4, 4);
    run(&mut c, &[Operation::PaintImageXObject(ObjId::new("img_9"))]);
    assert_eq!(WHITE_PX, pixel(&c, 1, 1));
}

#[test]
fn solid_color_image_mask_fills_unit_square() {
    let mut c = canvas(10, 10);
    run(
        &mut c,
        &[
            Operation::SetFillRGBColor([255, 0, 0]),
            Operation::Transform(Matrix::scale(5.0, 5.0)),
            Operation::PaintSolidColorImageMask,
        ],
    );
    assert_eq!(RED, pixel(&c, 2, 2));
    assert_eq!(WHITE_PX, pixel(&c, 7, 7));
}

#[test]
fn separate_annotation_gets_own_surface() {
    let factory: Rc<dyn SurfaceFactory> = Rc::new(PixmapFactory);
    let surface = factory.create(20, 20).unwrap();
    let option = RenderOptionBuilder::new().separate_annotations(true).build();
    let mut c = CanvasGraphics::new(surface, ObjectStores::default(), factory, Rc::new(option));
    c.begin_drawing();
    run(
        &mut c,
        &[
            Operation::BeginAnnotation {
                id: "annot_1".to_owned(),
                rect: Rectangle::from_xywh(2.0, 2.0, 4.0, 3.0),
                transform: Matrix::identity(),
                matrix: Matrix::identity(),
                has_own_canvas: true,
            },
            Operation::SetFillRGBColor([255, 0, 0]),
            rect(0.0, 0.0, 100.0, 100.0),
            Operation::Fill,
            Operation::EndAnnotation,
        ],
    );
    let annot = c.annotation_canvases().get("annot_1").unwrap().borrow();
    assert_eq!((4, 3), (annot.width(), annot.height()));
    assert_eq!(Some(RED), annot.pixel(1, 1));
    drop(annot);
    assert_eq!(WHITE_PX, pixel(&c, 3, 3));
}

#[test]
fn open_group_unwound_at_end() {
    let mut c = canvas(8, 8);
    let group = Rc::new(GroupOptions {
        bbox: Rectangle::from_xywh(0.0, 0.0, 8.0, 8.0),
        isolated: true,
        ..Default::default()
    });
    run(
        &mut c,
        &[
            Operation::Save,
            Operation::SetLineWidth(2.0),
            Operation::BeginGroup(Rc::clone(&group)),
            Operation::Save,
            Operation::BeginGroup(group),
            Operation::Transform(Matrix::scale(3.0, 3.0)),
        ],
    );
    assert_eq!(2, c.group_level);
    c.end_drawing();
    assert_eq!(0, c.depth());
    assert_eq!(0, c.ctx.active.depth());
    assert_eq!(1.0, c.state.line_width);
    assert_eq!(Matrix::identity(), c.current_transform());
}

fn tiling_pattern(
    paint_type: TilingPaintType,
    cell: Vec<Operation>,
    matrix: Matrix,
) -> ColorOrPattern {
    ColorOrPattern::Pattern {
        pattern: Rc::new(PatternIr::Tiling(Rc::new(TilingIr {
            operator_list: Rc::new(OperatorList::from_ops(cell)),
            matrix,
            bbox: Rectangle::from_xywh(0.0, 0.0, 4.0, 4.0),
            x_step: 4.0,
            y_step: 4.0,
            paint_type,
        }))),
        color: Some([0, 0, 255]),
    }
}

#[test_case(1.0; "device scale")]
#[test_case(2.0; "pattern matrix scaled")]
fn tiling_pattern_repeats_cell(scale: f32) {
    let size = (8.0 * scale) as u32;
    let mut c = canvas(size, size);
    let cell = vec![
        Operation::SetFillRGBColor([255, 0, 0]),
        rect(0.0, 0.0, 2.0, 2.0),
        Operation::Fill,
    ];
    let pattern = tiling_pattern(TilingPaintType::Colored, cell, Matrix::scale(scale, scale));
    run(
        &mut c,
        &[
            Operation::SetFillColorN(pattern),
            rect(0.0, 0.0, size as f32, size as f32),
            Operation::Fill,
        ],
    );
    // a 4 unit cell, red in its lower quarter
    let at = |x: f32, y: f32| pixel(&c, (x * scale) as u32, (y * scale) as u32);
    assert_eq!(RED, at(1.0, 1.0));
    assert_eq!(RED, at(5.0, 1.0));
    assert_eq!(RED, at(5.0, 5.0));
    assert_eq!(WHITE_PX, at(3.0, 3.0));
    assert_eq!(WHITE_PX, at(7.0, 7.0));
    assert_eq!(1, c.tiles.len());
}

#[test]
fn uncolored_tiling_pattern_painted_in_given_color() {
    let mut c = canvas(8, 8);
    let cell = vec![rect(0.0, 0.0, 2.0, 2.0), Operation::Fill];
    let pattern = tiling_pattern(TilingPaintType::Uncolored, cell, Matrix::identity());
    run(
        &mut c,
        &[
            Operation::SetFillColorN(pattern),
            rect(0.0, 0.0, 8.0, 8.0),
            Operation::Fill,
        ],
    );
    assert_eq!([0, 0, 255, 255], pixel(&c, 1, 1));
    assert_eq!([0, 0, 255, 255], pixel(&c, 5, 5));
    assert_eq!(WHITE_PX, pixel(&c, 3, 3));
}

#[test_log::test]
fn type3_glyph_procedures_painted_and_advanced() {
    let mut c = canvas(30, 12);
    let proc_list = OperatorList::from_ops(vec![rect(0.0, 0.0, 1000.0, 1000.0), Operation::Fill]);
    let mut procs = HashMap::default();
    procs.insert("a".to_owned(), Rc::new(proc_list));
    let font = LoadedFont {
        type3_glyphs: Some(procs),
        ..square_font()
    };
    c.objs
        .page
        .resolve(&ObjId::new("f1"), ObjValue::Font(Rc::new(font)));
    let glyph = Glyph {
        operator_list_id: Some("a".to_owned()),
        ..Glyph::new("a", 1000.0)
    };
    run(
        &mut c,
        &[
            Operation::BeginText,
            Operation::SetFont(ObjId::new("f1"), 10.0),
            Operation::SetCharSpacing(2.0),
            Operation::ShowSpacedText(vec![
                TextItem::Glyph(glyph.clone()),
                TextItem::Spacing(-500.0),
                TextItem::Glyph(glyph),
            ]),
        ],
    );
    // 10 glyph width and 2 char spacing per glyph, 5 from the spacing
    assert_approx_eq!(29.0, c.state.text.x);
    assert_eq!(0, c.depth());
    run(&mut c, &[Operation::EndText]);
    assert_eq!(BLACK_PX, pixel(&c, 5, 5));
    assert_eq!(WHITE_PX, pixel(&c, 14, 5));
    assert_eq!(BLACK_PX, pixel(&c, 20, 5));
}

#[test]
fn vertical_text_moves_down() {
    let font = LoadedFont {
        vertical: true,
        ..square_font()
    };
    let mut c = font_canvas(canvas(20, 20), font, None);
    let glyph = Glyph {
        vmetric: Some([-1000.0, 500.0, 880.0]),
        ..Glyph::new("A", 1000.0)
    };
    run(
        &mut c,
        &[
            Operation::Transform(Matrix::translation(10.0, 10.0)),
            Operation::BeginText,
            Operation::SetFont(ObjId::new("f1"), 10.0),
            Operation::ShowText(vec![TextItem::Glyph(glyph)]),
        ],
    );
    assert_approx_eq!(0.0, c.state.text.x);
    assert_approx_eq!(-10.0, c.state.text.y);
    // centered on the origin by vx, origin lowered by vy
    assert_eq!(BLACK_PX, pixel(&c, 10, 6));
    assert_eq!(WHITE_PX, pixel(&c, 2, 6));
    assert_eq!(WHITE_PX, pixel(&c, 10, 15));
}

#[test]
fn accent_painted_at_offset() {
    let mut c = text_canvas();
    let glyph = Glyph {
        accent: Some(Accent {
            font_char: "B".to_owned(),
            offset: Point::new(1.0, 1.0),
        }),
        ..Glyph::new("A", 1000.0)
    };
    run(
        &mut c,
        &[
            Operation::BeginText,
            Operation::SetFont(ObjId::new("f1"), 10.0),
            Operation::ShowText(vec![TextItem::Glyph(glyph)]),
        ],
    );
    assert_approx_eq!(10.0, c.state.text.x);
    assert_eq!(BLACK_PX, pixel(&c, 5, 5));
    assert_eq!(BLACK_PX, pixel(&c, 15, 15));
    assert_eq!(WHITE_PX, pixel(&c, 15, 5));
    assert_eq!(WHITE_PX, pixel(&c, 5, 15));
}

#[test_case(true => (WHITE_PX, BLACK_PX); "narrowed with subpixel text")]
#[test_case(false => (BLACK_PX, BLACK_PX); "centered otherwise")]
fn remeasured_glyph_fitted_to_width(subpixel: bool) -> ([u8; 4], [u8; 4]) {
    let font = LoadedFont {
        remeasure: true,
        ..square_font()
    };
    let option = RenderOptionBuilder::new().subpixel_text(subpixel);
    // the font program is twice as wide as the PDF width
    let mut c = font_canvas(canvas_with(20, 20, option), font, Some(2000.0));
    run(
        &mut c,
        &[
            Operation::Transform(Matrix::translation(10.0, 0.0)),
            Operation::BeginText,
            Operation::SetFont(ObjId::new("f1"), 10.0),
            Operation::ShowText(vec![TextItem::Glyph(Glyph::new("A", 1000.0))]),
        ],
    );
    assert_approx_eq!(10.0, c.state.text.x);
    assert_eq!(WHITE_PX, pixel(&c, 16, 5));
    (pixel(&c, 7, 5), pixel(&c, 12, 5))
}

/// 8x8 mask with all bits set, seen twice by the producer.
fn cached_mask() -> Rc<MaskImage> {
    Rc::new(MaskImage {
        count: 2,
        cache_key: Some("m".to_owned()),
        ..MaskImage::new(8, 8, vec![0xff; 8], false)
    })
}

fn paint_sheared(mask: &Rc<MaskImage>) -> [Operation; 4] {
    [
        Operation::Save,
        Operation::Transform(Matrix::new(10.0, 0.0, 5.0, 10.0, 5.0, 5.0)),
        Operation::PaintImageMaskXObject(Rc::clone(mask)),
        Operation::Restore,
    ]
}

#[test]
fn cached_stencil_placed_like_fresh_one() {
    let mask = cached_mask();
    let mut fresh = canvas(24, 20);
    run(&mut fresh, &[Operation::SetFillRGBColor([255, 0, 0])]);
    run(&mut fresh, &paint_sheared(&mask));
    assert_eq!(RED, pixel(&fresh, 17, 13));
    assert_eq!(WHITE_PX, pixel(&fresh, 6, 13));

    let mut cached = canvas(24, 20);
    run(&mut cached, &[Operation::SetFillRGBColor([255, 0, 0])]);
    run(&mut cached, &paint_sheared(&mask));
    run(
        &mut cached,
        &[
            Operation::Save,
            Operation::SetFillRGBColor([255, 255, 255]),
            rect(0.0, 0.0, 24.0, 20.0),
            Operation::Fill,
            Operation::Restore,
        ],
    );
    run(&mut cached, &paint_sheared(&mask));
    assert_eq!(1, cached.stencils.len());

    let surface = |c: &CanvasGraphics| c.ctx.active.surface().borrow().pixmap().clone();
    assert!(surface(&fresh).data() == surface(&cached).data());
}

#[test]
fn image_repeated_at_positions() {
    let mut c = canvas(16, 16);
    let id = ObjId::new("img_1");
    let img = ImageData::new(1, 1, ImageKind::Rgb24Bpp, vec![255, 0, 0]).unwrap();
    c.objs.page.resolve(&id, ObjValue::Image(Rc::new(img)));
    run(
        &mut c,
        &[Operation::PaintImageXObjectRepeat {
            id,
            scale_x: 4.0,
            scale_y: 4.0,
            positions: vec![Point::new(0.0, 0.0), Point::new(8.0, 8.0)],
        }],
    );
    assert_eq!(RED, pixel(&c, 2, 2));
    assert_eq!(RED, pixel(&c, 10, 10));
    assert_eq!(WHITE_PX, pixel(&c, 6, 6));
    assert_eq!(WHITE_PX, pixel(&c, 10, 2));
}

#[test]
fn image_mask_repeated_at_positions() {
    let mut c = canvas(16, 16);
    let mask = Rc::new(MaskImage::new(1, 1, vec![0b1000_0000], false));
    run(
        &mut c,
        &[
            Operation::SetFillRGBColor([255, 0, 0]),
            Operation::Transform(Matrix::translation(1.0, 0.0)),
            Operation::PaintImageMaskXObjectRepeat {
                mask,
                transform: Matrix::scale(4.0, 4.0),
                positions: vec![Point::new(0.0, 0.0), Point::new(8.0, 8.0)],
            },
        ],
    );
    assert_eq!(RED, pixel(&c, 3, 2));
    assert_eq!(RED, pixel(&c, 11, 10));
    assert_eq!(WHITE_PX, pixel(&c, 0, 2));
    assert_eq!(WHITE_PX, pixel(&c, 7, 6));
}

#[test]
fn large_image_prescaled_before_draw() {
    let mut c = canvas(8, 8);
    // left half red, right half blue
    let row: Vec<u8> = (0..64)
        .flat_map(|x| if x < 32 { [255, 0, 0] } else { [0, 0, 255] })
        .collect();
    let img = ImageData::new(64, 64, ImageKind::Rgb24Bpp, row.repeat(64)).unwrap();
    run(
        &mut c,
        &[
            Operation::Transform(Matrix::scale(8.0, 8.0)),
            Operation::PaintInlineImageXObject(Rc::new(img)),
        ],
    );
    // 64 -> 32 -> 16, then drawn at half size
    assert!(c.scratch.contains("prescale1"));
    assert!(c.scratch.contains("prescale2"));
    let [r, _, b, a] = pixel(&c, 2, 4);
    assert!(r > 250 && b < 5 && a == 255, "left {r} {b}");
    let [r, _, b, _] = pixel(&c, 6, 4);
    assert!(r < 5 && b > 250, "right {r} {b}");
}

#[test_case(Operation::PaintInlineImageXObject(Rc::new(
    ImageData::new(0, 4, ImageKind::Rgb24Bpp, Vec::<u8>::new()).unwrap()
)); "empty inline image")]
#[test_case(Operation::PaintImageMaskXObject(Rc::new(
    MaskImage::new(1 << 15, 1 << 14, Vec::<u8>::new(), false)
)); "huge image mask")]
fn bad_image_size_skips_operator_only(paint: Operation) {
    let mut c = canvas(4, 4);
    let list = OperatorList::from_ops(vec![
        Operation::SetFillRGBColor([255, 0, 0]),
        paint,
        rect(0.0, 0.0, 4.0, 4.0),
        Operation::Fill,
    ]);
    let step = execute_operator_list(&mut c, &list, 0, None, None).unwrap();
    assert_eq!(Step::Done(4), step);
    assert_eq!(RED, pixel(&c, 1, 1));
}

#[test_log::test]
fn failed_image_dependency_reported_and_skipped() {
    let mut c = canvas(4, 4);
    let id = ObjId::new("img_2");
    c.objs
        .page
        .resolve(&id, ObjValue::Error(Rc::from("bad JPX stream")));
    let paint = Operation::PaintImageXObject(id);
    let err = c.exec(&paint).unwrap_err().downcast::<RenderError>().unwrap();
    match &err {
        RenderError::DependencyFailed { id, reason } => {
            assert_eq!(("img_2", "bad JPX stream"), (id.as_str(), reason.as_str()))
        }
        e => panic!("unexpected {e}"),
    }
    assert!(!err.is_fatal());

    let list = OperatorList::from_ops(vec![
        paint,
        Operation::SetFillRGBColor([255, 0, 0]),
        rect(0.0, 0.0, 4.0, 4.0),
        Operation::Fill,
    ]);
    let step = execute_operator_list(&mut c, &list, 0, None, None).unwrap();
    assert_eq!(Step::Done(4), step);
    assert_eq!(RED, pixel(&c, 1, 1));
}
