//! Decoded content-stream operators.

use crate::{
    color::Rgb,
    font::TextItem,
    geom::{Matrix, Rectangle},
    graphics::{
        GStateEntry, GroupOptions, LineCapStyle, LineJoinStyle, Point, RenderingIntent,
        TextRenderingMode,
    },
    image::{ImageData, MaskImage},
    pattern::{PatternIr, ShadingIr},
    store::ObjId,
};
use std::rc::Rc;

/// Path construction operator, arguments in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    MoveTo(Point),
    LineTo(Point),
    /// `c`
    CurveTo(Point, Point, Point),
    /// `v`, current point is the first control point
    CurveTo2(Point, Point),
    /// `y`, end point is the second control point
    CurveTo3(Point, Point),
    /// `re`, origin, width, height
    Rectangle(Point, f32, f32),
    ClosePath,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorOrPattern {
    Color(Rgb),
    /// `color` is the stencil color of an uncolored tiling pattern.
    Pattern {
        pattern: Rc<PatternIr>,
        color: Option<Rgb>,
    },
}

/// Positioned copy of an image mask, see `PaintImageMaskXObjectGroup`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMask {
    pub mask: Rc<MaskImage>,
    pub transform: Matrix,
}

#[derive(Debug, Clone, PartialEq, strum::EnumDiscriminants)]
#[strum_discriminants(name(OpCode), derive(strum::Display, Hash))]
pub enum Operation {
    /// Operators after this one need these objects resolved.
    Dependency(Vec<ObjId>),

    // General graphics state
    SetLineWidth(f32),
    SetLineCap(LineCapStyle),
    SetLineJoin(LineJoinStyle),
    SetMiterLimit(f32),
    SetDash(Vec<f32>, f32),
    SetRenderingIntent(RenderingIntent),
    SetFlatness(f32),
    SetGState(Vec<GStateEntry>),

    // Special graphics state
    Save,
    Restore,
    Transform(Matrix),

    // Path construction and painting
    ConstructPath(Vec<PathOp>),
    Stroke,
    CloseStroke,
    Fill,
    EoFill,
    FillStroke,
    EoFillStroke,
    CloseFillStroke,
    CloseEoFillStroke,
    EndPath,
    Clip,
    EoClip,

    // Text
    BeginText,
    EndText,
    SetCharSpacing(f32),
    SetWordSpacing(f32),
    SetHScale(f32),
    SetLeading(f32),
    SetFont(ObjId, f32),
    SetTextRenderingMode(TextRenderingMode),
    SetTextRise(f32),
    MoveText(f32, f32),
    SetLeadingMoveText(f32, f32),
    SetTextMatrix(Matrix),
    NextLine,
    ShowText(Vec<TextItem>),
    ShowSpacedText(Vec<TextItem>),
    NextLineShowText(Vec<TextItem>),
    /// word spacing, char spacing, text
    NextLineSetSpacingShowText(f32, f32, Vec<TextItem>),
    /// `d0` of Type-3 glyph procedures
    SetCharWidth(f32, f32),
    /// `d1` of Type-3 glyph procedures
    SetCharWidthAndBounds([f32; 6]),

    // Color
    SetStrokeGray(f32),
    SetFillGray(f32),
    SetStrokeRGBColor(Rgb),
    SetFillRGBColor(Rgb),
    SetStrokeCMYKColor([f32; 4]),
    SetFillCMYKColor([f32; 4]),
    SetStrokeColorN(ColorOrPattern),
    SetFillColorN(ColorOrPattern),
    SetStrokeTransparent,
    SetFillTransparent,

    ShadingFill(Rc<ShadingIr>),

    // Images
    PaintImageXObject(ObjId),
    PaintInlineImageXObject(Rc<ImageData>),
    PaintImageMaskXObject(Rc<MaskImage>),
    PaintImageMaskXObjectGroup(Vec<PlacedMask>),
    /// One mask at several positions, `transform` is `[scale_x, skew_x, skew_y, scale_y, 0, 0]`.
    PaintImageMaskXObjectRepeat {
        mask: Rc<MaskImage>,
        transform: Matrix,
        positions: Vec<Point>,
    },
    PaintImageXObjectRepeat {
        id: ObjId,
        scale_x: f32,
        scale_y: f32,
        positions: Vec<Point>,
    },
    /// Fill the unit square with the current fill color.
    PaintSolidColorImageMask,

    // Forms, groups and annotations
    PaintFormXObjectBegin(Option<Matrix>, Option<Rectangle>),
    PaintFormXObjectEnd,
    BeginGroup(Rc<GroupOptions>),
    EndGroup(Rc<GroupOptions>),
    BeginAnnotation {
        id: String,
        rect: Rectangle,
        transform: Matrix,
        matrix: Matrix,
        has_own_canvas: bool,
    },
    EndAnnotation,

    // Marked content and compatibility sections, no rendering effect
    BeginMarkedContent(String),
    BeginMarkedContentProps(String, Option<String>),
    MarkPoint(String),
    MarkPointProps(String),
    EndMarkedContent,
    BeginCompat,
    EndCompat,
}

impl Operation {
    pub fn op_code(&self) -> OpCode {
        self.into()
    }
}

/// Operators of one content stream, appended chunk by chunk while the
/// producer parses. Executors keep their own cursor into the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorList {
    ops: Vec<Operation>,
    last_chunk: bool,
    separate_annotations: bool,
}

impl OperatorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete list, no more chunks follow.
    pub fn from_ops(ops: Vec<Operation>) -> Self {
        Self {
            ops,
            last_chunk: true,
            separate_annotations: false,
        }
    }

    pub fn push(&mut self, op: Operation) {
        debug_assert!(!self.last_chunk, "operator list already complete");
        self.ops.push(op);
    }

    pub fn add_chunk(&mut self, ops: impl IntoIterator<Item = Operation>, last_chunk: bool) {
        debug_assert!(!self.last_chunk, "operator list already complete");
        self.ops.extend(ops);
        self.last_chunk = last_chunk;
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Operation> {
        self.ops.get(idx)
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    pub fn is_last_chunk(&self) -> bool {
        self.last_chunk
    }

    pub fn separate_annotations(&self) -> bool {
        self.separate_annotations
    }

    pub fn set_separate_annotations(&mut self, v: bool) {
        self.separate_annotations = v;
    }
}

impl FromIterator<Operation> for OperatorList {
    fn from_iter<T: IntoIterator<Item = Operation>>(iter: T) -> Self {
        Self::from_ops(iter.into_iter().collect())
    }
}
