//! Loaded fonts, glyph records and glyph outline programs.

use crate::{
    geom::Matrix,
    graphics::Point,
    operator::OperatorList,
    store::ObjId,
};
use ahash::HashMap;
use educe::Educe;
use std::rc::Rc;

/// Diacritic painted on top of its base glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct Accent {
    pub font_char: String,
    /// Offset in glyph units scaled by font size.
    pub offset: Point,
}

/// One glyph of a text-showing operator, produced by the font layer.
#[derive(Debug, Clone, PartialEq, Educe)]
#[educe(Default)]
pub struct Glyph {
    /// Key into the font's glyph programs.
    pub font_char: String,
    pub unicode: String,
    /// Advance width in glyph space, 1000 units per em for most fonts.
    pub width: f32,
    /// Set by the font layer for the single-byte code 32 only, word spacing
    /// applies to these glyphs.
    pub is_space: bool,
    /// Vertical metrics `[w1y, vx, vy]` for vertical writing mode.
    pub vmetric: Option<[f32; 3]>,
    pub accent: Option<Accent>,
    #[educe(Default = true)]
    pub is_in_font: bool,
    /// Type-3 glyph procedure key.
    pub operator_list_id: Option<String>,
}

impl Glyph {
    pub fn new(font_char: impl Into<String>, width: f32) -> Self {
        let font_char = font_char.into();
        Self {
            unicode: font_char.clone(),
            is_space: font_char == " ",
            font_char,
            width,
            ..Default::default()
        }
    }
}

/// Element of a `TJ` array.
#[derive(Debug, Clone, PartialEq)]
pub enum TextItem {
    Glyph(Glyph),
    /// Position adjustment in thousandths of text space.
    Spacing(f32),
}

/// Font data resolved from an object store.
#[derive(Clone, Educe)]
#[educe(Default, Debug)]
pub struct LoadedFont {
    pub id: ObjId,
    pub name: String,
    #[educe(Default(expression = Matrix::scale(0.001, 0.001)))]
    pub font_matrix: Matrix,
    pub vertical: bool,
    #[educe(Default(expression = [880.0, 0.0, -1000.0]))]
    pub default_vmetrics: [f32; 3],
    pub bold: bool,
    pub italic: bool,
    /// Font program could not be loaded, glyphs not in the font are still
    /// painted using the substitute.
    pub missing_file: bool,
    /// Widths of the font program disagree with the PDF widths, glyphs
    /// are fitted to the PDF width when painted.
    pub remeasure: bool,
    /// TrueType/OpenType program, outlines are read from it directly.
    #[educe(Debug(ignore))]
    pub data: Option<Rc<[u8]>>,
    /// Glyph procedures of a Type-3 font, keyed by `Glyph::operator_list_id`.
    #[educe(Debug(ignore))]
    pub type3_glyphs: Option<HashMap<String, Rc<OperatorList>>>,
}

impl LoadedFont {
    pub fn is_type3(&self) -> bool {
        self.type3_glyphs.is_some()
    }

    /// `-1` when the font matrix mirrors x, flips the text direction.
    pub fn direction(&self) -> f32 {
        if self.font_matrix.m11 < 0.0 {
            -1.0
        } else {
            1.0
        }
    }
}

/// Command of a compiled glyph outline program, coordinates in glyph space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
    Save,
    Restore,
    Transform(Matrix),
}

pub trait PathSink {
    fn move_to(&mut self, to: Point);
    fn line_to(&mut self, to: Point);
    fn quad_to(&mut self, ctrl: Point, to: Point);
    fn cubic_to(&mut self, ctrl1: Point, ctrl2: Point, to: Point);
    fn close(&mut self);
}

impl PathSink for Vec<PathCommand> {
    fn move_to(&mut self, to: Point) {
        self.push(PathCommand::MoveTo(to));
    }

    fn line_to(&mut self, to: Point) {
        self.push(PathCommand::LineTo(to));
    }

    fn quad_to(&mut self, ctrl: Point, to: Point) {
        self.push(PathCommand::QuadTo(ctrl, to));
    }

    fn cubic_to(&mut self, ctrl1: Point, ctrl2: Point, to: Point) {
        self.push(PathCommand::CubicTo(ctrl1, ctrl2, to));
    }

    fn close(&mut self) {
        self.push(PathCommand::Close);
    }
}

/// Supplies outline programs for glyphs the engine can not read itself.
pub trait GlyphOutlineProvider {
    /// `None` if the glyph has no outline.
    fn glyph_outline(&self, font: &LoadedFont, font_char: &str) -> Option<Vec<PathCommand>>;

    /// Advance width of `font_char` in glyph units, asked only for fonts
    /// whose program the engine can not measure itself.
    fn glyph_advance(&self, _font: &LoadedFont, _font_char: &str) -> Option<f32> {
        None
    }
}
