//! Glyph outline programs, read from embedded TrueType/OpenType data or
//! asked from a [`GlyphOutlineProvider`], memoized per font and character.

use ahash::HashMap;
use anyhow::{Context as _, Result as AnyResult};
use log::{debug, warn};
use pdfcanvas::{
    font::{GlyphOutlineProvider, LoadedFont, PathCommand, PathSink},
    geom::Matrix,
    graphics::Point,
    store::ObjId,
};
use std::rc::Rc;
use ttf_parser::{Face as TTFFace, OutlineBuilder};

/// Glyph programs are in thousandths of an em.
const UNITS_PER_EM: f32 = 1000.0;

struct PathSinkWrap<'a, S>(&'a mut S);

impl<'a, S: PathSink> OutlineBuilder for PathSinkWrap<'a, S> {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(Point::new(x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(Point::new(x, y));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(Point::new(x1, y1), Point::new(x, y));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0
            .cubic_to(Point::new(x1, y1), Point::new(x2, y2), Point::new(x, y));
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// Outline of `font_char` read from a TrueType/OpenType program. Returns
/// `Ok(None)` if the font has no glyph for it.
fn ttf_outline(data: &[u8], font_char: &str) -> AnyResult<Option<Vec<PathCommand>>> {
    let face = TTFFace::parse(data, 0).context("parse font program")?;
    let Some(ch) = font_char.chars().next() else {
        return Ok(None);
    };
    let Some(gid) = face.glyph_index(ch) else {
        return Ok(None);
    };
    let upem = f32::from(face.units_per_em());
    let mut program = vec![];
    if upem != UNITS_PER_EM {
        let s = UNITS_PER_EM / upem;
        program.push(PathCommand::Transform(Matrix::scale(s, s)));
    }
    // glyphs without contours, such as space, have no bbox
    face.outline_glyph(gid, &mut PathSinkWrap(&mut program));
    Ok(Some(program))
}

pub type GlyphProgram = Rc<[PathCommand]>;

/// Horizontal advance of `font_char` in thousandths of an em.
fn ttf_advance(data: &[u8], font_char: &str) -> AnyResult<Option<f32>> {
    let face = TTFFace::parse(data, 0).context("parse font program")?;
    let advance = font_char
        .chars()
        .next()
        .and_then(|ch| face.glyph_index(ch))
        .and_then(|gid| face.glyph_hor_advance(gid));
    let upem = f32::from(face.units_per_em());
    Ok(advance.map(|a| f32::from(a) * UNITS_PER_EM / upem))
}

type GlyphKey = (ObjId, String);

/// Memo of glyph programs of the current render.
pub struct GlyphCache {
    provider: Option<Rc<dyn GlyphOutlineProvider>>,
    glyphs: HashMap<GlyphKey, Option<GlyphProgram>>,
    advances: HashMap<GlyphKey, Option<f32>>,
}

impl std::fmt::Debug for GlyphCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphCache")
            .field("provider", &self.provider.is_some())
            .field("glyphs", &self.glyphs.len())
            .finish()
    }
}

impl GlyphCache {
    pub fn new(provider: Option<Rc<dyn GlyphOutlineProvider>>) -> Self {
        Self {
            provider,
            glyphs: HashMap::default(),
            advances: HashMap::default(),
        }
    }

    /// Advance width the font program gives `font_char`, read from the
    /// embedded TrueType/OpenType program or asked from the provider.
    pub fn advance(&mut self, font: &LoadedFont, font_char: &str) -> Option<f32> {
        let key = (font.id.clone(), font_char.to_owned());
        if let Some(advance) = self.advances.get(&key) {
            return *advance;
        }
        let advance = font
            .data
            .as_ref()
            .and_then(|data| {
                ttf_advance(data, font_char).unwrap_or_else(|e| {
                    warn!("read advance of font {}: {e:#}", font.name);
                    None
                })
            })
            .or_else(|| self.provider.as_ref()?.glyph_advance(font, font_char));
        self.advances.insert(key, advance);
        advance
    }

    /// Outline program of `font_char`, `None` if the glyph has no outline.
    pub fn outline(&mut self, font: &LoadedFont, font_char: &str) -> Option<GlyphProgram> {
        let key = (font.id.clone(), font_char.to_owned());
        if let Some(program) = self.glyphs.get(&key) {
            return program.clone();
        }
        let program = self.load(font, font_char).map(Rc::from);
        self.glyphs.insert(key, program.clone());
        program
    }

    fn load(&self, font: &LoadedFont, font_char: &str) -> Option<Vec<PathCommand>> {
        if let Some(data) = &font.data {
            match ttf_outline(data, font_char) {
                Ok(Some(program)) => return Some(program),
                Ok(None) => debug!("glyph {font_char:?} not in font {}", font.name),
                Err(e) => warn!("read glyph of font {}: {e:#}", font.name),
            }
        }
        self.provider.as_ref()?.glyph_outline(font, font_char)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn clear(&mut self) {
        self.glyphs.clear();
        self.advances.clear();
    }
}
