//! Cooperative renderer of PDF operator lists onto `tiny-skia` surfaces.
//!
//! [`CanvasGraphics`] interprets [`Operation`](pdfcanvas::operator::Operation)s,
//! [`execute_operator_list`] runs them under a step/time budget and
//! [`RenderTask`] drives a whole render, including dependency waits and
//! cancellation.

use educe::Educe;
use euclid::Angle;
use image::RgbaImage;
use pdfcanvas::{
    color::Rgb,
    geom::{Matrix, Rectangle},
    operator::OperatorList,
    store::ObjectStores,
};
use std::rc::Rc;

mod canvas;
mod context;
mod error;
mod glyph;
mod into_skia;
mod raster;
mod scheduler;
mod shading;
mod state;
mod surface;
mod task;

pub use canvas::CanvasGraphics;
pub use context::{Context, DrawingSurface, MirroredContext};
pub use error::{RenderError, RenderingCancelled};
pub use glyph::{GlyphCache, GlyphProgram};
pub use raster::{FULL_CHUNK_HEIGHT, SMASK_CHUNK_PIXELS};
pub use scheduler::{execute_operator_list, Continuation, ExecutionBudget, Step, Stepper};
pub use state::{GraphicsState, PaintSource, TextState};
pub use surface::{
    PixmapFactory, ScratchCache, SharedSurface, Surface, SurfaceFactory, SurfaceId, SurfaceLease,
};
pub use task::{CancelHandle, RenderCompletion, RenderTask};

/// Output size and the transform from PDF user space to device pixels.
#[derive(Debug, Educe, Clone, Copy, PartialEq)]
#[educe(Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    #[educe(Default(expression = Matrix::identity()))]
    pub transform: Matrix,
}

impl Viewport {
    /// Viewport of a page box at `zoom`, rotated clockwise by `rotate` degrees.
    /// User space y goes up, device y goes down.
    pub fn new(page_box: &Rectangle, zoom: f32, rotate: i32) -> Self {
        let rotate = rotate.rem_euclid(360);
        let (w, h) = (page_box.width(), page_box.height());
        let swap_wh = rotate == 90 || rotate == 270;
        let (out_w, out_h) = if swap_wh { (h, w) } else { (w, h) };

        // flip y, move crop box left-bottom to origin
        let mut transform = Matrix::translation(-page_box.left_x, -page_box.lower_y)
            .then_scale(zoom, -zoom)
            .then_translate((0.0, h * zoom).into());
        if rotate != 0 {
            transform = transform
                .then_translate((w * zoom * -0.5, h * zoom * -0.5).into())
                .then_rotate(Angle::degrees(rotate as f32))
                .then_translate((out_w * zoom * 0.5, out_h * zoom * 0.5).into());
        }
        Self {
            width: (out_w * zoom) as u32,
            height: (out_h * zoom) as u32,
            transform,
        }
    }
}

/// Option for render
#[derive(Debug, Educe, Clone)]
#[educe(Default)]
pub struct RenderOption {
    /// Applied to device coordinates of the viewport, e.g. an output scale.
    #[educe(Default(expression = Matrix::identity()))]
    transform: Matrix,
    viewport: Viewport,
    /// Paint onto a transparent layer, composed over the background at the end.
    transparency: bool,
    background_color: Option<Rgb>,
    /// With `background_color`, switches on high contrast color mapping.
    foreground_color: Option<Rgb>,
    #[educe(Default = true)]
    anti_alias: bool,
    subpixel_text: bool,
    /// Render annotations with their own canvas flag onto separate surfaces.
    separate_annotations: bool,
    #[educe(Default = 4096)]
    max_group_size: u32,
    #[educe(Default = 3000)]
    max_pattern_size: u32,
    #[educe(Default(expression = SMASK_CHUNK_PIXELS))]
    smask_chunk_pixels: u32,
    budget: ExecutionBudget,
}

impl RenderOption {
    pub fn transform(&self) -> Matrix {
        self.transform
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn transparency(&self) -> bool {
        self.transparency
    }

    pub fn background_color(&self) -> Option<Rgb> {
        self.background_color
    }

    pub fn foreground_color(&self) -> Option<Rgb> {
        self.foreground_color
    }

    pub fn anti_alias(&self) -> bool {
        self.anti_alias
    }

    pub fn subpixel_text(&self) -> bool {
        self.subpixel_text
    }

    pub fn separate_annotations(&self) -> bool {
        self.separate_annotations
    }

    pub fn max_group_size(&self) -> u32 {
        self.max_group_size
    }

    pub fn max_pattern_size(&self) -> u32 {
        self.max_pattern_size
    }

    pub fn smask_chunk_pixels(&self) -> u32 {
        self.smask_chunk_pixels
    }

    pub fn budget(&self) -> ExecutionBudget {
        self.budget
    }
}

#[derive(Educe)]
#[educe(Default(new))]
pub struct RenderOptionBuilder(RenderOption);

impl RenderOptionBuilder {
    pub fn transform(mut self, m: Matrix) -> Self {
        self.0.transform = m;
        self
    }

    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.0.viewport = viewport;
        self
    }

    /// Shortcut of `viewport()` for a page box without rotation.
    pub fn page_box(self, page_box: &Rectangle, zoom: f32) -> Self {
        self.viewport(Viewport::new(page_box, zoom, 0))
    }

    pub fn transparency(mut self, v: bool) -> Self {
        self.0.transparency = v;
        self
    }

    pub fn background_color(mut self, color: Rgb) -> Self {
        self.0.background_color = Some(color);
        self
    }

    pub fn foreground_color(mut self, color: Rgb) -> Self {
        self.0.foreground_color = Some(color);
        self
    }

    pub fn anti_alias(mut self, v: bool) -> Self {
        self.0.anti_alias = v;
        self
    }

    pub fn subpixel_text(mut self, v: bool) -> Self {
        self.0.subpixel_text = v;
        self
    }

    pub fn separate_annotations(mut self, v: bool) -> Self {
        self.0.separate_annotations = v;
        self
    }

    pub fn max_group_size(mut self, size: u32) -> Self {
        self.0.max_group_size = size.max(1);
        self
    }

    pub fn max_pattern_size(mut self, size: u32) -> Self {
        self.0.max_pattern_size = size.max(1);
        self
    }

    pub fn smask_chunk_pixels(mut self, pixels: u32) -> Self {
        self.0.smask_chunk_pixels = pixels.max(1);
        self
    }

    pub fn budget(mut self, budget: ExecutionBudget) -> Self {
        self.0.budget = budget;
        self
    }

    pub fn build(self) -> RenderOption {
        self.0
    }
}

/// Render a complete operator list in one go, for lists whose objects
/// are already resolved.
pub fn render_operator_list(
    list: &OperatorList,
    objs: &ObjectStores,
    option: RenderOptionBuilder,
) -> Result<RgbaImage, RenderError> {
    let option = Rc::new(option.build());
    let factory: Rc<dyn SurfaceFactory> = Rc::new(PixmapFactory);
    let viewport = option.viewport();
    let surface = factory.create(viewport.width, viewport.height)?;
    let mut canvas = CanvasGraphics::new(
        Rc::clone(&surface),
        objs.clone(),
        Rc::clone(&factory),
        Rc::clone(&option),
    );
    canvas.begin_drawing();
    let step = execute_operator_list(&mut canvas, list, 0, None, None);
    canvas.end_drawing();
    match step? {
        Step::Blocked(i) => {
            let id = match list.get(i) {
                Some(pdfcanvas::operator::Operation::Dependency(ids)) => ids
                    .iter()
                    .find(|id| !objs.has(id))
                    .map(ToString::to_string),
                _ => None,
            };
            Err(RenderError::MissingObject(id.unwrap_or_else(|| "?".to_owned())))
        }
        _ => Ok(surface.borrow().to_image()),
    }
}
