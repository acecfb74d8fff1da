//! Data model and geometry kernel of the pdfcanvas content-stream renderer.
//!
//! The producer side (parser, font loader, image decoder) fills an
//! [`operator::OperatorList`] and the [`store::ObjectStores`]; the renderer in
//! `pdfcanvas-render` consumes both.

pub mod color;
pub mod font;
pub mod geom;
pub mod graphics;
pub mod image;
pub mod operator;
pub mod pattern;
pub mod store;
