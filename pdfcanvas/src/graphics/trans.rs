//! Typed spaces for the few matrices that cross crate boundaries, and the
//! bridge to `tiny_skia::Transform`.

use euclid::Transform2D;

pub enum UserSpace {}
pub enum ImageSpace {}

pub type ImageToUserSpace = Transform2D<f32, ImageSpace, UserSpace>;

/// Convert current object into tiny_skia `Transform`.
pub trait IntoSkiaTransform {
    fn into_skia(self) -> tiny_skia::Transform;
}

impl<S, D> IntoSkiaTransform for Transform2D<f32, S, D> {
    fn into_skia(self) -> tiny_skia::Transform {
        tiny_skia::Transform::from_row(self.m11, self.m12, self.m21, self.m22, self.m31, self.m32)
    }
}

/// Inverse of [`IntoSkiaTransform`].
pub fn from_skia<S, D>(t: tiny_skia::Transform) -> Transform2D<f32, S, D> {
    Transform2D::new(t.sx, t.ky, t.kx, t.sy, t.tx, t.ty)
}

/// Image samples (width, height) onto the user space unit square, row 0
/// at the top.
pub fn image_to_user_space(img_w: u32, img_h: u32) -> ImageToUserSpace {
    Transform2D::scale(1.0 / img_w as f32, -1.0 / img_h as f32).then_translate((0.0, 1.0).into())
}
