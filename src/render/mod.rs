pub mod animation;
pub mod effects;
pub mod font;
pub mod frame;
pub mod raster;
pub mod surface;

#[cfg(test)]
pub(crate) mod testing;

pub use animation::{animate, AnimationFrame};
pub use font::FontBook;
pub use frame::{draw_caption, FrameRenderer, FrameStats};
pub use raster::RasterSurface;
pub use surface::{DrawState, FontSpec, Frame, Paint, Rect, ShapeKind, Surface, TextMetrics, Transform};
