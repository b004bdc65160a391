//! Drawing capability interface used by the frame renderer.
//!
//! The renderer never touches pixels directly; it issues draw calls against a
//! [`Surface`], which makes it testable with a recording surface and lets the
//! raster backend own compositing (alpha, transform, blur, clipping).

use crate::error::{JimakuError, Result};
use crate::style::{Color, FontWeight};

/// An RGBA8 raster image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Opaque black frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Color::BLACK)
    }

    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&[color.r, color.g, color.b, color.a]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(JimakuError::Decode(format!(
                "Frame buffer holds {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }
}

/// Axis-aligned rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn inflate(&self, amount: f32) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + amount * 2.0,
            self.height + amount * 2.0,
        )
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            None
        } else {
            Some(Rect::new(x, y, right - x, bottom - y))
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub size: f32,
    pub weight: FontWeight,
}

impl FontSpec {
    pub fn new<S: Into<String>>(family: S, size: f32, weight: FontWeight) -> Self {
        Self {
            family: family.into(),
            size,
            weight,
        }
    }
}

/// Result of measuring a single line of text.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextMetrics {
    pub width: f32,
    /// Distance from the top of the line box to the baseline.
    pub ascent: f32,
    /// Distance from the baseline to the bottom of the line box.
    pub descent: f32,
}

impl TextMetrics {
    pub fn height(&self) -> f32 {
        self.ascent + self.descent
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    /// CSS-style angle: 0deg points up, 90deg points right, 180deg points down.
    /// The gradient spans the bounds of the shape being painted.
    LinearGradient { stops: Vec<(f32, Color)>, angle_deg: f32 },
}

impl Paint {
    pub fn even_gradient(colors: &[Color], angle_deg: f32) -> Paint {
        let last = colors.len().saturating_sub(1).max(1) as f32;
        Paint::LinearGradient {
            stops: colors
                .iter()
                .enumerate()
                .map(|(i, c)| (i as f32 / last, *c))
                .collect(),
            angle_deg,
        }
    }

    /// Color at `(x, y)` for a shape occupying `bounds`.
    pub fn color_at(&self, x: f32, y: f32, bounds: &Rect) -> Color {
        match self {
            Paint::Solid(color) => *color,
            Paint::LinearGradient { stops, angle_deg } => {
                if stops.is_empty() {
                    return Color::TRANSPARENT;
                }
                let theta = angle_deg.to_radians();
                let (dx, dy) = (theta.sin(), -theta.cos());
                let (cx, cy) = bounds.center();
                let half = (bounds.width / 2.0 * dx).abs() + (bounds.height / 2.0 * dy).abs();
                let t = if half <= f32::EPSILON {
                    0.0
                } else {
                    (((x - cx) * dx + (y - cy) * dy) / half + 1.0) / 2.0
                };
                gradient_color(stops, t.clamp(0.0, 1.0))
            }
        }
    }
}

fn gradient_color(stops: &[(f32, Color)], t: f32) -> Color {
    let first = stops[0];
    if t <= first.0 {
        return first.1;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.0 {
            let span = (b.0 - a.0).max(f32::EPSILON);
            return a.1.lerp(b.1, (t - a.0) / span);
        }
    }
    stops[stops.len() - 1].1
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    Rectangle,
    RoundedRect { radius: f32 },
    Pill,
    Circle,
}

/// Scale and rotation about `origin`, followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f32,
    pub rotation: f32,
    pub translate_x: f32,
    pub translate_y: f32,
    pub origin_x: f32,
    pub origin_y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: 0.0,
            translate_x: 0.0,
            translate_y: 0.0,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

impl Transform {
    pub fn is_identity(&self) -> bool {
        (self.scale - 1.0).abs() < 1e-6
            && self.rotation.abs() < 1e-6
            && self.translate_x.abs() < 1e-6
            && self.translate_y.abs() < 1e-6
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let (sin, cos) = self.rotation.sin_cos();
        let lx = (x - self.origin_x) * self.scale;
        let ly = (y - self.origin_y) * self.scale;
        (
            self.origin_x + lx * cos - ly * sin + self.translate_x,
            self.origin_y + lx * sin + ly * cos + self.translate_y,
        )
    }

    /// Maps a surface point back into untransformed coordinates.
    pub fn invert(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        if self.scale.abs() < 1e-6 {
            return None;
        }
        let (sin, cos) = self.rotation.sin_cos();
        let px = x - self.translate_x - self.origin_x;
        let py = y - self.translate_y - self.origin_y;
        let rx = px * cos + py * sin;
        let ry = -px * sin + py * cos;
        Some((
            self.origin_x + rx / self.scale,
            self.origin_y + ry / self.scale,
        ))
    }

    /// Axis-aligned bounds of `rect` after transformation.
    pub fn bounds(&self, rect: &Rect) -> Rect {
        let corners = [
            self.apply(rect.x, rect.y),
            self.apply(rect.right(), rect.y),
            self.apply(rect.x, rect.bottom()),
            self.apply(rect.right(), rect.bottom()),
        ];
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Compositing parameters carried by every draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawState {
    pub alpha: f32,
    pub blur: f32,
    pub transform: Transform,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            blur: 0.0,
            transform: Transform::default(),
        }
    }
}

impl DrawState {
    pub fn with_extra_blur(&self, blur: f32) -> DrawState {
        DrawState {
            blur: self.blur + blur.max(0.0),
            ..*self
        }
    }

    pub fn with_alpha_factor(&self, factor: f32) -> DrawState {
        DrawState {
            alpha: (self.alpha * factor).clamp(0.0, 1.0),
            ..*self
        }
    }
}

/// Drawing capabilities the frame renderer relies on.
///
/// Text coordinates address the top-left corner of the line box returned by
/// [`Surface::measure_text`].
pub trait Surface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Overwrite the whole surface with `frame`, scaling if sizes differ.
    fn draw_image(&mut self, frame: &Frame);

    fn measure_text(&mut self, text: &str, font: &FontSpec) -> TextMetrics;

    fn fill_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        font: &FontSpec,
        paint: &Paint,
        state: &DrawState,
    );

    /// Stroke glyph outlines; half of `line_width` falls outside the glyph.
    #[allow(clippy::too_many_arguments)]
    fn stroke_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        font: &FontSpec,
        paint: &Paint,
        line_width: f32,
        state: &DrawState,
    );

    fn fill_shape(&mut self, shape: ShapeKind, rect: Rect, paint: &Paint, state: &DrawState);

    /// Restrict subsequent draws to `region`; `None` lifts the restriction.
    fn clip_region(&mut self, region: Option<Rect>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_round_trip() {
        let t = Transform {
            scale: 1.5,
            rotation: 0.7,
            translate_x: 12.0,
            translate_y: -4.0,
            origin_x: 100.0,
            origin_y: 50.0,
        };
        let (x, y) = t.apply(130.0, 70.0);
        let (bx, by) = t.invert(x, y).unwrap();
        assert!((bx - 130.0).abs() < 1e-3);
        assert!((by - 70.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_scale_has_no_inverse() {
        let t = Transform {
            scale: 0.0,
            ..Default::default()
        };
        assert!(t.invert(1.0, 1.0).is_none());
    }

    #[test]
    fn test_gradient_endpoints() {
        let paint = Paint::even_gradient(&[Color::BLACK, Color::WHITE], 90.0);
        let bounds = Rect::new(0.0, 0.0, 100.0, 10.0);
        assert_eq!(paint.color_at(0.0, 5.0, &bounds), Color::BLACK);
        assert_eq!(paint.color_at(100.0, 5.0, &bounds), Color::WHITE);
        let mid = paint.color_at(50.0, 5.0, &bounds);
        assert!((120..=135).contains(&mid.r));

        let vertical = Paint::even_gradient(&[Color::BLACK, Color::WHITE], 180.0);
        assert_eq!(vertical.color_at(50.0, 0.0, &bounds), Color::BLACK);
        assert_eq!(vertical.color_at(50.0, 10.0, &bounds), Color::WHITE);
    }

    #[test]
    fn test_rect_ops() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersect(&b), Some(Rect::new(5.0, 5.0, 5.0, 5.0)));
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 15.0, 15.0));
        assert!(a.intersect(&Rect::new(20.0, 0.0, 1.0, 1.0)).is_none());
        assert_eq!(a.inflate(2.0), Rect::new(-2.0, -2.0, 14.0, 14.0));
    }

    #[test]
    fn test_frame_from_rgba_checks_length() {
        assert!(Frame::from_rgba(2, 2, vec![0; 16]).is_ok());
        assert!(Frame::from_rgba(2, 2, vec![0; 15]).is_err());
    }
}
