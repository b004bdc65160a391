//! Recording surface for renderer tests.

use super::surface::{DrawState, FontSpec, Frame, Paint, Rect, ShapeKind, Surface, TextMetrics};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    DrawImage { width: u32, height: u32 },
    Measure { text: String },
    FillText { text: String, x: f32, y: f32, paint: Paint, alpha: f32, blur: f32 },
    StrokeText { text: String, x: f32, y: f32, paint: Paint, line_width: f32, blur: f32 },
    FillShape { shape: ShapeKind, rect: Rect, paint: Paint, alpha: f32 },
    Clip(Option<Rect>),
}

/// Records every draw call. Each character measures half the font size wide.
pub struct RecordingSurface {
    pub width: u32,
    pub height: u32,
    pub zero_width: bool,
    pub calls: Vec<Call>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            zero_width: false,
            calls: Vec::new(),
        }
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn draw_image(&mut self, frame: &Frame) {
        self.calls.push(Call::DrawImage {
            width: frame.width(),
            height: frame.height(),
        });
    }

    fn measure_text(&mut self, text: &str, font: &FontSpec) -> TextMetrics {
        self.calls.push(Call::Measure {
            text: text.to_string(),
        });
        if self.zero_width {
            return TextMetrics::default();
        }
        TextMetrics {
            width: text.chars().count() as f32 * font.size * 0.5,
            ascent: font.size * 0.8,
            descent: font.size * 0.2,
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, _font: &FontSpec, paint: &Paint, state: &DrawState) {
        self.calls.push(Call::FillText {
            text: text.to_string(),
            x,
            y,
            paint: paint.clone(),
            alpha: state.alpha,
            blur: state.blur,
        });
    }

    fn stroke_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        _font: &FontSpec,
        paint: &Paint,
        line_width: f32,
        state: &DrawState,
    ) {
        self.calls.push(Call::StrokeText {
            text: text.to_string(),
            x,
            y,
            paint: paint.clone(),
            line_width,
            blur: state.blur,
        });
    }

    fn fill_shape(&mut self, shape: ShapeKind, rect: Rect, paint: &Paint, state: &DrawState) {
        self.calls.push(Call::FillShape {
            shape,
            rect,
            paint: paint.clone(),
            alpha: state.alpha,
        });
    }

    fn clip_region(&mut self, region: Option<Rect>) {
        self.calls.push(Call::Clip(region));
    }
}
