//! Software RGBA surface backed by fontdue glyph rasterization.

use std::collections::HashMap;
use std::sync::Arc;

use super::font::{FontBook, LoadedFont};
use super::surface::{DrawState, FontSpec, Frame, Paint, Rect, ShapeKind, Surface, TextMetrics};
use crate::style::Color;

const MASK_CACHE_LIMIT: usize = 256;

/// Coverage mask in `[0, 1]`.
#[derive(Debug, Clone)]
struct Mask {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Mask {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    fn get(&self, x: isize, y: isize) -> f32 {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return 0.0;
        }
        self.data[y as usize * self.width + x as usize]
    }

    /// Bilinear sample; pixel `i` spans `[i, i + 1)`.
    fn sample(&self, u: f32, v: f32) -> f32 {
        let sx = u - 0.5;
        let sy = v - 0.5;
        let x0 = sx.floor();
        let y0 = sy.floor();
        let tx = sx - x0;
        let ty = sy - y0;
        let (x0, y0) = (x0 as isize, y0 as isize);
        let top = self.get(x0, y0) * (1.0 - tx) + self.get(x0 + 1, y0) * tx;
        let bottom = self.get(x0, y0 + 1) * (1.0 - tx) + self.get(x0 + 1, y0 + 1) * tx;
        top * (1.0 - ty) + bottom * ty
    }

    fn padded(&self, pad: usize) -> Mask {
        let mut out = Mask::new(self.width + pad * 2, self.height + pad * 2);
        for y in 0..self.height {
            let src = &self.data[y * self.width..(y + 1) * self.width];
            let start = (y + pad) * out.width + pad;
            out.data[start..start + self.width].copy_from_slice(src);
        }
        out
    }

    /// Square max filter of radius `r`, run as two separable passes.
    fn dilate(&self, r: usize) -> Mask {
        if r == 0 {
            return self.clone();
        }
        let (w, h) = (self.width, self.height);
        let mut horizontal = vec![0.0f32; w * h];
        for y in 0..h {
            for x in 0..w {
                let lo = x.saturating_sub(r);
                let hi = (x + r).min(w - 1);
                let row = &self.data[y * w..(y + 1) * w];
                horizontal[y * w + x] = row[lo..=hi].iter().copied().fold(0.0, f32::max);
            }
        }
        let mut out = Mask::new(w, h);
        for y in 0..h {
            let lo = y.saturating_sub(r);
            let hi = (y + r).min(h - 1);
            for x in 0..w {
                let mut m = 0.0f32;
                for yy in lo..=hi {
                    m = m.max(horizontal[yy * w + x]);
                }
                out.data[y * w + x] = m;
            }
        }
        out
    }

    /// Three box passes approximating a gaussian.
    fn blur(&self, r: usize) -> Mask {
        if r == 0 {
            return self.clone();
        }
        let mut data = self.data.clone();
        for _ in 0..3 {
            data = box_pass(&data, self.width, self.height, r, true);
            data = box_pass(&data, self.width, self.height, r, false);
        }
        Mask {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

fn box_pass(src: &[f32], w: usize, h: usize, r: usize, horizontal: bool) -> Vec<f32> {
    let mut out = vec![0.0f32; w * h];
    let (lines, len) = if horizontal { (h, w) } else { (w, h) };
    let at = |line: usize, i: usize| if horizontal { line * w + i } else { i * w + line };
    let norm = (2 * r + 1) as f32;
    let mut prefix = vec![0.0f32; len + 1];

    for line in 0..lines {
        for i in 0..len {
            prefix[i + 1] = prefix[i] + src[at(line, i)];
        }
        for i in 0..len {
            let lo = i.saturating_sub(r);
            let hi = (i + r + 1).min(len);
            out[at(line, i)] = (prefix[hi] - prefix[lo]) / norm;
        }
    }
    out
}

/// A mask positioned relative to the top-left of the text line box.
struct PlacedMask {
    mask: Mask,
    dx: f32,
    dy: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MaskKey {
    text: String,
    family: String,
    weight: crate::style::FontWeight,
    size: u32,
    spread: u32,
}

struct LineLayout {
    glyphs: Vec<(i32, i32, fontdue::Metrics, Vec<u8>)>,
    metrics: TextMetrics,
}

fn line_metrics(face: &LoadedFont, size: f32) -> (f32, f32) {
    match face.font.horizontal_line_metrics(size) {
        Some(m) => (m.ascent, -m.descent),
        None => (size * 0.8, size * 0.2),
    }
}

fn layout_line(face: &LoadedFont, text: &str, size: f32, rasterize: bool) -> LineLayout {
    let (ascent, descent) = line_metrics(face, size);
    let mut pen = 0.0f32;
    let mut prev: Option<char> = None;
    let mut glyphs = Vec::new();

    for c in text.chars() {
        if let Some(p) = prev {
            pen += face.font.horizontal_kern(p, c, size).unwrap_or(0.0);
        }
        if rasterize {
            let (m, bitmap) = face.font.rasterize(c, size);
            let left = (pen + m.xmin as f32).round() as i32;
            let top = (ascent - m.ymin as f32 - m.height as f32).round() as i32;
            pen += m.advance_width;
            glyphs.push((left, top, m, bitmap));
        } else {
            pen += face.font.metrics(c, size).advance_width;
        }
        prev = Some(c);
    }

    LineLayout {
        glyphs,
        metrics: TextMetrics {
            width: pen.max(0.0),
            ascent,
            descent,
        },
    }
}

fn bold_radius(size: f32) -> usize {
    ((size / 40.0).round() as usize).max(1)
}

/// An RGBA8 canvas implementing [`Surface`].
pub struct RasterSurface {
    frame: Frame,
    fonts: FontBook,
    clip: Option<Rect>,
    masks: HashMap<MaskKey, Arc<PlacedMask>>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32, fonts: FontBook) -> Self {
        Self {
            frame: Frame::new(width, height),
            fonts,
            clip: None,
            masks: HashMap::new(),
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn into_frame(self) -> Frame {
        self.frame
    }

    pub fn fonts_mut(&mut self) -> &mut FontBook {
        &mut self.fonts
    }

    fn text_mask(&mut self, text: &str, font: &FontSpec, spread: f32) -> Option<Arc<PlacedMask>> {
        let key = MaskKey {
            text: text.to_string(),
            family: font.family.clone(),
            weight: font.weight,
            size: font.size.to_bits(),
            spread: spread.to_bits(),
        };
        if let Some(hit) = self.masks.get(&key) {
            return Some(hit.clone());
        }

        let face = self.fonts.resolve(&font.family, font.weight)?;
        let layout = layout_line(&face, text, font.size, true);
        if layout.glyphs.is_empty() {
            return None;
        }

        let min_x = layout.glyphs.iter().map(|g| g.0).min().unwrap_or(0);
        let min_y = layout.glyphs.iter().map(|g| g.1).min().unwrap_or(0);
        let max_x = layout
            .glyphs
            .iter()
            .map(|g| g.0 + g.2.width as i32)
            .max()
            .unwrap_or(0);
        let max_y = layout
            .glyphs
            .iter()
            .map(|g| g.1 + g.2.height as i32)
            .max()
            .unwrap_or(0);

        let mut mask = Mask::new((max_x - min_x).max(1) as usize, (max_y - min_y).max(1) as usize);
        for (left, top, m, bitmap) in &layout.glyphs {
            for gy in 0..m.height {
                for gx in 0..m.width {
                    let x = (left - min_x) as usize + gx;
                    let y = (top - min_y) as usize + gy;
                    let idx = y * mask.width + x;
                    let coverage = bitmap[gy * m.width + gx] as f32 / 255.0;
                    mask.data[idx] = mask.data[idx].max(coverage);
                }
            }
        }

        let mut grow = spread.max(0.0).round() as usize;
        if face.synthetic_bold {
            grow += bold_radius(font.size);
        }
        let (mask, dx, dy) = if grow > 0 {
            (
                mask.padded(grow).dilate(grow),
                (min_x - grow as i32) as f32,
                (min_y - grow as i32) as f32,
            )
        } else {
            (mask, min_x as f32, min_y as f32)
        };

        if self.masks.len() >= MASK_CACHE_LIMIT {
            self.masks.clear();
        }
        let placed = Arc::new(PlacedMask { mask, dx, dy });
        self.masks.insert(key, placed.clone());
        Some(placed)
    }

    fn composite(&mut self, mask: &Mask, origin: (f32, f32), bounds: Rect, paint: &Paint, state: &DrawState) {
        if state.alpha <= 0.0 {
            return;
        }

        let blurred;
        let (mask, origin) = if state.blur >= 0.5 {
            let r = ((state.blur / 2.0).round() as usize).max(1);
            let pad = r * 3;
            blurred = mask.padded(pad).blur(r);
            (&blurred, (origin.0 - pad as f32, origin.1 - pad as f32))
        } else {
            (mask, origin)
        };

        let local = Rect::new(origin.0, origin.1, mask.width as f32, mask.height as f32);
        let surface = Rect::new(0.0, 0.0, self.frame.width() as f32, self.frame.height() as f32);
        let mut target = state.transform.bounds(&local).inflate(1.0);
        target = match target.intersect(&surface) {
            Some(r) => r,
            None => return,
        };
        if let Some(clip) = self.clip {
            target = match target.intersect(&clip) {
                Some(r) => r,
                None => return,
            };
        }

        let x0 = target.x.floor().max(0.0) as u32;
        let y0 = target.y.floor().max(0.0) as u32;
        let x1 = (target.right().ceil() as u32).min(self.frame.width());
        let y1 = (target.bottom().ceil() as u32).min(self.frame.height());
        let identity = state.transform.is_identity();
        let clip = self.clip;
        let width = self.frame.width() as usize;
        let pixels = self.frame.as_bytes_mut();

        for py in y0..y1 {
            for px in x0..x1 {
                let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
                if let Some(c) = clip {
                    if !c.contains(cx, cy) {
                        continue;
                    }
                }
                let (lx, ly) = if identity {
                    (cx, cy)
                } else {
                    match state.transform.invert(cx, cy) {
                        Some(p) => p,
                        None => return,
                    }
                };
                let coverage = mask.sample(lx - origin.0, ly - origin.1);
                if coverage <= 0.0 {
                    continue;
                }
                let color = paint.color_at(lx, ly, &bounds);
                let a = coverage * (color.a as f32 / 255.0) * state.alpha;
                blend(pixels, (py as usize * width + px as usize) * 4, color, a);
            }
        }
    }
}

fn blend(pixels: &mut [u8], idx: usize, color: Color, a: f32) {
    let a = a.clamp(0.0, 1.0);
    let inv = 1.0 - a;
    let mix = |src: u8, dst: u8| (src as f32 * a + dst as f32 * inv).round() as u8;
    pixels[idx] = mix(color.r, pixels[idx]);
    pixels[idx + 1] = mix(color.g, pixels[idx + 1]);
    pixels[idx + 2] = mix(color.b, pixels[idx + 2]);
    let dst_a = pixels[idx + 3] as f32 / 255.0;
    pixels[idx + 3] = ((a + dst_a * inv) * 255.0).round() as u8;
}

fn shape_mask(shape: ShapeKind, rect: &Rect) -> (Mask, (f32, f32)) {
    let (cx, cy) = rect.center();
    let (half_w, half_h, radius) = match shape {
        ShapeKind::Rectangle => (rect.width / 2.0, rect.height / 2.0, 0.0),
        ShapeKind::RoundedRect { radius } => {
            let r = radius.clamp(0.0, rect.width.min(rect.height) / 2.0);
            (rect.width / 2.0, rect.height / 2.0, r)
        }
        ShapeKind::Pill => {
            let r = rect.width.min(rect.height) / 2.0;
            (rect.width / 2.0, rect.height / 2.0, r)
        }
        ShapeKind::Circle => {
            let r = rect.width.max(rect.height) / 2.0;
            (r, r, r)
        }
    };

    let x0 = (cx - half_w).floor() - 1.0;
    let y0 = (cy - half_h).floor() - 1.0;
    let w = ((half_w * 2.0).ceil() as usize) + 3;
    let h = ((half_h * 2.0).ceil() as usize) + 3;
    let mut mask = Mask::new(w, h);

    for y in 0..h {
        for x in 0..w {
            let px = x0 + x as f32 + 0.5 - cx;
            let py = y0 + y as f32 + 0.5 - cy;
            let qx = px.abs() - (half_w - radius);
            let qy = py.abs() - (half_h - radius);
            let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
            let sd = outside + qx.max(qy).min(0.0) - radius;
            mask.data[y * w + x] = (0.5 - sd).clamp(0.0, 1.0);
        }
    }
    (mask, (x0, y0))
}

impl Surface for RasterSurface {
    fn width(&self) -> u32 {
        self.frame.width()
    }

    fn height(&self) -> u32 {
        self.frame.height()
    }

    fn draw_image(&mut self, frame: &Frame) {
        if frame.width() == self.frame.width() && frame.height() == self.frame.height() {
            self.frame.as_bytes_mut().copy_from_slice(frame.as_bytes());
            return;
        }
        if frame.width() == 0 || frame.height() == 0 {
            return;
        }
        // nearest neighbour
        let (dw, dh) = (self.frame.width(), self.frame.height());
        let src = frame.as_bytes();
        let dst = self.frame.as_bytes_mut();
        for y in 0..dh {
            let sy = (y as u64 * frame.height() as u64 / dh as u64) as usize;
            for x in 0..dw {
                let sx = (x as u64 * frame.width() as u64 / dw as u64) as usize;
                let s = (sy * frame.width() as usize + sx) * 4;
                let d = (y as usize * dw as usize + x as usize) * 4;
                dst[d..d + 4].copy_from_slice(&src[s..s + 4]);
            }
        }
    }

    fn measure_text(&mut self, text: &str, font: &FontSpec) -> TextMetrics {
        match self.fonts.resolve(&font.family, font.weight) {
            Some(face) => layout_line(&face, text, font.size, false).metrics,
            None => TextMetrics::default(),
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font: &FontSpec, paint: &Paint, state: &DrawState) {
        let Some(placed) = self.text_mask(text, font, 0.0) else {
            return;
        };
        let metrics = self.measure_text(text, font);
        let bounds = Rect::new(x, y, metrics.width, metrics.height());
        self.composite(&placed.mask, (x + placed.dx, y + placed.dy), bounds, paint, state);
    }

    fn stroke_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        font: &FontSpec,
        paint: &Paint,
        line_width: f32,
        state: &DrawState,
    ) {
        if line_width <= 0.0 {
            return;
        }
        let Some(placed) = self.text_mask(text, font, line_width / 2.0) else {
            return;
        };
        let metrics = self.measure_text(text, font);
        let bounds = Rect::new(x, y, metrics.width, metrics.height()).inflate(line_width / 2.0);
        self.composite(&placed.mask, (x + placed.dx, y + placed.dy), bounds, paint, state);
    }

    fn fill_shape(&mut self, shape: ShapeKind, rect: Rect, paint: &Paint, state: &DrawState) {
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return;
        }
        let (mask, origin) = shape_mask(shape, &rect);
        self.composite(&mask, origin, rect, paint, state);
    }

    fn clip_region(&mut self, region: Option<Rect>) {
        self.clip = region;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::FontWeight;

    fn surface(w: u32, h: u32) -> RasterSurface {
        RasterSurface::new(w, h, FontBook::empty())
    }

    #[test]
    fn test_fill_rectangle() {
        let mut s = surface(20, 20);
        s.fill_shape(
            ShapeKind::Rectangle,
            Rect::new(5.0, 5.0, 10.0, 10.0),
            &Paint::Solid(Color::WHITE),
            &DrawState::default(),
        );
        assert_eq!(s.frame().pixel(10, 10), [255, 255, 255, 255]);
        assert_eq!(s.frame().pixel(2, 2), [0, 0, 0, 255]);
        assert_eq!(s.frame().pixel(5, 5), [255, 255, 255, 255]);
        assert_eq!(s.frame().pixel(15, 15), [0, 0, 0, 255]);
    }

    #[test]
    fn test_alpha_blends() {
        let mut s = surface(4, 4);
        let state = DrawState {
            alpha: 0.5,
            ..Default::default()
        };
        s.fill_shape(
            ShapeKind::Rectangle,
            Rect::new(0.0, 0.0, 4.0, 4.0),
            &Paint::Solid(Color::WHITE),
            &state,
        );
        let px = s.frame().pixel(1, 1);
        assert!((126..=129).contains(&px[0]), "{:?}", px);
    }

    #[test]
    fn test_clip_region_limits_drawing() {
        let mut s = surface(20, 10);
        s.clip_region(Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
        s.fill_shape(
            ShapeKind::Rectangle,
            Rect::new(0.0, 0.0, 20.0, 10.0),
            &Paint::Solid(Color::WHITE),
            &DrawState::default(),
        );
        s.clip_region(None);
        assert_eq!(s.frame().pixel(5, 5)[0], 255);
        assert_eq!(s.frame().pixel(15, 5)[0], 0);
    }

    #[test]
    fn test_circle_leaves_corners() {
        let mut s = surface(20, 20);
        s.fill_shape(
            ShapeKind::Circle,
            Rect::new(0.0, 0.0, 20.0, 20.0),
            &Paint::Solid(Color::WHITE),
            &DrawState::default(),
        );
        assert_eq!(s.frame().pixel(10, 10)[0], 255);
        assert_eq!(s.frame().pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_translate_moves_shape() {
        let mut s = surface(20, 20);
        let mut state = DrawState::default();
        state.transform.translate_x = 10.0;
        s.fill_shape(
            ShapeKind::Rectangle,
            Rect::new(0.0, 0.0, 5.0, 5.0),
            &Paint::Solid(Color::WHITE),
            &state,
        );
        assert_eq!(s.frame().pixel(2, 2)[0], 0);
        assert_eq!(s.frame().pixel(12, 2)[0], 255);
    }

    #[test]
    fn test_missing_font_draws_nothing() {
        let mut s = surface(16, 16);
        let font = FontSpec::new("Nope", 12.0, FontWeight::Bold);
        assert!(s.measure_text("hello", &font).is_empty());
        s.fill_text("hello", 0.0, 0.0, &font, &Paint::Solid(Color::WHITE), &DrawState::default());
        assert!(s.frame().as_bytes().chunks(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_draw_image_scales() {
        let mut s = surface(4, 4);
        let src = Frame::filled(2, 2, Color::rgb(10, 20, 30));
        s.draw_image(&src);
        assert_eq!(s.frame().pixel(3, 3), [10, 20, 30, 255]);
    }

    #[test]
    fn test_mask_blur_spreads_and_dilate_grows() {
        let mut m = Mask::new(9, 9);
        m.data[4 * 9 + 4] = 1.0;
        let blurred = m.blur(1);
        assert!(blurred.get(3, 4) > 0.0);
        assert!(blurred.get(4, 4) < 1.0);
        let grown = m.dilate(2);
        assert_eq!(grown.get(2, 2), 1.0);
        assert_eq!(grown.get(1, 4), 0.0);
    }
}
