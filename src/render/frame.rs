//! Composes one output frame: source video plus every active caption.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::animation::{self, AnimationFrame};
use super::effects::draw_effect_text;
use super::surface::{DrawState, FontSpec, Frame, Paint, Rect, ShapeKind, Surface, TextMetrics, Transform};
use crate::segmenter::CaptionSegment;
use crate::style::{BackgroundShape, StyleDescriptor};

/// Lines wrap once they would exceed this share of the surface width.
pub const MAX_LINE_WIDTH_SHARE: f32 = 0.9;
pub const LINE_SPACING: f32 = 1.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Segments whose window contains the frame time.
    pub active_segments: usize,
    /// Captions that produced draw calls; zero-width text is skipped.
    pub captions_drawn: usize,
    pub reused_last_frame: bool,
}

/// Draws frames for one compile run.
///
/// Holds the last decoded source frame so a tick with no new video frame
/// repeats it, and the generator feeding shake jitter.
pub struct FrameRenderer {
    last_frame: Option<Frame>,
    rng: StdRng,
}

impl FrameRenderer {
    pub fn new(seed: u64) -> Self {
        Self {
            last_frame: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn render_frame<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        source: Option<Frame>,
        time_ms: f64,
        segments: &[CaptionSegment],
        style: &StyleDescriptor,
    ) -> FrameStats {
        let reused_last_frame = source.is_none();
        if let Some(frame) = source {
            self.last_frame = Some(frame);
        }
        match &self.last_frame {
            Some(frame) => surface.draw_image(frame),
            None => surface.draw_image(&Frame::new(surface.width(), surface.height())),
        }

        let mut stats = FrameStats {
            reused_last_frame,
            ..Default::default()
        };
        for segment in segments.iter().filter(|s| s.is_active(time_ms)) {
            stats.active_segments += 1;
            let jitter = self.rng.gen_range(-1.0f32..=1.0);
            if draw_caption(surface, segment, time_ms, style, jitter) {
                stats.captions_drawn += 1;
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LineBox {
    text: String,
    x: f32,
    y: f32,
    metrics: TextMetrics,
}

impl LineBox {
    fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.metrics.width, self.metrics.height())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BlockLayout {
    lines: Vec<LineBox>,
    bounds: Rect,
}

/// Greedy word wrap against `max_width`.
fn wrap_lines<S: Surface + ?Sized>(surface: &mut S, text: &str, font: &FontSpec, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if surface.measure_text(&candidate, font).width > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn layout_block<S: Surface + ?Sized>(
    surface: &mut S,
    text: &str,
    font: &FontSpec,
    style: &StyleDescriptor,
) -> Option<BlockLayout> {
    let width = surface.width() as f32;
    let height = surface.height() as f32;
    let lines = wrap_lines(surface, text, font, width * MAX_LINE_WIDTH_SHARE);

    let measured: Vec<(String, TextMetrics)> = lines
        .into_iter()
        .map(|line| {
            let metrics = surface.measure_text(&line, font);
            (line, metrics)
        })
        .collect();
    if measured.iter().all(|(_, m)| m.is_empty()) {
        return None;
    }

    let line_height = measured[0].1.height();
    let advance = line_height * LINE_SPACING;
    let block_height = advance * (measured.len() - 1) as f32 + line_height;
    let cx = style.position_x / 100.0 * width;
    let cy = style.position_y / 100.0 * height;
    let top = cy - block_height / 2.0;

    let lines: Vec<LineBox> = measured
        .into_iter()
        .enumerate()
        .map(|(i, (text, metrics))| LineBox {
            text,
            x: cx - metrics.width / 2.0,
            y: top + advance * i as f32,
            metrics,
        })
        .collect();

    let bounds = lines
        .iter()
        .map(LineBox::rect)
        .reduce(|a, b| a.union(&b))
        .unwrap_or_else(|| Rect::new(cx, cy, 0.0, 0.0));

    Some(BlockLayout { lines, bounds })
}

fn shape_for(style: &StyleDescriptor) -> Option<ShapeKind> {
    match style.background_shape {
        BackgroundShape::None => None,
        BackgroundShape::Rectangle => Some(ShapeKind::Rectangle),
        BackgroundShape::Rounded => Some(ShapeKind::RoundedRect {
            radius: style.background_radius,
        }),
        BackgroundShape::Pill => Some(ShapeKind::Pill),
        BackgroundShape::Circle => Some(ShapeKind::Circle),
    }
}

fn prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Draw `segment` as it appears at `time_ms`. Returns false when nothing was
/// drawn, e.g. when the text measures zero width.
pub fn draw_caption<S: Surface + ?Sized>(
    surface: &mut S,
    segment: &CaptionSegment,
    time_ms: f64,
    style: &StyleDescriptor,
    jitter: f32,
) -> bool {
    let text = style.text_transform.apply(&segment.text);
    if text.trim().is_empty() {
        return false;
    }

    let font = FontSpec::new(style.font_family.clone(), style.font_size, style.font_weight);
    let Some(layout) = layout_block(surface, &text, &font, style) else {
        return false;
    };

    let p = animation::progress(style.animation, segment, time_ms);
    let anim = animation::animate(style.animation, p, jitter);
    let state = draw_state(&anim, &layout.bounds);

    if let Some(shape) = shape_for(style) {
        if style.background_color.is_visible() {
            let rect = layout.bounds.inflate(style.background_padding);
            surface.fill_shape(shape, rect, &Paint::Solid(style.background_color), &state);
        }
    }

    let total_chars: usize = layout.lines.iter().map(|l| l.text.chars().count()).sum();
    let mut budget = anim.visible_chars(total_chars);
    let fill = Paint::Solid(style.text_color);
    let mut shown: Vec<(&LineBox, &str)> = Vec::with_capacity(layout.lines.len());
    for line in &layout.lines {
        let n = line.text.chars().count();
        let visible = prefix(&line.text, budget.min(n));
        budget = budget.saturating_sub(n);
        if !visible.is_empty() {
            draw_effect_text(surface, visible, line.x, line.y, &font, style, &fill, &state);
            shown.push((line, visible));
        }
    }

    if style.karaoke {
        draw_karaoke(surface, segment, time_ms, style, &font, &shown, &state);
    }
    true
}

fn draw_state(anim: &AnimationFrame, bounds: &Rect) -> DrawState {
    let (origin_x, origin_y) = bounds.center();
    DrawState {
        alpha: anim.alpha.clamp(0.0, 1.0),
        blur: anim.blur.max(0.0),
        transform: Transform {
            scale: anim.scale,
            rotation: anim.rotation,
            translate_x: anim.offset_x,
            translate_y: anim.offset_y,
            origin_x,
            origin_y,
        },
    }
}

/// Overdraw the spoken share of the text in the highlight color, sweeping
/// left to right across lines in reading order.
fn draw_karaoke<S: Surface + ?Sized>(
    surface: &mut S,
    segment: &CaptionSegment,
    time_ms: f64,
    style: &StyleDescriptor,
    font: &FontSpec,
    shown: &[(&LineBox, &str)],
    state: &DrawState,
) {
    let duration = segment.duration_ms() as f64;
    let reveal = if duration <= 0.0 {
        1.0
    } else {
        ((time_ms - segment.start_ms as f64) / duration).clamp(0.0, 1.0) as f32
    };

    let total: f32 = shown.iter().map(|(l, _)| l.metrics.width).sum();
    let mut remaining = total * reveal;
    let highlight = Paint::Solid(style.highlight_color);

    for (line, visible) in shown {
        if remaining <= 0.0 {
            break;
        }
        let lit = remaining.min(line.metrics.width);
        remaining -= lit;
        let pad = style.outline_width + style.font_size * 0.25;
        let region = Rect::new(line.x - pad, line.y - pad, lit + pad, line.metrics.height() + pad * 2.0);
        surface.clip_region(Some(state.transform.bounds(&region)));
        surface.fill_text(visible, line.x, line.y, font, &highlight, state);
        surface.clip_region(None);
    }
}
