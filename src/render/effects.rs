//! Layered draw recipes for each text effect.

use super::surface::{DrawState, FontSpec, Paint, Surface};
use crate::style::{Color, EffectKind, StyleDescriptor};

const FIRE: [Color; 3] = [
    Color::rgb(0xFF, 0xF2, 0x00),
    Color::rgb(0xFF, 0x7A, 0x00),
    Color::rgb(0xE5, 0x1C, 0x00),
];
const ICE: [Color; 3] = [
    Color::rgb(0xFF, 0xFF, 0xFF),
    Color::rgb(0xA8, 0xE6, 0xFF),
    Color::rgb(0x00, 0x77, 0xFF),
];
const GOLD: [Color; 3] = [
    Color::rgb(0xFF, 0xF6, 0xB7),
    Color::rgb(0xF6, 0xD3, 0x65),
    Color::rgb(0xB8, 0x86, 0x0B),
];
const CHROME: [Color; 5] = [
    Color::rgb(0xFF, 0xFF, 0xFF),
    Color::rgb(0xB8, 0xB8, 0xB8),
    Color::rgb(0x6E, 0x6E, 0x6E),
    Color::rgb(0xD9, 0xD9, 0xD9),
    Color::rgb(0xFF, 0xFF, 0xFF),
];
const CHROME_EDGE: Color = Color::rgb(0x1A, 0x1A, 0x1A);

/// Blur radii for the neon halo, innermost first.
const NEON_LAYERS: [f32; 3] = [4.0, 10.0, 20.0];
const MIN_GLOW_BLUR: f32 = 10.0;

/// Angle for the built-in metallic palettes: top to bottom.
const VERTICAL: f32 = 180.0;

/// Draw one line of text with `style.effect` layered under `state`.
#[allow(clippy::too_many_arguments)]
pub fn draw_effect_text<S: Surface + ?Sized>(
    surface: &mut S,
    text: &str,
    x: f32,
    y: f32,
    font: &FontSpec,
    style: &StyleDescriptor,
    fill: &Paint,
    state: &DrawState,
) {
    let outline = style.outline_width * 2.0;

    match style.effect {
        EffectKind::None => {
            surface.fill_text(text, x, y, font, fill, state);
        }
        EffectKind::Outline => {
            stroke(surface, text, x, y, font, style.outline_color, outline, state);
            surface.fill_text(text, x, y, font, fill, state);
        }
        EffectKind::Shadow => {
            let shadow = state.with_extra_blur(style.shadow_blur);
            surface.fill_text(
                text,
                x + style.shadow_offset_x,
                y + style.shadow_offset_y,
                font,
                &Paint::Solid(style.shadow_color),
                &shadow,
            );
            surface.fill_text(text, x, y, font, fill, state);
        }
        EffectKind::Glow => {
            let halo = state.with_extra_blur(style.shadow_blur.max(MIN_GLOW_BLUR));
            surface.fill_text(text, x, y, font, &Paint::Solid(style.glow_color), &halo);
            stroke(surface, text, x, y, font, style.outline_color, outline / 2.0, state);
            surface.fill_text(text, x, y, font, fill, state);
        }
        EffectKind::Neon => {
            for blur in NEON_LAYERS.iter().rev() {
                let layer = state.with_extra_blur(*blur);
                surface.stroke_text(
                    text,
                    x,
                    y,
                    font,
                    &Paint::Solid(style.glow_color),
                    outline.max(2.0),
                    &layer,
                );
            }
            stroke(surface, text, x, y, font, style.glow_color, outline.max(2.0) / 2.0, state);
            surface.fill_text(text, x, y, font, fill, state);
        }
        EffectKind::Gradient => {
            stroke(surface, text, x, y, font, style.outline_color, outline, state);
            let paint = Paint::even_gradient(&style.gradient_colors, style.gradient_angle);
            surface.fill_text(text, x, y, font, &paint, state);
        }
        EffectKind::Fire => metallic(surface, text, x, y, font, style, &FIRE, style.outline_color, state),
        EffectKind::Ice => metallic(surface, text, x, y, font, style, &ICE, style.outline_color, state),
        EffectKind::Gold => metallic(surface, text, x, y, font, style, &GOLD, style.outline_color, state),
        EffectKind::Chrome => metallic(surface, text, x, y, font, style, &CHROME, CHROME_EDGE, state),
        EffectKind::Extrude3d => {
            let depth = style.depth_3d.max(1);
            for i in (1..=depth).rev() {
                let shade = 1.0 - i as f32 / (depth + 1) as f32;
                let layer = state.with_alpha_factor(0.4 + 0.6 * shade);
                let offset = i as f32;
                surface.fill_text(
                    text,
                    x + offset,
                    y + offset,
                    font,
                    &Paint::Solid(style.outline_color),
                    &layer,
                );
            }
            stroke(surface, text, x, y, font, style.outline_color, outline, state);
            surface.fill_text(text, x, y, font, fill, state);
        }
        EffectKind::DoubleOutline => {
            stroke(surface, text, x, y, font, style.glow_color, outline * 2.0, state);
            stroke(surface, text, x, y, font, style.outline_color, outline, state);
            surface.fill_text(text, x, y, font, fill, state);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn stroke<S: Surface + ?Sized>(
    surface: &mut S,
    text: &str,
    x: f32,
    y: f32,
    font: &FontSpec,
    color: Color,
    width: f32,
    state: &DrawState,
) {
    if width > 0.0 && color.is_visible() {
        surface.stroke_text(text, x, y, font, &Paint::Solid(color), width, state);
    }
}

#[allow(clippy::too_many_arguments)]
fn metallic<S: Surface + ?Sized>(
    surface: &mut S,
    text: &str,
    x: f32,
    y: f32,
    font: &FontSpec,
    style: &StyleDescriptor,
    palette: &[Color],
    edge: Color,
    state: &DrawState,
) {
    stroke(surface, text, x, y, font, edge, style.outline_width * 2.0, state);
    surface.fill_text(text, x, y, font, &Paint::even_gradient(palette, VERTICAL), state);
}
