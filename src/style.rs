//! Caption style descriptor, partial updates and presets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{JimakuError, Result};

/// RGBA color, serialized as `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Scale the alpha channel by `factor` in `[0, 1]`.
    pub fn fade(self, factor: f32) -> Self {
        let a = (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        self.with_alpha(a)
    }

    pub fn is_visible(&self) -> bool {
        self.a > 0
    }

    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color::rgba(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl TryFrom<String> for Color {
    type Error = JimakuError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl FromStr for Color {
    type Err = JimakuError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bad = || JimakuError::Style(format!("Invalid color '{}'", s));

        if s.eq_ignore_ascii_case("transparent") {
            return Ok(Color::TRANSPARENT);
        }

        if let Some(hex) = s.strip_prefix('#') {
            let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map_err(|_| bad());
            let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
            if !hex.is_ascii() {
                return Err(bad());
            }
            return match hex.len() {
                3 => Ok(Color::rgb(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17)),
                6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
                8 => Ok(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
                _ => Err(bad()),
            };
        }

        let lower = s.to_ascii_lowercase();
        let inner = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(bad)?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        let channel = |p: &str| p.parse::<u8>().map_err(|_| bad());
        match parts.as_slice() {
            [r, g, b] => Ok(Color::rgb(channel(r)?, channel(g)?, channel(b)?)),
            [r, g, b, a] => {
                let alpha: f32 = a.parse().map_err(|_| bad())?;
                if !(0.0..=1.0).contains(&alpha) {
                    return Err(bad());
                }
                Ok(Color::rgba(
                    channel(r)?,
                    channel(g)?,
                    channel(b)?,
                    (alpha * 255.0).round() as u8,
                ))
            }
            _ => Err(bad()),
        }
    }
}

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = JimakuError;

            fn from_str(s: &str) -> Result<Self> {
                let lower = s.trim().to_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == lower)
                    .ok_or_else(|| JimakuError::Style(format!(
                        "Unknown {} '{}'", stringify!($name), s
                    )))
            }
        }
    };
}

named_enum!(
    /// Font weight; bold without a bold face falls back to synthetic emboldening.
    FontWeight {
        Normal => "normal",
        Bold => "bold",
        Black => "black",
    }
);

named_enum!(
    /// Visual treatment applied to caption text.
    EffectKind {
        None => "none",
        Outline => "outline",
        Shadow => "shadow",
        Glow => "glow",
        Neon => "neon",
        Gradient => "gradient",
        Fire => "fire",
        Ice => "ice",
        Gold => "gold",
        Extrude3d => "extrude-3d",
        Chrome => "chrome",
        DoubleOutline => "double-outline",
    }
);

named_enum!(
    /// Entrance or continuous motion of a caption.
    AnimationKind {
        None => "none",
        FadeIn => "fade-in",
        SlideUp => "slide-up",
        SlideDown => "slide-down",
        ScaleUp => "scale-up",
        Bounce => "bounce",
        Pop => "pop",
        Wave => "wave",
        Shake => "shake",
        GlowPulse => "glow-pulse",
        RotateIn => "rotate-in",
        BlurIn => "blur-in",
        Typewriter => "typewriter",
    }
);

named_enum!(
    BackgroundShape {
        None => "none",
        Rectangle => "rectangle",
        Rounded => "rounded",
        Pill => "pill",
        Circle => "circle",
    }
);

named_enum!(
    TextTransform {
        None => "none",
        Uppercase => "uppercase",
        Lowercase => "lowercase",
        Capitalize => "capitalize",
    }
);

impl TextTransform {
    pub fn apply(&self, text: &str) -> String {
        match self {
            TextTransform::None => text.to_string(),
            TextTransform::Uppercase => text.to_uppercase(),
            TextTransform::Lowercase => text.to_lowercase(),
            TextTransform::Capitalize => text
                .split(' ')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<String>>()
                .join(" "),
        }
    }
}

pub const MIN_FONT_SIZE: f32 = 8.0;
pub const MAX_FONT_SIZE: f32 = 400.0;
pub const MAX_OUTLINE_WIDTH: f32 = 40.0;
pub const MAX_DEPTH: u32 = 24;
pub const MAX_BLUR: f32 = 64.0;

/// Full caption style. Immutable per compile; updated through [`StylePatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleDescriptor {
    pub font_family: String,
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub text_color: Color,
    pub highlight_color: Color,
    pub outline_color: Color,
    pub outline_width: f32,
    pub shadow_color: Color,
    pub shadow_blur: f32,
    pub shadow_offset_x: f32,
    pub shadow_offset_y: f32,
    pub glow_color: Color,
    pub background_color: Color,
    pub effect: EffectKind,
    pub animation: AnimationKind,
    pub gradient_colors: Vec<Color>,
    pub gradient_angle: f32,
    pub depth_3d: u32,
    pub background_shape: BackgroundShape,
    pub background_padding: f32,
    pub background_radius: f32,
    /// Horizontal anchor of the caption center, percent of frame width.
    pub position_x: f32,
    /// Vertical anchor of the caption center, percent of frame height.
    pub position_y: f32,
    pub text_transform: TextTransform,
    pub karaoke: bool,
    pub max_words_per_line: u32,
    pub max_chars_per_line: u32,
}

impl Default for StyleDescriptor {
    fn default() -> Self {
        Self {
            font_family: "Inter".to_string(),
            font_size: 64.0,
            font_weight: FontWeight::Bold,
            text_color: Color::WHITE,
            highlight_color: Color::rgb(255, 214, 0),
            outline_color: Color::BLACK,
            outline_width: 4.0,
            shadow_color: Color::rgba(0, 0, 0, 160),
            shadow_blur: 8.0,
            shadow_offset_x: 3.0,
            shadow_offset_y: 3.0,
            glow_color: Color::rgb(0, 229, 255),
            background_color: Color::rgba(0, 0, 0, 140),
            effect: EffectKind::Outline,
            animation: AnimationKind::FadeIn,
            gradient_colors: vec![Color::rgb(255, 94, 98), Color::rgb(255, 195, 113)],
            gradient_angle: 90.0,
            depth_3d: 6,
            background_shape: BackgroundShape::None,
            background_padding: 16.0,
            background_radius: 12.0,
            position_x: 50.0,
            position_y: 80.0,
            text_transform: TextTransform::None,
            karaoke: false,
            max_words_per_line: 3,
            max_chars_per_line: 25,
        }
    }
}

/// Partial style update; unset fields keep the prior value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StylePatch {
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub font_weight: Option<FontWeight>,
    pub text_color: Option<Color>,
    pub highlight_color: Option<Color>,
    pub outline_color: Option<Color>,
    pub outline_width: Option<f32>,
    pub shadow_color: Option<Color>,
    pub shadow_blur: Option<f32>,
    pub shadow_offset_x: Option<f32>,
    pub shadow_offset_y: Option<f32>,
    pub glow_color: Option<Color>,
    pub background_color: Option<Color>,
    pub effect: Option<EffectKind>,
    pub animation: Option<AnimationKind>,
    pub gradient_colors: Option<Vec<Color>>,
    pub gradient_angle: Option<f32>,
    pub depth_3d: Option<u32>,
    pub background_shape: Option<BackgroundShape>,
    pub background_padding: Option<f32>,
    pub background_radius: Option<f32>,
    pub position_x: Option<f32>,
    pub position_y: Option<f32>,
    pub text_transform: Option<TextTransform>,
    pub karaoke: Option<bool>,
    pub max_words_per_line: Option<u32>,
    pub max_chars_per_line: Option<u32>,
}

macro_rules! overlay {
    ($target:ident, $patch:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$patch.$field {
                $target.$field = value.clone();
            }
        )+
    };
}

impl StyleDescriptor {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| JimakuError::Style(format!("Failed to parse style: {}", e)))
    }

    /// Overlay `patch` field by field onto this record.
    pub fn merge(&self, patch: &StylePatch) -> StyleDescriptor {
        let mut merged = self.clone();
        overlay!(
            merged,
            patch,
            font_family,
            font_size,
            font_weight,
            text_color,
            highlight_color,
            outline_color,
            outline_width,
            shadow_color,
            shadow_blur,
            shadow_offset_x,
            shadow_offset_y,
            glow_color,
            background_color,
            effect,
            animation,
            gradient_colors,
            gradient_angle,
            depth_3d,
            background_shape,
            background_padding,
            background_radius,
            position_x,
            position_y,
            text_transform,
            karaoke,
            max_words_per_line,
            max_chars_per_line,
        );
        merged
    }

    /// Report every field outside its renderer-safe range.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.font_family.trim().is_empty() {
            problems.push("fontFamily must not be empty".to_string());
        }
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&self.font_size) {
            problems.push(format!(
                "fontSize {} outside [{}, {}]",
                self.font_size, MIN_FONT_SIZE, MAX_FONT_SIZE
            ));
        }
        if !(0.0..=MAX_OUTLINE_WIDTH).contains(&self.outline_width) {
            problems.push(format!("outlineWidth {} outside [0, {}]", self.outline_width, MAX_OUTLINE_WIDTH));
        }
        if !(0.0..=MAX_BLUR).contains(&self.shadow_blur) {
            problems.push(format!("shadowBlur {} outside [0, {}]", self.shadow_blur, MAX_BLUR));
        }
        for (name, value) in [("positionX", self.position_x), ("positionY", self.position_y)] {
            if !(0.0..=100.0).contains(&value) {
                problems.push(format!("{} {} outside [0, 100]", name, value));
            }
        }
        if self.depth_3d > MAX_DEPTH {
            problems.push(format!("depth3d {} above {}", self.depth_3d, MAX_DEPTH));
        }
        if self.background_padding < 0.0 || !self.background_padding.is_finite() {
            problems.push(format!("backgroundPadding {} is negative", self.background_padding));
        }
        if self.background_radius < 0.0 || !self.background_radius.is_finite() {
            problems.push(format!("backgroundRadius {} is negative", self.background_radius));
        }
        if self.max_words_per_line == 0 {
            problems.push("maxWordsPerLine must be at least 1".to_string());
        }
        if self.max_chars_per_line == 0 {
            problems.push("maxCharsPerLine must be at least 1".to_string());
        }
        if !self.gradient_angle.is_finite() {
            problems.push("gradientAngle must be finite".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(JimakuError::Style(problems.join("; ")))
        }
    }

    /// Clamp every numeric field into its renderer-safe range.
    pub fn sanitized(&self) -> StyleDescriptor {
        let mut s = self.clone();
        s.font_size = finite_or(s.font_size, 64.0).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        s.outline_width = finite_or(s.outline_width, 0.0).clamp(0.0, MAX_OUTLINE_WIDTH);
        s.shadow_blur = finite_or(s.shadow_blur, 0.0).clamp(0.0, MAX_BLUR);
        s.shadow_offset_x = finite_or(s.shadow_offset_x, 0.0).clamp(-200.0, 200.0);
        s.shadow_offset_y = finite_or(s.shadow_offset_y, 0.0).clamp(-200.0, 200.0);
        s.position_x = finite_or(s.position_x, 50.0).clamp(0.0, 100.0);
        s.position_y = finite_or(s.position_y, 80.0).clamp(0.0, 100.0);
        s.depth_3d = s.depth_3d.min(MAX_DEPTH);
        s.background_padding = finite_or(s.background_padding, 0.0).clamp(0.0, 400.0);
        s.background_radius = finite_or(s.background_radius, 0.0).clamp(0.0, 400.0);
        s.gradient_angle = finite_or(s.gradient_angle, 90.0).rem_euclid(360.0);
        s.max_words_per_line = s.max_words_per_line.max(1);
        s.max_chars_per_line = s.max_chars_per_line.max(1);
        if s.gradient_colors.is_empty() {
            s.gradient_colors = vec![s.text_color, s.text_color];
        } else if s.gradient_colors.len() == 1 {
            let only = s.gradient_colors[0];
            s.gradient_colors.push(only);
        }
        if s.font_family.trim().is_empty() {
            s.font_family = StyleDescriptor::default().font_family;
        }
        s
    }

    pub fn preset(name: &str) -> Result<StyleDescriptor> {
        let preset: StylePreset = name.parse()?;
        Ok(preset.descriptor())
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

named_enum!(
    /// Ready-made looks offered by the style editor.
    StylePreset {
        Classic => "classic",
        BoldPop => "bold-pop",
        Neon => "neon",
        Karaoke => "karaoke",
        Cinematic => "cinematic",
    }
);

impl StylePreset {
    pub fn descriptor(&self) -> StyleDescriptor {
        let base = StyleDescriptor::default();
        let patch = match self {
            StylePreset::Classic => StylePatch::default(),
            StylePreset::BoldPop => StylePatch {
                font_weight: Some(FontWeight::Black),
                font_size: Some(80.0),
                effect: Some(EffectKind::Extrude3d),
                animation: Some(AnimationKind::Pop),
                text_transform: Some(TextTransform::Uppercase),
                max_words_per_line: Some(2),
                ..Default::default()
            },
            StylePreset::Neon => StylePatch {
                effect: Some(EffectKind::Neon),
                animation: Some(AnimationKind::GlowPulse),
                text_color: Some(Color::rgb(230, 255, 255)),
                glow_color: Some(Color::rgb(255, 0, 200)),
                ..Default::default()
            },
            StylePreset::Karaoke => StylePatch {
                karaoke: Some(true),
                animation: Some(AnimationKind::None),
                background_shape: Some(BackgroundShape::Pill),
                max_words_per_line: Some(5),
                max_chars_per_line: Some(32),
                ..Default::default()
            },
            StylePreset::Cinematic => StylePatch {
                font_weight: Some(FontWeight::Normal),
                font_size: Some(48.0),
                effect: Some(EffectKind::Shadow),
                animation: Some(AnimationKind::SlideUp),
                position_y: Some(88.0),
                max_words_per_line: Some(6),
                max_chars_per_line: Some(42),
                ..Default::default()
            },
        };
        base.merge(&patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parsing() {
        assert_eq!("#fff".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("#FF8000".parse::<Color>().unwrap(), Color::rgb(255, 128, 0));
        assert_eq!("#00000080".parse::<Color>().unwrap(), Color::rgba(0, 0, 0, 128));
        assert_eq!("rgb(1, 2, 3)".parse::<Color>().unwrap(), Color::rgb(1, 2, 3));
        assert_eq!(
            "rgba(10,20,30,0.5)".parse::<Color>().unwrap(),
            Color::rgba(10, 20, 30, 128)
        );
        assert_eq!("transparent".parse::<Color>().unwrap(), Color::TRANSPARENT);
        assert!("#12345".parse::<Color>().is_err());
        assert!("red".parse::<Color>().is_err());
        assert!("rgba(1,2,3,4)".parse::<Color>().is_err());
    }

    #[test]
    fn test_color_serde_round_trip() {
        let json = serde_json::to_string(&Color::rgba(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "\"#01020304\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgba(1, 2, 3, 4));
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let base = StyleDescriptor {
            font_size: 70.0,
            karaoke: true,
            ..Default::default()
        };
        let patch: StylePatch =
            serde_json::from_str(r##"{"textColor":"#FF0000","animation":"bounce"}"##).unwrap();
        let merged = base.merge(&patch);
        assert_eq!(merged.text_color, Color::rgb(255, 0, 0));
        assert_eq!(merged.animation, AnimationKind::Bounce);
        assert_eq!(merged.font_size, 70.0);
        assert!(merged.karaoke);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let style = StyleDescriptor::from_json(r#"{"effect":"extrude-3d","depth3d":9}"#).unwrap();
        assert_eq!(style.effect, EffectKind::Extrude3d);
        assert_eq!(style.depth_3d, 9);
        assert_eq!(style.font_family, "Inter");
    }

    #[test]
    fn test_unknown_enum_rejected() {
        assert!(StyleDescriptor::from_json(r#"{"animation":"spin"}"#).is_err());
        assert!("spin".parse::<AnimationKind>().is_err());
        assert_eq!("Fade-In".parse::<AnimationKind>().unwrap(), AnimationKind::FadeIn);
    }

    #[test]
    fn test_validate_and_sanitize() {
        let style = StyleDescriptor {
            position_x: 140.0,
            position_y: -3.0,
            font_size: 2.0,
            max_words_per_line: 0,
            gradient_colors: vec![],
            ..Default::default()
        };
        let err = style.validate().unwrap_err().to_string();
        assert!(err.contains("positionX"));
        assert!(err.contains("maxWordsPerLine"));

        let safe = style.sanitized();
        assert_eq!(safe.position_x, 100.0);
        assert_eq!(safe.position_y, 0.0);
        assert_eq!(safe.font_size, MIN_FONT_SIZE);
        assert_eq!(safe.max_words_per_line, 1);
        assert_eq!(safe.gradient_colors.len(), 2);
        assert!(safe.validate().is_ok());
    }

    #[test]
    fn test_text_transform() {
        assert_eq!(TextTransform::Uppercase.apply("hi there"), "HI THERE");
        assert_eq!(TextTransform::Capitalize.apply("hi  there"), "Hi  There");
        assert_eq!(TextTransform::None.apply("Hi"), "Hi");
    }

    #[test]
    fn test_presets_are_valid() {
        for preset in StylePreset::ALL {
            assert!(preset.descriptor().validate().is_ok(), "{}", preset);
        }
        assert!(StyleDescriptor::preset("karaoke").unwrap().karaoke);
        assert!(StyleDescriptor::preset("nope").is_err());
    }
}
