//! Per-frame transform parameters for each caption animation.

use std::f32::consts::PI;

use crate::segmenter::CaptionSegment;
use crate::style::AnimationKind;

/// Slide distance in pixels.
pub const SLIDE_DISTANCE: f32 = 30.0;
pub const BOUNCE_HEIGHT: f32 = 20.0;
pub const WAVE_AMPLITUDE: f32 = 6.0;
pub const SHAKE_AMPLITUDE: f32 = 8.0;
pub const BLUR_IN_RADIUS: f32 = 12.0;

/// Entrance animations run for 30% of the segment, capped at this length.
pub const MAX_ENTRANCE_MS: f64 = 500.0;
const ENTRANCE_SHARE: f64 = 0.3;

const SCALE_UP_FROM: f32 = 0.3;
const POP_OVERSHOOT: f32 = 0.3;
const GLOW_PULSE_DEPTH: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub alpha: f32,
    pub rotation: f32,
    pub blur: f32,
    /// Share of characters revealed, for typewriter.
    pub reveal: Option<f32>,
}

impl Default for AnimationFrame {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            alpha: 1.0,
            rotation: 0.0,
            blur: 0.0,
            reveal: None,
        }
    }
}

impl AnimationFrame {
    /// Number of characters typewriter shows out of `total`.
    pub fn visible_chars(&self, total: usize) -> usize {
        match self.reveal {
            Some(p) => ((total as f32 * p.clamp(0.0, 1.0)).ceil() as usize).min(total),
            None => total,
        }
    }
}

/// Kinds that loop over the whole segment rather than playing once at entry.
pub fn is_continuous(kind: AnimationKind) -> bool {
    matches!(
        kind,
        AnimationKind::Bounce | AnimationKind::Wave | AnimationKind::Shake | AnimationKind::GlowPulse
    )
}

pub fn entrance_duration_ms(segment_duration_ms: u64) -> f64 {
    (segment_duration_ms as f64 * ENTRANCE_SHARE).min(MAX_ENTRANCE_MS)
}

/// Animation progress in `[0, 1]` for `segment` at `time_ms`.
pub fn progress(kind: AnimationKind, segment: &CaptionSegment, time_ms: f64) -> f32 {
    let elapsed = (time_ms - segment.start_ms as f64).max(0.0);
    let span = if is_continuous(kind) {
        segment.duration_ms() as f64
    } else {
        entrance_duration_ms(segment.duration_ms())
    };
    if span <= 0.0 {
        return 1.0;
    }
    (elapsed / span).clamp(0.0, 1.0) as f32
}

/// Transform parameters for `kind` at progress `p`.
///
/// `jitter` is a sample in `[-1, 1]` that drives shake; the caller supplies
/// it so a seeded generator keeps renders reproducible.
pub fn animate(kind: AnimationKind, p: f32, jitter: f32) -> AnimationFrame {
    let p = p.clamp(0.0, 1.0);
    let identity = AnimationFrame::default();

    match kind {
        AnimationKind::None => identity,
        AnimationKind::FadeIn => AnimationFrame { alpha: p, ..identity },
        AnimationKind::SlideUp => AnimationFrame {
            offset_y: (1.0 - p) * SLIDE_DISTANCE,
            alpha: p,
            ..identity
        },
        AnimationKind::SlideDown => AnimationFrame {
            offset_y: -(1.0 - p) * SLIDE_DISTANCE,
            alpha: p,
            ..identity
        },
        // ease-out cubic
        AnimationKind::ScaleUp => AnimationFrame {
            scale: SCALE_UP_FROM + (1.0 - SCALE_UP_FROM) * (1.0 - (1.0 - p).powi(3)),
            ..identity
        },
        AnimationKind::Bounce => AnimationFrame {
            offset_y: -(p * PI * 2.0).sin() * (1.0 - p) * BOUNCE_HEIGHT,
            ..identity
        },
        AnimationKind::Pop => AnimationFrame {
            scale: 1.0 + (p * PI).sin() * POP_OVERSHOOT,
            ..identity
        },
        AnimationKind::Wave => AnimationFrame {
            offset_y: (p * PI * 4.0).sin() * WAVE_AMPLITUDE,
            ..identity
        },
        AnimationKind::Shake => AnimationFrame {
            offset_x: jitter.clamp(-1.0, 1.0) * SHAKE_AMPLITUDE * (1.0 - p),
            ..identity
        },
        AnimationKind::GlowPulse => AnimationFrame {
            scale: 1.0 + (p * PI * 3.0).sin() * GLOW_PULSE_DEPTH,
            ..identity
        },
        AnimationKind::RotateIn => AnimationFrame {
            scale: p,
            rotation: (1.0 - p) * (-PI / 2.0),
            ..identity
        },
        AnimationKind::BlurIn => AnimationFrame {
            alpha: p,
            blur: (1.0 - p) * BLUR_IN_RADIUS,
            ..identity
        },
        AnimationKind::Typewriter => AnimationFrame {
            reveal: Some(p),
            ..identity
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_fade_in_endpoints() {
        assert_eq!(animate(AnimationKind::FadeIn, 0.0, 0.0).alpha, 0.0);
        assert_eq!(animate(AnimationKind::FadeIn, 1.0, 0.0).alpha, 1.0);
    }

    #[test]
    fn test_bounce_starts_and_ends_at_rest() {
        assert!(close(animate(AnimationKind::Bounce, 0.0, 0.0).offset_y, 0.0));
        assert!(close(animate(AnimationKind::Bounce, 1.0, 0.0).offset_y, 0.0));
        // rises first, then dips below rest on the second half of the cycle
        assert!(animate(AnimationKind::Bounce, 0.25, 0.0).offset_y < 0.0);
        assert!(close(animate(AnimationKind::Bounce, 0.75, 0.0).offset_y, 5.0));
    }

    #[test]
    fn test_entrances_settle_to_identity() {
        for kind in AnimationKind::ALL {
            if matches!(kind, AnimationKind::Wave | AnimationKind::GlowPulse) {
                continue;
            }
            let frame = animate(*kind, 1.0, 0.7);
            assert!(close(frame.scale, 1.0), "{:?}", kind);
            assert!(close(frame.alpha, 1.0), "{:?}", kind);
            assert!(close(frame.offset_x, 0.0), "{:?}", kind);
            assert!(close(frame.offset_y, 0.0), "{:?}", kind);
            assert!(close(frame.rotation, 0.0), "{:?}", kind);
            assert!(close(frame.blur, 0.0), "{:?}", kind);
        }
    }

    #[test]
    fn test_pop_swells_from_full_size() {
        assert!(close(animate(AnimationKind::Pop, 0.0, 0.0).scale, 1.0));
        assert!(close(animate(AnimationKind::Pop, 0.5, 0.0).scale, 1.3));
        assert!(close(animate(AnimationKind::Pop, 1.0, 0.0).scale, 1.0));
        assert_eq!(animate(AnimationKind::Pop, 0.0, 0.0).alpha, 1.0);
    }

    /// (kind, p, jitter, scale, offset_x, offset_y, alpha, rotation, blur)
    const MIDPOINTS: &[(AnimationKind, f32, f32, f32, f32, f32, f32, f32, f32)] = &[
        (AnimationKind::None, 0.5, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0),
        (AnimationKind::FadeIn, 0.5, 0.0, 1.0, 0.0, 0.0, 0.5, 0.0, 0.0),
        (AnimationKind::SlideUp, 0.5, 0.0, 1.0, 0.0, 15.0, 0.5, 0.0, 0.0),
        (AnimationKind::SlideDown, 0.5, 0.0, 1.0, 0.0, -15.0, 0.5, 0.0, 0.0),
        (AnimationKind::ScaleUp, 0.5, 0.0, 0.9125, 0.0, 0.0, 1.0, 0.0, 0.0),
        (AnimationKind::Bounce, 0.75, 0.0, 1.0, 0.0, 5.0, 1.0, 0.0, 0.0),
        (AnimationKind::Pop, 0.5, 0.0, 1.3, 0.0, 0.0, 1.0, 0.0, 0.0),
        (AnimationKind::Wave, 0.125, 0.0, 1.0, 0.0, 6.0, 1.0, 0.0, 0.0),
        (AnimationKind::Shake, 0.5, 0.5, 1.0, 2.0, 0.0, 1.0, 0.0, 0.0),
        (AnimationKind::GlowPulse, 1.0 / 6.0, 0.0, 1.1, 0.0, 0.0, 1.0, 0.0, 0.0),
        (AnimationKind::RotateIn, 0.5, 0.0, 0.5, 0.0, 0.0, 1.0, -PI / 4.0, 0.0),
        (AnimationKind::BlurIn, 0.5, 0.0, 1.0, 0.0, 0.0, 0.5, 0.0, 6.0),
        (AnimationKind::Typewriter, 0.5, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0),
    ];

    #[test]
    fn test_formula_midpoints() {
        for &(kind, p, jitter, scale, offset_x, offset_y, alpha, rotation, blur) in MIDPOINTS {
            let frame = animate(kind, p, jitter);
            assert!(close(frame.scale, scale), "{:?} scale {}", kind, frame.scale);
            assert!(close(frame.offset_x, offset_x), "{:?} offset_x {}", kind, frame.offset_x);
            assert!(close(frame.offset_y, offset_y), "{:?} offset_y {}", kind, frame.offset_y);
            assert!(close(frame.alpha, alpha), "{:?} alpha {}", kind, frame.alpha);
            assert!(close(frame.rotation, rotation), "{:?} rotation {}", kind, frame.rotation);
            assert!(close(frame.blur, blur), "{:?} blur {}", kind, frame.blur);
        }
        assert_eq!(animate(AnimationKind::Typewriter, 0.5, 0.0).reveal, Some(0.5));
        assert_eq!(MIDPOINTS.len(), AnimationKind::ALL.len());
    }

    #[test]
    fn test_rotate_in_and_blur_in() {
        let start = animate(AnimationKind::RotateIn, 0.0, 0.0);
        assert!(close(start.rotation, -PI / 2.0));
        assert_eq!(start.scale, 0.0);
        let blur = animate(AnimationKind::BlurIn, 0.5, 0.0);
        assert!(close(blur.blur, 6.0));
    }

    #[test]
    fn test_shake_scales_jitter() {
        let frame = animate(AnimationKind::Shake, 0.0, -1.0);
        assert!(close(frame.offset_x, -SHAKE_AMPLITUDE));
        assert!(close(animate(AnimationKind::Shake, 0.5, 5.0).offset_x, SHAKE_AMPLITUDE / 2.0));
    }

    #[test]
    fn test_typewriter_reveal_rounds_up() {
        let frame = animate(AnimationKind::Typewriter, 0.25, 0.0);
        assert_eq!(frame.visible_chars(10), 3);
        assert_eq!(animate(AnimationKind::Typewriter, 0.0, 0.0).visible_chars(10), 0);
        assert_eq!(AnimationFrame::default().visible_chars(10), 10);
    }

    #[test]
    fn test_progress_windows() {
        let seg = CaptionSegment::new("x", 1000, 3000);
        // entrance: min(2000 * 0.3, 500) = 500ms
        assert!(close(progress(AnimationKind::FadeIn, &seg, 1250.0), 0.5));
        assert_eq!(progress(AnimationKind::FadeIn, &seg, 2000.0), 1.0);
        assert!(close(progress(AnimationKind::Wave, &seg, 2000.0), 0.5));
        assert_eq!(progress(AnimationKind::FadeIn, &seg, 500.0), 0.0);

        let instant = CaptionSegment::new("x", 10, 10);
        assert_eq!(progress(AnimationKind::FadeIn, &instant, 10.0), 1.0);
    }
}
