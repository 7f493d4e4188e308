//! Approximate template search over a raw screen capture.
//!
//! Exhaustive per-pixel comparison across a full screen is too slow for a
//! replay loop, so the matcher samples a fixed set of template offsets,
//! scans the screen on a coarse grid, and refines locally around promising
//! candidates. The first candidate whose refined score clears the requested
//! confidence wins.

use marionette_core::types::Capture;

/// Upper bound on the number of sampled template offsets per candidate.
const MAX_SAMPLES: usize = 100;

/// A sample point matches when its per-channel absolute differences, summed
/// over at most three channels, stay below this.
const CHANNEL_TOLERANCE: u32 = 30;

/// A successful match in source (physical) pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub x: u32,
    pub y: u32,
    /// Fraction of sample points within tolerance, in `[0, 1]`.
    pub score: f32,
}

/// Coarse scan step for a template of the given dimensions.
pub fn scan_step(template_w: u32, template_h: u32) -> u32 {
    (template_w.min(template_h) / 12).clamp(1, 8)
}

/// Deterministic sample offsets inside the template, spread evenly across
/// the pixel grid in row-major order. Reproducible across runs by
/// construction; no randomness involved.
fn sample_offsets(template_w: u32, template_h: u32) -> Vec<(u32, u32)> {
    let total = (template_w as usize) * (template_h as usize);
    let count = total.min(MAX_SAMPLES);
    let stride = (total / count).max(1);

    (0..count)
        .map(|k| {
            let idx = (k * stride) % total;
            ((idx % template_w as usize) as u32, (idx / template_w as usize) as u32)
        })
        .collect()
}

/// Fraction of sample offsets whose pixels match within tolerance when the
/// template's top-left corner is placed at `(x, y)` on the screen.
fn score_at(
    screen: &Capture,
    template: &Capture,
    samples: &[(u32, u32)],
    x: u32,
    y: u32,
) -> f32 {
    let channels = screen.channels.min(template.channels).min(3) as usize;
    let sc = screen.channels as usize;
    let tc = template.channels as usize;
    let sw = screen.width as usize;
    let tw = template.width as usize;

    let mut hits = 0usize;
    for &(dx, dy) in samples {
        let s_idx = ((y + dy) as usize * sw + (x + dx) as usize) * sc;
        let t_idx = (dy as usize * tw + dx as usize) * tc;

        let mut diff = 0u32;
        for c in 0..channels {
            let s = screen.pixels[s_idx + c] as i32;
            let t = template.pixels[t_idx + c] as i32;
            diff += s.abs_diff(t);
        }
        if diff < CHANNEL_TOLERANCE {
            hits += 1;
        }
    }

    hits as f32 / samples.len() as f32
}

/// Re-check every position in a `[-step, +step]` neighborhood of the
/// candidate and return the best.
fn refine(
    screen: &Capture,
    template: &Capture,
    samples: &[(u32, u32)],
    candidate: Match,
    step: u32,
    max_x: u32,
    max_y: u32,
) -> Match {
    let mut best = candidate;
    let x0 = candidate.x.saturating_sub(step);
    let y0 = candidate.y.saturating_sub(step);
    let x1 = (candidate.x + step).min(max_x);
    let y1 = (candidate.y + step).min(max_y);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let score = score_at(screen, template, samples, x, y);
            if score > best.score {
                best = Match { x, y, score };
            }
        }
    }
    best
}

/// Search `screen` for `template`.
///
/// Returns the first refined position whose score clears
/// `confidence_threshold`, or the refined best-of-scan if that clears it,
/// or `None`. Coordinates are in source pixels; callers working in logical
/// coordinates divide by the display's scale factor.
pub fn match_template(
    screen: &Capture,
    template: &Capture,
    confidence_threshold: f32,
) -> Option<Match> {
    if template.width == 0
        || template.height == 0
        || template.width > screen.width
        || template.height > screen.height
    {
        return None;
    }

    let samples = sample_offsets(template.width, template.height);
    let step = scan_step(template.width, template.height);
    let max_x = screen.width - template.width;
    let max_y = screen.height - template.height;

    let mut best: Option<Match> = None;

    let mut y = 0;
    while y <= max_y {
        let mut x = 0;
        while x <= max_x {
            let score = score_at(screen, template, &samples, x, y);
            let candidate = Match { x, y, score };

            if best.map_or(true, |b| score > b.score) {
                best = Some(candidate);
            }

            // First good-enough match wins after local refinement.
            if score >= confidence_threshold {
                let refined =
                    refine(screen, template, &samples, candidate, step, max_x, max_y);
                if refined.score >= confidence_threshold {
                    return Some(refined);
                }
                if best.map_or(true, |b| refined.score > b.score) {
                    best = Some(refined);
                }
            }

            x += step;
        }
        y += step;
    }

    // Nothing cleared during the scan; give the single best candidate one
    // refinement pass and accept it only if it clears the threshold.
    let refined = refine(screen, template, &samples, best?, step, max_x, max_y);
    (refined.score >= confidence_threshold).then_some(refined)
}
