//! Pixel-level analysis: template matching, colour classification and the
//! eidolon icon heuristics.

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbaImage};
use imageproc::filter::laplacian_filter;
use imageproc::template_matching::{MatchTemplateMethod, match_template};

/// Confidence for lock and discard icons. Low because the icon is tiny and
/// sits on a textured panel.
pub const ICON_CONFIDENCE: f32 = 0.1;

/// Confidence for the trailblazer portrait check.
pub const PORTRAIT_CONFIDENCE: f32 = 0.8;

/// Reference colours of the relic rarity strip, indexed by `rarity - 1`.
const RARITY_COLOURS: [[u8; 3]; 5] = [
    [94, 97, 111],
    [74, 100, 121],
    [61, 90, 145],
    [101, 92, 142],
    [158, 109, 95],
];

/// Below this Laplacian variance an eidolon icon is the dark locked variant.
const EIDOLON_SHARPNESS_MIN: f64 = 10_000.0;
/// Above this many orange pixels the eidolon is unlocked but not activated.
const EIDOLON_ORANGE_MAX: usize = 200;
const ORANGE_LOW: [u8; 3] = [127, 104, 51];
const ORANGE_HIGH: [u8; 3] = [210, 175, 100];

/// Best match position and its normalised correlation score in `-1.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchScore {
    pub score: f32,
    pub x: u32,
    pub y: u32,
}

/// Template matching primitive.
pub trait TemplateMatcher: Send + Sync {
    /// Best position of `needle` inside `haystack`, or `None` when the needle
    /// does not fit.
    fn best_match(&self, haystack: &GrayImage, needle: &GrayImage) -> Option<MatchScore>;

    /// Best match if it reaches `confidence`.
    fn locate(&self, haystack: &GrayImage, needle: &GrayImage, confidence: f32) -> Option<MatchScore> {
        self.best_match(haystack, needle)
            .filter(|m| m.score >= confidence)
    }
}

/// Normalised cross-correlation.
///
/// Same-sized images (portraits, avatars) are compared with the zero-mean
/// correlation coefficient. Larger haystacks are searched with imageproc's
/// normalised cross-correlation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NccMatcher;

impl TemplateMatcher for NccMatcher {
    fn best_match(&self, haystack: &GrayImage, needle: &GrayImage) -> Option<MatchScore> {
        let (hw, hh) = haystack.dimensions();
        let (nw, nh) = needle.dimensions();
        if nw == 0 || nh == 0 || nw > hw || nh > hh {
            return None;
        }

        if (nw, nh) == (hw, hh) {
            return Some(MatchScore {
                score: correlation_coefficient(haystack, needle),
                x: 0,
                y: 0,
            });
        }

        let scores = match_template(
            haystack,
            needle,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        // Flat windows have no norm and score NaN.
        scores
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0].is_finite())
            .max_by(|a, b| a.2[0].total_cmp(&b.2[0]))
            .map(|(x, y, p)| MatchScore { score: p[0], x, y })
    }
}

fn correlation_coefficient(a: &GrayImage, b: &GrayImage) -> f32 {
    let n = (a.width() * a.height()) as f64;
    let mean = |img: &GrayImage| img.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    let (mean_a, mean_b) = (mean(a), mean(b));

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        let da = pa[0] as f64 - mean_a;
        let db = pb[0] as f64 - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    (cov / (var_a.sqrt() * var_b.sqrt())) as f32
}

/// Squared RGB distance.
pub fn colour_dist2(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&x, y)| {
            let d = x as i32 - y as i32;
            (d * d) as u32
        })
        .sum()
}

/// Relic rarity (1..=5) from the colour of the rarity strip.
pub fn rarity_from_colour(pixel: Rgb<u8>) -> u8 {
    let mut best = (u32::MAX, 0);
    for (i, colour) in RARITY_COLOURS.iter().enumerate() {
        let dist = colour_dist2(pixel.0, *colour);
        if dist < best.0 {
            best = (dist, i);
        }
    }
    best.1 as u8 + 1
}

/// Centre pixel of a capture.
pub fn centre_pixel(img: &RgbaImage) -> Option<Rgb<u8>> {
    if img.width() == 0 || img.height() == 0 {
        return None;
    }
    let p = img.get_pixel(img.width() / 2, img.height() / 2);
    Some(Rgb([p[0], p[1], p[2]]))
}

/// Whether a small status icon (lock, discard) is present in `region`.
///
/// The icon is scaled to the region's smaller dimension before matching so
/// the same template serves every resolution.
pub fn icon_present(matcher: &dyn TemplateMatcher, region: &RgbaImage, icon: &GrayImage) -> bool {
    let size = region.width().min(region.height());
    if size == 0 {
        return false;
    }
    let haystack = imageops::grayscale(region);
    let needle = imageops::resize(icon, size, size, FilterType::Triangle);
    matcher.locate(&haystack, &needle, ICON_CONFIDENCE).is_some()
}

/// Correlation of `capture` against `reference` after scaling the reference
/// to the capture's size.
pub fn similarity(matcher: &dyn TemplateMatcher, capture: &GrayImage, reference: &GrayImage) -> f32 {
    let (w, h) = capture.dimensions();
    if w == 0 || h == 0 {
        return f32::MIN;
    }
    let scaled = imageops::resize(reference, w, h, FilterType::Triangle);
    matcher
        .best_match(capture, &scaled)
        .map_or(f32::MIN, |m| m.score)
}

/// State of one eidolon icon on the eidolon screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EidolonState {
    Locked,
    /// Unlocked in the tree but not yet activated.
    Inactive,
    Active,
}

pub fn eidolon_state(icon: &RgbaImage) -> EidolonState {
    if icon.width() == 0 || icon.height() == 0 {
        return EidolonState::Locked;
    }

    let gray = imageops::grayscale(icon);
    if laplacian_variance(&gray) < EIDOLON_SHARPNESS_MIN {
        return EidolonState::Locked;
    }

    let orange = icon
        .pixels()
        .filter(|p| (0..3).all(|c| (ORANGE_LOW[c]..=ORANGE_HIGH[c]).contains(&p[c])))
        .count();
    if orange > EIDOLON_ORANGE_MAX {
        return EidolonState::Inactive;
    }

    EidolonState::Active
}

/// Number of leading active eidolons.
pub fn count_eidolons<'a>(icons: impl IntoIterator<Item = &'a RgbaImage>) -> u32 {
    icons
        .into_iter()
        .take_while(|icon| eidolon_state(icon) == EidolonState::Active)
        .count() as u32
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let lap = laplacian_filter(gray);
    let n = (lap.width() * lap.height()) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = lap.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    lap.pixels()
        .map(|p| {
            let d = p[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}
