//! Text placement scoring.
//!
//! The canvas is split into three horizontal bands. Each candidate band gets a "safe for text"
//! score from cheap image statistics, discounted by a heuristic estimate of how likely the band
//! shows a person. All statistics are computed on a fixed-size analysis copy, so the cost does
//! not depend on the source resolution.

use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::config::{RegionTuning, ScorerConfig};
use crate::foundation::core::{CANVAS_HEIGHT, CANVAS_WIDTH, StoryCanvas};

/// Horizontal band of the canvas considered for the overlay text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Top,
    Center,
    Bottom,
}

impl Region {
    /// All regions, top to bottom.
    pub const ALL: [Region; 3] = [Region::Top, Region::Center, Region::Bottom];

    /// Rows `[start, end)` of a raster `height` pixels tall covered by this band.
    pub fn rows(self, height: u32) -> (u32, u32) {
        let third = height / 3;
        match self {
            Region::Top => (0, third),
            Region::Center => (third, 2 * third),
            Region::Bottom => (2 * third, height),
        }
    }

    /// Band bounds in canvas coordinates.
    pub fn bounds(self) -> kurbo::Rect {
        let (y0, y1) = self.rows(CANVAS_HEIGHT);
        kurbo::Rect::new(0.0, f64::from(y0), f64::from(CANVAS_WIDTH), f64::from(y1))
    }

    /// Tie-break preference: Bottom beats Center beats Top.
    fn tie_rank(self) -> u8 {
        match self {
            Region::Top => 0,
            Region::Center => 1,
            Region::Bottom => 2,
        }
    }
}

/// Raw per-band measurements.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct BandSignals {
    /// Mean per-channel variance normalized to `[0, 1]`; lower is calmer.
    pub variance: f32,
    /// `1 / distinct colors` at 3 bits per channel; higher is flatter.
    pub uniformity: f32,
    /// Mean absolute luma gradient normalized to `[0, 1]`.
    pub edge_density: f32,
    /// Fraction of pixels passing the skin-tone rule.
    pub skin_ratio: f32,
    /// Luma standard deviation mapped to `[0, 1]`.
    pub brightness_variance: f32,
    /// Share of strong edges that are diagonal (curved contours), scaled by edge presence.
    pub circularity: f32,
    /// Blended person estimate in `[0, 1]`.
    pub person_likelihood: f32,
}

/// Score of one candidate region.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct RegionScore {
    pub region: Region,
    /// Band in canvas coordinates.
    pub bounds: kurbo::Rect,
    pub signals: BandSignals,
    /// Complexity-only score before position and person penalties.
    pub base_score: f32,
    pub final_score: f32,
}

/// Why the highest-scoring region was replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideReason {
    /// The text block is taller than the winning band.
    TextTooTall,
    /// Top won but likely shows a person.
    PersonInTop,
    /// Center won but likely shows a person.
    PersonInCenter,
}

/// Outcome of [`RegionScorer::score`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RegionDecision {
    /// Region to place the text in.
    pub chosen: Region,
    /// Region with the best score, before safety overrides.
    pub best_scored: Region,
    pub override_reason: Option<OverrideReason>,
    /// One entry per candidate, top to bottom.
    pub scores: Vec<RegionScore>,
}

impl RegionDecision {
    /// Score entry for `region`, if it was a candidate.
    pub fn score_for(&self, region: Region) -> Option<&RegionScore> {
        self.scores.iter().find(|s| s.region == region)
    }
}

/// Gradient magnitude (luma units) above which a pixel counts as an edge.
const EDGE_THRESHOLD: f32 = 24.0;
/// Luma standard deviation mapped to a brightness-variance score of 1.
const BRIGHTNESS_STD_SCALE: f32 = 64.0;
/// Person-likelihood blend weights: skin ratio, brightness variance, circularity.
const PERSON_WEIGHTS: [f32; 3] = [0.6, 0.2, 0.2];

/// Chooses the band for the overlay text. Stateless apart from its configuration.
#[derive(Clone, Debug, Default)]
pub struct RegionScorer {
    cfg: ScorerConfig,
}

impl RegionScorer {
    pub fn new(cfg: ScorerConfig) -> Self {
        Self { cfg }
    }

    /// Candidate regions for `text` under the configured policy.
    pub fn candidates(&self, text: &str) -> &'static [Region] {
        if self.cfg.policy.short_phrases_edges_only && self.cfg.policy.is_short_phrase(text) {
            &[Region::Top, Region::Bottom]
        } else {
            &Region::ALL
        }
    }

    /// Score the candidate bands of `canvas` and pick one for `text`, whose rendered block is
    /// `text_height` canvas pixels tall.
    #[tracing::instrument(skip(self, canvas, text))]
    pub fn score(&self, canvas: &StoryCanvas, text: &str, text_height: f32) -> RegionDecision {
        let analysis = imageops::resize(
            canvas.as_image(),
            self.cfg.analysis_width,
            self.cfg.analysis_height,
            FilterType::Triangle,
        );
        let luma = luma_plane(&analysis);

        let scores: Vec<RegionScore> = self
            .candidates(text)
            .iter()
            .map(|&region| {
                let signals = self.band_signals(&analysis, &luma, region);
                let base_score = base_score(&signals);
                let tuning = self.tuning(region);
                let person_factor =
                    (1.0 - signals.person_likelihood * tuning.person_penalty).max(0.0);
                RegionScore {
                    region,
                    bounds: region.bounds(),
                    signals,
                    base_score,
                    final_score: base_score * tuning.position_penalty * person_factor,
                }
            })
            .collect();

        let best = scores
            .iter()
            .max_by(|a, b| {
                a.final_score
                    .total_cmp(&b.final_score)
                    .then(a.region.tie_rank().cmp(&b.region.tie_rank()))
            })
            .copied();
        let Some(best) = best else {
            return RegionDecision {
                chosen: Region::Bottom,
                best_scored: Region::Bottom,
                override_reason: None,
                scores,
            };
        };

        let short = self.cfg.policy.is_short_phrase(text);
        let override_reason = self.safety_override(&best, short, text_height);
        let chosen = if override_reason.is_some() {
            Region::Bottom
        } else {
            best.region
        };

        tracing::debug!(
            ?chosen,
            best = ?best.region,
            ?override_reason,
            person = best.signals.person_likelihood,
            "text region decided"
        );
        RegionDecision {
            chosen,
            best_scored: best.region,
            override_reason,
            scores,
        }
    }

    fn safety_override(
        &self,
        best: &RegionScore,
        short: bool,
        text_height: f32,
    ) -> Option<OverrideReason> {
        if best.region == Region::Bottom {
            return None;
        }
        if f64::from(text_height) > best.bounds.height() {
            return Some(OverrideReason::TextTooTall);
        }
        let person = best.signals.person_likelihood;
        match best.region {
            Region::Top => {
                let limit = if short {
                    self.cfg.top_person_threshold_short
                } else {
                    self.cfg.top_person_threshold_long
                };
                (person > limit).then_some(OverrideReason::PersonInTop)
            }
            Region::Center => (person > self.cfg.center_person_threshold)
                .then_some(OverrideReason::PersonInCenter),
            Region::Bottom => None,
        }
    }

    fn tuning(&self, region: Region) -> RegionTuning {
        match region {
            Region::Top => self.cfg.top,
            Region::Center => self.cfg.center,
            Region::Bottom => self.cfg.bottom,
        }
    }

    /// Measure one band of the analysis raster in a single pass. `luma` is
    /// [`luma_plane`] of `analysis`.
    pub(crate) fn band_signals(
        &self,
        analysis: &RgbImage,
        luma: &[f32],
        region: Region,
    ) -> BandSignals {
        let (w, h) = analysis.dimensions();
        debug_assert_eq!(luma.len(), (w as usize) * (h as usize));
        let (y0, y1) = region.rows(h);
        let n = (w as usize) * ((y1 - y0) as usize);
        if n == 0 {
            return BandSignals::default();
        }

        let raw = analysis.as_raw();
        let wu = w as usize;
        let mut sum = [0f64; 3];
        let mut sum_sq = [0f64; 3];
        let mut seen = [false; 512];
        let mut distinct = 0u32;
        let mut skin = 0u32;
        let mut luma_sum = 0f64;
        let mut luma_sq = 0f64;
        let mut grad_sum = 0f64;
        let mut edges = 0u32;
        let mut diagonal_edges = 0u32;

        for y in y0..y1 {
            let row = y as usize * wu;
            for x in 0..wu {
                let i = row + x;
                let px = &raw[i * 3..i * 3 + 3];
                for c in 0..3 {
                    let v = f64::from(px[c]);
                    sum[c] += v;
                    sum_sq[c] += v * v;
                }

                let bin = (usize::from(px[0] >> 5) << 6)
                    | (usize::from(px[1] >> 5) << 3)
                    | usize::from(px[2] >> 5);
                if !seen[bin] {
                    seen[bin] = true;
                    distinct += 1;
                }

                if is_skin(px[0], px[1], px[2]) {
                    skin += 1;
                }

                let l = luma[i];
                luma_sum += f64::from(l);
                luma_sq += f64::from(l) * f64::from(l);

                // Forward differences, clamped to the band so bands stay independent.
                let gx = if x + 1 < wu { luma[i + 1] - l } else { 0.0 };
                let gy = if y + 1 < y1 { luma[i + wu] - l } else { 0.0 };
                grad_sum += f64::from((gx.abs() + gy.abs()) * 0.5);

                let (ax, ay) = (gx.abs(), gy.abs());
                if (ax * ax + ay * ay).sqrt() > EDGE_THRESHOLD {
                    edges += 1;
                    if ax.min(ay) > 0.4 * ax.max(ay) {
                        diagonal_edges += 1;
                    }
                }
            }
        }

        let nf = n as f64;
        let variance = (0..3)
            .map(|c| {
                let mean = sum[c] / nf;
                (sum_sq[c] / nf - mean * mean).max(0.0)
            })
            .sum::<f64>()
            / 3.0
            / (127.5 * 127.5);

        let luma_mean = luma_sum / nf;
        let luma_std = (luma_sq / nf - luma_mean * luma_mean).max(0.0).sqrt() as f32;

        let skin_ratio = skin as f32 / n as f32;
        let brightness_variance = (luma_std / BRIGHTNESS_STD_SCALE).min(1.0);
        let circularity = if edges == 0 {
            0.0
        } else {
            let edge_fraction = edges as f32 / n as f32;
            (diagonal_edges as f32 / edges as f32) * (edge_fraction * 4.0).min(1.0)
        };

        let person_likelihood = person_likelihood(skin_ratio, brightness_variance, circularity);

        BandSignals {
            variance: variance.min(1.0) as f32,
            uniformity: 1.0 / distinct.max(1) as f32,
            edge_density: ((grad_sum / nf) / 255.0) as f32,
            skin_ratio,
            brightness_variance,
            circularity,
            person_likelihood,
        }
    }
}

/// Complexity-only score: calm, flat, edge-free bands score highest.
pub fn base_score(signals: &BandSignals) -> f32 {
    (1.0 / (signals.variance + 1.0))
        * signals.uniformity
        * (1.0 / (signals.edge_density + 1.0))
}

/// Blend of the three person signals, clamped to `[0, 1]`.
pub fn person_likelihood(skin_ratio: f32, brightness_variance: f32, circularity: f32) -> f32 {
    let [ws, wb, wc] = PERSON_WEIGHTS;
    (ws * skin_ratio + wb * brightness_variance + wc * circularity).clamp(0.0, 1.0)
}

/// Empirical RGB skin-tone rule.
pub fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    r > 95 && g > 40 && b > 20 && (max - min) > 15 && r > g && r > b
}

/// Rec. 601 luma for every pixel, row-major.
pub fn luma_plane(img: &RgbImage) -> Vec<f32> {
    img.as_raw()
        .chunks_exact(3)
        .map(|p| 0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::ColorRgb;

    const SKIN: [u8; 3] = [224, 172, 140];
    const SHORT: &str = "Lidere pelo exemplo";
    const LONG: &str = "um dois três quatro cinco seis sete oito";

    fn canvas_from(f: impl Fn(u32, u32) -> [u8; 3]) -> StoryCanvas {
        let img = RgbImage::from_fn(CANVAS_WIDTH, CANVAS_HEIGHT, |x, y| image::Rgb(f(x, y)));
        StoryCanvas::from_image(img).unwrap()
    }

    fn hash(x: u32, y: u32) -> u32 {
        let mut v = x.wrapping_mul(0x9E37_79B9) ^ y.wrapping_mul(0x85EB_CA6B);
        v ^= v >> 15;
        v = v.wrapping_mul(0x2C1B_3C6D);
        v ^ (v >> 12)
    }

    /// Blue-green noise in 8x8 blocks; never passes the skin rule (R is never the max).
    fn noise(x: u32, y: u32) -> [u8; 3] {
        let v = hash(x / 8, y / 8);
        [(v & 0x3f) as u8, (v >> 8) as u8, (v >> 16) as u8 | 0x80]
    }

    #[test]
    fn skin_rule_matches_reference_examples() {
        assert!(is_skin(224, 172, 140));
        assert!(is_skin(141, 85, 36));
        assert!(!is_skin(90, 60, 40));
        assert!(!is_skin(200, 200, 200));
        assert!(!is_skin(20, 40, 220));
    }

    #[test]
    fn candidate_sets_follow_word_count() {
        let scorer = RegionScorer::default();
        assert_eq!(scorer.candidates(SHORT), &[Region::Top, Region::Bottom]);
        assert_eq!(scorer.candidates(LONG), &Region::ALL);

        let mut cfg = ScorerConfig::default();
        cfg.policy.short_phrases_edges_only = false;
        assert_eq!(RegionScorer::new(cfg).candidates(SHORT), &Region::ALL);
    }

    #[test]
    fn flat_canvas_ties_break_to_bottom() {
        let mut cfg = ScorerConfig::default();
        for t in [&mut cfg.top, &mut cfg.center, &mut cfg.bottom] {
            t.position_penalty = 1.0;
        }
        let scorer = RegionScorer::new(cfg);
        let canvas = StoryCanvas::filled(ColorRgb::new(30, 60, 90));
        let d = scorer.score(&canvas, LONG, 100.0);
        assert_eq!(d.scores.len(), 3);
        assert_eq!(d.best_scored, Region::Bottom);
        assert_eq!(d.chosen, Region::Bottom);
        assert!(d.override_reason.is_none());
    }

    #[test]
    fn calm_top_beats_busy_bottom() {
        let canvas = canvas_from(|x, y| {
            if y < 700 {
                [20, 40, 80]
            } else {
                noise(x, y)
            }
        });
        let d = RegionScorer::default().score(&canvas, SHORT, 120.0);
        assert_eq!(d.chosen, Region::Top);
        let top = d.score_for(Region::Top).unwrap();
        let bottom = d.score_for(Region::Bottom).unwrap();
        assert!(top.final_score > bottom.final_score);
        assert!(top.signals.variance < bottom.signals.variance);
        assert!(top.signals.edge_density < bottom.signals.edge_density);
        assert_eq!(top.signals.uniformity, 1.0);
    }

    #[test]
    fn skin_heavy_calm_top_is_vetoed() {
        let canvas = canvas_from(|x, y| if y < 640 { SKIN } else { noise(x, y) });
        for text in [SHORT, LONG] {
            let d = RegionScorer::default().score(&canvas, text, 100.0);
            let top = d.score_for(Region::Top).unwrap();
            assert!(top.signals.skin_ratio > 0.95);
            assert!(top.signals.person_likelihood > 0.2);
            assert_ne!(d.chosen, Region::Top, "text {text:?}");
        }
    }

    #[test]
    fn tall_text_forces_bottom() {
        let canvas = canvas_from(|x, y| {
            if y < 700 {
                [20, 40, 80]
            } else {
                noise(x, y)
            }
        });
        let d = RegionScorer::default().score(&canvas, SHORT, 700.0);
        assert_eq!(d.best_scored, Region::Top);
        assert_eq!(d.chosen, Region::Bottom);
        assert_eq!(d.override_reason, Some(OverrideReason::TextTooTall));
    }

    #[test]
    fn scoring_is_deterministic() {
        let canvas = canvas_from(|x, y| {
            if (x / 40 + y / 40) % 3 == 0 {
                SKIN
            } else {
                noise(x, y)
            }
        });
        let scorer = RegionScorer::default();
        let a = scorer.score(&canvas, LONG, 200.0);
        let b = scorer.score(&canvas, LONG, 200.0);
        assert_eq!(a, b);
    }

    #[test]
    fn skinless_high_contrast_band_still_counts_toward_person() {
        // Gray diagonal stripes: no skin, strong contrast, mostly diagonal edges.
        let canvas = canvas_from(|x, y| {
            if y < 640 && ((x + y) / 32) % 2 == 0 {
                [240, 240, 240]
            } else if y < 640 {
                [15, 15, 15]
            } else {
                [20, 40, 80]
            }
        });
        let scorer = RegionScorer::default();
        let analysis = imageops::resize(canvas.as_image(), 270, 480, FilterType::Triangle);
        let luma = luma_plane(&analysis);
        let s = scorer.band_signals(&analysis, &luma, Region::Top);

        assert_eq!(s.skin_ratio, 0.0);
        assert!(s.brightness_variance > 0.9);
        assert!(s.circularity > 0.5);
        let blended = 0.2 * s.brightness_variance + 0.2 * s.circularity;
        assert!((s.person_likelihood - blended).abs() < 1e-5);
        assert!(s.person_likelihood > 0.2);

        let d = scorer.score(&canvas, LONG, 100.0);
        assert_ne!(d.chosen, Region::Top);
    }

    #[test]
    #[should_panic]
    fn band_signals_require_matching_luma_plane() {
        let analysis = RgbImage::from_pixel(8, 9, image::Rgb(SKIN));
        RegionScorer::default().band_signals(&analysis, &[], Region::Center);
    }

    #[test]
    fn person_blend_is_weighted_and_clamped() {
        assert_eq!(person_likelihood(0.0, 0.0, 0.0), 0.0);
        assert!((person_likelihood(1.0, 0.0, 0.0) - 0.6).abs() < 1e-6);
        assert!((person_likelihood(0.5, 1.0, 0.5) - 0.6).abs() < 1e-6);
        assert_eq!(person_likelihood(1.0, 1.0, 1.0), 1.0);
    }

    /// Noise at the edges and a flat skin-colored Center slightly wider than its band.
    fn skin_center_canvas() -> StoryCanvas {
        canvas_from(|x, y| {
            if (600..1320).contains(&y) {
                SKIN
            } else {
                noise(x, y)
            }
        })
    }

    #[test]
    fn skin_heavy_center_winner_is_vetoed_for_long_text() {
        let d = RegionScorer::default().score(&skin_center_canvas(), LONG, 200.0);
        let center = d.score_for(Region::Center).unwrap();
        assert!(center.signals.person_likelihood > 0.25);
        assert_eq!(d.best_scored, Region::Center);
        assert_eq!(d.chosen, Region::Bottom);
        assert_eq!(d.override_reason, Some(OverrideReason::PersonInCenter));
    }

    #[test]
    fn short_phrase_never_considers_center() {
        let d = RegionScorer::default().score(&skin_center_canvas(), SHORT, 100.0);
        assert!(d.score_for(Region::Center).is_none());
        assert_eq!(d.scores.len(), 2);
        assert_ne!(d.chosen, Region::Center);
    }

    #[test]
    fn region_rows_partition_the_canvas() {
        assert_eq!(Region::Top.rows(1920), (0, 640));
        assert_eq!(Region::Center.rows(1920), (640, 1280));
        assert_eq!(Region::Bottom.rows(1920), (1280, 1920));
        assert_eq!(Region::Bottom.rows(480), (320, 480));
        assert_eq!(Region::Center.bounds().height(), 640.0);
    }
}
