//! Tunables for a [`StoriesComposer`](crate::StoriesComposer).
//!
//! Every field has a default, so a JSON document only needs the keys it overrides:
//!
//! ```json
//! { "scorer": { "policy": { "short_phrase_max_words": 5 } } }
//! ```

use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::{CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::foundation::error::{StoryError, StoryResult};

/// Root configuration, validated once when a composer is built.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposerConfig {
    /// Dominant-color extraction.
    pub color: ColorConfig,
    /// Background synthesis.
    pub background: BackgroundConfig,
    /// Text measurement and rendering.
    pub layout: LayoutConfig,
    /// Text placement scoring.
    pub scorer: ScorerConfig,
}

impl ComposerConfig {
    /// Parse a (possibly partial) JSON document.
    pub fn from_json_str(json: &str) -> StoryResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| StoryError::validation(format!("parse composer config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: &Path) -> StoryResult<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read composer config '{}'", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Reject values the pipeline cannot honor.
    pub fn validate(&self) -> StoryResult<()> {
        self.color.validate()?;
        self.background.validate()?;
        self.layout.validate()?;
        self.scorer.validate()
    }
}

/// Which clustering strategy derives dominant colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClustererKind {
    /// k-means with deterministic seeding.
    #[default]
    KMeans,
    /// Median-cut palette quantization.
    Palette,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    /// Number of dominant colors to extract (N).
    pub cluster_count: usize,
    pub clusterer: ClustererKind,
    /// Side of the square analysis copy.
    pub analysis_size: u32,
    /// k-means iteration cap.
    pub max_iterations: u32,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            cluster_count: 3,
            clusterer: ClustererKind::KMeans,
            analysis_size: 150,
            max_iterations: 20,
        }
    }
}

impl ColorConfig {
    fn validate(&self) -> StoryResult<()> {
        if !(1..=16).contains(&self.cluster_count) {
            return Err(StoryError::validation(
                "color.cluster_count must be in 1..=16",
            ));
        }
        if !(8..=512).contains(&self.analysis_size) {
            return Err(StoryError::validation(
                "color.analysis_size must be in 8..=512",
            ));
        }
        if self.max_iterations == 0 {
            return Err(StoryError::validation("color.max_iterations must be > 0"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundConfig {
    /// Anti-banding blur applied to gradients.
    pub gradient_blur_radius: u32,
    /// Per-channel shift for synthesized lighter/darker stops.
    pub stop_delta: i16,
    /// Blur applied to the cover-cropped source.
    pub cover_blur_radius: u32,
    /// Saturation factor for the blurred background, `1.0` keeps it unchanged.
    pub saturation: f32,
    /// Brightness factor for the blurred background, `1.0` keeps it unchanged.
    pub brightness: f32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            gradient_blur_radius: 2,
            stop_delta: 30,
            cover_blur_radius: 15,
            saturation: 0.3,
            brightness: 0.7,
        }
    }
}

impl BackgroundConfig {
    fn validate(&self) -> StoryResult<()> {
        if self.gradient_blur_radius > 64 || self.cover_blur_radius > 256 {
            return Err(StoryError::validation(
                "background blur radii are limited to 64 (gradient) and 256 (cover)",
            ));
        }
        if !(0..=255).contains(&self.stop_delta) {
            return Err(StoryError::validation(
                "background.stop_delta must be in 0..=255",
            ));
        }
        for (name, v) in [
            ("saturation", self.saturation),
            ("brightness", self.brightness),
        ] {
            if !v.is_finite() || !(0.0..=2.0).contains(&v) {
                return Err(StoryError::validation(format!(
                    "background.{name} must be finite and in [0, 2]"
                )));
            }
        }
        Ok(())
    }
}

/// Font size and side margin for one class of overlay text.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextStyle {
    pub font_size_px: f32,
    pub side_margin_px: u32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Style for short phrases.
    pub short: TextStyle,
    /// Style for longer captions.
    pub long: TextStyle,
    /// Extra space added to the font size to get the line height.
    pub leading_px: f32,
    /// Distance from the top edge when placed at [`Region::Top`](crate::Region::Top).
    pub top_offset_px: f32,
    /// Distance from the bottom edge when placed at [`Region::Bottom`](crate::Region::Bottom).
    pub bottom_offset_px: f32,
    pub shadow_offset_px: f32,
    pub shadow_alpha: u8,
    /// Advance per character, in ems, used when no font is available to measure with.
    pub fallback_advance_em: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            short: TextStyle {
                font_size_px: 96.0,
                side_margin_px: 80,
            },
            long: TextStyle {
                font_size_px: 56.0,
                side_margin_px: 120,
            },
            leading_px: 16.0,
            top_offset_px: 180.0,
            bottom_offset_px: 260.0,
            shadow_offset_px: 3.0,
            shadow_alpha: 128,
            fallback_advance_em: 0.55,
        }
    }
}

impl LayoutConfig {
    fn validate(&self) -> StoryResult<()> {
        for (name, style) in [("short", self.short), ("long", self.long)] {
            if !style.font_size_px.is_finite() || style.font_size_px <= 0.0 {
                return Err(StoryError::validation(format!(
                    "layout.{name}.font_size_px must be finite and > 0"
                )));
            }
            if style.side_margin_px.saturating_mul(2) >= CANVAS_WIDTH {
                return Err(StoryError::validation(format!(
                    "layout.{name}.side_margin_px leaves no room for text"
                )));
            }
        }
        for (name, v) in [
            ("leading_px", self.leading_px),
            ("top_offset_px", self.top_offset_px),
            ("bottom_offset_px", self.bottom_offset_px),
            ("shadow_offset_px", self.shadow_offset_px),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(StoryError::validation(format!(
                    "layout.{name} must be finite and >= 0"
                )));
            }
        }
        if !self.fallback_advance_em.is_finite() || self.fallback_advance_em <= 0.0 {
            return Err(StoryError::validation(
                "layout.fallback_advance_em must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Which regions are eligible for which kind of text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionPolicy {
    /// Texts with at most this many words count as short phrases.
    pub short_phrase_max_words: usize,
    /// Restrict short phrases to the Top and Bottom bands.
    pub short_phrases_edges_only: bool,
}

impl Default for RegionPolicy {
    fn default() -> Self {
        Self {
            short_phrase_max_words: 4,
            short_phrases_edges_only: true,
        }
    }
}

impl RegionPolicy {
    /// Return `true` when `text` is a short phrase under this policy.
    pub fn is_short_phrase(&self, text: &str) -> bool {
        text.split_whitespace().count() <= self.short_phrase_max_words
    }
}

/// Per-region multipliers.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionTuning {
    /// Flat preference multiplier.
    pub position_penalty: f32,
    /// How hard person-likelihood is punished in this region.
    pub person_penalty: f32,
}

/// Strictest allowed person vetoes: Top for short phrases, Top for long text, Center.
pub const MAX_PERSON_THRESHOLDS: [f32; 3] = [0.15, 0.2, 0.25];

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScorerConfig {
    pub policy: RegionPolicy,
    pub analysis_width: u32,
    pub analysis_height: u32,
    pub top: RegionTuning,
    pub center: RegionTuning,
    pub bottom: RegionTuning,
    /// Top is vetoed above this person-likelihood for short phrases. May only be lowered.
    pub top_person_threshold_short: f32,
    /// Top is vetoed above this person-likelihood for long text.
    pub top_person_threshold_long: f32,
    /// Center is vetoed above this person-likelihood (long text only).
    pub center_person_threshold: f32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            policy: RegionPolicy::default(),
            analysis_width: 270,
            analysis_height: 480,
            top: RegionTuning {
                position_penalty: 0.9,
                person_penalty: 1.5,
            },
            center: RegionTuning {
                position_penalty: 0.85,
                person_penalty: 1.2,
            },
            bottom: RegionTuning {
                position_penalty: 1.0,
                person_penalty: 1.0,
            },
            top_person_threshold_short: MAX_PERSON_THRESHOLDS[0],
            top_person_threshold_long: MAX_PERSON_THRESHOLDS[1],
            center_person_threshold: MAX_PERSON_THRESHOLDS[2],
        }
    }
}

impl ScorerConfig {
    fn validate(&self) -> StoryResult<()> {
        if self.analysis_width < 3 || self.analysis_height < 3 {
            return Err(StoryError::validation(
                "scorer analysis size must be at least 3x3",
            ));
        }
        if self.analysis_width > CANVAS_WIDTH || self.analysis_height > CANVAS_HEIGHT {
            return Err(StoryError::validation(
                "scorer analysis size must not exceed the canvas",
            ));
        }
        for t in [self.top, self.center, self.bottom] {
            if !t.position_penalty.is_finite()
                || t.position_penalty <= 0.0
                || !t.person_penalty.is_finite()
                || t.person_penalty < 0.0
            {
                return Err(StoryError::validation(
                    "scorer region penalties must be finite (position > 0, person >= 0)",
                ));
            }
        }
        let thresholds = [
            ("top_person_threshold_short", self.top_person_threshold_short),
            ("top_person_threshold_long", self.top_person_threshold_long),
            ("center_person_threshold", self.center_person_threshold),
        ];
        for ((name, v), max) in thresholds.into_iter().zip(MAX_PERSON_THRESHOLDS) {
            if !v.is_finite() || !(0.0..=max).contains(&v) {
                return Err(StoryError::validation(format!(
                    "scorer.{name} must be in [0, {max}]"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ComposerConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg = ComposerConfig::from_json_str(
            r#"{ "scorer": { "policy": { "short_phrase_max_words": 6 } }, "color": { "clusterer": "palette" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.scorer.policy.short_phrase_max_words, 6);
        assert!(cfg.scorer.policy.short_phrases_edges_only);
        assert_eq!(cfg.color.clusterer, ClustererKind::Palette);
        assert_eq!(cfg.color.cluster_count, 3);
        assert_eq!(cfg.layout, LayoutConfig::default());
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        assert!(ComposerConfig::from_json_str(r#"{ "colour": {} }"#).is_err());
        let err = ComposerConfig::from_json_str(r#"{ "color": { "cluster_count": 0 } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("cluster_count"));
        let err = ComposerConfig::from_json_str(
            r#"{ "layout": { "short": { "font_size_px": 96, "side_margin_px": 600 } } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("side_margin_px"));
    }

    #[test]
    fn person_vetoes_cannot_be_loosened() {
        for key in [
            "top_person_threshold_short",
            "top_person_threshold_long",
            "center_person_threshold",
        ] {
            let json = format!(r#"{{ "scorer": {{ "{key}": 1.0 }} }}"#);
            let err = ComposerConfig::from_json_str(&json).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
        assert!(
            ComposerConfig::from_json_str(r#"{ "scorer": { "top_person_threshold_long": 0.21 } }"#)
                .is_err()
        );
        assert!(ComposerConfig::from_json_str(r#"{ "scorer": { "person_weights": {} } }"#).is_err());

        let stricter =
            ComposerConfig::from_json_str(r#"{ "scorer": { "center_person_threshold": 0.1 } }"#)
                .unwrap();
        assert_eq!(stricter.scorer.center_person_threshold, 0.1);
    }

    #[test]
    fn short_phrase_policy_counts_words() {
        let p = RegionPolicy::default();
        assert!(p.is_short_phrase("Lidere pelo exemplo"));
        assert!(p.is_short_phrase("  um  dois três quatro "));
        assert!(!p.is_short_phrase("um dois três quatro cinco"));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.json");
        std::fs::write(&path, r#"{ "background": { "cover_blur_radius": 20 } }"#).unwrap();
        let cfg = ComposerConfig::from_path(&path).unwrap();
        assert_eq!(cfg.background.cover_blur_radius, 20);

        assert!(ComposerConfig::from_path(&dir.path().join("missing.json")).is_err());
    }
}
