use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::config::{ClustererKind, ColorConfig};
use crate::foundation::core::{ColorRgb, DegradedFlag, DegradedFlags};
use crate::foundation::error::{StoryError, StoryResult};

/// Strategy that reduces a pixel population to `k` representative colors.
pub trait ColorClusterer: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Return exactly `k` colors ordered by population, largest first.
    fn cluster(&self, pixels: &[[u8; 3]], k: usize) -> StoryResult<Vec<ColorRgb>>;
}

/// Lloyd's k-means with farthest-point seeding from the middle pixel.
///
/// Seeding uses no randomness, so identical input always yields identical centroids.
#[derive(Clone, Copy, Debug)]
pub struct KMeansClusterer {
    pub max_iterations: u32,
}

impl Default for KMeansClusterer {
    fn default() -> Self {
        Self { max_iterations: 20 }
    }
}

impl ColorClusterer for KMeansClusterer {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn cluster(&self, pixels: &[[u8; 3]], k: usize) -> StoryResult<Vec<ColorRgb>> {
        validate_input(pixels, k)?;

        let points: Vec<[f32; 3]> = pixels
            .iter()
            .map(|p| [f32::from(p[0]), f32::from(p[1]), f32::from(p[2])])
            .collect();

        let mut centroids = seed_centroids(&points, k);
        let mut assignment = vec![usize::MAX; points.len()];
        let mut counts = vec![0usize; k];

        for iter in 0..self.max_iterations {
            let mut changed = false;
            let mut sums = vec![[0.0f64; 3]; k];
            counts.fill(0);

            for (i, p) in points.iter().enumerate() {
                let c = nearest(p, &centroids);
                if assignment[i] != c {
                    assignment[i] = c;
                    changed = true;
                }
                counts[c] += 1;
                for ch in 0..3 {
                    sums[c][ch] += f64::from(p[ch]);
                }
            }

            for (ci, centroid) in centroids.iter_mut().enumerate() {
                if counts[ci] == 0 {
                    continue;
                }
                let n = counts[ci] as f64;
                for ch in 0..3 {
                    centroid[ch] = (sums[ci][ch] / n) as f32;
                }
            }

            if !changed {
                tracing::trace!(iterations = iter + 1, "k-means converged");
                break;
            }
        }

        if centroids.iter().flatten().any(|v| !v.is_finite()) {
            return Err(StoryError::validation("k-means produced a non-finite centroid"));
        }

        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| counts[b].cmp(&counts[a]));
        Ok(order
            .into_iter()
            .map(|i| {
                let c = centroids[i];
                ColorRgb::new(to_u8(c[0]), to_u8(c[1]), to_u8(c[2]))
            })
            .collect())
    }
}

fn seed_centroids(points: &[[f32; 3]], k: usize) -> Vec<[f32; 3]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[points.len() / 2]);

    while centroids.len() < k {
        let (mut best_dist, mut best_idx) = (0.0f32, 0usize);
        for (i, p) in points.iter().enumerate() {
            let d = centroids
                .iter()
                .map(|c| dist_sq(p, c))
                .fold(f32::MAX, f32::min);
            if d > best_dist {
                best_dist = d;
                best_idx = i;
            }
        }
        centroids.push(points[best_idx]);
    }
    centroids
}

fn nearest(p: &[f32; 3], centroids: &[[f32; 3]]) -> usize {
    let mut best = 0usize;
    let mut best_d = f32::MAX;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(p, c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

fn dist_sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Median-cut palette quantization.
#[derive(Clone, Copy, Debug, Default)]
pub struct PaletteQuantizer;

impl ColorClusterer for PaletteQuantizer {
    fn name(&self) -> &'static str {
        "palette"
    }

    fn cluster(&self, pixels: &[[u8; 3]], k: usize) -> StoryResult<Vec<ColorRgb>> {
        validate_input(pixels, k)?;

        let mut boxes: Vec<Vec<[u8; 3]>> = vec![pixels.to_vec()];
        while boxes.len() < k {
            let candidate = boxes
                .iter()
                .enumerate()
                .filter(|(_, b)| b.len() >= 2)
                .map(|(i, b)| {
                    let (ch, range) = widest_channel(b);
                    (i, ch, range)
                })
                .filter(|&(_, _, range)| range > 0)
                .max_by(|a, b| a.2.cmp(&b.2).then(b.0.cmp(&a.0)));
            let Some((idx, ch, _)) = candidate else {
                break;
            };

            let mut bx = boxes.swap_remove(idx);
            bx.sort_unstable_by_key(|p| (p[ch], p[0], p[1], p[2]));
            let upper = bx.split_off(bx.len() / 2);
            boxes.push(bx);
            boxes.push(upper);
        }

        boxes.sort_by(|a, b| b.len().cmp(&a.len()));
        let mut colors: Vec<ColorRgb> = boxes.iter().map(|b| mean_color(b)).collect();
        // Fewer distinct colors than requested: repeat the most populous ones.
        let distinct = colors.len();
        for i in 0..k.saturating_sub(distinct) {
            colors.push(colors[i % distinct]);
        }
        Ok(colors)
    }
}

fn widest_channel(pixels: &[[u8; 3]]) -> (usize, u8) {
    let mut lo = [u8::MAX; 3];
    let mut hi = [u8::MIN; 3];
    for p in pixels {
        for ch in 0..3 {
            lo[ch] = lo[ch].min(p[ch]);
            hi[ch] = hi[ch].max(p[ch]);
        }
    }
    (0..3)
        .map(|ch| (ch, hi[ch] - lo[ch]))
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .unwrap_or((0, 0))
}

fn mean_color(pixels: &[[u8; 3]]) -> ColorRgb {
    let n = pixels.len().max(1) as u64;
    let mut sum = [0u64; 3];
    for p in pixels {
        for ch in 0..3 {
            sum[ch] += u64::from(p[ch]);
        }
    }
    let avg = |s: u64| ((s + n / 2) / n).min(255) as u8;
    ColorRgb::new(avg(sum[0]), avg(sum[1]), avg(sum[2]))
}

fn validate_input(pixels: &[[u8; 3]], k: usize) -> StoryResult<()> {
    if k == 0 {
        return Err(StoryError::validation("cluster count must be >= 1"));
    }
    if pixels.is_empty() {
        return Err(StoryError::validation("cannot cluster an empty image"));
    }
    Ok(())
}

/// Non-empty list of dominant colors, most populous first.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct DominantColorSet(Vec<ColorRgb>);

impl DominantColorSet {
    /// Wrap `colors`; `None` when empty.
    pub fn new(colors: Vec<ColorRgb>) -> Option<Self> {
        if colors.is_empty() {
            None
        } else {
            Some(Self(colors))
        }
    }

    /// Single neutral gray entry.
    pub fn fallback() -> Self {
        Self(vec![ColorRgb::NEUTRAL_GRAY])
    }

    pub fn as_slice(&self) -> &[ColorRgb] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The most populous color.
    pub fn primary(&self) -> ColorRgb {
        self.0[0]
    }

    pub fn into_vec(self) -> Vec<ColorRgb> {
        self.0
    }
}

/// Result of [`ColorExtractor::extract`].
#[derive(Clone, Debug)]
pub struct ColorExtraction {
    pub colors: DominantColorSet,
    pub flags: DegradedFlags,
}

/// Derives dominant colors from a bounded-size analysis copy of an image.
pub struct ColorExtractor {
    clusterer: Box<dyn ColorClusterer>,
    cluster_count: usize,
    analysis_size: u32,
}

impl std::fmt::Debug for ColorExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorExtractor")
            .field("clusterer", &self.clusterer.name())
            .field("cluster_count", &self.cluster_count)
            .field("analysis_size", &self.analysis_size)
            .finish()
    }
}

impl ColorExtractor {
    /// Build from configuration, selecting the clustering strategy explicitly.
    pub fn from_config(cfg: &ColorConfig) -> Self {
        let clusterer: Box<dyn ColorClusterer> = match cfg.clusterer {
            ClustererKind::KMeans => Box::new(KMeansClusterer {
                max_iterations: cfg.max_iterations,
            }),
            ClustererKind::Palette => Box::new(PaletteQuantizer),
        };
        Self::with_clusterer(clusterer, cfg.cluster_count, cfg.analysis_size)
    }

    /// Build around an arbitrary strategy.
    pub fn with_clusterer(
        clusterer: Box<dyn ColorClusterer>,
        cluster_count: usize,
        analysis_size: u32,
    ) -> Self {
        Self {
            clusterer,
            cluster_count: cluster_count.max(1),
            analysis_size: analysis_size.max(1),
        }
    }

    /// Extract dominant colors. Never fails; problems degrade to simpler strategies.
    #[tracing::instrument(skip(self, image), fields(clusterer = self.clusterer.name()))]
    pub fn extract(&self, image: &RgbImage) -> ColorExtraction {
        let mut flags = DegradedFlags::default();
        if image.width() == 0 || image.height() == 0 {
            flags.insert(DegradedFlag::ColorExtractionFallback);
            return ColorExtraction {
                colors: DominantColorSet::fallback(),
                flags,
            };
        }

        let small = imageops::resize(
            image,
            self.analysis_size,
            self.analysis_size,
            FilterType::Triangle,
        );
        let pixels: Vec<[u8; 3]> = small.pixels().map(|p| p.0).collect();

        let colors = match self.clusterer.cluster(&pixels, self.cluster_count) {
            Ok(colors) => colors,
            Err(err) => {
                tracing::warn!(%err, "clustering failed, falling back to palette quantization");
                flags.insert(DegradedFlag::ClusteringDegraded);
                match PaletteQuantizer.cluster(&pixels, self.cluster_count) {
                    Ok(colors) => colors,
                    Err(err) => {
                        tracing::warn!(%err, "palette quantization failed, using neutral gray");
                        Vec::new()
                    }
                }
            }
        };

        let colors = DominantColorSet::new(colors).unwrap_or_else(|| {
            flags.insert(DegradedFlag::ColorExtractionFallback);
            DominantColorSet::fallback()
        });
        tracing::debug!(colors = ?colors.as_slice(), "dominant colors");
        ColorExtraction { colors, flags }
    }
}
