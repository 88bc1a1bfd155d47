use image::RgbImage;

use crate::foundation::error::{PanoError, PanoResult};

/// Image/text embedding collaborator.
pub trait Embedder: Send + Sync {
    /// Length of every vector returned by [`Embedder::encode`].
    fn dims(&self) -> usize;

    /// Joint embedding of an image and its caption, L2-normalised.
    fn encode(&self, image: &RgbImage, text: &str) -> PanoResult<Vec<f32>>;

    /// Zero-shot classification: one probability per label, summing to 1, in label order.
    fn label_probabilities(&self, image: &RgbImage, labels: &[&str]) -> PanoResult<Vec<f32>>;
}

/// Logit scale applied to cosine similarities before [`softmax`].
pub const LABEL_LOGIT_SCALE: f32 = 100.0;

/// Scale `v` to unit length in place. Returns `false` (and leaves `v` untouched) for a zero vector.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    v.iter_mut().for_each(|x| *x /= norm);
    true
}

/// Numerically stable softmax of `scale * x`.
pub fn softmax(xs: &[f32], scale: f32) -> Vec<f32> {
    let max = xs.iter().fold(f32::NEG_INFINITY, |m, &x| m.max(scale * x));
    let exps: Vec<f32> = xs.iter().map(|&x| (scale * x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

const COLOR_WORDS: &[(&str, [u8; 3])] = &[
    ("red", [220, 30, 30]),
    ("green", [30, 180, 30]),
    ("blue", [30, 30, 220]),
    ("yellow", [230, 220, 40]),
    ("orange", [240, 140, 20]),
    ("purple", [130, 40, 160]),
    ("pink", [240, 150, 190]),
    ("cyan", [30, 220, 220]),
    ("brown", [120, 70, 30]),
    ("white", [245, 245, 245]),
    ("black", [10, 10, 10]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
];

/// Deterministic local embedder.
///
/// The image half is a joint RGB histogram with `bins_per_channel³` cells; the text half hashes
/// lowercase alphanumeric tokens into `text_dims` buckets. Each half is normalised on its own
/// before the concatenation is normalised, so neither modality dominates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistogramEmbedder {
    bins_per_channel: u32,
    text_dims: usize,
}

impl Default for HistogramEmbedder {
    fn default() -> Self {
        Self {
            bins_per_channel: 4,
            text_dims: 64,
        }
    }
}

impl HistogramEmbedder {
    /// Embedder with custom resolution.
    pub fn new(bins_per_channel: u32, text_dims: usize) -> PanoResult<Self> {
        if !(1..=16).contains(&bins_per_channel) {
            return Err(PanoError::input("bins_per_channel must be in 1..=16"));
        }
        if text_dims == 0 {
            return Err(PanoError::input("text_dims must be >= 1"));
        }
        Ok(Self {
            bins_per_channel,
            text_dims,
        })
    }

    fn image_dims(&self) -> usize {
        (self.bins_per_channel as usize).pow(3)
    }

    fn cell(&self, [r, g, b]: [u8; 3]) -> usize {
        let bins = self.bins_per_channel as usize;
        let bin = |c: u8| (c as usize * bins) / 256;
        (bin(r) * bins + bin(g)) * bins + bin(b)
    }

    fn histogram(&self, image: &RgbImage) -> Vec<f32> {
        let mut h = vec![0.0f32; self.image_dims()];
        for p in image.pixels() {
            h[self.cell(p.0)] += 1.0;
        }
        h
    }

    fn text_features(&self, text: &str) -> Vec<f32> {
        let mut t = vec![0.0f32; self.text_dims];
        for token in tokens(text) {
            let idx = (fnv1a(&token) % self.text_dims as u64) as usize;
            t[idx] += 1.0;
        }
        t
    }

    /// Colour words of `text` projected into histogram space.
    fn color_features(&self, text: &str) -> Vec<f32> {
        let mut h = vec![0.0f32; self.image_dims()];
        for token in tokens(text) {
            if let Some((_, rgb)) = COLOR_WORDS.iter().find(|(w, _)| *w == token) {
                h[self.cell(*rgb)] += 1.0;
            }
        }
        h
    }
}

impl Embedder for HistogramEmbedder {
    fn dims(&self) -> usize {
        self.image_dims() + self.text_dims
    }

    fn encode(&self, image: &RgbImage, text: &str) -> PanoResult<Vec<f32>> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PanoError::embed("image has no pixels"));
        }
        let mut img = self.histogram(image);
        l2_normalize(&mut img);
        let mut txt = self.text_features(text);
        l2_normalize(&mut txt);

        let mut v = img;
        v.extend(txt);
        if !l2_normalize(&mut v) {
            return Err(PanoError::embed("embedding is all zeros"));
        }
        Ok(v)
    }

    fn label_probabilities(&self, image: &RgbImage, labels: &[&str]) -> PanoResult<Vec<f32>> {
        if labels.is_empty() {
            return Err(PanoError::input("at least one label is required"));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(PanoError::embed("image has no pixels"));
        }
        let mut img = self.histogram(image);
        l2_normalize(&mut img);
        let sims: Vec<f32> = labels
            .iter()
            .map(|label| {
                let mut c = self.color_features(label);
                l2_normalize(&mut c);
                img.iter().zip(&c).map(|(a, b)| a * b).sum()
            })
            .collect();
        Ok(softmax(&sims, LABEL_LOGIT_SCALE))
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[cfg(test)]
#[path = "../../tests/unit/embed/encoder.rs"]
mod tests;
