use serde::{Deserialize, Serialize};

use crate::gallery::IdentityGallery;

/// Similarity floor for accepting a gallery match as an identity.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.30;

/// A 2D image point. Pixel coordinates for face landmarks, normalized
/// [0, 1] coordinates for hand landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One detected face: pixel-coordinate bounding box plus the five facial
/// landmarks in the order fixed by [`crate::landmarks::face`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceCandidate {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub landmarks: [Point; 5],
}

impl FaceCandidate {
    pub fn landmark(&self, role: usize) -> Point {
        self.landmarks[role]
    }
}

/// Face embedding vector produced by the external embedding model.
///
/// Serializes as a flat float array, which is exactly the per-entry shape
/// of the persisted gallery document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar; 1.0 = identical
    /// direction. A zero-norm operand yields 0.0.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }
}

/// Result of matching a query embedding against the gallery.
///
/// `score` is the maximum similarity seen, reported even when it stays
/// below threshold so callers can display near-misses. `name` is set only
/// for an accepted match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub name: Option<String>,
    pub score: f32,
}

/// Strategy for comparing a query embedding against the identity gallery.
pub trait Matcher {
    fn compare(&self, query: &Embedding, gallery: &IdentityGallery, threshold: f32)
        -> MatchResult;
}

/// Cosine-similarity matcher.
///
/// Traverses the whole gallery — the running maximum is kept even when it
/// never clears the threshold. An exact score tie resolves to whichever
/// tied entry the gallery iterates first; callers must not rely on which.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn compare(
        &self,
        query: &Embedding,
        gallery: &IdentityGallery,
        threshold: f32,
    ) -> MatchResult {
        let mut best_score = 0.0f32;
        let mut best_name: Option<&str> = None;

        for (name, embedding) in gallery.iter() {
            let score = query.similarity(embedding);
            if best_name.is_none() || score > best_score {
                best_score = score;
                best_name = Some(name);
            }
        }

        let name = if best_score > threshold {
            best_name.map(str::to_owned)
        } else {
            None
        };

        MatchResult {
            name,
            score: best_score,
        }
    }
}
