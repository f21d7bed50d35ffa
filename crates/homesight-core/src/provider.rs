//! Trait seams for the external model capabilities.
//!
//! Detection, embedding extraction and hand-landmark estimation are
//! consumed capabilities: the pipeline calls through these traits and a
//! backend crate supplies the inference. Methods take `&mut self` because
//! real inference sessions are stateful.

use crate::frame::Frame;
use crate::landmarks::HandLandmarks;
use crate::types::{Embedding, FaceCandidate};

/// Per-frame face detection: boxes plus five landmarks each.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Vec<FaceCandidate>;
}

/// Aligned-crop embedding extraction for one detected face.
///
/// `None` means the backend could not produce an embedding for this
/// detection; the frame is skipped, not failed.
pub trait FaceEmbedder: Send {
    fn embed(&mut self, frame: &Frame, face: &FaceCandidate) -> Option<Embedding>;
}

/// Per-frame hand-landmark estimation. At most one hand is expected; when
/// a backend reports several anyway, callers classify each in order and
/// keep the last result.
pub trait HandLandmarker: Send {
    fn detect(&mut self, frame: &Frame) -> Vec<HandLandmarks>;
}

/// The bundle of capability providers the pipeline runs against.
pub struct Perception {
    pub detector: Box<dyn FaceDetector>,
    pub embedder: Box<dyn FaceEmbedder>,
    pub hands: Box<dyn HandLandmarker>,
}

impl Perception {
    /// Backend used when no model integration is configured: reports no
    /// detections, so recognition degrades to "Unknown" and gestures to
    /// none while the rest of the service stays functional.
    pub fn stub() -> Self {
        Self {
            detector: Box::new(StubPerception),
            embedder: Box::new(StubPerception),
            hands: Box::new(StubPerception),
        }
    }
}

/// See [`Perception::stub`].
pub struct StubPerception;

impl FaceDetector for StubPerception {
    fn detect(&mut self, _frame: &Frame) -> Vec<FaceCandidate> {
        Vec::new()
    }
}

impl FaceEmbedder for StubPerception {
    fn embed(&mut self, _frame: &Frame, _face: &FaceCandidate) -> Option<Embedding> {
        None
    }
}

impl HandLandmarker for StubPerception {
    fn detect(&mut self, _frame: &Frame) -> Vec<HandLandmarks> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_reports_nothing() {
        let mut perception = Perception::stub();
        let frame = Frame::from_luma(vec![0u8; 16], 4, 4).unwrap();
        assert!(perception.detector.detect(&frame).is_empty());
        assert!(perception.hands.detect(&frame).is_empty());
    }
}
