//! homesight-core — per-frame perception for the Homesight controller.
//!
//! Turns one camera frame into two decisions: who is present (face
//! embedding matched against a persisted identity gallery, behind a
//! quality gate) and what command was gestured (deterministic classifier
//! over 21 hand landmarks). Model inference itself lives behind the
//! [`provider`] trait seams.

pub mod frame;
pub mod gallery;
pub mod gesture;
pub mod landmarks;
pub mod provider;
pub mod quality;
pub mod types;

pub use frame::Frame;
pub use gallery::{IdentityGallery, LoadOutcome};
pub use gesture::{classify, FingerState, Gesture};
pub use landmarks::HandLandmarks;
pub use provider::{FaceDetector, FaceEmbedder, HandLandmarker, Perception};
pub use quality::{QualityGate, QualityVerdict};
pub use types::{CosineMatcher, Embedding, FaceCandidate, MatchResult, Matcher, Point};
