//! Face quality gate — bounds, sharpness and pose checks ahead of
//! recognition.
//!
//! Pure function of the frame and the detection: every rejection is a
//! value, never an error.

use std::fmt;

use crate::frame::Frame;
use crate::landmarks::face;
use crate::types::FaceCandidate;

/// Laplacian-variance floor below which a crop counts as blurred.
pub const DEFAULT_SHARPNESS_FLOOR: f32 = 20.0;

/// Accepted band for the eye-to-nose yaw ratio.
pub const POSE_RATIO_MIN: f32 = 0.3;
pub const POSE_RATIO_MAX: f32 = 3.0;

/// Outcome of one quality evaluation. The accepted variant carries the
/// sharpness score for diagnostics; each rejection names its cause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityVerdict {
    Accepted { sharpness: f32 },
    /// Box extends outside the frame — truncated detection.
    EdgeClipped,
    /// Zero-area face box.
    EmptyCrop,
    /// Laplacian variance under the floor — motion blur or bad focus.
    Blurry { sharpness: f32 },
    /// Eye-to-nose ratio outside the accepted band — excessive head yaw.
    Yawed { ratio: f32 },
}

impl QualityVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, QualityVerdict::Accepted { .. })
    }
}

impl fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityVerdict::Accepted { sharpness } => write!(f, "OK ({sharpness:.0})"),
            QualityVerdict::EdgeClipped => write!(f, "edge-clipped"),
            QualityVerdict::EmptyCrop => write!(f, "empty-crop"),
            QualityVerdict::Blurry { sharpness } => write!(f, "blurry ({sharpness:.0})"),
            QualityVerdict::Yawed { ratio } => write!(f, "yawed ({ratio:.2})"),
        }
    }
}

/// Pass/fail gate applied to every detection before embedding extraction.
pub struct QualityGate {
    pub sharpness_floor: f32,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            sharpness_floor: DEFAULT_SHARPNESS_FLOOR,
        }
    }
}

impl QualityGate {
    pub fn new(sharpness_floor: f32) -> Self {
        Self { sharpness_floor }
    }

    /// Evaluate one detection: bounds, then sharpness, then pose.
    pub fn evaluate(&self, frame: &Frame, face: &FaceCandidate) -> QualityVerdict {
        if face.x < 0.0
            || face.y < 0.0
            || face.x + face.width > frame.width as f32
            || face.y + face.height > frame.height as f32
        {
            return QualityVerdict::EdgeClipped;
        }

        let Some(crop) = frame.crop(
            face.x as u32,
            face.y as u32,
            face.width as u32,
            face.height as u32,
        ) else {
            return QualityVerdict::EdgeClipped;
        };
        if crop.data.is_empty() {
            return QualityVerdict::EmptyCrop;
        }

        let sharpness = laplacian_variance(&crop);
        if sharpness < self.sharpness_floor {
            return QualityVerdict::Blurry { sharpness };
        }

        // Yaw ratio: distance nose-to-right-eye over distance left-eye-to-nose.
        // Near 1.0 for a frontal face; the degenerate zero denominator maps to
        // 0, which fails the band.
        let nose_x = face.landmark(face::NOSE).x;
        let span_left = nose_x - face.landmark(face::RIGHT_EYE).x;
        let span_right = face.landmark(face::LEFT_EYE).x - nose_x;
        let ratio = if span_right == 0.0 {
            0.0
        } else {
            span_left / span_right
        };
        if !(POSE_RATIO_MIN..=POSE_RATIO_MAX).contains(&ratio) {
            return QualityVerdict::Yawed { ratio };
        }

        QualityVerdict::Accepted { sharpness }
    }
}

/// Variance of the 4-neighbour Laplacian response over the crop interior.
///
/// A flat crop scores 0; crops under 3x3 have no interior and also score 0.
pub fn laplacian_variance(crop: &Frame) -> f32 {
    let w = crop.width as usize;
    let h = crop.height as usize;
    if w < 3 || h < 3 {
        return 0.0;
    }

    let data = &crop.data;
    let mut responses = Vec::with_capacity((w - 2) * (h - 2));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = data[y * w + x] as f64;
            let response = data[y * w + x - 1] as f64
                + data[y * w + x + 1] as f64
                + data[(y - 1) * w + x] as f64
                + data[(y + 1) * w + x] as f64
                - 4.0 * center;
            responses.push(response);
        }
    }

    let n = responses.len() as f64;
    let mean = responses.iter().sum::<f64>() / n;
    let variance = responses.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    /// Checkerboard frame: strong Laplacian response everywhere.
    fn sharp_frame(width: u32, height: u32) -> Frame {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| if (x + y) % 2 == 0 { 255u8 } else { 0 }))
            .collect();
        Frame::from_luma(data, width, height).unwrap()
    }

    fn flat_frame(width: u32, height: u32) -> Frame {
        Frame::from_luma(vec![128u8; (width * height) as usize], width, height).unwrap()
    }

    /// Frontal-pose landmarks for a box at (x, y): eyes symmetric about the
    /// nose, ratio exactly 1.0.
    fn frontal_landmarks(x: f32, y: f32) -> [Point; 5] {
        [
            Point::new(x + 10.0, y + 12.0), // right eye
            Point::new(x + 30.0, y + 12.0), // left eye
            Point::new(x + 20.0, y + 20.0), // nose
            Point::new(x + 14.0, y + 30.0), // mouth right
            Point::new(x + 26.0, y + 30.0), // mouth left
        ]
    }

    fn candidate(x: f32, y: f32, w: f32, h: f32) -> FaceCandidate {
        FaceCandidate {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
            landmarks: frontal_landmarks(x, y),
        }
    }

    #[test]
    fn test_accepts_sharp_frontal_face() {
        let frame = sharp_frame(100, 100);
        let verdict = QualityGate::default().evaluate(&frame, &candidate(10.0, 10.0, 40.0, 40.0));
        assert!(verdict.is_accepted(), "got {verdict}");
    }

    #[test]
    fn test_rejects_negative_origin() {
        for (fw, fh) in [(64u32, 48u32), (640, 480), (1920, 1080)] {
            let frame = sharp_frame(fw.min(100), fh.min(100));
            assert_eq!(
                QualityGate::default().evaluate(&frame, &candidate(-1.0, 5.0, 10.0, 10.0)),
                QualityVerdict::EdgeClipped
            );
            assert_eq!(
                QualityGate::default().evaluate(&frame, &candidate(5.0, -0.5, 10.0, 10.0)),
                QualityVerdict::EdgeClipped
            );
        }
    }

    #[test]
    fn test_rejects_box_past_frame_edge() {
        let frame = sharp_frame(64, 48);
        // x + w = 60 + 10 > 64
        assert_eq!(
            QualityGate::default().evaluate(&frame, &candidate(60.0, 5.0, 10.0, 10.0)),
            QualityVerdict::EdgeClipped
        );
        // y + h = 40 + 10 > 48
        assert_eq!(
            QualityGate::default().evaluate(&frame, &candidate(5.0, 40.0, 10.0, 10.0)),
            QualityVerdict::EdgeClipped
        );
    }

    #[test]
    fn test_rejects_flat_crop_as_blurry() {
        let frame = flat_frame(100, 100);
        let verdict = QualityGate::default().evaluate(&frame, &candidate(10.0, 10.0, 40.0, 40.0));
        match verdict {
            QualityVerdict::Blurry { sharpness } => assert!(sharpness < 1e-3),
            other => panic!("expected blurry, got {other}"),
        }
    }

    #[test]
    fn test_rejects_yawed_pose() {
        let frame = sharp_frame(100, 100);
        let mut face = candidate(10.0, 10.0, 40.0, 40.0);
        // Nose pushed almost onto the left eye: ratio far above 3.0.
        face.landmarks[face::NOSE] = Point::new(face.landmarks[face::LEFT_EYE].x - 1.0, 30.0);
        match QualityGate::default().evaluate(&frame, &face) {
            QualityVerdict::Yawed { ratio } => assert!(ratio > POSE_RATIO_MAX),
            other => panic!("expected yawed, got {other}"),
        }
    }

    #[test]
    fn test_zero_denominator_fails_pose() {
        let frame = sharp_frame(100, 100);
        let mut face = candidate(10.0, 10.0, 40.0, 40.0);
        // Left eye exactly over the nose: degenerate geometry, ratio 0.
        face.landmarks[face::LEFT_EYE] = Point::new(face.landmarks[face::NOSE].x, 22.0);
        match QualityGate::default().evaluate(&frame, &face) {
            QualityVerdict::Yawed { ratio } => assert_eq!(ratio, 0.0),
            other => panic!("expected yawed, got {other}"),
        }
    }

    #[test]
    fn test_flat_image_sharpness_is_zero() {
        assert_eq!(laplacian_variance(&flat_frame(32, 32)), 0.0);
    }

    #[test]
    fn test_checkerboard_sharpness_is_large() {
        assert!(laplacian_variance(&sharp_frame(32, 32)) > DEFAULT_SHARPNESS_FLOOR);
    }

    #[test]
    fn test_tiny_crop_sharpness_is_zero() {
        assert_eq!(laplacian_variance(&sharp_frame(2, 2)), 0.0);
    }

    #[test]
    fn test_verdict_reasons() {
        assert_eq!(QualityVerdict::EdgeClipped.to_string(), "edge-clipped");
        assert_eq!(
            QualityVerdict::Blurry { sharpness: 12.4 }.to_string(),
            "blurry (12)"
        );
        assert_eq!(
            QualityVerdict::Accepted { sharpness: 57.0 }.to_string(),
            "OK (57)"
        );
        assert_eq!(
            QualityVerdict::Yawed { ratio: 3.416 }.to_string(),
            "yawed (3.42)"
        );
    }
}
