//! Hand-gesture classification from landmark geometry.
//!
//! Two steps: derive which fingers are extended, then walk an ordered
//! decision table keyed on the extended count. First matching row wins;
//! a count with no matching row is no gesture.

use std::fmt;

use serde::Serialize;

use crate::landmarks::{hand, HandLandmarks};

/// How far below its joint the thumb tip must sit to read as pressed down
/// rather than merely curled.
const THUMB_DOWN_MARGIN: f32 = 0.05;

/// Maximum horizontal thumb-tip-to-index-tip gap for the OK pinch.
const OK_PINCH_MAX_GAP: f32 = 0.05;

/// The fixed gesture vocabulary. Labels are the wire form used in device
/// rules and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gesture {
    OpenHand,
    Fist,
    ThumbUp,
    ThumbDown,
    Pointing,
    Victory,
    Rock,
    Three,
    Love,
    OkSign,
}

impl Gesture {
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::OpenHand => "OPEN_HAND",
            Gesture::Fist => "FIST",
            Gesture::ThumbUp => "THUMB_UP",
            Gesture::ThumbDown => "THUMB_DOWN",
            Gesture::Pointing => "POINTING",
            Gesture::Victory => "VICTORY",
            Gesture::Rock => "ROCK",
            Gesture::Three => "THREE",
            Gesture::Love => "LOVE",
            Gesture::OkSign => "OK_SIGN",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which fingers are extended, `[thumb, index, middle, ring, pinky]`.
/// Frame-local intermediate, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerState {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerState {
    /// Image y grows downward, so the four long fingers are extended when
    /// the tip sits above its proximal joint. The thumb moves laterally and
    /// gets a horizontal test instead.
    pub fn from_landmarks(lm: &HandLandmarks) -> Self {
        let above = |tip: usize, pip: usize| lm.point(tip).y < lm.point(pip).y;
        Self {
            thumb: lm.point(hand::THUMB_TIP).x < lm.point(hand::THUMB_IP).x,
            index: above(hand::INDEX_TIP, hand::INDEX_PIP),
            middle: above(hand::MIDDLE_TIP, hand::MIDDLE_PIP),
            ring: above(hand::RING_TIP, hand::RING_PIP),
            pinky: above(hand::PINKY_TIP, hand::PINKY_PIP),
        }
    }

    pub fn extended_count(&self) -> u8 {
        [self.thumb, self.index, self.middle, self.ring, self.pinky]
            .iter()
            .filter(|&&f| f)
            .count() as u8
    }
}

/// One row of the decision table: the extended-finger count it applies to,
/// a sub-predicate over the finger pattern and raw geometry, and the label.
struct Rule {
    count: u8,
    applies: fn(FingerState, &HandLandmarks) -> bool,
    label: Gesture,
}

fn always(_: FingerState, _: &HandLandmarks) -> bool {
    true
}

fn thumb_pressed_down(_: FingerState, lm: &HandLandmarks) -> bool {
    lm.point(hand::THUMB_TIP).y > lm.point(hand::THUMB_IP).y + THUMB_DOWN_MARGIN
}

fn index_raised(s: FingerState, _: &HandLandmarks) -> bool {
    s.index
}

fn thumb_raised(s: FingerState, lm: &HandLandmarks) -> bool {
    s.thumb && lm.point(hand::THUMB_TIP).y < lm.point(hand::THUMB_IP).y
}

fn index_middle(s: FingerState, _: &HandLandmarks) -> bool {
    s.index && s.middle
}

fn index_pinky(s: FingerState, _: &HandLandmarks) -> bool {
    s.index && s.pinky
}

fn index_middle_ring(s: FingerState, _: &HandLandmarks) -> bool {
    s.index && s.middle && s.ring
}

fn thumb_index_pinky(s: FingerState, _: &HandLandmarks) -> bool {
    s.thumb && s.index && s.pinky
}

fn ok_pinch(s: FingerState, lm: &HandLandmarks) -> bool {
    s.middle
        && s.ring
        && s.pinky
        && (lm.point(hand::THUMB_TIP).x - lm.point(hand::INDEX_TIP).x).abs() < OK_PINCH_MAX_GAP
}

/// Ordered decision table. Within one count the predicates are disjoint
/// given the extended-finger identities, so row order only decides the
/// documented fall-throughs (a raised-but-not-up thumb, a failed OK pinch).
static RULES: [Rule; 10] = [
    Rule { count: 5, applies: always, label: Gesture::OpenHand },
    Rule { count: 0, applies: thumb_pressed_down, label: Gesture::ThumbDown },
    Rule { count: 0, applies: always, label: Gesture::Fist },
    Rule { count: 1, applies: index_raised, label: Gesture::Pointing },
    Rule { count: 1, applies: thumb_raised, label: Gesture::ThumbUp },
    Rule { count: 2, applies: index_middle, label: Gesture::Victory },
    Rule { count: 2, applies: index_pinky, label: Gesture::Rock },
    Rule { count: 3, applies: index_middle_ring, label: Gesture::Three },
    Rule { count: 3, applies: thumb_index_pinky, label: Gesture::Love },
    Rule { count: 3, applies: ok_pinch, label: Gesture::OkSign },
];

/// Classify one hand. `None` when no table row matches — an unrecognized
/// finger pattern, not an error.
pub fn classify(lm: &HandLandmarks) -> Option<Gesture> {
    let state = FingerState::from_landmarks(lm);
    let count = state.extended_count();
    RULES
        .iter()
        .find(|rule| rule.count == count && (rule.applies)(state, lm))
        .map(|rule| rule.label)
}
