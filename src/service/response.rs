use super::wire::{Hand, HandRect, HandsReply, Image};
use crate::types::{DetectedHand, DetectionSet, Frame, NormalizedRect};

/// Builds a `GetHands` reply. `image` is moved into the reply untouched; pass
/// `None` when the caller did not ask for it.
pub fn hands_reply(detections: DetectionSet, image: Option<Frame>, min_score: f32) -> HandsReply {
    let hands = detections
        .hands
        .into_iter()
        .filter(|hand| passes(hand, min_score))
        .map(wire_hand)
        .collect();

    HandsReply {
        hands,
        image: image.map(Image::from),
    }
}

/// Hands without a handedness stream have no score to compare and are kept.
fn passes(hand: &DetectedHand, min_score: f32) -> bool {
    hand.handedness
        .as_ref()
        .is_none_or(|handedness| handedness.score >= min_score)
}

fn wire_hand(hand: DetectedHand) -> Hand {
    let (label, score) = match hand.handedness {
        Some(classification) => (classification.label, classification.score),
        None => (String::new(), 0.0),
    };
    Hand {
        label,
        score,
        hand_rect: hand.rect.map(wire_rect),
        landmarks: hand.landmarks.into_iter().map(Into::into).collect(),
    }
}

fn wire_rect(rect: NormalizedRect) -> HandRect {
    HandRect {
        x_center: rect.x_center,
        y_center: rect.y_center,
        width: rect.width,
        height: rect.height,
        rect_id: rect.rect_id,
    }
}
