//! Distance-to-score transform

use super::round::{MapSize, Point};

/// Score awarded for a perfect guess
pub const MAX_SCORE: u32 = 1000;

/// Score floor; every submitted guess is worth at least this much
pub const MIN_SCORE: u32 = 1;

/// Euclidean distance between two pixel points
pub fn pixel_distance(a: Point, b: Point) -> f64 {
    let dx = f64::from(a.x) - f64::from(b.x);
    let dy = f64::from(a.y) - f64::from(b.y);
    dx.hypot(dy)
}

/// Map a pixel distance to a score in `[MIN_SCORE, MAX_SCORE]`.
///
/// The decay scale is half the map diagonal, so a guess one half-diagonal
/// away earns `1000 / e`. The scale never drops below one pixel.
pub fn score_from_distance(distance: f64, map_size: MapSize) -> u32 {
    let diag = f64::from(map_size.width).hypot(f64::from(map_size.height));
    let scale = (diag / 2.0).max(1.0);
    let raw = f64::from(MAX_SCORE) * (-distance / scale).exp();

    // raw is in (0, 1000] for finite non-negative distances
    (raw.round() as u32).clamp(MIN_SCORE, MAX_SCORE)
}

/// Score a guess against the answer for a map of the given size
pub fn score(guess: Point, answer: Point, map_size: MapSize) -> u32 {
    score_from_distance(pixel_distance(guess, answer), map_size)
}
