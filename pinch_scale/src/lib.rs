//! # pinch_scale
//!
//! Map the pinch distance between two fingertips onto a bounded volume
//! scale, where:
//!
//! * **Pinched fingers** (small distance) → the scale's minimum
//! * **Spread fingers** (large distance) → the scale's maximum
//!
//! The mapping is a clamped linear interpolation: distances at or below the
//! calibrated minimum pin the output to the low end of the scale, distances
//! at or above the calibrated maximum pin it to the high end, and everything
//! between interpolates linearly. Outputs never leave the target range, so
//! a hand at arm's length cannot drive an out-of-range write into whatever
//! consumes the level.
//!
//! ## Quick start
//!
//! ```rust
//! use pinch_scale::{CalibrationBounds, LevelMap, Point};
//!
//! let thumb = Point::new(120.0, 200.0);
//! let index = Point::new(240.0, 200.0);
//!
//! // 20–200 px of pinch sweep the mixer's -65.25..0.0 dB range.
//! let bounds = CalibrationBounds::new(20.0, 200.0, -65.25, 0.0).unwrap();
//! let map = LevelMap::new(bounds);
//!
//! let db = map.level_for(thumb.distance_to(index));
//! assert!(db > -65.25 && db < 0.0);
//! ```

use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// Point — a 2-D position in pixel space
// ════════════════════════════════════════════════════════════════════════════

/// A 2-D point in frame pixel coordinates.
///
/// # Example
/// ```rust
/// use pinch_scale::Point;
///
/// let a = Point::new(0.0, 0.0);
/// let b = Point::new(3.0, 4.0);
/// assert_eq!(a.distance_to(b), 5.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CalibrationBounds — validated (distance range, level range) pair
// ════════════════════════════════════════════════════════════════════════════

/// Rejected calibration values.
#[derive(Debug, Error, PartialEq)]
pub enum BoundsError {
    #[error("min_distance {min} must be strictly below max_distance {max}")]
    DistanceOrder { min: f32, max: f32 },

    #[error("min_level {min} must not exceed max_level {max}")]
    LevelOrder { min: f32, max: f32 },

    #[error("calibration values must be finite")]
    NonFinite,
}

/// The fixed calibration for one run: a pinch-distance range in pixels and
/// the level range it sweeps.
///
/// Invariants, enforced at construction: `min_distance < max_distance`,
/// `min_level <= max_level`, all four values finite.
///
/// # Example
/// ```rust
/// use pinch_scale::{BoundsError, CalibrationBounds};
///
/// assert!(CalibrationBounds::new(20.0, 200.0, 0.0, 100.0).is_ok());
/// assert_eq!(
///     CalibrationBounds::new(200.0, 20.0, 0.0, 100.0),
///     Err(BoundsError::DistanceOrder { min: 200.0, max: 20.0 }),
/// );
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationBounds {
    min_distance: f32,
    max_distance: f32,
    min_level:    f32,
    max_level:    f32,
}

impl CalibrationBounds {
    pub fn new(
        min_distance: f32,
        max_distance: f32,
        min_level: f32,
        max_level: f32,
    ) -> Result<Self, BoundsError> {
        if ![min_distance, max_distance, min_level, max_level]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(BoundsError::NonFinite);
        }
        if min_distance >= max_distance {
            return Err(BoundsError::DistanceOrder { min: min_distance, max: max_distance });
        }
        if min_level > max_level {
            return Err(BoundsError::LevelOrder { min: min_level, max: max_level });
        }
        Ok(CalibrationBounds { min_distance, max_distance, min_level, max_level })
    }

    pub fn min_distance(&self) -> f32 { self.min_distance }
    pub fn max_distance(&self) -> f32 { self.max_distance }
    pub fn min_level(&self)    -> f32 { self.min_level }
    pub fn max_level(&self)    -> f32 { self.max_level }
}

impl Default for CalibrationBounds {
    /// 20–200 px of pinch onto a 0–100 logical scale.
    fn default() -> Self {
        CalibrationBounds {
            min_distance: 20.0,
            max_distance: 200.0,
            min_level:    0.0,
            max_level:    100.0,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LevelMap — clamped linear interpolation distance → level
// ════════════════════════════════════════════════════════════════════════════

/// Converts a pinch distance into a level on the calibrated scale.
///
/// # Example
/// ```rust
/// use pinch_scale::{CalibrationBounds, LevelMap};
///
/// let map = LevelMap::new(CalibrationBounds::default());
/// assert_eq!(map.level_for(20.0),  0.0);    // pinched
/// assert_eq!(map.level_for(110.0), 50.0);   // midway
/// assert_eq!(map.level_for(200.0), 100.0);  // fully spread
/// assert_eq!(map.level_for(500.0), 100.0);  // beyond the sweep, clamped
/// ```
#[derive(Clone, Copy, Debug)]
pub struct LevelMap {
    bounds: CalibrationBounds,
}

impl LevelMap {
    pub fn new(bounds: CalibrationBounds) -> Self {
        LevelMap { bounds }
    }

    pub fn bounds(&self) -> CalibrationBounds {
        self.bounds
    }

    /// Position of `distance` within the calibrated sweep, clamped to 0–1.
    pub fn fraction_for(&self, distance: f32) -> f32 {
        let b = &self.bounds;
        ((distance - b.min_distance) / (b.max_distance - b.min_distance)).clamp(0.0, 1.0)
    }

    /// Level for `distance`: clamped linear interpolation onto
    /// `min_level..=max_level`.
    pub fn level_for(&self, distance: f32) -> f32 {
        let b = &self.bounds;
        b.min_level + self.fraction_for(distance) * (b.max_level - b.min_level)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
