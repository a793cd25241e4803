//! Ball trajectory prediction
//!
//! Straight-line extrapolation to a vertical line, with the top and bottom
//! walls treated as mirrors.

use glam::Vec2;

/// Where the ball will cross the vertical line `x = target_x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intercept {
    pub y: f32,
    /// Seconds until the crossing
    pub time: f32,
}

/// Predict the crossing of `x = target_x` for a ball moving at constant
/// velocity between walls at `top` and `bottom`. `None` if the ball is not
/// heading toward the line.
pub fn predict_intercept(
    position: Vec2,
    velocity: Vec2,
    target_x: f32,
    top: f32,
    bottom: f32,
) -> Option<Intercept> {
    let dx = target_x - position.x;
    if velocity.x.abs() < f32::EPSILON || dx * velocity.x < 0.0 {
        return None;
    }
    let time = dx / velocity.x;
    let raw_y = position.y + velocity.y * time;
    Some(Intercept {
        y: fold_into_bounds(raw_y, top, bottom),
        time,
    })
}

/// Fold `y` back into `[top, bottom]` by repeated reflection
pub fn fold_into_bounds(y: f32, top: f32, bottom: f32) -> f32 {
    let span = bottom - top;
    if span <= 0.0 {
        return top;
    }
    if !y.is_finite() {
        return top + span / 2.0;
    }
    let period = 2.0 * span;
    let phase = (y - top).rem_euclid(period);
    if phase <= span {
        top + phase
    } else {
        top + period - phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_shot() {
        let hit = predict_intercept(Vec2::new(100.0, 300.0), Vec2::new(100.0, 0.0), 700.0, 0.0, 600.0)
            .unwrap();
        assert!((hit.y - 300.0).abs() < 1e-4);
        assert!((hit.time - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_single_bounce_off_bottom() {
        // Raw y = 500 + 200 = 700 -> reflected to 500
        let hit = predict_intercept(Vec2::new(0.0, 500.0), Vec2::new(100.0, 100.0), 200.0, 0.0, 600.0)
            .unwrap();
        assert!((hit.y - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_multiple_bounces() {
        assert!((fold_into_bounds(-100.0, 0.0, 600.0) - 100.0).abs() < 1e-3);
        assert!((fold_into_bounds(1300.0, 0.0, 600.0) - 100.0).abs() < 1e-3);
        assert!((fold_into_bounds(2500.0, 0.0, 600.0) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_moving_away_has_no_intercept() {
        assert!(predict_intercept(Vec2::new(400.0, 300.0), Vec2::new(-100.0, 0.0), 770.0, 0.0, 600.0).is_none());
        assert!(predict_intercept(Vec2::new(400.0, 300.0), Vec2::new(0.0, 100.0), 770.0, 0.0, 600.0).is_none());
    }
}
